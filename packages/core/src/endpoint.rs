//! Connection descriptors for the remote search service.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use url::Url;

use crate::Error;

/// Basic authentication credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// One configured network address of the search service.
///
/// Endpoints are immutable once built; registries hand them out as
/// `Arc<Endpoint>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    key: String,

    #[serde(default = "default_scheme")]
    scheme: String,

    #[serde(default = "default_host")]
    host: String,

    #[serde(default = "default_port")]
    port: u16,

    #[serde(default = "default_path", deserialize_with = "deserialize_path")]
    path: String,

    #[serde(default = "default_context", deserialize_with = "deserialize_context")]
    context: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    core: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    credentials: Option<Credentials>,

    /// Total timeout override in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timeout_ms: Option<u64>,
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8983
}

fn default_path() -> String {
    "/".to_string()
}

fn default_context() -> String {
    "solr".to_string()
}

/// `/` for an empty path, otherwise `/{segments}/`.
fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

fn normalize_context(context: &str) -> String {
    context.trim_matches('/').to_string()
}

fn deserialize_path<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    String::deserialize(deserializer).map(|path| normalize_path(&path))
}

fn deserialize_context<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    String::deserialize(deserializer).map(|context| normalize_context(&context))
}

impl Endpoint {
    /// Create an endpoint with default address fields.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            scheme: default_scheme(),
            host: default_host(),
            port: default_port(),
            path: default_path(),
            context: default_context(),
            core: None,
            credentials: None,
            timeout_ms: None,
        }
    }

    /// Set the URI scheme.
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Set the host name or address.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the TCP port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Base path; leading and trailing slashes are normalized.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = normalize_path(&path.into());
        self
    }

    /// Context segment between the base path and the core; slashes are trimmed.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = normalize_context(&context.into());
        self
    }

    /// Set the core or collection name.
    pub fn with_core(mut self, core: impl Into<String>) -> Self {
        self.core = Some(core.into());
        self
    }

    /// Attach basic authentication credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Override the transport's total request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// Get the endpoint key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the URI scheme.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Get the host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Get the port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get the normalized base path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get the context segment.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Get the core name, if any.
    pub fn core(&self) -> Option<&str> {
        self.core.as_deref()
    }

    /// Get the basic authentication credentials, if any.
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Get the timeout override, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// URI of the service itself, used for server-level handlers.
    ///
    /// `{scheme}://{host}:{port}{path}{context}/`
    pub fn server_uri(&self) -> Result<Url, Error> {
        let mut uri = format!("{}://{}:{}{}", self.scheme, self.host, self.port, self.path);
        if !self.context.is_empty() {
            uri.push_str(&self.context);
            uri.push('/');
        }
        Ok(Url::parse(&uri)?)
    }

    /// URI of the configured core/collection.
    pub fn core_uri(&self) -> Result<Url, Error> {
        let core = self.core.as_deref().ok_or_else(|| {
            Error::configuration(format!("endpoint '{}' has no core configured", self.key))
        })?;
        Ok(self.server_uri()?.join(&format!("{}/", core))?)
    }

    /// Validate the fields that cannot be checked by the type system.
    pub fn validate(&self) -> Result<(), Error> {
        if self.key.is_empty() {
            return Err(Error::invalid_argument("endpoint key must not be empty"));
        }
        if self.host.is_empty() {
            return Err(Error::invalid_argument(format!(
                "endpoint '{}' has an empty host",
                self.key
            )));
        }
        self.server_uri().map(|_| ())
    }
}

/// The endpoints known to a client, keyed by endpoint key.
///
/// The first registered endpoint is the default unless another one is
/// selected explicitly.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: BTreeMap<String, Arc<Endpoint>>,
    default_key: Option<String>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an endpoint; duplicate keys are rejected.
    pub fn add(&mut self, endpoint: Endpoint) -> Result<Arc<Endpoint>, Error> {
        endpoint.validate()?;
        if self.endpoints.contains_key(endpoint.key()) {
            return Err(Error::invalid_argument(format!(
                "an endpoint with key '{}' is already registered",
                endpoint.key()
            )));
        }
        let key = endpoint.key().to_string();
        let endpoint = Arc::new(endpoint);
        if self.default_key.is_none() {
            self.default_key = Some(key.clone());
        }
        self.endpoints.insert(key, Arc::clone(&endpoint));
        Ok(endpoint)
    }

    /// Remove an endpoint, promoting another to default if needed.
    pub fn remove(&mut self, key: &str) -> Result<Arc<Endpoint>, Error> {
        let removed = self
            .endpoints
            .remove(key)
            .ok_or_else(|| Error::invalid_argument(format!("unknown endpoint '{}'", key)))?;
        if self.default_key.as_deref() == Some(key) {
            self.default_key = self.endpoints.keys().next().cloned();
        }
        Ok(removed)
    }

    /// Look up an endpoint by key.
    pub fn get(&self, key: &str) -> Result<&Arc<Endpoint>, Error> {
        self.endpoints
            .get(key)
            .ok_or_else(|| Error::configuration(format!("unknown endpoint '{}'", key)))
    }

    /// Check if an endpoint is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.endpoints.contains_key(key)
    }

    /// Select the default endpoint.
    pub fn set_default(&mut self, key: &str) -> Result<(), Error> {
        if !self.endpoints.contains_key(key) {
            return Err(Error::invalid_argument(format!(
                "cannot make unknown endpoint '{}' the default",
                key
            )));
        }
        self.default_key = Some(key.to_string());
        Ok(())
    }

    /// Get the default endpoint.
    pub fn default_endpoint(&self) -> Result<&Arc<Endpoint>, Error> {
        let key = self
            .default_key
            .as_deref()
            .ok_or_else(|| Error::configuration("no endpoints are configured"))?;
        self.get(key)
    }

    /// Iterate the registered keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_and_core_uris() {
        let endpoint = Endpoint::new("local")
            .with_host("search.internal")
            .with_port(8080)
            .with_core("products");

        assert_eq!(
            endpoint.server_uri().unwrap().as_str(),
            "http://search.internal:8080/solr/"
        );
        assert_eq!(
            endpoint.core_uri().unwrap().as_str(),
            "http://search.internal:8080/solr/products/"
        );
    }

    #[test]
    fn custom_path_and_empty_context() {
        let endpoint = Endpoint::new("proxy")
            .with_path("search/v1")
            .with_context("")
            .with_core("docs");

        assert_eq!(
            endpoint.server_uri().unwrap().as_str(),
            "http://127.0.0.1:8983/search/v1/"
        );
        assert_eq!(
            endpoint.core_uri().unwrap().as_str(),
            "http://127.0.0.1:8983/search/v1/docs/"
        );
    }

    #[test]
    fn core_uri_without_core_is_a_configuration_error() {
        let endpoint = Endpoint::new("bare");
        let err = endpoint.core_uri().unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("bare"));
    }

    #[test]
    fn deserialize_with_defaults() {
        let endpoint: Endpoint =
            serde_json::from_str(r#"{"key": "a", "core": "books", "timeout_ms": 1500}"#).unwrap();
        assert_eq!(endpoint.host(), "127.0.0.1");
        assert_eq!(endpoint.port(), 8983);
        assert_eq!(endpoint.core(), Some("books"));
        assert_eq!(endpoint.timeout(), Some(Duration::from_millis(1500)));
        assert!(endpoint.credentials().is_none());
    }

    #[test]
    fn deserialized_path_and_context_are_normalized() {
        let endpoint: Endpoint = serde_json::from_str(
            r#"{"key": "a", "path": "search", "context": "/solr/", "core": "books"}"#,
        )
        .unwrap();
        assert_eq!(endpoint.path(), "/search/");
        assert_eq!(endpoint.context(), "solr");
        assert_eq!(
            endpoint.core_uri().unwrap().as_str(),
            "http://127.0.0.1:8983/search/solr/books/"
        );
    }

    #[test]
    fn registry_first_endpoint_is_default() {
        let mut registry = EndpointRegistry::new();
        registry.add(Endpoint::new("a")).unwrap();
        registry.add(Endpoint::new("b")).unwrap();
        assert_eq!(registry.default_endpoint().unwrap().key(), "a");

        registry.set_default("b").unwrap();
        assert_eq!(registry.default_endpoint().unwrap().key(), "b");
    }

    #[test]
    fn registry_rejects_duplicates() {
        let mut registry = EndpointRegistry::new();
        registry.add(Endpoint::new("a")).unwrap();
        let err = registry.add(Endpoint::new("a")).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn removing_default_promotes_next() {
        let mut registry = EndpointRegistry::new();
        registry.add(Endpoint::new("a")).unwrap();
        registry.add(Endpoint::new("b")).unwrap();
        registry.remove("a").unwrap();
        assert_eq!(registry.default_endpoint().unwrap().key(), "b");
        assert_eq!(registry.len(), 1);
        assert!(registry.remove("zzz").is_err());
    }

    #[test]
    fn empty_registry_has_no_default() {
        let registry = EndpointRegistry::new();
        assert!(matches!(
            registry.default_endpoint(),
            Err(Error::Configuration { .. })
        ));
    }
}
