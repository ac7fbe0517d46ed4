use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

use crate::{Endpoint, Error};

/// HTTP method for requests
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    DELETE,
    HEAD,
}

impl From<Method> for http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => http::Method::GET,
            Method::POST => http::Method::POST,
            Method::PUT => http::Method::PUT,
            Method::DELETE => http::Method::DELETE,
            Method::HEAD => http::Method::HEAD,
        }
    }
}

impl TryFrom<http::Method> for Method {
    type Error = Error;

    fn try_from(method: http::Method) -> Result<Self, Error> {
        match method {
            http::Method::GET => Ok(Method::GET),
            http::Method::POST => Ok(Method::POST),
            http::Method::PUT => Ok(Method::PUT),
            http::Method::DELETE => Ok(Method::DELETE),
            http::Method::HEAD => Ok(Method::HEAD),
            other => Err(Error::invalid_argument(format!(
                "unsupported HTTP method {}",
                other
            ))),
        }
    }
}

/// Ordered multi-map of query parameters.
///
/// Keys may repeat (`fq`, `facet.field`); iteration yields pairs in the
/// order they were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value, keeping any existing values for the key.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Replace every value for the key with a single one.
    ///
    /// The pair takes the position of the first existing value, or is
    /// appended when the key is new.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter().position(|(k, _)| *k == key) {
            Some(first) => {
                self.0[first].1 = value;
                let mut index = 0;
                self.0.retain(|(k, _)| {
                    let keep = index <= first || *k != key;
                    index += 1;
                    keep
                });
            }
            None => self.0.push((key, value)),
        }
    }

    /// First value for the key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for the key, in insertion order.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Remove every value for the key.
    pub fn remove(&mut self, key: &str) {
        self.0.retain(|(k, _)| k != key);
    }

    /// Check if the key has at least one value.
    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    /// Append every pair of `other`.
    pub fn extend(&mut self, other: &Params) {
        self.0.extend(other.0.iter().cloned());
    }

    /// Iterate pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Position of the first pair with this key, used to check ordering.
    pub fn position(&self, key: &str) -> Option<usize> {
        self.0.iter().position(|(k, _)| k == key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// URL-encoded query string (without a leading `?`).
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }
}

/// A protocol-level request, built by a request builder.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Request {
    #[serde(default)]
    pub method: Method,

    /// Handler path relative to the core (or server) URI, e.g. `select`.
    #[serde(default)]
    pub handler: String,

    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Raw request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,

    /// Whether the handler lives under the server URI instead of a core.
    #[serde(default)]
    pub is_server_request: bool,
}

impl Request {
    /// Create a GET request for a handler.
    pub fn get(handler: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            handler: handler.into(),
            ..Default::default()
        }
    }

    /// Create a POST request for a handler.
    pub fn post(handler: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            handler: handler.into(),
            ..Default::default()
        }
    }

    /// Append a query parameter.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.add(name, value);
        self
    }

    /// Set a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body and its content type.
    pub fn with_body(mut self, body: impl Into<String>, content_type: &str) -> Self {
        self.body = Some(body.into());
        self.headers
            .insert("Content-Type".to_string(), content_type.to_string());
        self
    }

    /// Set a JSON body.
    pub fn with_json_body(self, body: &serde_json::Value) -> Self {
        self.with_body(body.to_string(), "application/json")
    }

    /// Address the server rather than the core.
    pub fn server_request(mut self) -> Self {
        self.is_server_request = true;
        self
    }

    /// Full URI of this request against an endpoint.
    pub fn uri(&self, endpoint: &Endpoint) -> Result<Url, Error> {
        let base = if self.is_server_request {
            endpoint.server_uri()?
        } else {
            endpoint.core_uri()?
        };
        let mut url = base.join(self.handler.trim_start_matches('/'))?;
        if !self.params.is_empty() {
            url.set_query(Some(&self.params.to_query_string()));
        }
        Ok(url)
    }
}

/// Response received from an adapter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,

    /// Status text (e.g., "OK", "Not Found")
    pub status_text: String,

    /// Response headers
    pub headers: HashMap<String, String>,

    /// Response body as JSON value
    /// Will be null if body was empty or not valid JSON
    pub body: serde_json::Value,

    /// Raw body as string
    #[serde(default)]
    pub body_text: String,
}

impl Response {
    /// Build a response from a raw body, decoding JSON when possible.
    pub fn new(status: u16, status_text: impl Into<String>, body_text: impl Into<String>) -> Self {
        let body_text = body_text.into();
        let body = serde_json::from_str(&body_text).unwrap_or(serde_json::Value::Null);
        Self {
            status,
            status_text: status_text.into(),
            headers: HashMap::new(),
            body,
            body_text,
        }
    }

    /// A 200 response carrying the given JSON document.
    pub fn json(body: serde_json::Value) -> Self {
        Self {
            status: 200,
            status_text: "OK".to_string(),
            headers: HashMap::new(),
            body_text: body.to_string(),
            body,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Check if the response status indicates success (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if the response status indicates a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if the response status indicates a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Turn a non-2xx response into an HTTP error.
    pub fn error_for_status(self) -> Result<Self, Error> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::Http {
                status: self.status,
                status_text: self.status_text,
                body: self.body_text,
            })
        }
    }
}
