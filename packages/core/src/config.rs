//! Serializable client configuration.

use serde::{Deserialize, Serialize};

use crate::endpoint::{Endpoint, EndpointRegistry};
use crate::Error;

/// Endpoint configuration for a [`crate::Client`].
///
/// ```json
/// {
///   "endpoints": [
///     {"key": "primary", "host": "search-1", "core": "products"},
///     {"key": "replica", "host": "search-2", "core": "products", "timeout_ms": 2000}
///   ],
///   "default_endpoint": "primary"
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_endpoint: Option<String>,
}

impl ClientConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build the endpoint registry, validating every endpoint.
    pub fn into_registry(self) -> Result<EndpointRegistry, Error> {
        if self.endpoints.is_empty() {
            return Err(Error::invalid_argument(
                "configuration must contain at least one endpoint",
            ));
        }
        let mut registry = EndpointRegistry::new();
        for endpoint in self.endpoints {
            registry.add(endpoint)?;
        }
        if let Some(key) = self.default_endpoint {
            registry.set_default(&key)?;
        }
        Ok(registry)
    }
}
