//! Error taxonomy for the request/response pipeline.

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Unknown query/component type, invalid weight, invalid option value.
    Configuration,
    /// Connection refused, DNS failure, timeout.
    Transport,
    /// A non-2xx response was received.
    Http,
    /// The response did not have the expected structure.
    Parse,
    /// Every candidate endpoint failed.
    Exhausted,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("configuration error: {message}")]
    Configuration { message: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("transport error: {message}")]
    Transport {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },

    #[error("HTTP {status} {status_text}")]
    Http {
        status: u16,
        status_text: String,
        body: String,
    },

    #[error("parse error: {message}")]
    Parse { message: String },

    #[error("no endpoint left to try after {attempts} attempt(s): {last_error}")]
    Exhausted { attempts: usize, last_error: String },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Error::Transport {
            message: message.into(),
            status: None,
            body: None,
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse {
            message: message.into(),
        }
    }

    /// Parse error for a key the response was expected to contain.
    pub fn missing_key(key: &str) -> Self {
        Error::Parse {
            message: format!("response is missing the '{}' key", key),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Configuration { .. } | Error::InvalidArgument { .. } | Error::UrlParse(_) => {
                ErrorKind::Configuration
            }
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Http { .. } => ErrorKind::Http,
            Error::Parse { .. } | Error::Json(_) => ErrorKind::Parse,
            Error::Exhausted { .. } => ErrorKind::Exhausted,
        }
    }

    /// Whether a load balancer may fail over to another endpoint.
    ///
    /// HTTP errors are never retryable here; status-code failover is a
    /// load balancer policy applied to the raw response.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }

    /// Status code carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Transport { status, .. } => *status,
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
