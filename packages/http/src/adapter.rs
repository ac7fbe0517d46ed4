//! Blocking HTTP transport built on reqwest.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, trace};

use sift_core::{Adapter, Endpoint, Error, Request, Response};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Production adapter using a blocking reqwest client.
///
/// The client-wide timeout applies unless the endpoint carries its own.
/// Credentials on the endpoint are sent as basic auth.
#[derive(Debug, Clone)]
pub struct ReqwestAdapter {
    client: Client,
    timeout: Duration,
}

impl ReqwestAdapter {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| Error::transport(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Create with a 30 second timeout and a 10 second connect timeout.
    pub fn with_default_timeout() -> Result<Self, Error> {
        Self::new(DEFAULT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "request failed"
    };
    Error::Transport {
        message: format!("{}: {}", kind, err),
        status: err.status().map(|s| s.as_u16()),
        body: None,
    }
}

impl Adapter for ReqwestAdapter {
    fn send(&self, request: &Request, endpoint: &Endpoint) -> Result<Response, Error> {
        let url = request.uri(endpoint)?;
        let method: http::Method = request.method.into();

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let header_name = HeaderName::try_from(name.as_str())
                .map_err(|e| Error::invalid_argument(e.to_string()))?;
            let header_value = HeaderValue::try_from(value.as_str())
                .map_err(|e| Error::invalid_argument(e.to_string()))?;
            headers.insert(header_name, header_value);
        }

        trace!(endpoint = endpoint.key(), %url, "sending request");
        let mut req_builder = self.client.request(method, url).headers(headers);

        if let Some(timeout) = endpoint.timeout() {
            req_builder = req_builder.timeout(timeout);
        }
        if let Some(credentials) = endpoint.credentials() {
            req_builder =
                req_builder.basic_auth(&credentials.username, Some(&credentials.password));
        }
        if let Some(body) = &request.body {
            req_builder = req_builder.body(body.clone());
        }

        let response = req_builder.send().map_err(transport_error)?;

        let status = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or("Unknown")
            .to_string();

        let mut resp_headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                resp_headers.insert(name.to_string(), v.to_string());
            }
        }

        let body_text = response.text().map_err(transport_error)?;
        debug!(endpoint = endpoint.key(), status, "received response");

        let mut response = Response::new(status, status_text, body_text);
        response.headers = resp_headers;
        Ok(response)
    }

    /// Sends every request on its own thread and waits for all of them.
    fn send_batch(&self, batch: &[(&Request, &Endpoint)]) -> Vec<Result<Response, Error>> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = batch
                .iter()
                .map(|(request, endpoint)| scope.spawn(move || self.send(request, endpoint)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(Error::transport("request thread panicked")))
                })
                .collect()
        })
    }
}
