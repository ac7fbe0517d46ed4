//! Transport adapter contract.
//!
//! The pipeline never performs I/O itself. An [`Adapter`] turns a
//! [`Request`] aimed at an [`Endpoint`] into a [`Response`], failing with
//! [`Error::Transport`] when no response could be obtained.

use crate::types::{Request, Response};
use crate::{Endpoint, Error};

/// Trait for sending requests to an endpoint.
///
/// Implementations can use real HTTP clients or mock responses for testing.
/// A non-2xx status is still a successful send; only failures to obtain a
/// response at all are errors.
pub trait Adapter: Send + Sync {
    fn send(&self, request: &Request, endpoint: &Endpoint) -> Result<Response, Error>;

    /// Send several requests and return one outcome per request, in order.
    ///
    /// The default sends sequentially. Adapters with their own concurrency
    /// primitives should override this; every outcome must be reported
    /// before returning.
    fn send_batch(&self, batch: &[(&Request, &Endpoint)]) -> Vec<Result<Response, Error>> {
        batch
            .iter()
            .map(|(request, endpoint)| self.send(request, endpoint))
            .collect()
    }
}

/// Mock adapter for testing.
///
/// Returns predefined responses keyed by endpoint, and can simulate
/// unreachable endpoints.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};

    type Responder = dyn Fn(&Request, &Endpoint) -> Response + Send + Sync;

    /// A mock adapter that returns predefined responses.
    #[derive(Clone, Default)]
    pub struct MockAdapter {
        /// Responses keyed by endpoint key.
        responses: Arc<Mutex<HashMap<String, Response>>>,
        /// Response used when no endpoint-specific one exists.
        default_response: Arc<Mutex<Option<Response>>>,
        /// Computes a response from the request, overriding canned ones.
        responder: Arc<Mutex<Option<Arc<Responder>>>>,
        /// Endpoints that fail with a transport error.
        unreachable: Arc<Mutex<HashSet<String>>>,
        /// Recorded (endpoint key, request) pairs.
        recorded: Arc<Mutex<Vec<(String, Request)>>>,
    }

    impl MockAdapter {
        pub fn new() -> Self {
            Self::default()
        }

        /// Respond with `response` for requests sent to `endpoint`.
        pub fn with_response(self, endpoint: impl Into<String>, response: Response) -> Self {
            self.responses
                .lock()
                .unwrap()
                .insert(endpoint.into(), response);
            self
        }

        pub fn with_default_response(self, response: Response) -> Self {
            *self.default_response.lock().unwrap() = Some(response);
            self
        }

        /// Compute responses from the request (e.g. to echo parameters).
        pub fn with_responder(
            self,
            responder: impl Fn(&Request, &Endpoint) -> Response + Send + Sync + 'static,
        ) -> Self {
            *self.responder.lock().unwrap() = Some(Arc::new(responder));
            self
        }

        /// Fail every request to `endpoint` with a transport error.
        pub fn unreachable(self, endpoint: impl Into<String>) -> Self {
            self.unreachable.lock().unwrap().insert(endpoint.into());
            self
        }

        pub fn recorded_requests(&self) -> Vec<Request> {
            self.recorded
                .lock()
                .unwrap()
                .iter()
                .map(|(_, r)| r.clone())
                .collect()
        }

        /// Endpoint keys in the order requests were sent to them.
        pub fn recorded_endpoints(&self) -> Vec<String> {
            self.recorded
                .lock()
                .unwrap()
                .iter()
                .map(|(e, _)| e.clone())
                .collect()
        }

        pub fn request_count(&self) -> usize {
            self.recorded.lock().unwrap().len()
        }

        pub fn clear_recorded(&self) {
            self.recorded.lock().unwrap().clear();
        }

        /// A minimal successful search response.
        pub fn ok_response() -> Response {
            Response::json(serde_json::json!({
                "responseHeader": {"status": 0, "QTime": 1}
            }))
        }

        pub fn error_response(status: u16, message: &str) -> Response {
            let body = serde_json::json!({
                "responseHeader": {"status": status, "QTime": 0},
                "error": {"msg": message, "code": status}
            });
            Response {
                status,
                status_text: message.to_string(),
                headers: HashMap::new(),
                body_text: body.to_string(),
                body,
            }
        }
    }

    impl Adapter for MockAdapter {
        fn send(&self, request: &Request, endpoint: &Endpoint) -> Result<Response, Error> {
            self.recorded
                .lock()
                .unwrap()
                .push((endpoint.key().to_string(), request.clone()));

            if self.unreachable.lock().unwrap().contains(endpoint.key()) {
                return Err(Error::transport(format!(
                    "connection refused: {}",
                    endpoint.key()
                )));
            }

            if let Some(responder) = self.responder.lock().unwrap().clone() {
                return Ok(responder(request, endpoint));
            }

            if let Some(response) = self.responses.lock().unwrap().get(endpoint.key()) {
                return Ok(response.clone());
            }

            if let Some(ref response) = *self.default_response.lock().unwrap() {
                return Ok(response.clone());
            }

            Ok(Self::error_response(404, "Not Found"))
        }
    }
}
