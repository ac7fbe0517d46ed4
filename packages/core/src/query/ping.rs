use std::any::Any;

use serde_json::Value;

use super::{Query, QueryType, RequestBuilder, ResponseParser};
use crate::result::QueryData;
use crate::types::{Request, Response};
use crate::Error;

/// Health check against the ping handler of a core.
#[derive(Debug, Clone)]
pub struct PingQuery {
    handler: String,
}

impl Default for PingQuery {
    fn default() -> Self {
        Self {
            handler: "admin/ping".to_string(),
        }
    }
}

impl PingQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = handler.into();
        self
    }
}

impl Query for PingQuery {
    fn query_type(&self) -> QueryType {
        QueryType::Ping
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct PingRequestBuilder;

impl RequestBuilder for PingRequestBuilder {
    fn build(&self, query: &dyn Query) -> Result<Request, Error> {
        let ping = super::downcast::<PingQuery>(query)?;
        Ok(Request::get(ping.handler.as_str()).with_param("wt", "json"))
    }
}

pub struct PingResponseParser;

impl ResponseParser for PingResponseParser {
    fn parse(&self, _query: &dyn Query, response: &Response) -> Result<QueryData, Error> {
        let status = response
            .body
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::missing_key("status"))?;
        Ok(QueryData::Ping {
            status: status.to_string(),
        })
    }
}
