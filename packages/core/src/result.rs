//! Lazily parsed results.
//!
//! A [`QueryResult`] pairs an executed query with the response it produced.
//! Nothing is parsed until the first data accessor is called; the parsed
//! [`ResultData`] is cached, so repeated access is cheap.

use std::fmt;
use std::sync::{Arc, OnceLock};

use serde_json::Value;

use crate::component::{ComponentParser, ComponentResult, ComponentType};
use crate::document::Document;
use crate::query::{Query, ResponseParser};
use crate::types::Response;
use crate::Error;

/// The `responseHeader` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub status: i64,
    pub query_time: i64,
}

impl ResponseHeader {
    fn from_value(header: &Value) -> Result<Self, Error> {
        let status = header
            .get("status")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::missing_key("responseHeader.status"))?;
        let query_time = header
            .get("QTime")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::missing_key("responseHeader.QTime"))?;
        Ok(Self { status, query_time })
    }
}

/// Main result list of a select query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectData {
    /// `None` for grouped responses that carry no main result list.
    pub num_found: Option<u64>,
    pub start: u64,
    pub max_score: Option<f64>,
    pub documents: Vec<Document>,
}

/// Query-specific payload of a parsed response.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    Select(SelectData),
    Update,
    Ping { status: String },
    /// Payload of a custom query kind.
    Raw(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultData {
    pub header: Option<ResponseHeader>,
    pub data: QueryData,
    /// Component results in attachment order.
    pub components: Vec<(ComponentType, ComponentResult)>,
}

impl ResultData {
    pub fn component(&self, kind: ComponentType) -> Option<&ComponentResult> {
        self.components
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, result)| result)
    }
}

/// Result of executing one query.
pub struct QueryResult {
    query: Arc<dyn Query>,
    response: Response,
    endpoint: String,
    parser: Arc<dyn ResponseParser>,
    component_parsers: Vec<Arc<dyn ComponentParser>>,
    parsed: OnceLock<ResultData>,
}

impl QueryResult {
    /// Only the execution core creates results, from the response to the
    /// result's own query. `component_parsers` line up with
    /// `query.components()`.
    pub(crate) fn new(
        query: Arc<dyn Query>,
        response: Response,
        endpoint: String,
        parser: Arc<dyn ResponseParser>,
        component_parsers: Vec<Arc<dyn ComponentParser>>,
    ) -> Self {
        Self {
            query,
            response,
            endpoint,
            parser,
            component_parsers,
            parsed: OnceLock::new(),
        }
    }

    pub fn query(&self) -> &Arc<dyn Query> {
        &self.query
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Key of the endpoint that produced the response.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether the response has been parsed yet.
    pub fn is_parsed(&self) -> bool {
        self.parsed.get().is_some()
    }

    /// The parsed data, parsing on first access.
    ///
    /// Parse failures are not cached; a later call parses again.
    pub fn data(&self) -> Result<&ResultData, Error> {
        if let Some(data) = self.parsed.get() {
            return Ok(data);
        }
        let data = self.parse()?;
        Ok(self.parsed.get_or_init(|| data))
    }

    pub fn header(&self) -> Result<Option<ResponseHeader>, Error> {
        Ok(self.data()?.header)
    }

    pub fn status(&self) -> Result<Option<i64>, Error> {
        Ok(self.data()?.header.map(|h| h.status))
    }

    pub fn query_time(&self) -> Result<Option<i64>, Error> {
        Ok(self.data()?.header.map(|h| h.query_time))
    }

    /// Documents of a select result; empty for other query kinds.
    pub fn documents(&self) -> Result<&[Document], Error> {
        Ok(match &self.data()?.data {
            QueryData::Select(select) => select.documents.as_slice(),
            _ => &[],
        })
    }

    pub fn num_found(&self) -> Result<Option<u64>, Error> {
        Ok(match &self.data()?.data {
            QueryData::Select(select) => select.num_found,
            _ => None,
        })
    }

    pub fn component(&self, kind: ComponentType) -> Result<Option<&ComponentResult>, Error> {
        Ok(self.data()?.component(kind))
    }

    fn parse(&self) -> Result<ResultData, Error> {
        let body = &self.response.body;
        if !body.is_object() {
            return Err(Error::parse("response body is not a JSON object"));
        }

        let header = match body.get("responseHeader") {
            Some(header) => Some(ResponseHeader::from_value(header)?),
            None if self.query.omits_header() => None,
            None => return Err(Error::missing_key("responseHeader")),
        };

        let data = self.parser.parse(&*self.query, &self.response)?;

        let mut components = Vec::with_capacity(self.component_parsers.len());
        for (component, parser) in self
            .query
            .components()
            .iter()
            .zip(&self.component_parsers)
        {
            let parsed = parser.parse(&*self.query, component, body)?;
            components.push((component.component_type(), parsed));
        }

        Ok(ResultData {
            header,
            data,
            components,
        })
    }
}

impl fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryResult")
            .field("query", &self.query)
            .field("endpoint", &self.endpoint)
            .field("status", &self.response.status)
            .field("parsed", &self.parsed.get().is_some())
            .finish()
    }
}
