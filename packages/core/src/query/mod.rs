//! Query kinds and their request builder / response parser contracts.
//!
//! A query only describes intent. Turning it into a [`Request`] and its
//! [`Response`] back into result data is the job of the builder/parser
//! pair registered for its [`QueryType`] (see [`crate::HandlerRegistry`]).

use std::any::Any;
use std::fmt;

use crate::component::{ComponentSet, NO_COMPONENTS};
use crate::result::QueryData;
use crate::types::{Request, Response};
use crate::Error;

pub mod ping;
pub mod select;
pub mod update;

pub use ping::{PingQuery, PingRequestBuilder, PingResponseParser};
pub use select::{
    FilterQuery, SelectQuery, SelectRequestBuilder, SelectResponseParser, SortOrder,
};
pub use update::{UpdateCommand, UpdateQuery, UpdateRequestBuilder, UpdateResponseParser};

/// Tag identifying a query kind in the handler registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryType {
    Select,
    Update,
    Ping,
    /// A query kind registered by the application.
    Custom(&'static str),
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryType::Select => write!(f, "select"),
            QueryType::Update => write!(f, "update"),
            QueryType::Ping => write!(f, "ping"),
            QueryType::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Describes what to ask the search service.
///
/// Queries are immutable while executing and may be reused across
/// executions, so the client shares them as `Arc<dyn Query>`.
pub trait Query: Any + Send + Sync + fmt::Debug {
    fn query_type(&self) -> QueryType;

    /// Components attached to this query, in attachment order.
    fn components(&self) -> &ComponentSet {
        &NO_COMPONENTS
    }

    /// Whether the request asks the service to leave out `responseHeader`.
    fn omits_header(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;
}

/// Builds the request for one query kind.
pub trait RequestBuilder: Send + Sync {
    fn build(&self, query: &dyn Query) -> Result<Request, Error>;
}

/// Parses the response for one query kind.
///
/// Only the query-specific payload is produced here; the response header
/// and component sub-results are handled by the pipeline.
pub trait ResponseParser: Send + Sync {
    fn parse(&self, query: &dyn Query, response: &Response) -> Result<QueryData, Error>;
}

/// Downcast a query to the concrete type a builder or parser expects.
pub fn downcast<T: Query>(query: &dyn Query) -> Result<&T, Error> {
    query.as_any().downcast_ref::<T>().ok_or_else(|| {
        Error::configuration(format!(
            "handler for {} cannot process a {} query",
            std::any::type_name::<T>(),
            query.query_type()
        ))
    })
}

/// Prefix a value with local params, e.g. `{!key=k ex=a,b}field`.
///
/// Params with empty values are skipped; without any params the value is
/// returned unchanged.
pub(crate) fn local_params(value: &str, params: &[(&str, String)]) -> String {
    let rendered: Vec<String> = params
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    if rendered.is_empty() {
        value.to_string()
    } else {
        format!("{{!{}}}{}", rendered.join(" "), value)
    }
}
