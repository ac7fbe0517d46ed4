//! Sift core: the request/response pipeline of a search-server client.
//!
//! - `Endpoint`: addressable server/core with its own timeout and credentials
//! - `Query`/`Component`: typed query descriptions and their optional parts
//! - `HandlerRegistry`: maps query and component type tags to builders/parsers
//! - `Client`: builds, sends and wraps requests in lazily parsed results
//! - `Adapter`: the transport seam; the core never performs I/O itself
//!
//! # Example
//!
//! ```rust
//! use sift_core::{Client, Error, QueryResult, SelectQuery};
//!
//! fn first_page(client: &Client) -> Result<QueryResult, Error> {
//!     client.select(SelectQuery::new().with_query("title:rust").with_rows(20))
//! }
//! ```

pub mod adapter;
mod client;
pub mod component;
mod config;
mod document;
mod endpoint;
mod error;
mod parallel;
pub mod query;
mod registry;
mod result;
mod types;

pub use adapter::Adapter;
pub use client::{Client, DispatchContext, Dispatcher};
pub use component::{Component, ComponentBuilder, ComponentParser, ComponentResult, ComponentType};
pub use config::ClientConfig;
pub use document::Document;
pub use endpoint::{Credentials, Endpoint, EndpointRegistry};
pub use error::{Error, ErrorKind};
pub use parallel::ParallelExecution;
pub use query::{
    PingQuery, Query, QueryType, RequestBuilder, ResponseParser, SelectQuery, UpdateCommand,
    UpdateQuery,
};
pub use registry::{ComponentHandlers, HandlerRegistry, QueryHandlers};
pub use result::{QueryData, QueryResult, ResponseHeader, ResultData, SelectData};
pub use types::{Method, Params, Request, Response};

#[cfg(any(test, feature = "test-utils"))]
pub use adapter::mock;
