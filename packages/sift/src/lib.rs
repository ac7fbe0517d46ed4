//! Sift: a search-server client.
//!
//! Queries are described by typed values, turned into requests by
//! registered builders, sent through a transport adapter and parsed lazily.
//! Plugins add weighted load balancing with failover and buffered updates.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use sift::http::ReqwestAdapter;
//! use sift::plugins::{LoadBalancer, LoadBalancerConfig};
//! use sift::{Client, Endpoint, SelectQuery};
//!
//! fn main() -> Result<(), sift::Error> {
//!     let mut client = Client::new(ReqwestAdapter::with_default_timeout()?);
//!     client.add_endpoint(Endpoint::new("primary").with_host("search-1").with_core("books"))?;
//!     client.add_endpoint(Endpoint::new("replica").with_host("search-2").with_core("books"))?;
//!
//!     let balancer = LoadBalancer::new(
//!         LoadBalancerConfig::default()
//!             .with_weight("primary", 3)
//!             .with_weight("replica", 1),
//!     )?
//!     .install(&mut client)?;
//!
//!     let result = client.select(SelectQuery::new().with_query("title:rust"))?;
//!     println!("{:?} hits from {:?}", result.num_found()?, balancer.last_endpoint());
//!     let _shared = Arc::new(client);
//!     Ok(())
//! }
//! ```

pub use sift_core::*;

/// Load balancing, buffered updates and weighted choice.
pub mod plugins {
    pub use sift_plugins::*;
}

/// The reqwest transport.
#[cfg(feature = "http")]
pub mod http {
    pub use sift_http::*;
}
