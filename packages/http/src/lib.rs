//! HTTP transport for sift.
//!
//! [`ReqwestAdapter`] implements the core `Adapter` contract with a blocking
//! reqwest client. It must not be used from inside an async runtime thread;
//! wrap calls in `spawn_blocking` there.

mod adapter;

pub use adapter::{ReqwestAdapter, DEFAULT_CONNECT_TIMEOUT, DEFAULT_TIMEOUT};
