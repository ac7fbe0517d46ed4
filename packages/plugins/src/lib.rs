//! Plugins for the sift client.
//!
//! - [`LoadBalancer`]: weighted endpoint selection with failover, installed
//!   as the client's dispatcher
//! - [`BufferedUpdate`]: batches update operations into single requests
//! - [`WeightedChoice`]: the cumulative-weight table behind the balancer

mod buffered;
mod loadbalancer;
mod weighted;

pub use buffered::{BufferedOperation, BufferedUpdate, PreCommit, PreFlush, DEFAULT_BUFFER_SIZE};
pub use loadbalancer::{EndpointFailure, FailureReason, LoadBalancer, LoadBalancerConfig};
pub use weighted::WeightedChoice;
