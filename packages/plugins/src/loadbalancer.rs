//! Weighted load balancing with failover.
//!
//! The balancer installs itself as the client's [`Dispatcher`]. Each
//! execution selects an endpoint by weight, sends the request and, on a
//! retryable failure, excludes that endpoint and selects again:
//!
//! ```text
//! SELECTING -> EXECUTING -> SUCCESS
//!                        -> RETRYABLE_FAILURE -> SELECTING (endpoint excluded)
//!                        -> EXHAUSTED
//! ```
//!
//! Transport errors are always retryable. Responses with a status listed in
//! `failover_status_codes` are retryable too; any other response goes back to
//! the client, which turns a non-2xx status into an HTTP error.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use sift_core::{
    Client, DispatchContext, Dispatcher, Endpoint, Error, Query, QueryType, Request, Response,
};

use crate::weighted::WeightedChoice;

/// Rejected draws tolerated before selecting from a table of the remaining
/// endpoints instead.
const MAX_REJECTED_DRAWS: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// Endpoint key to relative weight.
    pub weights: BTreeMap<String, i64>,
    /// Retry on another endpoint after a retryable failure.
    pub failover: bool,
    /// Failover attempts after the first one.
    pub max_retries: usize,
    /// Response statuses that trigger failover like a transport error.
    pub failover_status_codes: Vec<u16>,
    /// Keep using the selected endpoint until it fails.
    pub sticky: bool,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            weights: BTreeMap::new(),
            failover: true,
            max_retries: 3,
            failover_status_codes: Vec::new(),
            sticky: false,
        }
    }
}

impl LoadBalancerConfig {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_weight(mut self, endpoint: impl Into<String>, weight: i64) -> Self {
        self.weights.insert(endpoint.into(), weight);
        self
    }

    pub fn with_failover(mut self, failover: bool) -> Self {
        self.failover = failover;
        self
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_failover_status(mut self, status: u16) -> Self {
        self.failover_status_codes.push(status);
        self
    }

    pub fn with_sticky(mut self, sticky: bool) -> Self {
        self.sticky = sticky;
        self
    }
}

/// Why an endpoint was given up on.
#[derive(Debug)]
pub enum FailureReason<'a> {
    Transport(&'a Error),
    Status(&'a Response),
}

/// Emitted every time an endpoint fails with a retryable error.
#[derive(Debug)]
pub struct EndpointFailure<'a> {
    pub endpoint: &'a Endpoint,
    /// 1-based attempt number within the execution.
    pub attempt: usize,
    pub reason: FailureReason<'a>,
}

type FailureListener = dyn Fn(&EndpointFailure<'_>) + Send + Sync;

pub struct LoadBalancer {
    config: LoadBalancerConfig,
    choice: WeightedChoice<String>,
    blocked: HashSet<QueryType>,
    rng: Mutex<StdRng>,
    pinned: Mutex<Option<String>>,
    forced: Mutex<Option<String>>,
    last_endpoint: Mutex<Option<String>>,
    listeners: Mutex<Vec<Arc<FailureListener>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LoadBalancer {
    pub fn new(config: LoadBalancerConfig) -> Result<Self, Error> {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// A balancer with a deterministic random source.
    pub fn with_seed(config: LoadBalancerConfig, seed: u64) -> Result<Self, Error> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    pub fn with_rng(config: LoadBalancerConfig, rng: StdRng) -> Result<Self, Error> {
        let choice = WeightedChoice::new(
            config
                .weights
                .iter()
                .map(|(key, weight)| (key.clone(), *weight)),
        )?;
        Ok(Self {
            config,
            choice,
            blocked: HashSet::from([QueryType::Update]),
            rng: Mutex::new(rng),
            pinned: Mutex::new(None),
            forced: Mutex::new(None),
            last_endpoint: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Check that every weighted endpoint exists and route the client's
    /// executions through this balancer.
    pub fn install(self, client: &mut Client) -> Result<Arc<Self>, Error> {
        for key in self.choice.keys() {
            if !client.endpoints().contains(key) {
                return Err(Error::configuration(format!(
                    "load balancer weight refers to unknown endpoint '{}'",
                    key
                )));
            }
        }
        let balancer = Arc::new(self);
        client.set_dispatcher(Arc::clone(&balancer) as Arc<dyn Dispatcher>);
        Ok(balancer)
    }

    pub fn config(&self) -> &LoadBalancerConfig {
        &self.config
    }

    /// Send queries of this type to the default endpoint without balancing.
    pub fn block_query_type(&mut self, kind: QueryType) {
        self.blocked.insert(kind);
    }

    /// Let queries of this type be balanced again.
    pub fn unblock_query_type(&mut self, kind: QueryType) {
        self.blocked.remove(&kind);
    }

    /// Check if a query type bypasses balancing.
    pub fn is_blocked(&self, kind: QueryType) -> bool {
        self.blocked.contains(&kind)
    }

    /// Send the next balanced execution to `key`, without failover.
    pub fn force_endpoint(&self, key: impl Into<String>) {
        *lock(&self.forced) = Some(key.into());
    }

    /// Endpoint that served the most recent execution.
    pub fn last_endpoint(&self) -> Option<String> {
        lock(&self.last_endpoint).clone()
    }

    /// Endpoint currently pinned by sticky selection.
    pub fn pinned_endpoint(&self) -> Option<String> {
        lock(&self.pinned).clone()
    }

    /// Register a listener called for every failed balanced attempt.
    pub fn on_endpoint_failure(
        &self,
        listener: impl Fn(&EndpointFailure<'_>) + Send + Sync + 'static,
    ) {
        lock(&self.listeners).push(Arc::new(listener));
    }

    /// Pick a non-excluded endpoint key, or `None` when none is left.
    pub fn select(&self, excluded: &BTreeSet<String>) -> Option<String> {
        if self.config.sticky {
            if let Some(pinned) = lock(&self.pinned).as_ref() {
                if !excluded.contains(pinned) {
                    return Some(pinned.clone());
                }
            }
        }

        let remaining = self.choice.keys().filter(|k| !excluded.contains(*k)).count();
        if remaining == 0 {
            return None;
        }

        let mut rng = lock(&self.rng);
        for _ in 0..MAX_REJECTED_DRAWS {
            let key = self.choice.choose(&mut *rng);
            if !excluded.contains(key) {
                return Some(key.clone());
            }
        }

        let rest = self.choice.retain(|k| !excluded.contains(k)).ok()?;
        Some(rest.choose(&mut *rng).clone())
    }

    fn served(&self, endpoint: &Endpoint) {
        debug!(endpoint = endpoint.key(), "load balancer served request");
        *lock(&self.last_endpoint) = Some(endpoint.key().to_string());
    }

    fn emit(&self, failure: &EndpointFailure<'_>) {
        let listeners: Vec<_> = lock(&self.listeners).iter().cloned().collect();
        for listener in listeners {
            listener(failure);
        }
    }

    fn send_to(
        &self,
        endpoint: Arc<Endpoint>,
        request: &Request,
        context: &DispatchContext<'_>,
    ) -> Result<(Arc<Endpoint>, Response), Error> {
        let response = context.send(request, &endpoint)?;
        self.served(&endpoint);
        Ok((endpoint, response))
    }
}

impl Dispatcher for LoadBalancer {
    fn dispatch(
        &self,
        query: &dyn Query,
        request: &Request,
        context: &DispatchContext<'_>,
    ) -> Result<(Arc<Endpoint>, Response), Error> {
        if self.is_blocked(query.query_type()) {
            let endpoint = Arc::clone(context.endpoints().default_endpoint()?);
            return self.send_to(endpoint, request, context);
        }

        let forced = lock(&self.forced).take();
        if let Some(key) = forced {
            let endpoint = Arc::clone(context.endpoints().get(&key)?);
            return self.send_to(endpoint, request, context);
        }

        let mut excluded = BTreeSet::new();
        let mut attempts = 0;
        let mut last_error = String::from("no endpoint was tried");

        loop {
            let Some(key) = self.select(&excluded) else {
                return Err(Error::Exhausted {
                    attempts,
                    last_error,
                });
            };
            let endpoint = Arc::clone(context.endpoints().get(&key)?);
            attempts += 1;
            debug!(endpoint = key.as_str(), attempt = attempts, "sending balanced request");

            let outcome = context.send(request, &endpoint);
            let retry_status = |response: &Response| {
                self.config.failover_status_codes.contains(&response.status)
            };

            let reason = match &outcome {
                Ok(response) if retry_status(response) => FailureReason::Status(response),
                Ok(_) => {
                    if self.config.sticky {
                        *lock(&self.pinned) = Some(key);
                    }
                    self.served(&endpoint);
                    let response = outcome?;
                    return Ok((endpoint, response));
                }
                Err(err) if err.is_retryable() => FailureReason::Transport(err),
                Err(_) => return outcome.map(|response| (endpoint, response)),
            };

            last_error = match &reason {
                FailureReason::Transport(err) => err.to_string(),
                FailureReason::Status(response) => {
                    format!("HTTP {} {}", response.status, response.status_text)
                }
            };
            warn!(
                endpoint = key.as_str(),
                attempt = attempts,
                error = last_error.as_str(),
                "endpoint failed"
            );
            self.emit(&EndpointFailure {
                endpoint: &endpoint,
                attempt: attempts,
                reason,
            });

            {
                let mut pinned = lock(&self.pinned);
                if pinned.as_deref() == Some(key.as_str()) {
                    *pinned = None;
                }
            }

            if !self.config.failover {
                let response = outcome?;
                self.served(&endpoint);
                return Ok((endpoint, response));
            }
            if attempts > self.config.max_retries {
                return Err(Error::Exhausted {
                    attempts,
                    last_error,
                });
            }
            excluded.insert(key);
        }
    }
}
