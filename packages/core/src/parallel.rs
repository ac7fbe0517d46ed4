//! Concurrent execution of independent queries.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::client::{Client, ParsePlan};
use crate::endpoint::Endpoint;
use crate::query::Query;
use crate::result::QueryResult;
use crate::types::Request;
use crate::Error;

struct Pending {
    key: String,
    query: Arc<dyn Query>,
    endpoint: Option<String>,
}

struct Prepared {
    key: String,
    query: Arc<dyn Query>,
    request: Request,
    plan: ParsePlan,
    endpoint: Arc<Endpoint>,
}

/// A batch of keyed queries sent through the adapter in one go.
///
/// Every request is built before anything is sent, so a build failure
/// aborts the whole batch. Transport and HTTP failures stay per key.
/// Queries go to their explicit endpoint or the client's default one;
/// the client's dispatcher is not consulted.
pub struct ParallelExecution<'a> {
    client: &'a Client,
    queries: Vec<Pending>,
}

impl<'a> ParallelExecution<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self {
            client,
            queries: Vec::new(),
        }
    }

    pub fn add_query(
        &mut self,
        key: impl Into<String>,
        query: Arc<dyn Query>,
    ) -> Result<&mut Self, Error> {
        self.push(key.into(), query, None)
    }

    pub fn add_query_on(
        &mut self,
        key: impl Into<String>,
        query: Arc<dyn Query>,
        endpoint: impl Into<String>,
    ) -> Result<&mut Self, Error> {
        self.push(key.into(), query, Some(endpoint.into()))
    }

    fn push(
        &mut self,
        key: String,
        query: Arc<dyn Query>,
        endpoint: Option<String>,
    ) -> Result<&mut Self, Error> {
        if self.queries.iter().any(|p| p.key == key) {
            return Err(Error::invalid_argument(format!(
                "a query with key '{}' is already part of this batch",
                key
            )));
        }
        self.queries.push(Pending {
            key,
            query,
            endpoint,
        });
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Send every query and collect one outcome per key.
    pub fn execute(self) -> Result<BTreeMap<String, Result<QueryResult, Error>>, Error> {
        let client = self.client;

        let mut prepared = Vec::with_capacity(self.queries.len());
        for pending in self.queries {
            let request = client.create_request(&*pending.query)?;
            let plan = client.parse_plan(&*pending.query)?;
            let endpoint = match &pending.endpoint {
                Some(key) => client.endpoint(key)?,
                None => client.endpoints().default_endpoint()?,
            };
            prepared.push(Prepared {
                key: pending.key,
                query: pending.query,
                request,
                plan,
                endpoint: Arc::clone(endpoint),
            });
        }

        debug!(queries = prepared.len(), "sending parallel batch");
        let batch: Vec<(&Request, &Endpoint)> = prepared
            .iter()
            .map(|p| (&p.request, p.endpoint.as_ref()))
            .collect();
        let outcomes = client.adapter().send_batch(&batch);
        drop(batch);

        if outcomes.len() != prepared.len() {
            return Err(Error::transport(format!(
                "adapter returned {} outcome(s) for {} request(s)",
                outcomes.len(),
                prepared.len()
            )));
        }

        let mut results = BTreeMap::new();
        for (item, outcome) in prepared.into_iter().zip(outcomes) {
            let result = outcome.and_then(|response| {
                client.finish(item.query, item.plan, item.endpoint.key(), response)
            });
            results.insert(item.key, result);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::mock::MockAdapter;
    use crate::component::{Component, ComponentType};
    use crate::query::{PingQuery, SelectQuery};
    use crate::types::Response;
    use crate::ErrorKind;
    use serde_json::json;
    use std::any::Any;

    fn client(adapter: MockAdapter) -> Client {
        let mut client = Client::new(adapter);
        client
            .add_endpoint(Endpoint::new("a").with_core("books"))
            .unwrap();
        client
            .add_endpoint(Endpoint::new("b").with_core("books"))
            .unwrap();
        client
    }

    #[test]
    fn collects_results_per_key() {
        let adapter = MockAdapter::new()
            .with_response(
                "a",
                Response::json(json!({
                    "responseHeader": {"status": 0, "QTime": 1},
                    "response": {"numFound": 3, "start": 0, "docs": []}
                })),
            )
            .with_response("b", MockAdapter::error_response(500, "boom"));
        let client = client(adapter.clone());

        let mut batch = ParallelExecution::new(&client);
        batch
            .add_query("first", Arc::new(SelectQuery::new()))
            .unwrap()
            .add_query_on("second", Arc::new(SelectQuery::new()), "b")
            .unwrap();
        let results = batch.execute().unwrap();

        assert_eq!(results.len(), 2);
        let first = results["first"].as_ref().unwrap();
        assert_eq!(first.endpoint(), "a");
        assert_eq!(first.num_found().unwrap(), Some(3));
        assert_eq!(results["second"].as_ref().unwrap_err().status(), Some(500));
        assert_eq!(adapter.request_count(), 2);
    }

    #[test]
    fn transport_failure_is_reported_per_key() {
        let adapter = MockAdapter::new()
            .with_default_response(MockAdapter::ok_response())
            .unreachable("b");
        let client = client(adapter);

        let mut batch = ParallelExecution::new(&client);
        batch
            .add_query_on("up", Arc::new(SelectQuery::new()), "a")
            .unwrap()
            .add_query_on("down", Arc::new(SelectQuery::new()), "b")
            .unwrap();
        let results = batch.execute().unwrap();

        assert!(results["up"].is_ok());
        assert_eq!(
            results["down"].as_ref().unwrap_err().kind(),
            ErrorKind::Transport
        );
    }

    #[derive(Debug)]
    struct Unregistered;

    impl Component for Unregistered {
        fn component_type(&self) -> ComponentType {
            ComponentType::Custom("spellcheck")
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn build_failure_aborts_before_sending() {
        let adapter = MockAdapter::new().with_default_response(MockAdapter::ok_response());
        let client = client(adapter.clone());

        let mut batch = ParallelExecution::new(&client);
        batch
            .add_query("ping", Arc::new(PingQuery::new()))
            .unwrap()
            .add_query(
                "broken",
                Arc::new(SelectQuery::new().with_component(Unregistered)),
            )
            .unwrap();

        let err = batch.execute().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(adapter.request_count(), 0);
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let client = client(MockAdapter::new());
        let mut batch = ParallelExecution::new(&client);
        batch.add_query("x", Arc::new(PingQuery::new())).unwrap();
        assert!(batch.add_query("x", Arc::new(PingQuery::new())).is_err());
        assert_eq!(batch.len(), 1);
    }
}
