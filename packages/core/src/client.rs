//! The execution core.
//!
//! [`Client::execute`] resolves an endpoint, builds the request (query
//! builder first, then each component in attachment order), sends it
//! through the adapter and wraps the response in a lazily parsed
//! [`QueryResult`]. The core never retries; retry and failover belong to a
//! [`Dispatcher`] such as a load balancer.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::adapter::Adapter;
use crate::component::{ComponentBuilder, ComponentParser, ComponentType};
use crate::config::ClientConfig;
use crate::endpoint::{Endpoint, EndpointRegistry};
use crate::query::{
    PingQuery, Query, QueryType, RequestBuilder, ResponseParser, SelectQuery, UpdateQuery,
};
use crate::registry::HandlerRegistry;
use crate::result::QueryResult;
use crate::types::{Request, Response};
use crate::Error;

/// What a dispatcher sees while resolving a request.
pub struct DispatchContext<'a> {
    adapter: &'a dyn Adapter,
    endpoints: &'a EndpointRegistry,
}

impl<'a> DispatchContext<'a> {
    /// Bundle an adapter with the endpoints it may reach.
    pub fn new(adapter: &'a dyn Adapter, endpoints: &'a EndpointRegistry) -> Self {
        Self { adapter, endpoints }
    }

    /// Get the registered endpoints.
    pub fn endpoints(&self) -> &EndpointRegistry {
        self.endpoints
    }

    /// Send a request to one endpoint.
    pub fn send(&self, request: &Request, endpoint: &Endpoint) -> Result<Response, Error> {
        self.adapter.send(request, endpoint)
    }

    /// Send to the client's default endpoint.
    pub fn send_to_default(&self, request: &Request) -> Result<(Arc<Endpoint>, Response), Error> {
        let endpoint = Arc::clone(self.endpoints.default_endpoint()?);
        let response = self.adapter.send(request, &endpoint)?;
        Ok((endpoint, response))
    }
}

/// Replaces the core's endpoint selection step.
///
/// A dispatcher picks the endpoint(s) a request goes to and may retry on
/// other endpoints. It returns the endpoint that produced the response.
pub trait Dispatcher: Send + Sync {
    fn dispatch(
        &self,
        query: &dyn Query,
        request: &Request,
        context: &DispatchContext<'_>,
    ) -> Result<(Arc<Endpoint>, Response), Error>;
}

/// Parsers resolved for one query at build time.
pub(crate) struct ParsePlan {
    pub(crate) parser: Arc<dyn ResponseParser>,
    pub(crate) components: Vec<Arc<dyn ComponentParser>>,
}

/// Search client: endpoint registry, handler registry and adapter.
pub struct Client {
    adapter: Arc<dyn Adapter>,
    endpoints: EndpointRegistry,
    registry: HandlerRegistry,
    dispatcher: Option<Arc<dyn Dispatcher>>,
}

impl Client {
    /// A client with no endpoints and the default handlers.
    pub fn new(adapter: impl Adapter + 'static) -> Self {
        Self::with_adapter(Arc::new(adapter))
    }

    /// A client over a shared adapter.
    pub fn with_adapter(adapter: Arc<dyn Adapter>) -> Self {
        Self {
            adapter,
            endpoints: EndpointRegistry::new(),
            registry: HandlerRegistry::default(),
            dispatcher: None,
        }
    }

    /// A client with the endpoints of a configuration.
    pub fn from_config(config: ClientConfig, adapter: Arc<dyn Adapter>) -> Result<Self, Error> {
        let mut client = Self::with_adapter(adapter);
        client.endpoints = config.into_registry()?;
        Ok(client)
    }

    /// Register an endpoint; the first one becomes the default.
    pub fn add_endpoint(&mut self, endpoint: Endpoint) -> Result<Arc<Endpoint>, Error> {
        self.endpoints.add(endpoint)
    }

    /// Unregister an endpoint.
    pub fn remove_endpoint(&mut self, key: &str) -> Result<Arc<Endpoint>, Error> {
        self.endpoints.remove(key)
    }

    /// Select the default endpoint.
    pub fn set_default_endpoint(&mut self, key: &str) -> Result<(), Error> {
        self.endpoints.set_default(key)
    }

    /// Look up an endpoint by key.
    pub fn endpoint(&self, key: &str) -> Result<&Arc<Endpoint>, Error> {
        self.endpoints.get(key)
    }

    /// Get the registered endpoints.
    pub fn endpoints(&self) -> &EndpointRegistry {
        &self.endpoints
    }

    /// Get the transport adapter.
    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    /// Register or replace the handlers for a query type.
    pub fn register_query_type(
        &mut self,
        kind: QueryType,
        builder: impl RequestBuilder + 'static,
        parser: impl ResponseParser + 'static,
    ) {
        self.registry.register_query(kind, builder, parser);
    }

    /// Register or replace the handlers for a component type.
    pub fn register_component_type(
        &mut self,
        kind: ComponentType,
        builder: impl ComponentBuilder + 'static,
        parser: impl ComponentParser + 'static,
    ) {
        self.registry.register_component(kind, builder, parser);
    }

    /// Route executions without an explicit endpoint through `dispatcher`.
    pub fn set_dispatcher(&mut self, dispatcher: Arc<dyn Dispatcher>) {
        self.dispatcher = Some(dispatcher);
    }

    /// Send executions straight to the default endpoint again.
    pub fn clear_dispatcher(&mut self) {
        self.dispatcher = None;
    }

    /// Build the request for a query, components included.
    pub fn create_request(&self, query: &dyn Query) -> Result<Request, Error> {
        let handlers = self.registry.query(query.query_type())?;
        let mut request = handlers.builder.build(query)?;
        for component in query.components().iter() {
            let handlers = self.registry.component(component.component_type())?;
            handlers.builder.build(component, &mut request)?;
        }
        trace!(
            handler = %request.handler,
            params = request.params.len(),
            "built request"
        );
        Ok(request)
    }

    pub(crate) fn parse_plan(&self, query: &dyn Query) -> Result<ParsePlan, Error> {
        let parser = Arc::clone(&self.registry.query(query.query_type())?.parser);
        let components = query
            .components()
            .iter()
            .map(|c| {
                self.registry
                    .component(c.component_type())
                    .map(|h| Arc::clone(&h.parser))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ParsePlan { parser, components })
    }

    /// Execute against the dispatcher (if any) or the default endpoint.
    pub fn execute(&self, query: Arc<dyn Query>) -> Result<QueryResult, Error> {
        self.run(query, None)
    }

    /// Execute against a specific endpoint, bypassing the dispatcher.
    pub fn execute_on(&self, query: Arc<dyn Query>, endpoint: &str) -> Result<QueryResult, Error> {
        self.run(query, Some(endpoint))
    }

    /// Execute a select query.
    pub fn select(&self, query: SelectQuery) -> Result<QueryResult, Error> {
        self.execute(Arc::new(query))
    }

    /// Execute an update query.
    pub fn update(&self, query: UpdateQuery) -> Result<QueryResult, Error> {
        self.execute(Arc::new(query))
    }

    /// Ping the default endpoint.
    pub fn ping(&self) -> Result<QueryResult, Error> {
        self.execute(Arc::new(PingQuery::new()))
    }

    fn run(&self, query: Arc<dyn Query>, endpoint: Option<&str>) -> Result<QueryResult, Error> {
        let request = self.create_request(&*query)?;
        let plan = self.parse_plan(&*query)?;

        let (endpoint, response) = match (endpoint, &self.dispatcher) {
            (Some(key), _) => {
                let endpoint = Arc::clone(self.endpoints.get(key)?);
                let response = self.adapter.send(&request, &endpoint)?;
                (endpoint, response)
            }
            (None, Some(dispatcher)) => {
                let context = DispatchContext::new(self.adapter.as_ref(), &self.endpoints);
                dispatcher.dispatch(&*query, &request, &context)?
            }
            (None, None) => {
                DispatchContext::new(self.adapter.as_ref(), &self.endpoints)
                    .send_to_default(&request)?
            }
        };

        self.finish(query, plan, endpoint.key(), response)
    }

    /// Check the status and wrap the response of `query` in a result.
    pub(crate) fn finish(
        &self,
        query: Arc<dyn Query>,
        plan: ParsePlan,
        endpoint: &str,
        response: Response,
    ) -> Result<QueryResult, Error> {
        debug!(
            endpoint,
            query_type = %query.query_type(),
            status = response.status,
            "received response"
        );
        let response = response.error_for_status()?;
        Ok(QueryResult::new(
            query,
            response,
            endpoint.to_string(),
            plan.parser,
            plan.components,
        ))
    }
}
