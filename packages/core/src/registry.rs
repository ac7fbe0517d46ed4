//! Compile-time registry from type tags to builder/parser pairs.

use std::collections::HashMap;
use std::sync::Arc;

use crate::component::{
    ComponentBuilder, ComponentParser, ComponentType, FacetsBuilder, FacetsParser,
    GroupingBuilder, GroupingParser, HighlightingBuilder, HighlightingParser,
};
use crate::query::{
    PingRequestBuilder, PingResponseParser, QueryType, RequestBuilder, ResponseParser,
    SelectRequestBuilder, SelectResponseParser, UpdateRequestBuilder, UpdateResponseParser,
};
use crate::Error;

/// Builder and parser for one query kind.
#[derive(Clone)]
pub struct QueryHandlers {
    pub builder: Arc<dyn RequestBuilder>,
    pub parser: Arc<dyn ResponseParser>,
}

/// Builder and parser for one component kind.
#[derive(Clone)]
pub struct ComponentHandlers {
    pub builder: Arc<dyn ComponentBuilder>,
    pub parser: Arc<dyn ComponentParser>,
}

#[derive(Clone)]
pub struct HandlerRegistry {
    queries: HashMap<QueryType, QueryHandlers>,
    components: HashMap<ComponentType, ComponentHandlers>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register_query(QueryType::Select, SelectRequestBuilder, SelectResponseParser);
        registry.register_query(QueryType::Update, UpdateRequestBuilder, UpdateResponseParser);
        registry.register_query(QueryType::Ping, PingRequestBuilder, PingResponseParser);
        registry.register_component(ComponentType::Facets, FacetsBuilder, FacetsParser);
        registry.register_component(
            ComponentType::Highlighting,
            HighlightingBuilder,
            HighlightingParser,
        );
        registry.register_component(ComponentType::Grouping, GroupingBuilder, GroupingParser);
        registry
    }
}

impl HandlerRegistry {
    /// A registry with no handlers at all.
    pub fn empty() -> Self {
        Self {
            queries: HashMap::new(),
            components: HashMap::new(),
        }
    }

    /// Register (or replace) the handlers for a query kind.
    pub fn register_query(
        &mut self,
        kind: QueryType,
        builder: impl RequestBuilder + 'static,
        parser: impl ResponseParser + 'static,
    ) {
        self.queries.insert(
            kind,
            QueryHandlers {
                builder: Arc::new(builder),
                parser: Arc::new(parser),
            },
        );
    }

    pub fn register_component(
        &mut self,
        kind: ComponentType,
        builder: impl ComponentBuilder + 'static,
        parser: impl ComponentParser + 'static,
    ) {
        self.components.insert(
            kind,
            ComponentHandlers {
                builder: Arc::new(builder),
                parser: Arc::new(parser),
            },
        );
    }

    pub fn query(&self, kind: QueryType) -> Result<&QueryHandlers, Error> {
        self.queries
            .get(&kind)
            .ok_or_else(|| Error::configuration(format!("unknown query type '{}'", kind)))
    }

    pub fn component(&self, kind: ComponentType) -> Result<&ComponentHandlers, Error> {
        self.components
            .get(&kind)
            .ok_or_else(|| Error::configuration(format!("unknown component type '{}'", kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_builtin_types() {
        let registry = HandlerRegistry::default();
        assert!(registry.query(QueryType::Select).is_ok());
        assert!(registry.query(QueryType::Update).is_ok());
        assert!(registry.query(QueryType::Ping).is_ok());
        assert!(registry.component(ComponentType::Facets).is_ok());
        assert!(registry.component(ComponentType::Grouping).is_ok());
    }

    #[test]
    fn unknown_types_are_configuration_errors() {
        let registry = HandlerRegistry::default();
        let err = registry.query(QueryType::Custom("suggest")).err().unwrap();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(err.to_string().contains("suggest"));

        let empty = HandlerRegistry::empty();
        assert!(empty.component(ComponentType::Facets).is_err());
    }
}
