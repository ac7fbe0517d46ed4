//! Optional sub-features attached to a query.
//!
//! Each component contributes to the request through a
//! [`ComponentBuilder`] and to the parsed result through a
//! [`ComponentParser`]. Contributions happen in attachment order, so a
//! later component sees (and may override) parameters set before it.

use std::any::Any;
use std::fmt;

use serde_json::Value;

use crate::query::Query;
use crate::types::Request;
use crate::Error;

pub mod facets;
pub mod grouping;
pub mod highlighting;

pub use facets::{
    FacetField, FacetQuery, FacetSet, Facets, FacetsBuilder, FacetsParser, FieldFacetResult,
};
pub use grouping::{
    FieldGroup, Group, Grouping, GroupingBuilder, GroupingParser, GroupingResult, QueryGroup,
};
pub use highlighting::{Highlighting, HighlightingBuilder, HighlightingParser, HighlightingResult};

/// Tag identifying a component kind in the handler registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentType {
    Facets,
    Highlighting,
    Grouping,
    /// A component kind registered by the application.
    Custom(&'static str),
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentType::Facets => write!(f, "facets"),
            ComponentType::Highlighting => write!(f, "highlighting"),
            ComponentType::Grouping => write!(f, "grouping"),
            ComponentType::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// A named, typed sub-configuration owned by one query.
pub trait Component: Any + Send + Sync + fmt::Debug {
    fn component_type(&self) -> ComponentType;

    fn as_any(&self) -> &dyn Any;
}

/// Adds a component's parameters to an in-progress request.
pub trait ComponentBuilder: Send + Sync {
    fn build(&self, component: &dyn Component, request: &mut Request) -> Result<(), Error>;
}

/// Extracts a component's sub-tree from the decoded response body.
pub trait ComponentParser: Send + Sync {
    fn parse(
        &self,
        query: &dyn Query,
        component: &dyn Component,
        data: &Value,
    ) -> Result<ComponentResult, Error>;
}

/// Parsed output of one component.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentResult {
    Facets(FacetSet),
    Highlighting(HighlightingResult),
    Grouping(GroupingResult),
    Custom(Value),
}

impl ComponentResult {
    pub fn as_facets(&self) -> Option<&FacetSet> {
        match self {
            ComponentResult::Facets(facets) => Some(facets),
            _ => None,
        }
    }

    pub fn as_highlighting(&self) -> Option<&HighlightingResult> {
        match self {
            ComponentResult::Highlighting(highlighting) => Some(highlighting),
            _ => None,
        }
    }

    pub fn as_grouping(&self) -> Option<&GroupingResult> {
        match self {
            ComponentResult::Grouping(grouping) => Some(grouping),
            _ => None,
        }
    }

    pub fn as_custom(&self) -> Option<&Value> {
        match self {
            ComponentResult::Custom(value) => Some(value),
            _ => None,
        }
    }
}

/// Components of one query, kept in attachment order.
#[derive(Debug, Default)]
pub struct ComponentSet {
    components: Vec<Box<dyn Component>>,
}

pub(crate) static NO_COMPONENTS: ComponentSet = ComponentSet::new();

impl ComponentSet {
    pub const fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Attach a component. A component of an already attached type
    /// replaces the old one at its original position.
    pub fn set(&mut self, component: impl Component) {
        let component: Box<dyn Component> = Box::new(component);
        let kind = component.component_type();
        match self
            .components
            .iter()
            .position(|c| c.component_type() == kind)
        {
            Some(index) => self.components[index] = component,
            None => self.components.push(component),
        }
    }

    pub fn get(&self, kind: ComponentType) -> Option<&dyn Component> {
        self.components
            .iter()
            .find(|c| c.component_type() == kind)
            .map(|c| c.as_ref())
    }

    /// Typed access to an attached component.
    pub fn get_as<T: Component>(&self) -> Option<&T> {
        self.components
            .iter()
            .find_map(|c| c.as_any().downcast_ref::<T>())
    }

    pub fn remove(&mut self, kind: ComponentType) -> bool {
        let before = self.components.len();
        self.components.retain(|c| c.component_type() != kind);
        self.components.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Component> {
        self.components.iter().map(|c| c.as_ref())
    }

    pub fn types(&self) -> Vec<ComponentType> {
        self.components.iter().map(|c| c.component_type()).collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Downcast a component to the concrete type a builder or parser expects.
pub fn downcast<T: Component>(component: &dyn Component) -> Result<&T, Error> {
    component.as_any().downcast_ref::<T>().ok_or_else(|| {
        Error::configuration(format!(
            "handler for {} cannot process a {} component",
            std::any::type_name::<T>(),
            component.component_type()
        ))
    })
}
