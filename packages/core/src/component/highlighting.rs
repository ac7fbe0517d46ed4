//! Highlighting: matching snippets per document and field.

use std::any::Any;
use std::collections::BTreeMap;

use serde_json::Value;

use super::{downcast, Component, ComponentBuilder, ComponentParser, ComponentResult, ComponentType};
use crate::query::Query;
use crate::types::Request;
use crate::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Highlighting {
    fields: Vec<String>,
    snippets: Option<u32>,
    fragment_size: Option<u32>,
    simple_pre: Option<String>,
    simple_post: Option<String>,
}

impl Highlighting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_snippets(mut self, snippets: u32) -> Self {
        self.snippets = Some(snippets);
        self
    }

    pub fn with_fragment_size(mut self, size: u32) -> Self {
        self.fragment_size = Some(size);
        self
    }

    /// Markup placed around each highlighted term.
    pub fn with_tags(mut self, pre: impl Into<String>, post: impl Into<String>) -> Self {
        self.simple_pre = Some(pre.into());
        self.simple_post = Some(post.into());
        self
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl Component for Highlighting {
    fn component_type(&self) -> ComponentType {
        ComponentType::Highlighting
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct HighlightingBuilder;

impl ComponentBuilder for HighlightingBuilder {
    fn build(&self, component: &dyn Component, request: &mut Request) -> Result<(), Error> {
        let hl = downcast::<Highlighting>(component)?;
        let params = &mut request.params;

        params.set("hl", "true");
        if !hl.fields.is_empty() {
            params.set("hl.fl", hl.fields.join(","));
        }
        if let Some(snippets) = hl.snippets {
            params.set("hl.snippets", snippets.to_string());
        }
        if let Some(size) = hl.fragment_size {
            params.set("hl.fragsize", size.to_string());
        }
        if let Some(pre) = &hl.simple_pre {
            params.set("hl.simple.pre", pre.as_str());
        }
        if let Some(post) = &hl.simple_post {
            params.set("hl.simple.post", post.as_str());
        }
        Ok(())
    }
}

/// Snippets keyed by document id, then field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HighlightingResult {
    documents: BTreeMap<String, BTreeMap<String, Vec<String>>>,
}

impl HighlightingResult {
    pub fn document(&self, id: &str) -> Option<&BTreeMap<String, Vec<String>>> {
        self.documents.get(id)
    }

    pub fn snippets(&self, id: &str, field: &str) -> Option<&[String]> {
        self.documents
            .get(id)
            .and_then(|fields| fields.get(field))
            .map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

pub struct HighlightingParser;

impl ComponentParser for HighlightingParser {
    fn parse(
        &self,
        _query: &dyn Query,
        _component: &dyn Component,
        data: &Value,
    ) -> Result<ComponentResult, Error> {
        let raw = data
            .get("highlighting")
            .and_then(Value::as_object)
            .ok_or_else(|| Error::missing_key("highlighting"))?;

        let mut documents = BTreeMap::new();
        for (id, fields) in raw {
            let fields = fields.as_object().ok_or_else(|| {
                Error::parse(format!("highlighting entry for '{}' is not an object", id))
            })?;
            let mut snippets = BTreeMap::new();
            for (field, values) in fields {
                let values = values
                    .as_array()
                    .map(|list| {
                        list.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                snippets.insert(field.clone(), values);
            }
            documents.insert(id.clone(), snippets);
        }

        Ok(ComponentResult::Highlighting(HighlightingResult { documents }))
    }
}
