//! The canonical search query.

use std::any::Any;

use serde_json::Value;

use super::{downcast, local_params, Query, QueryType, RequestBuilder, ResponseParser};
use crate::component::{Component, ComponentSet, ComponentType};
use crate::document::parse_doc_list;
use crate::result::{QueryData, SelectData};
use crate::types::{Params, Request, Response};
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// A filter query; the key identifies it within its select query and tags
/// let facets exclude it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterQuery {
    key: String,
    query: String,
    tags: Vec<String>,
}

impl FilterQuery {
    pub fn new(key: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            query: query.into(),
            tags: Vec::new(),
        }
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn query(&self) -> &str {
        &self.query
    }
}

#[derive(Debug)]
pub struct SelectQuery {
    handler: String,
    query: String,
    start: u64,
    rows: u64,
    fields: Vec<String>,
    sorts: Vec<(String, SortOrder)>,
    filter_queries: Vec<FilterQuery>,
    params: Params,
    omit_header: bool,
    components: ComponentSet,
}

impl Default for SelectQuery {
    fn default() -> Self {
        Self {
            handler: "select".to_string(),
            query: "*:*".to_string(),
            start: 0,
            rows: 10,
            fields: vec!["*".to_string(), "score".to_string()],
            sorts: Vec::new(),
            filter_queries: Vec::new(),
            params: Params::new(),
            omit_header: false,
            components: ComponentSet::new(),
        }
    }
}

impl SelectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = handler.into();
        self
    }

    pub fn with_start(mut self, start: u64) -> Self {
        self.start = start;
        self
    }

    pub fn with_rows(mut self, rows: u64) -> Self {
        self.rows = rows;
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn add_sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sorts.push((field.into(), order));
        self
    }

    /// Add a filter query; keys must be unique within the query.
    pub fn add_filter_query(mut self, filter: FilterQuery) -> Result<Self, Error> {
        if filter.key.is_empty() {
            return Err(Error::invalid_argument("filter query key must not be empty"));
        }
        if self.filter_queries.iter().any(|f| f.key == filter.key) {
            return Err(Error::invalid_argument(format!(
                "a filter query with key '{}' already exists",
                filter.key
            )));
        }
        self.filter_queries.push(filter);
        Ok(self)
    }

    /// Extra raw parameter, sent before the typed ones.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.add(name, value);
        self
    }

    pub fn with_omit_header(mut self, omit: bool) -> Self {
        self.omit_header = omit;
        self
    }

    pub fn with_component(mut self, component: impl Component) -> Self {
        self.components.set(component);
        self
    }

    pub fn components_mut(&mut self) -> &mut ComponentSet {
        &mut self.components
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn filter_queries(&self) -> &[FilterQuery] {
        &self.filter_queries
    }
}

impl Query for SelectQuery {
    fn query_type(&self) -> QueryType {
        QueryType::Select
    }

    fn components(&self) -> &ComponentSet {
        &self.components
    }

    fn omits_header(&self) -> bool {
        self.omit_header
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct SelectRequestBuilder;

impl RequestBuilder for SelectRequestBuilder {
    fn build(&self, query: &dyn Query) -> Result<Request, Error> {
        let select = downcast::<SelectQuery>(query)?;
        let mut request = Request::get(select.handler.as_str());
        let params = &mut request.params;

        params.extend(&select.params);
        params.set("q", select.query.as_str());
        params.set("start", select.start.to_string());
        params.set("rows", select.rows.to_string());
        if !select.fields.is_empty() {
            params.set("fl", select.fields.join(","));
        }
        if !select.sorts.is_empty() {
            let sort: Vec<String> = select
                .sorts
                .iter()
                .map(|(field, order)| format!("{} {}", field, order.as_str()))
                .collect();
            params.set("sort", sort.join(","));
        }
        for filter in &select.filter_queries {
            params.add(
                "fq",
                local_params(&filter.query, &[("tag", filter.tags.join(","))]),
            );
        }
        params.set("wt", "json");
        params.set("json.nl", "flat");
        params.set("omitHeader", select.omit_header.to_string());

        Ok(request)
    }
}

pub struct SelectResponseParser;

impl ResponseParser for SelectResponseParser {
    fn parse(&self, query: &dyn Query, response: &Response) -> Result<QueryData, Error> {
        let select = downcast::<SelectQuery>(query)?;
        let body = &response.body;

        let Some(list) = body.get("response") else {
            // Grouped responses may carry their documents under `grouped` only.
            if select.components.get(ComponentType::Grouping).is_some()
                && body.get("grouped").is_some()
            {
                return Ok(QueryData::Select(SelectData::default()));
            }
            return Err(Error::missing_key("response"));
        };

        let (num_found, start, documents) = parse_doc_list(list)?;
        Ok(QueryData::Select(SelectData {
            num_found: Some(num_found),
            start,
            max_score: list.get("maxScore").and_then(Value::as_f64),
            documents,
        }))
    }
}
