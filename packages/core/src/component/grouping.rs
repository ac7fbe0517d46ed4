//! Result grouping (field collapsing) by field value or by query.

use std::any::Any;

use serde_json::Value;

use super::{downcast, Component, ComponentBuilder, ComponentParser, ComponentResult, ComponentType};
use crate::document::{parse_doc_list, Document};
use crate::query::Query;
use crate::types::Request;
use crate::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grouping {
    fields: Vec<String>,
    queries: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    sort: Option<String>,
    ngroups: bool,
}

impl Grouping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(mut self, field: impl Into<String>) -> Self {
        self.fields.push(field.into());
        self
    }

    pub fn add_query(mut self, query: impl Into<String>) -> Self {
        self.queries.push(query.into());
        self
    }

    /// Documents returned per group.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sort order of documents within each group.
    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Also report the number of distinct groups.
    pub fn with_ngroups(mut self, ngroups: bool) -> Self {
        self.ngroups = ngroups;
        self
    }
}

impl Component for Grouping {
    fn component_type(&self) -> ComponentType {
        ComponentType::Grouping
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct GroupingBuilder;

impl ComponentBuilder for GroupingBuilder {
    fn build(&self, component: &dyn Component, request: &mut Request) -> Result<(), Error> {
        let grouping = downcast::<Grouping>(component)?;
        if grouping.fields.is_empty() && grouping.queries.is_empty() {
            return Err(Error::invalid_argument(
                "grouping needs at least one field or query",
            ));
        }
        let params = &mut request.params;

        params.set("group", "true");
        for field in &grouping.fields {
            params.add("group.field", field.as_str());
        }
        for query in &grouping.queries {
            params.add("group.query", query.as_str());
        }
        if let Some(limit) = grouping.limit {
            params.set("group.limit", limit.to_string());
        }
        if let Some(offset) = grouping.offset {
            params.set("group.offset", offset.to_string());
        }
        if let Some(sort) = &grouping.sort {
            params.set("group.sort", sort.as_str());
        }
        if grouping.ngroups {
            params.set("group.ngroups", "true");
        }
        Ok(())
    }
}

/// One group of documents sharing a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub value: Value,
    pub num_found: u64,
    pub start: u64,
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldGroup {
    pub field: String,
    pub matches: u64,
    pub ngroups: Option<u64>,
    pub groups: Vec<Group>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryGroup {
    pub query: String,
    pub matches: u64,
    pub num_found: u64,
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupingResult {
    fields: Vec<FieldGroup>,
    queries: Vec<QueryGroup>,
}

impl GroupingResult {
    pub fn field(&self, field: &str) -> Option<&FieldGroup> {
        self.fields.iter().find(|g| g.field == field)
    }

    pub fn query(&self, query: &str) -> Option<&QueryGroup> {
        self.queries.iter().find(|g| g.query == query)
    }

    pub fn fields(&self) -> &[FieldGroup] {
        &self.fields
    }

    pub fn queries(&self) -> &[QueryGroup] {
        &self.queries
    }
}

pub struct GroupingParser;

impl ComponentParser for GroupingParser {
    fn parse(
        &self,
        _query: &dyn Query,
        component: &dyn Component,
        data: &Value,
    ) -> Result<ComponentResult, Error> {
        let grouping = downcast::<Grouping>(component)?;
        let grouped = data
            .get("grouped")
            .ok_or_else(|| Error::missing_key("grouped"))?;

        let mut result = GroupingResult::default();

        for field in &grouping.fields {
            let Some(raw) = grouped.get(field) else {
                continue;
            };
            let mut groups = Vec::new();
            for group in raw.get("groups").and_then(Value::as_array).into_iter().flatten() {
                let doclist = group
                    .get("doclist")
                    .ok_or_else(|| Error::missing_key("doclist"))?;
                let (num_found, start, documents) = parse_doc_list(doclist)?;
                groups.push(Group {
                    value: group.get("groupValue").cloned().unwrap_or(Value::Null),
                    num_found,
                    start,
                    documents,
                });
            }
            result.fields.push(FieldGroup {
                field: field.clone(),
                matches: raw.get("matches").and_then(Value::as_u64).unwrap_or(0),
                ngroups: raw.get("ngroups").and_then(Value::as_u64),
                groups,
            });
        }

        for query in &grouping.queries {
            let Some(raw) = grouped.get(query) else {
                continue;
            };
            let doclist = raw
                .get("doclist")
                .ok_or_else(|| Error::missing_key("doclist"))?;
            let (num_found, _, documents) = parse_doc_list(doclist)?;
            result.queries.push(QueryGroup {
                query: query.clone(),
                matches: raw.get("matches").and_then(Value::as_u64).unwrap_or(0),
                num_found,
                documents,
            });
        }

        Ok(ComponentResult::Grouping(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SelectQuery;
    use serde_json::json;

    #[test]
    fn empty_grouping_is_rejected() {
        let mut request = Request::get("select");
        let err = GroupingBuilder
            .build(&Grouping::new(), &mut request)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn builds_group_params() {
        let grouping = Grouping::new()
            .add_field("author")
            .add_query("price:[0 TO 10]")
            .with_limit(2)
            .with_ngroups(true);
        let mut request = Request::get("select");
        GroupingBuilder.build(&grouping, &mut request).unwrap();

        assert_eq!(request.params.get("group"), Some("true"));
        assert_eq!(request.params.get_all("group.field"), vec!["author"]);
        assert_eq!(request.params.get("group.limit"), Some("2"));
        assert_eq!(request.params.get("group.ngroups"), Some("true"));
    }

    #[test]
    fn parses_field_and_query_groups() {
        let grouping = Grouping::new().add_field("author").add_query("price:[0 TO 10]");
        let data = json!({
            "grouped": {
                "author": {
                    "matches": 5,
                    "ngroups": 2,
                    "groups": [
                        {"groupValue": "ann", "doclist": {"numFound": 3, "start": 0, "docs": [{"id": "1"}]}},
                        {"groupValue": null, "doclist": {"numFound": 2, "start": 0, "docs": [{"id": "4"}]}}
                    ]
                },
                "price:[0 TO 10]": {
                    "matches": 5,
                    "doclist": {"numFound": 1, "start": 0, "docs": [{"id": "2"}]}
                }
            }
        });

        let result = GroupingParser
            .parse(&SelectQuery::new(), &grouping, &data)
            .unwrap();
        let grouped = result.as_grouping().unwrap();

        let author = grouped.field("author").unwrap();
        assert_eq!(author.matches, 5);
        assert_eq!(author.ngroups, Some(2));
        assert_eq!(author.groups[0].value, json!("ann"));
        assert_eq!(author.groups[0].num_found, 3);
        assert!(author.groups[1].value.is_null());

        let cheap = grouped.query("price:[0 TO 10]").unwrap();
        assert_eq!(cheap.num_found, 1);
        assert_eq!(cheap.documents[0].get("id"), Some(&json!("2")));
    }
}
