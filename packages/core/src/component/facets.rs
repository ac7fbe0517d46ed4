//! Faceting: term counts per field and hit counts per facet query.

use std::any::Any;

use serde_json::Value;

use super::{downcast, Component, ComponentBuilder, ComponentParser, ComponentResult, ComponentType};
use crate::query::{local_params, Query};
use crate::types::Request;
use crate::Error;

/// Term counts for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetField {
    key: String,
    field: String,
    limit: Option<i64>,
    mincount: Option<u64>,
    sort: Option<String>,
    prefix: Option<String>,
    exclude: Vec<String>,
}

impl FacetField {
    /// A field facet whose result key is the field name.
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            key: field.clone(),
            field,
            limit: None,
            mincount: None,
            sort: None,
            prefix: None,
            exclude: Vec::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Maximum number of terms; negative means unlimited.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_mincount(mut self, mincount: u64) -> Self {
        self.mincount = Some(mincount);
        self
    }

    /// `count` or `index`.
    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Exclude filter queries carrying this tag from the facet counts.
    pub fn exclude(mut self, tag: impl Into<String>) -> Self {
        self.exclude.push(tag.into());
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn field(&self) -> &str {
        &self.field
    }
}

/// Hit count for an arbitrary query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetQuery {
    key: String,
    query: String,
    exclude: Vec<String>,
}

impl FacetQuery {
    pub fn new(key: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            query: query.into(),
            exclude: Vec::new(),
        }
    }

    pub fn exclude(mut self, tag: impl Into<String>) -> Self {
        self.exclude.push(tag.into());
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// The faceting component.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Facets {
    fields: Vec<FacetField>,
    queries: Vec<FacetQuery>,
    limit: Option<i64>,
    mincount: Option<u64>,
    sort: Option<String>,
}

impl Facets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(mut self, facet: FacetField) -> Result<Self, Error> {
        self.check_key(facet.key())?;
        self.fields.push(facet);
        Ok(self)
    }

    pub fn add_query(mut self, facet: FacetQuery) -> Result<Self, Error> {
        self.check_key(facet.key())?;
        self.queries.push(facet);
        Ok(self)
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_mincount(mut self, mincount: u64) -> Self {
        self.mincount = Some(mincount);
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn fields(&self) -> &[FacetField] {
        &self.fields
    }

    pub fn queries(&self) -> &[FacetQuery] {
        &self.queries
    }

    pub fn mincount(&self) -> Option<u64> {
        self.mincount
    }

    fn check_key(&self, key: &str) -> Result<(), Error> {
        if key.is_empty() {
            return Err(Error::invalid_argument("facet key must not be empty"));
        }
        let taken = self.fields.iter().any(|f| f.key == key)
            || self.queries.iter().any(|q| q.key == key);
        if taken {
            return Err(Error::invalid_argument(format!(
                "a facet with key '{}' already exists",
                key
            )));
        }
        Ok(())
    }
}

impl Component for Facets {
    fn component_type(&self) -> ComponentType {
        ComponentType::Facets
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct FacetsBuilder;

impl ComponentBuilder for FacetsBuilder {
    fn build(&self, component: &dyn Component, request: &mut Request) -> Result<(), Error> {
        let facets = downcast::<Facets>(component)?;
        let params = &mut request.params;

        params.set("facet", "true");
        if let Some(limit) = facets.limit {
            params.set("facet.limit", limit.to_string());
        }
        if let Some(mincount) = facets.mincount {
            params.set("facet.mincount", mincount.to_string());
        }
        if let Some(sort) = &facets.sort {
            params.set("facet.sort", sort.as_str());
        }

        for facet in &facets.fields {
            let key = if facet.key != facet.field {
                facet.key.clone()
            } else {
                String::new()
            };
            params.add(
                "facet.field",
                local_params(
                    &facet.field,
                    &[("key", key), ("ex", facet.exclude.join(","))],
                ),
            );

            let per_field = |name: &str| format!("f.{}.facet.{}", facet.field, name);
            if let Some(limit) = facet.limit {
                params.set(per_field("limit"), limit.to_string());
            }
            if let Some(mincount) = facet.mincount {
                params.set(per_field("mincount"), mincount.to_string());
            }
            if let Some(sort) = &facet.sort {
                params.set(per_field("sort"), sort.as_str());
            }
            if let Some(prefix) = &facet.prefix {
                params.set(per_field("prefix"), prefix.as_str());
            }
        }

        for facet in &facets.queries {
            params.add(
                "facet.query",
                local_params(
                    &facet.query,
                    &[("key", facet.key.clone()), ("ex", facet.exclude.join(","))],
                ),
            );
        }

        Ok(())
    }
}

/// Term counts of one field facet, in response order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldFacetResult {
    values: Vec<(String, u64)>,
}

impl FieldFacetResult {
    pub fn get(&self, term: &str) -> Option<u64> {
        self.values
            .iter()
            .find(|(t, _)| t == term)
            .map(|(_, count)| *count)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.values.iter().map(|(t, c)| (t.as_str(), *c))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Parsed faceting output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FacetSet {
    fields: Vec<(String, FieldFacetResult)>,
    queries: Vec<(String, u64)>,
}

impl FacetSet {
    pub fn field(&self, key: &str) -> Option<&FieldFacetResult> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, f)| f)
    }

    pub fn query(&self, key: &str) -> Option<u64> {
        self.queries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, count)| *count)
    }

    pub fn field_keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }
}

pub struct FacetsParser;

impl ComponentParser for FacetsParser {
    fn parse(
        &self,
        _query: &dyn Query,
        component: &dyn Component,
        data: &Value,
    ) -> Result<ComponentResult, Error> {
        let facets = downcast::<Facets>(component)?;
        let counts = data
            .get("facet_counts")
            .ok_or_else(|| Error::missing_key("facet_counts"))?;

        let mut set = FacetSet::default();
        for facet in &facets.fields {
            if let Some(raw) = counts.get("facet_fields").and_then(|f| f.get(&facet.key)) {
                set.fields
                    .push((facet.key.clone(), parse_term_counts(&facet.key, raw)?));
            }
        }
        for facet in &facets.queries {
            if let Some(count) = counts
                .get("facet_queries")
                .and_then(|q| q.get(&facet.key))
                .and_then(Value::as_u64)
            {
                set.queries.push((facet.key.clone(), count));
            }
        }

        Ok(ComponentResult::Facets(set))
    }
}

/// Accepts the flat `[term, count, term, count]` layout as well as a
/// `{term: count}` map.
fn parse_term_counts(key: &str, raw: &Value) -> Result<FieldFacetResult, Error> {
    let malformed = || Error::parse(format!("malformed term counts for facet '{}'", key));
    let mut values = Vec::new();
    match raw {
        Value::Array(items) => {
            if items.len() % 2 != 0 {
                return Err(malformed());
            }
            for pair in items.chunks(2) {
                let term = pair[0].as_str().ok_or_else(malformed)?;
                let count = pair[1].as_u64().ok_or_else(malformed)?;
                values.push((term.to_string(), count));
            }
        }
        Value::Object(map) => {
            for (term, count) in map {
                values.push((term.clone(), count.as_u64().ok_or_else(malformed)?));
            }
        }
        _ => return Err(malformed()),
    }
    Ok(FieldFacetResult { values })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SelectQuery;
    use serde_json::json;

    fn sample() -> Facets {
        Facets::new()
            .with_mincount(1)
            .add_field(FacetField::new("category").with_limit(5))
            .unwrap()
            .add_field(
                FacetField::new("brand")
                    .with_key("brands")
                    .exclude("brandfilter"),
            )
            .unwrap()
            .add_query(FacetQuery::new("cheap", "price:[0 TO 10]"))
            .unwrap()
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let err = Facets::new()
            .add_field(FacetField::new("cat"))
            .unwrap()
            .add_query(FacetQuery::new("cat", "cat:x"))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn builds_facet_params() {
        let mut request = Request::get("select");
        FacetsBuilder.build(&sample(), &mut request).unwrap();
        let params = &request.params;

        assert_eq!(params.get("facet"), Some("true"));
        assert_eq!(params.get("facet.mincount"), Some("1"));
        assert_eq!(
            params.get_all("facet.field"),
            vec!["category", "{!key=brands ex=brandfilter}brand"]
        );
        assert_eq!(params.get("f.category.facet.limit"), Some("5"));
        assert_eq!(
            params.get_all("facet.query"),
            vec!["{!key=cheap}price:[0 TO 10]"]
        );
    }

    #[test]
    fn parses_flat_and_map_counts() {
        let data = json!({
            "facet_counts": {
                "facet_fields": {
                    "category": ["books", 10, "music", 3],
                    "brands": {"acme": 7}
                },
                "facet_queries": {"cheap": 4}
            }
        });
        let result = FacetsParser
            .parse(&SelectQuery::new(), &sample(), &data)
            .unwrap();
        let set = result.as_facets().unwrap();

        let category = set.field("category").unwrap();
        assert_eq!(category.get("books"), Some(10));
        assert_eq!(
            category.iter().map(|(t, _)| t).collect::<Vec<_>>(),
            vec!["books", "music"]
        );
        assert_eq!(set.field("brands").unwrap().get("acme"), Some(7));
        assert_eq!(set.query("cheap"), Some(4));
    }

    #[test]
    fn missing_facet_counts_is_a_parse_error() {
        let err = FacetsParser
            .parse(&SelectQuery::new(), &sample(), &json!({}))
            .unwrap_err();
        assert!(err.to_string().contains("facet_counts"));
    }

    #[test]
    fn odd_flat_list_is_malformed() {
        let data = json!({"facet_counts": {"facet_fields": {"category": ["books"]}}});
        assert!(FacetsParser
            .parse(&SelectQuery::new(), &sample(), &data)
            .is_err());
    }
}
