//! Documents returned by the search service.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Error;

/// A result document: an ordered mapping of field names to values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Deserialize a field into a concrete type.
    ///
    /// Returns `Ok(None)` when the field is absent.
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, Error> {
        self.fields
            .get(name)
            .map(|value| serde_json::from_value(value.clone()).map_err(Error::from))
            .transpose()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl TryFrom<Value> for Document {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Error> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(Error::parse(format!(
                "expected a document object, got {}",
                other
            ))),
        }
    }
}

/// Parse a `{numFound, start, docs}` list into its parts.
pub(crate) fn parse_doc_list(list: &Value) -> Result<(u64, u64, Vec<Document>), Error> {
    let num_found = list
        .get("numFound")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::missing_key("numFound"))?;
    let start = list.get("start").and_then(Value::as_u64).unwrap_or(0);
    let documents = list
        .get("docs")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::missing_key("docs"))?
        .iter()
        .cloned()
        .map(Document::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((num_found, start, documents))
}
