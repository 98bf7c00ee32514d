use anyhow::{Result, anyhow};
use serde_json::Value as JsonValue;

/// One attribute value inside a normalized record: a scalar in canonical
/// string form, or a list of nested records.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(String),
    Records(Vec<NormalizedRecord>),
}

impl FieldValue {
    /// Blank scalars and empty lists carry no statistical weight.
    pub fn is_absent(&self) -> bool {
        match self {
            FieldValue::Scalar(text) => text.trim().is_empty(),
            FieldValue::Records(records) => records.is_empty(),
        }
    }
}

/// An ordered mapping from attribute name to value. Names are unique and
/// keep first-insertion order, which drives schema discovery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRecord {
    fields: Vec<(String, FieldValue)>,
}

impl NormalizedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        let name = name.into();
        if let Some(existing) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            existing.1 = value;
        } else {
            self.fields.push((name, value));
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Zips header names against raw fields positionally. Caller has already
    /// verified the counts match.
    pub fn from_fields(headers: &[String], fields: Vec<String>) -> Self {
        let mut record = Self::new();
        for (name, value) in headers.iter().zip(fields) {
            record.insert(name.clone(), FieldValue::Scalar(value.trim().to_string()));
        }
        record
    }

    /// Parses one physical line as a complete structured record.
    pub fn from_json_line(line: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(line)?;
        Self::from_json(&value).ok_or_else(|| anyhow!("line is not a JSON object"))
    }

    /// Converts a JSON object into a normalized record. Non-objects yield
    /// `None`; attribute order follows the document.
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        let object = value.as_object()?;
        let mut record = Self::new();
        for (name, value) in object {
            record.insert(name.clone(), json_to_field(value));
        }
        Some(record)
    }
}

fn json_to_field(value: &JsonValue) -> FieldValue {
    match value {
        JsonValue::Null => FieldValue::Scalar(String::new()),
        JsonValue::Bool(b) => FieldValue::Scalar(b.to_string()),
        JsonValue::Number(n) => FieldValue::Scalar(n.to_string()),
        JsonValue::String(s) => FieldValue::Scalar(s.clone()),
        JsonValue::Array(items) => {
            if items.iter().any(JsonValue::is_object) {
                FieldValue::Records(
                    items
                        .iter()
                        .filter_map(NormalizedRecord::from_json)
                        .collect(),
                )
            } else if items.is_empty() {
                FieldValue::Records(Vec::new())
            } else {
                // A list of scalars is canonicalized to its compact JSON form.
                FieldValue::Scalar(
                    serde_json::to_string(value).unwrap_or_else(|_| String::new()),
                )
            }
        }
        JsonValue::Object(_) => {
            // A bare sub-object is profiled as a one-element list of records.
            FieldValue::Records(NormalizedRecord::from_json(value).into_iter().collect())
        }
    }
}
