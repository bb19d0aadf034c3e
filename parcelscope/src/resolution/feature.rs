//! Resolved parcel values.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A scalar attribute value.
///
/// Nested JSON arrays and objects are flattened to their JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<&Value> for AttributeValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => AttributeValue::Null,
            Value::Bool(b) => AttributeValue::Bool(*b),
            Value::Number(n) => n
                .as_f64()
                .map(AttributeValue::Number)
                .unwrap_or_else(|| AttributeValue::Text(n.to_string())),
            Value::String(s) => AttributeValue::Text(s.clone()),
            other => AttributeValue::Text(other.to_string()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::Text(s.to_string())
    }
}

impl From<f64> for AttributeValue {
    fn from(n: f64) -> Self {
        AttributeValue::Number(n)
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => f.write_str("—"),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Number(n) => write!(f, "{}", n),
            AttributeValue::Text(s) => f.write_str(s),
        }
    }
}

/// Attribute map keyed by property name.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Flatten a JSON property object into scalar attributes.
pub fn attributes_from_json(properties: &serde_json::Map<String, Value>) -> Attributes {
    properties
        .iter()
        .map(|(k, v)| (k.clone(), AttributeValue::from(v)))
        .collect()
}

/// Which resolution tier produced a parcel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    Tile,
    Fallback,
    CoordinateQuery,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Tile => "tile",
            Provenance::Fallback => "fallback",
            Provenance::CoordinateQuery => "coordinate-query",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parcel resolved for one click.
///
/// Built fresh on every resolution and handed to the caller; the engine keeps
/// no reference to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelFeature {
    pub id: Option<String>,
    pub geometry: Option<geojson::Geometry>,
    pub attributes: Attributes,
    pub provenance: Provenance,
    /// `false` when the tile tier fell back to raw tile attributes because
    /// enrichment failed.
    pub enriched: bool,
}

impl ParcelFeature {
    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attributes_flatten_nested_values() {
        let props = json!({
            "owner": "ACME LLC",
            "acres": 1.25,
            "vacant": false,
            "zoning": null,
            "tags": ["a", "b"],
        });
        let attrs = attributes_from_json(props.as_object().unwrap());

        assert_eq!(attrs["owner"], AttributeValue::Text("ACME LLC".into()));
        assert_eq!(attrs["acres"], AttributeValue::Number(1.25));
        assert_eq!(attrs["vacant"], AttributeValue::Bool(false));
        assert_eq!(attrs["zoning"], AttributeValue::Null);
        assert_eq!(attrs["tags"], AttributeValue::Text("[\"a\",\"b\"]".into()));
    }

    #[test]
    fn test_provenance_serializes_kebab_case() {
        let text = serde_json::to_string(&Provenance::CoordinateQuery).unwrap();
        assert_eq!(text, "\"coordinate-query\"");
    }
}
