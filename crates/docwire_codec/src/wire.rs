//! Wire value representation.

use crate::timestamp::Timestamp;
use crate::value::GeoPoint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A field value as the backend represents it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WireValue {
    /// Null.
    NullValue,
    /// Boolean.
    BooleanValue(bool),
    /// 64-bit integer.
    IntegerValue(i64),
    /// Double.
    DoubleValue(f64),
    /// Timestamp.
    TimestampValue(Timestamp),
    /// String.
    StringValue(String),
    /// Bytes.
    BytesValue(Vec<u8>),
    /// Fully qualified document name.
    ReferenceValue(String),
    /// Lat/lng pair.
    GeoPointValue(GeoPoint),
    /// Array.
    ArrayValue(ArrayValue),
    /// Map.
    MapValue(MapValue),
}

/// Wire array body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArrayValue {
    /// Elements in order.
    #[serde(default)]
    pub values: Vec<WireValue>,
}

/// Wire map body.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MapValue {
    /// Members by field name.
    #[serde(default)]
    pub fields: BTreeMap<String, WireValue>,
}

impl WireValue {
    /// Convenience constructor for a map value.
    pub fn map(fields: BTreeMap<String, WireValue>) -> Self {
        WireValue::MapValue(MapValue { fields })
    }

    /// Convenience constructor for an array value.
    pub fn array(values: Vec<WireValue>) -> Self {
        WireValue::ArrayValue(ArrayValue { values })
    }

    /// Convenience constructor for a string value.
    pub fn string(s: impl Into<String>) -> Self {
        WireValue::StringValue(s.into())
    }

    /// The map members, if this is a map.
    pub fn as_map(&self) -> Option<&BTreeMap<String, WireValue>> {
        match self {
            WireValue::MapValue(m) => Some(&m.fields),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape_uses_camel_case_tags() {
        let value = WireValue::map(BTreeMap::from([(
            "n".to_string(),
            WireValue::IntegerValue(3),
        )]));
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"mapValue": {"fields": {"n": {"integerValue": 3}}}})
        );
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let value: WireValue = serde_json::from_str(r#"{"arrayValue": {}}"#).unwrap();
        assert_eq!(value, WireValue::array(vec![]));
    }
}
