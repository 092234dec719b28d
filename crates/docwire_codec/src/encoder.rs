//! Native to wire value encoder.

use crate::error::{CodecError, CodecResult};
use crate::path::FieldPath;
use crate::value::{Map, Value};
use crate::wire::WireValue;
use std::collections::BTreeMap;

/// Map key carrying the type tag of specially encoded maps.
pub const TYPE_FIELD: &str = "__type__";

/// Tag value marking an encoded [`crate::VectorValue`].
pub const VECTOR_TYPE_TAG: &str = "__vector__";

/// Map key holding the components of an encoded vector.
pub const VECTOR_VALUE_FIELD: &str = "value";

/// Options controlling encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Drop [`Value::Undefined`] entries from maps and arrays instead of
    /// failing.
    pub ignore_undefined_properties: bool,
}

/// Encode a single value with default options.
///
/// # Errors
///
/// Fails for sentinels, which must be lifted into field transforms first,
/// and for [`Value::Undefined`].
pub fn encode(value: &Value) -> CodecResult<WireValue> {
    ValueEncoder::default().encode(value)
}

/// Stateless encoder from [`Value`] to [`WireValue`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueEncoder {
    options: EncodeOptions,
}

impl ValueEncoder {
    /// Create a new encoder.
    pub fn new(options: EncodeOptions) -> Self {
        Self { options }
    }

    /// The options in effect.
    pub fn options(&self) -> EncodeOptions {
        self.options
    }

    /// Encode a value. A top-level [`Value::Undefined`] is always an error.
    pub fn encode(&self, value: &Value) -> CodecResult<WireValue> {
        self.encode_at(value, None, false)?
            .ok_or_else(|| CodecError::unsupported_value(Value::Undefined.type_name(), None))
    }

    /// Encode document fields, with error messages naming the offending field.
    pub fn encode_fields(&self, fields: &Map) -> CodecResult<BTreeMap<String, WireValue>> {
        self.encode_map(fields, None)
    }

    /// Encode the value found at `path`; used for leaf values extracted from
    /// nested data so that errors carry the full path.
    pub fn encode_field(&self, value: &Value, path: &FieldPath) -> CodecResult<Option<WireValue>> {
        self.encode_at(value, Some(path), false)
    }

    fn encode_at(
        &self,
        value: &Value,
        path: Option<&FieldPath>,
        in_array: bool,
    ) -> CodecResult<Option<WireValue>> {
        let wire = match value {
            Value::Null => WireValue::NullValue,
            Value::Bool(b) => WireValue::BooleanValue(*b),
            Value::Integer(n) => WireValue::IntegerValue(*n),
            Value::Double(n) => WireValue::DoubleValue(*n),
            Value::Timestamp(ts) => WireValue::TimestampValue(*ts),
            Value::String(s) => WireValue::StringValue(s.clone()),
            Value::Bytes(b) => WireValue::BytesValue(b.clone()),
            Value::Reference(doc) => WireValue::ReferenceValue(doc.formatted_name()),
            Value::GeoPoint(p) => WireValue::GeoPointValue(*p),
            Value::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(encoded) = self.encode_at(item, path, true)? {
                        values.push(encoded);
                    }
                }
                WireValue::array(values)
            }
            Value::Map(fields) => WireValue::map(self.encode_map(fields, path)?),
            Value::Vector(vector) => {
                let components = vector
                    .values()
                    .iter()
                    .map(|n| WireValue::DoubleValue(*n))
                    .collect();
                WireValue::map(BTreeMap::from([
                    (TYPE_FIELD.to_string(), WireValue::string(VECTOR_TYPE_TAG)),
                    (VECTOR_VALUE_FIELD.to_string(), WireValue::array(components)),
                ]))
            }
            Value::Sentinel(sentinel) => {
                let location = path.map(FieldPath::formatted_name);
                let message = if in_array {
                    format!("{} cannot be used inside of an array", sentinel.method_name())
                } else {
                    format!(
                        "{} must be converted into a field transform before encoding",
                        sentinel.method_name()
                    )
                };
                return Err(CodecError::invalid_argument(match location {
                    Some(field) => format!("{message} (found in field \"{field}\")"),
                    None => message,
                }));
            }
            Value::Undefined => {
                if self.options.ignore_undefined_properties {
                    return Ok(None);
                }
                return Err(CodecError::unsupported_value(
                    value.type_name(),
                    path.map(FieldPath::formatted_name),
                ));
            }
        };
        Ok(Some(wire))
    }

    fn encode_map(
        &self,
        fields: &Map,
        path: Option<&FieldPath>,
    ) -> CodecResult<BTreeMap<String, WireValue>> {
        let mut out = BTreeMap::new();
        for (key, value) in fields {
            let child = match path {
                Some(parent) => parent.child(key.clone()),
                None => FieldPath::literal(key.clone()),
            };
            if let Some(encoded) = self.encode_at(value, Some(&child), false)? {
                out.insert(key.clone(), encoded);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{DatabaseId, DocumentRef};
    use crate::timestamp::Timestamp;
    use crate::value::{FieldValue, GeoPoint, VectorValue};

    #[test]
    fn encode_scalars() {
        assert_eq!(encode(&Value::Null).unwrap(), WireValue::NullValue);
        assert_eq!(encode(&Value::Bool(true)).unwrap(), WireValue::BooleanValue(true));
        assert_eq!(encode(&Value::Integer(-7)).unwrap(), WireValue::IntegerValue(-7));
        assert_eq!(encode(&Value::Double(0.5)).unwrap(), WireValue::DoubleValue(0.5));
        assert_eq!(encode(&Value::from("x")).unwrap(), WireValue::string("x"));
        assert_eq!(
            encode(&Value::Bytes(vec![1, 2])).unwrap(),
            WireValue::BytesValue(vec![1, 2])
        );
    }

    #[test]
    fn encode_timestamp_and_geo_point() {
        let ts = Timestamp::new(-14_182_920, 123_000_123).unwrap();
        assert_eq!(encode(&ts.into()).unwrap(), WireValue::TimestampValue(ts));

        let point = GeoPoint::new(1.5, -2.5).unwrap();
        assert_eq!(encode(&point.into()).unwrap(), WireValue::GeoPointValue(point));
    }

    #[test]
    fn encode_reference_uses_full_name() {
        let doc = DocumentRef::new(DatabaseId::default_database("p"), "c/d").unwrap();
        assert_eq!(
            encode(&doc.into()).unwrap(),
            WireValue::ReferenceValue("projects/p/databases/(default)/documents/c/d".into())
        );
    }

    #[test]
    fn encode_vector_as_tagged_map() {
        let encoded = encode(&VectorValue::new(vec![1.0, 2.0]).into()).unwrap();
        let fields = encoded.as_map().unwrap();
        assert_eq!(fields[TYPE_FIELD], WireValue::string(VECTOR_TYPE_TAG));
        assert_eq!(
            fields[VECTOR_VALUE_FIELD],
            WireValue::array(vec![WireValue::DoubleValue(1.0), WireValue::DoubleValue(2.0)])
        );
    }

    #[test]
    fn nested_undefined_is_rejected_with_path() {
        let value = Value::map([("a", Value::map([("b", Value::Undefined)]))]);
        let err = encode(&value).unwrap_err();
        assert_eq!(
            err,
            CodecError::unsupported_value("\"undefined\"", Some("a.b".into()))
        );
    }

    #[test]
    fn undefined_is_dropped_when_ignored() {
        let encoder = ValueEncoder::new(EncodeOptions {
            ignore_undefined_properties: true,
        });
        let value = Value::map([
            ("keep", Value::from(1)),
            ("drop", Value::Undefined),
            ("list", Value::Array(vec![Value::Undefined, Value::from(2)])),
        ]);
        let encoded = encoder.encode(&value).unwrap();
        let fields = encoded.as_map().unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(
            fields["list"],
            WireValue::array(vec![WireValue::IntegerValue(2)])
        );

        assert!(encoder.encode(&Value::Undefined).is_err());
    }

    #[test]
    fn sentinels_are_not_plain_values() {
        let err = encode(&Value::map([("t", FieldValue::ServerTimestamp)])).unwrap_err();
        assert!(matches!(err, CodecError::InvalidArgument { .. }));

        let err = encode(&Value::Array(vec![FieldValue::Delete.into()])).unwrap_err();
        assert!(err.to_string().contains("cannot be used inside of an array"));
    }
}
