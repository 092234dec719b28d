//! Wire to native value decoder.

use crate::encoder::{TYPE_FIELD, VECTOR_TYPE_TAG, VECTOR_VALUE_FIELD};
use crate::error::{CodecError, CodecResult};
use crate::path::DocumentRef;
use crate::value::{Map, Value, VectorValue};
use crate::wire::WireValue;
use std::collections::BTreeMap;

/// Decode a wire value.
///
/// # Errors
///
/// Returns an error for malformed references and vectors with
/// non-numeric components.
pub fn decode(value: &WireValue) -> CodecResult<Value> {
    match value {
        WireValue::NullValue => Ok(Value::Null),
        WireValue::BooleanValue(b) => Ok(Value::Bool(*b)),
        WireValue::IntegerValue(n) => Ok(Value::Integer(*n)),
        WireValue::DoubleValue(n) => Ok(Value::Double(*n)),
        WireValue::TimestampValue(ts) => Ok(Value::Timestamp(*ts)),
        WireValue::StringValue(s) => Ok(Value::String(s.clone())),
        WireValue::BytesValue(b) => Ok(Value::Bytes(b.clone())),
        WireValue::ReferenceValue(name) => DocumentRef::from_name(name)
            .map(Value::Reference)
            .map_err(|e| CodecError::decoding(format!("bad reference value: {e}"))),
        WireValue::GeoPointValue(p) => Ok(Value::GeoPoint(*p)),
        WireValue::ArrayValue(array) => array
            .values
            .iter()
            .map(decode)
            .collect::<CodecResult<Vec<_>>>()
            .map(Value::Array),
        WireValue::MapValue(map) => {
            if is_vector(&map.fields) {
                return decode_vector(&map.fields);
            }
            decode_fields(&map.fields).map(Value::Map)
        }
    }
}

/// Decode an optional field.
///
/// An absent field yields `None`; an explicit null yields `Some(Value::Null)`.
pub fn decode_field(value: Option<&WireValue>) -> CodecResult<Option<Value>> {
    value.map(decode).transpose()
}

/// Decode a document's fields.
pub fn decode_fields(fields: &BTreeMap<String, WireValue>) -> CodecResult<Map> {
    fields
        .iter()
        .map(|(k, v)| decode(v).map(|v| (k.clone(), v)))
        .collect()
}

fn is_vector(fields: &BTreeMap<String, WireValue>) -> bool {
    matches!(
        fields.get(TYPE_FIELD),
        Some(WireValue::StringValue(tag)) if tag == VECTOR_TYPE_TAG
    )
}

fn decode_vector(fields: &BTreeMap<String, WireValue>) -> CodecResult<Value> {
    let components = match fields.get(VECTOR_VALUE_FIELD) {
        Some(WireValue::ArrayValue(array)) => &array.values,
        None => return Ok(Value::Vector(VectorValue::default())),
        Some(_) => return Err(CodecError::decoding("vector value must hold an array")),
    };
    let mut values = Vec::with_capacity(components.len());
    for component in components {
        match component {
            WireValue::DoubleValue(n) => values.push(*n),
            #[allow(clippy::cast_precision_loss)]
            WireValue::IntegerValue(n) => values.push(*n as f64),
            other => {
                return Err(CodecError::decoding(format!(
                    "vector components must be numbers, got {other:?}"
                )))
            }
        }
    }
    Ok(Value::Vector(VectorValue::new(values)))
}
