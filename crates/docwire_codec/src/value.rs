//! Native value model.

use crate::error::{CodecError, CodecResult};
use crate::path::{DocumentRef, FieldPath};
use crate::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field name to value mapping used for document data and nested maps.
///
/// Equality is defined by the key set and values, never by insertion order.
pub type Map = BTreeMap<String, Value>;

/// A native document value.
///
/// Sentinels ([`Value::Sentinel`]) and [`Value::Undefined`] are part of the
/// model so that the mutation encoder can walk user data in one pass; neither
/// ever reaches the wire as a plain value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicit null.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed 64-bit integer.
    Integer(i64),
    /// Double precision float. NaN and infinities are allowed.
    Double(f64),
    /// Point in time.
    Timestamp(Timestamp),
    /// UTF-8 string.
    String(String),
    /// Opaque byte blob.
    Bytes(Vec<u8>),
    /// Reference to another document.
    Reference(DocumentRef),
    /// Latitude/longitude pair.
    GeoPoint(GeoPoint),
    /// Ordered list of values.
    Array(Vec<Value>),
    /// Nested map.
    Map(Map),
    /// Dense vector used for similarity search.
    Vector(VectorValue),
    /// Marker for a value computed by the server.
    Sentinel(FieldValue),
    /// An absent value. Rejected by the encoder unless undefined
    /// properties are configured to be ignored.
    Undefined,
}

impl Value {
    /// Builds a map value from `(key, value)` pairs.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Short type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Double(_) => "double",
            Value::Timestamp(_) => "timestamp",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Reference(_) => "reference",
            Value::GeoPoint(_) => "geo point",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Vector(_) => "vector",
            Value::Sentinel(sentinel) => sentinel.method_name(),
            Value::Undefined => "\"undefined\"",
        }
    }

    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get this value as a boolean, if it is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer, if it is one.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a double, if it is one.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a string slice, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as a timestamp, if it is one.
    pub fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Get this value as an array, if it is one.
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Get this value as a map, if it is one.
    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Get this value as a sentinel, if it is one.
    pub fn as_sentinel(&self) -> Option<&FieldValue> {
        match self {
            Value::Sentinel(s) => Some(s),
            _ => None,
        }
    }

    /// Follows `path` through nested maps.
    pub fn get_path(&self, path: &FieldPath) -> Option<&Value> {
        let mut current = self;
        for segment in path.segments() {
            current = current.as_map()?.get(segment)?;
        }
        Some(current)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Integer(i64::from(n))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Timestamp> for Value {
    fn from(ts: Timestamp) -> Self {
        Value::Timestamp(ts)
    }
}

impl From<GeoPoint> for Value {
    fn from(p: GeoPoint) -> Self {
        Value::GeoPoint(p)
    }
}

impl From<DocumentRef> for Value {
    fn from(r: DocumentRef) -> Self {
        Value::Reference(r)
    }
}

impl From<VectorValue> for Value {
    fn from(v: VectorValue) -> Self {
        Value::Vector(v)
    }
}

impl From<FieldValue> for Value {
    fn from(s: FieldValue) -> Self {
        Value::Sentinel(s)
    }
}

impl From<Map> for Value {
    fn from(m: Map) -> Self {
        Value::Map(m)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

/// A geographical point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    /// Creates a point; latitude must be in `[-90, 90]` and longitude in
    /// `[-180, 180]`.
    pub fn new(latitude: f64, longitude: f64) -> CodecResult<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CodecError::invalid_argument(format!(
                "latitude must be in [-90, 90], got {latitude}"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CodecError::invalid_argument(format!(
                "longitude must be in [-180, 180], got {longitude}"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Latitude in degrees.
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// A dense numeric vector.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorValue(Vec<f64>);

impl VectorValue {
    /// Wraps the given components.
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self(values.into())
    }

    /// The components.
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Consumes the vector, returning its components.
    pub fn into_values(self) -> Vec<f64> {
        self.0
    }
}

/// A numeric operand for [`FieldValue::Increment`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// Integer operand.
    Integer(i64),
    /// Double operand.
    Double(f64),
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Number::Integer(n)
    }
}

impl From<i32> for Number {
    fn from(n: i32) -> Self {
        Number::Integer(i64::from(n))
    }
}

impl From<f64> for Number {
    fn from(n: f64) -> Self {
        Number::Double(n)
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Integer(i) => Value::Integer(i),
            Number::Double(d) => Value::Double(d),
        }
    }
}

/// Server-computed value markers.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Removes the field.
    Delete,
    /// Replaced by the server's commit time.
    ServerTimestamp,
    /// Adds the operand to the current numeric value.
    Increment(Number),
    /// Appends elements not already present.
    ArrayUnion(Vec<Value>),
    /// Removes every instance of the given elements.
    ArrayRemove(Vec<Value>),
}

impl FieldValue {
    /// `FieldValue::Increment` from any numeric operand.
    pub fn increment(n: impl Into<Number>) -> Self {
        FieldValue::Increment(n.into())
    }

    /// `FieldValue::ArrayUnion` from any convertible elements.
    pub fn array_union<T: Into<Value>>(elements: impl IntoIterator<Item = T>) -> Self {
        FieldValue::ArrayUnion(elements.into_iter().map(Into::into).collect())
    }

    /// `FieldValue::ArrayRemove` from any convertible elements.
    pub fn array_remove<T: Into<Value>>(elements: impl IntoIterator<Item = T>) -> Self {
        FieldValue::ArrayRemove(elements.into_iter().map(Into::into).collect())
    }

    /// Name used in validation messages.
    pub fn method_name(&self) -> &'static str {
        match self {
            FieldValue::Delete => "FieldValue.delete()",
            FieldValue::ServerTimestamp => "FieldValue.serverTimestamp()",
            FieldValue::Increment(_) => "FieldValue.increment()",
            FieldValue::ArrayUnion(_) => "FieldValue.arrayUnion()",
            FieldValue::ArrayRemove(_) => "FieldValue.arrayRemove()",
        }
    }

    /// True for [`FieldValue::Delete`].
    pub fn is_delete(&self) -> bool {
        matches!(self, FieldValue::Delete)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_equality_ignores_insertion_order() {
        let a = Value::map([("z", 1), ("a", 2)]);
        let b = Value::map([("a", 2), ("z", 1)]);
        assert_eq!(a, b);
    }

    #[test]
    fn get_path_walks_nested_maps() {
        let value = Value::map([("a", Value::map([("b", "c")]))]);
        let path = FieldPath::from_dotted("a.b").unwrap();
        assert_eq!(value.get_path(&path), Some(&Value::from("c")));
        let missing = FieldPath::from_dotted("a.b.c").unwrap();
        assert_eq!(value.get_path(&missing), None);
    }

    #[test]
    fn geo_point_range() {
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(90.1, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -180.5).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn sentinel_constructors() {
        assert_eq!(FieldValue::increment(3), FieldValue::Increment(Number::Integer(3)));
        assert_eq!(
            FieldValue::array_union(["a", "b"]),
            FieldValue::ArrayUnion(vec![Value::from("a"), Value::from("b")])
        );
        assert!(FieldValue::Delete.is_delete());
        assert_eq!(
            Value::from(FieldValue::ServerTimestamp).type_name(),
            "FieldValue.serverTimestamp()"
        );
    }

    #[test]
    fn from_impls() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42i64), Value::Integer(42));
        assert_eq!(Value::from(42i32), Value::Integer(42));
        assert_eq!(Value::from(1.5), Value::Double(1.5));
        assert_eq!(Value::from("hi"), Value::String("hi".into()));
        assert_eq!(Value::from(vec![1u8, 2]), Value::Bytes(vec![1, 2]));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(()), Value::Null);
    }
}
