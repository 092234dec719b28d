//! Sentinel extraction and field mask construction.

use crate::error::{Error, Result};
use docwire_codec::{
    ArrayValue, FieldPath, FieldValue, Map, Value, ValueEncoder, WireValue,
};
use docwire_protocol::{FieldTransform, ServerValue, TransformKind};

/// Where a delete sentinel may appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeletePolicy {
    /// Anywhere in the data (set with merge).
    Allowed,
    /// Nowhere in the walked data.
    Rejected,
}

/// Walks user data, lifting sentinels out of the plain value.
///
/// Delete sentinels are dropped from the data; the caller's field mask
/// decides whether the field is removed.
pub(crate) struct FieldExtractor<'a> {
    encoder: &'a ValueEncoder,
    policy: DeletePolicy,
    operation: &'static str,
    transforms: Vec<FieldTransform>,
}

impl<'a> FieldExtractor<'a> {
    pub(crate) fn new(
        encoder: &'a ValueEncoder,
        policy: DeletePolicy,
        operation: &'static str,
    ) -> Self {
        Self {
            encoder,
            policy,
            operation,
            transforms: Vec::new(),
        }
    }

    /// Returns `fields` with every sentinel removed.
    pub(crate) fn extract_map(&mut self, fields: &Map, parent: Option<&FieldPath>) -> Result<Map> {
        let mut plain = Map::new();
        for (key, value) in fields {
            let path = child_path(parent, key)?;
            if let Some(value) = self.extract_value(value, &path)? {
                plain.insert(key.clone(), value);
            }
        }
        Ok(plain)
    }

    /// Returns the plain part of `value`, or `None` when the whole value was
    /// a sentinel.
    pub(crate) fn extract_value(&mut self, value: &Value, path: &FieldPath) -> Result<Option<Value>> {
        let kind = match value {
            Value::Map(fields) => return Ok(Some(Value::Map(self.extract_map(fields, Some(path))?))),
            Value::Sentinel(FieldValue::Delete) => {
                if self.policy == DeletePolicy::Rejected {
                    return Err(Error::invalid_argument(format!(
                        "FieldValue.delete() must appear at the top-level and can only be used \
                         in update() or set() with {{merge:true}} (found in field \"{path}\" of {})",
                        self.operation
                    )));
                }
                return Ok(None);
            }
            Value::Sentinel(FieldValue::ServerTimestamp) => {
                TransformKind::SetToServerValue(ServerValue::RequestTime)
            }
            Value::Sentinel(FieldValue::Increment(operand)) => {
                TransformKind::Increment(self.encoder.encode(&Value::from(*operand))?)
            }
            Value::Sentinel(FieldValue::ArrayUnion(elements)) => {
                TransformKind::AppendMissingElements(self.encode_elements(elements, path)?)
            }
            Value::Sentinel(FieldValue::ArrayRemove(elements)) => {
                TransformKind::RemoveAllFromArray(self.encode_elements(elements, path)?)
            }
            other => return Ok(Some(other.clone())),
        };
        self.transforms.push(FieldTransform {
            field_path: path.formatted_name(),
            transform: kind,
        });
        Ok(None)
    }

    fn encode_elements(&self, elements: &[Value], path: &FieldPath) -> Result<ArrayValue> {
        match self.encoder.encode_field(&Value::Array(elements.to_vec()), path)? {
            Some(WireValue::ArrayValue(array)) => Ok(array),
            _ => Ok(ArrayValue::default()),
        }
    }

    /// Extracted transforms, in discovery order.
    pub(crate) fn into_transforms(self) -> Vec<FieldTransform> {
        self.transforms
    }
}

/// Every leaf path of `fields`.
///
/// Non-empty maps are descended into; empty maps, arrays, scalars and
/// sentinels end a path. Delete sentinels and undefined values contribute
/// nothing.
pub(crate) fn leaf_paths(fields: &Map, parent: Option<&FieldPath>, out: &mut Vec<FieldPath>) -> Result<()> {
    for (key, value) in fields {
        let path = child_path(parent, key)?;
        match value {
            Value::Map(nested) if !nested.is_empty() => leaf_paths(nested, Some(&path), out)?,
            Value::Sentinel(FieldValue::Delete) | Value::Undefined => {}
            _ => out.push(path),
        }
    }
    Ok(())
}

/// Copies the values found at `paths` into a new nested map.
pub(crate) fn project(fields: &Map, paths: &[FieldPath]) -> Result<Map> {
    let root = Value::Map(fields.clone());
    let mut out = Map::new();
    for path in paths {
        let value = root.get_path(path).ok_or_else(|| {
            Error::invalid_argument(format!("Input data is missing for field \"{path}\"."))
        })?;
        insert_at(&mut out, path, value.clone())?;
    }
    Ok(out)
}

/// Stores `value` at `path`, creating intermediate maps.
pub(crate) fn insert_at(fields: &mut Map, path: &FieldPath, value: Value) -> Result<()> {
    let (last, parents) = match path.segments().split_last() {
        Some(split) => split,
        None => return Err(Error::invalid_argument("field path cannot be empty")),
    };
    let mut current = fields;
    for segment in parents {
        let entry = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Map(Map::new()));
        current = match entry {
            Value::Map(nested) => nested,
            _ => return Err(Error::invalid_argument(format!("field \"{path}\" is not a map"))),
        };
    }
    current.insert(last.clone(), value);
    Ok(())
}

/// Keeps the first occurrence of each path.
pub(crate) fn dedup_paths(paths: &[FieldPath]) -> Vec<FieldPath> {
    let mut out: Vec<FieldPath> = Vec::with_capacity(paths.len());
    for path in paths {
        if !out.contains(path) {
            out.push(path.clone());
        }
    }
    out
}

fn child_path(parent: Option<&FieldPath>, key: &str) -> Result<FieldPath> {
    match parent {
        Some(parent) => Ok(parent.child(key)),
        None => Ok(FieldPath::new([key])?),
    }
}
