//! Wire write operations.

use docwire_codec::{ArrayValue, Timestamp, WireValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A stored document as sent and received over the wire.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Fully qualified document name.
    pub name: String,
    /// Top-level fields.
    #[serde(default)]
    pub fields: BTreeMap<String, WireValue>,
    /// Creation time, set by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<Timestamp>,
    /// Last update time, set by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<Timestamp>,
}

/// A condition on the target document evaluated by the backend at commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WirePrecondition {
    /// The document must (true) or must not (false) exist.
    Exists(bool),
    /// The document must have been last updated at exactly this time.
    UpdateTime(Timestamp),
}

/// Restricts a write or read to the listed fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMask {
    /// Escaped field paths.
    #[serde(default)]
    pub field_paths: Vec<String>,
}

/// Values the server can substitute for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerValue {
    /// The commit time of the write.
    RequestTime,
}

/// The operation a [`FieldTransform`] applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransformKind {
    /// Replace with a server-computed value.
    SetToServerValue(ServerValue),
    /// Numeric add.
    Increment(WireValue),
    /// Append elements not already present.
    AppendMissingElements(ArrayValue),
    /// Remove all instances of the elements.
    RemoveAllFromArray(ArrayValue),
}

/// A server-side transform of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldTransform {
    /// Escaped field path.
    pub field_path: String,
    /// Transform to apply.
    #[serde(flatten)]
    pub transform: TransformKind,
}

/// What a [`WireWrite`] does to its document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteOperation {
    /// Write the given fields.
    Update(Document),
    /// Delete the named document.
    Delete(String),
}

/// One write inside a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireWrite {
    /// Update or delete.
    #[serde(flatten)]
    pub operation: WriteOperation,
    /// Fields touched by an update; absent means the whole document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_mask: Option<DocumentMask>,
    /// Transforms applied after the update, in field order of discovery.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update_transforms: Vec<FieldTransform>,
    /// Condition checked by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_document: Option<WirePrecondition>,
}

impl WireWrite {
    /// The name of the document this write targets.
    pub fn document_name(&self) -> &str {
        match &self.operation {
            WriteOperation::Update(doc) => &doc.name,
            WriteOperation::Delete(name) => name,
        }
    }

    /// The update payload, if this is an update.
    pub fn update(&self) -> Option<&Document> {
        match &self.operation {
            WriteOperation::Update(doc) => Some(doc),
            WriteOperation::Delete(_) => None,
        }
    }

    /// True for delete writes.
    pub fn is_delete(&self) -> bool {
        matches!(self.operation, WriteOperation::Delete(_))
    }
}

/// Per-write outcome of a commit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireWriteResult {
    /// Last update time of the document after the write. Absent when the
    /// write was a no-op.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<Timestamp>,
    /// Results of the write's transforms, in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transform_results: Vec<WireValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_write_json_shape() {
        let write = WireWrite {
            operation: WriteOperation::Update(Document {
                name: "projects/p/databases/(default)/documents/c/d".into(),
                ..Document::default()
            }),
            update_mask: None,
            update_transforms: Vec::new(),
            current_document: Some(WirePrecondition::Exists(false)),
        };
        let json = serde_json::to_value(&write).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "update": {"name": "projects/p/databases/(default)/documents/c/d", "fields": {}},
                "currentDocument": {"exists": false}
            })
        );
    }

    #[test]
    fn transform_json_shape() {
        let transform = FieldTransform {
            field_path: "a.`b.c`".into(),
            transform: TransformKind::SetToServerValue(ServerValue::RequestTime),
        };
        assert_eq!(
            serde_json::to_value(&transform).unwrap(),
            serde_json::json!({"fieldPath": "a.`b.c`", "setToServerValue": "REQUEST_TIME"})
        );
    }

    #[test]
    fn delete_write_accessors() {
        let write = WireWrite {
            operation: WriteOperation::Delete("n".into()),
            update_mask: None,
            update_transforms: Vec::new(),
            current_document: None,
        };
        assert!(write.is_delete());
        assert_eq!(write.document_name(), "n");
        assert!(write.update().is_none());
    }
}
