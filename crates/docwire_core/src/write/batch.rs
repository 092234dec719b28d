//! Ordered accumulation of encoded writes.

use super::{document_data, encode_write, SetOptions, UpdateData, WriteOp};
use crate::error::Result;
use crate::precondition::Precondition;
use docwire_codec::{DocumentRef, EncodeOptions, Value, ValueEncoder};
use docwire_protocol::WireWrite;

/// A list of writes committed together.
///
/// Each call validates and encodes its write immediately, so invalid input
/// fails at the call site and leaves the batch unchanged.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    encoder: ValueEncoder,
    writes: Vec<WireWrite>,
}

impl WriteBatch {
    /// Creates an empty batch.
    pub fn new(options: EncodeOptions) -> Self {
        Self {
            encoder: ValueEncoder::new(options),
            writes: Vec::new(),
        }
    }

    /// Creates `document`, failing at commit if it already exists.
    pub fn create(&mut self, document: &DocumentRef, data: impl Into<Value>) -> Result<&mut Self> {
        let data = document_data(data.into())?;
        self.push(document, WriteOp::Create { data })
    }

    /// Replaces `document` with `data`.
    pub fn set(&mut self, document: &DocumentRef, data: impl Into<Value>) -> Result<&mut Self> {
        self.set_with_options(document, data, SetOptions::Overwrite)
    }

    /// Writes `data` to `document`, replacing or merging per `options`.
    pub fn set_with_options(
        &mut self,
        document: &DocumentRef,
        data: impl Into<Value>,
        options: SetOptions,
    ) -> Result<&mut Self> {
        let data = document_data(data.into())?;
        self.push(document, WriteOp::Set { data, options })
    }

    /// Updates fields of an existing document.
    pub fn update(&mut self, document: &DocumentRef, data: impl Into<UpdateData>) -> Result<&mut Self> {
        let fields = data.into().into_fields()?;
        self.push(
            document,
            WriteOp::Update {
                fields,
                precondition: None,
            },
        )
    }

    /// Updates fields, checking `precondition` instead of existence.
    pub fn update_with_precondition(
        &mut self,
        document: &DocumentRef,
        data: impl Into<UpdateData>,
        precondition: Precondition,
    ) -> Result<&mut Self> {
        let fields = data.into().into_fields()?;
        self.push(
            document,
            WriteOp::Update {
                fields,
                precondition: Some(precondition),
            },
        )
    }

    /// Deletes `document`.
    pub fn delete(&mut self, document: &DocumentRef) -> Result<&mut Self> {
        self.push(document, WriteOp::Delete { precondition: None })
    }

    /// Deletes `document` if `precondition` holds.
    pub fn delete_with_precondition(
        &mut self,
        document: &DocumentRef,
        precondition: Precondition,
    ) -> Result<&mut Self> {
        self.push(
            document,
            WriteOp::Delete {
                precondition: Some(precondition),
            },
        )
    }

    /// Encodes and appends one write.
    pub fn push(&mut self, document: &DocumentRef, op: WriteOp) -> Result<&mut Self> {
        let write = encode_write(document, &op, &self.encoder)?;
        self.writes.push(write);
        Ok(self)
    }

    /// Encoded writes, in call order.
    pub fn writes(&self) -> &[WireWrite] {
        &self.writes
    }

    /// Number of writes.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// True when nothing was written.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Removes and returns every write.
    pub fn take_writes(&mut self) -> Vec<WireWrite> {
        std::mem::take(&mut self.writes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docwire_codec::{DatabaseId, FieldValue};

    fn doc(path: &str) -> DocumentRef {
        DocumentRef::new(DatabaseId::default_database("p"), path).unwrap()
    }

    #[test]
    fn writes_keep_call_order() {
        let mut batch = WriteBatch::default();
        batch
            .set(&doc("c/1"), Value::map([("a", 1)]))
            .unwrap()
            .update(&doc("c/2"), ("b", FieldValue::ServerTimestamp))
            .unwrap()
            .delete(&doc("c/3"))
            .unwrap();

        let names: Vec<&str> = batch.writes().iter().map(|w| w.document_name()).collect();
        assert_eq!(batch.len(), 3);
        assert!(names[0].ends_with("c/1"));
        assert!(names[1].ends_with("c/2"));
        assert!(names[2].ends_with("c/3"));
    }

    #[test]
    fn invalid_write_leaves_batch_unchanged() {
        let mut batch = WriteBatch::default();
        assert!(batch.set(&doc("c/1"), Value::from("not a map")).is_err());
        assert!(batch
            .update(&doc("c/1"), UpdateData::new())
            .is_err());
        assert!(batch.is_empty());
    }

    #[test]
    fn ignore_undefined_properties() {
        let mut strict = WriteBatch::default();
        let data = Value::map([("a", Value::from(1)), ("b", Value::Undefined)]);
        assert!(strict.set(&doc("c/1"), data.clone()).is_err());

        let mut lenient = WriteBatch::new(EncodeOptions {
            ignore_undefined_properties: true,
        });
        lenient.set(&doc("c/1"), data).unwrap();
        let fields = &lenient.writes()[0].update().unwrap().fields;
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn take_writes_empties_batch() {
        let mut batch = WriteBatch::default();
        batch.delete(&doc("c/1")).unwrap();
        assert_eq!(batch.take_writes().len(), 1);
        assert!(batch.is_empty());
    }
}
