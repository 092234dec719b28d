//! Mutation encoding: typed document writes to wire writes.
//!
//! Every write is described by a [`WriteOp`] and encoded by [`encode_write`]:
//!
//! - `Create` and `Set` without merge send the whole document, minus
//!   sentinels, which become field transforms. `Create` adds an
//!   `exists: false` precondition.
//! - `Set` with [`SetOptions::Merge`] masks every leaf path of the data.
//!   Delete sentinels are left out of the mask; other sentinels stay in it.
//! - `Set` with [`SetOptions::MergeFields`] masks exactly the listed paths
//!   and ignores data outside them.
//! - `Update` masks exactly the supplied paths and defaults to an
//!   `exists: true` precondition.
//! - `Delete` carries only its optional precondition.

mod batch;
mod fields;

pub use batch::WriteBatch;

use crate::error::{Error, Result};
use crate::precondition::{Precondition, PreconditionTarget};
use docwire_codec::{
    DocumentRef, EncodeOptions, FieldPath, FieldValue, Map, Value, ValueEncoder,
};
use docwire_protocol::{
    Document, DocumentMask, FieldTransform, WirePrecondition, WireWrite, WriteOperation,
};
use fields::{dedup_paths, insert_at, leaf_paths, project, DeletePolicy, FieldExtractor};
use std::collections::BTreeMap;

/// How `set` combines its data with the stored document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SetOptions {
    /// Replace the whole document.
    #[default]
    Overwrite,
    /// Write every field present in the data and leave the others alone.
    Merge,
    /// Write only the listed fields.
    MergeFields(Vec<FieldPath>),
}

impl SetOptions {
    /// `MergeFields` from dotted paths or [`FieldPath`]s.
    pub fn merge_fields<P, I>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<UpdatePath>,
    {
        let paths = paths
            .into_iter()
            .map(|p| p.into().resolve())
            .collect::<Result<Vec<_>>>()?;
        Ok(SetOptions::MergeFields(paths))
    }
}

/// One document write, before encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create a document that must not exist yet.
    Create {
        /// Document fields.
        data: Map,
    },
    /// Write a document, replacing or merging.
    Set {
        /// Document fields.
        data: Map,
        /// Replace or merge.
        options: SetOptions,
    },
    /// Update individual fields of an existing document.
    Update {
        /// Independent leaf writes; no two paths may overlap.
        fields: Vec<(FieldPath, Value)>,
        /// Overrides the default `exists: true`.
        precondition: Option<Precondition>,
    },
    /// Delete a document.
    Delete {
        /// Optional condition on the stored document.
        precondition: Option<Precondition>,
    },
}

/// A write bound to its target document.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingWrite {
    /// Target document.
    pub document: DocumentRef,
    /// The write.
    pub op: WriteOp,
}

/// A field path given either as a dotted string or as a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePath {
    /// `"a.b.c"`; parsed on use.
    Dotted(String),
    /// Already split into segments.
    Path(FieldPath),
}

impl UpdatePath {
    fn resolve(self) -> Result<FieldPath> {
        match self {
            UpdatePath::Dotted(dotted) => Ok(FieldPath::from_dotted(&dotted)?),
            UpdatePath::Path(path) => Ok(path),
        }
    }
}

impl From<&str> for UpdatePath {
    fn from(s: &str) -> Self {
        UpdatePath::Dotted(s.to_string())
    }
}

impl From<String> for UpdatePath {
    fn from(s: String) -> Self {
        UpdatePath::Dotted(s)
    }
}

impl From<FieldPath> for UpdatePath {
    fn from(path: FieldPath) -> Self {
        UpdatePath::Path(path)
    }
}

impl From<&FieldPath> for UpdatePath {
    fn from(path: &FieldPath) -> Self {
        UpdatePath::Path(path.clone())
    }
}

/// Arguments of an update, as (path, value) pairs.
///
/// A map with dotted keys, a single pair and a list of pairs all normalize
/// to the same fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateData {
    entries: Vec<(UpdatePath, Value)>,
}

impl UpdateData {
    /// Empty update; at least one field must be added before use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one field.
    pub fn field(mut self, path: impl Into<UpdatePath>, value: impl Into<Value>) -> Self {
        self.entries.push((path.into(), value.into()));
        self
    }

    /// Builds an update from (path, value) pairs.
    pub fn from_pairs<P, V, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, V)>,
        P: Into<UpdatePath>,
        V: Into<Value>,
    {
        Self {
            entries: pairs
                .into_iter()
                .map(|(p, v)| (p.into(), v.into()))
                .collect(),
        }
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no field was added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves every path.
    pub fn into_fields(self) -> Result<Vec<(FieldPath, Value)>> {
        self.entries
            .into_iter()
            .map(|(path, value)| Ok((path.resolve()?, value)))
            .collect()
    }
}

impl From<Map> for UpdateData {
    fn from(map: Map) -> Self {
        Self::from_pairs(map.into_iter().map(|(k, v)| (UpdatePath::Dotted(k), v)))
    }
}

impl<P: Into<UpdatePath>, V: Into<Value>> From<(P, V)> for UpdateData {
    fn from((path, value): (P, V)) -> Self {
        Self::new().field(path, value)
    }
}

/// Unwraps document data, which must be a map.
pub(crate) fn document_data(data: Value) -> Result<Map> {
    match data {
        Value::Map(fields) => Ok(fields),
        other => Err(Error::invalid_argument(format!(
            "document data must be a map, found {}",
            other.type_name()
        ))),
    }
}

/// Encodes one write.
pub fn encode_write(document: &DocumentRef, op: &WriteOp, encoder: &ValueEncoder) -> Result<WireWrite> {
    let name = document.formatted_name();
    match op {
        WriteOp::Create { data } => {
            let (fields, transforms) = encode_full(encoder, data, "create()")?;
            Ok(update_write(
                name,
                fields,
                None,
                transforms,
                Some(WirePrecondition::Exists(false)),
            ))
        }
        WriteOp::Set {
            data,
            options: SetOptions::Overwrite,
        } => {
            let (fields, transforms) = encode_full(encoder, data, "set()")?;
            Ok(update_write(name, fields, None, transforms, None))
        }
        WriteOp::Set {
            data,
            options: SetOptions::Merge,
        } => {
            let mut extractor = FieldExtractor::new(encoder, DeletePolicy::Allowed, "set()");
            let plain = extractor.extract_map(data, None)?;
            let mut mask = Vec::new();
            leaf_paths(data, None, &mut mask)?;
            let fields = encoder.encode_fields(&plain)?;
            Ok(update_write(
                name,
                fields,
                Some(mask),
                extractor.into_transforms(),
                None,
            ))
        }
        WriteOp::Set {
            data,
            options: SetOptions::MergeFields(paths),
        } => {
            let mask = dedup_paths(paths);
            let selected = project(data, &mask)?;
            let mut extractor = FieldExtractor::new(encoder, DeletePolicy::Allowed, "set()");
            let plain = extractor.extract_map(&selected, None)?;
            let fields = encoder.encode_fields(&plain)?;
            Ok(update_write(
                name,
                fields,
                Some(mask),
                extractor.into_transforms(),
                None,
            ))
        }
        WriteOp::Update {
            fields,
            precondition,
        } => encode_update(name, fields, *precondition, encoder),
        WriteOp::Delete { precondition } => Ok(WireWrite {
            operation: WriteOperation::Delete(name),
            update_mask: None,
            update_transforms: Vec::new(),
            current_document: precondition
                .map(|p| p.to_wire(PreconditionTarget::Delete))
                .transpose()?,
        }),
    }
}

/// Encodes an ordered list of writes into one commit payload.
///
/// Fails on the first invalid write; output order matches input order.
pub fn build_writes<'a, I>(writes: I, options: EncodeOptions) -> Result<Vec<WireWrite>>
where
    I: IntoIterator<Item = &'a PendingWrite>,
{
    let encoder = ValueEncoder::new(options);
    writes
        .into_iter()
        .map(|write| encode_write(&write.document, &write.op, &encoder))
        .collect()
}

fn encode_full(
    encoder: &ValueEncoder,
    data: &Map,
    operation: &'static str,
) -> Result<(BTreeMap<String, docwire_codec::WireValue>, Vec<FieldTransform>)> {
    let mut extractor = FieldExtractor::new(encoder, DeletePolicy::Rejected, operation);
    let plain = extractor.extract_map(data, None)?;
    let fields = encoder.encode_fields(&plain)?;
    Ok((fields, extractor.into_transforms()))
}

fn encode_update(
    name: String,
    entries: &[(FieldPath, Value)],
    precondition: Option<Precondition>,
    encoder: &ValueEncoder,
) -> Result<WireWrite> {
    validate_update_paths(entries)?;

    let ignore_undefined = encoder.options().ignore_undefined_properties;
    let mut extractor = FieldExtractor::new(encoder, DeletePolicy::Rejected, "update()");
    let mut data = Map::new();
    let mut mask = Vec::with_capacity(entries.len());

    for (path, value) in entries {
        if ignore_undefined && matches!(value, Value::Undefined) {
            continue;
        }
        mask.push(path.clone());
        if matches!(value, Value::Sentinel(FieldValue::Delete)) {
            continue;
        }
        if let Some(plain) = extractor.extract_value(value, path)? {
            insert_at(&mut data, path, plain)?;
        }
    }
    if mask.is_empty() {
        return Err(Error::invalid_argument("At least one field must be updated."));
    }

    let fields = encoder.encode_fields(&data)?;
    let precondition = match precondition {
        Some(p) => p.to_wire(PreconditionTarget::Update)?,
        None => WirePrecondition::Exists(true),
    };
    Ok(update_write(
        name,
        fields,
        Some(mask),
        extractor.into_transforms(),
        Some(precondition),
    ))
}

fn validate_update_paths(entries: &[(FieldPath, Value)]) -> Result<()> {
    if entries.is_empty() {
        return Err(Error::invalid_argument("At least one field must be updated."));
    }
    for (i, (a, _)) in entries.iter().enumerate() {
        for (b, _) in &entries[i + 1..] {
            if a == b {
                return Err(Error::invalid_argument(format!(
                    "Field \"{a}\" was specified multiple times."
                )));
            }
            if a.is_prefix_of(b) || b.is_prefix_of(a) {
                let (short, long) = if a.len() < b.len() { (a, b) } else { (b, a) };
                return Err(Error::invalid_argument(format!(
                    "Field \"{short}\" was specified multiple times (conflicts with \"{long}\")."
                )));
            }
        }
    }
    Ok(())
}

fn update_write(
    name: String,
    fields: BTreeMap<String, docwire_codec::WireValue>,
    mask: Option<Vec<FieldPath>>,
    transforms: Vec<FieldTransform>,
    precondition: Option<WirePrecondition>,
) -> WireWrite {
    WireWrite {
        operation: WriteOperation::Update(Document {
            name,
            fields,
            create_time: None,
            update_time: None,
        }),
        update_mask: mask.map(|paths| DocumentMask {
            field_paths: paths.iter().map(FieldPath::formatted_name).collect(),
        }),
        update_transforms: transforms,
        current_document: precondition,
    }
}
