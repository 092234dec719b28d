//! Read and write results.

use crate::error::{Error, Result};
use docwire_codec::{decode_fields, DocumentRef, IntoFieldPath, Map, Timestamp, Value};
use docwire_protocol::{
    BatchGetDocumentsResponse, BatchGetResult, CommitResponse, Document,
    RunAggregationQueryResponse, RunQueryResponse,
};

/// A document as read at a point in time. The document may not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    reference: DocumentRef,
    fields: Option<Map>,
    read_time: Option<Timestamp>,
    create_time: Option<Timestamp>,
    update_time: Option<Timestamp>,
}

impl DocumentSnapshot {
    /// A snapshot of a document that does not exist.
    pub fn missing(reference: DocumentRef, read_time: Option<Timestamp>) -> Self {
        Self {
            reference,
            fields: None,
            read_time,
            create_time: None,
            update_time: None,
        }
    }

    /// Decodes a stored document.
    pub fn from_document(document: &Document, read_time: Option<Timestamp>) -> Result<Self> {
        Ok(Self {
            reference: DocumentRef::from_name(&document.name)?,
            fields: Some(decode_fields(&document.fields)?),
            read_time,
            create_time: document.create_time,
            update_time: document.update_time,
        })
    }

    pub(crate) fn from_batch_get(response: &BatchGetDocumentsResponse) -> Result<Self> {
        match &response.result {
            BatchGetResult::Found(document) => {
                Self::from_document(document, Some(response.read_time))
            }
            BatchGetResult::Missing(name) => Ok(Self::missing(
                DocumentRef::from_name(name)?,
                Some(response.read_time),
            )),
        }
    }

    /// The document's location.
    pub fn reference(&self) -> &DocumentRef {
        &self.reference
    }

    /// The document's id.
    pub fn id(&self) -> &str {
        self.reference.id()
    }

    /// True when the document exists.
    pub fn exists(&self) -> bool {
        self.fields.is_some()
    }

    /// All fields, if the document exists.
    pub fn data(&self) -> Option<&Map> {
        self.fields.as_ref()
    }

    /// The value at `path`, if the document exists and has it.
    pub fn get(&self, path: impl IntoFieldPath) -> Result<Option<&Value>> {
        let path = path.into_field_path()?;
        let Some(fields) = &self.fields else {
            return Ok(None);
        };
        let (first, rest) = match path.segments().split_first() {
            Some(split) => split,
            None => return Ok(None),
        };
        let mut current = match fields.get(first) {
            Some(value) => value,
            None => return Ok(None),
        };
        for segment in rest {
            current = match current.as_map().and_then(|m| m.get(segment)) {
                Some(value) => value,
                None => return Ok(None),
            };
        }
        Ok(Some(current))
    }

    /// Time of the read.
    pub fn read_time(&self) -> Option<Timestamp> {
        self.read_time
    }

    /// Creation time, for existing documents.
    pub fn create_time(&self) -> Option<Timestamp> {
        self.create_time
    }

    /// Last update time, for existing documents.
    pub fn update_time(&self) -> Option<Timestamp> {
        self.update_time
    }
}

/// The documents a query returned.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySnapshot {
    docs: Vec<DocumentSnapshot>,
    read_time: Option<Timestamp>,
}

impl QuerySnapshot {
    pub(crate) fn from_responses(responses: &[RunQueryResponse]) -> Result<Self> {
        let read_time = responses.iter().rev().find_map(|r| r.read_time);
        let docs = responses
            .iter()
            .filter_map(|r| {
                r.document
                    .as_ref()
                    .map(|d| DocumentSnapshot::from_document(d, r.read_time.or(read_time)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { docs, read_time })
    }

    /// Result documents, in query order.
    pub fn docs(&self) -> &[DocumentSnapshot] {
        &self.docs
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// True when nothing matched.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Time of the read.
    pub fn read_time(&self) -> Option<Timestamp> {
        self.read_time
    }
}

/// Aggregate values keyed by alias.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateQuerySnapshot {
    data: Map,
    read_time: Option<Timestamp>,
}

impl AggregateQuerySnapshot {
    pub(crate) fn from_responses(responses: &[RunAggregationQueryResponse]) -> Result<Self> {
        let mut data = Map::new();
        let mut read_time = None;
        for response in responses {
            if let Some(result) = &response.result {
                data.extend(decode_fields(result)?);
            }
            read_time = response.read_time.or(read_time);
        }
        Ok(Self { data, read_time })
    }

    /// The value of one aggregate.
    pub fn get(&self, alias: &str) -> Option<&Value> {
        self.data.get(alias)
    }

    /// Every aggregate.
    pub fn data(&self) -> &Map {
        &self.data
    }

    /// Time of the read.
    pub fn read_time(&self) -> Option<Timestamp> {
        self.read_time
    }
}

/// The outcome of any read.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadResult {
    /// A document read.
    Document(DocumentSnapshot),
    /// A query read.
    Query(QuerySnapshot),
    /// An aggregation read.
    Aggregate(AggregateQuerySnapshot),
}

impl ReadResult {
    /// The document snapshot, for document reads.
    pub fn into_document(self) -> Option<DocumentSnapshot> {
        match self {
            ReadResult::Document(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    /// The query snapshot, for query reads.
    pub fn into_query(self) -> Option<QuerySnapshot> {
        match self {
            ReadResult::Query(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    /// The aggregate snapshot, for aggregation reads.
    pub fn into_aggregate(self) -> Option<AggregateQuerySnapshot> {
        match self {
            ReadResult::Aggregate(snapshot) => Some(snapshot),
            _ => None,
        }
    }
}

/// Outcome of one committed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResult {
    /// Last update time of the document; the commit time for no-op writes.
    pub write_time: Timestamp,
}

/// Outcome of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitResult {
    /// Time the commit took effect.
    pub commit_time: Timestamp,
    /// One result per write, in write order.
    pub write_results: Vec<WriteResult>,
}

impl CommitResult {
    pub(crate) fn from_response(response: CommitResponse, writes: usize) -> Result<Self> {
        if response.write_results.len() != writes {
            return Err(Error::invalid_operation(format!(
                "commit returned {} write results for {writes} writes",
                response.write_results.len()
            )));
        }
        let commit_time = response.commit_time;
        Ok(Self {
            commit_time,
            write_results: response
                .write_results
                .into_iter()
                .map(|r| WriteResult {
                    write_time: r.update_time.unwrap_or(commit_time),
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docwire_codec::WireValue;
    use docwire_protocol::WireWriteResult;
    use std::collections::BTreeMap;

    const NAME: &str = "projects/p/databases/(default)/documents/coll/doc";

    fn ts(seconds: i64) -> Timestamp {
        Timestamp::new(seconds, 0).unwrap()
    }

    fn stored() -> Document {
        Document {
            name: NAME.into(),
            fields: BTreeMap::from([(
                "a".to_string(),
                WireValue::map(BTreeMap::from([("b".to_string(), WireValue::IntegerValue(7))])),
            )]),
            create_time: Some(ts(1)),
            update_time: Some(ts(2)),
        }
    }

    #[test]
    fn found_document_decodes() {
        let snapshot = DocumentSnapshot::from_batch_get(&BatchGetDocumentsResponse {
            result: BatchGetResult::Found(stored()),
            read_time: ts(3),
        })
        .unwrap();
        assert!(snapshot.exists());
        assert_eq!(snapshot.id(), "doc");
        assert_eq!(snapshot.get("a.b").unwrap(), Some(&Value::Integer(7)));
        assert_eq!(snapshot.get("a.c").unwrap(), None);
        assert_eq!(snapshot.update_time(), Some(ts(2)));
        assert_eq!(snapshot.read_time(), Some(ts(3)));
    }

    #[test]
    fn missing_document() {
        let snapshot = DocumentSnapshot::from_batch_get(&BatchGetDocumentsResponse {
            result: BatchGetResult::Missing(NAME.into()),
            read_time: ts(3),
        })
        .unwrap();
        assert!(!snapshot.exists());
        assert!(snapshot.data().is_none());
        assert_eq!(snapshot.get("a").unwrap(), None);
    }

    #[test]
    fn query_snapshot_skips_progress_messages() {
        let snapshot = QuerySnapshot::from_responses(&[
            RunQueryResponse {
                document: Some(stored()),
                read_time: Some(ts(4)),
            },
            RunQueryResponse {
                document: None,
                read_time: Some(ts(5)),
            },
        ])
        .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.read_time(), Some(ts(5)));
        assert_eq!(snapshot.docs()[0].read_time(), Some(ts(4)));
    }

    #[test]
    fn aggregate_snapshot_merges_results() {
        let snapshot = AggregateQuerySnapshot::from_responses(&[RunAggregationQueryResponse {
            result: Some(BTreeMap::from([(
                "count".to_string(),
                WireValue::IntegerValue(12),
            )])),
            read_time: Some(ts(6)),
        }])
        .unwrap();
        assert_eq!(snapshot.get("count"), Some(&Value::Integer(12)));
    }

    #[test]
    fn commit_result_falls_back_to_commit_time() {
        let result = CommitResult::from_response(
            CommitResponse {
                write_results: vec![
                    WireWriteResult {
                        update_time: Some(ts(8)),
                        transform_results: Vec::new(),
                    },
                    WireWriteResult::default(),
                ],
                commit_time: ts(9),
            },
            2,
        )
        .unwrap();
        assert_eq!(result.write_results[0].write_time, ts(8));
        assert_eq!(result.write_results[1].write_time, ts(9));
    }

    #[test]
    fn commit_result_count_mismatch() {
        let response = CommitResponse {
            write_results: Vec::new(),
            commit_time: ts(1),
        };
        assert!(CommitResult::from_response(response, 1).is_err());
    }
}
