//! The handle a transaction callback reads and writes through.

use crate::client::ClientContext;
use crate::error::{Error, Result};
use crate::precondition::Precondition;
use crate::query::{AggregateQuery, Query, ReadTarget};
use crate::read_tracker::ReadTracker;
use crate::snapshot::{AggregateQuerySnapshot, DocumentSnapshot, QuerySnapshot, ReadResult};
use crate::write::{SetOptions, UpdateData, WriteBatch};
use bytes::Bytes;
use docwire_codec::{DocumentRef, FieldPath, Value};
use docwire_protocol::{
    BatchGetDocumentsRequest, ConsistencySelector, DocumentMask, RunAggregationQueryRequest,
    RunQueryRequest, WireWrite,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Per-attempt state shared by every clone of a [`Transaction`].
#[derive(Debug)]
struct AttemptState {
    consistency: ConsistencySelector,
    tracker: ReadTracker,
    writes: WriteBatch,
    closed: bool,
}

/// One attempt of a transaction, as seen by the callback.
///
/// Reads must all be issued before the first write. Writes are validated
/// and encoded immediately but only sent when the attempt commits. The
/// handle is cheap to clone; clones share the attempt. Once the attempt
/// ends every call fails with [`Error::AttemptClosed`].
#[derive(Clone)]
pub struct Transaction {
    context: Arc<ClientContext>,
    attempt: Arc<Mutex<AttemptState>>,
}

impl Transaction {
    pub(crate) fn new(
        context: Arc<ClientContext>,
        consistency: ConsistencySelector,
        read_only: bool,
    ) -> Self {
        let writes = WriteBatch::new(context.encode_options);
        Self {
            context,
            attempt: Arc::new(Mutex::new(AttemptState {
                consistency,
                tracker: ReadTracker::new(read_only),
                writes,
                closed: false,
            })),
        }
    }

    /// The backend handle, unless reads are pinned to a read time.
    pub fn id(&self) -> Option<Bytes> {
        match &self.attempt.lock().consistency {
            ConsistencySelector::Transaction(id) => Some(id.clone()),
            ConsistencySelector::ReadTime(_) => None,
        }
    }

    /// True when the attempt rejects writes.
    pub fn is_read_only(&self) -> bool {
        self.attempt.lock().tracker.is_read_only()
    }

    /// Reads a document, a query or an aggregation.
    ///
    /// The read-before-write rule is checked when this is called, so a
    /// rejected read never reaches the backend.
    pub fn get(
        &self,
        target: impl Into<ReadTarget>,
    ) -> impl Future<Output = Result<ReadResult>> + Send + 'static {
        let target = target.into();
        let started = self.start_read();
        let context = Arc::clone(&self.context);
        async move {
            let consistency = started?;
            Ok(match target {
                ReadTarget::Document(document) => {
                    let mut snapshots =
                        fetch_documents(&context, vec![document], None, consistency).await?;
                    match snapshots.pop() {
                        Some(snapshot) => ReadResult::Document(snapshot),
                        None => return Err(Error::invalid_operation("empty batch get result")),
                    }
                }
                ReadTarget::Query(query) => {
                    ReadResult::Query(run_query(&context, query, consistency).await?)
                }
                ReadTarget::AggregateQuery(query) => {
                    ReadResult::Aggregate(run_aggregation(&context, query, consistency).await?)
                }
            })
        }
    }

    /// Reads one document.
    pub fn get_document(
        &self,
        document: &DocumentRef,
    ) -> impl Future<Output = Result<DocumentSnapshot>> + Send + 'static {
        let all = self.get_all(std::slice::from_ref(document), None);
        async move {
            all.await?
                .pop()
                .ok_or_else(|| Error::invalid_operation("empty batch get result"))
        }
    }

    /// Runs a query.
    pub fn get_query(
        &self,
        query: &Query,
    ) -> impl Future<Output = Result<QuerySnapshot>> + Send + 'static {
        let started = self.start_read();
        let context = Arc::clone(&self.context);
        let query = query.clone();
        async move { run_query(&context, query, started?).await }
    }

    /// Runs an aggregation.
    pub fn get_aggregate(
        &self,
        query: &AggregateQuery,
    ) -> impl Future<Output = Result<AggregateQuerySnapshot>> + Send + 'static {
        let started = self.start_read();
        let context = Arc::clone(&self.context);
        let query = query.clone();
        async move { run_aggregation(&context, query, started?).await }
    }

    /// Reads several documents in one round trip.
    ///
    /// Snapshots come back in the order of `documents`, duplicates
    /// included. `field_mask` restricts the returned fields.
    pub fn get_all(
        &self,
        documents: &[DocumentRef],
        field_mask: Option<&[FieldPath]>,
    ) -> impl Future<Output = Result<Vec<DocumentSnapshot>>> + Send + 'static {
        let started = if documents.is_empty() {
            Err(Error::invalid_argument(
                "get_all() requires at least one document",
            ))
        } else {
            self.start_read()
        };
        let context = Arc::clone(&self.context);
        let documents = documents.to_vec();
        let mask = field_mask.map(|paths| DocumentMask {
            field_paths: paths.iter().map(FieldPath::formatted_name).collect(),
        });
        async move { fetch_documents(&context, documents, mask, started?).await }
    }

    /// Creates `document`; the commit fails if it already exists.
    pub fn create(&self, document: &DocumentRef, data: impl Into<Value>) -> Result<&Self> {
        self.write(|batch| batch.create(document, data).map(drop))
    }

    /// Replaces `document` with `data`.
    pub fn set(&self, document: &DocumentRef, data: impl Into<Value>) -> Result<&Self> {
        self.write(|batch| batch.set(document, data).map(drop))
    }

    /// Writes `data` to `document`, replacing or merging per `options`.
    pub fn set_with_options(
        &self,
        document: &DocumentRef,
        data: impl Into<Value>,
        options: SetOptions,
    ) -> Result<&Self> {
        self.write(|batch| batch.set_with_options(document, data, options).map(drop))
    }

    /// Updates fields of an existing document.
    pub fn update(&self, document: &DocumentRef, data: impl Into<UpdateData>) -> Result<&Self> {
        self.write(|batch| batch.update(document, data).map(drop))
    }

    /// Updates fields if `precondition` holds.
    pub fn update_with_precondition(
        &self,
        document: &DocumentRef,
        data: impl Into<UpdateData>,
        precondition: Precondition,
    ) -> Result<&Self> {
        self.write(|batch| {
            batch
                .update_with_precondition(document, data, precondition)
                .map(drop)
        })
    }

    /// Deletes `document`.
    pub fn delete(&self, document: &DocumentRef) -> Result<&Self> {
        self.write(|batch| batch.delete(document).map(drop))
    }

    /// Deletes `document` if `precondition` holds.
    pub fn delete_with_precondition(
        &self,
        document: &DocumentRef,
        precondition: Precondition,
    ) -> Result<&Self> {
        self.write(|batch| batch.delete_with_precondition(document, precondition).map(drop))
    }

    /// Ends the attempt and hands back its writes.
    pub(crate) fn finish(&self) -> Vec<WireWrite> {
        let mut attempt = self.attempt.lock();
        attempt.closed = true;
        attempt.writes.take_writes()
    }

    fn start_read(&self) -> Result<ConsistencySelector> {
        let mut attempt = self.attempt.lock();
        if attempt.closed {
            return Err(Error::AttemptClosed);
        }
        attempt.tracker.record_read()?;
        Ok(attempt.consistency.clone())
    }

    fn write(&self, apply: impl FnOnce(&mut WriteBatch) -> Result<()>) -> Result<&Self> {
        let mut guard = self.attempt.lock();
        let attempt = &mut *guard;
        if attempt.closed {
            return Err(Error::AttemptClosed);
        }
        attempt.tracker.check_write()?;
        apply(&mut attempt.writes)?;
        attempt.tracker.record_write()?;
        Ok(self)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attempt = self.attempt.lock();
        f.debug_struct("Transaction")
            .field("consistency", &attempt.consistency)
            .field("phase", &attempt.tracker.phase())
            .field("writes", &attempt.writes.len())
            .field("closed", &attempt.closed)
            .finish()
    }
}

async fn fetch_documents(
    context: &ClientContext,
    documents: Vec<DocumentRef>,
    mask: Option<DocumentMask>,
    consistency: ConsistencySelector,
) -> Result<Vec<DocumentSnapshot>> {
    let mut names: Vec<String> = Vec::with_capacity(documents.len());
    for document in &documents {
        let name = document.formatted_name();
        if !names.contains(&name) {
            names.push(name);
        }
    }

    let responses = context
        .rpc
        .batch_get_documents(BatchGetDocumentsRequest {
            database: context.database.formatted_name(),
            documents: names,
            mask,
            consistency: Some(consistency),
        })
        .await?;

    let mut by_name: HashMap<String, DocumentSnapshot> = HashMap::with_capacity(responses.len());
    for response in &responses {
        let snapshot = DocumentSnapshot::from_batch_get(response)?;
        by_name.insert(snapshot.reference().formatted_name(), snapshot);
    }

    documents
        .iter()
        .map(|document| {
            by_name
                .get(&document.formatted_name())
                .cloned()
                .ok_or_else(|| {
                    Error::invalid_operation(format!(
                        "did not receive document for \"{}\"",
                        document.path()
                    ))
                })
        })
        .collect()
}

async fn run_query(
    context: &ClientContext,
    query: Query,
    consistency: ConsistencySelector,
) -> Result<QuerySnapshot> {
    let responses = context
        .rpc
        .run_query(RunQueryRequest {
            parent: query.parent().to_string(),
            structured_query: query.structured_query().clone(),
            consistency: Some(consistency),
        })
        .await?;
    QuerySnapshot::from_responses(&responses)
}

async fn run_aggregation(
    context: &ClientContext,
    query: AggregateQuery,
    consistency: ConsistencySelector,
) -> Result<AggregateQuerySnapshot> {
    let responses = context
        .rpc
        .run_aggregation_query(RunAggregationQueryRequest {
            parent: query.parent().to_string(),
            structured_aggregation_query: query.structured_aggregation_query().clone(),
            consistency: Some(consistency),
        })
        .await?;
    AggregateQuerySnapshot::from_responses(&responses)
}
