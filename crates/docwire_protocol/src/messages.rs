//! Request and response messages of the transaction protocol.

use crate::write::{Document, DocumentMask, WireWrite, WireWriteResult};
use bytes::Bytes;
use docwire_codec::{Timestamp, WireValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a transaction is opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionMode {
    /// Reads only, optionally pinned to a point in time.
    ReadOnly {
        /// Snapshot time for every read of the transaction.
        #[serde(rename = "readTime", default, skip_serializing_if = "Option::is_none")]
        read_time: Option<Timestamp>,
    },
    /// Reads and writes.
    ReadWrite {
        /// Handle of the failed attempt this one replaces.
        #[serde(
            rename = "retryTransaction",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        retry_transaction: Option<Bytes>,
    },
}

/// `BeginTransaction` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeginTransactionRequest {
    /// `projects/{p}/databases/{d}`.
    pub database: String,
    /// Mode of the new transaction.
    pub options: TransactionMode,
}

/// `BeginTransaction` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeginTransactionResponse {
    /// Opaque transaction handle.
    pub transaction: Bytes,
}

/// `Commit` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    /// `projects/{p}/databases/{d}`.
    pub database: String,
    /// Writes applied atomically, in order.
    pub writes: Vec<WireWrite>,
    /// Transaction the writes belong to; absent for a plain batch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Bytes>,
}

/// `Commit` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResponse {
    /// One result per write, in request order.
    #[serde(default)]
    pub write_results: Vec<WireWriteResult>,
    /// Time at which the commit took effect.
    pub commit_time: Timestamp,
}

/// `Rollback` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackRequest {
    /// `projects/{p}/databases/{d}`.
    pub database: String,
    /// Transaction to release.
    pub transaction: Bytes,
}

/// Which snapshot a read observes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConsistencySelector {
    /// Read inside an open transaction.
    Transaction(Bytes),
    /// Read at a fixed time.
    ReadTime(Timestamp),
}

/// `BatchGetDocuments` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetDocumentsRequest {
    /// `projects/{p}/databases/{d}`.
    pub database: String,
    /// Fully qualified document names, without duplicates.
    pub documents: Vec<String>,
    /// Fields to return; all when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<DocumentMask>,
    /// Snapshot selection.
    #[serde(flatten)]
    pub consistency: Option<ConsistencySelector>,
}

/// Outcome for one requested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BatchGetResult {
    /// The document exists.
    Found(Document),
    /// The document does not exist; carries its name.
    Missing(String),
}

/// One streamed `BatchGetDocuments` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchGetDocumentsResponse {
    /// Found or missing.
    #[serde(flatten)]
    pub result: BatchGetResult,
    /// Time the document was read.
    pub read_time: Timestamp,
}

/// A structured query, serialized by the query layer.
///
/// The transaction engine forwards it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StructuredQuery {
    /// Encoded query message.
    pub encoded: Bytes,
}

/// An aggregation over a structured query, serialized by the query layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StructuredAggregationQuery {
    /// Encoded aggregation message.
    pub encoded: Bytes,
}

/// `RunQuery` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    /// Parent resource, e.g. `projects/p/databases/d/documents`.
    pub parent: String,
    /// Query to run.
    pub structured_query: StructuredQuery,
    /// Snapshot selection.
    #[serde(flatten)]
    pub consistency: Option<ConsistencySelector>,
}

/// One streamed `RunQuery` response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryResponse {
    /// A result document; absent on progress-only messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    /// Time the result was read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_time: Option<Timestamp>,
}

/// `RunAggregationQuery` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAggregationQueryRequest {
    /// Parent resource.
    pub parent: String,
    /// Aggregation to run.
    pub structured_aggregation_query: StructuredAggregationQuery,
    /// Snapshot selection.
    #[serde(flatten)]
    pub consistency: Option<ConsistencySelector>,
}

/// One streamed `RunAggregationQuery` response.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAggregationQueryResponse {
    /// Aggregate values by alias; absent on progress-only messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<BTreeMap<String, WireValue>>,
    /// Time the aggregation was computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_time: Option<Timestamp>,
}
