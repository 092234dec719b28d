//! # docwire protocol
//!
//! Wire messages of the transaction protocol.
//!
//! This crate provides:
//! - [`WireWrite`] and its parts (masks, transforms, preconditions)
//! - Begin/Commit/Rollback/BatchGet/RunQuery/RunAggregationQuery messages
//! - [`Status`] and [`Code`] for classifying failed calls
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod messages;
mod status;
mod write;

pub use messages::{
    BatchGetDocumentsRequest, BatchGetDocumentsResponse, BatchGetResult,
    BeginTransactionRequest, BeginTransactionResponse, CommitRequest, CommitResponse,
    ConsistencySelector, RollbackRequest, RunAggregationQueryRequest,
    RunAggregationQueryResponse, RunQueryRequest, RunQueryResponse, StructuredAggregationQuery,
    StructuredQuery, TransactionMode,
};
pub use status::{Code, Status};
pub use write::{
    Document, DocumentMask, FieldTransform, ServerValue, TransformKind, WirePrecondition,
    WireWrite, WireWriteResult, WriteOperation,
};
