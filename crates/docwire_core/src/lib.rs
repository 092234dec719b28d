//! # docwire core
//!
//! Transactions and document writes for a remote document database.
//!
//! This crate provides:
//! - [`Client::run_transaction`]: begin, run a callback, commit, retry on
//!   contention
//! - [`Transaction`]: reads (documents, queries, aggregations) and buffered
//!   writes, with all reads before all writes
//! - [`WriteBatch`]: create/set/update/delete encoded into wire writes with
//!   field masks, preconditions and field transforms
//! - [`FirestoreRpc`], the backend seam, and [`MockRpc`] for tests
//!
//! ## Transaction lifecycle
//!
//! Each attempt begins a backend transaction, runs the callback, then
//! commits every write the callback recorded. A commit that fails with a
//! retryable status rolls the attempt back and starts a new one that names
//! the failed handle, up to `max_attempts`. A callback that fails is rolled
//! back and its error is returned as is.
//!
//! ## Key Invariants
//!
//! - No read is issued after the first write of an attempt
//! - Writes are committed in the order they were recorded
//! - A handle is never used after its attempt ended
//! - Sentinels never appear in wire values, only as field transforms
//!
//! ## Logging
//!
//! The engine emits `tracing` events inside a `transaction` span. They go
//! to the dispatcher set with [`Settings::with_log_dispatch`] and are
//! discarded otherwise.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod coordinator;
mod error;
mod precondition;
mod query;
mod read_tracker;
mod rpc;
mod snapshot;
mod transaction;
mod write;

pub use client::Client;
pub use config::{BackoffConfig, Settings, TransactionOptions, DEFAULT_MAX_ATTEMPTS};
pub use error::{
    Error, Result, TransactionError, READ_AFTER_WRITE_MESSAGE, READ_ONLY_WRITE_MESSAGE,
};
pub use precondition::Precondition;
pub use query::{AggregateQuery, Query, ReadTarget};
pub use read_tracker::{ReadPhase, ReadTracker};
pub use rpc::{FirestoreRpc, MockRpc, RecordedCall, RpcResult};
pub use snapshot::{
    AggregateQuerySnapshot, CommitResult, DocumentSnapshot, QuerySnapshot, ReadResult,
    WriteResult,
};
pub use transaction::Transaction;
pub use write::{
    build_writes, encode_write, PendingWrite, SetOptions, UpdateData, UpdatePath, WriteBatch,
    WriteOp,
};

pub use docwire_codec::{
    DatabaseId, DocumentRef, FieldPath, FieldValue, GeoPoint, Map, Timestamp, Value, VectorValue,
};
