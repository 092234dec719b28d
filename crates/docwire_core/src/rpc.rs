//! Backend RPC abstraction.

use async_trait::async_trait;
use bytes::Bytes;
use docwire_codec::Timestamp;
use docwire_protocol::{
    BatchGetDocumentsRequest, BatchGetDocumentsResponse, BeginTransactionRequest,
    BeginTransactionResponse, CommitRequest, CommitResponse, RollbackRequest,
    RunAggregationQueryRequest, RunAggregationQueryResponse, RunQueryRequest, RunQueryResponse,
    Status, WireWriteResult,
};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Result of one backend call.
pub type RpcResult<T> = std::result::Result<T, Status>;

/// The backend calls the transaction engine makes.
///
/// Implementations own connection management, authentication and
/// per-call retries of the transport itself. Streaming calls return every
/// message of the stream in order.
#[async_trait]
pub trait FirestoreRpc: Send + Sync {
    /// Opens a transaction.
    async fn begin_transaction(
        &self,
        request: BeginTransactionRequest,
    ) -> RpcResult<BeginTransactionResponse>;

    /// Applies writes atomically.
    async fn commit(&self, request: CommitRequest) -> RpcResult<CommitResponse>;

    /// Releases a transaction without applying anything.
    async fn rollback(&self, request: RollbackRequest) -> RpcResult<()>;

    /// Reads documents by name.
    async fn batch_get_documents(
        &self,
        request: BatchGetDocumentsRequest,
    ) -> RpcResult<Vec<BatchGetDocumentsResponse>>;

    /// Runs a query.
    async fn run_query(&self, request: RunQueryRequest) -> RpcResult<Vec<RunQueryResponse>>;

    /// Runs an aggregation.
    async fn run_aggregation_query(
        &self,
        request: RunAggregationQueryRequest,
    ) -> RpcResult<Vec<RunAggregationQueryResponse>>;
}

/// A call received by [`MockRpc`].
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    /// `BeginTransaction`.
    BeginTransaction(BeginTransactionRequest),
    /// `Commit`.
    Commit(CommitRequest),
    /// `Rollback`.
    Rollback(RollbackRequest),
    /// `BatchGetDocuments`.
    BatchGetDocuments(BatchGetDocumentsRequest),
    /// `RunQuery`.
    RunQuery(RunQueryRequest),
    /// `RunAggregationQuery`.
    RunAggregationQuery(RunAggregationQueryRequest),
}

#[derive(Debug, Default)]
struct MockState {
    begins: VecDeque<RpcResult<BeginTransactionResponse>>,
    commits: VecDeque<RpcResult<CommitResponse>>,
    rollbacks: VecDeque<RpcResult<()>>,
    batch_gets: VecDeque<RpcResult<Vec<BatchGetDocumentsResponse>>>,
    queries: VecDeque<RpcResult<Vec<RunQueryResponse>>>,
    aggregations: VecDeque<RpcResult<Vec<RunAggregationQueryResponse>>>,
    calls: Vec<RecordedCall>,
    handles_issued: u32,
}

/// A scripted backend for testing.
///
/// Queued responses are consumed in order. When a queue is empty, begin
/// hands out `txn-1`, `txn-2`, ..., commit and rollback succeed, and reads
/// fail with `UNIMPLEMENTED`. Every call is recorded.
#[derive(Debug, Default)]
pub struct MockRpc {
    state: Mutex<MockState>,
}

impl MockRpc {
    /// Creates a mock with empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a begin outcome.
    pub fn push_begin(&self, response: RpcResult<Bytes>) {
        self.state
            .lock()
            .begins
            .push_back(response.map(|transaction| BeginTransactionResponse { transaction }));
    }

    /// Queues a commit outcome.
    pub fn push_commit(&self, response: RpcResult<CommitResponse>) {
        self.state.lock().commits.push_back(response);
    }

    /// Queues a rollback outcome.
    pub fn push_rollback(&self, response: RpcResult<()>) {
        self.state.lock().rollbacks.push_back(response);
    }

    /// Queues a batch-get stream.
    pub fn push_batch_get(&self, response: RpcResult<Vec<BatchGetDocumentsResponse>>) {
        self.state.lock().batch_gets.push_back(response);
    }

    /// Queues a query stream.
    pub fn push_run_query(&self, response: RpcResult<Vec<RunQueryResponse>>) {
        self.state.lock().queries.push_back(response);
    }

    /// Queues an aggregation stream.
    pub fn push_run_aggregation_query(
        &self,
        response: RpcResult<Vec<RunAggregationQueryResponse>>,
    ) {
        self.state.lock().aggregations.push_back(response);
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }

    /// Received begin requests.
    pub fn begin_requests(&self) -> Vec<BeginTransactionRequest> {
        self.filter(|call| match call {
            RecordedCall::BeginTransaction(r) => Some(r.clone()),
            _ => None,
        })
    }

    /// Received commit requests.
    pub fn commit_requests(&self) -> Vec<CommitRequest> {
        self.filter(|call| match call {
            RecordedCall::Commit(r) => Some(r.clone()),
            _ => None,
        })
    }

    /// Received rollback requests.
    pub fn rollback_requests(&self) -> Vec<RollbackRequest> {
        self.filter(|call| match call {
            RecordedCall::Rollback(r) => Some(r.clone()),
            _ => None,
        })
    }

    /// Received batch-get requests.
    pub fn batch_get_requests(&self) -> Vec<BatchGetDocumentsRequest> {
        self.filter(|call| match call {
            RecordedCall::BatchGetDocuments(r) => Some(r.clone()),
            _ => None,
        })
    }

    fn filter<T>(&self, f: impl Fn(&RecordedCall) -> Option<T>) -> Vec<T> {
        self.state.lock().calls.iter().filter_map(f).collect()
    }
}

fn unscripted(call: &str) -> Status {
    Status::new(
        docwire_protocol::Code::Unimplemented,
        format!("no mock {call} response queued"),
    )
}

#[async_trait]
impl FirestoreRpc for MockRpc {
    async fn begin_transaction(
        &self,
        request: BeginTransactionRequest,
    ) -> RpcResult<BeginTransactionResponse> {
        let mut state = self.state.lock();
        state.calls.push(RecordedCall::BeginTransaction(request));
        match state.begins.pop_front() {
            Some(response) => response,
            None => {
                state.handles_issued += 1;
                Ok(BeginTransactionResponse {
                    transaction: Bytes::from(format!("txn-{}", state.handles_issued)),
                })
            }
        }
    }

    async fn commit(&self, request: CommitRequest) -> RpcResult<CommitResponse> {
        let mut state = self.state.lock();
        let writes = request.writes.len();
        state.calls.push(RecordedCall::Commit(request));
        state.commits.pop_front().unwrap_or_else(|| {
            let commit_time = Timestamp::now();
            Ok(CommitResponse {
                write_results: vec![
                    WireWriteResult {
                        update_time: Some(commit_time),
                        transform_results: Vec::new(),
                    };
                    writes
                ],
                commit_time,
            })
        })
    }

    async fn rollback(&self, request: RollbackRequest) -> RpcResult<()> {
        let mut state = self.state.lock();
        state.calls.push(RecordedCall::Rollback(request));
        state.rollbacks.pop_front().unwrap_or(Ok(()))
    }

    async fn batch_get_documents(
        &self,
        request: BatchGetDocumentsRequest,
    ) -> RpcResult<Vec<BatchGetDocumentsResponse>> {
        let mut state = self.state.lock();
        state.calls.push(RecordedCall::BatchGetDocuments(request));
        state
            .batch_gets
            .pop_front()
            .unwrap_or_else(|| Err(unscripted("batch_get_documents")))
    }

    async fn run_query(&self, request: RunQueryRequest) -> RpcResult<Vec<RunQueryResponse>> {
        let mut state = self.state.lock();
        state.calls.push(RecordedCall::RunQuery(request));
        state
            .queries
            .pop_front()
            .unwrap_or_else(|| Err(unscripted("run_query")))
    }

    async fn run_aggregation_query(
        &self,
        request: RunAggregationQueryRequest,
    ) -> RpcResult<Vec<RunAggregationQueryResponse>> {
        let mut state = self.state.lock();
        state.calls.push(RecordedCall::RunAggregationQuery(request));
        state
            .aggregations
            .pop_front()
            .unwrap_or_else(|| Err(unscripted("run_aggregation_query")))
    }
}
