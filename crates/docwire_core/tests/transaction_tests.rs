//! Integration tests for the transaction runner.

use bytes::Bytes;
use docwire_core::{
    AggregateQuery, BackoffConfig, Client, DatabaseId, DocumentRef, Error, MockRpc, Query,
    Settings, Timestamp, TransactionError, TransactionOptions, Value, READ_AFTER_WRITE_MESSAGE,
};
use docwire_codec::WireValue;
use docwire_protocol::{
    BatchGetDocumentsResponse, BatchGetResult, Code, ConsistencySelector, Document,
    RunAggregationQueryResponse, RunQueryResponse, Status, StructuredAggregationQuery,
    StructuredQuery, TransactionMode,
};
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

fn settings() -> Settings {
    Settings::new(DatabaseId::default_database("test-project")).with_backoff(BackoffConfig::none())
}

fn setup() -> (Arc<MockRpc>, Client) {
    let rpc = Arc::new(MockRpc::new());
    let client = Client::new(rpc.clone(), settings());
    (rpc, client)
}

fn handle(n: u32) -> Bytes {
    Bytes::from(format!("txn-{n}"))
}

fn read_time() -> Timestamp {
    Timestamp::new(1_700_000_000, 0).unwrap()
}

fn found(doc: &DocumentRef, count: i64) -> BatchGetDocumentsResponse {
    BatchGetDocumentsResponse {
        result: BatchGetResult::Found(Document {
            name: doc.formatted_name(),
            fields: BTreeMap::from([("count".to_string(), WireValue::IntegerValue(count))]),
            create_time: Some(read_time()),
            update_time: Some(read_time()),
        }),
        read_time: read_time(),
    }
}

#[tokio::test]
async fn read_after_write_is_rejected_without_rpc() {
    let (rpc, client) = setup();
    let doc = client.doc("coll/doc").unwrap();

    let result: Result<(), TransactionError<Error>> = client
        .run_transaction(|txn| {
            let doc = doc.clone();
            async move {
                txn.set(&doc, Value::map([("a", 1)]))?;
                txn.get_document(&doc).await?;
                Ok(())
            }
        })
        .await;

    let err = result.unwrap_err().into_callback().unwrap();
    assert_eq!(err, Error::invalid_operation(READ_AFTER_WRITE_MESSAGE));
    assert!(rpc.batch_get_requests().is_empty());
    assert!(rpc.commit_requests().is_empty());
    assert_eq!(rpc.rollback_requests().len(), 1);
}

#[tokio::test]
async fn rejecting_callback_runs_once() {
    let (rpc, client) = setup();
    let calls = AtomicU32::new(0);

    let result: Result<(), TransactionError<Error>> = client
        .run_transaction(|_txn| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::invalid_argument("nope")) }
        })
        .await;

    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(rpc.begin_requests().len(), 1);
    assert_eq!(rpc.rollback_requests().len(), 1);
    assert_eq!(rpc.rollback_requests()[0].transaction, handle(1));
    assert!(rpc.commit_requests().is_empty());
}

#[tokio::test]
async fn non_error_rejection_is_returned_unchanged() {
    let (_rpc, client) = setup();

    let result: Result<(), TransactionError<String>> = client
        .run_transaction(|_txn| async { Err("request failed: quota".to_string()) })
        .await;

    match result {
        Err(TransactionError::Callback(reason)) => assert_eq!(reason, "request failed: quota"),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn contention_retries_with_previous_handle() {
    let (rpc, client) = setup();
    let doc = client.doc("coll/doc").unwrap();
    rpc.push_commit(Err(Status::aborted("contention 1")));
    rpc.push_commit(Err(Status::aborted("contention 2")));
    for _ in 0..3 {
        rpc.push_batch_get(Ok(vec![found(&doc, 41)]));
    }
    let calls = AtomicU32::new(0);

    let result: Result<i64, TransactionError<Error>> = client
        .run_transaction(|txn| {
            calls.fetch_add(1, Ordering::SeqCst);
            let doc = doc.clone();
            async move {
                let snapshot = txn.get_document(&doc).await?;
                let count = snapshot.get("count")?.and_then(Value::as_integer).unwrap_or(0);
                txn.update(&doc, ("count", count + 1))?;
                Ok(count + 1)
            }
        })
        .await;

    assert_eq!(result.unwrap(), 42);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let begins = rpc.begin_requests();
    assert_eq!(begins.len(), 3);
    assert_eq!(
        begins[0].options,
        TransactionMode::ReadWrite {
            retry_transaction: None
        }
    );
    assert_eq!(
        begins[1].options,
        TransactionMode::ReadWrite {
            retry_transaction: Some(handle(1))
        }
    );
    assert_eq!(
        begins[2].options,
        TransactionMode::ReadWrite {
            retry_transaction: Some(handle(2))
        }
    );

    let commits = rpc.commit_requests();
    assert_eq!(commits.len(), 3);
    for (i, commit) in commits.iter().enumerate() {
        assert_eq!(commit.transaction, Some(handle(i as u32 + 1)));
        assert_eq!(commit.writes.len(), 1);
    }

    let reads = rpc.batch_get_requests();
    assert_eq!(
        reads[2].consistency,
        Some(ConsistencySelector::Transaction(handle(3)))
    );
    let rolled_back: Vec<Bytes> = rpc
        .rollback_requests()
        .into_iter()
        .map(|r| r.transaction)
        .collect();
    assert_eq!(rolled_back, vec![handle(1), handle(2)]);
}

#[tokio::test]
async fn exhausted_attempts_return_last_error() {
    let (rpc, client) = setup();
    for i in 1..5 {
        rpc.push_commit(Err(Status::aborted(format!("contention {i}"))));
    }
    rpc.push_commit(Err(Status::aborted("Final")));

    let result: Result<(), TransactionError<Error>> = client
        .run_transaction(|_txn| async { Ok(()) })
        .await;

    let err = result.unwrap_err();
    let engine = err.engine().unwrap();
    assert_eq!(engine.code(), Some(Code::Aborted));
    assert!(engine.to_string().contains("Final"), "{engine}");
    assert_eq!(rpc.begin_requests().len(), 5);
    assert_eq!(rpc.commit_requests().len(), 5);
}

#[tokio::test]
async fn custom_attempt_budget() {
    let (rpc, client) = setup();
    for _ in 0..2 {
        rpc.push_commit(Err(Status::unavailable("down")));
    }

    let result: Result<(), TransactionError<Error>> = client
        .run_transaction_with_options(TransactionOptions::with_max_attempts(2), |_txn| async {
            Ok(())
        })
        .await;

    assert!(result.is_err());
    assert_eq!(rpc.begin_requests().len(), 2);
}

#[tokio::test]
async fn read_only_reads_at_fixed_time() {
    let (rpc, client) = setup();
    let doc = client.doc("coll/doc").unwrap();
    rpc.push_batch_get(Ok(vec![found(&doc, 3)]));

    let result: Result<bool, TransactionError<Error>> = client
        .run_transaction_with_options(TransactionOptions::read_only_at(read_time()), |txn| {
            let doc = doc.clone();
            async move { Ok(txn.get_document(&doc).await?.exists()) }
        })
        .await;

    assert!(result.unwrap());
    assert!(rpc.begin_requests().is_empty());
    assert!(rpc.commit_requests().is_empty());
    assert!(rpc.rollback_requests().is_empty());
    assert_eq!(
        rpc.batch_get_requests()[0].consistency,
        Some(ConsistencySelector::ReadTime(read_time()))
    );
}

#[tokio::test]
async fn queries_and_aggregations_use_the_transaction() {
    let (rpc, client) = setup();
    let doc = client.doc("coll/doc").unwrap();
    let parent = client.database().documents_root();
    rpc.push_run_query(Ok(vec![RunQueryResponse {
        document: Some(Document {
            name: doc.formatted_name(),
            ..Document::default()
        }),
        read_time: Some(read_time()),
    }]));
    rpc.push_run_aggregation_query(Ok(vec![RunAggregationQueryResponse {
        result: Some(BTreeMap::from([("total".to_string(), WireValue::IntegerValue(9))])),
        read_time: Some(read_time()),
    }]));

    let query = Query::new(parent.clone(), StructuredQuery::default());
    let aggregate = AggregateQuery::new(parent, StructuredAggregationQuery::default());
    let result: Result<(usize, Option<Value>), TransactionError<Error>> = client
        .run_transaction(|txn| {
            let query = query.clone();
            let aggregate = aggregate.clone();
            async move {
                let docs = txn.get_query(&query).await?;
                let totals = txn.get(&aggregate).await?.into_aggregate();
                Ok((docs.len(), totals.and_then(|t| t.get("total").cloned())))
            }
        })
        .await;

    assert_eq!(result.unwrap(), (1, Some(Value::Integer(9))));
    let calls = rpc.calls();
    assert!(calls.iter().any(|c| matches!(
        c,
        docwire_core::RecordedCall::RunQuery(r)
            if r.consistency == Some(ConsistencySelector::Transaction(handle(1)))
    )));
}

#[tokio::test]
async fn concurrent_transactions_are_independent() {
    let (rpc, client) = setup();
    let a = client.doc("coll/a").unwrap();
    let b = client.doc("coll/b").unwrap();

    let run = |doc: DocumentRef| {
        let client = client.clone();
        async move {
            client
                .run_transaction(|txn| {
                    let doc = doc.clone();
                    async move {
                        txn.delete(&doc)?;
                        Ok::<_, Error>(())
                    }
                })
                .await
        }
    };
    let (first, second) = tokio::join!(run(a), run(b));

    first.unwrap();
    second.unwrap();
    let commits = rpc.commit_requests();
    assert_eq!(commits.len(), 2);
    assert!(commits.iter().all(|c| c.writes.len() == 1));
    assert_ne!(commits[0].transaction, commits[1].transaction);
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn log_events_reach_the_configured_dispatch() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let rpc = Arc::new(MockRpc::new());
    rpc.push_commit(Err(Status::aborted("busy")));
    let client = Client::new(
        rpc.clone(),
        settings().with_log_dispatch(tracing::Dispatch::new(subscriber)),
    );

    let result: Result<(), TransactionError<Error>> = client
        .run_transaction(|_txn| async { Ok(()) })
        .await;
    result.unwrap();

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert!(output.contains("commit failed"), "{output}");
    assert!(output.contains("committed"), "{output}");
    assert!(output.contains("transaction"), "{output}");
}

#[tokio::test]
async fn begin_failure_that_is_not_retryable_stops() {
    let (rpc, client) = setup();
    rpc.push_begin(Err(Status::new(Code::PermissionDenied, "denied")));

    let result: Result<(), TransactionError<Error>> = client
        .run_transaction(|_txn| async { Ok(()) })
        .await;

    assert_eq!(
        result.unwrap_err().engine().and_then(Error::code),
        Some(Code::PermissionDenied)
    );
    assert_eq!(rpc.calls().len(), 1);
}
