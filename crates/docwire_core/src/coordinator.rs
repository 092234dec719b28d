//! Begin/commit/rollback sequencing and the retry loop.

use crate::client::ClientContext;
use crate::config::{BackoffConfig, TransactionOptions};
use crate::error::{Error, Result, TransactionError};
use crate::transaction::Transaction;
use bytes::Bytes;
use docwire_codec::Timestamp;
use docwire_protocol::{
    BeginTransactionRequest, Code, CommitRequest, ConsistencySelector, RollbackRequest,
    TransactionMode, WireWrite,
};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn, Instrument};

/// Runs a callback as a transaction.
///
/// A read-write run begins a transaction, runs the callback against a fresh
/// [`Transaction`], and commits the recorded writes. When the commit fails
/// with a retryable status the handle is rolled back and a new attempt
/// begins, naming the failed handle as the one it retries, until the
/// attempt budget runs out. A failing callback is never retried.
///
/// A read-only run makes a single attempt and never commits.
pub(crate) struct TransactionRunner {
    context: Arc<ClientContext>,
    backoff: BackoffConfig,
    options: TransactionOptions,
}

impl TransactionRunner {
    pub(crate) fn new(
        context: Arc<ClientContext>,
        backoff: BackoffConfig,
        options: TransactionOptions,
    ) -> Self {
        Self {
            context,
            backoff,
            options,
        }
    }

    pub(crate) async fn run<T, E, F, Fut>(self, mut callback: F) -> std::result::Result<T, TransactionError<E>>
    where
        F: FnMut(Transaction) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.options.validate()?;

        let span = tracing::debug_span!(
            "transaction",
            database = %self.context.database.formatted_name(),
            read_only = self.options.is_read_only(),
        );
        async move {
            match self.options.clone() {
                TransactionOptions::ReadWrite { max_attempts } => {
                    self.run_read_write(max_attempts, &mut callback).await
                }
                TransactionOptions::ReadOnly { read_time } => {
                    self.run_read_only(read_time, &mut callback).await
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_read_write<T, E, F, Fut>(
        &self,
        max_attempts: u32,
        callback: &mut F,
    ) -> std::result::Result<T, TransactionError<E>>
    where
        F: FnMut(Transaction) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let mut previous: Option<Bytes> = None;
        let mut last_error: Option<Error> = None;

        for attempt in 1..=max_attempts {
            if let Some(error) = &last_error {
                self.wait_before_retry(attempt - 1, error).await;
            }

            let mode = TransactionMode::ReadWrite {
                retry_transaction: previous.clone(),
            };
            let id = match self.begin(mode).await {
                Ok(id) => id,
                Err(error) if error.is_retryable() => {
                    warn!(attempt, max_attempts, %error, "begin failed");
                    last_error = Some(error);
                    continue;
                }
                Err(error) => return Err(error.into()),
            };
            previous = Some(id.clone());
            debug!(attempt, "attempt started");

            let transaction = Transaction::new(
                Arc::clone(&self.context),
                ConsistencySelector::Transaction(id.clone()),
                false,
            );
            let outcome = callback(transaction.clone()).await;
            let writes = transaction.finish();

            let value = match outcome {
                Ok(value) => value,
                Err(error) => {
                    debug!(attempt, "callback failed");
                    self.rollback_quietly(&id).await;
                    return Err(TransactionError::Callback(error));
                }
            };

            let write_count = writes.len();
            match self.commit(&id, writes).await {
                Ok(()) => {
                    debug!(attempt, writes = write_count, "committed");
                    return Ok(value);
                }
                Err(error) => {
                    self.rollback_quietly(&id).await;
                    if !error.is_retryable() {
                        return Err(error.into());
                    }
                    warn!(attempt, max_attempts, %error, "commit failed");
                    last_error = Some(error);
                }
            }
        }

        let error = last_error
            .unwrap_or_else(|| Error::invalid_operation("transaction made no attempt"));
        warn!(max_attempts, %error, "attempts exhausted");
        Err(error.into())
    }

    async fn run_read_only<T, E, F, Fut>(
        &self,
        read_time: Option<Timestamp>,
        callback: &mut F,
    ) -> std::result::Result<T, TransactionError<E>>
    where
        F: FnMut(Transaction) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let (consistency, handle) = match read_time {
            Some(time) => (ConsistencySelector::ReadTime(time), None),
            None => {
                let id = self
                    .begin(TransactionMode::ReadOnly { read_time: None })
                    .await?;
                (ConsistencySelector::Transaction(id.clone()), Some(id))
            }
        };

        let transaction = Transaction::new(Arc::clone(&self.context), consistency, true);
        let outcome = callback(transaction.clone()).await;
        transaction.finish();

        match (outcome, handle) {
            (Err(error), Some(id)) => {
                self.rollback_quietly(&id).await;
                Err(TransactionError::Callback(error))
            }
            (Err(error), None) => Err(TransactionError::Callback(error)),
            (Ok(value), Some(id)) => {
                // Nothing else failed, so a failed release is the outcome.
                self.rollback(&id).await?;
                Ok(value)
            }
            (Ok(value), None) => Ok(value),
        }
    }

    async fn wait_before_retry(&self, retry: u32, error: &Error) {
        let delay = if error.code() == Some(Code::ResourceExhausted) {
            self.backoff.max_delay
        } else {
            self.backoff.delay_for_retry(retry)
        };
        if !delay.is_zero() {
            debug!(retry, ?delay, "backing off");
            tokio::time::sleep(delay).await;
        }
    }

    async fn begin(&self, options: TransactionMode) -> Result<Bytes> {
        let response = self
            .context
            .rpc
            .begin_transaction(BeginTransactionRequest {
                database: self.context.database.formatted_name(),
                options,
            })
            .await?;
        Ok(response.transaction)
    }

    async fn commit(&self, id: &Bytes, writes: Vec<WireWrite>) -> Result<()> {
        self.context
            .rpc
            .commit(CommitRequest {
                database: self.context.database.formatted_name(),
                writes,
                transaction: Some(id.clone()),
            })
            .await?;
        Ok(())
    }

    async fn rollback(&self, id: &Bytes) -> Result<()> {
        self.context
            .rpc
            .rollback(RollbackRequest {
                database: self.context.database.formatted_name(),
                transaction: id.clone(),
            })
            .await?;
        Ok(())
    }

    /// Rolls back after another failure; its own failure is only logged.
    async fn rollback_quietly(&self, id: &Bytes) {
        if let Err(error) = self.rollback(id).await {
            warn!(%error, "rollback failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::MockRpc;
    use docwire_codec::{DatabaseId, DocumentRef, EncodeOptions};
    use docwire_protocol::Status;

    fn runner(rpc: Arc<MockRpc>, options: TransactionOptions) -> TransactionRunner {
        TransactionRunner::new(
            Arc::new(ClientContext {
                rpc,
                database: DatabaseId::default_database("p"),
                encode_options: EncodeOptions::default(),
            }),
            BackoffConfig::none(),
            options,
        )
    }

    #[tokio::test]
    async fn empty_callback_commits_once() {
        let rpc = Arc::new(MockRpc::new());
        let result: std::result::Result<u32, TransactionError<Error>> =
            runner(Arc::clone(&rpc), TransactionOptions::default())
                .run(|_txn| async { Ok(7) })
                .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(rpc.begin_requests().len(), 1);
        let commits = rpc.commit_requests();
        assert_eq!(commits.len(), 1);
        assert!(commits[0].writes.is_empty());
        assert_eq!(commits[0].transaction, Some(Bytes::from_static(b"txn-1")));
    }

    #[tokio::test]
    async fn zero_attempts_make_no_calls() {
        let rpc = Arc::new(MockRpc::new());
        let result: std::result::Result<(), TransactionError<Error>> =
            runner(Arc::clone(&rpc), TransactionOptions::with_max_attempts(0))
                .run(|_txn| async { Ok(()) })
                .await;
        assert!(result.unwrap_err().engine().unwrap().is_invalid_argument());
        assert!(rpc.calls().is_empty());
    }

    #[tokio::test]
    async fn non_retryable_commit_failure_stops() {
        let rpc = Arc::new(MockRpc::new());
        rpc.push_commit(Err(Status::new(Code::PermissionDenied, "denied")));
        let result: std::result::Result<(), TransactionError<Error>> =
            runner(Arc::clone(&rpc), TransactionOptions::default())
                .run(|_txn| async { Ok(()) })
                .await;

        let err = result.unwrap_err();
        assert_eq!(err.engine().unwrap().code(), Some(Code::PermissionDenied));
        assert_eq!(rpc.begin_requests().len(), 1);
        assert_eq!(rpc.rollback_requests().len(), 1);
    }

    #[tokio::test]
    async fn retryable_begin_failure_retries() {
        let rpc = Arc::new(MockRpc::new());
        rpc.push_begin(Err(Status::unavailable("down")));
        let result: std::result::Result<(), TransactionError<Error>> =
            runner(Arc::clone(&rpc), TransactionOptions::default())
                .run(|_txn| async { Ok(()) })
                .await;

        result.unwrap();
        let begins = rpc.begin_requests();
        assert_eq!(begins.len(), 2);
        assert_eq!(
            begins[1].options,
            TransactionMode::ReadWrite {
                retry_transaction: None
            }
        );
    }

    #[tokio::test]
    async fn read_only_with_read_time_skips_begin() {
        let rpc = Arc::new(MockRpc::new());
        let read_time = Timestamp::new(100, 0).unwrap();
        let result: std::result::Result<Option<Bytes>, TransactionError<Error>> =
            runner(Arc::clone(&rpc), TransactionOptions::read_only_at(read_time))
                .run(|txn| async move { Ok(txn.id()) })
                .await;

        assert_eq!(result.unwrap(), None);
        assert!(rpc.calls().is_empty());
    }

    #[tokio::test]
    async fn read_only_releases_its_handle() {
        let rpc = Arc::new(MockRpc::new());
        let result: std::result::Result<(), TransactionError<Error>> =
            runner(Arc::clone(&rpc), TransactionOptions::read_only())
                .run(|_txn| async { Ok(()) })
                .await;

        result.unwrap();
        assert_eq!(
            rpc.begin_requests()[0].options,
            TransactionMode::ReadOnly { read_time: None }
        );
        assert!(rpc.commit_requests().is_empty());
        assert_eq!(rpc.rollback_requests().len(), 1);
    }

    #[tokio::test]
    async fn read_only_release_failure_is_reported() {
        let rpc = Arc::new(MockRpc::new());
        rpc.push_rollback(Err(Status::unavailable("gone")));
        let result: std::result::Result<(), TransactionError<Error>> =
            runner(Arc::clone(&rpc), TransactionOptions::read_only())
                .run(|_txn| async { Ok(()) })
                .await;

        assert_eq!(
            result.unwrap_err().engine().unwrap().code(),
            Some(Code::Unavailable)
        );
    }

    #[tokio::test]
    async fn rollback_failure_does_not_mask_callback_error() {
        let rpc = Arc::new(MockRpc::new());
        rpc.push_rollback(Err(Status::unavailable("gone")));
        let result: std::result::Result<(), TransactionError<&str>> =
            runner(Arc::clone(&rpc), TransactionOptions::default())
                .run(|_txn| async { Err("callback") })
                .await;

        assert_eq!(result.unwrap_err().into_callback(), Some("callback"));
    }

    #[tokio::test]
    async fn read_only_rejects_writes_inside_callback() {
        let rpc = Arc::new(MockRpc::new());
        let document = DocumentRef::new(DatabaseId::default_database("p"), "c/d").unwrap();
        let result: std::result::Result<(), TransactionError<Error>> =
            runner(Arc::clone(&rpc), TransactionOptions::read_only())
                .run(|txn| {
                    let document = document.clone();
                    async move {
                        txn.delete(&document)?;
                        Ok(())
                    }
                })
                .await;

        assert!(matches!(
            result.unwrap_err().into_callback(),
            Some(Error::InvalidOperation { .. })
        ));
    }
}
