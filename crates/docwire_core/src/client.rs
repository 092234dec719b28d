//! Client entry point.

use crate::config::{Settings, TransactionOptions};
use crate::coordinator::TransactionRunner;
use crate::error::{Result, TransactionError};
use crate::rpc::FirestoreRpc;
use crate::snapshot::CommitResult;
use crate::transaction::Transaction;
use crate::write::WriteBatch;
use docwire_codec::{DatabaseId, DocumentRef, EncodeOptions};
use docwire_protocol::CommitRequest;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::instrument::WithSubscriber;
use tracing::{debug, Dispatch};

/// What every transaction and batch of a client shares.
pub(crate) struct ClientContext {
    pub(crate) rpc: Arc<dyn FirestoreRpc>,
    pub(crate) database: DatabaseId,
    pub(crate) encode_options: EncodeOptions,
}

impl fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientContext")
            .field("database", &self.database)
            .field("encode_options", &self.encode_options)
            .finish_non_exhaustive()
    }
}

/// A database client.
///
/// Cloning is cheap. Transactions run on one client are independent of
/// each other and may run concurrently.
#[derive(Debug, Clone)]
pub struct Client {
    context: Arc<ClientContext>,
    settings: Settings,
}

impl Client {
    /// Creates a client that talks to the backend through `rpc`.
    pub fn new(rpc: Arc<dyn FirestoreRpc>, settings: Settings) -> Self {
        let context = Arc::new(ClientContext {
            rpc,
            database: settings.database.clone(),
            encode_options: settings.encode_options(),
        });
        Self { context, settings }
    }

    /// The settings in effect.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The database this client addresses.
    pub fn database(&self) -> &DatabaseId {
        &self.context.database
    }

    /// A reference to the document at `path`, relative to the database root.
    pub fn doc(&self, path: &str) -> Result<DocumentRef> {
        Ok(DocumentRef::new(self.context.database.clone(), path)?)
    }

    /// An empty batch using this client's encoding settings.
    pub fn batch(&self) -> WriteBatch {
        WriteBatch::new(self.context.encode_options)
    }

    /// Commits a batch outside of any transaction.
    pub async fn commit_batch(&self, mut batch: WriteBatch) -> Result<CommitResult> {
        let writes = batch.take_writes();
        let count = writes.len();
        let context = Arc::clone(&self.context);
        async move {
            let response = context
                .rpc
                .commit(CommitRequest {
                    database: context.database.formatted_name(),
                    writes,
                    transaction: None,
                })
                .await?;
            debug!(writes = count, "batch committed");
            CommitResult::from_response(response, count)
        }
        .with_subscriber(self.log_dispatch())
        .await
    }

    /// Runs `callback` as a read-write transaction with default options.
    pub async fn run_transaction<T, E, F, Fut>(
        &self,
        callback: F,
    ) -> std::result::Result<T, TransactionError<E>>
    where
        F: FnMut(Transaction) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.run_transaction_with_options(TransactionOptions::default(), callback)
            .await
    }

    /// Runs `callback` as a transaction.
    ///
    /// The callback may be invoked more than once; each invocation gets a
    /// fresh [`Transaction`]. Its result is returned after a successful
    /// commit. Its error is returned unchanged as
    /// [`TransactionError::Callback`] after the attempt is rolled back.
    ///
    /// Dropping the returned future abandons the run; the open transaction
    /// then expires on the backend.
    pub async fn run_transaction_with_options<T, E, F, Fut>(
        &self,
        options: TransactionOptions,
        callback: F,
    ) -> std::result::Result<T, TransactionError<E>>
    where
        F: FnMut(Transaction) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        TransactionRunner::new(
            Arc::clone(&self.context),
            self.settings.backoff.clone(),
            options,
        )
        .run(callback)
        .with_subscriber(self.log_dispatch())
        .await
    }

    fn log_dispatch(&self) -> Dispatch {
        self.settings
            .log_dispatch
            .clone()
            .unwrap_or_else(Dispatch::none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::MockRpc;
    use docwire_codec::Value;

    fn client(rpc: Arc<MockRpc>) -> Client {
        Client::new(rpc, Settings::new(DatabaseId::default_database("p")))
    }

    #[test]
    fn doc_requires_document_path() {
        let client = client(Arc::new(MockRpc::new()));
        assert_eq!(client.doc("c/d").unwrap().id(), "d");
        assert!(client.doc("c").is_err());
    }

    #[tokio::test]
    async fn commit_batch_without_transaction() {
        let rpc = Arc::new(MockRpc::new());
        let client = client(Arc::clone(&rpc));
        let mut batch = client.batch();
        batch
            .set(&client.doc("c/1").unwrap(), Value::map([("a", 1)]))
            .unwrap();
        batch.delete(&client.doc("c/2").unwrap()).unwrap();

        let result = client.commit_batch(batch).await.unwrap();
        assert_eq!(result.write_results.len(), 2);

        let commits = rpc.commit_requests();
        assert_eq!(commits.len(), 1);
        assert!(commits[0].transaction.is_none());
        assert!(rpc.begin_requests().is_empty());
    }
}
