//! Transaction boundary for the service layer.

use futures::future::BoxFuture;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::{
    BidRepository, Store, StoreError, StoreResult, StoreTransaction, TenderRepository,
    UserRepository,
};

/// Request-scoped gateway to a [`Store`].
///
/// `begin_transaction` borrows the unit of work mutably for as long as the
/// returned [`Transaction`] lives, so one unit of work never has two open
/// transactions.
pub struct UnitOfWork {
    store: Arc<dyn Store>,
}

impl UnitOfWork {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn begin_transaction(&mut self) -> StoreResult<Transaction<'_>> {
        let inner = self.store.begin().await?;
        let id = Uuid::new_v4();
        tracing::debug!(
            transaction_id = %id,
            backend = self.store.backend_name(),
            "Transaction started"
        );

        Ok(Transaction {
            inner: Some(inner),
            id,
            started: Instant::now(),
            _uow: PhantomData,
        })
    }

    /// Runs `f` inside a fresh transaction.
    ///
    /// Commits when `f` returns `Ok`. On `Err` the transaction is rolled back
    /// and the original error is returned. A failed commit surfaces as the
    /// store error and leaves nothing applied.
    pub async fn execute<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut Transaction<'_>) -> BoxFuture<'t, Result<T, E>>,
        E: From<StoreError>,
    {
        let mut tx = self.begin_transaction().await?;
        match f(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "Rollback failed after error");
                }
                Err(err)
            }
        }
    }
}

/// Open transaction. Dropping it without [`commit`](Self::commit) discards
/// every write made through it.
pub struct Transaction<'u> {
    inner: Option<Box<dyn StoreTransaction>>,
    id: Uuid,
    started: Instant,
    _uow: PhantomData<&'u mut UnitOfWork>,
}

impl Transaction<'_> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tenders(&mut self) -> &mut dyn TenderRepository {
        self.backend().tenders()
    }

    pub fn bids(&mut self) -> &mut dyn BidRepository {
        self.backend().bids()
    }

    pub fn users(&mut self) -> &mut dyn UserRepository {
        self.backend().users()
    }

    /// Flushes pending writes and returns the number of rows affected since
    /// the previous call.
    pub async fn save_changes(&mut self) -> StoreResult<u64> {
        let affected = self.backend().save_changes().await?;
        tracing::trace!(transaction_id = %self.id, affected, "Changes saved");
        Ok(affected)
    }

    pub async fn commit(mut self) -> StoreResult<()> {
        let Some(inner) = self.inner.take() else {
            return Err(StoreError::Transaction("transaction already completed".into()));
        };

        match inner.commit().await {
            Ok(()) => {
                tracing::debug!(
                    transaction_id = %self.id,
                    elapsed_ms = self.started.elapsed().as_millis() as u64,
                    "Transaction committed"
                );
                Ok(())
            }
            Err(err) => {
                tracing::warn!(
                    transaction_id = %self.id,
                    error = %err,
                    "Commit failed, transaction rolled back"
                );
                Err(err)
            }
        }
    }

    pub async fn rollback(mut self) -> StoreResult<()> {
        let Some(inner) = self.inner.take() else {
            return Ok(());
        };
        inner.rollback().await?;
        tracing::debug!(transaction_id = %self.id, "Transaction rolled back");
        Ok(())
    }

    fn backend(&mut self) -> &mut dyn StoreTransaction {
        // `inner` is only taken by `commit`/`rollback`, which consume `self`.
        self.inner
            .as_deref_mut()
            .expect("transaction is open until commit or rollback")
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.inner.take().is_some() {
            tracing::warn!(
                transaction_id = %self.id,
                "Transaction dropped without commit, rolling back"
            );
        }
    }
}
