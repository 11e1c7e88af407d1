//! Storage boundary.
//!
//! Services only ever talk to the repository traits through a
//! [`Transaction`] obtained from a [`UnitOfWork`]. A backend implements
//! [`Store`] (a factory for transactions) and [`StoreTransaction`] (the
//! repositories plus commit/rollback for one atomic unit).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Bid, BidStatus, Tender, TenderStatus, TenderType, User};

pub mod memory;
pub mod postgres;
pub mod unit_of_work;

pub use memory::InMemoryStore;
pub use postgres::PgStore;
pub use unit_of_work::{Transaction, UnitOfWork};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("duplicate {0}")]
    Duplicate(String),

    #[error("concurrent modification of {entity} {id}")]
    Conflict { entity: &'static str, id: Uuid },

    #[error("transaction failed: {0}")]
    Transaction(String),

    #[error("stored data is invalid: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Duplicate(db.constraint().unwrap_or("key").to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// Repository contracts
// ============================================================================

#[async_trait]
pub trait TenderRepository: Send {
    async fn get_by_id(&mut self, id: Uuid) -> StoreResult<Option<Tender>>;
    async fn get_by_reference_number(&mut self, reference: &str) -> StoreResult<Option<Tender>>;
    async fn get_all(&mut self) -> StoreResult<Vec<Tender>>;
    async fn get_by_status(&mut self, status: TenderStatus) -> StoreResult<Vec<Tender>>;
    async fn get_by_type(&mut self, tender_type: TenderType) -> StoreResult<Vec<Tender>>;
    async fn get_by_category(&mut self, category: &str) -> StoreResult<Vec<Tender>>;
    /// Published tenders closing between `now` and `now + days`.
    async fn get_closing_soon(&mut self, days: i64, now: DateTime<Utc>) -> StoreResult<Vec<Tender>>;
    async fn exists(&mut self, id: Uuid) -> StoreResult<bool>;
    async fn exists_by_reference_number(&mut self, reference: &str) -> StoreResult<bool>;
    async fn add(&mut self, tender: &Tender) -> StoreResult<()>;
    async fn update(&mut self, tender: &Tender) -> StoreResult<()>;
    /// Returns `false` when nothing was stored under `id`.
    async fn remove(&mut self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait BidRepository: Send {
    async fn get_by_id(&mut self, id: Uuid) -> StoreResult<Option<Bid>>;
    async fn get_all(&mut self) -> StoreResult<Vec<Bid>>;
    async fn get_by_tender(&mut self, tender_id: Uuid) -> StoreResult<Vec<Bid>>;
    async fn get_by_bidder(&mut self, bidder_id: Uuid) -> StoreResult<Vec<Bid>>;
    async fn get_by_status(&mut self, status: BidStatus) -> StoreResult<Vec<Bid>>;
    async fn exists(&mut self, id: Uuid) -> StoreResult<bool>;
    async fn exists_by_tender_and_bidder(&mut self, tender_id: Uuid, bidder_id: Uuid) -> StoreResult<bool>;
    async fn add(&mut self, bid: &Bid) -> StoreResult<()>;
    async fn update(&mut self, bid: &Bid) -> StoreResult<()>;
    async fn remove(&mut self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait UserRepository: Send {
    async fn get_by_id(&mut self, id: Uuid) -> StoreResult<Option<User>>;
    async fn get_by_username(&mut self, username: &str) -> StoreResult<Option<User>>;
    async fn get_by_email(&mut self, email: &str) -> StoreResult<Option<User>>;
    async fn get_by_refresh_token(&mut self, token: &str) -> StoreResult<Option<User>>;
    async fn get_all(&mut self) -> StoreResult<Vec<User>>;
    async fn exists(&mut self, id: Uuid) -> StoreResult<bool>;
    async fn exists_by_username(&mut self, username: &str) -> StoreResult<bool>;
    async fn exists_by_email(&mut self, email: &str) -> StoreResult<bool>;
    async fn add(&mut self, user: &User) -> StoreResult<()>;
    async fn update(&mut self, user: &User) -> StoreResult<()>;
    async fn remove(&mut self, id: Uuid) -> StoreResult<bool>;
}

// ============================================================================
// Backend contracts
// ============================================================================

/// Shared, thread-safe handle to a storage backend.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;

    /// Liveness check used by the health endpoint.
    async fn ping(&self) -> StoreResult<()>;

    fn backend_name(&self) -> &'static str;
}

/// One open backend transaction. Not shared between tasks.
#[async_trait]
pub trait StoreTransaction: Send {
    fn tenders(&mut self) -> &mut dyn TenderRepository;
    fn bids(&mut self) -> &mut dyn BidRepository;
    fn users(&mut self) -> &mut dyn UserRepository;

    /// Rows written since the last call.
    async fn save_changes(&mut self) -> StoreResult<u64>;
    async fn commit(self: Box<Self>) -> StoreResult<()>;
    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
