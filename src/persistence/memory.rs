//! In-process backend.
//!
//! Each transaction works on a private copy of the tables taken at `begin`.
//! Commit re-checks the row versions of everything it touched and the
//! uniqueness constraints, then swaps the rows in under the write lock.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    BidRepository, Store, StoreError, StoreResult, StoreTransaction, TenderRepository,
    UserRepository,
};
use crate::domain::{Bid, BidStatus, Tender, TenderStatus, TenderType, User};

#[derive(Debug, Clone, Default)]
struct Tables {
    tenders: HashMap<Uuid, Tender>,
    bids: HashMap<Uuid, Bid>,
    users: HashMap<Uuid, User>,
    versions: HashMap<Uuid, u64>,
}

impl Tables {
    fn check_unique(&self) -> StoreResult<()> {
        let mut references = HashSet::new();
        for t in self.tenders.values() {
            if !references.insert(t.reference_number()) {
                return Err(StoreError::Duplicate(format!(
                    "tender reference number '{}'",
                    t.reference_number()
                )));
            }
        }

        let mut pairs = HashSet::new();
        for b in self.bids.values() {
            if !pairs.insert((b.tender_id(), b.bidder_id())) {
                return Err(StoreError::Duplicate(format!(
                    "bid for tender {} by bidder {}",
                    b.tender_id(),
                    b.bidder_id()
                )));
            }
        }

        let mut usernames = HashSet::new();
        let mut emails = HashSet::new();
        for u in self.users.values() {
            if !usernames.insert(u.username()) {
                return Err(StoreError::Duplicate(format!("username '{}'", u.username())));
            }
            if !emails.insert(u.email()) {
                return Err(StoreError::Duplicate(format!("email '{}'", u.email())));
            }
        }
        Ok(())
    }
}

/// Thread-safe in-memory [`Store`]. Used for local development and tests.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next commit fail after all writes have been staged.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let snapshot = self.tables.read().clone();
        Ok(Box::new(MemoryTransaction {
            shared: self.tables.clone(),
            fail_commit: self.fail_next_commit.clone(),
            base_versions: snapshot.versions.clone(),
            working: snapshot,
            touched: HashSet::new(),
            affected: 0,
        }))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryTransaction {
    shared: Arc<RwLock<Tables>>,
    fail_commit: Arc<AtomicBool>,
    base_versions: HashMap<Uuid, u64>,
    working: Tables,
    touched: HashSet<Uuid>,
    affected: u64,
}

impl MemoryTransaction {
    fn record_write(&mut self, id: Uuid) {
        self.touched.insert(id);
        self.affected += 1;
    }
}

fn newest_first<T>(mut rows: Vec<T>, created: impl Fn(&T) -> (DateTime<Utc>, Uuid)) -> Vec<T> {
    rows.sort_by(|a, b| created(b).cmp(&created(a)));
    rows
}

fn sorted_tenders<'a>(rows: impl Iterator<Item = &'a Tender>) -> Vec<Tender> {
    newest_first(rows.cloned().collect(), |t| (t.audit().created_at(), t.id()))
}

fn sorted_bids<'a>(rows: impl Iterator<Item = &'a Bid>) -> Vec<Bid> {
    newest_first(rows.cloned().collect(), |b| (b.audit().created_at(), b.id()))
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    fn tenders(&mut self) -> &mut dyn TenderRepository {
        self
    }

    fn bids(&mut self) -> &mut dyn BidRepository {
        self
    }

    fn users(&mut self) -> &mut dyn UserRepository {
        self
    }

    async fn save_changes(&mut self) -> StoreResult<u64> {
        Ok(std::mem::take(&mut self.affected))
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        if self.fail_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Transaction("injected commit failure".into()));
        }

        let mut shared = self.shared.write();
        for id in &self.touched {
            if shared.versions.get(id) != self.base_versions.get(id) {
                let entity = if self.working.bids.contains_key(id) || shared.bids.contains_key(id) {
                    "bid"
                } else if self.working.users.contains_key(id) || shared.users.contains_key(id) {
                    "user"
                } else {
                    "tender"
                };
                return Err(StoreError::Conflict { entity, id: *id });
            }
        }

        let mut next = shared.clone();
        for id in &self.touched {
            apply_row(&mut next.tenders, &self.working.tenders, id);
            apply_row(&mut next.bids, &self.working.bids, id);
            apply_row(&mut next.users, &self.working.users, id);
            *next.versions.entry(*id).or_insert(0) += 1;
        }
        next.check_unique()?;

        *shared = next;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

fn apply_row<T: Clone>(target: &mut HashMap<Uuid, T>, source: &HashMap<Uuid, T>, id: &Uuid) {
    match source.get(id) {
        Some(row) => {
            target.insert(*id, row.clone());
        }
        None => {
            target.remove(id);
        }
    }
}

// ============================================================================
// Repositories
// ============================================================================

#[async_trait]
impl TenderRepository for MemoryTransaction {
    async fn get_by_id(&mut self, id: Uuid) -> StoreResult<Option<Tender>> {
        Ok(self.working.tenders.get(&id).cloned())
    }

    async fn get_by_reference_number(&mut self, reference: &str) -> StoreResult<Option<Tender>> {
        Ok(self
            .working
            .tenders
            .values()
            .find(|t| t.reference_number() == reference)
            .cloned())
    }

    async fn get_all(&mut self) -> StoreResult<Vec<Tender>> {
        Ok(sorted_tenders(self.working.tenders.values()))
    }

    async fn get_by_status(&mut self, status: TenderStatus) -> StoreResult<Vec<Tender>> {
        Ok(sorted_tenders(
            self.working.tenders.values().filter(|t| t.status() == status),
        ))
    }

    async fn get_by_type(&mut self, tender_type: TenderType) -> StoreResult<Vec<Tender>> {
        Ok(sorted_tenders(
            self.working
                .tenders
                .values()
                .filter(|t| t.details().tender_type == tender_type),
        ))
    }

    async fn get_by_category(&mut self, category: &str) -> StoreResult<Vec<Tender>> {
        Ok(sorted_tenders(self.working.tenders.values().filter(|t| {
            t.details().category.eq_ignore_ascii_case(category)
        })))
    }

    async fn get_closing_soon(&mut self, days: i64, now: DateTime<Utc>) -> StoreResult<Vec<Tender>> {
        let horizon = now + Duration::days(days);
        let mut rows: Vec<Tender> = self
            .working
            .tenders
            .values()
            .filter(|t| {
                t.status() == TenderStatus::Published
                    && t.closing_date() >= now
                    && t.closing_date() <= horizon
            })
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.closing_date());
        Ok(rows)
    }

    async fn exists(&mut self, id: Uuid) -> StoreResult<bool> {
        Ok(self.working.tenders.contains_key(&id))
    }

    async fn exists_by_reference_number(&mut self, reference: &str) -> StoreResult<bool> {
        Ok(self
            .working
            .tenders
            .values()
            .any(|t| t.reference_number() == reference))
    }

    async fn add(&mut self, tender: &Tender) -> StoreResult<()> {
        if self.working.tenders.contains_key(&tender.id()) {
            return Err(StoreError::Duplicate(format!("tender {}", tender.id())));
        }
        if TenderRepository::exists_by_reference_number(self, tender.reference_number()).await? {
            return Err(StoreError::Duplicate(format!(
                "tender reference number '{}'",
                tender.reference_number()
            )));
        }
        self.working.tenders.insert(tender.id(), tender.detached());
        self.record_write(tender.id());
        Ok(())
    }

    async fn update(&mut self, tender: &Tender) -> StoreResult<()> {
        let Some(row) = self.working.tenders.get_mut(&tender.id()) else {
            return Err(StoreError::NotFound {
                entity: "tender",
                id: tender.id(),
            });
        };
        *row = tender.detached();
        self.record_write(tender.id());
        Ok(())
    }

    async fn remove(&mut self, id: Uuid) -> StoreResult<bool> {
        let removed = self.working.tenders.remove(&id).is_some();
        if removed {
            self.record_write(id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl BidRepository for MemoryTransaction {
    async fn get_by_id(&mut self, id: Uuid) -> StoreResult<Option<Bid>> {
        Ok(self.working.bids.get(&id).cloned())
    }

    async fn get_all(&mut self) -> StoreResult<Vec<Bid>> {
        Ok(sorted_bids(self.working.bids.values()))
    }

    async fn get_by_tender(&mut self, tender_id: Uuid) -> StoreResult<Vec<Bid>> {
        Ok(sorted_bids(
            self.working.bids.values().filter(|b| b.tender_id() == tender_id),
        ))
    }

    async fn get_by_bidder(&mut self, bidder_id: Uuid) -> StoreResult<Vec<Bid>> {
        Ok(sorted_bids(
            self.working.bids.values().filter(|b| b.bidder_id() == bidder_id),
        ))
    }

    async fn get_by_status(&mut self, status: BidStatus) -> StoreResult<Vec<Bid>> {
        Ok(sorted_bids(
            self.working.bids.values().filter(|b| b.status() == status),
        ))
    }

    async fn exists(&mut self, id: Uuid) -> StoreResult<bool> {
        Ok(self.working.bids.contains_key(&id))
    }

    async fn exists_by_tender_and_bidder(&mut self, tender_id: Uuid, bidder_id: Uuid) -> StoreResult<bool> {
        Ok(self
            .working
            .bids
            .values()
            .any(|b| b.tender_id() == tender_id && b.bidder_id() == bidder_id))
    }

    async fn add(&mut self, bid: &Bid) -> StoreResult<()> {
        if self.working.bids.contains_key(&bid.id())
            || self.exists_by_tender_and_bidder(bid.tender_id(), bid.bidder_id()).await?
        {
            return Err(StoreError::Duplicate(format!(
                "bid for tender {} by bidder {}",
                bid.tender_id(),
                bid.bidder_id()
            )));
        }
        self.working.bids.insert(bid.id(), bid.detached());
        self.record_write(bid.id());
        Ok(())
    }

    async fn update(&mut self, bid: &Bid) -> StoreResult<()> {
        let Some(row) = self.working.bids.get_mut(&bid.id()) else {
            return Err(StoreError::NotFound {
                entity: "bid",
                id: bid.id(),
            });
        };
        *row = bid.detached();
        self.record_write(bid.id());
        Ok(())
    }

    async fn remove(&mut self, id: Uuid) -> StoreResult<bool> {
        let removed = self.working.bids.remove(&id).is_some();
        if removed {
            self.record_write(id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl UserRepository for MemoryTransaction {
    async fn get_by_id(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn get_by_username(&mut self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .working
            .users
            .values()
            .find(|u| u.username() == username)
            .cloned())
    }

    async fn get_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .working
            .users
            .values()
            .find(|u| u.email().as_str().eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn get_by_refresh_token(&mut self, token: &str) -> StoreResult<Option<User>> {
        Ok(self
            .working
            .users
            .values()
            .find(|u| u.refresh_tokens().iter().any(|t| t.token == token))
            .cloned())
    }

    async fn get_all(&mut self) -> StoreResult<Vec<User>> {
        Ok(newest_first(
            self.working.users.values().cloned().collect(),
            |u| (u.audit().created_at(), u.id()),
        ))
    }

    async fn exists(&mut self, id: Uuid) -> StoreResult<bool> {
        Ok(self.working.users.contains_key(&id))
    }

    async fn exists_by_username(&mut self, username: &str) -> StoreResult<bool> {
        Ok(self.working.users.values().any(|u| u.username() == username))
    }

    async fn exists_by_email(&mut self, email: &str) -> StoreResult<bool> {
        Ok(self
            .working
            .users
            .values()
            .any(|u| u.email().as_str().eq_ignore_ascii_case(email)))
    }

    async fn add(&mut self, user: &User) -> StoreResult<()> {
        if self.working.users.contains_key(&user.id()) {
            return Err(StoreError::Duplicate(format!("user {}", user.id())));
        }
        if self.exists_by_username(user.username()).await? {
            return Err(StoreError::Duplicate(format!("username '{}'", user.username())));
        }
        if self.exists_by_email(user.email().as_str()).await? {
            return Err(StoreError::Duplicate(format!("email '{}'", user.email())));
        }
        self.working.users.insert(user.id(), user.clone());
        self.record_write(user.id());
        Ok(())
    }

    async fn update(&mut self, user: &User) -> StoreResult<()> {
        let Some(row) = self.working.users.get_mut(&user.id()) else {
            return Err(StoreError::NotFound {
                entity: "user",
                id: user.id(),
            });
        };
        *row = user.clone();
        self.record_write(user.id());
        Ok(())
    }

    async fn remove(&mut self, id: Uuid) -> StoreResult<bool> {
        let removed = self.working.users.remove(&id).is_some();
        if removed {
            self.record_write(id);
        }
        Ok(removed)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AuditStamp, Email, Money, TenderDetails};
    use rust_decimal::Decimal;

    fn tender(reference: &str, closing_in_days: i64) -> Tender {
        let now = Utc::now();
        Tender::new(
            reference,
            TenderDetails {
                title: "School furniture".into(),
                description: String::new(),
                issue_date: now - Duration::days(1),
                closing_date: now + Duration::days(closing_in_days),
                tender_type: TenderType::Open,
                category: "Supplies".into(),
                budget_range: Money::new(Decimal::new(12_000, 0), "USD").unwrap(),
                contact_email: Email::new("supply@district.edu").unwrap(),
                issued_by_organization: "District".into(),
            },
            &AuditStamp::system(),
        )
        .unwrap()
    }

    fn publish(t: &mut Tender) {
        let s = AuditStamp::system();
        t.add_eligibility_criteria("Registered supplier", "", &s).unwrap();
        t.add_deliverable("Desks", "", &s).unwrap();
        t.publish(&s).unwrap();
        t.take_events();
    }

    #[tokio::test]
    async fn test_reads_do_not_see_uncommitted_writes_of_other_transactions() {
        let store = InMemoryStore::new();
        let t = tender("M-1", 10);

        let mut writer = store.begin().await.unwrap();
        writer.tenders().add(&t).await.unwrap();

        let mut reader = store.begin().await.unwrap();
        assert!(!reader.tenders().exists(t.id()).await.unwrap());

        writer.commit().await.unwrap();
        let mut after = store.begin().await.unwrap();
        assert!(after.tenders().exists(t.id()).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_update_conflicts() {
        let store = InMemoryStore::new();
        let mut t = tender("M-2", 10);
        let mut setup = store.begin().await.unwrap();
        setup.tenders().add(&t).await.unwrap();
        setup.commit().await.unwrap();

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        publish(&mut t);
        first.tenders().update(&t).await.unwrap();
        second.tenders().update(&t).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { entity: "tender", .. }));
    }

    #[tokio::test]
    async fn test_duplicate_reference_rejected() {
        let store = InMemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.tenders().add(&tender("M-3", 5)).await.unwrap();
        let err = tx.tenders().add(&tender("M-3", 5)).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_duplicate_reference_detected_at_commit() {
        let store = InMemoryStore::new();
        let mut a = store.begin().await.unwrap();
        let mut b = store.begin().await.unwrap();
        a.tenders().add(&tender("M-4", 5)).await.unwrap();
        b.tenders().add(&tender("M-4", 5)).await.unwrap();

        a.commit().await.unwrap();
        assert!(matches!(b.commit().await, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_closing_soon_only_returns_published_in_window() {
        let store = InMemoryStore::new();
        let mut soon = tender("M-5", 3);
        let mut later = tender("M-6", 30);
        let draft = tender("M-7", 2);
        publish(&mut soon);
        publish(&mut later);

        let mut tx = store.begin().await.unwrap();
        for t in [&soon, &later, &draft] {
            tx.tenders().add(t).await.unwrap();
        }
        assert_eq!(tx.save_changes().await.unwrap(), 3);
        assert_eq!(tx.save_changes().await.unwrap(), 0);

        let rows = tx.tenders().get_closing_soon(7, Utc::now()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].reference_number(), "M-5");
    }

    #[tokio::test]
    async fn test_stored_copy_has_no_pending_events() {
        let store = InMemoryStore::new();
        let mut t = tender("M-8", 3);
        let s = AuditStamp::system();
        t.add_eligibility_criteria("Registered supplier", "", &s).unwrap();
        t.add_deliverable("Desks", "", &s).unwrap();
        t.publish(&s).unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.tenders().add(&t).await.unwrap();
        let mut loaded = tx.tenders().get_by_id(t.id()).await.unwrap().unwrap();
        assert!(loaded.take_events().is_empty());
        assert_eq!(t.take_events().len(), 1);
    }
}
