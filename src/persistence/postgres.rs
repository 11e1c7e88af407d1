//! PostgreSQL backend.
//!
//! One [`sqlx::Transaction`] per unit-of-work transaction. Aggregates are
//! stored as a root row plus child tables; an update rewrites the root row
//! and replaces every child row. `get_by_id` takes a row lock so concurrent
//! writers to the same aggregate are serialized by the database.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgQueryResult;
use sqlx::{PgPool, Postgres};
use std::collections::HashMap;
use uuid::Uuid;

use super::{
    BidRepository, Store, StoreError, StoreResult, StoreTransaction, TenderRepository,
    UserRepository,
};
use crate::domain::bids::BidSnapshot;
use crate::domain::tenders::TenderSnapshot;
use crate::domain::users::UserSnapshot;
use crate::domain::{
    Address, AuditInfo, Bid, BidDocument, BidItem, BidStatus, CompanyDetails, Deliverable,
    EligibilityCriteria, Email, Money, PaymentTerm, RefreshToken, Tender, TenderActivity,
    TenderDetails, TenderDocument, TenderStatus, TenderType, User, UserProfile, UserRole,
};

/// sqlx-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx, affected: 0 }))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
    affected: u64,
}

impl PgTransaction {
    fn count(&mut self, result: PgQueryResult) -> u64 {
        let rows = result.rows_affected();
        self.affected += rows;
        rows
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
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
        // Statements run eagerly inside the open transaction.
        Ok(std::mem::take(&mut self.affected))
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{what}: {err}"))
}

fn audit(
    created_at: DateTime<Utc>,
    created_by: String,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
) -> AuditInfo {
    AuditInfo::restore(created_at, created_by, updated_at, updated_by)
}

// ============================================================================
// Tender rows
// ============================================================================

const TENDER_SELECT: &str = r#"
    SELECT id, reference_number, title, description, issue_date, closing_date,
           tender_type, category, budget_amount, budget_currency, contact_email,
           issued_by_organization, status, winning_bid_id, cancellation_reason,
           created_at, created_by, updated_at, updated_by
    FROM tenders
"#;

#[derive(Debug, sqlx::FromRow)]
struct TenderRow {
    id: Uuid,
    reference_number: String,
    title: String,
    description: String,
    issue_date: DateTime<Utc>,
    closing_date: DateTime<Utc>,
    tender_type: String,
    category: String,
    budget_amount: Decimal,
    budget_currency: String,
    contact_email: String,
    issued_by_organization: String,
    status: String,
    winning_bid_id: Option<Uuid>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    created_by: String,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct TenderDocumentRow {
    id: Uuid,
    tender_id: Uuid,
    name: String,
    file_url: String,
    description: String,
    file_type: String,
    file_size: i64,
    created_at: DateTime<Utc>,
    created_by: String,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

/// Shared shape of criteria and deliverable rows
#[derive(Debug, sqlx::FromRow)]
struct NamedChildRow {
    id: Uuid,
    tender_id: Uuid,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
    created_by: String,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ActivityRow {
    id: Uuid,
    tender_id: Uuid,
    activity_name: String,
    expected_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
    created_by: String,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentTermRow {
    id: Uuid,
    tender_id: Uuid,
    description: String,
    percentage: Decimal,
    created_at: DateTime<Utc>,
    created_by: String,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

/// Children of several tenders, keyed by tender id.
#[derive(Default)]
struct TenderChildren {
    documents: HashMap<Uuid, Vec<TenderDocument>>,
    criteria: HashMap<Uuid, Vec<EligibilityCriteria>>,
    deliverables: HashMap<Uuid, Vec<Deliverable>>,
    timeline: HashMap<Uuid, Vec<TenderActivity>>,
    payment_terms: HashMap<Uuid, Vec<PaymentTerm>>,
}

impl TenderRow {
    fn into_tender(self, children: &mut TenderChildren) -> StoreResult<Tender> {
        let details = TenderDetails {
            title: self.title,
            description: self.description,
            issue_date: self.issue_date,
            closing_date: self.closing_date,
            tender_type: self
                .tender_type
                .parse::<TenderType>()
                .map_err(|e| corrupt("tender type", e))?,
            category: self.category,
            budget_range: Money::new(self.budget_amount, &self.budget_currency)
                .map_err(|e| corrupt("tender budget", e))?,
            contact_email: Email::new(&self.contact_email)
                .map_err(|e| corrupt("tender contact email", e))?,
            issued_by_organization: self.issued_by_organization,
        };

        Ok(Tender::from_snapshot(TenderSnapshot {
            id: self.id,
            reference_number: self.reference_number,
            details,
            status: self
                .status
                .parse::<TenderStatus>()
                .map_err(|e| corrupt("tender status", e))?,
            winning_bid_id: self.winning_bid_id,
            cancellation_reason: self.cancellation_reason,
            documents: children.documents.remove(&self.id).unwrap_or_default(),
            eligibility_criteria: children.criteria.remove(&self.id).unwrap_or_default(),
            deliverables: children.deliverables.remove(&self.id).unwrap_or_default(),
            timeline: children.timeline.remove(&self.id).unwrap_or_default(),
            payment_terms: children.payment_terms.remove(&self.id).unwrap_or_default(),
            audit: audit(self.created_at, self.created_by, self.updated_at, self.updated_by),
        }))
    }
}

impl PgTransaction {
    async fn fetch_tenders(&mut self, rows: Vec<TenderRow>) -> StoreResult<Vec<Tender>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut children = TenderChildren::default();

        let documents = sqlx::query_as::<_, TenderDocumentRow>(
            r#"
            SELECT id, tender_id, name, file_url, description, file_type, file_size,
                   created_at, created_by, updated_at, updated_by
            FROM tender_documents WHERE tender_id = ANY($1) ORDER BY position
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;
        for r in documents {
            children.documents.entry(r.tender_id).or_default().push(TenderDocument {
                id: r.id,
                name: r.name,
                file_url: r.file_url,
                description: r.description,
                file_type: r.file_type,
                file_size: r.file_size,
                audit: audit(r.created_at, r.created_by, r.updated_at, r.updated_by),
            });
        }

        for r in self.fetch_named_children("tender_eligibility_criteria", &ids).await? {
            children.criteria.entry(r.tender_id).or_default().push(EligibilityCriteria {
                id: r.id,
                name: r.name,
                description: r.description,
                audit: audit(r.created_at, r.created_by, r.updated_at, r.updated_by),
            });
        }

        for r in self.fetch_named_children("tender_deliverables", &ids).await? {
            children.deliverables.entry(r.tender_id).or_default().push(Deliverable {
                id: r.id,
                name: r.name,
                description: r.description,
                audit: audit(r.created_at, r.created_by, r.updated_at, r.updated_by),
            });
        }

        let activities = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT id, tender_id, activity_name, expected_date,
                   created_at, created_by, updated_at, updated_by
            FROM tender_activities WHERE tender_id = ANY($1) ORDER BY position
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;
        for r in activities {
            children.timeline.entry(r.tender_id).or_default().push(TenderActivity {
                id: r.id,
                activity_name: r.activity_name,
                expected_date: r.expected_date,
                audit: audit(r.created_at, r.created_by, r.updated_at, r.updated_by),
            });
        }

        let terms = sqlx::query_as::<_, PaymentTermRow>(
            r#"
            SELECT id, tender_id, description, percentage,
                   created_at, created_by, updated_at, updated_by
            FROM tender_payment_terms WHERE tender_id = ANY($1) ORDER BY position
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;
        for r in terms {
            children.payment_terms.entry(r.tender_id).or_default().push(PaymentTerm {
                id: r.id,
                description: r.description,
                percentage: r.percentage,
                audit: audit(r.created_at, r.created_by, r.updated_at, r.updated_by),
            });
        }

        rows.into_iter()
            .map(|row| row.into_tender(&mut children))
            .collect()
    }

    async fn fetch_named_children(&mut self, table: &str, ids: &[Uuid]) -> StoreResult<Vec<NamedChildRow>> {
        let sql = format!(
            "SELECT id, tender_id, name, description, created_at, created_by, updated_at, updated_by \
             FROM {table} WHERE tender_id = ANY($1) ORDER BY position"
        );
        Ok(sqlx::query_as::<_, NamedChildRow>(&sql)
            .bind(ids)
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn tenders_where(&mut self, clause: &str, bind: Option<String>) -> StoreResult<Vec<Tender>> {
        let sql = format!("{TENDER_SELECT} {clause}");
        let mut query = sqlx::query_as::<_, TenderRow>(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&mut *self.tx).await?;
        self.fetch_tenders(rows).await
    }

    async fn insert_tender_children(&mut self, t: &Tender) -> StoreResult<()> {
        for (position, d) in t.documents().iter().enumerate() {
            let result = sqlx::query(
                r#"
                INSERT INTO tender_documents
                    (id, tender_id, position, name, file_url, description, file_type, file_size,
                     created_at, created_by, updated_at, updated_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(d.id)
            .bind(t.id())
            .bind(position as i32)
            .bind(&d.name)
            .bind(&d.file_url)
            .bind(&d.description)
            .bind(&d.file_type)
            .bind(d.file_size)
            .bind(d.audit.created_at())
            .bind(d.audit.created_by())
            .bind(d.audit.updated_at())
            .bind(d.audit.updated_by())
            .execute(&mut *self.tx)
            .await?;
            self.count(result);
        }

        let criteria = t
            .eligibility_criteria()
            .iter()
            .map(|c| (c.id, c.name.as_str(), c.description.as_str(), &c.audit));
        self.insert_named_children("tender_eligibility_criteria", t.id(), criteria)
            .await?;

        let deliverables = t
            .deliverables()
            .iter()
            .map(|d| (d.id, d.name.as_str(), d.description.as_str(), &d.audit));
        self.insert_named_children("tender_deliverables", t.id(), deliverables)
            .await?;

        for (position, a) in t.timeline().iter().enumerate() {
            let result = sqlx::query(
                r#"
                INSERT INTO tender_activities
                    (id, tender_id, position, activity_name, expected_date,
                     created_at, created_by, updated_at, updated_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(a.id)
            .bind(t.id())
            .bind(position as i32)
            .bind(&a.activity_name)
            .bind(a.expected_date)
            .bind(a.audit.created_at())
            .bind(a.audit.created_by())
            .bind(a.audit.updated_at())
            .bind(a.audit.updated_by())
            .execute(&mut *self.tx)
            .await?;
            self.count(result);
        }

        for (position, p) in t.payment_terms().iter().enumerate() {
            let result = sqlx::query(
                r#"
                INSERT INTO tender_payment_terms
                    (id, tender_id, position, description, percentage,
                     created_at, created_by, updated_at, updated_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(p.id)
            .bind(t.id())
            .bind(position as i32)
            .bind(&p.description)
            .bind(p.percentage)
            .bind(p.audit.created_at())
            .bind(p.audit.created_by())
            .bind(p.audit.updated_at())
            .bind(p.audit.updated_by())
            .execute(&mut *self.tx)
            .await?;
            self.count(result);
        }
        Ok(())
    }

    async fn insert_named_children<'a>(
        &mut self,
        table: &str,
        tender_id: Uuid,
        rows: impl Iterator<Item = (Uuid, &'a str, &'a str, &'a AuditInfo)> + Send,
    ) -> StoreResult<()> {
        let sql = format!(
            "INSERT INTO {table} \
                (id, tender_id, position, name, description, created_at, created_by, updated_at, updated_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        );
        for (position, (id, name, description, a)) in rows.enumerate() {
            let result = sqlx::query(&sql)
                .bind(id)
                .bind(tender_id)
                .bind(position as i32)
                .bind(name)
                .bind(description)
                .bind(a.created_at())
                .bind(a.created_by())
                .bind(a.updated_at())
                .bind(a.updated_by())
                .execute(&mut *self.tx)
                .await?;
            self.count(result);
        }
        Ok(())
    }

    async fn delete_tender_children(&mut self, tender_id: Uuid) -> StoreResult<()> {
        for table in [
            "tender_documents",
            "tender_eligibility_criteria",
            "tender_deliverables",
            "tender_activities",
            "tender_payment_terms",
        ] {
            let result = sqlx::query(&format!("DELETE FROM {table} WHERE tender_id = $1"))
                .bind(tender_id)
                .execute(&mut *self.tx)
                .await?;
            self.count(result);
        }
        Ok(())
    }
}

#[async_trait]
impl TenderRepository for PgTransaction {
    async fn get_by_id(&mut self, id: Uuid) -> StoreResult<Option<Tender>> {
        let sql = format!("{TENDER_SELECT} WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, TenderRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(self.fetch_tenders(row.into_iter().collect()).await?.pop())
    }

    async fn get_by_reference_number(&mut self, reference: &str) -> StoreResult<Option<Tender>> {
        Ok(self
            .tenders_where("WHERE reference_number = $1", Some(reference.to_string()))
            .await?
            .pop())
    }

    async fn get_all(&mut self) -> StoreResult<Vec<Tender>> {
        self.tenders_where("ORDER BY created_at DESC, id DESC", None)
            .await
    }

    async fn get_by_status(&mut self, status: TenderStatus) -> StoreResult<Vec<Tender>> {
        self.tenders_where(
            "WHERE status = $1 ORDER BY created_at DESC, id DESC",
            Some(status.as_str().to_string()),
        )
        .await
    }

    async fn get_by_type(&mut self, tender_type: TenderType) -> StoreResult<Vec<Tender>> {
        self.tenders_where(
            "WHERE tender_type = $1 ORDER BY created_at DESC, id DESC",
            Some(tender_type.as_str().to_string()),
        )
        .await
    }

    async fn get_by_category(&mut self, category: &str) -> StoreResult<Vec<Tender>> {
        self.tenders_where(
            "WHERE lower(category) = lower($1) ORDER BY created_at DESC, id DESC",
            Some(category.to_string()),
        )
        .await
    }

    async fn get_closing_soon(&mut self, days: i64, now: DateTime<Utc>) -> StoreResult<Vec<Tender>> {
        let sql = format!(
            "{TENDER_SELECT} WHERE status = $1 AND closing_date >= $2 AND closing_date <= $3 \
             ORDER BY closing_date"
        );
        let rows = sqlx::query_as::<_, TenderRow>(&sql)
            .bind(TenderStatus::Published.as_str())
            .bind(now)
            .bind(now + Duration::days(days))
            .fetch_all(&mut *self.tx)
            .await?;
        self.fetch_tenders(rows).await
    }

    async fn exists(&mut self, id: Uuid) -> StoreResult<bool> {
        Ok(
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM tenders WHERE id = $1)")
                .bind(id)
                .fetch_one(&mut *self.tx)
                .await?,
        )
    }

    async fn exists_by_reference_number(&mut self, reference: &str) -> StoreResult<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM tenders WHERE reference_number = $1)",
        )
        .bind(reference)
        .fetch_one(&mut *self.tx)
        .await?)
    }

    async fn add(&mut self, t: &Tender) -> StoreResult<()> {
        let d = t.details();
        let result = sqlx::query(
            r#"
            INSERT INTO tenders
                (id, reference_number, title, description, issue_date, closing_date,
                 tender_type, category, budget_amount, budget_currency, contact_email,
                 issued_by_organization, status, winning_bid_id, cancellation_reason,
                 created_at, created_by, updated_at, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17, $18, $19)
            "#,
        )
        .bind(t.id())
        .bind(t.reference_number())
        .bind(&d.title)
        .bind(&d.description)
        .bind(d.issue_date)
        .bind(d.closing_date)
        .bind(d.tender_type.as_str())
        .bind(&d.category)
        .bind(d.budget_range.amount())
        .bind(d.budget_range.currency())
        .bind(d.contact_email.as_str())
        .bind(&d.issued_by_organization)
        .bind(t.status().as_str())
        .bind(t.winning_bid_id())
        .bind(t.cancellation_reason())
        .bind(t.audit().created_at())
        .bind(t.audit().created_by())
        .bind(t.audit().updated_at())
        .bind(t.audit().updated_by())
        .execute(&mut *self.tx)
        .await?;
        self.count(result);

        self.insert_tender_children(t).await
    }

    async fn update(&mut self, t: &Tender) -> StoreResult<()> {
        let d = t.details();
        let result = sqlx::query(
            r#"
            UPDATE tenders SET
                title = $2, description = $3, issue_date = $4, closing_date = $5,
                tender_type = $6, category = $7, budget_amount = $8, budget_currency = $9,
                contact_email = $10, issued_by_organization = $11, status = $12,
                winning_bid_id = $13, cancellation_reason = $14,
                updated_at = $15, updated_by = $16
            WHERE id = $1
            "#,
        )
        .bind(t.id())
        .bind(&d.title)
        .bind(&d.description)
        .bind(d.issue_date)
        .bind(d.closing_date)
        .bind(d.tender_type.as_str())
        .bind(&d.category)
        .bind(d.budget_range.amount())
        .bind(d.budget_range.currency())
        .bind(d.contact_email.as_str())
        .bind(&d.issued_by_organization)
        .bind(t.status().as_str())
        .bind(t.winning_bid_id())
        .bind(t.cancellation_reason())
        .bind(t.audit().updated_at())
        .bind(t.audit().updated_by())
        .execute(&mut *self.tx)
        .await?;
        if self.count(result) == 0 {
            return Err(StoreError::NotFound {
                entity: "tender",
                id: t.id(),
            });
        }

        self.delete_tender_children(t.id()).await?;
        self.insert_tender_children(t).await
    }

    async fn remove(&mut self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM tenders WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(self.count(result) > 0)
    }
}

// ============================================================================
// Bid rows
// ============================================================================

const BID_SELECT: &str = r#"
    SELECT id, tender_id, bidder_id, status, bid_amount, bid_currency, submission_date,
           technical_proposal_summary, score, evaluation_comments,
           created_at, created_by, updated_at, updated_by
    FROM bids
"#;

#[derive(Debug, sqlx::FromRow)]
struct BidRow {
    id: Uuid,
    tender_id: Uuid,
    bidder_id: Uuid,
    status: String,
    bid_amount: Decimal,
    bid_currency: String,
    submission_date: Option<DateTime<Utc>>,
    technical_proposal_summary: String,
    score: Option<Decimal>,
    evaluation_comments: Option<String>,
    created_at: DateTime<Utc>,
    created_by: String,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct BidItemRow {
    id: Uuid,
    bid_id: Uuid,
    description: String,
    quantity: i32,
    unit_price: Decimal,
    total_price: Decimal,
    currency: String,
    created_at: DateTime<Utc>,
    created_by: String,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct BidDocumentRow {
    id: Uuid,
    bid_id: Uuid,
    name: String,
    file_url: String,
    document_type: String,
    file_type: String,
    file_size: i64,
    created_at: DateTime<Utc>,
    created_by: String,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

impl BidItemRow {
    fn into_item(self) -> StoreResult<BidItem> {
        Ok(BidItem {
            id: self.id,
            description: self.description,
            quantity: self.quantity,
            unit_price: Money::new(self.unit_price, &self.currency)
                .map_err(|e| corrupt("bid item unit price", e))?,
            total_price: Money::new(self.total_price, &self.currency)
                .map_err(|e| corrupt("bid item total price", e))?,
            audit: audit(self.created_at, self.created_by, self.updated_at, self.updated_by),
        })
    }
}

impl PgTransaction {
    async fn fetch_bids(&mut self, rows: Vec<BidRow>) -> StoreResult<Vec<Bid>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();

        let item_rows = sqlx::query_as::<_, BidItemRow>(
            r#"
            SELECT id, bid_id, description, quantity, unit_price, total_price, currency,
                   created_at, created_by, updated_at, updated_by
            FROM bid_items WHERE bid_id = ANY($1) ORDER BY position
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;
        let mut items: HashMap<Uuid, Vec<BidItem>> = HashMap::new();
        for r in item_rows {
            items.entry(r.bid_id).or_default().push(r.into_item()?);
        }

        let document_rows = sqlx::query_as::<_, BidDocumentRow>(
            r#"
            SELECT id, bid_id, name, file_url, document_type, file_type, file_size,
                   created_at, created_by, updated_at, updated_by
            FROM bid_documents WHERE bid_id = ANY($1) ORDER BY position
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;
        let mut documents: HashMap<Uuid, Vec<BidDocument>> = HashMap::new();
        for r in document_rows {
            documents.entry(r.bid_id).or_default().push(BidDocument {
                id: r.id,
                name: r.name,
                file_url: r.file_url,
                document_type: r.document_type,
                file_type: r.file_type,
                file_size: r.file_size,
                audit: audit(r.created_at, r.created_by, r.updated_at, r.updated_by),
            });
        }

        rows.into_iter()
            .map(|r| -> StoreResult<Bid> {
                Ok(Bid::from_snapshot(BidSnapshot {
                    id: r.id,
                    tender_id: r.tender_id,
                    bidder_id: r.bidder_id,
                    status: r
                        .status
                        .parse::<BidStatus>()
                        .map_err(|e| corrupt("bid status", e))?,
                    bid_amount: Money::new(r.bid_amount, &r.bid_currency)
                        .map_err(|e| corrupt("bid amount", e))?,
                    submission_date: r.submission_date,
                    technical_proposal_summary: r.technical_proposal_summary,
                    score: r.score,
                    evaluation_comments: r.evaluation_comments,
                    items: items.remove(&r.id).unwrap_or_default(),
                    documents: documents.remove(&r.id).unwrap_or_default(),
                    audit: audit(r.created_at, r.created_by, r.updated_at, r.updated_by),
                }))
            })
            .collect()
    }

    async fn bids_where(&mut self, clause: &str, bind: Option<Uuid>, status: Option<&str>) -> StoreResult<Vec<Bid>> {
        let sql = format!("{BID_SELECT} {clause}");
        let mut query = sqlx::query_as::<_, BidRow>(&sql);
        if let Some(id) = bind {
            query = query.bind(id);
        }
        if let Some(status) = status {
            query = query.bind(status.to_string());
        }
        let rows = query.fetch_all(&mut *self.tx).await?;
        self.fetch_bids(rows).await
    }

    async fn insert_bid_children(&mut self, b: &Bid) -> StoreResult<()> {
        for (position, i) in b.items().iter().enumerate() {
            let result = sqlx::query(
                r#"
                INSERT INTO bid_items
                    (id, bid_id, position, description, quantity, unit_price, total_price, currency,
                     created_at, created_by, updated_at, updated_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(i.id)
            .bind(b.id())
            .bind(position as i32)
            .bind(&i.description)
            .bind(i.quantity)
            .bind(i.unit_price.amount())
            .bind(i.total_price.amount())
            .bind(i.unit_price.currency())
            .bind(i.audit.created_at())
            .bind(i.audit.created_by())
            .bind(i.audit.updated_at())
            .bind(i.audit.updated_by())
            .execute(&mut *self.tx)
            .await?;
            self.count(result);
        }

        for (position, d) in b.documents().iter().enumerate() {
            let result = sqlx::query(
                r#"
                INSERT INTO bid_documents
                    (id, bid_id, position, name, file_url, document_type, file_type, file_size,
                     created_at, created_by, updated_at, updated_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(d.id)
            .bind(b.id())
            .bind(position as i32)
            .bind(&d.name)
            .bind(&d.file_url)
            .bind(&d.document_type)
            .bind(&d.file_type)
            .bind(d.file_size)
            .bind(d.audit.created_at())
            .bind(d.audit.created_by())
            .bind(d.audit.updated_at())
            .bind(d.audit.updated_by())
            .execute(&mut *self.tx)
            .await?;
            self.count(result);
        }
        Ok(())
    }
}

#[async_trait]
impl BidRepository for PgTransaction {
    async fn get_by_id(&mut self, id: Uuid) -> StoreResult<Option<Bid>> {
        Ok(self
            .bids_where("WHERE id = $1 FOR UPDATE", Some(id), None)
            .await?
            .pop())
    }

    async fn get_all(&mut self) -> StoreResult<Vec<Bid>> {
        self.bids_where("ORDER BY created_at DESC, id DESC", None, None)
            .await
    }

    async fn get_by_tender(&mut self, tender_id: Uuid) -> StoreResult<Vec<Bid>> {
        self.bids_where(
            "WHERE tender_id = $1 ORDER BY created_at DESC, id DESC",
            Some(tender_id),
            None,
        )
        .await
    }

    async fn get_by_bidder(&mut self, bidder_id: Uuid) -> StoreResult<Vec<Bid>> {
        self.bids_where(
            "WHERE bidder_id = $1 ORDER BY created_at DESC, id DESC",
            Some(bidder_id),
            None,
        )
        .await
    }

    async fn get_by_status(&mut self, status: BidStatus) -> StoreResult<Vec<Bid>> {
        self.bids_where(
            "WHERE status = $1 ORDER BY created_at DESC, id DESC",
            None,
            Some(status.as_str()),
        )
        .await
    }

    async fn exists(&mut self, id: Uuid) -> StoreResult<bool> {
        Ok(
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM bids WHERE id = $1)")
                .bind(id)
                .fetch_one(&mut *self.tx)
                .await?,
        )
    }

    async fn exists_by_tender_and_bidder(&mut self, tender_id: Uuid, bidder_id: Uuid) -> StoreResult<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM bids WHERE tender_id = $1 AND bidder_id = $2)",
        )
        .bind(tender_id)
        .bind(bidder_id)
        .fetch_one(&mut *self.tx)
        .await?)
    }

    async fn add(&mut self, b: &Bid) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO bids
                (id, tender_id, bidder_id, status, bid_amount, bid_currency, submission_date,
                 technical_proposal_summary, score, evaluation_comments,
                 created_at, created_by, updated_at, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(b.id())
        .bind(b.tender_id())
        .bind(b.bidder_id())
        .bind(b.status().as_str())
        .bind(b.bid_amount().amount())
        .bind(b.bid_amount().currency())
        .bind(b.submission_date())
        .bind(b.technical_proposal_summary())
        .bind(b.score())
        .bind(b.evaluation_comments())
        .bind(b.audit().created_at())
        .bind(b.audit().created_by())
        .bind(b.audit().updated_at())
        .bind(b.audit().updated_by())
        .execute(&mut *self.tx)
        .await?;
        self.count(result);

        self.insert_bid_children(b).await
    }

    async fn update(&mut self, b: &Bid) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bids SET
                status = $2, bid_amount = $3, bid_currency = $4, submission_date = $5,
                technical_proposal_summary = $6, score = $7, evaluation_comments = $8,
                updated_at = $9, updated_by = $10
            WHERE id = $1
            "#,
        )
        .bind(b.id())
        .bind(b.status().as_str())
        .bind(b.bid_amount().amount())
        .bind(b.bid_amount().currency())
        .bind(b.submission_date())
        .bind(b.technical_proposal_summary())
        .bind(b.score())
        .bind(b.evaluation_comments())
        .bind(b.audit().updated_at())
        .bind(b.audit().updated_by())
        .execute(&mut *self.tx)
        .await?;
        if self.count(result) == 0 {
            return Err(StoreError::NotFound {
                entity: "bid",
                id: b.id(),
            });
        }

        for table in ["bid_items", "bid_documents"] {
            let result = sqlx::query(&format!("DELETE FROM {table} WHERE bid_id = $1"))
                .bind(b.id())
                .execute(&mut *self.tx)
                .await?;
            self.count(result);
        }
        self.insert_bid_children(b).await
    }

    async fn remove(&mut self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM bids WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(self.count(result) > 0)
    }
}

// ============================================================================
// User rows
// ============================================================================

const USER_SELECT: &str = r#"
    SELECT id, username, first_name, last_name, email, phone_number, role, is_active,
           last_login_at, company_name, registration_number, company_street, company_city,
           company_state, company_country, company_zip_code,
           created_at, created_by, updated_at, updated_by
    FROM users
"#;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    first_name: String,
    last_name: String,
    email: String,
    phone_number: String,
    role: String,
    is_active: bool,
    last_login_at: Option<DateTime<Utc>>,
    company_name: Option<String>,
    registration_number: Option<String>,
    company_street: Option<String>,
    company_city: Option<String>,
    company_state: Option<String>,
    company_country: Option<String>,
    company_zip_code: Option<String>,
    created_at: DateTime<Utc>,
    created_by: String,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    user_id: Uuid,
    token: String,
    expiry_date: DateTime<Utc>,
    is_revoked: bool,
    revoked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    created_by: String,
    updated_at: Option<DateTime<Utc>>,
    updated_by: Option<String>,
}

impl UserRow {
    fn into_user(self, refresh_tokens: Vec<RefreshToken>) -> StoreResult<User> {
        let company = self.company_name.map(|company_name| CompanyDetails {
            company_name,
            registration_number: self.registration_number.unwrap_or_default(),
            company_address: Address::new(
                self.company_street.unwrap_or_default(),
                self.company_city.unwrap_or_default(),
                self.company_state.unwrap_or_default(),
                self.company_country.unwrap_or_default(),
                self.company_zip_code.unwrap_or_default(),
            ),
        });

        Ok(User::from_snapshot(UserSnapshot {
            id: self.id,
            username: self.username,
            profile: UserProfile {
                first_name: self.first_name,
                last_name: self.last_name,
                email: Email::new(&self.email).map_err(|e| corrupt("user email", e))?,
                phone_number: self.phone_number,
            },
            role: self
                .role
                .parse::<UserRole>()
                .map_err(|e| corrupt("user role", e))?,
            is_active: self.is_active,
            last_login_at: self.last_login_at,
            company,
            refresh_tokens,
            audit: audit(self.created_at, self.created_by, self.updated_at, self.updated_by),
        }))
    }
}

impl PgTransaction {
    async fn fetch_users(&mut self, rows: Vec<UserRow>) -> StoreResult<Vec<User>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let token_rows = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT id, user_id, token, expiry_date, is_revoked, revoked_at,
                   created_at, created_by, updated_at, updated_by
            FROM refresh_tokens WHERE user_id = ANY($1) ORDER BY created_at, id
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut tokens: HashMap<Uuid, Vec<RefreshToken>> = HashMap::new();
        for r in token_rows {
            tokens.entry(r.user_id).or_default().push(RefreshToken {
                id: r.id,
                token: r.token,
                expiry_date: r.expiry_date,
                is_revoked: r.is_revoked,
                revoked_at: r.revoked_at,
                audit: audit(r.created_at, r.created_by, r.updated_at, r.updated_by),
            });
        }

        rows.into_iter()
            .map(|r| {
                let owned = tokens.remove(&r.id).unwrap_or_default();
                r.into_user(owned)
            })
            .collect()
    }

    async fn users_where(&mut self, clause: &str, bind: Option<String>) -> StoreResult<Vec<User>> {
        let sql = format!("{USER_SELECT} {clause}");
        let mut query = sqlx::query_as::<_, UserRow>(&sql);
        if let Some(value) = bind {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&mut *self.tx).await?;
        self.fetch_users(rows).await
    }

    async fn insert_refresh_tokens(&mut self, u: &User) -> StoreResult<()> {
        for t in u.refresh_tokens() {
            let result = sqlx::query(
                r#"
                INSERT INTO refresh_tokens
                    (id, user_id, token, expiry_date, is_revoked, revoked_at,
                     created_at, created_by, updated_at, updated_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(t.id)
            .bind(u.id())
            .bind(&t.token)
            .bind(t.expiry_date)
            .bind(t.is_revoked)
            .bind(t.revoked_at)
            .bind(t.audit.created_at())
            .bind(t.audit.created_by())
            .bind(t.audit.updated_at())
            .bind(t.audit.updated_by())
            .execute(&mut *self.tx)
            .await?;
            self.count(result);
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for PgTransaction {
    async fn get_by_id(&mut self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!("{USER_SELECT} WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(self.fetch_users(row.into_iter().collect()).await?.pop())
    }

    async fn get_by_username(&mut self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users_where("WHERE username = $1", Some(username.to_string()))
            .await?
            .pop())
    }

    async fn get_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users_where("WHERE lower(email) = lower($1)", Some(email.to_string()))
            .await?
            .pop())
    }

    async fn get_by_refresh_token(&mut self, token: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users_where(
                "WHERE id = (SELECT user_id FROM refresh_tokens WHERE token = $1) FOR UPDATE",
                Some(token.to_string()),
            )
            .await?
            .pop())
    }

    async fn get_all(&mut self) -> StoreResult<Vec<User>> {
        self.users_where("ORDER BY created_at DESC, id DESC", None)
            .await
    }

    async fn exists(&mut self, id: Uuid) -> StoreResult<bool> {
        Ok(
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
                .bind(id)
                .fetch_one(&mut *self.tx)
                .await?,
        )
    }

    async fn exists_by_username(&mut self, username: &str) -> StoreResult<bool> {
        Ok(
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&mut *self.tx)
                .await?,
        )
    }

    async fn exists_by_email(&mut self, email: &str) -> StoreResult<bool> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = lower($1))",
        )
        .bind(email)
        .fetch_one(&mut *self.tx)
        .await?)
    }

    async fn add(&mut self, u: &User) -> StoreResult<()> {
        let p = u.profile();
        let company = u.company();
        let address = company.map(|c| &c.company_address);
        let result = sqlx::query(
            r#"
            INSERT INTO users
                (id, username, first_name, last_name, email, phone_number, role, is_active,
                 last_login_at, company_name, registration_number, company_street, company_city,
                 company_state, company_country, company_zip_code,
                 created_at, created_by, updated_at, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20)
            "#,
        )
        .bind(u.id())
        .bind(u.username())
        .bind(&p.first_name)
        .bind(&p.last_name)
        .bind(p.email.as_str())
        .bind(&p.phone_number)
        .bind(u.role().as_str())
        .bind(u.is_active())
        .bind(u.last_login_at())
        .bind(company.map(|c| c.company_name.as_str()))
        .bind(company.map(|c| c.registration_number.as_str()))
        .bind(address.map(|a| a.street.as_str()))
        .bind(address.map(|a| a.city.as_str()))
        .bind(address.map(|a| a.state.as_str()))
        .bind(address.map(|a| a.country.as_str()))
        .bind(address.map(|a| a.zip_code.as_str()))
        .bind(u.audit().created_at())
        .bind(u.audit().created_by())
        .bind(u.audit().updated_at())
        .bind(u.audit().updated_by())
        .execute(&mut *self.tx)
        .await?;
        self.count(result);

        self.insert_refresh_tokens(u).await
    }

    async fn update(&mut self, u: &User) -> StoreResult<()> {
        let p = u.profile();
        let company = u.company();
        let address = company.map(|c| &c.company_address);
        let result = sqlx::query(
            r#"
            UPDATE users SET
                first_name = $2, last_name = $3, email = $4, phone_number = $5, role = $6,
                is_active = $7, last_login_at = $8, company_name = $9, registration_number = $10,
                company_street = $11, company_city = $12, company_state = $13,
                company_country = $14, company_zip_code = $15,
                updated_at = $16, updated_by = $17
            WHERE id = $1
            "#,
        )
        .bind(u.id())
        .bind(&p.first_name)
        .bind(&p.last_name)
        .bind(p.email.as_str())
        .bind(&p.phone_number)
        .bind(u.role().as_str())
        .bind(u.is_active())
        .bind(u.last_login_at())
        .bind(company.map(|c| c.company_name.as_str()))
        .bind(company.map(|c| c.registration_number.as_str()))
        .bind(address.map(|a| a.street.as_str()))
        .bind(address.map(|a| a.city.as_str()))
        .bind(address.map(|a| a.state.as_str()))
        .bind(address.map(|a| a.country.as_str()))
        .bind(address.map(|a| a.zip_code.as_str()))
        .bind(u.audit().updated_at())
        .bind(u.audit().updated_by())
        .execute(&mut *self.tx)
        .await?;
        if self.count(result) == 0 {
            return Err(StoreError::NotFound {
                entity: "user",
                id: u.id(),
            });
        }

        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(u.id())
            .execute(&mut *self.tx)
            .await?;
        self.count(result);
        self.insert_refresh_tokens(u).await
    }

    async fn remove(&mut self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(self.count(result) > 0)
    }
}
