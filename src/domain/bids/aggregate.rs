use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::entities::{BidDocument, BidItem};
use crate::domain::audit::{AuditInfo, AuditStamp};
use crate::domain::documents::DocumentAttachment;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::Money;

// ============================================================================
// Bid status machine
// ============================================================================

/// Draft → Submitted → UnderEvaluation → {Accepted → Winner, Rejected}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Draft,
    Submitted,
    UnderEvaluation,
    Accepted,
    Rejected,
    Winner,
}

impl BidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Submitted => "submitted",
            Self::UnderEvaluation => "under_evaluation",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Winner => "winner",
        }
    }

    fn advance(self, from: Self, to: Self, message: &str) -> DomainResult<Self> {
        if self == from {
            Ok(to)
        } else {
            Err(DomainError::operation(message))
        }
    }

    fn submit(self) -> DomainResult<Self> {
        self.advance(Self::Draft, Self::Submitted, "Only draft bids can be submitted")
    }

    fn start_evaluation(self) -> DomainResult<Self> {
        self.advance(
            Self::Submitted,
            Self::UnderEvaluation,
            "Only submitted bids can be evaluated",
        )
    }

    fn accept(self) -> DomainResult<Self> {
        self.advance(
            Self::UnderEvaluation,
            Self::Accepted,
            "Only bids under evaluation can be accepted",
        )
    }

    fn reject(self) -> DomainResult<Self> {
        self.advance(
            Self::UnderEvaluation,
            Self::Rejected,
            "Only bids under evaluation can be rejected",
        )
    }

    fn mark_as_winner(self) -> DomainResult<Self> {
        self.advance(
            Self::Accepted,
            Self::Winner,
            "Only accepted bids can be marked as winner",
        )
    }
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BidStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "submitted" => Ok(Self::Submitted),
            "under_evaluation" => Ok(Self::UnderEvaluation),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "winner" => Ok(Self::Winner),
            other => Err(format!("unknown bid status '{other}'")),
        }
    }
}

// ============================================================================
// Bid aggregate
// ============================================================================

const MIN_SCORE: Decimal = Decimal::ZERO;
const MAX_SCORE: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone)]
pub struct Bid {
    id: Uuid,
    tender_id: Uuid,
    bidder_id: Uuid,
    status: BidStatus,
    bid_amount: Money,
    submission_date: Option<DateTime<Utc>>,
    technical_proposal_summary: String,
    score: Option<Decimal>,
    evaluation_comments: Option<String>,
    items: Vec<BidItem>,
    documents: Vec<BidDocument>,
    audit: AuditInfo,
    pending_events: Vec<DomainEvent>,
}

impl Bid {
    /// Creates a Draft bid. `bid_amount` is provisional until the first item
    /// is added; from then on it is derived from the items.
    ///
    /// One bid per (tender, bidder) is enforced by the caller.
    pub fn new(
        tender_id: Uuid,
        bidder_id: Uuid,
        bid_amount: Money,
        technical_proposal_summary: &str,
        stamp: &AuditStamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tender_id,
            bidder_id,
            status: BidStatus::Draft,
            bid_amount,
            submission_date: None,
            technical_proposal_summary: technical_proposal_summary.trim().to_string(),
            score: None,
            evaluation_comments: None,
            items: Vec::new(),
            documents: Vec::new(),
            audit: AuditInfo::created(stamp),
            pending_events: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn tender_id(&self) -> Uuid {
        self.tender_id
    }

    pub fn bidder_id(&self) -> Uuid {
        self.bidder_id
    }

    pub fn status(&self) -> BidStatus {
        self.status
    }

    pub fn bid_amount(&self) -> &Money {
        &self.bid_amount
    }

    pub fn submission_date(&self) -> Option<DateTime<Utc>> {
        self.submission_date
    }

    pub fn technical_proposal_summary(&self) -> &str {
        &self.technical_proposal_summary
    }

    pub fn score(&self) -> Option<Decimal> {
        self.score
    }

    pub fn evaluation_comments(&self) -> Option<&str> {
        self.evaluation_comments.as_deref()
    }

    pub fn items(&self) -> &[BidItem] {
        &self.items
    }

    pub fn documents(&self) -> &[BidDocument] {
        &self.documents
    }

    pub fn audit(&self) -> &AuditInfo {
        &self.audit
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // ------------------------------------------------------------------
    // Draft editing
    // ------------------------------------------------------------------

    /// Adds a line and recomputes `bid_amount` as the sum of all line totals.
    ///
    /// The first item fixes the bid currency; later items must match it.
    pub fn add_bid_item(
        &mut self,
        description: &str,
        quantity: i32,
        unit_price: Money,
        stamp: &AuditStamp,
    ) -> DomainResult<Uuid> {
        self.ensure_draft("Bid items can only be changed on draft bids")?;
        let item = BidItem::new(description, quantity, unit_price, stamp)?;

        let total = match self.items.first() {
            None => item.total_price.clone(),
            Some(first) => {
                let sum = self
                    .items
                    .iter()
                    .try_fold(Money::zero(first.total_price.currency())?, |acc, i| {
                        acc.add(&i.total_price)
                    })?;
                sum.add(&item.total_price)?
            }
        };

        let id = item.id;
        self.items.push(item);
        self.bid_amount = total;
        self.audit.touch(stamp);
        Ok(id)
    }

    pub fn add_document(
        &mut self,
        attachment: DocumentAttachment,
        stamp: &AuditStamp,
    ) -> DomainResult<Uuid> {
        self.ensure_draft("Documents can only be changed on draft bids")?;
        let document = BidDocument::new(attachment, stamp)?;
        let id = document.id;
        self.documents.push(document);
        self.audit.touch(stamp);
        Ok(id)
    }

    /// Returns `false` when no document has the given id.
    pub fn remove_document(&mut self, document_id: Uuid, stamp: &AuditStamp) -> DomainResult<bool> {
        self.ensure_draft("Documents can only be changed on draft bids")?;
        let before = self.documents.len();
        self.documents.retain(|d| d.id != document_id);
        let removed = self.documents.len() != before;
        if removed {
            self.audit.touch(stamp);
        }
        Ok(removed)
    }

    pub fn update_proposal(&mut self, summary: &str, stamp: &AuditStamp) -> DomainResult<()> {
        self.ensure_draft("Only draft bids can be edited")?;
        self.technical_proposal_summary = summary.trim().to_string();
        self.audit.touch(stamp);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Stamps `submission_date` with `stamp.at`.
    pub fn submit(&mut self, stamp: &AuditStamp) -> DomainResult<()> {
        let next = self.status.submit()?;
        if self.items.is_empty() {
            return Err(DomainError::operation(
                "Bid must include at least one item",
            ));
        }
        if self.documents.is_empty() {
            return Err(DomainError::operation(
                "Bid must include supporting documents",
            ));
        }

        self.status = next;
        self.submission_date = Some(stamp.at);
        self.audit.touch(stamp);
        self.pending_events.push(DomainEvent::BidSubmitted {
            bid_id: self.id,
            tender_id: self.tender_id,
            bidder_id: self.bidder_id,
            submission_date: stamp.at,
        });
        Ok(())
    }

    pub fn start_evaluation(&mut self, stamp: &AuditStamp) -> DomainResult<()> {
        self.status = self.status.start_evaluation()?;
        self.audit.touch(stamp);
        Ok(())
    }

    pub fn set_score(&mut self, score: Decimal, comments: &str, stamp: &AuditStamp) -> DomainResult<()> {
        if score < MIN_SCORE || score > MAX_SCORE {
            return Err(DomainError::OutOfRange {
                field: "score",
                value: score,
                min: MIN_SCORE,
                max: MAX_SCORE,
            });
        }

        self.score = Some(score);
        self.evaluation_comments = Some(comments.trim().to_string());
        self.audit.touch(stamp);
        Ok(())
    }

    pub fn accept(&mut self, stamp: &AuditStamp) -> DomainResult<()> {
        self.status = self.status.accept()?;
        self.audit.touch(stamp);
        Ok(())
    }

    /// The reason replaces any evaluation comments.
    pub fn reject(&mut self, reason: &str, stamp: &AuditStamp) -> DomainResult<()> {
        self.status = self.status.reject()?;
        self.evaluation_comments = Some(reason.trim().to_string());
        self.audit.touch(stamp);
        Ok(())
    }

    pub fn mark_as_winner(&mut self, stamp: &AuditStamp) -> DomainResult<()> {
        self.status = self.status.mark_as_winner()?;
        self.audit.touch(stamp);
        Ok(())
    }

    fn ensure_draft(&self, message: &str) -> DomainResult<()> {
        if self.status != BidStatus::Draft {
            return Err(DomainError::operation(message));
        }
        Ok(())
    }
}

// ============================================================================
// Rehydration
// ============================================================================

#[derive(Debug, Clone)]
pub(crate) struct BidSnapshot {
    pub id: Uuid,
    pub tender_id: Uuid,
    pub bidder_id: Uuid,
    pub status: BidStatus,
    pub bid_amount: Money,
    pub submission_date: Option<DateTime<Utc>>,
    pub technical_proposal_summary: String,
    pub score: Option<Decimal>,
    pub evaluation_comments: Option<String>,
    pub items: Vec<BidItem>,
    pub documents: Vec<BidDocument>,
    pub audit: AuditInfo,
}

impl Bid {
    /// Copy for storage, without events still waiting to be drained.
    pub(crate) fn detached(&self) -> Self {
        Self {
            pending_events: Vec::new(),
            ..self.clone()
        }
    }

    pub(crate) fn from_snapshot(s: BidSnapshot) -> Self {
        Self {
            id: s.id,
            tender_id: s.tender_id,
            bidder_id: s.bidder_id,
            status: s.status,
            bid_amount: s.bid_amount,
            submission_date: s.submission_date,
            technical_proposal_summary: s.technical_proposal_summary,
            score: s.score,
            evaluation_comments: s.evaluation_comments,
            items: s.items,
            documents: s.documents,
            audit: s.audit,
            pending_events: Vec::new(),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use chrono::TimeZone;

    fn stamp() -> AuditStamp {
        AuditStamp::new("bidder-7", Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap())
    }

    fn money(amount: &str, currency: &str) -> Money {
        Money::new(amount.parse().unwrap(), currency).unwrap()
    }

    fn draft() -> Bid {
        Bid::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            money("0", "USD"),
            "Two crews, six weeks",
            &stamp(),
        )
    }

    fn attachment() -> DocumentAttachment {
        DocumentAttachment {
            name: "Technical proposal".into(),
            file_url: "/uploads/proposal.pdf".into(),
            document_type: "technical".into(),
            file_type: "application/pdf".into(),
            file_size: 2048,
            ..Default::default()
        }
    }

    fn submitted() -> Bid {
        let mut bid = draft();
        bid.add_bid_item("Asphalt", 2, money("10.00", "USD"), &stamp())
            .unwrap();
        bid.add_document(attachment(), &stamp()).unwrap();
        bid.submit(&stamp()).unwrap();
        bid
    }

    fn under_evaluation() -> Bid {
        let mut bid = submitted();
        bid.start_evaluation(&stamp()).unwrap();
        bid
    }

    #[test]
    fn test_add_bid_item_recomputes_amount() {
        let mut bid = draft();
        bid.add_bid_item("Asphalt", 2, money("10.00", "USD"), &stamp())
            .unwrap();
        bid.add_bid_item("Paint", 3, money("5.50", "USD"), &stamp())
            .unwrap();

        assert_eq!(bid.bid_amount(), &money("36.50", "USD"));
        assert_eq!(bid.items().len(), 2);
        assert_eq!(bid.items()[1].total_price, money("16.50", "USD"));
    }

    #[test]
    fn test_first_item_replaces_provisional_currency() {
        let mut bid = draft();
        bid.add_bid_item("Survey", 1, money("99.99", "EUR"), &stamp())
            .unwrap();
        assert_eq!(bid.bid_amount(), &money("99.99", "EUR"));
    }

    #[test]
    fn test_mixed_currency_item_is_rejected() {
        let mut bid = draft();
        bid.add_bid_item("Asphalt", 2, money("10.00", "USD"), &stamp())
            .unwrap();

        let err = bid
            .add_bid_item("Paint", 1, money("5.00", "EUR"), &stamp())
            .unwrap_err();
        assert!(matches!(err, DomainError::CurrencyMismatch { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert_eq!(bid.items().len(), 1);
        assert_eq!(bid.bid_amount(), &money("20.00", "USD"));
    }

    #[test]
    fn test_bid_item_validation() {
        let mut bid = draft();
        let blank = bid.add_bid_item("  ", 1, money("1", "USD"), &stamp());
        assert!(matches!(blank, Err(DomainError::InvalidArgument { .. })));

        let zero = bid.add_bid_item("Asphalt", 0, money("1", "USD"), &stamp());
        assert!(matches!(
            zero,
            Err(DomainError::InvalidArgument {
                field: "quantity",
                ..
            })
        ));
        assert!(bid
            .add_bid_item("Asphalt", -4, money("1", "USD"), &stamp())
            .is_err());
        assert!(bid.items().is_empty());
    }

    #[test]
    fn test_submit_requires_items() {
        let mut bid = draft();
        bid.add_document(attachment(), &stamp()).unwrap();
        let err = bid.submit(&stamp()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert_eq!(bid.status(), BidStatus::Draft);
        assert!(bid.submission_date().is_none());
    }

    #[test]
    fn test_submit_requires_documents() {
        let mut bid = draft();
        bid.add_bid_item("Asphalt", 1, money("10", "USD"), &stamp())
            .unwrap();
        assert!(bid.submit(&stamp()).is_err());
    }

    #[test]
    fn test_submit_stamps_submission_date() {
        let mut bid = submitted();
        assert_eq!(bid.status(), BidStatus::Submitted);
        assert_eq!(bid.submission_date(), Some(stamp().at));

        let events = bid.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "BidSubmitted");
        assert_eq!(events[0].aggregate_id(), bid.id());
    }

    #[test]
    fn test_draft_only_edits() {
        let mut bid = submitted();
        assert!(bid
            .add_bid_item("Late", 1, money("1", "USD"), &stamp())
            .is_err());
        assert!(bid.add_document(attachment(), &stamp()).is_err());
        assert!(bid.update_proposal("changed", &stamp()).is_err());
        assert_eq!(bid.technical_proposal_summary(), "Two crews, six weeks");
    }

    #[test]
    fn test_score_bounds() {
        let mut bid = under_evaluation();
        let err = bid.set_score(Decimal::new(150, 0), "x", &stamp()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfRange);
        assert!(bid.score().is_none());

        assert!(bid.set_score(Decimal::new(-1, 0), "x", &stamp()).is_err());

        bid.set_score(Decimal::new(85, 0), "ok", &stamp()).unwrap();
        assert_eq!(bid.score(), Some(Decimal::new(85, 0)));
        assert_eq!(bid.evaluation_comments(), Some("ok"));
        assert_eq!(bid.score(), Some(Decimal::new(85, 0)));
        assert_eq!(bid.status(), BidStatus::UnderEvaluation);
    }

    #[test]
    fn test_accept_then_win() {
        let mut bid = under_evaluation();
        assert!(bid.mark_as_winner(&stamp()).is_err());
        bid.accept(&stamp()).unwrap();
        bid.mark_as_winner(&stamp()).unwrap();
        assert_eq!(bid.status(), BidStatus::Winner);
    }

    #[test]
    fn test_reject_records_reason() {
        let mut bid = under_evaluation();
        bid.reject("Incomplete pricing", &stamp()).unwrap();
        assert_eq!(bid.status(), BidStatus::Rejected);
        assert_eq!(bid.evaluation_comments(), Some("Incomplete pricing"));
        assert!(bid.accept(&stamp()).is_err());
    }

    #[test]
    fn test_transitions_out_of_order_fail() {
        let mut bid = draft();
        assert!(bid.start_evaluation(&stamp()).is_err());
        assert!(bid.accept(&stamp()).is_err());
        assert!(bid.reject("no", &stamp()).is_err());

        let mut bid = submitted();
        assert!(bid.submit(&stamp()).is_err());
        assert!(bid.accept(&stamp()).is_err());
    }

    #[test]
    fn test_remove_document() {
        let mut bid = draft();
        let id = bid.add_document(attachment(), &stamp()).unwrap();
        assert!(bid.remove_document(id, &stamp()).unwrap());
        assert!(!bid.remove_document(id, &stamp()).unwrap());
        assert!(bid.documents().is_empty());
    }
}
