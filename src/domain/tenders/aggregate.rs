use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::entities::{
    Deliverable, EligibilityCriteria, PaymentTerm, TenderActivity, TenderDocument,
};
use crate::domain::audit::{AuditInfo, AuditStamp};
use crate::domain::documents::DocumentAttachment;
use crate::domain::errors::{require_text, DomainError, DomainResult};
use crate::domain::events::DomainEvent;
use crate::domain::value_objects::{Email, Money};

// ============================================================================
// Tender status machine
// ============================================================================

/// Draft → Published → UnderEvaluation → Awarded → Closed, with Cancelled
/// reachable from every state except Closed and Cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenderStatus {
    Draft,
    Published,
    UnderEvaluation,
    Awarded,
    Closed,
    Cancelled,
}

impl TenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::UnderEvaluation => "under_evaluation",
            Self::Awarded => "awarded",
            Self::Closed => "closed",
            Self::Cancelled => "cancelled",
        }
    }

    fn publish(self) -> DomainResult<Self> {
        match self {
            Self::Draft => Ok(Self::Published),
            _ => Err(DomainError::tender_operation(
                "Only draft tenders can be published",
            )),
        }
    }

    fn start_evaluation(self) -> DomainResult<Self> {
        match self {
            Self::Published => Ok(Self::UnderEvaluation),
            _ => Err(DomainError::tender_operation(
                "Only published tenders can be moved to evaluation",
            )),
        }
    }

    fn award(self) -> DomainResult<Self> {
        match self {
            Self::UnderEvaluation => Ok(Self::Awarded),
            _ => Err(DomainError::tender_operation(
                "Only tenders under evaluation can be awarded",
            )),
        }
    }

    fn close(self) -> DomainResult<Self> {
        match self {
            Self::Awarded => Ok(Self::Closed),
            _ => Err(DomainError::tender_operation(
                "Only awarded tenders can be closed",
            )),
        }
    }

    fn cancel(self) -> DomainResult<Self> {
        match self {
            Self::Closed | Self::Cancelled => Err(DomainError::tender_operation(
                "Cannot cancel a closed or already cancelled tender",
            )),
            _ => Ok(Self::Cancelled),
        }
    }
}

impl fmt::Display for TenderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TenderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "under_evaluation" => Ok(Self::UnderEvaluation),
            "awarded" => Ok(Self::Awarded),
            "closed" => Ok(Self::Closed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown tender status '{other}'")),
        }
    }
}

/// Procurement method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenderType {
    Open,
    Restricted,
    Negotiated,
    DirectProcurement,
}

impl Default for TenderType {
    fn default() -> Self {
        Self::Open
    }
}

impl TenderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Restricted => "restricted",
            Self::Negotiated => "negotiated",
            Self::DirectProcurement => "direct_procurement",
        }
    }
}

impl FromStr for TenderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "restricted" => Ok(Self::Restricted),
            "negotiated" => Ok(Self::Negotiated),
            "direct_procurement" => Ok(Self::DirectProcurement),
            other => Err(format!("unknown tender type '{other}'")),
        }
    }
}

// ============================================================================
// Tender aggregate
// ============================================================================

/// Editable descriptive fields of a tender.
#[derive(Debug, Clone)]
pub struct TenderDetails {
    pub title: String,
    pub description: String,
    pub issue_date: DateTime<Utc>,
    pub closing_date: DateTime<Utc>,
    pub tender_type: TenderType,
    pub category: String,
    pub budget_range: Money,
    pub contact_email: Email,
    pub issued_by_organization: String,
}

impl TenderDetails {
    fn validate(mut self) -> DomainResult<Self> {
        self.title = require_text("title", &self.title)?;
        if self.closing_date <= self.issue_date {
            return Err(DomainError::InvalidTenderDate {
                issue: self.issue_date,
                closing: self.closing_date,
            });
        }
        self.description = self.description.trim().to_string();
        self.category = self.category.trim().to_string();
        self.issued_by_organization = self.issued_by_organization.trim().to_string();
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct Tender {
    id: Uuid,
    reference_number: String,
    details: TenderDetails,
    status: TenderStatus,
    winning_bid_id: Option<Uuid>,
    cancellation_reason: Option<String>,
    documents: Vec<TenderDocument>,
    eligibility_criteria: Vec<EligibilityCriteria>,
    deliverables: Vec<Deliverable>,
    timeline: Vec<TenderActivity>,
    payment_terms: Vec<PaymentTerm>,
    audit: AuditInfo,
    pending_events: Vec<DomainEvent>,
}

impl Tender {
    /// Creates a tender in Draft.
    ///
    /// Reference-number uniqueness is a repository concern and is checked by
    /// the caller before construction.
    pub fn new(
        reference_number: &str,
        details: TenderDetails,
        stamp: &AuditStamp,
    ) -> DomainResult<Self> {
        let details = details.validate()?;
        let reference_number = require_text("reference number", reference_number)?;

        Ok(Self {
            id: Uuid::new_v4(),
            reference_number,
            details,
            status: TenderStatus::Draft,
            winning_bid_id: None,
            cancellation_reason: None,
            documents: Vec::new(),
            eligibility_criteria: Vec::new(),
            deliverables: Vec::new(),
            timeline: Vec::new(),
            payment_terms: Vec::new(),
            audit: AuditInfo::created(stamp),
            pending_events: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Read-only views
    // ------------------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn reference_number(&self) -> &str {
        &self.reference_number
    }

    pub fn title(&self) -> &str {
        &self.details.title
    }

    pub fn details(&self) -> &TenderDetails {
        &self.details
    }

    pub fn closing_date(&self) -> DateTime<Utc> {
        self.details.closing_date
    }

    pub fn status(&self) -> TenderStatus {
        self.status
    }

    pub fn winning_bid_id(&self) -> Option<Uuid> {
        self.winning_bid_id
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn documents(&self) -> &[TenderDocument] {
        &self.documents
    }

    pub fn eligibility_criteria(&self) -> &[EligibilityCriteria] {
        &self.eligibility_criteria
    }

    pub fn deliverables(&self) -> &[Deliverable] {
        &self.deliverables
    }

    pub fn timeline(&self) -> &[TenderActivity] {
        &self.timeline
    }

    pub fn payment_terms(&self) -> &[PaymentTerm] {
        &self.payment_terms
    }

    pub fn audit(&self) -> &AuditInfo {
        &self.audit
    }

    pub fn total_payment_percentage(&self) -> Decimal {
        self.payment_terms.iter().map(|t| t.percentage).sum()
    }

    /// Drains events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // ------------------------------------------------------------------
    // Child collections
    // ------------------------------------------------------------------

    pub fn update_details(&mut self, details: TenderDetails, stamp: &AuditStamp) -> DomainResult<()> {
        self.ensure_draft("Only draft tenders can be edited")?;
        self.details = details.validate()?;
        self.audit.touch(stamp);
        Ok(())
    }

    pub fn add_document(
        &mut self,
        attachment: DocumentAttachment,
        stamp: &AuditStamp,
    ) -> DomainResult<Uuid> {
        self.ensure_documents_editable()?;
        let document = TenderDocument::new(attachment, stamp)?;
        let id = document.id;
        self.documents.push(document);
        self.audit.touch(stamp);
        Ok(id)
    }

    /// Returns `false` when no document has the given id.
    pub fn remove_document(&mut self, document_id: Uuid, stamp: &AuditStamp) -> DomainResult<bool> {
        self.ensure_documents_editable()?;
        let before = self.documents.len();
        self.documents.retain(|d| d.id != document_id);
        let removed = self.documents.len() != before;
        if removed {
            self.audit.touch(stamp);
        }
        Ok(removed)
    }

    pub fn add_eligibility_criteria(
        &mut self,
        name: &str,
        description: &str,
        stamp: &AuditStamp,
    ) -> DomainResult<Uuid> {
        self.ensure_draft("Eligibility criteria can only be changed on draft tenders")?;
        let criteria = EligibilityCriteria::new(name, description, stamp)?;
        let id = criteria.id;
        self.eligibility_criteria.push(criteria);
        self.audit.touch(stamp);
        Ok(id)
    }

    pub fn add_deliverable(
        &mut self,
        name: &str,
        description: &str,
        stamp: &AuditStamp,
    ) -> DomainResult<Uuid> {
        self.ensure_draft("Deliverables can only be changed on draft tenders")?;
        let deliverable = Deliverable::new(name, description, stamp)?;
        let id = deliverable.id;
        self.deliverables.push(deliverable);
        self.audit.touch(stamp);
        Ok(id)
    }

    pub fn add_timeline_activity(
        &mut self,
        activity_name: &str,
        expected_date: DateTime<Utc>,
        stamp: &AuditStamp,
    ) -> DomainResult<Uuid> {
        self.ensure_draft("The timeline can only be changed on draft tenders")?;
        let activity = TenderActivity::new(activity_name, expected_date, stamp)?;
        let id = activity.id;
        self.timeline.push(activity);
        self.audit.touch(stamp);
        Ok(id)
    }

    /// Cumulative percentage across all terms may not exceed 100.
    pub fn add_payment_term(
        &mut self,
        description: &str,
        percentage: Decimal,
        stamp: &AuditStamp,
    ) -> DomainResult<Uuid> {
        self.ensure_draft("Payment terms can only be changed on draft tenders")?;
        let term = PaymentTerm::new(description, percentage, stamp)?;

        let total = self.total_payment_percentage() + term.percentage;
        if total > Decimal::ONE_HUNDRED {
            return Err(DomainError::operation(format!(
                "Total payment term percentage cannot exceed 100% (would be {total}%)"
            )));
        }

        let id = term.id;
        self.payment_terms.push(term);
        self.audit.touch(stamp);
        Ok(id)
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    pub fn publish(&mut self, stamp: &AuditStamp) -> DomainResult<()> {
        let next = self.status.publish()?;
        if self.eligibility_criteria.is_empty() {
            return Err(DomainError::tender_operation(
                "Tender must have at least one eligibility criteria",
            ));
        }
        if self.deliverables.is_empty() {
            return Err(DomainError::tender_operation(
                "Tender must have at least one deliverable",
            ));
        }

        self.status = next;
        self.audit.touch(stamp);
        self.pending_events.push(DomainEvent::TenderPublished {
            tender_id: self.id,
            title: self.details.title.clone(),
            reference_number: self.reference_number.clone(),
            closing_date: self.details.closing_date,
        });
        Ok(())
    }

    /// `stamp.at` is the instant compared against the closing date.
    pub fn start_evaluation(&mut self, stamp: &AuditStamp) -> DomainResult<()> {
        let next = self.status.start_evaluation()?;
        if stamp.at < self.details.closing_date {
            return Err(DomainError::tender_operation(
                "Cannot start evaluation before closing date",
            ));
        }

        self.status = next;
        self.audit.touch(stamp);
        Ok(())
    }

    pub fn award(&mut self, bid_id: Uuid, stamp: &AuditStamp) -> DomainResult<()> {
        self.status = self.status.award()?;
        self.winning_bid_id = Some(bid_id);
        self.audit.touch(stamp);
        self.pending_events.push(DomainEvent::TenderAwarded {
            tender_id: self.id,
            title: self.details.title.clone(),
            winning_bid_id: bid_id,
        });
        Ok(())
    }

    pub fn close(&mut self, stamp: &AuditStamp) -> DomainResult<()> {
        self.status = self.status.close()?;
        self.audit.touch(stamp);
        Ok(())
    }

    pub fn cancel(&mut self, reason: &str, stamp: &AuditStamp) -> DomainResult<()> {
        self.status = self.status.cancel()?;
        let reason = reason.trim();
        self.cancellation_reason = (!reason.is_empty()).then(|| reason.to_string());
        self.audit.touch(stamp);
        Ok(())
    }

    fn ensure_draft(&self, message: &str) -> DomainResult<()> {
        if self.status != TenderStatus::Draft {
            return Err(DomainError::tender_operation(message));
        }
        Ok(())
    }

    fn ensure_documents_editable(&self) -> DomainResult<()> {
        match self.status {
            TenderStatus::Draft | TenderStatus::Published => Ok(()),
            _ => Err(DomainError::tender_operation(
                "Documents can only be changed on draft or published tenders",
            )),
        }
    }
}

// ============================================================================
// Rehydration
// ============================================================================

/// Stored state of a tender, used by repositories to rebuild the aggregate
/// without replaying business validation.
#[derive(Debug, Clone)]
pub(crate) struct TenderSnapshot {
    pub id: Uuid,
    pub reference_number: String,
    pub details: TenderDetails,
    pub status: TenderStatus,
    pub winning_bid_id: Option<Uuid>,
    pub cancellation_reason: Option<String>,
    pub documents: Vec<TenderDocument>,
    pub eligibility_criteria: Vec<EligibilityCriteria>,
    pub deliverables: Vec<Deliverable>,
    pub timeline: Vec<TenderActivity>,
    pub payment_terms: Vec<PaymentTerm>,
    pub audit: AuditInfo,
}

impl Tender {
    /// Copy for storage, without events still waiting to be drained.
    pub(crate) fn detached(&self) -> Self {
        Self {
            pending_events: Vec::new(),
            ..self.clone()
        }
    }

    pub(crate) fn from_snapshot(s: TenderSnapshot) -> Self {
        Self {
            id: s.id,
            reference_number: s.reference_number,
            details: s.details,
            status: s.status,
            winning_bid_id: s.winning_bid_id,
            cancellation_reason: s.cancellation_reason,
            documents: s.documents,
            eligibility_criteria: s.eligibility_criteria,
            deliverables: s.deliverables,
            timeline: s.timeline,
            payment_terms: s.payment_terms,
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
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn stamp_at(when: DateTime<Utc>) -> AuditStamp {
        AuditStamp::new("officer-1", when)
    }

    fn details(issue: DateTime<Utc>, closing: DateTime<Utc>) -> TenderDetails {
        TenderDetails {
            title: "Road Repair".to_string(),
            description: "Resurfacing of the ring road".to_string(),
            issue_date: issue,
            closing_date: closing,
            tender_type: TenderType::Open,
            category: "construction".to_string(),
            budget_range: Money::new(Decimal::new(250_000, 0), "USD").unwrap(),
            contact_email: Email::new("tenders@city.gov").unwrap(),
            issued_by_organization: "City Works".to_string(),
        }
    }

    fn draft() -> Tender {
        Tender::new(
            "T-001",
            details(at(2024, 1, 1), at(2024, 2, 1)),
            &stamp_at(at(2024, 1, 1)),
        )
        .unwrap()
    }

    fn published() -> Tender {
        let mut tender = draft();
        let stamp = stamp_at(at(2024, 1, 2));
        tender
            .add_eligibility_criteria("Licensed", "Valid contractor license", &stamp)
            .unwrap();
        tender
            .add_deliverable("Resurfaced road", "12km of asphalt", &stamp)
            .unwrap();
        tender.publish(&stamp).unwrap();
        tender
    }

    fn under_evaluation() -> Tender {
        let mut tender = published();
        tender.start_evaluation(&stamp_at(at(2024, 2, 1))).unwrap();
        tender
    }

    #[test]
    fn test_new_tender_starts_in_draft() {
        let tender = draft();
        assert_eq!(tender.status(), TenderStatus::Draft);
        assert_eq!(tender.reference_number(), "T-001");
        assert_eq!(tender.audit().created_by(), "officer-1");
        assert!(tender.winning_bid_id().is_none());
    }

    #[test]
    fn test_closing_date_must_follow_issue_date() {
        let stamp = stamp_at(at(2024, 1, 1));
        let same_day = Tender::new("T-002", details(at(2024, 1, 1), at(2024, 1, 1)), &stamp);
        assert!(matches!(same_day, Err(DomainError::InvalidTenderDate { .. })));

        let earlier = Tender::new("T-002", details(at(2024, 3, 1), at(2024, 2, 1)), &stamp);
        assert!(matches!(earlier, Err(DomainError::InvalidTenderDate { .. })));
    }

    #[test]
    fn test_blank_title_or_reference_rejected() {
        let stamp = stamp_at(at(2024, 1, 1));
        let mut blank_title = details(at(2024, 1, 1), at(2024, 2, 1));
        blank_title.title = "  ".to_string();
        assert!(matches!(
            Tender::new("T-003", blank_title, &stamp),
            Err(DomainError::InvalidArgument { field: "title", .. })
        ));

        assert!(matches!(
            Tender::new("", details(at(2024, 1, 1), at(2024, 2, 1)), &stamp),
            Err(DomainError::InvalidArgument {
                field: "reference number",
                ..
            })
        ));
    }

    #[test]
    fn test_publish_requires_criteria_and_deliverables() {
        let stamp = stamp_at(at(2024, 1, 2));
        let mut tender = draft();
        let err = tender.publish(&stamp).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTenderOperation(_)));
        assert_eq!(tender.status(), TenderStatus::Draft);

        tender.add_eligibility_criteria("ISO 9001", "", &stamp).unwrap();
        assert!(tender.publish(&stamp).is_err());

        tender.add_deliverable("Report", "", &stamp).unwrap();
        tender.publish(&stamp).unwrap();
        assert_eq!(tender.status(), TenderStatus::Published);
        assert_eq!(tender.audit().updated_by(), Some("officer-1"));

        let events = tender.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].name(), "TenderPublished");
        assert!(tender.take_events().is_empty());
    }

    #[test]
    fn test_publish_twice_fails() {
        let mut tender = published();
        assert!(tender.publish(&stamp_at(at(2024, 1, 3))).is_err());
    }

    #[test]
    fn test_start_evaluation_waits_for_closing_date() {
        let mut tender = published();
        let err = tender
            .start_evaluation(&stamp_at(at(2024, 1, 31)))
            .unwrap_err();
        assert_eq!(err.kind(), crate::domain::ErrorKind::InvalidOperation);
        assert_eq!(tender.status(), TenderStatus::Published);

        tender.start_evaluation(&stamp_at(at(2024, 2, 1))).unwrap();
        assert_eq!(tender.status(), TenderStatus::UnderEvaluation);
    }

    #[test]
    fn test_start_evaluation_requires_published() {
        let mut tender = draft();
        assert!(tender.start_evaluation(&stamp_at(at(2024, 3, 1))).is_err());
    }

    #[test]
    fn test_award_and_close() {
        let mut tender = published();
        let bid_id = Uuid::new_v4();
        assert!(tender.award(bid_id, &stamp_at(at(2024, 1, 5))).is_err());

        let mut tender = under_evaluation();
        tender.award(bid_id, &stamp_at(at(2024, 2, 2))).unwrap();
        assert_eq!(tender.status(), TenderStatus::Awarded);
        assert_eq!(tender.winning_bid_id(), Some(bid_id));

        tender.close(&stamp_at(at(2024, 2, 3))).unwrap();
        assert_eq!(tender.status(), TenderStatus::Closed);
    }

    #[test]
    fn test_close_requires_awarded() {
        let mut tender = under_evaluation();
        assert!(matches!(
            tender.close(&stamp_at(at(2024, 2, 3))),
            Err(DomainError::InvalidTenderOperation(_))
        ));
    }

    #[test]
    fn test_cancel_rules() {
        let stamp = stamp_at(at(2024, 1, 10));
        let mut tender = published();
        tender.cancel("Budget withdrawn", &stamp).unwrap();
        assert_eq!(tender.status(), TenderStatus::Cancelled);
        assert_eq!(tender.cancellation_reason(), Some("Budget withdrawn"));
        assert!(tender.cancel("again", &stamp).is_err());

        let mut closed = under_evaluation();
        closed.award(Uuid::new_v4(), &stamp).unwrap();
        closed.close(&stamp).unwrap();
        assert!(closed.cancel("too late", &stamp).is_err());
        assert_eq!(closed.status(), TenderStatus::Closed);
    }

    #[test]
    fn test_payment_terms_cannot_exceed_hundred_percent() {
        let stamp = stamp_at(at(2024, 1, 2));
        let mut tender = draft();
        tender
            .add_payment_term("Advance", Decimal::new(30, 0), &stamp)
            .unwrap();
        tender
            .add_payment_term("Completion", Decimal::new(70, 0), &stamp)
            .unwrap();

        let err = tender
            .add_payment_term("Retention", Decimal::new(1, 1), &stamp)
            .unwrap_err();
        assert_eq!(err.kind(), crate::domain::ErrorKind::InvalidOperation);
        assert_eq!(tender.payment_terms().len(), 2);
        assert_eq!(tender.total_payment_percentage(), Decimal::ONE_HUNDRED);
    }

    #[test]
    fn test_payment_term_percentage_bounds() {
        let stamp = stamp_at(at(2024, 1, 2));
        let mut tender = draft();
        assert!(tender.add_payment_term("Zero", Decimal::ZERO, &stamp).is_err());
        assert!(tender
            .add_payment_term("Too much", Decimal::new(101, 0), &stamp)
            .is_err());
        assert!(tender.payment_terms().is_empty());
        tender
            .add_payment_term("All", Decimal::ONE_HUNDRED, &stamp)
            .unwrap();
    }

    #[test]
    fn test_children_locked_after_publication() {
        let stamp = stamp_at(at(2024, 1, 3));
        let mut tender = published();
        assert!(tender.add_deliverable("Late", "", &stamp).is_err());
        assert!(tender
            .add_payment_term("Late", Decimal::new(10, 0), &stamp)
            .is_err());

        let doc = tender
            .add_document(
                DocumentAttachment {
                    name: "Addendum 1".into(),
                    file_url: "/uploads/addendum-1.pdf".into(),
                    ..Default::default()
                },
                &stamp,
            )
            .unwrap();
        assert!(tender.remove_document(doc, &stamp).unwrap());
        assert!(!tender.remove_document(doc, &stamp).unwrap());
    }

    #[test]
    fn test_update_details_only_in_draft() {
        let stamp = stamp_at(at(2024, 1, 2));
        let mut tender = draft();
        let mut revised = details(at(2024, 1, 1), at(2024, 3, 1));
        revised.title = "Road Repair Phase 1".into();
        tender.update_details(revised.clone(), &stamp).unwrap();
        assert_eq!(tender.title(), "Road Repair Phase 1");

        let mut bad = revised.clone();
        bad.closing_date = at(2023, 12, 1);
        assert!(tender.update_details(bad, &stamp).is_err());
        assert_eq!(tender.closing_date(), at(2024, 3, 1));

        let mut live = published();
        assert!(live.update_details(revised, &stamp).is_err());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            TenderStatus::Draft,
            TenderStatus::Published,
            TenderStatus::UnderEvaluation,
            TenderStatus::Awarded,
            TenderStatus::Closed,
            TenderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<TenderStatus>().unwrap(), status);
        }
        assert!("archived".parse::<TenderStatus>().is_err());
    }
}
