//! End-to-end tender and bid workflow over the in-memory store.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use procurement_backend::domain::{
    AuditStamp, BidStatus, CreateBidRequest, CreateTenderRequest, DomainEvent, ErrorKind,
    TenderStatus,
};
use procurement_backend::persistence::{InMemoryStore, Store};
use procurement_backend::services::{
    BidService, EventSink, ServiceError, TenderService,
};

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl EventSink for RecordingSink {
    fn publish(&self, event: &DomainEvent) {
        self.events.lock().push(event.clone());
    }
}

impl RecordingSink {
    fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|e| e.name()).collect()
    }
}

struct Harness {
    memory: Arc<InMemoryStore>,
    sink: Arc<RecordingSink>,
    tenders: TenderService,
    bids: BidService,
}

fn harness() -> Harness {
    let memory = Arc::new(InMemoryStore::new());
    let store: Arc<dyn Store> = memory.clone();
    let sink = Arc::new(RecordingSink::default());
    let events: Arc<dyn EventSink> = sink.clone();
    Harness {
        tenders: TenderService::new(store.clone(), events.clone()),
        bids: BidService::new(store, events),
        memory,
        sink,
    }
}

fn tender_request(reference: &str, closing: DateTime<Utc>) -> CreateTenderRequest {
    serde_json::from_value(json!({
        "title": "Road Repair",
        "reference_number": reference,
        "description": "Resurfacing of the A12 between junctions 4 and 6",
        "issue_date": Utc::now() - Duration::days(1),
        "closing_date": closing,
        "tender_type": "open",
        "category": "Infrastructure",
        "budget_range": { "amount": "250000.00", "currency": "usd" },
        "contact_email": "roads@county.gov",
        "issued_by_organization": "County Roads Department",
        "eligibility_criteria": [
            { "name": "ISO 9001", "description": "Certified quality management" }
        ],
        "deliverables": [
            { "name": "Resurfaced road", "description": "2.4 km of asphalt" }
        ],
        "payment_terms": [
            { "description": "On signature", "percentage": "30" },
            { "description": "On completion", "percentage": "70" }
        ]
    }))
    .unwrap()
}

fn bid_request(tender_id: Uuid) -> CreateBidRequest {
    serde_json::from_value(json!({
        "tender_id": tender_id,
        "bid_amount": { "amount": "0", "currency": "USD" },
        "technical_proposal_summary": "Cold-mix overlay with night closures",
        "bid_items": [
            { "description": "Asphalt", "quantity": 3, "unit_price": { "amount": "10.00", "currency": "USD" } },
            { "description": "Labour", "quantity": 1, "unit_price": { "amount": "6.50", "currency": "USD" } }
        ]
    }))
    .unwrap()
}

fn document() -> procurement_backend::domain::AttachDocumentRequest {
    serde_json::from_value(json!({
        "name": "method-statement.pdf",
        "file_url": "https://files.example/method-statement.pdf",
        "document_type": "technical",
        "file_type": "application/pdf",
        "file_size": 48213
    }))
    .unwrap()
}

#[tokio::test]
async fn test_full_tender_lifecycle() {
    let h = harness();
    let officer = AuditStamp::now("officer");
    let closing = Utc::now() + Duration::days(10);
    let bidder = Uuid::new_v4();
    let bidder_stamp = AuditStamp::now(bidder.to_string());

    let tender = h
        .tenders
        .create(tender_request("T-001", closing), &officer)
        .await
        .unwrap();
    assert_eq!(tender.status(), TenderStatus::Draft);
    assert_eq!(tender.total_payment_percentage(), Decimal::ONE_HUNDRED);

    let tender = h.tenders.publish(tender.id(), &officer).await.unwrap();
    assert_eq!(tender.status(), TenderStatus::Published);

    let bid = h
        .bids
        .create(bidder, bid_request(tender.id()), &bidder_stamp)
        .await
        .unwrap();
    assert_eq!(bid.bid_amount().amount(), Decimal::new(3650, 2));
    assert_eq!(bid.bid_amount().currency(), "USD");

    h.bids
        .add_document(bid.id(), Some(bidder), document(), &bidder_stamp)
        .await
        .unwrap();
    let bid = h.bids.submit(bid.id(), Some(bidder), &bidder_stamp).await.unwrap();
    assert_eq!(bid.status(), BidStatus::Submitted);
    assert!(bid.submission_date().is_some());

    // Evaluation opens once the closing date has passed
    let after_close = AuditStamp::new("officer", closing + Duration::hours(1));
    let tender = h
        .tenders
        .start_evaluation(tender.id(), &after_close)
        .await
        .unwrap();
    assert_eq!(tender.status(), TenderStatus::UnderEvaluation);

    let evaluator = AuditStamp::new("evaluator", closing + Duration::hours(2));
    let bid = h
        .bids
        .evaluate(
            bid.id(),
            serde_json::from_value(json!({ "score": "85.5", "comments": "Strong method" })).unwrap(),
            &evaluator,
        )
        .await
        .unwrap();
    assert_eq!(bid.status(), BidStatus::UnderEvaluation);
    assert_eq!(bid.score(), Some(Decimal::new(855, 1)));

    h.bids.accept(bid.id(), &evaluator).await.unwrap();

    let tender = h
        .tenders
        .award(tender.id(), bid.id(), &after_close)
        .await
        .unwrap();
    assert_eq!(tender.status(), TenderStatus::Awarded);
    assert_eq!(tender.winning_bid_id(), Some(bid.id()));
    assert_eq!(h.bids.get(bid.id()).await.unwrap().status(), BidStatus::Winner);

    let tender = h.tenders.close(tender.id(), &after_close).await.unwrap();
    assert_eq!(tender.status(), TenderStatus::Closed);

    assert_eq!(
        h.sink.names(),
        vec!["TenderPublished", "BidSubmitted", "TenderAwarded"]
    );
}

#[tokio::test]
async fn test_duplicate_reference_number_is_rejected() {
    let h = harness();
    let officer = AuditStamp::now("officer");
    let closing = Utc::now() + Duration::days(10);

    h.tenders
        .create(tender_request("T-002", closing), &officer)
        .await
        .unwrap();
    let err = h
        .tenders
        .create(tender_request("T-002", closing), &officer)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::DuplicateKey));
    assert_eq!(h.tenders.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_one_bid_per_bidder_and_tender() {
    let h = harness();
    let officer = AuditStamp::now("officer");
    let tender = h
        .tenders
        .create(tender_request("T-003", Utc::now() + Duration::days(5)), &officer)
        .await
        .unwrap();
    h.tenders.publish(tender.id(), &officer).await.unwrap();

    let bidder = Uuid::new_v4();
    let stamp = AuditStamp::now(bidder.to_string());
    h.bids.create(bidder, bid_request(tender.id()), &stamp).await.unwrap();

    let err = h
        .bids
        .create(bidder, bid_request(tender.id()), &stamp)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::DuplicateKey(_)));

    // A different bidder is fine
    let other = Uuid::new_v4();
    h.bids
        .create(other, bid_request(tender.id()), &AuditStamp::now(other.to_string()))
        .await
        .unwrap();
    assert_eq!(h.bids.list_by_tender(tender.id()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_bids_require_published_tender() {
    let h = harness();
    let officer = AuditStamp::now("officer");
    let tender = h
        .tenders
        .create(tender_request("T-004", Utc::now() + Duration::days(5)), &officer)
        .await
        .unwrap();

    let bidder = Uuid::new_v4();
    let err = h
        .bids
        .create(bidder, bid_request(tender.id()), &AuditStamp::now("bidder"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::InvalidOperation));

    let err = h
        .bids
        .create(bidder, bid_request(Uuid::new_v4()), &AuditStamp::now("bidder"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_other_bidder_cannot_edit_bid() {
    let h = harness();
    let officer = AuditStamp::now("officer");
    let tender = h
        .tenders
        .create(tender_request("T-005", Utc::now() + Duration::days(5)), &officer)
        .await
        .unwrap();
    h.tenders.publish(tender.id(), &officer).await.unwrap();

    let owner = Uuid::new_v4();
    let bid = h
        .bids
        .create(owner, bid_request(tender.id()), &AuditStamp::now("owner"))
        .await
        .unwrap();

    let intruder = Some(Uuid::new_v4());
    let err = h
        .bids
        .submit(bid.id(), intruder, &AuditStamp::now("intruder"))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn test_draft_bid_cannot_be_scored() {
    let h = harness();
    let officer = AuditStamp::now("officer");
    let tender = h
        .tenders
        .create(tender_request("T-005A", Utc::now() + Duration::days(5)), &officer)
        .await
        .unwrap();
    h.tenders.publish(tender.id(), &officer).await.unwrap();

    let bidder = Uuid::new_v4();
    let bid = h
        .bids
        .create(bidder, bid_request(tender.id()), &AuditStamp::now("bidder"))
        .await
        .unwrap();

    let err = h
        .bids
        .evaluate(
            bid.id(),
            serde_json::from_value(json!({ "score": "85", "comments": "Looks fine" })).unwrap(),
            &AuditStamp::now("evaluator"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::InvalidOperation));

    let bid = h.bids.get(bid.id()).await.unwrap();
    assert_eq!(bid.status(), BidStatus::Draft);
    assert_eq!(bid.score(), None);
}

#[tokio::test]
async fn test_overflowing_item_price_is_rejected() {
    let h = harness();
    let officer = AuditStamp::now("officer");
    let tender = h
        .tenders
        .create(tender_request("T-005B", Utc::now() + Duration::days(5)), &officer)
        .await
        .unwrap();
    h.tenders.publish(tender.id(), &officer).await.unwrap();

    let req: CreateBidRequest = serde_json::from_value(json!({
        "tender_id": tender.id(),
        "bid_amount": { "amount": "0", "currency": "USD" },
        "technical_proposal_summary": "Everything, twice",
        "bid_items": [
            {
                "description": "Gold-plated asphalt",
                "quantity": 2,
                "unit_price": { "amount": "79228162514264337593543950335", "currency": "USD" }
            }
        ]
    }))
    .unwrap();

    let bidder = Uuid::new_v4();
    let err = h
        .bids
        .create(bidder, req, &AuditStamp::now("bidder"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::InvalidArgument));
    assert!(h.bids.list_by_bidder(bidder).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_award_requires_accepted_bid_and_leaves_state_untouched() {
    let h = harness();
    let officer = AuditStamp::now("officer");
    let closing = Utc::now() + Duration::days(3);
    let tender = h
        .tenders
        .create(tender_request("T-006", closing), &officer)
        .await
        .unwrap();
    h.tenders.publish(tender.id(), &officer).await.unwrap();

    let bidder = Uuid::new_v4();
    let stamp = AuditStamp::now(bidder.to_string());
    let bid = h.bids.create(bidder, bid_request(tender.id()), &stamp).await.unwrap();
    h.bids
        .add_document(bid.id(), Some(bidder), document(), &stamp)
        .await
        .unwrap();
    h.bids.submit(bid.id(), Some(bidder), &stamp).await.unwrap();

    let after_close = AuditStamp::new("officer", closing + Duration::minutes(5));
    h.tenders
        .start_evaluation(tender.id(), &after_close)
        .await
        .unwrap();

    let err = h
        .tenders
        .award(tender.id(), bid.id(), &after_close)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::InvalidOperation));

    let tender = h.tenders.get(tender.id()).await.unwrap();
    assert_eq!(tender.status(), TenderStatus::UnderEvaluation);
    assert_eq!(tender.winning_bid_id(), None);
    assert_eq!(h.bids.get(bid.id()).await.unwrap().status(), BidStatus::Submitted);
    assert!(!h.sink.names().contains(&"TenderAwarded"));
}

#[tokio::test]
async fn test_start_evaluation_before_closing_date_fails() {
    let h = harness();
    let officer = AuditStamp::now("officer");
    let tender = h
        .tenders
        .create(tender_request("T-007", Utc::now() + Duration::days(3)), &officer)
        .await
        .unwrap();
    h.tenders.publish(tender.id(), &officer).await.unwrap();

    let err = h
        .tenders
        .start_evaluation(tender.id(), &officer)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::InvalidOperation));
}

#[tokio::test]
async fn test_failed_commit_applies_nothing_and_raises_no_events() {
    let h = harness();
    let officer = AuditStamp::now("officer");
    let tender = h
        .tenders
        .create(tender_request("T-008", Utc::now() + Duration::days(3)), &officer)
        .await
        .unwrap();

    h.memory.fail_next_commit();
    let err = h.tenders.publish(tender.id(), &officer).await.unwrap_err();
    assert!(matches!(err, ServiceError::Store(_)));

    let stored = h.tenders.get(tender.id()).await.unwrap();
    assert_eq!(stored.status(), TenderStatus::Draft);
    assert!(h.sink.names().is_empty());
}

#[tokio::test]
async fn test_closing_soon_and_category_queries() {
    let h = harness();
    let officer = AuditStamp::now("officer");
    let soon = h
        .tenders
        .create(tender_request("T-009", Utc::now() + Duration::days(2)), &officer)
        .await
        .unwrap();
    let later = h
        .tenders
        .create(tender_request("T-010", Utc::now() + Duration::days(30)), &officer)
        .await
        .unwrap();
    h.tenders.publish(soon.id(), &officer).await.unwrap();
    h.tenders.publish(later.id(), &officer).await.unwrap();

    let closing = h.tenders.closing_soon(7, Utc::now()).await.unwrap();
    let ids: Vec<Uuid> = closing.iter().map(|t| t.id()).collect();
    assert_eq!(ids, vec![soon.id()]);

    let by_category = h
        .tenders
        .list_by_category("infrastructure".into())
        .await
        .unwrap();
    assert_eq!(by_category.len(), 2);

    assert!(matches!(
        h.tenders.closing_soon(0, Utc::now()).await,
        Err(ServiceError::Validation(_))
    ));
}

#[tokio::test]
async fn test_cancel_records_reason_and_blocks_new_bids() {
    let h = harness();
    let officer = AuditStamp::now("officer");
    let tender = h
        .tenders
        .create(tender_request("T-011", Utc::now() + Duration::days(3)), &officer)
        .await
        .unwrap();
    h.tenders.publish(tender.id(), &officer).await.unwrap();

    let tender = h
        .tenders
        .cancel(tender.id(), "Budget withdrawn".into(), &officer)
        .await
        .unwrap();
    assert_eq!(tender.status(), TenderStatus::Cancelled);
    assert_eq!(tender.cancellation_reason(), Some("Budget withdrawn"));

    let err = h
        .bids
        .create(Uuid::new_v4(), bid_request(tender.id()), &AuditStamp::now("bidder"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::InvalidOperation));

    h.tenders.delete(tender.id(), &officer).await.unwrap();
    assert_eq!(
        h.tenders.get(tender.id()).await.unwrap_err().kind(),
        Some(ErrorKind::NotFound)
    );
}
