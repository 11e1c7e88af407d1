//! Tender handlers.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::events::{dispatch, EventSink};
use super::{require_field, ServiceError, ServiceResult};
use crate::domain::{
    AttachDocumentRequest, AuditStamp, BidStatus, CreateTenderRequest, DomainError, Tender,
    TenderStatus, UpdateTenderRequest,
};
use crate::persistence::{Store, Transaction, UnitOfWork};

pub(crate) async fn load_tender(tx: &mut Transaction<'_>, id: Uuid) -> ServiceResult<Tender> {
    tx.tenders()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("tender", id))
}

#[derive(Clone)]
pub struct TenderService {
    store: Arc<dyn Store>,
    events: Arc<dyn EventSink>,
}

impl TenderService {
    pub fn new(store: Arc<dyn Store>, events: Arc<dyn EventSink>) -> Self {
        Self { store, events }
    }

    fn uow(&self) -> UnitOfWork {
        UnitOfWork::new(self.store.clone())
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    #[instrument(skip(self, req, stamp), fields(reference_number = %req.reference_number, actor = %stamp.actor))]
    pub async fn create(&self, req: CreateTenderRequest, stamp: &AuditStamp) -> ServiceResult<Tender> {
        require_field("title", &req.title)?;
        require_field("reference_number", &req.reference_number)?;
        let details = req.details()?;
        let reference = req.reference_number.trim().to_string();
        let stamp = stamp.clone();

        let tender = self
            .uow()
            .execute(move |tx| {
                async move {
                    if tx.tenders().exists_by_reference_number(&reference).await? {
                        return Err(ServiceError::DuplicateKey(format!(
                            "Tender with reference number '{reference}' already exists"
                        )));
                    }

                    let mut tender = Tender::new(&reference, details, &stamp)?;
                    for c in &req.eligibility_criteria {
                        tender.add_eligibility_criteria(&c.name, &c.description, &stamp)?;
                    }
                    for d in &req.deliverables {
                        tender.add_deliverable(&d.name, &d.description, &stamp)?;
                    }
                    for a in &req.timeline {
                        tender.add_timeline_activity(&a.activity_name, a.expected_date, &stamp)?;
                    }
                    for p in &req.payment_terms {
                        tender.add_payment_term(&p.description, p.percentage, &stamp)?;
                    }

                    tx.tenders().add(&tender).await?;
                    tx.save_changes().await?;
                    Ok::<_, ServiceError>(tender)
                }
                .boxed()
            })
            .await?;

        tracing::info!(tender_id = %tender.id(), "Tender created");
        Ok(tender)
    }

    #[instrument(skip(self, req, stamp), fields(actor = %stamp.actor))]
    pub async fn update(
        &self,
        id: Uuid,
        req: UpdateTenderRequest,
        stamp: &AuditStamp,
    ) -> ServiceResult<Tender> {
        self.mutate(id, stamp, move |tender, stamp| {
            let details = req.apply_to(tender.details())?;
            tender.update_details(details, stamp)
        })
        .await
    }

    #[instrument(skip(self, req, stamp), fields(actor = %stamp.actor))]
    pub async fn add_document(
        &self,
        id: Uuid,
        req: AttachDocumentRequest,
        stamp: &AuditStamp,
    ) -> ServiceResult<Tender> {
        self.mutate(id, stamp, move |tender, stamp| {
            tender.add_document(req.into(), stamp).map(|_| ())
        })
        .await
    }

    #[instrument(skip(self, stamp), fields(actor = %stamp.actor))]
    pub async fn remove_document(
        &self,
        id: Uuid,
        document_id: Uuid,
        stamp: &AuditStamp,
    ) -> ServiceResult<Tender> {
        let stamp = stamp.clone();
        self.uow()
            .execute(move |tx| {
                async move {
                    let mut tender = load_tender(tx, id).await?;
                    if !tender.remove_document(document_id, &stamp)? {
                        return Err(ServiceError::not_found("document", document_id));
                    }
                    tx.tenders().update(&tender).await?;
                    tx.save_changes().await?;
                    Ok::<_, ServiceError>(tender)
                }
                .boxed()
            })
            .await
    }

    #[instrument(skip(self, stamp), fields(actor = %stamp.actor))]
    pub async fn publish(&self, id: Uuid, stamp: &AuditStamp) -> ServiceResult<Tender> {
        self.mutate(id, stamp, |tender, stamp| tender.publish(stamp))
            .await
    }

    /// Uses `stamp.at` as the current time for the closing-date guard.
    #[instrument(skip(self, stamp), fields(actor = %stamp.actor))]
    pub async fn start_evaluation(&self, id: Uuid, stamp: &AuditStamp) -> ServiceResult<Tender> {
        self.mutate(id, stamp, |tender, stamp| tender.start_evaluation(stamp))
            .await
    }

    /// Marks `bid_id` as winner and the tender as awarded in one transaction.
    #[instrument(skip(self, stamp), fields(actor = %stamp.actor))]
    pub async fn award(&self, id: Uuid, bid_id: Uuid, stamp: &AuditStamp) -> ServiceResult<Tender> {
        let stamp = stamp.clone();
        let (tender, events) = self
            .uow()
            .execute(move |tx| {
                async move {
                    let mut tender = load_tender(tx, id).await?;
                    let mut bid = tx
                        .bids()
                        .get_by_id(bid_id)
                        .await?
                        .ok_or_else(|| ServiceError::not_found("bid", bid_id))?;

                    if bid.tender_id() != tender.id() {
                        return Err(ServiceError::Validation(format!(
                            "Bid {bid_id} was not submitted for tender {id}"
                        )));
                    }
                    if bid.status() != BidStatus::Accepted {
                        return Err(DomainError::tender_operation(
                            "Only an accepted bid can win a tender",
                        )
                        .into());
                    }

                    tender.award(bid_id, &stamp)?;
                    bid.mark_as_winner(&stamp)?;

                    tx.tenders().update(&tender).await?;
                    tx.bids().update(&bid).await?;
                    tx.save_changes().await?;
                    let events = tender.take_events();
                    Ok::<_, ServiceError>((tender, events))
                }
                .boxed()
            })
            .await?;

        dispatch(self.events.as_ref(), events);
        Ok(tender)
    }

    #[instrument(skip(self, stamp), fields(actor = %stamp.actor))]
    pub async fn close(&self, id: Uuid, stamp: &AuditStamp) -> ServiceResult<Tender> {
        self.mutate(id, stamp, |tender, stamp| tender.close(stamp))
            .await
    }

    #[instrument(skip(self, reason, stamp), fields(actor = %stamp.actor))]
    pub async fn cancel(&self, id: Uuid, reason: String, stamp: &AuditStamp) -> ServiceResult<Tender> {
        self.mutate(id, stamp, move |tender, stamp| tender.cancel(&reason, stamp))
            .await
    }

    /// Only drafts and cancelled tenders may be deleted.
    #[instrument(skip(self, stamp), fields(actor = %stamp.actor))]
    pub async fn delete(&self, id: Uuid, stamp: &AuditStamp) -> ServiceResult<()> {
        self.uow()
            .execute(move |tx| {
                async move {
                    let tender = load_tender(tx, id).await?;
                    if !matches!(tender.status(), TenderStatus::Draft | TenderStatus::Cancelled) {
                        return Err(DomainError::tender_operation(
                            "Only draft or cancelled tenders can be deleted",
                        )
                        .into());
                    }
                    tx.tenders().remove(id).await?;
                    tx.save_changes().await?;
                    Ok::<_, ServiceError>(())
                }
                .boxed()
            })
            .await?;

        tracing::info!(tender_id = %id, "Tender deleted");
        Ok(())
    }

    /// Loads the tender, applies `op`, saves, then dispatches any events.
    async fn mutate<F>(&self, id: Uuid, stamp: &AuditStamp, op: F) -> ServiceResult<Tender>
    where
        F: FnOnce(&mut Tender, &AuditStamp) -> Result<(), DomainError> + Send + 'static,
    {
        let stamp = stamp.clone();
        let (tender, events) = self
            .uow()
            .execute(move |tx| {
                async move {
                    let mut tender = load_tender(tx, id).await?;
                    op(&mut tender, &stamp)?;
                    tx.tenders().update(&tender).await?;
                    tx.save_changes().await?;
                    let events = tender.take_events();
                    Ok::<_, ServiceError>((tender, events))
                }
                .boxed()
            })
            .await?;

        tracing::info!(tender_id = %tender.id(), status = %tender.status(), "Tender updated");
        dispatch(self.events.as_ref(), events);
        Ok(tender)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn get(&self, id: Uuid) -> ServiceResult<Tender> {
        self.uow()
            .execute(move |tx| load_tender(tx, id).boxed())
            .await
    }

    pub async fn list(&self) -> ServiceResult<Vec<Tender>> {
        self.uow()
            .execute(|tx| {
                async move { Ok::<_, ServiceError>(tx.tenders().get_all().await?) }.boxed()
            })
            .await
    }

    pub async fn list_by_status(&self, status: TenderStatus) -> ServiceResult<Vec<Tender>> {
        self.uow()
            .execute(move |tx| {
                async move { Ok::<_, ServiceError>(tx.tenders().get_by_status(status).await?) }.boxed()
            })
            .await
    }

    pub async fn list_by_category(&self, category: String) -> ServiceResult<Vec<Tender>> {
        require_field("category", &category)?;
        self.uow()
            .execute(move |tx| {
                async move { Ok::<_, ServiceError>(tx.tenders().get_by_category(category.trim()).await?) }.boxed()
            })
            .await
    }

    pub async fn closing_soon(&self, days: i64, now: DateTime<Utc>) -> ServiceResult<Vec<Tender>> {
        if !(1..=365).contains(&days) {
            return Err(ServiceError::Validation(
                "days must be between 1 and 365".into(),
            ));
        }
        self.uow()
            .execute(move |tx| {
                async move { Ok::<_, ServiceError>(tx.tenders().get_closing_soon(days, now).await?) }.boxed()
            })
            .await
    }
}
