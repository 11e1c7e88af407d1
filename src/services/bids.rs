//! Bid handlers.

use futures::FutureExt;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use super::events::{dispatch, EventSink};
use super::tenders::load_tender;
use super::{ServiceError, ServiceResult};
use crate::domain::{
    AttachDocumentRequest, AuditStamp, Bid, BidItemRequest, BidStatus, CreateBidRequest,
    DomainError, EvaluateBidRequest, Money, TenderStatus, UpdateBidRequest,
};
use crate::persistence::{Store, Transaction, UnitOfWork};

async fn load_bid(tx: &mut Transaction<'_>, id: Uuid) -> ServiceResult<Bid> {
    tx.bids()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::not_found("bid", id))
}

/// Bidders may only touch their own bids. `None` skips the check.
fn ensure_owner(bid: &Bid, owner: Option<Uuid>) -> ServiceResult<()> {
    if owner.is_some_and(|bidder_id| bid.bidder_id() != bidder_id) {
        return Err(ServiceError::Forbidden(
            "Bid belongs to another bidder".into(),
        ));
    }
    Ok(())
}

/// Rejects bids against tenders that no longer accept them.
async fn ensure_tender_open(
    tx: &mut Transaction<'_>,
    tender_id: Uuid,
    stamp: &AuditStamp,
) -> ServiceResult<()> {
    let tender = load_tender(tx, tender_id).await?;
    if tender.status() != TenderStatus::Published {
        return Err(DomainError::operation(format!(
            "Tender {} is not accepting bids (status: {})",
            tender.reference_number(),
            tender.status()
        ))
        .into());
    }
    if stamp.at >= tender.closing_date() {
        return Err(DomainError::operation(format!(
            "Tender {} closed on {}",
            tender.reference_number(),
            tender.closing_date()
        ))
        .into());
    }
    Ok(())
}

fn add_items(bid: &mut Bid, items: Vec<BidItemRequest>, stamp: &AuditStamp) -> ServiceResult<()> {
    for item in items {
        let unit_price = Money::try_from(item.unit_price)?;
        bid.add_bid_item(&item.description, item.quantity, unit_price, stamp)?;
    }
    Ok(())
}

#[derive(Clone)]
pub struct BidService {
    store: Arc<dyn Store>,
    events: Arc<dyn EventSink>,
}

impl BidService {
    pub fn new(store: Arc<dyn Store>, events: Arc<dyn EventSink>) -> Self {
        Self { store, events }
    }

    fn uow(&self) -> UnitOfWork {
        UnitOfWork::new(self.store.clone())
    }

    // ------------------------------------------------------------------
    // Bidder commands
    // ------------------------------------------------------------------

    /// Opens a draft bid for `bidder_id`. At most one bid per bidder and tender.
    #[instrument(skip(self, req, stamp), fields(tender_id = %req.tender_id, actor = %stamp.actor))]
    pub async fn create(
        &self,
        bidder_id: Uuid,
        req: CreateBidRequest,
        stamp: &AuditStamp,
    ) -> ServiceResult<Bid> {
        let bid_amount = Money::try_from(req.bid_amount)?;
        let stamp = stamp.clone();
        let tender_id = req.tender_id;

        let bid = self
            .uow()
            .execute(move |tx| {
                async move {
                    ensure_tender_open(tx, tender_id, &stamp).await?;
                    if tx.bids().exists_by_tender_and_bidder(tender_id, bidder_id).await? {
                        return Err(ServiceError::DuplicateKey(format!(
                            "Bidder {bidder_id} already has a bid for tender {tender_id}"
                        )));
                    }

                    let mut bid = Bid::new(
                        tender_id,
                        bidder_id,
                        bid_amount,
                        &req.technical_proposal_summary,
                        &stamp,
                    );
                    add_items(&mut bid, req.bid_items, &stamp)?;

                    tx.bids().add(&bid).await?;
                    tx.save_changes().await?;
                    Ok::<_, ServiceError>(bid)
                }
                .boxed()
            })
            .await?;

        tracing::info!(bid_id = %bid.id(), bidder_id = %bidder_id, "Bid created");
        Ok(bid)
    }

    #[instrument(skip(self, req, stamp), fields(actor = %stamp.actor))]
    pub async fn update(
        &self,
        id: Uuid,
        owner: Option<Uuid>,
        req: UpdateBidRequest,
        stamp: &AuditStamp,
    ) -> ServiceResult<Bid> {
        self.mutate(id, owner, stamp, move |bid, stamp| {
            if let Some(summary) = &req.technical_proposal_summary {
                bid.update_proposal(summary, stamp)?;
            }
            add_items(bid, req.bid_items, stamp)
        })
        .await
    }

    #[instrument(skip(self, req, stamp), fields(actor = %stamp.actor))]
    pub async fn add_document(
        &self,
        id: Uuid,
        owner: Option<Uuid>,
        req: AttachDocumentRequest,
        stamp: &AuditStamp,
    ) -> ServiceResult<Bid> {
        self.mutate(id, owner, stamp, move |bid, stamp| {
            bid.add_document(req.into(), stamp)?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, stamp), fields(actor = %stamp.actor))]
    pub async fn remove_document(
        &self,
        id: Uuid,
        owner: Option<Uuid>,
        document_id: Uuid,
        stamp: &AuditStamp,
    ) -> ServiceResult<Bid> {
        self.mutate(id, owner, stamp, move |bid, stamp| {
            if !bid.remove_document(document_id, stamp)? {
                return Err(ServiceError::not_found("document", document_id));
            }
            Ok(())
        })
        .await
    }

    /// Submits a complete draft while the tender is still open.
    #[instrument(skip(self, stamp), fields(actor = %stamp.actor))]
    pub async fn submit(
        &self,
        id: Uuid,
        owner: Option<Uuid>,
        stamp: &AuditStamp,
    ) -> ServiceResult<Bid> {
        let stamp = stamp.clone();
        let (bid, events) = self
            .uow()
            .execute(move |tx| {
                async move {
                    let mut bid = load_bid(tx, id).await?;
                    ensure_owner(&bid, owner)?;
                    ensure_tender_open(tx, bid.tender_id(), &stamp).await?;

                    bid.submit(&stamp)?;
                    tx.bids().update(&bid).await?;
                    tx.save_changes().await?;
                    let events = bid.take_events();
                    Ok::<_, ServiceError>((bid, events))
                }
                .boxed()
            })
            .await?;

        tracing::info!(bid_id = %bid.id(), "Bid submitted");
        dispatch(self.events.as_ref(), events);
        Ok(bid)
    }

    #[instrument(skip(self, stamp), fields(actor = %stamp.actor))]
    pub async fn delete(
        &self,
        id: Uuid,
        owner: Option<Uuid>,
        stamp: &AuditStamp,
    ) -> ServiceResult<()> {
        self.uow()
            .execute(move |tx| {
                async move {
                    let bid = load_bid(tx, id).await?;
                    ensure_owner(&bid, owner)?;
                    if bid.status() != BidStatus::Draft {
                        return Err(DomainError::operation("Only draft bids can be withdrawn").into());
                    }
                    tx.bids().remove(id).await?;
                    tx.save_changes().await?;
                    Ok::<_, ServiceError>(())
                }
                .boxed()
            })
            .await?;

        tracing::info!(bid_id = %id, "Bid withdrawn");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    /// Scores a bid, moving a submitted bid into evaluation first. Drafts
    /// and decided bids are refused.
    #[instrument(skip(self, req, stamp), fields(actor = %stamp.actor))]
    pub async fn evaluate(
        &self,
        id: Uuid,
        req: EvaluateBidRequest,
        stamp: &AuditStamp,
    ) -> ServiceResult<Bid> {
        self.mutate(id, None, stamp, move |bid, stamp| {
            if bid.status() == BidStatus::Submitted {
                bid.start_evaluation(stamp)?;
            }
            if bid.status() != BidStatus::UnderEvaluation {
                return Err(DomainError::operation(format!(
                    "Only bids under evaluation can be scored (status: {})",
                    bid.status()
                ))
                .into());
            }
            bid.set_score(req.score, &req.comments, stamp)?;
            Ok(())
        })
        .await
    }

    #[instrument(skip(self, stamp), fields(actor = %stamp.actor))]
    pub async fn accept(&self, id: Uuid, stamp: &AuditStamp) -> ServiceResult<Bid> {
        self.mutate(id, None, stamp, |bid, stamp| Ok(bid.accept(stamp)?))
            .await
    }

    #[instrument(skip(self, reason, stamp), fields(actor = %stamp.actor))]
    pub async fn reject(&self, id: Uuid, reason: String, stamp: &AuditStamp) -> ServiceResult<Bid> {
        self.mutate(id, None, stamp, move |bid, stamp| Ok(bid.reject(&reason, stamp)?))
            .await
    }

    /// Loads the bid, checks ownership, applies `op` and saves.
    async fn mutate<F>(
        &self,
        id: Uuid,
        owner: Option<Uuid>,
        stamp: &AuditStamp,
        op: F,
    ) -> ServiceResult<Bid>
    where
        F: FnOnce(&mut Bid, &AuditStamp) -> ServiceResult<()> + Send + 'static,
    {
        let stamp = stamp.clone();
        let (bid, events) = self
            .uow()
            .execute(move |tx| {
                async move {
                    let mut bid = load_bid(tx, id).await?;
                    ensure_owner(&bid, owner)?;
                    op(&mut bid, &stamp)?;
                    tx.bids().update(&bid).await?;
                    tx.save_changes().await?;
                    let events = bid.take_events();
                    Ok::<_, ServiceError>((bid, events))
                }
                .boxed()
            })
            .await?;

        tracing::info!(bid_id = %bid.id(), status = %bid.status(), "Bid updated");
        dispatch(self.events.as_ref(), events);
        Ok(bid)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn get(&self, id: Uuid) -> ServiceResult<Bid> {
        self.uow().execute(move |tx| load_bid(tx, id).boxed()).await
    }

    pub async fn list(&self) -> ServiceResult<Vec<Bid>> {
        self.uow()
            .execute(|tx| {
                async move { Ok::<_, ServiceError>(tx.bids().get_all().await?) }.boxed()
            })
            .await
    }

    /// Bids for a tender, 404 when the tender does not exist.
    pub async fn list_by_tender(&self, tender_id: Uuid) -> ServiceResult<Vec<Bid>> {
        self.uow()
            .execute(move |tx| {
                async move {
                    if !tx.tenders().exists(tender_id).await? {
                        return Err(ServiceError::not_found("tender", tender_id));
                    }
                    Ok(tx.bids().get_by_tender(tender_id).await?)
                }
                .boxed()
            })
            .await
    }

    pub async fn list_by_bidder(&self, bidder_id: Uuid) -> ServiceResult<Vec<Bid>> {
        self.uow()
            .execute(move |tx| {
                async move { Ok::<_, ServiceError>(tx.bids().get_by_bidder(bidder_id).await?) }.boxed()
            })
            .await
    }

    pub async fn list_by_status(&self, status: BidStatus) -> ServiceResult<Vec<Bid>> {
        self.uow()
            .execute(move |tx| {
                async move { Ok::<_, ServiceError>(tx.bids().get_by_status(status).await?) }.boxed()
            })
            .await
    }
}
