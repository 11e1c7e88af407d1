//! Bid routes
//!
//! Bidders manage their own bids; evaluators score and decide them.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::tenders::parse_status;
use crate::api::{Created, DataResponse, NoContent, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::{AuthContext, RequireAuth};
use crate::domain::{
    AttachDocumentRequest, BidResponse, BidStatus, CreateBidRequest, EvaluateBidRequest,
    RejectBidRequest, UpdateBidRequest, UserRole,
};
use crate::error::ApiError;

const BID_WRITERS: &[UserRole] = &[UserRole::Admin, UserRole::Bidder];
const EVALUATORS: &[UserRole] = &[UserRole::Admin, UserRole::Evaluator];
const BID_READERS: &[UserRole] = &[
    UserRole::Admin,
    UserRole::ProcurementOfficer,
    UserRole::Evaluator,
];

/// Ownership filter for bid writes; administrators act on any bid.
fn owner(auth: &AuthContext) -> Option<Uuid> {
    (!auth.is_admin()).then_some(auth.user_id)
}

/// POST /bids
pub async fn create_bid(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBidRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(BID_WRITERS)?;
    tracing::info!(
        user_id = %auth.user_id,
        tender_id = %req.tender_id,
        items = req.bid_items.len(),
        "Creating bid"
    );

    let bid = state.bids.create(auth.user_id, req, &auth.stamp()).await?;
    Ok(Created::at(format!("/bids/{}", bid.id()), BidResponse::from(bid)))
}

/// GET /bids
pub async fn list_bids(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(BID_READERS)?;
    let bids = state.bids.list().await?;
    Ok(Json(Paginated::from_items(bids, &pagination, BidResponse::from)))
}

/// GET /bids/:id
///
/// Bidders only see their own bids.
pub async fn get_bid(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let bid = state.bids.get(id).await?;
    if auth.role == UserRole::Bidder && bid.bidder_id() != auth.user_id {
        return Err(ApiError::forbidden("Bid belongs to another bidder"));
    }
    Ok(Json(DataResponse::new(BidResponse::from(bid))))
}

/// PUT /bids/:id
pub async fn update_bid(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBidRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(BID_WRITERS)?;
    let bid = state
        .bids
        .update(id, owner(&auth), req, &auth.stamp())
        .await?;
    Ok(Json(DataResponse::new(BidResponse::from(bid))))
}

/// DELETE /bids/:id
pub async fn delete_bid(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(BID_WRITERS)?;
    state.bids.delete(id, owner(&auth), &auth.stamp()).await?;
    Ok(NoContent)
}

/// GET /bids/tender/:tender_id
pub async fn list_by_tender(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(tender_id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(BID_READERS)?;
    let bids = state.bids.list_by_tender(tender_id).await?;
    Ok(Json(Paginated::from_items(bids, &pagination, BidResponse::from)))
}

/// GET /bids/bidder
///
/// The caller's own bids.
pub async fn list_mine(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let bids = state.bids.list_by_bidder(auth.user_id).await?;
    Ok(Json(Paginated::from_items(bids, &pagination, BidResponse::from)))
}

/// GET /bids/status/:status
pub async fn list_by_status(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(status): Path<String>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(BID_READERS)?;
    let status: BidStatus = parse_status(&status)?;
    let bids = state.bids.list_by_status(status).await?;
    Ok(Json(Paginated::from_items(bids, &pagination, BidResponse::from)))
}

/// POST /bids/:id/submit
pub async fn submit_bid(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(BID_WRITERS)?;
    tracing::info!(user_id = %auth.user_id, bid_id = %id, "Submitting bid");

    let bid = state.bids.submit(id, owner(&auth), &auth.stamp()).await?;
    Ok(Json(DataResponse::new(BidResponse::from(bid))))
}

/// POST /bids/:id/evaluate
pub async fn evaluate_bid(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<EvaluateBidRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(EVALUATORS)?;
    tracing::info!(user_id = %auth.user_id, bid_id = %id, score = %req.score, "Evaluating bid");

    let bid = state.bids.evaluate(id, req, &auth.stamp()).await?;
    Ok(Json(DataResponse::new(BidResponse::from(bid))))
}

/// POST /bids/:id/accept
pub async fn accept_bid(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(EVALUATORS)?;
    let bid = state.bids.accept(id, &auth.stamp()).await?;
    Ok(Json(DataResponse::new(BidResponse::from(bid))))
}

/// POST /bids/:id/reject
pub async fn reject_bid(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<RejectBidRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(EVALUATORS)?;
    let bid = state.bids.reject(id, req.reason, &auth.stamp()).await?;
    Ok(Json(DataResponse::new(BidResponse::from(bid))))
}

/// POST /bids/:id/documents
pub async fn add_document(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AttachDocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(BID_WRITERS)?;
    let bid = state
        .bids
        .add_document(id, owner(&auth), req, &auth.stamp())
        .await?;
    Ok(Created::at(format!("/bids/{id}"), BidResponse::from(bid)))
}

/// DELETE /bids/:id/documents/:document_id
pub async fn remove_document(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((id, document_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(BID_WRITERS)?;
    state
        .bids
        .remove_document(id, owner(&auth), document_id, &auth.stamp())
        .await?;
    Ok(NoContent)
}
