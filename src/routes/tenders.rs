//! Tender routes
//!
//! Reads are open to any authenticated caller; writes need an
//! administrator or procurement officer.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, NoContent, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::{
    AttachDocumentRequest, AwardTenderRequest, CancelTenderRequest, CreateTenderRequest,
    TenderResponse, TenderStatus, UpdateTenderRequest, UserRole,
};
use crate::error::ApiError;

const TENDER_WRITERS: &[UserRole] = &[UserRole::Admin, UserRole::ProcurementOfficer];

/// Accepts `under_evaluation` or `under-evaluation`, in any casing.
pub(crate) fn parse_status<T: std::str::FromStr<Err = String>>(raw: &str) -> Result<T, ApiError> {
    raw.trim()
        .to_lowercase()
        .replace('-', "_")
        .parse()
        .map_err(ApiError::bad_request)
}

/// POST /tenders
pub async fn create_tender(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateTenderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(TENDER_WRITERS)?;
    tracing::info!(
        user_id = %auth.user_id,
        reference_number = %req.reference_number,
        "Creating tender"
    );

    let tender = state.tenders.create(req, &auth.stamp()).await?;
    Ok(Created::at(
        format!("/tenders/{}", tender.id()),
        TenderResponse::from(tender),
    ))
}

/// GET /tenders
pub async fn list_tenders(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::debug!(user_id = %auth.user_id, page = pagination.page(), "Listing tenders");

    let tenders = state.tenders.list().await?;
    Ok(Json(Paginated::from_items(tenders, &pagination, TenderResponse::from)))
}

/// GET /tenders/:id
pub async fn get_tender(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let tender = state.tenders.get(id).await?;
    Ok(Json(DataResponse::new(TenderResponse::from(tender))))
}

/// PUT /tenders/:id
pub async fn update_tender(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTenderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(TENDER_WRITERS)?;
    let tender = state.tenders.update(id, req, &auth.stamp()).await?;
    Ok(Json(DataResponse::new(TenderResponse::from(tender))))
}

/// DELETE /tenders/:id
pub async fn delete_tender(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(TENDER_WRITERS)?;
    state.tenders.delete(id, &auth.stamp()).await?;
    Ok(NoContent)
}

/// GET /tenders/status/:status
pub async fn list_by_status(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(status): Path<String>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let status: TenderStatus = parse_status(&status)?;
    let tenders = state.tenders.list_by_status(status).await?;
    Ok(Json(Paginated::from_items(tenders, &pagination, TenderResponse::from)))
}

/// GET /tenders/category/:category
pub async fn list_by_category(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let tenders = state.tenders.list_by_category(category).await?;
    Ok(Json(Paginated::from_items(tenders, &pagination, TenderResponse::from)))
}

/// GET /tenders/closing-soon/:days
///
/// Published tenders whose closing date falls within the next `days` days.
pub async fn closing_soon(
    _auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(days): Path<i64>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let tenders = state.tenders.closing_soon(days, Utc::now()).await?;
    Ok(Json(Paginated::from_items(tenders, &pagination, TenderResponse::from)))
}

/// POST /tenders/:id/publish
pub async fn publish_tender(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(TENDER_WRITERS)?;
    let tender = state.tenders.publish(id, &auth.stamp()).await?;
    Ok(Json(DataResponse::new(TenderResponse::from(tender))))
}

/// POST /tenders/:id/start-evaluation
pub async fn start_evaluation(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(TENDER_WRITERS)?;
    let tender = state.tenders.start_evaluation(id, &auth.stamp()).await?;
    Ok(Json(DataResponse::new(TenderResponse::from(tender))))
}

/// POST /tenders/:id/award
pub async fn award_tender(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AwardTenderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(TENDER_WRITERS)?;
    tracing::info!(user_id = %auth.user_id, tender_id = %id, bid_id = %req.bid_id, "Awarding tender");

    let tender = state.tenders.award(id, req.bid_id, &auth.stamp()).await?;
    Ok(Json(DataResponse::new(TenderResponse::from(tender))))
}

/// POST /tenders/:id/close
pub async fn close_tender(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(TENDER_WRITERS)?;
    let tender = state.tenders.close(id, &auth.stamp()).await?;
    Ok(Json(DataResponse::new(TenderResponse::from(tender))))
}

/// POST /tenders/:id/cancel
pub async fn cancel_tender(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelTenderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(TENDER_WRITERS)?;
    let tender = state.tenders.cancel(id, req.reason, &auth.stamp()).await?;
    Ok(Json(DataResponse::new(TenderResponse::from(tender))))
}

/// POST /tenders/:id/documents
pub async fn add_document(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AttachDocumentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(TENDER_WRITERS)?;
    let tender = state.tenders.add_document(id, req, &auth.stamp()).await?;
    Ok(Created::at(format!("/tenders/{id}"), TenderResponse::from(tender)))
}

/// DELETE /tenders/:id/documents/:document_id
pub async fn remove_document(
    auth: RequireAuth,
    State(state): State<Arc<AppState>>,
    Path((id, document_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(TENDER_WRITERS)?;
    state
        .tenders
        .remove_document(id, document_id, &auth.stamp())
        .await?;
    Ok(NoContent)
}
