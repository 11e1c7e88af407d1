pub mod auth;
pub mod bids;
pub mod health;
pub mod me;
pub mod tenders;
pub mod users;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        .route("/auth/refresh", post(auth::refresh))
        // Account
        .route("/auth/register", post(auth::register))
        .route("/auth/revoke", post(auth::revoke))
        .route("/me", get(me::get_me).put(me::update_me))
        // User administration
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/username/:username", get(users::get_user_by_username))
        .route(
            "/users/:id",
            get(users::get_user).delete(users::delete_user),
        )
        .route("/users/:id/activate", post(users::activate_user))
        .route("/users/:id/deactivate", post(users::deactivate_user))
        // Tenders
        .route(
            "/tenders",
            post(tenders::create_tender).get(tenders::list_tenders),
        )
        .route(
            "/tenders/:id",
            get(tenders::get_tender)
                .put(tenders::update_tender)
                .delete(tenders::delete_tender),
        )
        .route("/tenders/status/:status", get(tenders::list_by_status))
        .route("/tenders/category/:category", get(tenders::list_by_category))
        .route("/tenders/closing-soon/:days", get(tenders::closing_soon))
        .route("/tenders/:id/publish", post(tenders::publish_tender))
        .route(
            "/tenders/:id/start-evaluation",
            post(tenders::start_evaluation),
        )
        .route("/tenders/:id/award", post(tenders::award_tender))
        .route("/tenders/:id/close", post(tenders::close_tender))
        .route("/tenders/:id/cancel", post(tenders::cancel_tender))
        .route("/tenders/:id/documents", post(tenders::add_document))
        .route(
            "/tenders/:id/documents/:document_id",
            delete(tenders::remove_document),
        )
        // Bids
        .route("/bids", post(bids::create_bid).get(bids::list_bids))
        .route(
            "/bids/:id",
            get(bids::get_bid)
                .put(bids::update_bid)
                .delete(bids::delete_bid),
        )
        .route("/bids/tender/:tender_id", get(bids::list_by_tender))
        .route("/bids/bidder", get(bids::list_mine))
        .route("/bids/status/:status", get(bids::list_by_status))
        .route("/bids/:id/submit", post(bids::submit_bid))
        .route("/bids/:id/evaluate", post(bids::evaluate_bid))
        .route("/bids/:id/accept", post(bids::accept_bid))
        .route("/bids/:id/reject", post(bids::reject_bid))
        .route("/bids/:id/documents", post(bids::add_document))
        .route(
            "/bids/:id/documents/:document_id",
            delete(bids::remove_document),
        )
}
