pub mod adapters;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod ports;
pub mod services;

use axum::{
    Router,
    routing::{get, post, put},
};
use services::{CheckInService, TransactionLifecycle};

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: TransactionLifecycle,
    pub checkin: CheckInService,
    /// Present only when serving from Postgres; health reporting uses it.
    pub db: Option<sqlx::PgPool>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/events/:event_id/transactions",
            post(handlers::transactions::create_transaction),
        )
        .route(
            "/transactions/:id/payment-proof",
            put(handlers::transactions::submit_payment_proof),
        )
        .route(
            "/transactions/:id/confirm",
            put(handlers::transactions::confirm_transaction),
        )
        .route(
            "/transactions/:id/reject",
            put(handlers::transactions::reject_transaction),
        )
        .route(
            "/transactions/:id",
            get(handlers::transactions::get_transaction)
                .delete(handlers::transactions::cancel_transaction),
        )
        .route(
            "/transactions/:id/tickets",
            get(handlers::transactions::get_transaction_tickets),
        )
        .route("/check-in/:token", post(handlers::checkin::check_in))
        .with_state(state)
}
