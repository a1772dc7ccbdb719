//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                               - Health check
//!
//! # Buyer sign-in (rate limited)
//! POST /session                              - Sign-in handoff from the main site
//! POST /session/sign-out                     - Sign out
//!
//! # Payment step (signed-in buyer, HTMX fragments)
//! GET  /orders/{id}/payment                  - Payment page (fresh screen)
//! POST /orders/{id}/payment                  - Submit payment (rate limited)
//! POST /orders/{id}/payment/same-address     - Toggle billing = shipping
//! POST /orders/{id}/payment/fields           - Apply billing field edits
//! POST /orders/{id}/payment/dismiss          - Close the error dialog
//! ```

pub mod payment;
pub mod session;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::{payment_rate_limiter, sign_in_rate_limiter};
use crate::state::AppState;

/// Create the sign-in routes router.
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/session",
            post(session::sign_in).layer(sign_in_rate_limiter()),
        )
        .route("/session/sign-out", post(session::sign_out))
}

/// Create the payment routes router.
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/orders/{id}/payment",
            get(payment::show).merge(post(payment::submit).layer(payment_rate_limiter())),
        )
        .route(
            "/orders/{id}/payment/same-address",
            post(payment::toggle_same_address),
        )
        .route("/orders/{id}/payment/fields", post(payment::update_fields))
        .route("/orders/{id}/payment/dismiss", post(payment::dismiss_error))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(session_routes())
        .merge(payment_routes())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}
