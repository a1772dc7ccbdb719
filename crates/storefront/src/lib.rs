//! Gallery storefront: checkout payment step.
//!
//! This crate provides the storefront as a library so the router can be
//! driven from tests; `main.rs` only wires configuration, telemetry and the
//! listener around [`app`]. Serve it with connect info
//! (`into_make_service_with_connect_info::<SocketAddr>()`) so rate limits can
//! fall back to the peer address.
//!
//! # Architecture
//!
//! - [`checkout`]: the payment flow, free of I/O
//! - [`exchange`]: order service GraphQL client
//! - [`stripe`]: card tokenization client
//! - [`routes`]: axum handlers rendering askama templates, HTMX fragments

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkout;
pub mod config;
pub mod error;
pub mod exchange;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod stripe;

use axum::{Router, middleware::from_fn};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::state::AppState;

/// Build the storefront router with its middleware stack.
pub fn app(state: AppState) -> Router {
    let session_layer = middleware::create_session_layer(state.secure_cookies());

    Router::new()
        .merge(routes::routes())
        .layer(session_layer)
        .layer(from_fn(middleware::security_headers_middleware))
        .layer(from_fn(middleware::request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}
