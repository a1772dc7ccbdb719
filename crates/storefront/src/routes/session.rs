//! Buyer sign-in handoff.
//!
//! The main site authenticates the buyer and posts their Exchange access
//! token here before sending them to the payment page.

use axum::{
    Form,
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument};

use crate::error::{AppError, Result};
use crate::middleware::{BuyerSession, clear_buyer, set_buyer};

/// Sign-in form data.
#[derive(Deserialize)]
pub struct SignInForm {
    pub access_token: String,
    #[serde(default)]
    pub return_to: Option<String>,
}

/// Where to go after signing in: a local path, never another origin.
fn return_path(return_to: Option<&str>) -> &str {
    match return_to {
        Some(path)
            if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') =>
        {
            path
        }
        _ => "/",
    }
}

/// Sign the buyer in.
///
/// # Route
///
/// `POST /session`
#[instrument(skip_all)]
pub async fn sign_in(session: Session, Form(form): Form<SignInForm>) -> Result<impl IntoResponse> {
    let access_token = form.access_token.trim();
    if access_token.is_empty() {
        return Err(AppError::Unauthorized("empty access token".to_string()));
    }

    let buyer = BuyerSession::new(access_token);
    set_buyer(&session, &buyer).await?;
    info!(sign_in = %buyer.key(), "buyer signed in");

    Ok(Redirect::to(return_path(form.return_to.as_deref())))
}

/// Sign the buyer out; their open payment screens become unreachable.
///
/// # Route
///
/// `POST /session/sign-out`
#[instrument(skip_all)]
pub async fn sign_out(session: Session) -> Result<impl IntoResponse> {
    clear_buyer(&session).await?;
    Ok(Redirect::to("/"))
}
