//! Stripe card tokenization.
//!
//! Cards are tokenized with the publishable key via `POST /v1/tokens`. The
//! card number and CVC only ever live in a [`CardDetails`] for the duration
//! of one submission.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::instrument;

use crate::checkout::{Token, TokenError, TokenRequest, TokenResponse, Tokenizer};
use crate::config::StripeConfig;

/// Errors that keep a tokenization call from producing an answer.
#[derive(Debug, Error)]
pub enum StripeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Unexpected status without a card error.
    #[error("Stripe returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Card details as entered by the buyer.
///
/// Implements `Debug` manually to redact the number and CVC.
#[derive(Clone)]
pub struct CardDetails {
    pub number: SecretString,
    pub exp_month: String,
    pub exp_year: String,
    pub cvc: SecretString,
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetails")
            .field("number", &"[REDACTED]")
            .field("exp_month", &self.exp_month)
            .field("exp_year", &self.exp_year)
            .field("cvc", &"[REDACTED]")
            .finish()
    }
}

/// Client for Stripe's token endpoint.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    tokens_url: String,
    publishable_key: String,
}

impl StripeClient {
    /// Create a new Stripe client.
    #[must_use]
    pub fn new(config: &StripeConfig) -> Self {
        let tokens_url = format!(
            "{}/v1/tokens",
            config.api_base.as_str().trim_end_matches('/')
        );

        Self {
            inner: Arc::new(StripeClientInner {
                client: reqwest::Client::new(),
                tokens_url,
                publishable_key: config.publishable_key.clone(),
            }),
        }
    }

    /// A tokenizer for one card.
    #[must_use]
    pub fn tokenizer(&self, card: CardDetails) -> CardTokenizer {
        CardTokenizer {
            client: self.clone(),
            card,
        }
    }
}

/// Tokenizes one card with varying billing details.
#[derive(Debug)]
pub struct CardTokenizer {
    client: StripeClient,
    card: CardDetails,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("tokens_url", &self.inner.tokens_url)
            .finish_non_exhaustive()
    }
}

/// Form body for `POST /v1/tokens`.
///
/// Stripe rejects empty strings, so blank billing fields are left out.
fn card_form(card: &CardDetails, request: &TokenRequest) -> Vec<(String, String)> {
    let card_fields = [
        ("number", card.number.expose_secret()),
        ("exp_month", card.exp_month.as_str()),
        ("exp_year", card.exp_year.as_str()),
        ("cvc", card.cvc.expose_secret()),
    ];

    card_fields
        .into_iter()
        .chain(request.fields())
        .map(|(field, value)| (field, value.trim()))
        .filter(|(_, value)| !value.is_empty())
        .map(|(field, value)| (format!("card[{field}]"), value.to_string()))
        .collect()
}

impl Tokenizer for CardTokenizer {
    type Error = StripeError;

    #[instrument(skip_all)]
    async fn create_token(&self, request: &TokenRequest) -> Result<TokenResponse, StripeError> {
        #[derive(Deserialize)]
        struct ErrorBody {
            error: TokenError,
        }

        let inner = &self.client.inner;
        let response = inner
            .client
            .post(&inner.tokens_url)
            .bearer_auth(&inner.publishable_key)
            .form(&card_form(&self.card, request))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            let token: Token = serde_json::from_str(&body)?;
            return Ok(TokenResponse::Token(token));
        }

        if status.is_client_error()
            && let Ok(ErrorBody { error }) = serde_json::from_str::<ErrorBody>(&body)
        {
            tracing::info!(
                status = %status,
                code = ?error.code,
                "Stripe rejected card"
            );
            return Ok(TokenResponse::Error(error));
        }

        tracing::error!(
            status = %status,
            body = %body.chars().take(500).collect::<String>(),
            "Stripe returned unexpected response"
        );
        Err(StripeError::Status {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        })
    }
}
