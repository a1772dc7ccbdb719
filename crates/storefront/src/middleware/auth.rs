//! Buyer authentication extractor.
//!
//! The gallery's main site signs the buyer in by handing their Exchange
//! access token to `POST /session`; payment routes read it back from the
//! session with [`RequireBuyer`] and act on the order with that token.

use axum::{extract::FromRequestParts, http::request::Parts};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::AppError;

/// Session key for the signed-in buyer.
pub const BUYER_SESSION_KEY: &str = "buyer";

/// Session-stored buyer sign-in.
///
/// `key` is fresh for every sign-in and scopes the buyer's payment screens
/// to this session.
#[derive(Clone, Serialize, Deserialize)]
pub struct BuyerSession {
    access_token: String,
    key: Uuid,
}

impl BuyerSession {
    /// A new sign-in for `access_token`.
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            key: Uuid::new_v4(),
        }
    }

    /// The buyer's Exchange access token.
    #[must_use]
    pub fn access_token(&self) -> SecretString {
        SecretString::from(self.access_token.clone())
    }

    /// Identifies this sign-in.
    #[must_use]
    pub const fn key(&self) -> Uuid {
        self.key
    }
}

impl std::fmt::Debug for BuyerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuyerSession")
            .field("access_token", &"[REDACTED]")
            .field("key", &self.key)
            .finish()
    }
}

/// Extractor that requires a signed-in buyer.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireBuyer(buyer): RequireBuyer) -> impl IntoResponse {
///     let exchange = state.exchange().as_buyer(buyer.access_token());
///     // ...
/// }
/// ```
pub struct RequireBuyer(pub BuyerSession);

impl<S> FromRequestParts<S> for RequireBuyer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by SessionManagerLayer
        let session = parts
            .extensions
            .get::<Session>()
            .ok_or_else(|| AppError::Unauthorized("no session".to_string()))?;

        session
            .get::<BuyerSession>(BUYER_SESSION_KEY)
            .await
            .ok()
            .flatten()
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("buyer not signed in".to_string()))
    }
}

/// Store the buyer in the session under a fresh session id.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_buyer(
    session: &Session,
    buyer: &BuyerSession,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(BUYER_SESSION_KEY, buyer).await
}

/// Forget the buyer and everything else in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be cleared.
pub async fn clear_buyer(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::{Request, StatusCode};
    use secrecy::ExposeSecret;
    use tower_sessions::MemoryStore;

    use super::*;

    fn request_parts() -> Parts {
        Request::builder().uri("/").body(()).unwrap().into_parts().0
    }

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[test]
    fn test_debug_redacts_token() {
        let buyer = BuyerSession::new("buyer-secret-token");
        let debug_output = format!("{buyer:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("buyer-secret-token"));
        assert_eq!(buyer.access_token().expose_secret(), "buyer-secret-token");
    }

    #[test]
    fn test_every_sign_in_gets_its_own_key() {
        assert_ne!(BuyerSession::new("token").key(), BuyerSession::new("token").key());
    }

    #[tokio::test]
    async fn test_rejects_without_session_layer() {
        let result = RequireBuyer::from_request_parts(&mut request_parts(), &()).await;
        let err = result.err().unwrap();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_rejects_signed_out_session() {
        let mut parts = request_parts();
        parts.extensions.insert(session());

        let result = RequireBuyer::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_reads_signed_in_buyer() {
        let session = session();
        let buyer = BuyerSession::new("buyer-token");
        set_buyer(&session, &buyer).await.unwrap();

        let mut parts = request_parts();
        parts.extensions.insert(session.clone());
        let RequireBuyer(found) = RequireBuyer::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(found.key(), buyer.key());
        assert_eq!(found.access_token().expose_secret(), "buyer-token");

        clear_buyer(&session).await.unwrap();
        let mut parts = request_parts();
        parts.extensions.insert(session);
        assert!(RequireBuyer::from_request_parts(&mut parts, &()).await.is_err());
    }
}
