//! Remote collaborators of the payment flow.
//!
//! The flow talks to two services: the card tokenizer (Stripe) and the order
//! service (two GraphQL mutations). Both sit behind traits so the flow can be
//! driven against in-memory fakes. The payload types double as the wire
//! format.

use std::future::Future;

use gallery_core::{Address, CreditCardId, OrderId, OrderState, TokenId};
use serde::{Deserialize, Serialize};

// =============================================================================
// Tokenization
// =============================================================================

/// Billing details sent with the card to the tokenizer.
///
/// Field names are the processor's and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRequest {
    pub name: String,
    pub address_line1: String,
    pub address_line2: String,
    pub address_city: String,
    pub address_state: String,
    pub address_zip: String,
    pub address_country: String,
}

impl TokenRequest {
    /// The request as `(field, value)` pairs, in wire order.
    #[must_use]
    pub fn fields(&self) -> [(&'static str, &str); 7] {
        [
            ("name", self.name.as_str()),
            ("address_line1", self.address_line1.as_str()),
            ("address_line2", self.address_line2.as_str()),
            ("address_city", self.address_city.as_str()),
            ("address_state", self.address_state.as_str()),
            ("address_zip", self.address_zip.as_str()),
            ("address_country", self.address_country.as_str()),
        ]
    }
}

impl From<&Address> for TokenRequest {
    fn from(address: &Address) -> Self {
        Self {
            name: address.name.clone(),
            address_line1: address.address_line1.clone(),
            address_line2: address.address_line2.clone(),
            address_city: address.city.clone(),
            address_state: address.region.clone(),
            address_zip: address.postal_code.clone(),
            address_country: address.country.clone(),
        }
    }
}

/// A card token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
}

/// The tokenizer rejected the card details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenError {
    /// Human-readable reason, shown to the buyer as-is.
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub decline_code: Option<String>,
    #[serde(default)]
    pub param: Option<String>,
}

/// Result of a tokenization call that reached the tokenizer.
///
/// Wire shape: `{"token": {...}}` or `{"error": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenResponse {
    Token(Token),
    Error(TokenError),
}

/// Exchanges card details plus billing address for a token.
///
/// The card itself is bound into the implementation; only the billing details
/// vary per call. An `Err` means the call never produced an answer
/// (transport failure); a rejected card is an `Ok(TokenResponse::Error)`.
pub trait Tokenizer: Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Create a card token.
    fn create_token(
        &self,
        request: &TokenRequest,
    ) -> impl Future<Output = Result<TokenResponse, Self::Error>> + Send;
}

// =============================================================================
// Order service mutations
// =============================================================================

/// Reference to a recorded credit card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditCardRef {
    pub id: CreditCardId,
}

/// Payload-level failure of `createCreditCard`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationError {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub detail: Option<String>,
}

/// Result of `createCreditCard`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "__typename")]
pub enum CreditCardOrError {
    #[serde(rename = "CreditCardMutationSuccess")]
    Success {
        #[serde(rename = "creditCard")]
        credit_card: CreditCardRef,
    },
    #[serde(rename = "CreditCardMutationFailure")]
    Failure {
        #[serde(rename = "mutationError")]
        mutation_error: MutationError,
    },
}

/// The order as returned by a successful payment mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRef {
    pub id: OrderId,
    pub state: OrderState,
}

/// Payload-level failure of an order mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderError {
    #[serde(rename = "type")]
    pub kind: String,
    pub code: String,
    #[serde(default)]
    pub data: Option<String>,
}

/// Result of `ecommerceSetOrderPayment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "__typename")]
pub enum OrderOrError {
    #[serde(rename = "OrderWithMutationSuccess")]
    Success { order: OrderRef },
    #[serde(rename = "OrderWithMutationFailure")]
    Failure { error: OrderError },
}

/// The order service mutations the payment flow issues.
///
/// An `Err` is a transport-level failure; payload-level failures come back as
/// the `Failure` variants.
pub trait PaymentMutations: Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Record a credit card from a token.
    fn create_credit_card(
        &self,
        token: &TokenId,
    ) -> impl Future<Output = Result<CreditCardOrError, Self::Error>> + Send;

    /// Set the order's payment to a recorded credit card.
    fn set_order_payment(
        &self,
        credit_card_id: &CreditCardId,
        order_id: &OrderId,
    ) -> impl Future<Output = Result<OrderOrError, Self::Error>> + Send;
}
