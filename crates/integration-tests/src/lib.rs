//! Integration tests for the gallery checkout.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p gallery-integration-tests
//! ```
//!
//! Nothing external is needed: the order service and the card tokenizer are
//! replaced by in-process fakes.
//!
//! # Test Categories
//!
//! - `checkout_payment` - The payment flow driven directly, against recording
//!   doubles of the tokenizer and the order mutations
//! - `payment_routes` - The storefront router over HTTP, against fake Exchange
//!   and Stripe servers bound to loopback ports

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    Form, Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::{DateTime, Duration, Utc};
use gallery_core::{CreditCardId, Order, OrderId, TokenId};
use gallery_storefront::checkout::{
    CreditCardOrError, CreditCardRef, MutationError, OrderError, OrderOrError, OrderRef,
    PaymentMutations, SubmissionState, Token, TokenError, TokenRequest, TokenResponse, Tokenizer,
};
use gallery_storefront::config::StorefrontConfig;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::watch;

// =============================================================================
// Orders
// =============================================================================

/// Id of the order every fixture uses.
pub const ORDER_ID: &str = "1234";

/// Id the order service gives a recorded card.
pub const CREDIT_CARD_ID: &str = "gravityCreditCardId";

/// Id the tokenizer gives a card.
pub const TOKEN_ID: &str = "tokenId";

/// Exchange access token of the fixture order's buyer.
pub const BUYER_TOKEN: &str = "buyer-access-token";

/// Token the storefront identifies itself with.
pub const APP_TOKEN: &str = "aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6";

/// Expiry of the fixture order.
///
/// # Panics
///
/// Never; the literal is valid RFC 3339.
#[must_use]
pub fn expires_at() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2018-12-06T13:47:16.446Z")
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

/// An instant exactly 1d 4h 22m 59s before the fixture order expires.
#[must_use]
pub fn countdown_start() -> DateTime<Utc> {
    expires_at()
        - Duration::days(1)
        - Duration::hours(4)
        - Duration::minutes(22)
        - Duration::seconds(59)
}

/// Shipping address `Joelle Van Dyne, 401 Broadway, Suite 25` as GraphQL JSON.
#[must_use]
pub fn broadway_json() -> Value {
    json!({
        "__typename": "Ship",
        "name": "Joelle Van Dyne",
        "addressLine1": "401 Broadway",
        "addressLine2": "Suite 25",
        "city": "New York",
        "region": "NY",
        "postalCode": "10013",
        "country": "US",
        "phoneNumber": "120938120983"
    })
}

/// A card saved on the order by an earlier visit.
#[must_use]
pub fn saved_card_json() -> Value {
    json!({
        "name": "Artsy UK Ltd",
        "street1": "14 Gower's Walk",
        "street2": "Suite 2.5, The Loom",
        "city": "London",
        "state": "Whitechapel",
        "country": "UK",
        "postal_code": "E1 8PY"
    })
}

/// An offer-mode order shipping to Broadway, as the order service returns it.
#[must_use]
pub fn shipping_order_json() -> Value {
    json!({
        "__typename": "OfferOrder",
        "id": ORDER_ID,
        "mode": "OFFER",
        "state": "SUBMITTED",
        "stateExpiresAt": "2018-12-06T13:47:16.446Z",
        "currencyCode": "USD",
        "requestedFulfillment": broadway_json(),
        "creditCard": null,
        "buyer": { "__typename": "User", "id": "buyer" },
        "lastOffer": {
            "id": "myoffer-id",
            "createdAt": "2018-12-04T13:47:16.446Z",
            "amountCents": 1_400_000,
            "buyerTotalCents": 1_420_000
        },
        "awaitingResponseFrom": "BUYER"
    })
}

/// The same order, picked up in person.
#[must_use]
pub fn pickup_order_json() -> Value {
    let mut order = shipping_order_json();
    order["requestedFulfillment"] = json!({
        "__typename": "Pickup",
        "fulfillmentType": "PICKUP"
    });
    order
}

/// Deserialize an order fixture.
///
/// # Panics
///
/// Panics if `json` is not an order.
#[must_use]
pub fn order(json: Value) -> Order {
    serde_json::from_value(json).expect("fixture is a valid order")
}

/// A billing address entered by hand, as the tokenizer should receive it.
#[must_use]
pub fn london_request() -> TokenRequest {
    TokenRequest {
        name: "Erik David".to_string(),
        address_line1: "14 Gower's Walk".to_string(),
        address_line2: String::new(),
        address_city: "London".to_string(),
        address_state: String::new(),
        address_zip: String::new(),
        address_country: "GB".to_string(),
    }
}

// =============================================================================
// Recording doubles
// =============================================================================

/// Transport failure raised by the doubles.
#[derive(Debug, thiserror::Error)]
#[error("connection reset: {0}")]
pub struct FakeTransportError(pub &'static str);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Submission states a double found when it was called.
#[derive(Debug, Default)]
struct StatesAtCall {
    watcher: Option<watch::Receiver<SubmissionState>>,
    seen: Mutex<Vec<SubmissionState>>,
}

impl StatesAtCall {
    fn record(&self) {
        if let Some(watcher) = &self.watcher {
            lock(&self.seen).push(watcher.borrow().clone());
        }
    }

    fn seen(&self) -> Vec<SubmissionState> {
        lock(&self.seen).clone()
    }
}

/// How the fake tokenizer answers.
#[derive(Debug, Clone, Copy)]
pub enum TokenizerReply {
    Token,
    Reject(&'static str),
    Fail,
}

/// Tokenizer double that records every request.
///
/// Each call yields once before answering so observers of the submission
/// state get a chance to run.
#[derive(Debug)]
pub struct RecordingTokenizer {
    reply: TokenizerReply,
    requests: Mutex<Vec<TokenRequest>>,
    states: StatesAtCall,
}

impl RecordingTokenizer {
    #[must_use]
    pub fn new(reply: TokenizerReply) -> Self {
        Self {
            reply,
            requests: Mutex::new(Vec::new()),
            states: StatesAtCall::default(),
        }
    }

    /// Record the submission state found in `states` on every call.
    #[must_use]
    pub fn watching(mut self, states: watch::Receiver<SubmissionState>) -> Self {
        self.states.watcher = Some(states);
        self
    }

    /// Submission states found on each call, when watching.
    #[must_use]
    pub fn states_at_call(&self) -> Vec<SubmissionState> {
        self.states.seen()
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<TokenRequest> {
        lock(&self.requests).clone()
    }
}

impl Tokenizer for RecordingTokenizer {
    type Error = FakeTransportError;

    async fn create_token(
        &self,
        request: &TokenRequest,
    ) -> Result<TokenResponse, FakeTransportError> {
        lock(&self.requests).push(request.clone());
        self.states.record();
        tokio::task::yield_now().await;

        match self.reply {
            TokenizerReply::Token => Ok(TokenResponse::Token(Token {
                id: TokenId::new(TOKEN_ID),
            })),
            TokenizerReply::Reject(message) => Ok(TokenResponse::Error(TokenError {
                message: message.to_string(),
                kind: Some("card_error".to_string()),
                code: Some("invalid_number".to_string()),
                decline_code: None,
                param: Some("number".to_string()),
            })),
            TokenizerReply::Fail => Err(FakeTransportError("tokenizer")),
        }
    }
}

/// How a fake mutation answers.
#[derive(Debug, Clone, Copy)]
pub enum MutationReply {
    Success,
    /// Payload-level failure; the string is the card mutation's `detail`.
    Failure(Option<&'static str>),
    Fail,
}

/// A call made to the order service double.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationCall {
    CreateCreditCard { token: TokenId },
    SetOrderPayment {
        credit_card_id: CreditCardId,
        order_id: OrderId,
    },
}

/// Order service double that records every mutation.
#[derive(Debug)]
pub struct RecordingMutations {
    card: MutationReply,
    payment: MutationReply,
    calls: Mutex<Vec<MutationCall>>,
    states: StatesAtCall,
}

impl RecordingMutations {
    #[must_use]
    pub fn new(card: MutationReply, payment: MutationReply) -> Self {
        Self {
            card,
            payment,
            calls: Mutex::new(Vec::new()),
            states: StatesAtCall::default(),
        }
    }

    /// Both mutations succeed.
    #[must_use]
    pub fn succeeding() -> Self {
        Self::new(MutationReply::Success, MutationReply::Success)
    }

    /// Record the submission state found in `states` on every call.
    #[must_use]
    pub fn watching(mut self, states: watch::Receiver<SubmissionState>) -> Self {
        self.states.watcher = Some(states);
        self
    }

    /// Submission states found on each call, when watching.
    #[must_use]
    pub fn states_at_call(&self) -> Vec<SubmissionState> {
        self.states.seen()
    }

    /// Calls received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<MutationCall> {
        lock(&self.calls).clone()
    }
}

impl PaymentMutations for RecordingMutations {
    type Error = FakeTransportError;

    async fn create_credit_card(
        &self,
        token: &TokenId,
    ) -> Result<CreditCardOrError, FakeTransportError> {
        lock(&self.calls).push(MutationCall::CreateCreditCard {
            token: token.clone(),
        });
        self.states.record();
        tokio::task::yield_now().await;

        match self.card {
            MutationReply::Success => Ok(CreditCardOrError::Success {
                credit_card: CreditCardRef {
                    id: CreditCardId::new(CREDIT_CARD_ID),
                },
            }),
            MutationReply::Failure(detail) => Ok(CreditCardOrError::Failure {
                mutation_error: MutationError {
                    kind: "payment_error".to_string(),
                    message: "Payment error".to_string(),
                    detail: detail.map(str::to_string),
                },
            }),
            MutationReply::Fail => Err(FakeTransportError("createCreditCard")),
        }
    }

    async fn set_order_payment(
        &self,
        credit_card_id: &CreditCardId,
        order_id: &OrderId,
    ) -> Result<OrderOrError, FakeTransportError> {
        lock(&self.calls).push(MutationCall::SetOrderPayment {
            credit_card_id: credit_card_id.clone(),
            order_id: order_id.clone(),
        });
        self.states.record();
        tokio::task::yield_now().await;

        match self.payment {
            MutationReply::Success => Ok(OrderOrError::Success {
                order: OrderRef {
                    id: order_id.clone(),
                    state: gallery_core::OrderState::Pending,
                },
            }),
            MutationReply::Failure(_) => Ok(OrderOrError::Failure {
                error: OrderError {
                    kind: "validation".to_string(),
                    code: "invalid_state".to_string(),
                    data: None,
                },
            }),
            MutationReply::Fail => Err(FakeTransportError("ecommerceSetOrderPayment")),
        }
    }
}

// =============================================================================
// Fake servers
// =============================================================================

/// Serve `router` on an ephemeral loopback port, with connect info.
///
/// # Panics
///
/// Panics if no port can be bound.
pub async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Test server failed");
    });
    addr
}

/// Fake Exchange GraphQL endpoint at `POST /graphql`.
///
/// Answers `PaymentOrder` with the configured order when the id matches, and
/// the two payment mutations with the configured replies. Every operation is
/// recorded with its variables. Requests must carry [`APP_TOKEN`] and the
/// buyer's [`BUYER_TOKEN`]; anything else is refused with `401` and not
/// recorded.
#[derive(Clone)]
pub struct FakeExchange {
    inner: Arc<FakeExchangeInner>,
}

struct FakeExchangeInner {
    order: Value,
    card: MutationReply,
    payment: MutationReply,
    operations: Mutex<Vec<(String, Value)>>,
}

impl FakeExchange {
    #[must_use]
    pub fn new(order: Value, card: MutationReply, payment: MutationReply) -> Self {
        Self {
            inner: Arc::new(FakeExchangeInner {
                order,
                card,
                payment,
                operations: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Operations received so far as `(operationName, variables)`.
    #[must_use]
    pub fn operations(&self) -> Vec<(String, Value)> {
        lock(&self.inner.operations).clone()
    }

    /// Names of the mutations received so far.
    #[must_use]
    pub fn mutations(&self) -> Vec<String> {
        self.operations()
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| name != "PaymentOrder")
            .collect()
    }

    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/graphql", post(exchange_graphql))
            .with_state(self.clone())
    }

    fn card_payload(&self) -> Value {
        match self.inner.card {
            MutationReply::Success => json!({
                "__typename": "CreditCardMutationSuccess",
                "creditCard": { "id": CREDIT_CARD_ID }
            }),
            MutationReply::Failure(detail) => json!({
                "__typename": "CreditCardMutationFailure",
                "mutationError": {
                    "type": "payment_error",
                    "message": "Payment error",
                    "detail": detail
                }
            }),
            MutationReply::Fail => Value::Null,
        }
    }

    fn payment_payload(&self) -> Value {
        match self.inner.payment {
            MutationReply::Success => json!({
                "__typename": "OrderWithMutationSuccess",
                "order": { "id": ORDER_ID, "state": "PENDING" }
            }),
            MutationReply::Failure(_) => json!({
                "__typename": "OrderWithMutationFailure",
                "error": { "type": "validation", "code": "invalid_state", "data": null }
            }),
            MutationReply::Fail => Value::Null,
        }
    }
}

fn transport_failure() -> Response {
    (StatusCode::BAD_GATEWAY, "upstream unavailable").into_response()
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn exchange_graphql(
    State(fake): State<FakeExchange>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let buyer = format!("Bearer {BUYER_TOKEN}");
    if header(&headers, "x-app-token") != Some(APP_TOKEN)
        || header(&headers, "authorization") != Some(buyer.as_str())
    {
        return (StatusCode::UNAUTHORIZED, "invalid token").into_response();
    }

    let name = body["operationName"].as_str().unwrap_or_default().to_string();
    let variables = body["variables"].clone();
    lock(&fake.inner.operations).push((name.clone(), variables.clone()));

    match name.as_str() {
        "PaymentOrder" => {
            let order = if variables["id"] == fake.inner.order["id"] {
                fake.inner.order.clone()
            } else {
                Value::Null
            };
            Json(json!({ "data": { "ecommerceOrder": order } })).into_response()
        }
        "PaymentCreateCreditCard" => match fake.card_payload() {
            Value::Null => transport_failure(),
            payload => Json(json!({
                "data": { "createCreditCard": { "creditCardOrError": payload } }
            }))
            .into_response(),
        },
        "PaymentSetOrderPayment" => match fake.payment_payload() {
            Value::Null => transport_failure(),
            payload => Json(json!({
                "data": { "ecommerceSetOrderPayment": { "orderOrError": payload } }
            }))
            .into_response(),
        },
        _ => Json(json!({
            "data": null,
            "errors": [{ "message": format!("Unknown operation {name}") }]
        }))
        .into_response(),
    }
}

/// Fake Stripe tokens endpoint at `POST /v1/tokens`.
#[derive(Clone)]
pub struct FakeStripe {
    inner: Arc<FakeStripeInner>,
}

struct FakeStripeInner {
    reply: TokenizerReply,
    requests: Mutex<Vec<Vec<(String, String)>>>,
}

impl FakeStripe {
    #[must_use]
    pub fn new(reply: TokenizerReply) -> Self {
        Self {
            inner: Arc::new(FakeStripeInner {
                reply,
                requests: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Form bodies received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<Vec<(String, String)>> {
        lock(&self.inner.requests).clone()
    }

    #[must_use]
    pub fn router(&self) -> Router {
        Router::new()
            .route("/v1/tokens", post(stripe_tokens))
            .with_state(self.clone())
    }
}

async fn stripe_tokens(
    State(fake): State<FakeStripe>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Response {
    lock(&fake.inner.requests).push(fields);

    match fake.inner.reply {
        TokenizerReply::Token => Json(json!({
            "id": TOKEN_ID,
            "object": "token",
            "livemode": false
        }))
        .into_response(),
        TokenizerReply::Reject(message) => (
            StatusCode::PAYMENT_REQUIRED,
            Json(json!({
                "error": {
                    "type": "card_error",
                    "code": "invalid_number",
                    "message": message,
                    "param": "number"
                }
            })),
        )
            .into_response(),
        TokenizerReply::Fail => {
            (StatusCode::INTERNAL_SERVER_ERROR, "stripe is down").into_response()
        }
    }
}

/// Storefront configuration pointing at fake upstreams.
///
/// # Panics
///
/// Panics if the configuration is rejected.
#[must_use]
pub fn storefront_config(exchange: SocketAddr, stripe: SocketAddr) -> StorefrontConfig {
    let exchange_url = format!("http://{exchange}/graphql");
    let stripe_url = format!("http://{stripe}");

    StorefrontConfig::from_vars(|key| {
        let value = match key {
            "STOREFRONT_BASE_URL" => "http://localhost:3000",
            "EXCHANGE_GRAPHQL_URL" => exchange_url.as_str(),
            "EXCHANGE_APP_TOKEN" => APP_TOKEN,
            "STRIPE_API_BASE" => stripe_url.as_str(),
            "STRIPE_PUBLISHABLE_KEY" => "pk_test_51HqLyj",
            _ => return None,
        };
        Some(value.to_string())
    })
    .expect("Test configuration is valid")
}
