//! Payment submission state machine.
//!
//! ```text
//! Idle ──submit──▶ Tokenizing ──token──▶ AttachingPayment(RecordingCard)
//!                      │                        │ credit card id
//!                      │                        ▼
//!                      │              AttachingPayment(SettingPayment) ──▶ Succeeded
//!                      ▼                        │
//!        Failed(FieldLevel) / Failed(Fatal) ◀───┘
//! ```
//!
//! `SettingPayment` needs a [`CreditCardId`], and only a successful
//! `createCreditCard` produces one, so the payment is never attached without
//! a recorded card. The current state is published on a `watch` channel;
//! observers see the latest state, which may skip intermediate ones.

use gallery_core::{CreditCardId, OrderId, TokenId, status_path};
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use super::gateway::{
    CreditCardOrError, OrderOrError, PaymentMutations, TokenRequest, TokenResponse, Tokenizer,
};
use crate::error::add_breadcrumb;

/// Title of the error dialog.
pub const ERROR_DIALOG_TITLE: &str = "An error occurred";

/// Body of the error dialog when nothing more specific is known.
pub const DEFAULT_ERROR_MESSAGE: &str =
    "Something went wrong. Please try again or contact support.";

/// A dismissible modal error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDialog {
    pub title: String,
    pub message: String,
}

impl ErrorDialog {
    /// The generic dialog.
    #[must_use]
    pub fn generic() -> Self {
        Self::with_message(DEFAULT_ERROR_MESSAGE)
    }

    /// The dialog with a specific body.
    #[must_use]
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            title: ERROR_DIALOG_TITLE.to_string(),
            message: message.into(),
        }
    }
}

impl Default for ErrorDialog {
    fn default() -> Self {
        Self::generic()
    }
}

/// How a submission failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// The tokenizer rejected the card; the message is shown inline.
    FieldLevel { message: String },
    /// Anything else; shown as a modal dialog.
    Fatal(ErrorDialog),
}

/// Which order service mutation is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachStep {
    RecordingCard,
    SettingPayment,
}

/// Where a payment submission stands.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Tokenizing,
    AttachingPayment(AttachStep),
    Succeeded { redirect: String },
    Failed(Failure),
}

impl SubmissionState {
    /// Whether a remote call is in flight.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Tokenizing | Self::AttachingPayment(_))
    }

    /// Whether a new submission may start from here.
    #[must_use]
    pub const fn accepts_submit(&self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Failed(Failure::FieldLevel { .. })
        )
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Tokenizing => "tokenizing",
            Self::AttachingPayment(AttachStep::RecordingCard) => "recording_card",
            Self::AttachingPayment(AttachStep::SettingPayment) => "setting_payment",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed(Failure::FieldLevel { .. }) => "failed_field_level",
            Self::Failed(Failure::Fatal(_)) => "failed_fatal",
        }
    }
}

/// Next unit of work.
enum Step {
    Tokenize(TokenRequest),
    RecordCard(TokenId),
    SetPayment(CreditCardId),
    Done(SubmissionState),
}

impl Step {
    /// The state observers see while this step runs.
    fn state(&self) -> SubmissionState {
        match self {
            Self::Tokenize(_) => SubmissionState::Tokenizing,
            Self::RecordCard(_) => SubmissionState::AttachingPayment(AttachStep::RecordingCard),
            Self::SetPayment(_) => SubmissionState::AttachingPayment(AttachStep::SettingPayment),
            Self::Done(state) => state.clone(),
        }
    }
}

/// Fatal failure from a transport error.
fn transport_failure(stage: &str, error: &impl std::error::Error) -> SubmissionState {
    warn!(stage, error = %error, "payment submission failed in transport");
    add_breadcrumb("checkout", "payment submission transport failure", Some(&[("stage", stage)]));
    SubmissionState::Failed(Failure::Fatal(ErrorDialog::generic()))
}

/// Run one payment submission to a terminal state.
///
/// Sets `state` to each step before its remote call, starting with
/// `Tokenizing`, and returns the terminal state. Remote calls are strictly
/// sequential.
#[instrument(skip_all, fields(order_id = %order_id))]
pub async fn run<T, M>(
    order_id: &OrderId,
    request: TokenRequest,
    tokenizer: &T,
    mutations: &M,
    state: &watch::Sender<SubmissionState>,
) -> SubmissionState
where
    T: Tokenizer,
    M: PaymentMutations,
{
    let mut step = Step::Tokenize(request);

    loop {
        state.send_replace(step.state());

        step = match step {
            Step::Tokenize(request) => match tokenizer.create_token(&request).await {
                Ok(TokenResponse::Token(token)) => {
                    info!("card tokenized");
                    Step::RecordCard(token.id)
                }
                Ok(TokenResponse::Error(error)) => {
                    info!(code = ?error.code, "card rejected by tokenizer");
                    Step::Done(SubmissionState::Failed(Failure::FieldLevel {
                        message: error.message,
                    }))
                }
                Err(e) => Step::Done(transport_failure("tokenize", &e)),
            },

            Step::RecordCard(token) => match mutations.create_credit_card(&token).await {
                Ok(CreditCardOrError::Success { credit_card }) => {
                    info!(credit_card_id = %credit_card.id, "credit card recorded");
                    Step::SetPayment(credit_card.id)
                }
                Ok(CreditCardOrError::Failure { mutation_error }) => {
                    warn!(
                        kind = %mutation_error.kind,
                        message = %mutation_error.message,
                        detail = ?mutation_error.detail,
                        "createCreditCard returned an error"
                    );
                    let dialog = mutation_error
                        .detail
                        .map_or_else(ErrorDialog::generic, ErrorDialog::with_message);
                    Step::Done(SubmissionState::Failed(Failure::Fatal(dialog)))
                }
                Err(e) => Step::Done(transport_failure("create_credit_card", &e)),
            },

            Step::SetPayment(credit_card_id) => {
                match mutations.set_order_payment(&credit_card_id, order_id).await {
                    Ok(OrderOrError::Success { order }) => {
                        info!(state = %order.state, "order payment set");
                        Step::Done(SubmissionState::Succeeded {
                            redirect: status_path(order_id),
                        })
                    }
                    Ok(OrderOrError::Failure { error }) => {
                        warn!(
                            kind = %error.kind,
                            code = %error.code,
                            "ecommerceSetOrderPayment returned an error"
                        );
                        Step::Done(SubmissionState::Failed(Failure::Fatal(
                            ErrorDialog::generic(),
                        )))
                    }
                    Err(e) => Step::Done(transport_failure("set_order_payment", &e)),
                }
            }

            Step::Done(terminal) => return terminal,
        };
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use gallery_core::OrderState;

    use super::*;
    use crate::checkout::gateway::{CreditCardRef, MutationError, OrderError, OrderRef, Token};

    #[derive(Debug, thiserror::Error)]
    #[error("network down")]
    struct NetworkDown;

    struct StubTokenizer(Option<TokenResponse>);

    impl Tokenizer for StubTokenizer {
        type Error = NetworkDown;

        async fn create_token(&self, _request: &TokenRequest) -> Result<TokenResponse, NetworkDown> {
            self.0.clone().ok_or(NetworkDown)
        }
    }

    struct StubMutations {
        card: Option<CreditCardOrError>,
        payment: Option<OrderOrError>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl StubMutations {
        fn new(card: Option<CreditCardOrError>, payment: Option<OrderOrError>) -> Self {
            Self {
                card,
                payment,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PaymentMutations for StubMutations {
        type Error = NetworkDown;

        async fn create_credit_card(&self, _token: &TokenId) -> Result<CreditCardOrError, NetworkDown> {
            self.calls.lock().unwrap().push("create_credit_card");
            self.card.clone().ok_or(NetworkDown)
        }

        async fn set_order_payment(
            &self,
            _credit_card_id: &CreditCardId,
            _order_id: &OrderId,
        ) -> Result<OrderOrError, NetworkDown> {
            self.calls.lock().unwrap().push("set_order_payment");
            self.payment.clone().ok_or(NetworkDown)
        }
    }

    fn request() -> TokenRequest {
        TokenRequest {
            name: "Joelle Van Dyne".to_string(),
            address_line1: "401 Broadway".to_string(),
            address_line2: "Suite 25".to_string(),
            address_city: "New York".to_string(),
            address_state: "NY".to_string(),
            address_zip: "10013".to_string(),
            address_country: "US".to_string(),
        }
    }

    fn token() -> Option<TokenResponse> {
        Some(TokenResponse::Token(Token {
            id: TokenId::new("tokenId"),
        }))
    }

    fn card_ok() -> Option<CreditCardOrError> {
        Some(CreditCardOrError::Success {
            credit_card: CreditCardRef {
                id: CreditCardId::new("gravityCreditCardId"),
            },
        })
    }

    fn payment_ok() -> Option<OrderOrError> {
        Some(OrderOrError::Success {
            order: OrderRef {
                id: OrderId::new("1234"),
                state: OrderState::Submitted,
            },
        })
    }

    async fn run_with(tokenizer: &StubTokenizer, mutations: &StubMutations) -> SubmissionState {
        let (tx, _rx) = watch::channel(SubmissionState::Idle);
        run(&OrderId::new("1234"), request(), tokenizer, mutations, &tx).await
    }

    #[tokio::test]
    async fn test_happy_path_calls_mutations_in_order() {
        let mutations = StubMutations::new(card_ok(), payment_ok());
        let state = run_with(&StubTokenizer(token()), &mutations).await;

        assert_eq!(
            state,
            SubmissionState::Succeeded {
                redirect: "/orders/1234/status".to_string()
            }
        );
        assert_eq!(mutations.calls(), vec!["create_credit_card", "set_order_payment"]);
    }

    #[tokio::test]
    async fn test_tokenizer_rejection_is_field_level() {
        let rejection = TokenResponse::Error(crate::checkout::gateway::TokenError {
            message: "Your card number is invalid.".to_string(),
            kind: None,
            code: None,
            decline_code: None,
            param: None,
        });
        let mutations = StubMutations::new(card_ok(), payment_ok());
        let state = run_with(&StubTokenizer(Some(rejection)), &mutations).await;

        assert_eq!(
            state,
            SubmissionState::Failed(Failure::FieldLevel {
                message: "Your card number is invalid.".to_string()
            })
        );
        assert!(mutations.calls().is_empty());
    }

    #[tokio::test]
    async fn test_tokenizer_transport_failure_is_fatal() {
        let mutations = StubMutations::new(card_ok(), payment_ok());
        let state = run_with(&StubTokenizer(None), &mutations).await;

        assert_eq!(
            state,
            SubmissionState::Failed(Failure::Fatal(ErrorDialog::generic()))
        );
        assert!(mutations.calls().is_empty());
    }

    #[tokio::test]
    async fn test_card_failure_never_sets_payment() {
        let failure = CreditCardOrError::Failure {
            mutation_error: MutationError {
                kind: "payment_error".to_string(),
                message: "Payment error".to_string(),
                detail: Some("No such token: fake-token".to_string()),
            },
        };
        let mutations = StubMutations::new(Some(failure), payment_ok());
        let state = run_with(&StubTokenizer(token()), &mutations).await;

        assert_eq!(
            state,
            SubmissionState::Failed(Failure::Fatal(ErrorDialog::with_message(
                "No such token: fake-token"
            )))
        );
        assert_eq!(mutations.calls(), vec!["create_credit_card"]);
    }

    #[tokio::test]
    async fn test_card_transport_failure_never_sets_payment() {
        let mutations = StubMutations::new(None, payment_ok());
        let state = run_with(&StubTokenizer(token()), &mutations).await;

        assert!(matches!(state, SubmissionState::Failed(Failure::Fatal(_))));
        assert_eq!(mutations.calls(), vec!["create_credit_card"]);
    }

    #[tokio::test]
    async fn test_payment_failure_is_fatal() {
        let failure = OrderOrError::Failure {
            error: OrderError {
                kind: "validation".to_string(),
                code: "invalid_state".to_string(),
                data: None,
            },
        };
        let mutations = StubMutations::new(card_ok(), Some(failure));
        let state = run_with(&StubTokenizer(token()), &mutations).await;

        assert_eq!(
            state,
            SubmissionState::Failed(Failure::Fatal(ErrorDialog::generic()))
        );
    }

    #[test]
    fn test_busy_states() {
        assert!(!SubmissionState::Idle.is_busy());
        assert!(SubmissionState::Tokenizing.is_busy());
        assert!(SubmissionState::AttachingPayment(AttachStep::RecordingCard).is_busy());
        assert!(SubmissionState::AttachingPayment(AttachStep::SettingPayment).is_busy());
        assert!(!SubmissionState::Failed(Failure::Fatal(ErrorDialog::generic())).is_busy());
    }

    #[test]
    fn test_accepts_submit() {
        assert!(SubmissionState::Idle.accepts_submit());
        assert!(
            SubmissionState::Failed(Failure::FieldLevel {
                message: String::new()
            })
            .accepts_submit()
        );
        assert!(!SubmissionState::Tokenizing.accepts_submit());
        assert!(!SubmissionState::Failed(Failure::Fatal(ErrorDialog::generic())).accepts_submit());
        assert!(
            !SubmissionState::Succeeded {
                redirect: String::new()
            }
            .accepts_submit()
        );
    }
}
