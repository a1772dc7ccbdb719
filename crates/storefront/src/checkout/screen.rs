//! One buyer's payment screen.
//!
//! Owns the billing form, the touched set, the submitted flag and the
//! submission state for a single order, and is the only thing the HTTP layer
//! drives.

use gallery_core::{Address, Order, OrderId, Ship};
use tokio::sync::watch;
use tracing::{debug, info};

use super::billing::{BillingChoice, BillingForm};
use super::countdown::{Clock, Countdown};
use super::gateway::{PaymentMutations, TokenRequest, Tokenizer};
use super::submission::{self, ErrorDialog, Failure, SubmissionState};
use super::validation::{AddressErrors, AddressField, FieldError, TouchedFields, validate};

/// What a submit attempt led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// A submission is in flight or a dialog is open; nothing happened.
    Ignored,
    /// The visible billing form is invalid; no remote call was made.
    Blocked,
    /// The tokenizer rejected the card.
    InvalidCard { message: String },
    /// The submission failed; the dialog is open.
    Fatal(ErrorDialog),
    /// The payment is attached; go to `path`.
    Redirect(String),
}

/// Payment screen state for one order.
#[derive(Debug)]
pub struct PaymentScreen {
    order_id: OrderId,
    countdown: Countdown,
    billing: BillingForm,
    touched: TouchedFields,
    submitted: bool,
    state: watch::Sender<SubmissionState>,
}

impl PaymentScreen {
    /// A fresh screen for `order`.
    #[must_use]
    pub fn new(order: &Order) -> Self {
        let (state, _) = watch::channel(SubmissionState::Idle);
        Self {
            order_id: order.id.clone(),
            countdown: Countdown::new(order.expires_at()),
            billing: BillingForm::for_order(order),
            touched: TouchedFields::default(),
            submitted: false,
            state,
        }
    }

    #[must_use]
    pub const fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Whether the same-address toggle is offered.
    #[must_use]
    pub const fn shows_same_address_toggle(&self) -> bool {
        self.billing.choice().offers_toggle()
    }

    /// Whether the same-address toggle is on.
    #[must_use]
    pub const fn same_address_selected(&self) -> bool {
        self.billing.choice().same_as_shipping()
    }

    /// Whether the billing form is shown.
    #[must_use]
    pub const fn billing_form_visible(&self) -> bool {
        self.billing.choice().form_visible()
    }

    /// The billing form contents.
    #[must_use]
    pub const fn billing_form(&self) -> &Address {
        self.billing.form()
    }

    /// The shipping address, when the work ships.
    #[must_use]
    pub const fn shipping_address(&self) -> Option<&Ship> {
        match self.billing.choice() {
            BillingChoice::Shipping { ship, .. } => Some(ship),
            BillingChoice::Pickup => None,
        }
    }

    /// Flip the same-address toggle.
    ///
    /// Hiding the form wipes it, forgets its touched fields and the earlier
    /// submit attempt, so it comes back as a fresh form.
    pub fn toggle_same_address(&mut self) -> bool {
        if !self.billing.toggle_same_address() {
            return false;
        }
        if !self.billing_form_visible() {
            self.touched.clear();
            self.submitted = false;
        }
        debug!(
            order_id = %self.order_id,
            same_address = self.same_address_selected(),
            "billing toggle changed"
        );
        true
    }

    /// Set a billing form field and mark it touched.
    ///
    /// Ignored when the form is hidden.
    pub fn set_field(&mut self, field: AddressField, value: impl Into<String>) -> bool {
        if !self.billing_form_visible() {
            return false;
        }
        field.set(self.billing.form_mut(), value.into());
        self.touched.touch(field);
        true
    }

    /// Mark a field touched without changing it.
    pub fn touch(&mut self, field: AddressField) {
        if self.billing_form_visible() {
            self.touched.touch(field);
        }
    }

    /// Current validation errors of the billing form.
    #[must_use]
    pub fn errors(&self) -> AddressErrors {
        validate(self.billing.form())
    }

    /// The error the buyer should see for `field`.
    #[must_use]
    pub fn visible_error(&self, field: AddressField) -> Option<FieldError> {
        if !self.billing_form_visible() {
            return None;
        }
        super::validation::visible_error(&self.errors(), &self.touched, self.submitted, field)
    }

    /// Whether a submission has been attempted.
    #[must_use]
    pub const fn submitted(&self) -> bool {
        self.submitted
    }

    /// The countdown to the order's expiry, rendered at `clock`'s instant.
    #[must_use]
    pub fn countdown(&self, clock: &dyn Clock) -> String {
        self.countdown.render(clock)
    }

    /// Whether the order's current state has lapsed at `clock`'s instant.
    #[must_use]
    pub fn is_expired(&self, clock: &dyn Clock) -> bool {
        self.countdown.is_elapsed(clock)
    }

    /// The current submission state.
    #[must_use]
    pub fn state(&self) -> SubmissionState {
        self.state.borrow().clone()
    }

    /// Watch the submission state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SubmissionState> {
        self.state.subscribe()
    }

    /// Whether a submission is in flight.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.state.borrow().is_busy()
    }

    /// The tokenizer's message, shown next to the submit button.
    #[must_use]
    pub fn inline_error(&self) -> Option<String> {
        match &*self.state.borrow() {
            SubmissionState::Failed(Failure::FieldLevel { message }) => Some(message.clone()),
            _ => None,
        }
    }

    /// The open error dialog.
    #[must_use]
    pub fn error_dialog(&self) -> Option<ErrorDialog> {
        match &*self.state.borrow() {
            SubmissionState::Failed(Failure::Fatal(dialog)) => Some(dialog.clone()),
            _ => None,
        }
    }

    /// Close the error dialog; the billing choice and form are kept.
    pub fn dismiss_error(&mut self) -> bool {
        self.state.send_if_modified(|state| {
            if matches!(state, SubmissionState::Failed(Failure::Fatal(_))) {
                *state = SubmissionState::Idle;
                true
            } else {
                false
            }
        })
    }

    /// Submit the payment.
    ///
    /// Validates a visible form first; an invalid form makes no remote call.
    /// Otherwise tokenizes the reconciled billing address and attaches the
    /// payment to the order.
    pub async fn submit<T, M>(&mut self, tokenizer: &T, mutations: &M) -> SubmitOutcome
    where
        T: Tokenizer,
        M: PaymentMutations,
    {
        let current = self.state();
        if let SubmissionState::Succeeded { redirect } = current {
            return SubmitOutcome::Redirect(redirect);
        }
        if !current.accepts_submit() {
            debug!(order_id = %self.order_id, state = current.name(), "submit ignored");
            return SubmitOutcome::Ignored;
        }

        self.submitted = true;

        if self.billing_form_visible() {
            let errors = self.errors();
            if !errors.is_valid() {
                info!(
                    order_id = %self.order_id,
                    invalid = errors.fields().count(),
                    "submit blocked by billing form"
                );
                self.state.send_replace(SubmissionState::Idle);
                return SubmitOutcome::Blocked;
            }
        }

        let request = TokenRequest::from(&self.billing.reconciled());
        let terminal =
            submission::run(&self.order_id, request, tokenizer, mutations, &self.state).await;

        match terminal {
            SubmissionState::Succeeded { redirect } => SubmitOutcome::Redirect(redirect),
            SubmissionState::Failed(Failure::FieldLevel { message }) => {
                SubmitOutcome::InvalidCard { message }
            }
            SubmissionState::Failed(Failure::Fatal(dialog)) => SubmitOutcome::Fatal(dialog),
            SubmissionState::Idle
            | SubmissionState::Tokenizing
            | SubmissionState::AttachingPayment(_) => SubmitOutcome::Ignored,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use gallery_core::{CreditCardId, OrderState, TokenId};

    use super::*;
    use crate::checkout::gateway::{
        CreditCardOrError, CreditCardRef, OrderOrError, OrderRef, Token, TokenResponse,
    };

    #[derive(Debug, thiserror::Error)]
    #[error("unreachable")]
    struct Unreachable;

    struct AcceptAll;

    impl Tokenizer for AcceptAll {
        type Error = Unreachable;

        async fn create_token(&self, _request: &TokenRequest) -> Result<TokenResponse, Unreachable> {
            Ok(TokenResponse::Token(Token {
                id: TokenId::new("tokenId"),
            }))
        }
    }

    impl PaymentMutations for AcceptAll {
        type Error = Unreachable;

        async fn create_credit_card(&self, _token: &TokenId) -> Result<CreditCardOrError, Unreachable> {
            Ok(CreditCardOrError::Success {
                credit_card: CreditCardRef {
                    id: CreditCardId::new("card"),
                },
            })
        }

        async fn set_order_payment(
            &self,
            _credit_card_id: &CreditCardId,
            order_id: &OrderId,
        ) -> Result<OrderOrError, Unreachable> {
            Ok(OrderOrError::Success {
                order: OrderRef {
                    id: order_id.clone(),
                    state: OrderState::Pending,
                },
            })
        }
    }

    fn order(fulfillment: serde_json::Value) -> Order {
        serde_json::from_value(serde_json::json!({
            "id": "1234",
            "state": "PENDING",
            "stateExpiresAt": "2018-12-06T13:47:16.446Z",
            "requestedFulfillment": fulfillment,
            "buyer": { "id": "buyer" }
        }))
        .unwrap()
    }

    fn pickup() -> Order {
        order(serde_json::json!({ "__typename": "Pickup" }))
    }

    fn shipping() -> Order {
        order(serde_json::json!({
            "__typename": "Ship",
            "name": "Joelle Van Dyne",
            "addressLine1": "401 Broadway",
            "addressLine2": "Suite 25",
            "city": "New York",
            "region": "NY",
            "postalCode": "10013",
            "country": "US"
        }))
    }

    #[test]
    fn test_set_field_ignored_while_hidden() {
        let mut screen = PaymentScreen::new(&shipping());
        assert!(!screen.set_field(AddressField::Name, "Someone"));
        assert!(screen.billing_form().is_empty());
        assert_eq!(screen.visible_error(AddressField::Name), None);
    }

    #[test]
    fn test_hiding_form_forgets_touches() {
        let mut screen = PaymentScreen::new(&shipping());
        screen.toggle_same_address();
        screen.touch(AddressField::City);
        assert_eq!(
            screen.visible_error(AddressField::City),
            Some(FieldError::Required)
        );

        screen.toggle_same_address();
        screen.toggle_same_address();
        assert_eq!(screen.visible_error(AddressField::City), None);
    }

    #[tokio::test]
    async fn test_reshown_form_hides_errors_after_blocked_submit() {
        let mut screen = PaymentScreen::new(&shipping());
        screen.toggle_same_address();
        assert_eq!(
            screen.submit(&AcceptAll, &AcceptAll).await,
            SubmitOutcome::Blocked
        );
        assert_eq!(
            screen.visible_error(AddressField::Name),
            Some(FieldError::Required)
        );

        screen.toggle_same_address();
        screen.toggle_same_address();

        assert!(screen.billing_form_visible());
        assert!(!screen.submitted());
        assert_eq!(screen.visible_error(AddressField::Name), None);
        assert_eq!(screen.visible_error(AddressField::PostalCode), None);

        screen.touch(AddressField::City);
        assert_eq!(
            screen.visible_error(AddressField::City),
            Some(FieldError::Required)
        );
    }

    #[tokio::test]
    async fn test_blocked_submit_shows_every_error() {
        let mut screen = PaymentScreen::new(&pickup());
        let outcome = screen.submit(&AcceptAll, &AcceptAll).await;

        assert_eq!(outcome, SubmitOutcome::Blocked);
        assert!(screen.submitted());
        assert_eq!(
            screen.visible_error(AddressField::AddressLine1),
            Some(FieldError::Required)
        );
        assert_eq!(screen.state(), SubmissionState::Idle);
    }

    #[tokio::test]
    async fn test_hidden_form_skips_validation() {
        let mut screen = PaymentScreen::new(&shipping());
        let outcome = screen.submit(&AcceptAll, &AcceptAll).await;
        assert_eq!(
            outcome,
            SubmitOutcome::Redirect("/orders/1234/status".to_string())
        );
    }

    #[tokio::test]
    async fn test_submit_after_success_repeats_redirect() {
        let mut screen = PaymentScreen::new(&shipping());
        screen.submit(&AcceptAll, &AcceptAll).await;
        assert_eq!(
            screen.submit(&AcceptAll, &AcceptAll).await,
            SubmitOutcome::Redirect("/orders/1234/status".to_string())
        );
    }

    #[test]
    fn test_dismiss_without_dialog_is_noop() {
        let mut screen = PaymentScreen::new(&pickup());
        assert!(!screen.dismiss_error());
        assert_eq!(screen.error_dialog(), None);
        assert_eq!(screen.inline_error(), None);
    }

    #[test]
    fn test_expiry_follows_clock() {
        let screen = PaymentScreen::new(&pickup());
        let expires = chrono::DateTime::parse_from_rfc3339("2018-12-06T13:47:16.446Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let clock = crate::checkout::FixedClock::new(expires - chrono::Duration::seconds(1));

        assert!(!screen.is_expired(&clock));
        assert_eq!(screen.countdown(&clock), "00d 00h 00m 01s left");

        clock.advance(chrono::Duration::seconds(1));
        assert!(screen.is_expired(&clock));
    }
}
