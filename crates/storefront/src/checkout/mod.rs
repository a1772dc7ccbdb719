//! Checkout payment step.
//!
//! - [`billing`]: which address goes with the card
//! - [`validation`]: required fields and error visibility
//! - [`submission`]: tokenize, record the card, attach the payment
//! - [`countdown`]: time left on the order
//! - [`screen`]: one buyer's screen, composing the above
//!
//! Nothing here does I/O directly; the remote services come in through the
//! [`Tokenizer`] and [`PaymentMutations`] traits.

pub mod billing;
pub mod countdown;
pub mod gateway;
pub mod screen;
pub mod submission;
pub mod validation;

pub use billing::{BillingChoice, BillingForm, ShippingBilling};
pub use countdown::{Clock, Countdown, FixedClock, SystemClock, format_remaining};
pub use gateway::{
    CreditCardOrError, CreditCardRef, MutationError, OrderError, OrderOrError, OrderRef,
    PaymentMutations, Token, TokenError, TokenRequest, TokenResponse, Tokenizer,
};
pub use screen::{PaymentScreen, SubmitOutcome};
pub use submission::{AttachStep, ErrorDialog, Failure, SubmissionState};
pub use validation::{AddressErrors, AddressField, FieldError, REQUIRED_MESSAGE, validate};
