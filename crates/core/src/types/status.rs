//! Status enums for orders.

use serde::{Deserialize, Serialize};

/// Order lifecycle state.
///
/// Maps to the order service's `state` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    #[default]
    Pending,
    Submitted,
    Approved,
    Fulfilled,
    Rejected,
    Abandoned,
    Canceled,
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Submitted => "SUBMITTED",
            Self::Approved => "APPROVED",
            Self::Fulfilled => "FULFILLED",
            Self::Rejected => "REJECTED",
            Self::Abandoned => "ABANDONED",
            Self::Canceled => "CANCELED",
        };
        f.write_str(s)
    }
}

/// How the order was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderMode {
    /// Bought at list price.
    #[default]
    Buy,
    /// Placed through an offer negotiation.
    Offer,
}

/// Party an offer order is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderParticipant {
    Buyer,
    Seller,
}
