//! Order records as the checkout reads them.
//!
//! These types deserialize straight from the order service's GraphQL
//! payloads (camelCase keys, `__typename`-tagged unions). The checkout only
//! ever reads an order; the payment fields are set through mutations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::address::Ship;
use super::id::{BuyerId, OfferId, OrderId};
use super::price::{CurrencyCode, Price};
use super::status::{OrderMode, OrderParticipant, OrderState};

/// How the buyer asked to receive the work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "__typename")]
pub enum RequestedFulfillment {
    /// Collected in person; the order has no shipping address.
    Pickup,
    /// Shipped to the enclosed address.
    Ship(Ship),
}

/// Fulfillment type without the address payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentType {
    Pickup,
    Ship,
}

impl RequestedFulfillment {
    /// The fulfillment type.
    #[must_use]
    pub const fn fulfillment_type(&self) -> FulfillmentType {
        match self {
            Self::Pickup => FulfillmentType::Pickup,
            Self::Ship(_) => FulfillmentType::Ship,
        }
    }

    /// The shipping address, when the work is shipped.
    #[must_use]
    pub const fn shipping_address(&self) -> Option<&Ship> {
        match self {
            Self::Pickup => None,
            Self::Ship(ship) => Some(ship),
        }
    }
}

/// Snapshot of a credit card saved on the order by an earlier visit.
///
/// Field names follow the payment processor's card object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCreditCard {
    pub name: Option<String>,
    pub street1: Option<String>,
    pub street2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub postal_code: Option<String>,
}

/// The buying party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buyer {
    pub id: BuyerId,
}

/// The most recent offer on an offer-mode order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offer {
    pub id: OfferId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub amount_cents: Option<i64>,
    #[serde(default)]
    pub buyer_total_cents: Option<i64>,
}

/// An order as fetched for the payment step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub mode: OrderMode,
    pub state: OrderState,
    pub state_expires_at: DateTime<Utc>,
    #[serde(default)]
    pub currency_code: CurrencyCode,
    pub requested_fulfillment: RequestedFulfillment,
    #[serde(default)]
    pub credit_card: Option<SavedCreditCard>,
    pub buyer: Buyer,
    #[serde(default)]
    pub last_offer: Option<Offer>,
    #[serde(default)]
    pub awaiting_response_from: Option<OrderParticipant>,
}

impl Order {
    /// The requested fulfillment type.
    #[must_use]
    pub const fn fulfillment_type(&self) -> FulfillmentType {
        self.requested_fulfillment.fulfillment_type()
    }

    /// The shipping address, when the work is shipped.
    #[must_use]
    pub const fn shipping_address(&self) -> Option<&Ship> {
        self.requested_fulfillment.shipping_address()
    }

    /// When the current state lapses.
    #[must_use]
    pub const fn expires_at(&self) -> DateTime<Utc> {
        self.state_expires_at
    }

    /// Amount of the last offer, in the order's currency.
    #[must_use]
    pub fn last_offer_amount(&self) -> Option<Price> {
        self.last_offer
            .as_ref()
            .and_then(|offer| offer.amount_cents)
            .map(|cents| Price::from_cents(cents, self.currency_code))
    }

    /// Path of the order's status page.
    #[must_use]
    pub fn status_path(&self) -> String {
        status_path(&self.id)
    }
}

/// Path of an order's status page.
#[must_use]
pub fn status_path(order_id: &OrderId) -> String {
    format!("/orders/{order_id}/status")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn order_json() -> serde_json::Value {
        serde_json::json!({
            "id": "1234",
            "mode": "OFFER",
            "state": "SUBMITTED",
            "stateExpiresAt": "2018-12-06T13:47:16.446Z",
            "currencyCode": "USD",
            "requestedFulfillment": {
                "__typename": "Ship",
                "name": "Joelle Van Dyne",
                "addressLine1": "401 Broadway",
                "addressLine2": "Suite 25",
                "city": "New York",
                "region": "NY",
                "postalCode": "10013",
                "country": "US",
                "phoneNumber": "120938120983"
            },
            "creditCard": null,
            "buyer": { "id": "buyer" },
            "lastOffer": {
                "id": "myoffer-id",
                "createdAt": "2018-12-04T13:47:16.446Z",
                "amountCents": 1_400_000,
                "buyerTotalCents": 1_420_000
            },
            "awaitingResponseFrom": "BUYER"
        })
    }

    #[test]
    fn test_order_deserializes_shipping_order() {
        let order: Order = serde_json::from_value(order_json()).unwrap();
        assert_eq!(order.id.as_str(), "1234");
        assert_eq!(order.mode, OrderMode::Offer);
        assert_eq!(order.state, OrderState::Submitted);
        assert_eq!(order.fulfillment_type(), FulfillmentType::Ship);
        assert_eq!(
            order.shipping_address().map(|s| s.name.as_str()),
            Some("Joelle Van Dyne")
        );
        assert_eq!(order.awaiting_response_from, Some(OrderParticipant::Buyer));
        assert_eq!(
            order.expires_at(),
            Utc.with_ymd_and_hms(2018, 12, 6, 13, 47, 16).unwrap()
                + chrono::Duration::milliseconds(446)
        );
    }

    #[test]
    fn test_order_deserializes_pickup() {
        let mut json = order_json();
        json["requestedFulfillment"] = serde_json::json!({
            "__typename": "Pickup",
            "fulfillmentType": "PICKUP"
        });
        let order: Order = serde_json::from_value(json).unwrap();
        assert_eq!(order.fulfillment_type(), FulfillmentType::Pickup);
        assert!(order.shipping_address().is_none());
    }

    #[test]
    fn test_order_deserializes_saved_card() {
        let mut json = order_json();
        json["creditCard"] = serde_json::json!({
            "name": "Artsy UK Ltd",
            "street1": "14 Gower's Walk",
            "street2": "Suite 2.5, The Loom",
            "city": "London",
            "state": "Whitechapel",
            "country": "UK",
            "postal_code": "E1 8PY"
        });
        let order: Order = serde_json::from_value(json).unwrap();
        let card = order.credit_card.unwrap();
        assert_eq!(card.postal_code.as_deref(), Some("E1 8PY"));
    }

    #[test]
    fn test_last_offer_amount() {
        let order: Order = serde_json::from_value(order_json()).unwrap();
        assert_eq!(
            order.last_offer_amount().map(|p| p.display()),
            Some("$14,000.00".to_string())
        );
    }

    #[test]
    fn test_status_path() {
        let order: Order = serde_json::from_value(order_json()).unwrap();
        assert_eq!(order.status_path(), "/orders/1234/status");
    }
}
