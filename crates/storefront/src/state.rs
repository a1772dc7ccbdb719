//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use gallery_core::{Order, OrderId};
use moka::future::Cache;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::checkout::{Clock, PaymentScreen, SystemClock};
use crate::config::StorefrontConfig;
use crate::exchange::ExchangeClient;
use crate::stripe::StripeClient;

/// A payment screen together with the order it was opened for.
#[derive(Debug)]
pub struct OpenScreen {
    /// The order as fetched when the page was loaded.
    pub order: Order,
    /// Screen state; held for the whole of a submission.
    pub screen: Mutex<PaymentScreen>,
}

/// A payment screen shared between the requests of one buyer.
pub type SharedScreen = Arc<OpenScreen>;

/// Identifies a screen: one buyer sign-in on one order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScreenKey {
    buyer: Uuid,
    order_id: OrderId,
}

impl ScreenKey {
    #[must_use]
    pub const fn new(buyer: Uuid, order_id: OrderId) -> Self {
        Self { buyer, order_id }
    }
}

/// Open payment screens keyed by sign-in and order.
///
/// Screens not touched for the configured idle time are dropped; a request
/// for a dropped screen starts over from a fresh page load.
#[derive(Clone)]
pub struct ScreenStore {
    cache: Cache<ScreenKey, SharedScreen>,
}

impl ScreenStore {
    /// Create a store whose screens expire after `idle` without access.
    #[must_use]
    pub fn new(idle: Duration) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(10_000)
                .time_to_idle(idle)
                .build(),
        }
    }

    /// Start a fresh screen for `order` under `buyer`'s sign-in, replacing
    /// any previous one.
    pub async fn open(&self, buyer: Uuid, order: &Order) -> SharedScreen {
        let screen = Arc::new(OpenScreen {
            order: order.clone(),
            screen: Mutex::new(PaymentScreen::new(order)),
        });
        self.cache
            .insert(ScreenKey::new(buyer, order.id.clone()), Arc::clone(&screen))
            .await;
        screen
    }

    /// The screen `buyer`'s sign-in has open for `order_id`, if any.
    pub async fn get(&self, buyer: Uuid, order_id: &OrderId) -> Option<SharedScreen> {
        self.cache
            .get(&ScreenKey::new(buyer, order_id.clone()))
            .await
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the upstream clients and the open screens.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    exchange: ExchangeClient,
    stripe: StripeClient,
    screens: ScreenStore,
    clock: Arc<dyn Clock>,
    secure_cookies: bool,
}

impl AppState {
    /// Create a new application state using the system clock.
    #[must_use]
    pub fn new(config: &StorefrontConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a new application state with a custom clock.
    #[must_use]
    pub fn with_clock(config: &StorefrontConfig, clock: Arc<dyn Clock>) -> Self {
        let exchange = ExchangeClient::new(&config.exchange);
        let stripe = StripeClient::new(&config.stripe);
        let screens = ScreenStore::new(config.screen_ttl);

        Self {
            inner: Arc::new(AppStateInner {
                exchange,
                stripe,
                screens,
                clock,
                secure_cookies: config.base_url.scheme() == "https",
            }),
        }
    }

    /// Get a reference to the order service client.
    #[must_use]
    pub fn exchange(&self) -> &ExchangeClient {
        &self.inner.exchange
    }

    /// Get a reference to the card tokenization client.
    #[must_use]
    pub fn stripe(&self) -> &StripeClient {
        &self.inner.stripe
    }

    /// Get a reference to the open payment screens.
    #[must_use]
    pub fn screens(&self) -> &ScreenStore {
        &self.inner.screens
    }

    /// Get the clock used for countdowns.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.inner.clock.as_ref()
    }

    /// Whether session cookies are HTTPS-only.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.inner.secure_cookies
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn order(id: &str) -> Order {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "state": "PENDING",
            "stateExpiresAt": "2018-12-06T13:47:16.446Z",
            "requestedFulfillment": { "__typename": "Pickup" },
            "buyer": { "id": "buyer" }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_open_replaces_screen() {
        let store = ScreenStore::new(Duration::from_secs(60));
        let buyer = Uuid::new_v4();
        let first = store.open(buyer, &order("1234")).await;
        first
            .screen
            .lock()
            .await
            .set_field(crate::checkout::AddressField::Name, "Erik");

        let second = store.open(buyer, &order("1234")).await;
        assert!(second.screen.lock().await.billing_form().name.is_empty());

        let current = store.get(buyer, &OrderId::new("1234")).await.unwrap();
        assert!(Arc::ptr_eq(&current, &second));
        assert!(store.get(buyer, &OrderId::new("other")).await.is_none());
    }

    #[tokio::test]
    async fn test_screens_scoped_to_sign_in() {
        let store = ScreenStore::new(Duration::from_secs(60));
        let buyer = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mine = store.open(buyer, &order("1234")).await;

        assert!(store.get(other, &OrderId::new("1234")).await.is_none());

        let theirs = store.open(other, &order("1234")).await;
        let current = store.get(buyer, &OrderId::new("1234")).await.unwrap();
        assert!(Arc::ptr_eq(&current, &mine));
        assert!(!Arc::ptr_eq(&current, &theirs));
    }
}
