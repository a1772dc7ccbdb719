//! Core types for the gallery checkout.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod address;
pub mod country;
pub mod id;
pub mod order;
pub mod price;
pub mod status;

pub use address::{Address, Ship};
pub use country::{CountryCode, CountryCodeError};
pub use id::*;
pub use order::{
    Buyer, FulfillmentType, Offer, Order, RequestedFulfillment, SavedCreditCard, status_path,
};
pub use price::{CurrencyCode, Price};
pub use status::*;
