//! Gallery Core - Shared types library.
//!
//! This crate provides the domain types used across the gallery checkout:
//! - `storefront` - Checkout payment flow and its HTTP surface
//! - `integration-tests` - End-to-end tests of the flow
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients. Order records
//! deserialize directly from the order service's GraphQL payloads.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, orders, addresses, country codes and prices

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
