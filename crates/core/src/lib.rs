//! BoostedLabs Core - Domain types and checkout rules.
//!
//! This crate provides the types and pure business rules shared by the
//! storefront service, the CLI and the integration tests:
//!
//! - [`types`] - Newtype IDs, money, emails and status enums
//! - [`checkout`] - Cart totals, free-item eligibility and address validation
//! - [`order`] - The order status machine and cancellation policy
//! - [`reviews`] - Review rating validation and aggregate statistics
//!
//! # Architecture
//!
//! The core crate contains only types and rules - no I/O, no database access,
//! no HTTP clients. Everything here can be tested without a running service.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkout;
pub mod order;
pub mod reviews;
pub mod types;

pub use types::*;
