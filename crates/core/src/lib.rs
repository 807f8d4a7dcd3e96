//! FreshBites Core - Shared domain types and pricing rules.
//!
//! This crate provides types used across all FreshBites components:
//! - `storefront` - JSON API consumed by the mobile app
//! - `cli` - Command-line tools for migrations, seeding and user roles
//!
//! # Architecture
//!
//! The core crate contains only types and pure rules - no I/O, no database
//! access, no HTTP clients. Cart totals, role transitions and notification
//! preference filtering live here so they can be tested in isolation.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, usernames and statuses
//! - [`cart`] - Session cart model and checkout totals
//! - [`notification`] - Notification kinds and per-user preferences

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod notification;
pub mod types;

pub use cart::{
    Cart, CartLine, CartTotals, DELIVERY_FEE, MAX_LINE_QUANTITY, PREMIUM_DISCOUNT_RATE,
};
pub use notification::{NotificationKind, NotificationPreferences};
pub use types::*;
