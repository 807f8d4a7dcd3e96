//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Username/password accounts
//! - `catalog` - Products with a local mirror and a change feed
//! - `checkout` - Cart to orders, with payment
//! - `notifications` - Per-recipient notifications, preferences and push fan-out
//! - `payment` - Payment providers
//! - `push` - Push gateway client
//! - `realtime` - In-process change feed

pub mod auth;
pub mod catalog;
pub mod checkout;
pub mod notifications;
pub mod payment;
pub mod push;
pub mod realtime;
