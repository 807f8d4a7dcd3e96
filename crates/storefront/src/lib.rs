//! FreshBites storefront library.
//!
//! The JSON API behind the FreshBites mobile app: catalog, session cart,
//! checkout, profiles and per-user notifications. Exposed as a library so the
//! router can be driven in-process by tests and reused by `fb-cli`.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
