//! Domain models for the storefront.
//!
//! Database row types live next to their repositories in [`crate::db`];
//! these are the validated shapes handed to services and serialized to the
//! mobile client.

pub mod notification;
pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use notification::{Notification, NotificationAlert, NotificationEvent};
pub use order::Order;
pub use product::{Product, ProductCategory, ProductInput, ProductView};
pub use session::CurrentUser;
pub use user::{ProfileUpdate, User};
