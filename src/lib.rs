//! Palace - e-commerce backend
//!
//! Accounts, a product and service catalog, carts, orders, seller ratings
//! and M-Pesa payments behind a JSON API.
//!
//! # Modules
//!
//! - [`core_types`] - Id aliases and text enum helpers
//! - [`money`] - Decimal price and total arithmetic
//! - [`account`] - Users, passwords, JWT sessions
//! - [`catalog`] - Products, services and seller ratings
//! - [`cart`] - Per-user shopping carts and checkout
//! - [`orders`] - Order placement, listing and status
//! - [`payments`] - STK push and provider callbacks
//! - [`store`] - Storage trait with PostgreSQL and in-memory backends
//! - [`gateway`] - HTTP router, OpenAPI docs

// Core types - must be first!
pub mod core_types;

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod money;
pub mod notify;

// Domain
pub mod account;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod payments;

pub mod gateway;
pub mod store;

// Convenient re-exports at crate root
pub use core_types::{CartId, OrderId, ProductId, ServiceId, UserId};
pub use error::ServiceError;
pub use gateway::{build_router, state::AppState};
pub use store::{MemoryStore, PgStore, Store};
