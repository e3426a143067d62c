//! Store traits for data access
//!
//! Services depend on `Arc<dyn Store>` only. `PgStore` is the production
//! implementation; `MemoryStore` backs tests and the `--memory` dev mode.
//! Both keep the same invariants: cart totals are recomputed inside the
//! mutating call, and order placement is all-or-nothing.

pub mod memory;
pub mod postgres;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::account::models::{Role, User};
use crate::cart::models::{Cart, CartItem};
use crate::catalog::models::{ListingFilter, Product, ProductChanges, Rating, ServiceListing};
use crate::core_types::{CartItemId, OrderId, ProductId, ServiceId, UserId};
use crate::orders::models::{Order, OrderDraft, OrderLine, OrderStatus, PaymentStatus};
use crate::payments::models::{Payment, PaymentRequest, Recorded};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{0}")]
    Conflict(String),

    #[error("insufficient stock for '{name}' ({product_id}): requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        requested: i32,
        available: i32,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }
}

pub(crate) const CART_ALREADY_CHECKED_OUT: &str = "cart was already checked out";
pub(crate) const CART_CHANGED: &str = "cart changed during checkout, review it and retry";

/// Order lines a cart turns into: one per product, in product id order
pub fn cart_lines(items: &[CartItem]) -> Vec<OrderLine> {
    let mut merged: BTreeMap<_, i32> = BTreeMap::new();
    for item in items {
        let qty = merged.entry(item.product_id).or_insert(0);
        *qty = qty.saturating_add(item.quantity);
    }
    merged
        .into_iter()
        .map(|(product_id, quantity)| OrderLine {
            product_id,
            quantity,
        })
        .collect()
}

/// The consumed cart must still hold exactly the lines the draft was built from
pub(crate) fn check_consumed_cart(cart: Option<&Cart>, draft: &OrderDraft) -> StoreResult<()> {
    let cart = cart.ok_or_else(|| StoreError::Conflict(CART_ALREADY_CHECKED_OUT.to_string()))?;
    if cart_lines(&cart.items) != draft.lines {
        return Err(StoreError::Conflict(CART_CHANGED.to_string()));
    }
    Ok(())
}

pub type StoreResult<T> = Result<T, StoreError>;

// ============================================================================
// Users
// ============================================================================

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Conflict when the email or the (phone, role) pair is taken
    async fn insert_user(&self, user: &User) -> StoreResult<()>;

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>>;

    async fn find_user_by_phone(&self, phone: &str, role: Role) -> StoreResult<Option<User>>;

    /// User whose email and phone both match
    async fn find_user_by_contact(&self, email: &str, phone: &str) -> StoreResult<Option<User>>;

    async fn list_users(&self) -> StoreResult<Vec<User>>;

    /// Overwrite every mutable column. Same conflicts as `insert_user`.
    async fn save_user(&self, user: &User) -> StoreResult<()>;

    /// `User::check_reset_code` with the row locked, so concurrent guesses
    /// are each counted. NotFound when the user is gone.
    async fn verify_reset_code(
        &self,
        id: UserId,
        code: &str,
        now: DateTime<Utc>,
        max_attempts: i32,
    ) -> StoreResult<bool>;
}

// ============================================================================
// Catalog
// ============================================================================

/// Products and service listings. Deleted rows are invisible to `get_*` and
/// `list_*`.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_product(&self, product: &Product) -> StoreResult<()>;
    async fn get_product(&self, id: ProductId) -> StoreResult<Option<Product>>;
    /// Write only the changed columns and return the updated row
    async fn update_product(
        &self,
        id: ProductId,
        changes: &ProductChanges,
        at: DateTime<Utc>,
    ) -> StoreResult<Product>;
    /// Soft delete
    async fn delete_product(&self, id: ProductId, at: DateTime<Utc>) -> StoreResult<()>;
    async fn list_products(&self, filter: &ListingFilter) -> StoreResult<Vec<Product>>;

    async fn insert_service(&self, service: &ServiceListing) -> StoreResult<()>;
    async fn get_service(&self, id: ServiceId) -> StoreResult<Option<ServiceListing>>;
    async fn save_service(&self, service: &ServiceListing) -> StoreResult<()>;
    async fn delete_service(&self, id: ServiceId, at: DateTime<Utc>) -> StoreResult<()>;
    async fn list_services(&self, filter: &ListingFilter) -> StoreResult<Vec<ServiceListing>>;
}

#[async_trait]
pub trait RatingStore: Send + Sync {
    async fn insert_rating(&self, rating: &Rating) -> StoreResult<()>;

    /// Newest first, with the total row count for pagination
    async fn list_ratings(
        &self,
        seller_id: Option<UserId>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<Rating>, i64)>;
}

// ============================================================================
// Cart
// ============================================================================

/// Every mutation returns the cart with items and a recomputed total.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Creates the cart on first use; snapshots the product price
    async fn add_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> StoreResult<Cart>;

    async fn update_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> StoreResult<Cart>;

    async fn remove_cart_item(&self, user_id: UserId, item_id: CartItemId) -> StoreResult<Cart>;

    async fn get_cart(&self, user_id: UserId) -> StoreResult<Option<Cart>>;

    /// Returns false when the user had no cart
    async fn delete_cart(&self, user_id: UserId) -> StoreResult<bool>;
}

// ============================================================================
// Orders
// ============================================================================

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Atomically check stock, decrement it, and write the order with items.
    /// Deletes `draft.consume_cart` in the same unit; Conflict when that cart
    /// is gone or no longer holds `draft.lines`.
    async fn place_order(&self, draft: &OrderDraft) -> StoreResult<Order>;

    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>>;

    async fn get_order_by_number(&self, order_number: &str) -> StoreResult<Option<Order>>;

    /// Orders created in `[start, end)`, or all orders, oldest first
    async fn list_orders(
        &self,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> StoreResult<Vec<Order>>;

    /// Newest first
    async fn list_user_orders(&self, user_id: UserId) -> StoreResult<Vec<Order>>;

    /// Conflict when the order is already Delivered or Cancelled
    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        delivered_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Order>;

    /// Returns false when no order has this number
    async fn set_payment_status(
        &self,
        order_number: &str,
        status: PaymentStatus,
    ) -> StoreResult<bool>;
}

// ============================================================================
// Payments
// ============================================================================

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn insert_payment_request(&self, request: &PaymentRequest) -> StoreResult<()>;

    async fn find_payment_request(
        &self,
        checkout_request_id: &str,
    ) -> StoreResult<Option<PaymentRequest>>;

    /// Insert unless the transaction id is already recorded
    async fn record_payment(&self, payment: &Payment) -> StoreResult<Recorded>;

    async fn list_customer_payments(&self, customer_id: UserId) -> StoreResult<Vec<Payment>>;
}

/// Everything the services need
#[async_trait]
pub trait Store:
    UserStore + CatalogStore + RatingStore + CartStore + OrderStore + PaymentStore
{
    /// Cheap liveness check
    async fn ping(&self) -> StoreResult<()>;
}
