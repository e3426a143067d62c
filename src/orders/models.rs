use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use crate::core_types::{CartId, OrderId, ProductId, UserId, text_enum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
}

text_enum!(PaymentStatus, "payment status", {
    Pending => "Pending",
    Paid => "Paid",
    Failed => "Failed",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub enum OrderStatus {
    #[default]
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

text_enum!(OrderStatus, "order status", {
    Processing => "Processing",
    Shipped => "Shipped",
    Delivered => "Delivered",
    Cancelled => "Cancelled",
});

impl OrderStatus {
    /// No further transitions out of a final status
    pub fn is_final(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

/// Immutable purchase record; only the status fields change after creation.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Order {
    #[schema(value_type = uuid::Uuid)]
    pub id: OrderId,
    #[schema(example = "ORD-1718000000000000000")]
    pub order_number: String,
    #[schema(value_type = uuid::Uuid)]
    pub user_id: UserId,
    #[schema(value_type = String)]
    pub total_amount: Decimal,
    #[sqlx(try_from = "String")]
    pub payment_status: PaymentStatus,
    pub payment_method: String,
    pub shipping_address: String,
    #[sqlx(try_from = "String")]
    pub order_status: OrderStatus,
    pub delivered_at: Option<DateTime<Utc>>,
    #[sqlx(skip)]
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct OrderItem {
    pub id: uuid::Uuid,
    #[schema(value_type = uuid::Uuid)]
    pub order_id: OrderId,
    #[schema(value_type = uuid::Uuid)]
    pub product_id: ProductId,
    pub quantity: i32,
    /// Product price at placement
    #[schema(value_type = String)]
    pub price: Decimal,
    #[schema(value_type = String)]
    pub total_price: Decimal,
}

/// One requested line
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct OrderLine {
    #[schema(value_type = uuid::Uuid)]
    pub product_id: ProductId,
    #[schema(example = 1)]
    pub quantity: i32,
}

/// Validated input for `OrderStore::place_order`.
///
/// Lines are already merged per product and sorted by product id.
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub user_id: UserId,
    pub order_number: String,
    pub lines: Vec<OrderLine>,
    pub shipping_address: String,
    pub payment_method: String,
    /// Cart deleted in the same transaction (checkout)
    pub consume_cart: Option<CartId>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PlaceOrderRequest {
    pub items: Vec<OrderLine>,
    #[schema(example = "Moi Avenue, Nairobi")]
    pub shipping_address: String,
    #[schema(example = "M-Pesa")]
    pub payment_method: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub order_status: OrderStatus,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    /// today | yesterday | week | month | custom
    pub period: Option<String>,
    /// YYYY-MM-DD, with period=custom
    pub from: Option<String>,
    /// YYYY-MM-DD inclusive, with period=custom
    pub to: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderListMeta {
    pub period: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_orders: usize,
    pub total_items: i64,
    #[schema(value_type = String)]
    pub total_revenue: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub meta: OrderListMeta,
    pub orders: Vec<Order>,
}
