//! Order placement, queries and status changes
//!
//! Stock checks and decrements happen inside `OrderStore::place_order`; this
//! layer validates the request and shapes the lines so that every store sees
//! one line per product in product-id order.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;

use super::models::{
    Order, OrderDraft, OrderLine, OrderList, OrderListMeta, OrderListQuery, OrderStatus,
    PlaceOrderRequest,
};
use super::period;
use crate::account::AuthUser;
use crate::account::service::require_admin;
use crate::account::validation::required;
use crate::core_types::{CartId, OrderId, UserId};
use crate::error::ServiceError;
use crate::money;
use crate::store::Store;

/// `ORD-<unix nanos>`
pub fn generate_order_number() -> String {
    let now = Utc::now();
    let nanos = now
        .timestamp_nanos_opt()
        .unwrap_or_else(|| now.timestamp_micros() * 1_000);
    format!("ORD-{}", nanos)
}

/// Reject non-positive quantities, merge lines for the same product and sort
/// by product id so concurrent placements lock rows in the same order.
pub fn normalize_lines(lines: &[OrderLine]) -> Result<Vec<OrderLine>, ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::validation("order must contain at least one item"));
    }

    let mut merged = BTreeMap::new();
    for line in lines {
        if line.quantity <= 0 {
            return Err(ServiceError::validation("quantity must be greater than zero"));
        }
        let qty: &mut i32 = merged.entry(line.product_id).or_insert(0);
        *qty = qty
            .checked_add(line.quantity)
            .ok_or_else(|| ServiceError::validation("quantity too large"))?;
    }

    Ok(merged
        .into_iter()
        .map(|(product_id, quantity)| OrderLine {
            product_id,
            quantity,
        })
        .collect())
}

/// Build a validated draft. Shared by direct placement and cart checkout.
pub fn build_draft(
    user_id: UserId,
    lines: &[OrderLine],
    shipping_address: &str,
    payment_method: &str,
    consume_cart: Option<CartId>,
) -> Result<OrderDraft, ServiceError> {
    Ok(OrderDraft {
        user_id,
        order_number: generate_order_number(),
        lines: normalize_lines(lines)?,
        shipping_address: required(shipping_address, "shipping_address")?,
        payment_method: required(payment_method, "payment_method")?,
        consume_cart,
    })
}

pub struct OrderService {
    store: Arc<dyn Store>,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn place_order(
        &self,
        caller: &AuthUser,
        req: PlaceOrderRequest,
    ) -> Result<Order, ServiceError> {
        let draft = build_draft(
            caller.user_id,
            &req.items,
            &req.shipping_address,
            &req.payment_method,
            None,
        )?;
        self.submit(draft).await
    }

    /// Hand a draft to the store and log the outcome
    pub async fn submit(&self, draft: OrderDraft) -> Result<Order, ServiceError> {
        match self.store.place_order(&draft).await {
            Ok(order) => {
                tracing::info!(
                    "Order {} placed by {}: {} items, total {}",
                    order.order_number,
                    order.user_id,
                    order.items.len(),
                    order.total_amount
                );
                Ok(order)
            }
            Err(e) => {
                tracing::warn!("Order placement failed for {}: {}", draft.user_id, e);
                Err(e.into())
            }
        }
    }

    /// Admin report over a period
    pub async fn list_orders(
        &self,
        caller: &AuthUser,
        query: OrderListQuery,
    ) -> Result<OrderList, ServiceError> {
        require_admin(caller)?;
        let resolved = period::resolve(&query, Utc::now())?;
        let orders = self.store.list_orders(resolved.range).await?;

        let total_items = orders
            .iter()
            .flat_map(|o| o.items.iter())
            .map(|i| i64::from(i.quantity))
            .sum();
        let meta = OrderListMeta {
            period: resolved.period.to_string(),
            start_date: resolved.start_date,
            end_date: resolved.end_date,
            total_orders: orders.len(),
            total_items,
            total_revenue: money::sum_totals(orders.iter().map(|o| o.total_amount)),
        };
        Ok(OrderList { meta, orders })
    }

    pub async fn my_orders(&self, caller: &AuthUser) -> Result<Vec<Order>, ServiceError> {
        Ok(self.store.list_user_orders(caller.user_id).await?)
    }

    /// Owner or admin. Other users get 404 so order ids cannot be enumerated.
    pub async fn get_order(&self, caller: &AuthUser, id: OrderId) -> Result<Order, ServiceError> {
        let order = self
            .store
            .get_order(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("order not found"))?;
        if !caller.can_act_for(order.user_id) {
            return Err(ServiceError::not_found("order not found"));
        }
        Ok(order)
    }

    /// Admin only. `Delivered` stamps `delivered_at`.
    pub async fn update_status(
        &self,
        caller: &AuthUser,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, ServiceError> {
        require_admin(caller)?;
        let delivered_at = (status == OrderStatus::Delivered).then(Utc::now);
        let order = self
            .store
            .update_order_status(id, status, delivered_at)
            .await?;
        tracing::info!(
            "Order {} status set to {} by {}",
            order.order_number,
            status,
            caller.user_id
        );
        Ok(order)
    }
}
