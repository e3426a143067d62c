use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::core_types::{CartId, CartItemId, ProductId, UserId};
use crate::money;

/// A user's single active cart
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Cart {
    #[schema(value_type = uuid::Uuid)]
    pub id: CartId,
    #[schema(value_type = uuid::Uuid)]
    pub user_id: UserId,
    /// Σ items.total_price
    #[schema(value_type = String, example = "40.00")]
    pub total_amount: Decimal,
    #[sqlx(skip)]
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Recompute `total_amount` from the items
    pub fn recompute_total(&mut self) {
        self.total_amount = money::sum_totals(self.items.iter().map(|i| i.total_price));
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct CartItem {
    #[schema(value_type = uuid::Uuid)]
    pub id: CartItemId,
    #[schema(value_type = uuid::Uuid)]
    pub cart_id: CartId,
    #[schema(value_type = uuid::Uuid)]
    pub product_id: ProductId,
    pub quantity: i32,
    /// Product price when the item was added
    #[schema(value_type = String)]
    pub price: Decimal,
    /// quantity × price
    #[schema(value_type = String)]
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl CartItem {
    pub fn set_quantity(&mut self, quantity: i32) {
        self.quantity = quantity;
        self.total_price = money::line_total(self.price, quantity);
    }
}

/// Cart as returned to the client. A user without a cart sees an empty one.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartView {
    #[schema(value_type = Option<uuid::Uuid>)]
    pub cart_id: Option<CartId>,
    #[schema(value_type = uuid::Uuid)]
    pub user_id: UserId,
    #[schema(value_type = String, example = "0")]
    pub total_amount: Decimal,
    pub items: Vec<CartItem>,
}

impl CartView {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            cart_id: None,
            user_id,
            total_amount: Decimal::ZERO,
            items: Vec::new(),
        }
    }
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        Self {
            cart_id: Some(cart.id),
            user_id: cart.user_id,
            total_amount: cart.total_amount,
            items: cart.items,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    #[schema(value_type = uuid::Uuid)]
    pub product_id: ProductId,
    #[schema(example = 2)]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    #[schema(example = 3)]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    #[schema(example = "Moi Avenue, Nairobi")]
    pub shipping_address: String,
    #[schema(example = "M-Pesa")]
    pub payment_method: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn item(price: i64, quantity: i32) -> CartItem {
        let price = Decimal::from(price);
        CartItem {
            id: Uuid::new_v4(),
            cart_id: Uuid::nil(),
            product_id: Uuid::new_v4(),
            quantity,
            price,
            total_price: money::line_total(price, quantity),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_recompute_total() {
        let now = Utc::now();
        let mut cart = Cart {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            total_amount: Decimal::ZERO,
            items: vec![item(10, 2), item(20, 1)],
            created_at: now,
            updated_at: now,
        };
        cart.recompute_total();
        assert_eq!(cart.total_amount, Decimal::from(40));

        cart.items[0].set_quantity(5);
        cart.recompute_total();
        assert_eq!(cart.items[0].total_price, Decimal::from(50));
        assert_eq!(cart.total_amount, Decimal::from(70));
    }

    #[test]
    fn test_empty_view() {
        let view = CartView::empty(Uuid::nil());
        assert!(view.cart_id.is_none());
        assert_eq!(view.total_amount, Decimal::ZERO);
        assert!(view.items.is_empty());
    }
}
