//! Cart operations for the calling user
//!
//! Each user has at most one cart. It is created by the first add and
//! removed entirely by clear or checkout.

use std::sync::Arc;

use super::models::{AddToCartRequest, CartView, CheckoutRequest};
use crate::account::AuthUser;
use crate::core_types::CartItemId;
use crate::error::ServiceError;
use crate::orders::OrderService;
use crate::orders::models::{Order, OrderLine};
use crate::orders::service::build_draft;
use crate::store::Store;

fn validate_quantity(quantity: i32) -> Result<i32, ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::validation("quantity must be greater than zero"));
    }
    Ok(quantity)
}

pub struct CartService {
    store: Arc<dyn Store>,
    orders: Arc<OrderService>,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>, orders: Arc<OrderService>) -> Self {
        Self { store, orders }
    }

    pub async fn add_item(
        &self,
        caller: &AuthUser,
        req: AddToCartRequest,
    ) -> Result<CartView, ServiceError> {
        let quantity = validate_quantity(req.quantity)?;
        let cart = self
            .store
            .add_cart_item(caller.user_id, req.product_id, quantity)
            .await?;
        tracing::debug!(
            "Cart {} now has {} items, total {}",
            cart.id,
            cart.items.len(),
            cart.total_amount
        );
        Ok(cart.into())
    }

    pub async fn update_item(
        &self,
        caller: &AuthUser,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        let quantity = validate_quantity(quantity)?;
        let cart = self
            .store
            .update_cart_item(caller.user_id, item_id, quantity)
            .await?;
        Ok(cart.into())
    }

    pub async fn remove_item(
        &self,
        caller: &AuthUser,
        item_id: CartItemId,
    ) -> Result<CartView, ServiceError> {
        let cart = self.store.remove_cart_item(caller.user_id, item_id).await?;
        Ok(cart.into())
    }

    /// An absent cart reads as empty
    pub async fn get_cart(&self, caller: &AuthUser) -> Result<CartView, ServiceError> {
        Ok(self
            .store
            .get_cart(caller.user_id)
            .await?
            .map(CartView::from)
            .unwrap_or_else(|| CartView::empty(caller.user_id)))
    }

    pub async fn clear(&self, caller: &AuthUser) -> Result<(), ServiceError> {
        if self.store.delete_cart(caller.user_id).await? {
            tracing::info!("Cart cleared for {}", caller.user_id);
        }
        Ok(())
    }

    /// Turn the cart into an order at current product prices; the cart is
    /// deleted in the same store call.
    pub async fn checkout(
        &self,
        caller: &AuthUser,
        req: CheckoutRequest,
    ) -> Result<Order, ServiceError> {
        let cart = self
            .store
            .get_cart(caller.user_id)
            .await?
            .filter(|c| !c.items.is_empty())
            .ok_or_else(|| ServiceError::validation("cart is empty"))?;

        let lines: Vec<OrderLine> = cart
            .items
            .iter()
            .map(|item| OrderLine {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect();

        let draft = build_draft(
            caller.user_id,
            &lines,
            &req.shipping_address,
            &req.payment_method,
            Some(cart.id),
        )?;
        self.orders.submit(draft).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Role;
    use crate::catalog::models::Product;
    use crate::store::{CatalogStore, MemoryStore};
    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn caller() -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role: Role::Customer,
            token_id: "t".into(),
            expires_at: Utc::now() + Duration::hours(1),
        }
    }

    async fn product(store: &MemoryStore, price: i64, stock: i32) -> Product {
        let now = Utc::now();
        let p = Product {
            id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            name: "Item".into(),
            description: String::new(),
            price: Decimal::from(price),
            category: "misc".into(),
            stock,
            image_url: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        store.insert_product(&p).await.unwrap();
        p
    }

    fn service(store: Arc<MemoryStore>) -> CartService {
        let orders = Arc::new(OrderService::new(store.clone()));
        CartService::new(store, orders)
    }

    #[tokio::test]
    async fn test_totals_follow_every_mutation() {
        let store = Arc::new(MemoryStore::new());
        let a = product(&store, 10, 10).await;
        let b = product(&store, 20, 10).await;
        let svc = service(store);
        let user = caller();

        svc.add_item(&user, AddToCartRequest { product_id: a.id, quantity: 2 })
            .await
            .unwrap();
        let cart = svc
            .add_item(&user, AddToCartRequest { product_id: b.id, quantity: 1 })
            .await
            .unwrap();
        assert_eq!(cart.total_amount, Decimal::from(40));

        let first = cart.items.iter().find(|i| i.product_id == a.id).unwrap().id;
        let cart = svc.update_item(&user, first, 5).await.unwrap();
        assert_eq!(cart.total_amount, Decimal::from(70));

        let cart = svc.remove_item(&user, first).await.unwrap();
        assert_eq!(cart.total_amount, Decimal::from(20));
        assert_eq!(cart.items.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_quantities_and_unknown_items() {
        let store = Arc::new(MemoryStore::new());
        let a = product(&store, 10, 10).await;
        let svc = service(store);
        let user = caller();

        assert!(matches!(
            svc.add_item(&user, AddToCartRequest { product_id: a.id, quantity: 0 }).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            svc.add_item(&user, AddToCartRequest { product_id: Uuid::new_v4(), quantity: 1 }).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            svc.remove_item(&user, Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_items_are_scoped_to_owner() {
        let store = Arc::new(MemoryStore::new());
        let a = product(&store, 10, 10).await;
        let svc = service(store);
        let owner = caller();
        let other = caller();

        let cart = svc
            .add_item(&owner, AddToCartRequest { product_id: a.id, quantity: 1 })
            .await
            .unwrap();
        let item = cart.items[0].id;
        assert!(matches!(
            svc.update_item(&other, item, 3).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_get_and_clear() {
        let store = Arc::new(MemoryStore::new());
        let a = product(&store, 10, 10).await;
        let svc = service(store);
        let user = caller();

        let empty = svc.get_cart(&user).await.unwrap();
        assert!(empty.cart_id.is_none());
        assert_eq!(empty.total_amount, Decimal::ZERO);

        svc.add_item(&user, AddToCartRequest { product_id: a.id, quantity: 1 })
            .await
            .unwrap();
        svc.clear(&user).await.unwrap();
        assert!(svc.get_cart(&user).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_checkout_consumes_cart() {
        let store = Arc::new(MemoryStore::new());
        let a = product(&store, 10, 10).await;
        let svc = service(store.clone());
        let user = caller();

        let req = || CheckoutRequest {
            shipping_address: "Moi Avenue".into(),
            payment_method: "M-Pesa".into(),
        };
        assert!(matches!(
            svc.checkout(&user, req()).await,
            Err(ServiceError::Validation(_))
        ));

        svc.add_item(&user, AddToCartRequest { product_id: a.id, quantity: 2 })
            .await
            .unwrap();
        svc.add_item(&user, AddToCartRequest { product_id: a.id, quantity: 1 })
            .await
            .unwrap();
        let order = svc.checkout(&user, req()).await.unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 3);
        assert_eq!(order.total_amount, Decimal::from(30));

        assert!(svc.get_cart(&user).await.unwrap().cart_id.is_none());
        assert_eq!(store.get_product(a.id).await.unwrap().unwrap().stock, 7);
    }

    #[tokio::test]
    async fn test_failed_checkout_keeps_cart() {
        let store = Arc::new(MemoryStore::new());
        let a = product(&store, 10, 1).await;
        let svc = service(store);
        let user = caller();

        svc.add_item(&user, AddToCartRequest { product_id: a.id, quantity: 2 })
            .await
            .unwrap();
        let err = svc
            .checkout(
                &user,
                CheckoutRequest {
                    shipping_address: "Moi Avenue".into(),
                    payment_method: "M-Pesa".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(svc.get_cart(&user).await.unwrap().items.len(), 1);
    }
}
