//! In-memory store
//!
//! One mutex guards all state, so every trait call is atomic. Order placement
//! validates every line before touching stock, which gives the same
//! all-or-nothing result as the PostgreSQL transaction.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    CartStore, CatalogStore, OrderStore, PaymentStore, RatingStore, Store, StoreError,
    StoreResult, UserStore, check_consumed_cart,
};
use crate::account::models::{Role, User};
use crate::cart::models::{Cart, CartItem};
use crate::catalog::models::{
    ListingFilter, Product, ProductChanges, Rating, ServiceListing, SortOrder,
};
use crate::core_types::{CartItemId, OrderId, ProductId, ServiceId, UserId};
use crate::money;
use crate::orders::models::{Order, OrderDraft, OrderItem, OrderStatus, PaymentStatus};
use crate::payments::models::{Payment, PaymentRequest, Recorded};

const EMAIL_TAKEN: &str = "email already registered";
const PHONE_TAKEN: &str = "phone number already registered for this role";

#[derive(Default)]
struct State {
    users: HashMap<UserId, User>,
    products: HashMap<ProductId, Product>,
    services: HashMap<ServiceId, ServiceListing>,
    ratings: Vec<Rating>,
    /// keyed by owner
    carts: HashMap<UserId, Cart>,
    orders: Vec<Order>,
    payment_requests: HashMap<String, PaymentRequest>,
    payments: Vec<Payment>,
}

impl State {
    fn check_user_unique(&self, user: &User) -> StoreResult<()> {
        for other in self.users.values().filter(|u| u.id != user.id) {
            if other.email == user.email {
                return Err(StoreError::Conflict(EMAIL_TAKEN.to_string()));
            }
            if other.phone_number == user.phone_number && other.role == user.role {
                return Err(StoreError::Conflict(PHONE_TAKEN.to_string()));
            }
        }
        Ok(())
    }

    /// Product that can be put in a cart or ordered
    fn available_product(&self, id: ProductId) -> StoreResult<&Product> {
        self.products
            .get(&id)
            .filter(|p| p.deleted_at.is_none() && p.is_active)
            .ok_or(StoreError::not_found("product"))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock leaves the maps intact
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn matches_listing(
    filter: &ListingFilter,
    seller_id: UserId,
    category: &str,
    price: rust_decimal::Decimal,
    name: &str,
    description: &str,
    is_active: bool,
) -> bool {
    if !filter.include_inactive && !is_active {
        return false;
    }
    if !filter.categories.is_empty() && !filter.categories.iter().any(|c| c == category) {
        return false;
    }
    if filter.min_price.is_some_and(|min| price < min) {
        return false;
    }
    if filter.max_price.is_some_and(|max| price > max) {
        return false;
    }
    if filter.seller_id.is_some_and(|s| s != seller_id) {
        return false;
    }
    if let Some(search) = &filter.search {
        let needle = search.to_lowercase();
        if !name.to_lowercase().contains(&needle) && !description.to_lowercase().contains(&needle)
        {
            return false;
        }
    }
    true
}

/// Random falls back to newest; the catalog service shuffles.
fn sort_listings<T>(
    rows: &mut [T],
    sort: SortOrder,
    key: impl Fn(&T) -> (rust_decimal::Decimal, DateTime<Utc>),
) {
    match sort {
        SortOrder::PriceAsc => rows.sort_by(|a, b| key(a).0.cmp(&key(b).0)),
        SortOrder::PriceDesc => rows.sort_by(|a, b| key(b).0.cmp(&key(a).0)),
        SortOrder::Newest | SortOrder::Random => rows.sort_by(|a, b| key(b).1.cmp(&key(a).1)),
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut state = self.state();
        state.check_user_unique(user)?;
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.state().users.get(&id).cloned())
    }

    async fn find_user_by_phone(&self, phone: &str, role: Role) -> StoreResult<Option<User>> {
        Ok(self
            .state()
            .users
            .values()
            .find(|u| u.phone_number == phone && u.role == role)
            .cloned())
    }

    async fn find_user_by_contact(&self, email: &str, phone: &str) -> StoreResult<Option<User>> {
        Ok(self
            .state()
            .users
            .values()
            .find(|u| u.email == email && u.phone_number == phone)
            .cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.state().users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn save_user(&self, user: &User) -> StoreResult<()> {
        let mut state = self.state();
        if !state.users.contains_key(&user.id) {
            return Err(StoreError::not_found("user"));
        }
        state.check_user_unique(user)?;
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn verify_reset_code(
        &self,
        id: UserId,
        code: &str,
        now: DateTime<Utc>,
        max_attempts: i32,
    ) -> StoreResult<bool> {
        let mut state = self.state();
        let user = state
            .users
            .get_mut(&id)
            .ok_or(StoreError::not_found("user"))?;
        Ok(user.check_reset_code(code, now, max_attempts))
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_product(&self, product: &Product) -> StoreResult<()> {
        self.state().products.insert(product.id, product.clone());
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        Ok(self
            .state()
            .products
            .get(&id)
            .filter(|p| p.deleted_at.is_none())
            .cloned())
    }

    async fn update_product(
        &self,
        id: ProductId,
        changes: &ProductChanges,
        at: DateTime<Utc>,
    ) -> StoreResult<Product> {
        let mut state = self.state();
        match state.products.get_mut(&id) {
            Some(existing) if existing.deleted_at.is_none() => {
                changes.apply(existing, at);
                Ok(existing.clone())
            }
            _ => Err(StoreError::not_found("product")),
        }
    }

    async fn delete_product(&self, id: ProductId, at: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.state();
        match state.products.get_mut(&id) {
            Some(p) if p.deleted_at.is_none() => {
                p.deleted_at = Some(at);
                p.updated_at = at;
                Ok(())
            }
            _ => Err(StoreError::not_found("product")),
        }
    }

    async fn list_products(&self, filter: &ListingFilter) -> StoreResult<Vec<Product>> {
        let mut rows: Vec<Product> = self
            .state()
            .products
            .values()
            .filter(|p| p.deleted_at.is_none())
            .filter(|p| {
                matches_listing(
                    filter,
                    p.seller_id,
                    &p.category,
                    p.price,
                    &p.name,
                    &p.description,
                    p.is_active,
                )
            })
            .cloned()
            .collect();
        sort_listings(&mut rows, filter.sort, |p| (p.price, p.created_at));
        Ok(rows)
    }

    async fn insert_service(&self, service: &ServiceListing) -> StoreResult<()> {
        self.state().services.insert(service.id, service.clone());
        Ok(())
    }

    async fn get_service(&self, id: ServiceId) -> StoreResult<Option<ServiceListing>> {
        Ok(self
            .state()
            .services
            .get(&id)
            .filter(|s| s.deleted_at.is_none())
            .cloned())
    }

    async fn save_service(&self, service: &ServiceListing) -> StoreResult<()> {
        let mut state = self.state();
        match state.services.get_mut(&service.id) {
            Some(existing) if existing.deleted_at.is_none() => {
                *existing = service.clone();
                Ok(())
            }
            _ => Err(StoreError::not_found("service")),
        }
    }

    async fn delete_service(&self, id: ServiceId, at: DateTime<Utc>) -> StoreResult<()> {
        let mut state = self.state();
        match state.services.get_mut(&id) {
            Some(s) if s.deleted_at.is_none() => {
                s.deleted_at = Some(at);
                s.updated_at = at;
                Ok(())
            }
            _ => Err(StoreError::not_found("service")),
        }
    }

    async fn list_services(&self, filter: &ListingFilter) -> StoreResult<Vec<ServiceListing>> {
        let mut rows: Vec<ServiceListing> = self
            .state()
            .services
            .values()
            .filter(|s| s.deleted_at.is_none())
            .filter(|s| {
                matches_listing(
                    filter,
                    s.seller_id,
                    &s.category,
                    s.price,
                    &s.name,
                    &s.description,
                    s.is_active,
                )
            })
            .cloned()
            .collect();
        sort_listings(&mut rows, filter.sort, |s| (s.price, s.created_at));
        Ok(rows)
    }
}

#[async_trait]
impl RatingStore for MemoryStore {
    async fn insert_rating(&self, rating: &Rating) -> StoreResult<()> {
        self.state().ratings.push(rating.clone());
        Ok(())
    }

    async fn list_ratings(
        &self,
        seller_id: Option<UserId>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<Rating>, i64)> {
        let state = self.state();
        let mut rows: Vec<&Rating> = state
            .ratings
            .iter()
            .filter(|r| seller_id.is_none_or(|s| r.seller_id == s))
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = rows.len() as i64;
        let page = rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn add_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> StoreResult<Cart> {
        let mut state = self.state();
        let price = state.available_product(product_id)?.price;
        let now = Utc::now();

        let cart = state.carts.entry(user_id).or_insert_with(|| Cart {
            id: Uuid::new_v4(),
            user_id,
            total_amount: rust_decimal::Decimal::ZERO,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        });
        cart.items.push(CartItem {
            id: Uuid::new_v4(),
            cart_id: cart.id,
            product_id,
            quantity,
            price,
            total_price: money::line_total(price, quantity),
            created_at: now,
        });
        cart.recompute_total();
        cart.updated_at = now;
        Ok(cart.clone())
    }

    async fn update_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> StoreResult<Cart> {
        let mut state = self.state();
        let cart = state
            .carts
            .get_mut(&user_id)
            .ok_or(StoreError::not_found("cart item"))?;
        let item = cart
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or(StoreError::not_found("cart item"))?;
        item.set_quantity(quantity);
        cart.recompute_total();
        cart.updated_at = Utc::now();
        Ok(cart.clone())
    }

    async fn remove_cart_item(&self, user_id: UserId, item_id: CartItemId) -> StoreResult<Cart> {
        let mut state = self.state();
        let cart = state
            .carts
            .get_mut(&user_id)
            .ok_or(StoreError::not_found("cart item"))?;
        let before = cart.items.len();
        cart.items.retain(|i| i.id != item_id);
        if cart.items.len() == before {
            return Err(StoreError::not_found("cart item"));
        }
        cart.recompute_total();
        cart.updated_at = Utc::now();
        Ok(cart.clone())
    }

    async fn get_cart(&self, user_id: UserId) -> StoreResult<Option<Cart>> {
        Ok(self.state().carts.get(&user_id).cloned())
    }

    async fn delete_cart(&self, user_id: UserId) -> StoreResult<bool> {
        Ok(self.state().carts.remove(&user_id).is_some())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn place_order(&self, draft: &OrderDraft) -> StoreResult<Order> {
        let mut state = self.state();

        if let Some(cart_id) = draft.consume_cart {
            let cart = state.carts.get(&draft.user_id).filter(|c| c.id == cart_id);
            check_consumed_cart(cart, draft)?;
        }

        // Validate every line before mutating anything
        let mut priced = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            let product = state.available_product(line.product_id)?;
            if product.stock < line.quantity {
                return Err(StoreError::InsufficientStock {
                    product_id: product.id,
                    name: product.name.clone(),
                    requested: line.quantity,
                    available: product.stock,
                });
            }
            priced.push((line, product.price));
        }

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let items: Vec<OrderItem> = priced
            .iter()
            .map(|(line, price)| OrderItem {
                id: Uuid::new_v4(),
                order_id,
                product_id: line.product_id,
                quantity: line.quantity,
                price: *price,
                total_price: money::line_total(*price, line.quantity),
            })
            .collect();

        for item in &items {
            if let Some(p) = state.products.get_mut(&item.product_id) {
                p.stock -= item.quantity;
                p.updated_at = now;
            }
        }

        let order = Order {
            id: order_id,
            order_number: draft.order_number.clone(),
            user_id: draft.user_id,
            total_amount: money::sum_totals(items.iter().map(|i| i.total_price)),
            payment_status: PaymentStatus::Pending,
            payment_method: draft.payment_method.clone(),
            shipping_address: draft.shipping_address.clone(),
            order_status: OrderStatus::Processing,
            delivered_at: None,
            items,
            created_at: now,
            updated_at: now,
        };
        state.orders.push(order.clone());

        if draft.consume_cart.is_some() {
            state.carts.remove(&draft.user_id);
        }

        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.state().orders.iter().find(|o| o.id == id).cloned())
    }

    async fn get_order_by_number(&self, order_number: &str) -> StoreResult<Option<Order>> {
        Ok(self
            .state()
            .orders
            .iter()
            .find(|o| o.order_number == order_number)
            .cloned())
    }

    async fn list_orders(
        &self,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .state()
            .orders
            .iter()
            .filter(|o| range.is_none_or(|(start, end)| o.created_at >= start && o.created_at < end))
            .cloned()
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn list_user_orders(&self, user_id: UserId) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .state()
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        delivered_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Order> {
        let mut state = self.state();
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(StoreError::not_found("order"))?;
        if order.order_status.is_final() {
            return Err(StoreError::Conflict(format!(
                "order is already {}",
                order.order_status
            )));
        }
        order.order_status = status;
        if delivered_at.is_some() {
            order.delivered_at = delivered_at;
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn set_payment_status(
        &self,
        order_number: &str,
        status: PaymentStatus,
    ) -> StoreResult<bool> {
        let mut state = self.state();
        match state
            .orders
            .iter_mut()
            .find(|o| o.order_number == order_number)
        {
            Some(order) => {
                order.payment_status = status;
                order.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn insert_payment_request(&self, request: &PaymentRequest) -> StoreResult<()> {
        let mut state = self.state();
        if state
            .payment_requests
            .contains_key(&request.checkout_request_id)
        {
            return Err(StoreError::Conflict(
                "checkout request already recorded".to_string(),
            ));
        }
        state
            .payment_requests
            .insert(request.checkout_request_id.clone(), request.clone());
        Ok(())
    }

    async fn find_payment_request(
        &self,
        checkout_request_id: &str,
    ) -> StoreResult<Option<PaymentRequest>> {
        Ok(self
            .state()
            .payment_requests
            .get(checkout_request_id)
            .cloned())
    }

    async fn record_payment(&self, payment: &Payment) -> StoreResult<Recorded> {
        let mut state = self.state();
        if let Some(existing) = state
            .payments
            .iter()
            .find(|p| p.transaction_id == payment.transaction_id)
        {
            return Ok(Recorded::Duplicate(existing.clone()));
        }
        state.payments.push(payment.clone());
        Ok(Recorded::New(payment.clone()))
    }

    async fn list_customer_payments(&self, customer_id: UserId) -> StoreResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .state()
            .payments
            .iter()
            .filter(|p| p.customer_id == Some(customer_id))
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::models::OrderLine;
    use crate::store::{CART_ALREADY_CHECKED_OUT, CART_CHANGED, cart_lines};
    use rust_decimal::Decimal;

    fn user(email: &str, phone: &str, role: Role) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            first_name: "Test".into(),
            last_name: "User".into(),
            email: email.into(),
            password_hash: "hash".into(),
            address: None,
            city: None,
            postal_code: None,
            location: None,
            phone_number: phone.into(),
            role,
            is_active: true,
            reset_code: None,
            reset_code_expires_at: None,
            reset_attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn product(seller_id: UserId, price: i64, stock: i32) -> Product {
        let now = Utc::now();
        Product {
            id: Uuid::new_v4(),
            seller_id,
            name: format!("Item {}", price),
            description: String::new(),
            price: Decimal::from(price),
            category: "general".into(),
            stock,
            image_url: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn draft(user_id: UserId, lines: Vec<OrderLine>) -> OrderDraft {
        OrderDraft {
            user_id,
            order_number: format!("ORD-{}", Uuid::new_v4().simple()),
            lines,
            shipping_address: "Nairobi".into(),
            payment_method: "M-Pesa".into(),
            consume_cart: None,
        }
    }

    #[tokio::test]
    async fn test_user_uniqueness() {
        let store = MemoryStore::new();
        store
            .insert_user(&user("a@x.com", "254700000001", Role::Customer))
            .await
            .unwrap();

        let same_email = user("a@x.com", "254700000002", Role::Customer);
        assert!(matches!(
            store.insert_user(&same_email).await,
            Err(StoreError::Conflict(_))
        ));

        let same_phone_role = user("b@x.com", "254700000001", Role::Customer);
        assert!(matches!(
            store.insert_user(&same_phone_role).await,
            Err(StoreError::Conflict(_))
        ));

        // Same phone, different role is a separate account
        let seller = user("c@x.com", "254700000001", Role::Seller);
        assert!(store.insert_user(&seller).await.is_ok());
    }

    #[tokio::test]
    async fn test_place_order_all_or_nothing() {
        let store = MemoryStore::new();
        let seller = Uuid::new_v4();
        let a = product(seller, 10, 5);
        let b = product(seller, 20, 1);
        store.insert_product(&a).await.unwrap();
        store.insert_product(&b).await.unwrap();

        let result = store
            .place_order(&draft(
                Uuid::new_v4(),
                vec![
                    OrderLine {
                        product_id: a.id,
                        quantity: 2,
                    },
                    OrderLine {
                        product_id: b.id,
                        quantity: 2,
                    },
                ],
            ))
            .await;
        assert!(matches!(result, Err(StoreError::InsufficientStock { .. })));

        assert_eq!(store.get_product(a.id).await.unwrap().unwrap().stock, 5);
        assert_eq!(store.get_product(b.id).await.unwrap().unwrap().stock, 1);
        assert!(store.list_orders(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cart_totals_follow_mutations() {
        let store = MemoryStore::new();
        let seller = Uuid::new_v4();
        let a = product(seller, 10, 5);
        let b = product(seller, 20, 5);
        store.insert_product(&a).await.unwrap();
        store.insert_product(&b).await.unwrap();
        let owner = Uuid::new_v4();

        store.add_cart_item(owner, a.id, 2).await.unwrap();
        let cart = store.add_cart_item(owner, b.id, 1).await.unwrap();
        assert_eq!(cart.total_amount, Decimal::from(40));

        let item_a = cart.items[0].id;
        let cart = store.update_cart_item(owner, item_a, 3).await.unwrap();
        assert_eq!(cart.total_amount, Decimal::from(50));

        let cart = store.remove_cart_item(owner, item_a).await.unwrap();
        assert_eq!(cart.total_amount, Decimal::from(20));

        // Another user's item id is not reachable
        assert!(matches!(
            store.remove_cart_item(Uuid::new_v4(), cart.items[0].id).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_deleted_product_cannot_be_added() {
        let store = MemoryStore::new();
        let p = product(Uuid::new_v4(), 10, 5);
        store.insert_product(&p).await.unwrap();
        store.delete_product(p.id, Utc::now()).await.unwrap();

        assert!(store.get_product(p.id).await.unwrap().is_none());
        assert!(matches!(
            store.add_cart_item(Uuid::new_v4(), p.id, 1).await,
            Err(StoreError::NotFound { entity: "product" })
        ));
    }

    #[tokio::test]
    async fn test_final_order_status() {
        let store = MemoryStore::new();
        let p = product(Uuid::new_v4(), 10, 5);
        store.insert_product(&p).await.unwrap();
        let order = store
            .place_order(&draft(
                Uuid::new_v4(),
                vec![OrderLine {
                    product_id: p.id,
                    quantity: 1,
                }],
            ))
            .await
            .unwrap();

        store
            .update_order_status(order.id, OrderStatus::Cancelled, None)
            .await
            .unwrap();
        assert!(matches!(
            store
                .update_order_status(order.id, OrderStatus::Shipped, None)
                .await,
            Err(StoreError::Conflict(_))
        ));
    }

    fn checkout_draft(cart: &Cart) -> OrderDraft {
        OrderDraft {
            consume_cart: Some(cart.id),
            ..draft(cart.user_id, cart_lines(&cart.items))
        }
    }

    #[tokio::test]
    async fn test_cart_checks_out_once() {
        let store = MemoryStore::new();
        let p = product(Uuid::new_v4(), 10, 10);
        store.insert_product(&p).await.unwrap();
        let owner = Uuid::new_v4();
        let cart = store.add_cart_item(owner, p.id, 2).await.unwrap();

        // Two checkouts built from the same cart snapshot
        let first = checkout_draft(&cart);
        let second = checkout_draft(&cart);

        assert!(store.place_order(&first).await.is_ok());
        assert!(matches!(
            store.place_order(&second).await,
            Err(StoreError::Conflict(ref m)) if m == CART_ALREADY_CHECKED_OUT
        ));

        assert_eq!(store.list_orders(None).await.unwrap().len(), 1);
        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().stock, 8);
        assert!(store.get_cart(owner).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_checkout_rejects_cart_changed_after_read() {
        let store = MemoryStore::new();
        let seller = Uuid::new_v4();
        let a = product(seller, 10, 10);
        let b = product(seller, 20, 10);
        store.insert_product(&a).await.unwrap();
        store.insert_product(&b).await.unwrap();
        let owner = Uuid::new_v4();
        let snapshot = store.add_cart_item(owner, a.id, 1).await.unwrap();

        store.add_cart_item(owner, b.id, 3).await.unwrap();

        assert!(matches!(
            store.place_order(&checkout_draft(&snapshot)).await,
            Err(StoreError::Conflict(ref m)) if m == CART_CHANGED
        ));
        let cart = store.get_cart(owner).await.unwrap().unwrap();
        assert_eq!(cart.items.len(), 2);
        assert_eq!(store.get_product(a.id).await.unwrap().unwrap().stock, 10);
        assert!(store.list_orders(None).await.unwrap().is_empty());
    }

    #[test]
    fn test_cart_lines_merge_per_product() {
        let owner = Uuid::new_v4();
        let p = Uuid::new_v4();
        let now = Utc::now();
        let item = |quantity| CartItem {
            id: Uuid::new_v4(),
            cart_id: owner,
            product_id: p,
            quantity,
            price: Decimal::from(5),
            total_price: Decimal::from(5 * quantity),
            created_at: now,
        };
        assert_eq!(
            cart_lines(&[item(1), item(2)]),
            vec![OrderLine {
                product_id: p,
                quantity: 3
            }]
        );
    }

    #[tokio::test]
    async fn test_product_edit_keeps_concurrent_stock_decrement() {
        let store = MemoryStore::new();
        let p = product(Uuid::new_v4(), 10, 5);
        store.insert_product(&p).await.unwrap();

        // Seller's edit form was loaded before the order committed
        let loaded = store.get_product(p.id).await.unwrap().unwrap();
        store
            .place_order(&draft(
                Uuid::new_v4(),
                vec![OrderLine {
                    product_id: p.id,
                    quantity: 3,
                }],
            ))
            .await
            .unwrap();

        let changes = ProductChanges {
            price: Some(loaded.price + Decimal::from(5)),
            ..Default::default()
        };
        let updated = store.update_product(p.id, &changes, Utc::now()).await.unwrap();
        assert_eq!(updated.stock, 2);
        assert_eq!(updated.price, Decimal::from(15));
        assert_eq!(store.get_product(p.id).await.unwrap().unwrap().stock, 2);
    }
}
