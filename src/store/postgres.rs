//! PostgreSQL store
//!
//! Runtime-checked `sqlx` queries. Multi-row mutations run in one
//! transaction; returning early on error drops the transaction, which rolls
//! it back.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::{
    CART_ALREADY_CHECKED_OUT, CartStore, CatalogStore, OrderStore, PaymentStore, RatingStore,
    Store, StoreError, StoreResult, UserStore, check_consumed_cart,
};
use crate::account::models::{Role, User};
use crate::cart::models::Cart;
use crate::catalog::models::{
    ListingFilter, Product, ProductChanges, Rating, ServiceListing, SortOrder,
};
use crate::core_types::{CartId, CartItemId, OrderId, ProductId, ServiceId, UserId};
use crate::db::{Database, schema};
use crate::money;
use crate::orders::models::{Order, OrderDraft, OrderItem, OrderStatus, PaymentStatus};
use crate::payments::models::{Payment, PaymentRequest, Recorded};

const USER_COLUMNS: &str = "id, first_name, last_name, email, password_hash, address, city, \
     postal_code, location, phone_number, role, is_active, reset_code, reset_code_expires_at, \
     reset_attempts, created_at, updated_at";

const PRODUCT_COLUMNS: &str = "id, seller_id, name, description, price, category, stock, \
     image_url, is_active, created_at, updated_at, deleted_at";

const SERVICE_COLUMNS: &str = "id, seller_id, name, description, price, category, is_active, \
     created_at, updated_at, deleted_at";

const ORDER_COLUMNS: &str = "id, order_number, user_id, total_amount, payment_status, \
     payment_method, shipping_address, order_status, delivered_at, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, customer_id, amount, payment_method, transaction_id, \
     checkout_request_id, status, result_code, result_desc, customer_phone, account_reference, \
     transaction_date, created_at";

/// Map unique violations (SQLSTATE 23505) to `Conflict`
fn map_write_error(e: sqlx::Error) -> StoreError {
    let conflict = match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => Some(match db.constraint() {
            Some(schema::USERS_EMAIL_KEY) => "email already registered",
            Some(schema::USERS_PHONE_ROLE_KEY) => "phone number already registered for this role",
            Some(schema::PAYMENT_REQUESTS_CHECKOUT_KEY) => "checkout request already recorded",
            _ => "duplicate record",
        }),
        _ => None,
    };
    match conflict {
        Some(msg) => StoreError::Conflict(msg.to_string()),
        None => StoreError::Database(e),
    }
}

fn order_by(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::PriceAsc => "price ASC, created_at DESC",
        SortOrder::PriceDesc => "price DESC, created_at DESC",
        SortOrder::Newest | SortOrder::Random => "created_at DESC",
    }
}

/// `%term%` for ILIKE with the wildcard characters escaped
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Shared WHERE clause for product and service listings
const LISTING_WHERE: &str = "deleted_at IS NULL \
     AND ($1 OR is_active) \
     AND (cardinality($2::text[]) = 0 OR category = ANY($2)) \
     AND ($3::numeric IS NULL OR price >= $3) \
     AND ($4::numeric IS NULL OR price <= $4) \
     AND ($5::uuid IS NULL OR seller_id = $5) \
     AND ($6::text IS NULL OR name ILIKE $6 OR description ILIKE $6)";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    async fn load_cart(conn: &mut PgConnection, cart_id: CartId) -> StoreResult<Cart> {
        let mut cart: Cart = sqlx::query_as(
            "SELECT id, user_id, total_amount, created_at, updated_at FROM carts WHERE id = $1",
        )
        .bind(cart_id)
        .fetch_one(&mut *conn)
        .await?;

        cart.items = sqlx::query_as(
            "SELECT id, cart_id, product_id, quantity, price, total_price, created_at
             FROM cart_items WHERE cart_id = $1 ORDER BY created_at, id",
        )
        .bind(cart_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(cart)
    }

    /// Recompute the stored cart total from its items
    async fn refresh_cart_total(conn: &mut PgConnection, cart_id: CartId) -> StoreResult<()> {
        sqlx::query(
            "UPDATE carts
             SET total_amount = COALESCE((SELECT SUM(total_price) FROM cart_items WHERE cart_id = $1), 0),
                 updated_at = NOW()
             WHERE id = $1",
        )
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Lock the user's cart row; None when the user has no cart
    async fn lock_cart(conn: &mut PgConnection, user_id: UserId) -> StoreResult<Option<CartId>> {
        let id = sqlx::query_scalar("SELECT id FROM carts WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(id)
    }

    async fn attach_items(conn: &mut PgConnection, orders: &mut [Order]) -> StoreResult<()> {
        if orders.is_empty() {
            return Ok(());
        }
        let ids: Vec<OrderId> = orders.iter().map(|o| o.id).collect();
        let items: Vec<OrderItem> = sqlx::query_as(
            "SELECT id, order_id, product_id, quantity, price, total_price
             FROM order_items WHERE order_id = ANY($1) ORDER BY order_id, product_id",
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for item in items {
            by_order.entry(item.order_id).or_default().push(item);
        }
        for order in orders.iter_mut() {
            order.items = by_order.remove(&order.id).unwrap_or_default();
        }
        Ok(())
    }

    async fn fetch_order(conn: &mut PgConnection, id: OrderId) -> StoreResult<Option<Order>> {
        let order: Option<Order> =
            sqlx::query_as(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        match order {
            Some(order) => {
                let mut orders = [order];
                Self::attach_items(conn, &mut orders).await?;
                let [order] = orders;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (id, first_name, last_name, email, password_hash, address, city,
                 postal_code, location, phone_number, role, is_active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.address)
        .bind(&user.city)
        .bind(&user.postal_code)
        .bind(&user.location)
        .bind(&user.phone_number)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<User>> {
        let user = sqlx::query_as(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_phone(&self, phone: &str, role: Role) -> StoreResult<Option<User>> {
        let user = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE phone_number = $1 AND role = $2",
            USER_COLUMNS
        ))
        .bind(phone)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_contact(&self, email: &str, phone: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE email = $1 AND phone_number = $2 LIMIT 1",
            USER_COLUMNS
        ))
        .bind(email)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as(&format!(
            "SELECT {} FROM users ORDER BY created_at",
            USER_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    async fn save_user(&self, user: &User) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET first_name = $2, last_name = $3, email = $4, password_hash = $5,
                 address = $6, city = $7, postal_code = $8, location = $9, phone_number = $10,
                 role = $11, is_active = $12, reset_code = $13, reset_code_expires_at = $14,
                 reset_attempts = $15, updated_at = $16
             WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.address)
        .bind(&user.city)
        .bind(&user.postal_code)
        .bind(&user.location)
        .bind(&user.phone_number)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(&user.reset_code)
        .bind(user.reset_code_expires_at)
        .bind(user.reset_attempts)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("user"));
        }
        Ok(())
    }

    async fn verify_reset_code(
        &self,
        id: UserId,
        code: &str,
        now: DateTime<Utc>,
        max_attempts: i32,
    ) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let mut user: User = sqlx::query_as(&format!(
            "SELECT {} FROM users WHERE id = $1 FOR UPDATE",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::not_found("user"))?;

        let matched = user.check_reset_code(code, now, max_attempts);
        sqlx::query(
            "UPDATE users SET reset_code = $2, reset_code_expires_at = $3, reset_attempts = $4
             WHERE id = $1",
        )
        .bind(id)
        .bind(&user.reset_code)
        .bind(user.reset_code_expires_at)
        .bind(user.reset_attempts)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(matched)
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn insert_product(&self, p: &Product) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO products (id, seller_id, name, description, price, category, stock,
                 image_url, is_active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(p.id)
        .bind(p.seller_id)
        .bind(&p.name)
        .bind(&p.description)
        .bind(p.price)
        .bind(&p.category)
        .bind(p.stock)
        .bind(&p.image_url)
        .bind(p.is_active)
        .bind(p.created_at)
        .bind(p.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as(&format!(
            "SELECT {} FROM products WHERE id = $1 AND deleted_at IS NULL",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        c: &ProductChanges,
        at: DateTime<Utc>,
    ) -> StoreResult<Product> {
        let product = sqlx::query_as(&format!(
            "UPDATE products SET name = COALESCE($2, name),
                 description = COALESCE($3, description),
                 price = COALESCE($4, price),
                 category = COALESCE($5, category),
                 stock = COALESCE($6, stock),
                 image_url = CASE WHEN $7 THEN $8 ELSE image_url END,
                 is_active = COALESCE($9, is_active),
                 updated_at = $10
             WHERE id = $1 AND deleted_at IS NULL
             RETURNING {}",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(&c.name)
        .bind(&c.description)
        .bind(c.price)
        .bind(&c.category)
        .bind(c.stock)
        .bind(c.image_url.is_some())
        .bind(c.image_url.clone().flatten())
        .bind(c.is_active)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::not_found("product"))?;
        Ok(product)
    }

    async fn delete_product(&self, id: ProductId, at: DateTime<Utc>) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE products SET deleted_at = $2, updated_at = $2
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("product"));
        }
        Ok(())
    }

    async fn list_products(&self, filter: &ListingFilter) -> StoreResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE {} ORDER BY {}",
            PRODUCT_COLUMNS,
            LISTING_WHERE,
            order_by(filter.sort)
        );
        let products = sqlx::query_as(&sql)
            .bind(filter.include_inactive)
            .bind(&filter.categories)
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(filter.seller_id)
            .bind(filter.search.as_deref().map(like_pattern))
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    async fn insert_service(&self, s: &ServiceListing) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO services (id, seller_id, name, description, price, category, is_active,
                 created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(s.id)
        .bind(s.seller_id)
        .bind(&s.name)
        .bind(&s.description)
        .bind(s.price)
        .bind(&s.category)
        .bind(s.is_active)
        .bind(s.created_at)
        .bind(s.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn get_service(&self, id: ServiceId) -> StoreResult<Option<ServiceListing>> {
        let service = sqlx::query_as(&format!(
            "SELECT {} FROM services WHERE id = $1 AND deleted_at IS NULL",
            SERVICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(service)
    }

    async fn save_service(&self, s: &ServiceListing) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE services SET name = $2, description = $3, price = $4, category = $5,
                 is_active = $6, updated_at = $7
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(s.id)
        .bind(&s.name)
        .bind(&s.description)
        .bind(s.price)
        .bind(&s.category)
        .bind(s.is_active)
        .bind(s.updated_at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("service"));
        }
        Ok(())
    }

    async fn delete_service(&self, id: ServiceId, at: DateTime<Utc>) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE services SET deleted_at = $2, updated_at = $2
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("service"));
        }
        Ok(())
    }

    async fn list_services(&self, filter: &ListingFilter) -> StoreResult<Vec<ServiceListing>> {
        let sql = format!(
            "SELECT {} FROM services WHERE {} ORDER BY {}",
            SERVICE_COLUMNS,
            LISTING_WHERE,
            order_by(filter.sort)
        );
        let services = sqlx::query_as(&sql)
            .bind(filter.include_inactive)
            .bind(&filter.categories)
            .bind(filter.min_price)
            .bind(filter.max_price)
            .bind(filter.seller_id)
            .bind(filter.search.as_deref().map(like_pattern))
            .fetch_all(&self.pool)
            .await?;
        Ok(services)
    }
}

#[async_trait]
impl RatingStore for PgStore {
    async fn insert_rating(&self, r: &Rating) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO ratings (id, seller_id, user_id, stars, comment, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(r.id)
        .bind(r.seller_id)
        .bind(r.user_id)
        .bind(r.stars)
        .bind(&r.comment)
        .bind(r.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn list_ratings(
        &self,
        seller_id: Option<UserId>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<(Vec<Rating>, i64)> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ratings WHERE ($1::uuid IS NULL OR seller_id = $1)")
                .bind(seller_id)
                .fetch_one(&self.pool)
                .await?;

        let ratings = sqlx::query_as(
            "SELECT id, seller_id, user_id, stars, comment, created_at FROM ratings
             WHERE ($1::uuid IS NULL OR seller_id = $1)
             ORDER BY created_at DESC
             LIMIT $2 OFFSET $3",
        )
        .bind(seller_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((ratings, total))
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn add_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> StoreResult<Cart> {
        let mut tx = self.pool.begin().await?;

        let price: Decimal = sqlx::query_scalar(
            "SELECT price FROM products WHERE id = $1 AND deleted_at IS NULL AND is_active",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::not_found("product"))?;

        // Create lazily; the upsert also locks the cart row for this transaction
        let cart_id: CartId = sqlx::query_scalar(
            "INSERT INTO carts (id, user_id) VALUES ($1, $2)
             ON CONFLICT (user_id) DO UPDATE SET updated_at = NOW()
             RETURNING id",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO cart_items (id, cart_id, product_id, quantity, price, total_price)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(Uuid::new_v4())
        .bind(cart_id)
        .bind(product_id)
        .bind(quantity)
        .bind(price)
        .bind(money::line_total(price, quantity))
        .execute(&mut *tx)
        .await?;

        Self::refresh_cart_total(&mut tx, cart_id).await?;
        let cart = Self::load_cart(&mut tx, cart_id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    async fn update_cart_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> StoreResult<Cart> {
        let mut tx = self.pool.begin().await?;
        let cart_id = Self::lock_cart(&mut tx, user_id)
            .await?
            .ok_or(StoreError::not_found("cart item"))?;

        let price: Decimal =
            sqlx::query_scalar("SELECT price FROM cart_items WHERE id = $1 AND cart_id = $2")
                .bind(item_id)
                .bind(cart_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::not_found("cart item"))?;

        sqlx::query("UPDATE cart_items SET quantity = $1, total_price = $2 WHERE id = $3")
            .bind(quantity)
            .bind(money::line_total(price, quantity))
            .bind(item_id)
            .execute(&mut *tx)
            .await?;

        Self::refresh_cart_total(&mut tx, cart_id).await?;
        let cart = Self::load_cart(&mut tx, cart_id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    async fn remove_cart_item(&self, user_id: UserId, item_id: CartItemId) -> StoreResult<Cart> {
        let mut tx = self.pool.begin().await?;
        let cart_id = Self::lock_cart(&mut tx, user_id)
            .await?
            .ok_or(StoreError::not_found("cart item"))?;

        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND cart_id = $2")
            .bind(item_id)
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("cart item"));
        }

        Self::refresh_cart_total(&mut tx, cart_id).await?;
        let cart = Self::load_cart(&mut tx, cart_id).await?;
        tx.commit().await?;
        Ok(cart)
    }

    async fn get_cart(&self, user_id: UserId) -> StoreResult<Option<Cart>> {
        let mut conn = self.pool.acquire().await?;
        let cart_id: Option<CartId> = sqlx::query_scalar("SELECT id FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;
        match cart_id {
            Some(id) => Ok(Some(Self::load_cart(&mut conn, id).await?)),
            None => Ok(None),
        }
    }

    async fn delete_cart(&self, user_id: UserId) -> StoreResult<bool> {
        // cart_items cascade
        let result = sqlx::query("DELETE FROM carts WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn place_order(&self, draft: &OrderDraft) -> StoreResult<Order> {
        let mut tx = self.pool.begin().await?;
        let order_id = Uuid::new_v4();

        // Lock the consumed cart first so a concurrent checkout or cart edit waits on it
        if let Some(cart_id) = draft.consume_cart {
            let locked: Option<CartId> =
                sqlx::query_scalar("SELECT id FROM carts WHERE id = $1 AND user_id = $2 FOR UPDATE")
                    .bind(cart_id)
                    .bind(draft.user_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            let cart = match locked {
                Some(id) => Some(Self::load_cart(&mut tx, id).await?),
                None => None,
            };
            check_consumed_cart(cart.as_ref(), draft)?;
        }

        // Lines arrive sorted by product id, so concurrent orders lock in the same order
        let mut items = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            let row: Option<(String, Decimal, i32)> = sqlx::query_as(
                "SELECT name, price, stock FROM products
                 WHERE id = $1 AND deleted_at IS NULL AND is_active
                 FOR UPDATE",
            )
            .bind(line.product_id)
            .fetch_optional(&mut *tx)
            .await?;

            let (name, price, stock) = row.ok_or(StoreError::not_found("product"))?;
            if stock < line.quantity {
                return Err(StoreError::InsufficientStock {
                    product_id: line.product_id,
                    name,
                    requested: line.quantity,
                    available: stock,
                });
            }

            items.push(OrderItem {
                id: Uuid::new_v4(),
                order_id,
                product_id: line.product_id,
                quantity: line.quantity,
                price,
                total_price: money::line_total(price, line.quantity),
            });
        }

        let total = money::sum_totals(items.iter().map(|i| i.total_price));

        let mut order: Order = sqlx::query_as(&format!(
            "INSERT INTO orders (id, order_number, user_id, total_amount, payment_status,
                 payment_method, shipping_address, order_status)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {}",
            ORDER_COLUMNS
        ))
        .bind(order_id)
        .bind(&draft.order_number)
        .bind(draft.user_id)
        .bind(total)
        .bind(PaymentStatus::Pending.as_str())
        .bind(&draft.payment_method)
        .bind(&draft.shipping_address)
        .bind(OrderStatus::Processing.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        for item in &items {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, quantity, price, total_price)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(item.id)
            .bind(item.order_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.price)
            .bind(item.total_price)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE products SET stock = stock - $1, updated_at = NOW() WHERE id = $2")
                .bind(item.quantity)
                .bind(item.product_id)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(cart_id) = draft.consume_cart {
            let result = sqlx::query("DELETE FROM carts WHERE id = $1 AND user_id = $2")
                .bind(cart_id)
                .bind(draft.user_id)
                .execute(&mut *tx)
                .await?;
            if result.rows_affected() == 0 {
                return Err(StoreError::Conflict(CART_ALREADY_CHECKED_OUT.to_string()));
            }
        }

        tx.commit().await?;
        order.items = items;
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_order(&mut conn, id).await
    }

    async fn get_order_by_number(&self, order_number: &str) -> StoreResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let id: Option<OrderId> =
            sqlx::query_scalar("SELECT id FROM orders WHERE order_number = $1")
                .bind(order_number)
                .fetch_optional(&mut *conn)
                .await?;
        match id {
            Some(id) => Self::fetch_order(&mut conn, id).await,
            None => Ok(None),
        }
    }

    async fn list_orders(
        &self,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> StoreResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let (start, end) = range.unzip();
        let mut orders: Vec<Order> = sqlx::query_as(&format!(
            "SELECT {} FROM orders
             WHERE ($1::timestamptz IS NULL OR created_at >= $1)
               AND ($2::timestamptz IS NULL OR created_at < $2)
             ORDER BY created_at",
            ORDER_COLUMNS
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&mut *conn)
        .await?;
        Self::attach_items(&mut conn, &mut orders).await?;
        Ok(orders)
    }

    async fn list_user_orders(&self, user_id: UserId) -> StoreResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let mut orders: Vec<Order> = sqlx::query_as(&format!(
            "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
        Self::attach_items(&mut conn, &mut orders).await?;
        Ok(orders)
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        delivered_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Order> {
        let mut tx = self.pool.begin().await?;

        let current: String =
            sqlx::query_scalar("SELECT order_status FROM orders WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::not_found("order"))?;
        let current: OrderStatus = current
            .parse()
            .map_err(|e: crate::core_types::ParseEnumError| {
                StoreError::Database(sqlx::Error::Decode(Box::new(e)))
            })?;
        if current.is_final() {
            return Err(StoreError::Conflict(format!("order is already {}", current)));
        }

        sqlx::query(
            "UPDATE orders SET order_status = $1, delivered_at = COALESCE($2, delivered_at),
                 updated_at = NOW()
             WHERE id = $3",
        )
        .bind(status.as_str())
        .bind(delivered_at)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let order = Self::fetch_order(&mut tx, id)
            .await?
            .ok_or(StoreError::not_found("order"))?;
        tx.commit().await?;
        Ok(order)
    }

    async fn set_payment_status(
        &self,
        order_number: &str,
        status: PaymentStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET payment_status = $1, updated_at = NOW() WHERE order_number = $2",
        )
        .bind(status.as_str())
        .bind(order_number)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl PaymentStore for PgStore {
    async fn insert_payment_request(&self, r: &PaymentRequest) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO payment_requests (checkout_request_id, merchant_request_id, customer_id,
                 phone, amount, account_reference, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&r.checkout_request_id)
        .bind(&r.merchant_request_id)
        .bind(r.customer_id)
        .bind(&r.phone)
        .bind(r.amount)
        .bind(&r.account_reference)
        .bind(r.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(())
    }

    async fn find_payment_request(
        &self,
        checkout_request_id: &str,
    ) -> StoreResult<Option<PaymentRequest>> {
        let request = sqlx::query_as(
            "SELECT checkout_request_id, merchant_request_id, customer_id, phone, amount,
                 account_reference, created_at
             FROM payment_requests WHERE checkout_request_id = $1",
        )
        .bind(checkout_request_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(request)
    }

    async fn record_payment(&self, p: &Payment) -> StoreResult<Recorded> {
        // The unique index on transaction_id settles concurrent duplicates
        let inserted: Option<Payment> = sqlx::query_as(&format!(
            "INSERT INTO payments (id, customer_id, amount, payment_method, transaction_id,
                 checkout_request_id, status, result_code, result_desc, customer_phone,
                 account_reference, transaction_date, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             ON CONFLICT (transaction_id) DO NOTHING
             RETURNING {}",
            PAYMENT_COLUMNS
        ))
        .bind(p.id)
        .bind(p.customer_id)
        .bind(p.amount)
        .bind(&p.payment_method)
        .bind(&p.transaction_id)
        .bind(&p.checkout_request_id)
        .bind(p.status.as_str())
        .bind(p.result_code)
        .bind(&p.result_desc)
        .bind(&p.customer_phone)
        .bind(&p.account_reference)
        .bind(&p.transaction_date)
        .bind(p.created_at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(payment) = inserted {
            return Ok(Recorded::New(payment));
        }

        let existing: Payment = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE transaction_id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(&p.transaction_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(Recorded::Duplicate(existing))
    }

    async fn list_customer_payments(&self, customer_id: UserId) -> StoreResult<Vec<Payment>> {
        let payments = sqlx::query_as(&format!(
            "SELECT {} FROM payments WHERE customer_id = $1 ORDER BY created_at DESC",
            PAYMENT_COLUMNS
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
