//! Table definitions, applied at startup with `Database::migrate`.
//!
//! Every statement is idempotent. Constraint names are referenced by
//! `store::postgres` when mapping unique violations to conflict messages.

pub const USERS_EMAIL_KEY: &str = "users_email_key";
pub const USERS_PHONE_ROLE_KEY: &str = "users_phone_role_key";
pub const PAYMENTS_TRANSACTION_KEY: &str = "payments_transaction_id_key";
pub const PAYMENT_REQUESTS_CHECKOUT_KEY: &str = "payment_requests_checkout_request_id_key";

pub const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        email TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        address TEXT,
        city TEXT,
        postal_code TEXT,
        location TEXT,
        phone_number TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'customer',
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        reset_code TEXT,
        reset_code_expires_at TIMESTAMPTZ,
        reset_attempts INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT users_email_key UNIQUE (email),
        CONSTRAINT users_phone_role_key UNIQUE (phone_number, role)
    )
    "#,
    "ALTER TABLE users ADD COLUMN IF NOT EXISTS reset_attempts INTEGER NOT NULL DEFAULT 0",
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id UUID PRIMARY KEY,
        seller_id UUID NOT NULL REFERENCES users(id),
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        price NUMERIC(12,2) NOT NULL CHECK (price > 0),
        category TEXT NOT NULL DEFAULT '',
        stock INTEGER NOT NULL CHECK (stock >= 0),
        image_url TEXT,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_products_category ON products (category) WHERE deleted_at IS NULL",
    "CREATE INDEX IF NOT EXISTS idx_products_seller ON products (seller_id)",
    r#"
    CREATE TABLE IF NOT EXISTS services (
        id UUID PRIMARY KEY,
        seller_id UUID NOT NULL REFERENCES users(id),
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        price NUMERIC(12,2) NOT NULL CHECK (price > 0),
        category TEXT NOT NULL DEFAULT '',
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_services_category ON services (category) WHERE deleted_at IS NULL",
    r#"
    CREATE TABLE IF NOT EXISTS ratings (
        id UUID PRIMARY KEY,
        seller_id UUID NOT NULL REFERENCES users(id),
        user_id UUID NOT NULL REFERENCES users(id),
        stars SMALLINT NOT NULL CHECK (stars BETWEEN 1 AND 5),
        comment TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_ratings_seller ON ratings (seller_id, created_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS carts (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL UNIQUE REFERENCES users(id),
        total_amount NUMERIC(12,2) NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cart_items (
        id UUID PRIMARY KEY,
        cart_id UUID NOT NULL REFERENCES carts(id) ON DELETE CASCADE,
        product_id UUID NOT NULL REFERENCES products(id),
        quantity INTEGER NOT NULL CHECK (quantity > 0),
        price NUMERIC(12,2) NOT NULL,
        total_price NUMERIC(12,2) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id UUID PRIMARY KEY,
        order_number TEXT NOT NULL UNIQUE,
        user_id UUID NOT NULL REFERENCES users(id),
        total_amount NUMERIC(12,2) NOT NULL,
        payment_status TEXT NOT NULL DEFAULT 'Pending',
        payment_method TEXT NOT NULL,
        shipping_address TEXT NOT NULL,
        order_status TEXT NOT NULL DEFAULT 'Processing',
        delivered_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_orders_created ON orders (created_at)",
    "CREATE INDEX IF NOT EXISTS idx_orders_user ON orders (user_id, created_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS order_items (
        id UUID PRIMARY KEY,
        order_id UUID NOT NULL REFERENCES orders(id) ON DELETE CASCADE,
        product_id UUID NOT NULL REFERENCES products(id),
        quantity INTEGER NOT NULL CHECK (quantity > 0),
        price NUMERIC(12,2) NOT NULL,
        total_price NUMERIC(12,2) NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS payment_requests (
        checkout_request_id TEXT NOT NULL,
        merchant_request_id TEXT NOT NULL,
        customer_id UUID NOT NULL REFERENCES users(id),
        phone TEXT NOT NULL,
        amount NUMERIC(12,2) NOT NULL,
        account_reference TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT payment_requests_checkout_request_id_key UNIQUE (checkout_request_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS payments (
        id UUID PRIMARY KEY,
        customer_id UUID REFERENCES users(id),
        amount NUMERIC(12,2) NOT NULL,
        payment_method TEXT NOT NULL,
        transaction_id TEXT NOT NULL,
        checkout_request_id TEXT NOT NULL,
        status TEXT NOT NULL,
        result_code INTEGER NOT NULL,
        result_desc TEXT NOT NULL,
        customer_phone TEXT,
        account_reference TEXT,
        transaction_date TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        CONSTRAINT payments_transaction_id_key UNIQUE (transaction_id)
    )
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_are_idempotent() {
        for statement in STATEMENTS {
            assert!(
                statement.contains("IF NOT EXISTS"),
                "not idempotent: {}",
                statement
            );
        }
    }

    #[test]
    fn test_named_constraints_present() {
        let all = STATEMENTS.join("\n");
        for name in [
            USERS_EMAIL_KEY,
            USERS_PHONE_ROLE_KEY,
            PAYMENTS_TRANSACTION_KEY,
            PAYMENT_REQUESTS_CHECKOUT_KEY,
        ] {
            assert!(all.contains(name), "missing constraint {}", name);
        }
    }
}
