pub mod extract;
pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use anyhow::{Context, Result};
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, patch, post, put},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::account::handlers as account;
use crate::account::middleware::jwt_auth_middleware;
use crate::cart::handlers as cart;
use crate::catalog::handlers as catalog;
use crate::config::GatewayConfig;
use crate::orders::handlers as orders;
use crate::payments::handlers as payments;
use state::AppState;

/// Product routes are served under both prefixes
const PRODUCT_PREFIXES: [&str; 2] = ["/api/v1/products", "/api/v1/clothes"];

fn public_routes() -> Router<Arc<AppState>> {
    let mut router = Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        // Accounts
        .route("/api/v1/user", post(account::register))
        .route("/api/v1/user/login", post(account::login))
        .route("/api/v1/user/forgot-password", post(account::forgot_password))
        .route("/api/v1/user/reset-password", post(account::reset_password))
        // Services
        .route("/api/v1/services", get(catalog::list_services))
        .route("/api/v1/services/{id}", get(catalog::get_service))
        // Payment provider webhook
        .route("/api/v1/callback", post(payments::mpesa_callback));

    for prefix in PRODUCT_PREFIXES {
        router = router
            .route(prefix, get(catalog::list_products))
            .route(&format!("{}/price", prefix), get(catalog::products_by_price))
            .route(
                &format!("{}/category", prefix),
                get(catalog::products_by_category),
            )
            .route(&format!("{}/ratings", prefix), get(catalog::list_ratings))
            .route(&format!("{}/{{id}}", prefix), get(catalog::get_product));
    }
    router
}

fn protected_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let mut router = Router::new()
        // Accounts
        .route(
            "/api/v1/user",
            get(account::get_profile).put(account::update_profile),
        )
        .route("/api/v1/user/logout", post(account::logout))
        .route("/api/v1/user/all", get(account::list_users))
        .route("/api/v1/user/{id}/admin", put(account::promote_to_admin))
        // Services
        .route("/api/v1/services", post(catalog::create_service))
        .route("/api/v1/services/mine", get(catalog::my_services))
        .route(
            "/api/v1/services/{id}",
            put(catalog::update_service).delete(catalog::delete_service),
        )
        // Cart
        .route(
            "/api/v1/cart",
            get(cart::get_cart)
                .post(cart::add_to_cart)
                .delete(cart::clear_cart),
        )
        .route(
            "/api/v1/cart/items/{id}",
            put(cart::update_cart_item).delete(cart::remove_cart_item),
        )
        .route("/api/v1/cart/checkout", post(cart::checkout))
        // Orders
        .route(
            "/api/v1/orders",
            post(orders::place_order).get(orders::list_orders),
        )
        .route("/api/v1/orders/mine", get(orders::my_orders))
        .route("/api/v1/orders/{id}", get(orders::get_order))
        .route(
            "/api/v1/orders/{id}/status",
            patch(orders::update_order_status),
        )
        // Payments
        .route(
            "/api/v1/payments",
            post(payments::initiate_payment).get(payments::my_payments),
        );

    for prefix in PRODUCT_PREFIXES {
        router = router
            .route(prefix, post(catalog::create_product))
            .route(&format!("{}/mine", prefix), get(catalog::my_products))
            .route(
                &format!("{}/ratings/{{seller_id}}", prefix),
                post(catalog::rate_seller),
            )
            .route(
                &format!("{}/{{id}}", prefix),
                put(catalog::update_product).delete(catalog::delete_product),
            );
    }

    router.layer(from_fn_with_state(state, jwt_auth_middleware))
}

/// Full application router: public routes, JWT-protected routes and the
/// Swagger UI.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(public_routes())
        .merge(protected_routes(state.clone()))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Start the HTTP gateway and serve until the process is stopped
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> Result<()> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {} (port already in use?)", addr))?;

    tracing::info!("Gateway listening on http://{}", addr);
    tracing::info!("API docs: http://{}/docs", addr);

    axum::serve(listener, app)
        .await
        .context("Gateway server error")?;
    Ok(())
}
