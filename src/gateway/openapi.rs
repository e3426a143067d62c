//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::account::models::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
    UpdateProfileRequest, UserProfile,
};
use crate::cart::models::{AddToCartRequest, CartItem, CartView, CheckoutRequest, UpdateCartItemRequest};
use crate::catalog::models::{
    CreateProductRequest, CreateRatingRequest, CreateServiceRequest, PageMeta, Product, Rating,
    RatingPage, ServiceListing, UpdateProductRequest, UpdateServiceRequest,
};
use crate::gateway::handlers::HealthResponse;
use crate::gateway::types::ErrorResponse;
use crate::orders::models::{
    Order, OrderItem, OrderLine, OrderList, OrderListMeta, OrderStatus, PaymentStatus,
    PlaceOrderRequest, UpdateOrderStatusRequest,
};
use crate::payments::models::{
    CallbackAck, InitiatePaymentRequest, InitiatePaymentResponse, Payment, TransactionStatus,
};

/// JWT bearer token, also accepted from the `Authorization` cookie
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Token from POST /api/v1/user/login. Send as `Authorization: Bearer <token>` or rely on the login cookie.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Main API Documentation struct
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Palace Commerce API",
        version = "1.0.0",
        description = "Accounts, product and service catalog, carts, orders, seller ratings and M-Pesa payments.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health::health_check,
        // Accounts
        crate::account::handlers::register,
        crate::account::handlers::login,
        crate::account::handlers::logout,
        crate::account::handlers::get_profile,
        crate::account::handlers::update_profile,
        crate::account::handlers::list_users,
        crate::account::handlers::promote_to_admin,
        crate::account::handlers::forgot_password,
        crate::account::handlers::reset_password,
        // Catalog
        crate::catalog::handlers::list_products,
        crate::catalog::handlers::products_by_price,
        crate::catalog::handlers::products_by_category,
        crate::catalog::handlers::get_product,
        crate::catalog::handlers::my_products,
        crate::catalog::handlers::create_product,
        crate::catalog::handlers::update_product,
        crate::catalog::handlers::delete_product,
        crate::catalog::handlers::rate_seller,
        crate::catalog::handlers::list_ratings,
        crate::catalog::handlers::list_services,
        crate::catalog::handlers::get_service,
        crate::catalog::handlers::my_services,
        crate::catalog::handlers::create_service,
        crate::catalog::handlers::update_service,
        crate::catalog::handlers::delete_service,
        // Cart
        crate::cart::handlers::get_cart,
        crate::cart::handlers::add_to_cart,
        crate::cart::handlers::update_cart_item,
        crate::cart::handlers::remove_cart_item,
        crate::cart::handlers::clear_cart,
        crate::cart::handlers::checkout,
        // Orders
        crate::orders::handlers::place_order,
        crate::orders::handlers::list_orders,
        crate::orders::handlers::my_orders,
        crate::orders::handlers::get_order,
        crate::orders::handlers::update_order_status,
        // Payments
        crate::payments::handlers::initiate_payment,
        crate::payments::handlers::my_payments,
        crate::payments::handlers::mpesa_callback,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorResponse,
            UserProfile,
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            UpdateProfileRequest,
            ForgotPasswordRequest,
            ResetPasswordRequest,
            Product,
            ServiceListing,
            Rating,
            RatingPage,
            PageMeta,
            CreateProductRequest,
            UpdateProductRequest,
            CreateServiceRequest,
            UpdateServiceRequest,
            CreateRatingRequest,
            CartView,
            CartItem,
            AddToCartRequest,
            UpdateCartItemRequest,
            CheckoutRequest,
            Order,
            OrderItem,
            OrderLine,
            OrderList,
            OrderListMeta,
            OrderStatus,
            PaymentStatus,
            PlaceOrderRequest,
            UpdateOrderStatusRequest,
            Payment,
            TransactionStatus,
            InitiatePaymentRequest,
            InitiatePaymentResponse,
            CallbackAck,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "User", description = "Registration, login and profile"),
        (name = "Products", description = "Product catalog"),
        (name = "Ratings", description = "Seller ratings"),
        (name = "Services", description = "Service listings"),
        (name = "Cart", description = "Shopping cart (auth required)"),
        (name = "Orders", description = "Order placement and management (auth required)"),
        (name = "Payments", description = "M-Pesa STK push and provider callback"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi;

    #[test]
    fn test_openapi_spec_generates() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Palace Commerce API");
        assert_eq!(spec.info.version, "1.0.0");
    }

    #[test]
    fn test_openapi_json_serializable() {
        let json = ApiDoc::openapi().to_json().unwrap();
        assert!(json.contains("Palace Commerce API"));
    }

    #[test]
    fn test_endpoints_registered() {
        let paths = ApiDoc::openapi().paths;
        for path in [
            "/api/v1/health",
            "/api/v1/user/login",
            "/api/v1/products/{id}",
            "/api/v1/products/ratings/{seller_id}",
            "/api/v1/cart/checkout",
            "/api/v1/orders/{id}/status",
            "/api/v1/callback",
        ] {
            assert!(paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_security_scheme_registered() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("should have components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
