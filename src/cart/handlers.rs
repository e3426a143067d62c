use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use std::sync::Arc;

use super::models::{AddToCartRequest, CartView, CheckoutRequest, UpdateCartItemRequest};
use crate::account::AuthUser;
use crate::core_types::CartItemId;
use crate::error::ServiceError;
use crate::gateway::extract::{JsonBody, PathParam};
use crate::gateway::{state::AppState, types::ApiResponse};
use crate::orders::models::Order;

/// GET /api/v1/cart
#[utoipa::path(
    get,
    path = "/api/v1/cart",
    responses((status = 200, description = "Caller's cart, empty when none exists", body = ApiResponse<CartView>)),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    let cart = state.carts.get_cart(&caller).await?;
    Ok(Json(ApiResponse::success("cart", cart)))
}

/// POST /api/v1/cart
#[utoipa::path(
    post,
    path = "/api/v1/cart",
    request_body = AddToCartRequest,
    responses(
        (status = 201, description = "Item added", body = ApiResponse<CartView>),
        (status = 400, description = "Invalid quantity"),
        (status = 404, description = "Product not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    JsonBody(req): JsonBody<AddToCartRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CartView>>), ServiceError> {
    let cart = state.carts.add_item(&caller, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("item added to cart", cart)),
    ))
}

/// PUT /api/v1/cart/items/{id}
#[utoipa::path(
    put,
    path = "/api/v1/cart/items/{id}",
    params(("id" = String, Path, description = "Cart item id (UUID)")),
    request_body = UpdateCartItemRequest,
    responses(
        (status = 200, description = "Quantity updated", body = ApiResponse<CartView>),
        (status = 400, description = "Invalid quantity"),
        (status = 404, description = "Item not in caller's cart")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    PathParam(id): PathParam<CartItemId>,
    JsonBody(req): JsonBody<UpdateCartItemRequest>,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    let cart = state.carts.update_item(&caller, id, req.quantity).await?;
    Ok(Json(ApiResponse::success("cart item updated", cart)))
}

/// DELETE /api/v1/cart/items/{id}
#[utoipa::path(
    delete,
    path = "/api/v1/cart/items/{id}",
    params(("id" = String, Path, description = "Cart item id (UUID)")),
    responses(
        (status = 200, description = "Item removed", body = ApiResponse<CartView>),
        (status = 404, description = "Item not in caller's cart")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_cart_item(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    PathParam(id): PathParam<CartItemId>,
) -> Result<Json<ApiResponse<CartView>>, ServiceError> {
    let cart = state.carts.remove_item(&caller, id).await?;
    Ok(Json(ApiResponse::success("item removed from cart", cart)))
}

/// DELETE /api/v1/cart
#[utoipa::path(
    delete,
    path = "/api/v1/cart",
    responses((status = 200, description = "Cart cleared")),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.carts.clear(&caller).await?;
    Ok(Json(ApiResponse::message("cart cleared")))
}

/// POST /api/v1/cart/checkout
#[utoipa::path(
    post,
    path = "/api/v1/cart/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order placed from cart", body = ApiResponse<Order>),
        (status = 400, description = "Empty cart or missing fields"),
        (status = 409, description = "Insufficient stock")
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    JsonBody(req): JsonBody<CheckoutRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>), ServiceError> {
    let order = state.carts.checkout(&caller, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("order placed", order)),
    ))
}
