use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use std::sync::Arc;

use super::models::{Order, OrderList, OrderListQuery, PlaceOrderRequest, UpdateOrderStatusRequest};
use crate::account::AuthUser;
use crate::core_types::OrderId;
use crate::error::ServiceError;
use crate::gateway::extract::{JsonBody, PathParam, QueryParams};
use crate::gateway::{state::AppState, types::ApiResponse};

/// Place an order directly from line items
///
/// POST /api/v1/orders
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = PlaceOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = ApiResponse<Order>),
        (status = 400, description = "Invalid items or missing fields"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Insufficient stock")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn place_order(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    JsonBody(req): JsonBody<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>), ServiceError> {
    let order = state.orders.place_order(&caller, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("order placed", order)),
    ))
}

/// Orders in a period with totals (admin)
///
/// GET /api/v1/orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders with period meta", body = ApiResponse<OrderList>),
        (status = 400, description = "Invalid period"),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    QueryParams(query): QueryParams<OrderListQuery>,
) -> Result<Json<ApiResponse<OrderList>>, ServiceError> {
    let list = state.orders.list_orders(&caller, query).await?;
    Ok(Json(ApiResponse::success("orders", list)))
}

/// GET /api/v1/orders/mine
#[utoipa::path(
    get,
    path = "/api/v1/orders/mine",
    responses((status = 200, description = "Caller's orders, newest first", body = ApiResponse<Vec<Order>>)),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn my_orders(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<Order>>>, ServiceError> {
    let orders = state.orders.my_orders(&caller).await?;
    Ok(Json(ApiResponse::success("orders", orders)))
}

/// GET /api/v1/orders/{id}
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = String, Path, description = "Order id (UUID)")),
    responses(
        (status = 200, description = "Order", body = ApiResponse<Order>),
        (status = 404, description = "Order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    PathParam(id): PathParam<OrderId>,
) -> Result<Json<ApiResponse<Order>>, ServiceError> {
    let order = state.orders.get_order(&caller, id).await?;
    Ok(Json(ApiResponse::success("order", order)))
}

/// PATCH /api/v1/orders/{id}/status
#[utoipa::path(
    patch,
    path = "/api/v1/orders/{id}/status",
    params(("id" = String, Path, description = "Order id (UUID)")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<Order>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order already delivered or cancelled")
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    PathParam(id): PathParam<OrderId>,
    JsonBody(req): JsonBody<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<Order>>, ServiceError> {
    let order = state
        .orders
        .update_status(&caller, id, req.order_status)
        .await?;
    Ok(Json(ApiResponse::success("order status updated", order)))
}
