use axum::{
    Extension, Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
};
use std::sync::Arc;

use super::callback::parse_callback;
use super::models::{CallbackAck, InitiatePaymentRequest, InitiatePaymentResponse, Payment};
use crate::account::AuthUser;
use crate::error::ServiceError;
use crate::gateway::extract::JsonBody;
use crate::gateway::{state::AppState, types::ApiResponse};

/// Prompt the customer's phone for payment
///
/// POST /api/v1/payments
#[utoipa::path(
    post,
    path = "/api/v1/payments",
    request_body = InitiatePaymentRequest,
    responses(
        (status = 201, description = "STK push sent", body = ApiResponse<InitiatePaymentResponse>),
        (status = 400, description = "Invalid phone or amount"),
        (status = 500, description = "Payment request failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn initiate_payment(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    JsonBody(req): JsonBody<InitiatePaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<InitiatePaymentResponse>>), ServiceError> {
    let resp = state.payments.initiate(&caller, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "check your mobile phone for an M-Pesa prompt",
            resp,
        )),
    ))
}

/// GET /api/v1/payments
#[utoipa::path(
    get,
    path = "/api/v1/payments",
    responses((status = 200, description = "Caller's payments, newest first", body = ApiResponse<Vec<Payment>>)),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn my_payments(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<Payment>>>, ServiceError> {
    let payments = state.payments.my_payments(&caller).await?;
    Ok(Json(ApiResponse::success("payments", payments)))
}

/// Provider webhook. Unauthenticated; duplicates are acknowledged with the
/// payment recorded the first time.
///
/// POST /api/v1/callback
#[utoipa::path(
    post,
    path = "/api/v1/callback",
    request_body(content = String, description = "M-Pesa stkCallback envelope", content_type = "application/json"),
    responses(
        (status = 200, description = "Callback accepted", body = CallbackAck),
        (status = 400, description = "Malformed callback")
    ),
    tag = "Payments"
)]
pub async fn mpesa_callback(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<CallbackAck>, ServiceError> {
    let callback = parse_callback(&body).map_err(|e| {
        tracing::warn!("Rejected payment callback: {}", e);
        ServiceError::validation(e.to_string())
    })?;
    let recorded = state.payments.handle_callback(callback).await?;
    Ok(Json(CallbackAck::recorded(&recorded)))
}
