use axum::{
    Extension, Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::middleware::AUTH_COOKIE;
use super::models::{
    AuthResponse, ForgotPasswordRequest, LoginRequest, RegisterRequest, ResetPasswordRequest,
    UpdateProfileRequest, UserProfile,
};
use super::token::AuthUser;
use crate::core_types::UserId;
use crate::error::ServiceError;
use crate::gateway::extract::{JsonBody, PathParam};
use crate::gateway::{state::AppState, types::ApiResponse};

fn auth_cookie(token: &str, expires_at: DateTime<Utc>, secure: bool) -> String {
    let max_age = (expires_at - Utc::now()).num_seconds().max(0);
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        AUTH_COOKIE, token, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn expired_cookie(secure: bool) -> String {
    let mut cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", AUTH_COOKIE);
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Register a new user
///
/// POST /api/v1/user
#[utoipa::path(
    post,
    path = "/api/v1/user",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = ApiResponse<UserProfile>),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email or phone already registered")
    ),
    tag = "User"
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserProfile>>), ServiceError> {
    let profile = state.users.register(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("user registered", profile)),
    ))
}

/// Login with phone number, password and role
///
/// POST /api/v1/user/login
#[utoipa::path(
    post,
    path = "/api/v1/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful, token also set as cookie", body = ApiResponse<AuthResponse>),
        (status = 401, description = "Invalid credentials"),
        (status = 404, description = "User not found")
    ),
    tag = "User"
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let auth = state.users.login(req).await?;
    let cookie = auth_cookie(&auth.token, auth.expires_at, state.secure_cookie);
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::success("login successful", auth)),
    ))
}

/// Revoke the current token
///
/// POST /api/v1/user/logout
#[utoipa::path(
    post,
    path = "/api/v1/user/logout",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> impl IntoResponse {
    state.users.logout(&caller);
    (
        StatusCode::OK,
        [(header::SET_COOKIE, expired_cookie(state.secure_cookie))],
        Json(ApiResponse::message("logged out")),
    )
}

/// Current user's profile
///
/// GET /api/v1/user
#[utoipa::path(
    get,
    path = "/api/v1/user",
    responses(
        (status = 200, description = "Profile", body = ApiResponse<UserProfile>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<ApiResponse<UserProfile>>, ServiceError> {
    let profile = state.users.profile(&caller).await?;
    Ok(Json(ApiResponse::success("profile", profile)))
}

/// Partial profile update
///
/// PUT /api/v1/user
#[utoipa::path(
    put,
    path = "/api/v1/user",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<UserProfile>),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email or phone already registered")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    JsonBody(req): JsonBody<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<UserProfile>>, ServiceError> {
    let profile = state.users.update_profile(&caller, req).await?;
    Ok(Json(ApiResponse::success("profile updated", profile)))
}

/// All users (admin)
///
/// GET /api/v1/user/all
#[utoipa::path(
    get,
    path = "/api/v1/user/all",
    responses(
        (status = 200, description = "Users", body = ApiResponse<Vec<UserProfile>>),
        (status = 403, description = "Admin only")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<UserProfile>>>, ServiceError> {
    let users = state.users.list_users(&caller).await?;
    Ok(Json(ApiResponse::success("users", users)))
}

/// Promote a user to admin (admin)
///
/// PUT /api/v1/user/{id}/admin
#[utoipa::path(
    put,
    path = "/api/v1/user/{id}/admin",
    params(("id" = String, Path, description = "User id (UUID) to promote")),
    responses(
        (status = 200, description = "User promoted", body = ApiResponse<UserProfile>),
        (status = 403, description = "Admin only"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "User"
)]
pub async fn promote_to_admin(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<AuthUser>,
    PathParam(id): PathParam<UserId>,
) -> Result<Json<ApiResponse<UserProfile>>, ServiceError> {
    let profile = state.users.promote_to_admin(&caller, id).await?;
    Ok(Json(ApiResponse::success("user promoted to admin", profile)))
}

/// Send a 4-digit reset code
///
/// POST /api/v1/user/forgot-password
#[utoipa::path(
    post,
    path = "/api/v1/user/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset code sent"),
        (status = 404, description = "No user with this email and phone")
    ),
    tag = "User"
)]
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.users.forgot_password(req).await?;
    Ok(Json(ApiResponse::message("reset code sent")))
}

/// Set a new password using the reset code
///
/// POST /api/v1/user/reset-password
#[utoipa::path(
    post,
    path = "/api/v1/user/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset"),
        (status = 400, description = "Invalid or expired code"),
        (status = 404, description = "No user with this email and phone")
    ),
    tag = "User"
)]
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.users.reset_password(req).await?;
    Ok(Json(ApiResponse::message("password reset successful")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_auth_cookie_attributes() {
        let cookie = auth_cookie("abc", Utc::now() + Duration::hours(1), true);
        assert!(cookie.starts_with("Authorization=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.ends_with("; Secure"));

        let cookie = auth_cookie("abc", Utc::now() - Duration::hours(1), false);
        assert!(cookie.contains("Max-Age=0"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn test_expired_cookie_clears_value() {
        assert!(expired_cookie(false).starts_with("Authorization=;"));
    }
}
