use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::error::ServiceError;
use crate::gateway::state::AppState;

/// Cookie set on login and cleared on logout
pub const AUTH_COOKIE: &str = "Authorization";

/// Pull the token from the `Authorization` cookie, falling back to a
/// `Bearer` header. A cookie value may itself carry the `Bearer ` prefix.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == AUTH_COOKIE)
        .map(|(_, value)| strip_bearer(value).to_string())
        .filter(|t| !t.is_empty());

    from_cookie.or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    })
}

fn strip_bearer(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("Bearer%20"))
        .unwrap_or(value)
}

/// Verifies the token and injects `AuthUser` for the handler
pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ServiceError> {
    let token = extract_token(request.headers())
        .ok_or_else(|| ServiceError::unauthorized("missing authentication token"))?;

    let caller = state.users.authenticate(&token)?;
    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}
