//! JWT issuing, verification and revocation
//!
//! Tokens are HS256 with `sub` (user id), `role`, `jti`, `iat` and `exp`.
//! Logout puts the `jti` on an in-process revocation list until the token
//! would have expired anyway.

use chrono::{DateTime, Duration, TimeZone, Utc};
use dashmap::DashMap;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::models::Role;
use crate::core_types::UserId;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
    #[error("token revoked")]
    Revoked,
    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Caller identity resolved from a verified token. Handlers receive it as an
/// `Extension` and pass it explicitly to every service call.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub user_id: UserId,
    pub role: Role,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    /// Admins act on anyone's records; everyone else only on their own
    pub fn can_act_for(&self, owner: UserId) -> bool {
        self.is_admin() || self.user_id == owner
    }
}

pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    /// jti -> original expiry
    revoked: DashMap<String, DateTime<Utc>>,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(ttl_hours),
            revoked: DashMap::new(),
        }
    }

    /// Returns the encoded token and its expiry
    pub fn issue(&self, user_id: UserId, role: Role) -> Result<(String, DateTime<Utc>), TokenError> {
        let now = Utc::now();
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        Ok((token, expires_at))
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser, TokenError> {
        let validation = Validation::new(Algorithm::HS256);
        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| TokenError::Invalid)?
            .claims;

        if self.revoked.contains_key(&claims.jti) {
            return Err(TokenError::Revoked);
        }

        let user_id = claims.sub.parse().map_err(|_| TokenError::Invalid)?;
        let role = claims.role.parse().map_err(|_| TokenError::Invalid)?;
        let expires_at = Utc
            .timestamp_opt(claims.exp, 0)
            .single()
            .ok_or(TokenError::Invalid)?;

        Ok(AuthUser {
            user_id,
            role,
            token_id: claims.jti,
            expires_at,
        })
    }

    /// Revoke a token id until `expires_at`. Expired entries are pruned here.
    pub fn revoke(&self, token_id: &str, expires_at: DateTime<Utc>) {
        let now = Utc::now();
        self.revoked.retain(|_, exp| *exp > now);
        self.revoked.insert(token_id.to_string(), expires_at);
        tracing::debug!("Token revoked, {} entries on list", self.revoked.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_verify() {
        let issuer = TokenIssuer::new("secret", 24);
        let user_id = Uuid::new_v4();
        let (token, expires_at) = issuer.issue(user_id, Role::Seller).unwrap();

        let verified = issuer.verify(&token).unwrap();
        assert_eq!(verified.user_id, user_id);
        assert_eq!(verified.role, Role::Seller);
        assert_eq!(verified.expires_at.timestamp(), expires_at.timestamp());
        assert!(expires_at > Utc::now() + Duration::hours(23));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = TokenIssuer::new("secret", 24);
        let other = TokenIssuer::new("other", 24);
        let (token, _) = issuer.issue(Uuid::new_v4(), Role::Customer).unwrap();
        assert_eq!(other.verify(&token), Err(TokenError::Invalid));
        assert_eq!(issuer.verify("garbage"), Err(TokenError::Invalid));
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = TokenIssuer::new("secret", -1);
        let (token, _) = issuer.issue(Uuid::new_v4(), Role::Customer).unwrap();
        assert_eq!(issuer.verify(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn test_revoked_token_rejected() {
        let issuer = TokenIssuer::new("secret", 24);
        let (token, _) = issuer.issue(Uuid::new_v4(), Role::Customer).unwrap();
        let verified = issuer.verify(&token).unwrap();

        issuer.revoke(&verified.token_id, verified.expires_at);
        assert_eq!(issuer.verify(&token), Err(TokenError::Revoked));

        // A fresh token for the same user is unaffected
        let (fresh, _) = issuer.issue(verified.user_id, Role::Customer).unwrap();
        assert!(issuer.verify(&fresh).is_ok());
    }
}
