//! Data models for user accounts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::core_types::{UserId, text_enum};

/// Account role. A phone number may hold one account per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Seller,
    Admin,
}

text_enum!(Role, "role", {
    Customer => "customer",
    Seller => "seller",
    Admin => "admin",
});

impl Role {
    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Sellers and admins may publish listings
    pub fn can_sell(&self) -> bool {
        matches!(self, Role::Seller | Role::Admin)
    }
}

/// Stored user row. Holds credentials, so it is never serialized directly;
/// responses use [`UserProfile`].
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub location: Option<String>,
    pub phone_number: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub is_active: bool,
    pub reset_code: Option<String>,
    pub reset_code_expires_at: Option<DateTime<Utc>>,
    /// Wrong codes entered against the current reset code
    pub reset_attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// True when `code` matches the stored reset code and has not expired.
    pub fn reset_code_matches(&self, code: &str, now: DateTime<Utc>) -> bool {
        match (&self.reset_code, self.reset_code_expires_at) {
            (Some(stored), Some(expires_at)) => stored == code && now <= expires_at,
            _ => false,
        }
    }

    /// Check `code` and count a miss. After `max_attempts` misses the code is
    /// dropped, so a new one has to be requested.
    pub fn check_reset_code(&mut self, code: &str, now: DateTime<Utc>, max_attempts: i32) -> bool {
        if self.reset_code_matches(code, now) {
            return true;
        }
        if self.reset_code.is_some() {
            self.reset_attempts += 1;
            if self.reset_attempts >= max_attempts {
                self.clear_reset_code();
            }
        }
        false
    }

    pub fn clear_reset_code(&mut self) {
        self.reset_code = None;
        self.reset_code_expires_at = None;
        self.reset_attempts = 0;
    }
}

/// Public view of a user
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserProfile {
    #[schema(value_type = uuid::Uuid)]
    pub id: UserId,
    #[schema(example = "Wanjiru")]
    pub first_name: String,
    #[schema(example = "Kamau")]
    pub last_name: String,
    #[schema(example = "wanjiru@example.com")]
    pub email: String,
    #[schema(example = "254712345678")]
    pub phone_number: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub location: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            first_name: u.first_name,
            last_name: u.last_name,
            email: u.email,
            phone_number: u.phone_number,
            address: u.address,
            city: u.city,
            postal_code: u.postal_code,
            location: u.location,
            role: u.role,
            is_active: u.is_active,
            created_at: u.created_at,
        }
    }
}

/// Registration request
#[derive(Debug, Clone, Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[schema(example = "Wanjiru")]
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[schema(example = "Kamau")]
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[schema(example = "wanjiru@example.com")]
    #[validate(email)]
    pub email: String,
    #[schema(example = "0712345678")]
    pub phone_number: String,
    #[schema(example = "password123")]
    #[validate(length(min = 8))]
    pub password: String,
    #[serde(default)]
    pub role: Role,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub location: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "0712345678")]
    pub phone_number: String,
    #[schema(example = "password123")]
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

/// Login response
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserProfile,
}

/// Partial profile update. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, ToSchema, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub location: Option<String>,
    #[validate(length(min = 8))]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    #[schema(example = "wanjiru@example.com")]
    pub email: String,
    #[schema(example = "0712345678")]
    pub phone_number: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub phone_number: String,
    #[schema(example = "4821")]
    pub code: String,
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user_with_code(code: Option<&str>, expires_in: Duration) -> User {
        let now = Utc::now();
        User {
            id: uuid::Uuid::new_v4(),
            first_name: "Test".into(),
            last_name: "User".into(),
            email: "t@example.com".into(),
            password_hash: "x".into(),
            address: None,
            city: None,
            postal_code: None,
            location: None,
            phone_number: "254712345678".into(),
            role: Role::Customer,
            is_active: true,
            reset_code: code.map(String::from),
            reset_code_expires_at: Some(now + expires_in),
            reset_attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_role_parse_and_default() {
        assert_eq!("seller".parse::<Role>(), Ok(Role::Seller));
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::default(), Role::Customer);
        let req: LoginRequest =
            serde_json::from_str(r#"{"phone_number":"0712345678","password":"x"}"#).unwrap();
        assert_eq!(req.role, Role::Customer);
    }

    #[test]
    fn test_register_request_validation() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"first_name":"A","last_name":"B","email":"bad","phone_number":"0712345678","password":"short"}"#,
        )
        .unwrap();
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(!fields.contains_key("first_name"));
    }

    #[test]
    fn test_role_permissions() {
        assert!(Role::Admin.is_admin());
        assert!(Role::Seller.can_sell());
        assert!(!Role::Customer.can_sell());
    }

    #[test]
    fn test_reset_code_matches() {
        let now = Utc::now();
        let user = user_with_code(Some("1234"), Duration::minutes(15));
        assert!(user.reset_code_matches("1234", now));
        assert!(!user.reset_code_matches("4321", now));

        let expired = user_with_code(Some("1234"), Duration::minutes(-1));
        assert!(!expired.reset_code_matches("1234", now));

        let none = user_with_code(None, Duration::minutes(15));
        assert!(!none.reset_code_matches("1234", now));
    }

    #[test]
    fn test_reset_code_dropped_after_max_attempts() {
        let now = Utc::now();
        let mut user = user_with_code(Some("1234"), Duration::minutes(15));
        for attempt in 1..5 {
            assert!(!user.check_reset_code("0000", now, 5));
            assert_eq!(user.reset_attempts, attempt);
        }
        assert!(!user.check_reset_code("0000", now, 5));
        assert!(user.reset_code.is_none());
        assert_eq!(user.reset_attempts, 0);
        // The right code no longer works either
        assert!(!user.check_reset_code("1234", now, 5));
    }

    #[test]
    fn test_profile_hides_credentials() {
        let user = user_with_code(Some("1234"), Duration::minutes(15));
        let json = serde_json::to_value(UserProfile::from(user)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("reset_code").is_none());
        assert_eq!(json["role"], "customer");
    }
}
