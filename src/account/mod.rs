//! User accounts and authentication
//!
//! Registration, login/logout, profiles and password reset. `token` issues
//! and verifies JWTs; `middleware` resolves the caller for protected routes.

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;
pub mod token;
pub mod validation;

pub use models::{Role, User, UserProfile};
pub use service::UserService;
pub use token::{AuthUser, TokenIssuer};
