//! Core types used throughout the system
//!
//! Identifier aliases give every UUID column a name that says what it points
//! at. `ParseEnumError` is shared by the string-backed status enums that are
//! stored as TEXT columns.

use thiserror::Error;
use uuid::Uuid;

/// User ID - primary key of `users`, also the seller id on listings.
pub type UserId = Uuid;

/// Product ID
pub type ProductId = Uuid;

/// Service listing ID
pub type ServiceId = Uuid;

/// Cart ID - one cart per user at most
pub type CartId = Uuid;

/// Cart item ID
pub type CartItemId = Uuid;

/// Order ID
pub type OrderId = Uuid;

/// Rating ID
pub type RatingId = Uuid;

/// Payment ID
pub type PaymentId = Uuid;

/// A TEXT column (or request field) held a value outside the enum.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// String conversions for an enum stored in a TEXT column.
///
/// Generates `as_str`, `Display`, `FromStr` and `TryFrom<String>` (the last
/// one is what `#[sqlx(try_from = "String")]` needs).
macro_rules! text_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = $crate::core_types::ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err($crate::core_types::ParseEnumError::new($kind, s)),
                }
            }
        }

        impl TryFrom<String> for $ty {
            type Error = $crate::core_types::ParseEnumError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }
    };
}

pub(crate) use text_enum;
