//! API response envelope
//!
//! - success: `{"message": "...", "data": ...}`
//! - failure: `{"error": "..."}`

use serde::Serialize;
use utoipa::ToSchema;

/// Unified success response wrapper
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Human readable outcome
    #[schema(example = "ok")]
    pub message: String,
    /// Payload, omitted for message-only responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Success response carrying data
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    /// Success response without data
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }
}

/// Failure body
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "product not found")]
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_serializes_message_and_data() {
        let json = serde_json::to_value(ApiResponse::success("ok", 42)).unwrap();
        assert_eq!(json["message"], "ok");
        assert_eq!(json["data"], 42);
    }

    #[test]
    fn test_message_only_omits_data() {
        let json = serde_json::to_value(ApiResponse::message("item removed")).unwrap();
        assert_eq!(json["message"], "item removed");
        assert!(json.get("data").is_none());
    }
}
