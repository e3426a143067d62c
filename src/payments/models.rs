use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::core_types::{PaymentId, UserId, text_enum};

pub const PAYMENT_METHOD_MPESA: &str = "M-Pesa";

/// Outcome reported by the provider callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum TransactionStatus {
    Completed,
    Failed,
}

text_enum!(TransactionStatus, "transaction status", {
    Completed => "Completed",
    Failed => "Failed",
});

impl TransactionStatus {
    /// Result code 0 is success, anything else is a failure
    pub fn from_result_code(code: i32) -> Self {
        if code == 0 {
            TransactionStatus::Completed
        } else {
            TransactionStatus::Failed
        }
    }
}

/// An STK push this system initiated, kept to attribute the callback.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct PaymentRequest {
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    #[schema(value_type = uuid::Uuid)]
    pub customer_id: UserId,
    pub phone: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub account_reference: String,
    pub created_at: DateTime<Utc>,
}

/// Append-only payment record, one per distinct transaction id
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct Payment {
    #[schema(value_type = uuid::Uuid)]
    pub id: PaymentId,
    #[schema(value_type = Option<uuid::Uuid>)]
    pub customer_id: Option<UserId>,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub payment_method: String,
    /// Provider receipt number, or the checkout request id when absent
    pub transaction_id: String,
    pub checkout_request_id: String,
    #[sqlx(try_from = "String")]
    pub status: TransactionStatus,
    pub result_code: i32,
    pub result_desc: String,
    pub customer_phone: Option<String>,
    pub account_reference: Option<String>,
    /// Provider timestamp, `YYYYMMDDHHMMSS`
    pub transaction_date: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of recording a callback
#[derive(Debug, Clone)]
pub enum Recorded {
    New(Payment),
    /// Transaction id already recorded; carries the existing row
    Duplicate(Payment),
}

impl Recorded {
    pub fn payment(&self) -> &Payment {
        match self {
            Recorded::New(p) | Recorded::Duplicate(p) => p,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Recorded::Duplicate(_))
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct InitiatePaymentRequest {
    #[schema(example = "0712345678")]
    pub phone_number: String,
    #[schema(value_type = String, example = "1500")]
    pub amount: Decimal,
    /// Order number or free-form reference
    #[schema(example = "ORD-1718000000000000000")]
    pub account_reference: String,
    pub transaction_desc: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InitiatePaymentResponse {
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub customer_message: String,
}

/// Body the provider expects back from the webhook. The recorded payment
/// rides along for operators replaying callbacks by hand.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i32,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<Payment>,
}

impl CallbackAck {
    pub fn accepted() -> Self {
        Self {
            result_code: 0,
            result_desc: "Accepted".to_string(),
            payment: None,
        }
    }

    pub fn recorded(recorded: &Recorded) -> Self {
        Self {
            payment: Some(recorded.payment().clone()),
            ..Self::accepted()
        }
    }
}
