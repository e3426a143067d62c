//! M-Pesa STK push client
//!
//! Two calls per payment: an OAuth client-credentials token, then the
//! `processrequest` call that prompts the customer's phone. The provider
//! answers asynchronously through the callback webhook.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::MpesaConfig;
use crate::money::whole_units_ceil;

const TRANSACTION_TYPE: &str = "CustomerPayBillOnline";
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
/// Daraja timestamps are East Africa Time
const EAT_OFFSET_SECS: i32 = 3 * 3600;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("request rejected ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("unexpected response: {0}")]
    InvalidResponse(String),

    #[error("amount {0} cannot be charged")]
    InvalidAmount(Decimal),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StkPushRequest {
    /// Normalized `254XXXXXXXXX`
    pub phone: String,
    pub amount: Decimal,
    pub account_reference: String,
    pub transaction_desc: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StkPushAccepted {
    pub checkout_request_id: String,
    pub merchant_request_id: String,
    pub customer_message: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn stk_push(&self, request: &StkPushRequest) -> Result<StkPushAccepted, GatewayError>;
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    access_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushBody<'a> {
    business_short_code: &'a str,
    password: String,
    timestamp: String,
    transaction_type: &'static str,
    amount: u64,
    party_a: &'a str,
    party_b: &'a str,
    phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    callback_url: &'a str,
    account_reference: &'a str,
    transaction_desc: &'a str,
}

#[derive(Debug, Deserialize)]
struct StkPushResponse {
    #[serde(rename = "MerchantRequestID", default)]
    merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID", default)]
    checkout_request_id: String,
    #[serde(rename = "ResponseCode", default)]
    response_code: String,
    #[serde(rename = "ResponseDescription", default)]
    response_description: String,
    #[serde(rename = "CustomerMessage", default)]
    customer_message: String,
}

/// Error body returned with non-2xx statuses
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "errorCode", default)]
    error_code: String,
    #[serde(rename = "errorMessage", default)]
    error_message: String,
}

/// `YYYYMMDDHHMMSS` in East Africa Time
pub fn stk_timestamp(now: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(EAT_OFFSET_SECS) {
        Some(eat) => now.with_timezone(&eat).format(TIMESTAMP_FORMAT).to_string(),
        None => now.format(TIMESTAMP_FORMAT).to_string(),
    }
}

/// base64(short_code + passkey + timestamp)
pub fn stk_password(short_code: &str, passkey: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{}{}{}", short_code, passkey, timestamp))
}

pub struct MpesaClient {
    config: MpesaConfig,
    client: reqwest::Client,
}

impl MpesaClient {
    pub fn new(config: MpesaConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Http(format!("failed to create HTTP client: {}", e)))?;
        tracing::info!("M-Pesa client configured for {}", config.base_url);
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let response = self
            .client
            .get(self.url("/oauth/v1/generate"))
            .query(&[("grant_type", "client_credentials")])
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await
            .map_err(|e| GatewayError::Http(format!("token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Rejected {
                code: status.as_u16().to_string(),
                message: "access token request rejected".to_string(),
            });
        }

        let token: AccessTokenResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(format!("token response: {}", e)))?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl PaymentGateway for MpesaClient {
    async fn stk_push(&self, request: &StkPushRequest) -> Result<StkPushAccepted, GatewayError> {
        let amount = whole_units_ceil(request.amount)
            .filter(|a| *a > 0)
            .ok_or(GatewayError::InvalidAmount(request.amount))?;

        let token = self.access_token().await?;
        let timestamp = stk_timestamp(Utc::now());
        let body = StkPushBody {
            business_short_code: &self.config.short_code,
            password: stk_password(&self.config.short_code, &self.config.passkey, &timestamp),
            timestamp,
            transaction_type: TRANSACTION_TYPE,
            amount,
            party_a: &request.phone,
            party_b: &self.config.short_code,
            phone_number: &request.phone,
            callback_url: &self.config.callback_url,
            account_reference: &request.account_reference,
            transaction_desc: &request.transaction_desc,
        };

        let response = self
            .client
            .post(self.url("/mpesa/stkpush/v1/processrequest"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Http(format!("STK push failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Http(format!("failed to read STK response: {}", e)))?;

        if !status.is_success() {
            let err: ApiErrorBody = serde_json::from_str(&text).map_err(|_| {
                GatewayError::InvalidResponse(format!("HTTP {}: {}", status, text))
            })?;
            return Err(GatewayError::Rejected {
                code: err.error_code,
                message: err.error_message,
            });
        }

        let parsed: StkPushResponse = serde_json::from_str(&text)
            .map_err(|e| GatewayError::InvalidResponse(format!("STK response: {}", e)))?;
        if parsed.response_code != "0" {
            return Err(GatewayError::Rejected {
                code: parsed.response_code,
                message: parsed.response_description,
            });
        }
        if parsed.checkout_request_id.is_empty() {
            return Err(GatewayError::InvalidResponse(
                "missing CheckoutRequestID".to_string(),
            ));
        }

        tracing::info!(
            "STK push accepted: checkout {} for {}",
            parsed.checkout_request_id,
            request.account_reference
        );
        Ok(StkPushAccepted {
            checkout_request_id: parsed.checkout_request_id,
            merchant_request_id: parsed.merchant_request_id,
            customer_message: parsed.customer_message,
        })
    }
}

/// Accepts every push without network access. Used by `--memory` mode and
/// tests; the requests it saw can be inspected.
#[derive(Default)]
pub struct MockGateway {
    seq: AtomicU64,
    requests: Mutex<Vec<StkPushRequest>>,
    fail: bool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that rejects every request
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<StkPushRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn stk_push(&self, request: &StkPushRequest) -> Result<StkPushAccepted, GatewayError> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.clone());
        if self.fail {
            return Err(GatewayError::Rejected {
                code: "500.001.1001".to_string(),
                message: "mock gateway rejects all requests".to_string(),
            });
        }
        let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(StkPushAccepted {
            checkout_request_id: format!("ws_CO_MOCK_{:06}", n),
            merchant_request_id: format!("MOCK-{:06}", n),
            customer_message: "Success. Request accepted for processing".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_is_eat() {
        let now = Utc.with_ymd_and_hms(2023, 12, 17, 12, 31, 32).unwrap();
        assert_eq!(stk_timestamp(now), "20231217153132");
    }

    #[test]
    fn test_password_encoding() {
        let password = stk_password("174379", "passkey", "20231217153132");
        let decoded = STANDARD.decode(password).unwrap();
        assert_eq!(decoded, b"174379passkey20231217153132");
    }

    #[test]
    fn test_stk_body_field_names() {
        let body = StkPushBody {
            business_short_code: "174379",
            password: "pw".into(),
            timestamp: "20231217153132".into(),
            transaction_type: TRANSACTION_TYPE,
            amount: 2,
            party_a: "254708374149",
            party_b: "174379",
            phone_number: "254708374149",
            callback_url: "https://example.com/api/v1/callback",
            account_reference: "ORD-1",
            transaction_desc: "Order payment",
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["BusinessShortCode"], "174379");
        assert_eq!(json["CallBackURL"], "https://example.com/api/v1/callback");
        assert_eq!(json["PartyA"], "254708374149");
        assert_eq!(json["TransactionType"], "CustomerPayBillOnline");
        assert_eq!(json["Amount"], 2);
    }

    #[test]
    fn test_rejection_body_parses() {
        let body: StkPushResponse = serde_json::from_str(
            r#"{"MerchantRequestID":"m","CheckoutRequestID":"c","ResponseCode":"1","ResponseDescription":"busy","CustomerMessage":""}"#,
        )
        .unwrap();
        assert_eq!(body.response_code, "1");
        let err: ApiErrorBody = serde_json::from_str(
            r#"{"requestId":"x","errorCode":"400.002.02","errorMessage":"Bad Request - Invalid Amount"}"#,
        )
        .unwrap();
        assert_eq!(err.error_code, "400.002.02");
    }

    #[tokio::test]
    async fn test_mock_gateway() {
        let gateway = MockGateway::new();
        let req = StkPushRequest {
            phone: "254712345678".into(),
            amount: Decimal::from(10),
            account_reference: "ORD-1".into(),
            transaction_desc: "test".into(),
        };
        let first = gateway.stk_push(&req).await.unwrap();
        let second = gateway.stk_push(&req).await.unwrap();
        assert_ne!(first.checkout_request_id, second.checkout_request_id);
        assert_eq!(gateway.requests().len(), 2);

        assert!(MockGateway::failing().stk_push(&req).await.is_err());
    }
}
