//! STK push callback parsing
//!
//! The provider nests the outcome under `Body.stkCallback`. Metadata items
//! are `{Name, Value}` pairs whose values arrive as numbers or strings, and
//! the whole `CallbackMetadata` block is missing on failed transactions.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::models::TransactionStatus;

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("malformed callback body: {0}")]
    Malformed(String),

    #[error("callback is missing {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Body")]
    body: EnvelopeBody,
}

#[derive(Debug, Deserialize)]
struct EnvelopeBody {
    #[serde(rename = "stkCallback")]
    stk_callback: RawCallback,
}

#[derive(Debug, Deserialize)]
struct RawCallback {
    #[serde(rename = "MerchantRequestID", default)]
    merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID", default)]
    checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    result_code: Value,
    #[serde(rename = "ResultDesc", default)]
    result_desc: String,
    #[serde(rename = "CallbackMetadata")]
    callback_metadata: Option<Metadata>,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(rename = "Item", default)]
    item: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
struct MetadataItem {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Value", default)]
    value: Option<Value>,
}

/// Flattened callback
#[derive(Debug, Clone, PartialEq)]
pub struct StkCallback {
    pub merchant_request_id: String,
    pub checkout_request_id: String,
    pub result_code: i32,
    pub result_desc: String,
    pub amount: Option<Decimal>,
    pub receipt_number: Option<String>,
    pub phone_number: Option<String>,
    pub transaction_date: Option<String>,
}

impl StkCallback {
    /// Receipt number, or the checkout request id when the provider sent none
    pub fn transaction_id(&self) -> &str {
        self.receipt_number
            .as_deref()
            .unwrap_or(&self.checkout_request_id)
    }

    pub fn status(&self) -> TransactionStatus {
        TransactionStatus::from_result_code(self.result_code)
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_decimal(value: &Value) -> Option<Decimal> {
    let text = value_text(value)?;
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

fn result_code(value: &Value) -> Result<i32, CallbackError> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed
        .and_then(|c| i32::try_from(c).ok())
        .ok_or(CallbackError::MissingField("ResultCode"))
}

pub fn parse_callback(body: &[u8]) -> Result<StkCallback, CallbackError> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| CallbackError::Malformed(e.to_string()))?;
    let raw = envelope.body.stk_callback;

    if raw.checkout_request_id.trim().is_empty() {
        return Err(CallbackError::MissingField("CheckoutRequestID"));
    }

    let mut parsed = StkCallback {
        merchant_request_id: raw.merchant_request_id,
        checkout_request_id: raw.checkout_request_id,
        result_code: result_code(&raw.result_code)?,
        result_desc: raw.result_desc,
        amount: None,
        receipt_number: None,
        phone_number: None,
        transaction_date: None,
    };

    let items = raw.callback_metadata.map(|m| m.item).unwrap_or_default();
    for item in items {
        let Some(value) = item.value else { continue };
        match item.name.as_str() {
            "Amount" => parsed.amount = value_decimal(&value),
            "MpesaReceiptNumber" => parsed.receipt_number = value_text(&value),
            "PhoneNumber" => parsed.phone_number = value_text(&value),
            "TransactionDate" => parsed.transaction_date = value_text(&value),
            _ => {}
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUCCESS: &str = r#"{"Body": {"stkCallback": {
        "MerchantRequestID": "29115-34620561-1",
        "CheckoutRequestID": "ws_CO_191220191020363925",
        "ResultCode": 0,
        "ResultDesc": "The service request is processed successfully.",
        "CallbackMetadata": {"Item": [
            {"Name": "Amount", "Value": 1.0},
            {"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"},
            {"Name": "Balance"},
            {"Name": "TransactionDate", "Value": 20191219102115},
            {"Name": "PhoneNumber", "Value": 254708374149}]}}}}"#;

    #[test]
    fn test_parse_success() {
        let cb = parse_callback(SUCCESS.as_bytes()).unwrap();
        assert_eq!(cb.result_code, 0);
        assert_eq!(cb.status(), TransactionStatus::Completed);
        assert_eq!(cb.amount, Some(Decimal::ONE));
        assert_eq!(cb.transaction_id(), "NLJ7RT61SV");
        assert_eq!(cb.phone_number.as_deref(), Some("254708374149"));
        assert_eq!(cb.transaction_date.as_deref(), Some("20191219102115"));
    }

    #[test]
    fn test_parse_failure_without_metadata() {
        let body = r#"{"Body": {"stkCallback": {
            "MerchantRequestID": "m-1",
            "CheckoutRequestID": "ws_CO_1",
            "ResultCode": 1032,
            "ResultDesc": "Request cancelled by user"}}}"#;
        let cb = parse_callback(body.as_bytes()).unwrap();
        assert_eq!(cb.status(), TransactionStatus::Failed);
        assert_eq!(cb.transaction_id(), "ws_CO_1");
        assert!(cb.amount.is_none());
    }

    #[test]
    fn test_string_values() {
        let body = r#"{"Body": {"stkCallback": {
            "CheckoutRequestID": "ws_CO_2",
            "ResultCode": "0",
            "CallbackMetadata": {"Item": [
                {"Name": "Amount", "Value": "150.50"},
                {"Name": "PhoneNumber", "Value": "254712345678"}]}}}}"#;
        let cb = parse_callback(body.as_bytes()).unwrap();
        assert_eq!(cb.result_code, 0);
        assert_eq!(cb.amount, Some(Decimal::new(15050, 2)));
        assert_eq!(cb.phone_number.as_deref(), Some("254712345678"));
    }

    #[test]
    fn test_malformed_bodies() {
        assert!(parse_callback(b"not json").is_err());
        assert!(parse_callback(br#"{"Body": {}}"#).is_err());
        assert!(matches!(
            parse_callback(br#"{"Body": {"stkCallback": {"ResultCode": 0}}}"#),
            Err(CallbackError::MissingField("CheckoutRequestID"))
        ));
        assert!(matches!(
            parse_callback(br#"{"Body": {"stkCallback": {"CheckoutRequestID": "x", "ResultCode": "abc"}}}"#),
            Err(CallbackError::MissingField("ResultCode"))
        ));
    }
}
