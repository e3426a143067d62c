//! Payment initiation and callback recording

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::callback::StkCallback;
use super::gateway::{PaymentGateway, StkPushRequest};
use super::models::{
    InitiatePaymentRequest, InitiatePaymentResponse, PAYMENT_METHOD_MPESA, Payment,
    PaymentRequest, Recorded, TransactionStatus,
};
use crate::account::AuthUser;
use crate::account::validation::{normalize_phone, required};
use crate::error::ServiceError;
use crate::money::validate_price;
use crate::orders::models::PaymentStatus;
use crate::store::Store;

const DEFAULT_TRANSACTION_DESC: &str = "Palace order payment";

pub struct PaymentService {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentService {
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }

    /// Send an STK push and remember who asked for it
    pub async fn initiate(
        &self,
        caller: &AuthUser,
        req: InitiatePaymentRequest,
    ) -> Result<InitiatePaymentResponse, ServiceError> {
        let phone = normalize_phone(&req.phone_number)?;
        let amount = validate_price(req.amount)?;
        let account_reference = required(&req.account_reference, "account_reference")?;
        let transaction_desc = req
            .transaction_desc
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_TRANSACTION_DESC.to_string());

        // A reference naming an order must be the caller's and cover its total
        if let Some(order) = self.store.get_order_by_number(&account_reference).await? {
            if !caller.can_act_for(order.user_id) {
                return Err(ServiceError::not_found("order not found"));
            }
            if order.payment_status == PaymentStatus::Paid {
                return Err(ServiceError::conflict("order is already paid"));
            }
            if amount < order.total_amount {
                return Err(ServiceError::validation(format!(
                    "amount {} is less than the order total {}",
                    amount, order.total_amount
                )));
            }
        }

        let push = StkPushRequest {
            phone: phone.clone(),
            amount,
            account_reference: account_reference.clone(),
            transaction_desc,
        };
        let accepted = self.gateway.stk_push(&push).await.map_err(|e| {
            tracing::error!("STK push for {} failed: {}", account_reference, e);
            ServiceError::Gateway(e.to_string())
        })?;

        let request = PaymentRequest {
            checkout_request_id: accepted.checkout_request_id.clone(),
            merchant_request_id: accepted.merchant_request_id.clone(),
            customer_id: caller.user_id,
            phone,
            amount,
            account_reference,
            created_at: Utc::now(),
        };
        self.store.insert_payment_request(&request).await?;

        Ok(InitiatePaymentResponse {
            checkout_request_id: accepted.checkout_request_id,
            merchant_request_id: accepted.merchant_request_id,
            customer_message: accepted.customer_message,
        })
    }

    /// Record the callback once per transaction id. A matching order's
    /// payment status follows the first recording only.
    pub async fn handle_callback(&self, callback: StkCallback) -> Result<Recorded, ServiceError> {
        let request = self
            .store
            .find_payment_request(&callback.checkout_request_id)
            .await?;
        if request.is_none() {
            tracing::warn!(
                "Callback for unknown checkout request {}",
                callback.checkout_request_id
            );
        }

        let status = callback.status();
        let payment = Payment {
            id: Uuid::new_v4(),
            customer_id: request.as_ref().map(|r| r.customer_id),
            amount: callback
                .amount
                .or_else(|| request.as_ref().map(|r| r.amount))
                .unwrap_or_default(),
            payment_method: PAYMENT_METHOD_MPESA.to_string(),
            transaction_id: callback.transaction_id().to_string(),
            checkout_request_id: callback.checkout_request_id.clone(),
            status,
            result_code: callback.result_code,
            result_desc: callback.result_desc.clone(),
            customer_phone: callback
                .phone_number
                .clone()
                .or_else(|| request.as_ref().map(|r| r.phone.clone())),
            account_reference: request.as_ref().map(|r| r.account_reference.clone()),
            transaction_date: callback.transaction_date.clone(),
            created_at: Utc::now(),
        };

        let recorded = self.store.record_payment(&payment).await?;
        if recorded.is_duplicate() {
            tracing::info!(
                "Duplicate callback for transaction {} ignored",
                payment.transaction_id
            );
            return Ok(recorded);
        }

        tracing::info!(
            "Payment {} recorded: {} ({})",
            payment.transaction_id,
            status,
            payment.result_desc
        );

        if let Some(reference) = &payment.account_reference {
            self.settle_order(reference, &payment).await?;
        }
        Ok(recorded)
    }

    /// Move the referenced order's payment status. A paid order stays paid,
    /// and a completed payment below the order total leaves it pending.
    async fn settle_order(&self, reference: &str, payment: &Payment) -> Result<(), ServiceError> {
        let Some(order) = self.store.get_order_by_number(reference).await? else {
            return Ok(());
        };
        if order.payment_status == PaymentStatus::Paid {
            tracing::info!("Order {} already paid, {} not applied", reference, payment.transaction_id);
            return Ok(());
        }

        let order_status = match payment.status {
            TransactionStatus::Completed if payment.amount < order.total_amount => {
                tracing::warn!(
                    "Payment {} of {} does not cover order {} total {}",
                    payment.transaction_id,
                    payment.amount,
                    reference,
                    order.total_amount
                );
                return Ok(());
            }
            TransactionStatus::Completed => PaymentStatus::Paid,
            TransactionStatus::Failed => PaymentStatus::Failed,
        };
        if self.store.set_payment_status(reference, order_status).await? {
            tracing::info!("Order {} payment status set to {}", reference, order_status);
        }
        Ok(())
    }

    pub async fn my_payments(&self, caller: &AuthUser) -> Result<Vec<Payment>, ServiceError> {
        Ok(self.store.list_customer_payments(caller.user_id).await?)
    }
}
