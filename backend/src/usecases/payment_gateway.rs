use std::collections::HashMap;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crates::{
    domain::value_objects::enums::refund_reasons::RefundReason,
    payments::stripe_client::{PaymentIntentHandle, RefundOutcome, StripeClient, StripeEvent},
};

/// Card-payment collaborator. Every call that moves money carries an idempotency key.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_charge_intent(
        &self,
        amount_cents: i64,
        metadata: HashMap<String, String>,
        idempotency_key: String,
    ) -> AnyResult<PaymentIntentHandle>;

    async fn refund_payment(
        &self,
        payment_id: String,
        reason: RefundReason,
        idempotency_key: String,
    ) -> AnyResult<RefundOutcome>;

    fn verify_event(
        &self,
        payload: &[u8],
        signature: &str,
        now: DateTime<Utc>,
    ) -> AnyResult<StripeEvent>;
}

pub struct StripePaymentGateway {
    client: StripeClient,
    currency: String,
}

impl StripePaymentGateway {
    pub fn new(client: StripeClient, currency: String) -> Self {
        Self { client, currency }
    }
}

#[async_trait]
impl PaymentGateway for StripePaymentGateway {
    async fn create_charge_intent(
        &self,
        amount_cents: i64,
        metadata: HashMap<String, String>,
        idempotency_key: String,
    ) -> AnyResult<PaymentIntentHandle> {
        self.client
            .create_payment_intent(amount_cents, &self.currency, metadata, &idempotency_key)
            .await
    }

    async fn refund_payment(
        &self,
        payment_id: String,
        reason: RefundReason,
        idempotency_key: String,
    ) -> AnyResult<RefundOutcome> {
        let metadata = HashMap::from([("refund_tag".to_string(), reason.tag().to_string())]);
        self.client
            .create_refund(&payment_id, reason.stripe_reason(), metadata, &idempotency_key)
            .await
    }

    fn verify_event(
        &self,
        payload: &[u8],
        signature: &str,
        now: DateTime<Utc>,
    ) -> AnyResult<StripeEvent> {
        self.client
            .verify_webhook_signature_at(payload, signature, now)
            .map_err(|err| err.context("stripe webhook verification failed"))
    }
}
