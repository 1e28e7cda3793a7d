use std::collections::HashMap;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use tracing::{error, info};

type HmacSha256 = Hmac<Sha256>;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Signed webhook timestamps older or newer than this are rejected.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub const PAYMENT_INTENT_SUCCEEDED: &str = "payment_intent.succeeded";

/// Minimal Stripe client built on reqwest.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub created: Option<i64>,
    pub livemode: Option<bool>,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub amount: i64,
    #[serde(default)]
    pub amount_received: Option<i64>,
    pub currency: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripePaymentIntent {
    /// What was actually captured, falling back to the requested amount.
    pub fn paid_amount(&self) -> i64 {
        self.amount_received.unwrap_or(self.amount)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntentHandle {
    pub id: String,
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundOutcome {
    Refunded { refund_id: String },
    AlreadyRefunded,
}

/// A non-2xx Stripe response, kept typed so callers can branch on `code`.
#[derive(Debug, Clone, Error)]
#[error("Stripe API request failed: {context} (status {status}, code={code:?}, request_id={request_id:?})")]
pub struct StripeApiError {
    pub context: String,
    pub status: u16,
    pub code: Option<String>,
    pub message: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorDetails,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetails {
    #[serde(rename = "type")]
    type_: Option<String>,
    code: Option<String>,
    message: Option<String>,
    param: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: String, webhook_secret: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key,
            webhook_secret,
            api_base: STRIPE_API_BASE.to_string(),
        }
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let request_id = resp
            .headers()
            .get("request-id")
            .or_else(|| resp.headers().get("stripe-request-id"))
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let details = serde_json::from_str::<StripeErrorEnvelope>(&body)
            .map(|envelope| envelope.error)
            .ok();

        error!(
            status = %status,
            stripe_request_id = ?request_id,
            stripe_error_type = ?details.as_ref().and_then(|d| d.type_.as_deref()),
            stripe_error_code = ?details.as_ref().and_then(|d| d.code.as_deref()),
            stripe_error_param = ?details.as_ref().and_then(|d| d.param.as_deref()),
            context = %context,
            "stripe: api request failed"
        );

        Err(StripeApiError {
            context: context.to_string(),
            status: status.as_u16(),
            code: details.as_ref().and_then(|d| d.code.clone()),
            message: details.and_then(|d| d.message),
            request_id,
        }
        .into())
    }

    /// Creates a PaymentIntent for the exact amount. https://stripe.com/docs/api/payment_intents/create
    pub async fn create_payment_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        metadata: HashMap<String, String>,
        idempotency_key: &str,
    ) -> Result<PaymentIntentHandle> {
        let mut body: Vec<(String, String)> = vec![
            ("amount".to_string(), amount_cents.to_string()),
            ("currency".to_string(), currency.to_string()),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];

        for (key, value) in metadata {
            body.push((format!("metadata[{}]", key), value));
        }

        let resp = self
            .http
            .post(format!("{}/payment_intents", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("Idempotency-Key", idempotency_key)
            .form(&body)
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create payment intent").await?;

        #[derive(Deserialize)]
        struct PaymentIntentResp {
            id: String,
            client_secret: Option<String>,
        }

        let parsed: PaymentIntentResp = resp.json().await?;
        Ok(PaymentIntentHandle {
            id: parsed.id,
            client_secret: parsed.client_secret,
        })
    }

    /// Refunds a PaymentIntent in full. https://stripe.com/docs/api/refunds/create
    pub async fn create_refund(
        &self,
        payment_intent_id: &str,
        reason: Option<&str>,
        metadata: HashMap<String, String>,
        idempotency_key: &str,
    ) -> Result<RefundOutcome> {
        let mut body: Vec<(String, String)> =
            vec![("payment_intent".to_string(), payment_intent_id.to_string())];

        if let Some(reason) = reason {
            body.push(("reason".to_string(), reason.to_string()));
        }
        for (key, value) in metadata {
            body.push((format!("metadata[{}]", key), value));
        }

        let resp = self
            .http
            .post(format!("{}/refunds", self.api_base))
            .header(AUTHORIZATION, format!("Bearer {}", self.secret_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header("Idempotency-Key", idempotency_key)
            .form(&body)
            .send()
            .await?;

        let resp = match Self::ensure_success(resp, "create refund").await {
            Ok(resp) => resp,
            Err(err) if is_already_refunded(&err) => {
                info!(payment_intent_id, "stripe: payment already refunded");
                return Ok(RefundOutcome::AlreadyRefunded);
            }
            Err(err) => return Err(err),
        };

        #[derive(Deserialize)]
        struct RefundResp {
            id: String,
        }

        let parsed: RefundResp = resp.json().await?;
        Ok(RefundOutcome::Refunded {
            refund_id: parsed.id,
        })
    }

    /// Verifies the webhook signature. https://stripe.com/docs/webhooks/signatures
    pub fn verify_webhook_signature(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent> {
        self.verify_webhook_signature_at(payload, signature_header, Utc::now())
    }

    pub fn verify_webhook_signature_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> Result<StripeEvent> {
        let mut timestamp: Option<&str> = None;
        let mut signatures: Vec<&str> = Vec::new();

        for part in signature_header.split(',').map(str::trim) {
            if let Some(rest) = part.strip_prefix("t=") {
                timestamp = Some(rest);
            } else if let Some(rest) = part.strip_prefix("v1=") {
                signatures.push(rest);
            }
        }

        let timestamp = timestamp.ok_or_else(|| anyhow!("missing timestamp in stripe-signature"))?;
        if signatures.is_empty() {
            anyhow::bail!("missing v1 in stripe-signature");
        }

        let signed_at: i64 = timestamp
            .parse()
            .map_err(|_| anyhow!("invalid timestamp in stripe-signature"))?;
        let skew = now
            .timestamp()
            .checked_sub(signed_at)
            .and_then(i64::checked_abs);
        if skew.is_none_or(|skew| skew > SIGNATURE_TOLERANCE_SECS) {
            anyhow::bail!("stripe-signature timestamp outside tolerance");
        }

        let mut mac = HmacSha256::new_from_slice(self.webhook_secret.as_bytes())?;
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(payload);
        let expected = mac.finalize().into_bytes();

        let matched = signatures.iter().any(|signature| {
            hex::decode(signature).is_ok_and(|provided| provided[..] == expected[..])
        });
        if !matched {
            anyhow::bail!("invalid webhook signature");
        }

        let event: StripeEvent = serde_json::from_slice(payload)?;
        Ok(event)
    }

    pub fn extract_payment_intent(event: &StripeEvent) -> Option<StripePaymentIntent> {
        serde_json::from_value(event.data.object.clone()).ok()
    }
}

fn is_already_refunded(err: &anyhow::Error) -> bool {
    err.downcast_ref::<StripeApiError>()
        .and_then(|api| api.code.as_deref())
        == Some("charge_already_refunded")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SECRET: &str = "whsec_test_secret";

    fn sign(timestamp: i64, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    fn client() -> StripeClient {
        StripeClient::new("sk_test".to_string(), SECRET.to_string())
    }

    fn payload() -> Vec<u8> {
        serde_json::json!({
            "id": "evt_1",
            "type": "payment_intent.succeeded",
            "data": { "object": {
                "id": "pi_1",
                "amount": 6000,
                "amount_received": 6000,
                "currency": "eur",
                "metadata": { "kind": "booking" }
            }}
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn accepts_a_fresh_valid_signature() {
        let now = Utc.timestamp_opt(1_750_000_000, 0).unwrap();
        let body = payload();
        let header = format!("t={},v1={}", now.timestamp(), sign(now.timestamp(), &body));

        let event = client()
            .verify_webhook_signature_at(&body, &header, now)
            .unwrap();
        let intent = StripeClient::extract_payment_intent(&event).unwrap();

        assert_eq!(event.id, "evt_1");
        assert_eq!(event.type_, PAYMENT_INTENT_SUCCEEDED);
        assert_eq!(intent.paid_amount(), 6000);
        assert_eq!(intent.metadata.get("kind").map(String::as_str), Some("booking"));
    }

    #[test]
    fn accepts_any_matching_v1_entry() {
        let now = Utc.timestamp_opt(1_750_000_000, 0).unwrap();
        let body = payload();
        let header = format!(
            "t={},v1=deadbeef,v1={}",
            now.timestamp(),
            sign(now.timestamp(), &body)
        );

        assert!(client().verify_webhook_signature_at(&body, &header, now).is_ok());
    }

    #[test]
    fn rejects_tampered_payload() {
        let now = Utc.timestamp_opt(1_750_000_000, 0).unwrap();
        let body = payload();
        let header = format!("t={},v1={}", now.timestamp(), sign(now.timestamp(), &body));
        let mut tampered = body.clone();
        tampered.push(b' ');

        assert!(client()
            .verify_webhook_signature_at(&tampered, &header, now)
            .is_err());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let signed_at = 1_750_000_000;
        let body = payload();
        let header = format!("t={},v1={}", signed_at, sign(signed_at, &body));

        let within = Utc.timestamp_opt(signed_at + SIGNATURE_TOLERANCE_SECS, 0).unwrap();
        let beyond = Utc
            .timestamp_opt(signed_at + SIGNATURE_TOLERANCE_SECS + 1, 0)
            .unwrap();

        assert!(client().verify_webhook_signature_at(&body, &header, within).is_ok());
        assert!(client().verify_webhook_signature_at(&body, &header, beyond).is_err());
    }

    #[test]
    fn rejects_extreme_timestamps_without_overflow() {
        let now = Utc.timestamp_opt(1_750_000_000, 0).unwrap();
        let body = payload();

        for header in [
            "t=-9223372036854775808,v1=00",
            "t=9223372036854775807,v1=00",
            "t=-9223372036854775807,v1=00",
        ] {
            let err = client()
                .verify_webhook_signature_at(&body, header, now)
                .unwrap_err();
            assert!(err.to_string().contains("outside tolerance"), "{header}: {err}");
        }
    }

    #[test]
    fn rejects_malformed_header() {
        let now = Utc.timestamp_opt(1_750_000_000, 0).unwrap();
        let body = payload();

        assert!(client().verify_webhook_signature_at(&body, "v1=abc", now).is_err());
        assert!(client()
            .verify_webhook_signature_at(&body, &format!("t={}", now.timestamp()), now)
            .is_err());
    }

    #[test]
    fn already_refunded_code_is_recognised() {
        let err: anyhow::Error = StripeApiError {
            context: "create refund".to_string(),
            status: 400,
            code: Some("charge_already_refunded".to_string()),
            message: None,
            request_id: None,
        }
        .into();

        assert!(is_already_refunded(&err));
        assert!(!is_already_refunded(&anyhow!("network down")));
    }
}
