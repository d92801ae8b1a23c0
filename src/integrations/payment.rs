// Payment gateway client
//
// The gateway is fallible, network-bound, and idempotent by reference on
// its side, which is what makes the single retry safe. Refund failures
// propagate to the caller: cancellation must never complete with a refund
// unissued.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Error types for payment gateway calls
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment gateway declined the request: {0}")]
    Declined(String),

    #[error("Payment gateway timed out")]
    Timeout,

    #[error("Payment gateway transport error: {0}")]
    Transport(String),
}

/// A created payment intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub intent_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    Processed,
    Pending,
}

/// Gateway acknowledgement of a refund request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub refund_id: String,
    pub status: RefundStatus,
}

/// Payment gateway contract.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for an amount, keyed by our order reference.
    async fn create_payment_intent(
        &self,
        amount: Decimal,
        reference: &str,
    ) -> Result<PaymentIntent, PaymentError>;

    /// Request a refund against a prior payment.
    async fn refund(
        &self,
        payment_reference: &str,
        amount: Decimal,
        reason: &str,
    ) -> Result<RefundReceipt, PaymentError>;
}

#[derive(Serialize)]
struct CreateIntentBody<'a> {
    amount: Decimal,
    reference: &'a str,
}

#[derive(Serialize)]
struct RefundBody<'a> {
    payment_reference: &'a str,
    amount: Decimal,
    reason: &'a str,
}

/// HTTP implementation of the payment gateway contract.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPaymentGateway {
    /// Build a client with a bounded per-request timeout.
    pub fn new(base_url: String) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(super::EXTERNAL_CALL_TIMEOUT)
            .build()
            .map_err(|e| PaymentError::Transport(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    /// Execute a POST, retrying once on transport failure.
    ///
    /// The gateway dedupes by reference, so a retry can never double-apply.
    async fn post_with_retry<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, PaymentError> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error = PaymentError::Transport("no attempt made".to_string());

        for attempt in 0..2 {
            if attempt > 0 {
                tracing::warn!("Retrying payment gateway call to {}", path);
            }
            match self.client.post(&url).json(body).send().await {
                Ok(response) if response.status().is_success() => {
                    return response
                        .json::<R>()
                        .await
                        .map_err(|e| PaymentError::Transport(e.to_string()));
                }
                Ok(response) => {
                    // A definitive rejection is not retried.
                    let status = response.status();
                    let detail = response.text().await.unwrap_or_default();
                    return Err(PaymentError::Declined(format!("{}: {}", status, detail)));
                }
                Err(err) if err.is_timeout() => {
                    last_error = PaymentError::Timeout;
                }
                Err(err) => {
                    last_error = PaymentError::Transport(err.to_string());
                }
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_payment_intent(
        &self,
        amount: Decimal,
        reference: &str,
    ) -> Result<PaymentIntent, PaymentError> {
        self.post_with_retry("/v1/intents", &CreateIntentBody { amount, reference })
            .await
    }

    async fn refund(
        &self,
        payment_reference: &str,
        amount: Decimal,
        reason: &str,
    ) -> Result<RefundReceipt, PaymentError> {
        self.post_with_retry(
            "/v1/refunds",
            &RefundBody {
                payment_reference,
                amount,
                reason,
            },
        )
        .await
    }
}
