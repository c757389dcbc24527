//! Live Stripe transfers client.
//!
//! Production client for the processor contract, enabled with the
//! `live-processor` feature. Secure API key handling, bounded retries on
//! rate limits, and error mapping onto the engine's rejected/unavailable
//! partition.

use crate::error::{PayrunError, Result};
use crate::processor::{PayoutProcessor, ProcessorStatus, TransferOutcome, TransferRequest};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Configuration for the live Stripe client.
#[derive(Debug, Clone)]
pub struct StripeProcessorConfig {
    /// Maximum retry attempts for rate-limited requests.
    pub max_retries: u32,
    /// Base delay for retry backoff in milliseconds.
    pub base_delay_ms: u64,
    /// Request timeout in seconds.
    ///
    /// Kept below the executor's own timeout so the client reports
    /// "unavailable" itself instead of being cut off mid-read.
    pub timeout_seconds: u64,
}

impl Default for StripeProcessorConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            timeout_seconds: 20,
        }
    }
}

/// Stripe implementation of [`PayoutProcessor`] over `POST /v1/transfers`.
pub struct StripeProcessor {
    http: reqwest::Client,
    secret_key: SecretString,
    config: StripeProcessorConfig,
}

#[derive(Debug, Deserialize)]
struct StripeTransfer {
    id: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl StripeProcessor {
    pub fn new(secret_key: SecretString, config: StripeProcessorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| PayrunError::internal(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            http,
            secret_key,
            config,
        })
    }

    async fn send_once(&self, request: &TransferRequest) -> Result<reqwest::Response> {
        let params = [
            ("amount", request.amount.to_string()),
            ("currency", request.currency.clone()),
            ("destination", request.destination.clone()),
        ];

        self.http
            .post(format!("{}/transfers", STRIPE_API_BASE))
            .basic_auth(self.secret_key.expose_secret(), Option::<&str>::None)
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                // Timeouts and transport failures alike: the request may
                // have reached Stripe, so the outcome is unknown.
                PayrunError::unavailable(request.idempotency_key.clone(), e.to_string())
            })
    }
}

#[async_trait]
impl PayoutProcessor for StripeProcessor {
    async fn transfer(&self, request: &TransferRequest) -> Result<TransferOutcome> {
        let mut attempt = 0;
        loop {
            let response = self.send_once(request).await?;
            let status = response.status();

            if status.is_success() {
                let body: StripeTransfer = response.json().await.map_err(|e| {
                    PayrunError::unavailable(
                        request.idempotency_key.clone(),
                        format!("unreadable response: {}", e),
                    )
                })?;
                let processor_status = body
                    .status
                    .as_deref()
                    .map(ProcessorStatus::parse)
                    // Transfers to connected accounts settle immediately;
                    // Stripe omits the status field for them.
                    .unwrap_or(ProcessorStatus::Paid);
                return Ok(TransferOutcome {
                    external_ref: body.id,
                    status: processor_status,
                    failure_code: None,
                    failure_message: None,
                });
            }

            if status.as_u16() == 429 && attempt < self.config.max_retries {
                attempt += 1;
                let delay = self.config.base_delay_ms << attempt.min(8);
                tracing::debug!(
                    idempotency_key = %request.idempotency_key,
                    attempt,
                    delay_ms = delay,
                    "rate limited by processor, backing off"
                );
                tokio::time::sleep(Duration::from_millis(delay)).await;
                continue;
            }

            if status.is_client_error() {
                // Explicit decline: surface code and message for ops.
                let envelope: Option<StripeErrorEnvelope> = response.json().await.ok();
                let body = envelope.map(|e| e.error);
                return Err(PayrunError::rejected(
                    request.idempotency_key.clone(),
                    body.as_ref()
                        .and_then(|b| b.code.clone())
                        .unwrap_or_else(|| "error".to_string()),
                    body.and_then(|b| b.message)
                        .unwrap_or_else(|| format!("processor returned {}", status)),
                ));
            }

            // 5xx: Stripe's side is unwell; outcome unknown.
            return Err(PayrunError::unavailable(
                request.idempotency_key.clone(),
                format!("processor returned {}", status),
            ));
        }
    }
}
