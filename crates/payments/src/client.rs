//! Payment provider HTTP client with bounded retry.
//!
//! Cancel and capture are idempotent on the provider side and are retried
//! on transient failures (250 ms, 1 s). Authorization carries an
//! `Idempotency-Key` so its retries cannot place a second hold.

use std::time::Duration;

use async_trait::async_trait;
use lessonline_core::ports::{GatewayError, PaymentGateway};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::GatewayConfig;

/// Backoff before each retry of a transient failure.
const RETRY_DELAYS_MS: [u64; 2] = [250, 1_000];

#[derive(Debug, Serialize)]
struct AuthorizeRequest<'a> {
    amount_cents: i64,
    payment_method: &'a str,
    capture_method: &'static str,
}

#[derive(Debug, Deserialize)]
struct AuthorizeResponse {
    reference: String,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// Map a non-success HTTP status to a typed gateway error.
///
/// Statuses saying the authorization itself is unusable (unknown, already
/// captured, expired, malformed) are terminal. Everything else, including
/// auth and rate-limit failures, is worth retrying later.
pub fn classify_status(status: StatusCode, detail: String) -> GatewayError {
    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::NOT_FOUND
        | StatusCode::CONFLICT
        | StatusCode::GONE
        | StatusCode::UNPROCESSABLE_ENTITY => GatewayError::InvalidState(detail),
        _ => GatewayError::Transient(detail),
    }
}

/// Build the error detail from a provider error body, falling back to the
/// status line.
fn describe(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ProviderError>(body) {
        Ok(ProviderError {
            message: Some(message),
            code,
        }) => match code {
            Some(code) => format!("{code}: {message}"),
            None => message,
        },
        _ => format!("provider returned HTTP {}", status.as_u16()),
    }
}

/// [`PaymentGateway`] backed by the provider's REST API.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpPaymentGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    /// Send one POST and classify the outcome.
    async fn try_post(
        &self,
        path: &str,
        body: &serde_json::Value,
        idempotency_key: Option<&str>,
    ) -> Result<reqwest::Response, GatewayError> {
        let mut request = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.config.api_key)
            .json(body);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, describe(status, &body)))
    }

    /// POST with retry on transient failures.
    async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
        idempotency_key: Option<&str>,
    ) -> Result<reqwest::Response, GatewayError> {
        for (attempt, delay_ms) in RETRY_DELAYS_MS.iter().enumerate() {
            match self.try_post(path, &body, idempotency_key).await {
                Err(GatewayError::Transient(e)) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        path,
                        error = %e,
                        "Payment gateway call failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(*delay_ms)).await;
                }
                other => return other,
            }
        }

        // Final attempt after the last backoff.
        self.try_post(path, &body, idempotency_key).await
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn authorize(&self, amount_cents: i64, method: &str) -> Result<String, GatewayError> {
        let key = uuid::Uuid::new_v4().to_string();
        let body = serde_json::to_value(AuthorizeRequest {
            amount_cents,
            payment_method: method,
            capture_method: "manual",
        })
        .map_err(|e| GatewayError::InvalidState(e.to_string()))?;

        let response = self.post("/v1/authorizations", body, Some(&key)).await?;
        let parsed: AuthorizeResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Transient(format!("unreadable authorize response: {e}")))?;
        Ok(parsed.reference)
    }

    async fn cancel(&self, reference: &str) -> Result<(), GatewayError> {
        self.post(
            &format!("/v1/authorizations/{reference}/cancel"),
            serde_json::json!({}),
            None,
        )
        .await
        .map(|_| ())
    }

    async fn capture(&self, reference: &str) -> Result<(), GatewayError> {
        self.post(
            &format!("/v1/authorizations/{reference}/capture"),
            serde_json::json!({}),
            None,
        )
        .await
        .map(|_| ())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
