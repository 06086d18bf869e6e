use std::time::Duration;

/// Payment provider connection settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL, without a trailing slash.
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:4010".into(),
            api_key: String::new(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl GatewayConfig {
    /// Load from `PAYMENT_GATEWAY_*` environment variables.
    ///
    /// | Env var                        | Default                 |
    /// |--------------------------------|-------------------------|
    /// | `PAYMENT_GATEWAY_URL`          | `http://localhost:4010` |
    /// | `PAYMENT_GATEWAY_API_KEY`      | empty                   |
    /// | `PAYMENT_GATEWAY_TIMEOUT_SECS` | `10`                    |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("PAYMENT_GATEWAY_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.base_url);

        let api_key = std::env::var("PAYMENT_GATEWAY_API_KEY").unwrap_or_default();

        let timeout = std::env::var("PAYMENT_GATEWAY_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        Self {
            base_url,
            api_key,
            timeout,
        }
    }
}
