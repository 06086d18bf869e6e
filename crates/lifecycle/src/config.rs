//! Tunables for the lifecycle components, loaded from the environment.

use std::str::FromStr;
use std::time::Duration;

use lessonline_core::error::CoreError;
use lessonline_core::viability::LeadWindow;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct ViabilityConfig {
    pub tick_interval: Duration,
    pub window: LeadWindow,
}

impl Default for ViabilityConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(300),
            window: LeadWindow::default(),
        }
    }
}

impl ViabilityConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tick_interval: Duration::from_secs(env_or(
                "VIABILITY_TICK_SECS",
                defaults.tick_interval.as_secs(),
            )),
            window: LeadWindow {
                min_lead: chrono::Duration::minutes(env_or(
                    "VIABILITY_LEAD_MIN_MINUTES",
                    defaults.window.min_lead.num_minutes(),
                )),
                max_lead: chrono::Duration::minutes(env_or(
                    "VIABILITY_LEAD_MAX_MINUTES",
                    defaults.window.max_lead.num_minutes(),
                )),
            },
        }
    }

    /// The lead window must be at least one tick wide or a session could
    /// pass through it between two ticks.
    pub fn validate(&self) -> Result<(), CoreError> {
        let tick = chrono::Duration::from_std(self.tick_interval)
            .map_err(|e| CoreError::Validation(format!("viability tick interval: {e}")))?;
        if self.tick_interval.is_zero() {
            return Err(CoreError::Validation(
                "viability tick interval must be positive".into(),
            ));
        }
        if !self.window.covers_tick(tick) {
            return Err(CoreError::Validation(format!(
                "viability lead window ({} to {} minutes) is narrower than the tick interval ({}s)",
                self.window.min_lead.num_minutes(),
                self.window.max_lead.num_minutes(),
                self.tick_interval.as_secs()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ReclaimConfig {
    pub tick_interval: Duration,
    /// Delay after a session ends before its holds may be released.
    pub grace: chrono::Duration,
    /// Maximum sessions processed per tick.
    pub batch_size: i64,
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(600),
            grace: chrono::Duration::minutes(60),
            batch_size: 50,
        }
    }
}

impl ReclaimConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tick_interval: Duration::from_secs(env_or(
                "RECLAIM_TICK_SECS",
                defaults.tick_interval.as_secs(),
            )),
            grace: chrono::Duration::minutes(env_or(
                "RECLAIM_GRACE_MINUTES",
                defaults.grace.num_minutes(),
            )),
            batch_size: env_or("RECLAIM_BATCH_SIZE", defaults.batch_size),
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.tick_interval.is_zero() {
            return Err(CoreError::Validation(
                "reclaim tick interval must be positive".into(),
            ));
        }
        if self.batch_size < 1 {
            return Err(CoreError::Validation(
                "reclaim batch size must be at least 1".into(),
            ));
        }
        if self.grace < chrono::Duration::zero() {
            return Err(CoreError::Validation(
                "reclaim grace period cannot be negative".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How long a host has to accept or decline a request.
    pub response_timeout: Duration,
    /// How long the requester has to enter the call after acceptance.
    pub entry_timeout: Duration,
    /// Window length of the session an on-demand request creates.
    pub session_length: chrono::Duration,
    /// Delay before a deadline whose store write failed is handled again.
    pub deadline_retry: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(30),
            entry_timeout: Duration::from_secs(60),
            session_length: chrono::Duration::minutes(30),
            deadline_retry: Duration::from_secs(5),
        }
    }
}

impl CoordinatorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            response_timeout: Duration::from_secs(env_or(
                "BOOKING_RESPONSE_TIMEOUT_SECS",
                defaults.response_timeout.as_secs(),
            )),
            entry_timeout: Duration::from_secs(env_or(
                "BOOKING_ENTRY_TIMEOUT_SECS",
                defaults.entry_timeout.as_secs(),
            )),
            session_length: chrono::Duration::minutes(env_or(
                "ON_DEMAND_SESSION_MINUTES",
                defaults.session_length.num_minutes(),
            )),
            deadline_retry: Duration::from_secs(env_or(
                "BOOKING_DEADLINE_RETRY_SECS",
                defaults.deadline_retry.as_secs(),
            )),
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.response_timeout.is_zero()
            || self.entry_timeout.is_zero()
            || self.deadline_retry.is_zero()
        {
            return Err(CoreError::Validation(
                "booking deadlines must be positive".into(),
            ));
        }
        if self.session_length <= chrono::Duration::zero() {
            return Err(CoreError::Validation(
                "on-demand session length must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// All lifecycle settings.
#[derive(Debug, Clone, Default)]
pub struct LifecycleConfig {
    pub viability: ViabilityConfig,
    pub reclaim: ReclaimConfig,
    pub coordinator: CoordinatorConfig,
}

impl LifecycleConfig {
    pub fn from_env() -> Self {
        Self {
            viability: ViabilityConfig::from_env(),
            reclaim: ReclaimConfig::from_env(),
            coordinator: CoordinatorConfig::from_env(),
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        self.viability.validate()?;
        self.reclaim.validate()?;
        self.coordinator.validate()
    }
}
