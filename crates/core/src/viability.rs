//! Minimum-enrollment rules evaluated shortly before a session starts.
//!
//! Pure logic: the sweeper in `lessonline-lifecycle` fetches candidates and
//! applies the verdicts produced here.

use chrono::Duration;

use crate::session::{Session, SessionStatus};
use crate::types::Timestamp;

/// The span before a session's start during which it is evaluated.
///
/// A session qualifies when `now + min_lead <= starts_at < now + max_lead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeadWindow {
    pub min_lead: Duration,
    pub max_lead: Duration,
}

impl Default for LeadWindow {
    fn default() -> Self {
        Self {
            min_lead: Duration::minutes(10),
            max_lead: Duration::minutes(20),
        }
    }
}

impl LeadWindow {
    /// Absolute `[from, to)` bounds on `starts_at` for a tick at `now`.
    pub fn bounds(&self, now: Timestamp) -> (Timestamp, Timestamp) {
        (now + self.min_lead, now + self.max_lead)
    }

    pub fn contains(&self, now: Timestamp, starts_at: Timestamp) -> bool {
        let (from, to) = self.bounds(now);
        from <= starts_at && starts_at < to
    }

    pub fn width(&self) -> Duration {
        self.max_lead - self.min_lead
    }

    /// Whether ticks `tick_interval` apart are guaranteed to see every
    /// session at least once while it is inside the window.
    pub fn covers_tick(&self, tick_interval: Duration) -> bool {
        self.min_lead >= Duration::zero() && self.width() >= tick_interval
    }
}

/// Why a session was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotScheduled(SessionStatus),
    EnforcementDisabled,
    OutsideLeadWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViabilityVerdict {
    /// Enough confirmed participants; nothing to do.
    Viable,
    /// Fewer confirmed participants than required; cancel.
    BelowMinimum { confirmed: usize, required: i32 },
    Skipped(SkipReason),
}

/// Decide what the viability sweep should do with `session` at `now`.
pub fn evaluate(session: &Session, now: Timestamp, window: &LeadWindow) -> ViabilityVerdict {
    if session.status != SessionStatus::Scheduled {
        return ViabilityVerdict::Skipped(SkipReason::NotScheduled(session.status));
    }
    if !session.enforce_minimum {
        return ViabilityVerdict::Skipped(SkipReason::EnforcementDisabled);
    }
    if !window.contains(now, session.starts_at) {
        return ViabilityVerdict::Skipped(SkipReason::OutsideLeadWindow);
    }

    let confirmed = session.confirmed_count();
    let required = session.min_participants.max(0);
    if confirmed < required as usize {
        ViabilityVerdict::BelowMinimum {
            confirmed,
            required,
        }
    } else {
        ViabilityVerdict::Viable
    }
}
