//! Viability Scheduler: cancels under-enrolled sessions before they start.

use chrono::Utc;
use lessonline_core::error::CoreError;
use lessonline_core::notice::Notice;
use lessonline_core::ports::SessionFilter;
use lessonline_core::realtime::{NextAction, RealtimeEvent};
use lessonline_core::session::{CancellationReason, Session, SessionStatus};
use lessonline_core::types::Timestamp;
use lessonline_core::viability::{evaluate, ViabilityVerdict};
use lessonline_events::bus::names;
use lessonline_events::LifecycleEvent;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::config::ViabilityConfig;
use crate::dispatch::Outbox;
use crate::ports::Ports;
use crate::ticker::run_ticks;

/// Outcome of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub cancelled: usize,
    pub viable: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl SweepReport {
    fn did_something(&self) -> bool {
        self.cancelled > 0 || self.failed > 0
    }
}

pub struct ViabilitySweeper {
    ports: Ports,
    config: ViabilityConfig,
}

impl ViabilitySweeper {
    pub fn new(ports: Ports, config: ViabilityConfig) -> Self {
        Self { ports, config }
    }

    /// Run one sweep as of `now`.
    ///
    /// Only a failure to query the store at all is returned; every
    /// per-session failure is logged and counted.
    pub async fn sweep(&self, now: Timestamp) -> Result<SweepReport, CoreError> {
        let (from, to) = self.config.window.bounds(now);
        let candidates = self
            .ports
            .sessions
            .find(&SessionFilter {
                statuses: vec![SessionStatus::Scheduled],
                starts_from: Some(from),
                starts_before: Some(to),
                enforce_minimum: Some(true),
                ..Default::default()
            })
            .await?;

        let mut report = SweepReport {
            scanned: candidates.len(),
            ..Default::default()
        };

        for session in candidates {
            match evaluate(&session, now, &self.config.window) {
                ViabilityVerdict::Viable => report.viable += 1,
                ViabilityVerdict::Skipped(reason) => {
                    tracing::debug!(session_id = session.id, ?reason, "Viability check skipped");
                    report.skipped += 1;
                }
                ViabilityVerdict::BelowMinimum {
                    confirmed,
                    required,
                } => {
                    tracing::info!(
                        session_id = session.id,
                        host_id = session.host_id,
                        confirmed,
                        required,
                        "Session below minimum enrollment, cancelling"
                    );
                    match self.cancel_session(session, now).await {
                        Ok(()) => report.cancelled += 1,
                        Err(_) => report.failed += 1,
                    }
                }
            }
        }

        Ok(report)
    }

    async fn cancel_session(&self, mut session: Session, now: Timestamp) -> Result<(), CoreError> {
        let session_id = session.id;
        session.cancel(CancellationReason::MinimumNotMet, None, now)?;
        if let Err(e) = self.ports.sessions.update(&mut session).await {
            tracing::error!(session_id, error = %e, "Failed to cancel under-enrolled session");
            return Err(e);
        }

        match self
            .ports
            .availability
            .remove_session_block(session.host_id, session_id)
            .await
        {
            Ok(true) => {}
            Ok(false) => tracing::debug!(session_id, "No availability block to remove"),
            Err(e) => tracing::error!(
                session_id,
                host_id = session.host_id,
                error = %e,
                "Failed to remove availability block"
            ),
        }

        let mut outbox = Outbox::default();
        outbox.event(
            LifecycleEvent::new(names::SESSION_CANCELLED)
                .for_session(session_id)
                .with_payload(json!({
                    "reason": CancellationReason::MinimumNotMet,
                    "confirmed": session.confirmed_count(),
                    "required": session.min_participants,
                })),
        );
        for recipient in session.notification_recipients() {
            outbox.push(
                recipient,
                RealtimeEvent::SessionCancelled {
                    session_id,
                    cancelled_by: None,
                    reason: CancellationReason::MinimumNotMet,
                    next: NextAction::Dismiss,
                },
            );
            outbox.notice(Notice::session_cancelled(
                &session,
                recipient,
                CancellationReason::MinimumNotMet,
            ));
        }
        let summary = outbox
            .dispatch(&self.ports.events, self.ports.fanout.as_ref())
            .await;
        tracing::debug!(session_id, ?summary, "Cancellation dispatched");
        Ok(())
    }

    /// Sweep every tick until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let period = self.config.tick_interval;
        let this = &self;
        run_ticks("viability", period, cancel, move || async move {
            match this.sweep(Utc::now()).await {
                Ok(report) if report.did_something() => {
                    tracing::info!(?report, "Viability sweep finished");
                }
                Ok(report) => tracing::debug!(?report, "Viability sweep finished"),
                Err(e) => tracing::error!(error = %e, "Viability sweep aborted: cannot query sessions"),
            }
        })
        .await;
    }
}
