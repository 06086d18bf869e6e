//! Payment Reclaimer: releases authorization holds nobody attended for.

use chrono::Utc;
use lessonline_core::error::CoreError;
use lessonline_core::ports::SessionFilter;
use lessonline_core::reclaim::{is_due, plan_hold, HoldDisposition, ReleaseOutcome, RECLAIMABLE_STATUSES};
use lessonline_core::session::Session;
use lessonline_core::types::Timestamp;
use lessonline_events::bus::names;
use lessonline_events::LifecycleEvent;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::commit::commit_session;
use crate::config::ReclaimConfig;
use crate::ports::Ports;
use crate::ticker::run_ticks;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReclaimReport {
    pub sessions: usize,
    pub released: usize,
    pub errored: usize,
    pub retry_later: usize,
    pub anomalies: usize,
    /// Sessions whose changes could not be persisted.
    pub failed: usize,
}

impl ReclaimReport {
    fn did_something(&self) -> bool {
        self.released + self.errored + self.retry_later + self.anomalies + self.failed > 0
    }
}

pub struct PaymentReclaimer {
    ports: Ports,
    config: ReclaimConfig,
}

impl PaymentReclaimer {
    pub fn new(ports: Ports, config: ReclaimConfig) -> Self {
        Self { ports, config }
    }

    /// Run one reclamation pass as of `now`.
    pub async fn sweep(&self, now: Timestamp) -> Result<ReclaimReport, CoreError> {
        let sessions = self
            .ports
            .sessions
            .find(&SessionFilter {
                statuses: RECLAIMABLE_STATUSES.to_vec(),
                ended_by: Some(now - self.config.grace),
                with_releasable_hold: true,
                limit: Some(self.config.batch_size),
                ..Default::default()
            })
            .await?;

        let mut report = ReclaimReport::default();
        for session in sessions {
            if !is_due(&session, now, self.config.grace) {
                continue;
            }
            report.sessions += 1;
            self.reclaim_session(session, now, &mut report).await;
        }
        Ok(report)
    }

    async fn reclaim_session(&self, session: Session, now: Timestamp, report: &mut ReclaimReport) {
        let session_id = session.id;
        let mut settled = Vec::new();

        for hold in &session.payment_holds {
            let hold_id = hold.id;
            match plan_hold(hold) {
                HoldDisposition::Skip => continue,
                HoldDisposition::Anomaly => {
                    report.anomalies += 1;
                    tracing::warn!(
                        session_id,
                        %hold_id,
                        participant_id = hold.participant_id,
                        "Authorized hold belongs to a participant who joined; leaving it untouched"
                    );
                    continue;
                }
                HoldDisposition::Release => {}
            }

            let outcome = match hold.reference.as_deref() {
                Some(reference) => ReleaseOutcome::from(self.ports.gateway.cancel(reference).await),
                None => ReleaseOutcome::Unrecoverable("hold has no authorization reference".into()),
            };
            if let ReleaseOutcome::RetryLater(msg) = &outcome {
                report.retry_later += 1;
                tracing::warn!(session_id, %hold_id, error = %msg, "Hold release failed, will retry");
                continue;
            }
            settled.push((hold_id, outcome));
        }

        if settled.is_empty() {
            return;
        }

        // Gateway calls are done; only the store write is retried, against a
        // fresh copy, and only holds that are still open take the outcome.
        let committed = commit_session(self.ports.sessions.as_ref(), session_id, |fresh| {
            let mut applied = Vec::new();
            for (hold_id, outcome) in &settled {
                if fresh.hold(*hold_id).map(plan_hold) != Some(HoldDisposition::Release) {
                    tracing::info!(session_id, %hold_id, "Hold settled concurrently; keeping its stored state");
                    continue;
                }
                let result = match outcome {
                    ReleaseOutcome::Released => fresh.release_hold(*hold_id, now),
                    ReleaseOutcome::Unrecoverable(msg) => fresh.fail_hold(*hold_id, msg.clone(), now),
                    ReleaseOutcome::RetryLater(_) => continue,
                };
                match result {
                    Ok(()) => applied.push((*hold_id, outcome.clone())),
                    Err(e) => tracing::error!(session_id, %hold_id, error = %e, "Cannot apply hold release"),
                }
            }
            Ok(applied)
        })
        .await;

        let (session, applied) = match committed {
            Ok(committed) => committed,
            Err(e) => {
                report.failed += 1;
                tracing::error!(session_id, error = %e, "Failed to persist released holds");
                return;
            }
        };

        for (hold_id, outcome) in applied {
            let Some(hold) = session.hold(hold_id) else {
                continue;
            };
            if let Err(e) = self.ports.ledger.mirror_hold(session_id, hold).await {
                tracing::error!(session_id, %hold_id, error = %e, "Failed to mirror hold into ledger");
            }
            let (event_type, error) = match outcome {
                ReleaseOutcome::Released => {
                    report.released += 1;
                    (names::HOLD_RELEASED, None)
                }
                ReleaseOutcome::Unrecoverable(msg) | ReleaseOutcome::RetryLater(msg) => {
                    report.errored += 1;
                    (names::HOLD_ERRORED, Some(msg))
                }
            };
            self.ports.events.publish(
                LifecycleEvent::new(event_type)
                    .for_session(session_id)
                    .with_payload(json!({
                        "hold_id": hold_id,
                        "participant_id": hold.participant_id,
                        "amount_cents": hold.amount_cents,
                        "error": error,
                    })),
            );
        }
    }

    /// Reclaim every tick until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let period = self.config.tick_interval;
        let this = &self;
        run_ticks("reclaimer", period, cancel, move || async move {
            match this.sweep(Utc::now()).await {
                Ok(report) if report.did_something() => {
                    tracing::info!(?report, "Payment reclaim finished");
                }
                Ok(report) => tracing::debug!(?report, "Payment reclaim finished"),
                Err(e) => tracing::error!(error = %e, "Payment reclaim aborted: cannot query sessions"),
            }
        })
        .await;
    }
}
