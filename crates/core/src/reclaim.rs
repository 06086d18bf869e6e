//! Payment-hold reclamation rules.
//!
//! Decides which authorization holds on finished sessions may be released.
//! Every match over [`HoldStatus`] and [`Attendance`] is exhaustive so that a
//! new status value shows up here as a compile error instead of a silently
//! ignored string.

use chrono::Duration;

use crate::ports::GatewayError;
use crate::session::{Attendance, HoldStatus, PaymentHold, Session, SessionStatus};
use crate::types::Timestamp;

/// Session statuses whose holds are eligible for reclamation.
pub const RECLAIMABLE_STATUSES: [SessionStatus; 2] =
    [SessionStatus::InProgress, SessionStatus::Completed];

/// What the reclaimer should do with one hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldDisposition {
    /// Ask the gateway to cancel the authorization.
    Release,
    /// Nothing to do: the hold is not an open authorization.
    Skip,
    /// Authorized but attended. Should not happen; log it, never touch it.
    Anomaly,
}

pub fn plan_hold(hold: &PaymentHold) -> HoldDisposition {
    match hold.status {
        HoldStatus::Authorized => match hold.attendance {
            Attendance::Joined => HoldDisposition::Anomaly,
            Attendance::NotJoined | Attendance::NoShow => HoldDisposition::Release,
        },
        HoldStatus::Pending
        | HoldStatus::Captured
        | HoldStatus::Cancelled
        | HoldStatus::Refunded
        | HoldStatus::Error => HoldDisposition::Skip,
    }
}

/// Whether `session` is due for a reclamation pass at `now`.
pub fn is_due(session: &Session, now: Timestamp, grace: Duration) -> bool {
    RECLAIMABLE_STATUSES.contains(&session.status)
        && session.ends_at + grace <= now
        && session.has_releasable_hold()
}

/// How a gateway cancellation attempt resolves for the hold record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// `status → cancelled`, `attendance → no_show`.
    Released,
    /// The gateway can no longer act on the hold; `status → error`,
    /// `attendance → no_show`, never retried.
    Unrecoverable(String),
    /// Leave the hold authorized so the next tick retries.
    RetryLater(String),
}

impl From<Result<(), GatewayError>> for ReleaseOutcome {
    fn from(result: Result<(), GatewayError>) -> Self {
        match result {
            Ok(()) => ReleaseOutcome::Released,
            Err(GatewayError::InvalidState(msg)) => ReleaseOutcome::Unrecoverable(msg),
            Err(GatewayError::Transient(msg)) => ReleaseOutcome::RetryLater(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::session::{NewSession, SessionKind};

    fn hold(status: HoldStatus, attendance: Attendance) -> PaymentHold {
        let mut h = PaymentHold::authorized(2, 1800, "auth_x".into());
        h.status = status;
        h.attendance = attendance;
        h
    }

    #[test]
    fn only_unattended_authorizations_are_released() {
        for status in HoldStatus::ALL {
            for attendance in Attendance::ALL {
                let expected = match (status, attendance) {
                    (HoldStatus::Authorized, Attendance::Joined) => HoldDisposition::Anomaly,
                    (HoldStatus::Authorized, _) => HoldDisposition::Release,
                    _ => HoldDisposition::Skip,
                };
                assert_eq!(
                    plan_hold(&hold(*status, *attendance)),
                    expected,
                    "{status} / {attendance}"
                );
            }
        }
    }

    #[test]
    fn gateway_results_map_to_outcomes() {
        assert_eq!(ReleaseOutcome::from(Ok(())), ReleaseOutcome::Released);
        assert_eq!(
            ReleaseOutcome::from(Err(GatewayError::InvalidState("already captured".into()))),
            ReleaseOutcome::Unrecoverable("already captured".into())
        );
        assert_eq!(
            ReleaseOutcome::from(Err(GatewayError::Transient("503".into()))),
            ReleaseOutcome::RetryLater("503".into())
        );
    }

    #[test]
    fn due_only_after_grace_period() {
        let end = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap();
        let new = NewSession {
            kind: SessionKind::Scheduled,
            host_id: 1,
            title: "Essay clinic".into(),
            starts_at: end - Duration::hours(1),
            ends_at: end,
            capacity: 4,
            min_participants: 0,
            enforce_minimum: false,
            invitees: vec![2],
        };
        let mut s = Session::from_new(3, &new, end - Duration::days(2));
        s.respond_to_invitation(2, true).unwrap();
        s.confirm(2).unwrap();
        s.attach_hold(PaymentHold::authorized(2, 1800, "auth_2".into()))
            .unwrap();
        s.complete().unwrap();

        let grace = Duration::hours(1);
        assert!(!is_due(&s, end + Duration::minutes(59), grace));
        assert!(is_due(&s, end + Duration::minutes(61), grace));
    }
}
