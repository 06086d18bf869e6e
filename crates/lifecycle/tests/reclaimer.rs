mod common;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use lessonline_core::error::CoreError;
use lessonline_core::ports::GatewayError;
use lessonline_core::session::{Attendance, CancellationReason, HoldStatus, PaymentHold, SessionStatus};
use lessonline_lifecycle::memory::InMemory;
use lessonline_lifecycle::{PaymentReclaimer, ReclaimConfig};
use proptest::prelude::*;

use common::*;

fn reclaimer(memory: &InMemory) -> PaymentReclaimer {
    PaymentReclaimer::new(memory.ports(), ReclaimConfig::default())
}

fn hold_of(session: &lessonline_core::session::Session, participant: i64) -> PaymentHold {
    session
        .payment_holds
        .iter()
        .find(|h| h.participant_id == participant)
        .cloned()
        .unwrap()
}

#[tokio::test]
async fn releases_holds_of_participants_who_never_joined() {
    let memory = adapters();
    let mut session = finished_session(Duration::hours(2), &[ALICE, BOB]);
    session.record_join(ALICE, session.starts_at).unwrap();
    session.mark_attended(ALICE);
    let alice_hold = hold_of(&session, ALICE).id;
    session.capture_hold(alice_hold).unwrap();
    session.complete().unwrap();
    let session = memory.sessions.seed(session);
    let bob_ref = reference_of(&session, BOB);

    let report = reclaimer(&memory).sweep(Utc::now()).await.unwrap();
    assert_eq!(report.sessions, 1);
    assert_eq!(report.released, 1);
    assert_eq!(report.anomalies, 0);
    assert_eq!(memory.gateway.cancelled(), vec![bob_ref]);

    let stored = memory.sessions.get(session.id).unwrap();
    assert_eq!(stored.status, SessionStatus::Completed);
    let bob = hold_of(&stored, BOB);
    assert_eq!(bob.status, HoldStatus::Cancelled);
    assert_eq!(bob.attendance, Attendance::NoShow);
    assert!(bob.cancelled_at.is_some());
    assert_eq!(hold_of(&stored, ALICE).status, HoldStatus::Captured);

    let mirrored = memory.ledger.entry(session.id, bob.id).unwrap();
    assert_eq!(mirrored.status, HoldStatus::Cancelled);
    assert!(memory.ledger.entry(session.id, alice_hold).is_none());
}

#[tokio::test]
async fn sessions_inside_the_grace_period_wait() {
    let memory = adapters();
    let session = memory
        .sessions
        .seed(finished_session(Duration::minutes(30), &[ALICE]));

    let report = reclaimer(&memory).sweep(Utc::now()).await.unwrap();
    assert_eq!(report.sessions, 0);
    assert!(memory.gateway.calls().is_empty());
    assert_eq!(
        hold_of(&memory.sessions.get(session.id).unwrap(), ALICE).status,
        HoldStatus::Authorized
    );
}

#[tokio::test]
async fn invalid_state_marks_the_hold_errored_and_stops_retrying() {
    let memory = adapters();
    let session = memory
        .sessions
        .seed(finished_session(Duration::hours(3), &[ALICE]));
    memory.gateway.fail_cancel(
        &reference_of(&session, ALICE),
        GatewayError::InvalidState("authorization expired".into()),
    );
    let reclaimer = reclaimer(&memory);

    let report = reclaimer.sweep(Utc::now()).await.unwrap();
    assert_eq!(report.errored, 1);

    let hold = hold_of(&memory.sessions.get(session.id).unwrap(), ALICE);
    assert_eq!(hold.status, HoldStatus::Error);
    assert_eq!(hold.attendance, Attendance::NoShow);
    assert_eq!(hold.error.as_deref(), Some("authorization expired"));

    reclaimer.sweep(Utc::now()).await.unwrap();
    assert_eq!(memory.gateway.cancelled().len(), 1);
}

#[tokio::test]
async fn transient_failures_leave_the_hold_for_the_next_tick() {
    let memory = adapters();
    let session = memory
        .sessions
        .seed(finished_session(Duration::hours(3), &[ALICE]));
    memory.gateway.fail_cancel(
        &reference_of(&session, ALICE),
        GatewayError::Transient("connection reset".into()),
    );
    let reclaimer = reclaimer(&memory);

    let report = reclaimer.sweep(Utc::now()).await.unwrap();
    assert_eq!(report.retry_later, 1);
    assert_eq!(
        hold_of(&memory.sessions.get(session.id).unwrap(), ALICE).status,
        HoldStatus::Authorized
    );
    assert!(memory.ledger.is_empty());

    reclaimer.sweep(Utc::now()).await.unwrap();
    assert_eq!(memory.gateway.cancelled().len(), 2);
}

#[tokio::test]
async fn authorized_hold_of_an_attendee_is_never_released() {
    let memory = adapters();
    let mut session = finished_session(Duration::hours(2), &[ALICE, BOB]);
    session.record_join(ALICE, session.starts_at).unwrap();
    session.mark_attended(ALICE);
    let session = memory.sessions.seed(session);

    let report = reclaimer(&memory).sweep(Utc::now()).await.unwrap();
    assert_eq!(report.anomalies, 1);
    assert_eq!(report.released, 1);
    assert_eq!(memory.gateway.cancelled(), vec![reference_of(&session, BOB)]);
    let hold = hold_of(&memory.sessions.get(session.id).unwrap(), ALICE);
    assert_eq!(hold.status, HoldStatus::Authorized);
    assert_eq!(hold.attendance, Attendance::Joined);
}

#[tokio::test]
async fn cancelled_sessions_keep_their_holds() {
    let memory = adapters();
    let mut session = finished_session(Duration::hours(2), &[ALICE]);
    session
        .cancel(CancellationReason::Withdrawn, Some(HOST), session.starts_at)
        .unwrap();
    memory.sessions.seed(session);

    let report = reclaimer(&memory).sweep(Utc::now()).await.unwrap();
    assert_eq!(report.sessions, 0);
    assert!(memory.gateway.calls().is_empty());
}

#[tokio::test]
async fn batch_size_bounds_one_tick() {
    let memory = adapters();
    for hours in 2..5 {
        memory
            .sessions
            .seed(finished_session(Duration::hours(hours), &[ALICE]));
    }
    let reclaimer = PaymentReclaimer::new(
        memory.ports(),
        ReclaimConfig {
            batch_size: 2,
            ..Default::default()
        },
    );

    assert_eq!(reclaimer.sweep(Utc::now()).await.unwrap().released, 2);
    assert_eq!(reclaimer.sweep(Utc::now()).await.unwrap().released, 1);
    assert_eq!(reclaimer.sweep(Utc::now()).await.unwrap().sessions, 0);
}

#[tokio::test]
async fn persistence_failure_is_counted_and_not_mirrored() {
    let memory = adapters();
    let session = memory
        .sessions
        .seed(finished_session(Duration::hours(2), &[ALICE]));
    memory.sessions.fail_updates_for(session.id);

    let report = reclaimer(&memory).sweep(Utc::now()).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.released, 0);
    assert!(memory.ledger.is_empty());
    assert_eq!(
        hold_of(&memory.sessions.get(session.id).unwrap(), ALICE).status,
        HoldStatus::Authorized
    );
}

#[tokio::test]
async fn concurrent_write_is_retried_against_a_fresh_copy() {
    let memory = adapters();
    let session = memory
        .sessions
        .seed(finished_session(Duration::hours(2), &[ALICE]));
    memory.sessions.race_next_update(session.id);

    let report = reclaimer(&memory).sweep(Utc::now()).await.unwrap();
    assert_eq!(report.released, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(memory.gateway.cancelled().len(), 1);

    let hold = hold_of(&memory.sessions.get(session.id).unwrap(), ALICE);
    assert_eq!(hold.status, HoldStatus::Cancelled);
    assert_eq!(memory.ledger.entry(session.id, hold.id).unwrap().status, HoldStatus::Cancelled);
}

#[tokio::test]
async fn attended_authorizations_do_not_starve_the_batch() {
    let memory = adapters();
    let mut older = finished_session(Duration::hours(5), &[ALICE]);
    older.record_join(ALICE, older.starts_at).unwrap();
    older.mark_attended(ALICE);
    let older = memory.sessions.seed(older);
    let newer = memory
        .sessions
        .seed(finished_session(Duration::hours(2), &[BOB]));
    let reclaimer = PaymentReclaimer::new(
        memory.ports(),
        ReclaimConfig {
            batch_size: 1,
            ..Default::default()
        },
    );

    let report = reclaimer.sweep(Utc::now()).await.unwrap();
    assert_eq!(report.sessions, 1);
    assert_eq!(report.released, 1);
    assert_eq!(report.anomalies, 0);

    let bob = hold_of(&memory.sessions.get(newer.id).unwrap(), BOB);
    assert_eq!(bob.status, HoldStatus::Cancelled);
    let alice = hold_of(&memory.sessions.get(older.id).unwrap(), ALICE);
    assert_eq!(alice.status, HoldStatus::Authorized);
    assert_eq!(alice.attendance, Attendance::Joined);
}

#[tokio::test]
async fn query_failure_aborts_the_tick() {
    let memory = adapters();
    memory.sessions.fail_queries(true);
    assert_matches!(
        reclaimer(&memory).sweep(Utc::now()).await,
        Err(CoreError::Storage(_))
    );
}

// ---------------------------------------------------------------------------
// Safety property
// ---------------------------------------------------------------------------

fn hold_states() -> impl Strategy<Value = Vec<(HoldStatus, Attendance)>> {
    let pair = (
        prop::sample::select(HoldStatus::ALL.to_vec()),
        prop::sample::select(Attendance::ALL.to_vec()),
    )
        .prop_map(|(status, attendance)| {
            let chargeable = matches!(status, HoldStatus::Authorized | HoldStatus::Captured);
            if attendance == Attendance::Joined && !chargeable {
                (status, Attendance::NotJoined)
            } else {
                (status, attendance)
            }
        });
    prop::collection::vec(pair, 1..8)
}

proptest! {
    #[test]
    fn only_unattended_authorizations_are_released(
        states in hold_states(),
        completed in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let memory = adapters();

        let mut session = finished_session(Duration::hours(2), &[]);
        for (n, (status, attendance)) in states.iter().enumerate() {
            let mut hold = PaymentHold::authorized(100 + n as i64, 1_000, format!("auth_prop_{n}"));
            hold.status = *status;
            hold.attendance = *attendance;
            session.payment_holds.push(hold);
        }
        if completed {
            session.complete().unwrap();
        }
        let before = memory.sessions.seed(session);

        runtime.block_on(reclaimer(&memory).sweep(Utc::now())).unwrap();
        let after = memory.sessions.get(before.id).unwrap();

        prop_assert_eq!(after.status, before.status);
        for (old, new) in before.payment_holds.iter().zip(&after.payment_holds) {
            let releasable = old.status == HoldStatus::Authorized && old.attendance != Attendance::Joined;
            if releasable {
                prop_assert_eq!(new.status, HoldStatus::Cancelled);
                prop_assert_eq!(new.attendance, Attendance::NoShow);
            } else {
                prop_assert_eq!(new, old);
            }
        }
    }
}
