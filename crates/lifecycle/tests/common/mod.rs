#![allow(dead_code)]

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use lessonline_core::session::{NewSession, PaymentHold, Session, SessionKind};
use lessonline_core::types::{DbId, Timestamp};
use lessonline_lifecycle::memory::InMemory;

pub const HOST: DbId = 1;
pub const ALICE: DbId = 2;
pub const BOB: DbId = 3;
pub const CAROL: DbId = 4;

/// A scheduled session with `confirmed` already accepted and confirmed.
pub fn scheduled_session(
    starts_at: Timestamp,
    min_participants: i32,
    confirmed: &[DbId],
) -> Session {
    let new = NewSession {
        kind: SessionKind::Scheduled,
        host_id: HOST,
        title: "Algebra review".to_string(),
        starts_at,
        ends_at: starts_at + Duration::minutes(60),
        capacity: 10,
        min_participants,
        enforce_minimum: true,
        invitees: confirmed.to_vec(),
    };
    let mut session = Session::from_new(0, &new, starts_at - Duration::days(2));
    for &participant in confirmed {
        session.respond_to_invitation(participant, true).unwrap();
        session.confirm(participant).unwrap();
    }
    session
}

/// A scheduled session that ran in the past and carries an authorized hold
/// for each confirmed participant.
pub fn finished_session(ended_ago: Duration, confirmed: &[DbId]) -> Session {
    let ends_at = Utc::now() - ended_ago;
    let mut session = scheduled_session(ends_at - Duration::minutes(60), 1, confirmed);
    for (n, &participant) in confirmed.iter().enumerate() {
        session
            .attach_hold(PaymentHold::authorized(
                participant,
                2_500,
                format!("auth_seed_{participant}_{n}"),
            ))
            .unwrap();
    }
    session.start().unwrap();
    session
}

pub fn reference_of(session: &Session, participant: DbId) -> String {
    session
        .payment_holds
        .iter()
        .find(|h| h.participant_id == participant)
        .and_then(|h| h.reference.clone())
        .unwrap()
}

/// Adapters with a few named users.
pub fn adapters() -> InMemory {
    let memory = InMemory::new();
    memory.users.insert(HOST, "Dr. Host");
    memory.users.insert(ALICE, "Alice");
    memory.users.insert(BOB, "Bob");
    memory.users.insert(CAROL, "Carol");
    memory
}

/// Let spawned tasks run. Under paused time this also auto-advances the
/// clock by the given amount.
pub async fn settle(by: StdDuration) {
    tokio::time::sleep(by).await;
}
