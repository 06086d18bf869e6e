//! Repository tests against a real PostgreSQL database.
//!
//! These need `DATABASE_URL`; run with `cargo test -p lessonline-db -- --ignored`.

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use lessonline_core::error::CoreError;
use lessonline_core::notice::Notice;
use lessonline_core::ports::{
    AvailabilityStore, NotificationStore, PaymentLedger, SessionFilter, SessionStore,
    UserDirectory,
};
use lessonline_core::session::{
    CancellationReason, NewSession, PaymentHold, SessionKind, SessionStatus,
};
use lessonline_db::repositories::{AvailabilityRepo, PaymentLedgerRepo, UserRepo};
use lessonline_db::store::PgStore;
use sqlx::PgPool;

async fn seed_users(pool: &PgPool) -> (i64, i64, i64) {
    let host = UserRepo::create(pool, "Host").await.unwrap();
    let a = UserRepo::create(pool, "Ada").await.unwrap();
    let b = UserRepo::create(pool, "Ben").await.unwrap();
    (host, a, b)
}

fn class(host: i64, invitees: Vec<i64>, starts_in: Duration) -> NewSession {
    let starts_at = Utc::now() + starts_in;
    NewSession {
        kind: SessionKind::Scheduled,
        host_id: host,
        title: "Statistics".into(),
        starts_at,
        ends_at: starts_at + Duration::hours(1),
        capacity: 4,
        min_participants: 3,
        enforce_minimum: true,
        invitees,
    }
}

// ---------------------------------------------------------------------------
// Conditional update
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn dirty_fields_round_trip(pool: PgPool) {
    let (host, a, _) = seed_users(&pool).await;
    let store = PgStore::new(pool);

    let mut session = store
        .insert(&class(host, vec![a], Duration::minutes(15)))
        .await
        .unwrap();
    assert_eq!(session.version, 1);

    session.respond_to_invitation(a, true).unwrap();
    session.confirm(a).unwrap();
    session
        .attach_hold(PaymentHold::authorized(a, 2500, "auth_a".into()))
        .unwrap();
    store.update(&mut session).await.unwrap();
    assert_eq!(session.version, 2);
    assert!(session.dirty.is_empty());

    let stored = store.fetch(session.id).await.unwrap().unwrap();
    assert!(stored.confirmed.contains(&a));
    assert_eq!(stored.payment_holds.len(), 1);
    assert_eq!(stored.version, 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn stale_version_is_rejected(pool: PgPool) {
    let (host, a, _) = seed_users(&pool).await;
    let store = PgStore::new(pool);
    let session = store
        .insert(&class(host, vec![a], Duration::minutes(15)))
        .await
        .unwrap();

    let mut first = session.clone();
    let mut second = session;
    first
        .cancel(CancellationReason::MinimumNotMet, None, Utc::now())
        .unwrap();
    store.update(&mut first).await.unwrap();

    second
        .cancel(CancellationReason::MinimumNotMet, None, Utc::now())
        .unwrap();
    assert_matches!(
        store.update(&mut second).await,
        Err(CoreError::StaleVersion { .. })
    );
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn find_filters_by_window_and_hold_status(pool: PgPool) {
    let (host, a, b) = seed_users(&pool).await;
    let store = PgStore::new(pool);

    let soon = store
        .insert(&class(host, vec![a], Duration::minutes(15)))
        .await
        .unwrap();
    store
        .insert(&class(host, vec![b], Duration::hours(3)))
        .await
        .unwrap();

    let now = Utc::now();
    let found = store
        .find(&SessionFilter {
            statuses: vec![SessionStatus::Scheduled],
            starts_from: Some(now + Duration::minutes(10)),
            starts_before: Some(now + Duration::minutes(20)),
            enforce_minimum: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(found.iter().map(|s| s.id).collect::<Vec<_>>(), vec![soon.id]);

    let with_holds = store
        .find(&SessionFilter {
            with_releasable_hold: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(with_holds.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn attended_authorizations_do_not_count_as_releasable(pool: PgPool) {
    let (host, a, b) = seed_users(&pool).await;
    let store = PgStore::new(pool);

    let mut attended = store
        .insert(&class(host, vec![a], Duration::minutes(15)))
        .await
        .unwrap();
    attended.respond_to_invitation(a, true).unwrap();
    attended.confirm(a).unwrap();
    attended
        .attach_hold(PaymentHold::authorized(a, 2500, "auth_a".into()))
        .unwrap();
    attended.record_join(a, Utc::now()).unwrap();
    attended.mark_attended(a);
    store.update(&mut attended).await.unwrap();

    let mut unattended = store
        .insert(&class(host, vec![b], Duration::minutes(30)))
        .await
        .unwrap();
    unattended.respond_to_invitation(b, true).unwrap();
    unattended.confirm(b).unwrap();
    unattended
        .attach_hold(PaymentHold::authorized(b, 2500, "auth_b".into()))
        .unwrap();
    store.update(&mut unattended).await.unwrap();

    let found = store
        .find(&SessionFilter {
            with_releasable_hold: true,
            limit: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(found.iter().map(|s| s.id).collect::<Vec<_>>(), vec![unattended.id]);
}

// ---------------------------------------------------------------------------
// Calendar, ledger, notifications
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn session_block_removed_once(pool: PgPool) {
    let (host, a, _) = seed_users(&pool).await;
    let store = PgStore::new(pool.clone());
    let session = store
        .insert(&class(host, vec![a], Duration::minutes(15)))
        .await
        .unwrap();
    AvailabilityRepo::create_session_block(&pool, host, session.id, session.starts_at, session.ends_at)
        .await
        .unwrap();

    assert!(store.remove_session_block(host, session.id).await.unwrap());
    assert!(!store.remove_session_block(host, session.id).await.unwrap());

    assert!(!store.on_demand_enabled(host).await.unwrap());
    store.set_on_demand(host, true).await.unwrap();
    assert!(store.on_demand_enabled(host).await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn ledger_mirror_overwrites_status(pool: PgPool) {
    let (host, a, _) = seed_users(&pool).await;
    let store = PgStore::new(pool.clone());
    let session = store
        .insert(&class(host, vec![a], Duration::minutes(15)))
        .await
        .unwrap();

    let mut hold = PaymentHold::authorized(a, 1200, "auth_l".into());
    store.mirror_hold(session.id, &hold).await.unwrap();
    hold.status = lessonline_core::session::HoldStatus::Cancelled;
    store.mirror_hold(session.id, &hold).await.unwrap();

    let entries = PaymentLedgerRepo::list_for_session(&pool, session.id)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, "cancelled");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn notification_persisted_and_names_resolved(pool: PgPool) {
    let (host, _, _) = seed_users(&pool).await;
    let store = PgStore::new(pool);

    let record = store
        .persist(&Notice::missed_request(1, host, "Ada"))
        .await
        .unwrap();
    assert_eq!(record.recipient_id, host);
    assert!(!record.is_read);

    assert_eq!(store.display_name(host).await.unwrap(), "Host");
    assert_eq!(store.display_name(9_999).await.unwrap(), "A participant");
}
