//! Presence & Booking Coordinator.
//!
//! Drives the per-host [`BookingPhase`] machine from inbound signals
//! (request, accept/decline, join, leave, end, withdraw) and from its own
//! response and entry deadlines. Every signal for a host runs under that
//! host's lock, so two events for the same host never interleave; different
//! hosts proceed in parallel.
//!
//! Inside the lock a handler commits to the session store, then sends
//! realtime pushes (keeping join/leave order per session). Persisted notices
//! are delivered after the lock is released.

mod timers;

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use lessonline_core::booking::{BookingPhase, BookingResponse, PendingRequest, TimerKind};
use lessonline_core::error::CoreError;
use lessonline_core::notice::Notice;
use lessonline_core::ports::{require_session, GatewayError};
use lessonline_core::realtime::{NextAction, RealtimeEvent};
use lessonline_core::session::{
    AttendanceUpdate, Attendance, CancellationReason, HoldStatus, InvitationStatus, NewSession,
    Session, SessionKind,
};
use lessonline_core::types::{DbId, Timestamp};
use lessonline_events::bus::names;
use lessonline_events::LifecycleEvent;
use serde_json::json;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

pub use timers::TimerSlots;

use crate::commit::commit_session;
use crate::config::CoordinatorConfig;
use crate::dispatch::{DispatchSummary, Outbox};
use crate::ports::Ports;

/// Booking state and deadlines of one host.
#[derive(Default)]
struct HostSlot {
    phase: BookingPhase,
    timers: TimerSlots,
}

type HostMap = Mutex<HashMap<DbId, Arc<AsyncMutex<HostSlot>>>>;

/// Exclusive access to one host's slot.
///
/// Dropping the guard forgets the slot when it is idle with nothing armed
/// and no other handler is queued on it; the next signal starts fresh.
struct HostGuard {
    slot: OwnedMutexGuard<HostSlot>,
    host_id: DbId,
    hosts: Arc<HostMap>,
}

impl Deref for HostGuard {
    type Target = HostSlot;

    fn deref(&self) -> &HostSlot {
        &self.slot
    }
}

impl DerefMut for HostGuard {
    fn deref_mut(&mut self) -> &mut HostSlot {
        &mut self.slot
    }
}

impl Drop for HostGuard {
    fn drop(&mut self) {
        if !matches!(self.slot.phase, BookingPhase::Idle) || self.slot.timers.armed_count() > 0 {
            return;
        }
        let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        let shared = OwnedMutexGuard::mutex(&self.slot);
        // One reference in the map, one in this guard: nobody is waiting.
        let unshared = Arc::strong_count(shared) == 2
            && hosts
                .get(&self.host_id)
                .is_some_and(|entry| Arc::ptr_eq(entry, shared));
        if unshared {
            hosts.remove(&self.host_id);
        }
    }
}

struct Inner {
    ports: Ports,
    config: CoordinatorConfig,
    hosts: Arc<HostMap>,
}

/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

fn deadline(now: Timestamp, after: Duration) -> Timestamp {
    now + chrono::Duration::seconds(after.as_secs() as i64)
}

impl Coordinator {
    pub fn new(ports: Ports, config: CoordinatorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                ports,
                config,
                hosts: Arc::new(Mutex::new(HashMap::new())),
            }),
        }
    }

    fn ports(&self) -> &Ports {
        &self.inner.ports
    }

    async fn lock_host(&self, host_id: DbId) -> HostGuard {
        let slot = {
            let mut hosts = self
                .inner
                .hosts
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            hosts.entry(host_id).or_default().clone()
        };
        HostGuard {
            slot: slot.lock_owned().await,
            host_id,
            hosts: self.inner.hosts.clone(),
        }
    }

    async fn display_name(&self, user_id: DbId) -> String {
        match self.ports().users.display_name(user_id).await {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Display name lookup failed");
                "Someone".to_string()
            }
        }
    }

    /// Send pushes while still holding the host lock, then release it and
    /// deliver the persisted notices.
    async fn dispatch(&self, mut outbox: Outbox, guard: HostGuard) -> DispatchSummary {
        let mut summary = DispatchSummary::default();
        outbox
            .flush_realtime(&self.ports().events, self.ports().fanout.as_ref(), &mut summary)
            .await;
        drop(guard);
        outbox
            .deliver_notices(self.ports().fanout.as_ref(), &mut summary)
            .await;
        summary
    }

    fn arm(&self, slot: &mut HostSlot, host_id: DbId, kind: TimerKind) -> u64 {
        let after = match kind {
            TimerKind::Response => self.inner.config.response_timeout,
            TimerKind::Entry => self.inner.config.entry_timeout,
        };
        self.arm_after(slot, host_id, kind, after)
    }

    /// Re-arm a deadline whose handling hit a storage failure. The phase is
    /// left as it was, so the next firing finds the same booking.
    fn retry_deadline(&self, slot: &mut HostSlot, host_id: DbId, kind: TimerKind) {
        let after = self.inner.config.deadline_retry;
        tracing::warn!(host_id, ?kind, retry_in_secs = after.as_secs(), "Deadline handling deferred");
        self.arm_after(slot, host_id, kind, after);
    }

    fn arm_after(&self, slot: &mut HostSlot, host_id: DbId, kind: TimerKind, after: Duration) -> u64 {
        let this = self.clone();
        slot.timers.arm(kind, after, move |generation| async move {
            match kind {
                TimerKind::Response => this.on_response_timeout(host_id, generation).await,
                TimerKind::Entry => this.on_entry_timeout(host_id, generation).await,
            }
        })
    }

    /// Cancel a session unless it already reached a terminal state.
    ///
    /// Returns the stored session and whether this call cancelled it.
    async fn cancel_session(
        &self,
        session_id: DbId,
        reason: CancellationReason,
        by: Option<DbId>,
    ) -> Result<(Session, bool), CoreError> {
        let now = Utc::now();
        commit_session(self.ports().sessions.as_ref(), session_id, |s| {
            if s.is_terminal() {
                return Ok(false);
            }
            s.cancel(reason, by, now)?;
            Ok(true)
        })
        .await
    }

    async fn set_host_availability(
        &self,
        host_id: DbId,
        enabled: bool,
        reason: &str,
        outbox: &mut Outbox,
    ) {
        match self.ports().availability.set_on_demand(host_id, enabled).await {
            Ok(()) => outbox.push(
                host_id,
                RealtimeEvent::AvailabilityChanged {
                    host_id,
                    on_demand: enabled,
                    reason: Some(reason.to_string()),
                },
            ),
            Err(e) => tracing::error!(host_id, enabled, error = %e, "Failed to update on-demand availability"),
        }
    }

    fn cancelled_event(session: &Session, reason: CancellationReason, by: Option<DbId>) -> LifecycleEvent {
        LifecycleEvent::new(names::SESSION_CANCELLED)
            .for_session(session.id)
            .with_actor(by)
            .with_payload(json!({ "reason": reason, "kind": session.kind }))
    }

    // -----------------------------------------------------------------------
    // Booking requests
    // -----------------------------------------------------------------------

    /// A requester asks an available host for an immediate session.
    ///
    /// A request still pending for the host is superseded: its session is
    /// cancelled, its deadline disarmed, and the host's pending view cleared
    /// before the new request is established.
    pub async fn request_booking(&self, host_id: DbId, requester_id: DbId) -> Result<PendingRequest, CoreError> {
        if host_id == requester_id {
            return Err(CoreError::Validation(
                "You cannot request a session with yourself".into(),
            ));
        }

        let mut slot = self.lock_host(host_id).await;
        let superseded = slot.phase.admit_request()?.cloned();
        if !self.ports().availability.on_demand_enabled(host_id).await? {
            return Err(CoreError::Conflict(format!(
                "host {host_id} is not accepting on-demand requests"
            )));
        }

        let mut outbox = Outbox::default();
        if let Some(previous) = superseded {
            self.supersede(&mut slot, host_id, &previous, &mut outbox).await?;
        }

        let now = Utc::now();
        let inserted = self
            .ports()
            .sessions
            .insert(&NewSession::on_demand(
                host_id,
                requester_id,
                now,
                self.inner.config.session_length,
            ))
            .await;
        let session = match inserted {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(host_id, requester_id, error = %e, "Failed to create on-demand session");
                // A superseded request is already cancelled in the store.
                self.dispatch(outbox, slot).await;
                return Err(e);
            }
        };

        let request = PendingRequest {
            request_id: Uuid::new_v4(),
            session_id: session.id,
            requester_id,
            created_at: now,
            respond_by: deadline(now, self.inner.config.response_timeout),
        };
        self.arm(&mut slot, host_id, TimerKind::Response);
        slot.phase = BookingPhase::RequestPending(request.clone());

        let requester_name = self.display_name(requester_id).await;
        outbox.push(
            host_id,
            RealtimeEvent::BookingRequested {
                session_id: session.id,
                request_id: request.request_id,
                requester_id,
                requester_name: requester_name.clone(),
                respond_by: request.respond_by,
            },
        );
        outbox.notice(Notice::booking_requested(session.id, host_id, &requester_name));
        outbox.event(
            LifecycleEvent::new(names::BOOKING_REQUESTED)
                .for_session(session.id)
                .with_actor(Some(requester_id))
                .with_payload(json!({ "host_id": host_id, "request_id": request.request_id })),
        );

        tracing::info!(host_id, requester_id, session_id = session.id, "Booking requested");
        self.dispatch(outbox, slot).await;
        Ok(request)
    }

    async fn supersede(
        &self,
        slot: &mut HostSlot,
        host_id: DbId,
        previous: &PendingRequest,
        outbox: &mut Outbox,
    ) -> Result<(), CoreError> {
        let reason = CancellationReason::Superseded;
        let (session, cancelled) = self.cancel_session(previous.session_id, reason, None).await?;
        slot.timers.disarm(TimerKind::Response);
        slot.phase = BookingPhase::Idle;

        tracing::info!(
            host_id,
            session_id = previous.session_id,
            requester_id = previous.requester_id,
            "Pending request superseded"
        );
        outbox.push(
            host_id,
            RealtimeEvent::SessionCancelled {
                session_id: previous.session_id,
                cancelled_by: None,
                reason,
                next: NextAction::Dismiss,
            },
        );
        if cancelled {
            outbox.push(
                previous.requester_id,
                RealtimeEvent::SessionCancelled {
                    session_id: previous.session_id,
                    cancelled_by: None,
                    reason,
                    next: NextAction::Retry,
                },
            );
            outbox.notice(Notice::session_cancelled(&session, previous.requester_id, reason));
            outbox.event(Self::cancelled_event(&session, reason, None));
        }
        Ok(())
    }

    /// The host accepts or declines its pending request.
    pub async fn respond_to_booking(&self, host_id: DbId, response: BookingResponse) -> Result<Session, CoreError> {
        let mut slot = self.lock_host(host_id).await;
        let pending = slot.phase.pending()?.clone();
        let host_name = self.display_name(host_id).await;
        let mut outbox = Outbox::default();

        let session = match response {
            BookingResponse::Accept => {
                let (session, ()) = commit_session(
                    self.ports().sessions.as_ref(),
                    pending.session_id,
                    |s| {
                        s.respond_to_invitation(pending.requester_id, true)?;
                        s.confirm(pending.requester_id)
                    },
                )
                .await?;
                slot.timers.disarm(TimerKind::Response);
                self.set_host_availability(host_id, false, "booking_accepted", &mut outbox)
                    .await;

                let enter_by = deadline(Utc::now(), self.inner.config.entry_timeout);
                self.arm(&mut slot, host_id, TimerKind::Entry);
                slot.phase = BookingPhase::Accepted {
                    session_id: session.id,
                    requester_id: pending.requester_id,
                    enter_by,
                };

                outbox.push(
                    pending.requester_id,
                    RealtimeEvent::BookingAccepted {
                        session_id: session.id,
                        host_id,
                        enter_by,
                    },
                );
                outbox.notice(Notice::booking_accepted(
                    session.id,
                    pending.requester_id,
                    &host_name,
                    enter_by,
                ));
                outbox.event(
                    LifecycleEvent::new(names::BOOKING_ACCEPTED)
                        .for_session(session.id)
                        .with_actor(Some(host_id))
                        .with_payload(json!({ "requester_id": pending.requester_id, "enter_by": enter_by })),
                );
                tracing::info!(host_id, session_id = session.id, "Booking accepted");
                session
            }
            BookingResponse::Decline => {
                let reason = CancellationReason::Declined;
                let (session, cancelled) = self
                    .cancel_session(pending.session_id, reason, Some(host_id))
                    .await?;
                slot.timers.disarm(TimerKind::Response);
                slot.phase = BookingPhase::Idle;
                self.set_host_availability(host_id, false, "declined", &mut outbox)
                    .await;

                if cancelled {
                    outbox.push(
                        pending.requester_id,
                        RealtimeEvent::SessionCancelled {
                            session_id: session.id,
                            cancelled_by: Some(host_id),
                            reason,
                            next: NextAction::Retry,
                        },
                    );
                    outbox.notice(Notice::booking_declined(
                        session.id,
                        pending.requester_id,
                        &host_name,
                    ));
                    outbox.event(Self::cancelled_event(&session, reason, Some(host_id)));
                }
                outbox.notice(Notice::availability_disabled(host_id));
                tracing::info!(host_id, session_id = session.id, "Booking declined");
                session
            }
        };

        self.dispatch(outbox, slot).await;
        Ok(session)
    }

    async fn on_response_timeout(&self, host_id: DbId, generation: u64) {
        let mut slot = self.lock_host(host_id).await;
        if !slot.timers.take_fired(TimerKind::Response, generation) {
            tracing::debug!(host_id, generation, "Stale response deadline ignored");
            return;
        }
        let BookingPhase::RequestPending(pending) = slot.phase.clone() else {
            tracing::debug!(host_id, phase = slot.phase.name(), "Response deadline fired outside request_pending");
            return;
        };

        let reason = CancellationReason::RequestTimeout;
        let (session, cancelled) = match self.cancel_session(pending.session_id, reason, None).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(
                    host_id,
                    session_id = pending.session_id,
                    error = %e,
                    "Failed to cancel timed-out request"
                );
                self.retry_deadline(&mut slot, host_id, TimerKind::Response);
                return;
            }
        };
        slot.phase = BookingPhase::Idle;

        let mut outbox = Outbox::default();
        self.set_host_availability(host_id, false, "missed_request", &mut outbox)
            .await;
        if !cancelled {
            tracing::debug!(host_id, session_id = session.id, "Timed-out request was already closed");
            self.dispatch(outbox, slot).await;
            return;
        }

        tracing::info!(host_id, session_id = session.id, "Booking request timed out");
        let host_name = self.display_name(host_id).await;
        let requester_name = self.display_name(pending.requester_id).await;
        outbox.push(
            pending.requester_id,
            RealtimeEvent::SessionCancelled {
                session_id: session.id,
                cancelled_by: None,
                reason,
                next: NextAction::Retry,
            },
        );
        outbox.push(
            host_id,
            RealtimeEvent::SessionCancelled {
                session_id: session.id,
                cancelled_by: None,
                reason,
                next: NextAction::Dismiss,
            },
        );
        outbox.notice(Notice::booking_timed_out(session.id, pending.requester_id, &host_name));
        outbox.notice(Notice::missed_request(session.id, host_id, &requester_name));
        outbox.event(Self::cancelled_event(&session, reason, None));
        self.dispatch(outbox, slot).await;
    }

    async fn on_entry_timeout(&self, host_id: DbId, generation: u64) {
        let mut slot = self.lock_host(host_id).await;
        if !slot.timers.take_fired(TimerKind::Entry, generation) {
            tracing::debug!(host_id, generation, "Stale entry deadline ignored");
            return;
        }
        let BookingPhase::Accepted {
            session_id,
            requester_id,
            ..
        } = slot.phase.clone()
        else {
            tracing::debug!(host_id, phase = slot.phase.name(), "Entry deadline fired outside accepted");
            return;
        };

        match require_session(self.ports().sessions.as_ref(), session_id).await {
            Ok(session) if session.has_joined(requester_id) => {
                tracing::debug!(host_id, session_id, "Requester joined before the entry deadline");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(host_id, session_id, error = %e, "Cannot load session at entry deadline");
                self.retry_deadline(&mut slot, host_id, TimerKind::Entry);
                return;
            }
        }

        let reason = CancellationReason::EntryTimeout;
        let (session, cancelled) = match self.cancel_session(session_id, reason, None).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(host_id, session_id, error = %e, "Failed to cancel after entry timeout");
                self.retry_deadline(&mut slot, host_id, TimerKind::Entry);
                return;
            }
        };
        slot.phase = BookingPhase::Idle;
        if !cancelled {
            tracing::debug!(host_id, session_id, "Session already closed at entry deadline");
            return;
        }
        tracing::info!(host_id, session_id, requester_id, "Requester did not enter in time");

        // The host stays in the waiting room if still connected.
        let host_waiting = self
            .ports()
            .fanout
            .push_if_connected(
                host_id,
                &RealtimeEvent::SessionCancelled {
                    session_id,
                    cancelled_by: None,
                    reason,
                    next: NextAction::KeepWaiting,
                },
            )
            .await;

        let mut outbox = Outbox::default();
        if host_waiting {
            self.set_host_availability(host_id, true, "waiting_restored", &mut outbox)
                .await;
            outbox.push(
                host_id,
                RealtimeEvent::WaitingRestored {
                    host_id,
                    cancelled_session_id: session_id,
                },
            );
        }
        outbox.push(
            requester_id,
            RealtimeEvent::SessionCancelled {
                session_id,
                cancelled_by: None,
                reason,
                next: NextAction::Retry,
            },
        );
        let requester_name = self.display_name(requester_id).await;
        outbox.notice(Notice::session_cancelled(&session, requester_id, reason));
        outbox.notice(Notice::entry_timeout(session_id, host_id, &requester_name));
        outbox.event(Self::cancelled_event(&session, reason, None));
        self.dispatch(outbox, slot).await;
    }

    // -----------------------------------------------------------------------
    // Presence
    // -----------------------------------------------------------------------

    /// A member entered the call.
    pub async fn report_join(&self, session_id: DbId, participant_id: DbId) -> Result<Session, CoreError> {
        let host_id = require_session(self.ports().sessions.as_ref(), session_id)
            .await?
            .host_id;
        let mut slot = self.lock_host(host_id).await;

        let now = Utc::now();
        let (session, (join_count, started, attendance)) =
            commit_session(self.ports().sessions.as_ref(), session_id, |s| {
                let count = s.record_join(participant_id, now)?;
                let started = s.start()?;
                Ok((count, started, s.mark_attended(participant_id)))
            })
            .await?;

        if let AttendanceUpdate::NotChargeable(status) = attendance {
            tracing::warn!(
                session_id,
                participant_id,
                %status,
                "Participant joined but their hold is not chargeable; attendance left unchanged"
            );
        }

        if let BookingPhase::Accepted { session_id: guarded, requester_id, .. } = slot.phase.clone() {
            if guarded == session_id && session.has_joined(requester_id) {
                slot.timers.disarm(TimerKind::Entry);
                if session.has_joined(host_id) {
                    slot.phase = BookingPhase::Active {
                        session_id,
                        requester_id,
                    };
                }
            }
        }

        let display_name = self.display_name(participant_id).await;
        let mut outbox = Outbox::default();
        for other in session.other_members(participant_id) {
            outbox.push(
                other,
                RealtimeEvent::PresenceJoined {
                    session_id,
                    participant_id,
                    display_name: display_name.clone(),
                    joined_at: now,
                },
            );
        }
        if started {
            outbox.event(
                LifecycleEvent::new(names::SESSION_STARTED)
                    .for_session(session_id)
                    .with_actor(Some(participant_id)),
            );
        }
        tracing::debug!(session_id, participant_id, join_count, "Participant joined");
        self.dispatch(outbox, slot).await;
        Ok(session)
    }

    /// A member left the call. Leaving never cancels anything.
    pub async fn report_leave(&self, session_id: DbId, participant_id: DbId) -> Result<Session, CoreError> {
        let host_id = require_session(self.ports().sessions.as_ref(), session_id)
            .await?
            .host_id;
        let slot = self.lock_host(host_id).await;

        let now = Utc::now();
        let (session, left) = commit_session(self.ports().sessions.as_ref(), session_id, |s| {
            if !s.is_member(participant_id) {
                return Err(CoreError::Unauthorized(format!(
                    "user {participant_id} is not a member of session {session_id}"
                )));
            }
            Ok(s.record_leave(participant_id, now))
        })
        .await?;

        let mut outbox = Outbox::default();
        if left {
            let display_name = self.display_name(participant_id).await;
            for other in session.other_members(participant_id) {
                outbox.push(
                    other,
                    RealtimeEvent::PresenceLeft {
                        session_id,
                        participant_id,
                        display_name: display_name.clone(),
                        left_at: now,
                    },
                );
            }
            tracing::debug!(session_id, participant_id, "Participant left");
        }
        self.dispatch(outbox, slot).await;
        Ok(session)
    }

    // -----------------------------------------------------------------------
    // Ending and withdrawing
    // -----------------------------------------------------------------------

    /// Normal completion: capture attended holds and mark the session
    /// completed.
    pub async fn end_session(&self, session_id: DbId, by: DbId) -> Result<Session, CoreError> {
        let host_id = require_session(self.ports().sessions.as_ref(), session_id)
            .await?
            .host_id;
        let mut slot = self.lock_host(host_id).await;

        let current = require_session(self.ports().sessions.as_ref(), session_id).await?;
        if !current.is_member(by) {
            return Err(CoreError::Unauthorized(format!(
                "user {by} is not a member of session {session_id}"
            )));
        }
        current.ensure_mutable()?;

        let mut captures = Vec::new();
        for hold in current
            .payment_holds
            .iter()
            .filter(|h| h.status == HoldStatus::Authorized && h.attendance == Attendance::Joined)
        {
            let outcome = match hold.reference.as_deref() {
                Some(reference) => self.ports().gateway.capture(reference).await,
                None => Err(GatewayError::InvalidState(
                    "hold has no authorization reference".into(),
                )),
            };
            if let Err(GatewayError::Transient(e)) = &outcome {
                tracing::warn!(session_id, hold_id = %hold.id, error = %e, "Capture failed, hold stays authorized");
            }
            captures.push((hold.id, outcome));
        }

        let (session, ()) = commit_session(self.ports().sessions.as_ref(), session_id, |s| {
            for (hold_id, outcome) in &captures {
                if s.hold(*hold_id).map(|h| h.status) != Some(HoldStatus::Authorized) {
                    continue;
                }
                match outcome {
                    Ok(()) => s.capture_hold(*hold_id)?,
                    Err(GatewayError::InvalidState(msg)) => s.fail_capture(*hold_id, msg.clone())?,
                    Err(GatewayError::Transient(_)) => {}
                }
            }
            s.complete()
        })
        .await?;

        if slot.phase.guards(session_id) {
            slot.timers.disarm_all();
            slot.phase = BookingPhase::Idle;
        }

        let mut outbox = Outbox::default();
        for (hold_id, outcome) in &captures {
            let Some(hold) = session.hold(*hold_id) else {
                continue;
            };
            if let Err(e) = self.ports().ledger.mirror_hold(session_id, hold).await {
                tracing::error!(session_id, %hold_id, error = %e, "Failed to mirror hold into ledger");
            }
            if outcome.is_ok() {
                outbox.event(
                    LifecycleEvent::new(names::HOLD_CAPTURED)
                        .for_session(session_id)
                        .with_payload(json!({ "hold_id": hold_id, "amount_cents": hold.amount_cents })),
                );
            }
        }
        outbox.event(
            LifecycleEvent::new(names::SESSION_COMPLETED)
                .for_session(session_id)
                .with_actor(Some(by)),
        );
        for other in session.other_members(by) {
            outbox.push(
                other,
                RealtimeEvent::SessionEnded {
                    session_id,
                    ended_by: by,
                },
            );
            outbox.notice(Notice::session_ended(&session, other));
        }

        tracing::info!(session_id, ended_by = by, captured = captures.len(), "Session completed");
        self.dispatch(outbox, slot).await;
        Ok(session)
    }

    /// A party cancels a session they belong to.
    pub async fn withdraw(&self, session_id: DbId, by: DbId) -> Result<Session, CoreError> {
        let host_id = require_session(self.ports().sessions.as_ref(), session_id)
            .await?
            .host_id;
        let mut slot = self.lock_host(host_id).await;

        let current = require_session(self.ports().sessions.as_ref(), session_id).await?;
        let invited = current
            .invitation(by)
            .is_some_and(|i| i.status != InvitationStatus::Declined);
        if !current.is_member(by) && !invited {
            return Err(CoreError::Unauthorized(format!(
                "user {by} cannot cancel session {session_id}"
            )));
        }
        current.ensure_mutable()?;

        let reason = CancellationReason::Withdrawn;
        let (session, cancelled) = self.cancel_session(session_id, reason, Some(by)).await?;
        if !cancelled {
            return Err(CoreError::InvalidTransition(format!(
                "session {session_id} is already {}",
                session.status
            )));
        }
        if slot.phase.guards(session_id) {
            slot.timers.disarm_all();
            slot.phase = BookingPhase::Idle;
        }

        let mut outbox = Outbox::default();
        for recipient in session
            .notification_recipients()
            .into_iter()
            .filter(|&id| id != by)
        {
            let next = if session.kind == SessionKind::OnDemand && recipient != session.host_id {
                NextAction::Retry
            } else {
                NextAction::Dismiss
            };
            outbox.push(
                recipient,
                RealtimeEvent::SessionCancelled {
                    session_id,
                    cancelled_by: Some(by),
                    reason,
                    next,
                },
            );
            outbox.notice(Notice::session_cancelled(&session, recipient, reason));
        }
        outbox.event(Self::cancelled_event(&session, reason, Some(by)));

        tracing::info!(session_id, cancelled_by = by, "Session withdrawn");
        self.dispatch(outbox, slot).await;
        Ok(session)
    }

    // -----------------------------------------------------------------------
    // Availability and introspection
    // -----------------------------------------------------------------------

    /// Switch the host's on-demand availability. Turning it on is refused
    /// while the host is in an accepted or active booking.
    pub async fn set_availability(&self, host_id: DbId, enabled: bool) -> Result<(), CoreError> {
        let slot = self.lock_host(host_id).await;
        if enabled && !slot.phase.allows_availability() {
            return Err(CoreError::Conflict(format!(
                "host {host_id} is busy with a booking ({})",
                slot.phase.name()
            )));
        }
        self.ports()
            .availability
            .set_on_demand(host_id, enabled)
            .await?;

        let mut outbox = Outbox::default();
        outbox.push(
            host_id,
            RealtimeEvent::AvailabilityChanged {
                host_id,
                on_demand: enabled,
                reason: None,
            },
        );
        self.dispatch(outbox, slot).await;
        Ok(())
    }

    /// Snapshot of the host's booking phase.
    pub async fn phase(&self, host_id: DbId) -> BookingPhase {
        self.lock_host(host_id).await.phase.clone()
    }

    /// Number of deadlines currently armed for the host.
    pub async fn armed_timers(&self, host_id: DbId) -> usize {
        self.lock_host(host_id).await.timers.armed_count()
    }

    /// Hosts whose booking state is currently held in memory.
    pub fn tracked_hosts(&self) -> usize {
        self.inner
            .hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Disarm every deadline. Called on shutdown.
    pub async fn shutdown(&self) {
        let slots: Vec<_> = self
            .inner
            .hosts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for slot in slots {
            slot.lock().await.timers.disarm_all();
        }
    }
}
