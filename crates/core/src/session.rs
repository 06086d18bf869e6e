//! Session data model and its invariants.
//!
//! A [`Session`] is the durable record of a scheduled or on-demand meeting.
//! Invitations, confirmed participants, payment holds, and presence records
//! are embedded sub-records. Every mutating method enforces the session
//! invariants and marks the fields it touched as dirty so the store writes
//! exactly what changed on the next conditional update.
//!
//! Invariants:
//! - `confirmed ⊆ { accepted invitations }`
//! - `status = cancelled ⇒ cancellation is set`
//! - a cancelled or completed session gains no participant and no payment
//!   mutation, with one exception: releasing a stale authorization on a
//!   completed session (see [`Session::release_hold`]).
//! - `attendance = joined ⇒ hold status ∈ {authorized, captured}`

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Closed enumerations
// ---------------------------------------------------------------------------

define_str_enum! {
    /// Lifecycle status of a session.
    SessionStatus {
        Scheduled = "scheduled",
        InProgress = "in_progress",
        Completed = "completed",
        Cancelled = "cancelled",
    }
}

impl SessionStatus {
    /// Completed and cancelled sessions accept no further enrollment or
    /// payment changes.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }
}

define_str_enum! {
    /// How the session came to exist.
    SessionKind {
        /// Booked ahead of time with a capacity and optional minimum.
        Scheduled = "scheduled",
        /// Created reactively from an office-hours booking request.
        OnDemand = "on_demand",
    }
}

define_str_enum! {
    /// Why a session was cancelled.
    CancellationReason {
        MinimumNotMet = "minimum_not_met",
        Declined = "declined",
        RequestTimeout = "request_timeout",
        EntryTimeout = "entry_timeout",
        Superseded = "superseded",
        Withdrawn = "withdrawn",
    }
}

impl CancellationReason {
    /// Whether participants are told explicitly that they were not charged.
    ///
    /// Enrollment and timeout cancellations are system decisions; a
    /// withdrawal by one of the parties gets the generic wording.
    pub fn waives_charge(self) -> bool {
        match self {
            CancellationReason::MinimumNotMet
            | CancellationReason::Declined
            | CancellationReason::RequestTimeout
            | CancellationReason::EntryTimeout
            | CancellationReason::Superseded => true,
            CancellationReason::Withdrawn => false,
        }
    }
}

define_str_enum! {
    /// Response state of an invitation.
    InvitationStatus {
        Pending = "pending",
        Accepted = "accepted",
        Declined = "declined",
    }
}

define_str_enum! {
    /// State of a payment authorization hold.
    HoldStatus {
        Pending = "pending",
        Authorized = "authorized",
        Captured = "captured",
        Cancelled = "cancelled",
        Refunded = "refunded",
        Error = "error",
    }
}

impl HoldStatus {
    /// A hold that still represents money the participant may be charged.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            HoldStatus::Pending | HoldStatus::Authorized | HoldStatus::Captured
        )
    }
}

define_str_enum! {
    /// Whether the hold's participant attended the session.
    Attendance {
        NotJoined = "not_joined",
        Joined = "joined",
        NoShow = "no_show",
    }
}

// ---------------------------------------------------------------------------
// Embedded sub-records
// ---------------------------------------------------------------------------

/// Cancellation metadata, set exactly when `status = cancelled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    pub at: Timestamp,
    pub reason: CancellationReason,
    /// The user who cancelled; `None` for system-initiated cancellations.
    pub by: Option<DbId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub participant_id: DbId,
    pub status: InvitationStatus,
    pub invited_at: Timestamp,
}

/// A payment authorization placed for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentHold {
    pub id: Uuid,
    pub participant_id: DbId,
    pub amount_cents: i64,
    /// Opaque authorization reference issued by the payment gateway.
    pub reference: Option<String>,
    pub status: HoldStatus,
    pub attendance: Attendance,
    #[serde(default)]
    pub cancelled_at: Option<Timestamp>,
    #[serde(default)]
    pub error: Option<String>,
}

impl PaymentHold {
    /// A freshly authorized hold for a participant who has not joined yet.
    pub fn authorized(participant_id: DbId, amount_cents: i64, reference: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            participant_id,
            amount_cents,
            reference: Some(reference),
            status: HoldStatus::Authorized,
            attendance: Attendance::NotJoined,
            cancelled_at: None,
            error: None,
        }
    }
}

/// Join/leave bookkeeping for one participant of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub joined_at: Option<Timestamp>,
    pub left_at: Option<Timestamp>,
    pub join_count: u32,
}

impl PresenceRecord {
    /// Present iff joined and not left since the latest join.
    pub fn is_present(&self) -> bool {
        match (self.joined_at, self.left_at) {
            (Some(_), None) => true,
            (Some(joined), Some(left)) => left < joined,
            (None, _) => false,
        }
    }
}

/// Result of trying to mark a participant's hold as attended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceUpdate {
    Marked,
    AlreadyMarked,
    NoHold,
    /// The hold exists but is not authorized or captured, so attendance is
    /// left untouched.
    NotChargeable(HoldStatus),
}

// ---------------------------------------------------------------------------
// Dirty tracking
// ---------------------------------------------------------------------------

/// A persisted field group of [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionField {
    Status,
    Cancellation,
    Invitations,
    Confirmed,
    PaymentHolds,
    Presence,
}

/// The set of fields a conditional update must write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyFields(BTreeSet<SessionField>);

impl DirtyFields {
    pub fn mark(&mut self, field: SessionField) {
        self.0.insert(field);
    }

    pub fn contains(&self, field: SessionField) -> bool {
        self.0.contains(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = SessionField> + '_ {
        self.0.iter().copied()
    }
}

// ---------------------------------------------------------------------------
// NewSession
// ---------------------------------------------------------------------------

/// Input for creating a session record.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub kind: SessionKind,
    pub host_id: DbId,
    pub title: String,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub capacity: i32,
    pub min_participants: i32,
    pub enforce_minimum: bool,
    pub invitees: Vec<DbId>,
}

impl NewSession {
    /// The one-to-one session spun up by an office-hours request.
    pub fn on_demand(
        host_id: DbId,
        requester_id: DbId,
        now: Timestamp,
        length: chrono::Duration,
    ) -> Self {
        Self {
            kind: SessionKind::OnDemand,
            host_id,
            title: "Office hours".to_string(),
            starts_at: now,
            ends_at: now + length,
            capacity: 1,
            min_participants: 1,
            enforce_minimum: false,
            invitees: vec![requester_id],
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.ends_at <= self.starts_at {
            return Err(CoreError::Validation(
                "Session must end after it starts".into(),
            ));
        }
        if self.capacity < 1 {
            return Err(CoreError::Validation("Capacity must be at least 1".into()));
        }
        if self.min_participants < 0 || self.min_participants > self.capacity {
            return Err(CoreError::Validation(format!(
                "Minimum participants must be between 0 and capacity ({})",
                self.capacity
            )));
        }
        if self.invitees.contains(&self.host_id) {
            return Err(CoreError::Validation(
                "The host cannot be invited to their own session".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A scheduled or on-demand meeting with its embedded sub-records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: DbId,
    pub kind: SessionKind,
    pub host_id: DbId,
    pub title: String,
    pub starts_at: Timestamp,
    pub ends_at: Timestamp,
    pub capacity: i32,
    pub min_participants: i32,
    pub enforce_minimum: bool,
    pub status: SessionStatus,
    pub cancellation: Option<Cancellation>,
    pub invitations: Vec<Invitation>,
    pub confirmed: BTreeSet<DbId>,
    pub payment_holds: Vec<PaymentHold>,
    pub presence: BTreeMap<DbId, PresenceRecord>,
    /// Optimistic concurrency token, bumped by every successful update.
    pub version: i64,
    /// Fields to be written by the next conditional update.
    #[serde(skip)]
    pub dirty: DirtyFields,
}

impl Session {
    /// Materialize a freshly inserted session.
    pub fn from_new(id: DbId, new: &NewSession, now: Timestamp) -> Self {
        Self {
            id,
            kind: new.kind,
            host_id: new.host_id,
            title: new.title.clone(),
            starts_at: new.starts_at,
            ends_at: new.ends_at,
            capacity: new.capacity,
            min_participants: new.min_participants,
            enforce_minimum: new.enforce_minimum,
            status: SessionStatus::Scheduled,
            cancellation: None,
            invitations: new
                .invitees
                .iter()
                .map(|&participant_id| Invitation {
                    participant_id,
                    status: InvitationStatus::Pending,
                    invited_at: now,
                })
                .collect(),
            confirmed: BTreeSet::new(),
            payment_holds: Vec::new(),
            presence: BTreeMap::new(),
            version: 1,
            dirty: DirtyFields::default(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Reject any change to a completed or cancelled session.
    pub fn ensure_mutable(&self) -> Result<(), CoreError> {
        if self.is_terminal() {
            return Err(CoreError::InvalidTransition(format!(
                "session {} is {} and can no longer change",
                self.id, self.status
            )));
        }
        Ok(())
    }

    /// Force a field into the next update, for callers that edit the public
    /// sub-records directly.
    pub fn mark_dirty(&mut self, field: SessionField) {
        self.dirty.mark(field);
    }

    /// Take the pending dirty set, leaving it empty.
    pub fn take_dirty(&mut self) -> DirtyFields {
        std::mem::take(&mut self.dirty)
    }

    // -- enrollment ---------------------------------------------------------

    /// Append an invitation. Invitations are never removed.
    pub fn invite(&mut self, participant_id: DbId, at: Timestamp) -> Result<(), CoreError> {
        self.ensure_mutable()?;
        if participant_id == self.host_id {
            return Err(CoreError::Validation(
                "The host cannot be invited to their own session".into(),
            ));
        }
        if self.invitation(participant_id).is_some() {
            return Err(CoreError::Conflict(format!(
                "participant {participant_id} is already invited"
            )));
        }
        self.invitations.push(Invitation {
            participant_id,
            status: InvitationStatus::Pending,
            invited_at: at,
        });
        self.dirty.mark(SessionField::Invitations);
        Ok(())
    }

    pub fn invitation(&self, participant_id: DbId) -> Option<&Invitation> {
        self.invitations
            .iter()
            .find(|i| i.participant_id == participant_id)
    }

    /// Record a participant's answer to their invitation.
    ///
    /// Declining also drops the participant from the confirmed set so that
    /// `confirmed ⊆ accepted` keeps holding.
    pub fn respond_to_invitation(
        &mut self,
        participant_id: DbId,
        accept: bool,
    ) -> Result<(), CoreError> {
        self.ensure_mutable()?;
        let invitation = self
            .invitations
            .iter_mut()
            .find(|i| i.participant_id == participant_id)
            .ok_or_else(|| {
                CoreError::Validation(format!("participant {participant_id} is not invited"))
            })?;
        invitation.status = if accept {
            InvitationStatus::Accepted
        } else {
            InvitationStatus::Declined
        };
        self.dirty.mark(SessionField::Invitations);
        if !accept && self.confirmed.remove(&participant_id) {
            self.dirty.mark(SessionField::Confirmed);
        }
        Ok(())
    }

    /// Confirm a participant whose invitation was accepted.
    pub fn confirm(&mut self, participant_id: DbId) -> Result<(), CoreError> {
        self.ensure_mutable()?;
        match self.invitation(participant_id).map(|i| i.status) {
            Some(InvitationStatus::Accepted) => {}
            Some(status) => {
                return Err(CoreError::Validation(format!(
                    "participant {participant_id} has a {status} invitation"
                )))
            }
            None => {
                return Err(CoreError::Validation(format!(
                    "participant {participant_id} is not invited"
                )))
            }
        }
        if self.confirmed.contains(&participant_id) {
            return Ok(());
        }
        if self.confirmed.len() >= self.capacity as usize {
            return Err(CoreError::Conflict(format!(
                "session {} is full ({} participants)",
                self.id, self.capacity
            )));
        }
        self.confirmed.insert(participant_id);
        self.dirty.mark(SessionField::Confirmed);
        Ok(())
    }

    pub fn confirmed_count(&self) -> usize {
        self.confirmed.len()
    }

    /// The host and every confirmed participant.
    pub fn is_member(&self, user_id: DbId) -> bool {
        user_id == self.host_id || self.confirmed.contains(&user_id)
    }

    /// Members other than `user_id`, host first.
    pub fn other_members(&self, user_id: DbId) -> Vec<DbId> {
        std::iter::once(self.host_id)
            .chain(self.confirmed.iter().copied())
            .filter(|&id| id != user_id)
            .collect()
    }

    /// Everyone who should hear about a cancellation: the host, confirmed
    /// participants, and invitees who have not declined.
    pub fn notification_recipients(&self) -> Vec<DbId> {
        let mut seen = BTreeSet::new();
        std::iter::once(self.host_id)
            .chain(
                self.invitations
                    .iter()
                    .filter(|i| i.status != InvitationStatus::Declined)
                    .map(|i| i.participant_id),
            )
            .chain(self.confirmed.iter().copied())
            .filter(|id| seen.insert(*id))
            .collect()
    }

    // -- lifecycle ----------------------------------------------------------

    /// Move `scheduled → in_progress`. Returns `false` when already running.
    pub fn start(&mut self) -> Result<bool, CoreError> {
        match self.status {
            SessionStatus::Scheduled => {
                self.status = SessionStatus::InProgress;
                self.dirty.mark(SessionField::Status);
                Ok(true)
            }
            SessionStatus::InProgress => Ok(false),
            SessionStatus::Completed | SessionStatus::Cancelled => {
                self.ensure_mutable().map(|_| false)
            }
        }
    }

    /// Normal completion.
    pub fn complete(&mut self) -> Result<(), CoreError> {
        self.ensure_mutable()?;
        self.status = SessionStatus::Completed;
        self.dirty.mark(SessionField::Status);
        Ok(())
    }

    /// Cancel the session. Fails on a terminal session, so a repeated
    /// cancellation never overwrites the original timestamp or reason.
    pub fn cancel(
        &mut self,
        reason: CancellationReason,
        by: Option<DbId>,
        at: Timestamp,
    ) -> Result<(), CoreError> {
        self.ensure_mutable()?;
        self.status = SessionStatus::Cancelled;
        self.cancellation = Some(Cancellation { at, reason, by });
        self.dirty.mark(SessionField::Status);
        self.dirty.mark(SessionField::Cancellation);
        Ok(())
    }

    // -- presence -----------------------------------------------------------

    /// Record a join by a member. Returns the participant's join count.
    pub fn record_join(&mut self, participant_id: DbId, at: Timestamp) -> Result<u32, CoreError> {
        self.ensure_mutable()?;
        if !self.is_member(participant_id) {
            return Err(CoreError::Unauthorized(format!(
                "user {participant_id} is not a member of session {}",
                self.id
            )));
        }
        let record = self.presence.entry(participant_id).or_default();
        record.joined_at = Some(at);
        record.join_count += 1;
        let count = record.join_count;
        self.dirty.mark(SessionField::Presence);
        Ok(count)
    }

    /// Record a leave. Returns `false` when the participant was not present,
    /// in which case nothing changes.
    ///
    /// Leaving is accepted on terminal sessions: it records what happened in
    /// the call and changes neither enrollment nor payments.
    pub fn record_leave(&mut self, participant_id: DbId, at: Timestamp) -> bool {
        match self.presence.get_mut(&participant_id) {
            Some(record) if record.is_present() => {
                record.left_at = Some(at);
                self.dirty.mark(SessionField::Presence);
                true
            }
            _ => false,
        }
    }

    /// Whether the participant joined at least once.
    pub fn has_joined(&self, participant_id: DbId) -> bool {
        self.presence
            .get(&participant_id)
            .is_some_and(|r| r.join_count > 0)
    }

    pub fn is_present(&self, participant_id: DbId) -> bool {
        self.presence
            .get(&participant_id)
            .is_some_and(PresenceRecord::is_present)
    }

    // -- payments -----------------------------------------------------------

    pub fn hold(&self, hold_id: Uuid) -> Option<&PaymentHold> {
        self.payment_holds.iter().find(|h| h.id == hold_id)
    }

    /// The participant's active (pending, authorized or captured) hold.
    pub fn active_hold_for(&self, participant_id: DbId) -> Option<&PaymentHold> {
        self.payment_holds
            .iter()
            .find(|h| h.participant_id == participant_id && h.status.is_active())
    }

    /// Whether any hold is an open authorization of someone who never joined.
    pub fn has_releasable_hold(&self) -> bool {
        self.payment_holds
            .iter()
            .any(|h| h.status == HoldStatus::Authorized && h.attendance != Attendance::Joined)
    }

    /// Attach a hold for a confirmed participant without an active hold.
    pub fn attach_hold(&mut self, hold: PaymentHold) -> Result<(), CoreError> {
        self.ensure_mutable()?;
        if !self.confirmed.contains(&hold.participant_id) {
            return Err(CoreError::Validation(format!(
                "participant {} is not confirmed for session {}",
                hold.participant_id, self.id
            )));
        }
        if self.active_hold_for(hold.participant_id).is_some() {
            return Err(CoreError::Conflict(format!(
                "participant {} already has an active hold",
                hold.participant_id
            )));
        }
        self.payment_holds.push(hold);
        self.dirty.mark(SessionField::PaymentHolds);
        Ok(())
    }

    /// Mark the participant's hold as attended, if it is chargeable.
    pub fn mark_attended(&mut self, participant_id: DbId) -> AttendanceUpdate {
        let Some(hold) = self
            .payment_holds
            .iter_mut()
            .find(|h| h.participant_id == participant_id && h.status.is_active())
        else {
            return AttendanceUpdate::NoHold;
        };
        match (hold.status, hold.attendance) {
            (HoldStatus::Authorized | HoldStatus::Captured, Attendance::Joined) => {
                AttendanceUpdate::AlreadyMarked
            }
            (HoldStatus::Authorized | HoldStatus::Captured, _) => {
                hold.attendance = Attendance::Joined;
                self.dirty.mark(SessionField::PaymentHolds);
                AttendanceUpdate::Marked
            }
            (status, _) => AttendanceUpdate::NotChargeable(status),
        }
    }

    /// `authorized → captured` for a hold on a live session.
    pub fn capture_hold(&mut self, hold_id: Uuid) -> Result<(), CoreError> {
        self.ensure_mutable()?;
        let hold = self.authorized_hold_mut(hold_id)?;
        hold.status = HoldStatus::Captured;
        self.dirty.mark(SessionField::PaymentHolds);
        Ok(())
    }

    /// `authorized → cancelled` with `attendance → no_show`.
    ///
    /// Releasing a stale authorization is the one payment transition a
    /// completed session still accepts. A joined hold is never released.
    pub fn release_hold(&mut self, hold_id: Uuid, at: Timestamp) -> Result<(), CoreError> {
        let hold = self.releasable_hold_mut(hold_id)?;
        hold.status = HoldStatus::Cancelled;
        hold.attendance = Attendance::NoShow;
        hold.cancelled_at = Some(at);
        self.dirty.mark(SessionField::PaymentHolds);
        Ok(())
    }

    /// `authorized → error` with `attendance → no_show`, for holds the
    /// gateway can no longer act on.
    pub fn fail_hold(
        &mut self,
        hold_id: Uuid,
        message: impl Into<String>,
        at: Timestamp,
    ) -> Result<(), CoreError> {
        let hold = self.releasable_hold_mut(hold_id)?;
        hold.status = HoldStatus::Error;
        hold.attendance = Attendance::NoShow;
        hold.cancelled_at = Some(at);
        hold.error = Some(message.into());
        self.dirty.mark(SessionField::PaymentHolds);
        Ok(())
    }

    /// Record an invalid-state capture on a joined hold. Attendance stays
    /// `joined`: the participant did attend.
    pub fn fail_capture(&mut self, hold_id: Uuid, message: impl Into<String>) -> Result<(), CoreError> {
        self.ensure_mutable()?;
        let hold = self.authorized_hold_mut(hold_id)?;
        hold.status = HoldStatus::Error;
        hold.error = Some(message.into());
        self.dirty.mark(SessionField::PaymentHolds);
        Ok(())
    }

    fn authorized_hold_mut(&mut self, hold_id: Uuid) -> Result<&mut PaymentHold, CoreError> {
        let hold = self
            .payment_holds
            .iter_mut()
            .find(|h| h.id == hold_id)
            .ok_or_else(|| CoreError::Validation(format!("hold {hold_id} not found")))?;
        if hold.status != HoldStatus::Authorized {
            return Err(CoreError::InvalidTransition(format!(
                "hold {hold_id} is {}, expected authorized",
                hold.status
            )));
        }
        Ok(hold)
    }

    fn releasable_hold_mut(&mut self, hold_id: Uuid) -> Result<&mut PaymentHold, CoreError> {
        if self.status == SessionStatus::Cancelled {
            return Err(CoreError::InvalidTransition(format!(
                "session {} is cancelled; its holds are frozen",
                self.id
            )));
        }
        let hold = self.authorized_hold_mut(hold_id)?;
        if hold.attendance == Attendance::Joined {
            return Err(CoreError::InvalidTransition(format!(
                "hold {hold_id} belongs to a participant who joined"
            )));
        }
        Ok(hold)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
