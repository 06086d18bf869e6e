//! Placing a payment hold for a confirmed participant.

use lessonline_core::error::CoreError;
use lessonline_core::ports::require_session;
use lessonline_core::session::PaymentHold;
use lessonline_core::types::DbId;
use lessonline_events::bus::names;
use lessonline_events::LifecycleEvent;
use serde_json::json;

use crate::commit::commit_session;
use crate::ports::Ports;

/// Authorize `amount_cents` on `method` and attach the hold to the session.
///
/// If the hold cannot be persisted after the gateway authorized it, the
/// authorization is cancelled again so no money stays reserved.
pub async fn place_hold(
    ports: &Ports,
    session_id: DbId,
    participant_id: DbId,
    amount_cents: i64,
    method: &str,
) -> Result<PaymentHold, CoreError> {
    if amount_cents <= 0 {
        return Err(CoreError::Validation("Amount must be positive".into()));
    }

    // Fail fast before touching the gateway.
    let session = require_session(ports.sessions.as_ref(), session_id).await?;
    session.ensure_mutable()?;
    if !session.confirmed.contains(&participant_id) {
        return Err(CoreError::Validation(format!(
            "participant {participant_id} is not confirmed for session {session_id}"
        )));
    }
    if session.active_hold_for(participant_id).is_some() {
        return Err(CoreError::Conflict(format!(
            "participant {participant_id} already has an active hold"
        )));
    }

    let reference = ports.gateway.authorize(amount_cents, method).await?;
    let hold = PaymentHold::authorized(participant_id, amount_cents, reference.clone());

    let attached = commit_session(ports.sessions.as_ref(), session_id, |s| {
        s.attach_hold(hold.clone())
    })
    .await;
    if let Err(e) = attached {
        tracing::error!(
            session_id,
            participant_id,
            error = %e,
            "Could not attach authorized hold, cancelling the authorization"
        );
        if let Err(cancel_err) = ports.gateway.cancel(&reference).await {
            tracing::error!(
                session_id,
                participant_id,
                error = %cancel_err,
                "Compensating cancellation failed; authorization left to lapse"
            );
        }
        return Err(e);
    }

    if let Err(e) = ports.ledger.mirror_hold(session_id, &hold).await {
        tracing::error!(session_id, hold_id = %hold.id, error = %e, "Failed to mirror hold into ledger");
    }
    ports.events.publish(
        LifecycleEvent::new(names::HOLD_AUTHORIZED)
            .for_session(session_id)
            .with_actor(Some(participant_id))
            .with_payload(json!({ "hold_id": hold.id, "amount_cents": amount_cents })),
    );
    tracing::info!(session_id, participant_id, hold_id = %hold.id, "Payment hold placed");

    Ok(hold)
}
