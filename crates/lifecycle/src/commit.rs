//! Read-modify-write of one session against the conditional store.

use lessonline_core::error::CoreError;
use lessonline_core::ports::{require_session, SessionStore};
use lessonline_core::session::Session;
use lessonline_core::types::DbId;

/// Fetch the session, apply `mutate`, and conditionally write it.
///
/// A lost race is retried once against a fresh copy, so `mutate` must be
/// safe to run again. Errors from `mutate` abort without writing.
pub async fn commit_session<T, F>(
    store: &dyn SessionStore,
    session_id: DbId,
    mut mutate: F,
) -> Result<(Session, T), CoreError>
where
    F: FnMut(&mut Session) -> Result<T, CoreError>,
{
    let mut retried = false;
    loop {
        let mut session = require_session(store, session_id).await?;
        let output = mutate(&mut session)?;
        match store.update(&mut session).await {
            Ok(()) => return Ok((session, output)),
            Err(CoreError::StaleVersion { .. }) if !retried => {
                tracing::debug!(session_id, "Session changed concurrently, retrying once");
                retried = true;
            }
            Err(e) => return Err(e),
        }
    }
}
