use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use lessonline_core::error::CoreError;
use lessonline_core::ports::{AvailabilityStore, SessionFilter, SessionStore, UserDirectory};
use lessonline_core::session::{NewSession, Session};
use lessonline_core::types::DbId;

use super::lock;

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SessionTable {
    sessions: BTreeMap<DbId, Session>,
    last_id: DbId,
    failing_updates: HashSet<DbId>,
    racing_updates: HashSet<DbId>,
    fail_queries: bool,
    fail_inserts: bool,
    updates: usize,
}

/// Versioned session store with the same conditional-update contract as
/// the Postgres one.
#[derive(Default)]
pub struct MemorySessionStore {
    table: Mutex<SessionTable>,
}

impl MemorySessionStore {
    /// Store a prepared session. A zero id is replaced by the next free one.
    pub fn seed(&self, mut session: Session) -> Session {
        let mut table = lock(&self.table);
        if session.id == 0 {
            table.last_id += 1;
            session.id = table.last_id;
        } else {
            table.last_id = table.last_id.max(session.id);
        }
        session.take_dirty();
        table.sessions.insert(session.id, session.clone());
        session
    }

    pub fn get(&self, id: DbId) -> Option<Session> {
        lock(&self.table).sessions.get(&id).cloned()
    }

    pub fn all(&self) -> Vec<Session> {
        lock(&self.table).sessions.values().cloned().collect()
    }

    /// Make every update of `id` fail with a storage error.
    pub fn fail_updates_for(&self, id: DbId) {
        lock(&self.table).failing_updates.insert(id);
    }

    /// Let updates of `id` through again.
    pub fn allow_updates_for(&self, id: DbId) {
        lock(&self.table).failing_updates.remove(&id);
    }

    /// Let a concurrent writer win the next update of `id`.
    pub fn race_next_update(&self, id: DbId) {
        lock(&self.table).racing_updates.insert(id);
    }

    /// Make `insert` fail with a storage error.
    pub fn fail_inserts(&self, fail: bool) {
        lock(&self.table).fail_inserts = fail;
    }

    /// Make `find` fail with a storage error.
    pub fn fail_queries(&self, fail: bool) {
        lock(&self.table).fail_queries = fail;
    }

    /// Successful writes so far.
    pub fn update_count(&self) -> usize {
        lock(&self.table).updates
    }

    /// Simulate a concurrent writer touching `id`.
    pub fn bump_version(&self, id: DbId) {
        if let Some(session) = lock(&self.table).sessions.get_mut(&id) {
            session.version += 1;
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn fetch(&self, id: DbId) -> Result<Option<Session>, CoreError> {
        Ok(self.get(id))
    }

    async fn find(&self, filter: &SessionFilter) -> Result<Vec<Session>, CoreError> {
        let table = lock(&self.table);
        if table.fail_queries {
            return Err(CoreError::Storage("session store unavailable".into()));
        }
        let mut found: Vec<Session> = table
            .sessions
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        found.sort_by_key(|s| (s.starts_at, s.id));
        if let Some(limit) = filter.limit {
            found.truncate(limit.max(0) as usize);
        }
        Ok(found)
    }

    async fn insert(&self, new: &NewSession) -> Result<Session, CoreError> {
        new.validate()?;
        let mut table = lock(&self.table);
        if table.fail_inserts {
            return Err(CoreError::Storage("session insert failed".into()));
        }
        table.last_id += 1;
        let session = Session::from_new(table.last_id, new, Utc::now());
        table.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn update(&self, session: &mut Session) -> Result<(), CoreError> {
        if session.dirty.is_empty() {
            return Ok(());
        }
        let mut table = lock(&self.table);
        if table.failing_updates.contains(&session.id) {
            return Err(CoreError::Storage(format!(
                "write to session {} failed",
                session.id
            )));
        }
        let stale = CoreError::StaleVersion {
            entity: "session",
            id: session.id,
        };
        if table.racing_updates.remove(&session.id) {
            if let Some(stored) = table.sessions.get_mut(&session.id) {
                stored.version += 1;
            }
        }
        match table.sessions.get(&session.id) {
            Some(stored) if stored.version == session.version => {}
            _ => return Err(stale),
        }
        session.version += 1;
        session.take_dirty();
        table.sessions.insert(session.id, session.clone());
        table.updates += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Host calendar
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Calendar {
    session_blocks: HashSet<(DbId, DbId)>,
    on_demand: HashMap<DbId, bool>,
    fail_block_removal: bool,
}

#[derive(Default)]
pub struct MemoryAvailability {
    calendar: Mutex<Calendar>,
}

impl MemoryAvailability {
    pub fn add_session_block(&self, host_id: DbId, session_id: DbId) {
        lock(&self.calendar)
            .session_blocks
            .insert((host_id, session_id));
    }

    pub fn has_session_block(&self, host_id: DbId, session_id: DbId) -> bool {
        lock(&self.calendar)
            .session_blocks
            .contains(&(host_id, session_id))
    }

    pub fn is_enabled(&self, host_id: DbId) -> bool {
        lock(&self.calendar)
            .on_demand
            .get(&host_id)
            .copied()
            .unwrap_or(false)
    }

    pub fn enable(&self, host_id: DbId) {
        lock(&self.calendar).on_demand.insert(host_id, true);
    }

    pub fn fail_block_removal(&self, fail: bool) {
        lock(&self.calendar).fail_block_removal = fail;
    }
}

#[async_trait]
impl AvailabilityStore for MemoryAvailability {
    async fn remove_session_block(&self, host_id: DbId, session_id: DbId) -> Result<bool, CoreError> {
        let mut calendar = lock(&self.calendar);
        if calendar.fail_block_removal {
            return Err(CoreError::Storage("calendar unavailable".into()));
        }
        Ok(calendar.session_blocks.remove(&(host_id, session_id)))
    }

    async fn on_demand_enabled(&self, host_id: DbId) -> Result<bool, CoreError> {
        Ok(self.is_enabled(host_id))
    }

    async fn set_on_demand(&self, host_id: DbId, enabled: bool) -> Result<(), CoreError> {
        lock(&self.calendar).on_demand.insert(host_id, enabled);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryUsers {
    names: Mutex<HashMap<DbId, String>>,
}

impl MemoryUsers {
    pub fn insert(&self, user_id: DbId, name: impl Into<String>) {
        lock(&self.names).insert(user_id, name.into());
    }
}

#[async_trait]
impl UserDirectory for MemoryUsers {
    async fn display_name(&self, user_id: DbId) -> Result<String, CoreError> {
        Ok(lock(&self.names)
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| format!("User {user_id}")))
    }
}
