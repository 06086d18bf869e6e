//! [`PgStore`]: the PostgreSQL implementation of the collaborator ports.

use async_trait::async_trait;
use chrono::Utc;
use lessonline_core::error::CoreError;
use lessonline_core::notice::{Notice, NotificationRecord};
use lessonline_core::ports::{
    AvailabilityStore, NotificationStore, PaymentLedger, SessionFilter, SessionStore,
    UserDirectory,
};
use lessonline_core::session::{NewSession, PaymentHold, Session};
use lessonline_core::types::DbId;

use crate::repositories::{
    AvailabilityRepo, NotificationRepo, PaymentLedgerRepo, SessionRepo, UserRepo,
};
use crate::DbPool;

/// Display name used when a user row is missing.
const UNKNOWN_USER: &str = "A participant";

fn storage_err(e: sqlx::Error) -> CoreError {
    CoreError::Storage(e.to_string())
}

/// Session, calendar, ledger, notification, and user storage over one pool.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn fetch(&self, id: DbId) -> Result<Option<Session>, CoreError> {
        SessionRepo::find_by_id(&self.pool, id)
            .await
            .map_err(storage_err)?
            .map(Session::try_from)
            .transpose()
    }

    async fn find(&self, filter: &SessionFilter) -> Result<Vec<Session>, CoreError> {
        SessionRepo::find(&self.pool, filter)
            .await
            .map_err(storage_err)?
            .into_iter()
            .map(Session::try_from)
            .collect()
    }

    async fn insert(&self, new: &NewSession) -> Result<Session, CoreError> {
        new.validate()?;
        let draft = Session::from_new(0, new, Utc::now());
        let row = SessionRepo::insert(&self.pool, &draft)
            .await
            .map_err(storage_err)?;
        Session::try_from(row)
    }

    async fn update(&self, session: &mut Session) -> Result<(), CoreError> {
        if session.dirty.is_empty() {
            return Ok(());
        }
        let written = SessionRepo::update_dirty(&self.pool, session)
            .await
            .map_err(storage_err)?;
        if !written {
            return Err(CoreError::StaleVersion {
                entity: "session",
                id: session.id,
            });
        }
        session.version += 1;
        session.take_dirty();
        Ok(())
    }
}

#[async_trait]
impl AvailabilityStore for PgStore {
    async fn remove_session_block(&self, host_id: DbId, session_id: DbId) -> Result<bool, CoreError> {
        AvailabilityRepo::delete_session_block(&self.pool, host_id, session_id)
            .await
            .map_err(storage_err)
    }

    async fn on_demand_enabled(&self, host_id: DbId) -> Result<bool, CoreError> {
        AvailabilityRepo::on_demand_enabled(&self.pool, host_id)
            .await
            .map_err(storage_err)
    }

    async fn set_on_demand(&self, host_id: DbId, enabled: bool) -> Result<(), CoreError> {
        AvailabilityRepo::set_on_demand(&self.pool, host_id, enabled)
            .await
            .map_err(storage_err)
    }
}

#[async_trait]
impl PaymentLedger for PgStore {
    async fn mirror_hold(&self, session_id: DbId, hold: &PaymentHold) -> Result<(), CoreError> {
        PaymentLedgerRepo::upsert(&self.pool, session_id, hold)
            .await
            .map_err(storage_err)
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn persist(&self, notice: &Notice) -> Result<NotificationRecord, CoreError> {
        let row = NotificationRepo::create(&self.pool, notice)
            .await
            .map_err(storage_err)?;
        NotificationRecord::try_from(row)
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn display_name(&self, user_id: DbId) -> Result<String, CoreError> {
        let name = UserRepo::display_name(&self.pool, user_id)
            .await
            .map_err(storage_err)?;
        Ok(name.unwrap_or_else(|| UNKNOWN_USER.to_string()))
    }
}
