use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use lessonline_core::error::CoreError;
use lessonline_core::ports::{GatewayError, PaymentGateway, PaymentLedger};
use lessonline_core::session::PaymentHold;
use lessonline_core::types::DbId;

use super::lock;

/// A call the gateway received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Authorize { amount_cents: i64, method: String },
    Cancel(String),
    Capture(String),
}

#[derive(Default)]
struct Script {
    calls: Vec<GatewayCall>,
    authorized: u64,
    authorize_failure: Option<GatewayError>,
    cancel_failures: HashMap<String, GatewayError>,
    capture_failures: HashMap<String, GatewayError>,
}

/// Payment gateway that succeeds unless told otherwise per reference.
#[derive(Default)]
pub struct MemoryGateway {
    script: Mutex<Script>,
}

impl MemoryGateway {
    pub fn fail_authorize(&self, error: GatewayError) {
        lock(&self.script).authorize_failure = Some(error);
    }

    pub fn fail_cancel(&self, reference: &str, error: GatewayError) {
        lock(&self.script)
            .cancel_failures
            .insert(reference.to_string(), error);
    }

    pub fn fail_capture(&self, reference: &str, error: GatewayError) {
        lock(&self.script)
            .capture_failures
            .insert(reference.to_string(), error);
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        lock(&self.script).calls.clone()
    }

    /// References passed to `cancel`, in order.
    pub fn cancelled(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::Cancel(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    pub fn captured(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                GatewayCall::Capture(r) => Some(r),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl PaymentGateway for MemoryGateway {
    async fn authorize(&self, amount_cents: i64, method: &str) -> Result<String, GatewayError> {
        let mut script = lock(&self.script);
        script.calls.push(GatewayCall::Authorize {
            amount_cents,
            method: method.to_string(),
        });
        if let Some(error) = script.authorize_failure.clone() {
            return Err(error);
        }
        script.authorized += 1;
        Ok(format!("auth_mem_{}", script.authorized))
    }

    async fn cancel(&self, reference: &str) -> Result<(), GatewayError> {
        let mut script = lock(&self.script);
        script.calls.push(GatewayCall::Cancel(reference.to_string()));
        script
            .cancel_failures
            .get(reference)
            .cloned()
            .map_or(Ok(()), Err)
    }

    async fn capture(&self, reference: &str) -> Result<(), GatewayError> {
        let mut script = lock(&self.script);
        script.calls.push(GatewayCall::Capture(reference.to_string()));
        script
            .capture_failures
            .get(reference)
            .cloned()
            .map_or(Ok(()), Err)
    }
}

/// Ledger that keeps the latest mirrored state of each hold.
#[derive(Default)]
pub struct MemoryLedger {
    entries: Mutex<HashMap<(DbId, uuid::Uuid), PaymentHold>>,
}

impl MemoryLedger {
    pub fn entry(&self, session_id: DbId, hold_id: uuid::Uuid) -> Option<PaymentHold> {
        lock(&self.entries).get(&(session_id, hold_id)).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PaymentLedger for MemoryLedger {
    async fn mirror_hold(&self, session_id: DbId, hold: &PaymentHold) -> Result<(), CoreError> {
        lock(&self.entries).insert((session_id, hold.id), hold.clone());
        Ok(())
    }
}
