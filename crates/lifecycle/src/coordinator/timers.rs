//! Per-host deadline timers.
//!
//! A host has at most one timer of each [`TimerKind`]. Arming a kind that is
//! already armed disarms the old timer first. Each arm gets a fresh
//! generation number; the handler receives it and must claim the slot with
//! [`TimerSlots::take_fired`] under the host lock before acting, which is how
//! a timer that fired just as it was replaced or disarmed is recognised as
//! stale. Generations are unique across all slots, so a slot that is dropped
//! and recreated never hands a stale handler a matching number.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lessonline_core::booking::TimerKind;
use tokio::task::JoinHandle;

static LAST_GENERATION: AtomicU64 = AtomicU64::new(0);

struct ArmedTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
pub struct TimerSlots {
    armed: HashMap<TimerKind, ArmedTimer>,
}

impl TimerSlots {
    /// Arm `kind` to run `on_fire(generation)` after `after`.
    ///
    /// The handler is spawned as its own task once the deadline passes, so
    /// a later `disarm` (even from inside the handler) never aborts a
    /// handler that is already running.
    pub fn arm<F, Fut>(&mut self, kind: TimerKind, after: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.disarm(kind);
        let generation = LAST_GENERATION.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            tokio::spawn(on_fire(generation));
        });
        self.armed.insert(kind, ArmedTimer { generation, handle });
        generation
    }

    /// Disarm `kind`. Returns whether a timer was armed; disarming an empty
    /// slot is a no-op.
    pub fn disarm(&mut self, kind: TimerKind) -> bool {
        match self.armed.remove(&kind) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn disarm_all(&mut self) {
        for (_, timer) in self.armed.drain() {
            timer.handle.abort();
        }
    }

    /// Claim the slot for a fired timer. Returns `false` if the slot has
    /// since been disarmed or re-armed, in which case the firing is stale.
    pub fn take_fired(&mut self, kind: TimerKind, generation: u64) -> bool {
        match self.armed.get(&kind) {
            Some(timer) if timer.generation == generation => {
                self.armed.remove(&kind);
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }

    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }
}

impl Drop for TimerSlots {
    fn drop(&mut self) {
        self.disarm_all();
    }
}
