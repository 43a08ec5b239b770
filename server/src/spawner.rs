//! Delayed respawn timers.
//!
//! Each consumed brainrot or powerup arms one timer. When it fires, the
//! scheduler posts a message back into the server loop so the replacement is
//! created by the task that owns the session. Timers are aborted together on
//! `cancel_all` and when the scheduler is dropped.
//!
//! A timer that fired just before `cancel_all` may already have its message
//! queued. The session rejects those by their round generation.

use crate::session::PendingSpawn;
use log::{debug, warn};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct SpawnScheduler<M> {
    tx: mpsc::UnboundedSender<M>,
    make_message: fn(PendingSpawn) -> M,
    pending: Vec<JoinHandle<()>>,
}

impl<M: Send + 'static> SpawnScheduler<M> {
    /// `make_message` wraps a due spawn into the loop's message type.
    pub fn new(tx: mpsc::UnboundedSender<M>, make_message: fn(PendingSpawn) -> M) -> Self {
        Self {
            tx,
            make_message,
            pending: Vec::new(),
        }
    }

    /// Arms a timer that posts `spawn` back to the loop after `delay`.
    ///
    /// Finished timers are forgotten here, so the pending list only grows
    /// with timers that are actually still sleeping.
    pub fn schedule(&mut self, spawn: PendingSpawn, delay: Duration) {
        self.pending.retain(|handle| !handle.is_finished());

        let tx = self.tx.clone();
        let message = (self.make_message)(spawn);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if tx.send(message).is_err() {
                warn!("Server loop closed before {:?} respawn fired", spawn.kind);
            }
        });
        self.pending.push(handle);
    }

    /// Aborts every timer that has not fired yet.
    pub fn cancel_all(&mut self) {
        let count = self.pending.len();
        for handle in self.pending.drain(..) {
            handle.abort();
        }
        if count > 0 {
            debug!("Cancelled {} pending respawns", count);
        }
    }
}

impl<M> Drop for SpawnScheduler<M> {
    fn drop(&mut self) {
        for handle in self.pending.drain(..) {
            handle.abort();
        }
    }
}
