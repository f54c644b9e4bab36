//! Heartbeat monitor
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  Heartbeat Task     │
//! │  (Tokio spawn)      │
//! │                     │
//! │  Every interval:    │
//! │  1. Wait for tick   │
//! │  2. on_tick() ──────┼──> manager: handle open?  ── yes ──> send ping
//! │  3. Repeat          │                            └─ no ───> missed += 1
//! └─────────────────────┘                                       (threshold → reconnect)
//! ```
//!
//! Any inbound frame resets the missed counter, so pongs are not special
//! for liveness; they only feed round-trip tracking.

use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::debug;

/// What the manager should do for a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Handle is open: send a ping
    Ping,
    /// Handle not open; still under the threshold
    Missed(u32),
    /// Threshold reached: force a reconnection
    Dead(u32),
}

/// Missed-beat bookkeeping plus the ticker task handle
#[derive(Debug)]
pub struct HeartbeatMonitor {
    interval: Duration,
    max_missed: u32,
    missed: u32,
    /// Bumped on every start/stop so a tick that already woke can tell it is stale
    epoch: u64,
    task: Option<JoinHandle<()>>,
}

impl HeartbeatMonitor {
    pub fn new(interval: Duration, max_missed: u32) -> Self {
        Self {
            interval,
            max_missed,
            missed: 0,
            epoch: 0,
            task: None,
        }
    }

    pub fn missed(&self) -> u32 {
        self.missed
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Inbound traffic proves liveness
    pub fn reset_missed(&mut self) {
        self.missed = 0;
    }

    /// Decide what a tick means given the handle's readiness
    pub fn on_tick(&mut self, handle_open: bool) -> HeartbeatAction {
        if handle_open {
            return HeartbeatAction::Ping;
        }

        self.missed += 1;
        if self.missed >= self.max_missed {
            HeartbeatAction::Dead(self.missed)
        } else {
            HeartbeatAction::Missed(self.missed)
        }
    }

    /// Start ticking; replaces any previous ticker
    ///
    /// `on_tick` receives the epoch the ticker was started with and returns
    /// `false` to end the task.
    pub fn start<F>(&mut self, runtime: &Handle, on_tick: F)
    where
        F: Fn(u64) -> bool + Send + 'static,
    {
        self.stop();
        let epoch = self.epoch;
        self.task = Some(spawn_heartbeat(runtime, self.interval, move || on_tick(epoch)));
        debug!("Heartbeat started with interval: {:?}", self.interval);
    }

    /// Stop ticking and clear the missed counter
    pub fn stop(&mut self) {
        self.epoch += 1;
        self.missed = 0;
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Heartbeat stopped");
        }
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Heartbeat task that fires `on_tick` at regular intervals
///
/// Skips the immediate first tick and, if ticks are missed because the
/// runtime was busy, skips them rather than bursting.
pub async fn heartbeat_task<F>(interval: Duration, on_tick: F)
where
    F: Fn() -> bool,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if !on_tick() {
            debug!("Heartbeat task exiting");
            break;
        }
    }
}

/// Spawn a heartbeat task
pub fn spawn_heartbeat<F>(runtime: &Handle, interval: Duration, on_tick: F) -> JoinHandle<()>
where
    F: Fn() -> bool + Send + 'static,
{
    runtime.spawn(heartbeat_task(interval, on_tick))
}
