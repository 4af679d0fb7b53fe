//! Move/resize observers for discovered windows.
//!
//! Each application with at least one on-screen window gets an `AXObserver`
//! subscribed to window moved/resized notifications. Observer sources must
//! live on the thread whose run loop delivers them, so the hub owns a
//! dedicated thread that installs observers and pumps its run loop; every
//! notification fires the consumer's ping (which the daemon debounces into
//! a layout pass).

use std::collections::HashMap;
use std::sync::mpsc::{self, Sender, TryRecvError};

use crate::ffi::accessibility::{AppObserver, pump_run_loop};
use crate::util::spawn_named;

/// How long each run-loop pump blocks before the hub drains commands.
const PUMP_INTERVAL_SECS: f64 = 0.1;

/// Owns the observer thread and the set of watched applications.
pub struct ObserverHub {
    commands: Sender<Vec<i32>>,
}

impl ObserverHub {
    /// Spawns the observer thread. `ping` is invoked on every window
    /// moved/resized notification from any watched application.
    pub fn spawn(ping: impl Fn() + Clone + Send + 'static) -> Self {
        let (tx, rx) = mpsc::channel::<Vec<i32>>();

        spawn_named("observers", move || {
            let mut observers: HashMap<i32, AppObserver> = HashMap::new();

            loop {
                pump_run_loop(PUMP_INTERVAL_SECS);

                // Only the latest watch list matters.
                let mut latest = None;
                loop {
                    match rx.try_recv() {
                        Ok(pids) => latest = Some(pids),
                        Err(TryRecvError::Empty) => break,
                        Err(TryRecvError::Disconnected) => return,
                    }
                }

                let Some(pids) = latest else {
                    continue;
                };

                observers.retain(|pid, _| pids.contains(pid));

                for pid in pids {
                    if observers.contains_key(&pid) {
                        continue;
                    }
                    let ping = ping.clone();
                    match AppObserver::install(pid, move || ping()) {
                        Ok(observer) => {
                            tracing::debug!(pid, "watching app for move/resize");
                            observers.insert(pid, observer);
                        }
                        Err(err) => {
                            tracing::debug!(pid, error = %err, "observer install failed");
                        }
                    }
                }
            }
        });

        Self { commands: tx }
    }

    /// Replaces the set of watched applications.
    ///
    /// Applications no longer listed are unwatched; new ones get observers
    /// on the next pump.
    pub fn watch(&self, pids: Vec<i32>) { let _ = self.commands.send(pids); }
}
