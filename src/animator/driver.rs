//! The display-refresh tick driver.
//!
//! A dedicated thread waits on the vsync source and posts a tick onto the
//! animator's logic worker for every frame. The driver parks while no
//! animation jobs are active so an idle daemon costs nothing per frame.

use std::sync::Arc;
use std::sync::mpsc::Sender;

use parking_lot::{Condvar, Mutex};

use super::Command;
use crate::ffi::display::VsyncSource;
use crate::util::spawn_named;

#[derive(Default)]
struct DriverState {
    active: bool,
    shutdown: bool,
}

struct Shared {
    state: Mutex<DriverState>,
    condvar: Condvar,
}

/// Handle to the tick thread.
pub(crate) struct TickDriver {
    shared: Arc<Shared>,
}

impl TickDriver {
    /// Spawns the tick thread, posting [`Command::Tick`] onto `ticks`
    /// whenever the driver is active and a frame elapses.
    pub(crate) fn spawn(ticks: Sender<Command>) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(DriverState::default()),
            condvar: Condvar::new(),
        });

        let thread_shared = Arc::clone(&shared);
        spawn_named("anim-tick", move || {
            let vsync = VsyncSource::new();

            loop {
                {
                    let mut state = thread_shared.state.lock();
                    while !state.active && !state.shutdown {
                        thread_shared.condvar.wait(&mut state);
                    }
                    if state.shutdown {
                        return;
                    }
                }

                vsync.wait_next_frame();

                if ticks.send(Command::Tick).is_err() {
                    return;
                }
            }
        });

        Self { shared }
    }

    /// Starts ticking. Idempotent.
    pub(crate) fn activate(&self) {
        let mut state = self.shared.state.lock();
        if !state.active {
            state.active = true;
            self.shared.condvar.notify_all();
        }
    }

    /// Stops ticking until the next [`TickDriver::activate`]. Idempotent.
    pub(crate) fn pause(&self) {
        let mut state = self.shared.state.lock();
        state.active = false;
    }

    /// Shuts the tick thread down.
    pub(crate) fn stop(&self) {
        let mut state = self.shared.state.lock();
        state.shutdown = true;
        self.shared.condvar.notify_all();
    }
}

impl Drop for TickDriver {
    fn drop(&mut self) { self.stop(); }
}
