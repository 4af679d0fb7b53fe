//! The daemon lifecycle object and its event loop.
//!
//! Owns the three core components — discovery, layout engine, animator —
//! and runs the single-threaded loop where all layout engine state is
//! mutated. External collaborators (hotkey dispatcher, space manager,
//! mouse monitor, status item) talk to the loop through the typed
//! [`Event`] channel and the interfaces defined here; their platform
//! implementations live outside the core.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crate::animator::{self, AnimatorHandle};
use crate::config::Config;
use crate::constants::{APPLY_LAYOUT_DEBOUNCE, MOUSE_UP_DELAY, NEW_WINDOW_SETTLE, SPACE_SUPPRESS};
use crate::discovery::{Discovery, Snapshot, WindowRecord};
use crate::layout::{LayoutEngine, MoveDirection};

// ============================================================================
// Actions
// ============================================================================

/// User intents produced by the hotkey dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Focus the window to the left.
    FocusLeft,
    /// Focus the window to the right.
    FocusRight,
    /// Focus the window above.
    FocusUp,
    /// Focus the window below.
    FocusDown,
    /// Promote the focused window to master.
    MoveLeft,
    /// Demote the focused window to the top of the stack.
    MoveRight,
    /// Swap the focused window with its predecessor.
    MoveUp,
    /// Swap the focused window with its successor.
    MoveDown,
    /// Switch to the given space.
    Workspace(u8),
    /// Throw the focused window to the given space.
    MoveToWorkspace(u8),
    /// Switch to the next space.
    NextWorkspace,
    /// Switch to the previous space.
    PreviousWorkspace,
    /// Rescan windows immediately.
    Reload,
    /// Stop the daemon.
    Quit,
}

/// Events consumed by the daemon loop.
pub enum Event {
    /// A discovery snapshot arrived.
    Snapshot(Snapshot),
    /// A hotkey action arrived.
    Action(Action),
    /// The space manager completed a space change.
    SpaceChanged,
    /// The mouse monitor saw a left-button release.
    MouseUp,
    /// A move/resize observer fired; coalesced into a debounced layout.
    LayoutHint,
    /// The status item asked for an immediate layout pass.
    ApplyLayout,
}

// ============================================================================
// Collaborator Interfaces
// ============================================================================

/// Interface to the space-switching and window-throwing subsystem.
///
/// The implementation synthesizes HID events and lives outside the core;
/// the core only reads `is_throwing` to bail out of layout passes and
/// routes workspace actions here.
pub trait SpaceController: Send {
    /// Whether a window throw is currently in flight.
    fn is_throwing(&self) -> bool;
    /// Switches to the given space.
    fn switch_to_space(&self, index: u8);
    /// Moves a window to the given space.
    fn move_window_to_space(&self, record: &WindowRecord, index: u8);
    /// Switches to the next space.
    fn next_space(&self) {}
    /// Switches to the previous space.
    fn previous_space(&self) {}
}

/// Placeholder controller used until a real space manager is attached.
pub struct NullSpaceController {
    throwing: Arc<AtomicBool>,
}

impl NullSpaceController {
    /// Creates a controller sharing the daemon's throw flag.
    #[must_use]
    pub const fn new(throwing: Arc<AtomicBool>) -> Self { Self { throwing } }
}

impl SpaceController for NullSpaceController {
    fn is_throwing(&self) -> bool { self.throwing.load(Ordering::Relaxed) }

    fn switch_to_space(&self, index: u8) {
        tracing::debug!(index, "no space controller attached, switch ignored");
    }

    fn move_window_to_space(&self, record: &WindowRecord, index: u8) {
        tracing::debug!(
            window_id = record.window_id,
            index,
            "no space controller attached, throw ignored"
        );
    }
}

// ============================================================================
// Debounce
// ============================================================================

/// A single replaceable deadline; a later arm supersedes an earlier one.
#[derive(Debug)]
pub(crate) struct Debounce {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub(crate) const fn new(window: Duration) -> Self { Self { window, deadline: None } }

    /// Schedules (or reschedules) the deadline at `now + window`.
    pub(crate) fn arm(&mut self, now: Instant) { self.deadline = Some(now + self.window); }

    /// Clears the deadline without firing.
    pub(crate) fn cancel(&mut self) { self.deadline = None; }

    pub(crate) const fn deadline(&self) -> Option<Instant> { self.deadline }

    /// Consumes and reports a due deadline.
    pub(crate) fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

// ============================================================================
// Daemon
// ============================================================================

/// The daemon: owns the core components and runs the event loop.
pub struct Daemon {
    engine: LayoutEngine,
    discovery: Discovery,
    animator: AnimatorHandle,
    space: Box<dyn SpaceController>,
    events_tx: Sender<Event>,
    events_rx: Receiver<Event>,
    /// Defer layout after a snapshot with a new window.
    settle: Debounce,
    /// Coalesce move/resize observer pings.
    external: Debounce,
    /// Defer layout after a mouse release.
    mouse: Debounce,
}

impl Daemon {
    /// Wires up discovery, the layout engine, and the animator.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        let throwing = Arc::new(AtomicBool::new(false));

        let animator = animator::spawn(config);

        let snapshot_tx = events_tx.clone();
        let hint_tx = events_tx.clone();
        let discovery = Discovery::spawn(
            config.scan_interval(),
            move |snapshot| {
                let _ = snapshot_tx.send(Event::Snapshot(snapshot));
            },
            move || {
                let _ = hint_tx.send(Event::LayoutHint);
            },
        );

        let mut engine = LayoutEngine::new(animator.clone(), Arc::clone(&throwing));
        engine.set_gap(config.gap);

        Self {
            engine,
            discovery,
            animator,
            space: Box::new(NullSpaceController::new(throwing)),
            events_tx,
            events_rx,
            settle: Debounce::new(NEW_WINDOW_SETTLE),
            external: Debounce::new(APPLY_LAYOUT_DEBOUNCE),
            mouse: Debounce::new(MOUSE_UP_DELAY),
        }
    }

    /// Attaches a real space controller.
    pub fn set_space_controller(&mut self, space: Box<dyn SpaceController>) { self.space = space; }

    /// A sender collaborators use to post events into the loop.
    #[must_use]
    pub fn sender(&self) -> Sender<Event> { self.events_tx.clone() }

    /// Starts periodic discovery and runs the event loop until quit.
    pub fn run(mut self) {
        self.discovery.start_periodic_scan();
        tracing::info!("daemon loop running");

        loop {
            let event = match self.next_deadline() {
                Some(deadline) => {
                    let timeout = deadline.saturating_duration_since(Instant::now());
                    match self.events_rx.recv_timeout(timeout) {
                        Ok(event) => Some(event),
                        Err(RecvTimeoutError::Timeout) => None,
                        Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                None => match self.events_rx.recv() {
                    Ok(event) => Some(event),
                    Err(_) => break,
                },
            };

            if let Some(event) = event
                && self.handle_event(event).is_break()
            {
                break;
            }

            let now = Instant::now();
            let due = self.settle.fire_if_due(now)
                | self.external.fire_if_due(now)
                | self.mouse.fire_if_due(now);
            if due {
                self.engine.apply_layout();
            }
        }

        self.animator.shutdown();
        tracing::info!("daemon loop stopped");
    }

    fn next_deadline(&self) -> Option<Instant> {
        [
            self.settle.deadline(),
            self.external.deadline(),
            self.mouse.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn handle_event(&mut self, event: Event) -> ControlFlow<()> {
        match event {
            Event::Snapshot(snapshot) => {
                let outcome = self.engine.update(snapshot);
                if outcome.saw_new_window {
                    // Give the new window time to publish an initial frame,
                    // so it doesn't teleport from the center of the screen.
                    self.settle.arm(Instant::now());
                } else {
                    self.engine.apply_layout();
                }
            }
            Event::LayoutHint => self.external.arm(Instant::now()),
            Event::ApplyLayout => self.engine.apply_layout(),
            Event::MouseUp => {
                if !self.space.is_throwing() {
                    self.mouse.arm(Instant::now());
                }
            }
            Event::SpaceChanged => {
                // The compositor's visibility reports lag the transition;
                // burst scans and a full cache flush repair the aftermath.
                // Pending deferred layouts are stale now; the burst snapshots
                // drive the next passes.
                self.external.cancel();
                self.mouse.cancel();
                self.discovery.start_burst_scan();
                self.engine.reset_cache();
                self.animator.suppress(SPACE_SUPPRESS);
            }
            Event::Action(action) => return self.route_action(action),
        }
        ControlFlow::Continue(())
    }

    fn route_action(&mut self, action: Action) -> ControlFlow<()> {
        match action {
            Action::MoveLeft => self.move_focused(MoveDirection::Left),
            Action::MoveRight => self.move_focused(MoveDirection::Right),
            Action::MoveUp => self.move_focused(MoveDirection::Up),
            Action::MoveDown => self.move_focused(MoveDirection::Down),
            Action::FocusLeft | Action::FocusRight | Action::FocusUp | Action::FocusDown => {
                tracing::debug!(?action, "focus handling is delegated to the platform");
            }
            Action::Workspace(index) => self.space.switch_to_space(index),
            Action::MoveToWorkspace(index) => {
                if let Some(record) = self.discovery.focused_window() {
                    self.space.move_window_to_space(&record, index);
                }
            }
            Action::NextWorkspace => self.space.next_space(),
            Action::PreviousWorkspace => self.space.previous_space(),
            Action::Reload => self.discovery.force_immediate_scan(),
            Action::Quit => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    fn move_focused(&mut self, direction: MoveDirection) {
        let focused = self.discovery.focused_window().map(|record| record.window_id);
        self.engine.move_focused(direction, focused);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debounce_fires_after_window() {
        let mut debounce = Debounce::new(Duration::from_millis(500));
        let start = Instant::now();

        assert!(!debounce.fire_if_due(start));

        debounce.arm(start);
        assert!(!debounce.fire_if_due(start + Duration::from_millis(100)));
        assert!(debounce.fire_if_due(start + Duration::from_millis(500)));

        // Consumed: does not fire twice.
        assert!(!debounce.fire_if_due(start + Duration::from_secs(10)));
    }

    #[test]
    fn test_debounce_rearm_supersedes() {
        let mut debounce = Debounce::new(Duration::from_millis(500));
        let start = Instant::now();

        debounce.arm(start);
        debounce.arm(start + Duration::from_millis(400));

        // The original deadline has passed, but the re-arm moved it.
        assert!(!debounce.fire_if_due(start + Duration::from_millis(600)));
        assert!(debounce.fire_if_due(start + Duration::from_millis(900)));
    }

    #[test]
    fn test_debounce_cancel() {
        let mut debounce = Debounce::new(Duration::from_millis(500));
        let start = Instant::now();

        debounce.arm(start);
        debounce.cancel();
        assert!(debounce.deadline().is_none());
        assert!(!debounce.fire_if_due(start + Duration::from_secs(1)));
    }

    #[test]
    fn test_null_space_controller_reads_throw_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let controller = NullSpaceController::new(Arc::clone(&flag));

        assert!(!controller.is_throwing());
        flag.store(true, Ordering::Relaxed);
        assert!(controller.is_throwing());
    }
}
