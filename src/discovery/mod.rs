//! Window discovery: periodic enumeration of candidate tileable windows.
//!
//! Two independent oracles feed each snapshot: the per-application
//! accessibility trees (immediate, optimistic) and the compositor's
//! on-screen window list (accurate, but lagging during space transitions).
//! The `force_visible` flag selects between them: burst scans issued right
//! after a space switch trust geometry intersection, everything else
//! requires compositor confirmation.
//!
//! Discovery runs on its own worker thread and posts every snapshot through
//! a single consumer callback; none of its internal state is shared.

mod observer;

use std::collections::HashSet;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

use crate::constants::{BROWSER_WHITELIST, BURST_COUNT, BURST_INTERVAL, MIN_TILE_SIZE};
use crate::ffi::accessibility::{self, AxElement};
use crate::ffi::{apps, display, window_list};
use crate::geometry::Rect;
use crate::util::spawn_named;

pub use observer::ObserverHub;

// ============================================================================
// Window Records
// ============================================================================

/// A snapshot-time description of one candidate tileable window.
///
/// Two records refer to the same window iff their `window_id` is equal.
#[derive(Debug, Clone)]
pub struct WindowRecord {
    /// Stable window identifier. Compositor-assigned when available,
    /// otherwise a surrogate with the high bit set.
    pub window_id: u32,
    /// Process ID of the owning application.
    pub pid: i32,
    /// Owner application display name.
    pub app_name: String,
    /// Owner bundle identifier, when published.
    pub bundle_id: Option<String>,
    /// Window title.
    pub title: String,
    /// Last observed frame.
    pub frame: Rect,
    /// Whether the window is visible per the oracle selection in effect.
    pub on_screen: bool,
    /// Handle for issuing accessibility writes. Absent when the window is
    /// known only through the compositor's list.
    pub handle: Option<AxElement>,
}

/// One discovery snapshot.
pub type Snapshot = Vec<WindowRecord>;

/// Marks surrogate window IDs derived from handle identity.
const SURROGATE_ID_BIT: u32 = 0x8000_0000;

/// Derives a stable surrogate window ID from an element's identity hash.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn surrogate_id(identity_hash: u64) -> u32 {
    SURROGATE_ID_BIT | (identity_hash as u32 & !SURROGATE_ID_BIT)
}

// ============================================================================
// Tileability Filters
// ============================================================================

/// Subroles that mark helper surfaces rather than tileable windows.
const DISALLOWED_SUBROLES: &[&str] = &["AXSystemDialog", "AXFloatingWindow", "AXDialog"];

/// Applies the tileability filters to one window's probed attributes.
///
/// Every argument models a fallible accessibility read; a failed read
/// (`None`) rejects the window.
#[must_use]
pub(crate) fn is_tileable(
    role: Option<&str>,
    subrole: Option<&str>,
    minimized: Option<bool>,
    title: Option<&str>,
    size_settable: bool,
    frame: Option<&Rect>,
) -> bool {
    if role != Some("AXWindow") {
        return false;
    }
    // A missing subrole is fine; only the explicit helper kinds are rejected.
    if let Some(subrole) = subrole
        && DISALLOWED_SUBROLES.contains(&subrole)
    {
        return false;
    }
    if minimized != Some(false) {
        return false;
    }
    // Empty-titled windows are invisible helpers.
    match title {
        Some(title) if !title.is_empty() => {}
        _ => return false,
    }
    // Non-resizable entries are splash screens.
    if !size_settable {
        return false;
    }
    match frame {
        Some(frame) => frame.width >= MIN_TILE_SIZE && frame.height >= MIN_TILE_SIZE,
        None => false,
    }
}

/// Resolves a window's visibility from the two oracles.
#[must_use]
#[allow(clippy::fn_params_excessive_bools)]
pub(crate) fn resolve_on_screen(
    frame: &Rect,
    primary: &Rect,
    force_visible: bool,
    whitelisted: bool,
    window_id: Option<u32>,
    compositor: &HashSet<u32>,
    intersects_any_screen: bool,
) -> bool {
    let mut on_screen = primary.intersects(frame);

    if !force_visible
        && !whitelisted
        && let Some(id) = window_id
        && !compositor.contains(&id)
    {
        on_screen = false;
    }

    if force_visible && intersects_any_screen {
        on_screen = true;
    }

    on_screen
}

// ============================================================================
// Scan Worker
// ============================================================================

enum ScanCommand {
    StartPeriodic,
    ForceImmediate,
    StartBurst,
    Shutdown,
}

/// Handle to the discovery worker.
pub struct Discovery {
    commands: Sender<ScanCommand>,
}

impl Discovery {
    /// Spawns the discovery worker. Every snapshot is delivered through
    /// `on_snapshot`, in scan order.
    ///
    /// `layout_hint` is pinged by the move/resize observers installed on
    /// discovered windows.
    pub fn spawn(
        period: Duration,
        on_snapshot: impl Fn(Snapshot) + Send + 'static,
        layout_hint: impl Fn() + Clone + Send + 'static,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let observers = ObserverHub::spawn(layout_hint);

        spawn_named("discovery", move || {
            let mut worker = ScanWorker {
                on_snapshot: Box::new(on_snapshot),
                observers,
                period,
                next_periodic: None,
                force_pending: false,
                burst: Vec::new(),
            };

            loop {
                let command = match worker.next_deadline() {
                    Some(deadline) => {
                        let timeout = deadline.saturating_duration_since(Instant::now());
                        match rx.recv_timeout(timeout) {
                            Ok(command) => Some(command),
                            Err(RecvTimeoutError::Timeout) => None,
                            Err(RecvTimeoutError::Disconnected) => return,
                        }
                    }
                    None => match rx.recv() {
                        Ok(command) => Some(command),
                        Err(_) => return,
                    },
                };

                match command {
                    Some(ScanCommand::StartPeriodic) => {
                        worker.next_periodic = Some(Instant::now());
                    }
                    Some(ScanCommand::ForceImmediate) => {
                        worker.force_pending = true;
                    }
                    Some(ScanCommand::StartBurst) => {
                        let now = Instant::now();
                        worker.burst =
                            (0..BURST_COUNT).rev().map(|i| now + BURST_INTERVAL * i).collect();
                    }
                    Some(ScanCommand::Shutdown) => return,
                    None => {}
                }

                worker.run_due_scans(Instant::now());
            }
        });

        Self { commands: tx }
    }

    /// Begins scanning every discovery period.
    pub fn start_periodic_scan(&self) { let _ = self.commands.send(ScanCommand::StartPeriodic); }

    /// Schedules a single snapshot as soon as possible.
    pub fn force_immediate_scan(&self) { let _ = self.commands.send(ScanCommand::ForceImmediate); }

    /// Schedules a burst of forced-visibility snapshots to defeat stale
    /// compositor reports after a space switch or a window throw.
    pub fn start_burst_scan(&self) { let _ = self.commands.send(ScanCommand::StartBurst); }

    /// Stops the worker.
    pub fn shutdown(&self) { let _ = self.commands.send(ScanCommand::Shutdown); }

    /// Reads the focused window of the frontmost application.
    ///
    /// Does not touch the worker's state; safe to call from any thread.
    #[must_use]
    pub fn focused_window(&self) -> Option<WindowRecord> {
        let app = apps::frontmost_app()?;
        let ax = AxElement::application(app.pid)?;
        let window = ax.focused_window()?;

        let frame = window.frame()?;
        let window_id =
            window.window_id().unwrap_or_else(|| surrogate_id(window.identity_hash()));

        Some(WindowRecord {
            window_id,
            pid: app.pid,
            app_name: app.name,
            bundle_id: app.bundle_id,
            title: window.title().unwrap_or_default(),
            frame,
            on_screen: true,
            handle: Some(window),
        })
    }
}

impl Drop for Discovery {
    fn drop(&mut self) { self.shutdown(); }
}

struct ScanWorker {
    on_snapshot: Box<dyn Fn(Snapshot) + Send>,
    observers: ObserverHub,
    period: Duration,
    next_periodic: Option<Instant>,
    force_pending: bool,
    /// Scheduled burst scan times, soonest last.
    burst: Vec<Instant>,
}

impl ScanWorker {
    fn next_deadline(&self) -> Option<Instant> {
        if self.force_pending {
            return Some(Instant::now());
        }
        match (self.next_periodic, self.burst.last()) {
            (Some(a), Some(b)) => Some(a.min(*b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(*b),
            (None, None) => None,
        }
    }

    fn run_due_scans(&mut self, now: Instant) {
        let burst_due = self.burst.last().is_some_and(|&at| at <= now);
        if burst_due {
            self.burst.pop();
            self.emit(true);
        }

        let periodic_due = self.next_periodic.is_some_and(|at| at <= now);
        if self.force_pending || periodic_due {
            self.force_pending = false;
            if periodic_due {
                self.next_periodic = Some(now + self.period);
            }
            // A burst snapshot just went out; a second scan in the same wake
            // would only duplicate it.
            if !burst_due {
                self.emit(false);
            }
        }
    }

    fn emit(&self, force_visible: bool) {
        let snapshot = scan(force_visible);

        let watched: Vec<i32> = snapshot
            .iter()
            .filter(|record| record.on_screen)
            .map(|record| record.pid)
            .collect();
        self.observers.watch(watched);

        (self.on_snapshot)(snapshot);
    }
}

// ============================================================================
// Scan Algorithm
// ============================================================================

/// Produces one snapshot of candidate tileable windows.
///
/// Returns the empty list when accessibility trust is missing; individual
/// window read failures reject that window only.
#[must_use]
pub fn scan(force_visible: bool) -> Snapshot {
    if !accessibility::is_trusted() {
        tracing::debug!("accessibility not trusted, emitting empty snapshot");
        return Vec::new();
    }

    let primary = display::primary_frame();
    let screens = display::active_frames();
    let compositor = if force_visible {
        HashSet::new()
    } else {
        window_list::on_screen_window_ids()
    };

    let mut records: Snapshot = Vec::new();
    let mut seen_ids: HashSet<u32> = HashSet::new();

    for app in apps::regular_apps() {
        let Some(ax_app) = AxElement::application(app.pid) else {
            continue;
        };

        let whitelisted = BROWSER_WHITELIST.contains(&app.name.as_str());

        for window in ax_app.windows() {
            let role = window.role();
            let subrole = window.subrole();
            let minimized = window.is_minimized();
            let title = window.title();
            let size_settable = window.is_size_settable();
            let frame = window.frame();

            if !is_tileable(
                role.as_deref(),
                subrole.as_deref(),
                minimized,
                title.as_deref(),
                size_settable,
                frame.as_ref(),
            ) {
                continue;
            }

            // is_tileable verified presence of both
            let (frame, title) = (frame.unwrap_or_default(), title.unwrap_or_default());

            let compositor_id = window.window_id();
            let on_screen = resolve_on_screen(
                &frame,
                &primary,
                force_visible,
                whitelisted,
                compositor_id,
                &compositor,
                screens.iter().any(|screen| screen.intersects(&frame)),
            );

            let window_id =
                compositor_id.unwrap_or_else(|| surrogate_id(window.identity_hash()));
            if !seen_ids.insert(window_id) {
                // Native tabs surface several AX windows behind one
                // compositor window; the first one wins.
                continue;
            }

            records.push(WindowRecord {
                window_id,
                pid: app.pid,
                app_name: app.name.clone(),
                bundle_id: app.bundle_id.clone(),
                title,
                frame,
                on_screen,
                handle: Some(window),
            });
        }
    }

    tracing::trace!(
        count = records.len(),
        force_visible,
        "discovery snapshot complete"
    );
    records
}

// ============================================================================
// Tests
// ============================================================================
