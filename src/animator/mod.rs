//! The animator: display-synchronized interpolation of window frames.
//!
//! Each scheduled window interpolates from its current rectangle to the
//! latest target along a sharp ease-out curve. The platform sink (the
//! accessibility write path) is synchronous and slow — tens of milliseconds
//! worst case — so writes run on their own serial worker and each window
//! carries at most one in-flight write: a tick that lands while a window's
//! previous write is still out is simply dropped for that window. Dropping
//! frames locally preserves perceived smoothness; serializing them would
//! stall every window behind the slowest one.
//!
//! Two owned threads cooperate:
//!
//! * the **logic worker** owns every table (jobs, last-applied frames, the
//!   busy set, the suppression deadline) and processes commands in order;
//! * the **write worker** performs the blocking accessibility writes and
//!   posts completions back to the logic worker.
//!
//! A display-refresh driver (see [`driver`]) posts ticks while jobs exist.

mod driver;

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Sender};
use std::time::{Duration, Instant};

use driver::TickDriver;

use crate::config::Config;
use crate::constants::{ANIMATOR_DEAD_ZONE, EASE_EXPONENT, FORCE_PLACE_REWRITE_DELAY};
use crate::ffi::accessibility::AxElement;
use crate::geometry::Rect;
use crate::util::spawn_named;

// ============================================================================
// Commands
// ============================================================================

/// Commands processed by the animator's logic worker.
pub enum Command {
    /// Animate the window toward `target`.
    Schedule {
        /// Stable window key.
        key: u32,
        /// Accessibility handle; windows without one cannot be moved.
        handle: Option<AxElement>,
        /// Destination rectangle.
        target: Rect,
    },
    /// Place the window at `frame` immediately, cancelling any job.
    ForceIntoPlace {
        /// Stable window key.
        key: u32,
        /// Accessibility handle.
        handle: AxElement,
        /// Destination rectangle.
        frame: Rect,
    },
    /// Replace animations with instantaneous writes for a while.
    Suppress {
        /// Length of the suppression window.
        duration: Duration,
    },
    /// A display frame elapsed.
    Tick,
    /// A write for `key` returned from the sink.
    WriteDone {
        /// Stable window key.
        key: u32,
    },
    /// Stop the workers.
    Shutdown,
}

/// Cloneable handle for talking to the animator.
#[derive(Clone)]
pub struct AnimatorHandle {
    commands: Sender<Command>,
}

impl AnimatorHandle {
    /// Schedules an animation of the window toward `target`.
    pub fn schedule(&self, key: u32, handle: Option<AxElement>, target: Rect) {
        let _ = self.commands.send(Command::Schedule { key, handle, target });
    }

    /// Replaces animations with instantaneous writes until `duration` from
    /// now has elapsed.
    pub fn suppress(&self, duration: Duration) {
        let _ = self.commands.send(Command::Suppress { duration });
    }

    /// Writes `frame` immediately, cancelling any animation state for the
    /// window.
    pub fn force_into_place(&self, key: u32, handle: AxElement, frame: Rect) {
        let _ = self.commands.send(Command::ForceIntoPlace { key, handle, frame });
    }

    /// Stops the animator's workers.
    pub fn shutdown(&self) { let _ = self.commands.send(Command::Shutdown); }

    /// A handle whose commands land in the returned receiver instead of a
    /// running animator. Lets engine tests observe dispatches.
    #[cfg(test)]
    pub(crate) fn test_pair() -> (Self, mpsc::Receiver<Command>) {
        let (tx, rx) = mpsc::channel();
        (Self { commands: tx }, rx)
    }
}

// ============================================================================
// Animator
// ============================================================================

/// Spawns the animator's workers and returns a handle to them.
#[must_use]
pub fn spawn(config: &Config) -> AnimatorHandle {
    let (logic_tx, logic_rx) = mpsc::channel::<Command>();
    let (write_tx, write_rx) = mpsc::channel::<WriteJob>();

    // Write worker: blocking accessibility writes, one at a time, with
    // completion callbacks onto the logic worker.
    let completions = logic_tx.clone();
    spawn_named("anim-write", move || {
        while let Ok(job) = write_rx.recv() {
            if let Some(delay) = job.delay_before {
                std::thread::sleep(delay);
            }
            if let Err(err) = job.handle.write_frame(&job.frame) {
                tracing::warn!(error = %err, "frame write failed");
            }
            if let Some(key) = job.notify
                && completions.send(Command::WriteDone { key }).is_err()
            {
                return;
            }
        }
    });

    let driver = TickDriver::spawn(logic_tx.clone());

    let animations_enabled = config.animations_enabled;
    let duration = config.animation_duration();
    spawn_named("anim-logic", move || {
        let mut state = AnimatorState {
            jobs: HashMap::new(),
            last_applied: HashMap::new(),
            busy: HashSet::new(),
            suppress_until: None,
            writer: Some(write_tx),
            driver: Some(driver),
            animations_enabled,
            duration,
        };

        while let Ok(command) = logic_rx.recv() {
            if matches!(command, Command::Shutdown) {
                return;
            }
            state.handle(command, Instant::now());
        }
    });

    AnimatorHandle { commands: logic_tx }
}

/// One in-flight interpolation.
struct AnimationJob {
    handle: AxElement,
    start: Rect,
    target: Rect,
    started_at: Instant,
    duration: Duration,
}

/// A unit of work for the write worker.
struct WriteJob {
    handle: AxElement,
    frame: Rect,
    /// Key to report back once the write returns, for busy tracking.
    notify: Option<u32>,
    /// Sleep before writing; used by the forced-placement double write.
    delay_before: Option<Duration>,
}

/// All animation state, owned by the logic worker.
struct AnimatorState {
    jobs: HashMap<u32, AnimationJob>,
    /// Last rectangle actually written per window.
    last_applied: HashMap<u32, Rect>,
    /// Windows with an in-flight write on the sink.
    busy: HashSet<u32>,
    suppress_until: Option<Instant>,
    /// Absent only in detached test states.
    writer: Option<Sender<WriteJob>>,
    driver: Option<TickDriver>,
    animations_enabled: bool,
    duration: Duration,
}

impl AnimatorState {
    fn handle(&mut self, command: Command, now: Instant) {
        match command {
            Command::Schedule { key, handle, target } => {
                self.schedule(key, handle, target, now);
            }
            Command::ForceIntoPlace { key, handle, frame } => {
                self.force_into_place(key, &handle, frame);
            }
            Command::Suppress { duration } => {
                self.suppress_until = Some(now + duration);
            }
            Command::Tick => self.tick(now),
            Command::WriteDone { key } => {
                self.busy.remove(&key);
            }
            Command::Shutdown => {}
        }
    }

    fn suppressed(&self, now: Instant) -> bool {
        self.suppress_until.is_some_and(|deadline| now < deadline)
    }

    fn schedule(&mut self, key: u32, handle: Option<AxElement>, target: Rect, now: Instant) {
        let target = target.rounded();

        if self.suppressed(now) {
            if let Some(handle) = handle {
                self.jobs.remove(&key);
                self.last_applied.insert(key, target);
                self.write(handle, target, None, None);
            }
            return;
        }

        // Same destination already in flight.
        if let Some(job) = self.jobs.get(&key)
            && job.target == target
        {
            return;
        }

        let Some(handle) = handle else {
            tracing::trace!(key, "schedule without handle ignored");
            return;
        };

        // An unreadable current frame means no animation: land directly.
        let current = handle.frame().unwrap_or(target);

        if !self.animations_enabled || current.chebyshev_distance(&target) < ANIMATOR_DEAD_ZONE {
            self.jobs.remove(&key);
            self.last_applied.insert(key, target);
            self.write(handle, target, None, None);
            return;
        }

        self.jobs.insert(key, AnimationJob {
            handle,
            start: current,
            target,
            started_at: now,
            duration: self.duration,
        });

        if let Some(driver) = &self.driver {
            driver.activate();
        }
    }

    fn tick(&mut self, now: Instant) {
        if self.jobs.is_empty() {
            if let Some(driver) = &self.driver {
                driver.pause();
            }
            return;
        }

        let mut completed: Vec<u32> = Vec::new();
        let mut writes: Vec<(AxElement, Rect, u32)> = Vec::new();

        for (&key, job) in &self.jobs {
            // A previous write has not returned: drop this frame locally.
            if self.busy.contains(&key) {
                continue;
            }

            let t = (now.duration_since(job.started_at).as_secs_f64()
                / job.duration.as_secs_f64())
            .clamp(0.0, 1.0);
            if t >= 1.0 {
                completed.push(key);
            }

            let eased = ease_out(t, EASE_EXPONENT);
            let frame = interpolate(&job.start, &job.target, eased).rounded();

            if self.last_applied.get(&key) == Some(&frame) {
                continue;
            }

            self.last_applied.insert(key, frame);
            self.busy.insert(key);
            writes.push((job.handle.clone(), frame, key));
        }

        for (handle, frame, key) in writes {
            self.write(handle, frame, Some(key), None);
        }

        // Completed jobs land exactly on target to defeat sub-point drift.
        for key in completed {
            if let Some(job) = self.jobs.remove(&key) {
                self.last_applied.insert(key, job.target);
                self.busy.insert(key);
                self.write(job.handle, job.target, Some(key), None);
            }
        }

        if self.jobs.is_empty()
            && let Some(driver) = &self.driver
        {
            driver.pause();
        }
    }

    fn force_into_place(&mut self, key: u32, handle: &AxElement, frame: Rect) {
        self.jobs.remove(&key);
        self.busy.remove(&key);
        self.last_applied.remove(&key);

        // The OS may reposition the window mid-transition; writing twice
        // with a short gap wins that race.
        self.write(handle.clone(), frame, None, None);
        self.write(handle.clone(), frame, None, Some(FORCE_PLACE_REWRITE_DELAY));
    }

    fn write(
        &self,
        handle: AxElement,
        frame: Rect,
        notify: Option<u32>,
        delay_before: Option<Duration>,
    ) {
        if let Some(writer) = &self.writer {
            let _ = writer.send(WriteJob { handle, frame, notify, delay_before });
        }
    }
}

// ============================================================================
// Interpolation Math
// ============================================================================

/// Linear interpolation.
#[inline]
fn lerp(start: f64, end: f64, t: f64) -> f64 { (end - start).mul_add(t, start) }

/// Ease-out curve `1 - (1 - t)^k`.
///
/// The high exponent front-loads most of the travel, which hides the sink's
/// write latency behind the visually quiet tail.
#[inline]
#[must_use]
pub fn ease_out(t: f64, k: i32) -> f64 {
    let t = t.clamp(0.0, 1.0);
    1.0 - (1.0 - t).powi(k)
}

/// Interpolates every component from `from` to `to` at eased progress `e`.
#[inline]
#[must_use]
pub fn interpolate(from: &Rect, to: &Rect, e: f64) -> Rect {
    Rect::new(
        lerp(from.x, to.x, e),
        lerp(from.y, to.y, e),
        lerp(from.width, to.width, e),
        lerp(from.height, to.height, e),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // A detached state: no writer, no driver, no platform. Exercises the
    // table bookkeeping that doesn't need a live window; behaviors that do
    // (busy-set backpressure against a real sink) need a display and are
    // covered by the math invariants below.
    fn detached_state() -> AnimatorState {
        AnimatorState {
            jobs: HashMap::new(),
            last_applied: HashMap::new(),
            busy: HashSet::new(),
            suppress_until: None,
            writer: None,
            driver: None,
            animations_enabled: true,
            duration: crate::constants::ANIMATION_DURATION,
        }
    }

    #[test]
    fn test_lerp() {
        assert!((lerp(0.0, 100.0, 0.0) - 0.0).abs() < f64::EPSILON);
        assert!((lerp(0.0, 100.0, 0.5) - 50.0).abs() < f64::EPSILON);
        assert!((lerp(0.0, 100.0, 1.0) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ease_out_endpoints() {
        assert!((ease_out(0.0, 5) - 0.0).abs() < f64::EPSILON);
        assert!((ease_out(1.0, 5) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ease_out_decelerates() {
        // Front-loaded: more than half the travel happens by t = 0.25.
        assert!(ease_out(0.25, 5) > 0.5);
        // Monotonically increasing.
        let samples: Vec<f64> = (0..=10).map(|i| ease_out(f64::from(i) / 10.0, 5)).collect();
        assert!(samples.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn test_ease_out_clamps_input() {
        assert!((ease_out(-0.5, 5) - 0.0).abs() < f64::EPSILON);
        assert!((ease_out(1.5, 5) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_interpolate_endpoints_exact() {
        let from = Rect::new(0.0, 0.0, 100.0, 100.0);
        let to = Rect::new(100.0, 200.0, 300.0, 400.0);

        assert_eq!(interpolate(&from, &to, 0.0), from);
        // At e = 1 the interpolated frame equals the target exactly, so the
        // final write lands on target with no drift.
        assert_eq!(interpolate(&from, &to, 1.0), to);
    }

    #[test]
    fn test_interpolate_midpoint() {
        let from = Rect::new(0.0, 0.0, 100.0, 100.0);
        let to = Rect::new(100.0, 200.0, 200.0, 300.0);

        let mid = interpolate(&from, &to, 0.5);
        assert!((mid.x - 50.0).abs() < f64::EPSILON);
        assert!((mid.y - 100.0).abs() < f64::EPSILON);
        assert!((mid.width - 150.0).abs() < f64::EPSILON);
        assert!((mid.height - 200.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_below_threshold_target_is_instant() {
        // Scenario: current (100, 100, 400, 400), target within 2pt on
        // every component. The animator writes instantly, no job.
        let current = Rect::new(100.0, 100.0, 400.0, 400.0);
        let target = Rect::new(100.3, 100.7, 400.1, 400.2).rounded();
        assert!(current.chebyshev_distance(&target) < ANIMATOR_DEAD_ZONE);

        let far = Rect::new(112.0, 100.0, 400.0, 400.0);
        assert!(current.chebyshev_distance(&far) >= ANIMATOR_DEAD_ZONE);
    }

    #[test]
    fn test_suppression_deadline() {
        let mut state = detached_state();
        let now = Instant::now();

        assert!(!state.suppressed(now));

        state.handle(
            Command::Suppress { duration: Duration::from_millis(800) },
            now,
        );
        assert!(state.suppressed(now + Duration::from_millis(500)));
        assert!(!state.suppressed(now + Duration::from_millis(900)));
    }

    #[test]
    fn test_schedule_without_handle_creates_no_job() {
        let mut state = detached_state();
        let now = Instant::now();

        state.handle(
            Command::Schedule {
                key: 1,
                handle: None,
                target: Rect::new(0.0, 0.0, 500.0, 500.0),
            },
            now,
        );
        assert!(state.jobs.is_empty());
        assert!(state.last_applied.is_empty());
    }

    #[test]
    fn test_write_done_clears_busy() {
        let mut state = detached_state();
        state.busy.insert(7);

        state.handle(Command::WriteDone { key: 7 }, Instant::now());
        assert!(state.busy.is_empty());
    }

    #[test]
    fn test_tick_with_no_jobs_is_quiet() {
        let mut state = detached_state();
        state.handle(Command::Tick, Instant::now());
        assert!(state.last_applied.is_empty());
    }
}
