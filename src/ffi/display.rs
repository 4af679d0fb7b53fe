//! Display geometry and refresh synchronization.
//!
//! Provides active display frames for the layout engine and a
//! `CVDisplayLink`-backed vsync signal for the animator, with a
//! fixed-rate fallback when the link cannot be created.

use std::ffi::c_void;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use core_graphics::geometry::CGRect;
use parking_lot::{Condvar, Mutex};

use crate::geometry::Rect;

// ============================================================================
// FFI Declarations
// ============================================================================

#[link(name = "CoreGraphics", kind = "framework")]
unsafe extern "C" {
    fn CGMainDisplayID() -> u32;
    fn CGGetActiveDisplayList(
        max_displays: u32,
        active_displays: *mut u32,
        display_count: *mut u32,
    ) -> i32;
    fn CGDisplayBounds(display: u32) -> CGRect;
    fn CGDisplayCopyDisplayMode(display: u32) -> *mut c_void;
    fn CGDisplayModeGetRefreshRate(mode: *mut c_void) -> f64;
    fn CGDisplayModeRelease(mode: *mut c_void);
}

// CVDisplayLink FFI
type CVDisplayLinkRef = *mut c_void;
type CVReturn = i32;
type CVOptionFlags = u64;

/// `CVTimeStamp` structure for display link callbacks.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct CVTimeStamp {
    version: u32,
    video_time_scale: i32,
    video_time: i64,
    host_time: u64,
    rate_scalar: f64,
    video_refresh_period: i64,
    smpte_time: [u8; 24],
    flags: u64,
    reserved: u64,
}

type CVDisplayLinkOutputCallback = unsafe extern "C" fn(
    display_link: CVDisplayLinkRef,
    in_now: *const CVTimeStamp,
    in_output_time: *const CVTimeStamp,
    flags_in: CVOptionFlags,
    flags_out: *mut CVOptionFlags,
    context: *mut c_void,
) -> CVReturn;

#[link(name = "CoreVideo", kind = "framework")]
unsafe extern "C" {
    fn CVDisplayLinkCreateWithCGDisplay(
        display_id: u32,
        display_link_out: *mut CVDisplayLinkRef,
    ) -> CVReturn;
    fn CVDisplayLinkSetOutputCallback(
        display_link: CVDisplayLinkRef,
        callback: CVDisplayLinkOutputCallback,
        user_info: *mut c_void,
    ) -> CVReturn;
    fn CVDisplayLinkStart(display_link: CVDisplayLinkRef) -> CVReturn;
    fn CVDisplayLinkStop(display_link: CVDisplayLinkRef) -> CVReturn;
    fn CVDisplayLinkRelease(display_link: CVDisplayLinkRef);
}

// ============================================================================
// Display Geometry
// ============================================================================

const MAX_DISPLAYS: u32 = 16;

/// Returns the frame of the primary display.
#[must_use]
pub fn primary_frame() -> Rect {
    let bounds = unsafe { CGDisplayBounds(CGMainDisplayID()) };
    cg_rect_to_rect(bounds)
}

/// Returns the frames of all active displays, primary first.
#[must_use]
pub fn active_frames() -> Vec<Rect> {
    let mut displays = [0u32; MAX_DISPLAYS as usize];
    let mut count: u32 = 0;

    let result =
        unsafe { CGGetActiveDisplayList(MAX_DISPLAYS, displays.as_mut_ptr(), &raw mut count) };
    if result != 0 || count == 0 {
        return vec![primary_frame()];
    }

    let main_id = unsafe { CGMainDisplayID() };
    let mut frames = Vec::with_capacity(count as usize);

    // Primary display leads so index-stable consumers see it first.
    for &id in displays.iter().take(count as usize) {
        let frame = cg_rect_to_rect(unsafe { CGDisplayBounds(id) });
        if id == main_id {
            frames.insert(0, frame);
        } else {
            frames.push(frame);
        }
    }

    frames
}

fn cg_rect_to_rect(bounds: CGRect) -> Rect {
    Rect::new(
        bounds.origin.x,
        bounds.origin.y,
        bounds.size.width,
        bounds.size.height,
    )
}

/// Returns the main display's refresh rate in Hz.
#[must_use]
pub fn refresh_rate() -> u32 {
    let rate = unsafe {
        let mode = CGDisplayCopyDisplayMode(CGMainDisplayID());
        if mode.is_null() {
            return crate::constants::FALLBACK_TICK_HZ;
        }
        let rate = CGDisplayModeGetRefreshRate(mode);
        CGDisplayModeRelease(mode);
        rate
    };

    if rate <= 0.0 {
        crate::constants::FALLBACK_TICK_HZ
    } else {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rounded = rate.round() as u32;
        rounded.clamp(30, 240)
    }
}

// ============================================================================
// Vsync Signal
// ============================================================================

/// Shared state between the display link callback and waiting threads.
struct VsyncState {
    frame_count: AtomicU64,
    mutex: Mutex<()>,
    condvar: Condvar,
}

impl VsyncState {
    const fn new() -> Self {
        Self {
            frame_count: AtomicU64::new(0),
            mutex: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    fn signal(&self) {
        self.frame_count.fetch_add(1, Ordering::Release);
        self.condvar.notify_all();
    }

    fn wait(&self, timeout: Duration) -> bool {
        let current = self.frame_count.load(Ordering::Acquire);
        let mut guard = self.mutex.lock();
        while self.frame_count.load(Ordering::Acquire) == current {
            if self.condvar.wait_for(&mut guard, timeout).timed_out() {
                return false;
            }
        }
        true
    }
}

unsafe extern "C" fn display_link_callback(
    _display_link: CVDisplayLinkRef,
    _in_now: *const CVTimeStamp,
    _in_output_time: *const CVTimeStamp,
    _flags_in: CVOptionFlags,
    _flags_out: *mut CVOptionFlags,
    context: *mut c_void,
) -> CVReturn {
    let state = unsafe { &*(context.cast::<VsyncState>()) };
    state.signal();
    0 // kCVReturnSuccess
}

/// A vsync source for the animator's tick driver.
///
/// Wraps a `CVDisplayLink` on the main display; when the link cannot be
/// created, [`VsyncSource::wait_next_frame`] degrades to a fixed-interval
/// sleep at the fallback rate.
pub struct VsyncSource {
    link: Option<CVDisplayLinkRef>,
    state: Arc<VsyncState>,
    frame_interval: Duration,
}

// SAFETY: CVDisplayLink is thread-safe per Core Video's documentation; the
// shared state is atomics plus a condvar.
unsafe impl Send for VsyncSource {}

impl VsyncSource {
    /// Creates a vsync source, falling back to timer pacing when the
    /// display link is unavailable.
    #[must_use]
    pub fn new() -> Self {
        let state = Arc::new(VsyncState::new());
        let hz = refresh_rate();
        let frame_interval = Duration::from_secs(1) / hz;

        let link = Self::create_link(&state);
        if link.is_some() {
            tracing::debug!(hz, "display link driving animation ticks");
        } else {
            tracing::warn!(hz, "display link unavailable, using timer ticks");
        }

        Self { link, state, frame_interval }
    }

    fn create_link(state: &Arc<VsyncState>) -> Option<CVDisplayLinkRef> {
        let mut link: CVDisplayLinkRef = std::ptr::null_mut();

        unsafe {
            if CVDisplayLinkCreateWithCGDisplay(CGMainDisplayID(), &raw mut link) != 0 {
                return None;
            }

            let state_ptr = Arc::as_ptr(state).cast_mut().cast::<c_void>();
            if CVDisplayLinkSetOutputCallback(link, display_link_callback, state_ptr) != 0 {
                CVDisplayLinkRelease(link);
                return None;
            }

            if CVDisplayLinkStart(link) != 0 {
                CVDisplayLinkRelease(link);
                return None;
            }
        }

        Some(link)
    }

    /// Blocks until the next display refresh.
    ///
    /// With a display link, waits for the callback signal (bounded at two
    /// frame intervals so a wedged link cannot stall the animator); without
    /// one, sleeps one frame interval with a spin tail so timer ticks do
    /// not drift behind the refresh rate.
    pub fn wait_next_frame(&self) {
        if self.link.is_some() && self.state.wait(self.frame_interval * 2) {
            return;
        }
        precision_sleep(self.frame_interval);
    }
}

impl Default for VsyncSource {
    fn default() -> Self { Self::new() }
}

impl Drop for VsyncSource {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            unsafe {
                CVDisplayLinkStop(link);
                CVDisplayLinkRelease(link);
            }
        }
    }
}

/// Sleeps precisely, spinning for the final stretch.
#[inline]
pub fn precision_sleep(duration: Duration) {
    if duration.is_zero() {
        return;
    }

    let target = Instant::now() + duration;
    let spin_threshold = Duration::from_micros(1000);

    if let Some(sleep_duration) = duration.checked_sub(spin_threshold) {
        std::thread::sleep(sleep_duration);
    }

    while Instant::now() < target {
        std::hint::spin_loop();
    }
}
