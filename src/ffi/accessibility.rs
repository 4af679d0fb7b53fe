//! Safe wrappers for the macOS Accessibility API (`AXUIElement`).
//!
//! The main type is [`AxElement`], which wraps an `AXUIElementRef` with
//! automatic memory management: creating one takes ownership of the
//! reference, cloning calls `CFRetain`, dropping calls `CFRelease`.
//!
//! # Thread Safety
//!
//! The Accessibility API is thread-safe for operations on different
//! elements. `AxElement` implements `Send` and `Sync` so window handles can
//! travel from the discovery worker to the animator's write worker. Writes
//! to any given window are serialized by the animator's write queue.

use std::cell::OnceCell;
use std::ffi::c_void;
use std::hash::{Hash, Hasher};
use std::ptr;

use core_foundation::base::TCFType;
use core_foundation::boolean::CFBoolean;
use core_foundation::string::CFString;

use crate::error::{TilingError, TilingResult};
use crate::geometry::Rect;

// ============================================================================
// FFI Declarations
// ============================================================================

pub(crate) type AXUIElementRef = *mut c_void;
type AXError = i32;

const K_AX_ERROR_SUCCESS: AXError = 0;
const K_AX_ERROR_API_DISABLED: AXError = -25211;
const K_AX_ERROR_INVALID_UI_ELEMENT: AXError = -25202;
const K_AX_ERROR_ATTRIBUTE_UNSUPPORTED: AXError = -25205;
const K_AX_ERROR_CANNOT_COMPLETE: AXError = -25204;
const K_AX_ERROR_NOT_IMPLEMENTED: AXError = -25208;

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXIsProcessTrusted() -> bool;
    fn AXUIElementCreateApplication(pid: i32) -> AXUIElementRef;
    fn AXUIElementCopyAttributeValue(
        element: AXUIElementRef,
        attribute: *const c_void,
        value: *mut *mut c_void,
    ) -> AXError;
    fn AXUIElementSetAttributeValue(
        element: AXUIElementRef,
        attribute: *const c_void,
        value: *const c_void,
    ) -> AXError;
    fn AXUIElementIsAttributeSettable(
        element: AXUIElementRef,
        attribute: *const c_void,
        settable: *mut u8,
    ) -> AXError;
    fn AXUIElementGetTypeID() -> u64;
    fn AXValueCreate(value_type: i32, value: *const c_void) -> *mut c_void;
    fn AXValueGetValue(value: *const c_void, value_type: i32, value_ptr: *mut c_void) -> bool;
    /// Private but stable since 10.10; the only exact AX-element-to-window-ID
    /// mapping the platform offers.
    fn _AXUIElementGetWindow(element: AXUIElementRef, window_id: *mut u32) -> AXError;
}

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    fn CFGetTypeID(cf: *const c_void) -> u64;
    fn CFArrayGetCount(array: *const c_void) -> i64;
    fn CFArrayGetValueAtIndex(array: *const c_void, idx: i64) -> *const c_void;
    fn CFRelease(cf: *const c_void);
    fn CFRetain(cf: *const c_void) -> *const c_void;
}

// AXValue type constants
const K_AX_VALUE_TYPE_CG_POINT: i32 = 1;
const K_AX_VALUE_TYPE_CG_SIZE: i32 = 2;

// ============================================================================
// Cached CFStrings
// ============================================================================

thread_local! {
    static CF_WINDOWS: OnceCell<CFString> = const { OnceCell::new() };
    static CF_TITLE: OnceCell<CFString> = const { OnceCell::new() };
    static CF_ROLE: OnceCell<CFString> = const { OnceCell::new() };
    static CF_SUBROLE: OnceCell<CFString> = const { OnceCell::new() };
    static CF_POSITION: OnceCell<CFString> = const { OnceCell::new() };
    static CF_SIZE: OnceCell<CFString> = const { OnceCell::new() };
    static CF_MINIMIZED: OnceCell<CFString> = const { OnceCell::new() };
    static CF_FOCUSED_WINDOW: OnceCell<CFString> = const { OnceCell::new() };
}

/// Gets or creates a cached `CFString`.
macro_rules! cached_cfstring {
    ($cell:expr, $value:expr) => {
        $cell.with(|cell| cell.get_or_init(|| CFString::new($value)).as_concrete_TypeRef().cast())
    };
}

#[inline]
fn cf_windows() -> *const c_void { cached_cfstring!(CF_WINDOWS, "AXWindows") }

#[inline]
fn cf_title() -> *const c_void { cached_cfstring!(CF_TITLE, "AXTitle") }

#[inline]
fn cf_role() -> *const c_void { cached_cfstring!(CF_ROLE, "AXRole") }

#[inline]
fn cf_subrole() -> *const c_void { cached_cfstring!(CF_SUBROLE, "AXSubrole") }

#[inline]
fn cf_position() -> *const c_void { cached_cfstring!(CF_POSITION, "AXPosition") }

#[inline]
fn cf_size() -> *const c_void { cached_cfstring!(CF_SIZE, "AXSize") }

#[inline]
fn cf_minimized() -> *const c_void { cached_cfstring!(CF_MINIMIZED, "AXMinimized") }

#[inline]
fn cf_focused_window() -> *const c_void { cached_cfstring!(CF_FOCUSED_WINDOW, "AXFocusedWindow") }

// ============================================================================
// Process Trust
// ============================================================================

/// Returns whether this process has been granted accessibility trust.
#[must_use]
pub fn is_trusted() -> bool { unsafe { AXIsProcessTrusted() } }

// ============================================================================
// AxElement
// ============================================================================

/// A safe wrapper around `AXUIElementRef`.
///
/// Represents either an application element or a window element.
pub struct AxElement {
    /// The underlying `AXUIElementRef`. Never null for a valid `AxElement`.
    raw: AXUIElementRef,
}

impl AxElement {
    /// Creates an `AxElement` for an application by its process ID.
    ///
    /// Returns `None` if the application cannot be accessed.
    #[must_use]
    pub fn application(pid: i32) -> Option<Self> {
        let raw = unsafe { AXUIElementCreateApplication(pid) };
        if raw.is_null() { None } else { Some(Self { raw }) }
    }

    /// Creates an `AxElement` from a raw pointer, taking ownership.
    ///
    /// # Safety
    ///
    /// The pointer must be a valid `AXUIElementRef` and the caller must
    /// transfer ownership (no separate `CFRelease`).
    #[must_use]
    pub const unsafe fn from_raw(raw: AXUIElementRef) -> Option<Self> {
        if raw.is_null() { None } else { Some(Self { raw }) }
    }

    /// Returns the raw pointer without transferring ownership.
    #[must_use]
    pub const fn as_raw(&self) -> AXUIElementRef { self.raw }

    /// Gets all window elements belonging to this application.
    #[must_use]
    pub fn windows(&self) -> Vec<Self> {
        let mut value: *mut c_void = ptr::null_mut();
        let result =
            unsafe { AXUIElementCopyAttributeValue(self.raw, cf_windows(), &raw mut value) };

        if result != K_AX_ERROR_SUCCESS || value.is_null() {
            return Vec::new();
        }

        let count = unsafe { CFArrayGetCount(value) };
        if count <= 0 {
            unsafe { CFRelease(value) };
            return Vec::new();
        }

        let ax_type_id = unsafe { AXUIElementGetTypeID() };

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let mut windows = Vec::with_capacity(count as usize);

        for i in 0..count {
            let window = unsafe { CFArrayGetValueAtIndex(value, i) };
            if !window.is_null() && unsafe { CFGetTypeID(window) } == ax_type_id {
                // CFArrayGetValueAtIndex does not transfer ownership
                unsafe { CFRetain(window) };
                windows.push(Self { raw: window.cast_mut() });
            }
        }

        unsafe { CFRelease(value) };
        windows
    }

    /// Gets the focused window of this application.
    #[must_use]
    pub fn focused_window(&self) -> Option<Self> {
        let mut value: *mut c_void = ptr::null_mut();
        let result =
            unsafe { AXUIElementCopyAttributeValue(self.raw, cf_focused_window(), &raw mut value) };

        if result != K_AX_ERROR_SUCCESS || value.is_null() {
            return None;
        }

        unsafe { Self::from_raw(value.cast()) }
    }

    /// Gets the window title.
    #[must_use]
    pub fn title(&self) -> Option<String> { unsafe { get_string_attr(self.raw, cf_title()) } }

    /// Gets the element's role (e.g., "`AXWindow`").
    #[must_use]
    pub fn role(&self) -> Option<String> { unsafe { get_string_attr(self.raw, cf_role()) } }

    /// Gets the element's subrole (e.g., "`AXStandardWindow`").
    #[must_use]
    pub fn subrole(&self) -> Option<String> { unsafe { get_string_attr(self.raw, cf_subrole()) } }

    /// Returns whether this window is minimized.
    #[must_use]
    pub fn is_minimized(&self) -> Option<bool> {
        unsafe { get_bool_attr(self.raw, cf_minimized()) }
    }

    /// Returns whether the size attribute can be written.
    ///
    /// Splash screens and progress panels report a fixed size.
    #[must_use]
    pub fn is_size_settable(&self) -> bool {
        let mut settable: u8 = 0;
        let result =
            unsafe { AXUIElementIsAttributeSettable(self.raw, cf_size(), &raw mut settable) };
        result == K_AX_ERROR_SUCCESS && settable != 0
    }

    /// Gets the compositor window ID backing this element.
    ///
    /// Returns `None` when the window server does not know the element
    /// (brand-new windows, sheets) or reports ID zero.
    #[must_use]
    pub fn window_id(&self) -> Option<u32> {
        let mut window_id: u32 = 0;
        let result = unsafe { _AXUIElementGetWindow(self.raw, &raw mut window_id) };
        if result == K_AX_ERROR_SUCCESS && window_id != 0 {
            Some(window_id)
        } else {
            None
        }
    }

    /// A stable key for this element derived from the underlying reference.
    ///
    /// Used to synthesize window IDs for windows the compositor has not
    /// assigned one yet.
    #[must_use]
    pub fn identity_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        (self.raw as usize).hash(&mut hasher);
        hasher.finish()
    }

    /// Gets the frame (position and size) of this element.
    #[must_use]
    pub fn frame(&self) -> Option<Rect> {
        let (x, y) = unsafe { get_position_attr(self.raw)? };
        let (width, height) = unsafe { get_size_attr(self.raw)? };
        Some(Rect::new(x, y, width, height))
    }

    /// Sets the position of this element.
    pub fn set_position(&self, x: f64, y: f64) -> TilingResult<()> {
        unsafe { set_position_attr(self.raw, x, y) }
    }

    /// Sets the size of this element.
    pub fn set_size(&self, width: f64, height: f64) -> TilingResult<()> {
        unsafe { set_size_attr(self.raw, width, height) }
    }

    /// Writes a full frame: size first, then position.
    ///
    /// Setting position first can park the window against a screen edge and
    /// make the OS clamp the subsequent resize.
    pub fn write_frame(&self, frame: &Rect) -> TilingResult<()> {
        self.set_size(frame.width, frame.height)?;
        self.set_position(frame.x, frame.y)?;
        Ok(())
    }
}

impl Drop for AxElement {
    fn drop(&mut self) {
        // SAFETY: self.raw is guaranteed to be valid and non-null
        unsafe { CFRelease(self.raw.cast()) };
    }
}

impl Clone for AxElement {
    fn clone(&self) -> Self {
        // SAFETY: self.raw is guaranteed to be valid and non-null
        unsafe { CFRetain(self.raw.cast()) };
        Self { raw: self.raw }
    }
}

// SAFETY: The Accessibility API is thread-safe for operations on different
// elements. Each AxElement represents a unique UI element reference.
unsafe impl Send for AxElement {}

// SAFETY: Concurrent reads are safe; writes to the same window are
// serialized by the animator's write queue.
unsafe impl Sync for AxElement {}

impl std::fmt::Debug for AxElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AxElement")
            .field("raw", &self.raw)
            .field("window_id", &self.window_id())
            .finish()
    }
}

// ============================================================================
// Observers
// ============================================================================

type AXObserverRef = *mut c_void;
type AXObserverCallback =
    unsafe extern "C" fn(AXObserverRef, AXUIElementRef, *const c_void, *mut c_void);

#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXObserverCreate(
        application: i32,
        callback: AXObserverCallback,
        observer: *mut AXObserverRef,
    ) -> AXError;
    fn AXObserverGetRunLoopSource(observer: AXObserverRef) -> *mut c_void;
    fn AXObserverAddNotification(
        observer: AXObserverRef,
        element: AXUIElementRef,
        notification: *const c_void,
        refcon: *mut c_void,
    ) -> AXError;
}

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    fn CFRunLoopGetCurrent() -> *mut c_void;
    fn CFRunLoopAddSource(rl: *mut c_void, source: *mut c_void, mode: *const c_void);
    fn CFRunLoopRunInMode(mode: *const c_void, seconds: f64, return_after_source: u8) -> i32;
}

thread_local! {
    static CF_RUN_LOOP_DEFAULT_MODE: OnceCell<CFString> = const { OnceCell::new() };
    static CF_WINDOW_MOVED: OnceCell<CFString> = const { OnceCell::new() };
    static CF_WINDOW_RESIZED: OnceCell<CFString> = const { OnceCell::new() };
}

#[inline]
fn cf_run_loop_default_mode() -> *const c_void {
    cached_cfstring!(CF_RUN_LOOP_DEFAULT_MODE, "kCFRunLoopDefaultMode")
}

#[inline]
fn cf_window_moved() -> *const c_void { cached_cfstring!(CF_WINDOW_MOVED, "AXWindowMoved") }

#[inline]
fn cf_window_resized() -> *const c_void { cached_cfstring!(CF_WINDOW_RESIZED, "AXWindowResized") }

/// An `AXObserver` for one application, delivering window moved/resized
/// notifications to a callback.
///
/// The observer's run-loop source is attached to the run loop of the thread
/// that calls [`AppObserver::install`]; notifications fire while that thread
/// pumps its run loop (see [`pump_run_loop`]).
pub struct AppObserver {
    observer: AXObserverRef,
    /// Keeps the application element alive for the observer's lifetime.
    _app: AxElement,
    /// Callback context; boxed so the pointer handed to the C side is stable.
    _context: Box<ObserverContext>,
}

struct ObserverContext {
    callback: Box<dyn Fn() + Send>,
}

unsafe extern "C" fn observer_trampoline(
    _observer: AXObserverRef,
    _element: AXUIElementRef,
    _notification: *const c_void,
    refcon: *mut c_void,
) {
    if refcon.is_null() {
        return;
    }
    let context = unsafe { &*refcon.cast::<ObserverContext>() };
    (context.callback)();
}

// SAFETY: the observer ref and app element are only used from the install
// thread after construction; the context callback is Send.
unsafe impl Send for AppObserver {}

impl AppObserver {
    /// Creates an observer for `pid` and subscribes to window moved/resized
    /// notifications, invoking `callback` on each.
    ///
    /// Must be called on the thread that will pump the run loop.
    pub fn install(pid: i32, callback: impl Fn() + Send + 'static) -> TilingResult<Self> {
        let app = AxElement::application(pid)
            .ok_or_else(|| TilingError::observer(format!("no AX element for pid {pid}")))?;

        let mut observer: AXObserverRef = ptr::null_mut();
        let result = unsafe { AXObserverCreate(pid, observer_trampoline, &raw mut observer) };
        if result != K_AX_ERROR_SUCCESS || observer.is_null() {
            return Err(TilingError::observer(format!(
                "AXObserverCreate failed for pid {pid} ({result})"
            )));
        }

        let context = Box::new(ObserverContext { callback: Box::new(callback) });
        let refcon = std::ptr::from_ref::<ObserverContext>(&*context).cast_mut().cast::<c_void>();

        for notification in [cf_window_moved(), cf_window_resized()] {
            let result = unsafe {
                AXObserverAddNotification(observer, app.as_raw(), notification, refcon)
            };
            if result != K_AX_ERROR_SUCCESS {
                unsafe { CFRelease(observer.cast()) };
                return Err(TilingError::observer(format!(
                    "AXObserverAddNotification failed for pid {pid} ({result})"
                )));
            }
        }

        unsafe {
            let source = AXObserverGetRunLoopSource(observer);
            CFRunLoopAddSource(CFRunLoopGetCurrent(), source, cf_run_loop_default_mode());
        }

        Ok(Self { observer, _app: app, _context: context })
    }
}

impl Drop for AppObserver {
    fn drop(&mut self) {
        // Releasing the observer invalidates its run-loop source.
        unsafe { CFRelease(self.observer.cast()) };
    }
}

/// Runs the current thread's run loop for up to `seconds`, delivering any
/// pending observer notifications.
pub fn pump_run_loop(seconds: f64) {
    unsafe {
        CFRunLoopRunInMode(cf_run_loop_default_mode(), seconds, 0);
    }
}

// ============================================================================
// Attribute Helpers
// ============================================================================

/// Gets a string attribute from an element.
unsafe fn get_string_attr(element: AXUIElementRef, attr: *const c_void) -> Option<String> {
    if element.is_null() {
        return None;
    }

    let mut value: *mut c_void = ptr::null_mut();
    let result = unsafe { AXUIElementCopyAttributeValue(element, attr, &raw mut value) };

    if result != K_AX_ERROR_SUCCESS || value.is_null() {
        return None;
    }

    let cf_string_type_id = CFString::type_id() as u64;
    if unsafe { CFGetTypeID(value) } != cf_string_type_id {
        unsafe { CFRelease(value) };
        return None;
    }

    let cf_string = unsafe { CFString::wrap_under_get_rule(value.cast()) };
    let string = cf_string.to_string();
    unsafe { CFRelease(value) };

    Some(string)
}

/// Gets a boolean attribute from an element.
unsafe fn get_bool_attr(element: AXUIElementRef, attr: *const c_void) -> Option<bool> {
    if element.is_null() {
        return None;
    }

    let mut value: *mut c_void = ptr::null_mut();
    let result = unsafe { AXUIElementCopyAttributeValue(element, attr, &raw mut value) };

    if result != K_AX_ERROR_SUCCESS || value.is_null() {
        return None;
    }

    let bool_value = unsafe { CFBoolean::wrap_under_get_rule(value.cast()) };
    let result = bool_value.into();
    unsafe { CFRelease(value) };

    Some(result)
}

/// Gets the position attribute from an element.
unsafe fn get_position_attr(element: AXUIElementRef) -> Option<(f64, f64)> {
    let mut value: *mut c_void = ptr::null_mut();
    let result = unsafe { AXUIElementCopyAttributeValue(element, cf_position(), &raw mut value) };

    if result != K_AX_ERROR_SUCCESS || value.is_null() {
        return None;
    }

    let mut point = core_graphics::geometry::CGPoint::new(0.0, 0.0);
    let success =
        unsafe { AXValueGetValue(value.cast(), K_AX_VALUE_TYPE_CG_POINT, (&raw mut point).cast()) };

    unsafe { CFRelease(value) };

    if success { Some((point.x, point.y)) } else { None }
}

/// Gets the size attribute from an element.
unsafe fn get_size_attr(element: AXUIElementRef) -> Option<(f64, f64)> {
    let mut value: *mut c_void = ptr::null_mut();
    let result = unsafe { AXUIElementCopyAttributeValue(element, cf_size(), &raw mut value) };

    if result != K_AX_ERROR_SUCCESS || value.is_null() {
        return None;
    }

    let mut size = core_graphics::geometry::CGSize::new(0.0, 0.0);
    let success =
        unsafe { AXValueGetValue(value.cast(), K_AX_VALUE_TYPE_CG_SIZE, (&raw mut size).cast()) };

    unsafe { CFRelease(value) };

    if success { Some((size.width, size.height)) } else { None }
}

/// Sets the position attribute on an element.
unsafe fn set_position_attr(element: AXUIElementRef, x: f64, y: f64) -> TilingResult<()> {
    let point = core_graphics::geometry::CGPoint::new(x, y);
    let value = unsafe { AXValueCreate(K_AX_VALUE_TYPE_CG_POINT, (&raw const point).cast()) };

    if value.is_null() {
        return Err(TilingError::window_op("Failed to create AXValue for position"));
    }

    let result = unsafe { AXUIElementSetAttributeValue(element, cf_position(), value.cast()) };
    unsafe { CFRelease(value.cast()) };

    ax_result(result, "set position")
}

/// Sets the size attribute on an element.
unsafe fn set_size_attr(element: AXUIElementRef, width: f64, height: f64) -> TilingResult<()> {
    let size = core_graphics::geometry::CGSize::new(width, height);
    let value = unsafe { AXValueCreate(K_AX_VALUE_TYPE_CG_SIZE, (&raw const size).cast()) };

    if value.is_null() {
        return Err(TilingError::window_op("Failed to create AXValue for size"));
    }

    let result = unsafe { AXUIElementSetAttributeValue(element, cf_size(), value.cast()) };
    unsafe { CFRelease(value.cast()) };

    ax_result(result, "set size")
}

/// Converts an AX error code to a `TilingResult`.
fn ax_result(result: AXError, operation: &str) -> TilingResult<()> {
    if result == K_AX_ERROR_SUCCESS {
        Ok(())
    } else {
        let message = match result {
            K_AX_ERROR_API_DISABLED => "API disabled",
            K_AX_ERROR_INVALID_UI_ELEMENT => "Invalid UI element",
            K_AX_ERROR_ATTRIBUTE_UNSUPPORTED => "Attribute unsupported",
            K_AX_ERROR_CANNOT_COMPLETE => "Cannot complete operation",
            K_AX_ERROR_NOT_IMPLEMENTED => "Not implemented",
            _ => "Unknown error",
        };
        Err(TilingError::accessibility(
            result,
            format!("{operation}: {message}"),
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_null() {
        let result = unsafe { AxElement::from_raw(ptr::null_mut()) };
        assert!(result.is_none());
    }

    #[test]
    fn test_ax_result_success() {
        assert!(ax_result(K_AX_ERROR_SUCCESS, "test").is_ok());
    }

    #[test]
    fn test_ax_result_error_carries_code() {
        let err = ax_result(K_AX_ERROR_INVALID_UI_ELEMENT, "test").unwrap_err();
        assert_eq!(err.ax_error_code(), Some(K_AX_ERROR_INVALID_UI_ELEMENT));
        assert!(err.is_window_gone());
    }

    #[test]
    fn test_ax_error_constants_are_negative() {
        assert!(K_AX_ERROR_INVALID_UI_ELEMENT < 0);
        assert!(K_AX_ERROR_ATTRIBUTE_UNSUPPORTED < 0);
        assert!(K_AX_ERROR_CANNOT_COMPLETE < 0);
    }

    #[test]
    fn test_cached_cfstrings_do_not_panic() {
        let _ = cf_windows();
        let _ = cf_title();
        let _ = cf_role();
        let _ = cf_position();
        let _ = cf_size();
    }
}
