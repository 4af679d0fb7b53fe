//! Running application enumeration via `NSWorkspace`.

use objc::runtime::{BOOL, Class, Object, YES};
use objc::{msg_send, sel, sel_impl};

/// A running application that can own tileable windows.
#[derive(Debug, Clone)]
pub struct RunningApp {
    /// Process ID.
    pub pid: i32,
    /// Application display name (e.g., "Safari").
    pub name: String,
    /// Bundle identifier (e.g., "com.apple.Safari"), when published.
    pub bundle_id: Option<String>,
}

/// Returns all running applications with a regular activation policy that
/// are not hidden.
///
/// Background agents and accessory apps (activation policy != regular)
/// never own tileable windows and are skipped up front.
#[must_use]
pub fn regular_apps() -> Vec<RunningApp> {
    unsafe {
        let Some(workspace_class) = Class::get("NSWorkspace") else {
            return Vec::new();
        };

        let workspace: *mut Object = msg_send![workspace_class, sharedWorkspace];
        if workspace.is_null() {
            return Vec::new();
        }

        let apps: *mut Object = msg_send![workspace, runningApplications];
        if apps.is_null() {
            return Vec::new();
        }

        let count: usize = msg_send![apps, count];
        let mut result = Vec::with_capacity(count);

        for i in 0..count {
            let app: *mut Object = msg_send![apps, objectAtIndex: i];
            if app.is_null() {
                continue;
            }

            // 0 = NSApplicationActivationPolicyRegular
            let activation_policy: i64 = msg_send![app, activationPolicy];
            if activation_policy != 0 {
                continue;
            }

            let is_hidden: BOOL = msg_send![app, isHidden];
            if is_hidden == YES {
                continue;
            }

            let pid: i32 = msg_send![app, processIdentifier];
            if pid <= 0 {
                continue;
            }

            let name = ns_string_to_rust(msg_send![app, localizedName]);
            let bundle_id = {
                let s = ns_string_to_rust(msg_send![app, bundleIdentifier]);
                if s.is_empty() { None } else { Some(s) }
            };

            result.push(RunningApp { pid, name, bundle_id });
        }

        result
    }
}

/// Returns the frontmost (active) application, if any.
#[must_use]
pub fn frontmost_app() -> Option<RunningApp> {
    unsafe {
        let workspace_class = Class::get("NSWorkspace")?;
        let workspace: *mut Object = msg_send![workspace_class, sharedWorkspace];
        if workspace.is_null() {
            return None;
        }

        let app: *mut Object = msg_send![workspace, frontmostApplication];
        if app.is_null() {
            return None;
        }

        let pid: i32 = msg_send![app, processIdentifier];
        if pid <= 0 {
            return None;
        }

        let name = ns_string_to_rust(msg_send![app, localizedName]);
        let bundle_id = {
            let s = ns_string_to_rust(msg_send![app, bundleIdentifier]);
            if s.is_empty() { None } else { Some(s) }
        };

        Some(RunningApp { pid, name, bundle_id })
    }
}

/// Converts an `NSString` to a Rust `String`; null becomes the empty string.
unsafe fn ns_string_to_rust(ns_string: *mut Object) -> String {
    if ns_string.is_null() {
        return String::new();
    }

    unsafe {
        let utf8: *const std::os::raw::c_char = msg_send![ns_string, UTF8String];
        if utf8.is_null() {
            return String::new();
        }
        std::ffi::CStr::from_ptr(utf8).to_string_lossy().into_owned()
    }
}
