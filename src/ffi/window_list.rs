//! Compositor window list queries via `CGWindowListCopyWindowInfo`.
//!
//! This is the second visibility oracle next to the per-app accessibility
//! trees: accurate about what is actually composited on screen, but lagging
//! during space transitions.

use std::collections::HashSet;
use std::ffi::c_void;

use core_foundation::string::CFString;

// ============================================================================
// FFI Declarations
// ============================================================================

type CFArrayRef = *const c_void;

#[link(name = "CoreGraphics", kind = "framework")]
unsafe extern "C" {
    fn CGWindowListCopyWindowInfo(option: u32, relative_to_window: u32) -> CFArrayRef;
}

#[link(name = "CoreFoundation", kind = "framework")]
unsafe extern "C" {
    fn CFArrayGetCount(array: *const c_void) -> i64;
    fn CFArrayGetValueAtIndex(array: *const c_void, idx: i64) -> *const c_void;
    fn CFDictionaryGetValue(dict: *const c_void, key: *const c_void) -> *const c_void;
    fn CFNumberGetValue(number: *const c_void, the_type: i32, value_ptr: *mut c_void) -> bool;
    fn CFRelease(cf: *const c_void);
}

// CGWindowListOption flags
const K_CG_WINDOW_LIST_OPTION_ON_SCREEN_ONLY: u32 = 1;
const K_CG_WINDOW_LIST_EXCLUDE_DESKTOP_ELEMENTS: u32 = 1 << 4;

// kCFNumberSInt64Type
const K_CF_NUMBER_SINT64_TYPE: i32 = 4;

/// Reads an integer value out of a `CFDictionary` entry.
unsafe fn dict_i64(dict: *const c_void, key: &CFString) -> Option<i64> {
    use core_foundation::base::TCFType;

    let value = unsafe { CFDictionaryGetValue(dict, key.as_concrete_TypeRef().cast()) };
    if value.is_null() {
        return None;
    }

    let mut number: i64 = 0;
    let ok = unsafe { CFNumberGetValue(value, K_CF_NUMBER_SINT64_TYPE, (&raw mut number).cast()) };
    ok.then_some(number)
}

/// Returns the IDs of all windows the compositor currently draws at layer 0.
///
/// Layer 0 is where normal application windows live; the menu bar, dock,
/// and overlay surfaces report other layers and are excluded along with
/// desktop elements.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn on_screen_window_ids() -> HashSet<u32> {
    let key_number = CFString::new("kCGWindowNumber");
    let key_layer = CFString::new("kCGWindowLayer");

    let mut ids = HashSet::new();

    unsafe {
        let options =
            K_CG_WINDOW_LIST_OPTION_ON_SCREEN_ONLY | K_CG_WINDOW_LIST_EXCLUDE_DESKTOP_ELEMENTS;
        let window_list = CGWindowListCopyWindowInfo(options, 0);

        if window_list.is_null() {
            return ids;
        }

        let count = CFArrayGetCount(window_list);
        for i in 0..count {
            let dict = CFArrayGetValueAtIndex(window_list, i);
            if dict.is_null() {
                continue;
            }

            let layer = dict_i64(dict, &key_layer).unwrap_or(0);
            if layer != 0 {
                continue;
            }

            let id = dict_i64(dict, &key_number).unwrap_or(0) as u32;
            if id != 0 {
                ids.insert(id);
            }
        }

        CFRelease(window_list);
    }

    ids
}
