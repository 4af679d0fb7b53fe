//! Tuning constants for the tiling core.
//!
//! These values are deliberate and interact with each other: the zombie TTL
//! must outlast the longest transient disappearance observed in practice
//! (Electron renderers during a space switch), and the burst scan must cover
//! the window in which the compositor still reports stale visibility.

use std::time::Duration;

/// Gap between windows and between windows and screen edges, in points.
pub const GAP: f64 = 12.0;

/// How long a managed window survives absence from discovery snapshots.
pub const ZOMBIE_TTL: Duration = Duration::from_secs(2);

/// Minimum width reserved for the stack column, in points.
pub const STACK_MIN: f64 = 400.0;

/// Minimum master width when the owner has no app-specific entry.
pub const DEFAULT_MIN_MASTER_WIDTH: f64 = 400.0;

/// Interval between periodic discovery scans.
pub const DISCOVERY_PERIOD: Duration = Duration::from_millis(1500);

/// Number of snapshots in a burst scan.
pub const BURST_COUNT: u32 = 7;

/// Spacing between burst scan snapshots.
pub const BURST_INTERVAL: Duration = Duration::from_millis(200);

/// Delay before laying out a snapshot that introduced a new window, giving
/// the window time to publish an initial frame.
pub const NEW_WINDOW_SETTLE: Duration = Duration::from_millis(50);

/// Debounce window for externally triggered layout passes.
pub const APPLY_LAYOUT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Delay between a left-button release and the follow-up layout pass.
pub const MOUSE_UP_DELAY: Duration = Duration::from_millis(200);

/// Duration of a window frame animation.
pub const ANIMATION_DURATION: Duration = Duration::from_millis(180);

/// Exponent of the ease-out curve `1 - (1 - t)^k`.
pub const EASE_EXPONENT: i32 = 5;

/// Components closer than this to the cached target are not re-dispatched.
pub const LAYOUT_DEAD_ZONE: f64 = 1.0;

/// Chebyshev distance below which the animator writes instantly.
pub const ANIMATOR_DEAD_ZONE: f64 = 2.0;

/// Windows smaller than this on either axis are helper surfaces, not tiles.
pub const MIN_TILE_SIZE: f64 = 50.0;

/// Animator suppression window around a space transition.
pub const SPACE_SUPPRESS: Duration = Duration::from_millis(800);

/// Gap between the two writes of a forced placement.
pub const FORCE_PLACE_REWRITE_DELAY: Duration = Duration::from_millis(10);

/// Tick rate when no display link is available.
pub const FALLBACK_TICK_HZ: u32 = 60;

/// Apps whose renderers mis-report compositor visibility during space
/// transitions; their windows trust geometry intersection instead.
pub const BROWSER_WHITELIST: &[&str] = &[
    "Brave Browser",
    "Google Chrome",
    "Arc",
    "Safari",
    "Firefox",
    "Microsoft Edge",
];

/// Minimum usable master widths for apps whose sidebars collapse or whose
/// content breaks below a certain width.
pub const APP_MIN_MASTER_WIDTHS: &[(&str, f64)] = &[
    ("Xcode", 950.0),
    ("Music", 600.0),
    ("Spotify", 550.0),
    ("Discord", 500.0),
    ("System Settings", 600.0),
    ("Brave Browser", 500.0),
    ("Google Chrome", 500.0),
    ("WhatsApp", 500.0),
    ("Messages", 450.0),
];

/// Looks up the minimum master width for an app by its display name.
#[must_use]
pub fn min_master_width(app_name: &str) -> f64 {
    APP_MIN_MASTER_WIDTHS
        .iter()
        .find(|(name, _)| *name == app_name)
        .map_or(DEFAULT_MIN_MASTER_WIDTH, |(_, width)| *width)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_master_width_known_apps() {
        assert!((min_master_width("Xcode") - 950.0).abs() < f64::EPSILON);
        assert!((min_master_width("Messages") - 450.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_min_master_width_unknown_app_uses_default() {
        assert!((min_master_width("Some Editor") - DEFAULT_MIN_MASTER_WIDTH).abs() < f64::EPSILON);
    }

    #[test]
    fn test_browser_whitelist_contains_major_browsers() {
        assert!(BROWSER_WHITELIST.contains(&"Safari"));
        assert!(BROWSER_WHITELIST.contains(&"Google Chrome"));
        assert!(!BROWSER_WHITELIST.contains(&"Xcode"));
    }

    #[test]
    fn test_dead_zones_ordered() {
        // The animator's instant-write zone must cover the layout cache zone,
        // otherwise dispatched micro-moves would animate.
        assert!(ANIMATOR_DEAD_ZONE >= LAYOUT_DEAD_ZONE);
    }
}
