//! tessel - Hyprland-inspired master-stack tiling for macOS.
//!
//! A background daemon that observes user application windows, computes a
//! deterministic master–stack layout per screen, and animates each window
//! toward its target geometry through the Accessibility API. Tiling
//! coexists with the native spaces model: switching or throwing windows
//! between spaces stays an OS-mediated action; the daemon repairs its view
//! afterwards with burst scans and a cache flush.
//!
//! The core is three long-lived components owned by the [`daemon::Daemon`]:
//!
//! * [`discovery`] - periodic window enumeration through two oracles
//! * [`layout`] - the ordered managed list and master–stack geometry
//! * [`animator`] - display-synchronized frame interpolation

// The entire surface is macOS API plumbing; other platforms have nothing
// to link against.
#[cfg(not(target_os = "macos"))]
compile_error!("tessel only supports macOS.");

pub mod animator;
pub mod config;
pub mod constants;
pub mod daemon;
pub mod discovery;
pub mod error;
pub mod ffi;
pub mod geometry;
pub mod layout;
mod logging;
mod util;

use std::time::Duration;

pub use config::Config;

/// How often the startup gate re-checks accessibility trust.
const TRUST_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Blocks until accessibility trust is granted.
///
/// Discovery must not run before trust exists; the grant can arrive at any
/// time while the daemon waits (the permission prompt itself is handled by
/// an external helper).
fn wait_for_trust() {
    if ffi::accessibility::is_trusted() {
        return;
    }

    tracing::warn!(
        "accessibility permission not granted - waiting (System Settings > Privacy & Security > Accessibility)"
    );

    while !ffi::accessibility::is_trusted() {
        std::thread::sleep(TRUST_POLL_INTERVAL);
    }

    tracing::info!("accessibility permission granted");
}

/// Runs the daemon until a quit action arrives.
///
/// Initializes logging, waits for accessibility trust, then starts the
/// discovery/layout/animation loop.
pub fn run(config: Config, verbose: bool) {
    logging::init(if verbose { "debug" } else { "info" });

    tracing::info!(
        gap = config.gap,
        animations = config.animations_enabled,
        scan_interval_ms = config.scan_interval_ms,
        "tessel starting"
    );

    wait_for_trust();

    let daemon = daemon::Daemon::new(&config);
    daemon.run();
}
