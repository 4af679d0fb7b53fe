//! tessel daemon entry point.

// Emit a clear compile-time error if attempted to compile on unsupported platforms
#[cfg(not(target_os = "macos"))]
compile_error!("This application only supports macOS.");

use clap::Parser;

/// Hyprland-inspired master-stack tiling for macOS.
#[derive(Parser, Debug)]
#[command(name = "tessel", version, about)]
struct Args {
    /// Enable debug logging (overridden by TESSEL_LOG).
    #[arg(short, long)]
    verbose: bool,

    /// Gap between windows and screen edges, in points.
    #[arg(long)]
    gap: Option<f64>,

    /// Move windows instantly instead of animating.
    #[arg(long)]
    no_animation: bool,

    /// Interval between discovery scans, in milliseconds.
    #[arg(long, value_name = "MS")]
    scan_interval_ms: Option<u64>,
}

fn main() {
    let args = Args::parse();

    let mut config = tessel::Config::from_env();
    if let Some(gap) = args.gap {
        config.gap = gap;
    }
    if args.no_animation {
        config.animations_enabled = false;
    }
    if let Some(ms) = args.scan_interval_ms {
        config.scan_interval_ms = ms;
    }

    tessel::run(config, args.verbose);
}
