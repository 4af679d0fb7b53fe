//! Error types for the tiling core.
//!
//! Nothing here is fatal: the daemon degrades (empty snapshots, skipped
//! windows, reissued writes) and keeps tiling whatever it can see.

use std::fmt;

/// Result type alias for tiling operations.
pub type TilingResult<T> = Result<T, TilingError>;

/// Errors that can occur while discovering, laying out, or moving windows.
#[derive(Debug, Clone)]
pub enum TilingError {
    /// Accessibility trust has not been granted to this process.
    ///
    /// Discovery degrades to empty snapshots; trust may arrive at runtime.
    PermissionDenied,

    /// An error returned by the macOS Accessibility API.
    ///
    /// Contains the AX error code and a descriptive message. Common codes:
    /// - -25200: not authorized (accessibility permissions needed)
    /// - -25202: invalid UI element (window closed mid-operation)
    /// - -25204: cannot complete (target app is unresponsive)
    AccessibilityError {
        /// The AX error code returned by the API.
        code: i32,
        /// A human-readable description of the error.
        message: String,
    },

    /// A window operation (frame read, frame write) failed.
    WindowOperation(String),

    /// A window disappeared between enumeration and use.
    WindowGone(u32),

    /// The event observer system failed to attach.
    Observer(String),

    /// The display-refresh driver could not be created.
    ///
    /// The animator falls back to a fixed-rate timer tick.
    DriverUnavailable,
}

impl TilingError {
    /// Creates an accessibility error with the given code and message.
    #[must_use]
    pub fn accessibility(code: i32, message: impl Into<String>) -> Self {
        Self::AccessibilityError { code, message: message.into() }
    }

    /// Creates a window operation error with the given message.
    #[must_use]
    pub fn window_op(message: impl Into<String>) -> Self { Self::WindowOperation(message.into()) }

    /// Creates an observer error with the given message.
    #[must_use]
    pub fn observer(message: impl Into<String>) -> Self { Self::Observer(message.into()) }

    /// Returns `true` if this error means accessibility trust is missing.
    #[must_use]
    pub const fn is_permission_error(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied | Self::AccessibilityError { code: -25200, .. }
        )
    }

    /// Returns `true` if the target window no longer exists.
    #[must_use]
    pub const fn is_window_gone(&self) -> bool {
        matches!(
            self,
            Self::WindowGone(_) | Self::AccessibilityError { code: -25202, .. }
        )
    }

    /// Returns the AX error code if this is an accessibility error.
    #[must_use]
    pub const fn ax_error_code(&self) -> Option<i32> {
        if let Self::AccessibilityError { code, .. } = self {
            Some(*code)
        } else {
            None
        }
    }
}

impl fmt::Display for TilingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PermissionDenied => {
                write!(f, "Accessibility permission not granted")
            }
            Self::AccessibilityError { code, message } => {
                write!(f, "Accessibility error ({code}): {message}")
            }
            Self::WindowOperation(msg) => {
                write!(f, "Window operation failed: {msg}")
            }
            Self::WindowGone(id) => {
                write!(f, "Window {id} no longer exists")
            }
            Self::Observer(msg) => {
                write!(f, "Observer error: {msg}")
            }
            Self::DriverUnavailable => {
                write!(f, "Display refresh driver unavailable")
            }
        }
    }
}

impl std::error::Error for TilingError {}
