//! Layout: the durable ordered window list and master–stack geometry.

mod engine;
mod master_stack;

pub use engine::{LayoutEngine, MoveDirection, UpdateOutcome};
pub use master_stack::layout;

use smallvec::SmallVec;

use crate::geometry::Rect;

/// Inline capacity for per-screen layout results.
///
/// Screens rarely tile more than 8 windows at once.
pub const LAYOUT_RESULT_INLINE_CAP: usize = 8;

/// Calculated positions for one screen: (`window_id`, frame).
pub type LayoutResult = SmallVec<[(u32, Rect); LAYOUT_RESULT_INLINE_CAP]>;
