//! Master–stack geometry.
//!
//! The first window is the "master" and fills the left column; remaining
//! windows stack vertically in the right column:
//!
//! ```text
//! ┌──────────┬─────┐
//! │          │  2  │
//! │  Master  ├─────┤
//! │          │  3  │
//! └──────────┴─────┘
//! ```
//!
//! The master starts at half the usable width and widens to its owner's
//! minimum usable width, but never so far that the stack column drops under
//! its own minimum.

use smallvec::smallvec;

use super::LayoutResult;
use crate::constants::{STACK_MIN, min_master_width};
use crate::geometry::Rect;

/// Computes master–stack rectangles for one screen.
///
/// # Arguments
///
/// * `windows` - (`window_id`, owner app name) pairs; the first is master
/// * `bounds` - the screen's usable rectangle, already inset by the gap
/// * `gap` - spacing between columns and between stack cells
#[allow(clippy::cast_precision_loss)] // Window counts won't exceed f64 precision
#[must_use]
pub fn layout(windows: &[(u32, &str)], bounds: &Rect, gap: f64) -> LayoutResult {
    if windows.is_empty() {
        return LayoutResult::new();
    }

    // Single window - takes the full bounds
    if windows.len() == 1 {
        return smallvec![(windows[0].0, *bounds)];
    }

    let (master_id, master_app) = windows[0];

    let desired_min = min_master_width(master_app);
    let master_width = (bounds.width / 2.0)
        .max(desired_min)
        .min(bounds.width - STACK_MIN - gap);

    let mut result = LayoutResult::with_capacity(windows.len());

    // Master column (left)
    let master_frame = Rect::new(bounds.x, bounds.y, master_width, bounds.height);
    result.push((master_id, master_frame));

    // Stack column (right), split vertically
    let stack_x = bounds.x + master_width + gap;
    let stack_width = bounds.width - master_width - gap;
    let stack_count = windows.len() - 1;
    let total_stack_gap = gap * (stack_count - 1) as f64;
    let cell_height = (bounds.height - total_stack_gap) / stack_count as f64;

    for (i, &(id, _)) in windows.iter().skip(1).enumerate() {
        let y = (i as f64).mul_add(cell_height + gap, bounds.y);
        result.push((id, Rect::new(stack_x, y, stack_width, cell_height)));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::GAP;

    /// 1440x900 screen inset by the gap on each side.
    fn usable_bounds() -> Rect { Rect::new(12.0, 12.0, 1416.0, 876.0) }

    #[test]
    fn test_empty() {
        let result = layout(&[], &usable_bounds(), GAP);
        assert!(result.is_empty());
    }

    #[test]
    fn test_single_window_fills_bounds() {
        let bounds = usable_bounds();
        let result = layout(&[(1, "TextEdit")], &bounds, GAP);

        assert_eq!(result.len(), 1);
        assert_eq!(result[0], (1, bounds));
    }

    #[test]
    fn test_two_windows_default_minimum() {
        // 1440x900 screen: master takes half the usable width.
        let result = layout(&[(1, "TextEdit"), (2, "Safari")], &usable_bounds(), GAP);

        assert_eq!(result.len(), 2);
        assert_eq!(result[0], (1, Rect::new(12.0, 12.0, 708.0, 876.0)));
        assert_eq!(result[1], (2, Rect::new(732.0, 12.0, 696.0, 876.0)));
    }

    #[test]
    fn test_app_minimum_widens_master() {
        // Xcode needs 950pt; half of 1440 is only 720.
        let bounds = Rect::new(0.0, 0.0, 1440.0, 876.0);
        let result = layout(&[(1, "Xcode"), (2, "Safari")], &bounds, GAP);

        let (_, master) = result[0];
        let (_, stack) = result[1];

        assert!((master.width - 950.0).abs() < f64::EPSILON);
        assert!((stack.x - 962.0).abs() < f64::EPSILON);
        assert!((stack.width - 478.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_master_clamped_by_stack_minimum() {
        // On a narrow screen even Xcode's 950pt must yield to the stack.
        let bounds = Rect::new(0.0, 0.0, 1200.0, 800.0);
        let result = layout(&[(1, "Xcode"), (2, "Safari")], &bounds, GAP);

        let (_, master) = result[0];
        // 1200 - 400 - 12 = 788
        assert!((master.width - 788.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_three_windows_stack_split() {
        let bounds = usable_bounds();
        let result = layout(&[(1, "A"), (2, "B"), (3, "C")], &bounds, GAP);

        assert_eq!(result.len(), 3);

        let (_, stack1) = result[1];
        let (_, stack2) = result[2];

        // Two stack cells split the height minus one gap.
        let expected_height = (bounds.height - GAP) / 2.0;
        assert!((stack1.height - expected_height).abs() < f64::EPSILON);
        assert!((stack2.height - expected_height).abs() < f64::EPSILON);

        // Gap between stack cells.
        assert!((stack2.y - (stack1.y + stack1.height) - GAP).abs() < 1e-9);
    }

    #[test]
    fn test_widths_sum_to_bounds() {
        let bounds = usable_bounds();
        let result = layout(&[(1, "A"), (2, "B"), (3, "C")], &bounds, GAP);

        let (_, master) = result[0];
        let (_, stack) = result[1];

        // Master + gap + stack column == usable width.
        assert!((master.width + GAP + stack.width - bounds.width).abs() < 1e-9);
    }

    #[test]
    fn test_stack_heights_sum_to_bounds() {
        let bounds = usable_bounds();
        let result = layout(&[(1, "A"), (2, "B"), (3, "C"), (4, "D"), (5, "E")], &bounds, GAP);

        let stack_total: f64 = result.iter().skip(1).map(|(_, frame)| frame.height).sum();
        let gaps = GAP * 3.0;
        assert!((stack_total + gaps - bounds.height).abs() < 1e-9);
    }

    #[test]
    fn test_stack_cells_ordered_top_to_bottom() {
        let bounds = usable_bounds();
        let result = layout(&[(1, "A"), (2, "B"), (3, "C"), (4, "D")], &bounds, GAP);

        let ys: Vec<f64> = result.iter().skip(1).map(|(_, frame)| frame.y).collect();
        assert!(ys.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
