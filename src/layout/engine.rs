//! The layout engine: reconciliation, ordering, and dispatch.
//!
//! Owns the authoritative ordered window list. Index 0 is the master slot;
//! indices >= 1 are the stack, top to bottom. A window missing from the
//! latest snapshot is kept in place as a "zombie" for a grace period so
//! transient disappearances (Electron renderers, fast space switches) do
//! not shuffle user-assigned positions.
//!
//! All engine state lives on the daemon loop thread; nothing here is
//! shared.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::animator::AnimatorHandle;
use crate::constants::{GAP, LAYOUT_DEAD_ZONE, ZOMBIE_TTL};
use crate::discovery::{Snapshot, WindowRecord};
use crate::geometry::Rect;

/// Direction for manual window reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDirection {
    /// Promote to master (index 0).
    Left,
    /// Demote to the top of the stack (index 1).
    Right,
    /// Swap with the previous index.
    Up,
    /// Swap with the next index.
    Down,
}

/// Result of reconciling one snapshot.
#[derive(Debug, Clone, Copy)]
pub struct UpdateOutcome {
    /// Whether the snapshot introduced a previously unseen window ID.
    ///
    /// New windows need a settle delay before layout so they have time to
    /// publish an initial frame instead of teleporting from screen center.
    pub saw_new_window: bool,
}

/// The layout engine.
pub struct LayoutEngine {
    /// Ordered managed windows; the only owner of long-lived records.
    managed: Vec<WindowRecord>,
    /// Windows missing from the latest snapshot, by first-missed time.
    zombies: HashMap<u32, Instant>,
    /// Last rectangle dispatched per window, for redundancy suppression.
    target_cache: HashMap<u32, Rect>,
    animator: AnimatorHandle,
    /// Set by the space manager while a window throw is in flight.
    throwing: Arc<AtomicBool>,
    screens: Box<dyn Fn() -> Vec<Rect> + Send>,
    gap: f64,
}

impl LayoutEngine {
    /// Creates an engine dispatching to `animator` and reading active
    /// display frames from the platform.
    #[must_use]
    pub fn new(animator: AnimatorHandle, throwing: Arc<AtomicBool>) -> Self {
        Self {
            managed: Vec::new(),
            zombies: HashMap::new(),
            target_cache: HashMap::new(),
            animator,
            throwing,
            screens: Box::new(crate::ffi::display::active_frames),
            gap: GAP,
        }
    }

    /// Replaces the screen source. Used by embedders and tests.
    pub fn set_screen_provider(&mut self, screens: impl Fn() -> Vec<Rect> + Send + 'static) {
        self.screens = Box::new(screens);
    }

    /// Overrides the configured gap.
    pub const fn set_gap(&mut self, gap: f64) { self.gap = gap; }

    /// The current managed windows, master first.
    #[must_use]
    pub fn managed(&self) -> &[WindowRecord] { &self.managed }

    /// Whether a managed window is currently a zombie.
    #[must_use]
    pub fn is_zombie(&self, window_id: u32) -> bool { self.zombies.contains_key(&window_id) }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Merges a discovery snapshot into the managed list.
    ///
    /// Present windows keep their relative position and get fresh snapshot
    /// data; missing windows survive as zombies until the TTL elapses; new
    /// windows append in snapshot order.
    pub fn update(&mut self, snapshot: Snapshot) -> UpdateOutcome {
        self.reconcile_at(snapshot, Instant::now())
    }

    fn reconcile_at(&mut self, snapshot: Snapshot, now: Instant) -> UpdateOutcome {
        let mut by_id: HashMap<u32, WindowRecord> = HashMap::with_capacity(snapshot.len());
        let mut incoming_order: Vec<u32> = Vec::with_capacity(snapshot.len());
        for record in snapshot {
            if !by_id.contains_key(&record.window_id) {
                incoming_order.push(record.window_id);
                by_id.insert(record.window_id, record);
            }
        }

        let previous = std::mem::take(&mut self.managed);
        let mut next: Vec<WindowRecord> =
            Vec::with_capacity(previous.len() + incoming_order.len());

        for record in previous {
            let id = record.window_id;
            if let Some(incoming) = by_id.remove(&id) {
                self.zombies.remove(&id);
                next.push(incoming);
                continue;
            }

            match self.zombies.get(&id) {
                None => {
                    self.zombies.insert(id, now);
                    next.push(record);
                }
                Some(&first_missed) if now.duration_since(first_missed) < ZOMBIE_TTL => {
                    next.push(record);
                }
                Some(_) => {
                    self.zombies.remove(&id);
                    self.target_cache.remove(&id);
                    tracing::debug!(window_id = id, app = %record.app_name, "window departed");
                }
            }
        }

        let mut saw_new_window = false;
        for id in incoming_order {
            // IDs already managed were consumed above; the rest are new.
            if let Some(record) = by_id.remove(&id) {
                tracing::debug!(window_id = id, app = %record.app_name, "managing new window");
                saw_new_window = true;
                next.push(record);
            }
        }

        self.managed = next;
        UpdateOutcome { saw_new_window }
    }

    // ========================================================================
    // Manual Reordering
    // ========================================================================

    /// Moves the focused window within the managed order.
    ///
    /// No-op when the focused window is not managed or the move changes
    /// nothing; otherwise the layout is reapplied immediately.
    pub fn move_focused(&mut self, direction: MoveDirection, focused: Option<u32>) {
        let Some(window_id) = focused else {
            return;
        };
        let Some(index) = self.managed.iter().position(|r| r.window_id == window_id) else {
            return;
        };

        let last = self.managed.len() - 1;
        let changed = match direction {
            MoveDirection::Left => {
                if index == 0 {
                    false
                } else {
                    let record = self.managed.remove(index);
                    self.managed.insert(0, record);
                    true
                }
            }
            MoveDirection::Right => {
                let target = 1.min(last);
                if index == target {
                    false
                } else {
                    let record = self.managed.remove(index);
                    self.managed.insert(target, record);
                    true
                }
            }
            MoveDirection::Up => {
                let target = index.saturating_sub(1);
                if target == index {
                    false
                } else {
                    self.managed.swap(index, target);
                    true
                }
            }
            MoveDirection::Down => {
                let target = (index + 1).min(last);
                if target == index {
                    false
                } else {
                    self.managed.swap(index, target);
                    true
                }
            }
        };

        if changed {
            self.apply_layout();
        }
    }

    /// Moves the given window to the master slot.
    pub fn promote_to_master(&mut self, window_id: u32) {
        let Some(index) = self.managed.iter().position(|r| r.window_id == window_id) else {
            return;
        };
        if index == 0 {
            return;
        }
        let record = self.managed.remove(index);
        self.managed.insert(0, record);
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Computes rectangles for every screen and schedules the changed ones.
    ///
    /// A window participates in a screen's layout iff it is not a zombie,
    /// reports on-screen, and its last known frame intersects the screen.
    /// Targets within the dead zone of the cached dispatch are skipped.
    pub fn apply_layout(&mut self) {
        if self.throwing.load(Ordering::Relaxed) {
            tracing::debug!("layout skipped, window throw in progress");
            return;
        }

        let screens = (self.screens)();
        for screen in &screens {
            let bounds = screen.inset(self.gap);

            let active: Vec<&WindowRecord> = self
                .managed
                .iter()
                .filter(|record| {
                    !self.zombies.contains_key(&record.window_id)
                        && record.on_screen
                        && screen.intersects(&record.frame)
                })
                .collect();

            let columns: Vec<(u32, &str)> =
                active.iter().map(|r| (r.window_id, r.app_name.as_str())).collect();

            for (window_id, target) in super::master_stack::layout(&columns, &bounds, self.gap) {
                if let Some(previous) = self.target_cache.get(&window_id)
                    && target.approx_eq(previous, LAYOUT_DEAD_ZONE)
                {
                    continue;
                }

                self.target_cache.insert(window_id, target);

                if let Some(record) = active.iter().find(|r| r.window_id == window_id) {
                    self.animator.schedule(window_id, record.handle.clone(), target);
                }
            }
        }
    }

    /// Empties the target cache so the next pass rewrites every window.
    ///
    /// Called after a space change, when every cached rectangle is suspect.
    pub fn reset_cache(&mut self) { self.target_cache.clear(); }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::mpsc::Receiver;
    use std::time::Duration;

    use super::*;
    use crate::animator::Command;

    fn record(window_id: u32, app_name: &str) -> WindowRecord {
        WindowRecord {
            window_id,
            pid: 100,
            app_name: app_name.to_string(),
            bundle_id: None,
            title: format!("{app_name} window"),
            frame: Rect::new(100.0, 100.0, 800.0, 600.0),
            on_screen: true,
            handle: None,
        }
    }

    fn engine() -> (LayoutEngine, Receiver<Command>) {
        let (animator, commands) = AnimatorHandle::test_pair();
        let mut engine = LayoutEngine::new(animator, Arc::new(AtomicBool::new(false)));
        engine.set_screen_provider(|| vec![Rect::new(0.0, 0.0, 1440.0, 900.0)]);
        (engine, commands)
    }

    fn scheduled(commands: &Receiver<Command>) -> Vec<(u32, Rect)> {
        let mut result = Vec::new();
        while let Ok(command) = commands.try_recv() {
            if let Command::Schedule { key, target, .. } = command {
                result.push((key, target));
            }
        }
        result
    }

    fn managed_ids(engine: &LayoutEngine) -> Vec<u32> {
        engine.managed().iter().map(|r| r.window_id).collect()
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    #[test]
    fn test_update_appends_in_snapshot_order() {
        let (mut engine, _commands) = engine();

        let outcome = engine.update(vec![record(1, "A"), record(2, "B")]);
        assert!(outcome.saw_new_window);
        assert_eq!(managed_ids(&engine), vec![1, 2]);

        let outcome = engine.update(vec![record(1, "A"), record(2, "B"), record(3, "C")]);
        assert!(outcome.saw_new_window);
        assert_eq!(managed_ids(&engine), vec![1, 2, 3]);
    }

    #[test]
    fn test_update_preserves_order_for_existing_windows() {
        let (mut engine, _commands) = engine();

        engine.update(vec![record(1, "A"), record(2, "B"), record(3, "C")]);

        // The snapshot reports the windows in a different order; managed
        // positions must not move.
        let outcome = engine.update(vec![record(3, "C"), record(1, "A"), record(2, "B")]);
        assert!(!outcome.saw_new_window);
        assert_eq!(managed_ids(&engine), vec![1, 2, 3]);
    }

    #[test]
    fn test_update_window_ids_unique() {
        let (mut engine, _commands) = engine();

        engine.update(vec![record(1, "A"), record(1, "A"), record(2, "B")]);
        assert_eq!(managed_ids(&engine), vec![1, 2]);
    }

    #[test]
    fn test_update_refreshes_snapshot_data() {
        let (mut engine, _commands) = engine();

        engine.update(vec![record(1, "A")]);

        let mut moved = record(1, "A");
        moved.frame = Rect::new(300.0, 300.0, 640.0, 480.0);
        engine.update(vec![moved]);

        assert_eq!(
            engine.managed()[0].frame,
            Rect::new(300.0, 300.0, 640.0, 480.0)
        );
    }

    #[test]
    fn test_missing_window_becomes_zombie_and_keeps_position() {
        let (mut engine, _commands) = engine();

        engine.update(vec![record(1, "A"), record(2, "B"), record(3, "C")]);

        // B disappears; the list keeps [A, B, C].
        engine.update(vec![record(1, "A"), record(3, "C")]);
        assert_eq!(managed_ids(&engine), vec![1, 2, 3]);
        assert!(engine.is_zombie(2));
        assert!(!engine.is_zombie(1));
    }

    #[test]
    fn test_zombie_revived_when_window_returns() {
        let (mut engine, _commands) = engine();

        engine.update(vec![record(1, "A"), record(2, "B")]);
        engine.update(vec![record(1, "A")]);
        assert!(engine.is_zombie(2));

        engine.update(vec![record(1, "A"), record(2, "B")]);
        assert!(!engine.is_zombie(2));
        assert_eq!(managed_ids(&engine), vec![1, 2]);
    }

    #[test]
    fn test_zombie_dropped_after_ttl() {
        let (mut engine, _commands) = engine();
        let start = Instant::now();

        engine.reconcile_at(vec![record(1, "A"), record(2, "B"), record(3, "C")], start);

        // B goes missing.
        engine.reconcile_at(vec![record(1, "A"), record(3, "C")], start);
        assert_eq!(managed_ids(&engine), vec![1, 2, 3]);

        // Still missing within the TTL: preserved.
        engine.reconcile_at(
            vec![record(1, "A"), record(3, "C")],
            start + Duration::from_millis(1900),
        );
        assert_eq!(managed_ids(&engine), vec![1, 2, 3]);

        // 2.5s later: dropped.
        engine.reconcile_at(
            vec![record(1, "A"), record(3, "C")],
            start + Duration::from_millis(2500),
        );
        assert_eq!(managed_ids(&engine), vec![1, 3]);
        assert!(!engine.is_zombie(2));
    }

    // ========================================================================
    // Layout Dispatch
    // ========================================================================

    #[test]
    fn test_two_windows_master_and_stack_rects() {
        let (mut engine, commands) = engine();

        engine.update(vec![record(1, "A"), record(2, "B")]);
        engine.apply_layout();

        let dispatched = scheduled(&commands);
        assert_eq!(dispatched.len(), 2);
        assert_eq!(dispatched[0], (1, Rect::new(12.0, 12.0, 708.0, 876.0)));
        assert_eq!(dispatched[1], (2, Rect::new(732.0, 12.0, 696.0, 876.0)));
    }

    #[test]
    fn test_apply_layout_idempotent() {
        let (mut engine, commands) = engine();

        engine.update(vec![record(1, "A"), record(2, "B")]);
        engine.apply_layout();
        assert_eq!(scheduled(&commands).len(), 2);

        // Nothing changed: the second pass issues zero writes.
        engine.apply_layout();
        assert!(scheduled(&commands).is_empty());
    }

    #[test]
    fn test_reset_cache_forces_full_redispatch() {
        let (mut engine, commands) = engine();

        engine.update(vec![record(1, "A"), record(2, "B")]);
        engine.apply_layout();
        scheduled(&commands);

        engine.reset_cache();
        engine.apply_layout();
        assert_eq!(scheduled(&commands).len(), 2);
    }

    #[test]
    fn test_zombie_excluded_from_layout() {
        let (mut engine, commands) = engine();

        engine.update(vec![record(1, "A"), record(2, "B"), record(3, "C")]);

        // B disappears: the remaining pair lays out as a two-window case.
        engine.update(vec![record(1, "A"), record(3, "C")]);
        engine.apply_layout();

        let dispatched = scheduled(&commands);
        assert_eq!(dispatched.len(), 2);
        assert_eq!(dispatched[0], (1, Rect::new(12.0, 12.0, 708.0, 876.0)));
        assert_eq!(dispatched[1], (3, Rect::new(732.0, 12.0, 696.0, 876.0)));
    }

    #[test]
    fn test_off_screen_window_excluded_from_layout() {
        let (mut engine, commands) = engine();

        let mut hidden = record(2, "B");
        hidden.on_screen = false;

        engine.update(vec![record(1, "A"), hidden]);
        engine.apply_layout();

        let dispatched = scheduled(&commands);
        assert_eq!(dispatched.len(), 1);
        // Lone visible window fills the usable bounds.
        assert_eq!(dispatched[0], (1, Rect::new(12.0, 12.0, 1416.0, 876.0)));
    }

    #[test]
    fn test_window_outside_screen_frame_excluded() {
        let (mut engine, commands) = engine();

        let mut elsewhere = record(2, "B");
        elsewhere.frame = Rect::new(5000.0, 100.0, 800.0, 600.0);

        engine.update(vec![record(1, "A"), elsewhere]);
        engine.apply_layout();

        assert_eq!(scheduled(&commands).len(), 1);
    }

    #[test]
    fn test_apply_layout_skipped_while_throwing() {
        let (animator, commands) = AnimatorHandle::test_pair();
        let throwing = Arc::new(AtomicBool::new(true));
        let mut engine = LayoutEngine::new(animator, Arc::clone(&throwing));
        engine.set_screen_provider(|| vec![Rect::new(0.0, 0.0, 1440.0, 900.0)]);

        engine.update(vec![record(1, "A"), record(2, "B")]);
        engine.apply_layout();
        assert!(scheduled(&commands).is_empty());

        throwing.store(false, Ordering::Relaxed);
        engine.apply_layout();
        assert_eq!(scheduled(&commands).len(), 2);
    }

    #[test]
    fn test_xcode_master_minimum() {
        let (mut engine, commands) = engine();
        engine.set_screen_provider(|| vec![Rect::new(-12.0, -12.0, 1464.0, 900.0)]);

        engine.update(vec![record(1, "Xcode"), record(2, "Safari")]);
        engine.apply_layout();

        let dispatched = scheduled(&commands);
        // Usable bounds are 1440 wide: Xcode's 950pt minimum wins over 720.
        assert!((dispatched[0].1.width - 950.0).abs() < f64::EPSILON);
        assert!((dispatched[1].1.width - 478.0).abs() < f64::EPSILON);
    }

    // ========================================================================
    // Manual Reordering
    // ========================================================================

    #[test]
    fn test_promote_to_master() {
        let (mut engine, _commands) = engine();

        engine.update(vec![record(1, "A"), record(2, "B"), record(3, "C")]);
        engine.promote_to_master(3);
        assert_eq!(managed_ids(&engine), vec![3, 1, 2]);

        // Promoting the master is a no-op.
        engine.promote_to_master(3);
        assert_eq!(managed_ids(&engine), vec![3, 1, 2]);
    }

    #[test]
    fn test_move_focused_left_promotes() {
        let (mut engine, _commands) = engine();

        engine.update(vec![record(1, "A"), record(2, "B"), record(3, "C")]);
        engine.move_focused(MoveDirection::Left, Some(3));
        assert_eq!(managed_ids(&engine), vec![3, 1, 2]);
    }

    #[test]
    fn test_promote_then_move_right_round_trip() {
        let (mut engine, _commands) = engine();

        engine.update(vec![record(1, "A"), record(2, "B"), record(3, "C")]);

        engine.promote_to_master(2);
        assert_eq!(managed_ids(&engine), vec![2, 1, 3]);

        engine.move_focused(MoveDirection::Right, Some(2));
        assert_eq!(managed_ids(&engine)[1], 2);
    }

    #[test]
    fn test_move_focused_up_down_swaps_clamped() {
        let (mut engine, _commands) = engine();

        engine.update(vec![record(1, "A"), record(2, "B"), record(3, "C")]);

        engine.move_focused(MoveDirection::Up, Some(3));
        assert_eq!(managed_ids(&engine), vec![1, 3, 2]);

        engine.move_focused(MoveDirection::Down, Some(2));
        assert_eq!(managed_ids(&engine), vec![1, 3, 2]); // already last

        engine.move_focused(MoveDirection::Up, Some(1));
        assert_eq!(managed_ids(&engine), vec![1, 3, 2]); // already master
    }

    #[test]
    fn test_move_focused_unmanaged_is_noop() {
        let (mut engine, commands) = engine();

        engine.update(vec![record(1, "A"), record(2, "B")]);
        engine.move_focused(MoveDirection::Left, Some(99));
        engine.move_focused(MoveDirection::Left, None);
        assert_eq!(managed_ids(&engine), vec![1, 2]);
        assert!(scheduled(&commands).is_empty());
    }

    #[test]
    fn test_move_focused_applies_layout_on_change() {
        let (mut engine, commands) = engine();

        engine.update(vec![record(1, "A"), record(2, "B")]);
        engine.apply_layout();
        scheduled(&commands);

        engine.move_focused(MoveDirection::Left, Some(2));

        // Master and stack swapped: both rectangles are re-dispatched.
        let dispatched = scheduled(&commands);
        assert_eq!(dispatched.len(), 2);
        assert_eq!(dispatched[0], (2, Rect::new(12.0, 12.0, 708.0, 876.0)));
        assert_eq!(dispatched[1], (1, Rect::new(732.0, 12.0, 696.0, 876.0)));
    }
}
