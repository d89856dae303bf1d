//! Rect tracker: the arena of tracked elements.

use crate::source::LayoutSource;
use common::{ElementId, Rect};
use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

new_key_type! {
    /// Arena key for a tracked entry.
    pub struct TrackKey;
}

/// Size changes below this many CSS pixels do not count as a
/// re-measurement, matching resize-observer change detection.
const CHANGE_EPSILON: f32 = 0.01;

/// One tracked element.
struct TrackedEntry {
    element: ElementId,
    /// Latest measured rect; `None` before the first measurement and after
    /// the element unmounts.
    rect: Option<Rect>,
    /// Needs re-measurement at the next flush.
    dirty: bool,
    /// Bumped on every rect change, so consumers can detect
    /// re-measurement without comparing rects.
    generation: u64,
}

struct TrackerInner {
    entries: SlotMap<TrackKey, TrackedEntry>,
    /// Identity index: at most one entry per element.
    by_element: HashMap<ElementId, TrackKey>,
}

/// Measures tracked elements and keeps their rects current.
///
/// Tracking is idempotent: re-tracking an element replaces the prior
/// registration rather than accumulating duplicate observers. Measurement
/// is deferred to [`RectTracker::flush`], which the engine runs once per
/// frame at the measure stage.
#[derive(Clone)]
pub struct RectTracker {
    inner: Arc<RwLock<TrackerInner>>,
}

impl RectTracker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(TrackerInner {
                entries: SlotMap::with_key(),
                by_element: HashMap::new(),
            })),
        }
    }

    /// Start tracking an element. Installs one logical size observer for
    /// it; the embedder reports observed changes via
    /// [`RectTracker::mark_dirty`].
    pub fn track(&self, element: ElementId) -> TrackHandle {
        let mut inner = self.inner.write();

        // Replace, never duplicate.
        if let Some(&existing) = inner.by_element.get(&element) {
            debug!(?element, "re-tracking element, replacing prior entry");
            inner.entries.remove(existing);
        }

        let key = inner.entries.insert(TrackedEntry {
            element,
            rect: None,
            dirty: true,
            generation: 0,
        });
        inner.by_element.insert(element, key);

        TrackHandle {
            inner: Arc::clone(&self.inner),
            element,
            key,
        }
    }

    /// Stop tracking an element and remove its observer. No-op when the
    /// element is not tracked.
    pub fn untrack(&self, element: ElementId) {
        let mut inner = self.inner.write();
        if let Some(key) = inner.by_element.remove(&element) {
            inner.entries.remove(key);
            debug!(?element, "untracked element");
        }
    }

    /// Whether the element currently has a tracked entry.
    pub fn is_tracking(&self, element: ElementId) -> bool {
        self.inner.read().by_element.contains_key(&element)
    }

    /// Latest rect for an element, `None` before first measurement or when
    /// untracked.
    pub fn rect_of(&self, element: ElementId) -> Option<Rect> {
        let inner = self.inner.read();
        let key = *inner.by_element.get(&element)?;
        inner.entries.get(key)?.rect
    }

    /// Mark one element for re-measurement (size observer fired, content
    /// mutated, or an explicit refresh was requested).
    pub fn mark_dirty(&self, element: ElementId) {
        let mut inner = self.inner.write();
        if let Some(&key) = inner.by_element.get(&element) {
            if let Some(entry) = inner.entries.get_mut(key) {
                entry.dirty = true;
            }
        }
    }

    /// Mark every entry for re-measurement. Used on window resize, where
    /// any rect may have moved.
    pub fn mark_all_dirty(&self) {
        let mut inner = self.inner.write();
        for entry in inner.entries.values_mut() {
            entry.dirty = true;
        }
    }

    /// Re-measure all dirty entries against the layout source. Returns the
    /// number of entries whose rect actually changed.
    ///
    /// Runs once per frame at the measure stage; all downstream stages see
    /// settled rects.
    pub fn flush(&self, source: &dyn LayoutSource) -> usize {
        let mut inner = self.inner.write();
        let mut changed = 0;

        for entry in inner.entries.values_mut() {
            if !entry.dirty {
                continue;
            }
            entry.dirty = false;

            let measured = source.measure(entry.element);
            let is_change = match (entry.rect, measured) {
                (Some(previous), Some(current)) => {
                    (previous.x - current.x).abs() > CHANGE_EPSILON
                        || (previous.y - current.y).abs() > CHANGE_EPSILON
                        || (previous.width - current.width).abs() > CHANGE_EPSILON
                        || (previous.height - current.height).abs() > CHANGE_EPSILON
                }
                (None, None) => false,
                _ => true,
            };

            if is_change {
                entry.rect = measured;
                entry.generation += 1;
                changed += 1;
            }
        }

        if changed > 0 {
            trace!(changed, "rect flush re-measured entries");
        }
        changed
    }

    /// Number of tracked entries.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Drop every entry. Part of engine teardown.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.by_element.clear();
    }
}

impl Default for RectTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one tracked element.
///
/// Reads go through the identity, so a handle left over from a replaced
/// registration simply reads the replacement's data. `untrack` is
/// idempotent and safe during teardown.
pub struct TrackHandle {
    inner: Arc<RwLock<TrackerInner>>,
    element: ElementId,
    key: TrackKey,
}

impl TrackHandle {
    /// Latest measured rect, `None` before first measurement.
    pub fn current(&self) -> Option<Rect> {
        let inner = self.inner.read();
        let key = *inner.by_element.get(&self.element)?;
        inner.entries.get(key)?.rect
    }

    /// Measurement generation, bumped whenever the rect changes.
    pub fn generation(&self) -> u64 {
        let inner = self.inner.read();
        inner
            .by_element
            .get(&self.element)
            .and_then(|&key| inner.entries.get(key))
            .map(|entry| entry.generation)
            .unwrap_or(0)
    }

    /// The tracked element's identity.
    pub fn element(&self) -> ElementId {
        self.element
    }

    /// Whether this handle still refers to the live registration (false
    /// after untrack or replacement by a newer `track` call).
    pub fn is_live(&self) -> bool {
        self.inner
            .read()
            .by_element
            .get(&self.element)
            .is_some_and(|&key| key == self.key)
    }

    /// Stop tracking. Idempotent; only removes the entry this handle
    /// created, never a replacement.
    pub fn untrack(&self) {
        let mut inner = self.inner.write();
        let live = inner.by_element.get(&self.element) == Some(&self.key);
        if live {
            inner.by_element.remove(&self.element);
            inner.entries.remove(self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::test_support::FakeLayout;
    use common::Size;

    fn layout() -> FakeLayout {
        FakeLayout::new(Size::new(800.0, 600.0), 3000.0)
    }

    #[test]
    fn test_rect_is_none_before_first_measurement() {
        let tracker = RectTracker::new();
        let handle = tracker.track(ElementId::next());
        assert!(handle.current().is_none());
    }

    #[test]
    fn test_flush_measures_dirty_entries() {
        let tracker = RectTracker::new();
        let element = ElementId::next();
        let mut layout = layout();
        layout.place(element, Rect::new(0.0, 120.0, 300.0, 200.0));

        let handle = tracker.track(element);
        assert_eq!(tracker.flush(&layout), 1);
        assert_eq!(handle.current(), Some(Rect::new(0.0, 120.0, 300.0, 200.0)));
        assert_eq!(handle.generation(), 1);

        // Clean frame: nothing dirty, nothing measured.
        assert_eq!(tracker.flush(&layout), 0);
        assert_eq!(handle.generation(), 1);
    }

    #[test]
    fn test_sub_epsilon_change_is_ignored() {
        let tracker = RectTracker::new();
        let element = ElementId::next();
        let mut layout = layout();
        layout.place(element, Rect::new(0.0, 100.0, 300.0, 200.0));

        let handle = tracker.track(element);
        tracker.flush(&layout);

        layout.place(element, Rect::new(0.0, 100.005, 300.0, 200.0));
        tracker.mark_dirty(element);
        assert_eq!(tracker.flush(&layout), 0);
        assert_eq!(handle.generation(), 1);
    }

    #[test]
    fn test_mark_all_dirty_on_resize() {
        let tracker = RectTracker::new();
        let a = ElementId::next();
        let b = ElementId::next();
        let mut layout = layout();
        layout.place(a, Rect::new(0.0, 0.0, 100.0, 100.0));
        layout.place(b, Rect::new(0.0, 500.0, 100.0, 100.0));

        tracker.track(a);
        tracker.track(b);
        tracker.flush(&layout);

        // Reflow moves both elements.
        layout.place(a, Rect::new(0.0, 50.0, 100.0, 100.0));
        layout.place(b, Rect::new(0.0, 700.0, 100.0, 100.0));
        tracker.mark_all_dirty();
        assert_eq!(tracker.flush(&layout), 2);
        assert_eq!(tracker.rect_of(b), Some(Rect::new(0.0, 700.0, 100.0, 100.0)));
    }

    #[test]
    fn test_unmounted_element_measures_none() {
        let tracker = RectTracker::new();
        let element = ElementId::next();
        let mut layout = layout();
        layout.place(element, Rect::new(0.0, 0.0, 10.0, 10.0));

        let handle = tracker.track(element);
        tracker.flush(&layout);
        assert!(handle.current().is_some());

        layout.unmount(element);
        tracker.mark_dirty(element);
        tracker.flush(&layout);
        assert!(handle.current().is_none());
    }

    #[test]
    fn test_retrack_replaces_entry() {
        let tracker = RectTracker::new();
        let element = ElementId::next();

        let first = tracker.track(element);
        let second = tracker.track(element);
        assert_eq!(tracker.len(), 1);
        assert!(!first.is_live());
        assert!(second.is_live());
    }

    #[test]
    fn test_untrack_is_idempotent() {
        let tracker = RectTracker::new();
        let element = ElementId::next();
        let handle = tracker.track(element);

        handle.untrack();
        handle.untrack();
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_stale_handle_does_not_remove_replacement() {
        let tracker = RectTracker::new();
        let element = ElementId::next();

        let stale = tracker.track(element);
        let live = tracker.track(element);

        stale.untrack();
        assert!(live.is_live());
        assert_eq!(tracker.len(), 1);
    }
}
