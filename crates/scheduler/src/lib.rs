//! Single-loop frame scheduling.
//!
//! Exactly one frame loop exists per engine; every per-frame consumer
//! registers a callback with an integer priority, and each
//! [`FrameScheduler::tick`] dispatches all callbacks in ascending priority
//! order (ties broken by registration order). This is what enforces the
//! measure → scroll → trigger → project → composite ordering: stages are
//! priorities, not call sites.

use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

/// Priority for a frame callback; lower runs first.
pub type Priority = i32;

/// A registered frame callback: `(time, delta_time)` in seconds. Delta is
/// wall-clock and unbounded (a backgrounded tab produces a large delta);
/// consumers clamp internally when they need to.
pub type FrameCallback = Box<dyn FnMut(f64, f64) + Send>;

struct Entry {
    priority: Priority,
    seq: u64,
    cancelled: Arc<AtomicBool>,
    callback: FrameCallback,
}

struct SchedulerInner {
    entries: Vec<Entry>,
    next_seq: u64,
    last_tick: Option<f64>,
    /// Entries added while a tick is dispatching; they join the ordered
    /// list afterwards and first run on the next tick.
    pending: Vec<Entry>,
    dispatching: bool,
}

/// The frame scheduler.
#[derive(Clone)]
pub struct FrameScheduler {
    inner: Arc<Mutex<SchedulerInner>>,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SchedulerInner {
                entries: Vec::new(),
                next_seq: 0,
                last_tick: None,
                pending: Vec::new(),
                dispatching: false,
            })),
        }
    }

    /// Register a callback at the given priority. The returned handle's
    /// `cancel` is idempotent and safe to call from within any callback
    /// (removal is deferred to the end of the tick).
    pub fn add(&self, priority: Priority, callback: FrameCallback) -> FrameHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut inner = self.inner.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let entry = Entry {
            priority,
            seq,
            cancelled: Arc::clone(&cancelled),
            callback,
        };

        if inner.dispatching {
            inner.pending.push(entry);
        } else {
            inner.entries.push(entry);
            inner.entries.sort_by_key(|e| (e.priority, e.seq));
        }

        FrameHandle { cancelled }
    }

    /// Run one frame at wall-clock time `now` (seconds). The first tick
    /// reports a zero delta.
    pub fn tick(&self, now: f64) {
        let (mut running, dt) = {
            let mut inner = self.inner.lock();
            if inner.dispatching {
                // Re-entrant tick from inside a callback is a no-op.
                return;
            }
            inner.dispatching = true;
            let dt = inner.last_tick.map_or(0.0, |last| now - last);
            inner.last_tick = Some(now);
            (std::mem::take(&mut inner.entries), dt)
        };

        trace!(now, dt, callbacks = running.len(), "frame tick");

        for entry in running.iter_mut() {
            if !entry.cancelled.load(Ordering::Relaxed) {
                (entry.callback)(now, dt);
            }
        }

        let mut inner = self.inner.lock();
        inner.dispatching = false;
        running.retain(|e| !e.cancelled.load(Ordering::Relaxed));
        inner.entries = running;
        let pending: Vec<Entry> = std::mem::take(&mut inner.pending);
        inner
            .entries
            .extend(pending.into_iter().filter(|e| !e.cancelled.load(Ordering::Relaxed)));
        inner.entries.sort_by_key(|e| (e.priority, e.seq));
    }

    /// Number of live callbacks.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock();
        let live = |e: &Entry| !e.cancelled.load(Ordering::Relaxed);
        inner.entries.iter().filter(|e| live(e)).count()
            + inner.pending.iter().filter(|e| live(e)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every callback. Part of engine teardown.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.pending.clear();
    }
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Disposer for a frame callback.
#[derive(Clone)]
pub struct FrameHandle {
    cancelled: Arc<AtomicBool>,
}

impl FrameHandle {
    /// Cancel the callback. Idempotent; actual removal happens at the end
    /// of the current tick if one is running.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Collects handles so a component can cancel everything it registered on
/// one exit path.
#[derive(Default)]
pub struct HandleSet {
    handles: SmallVec<[FrameHandle; 4]>,
}

impl HandleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: FrameHandle) {
        self.handles.push(handle);
    }

    /// Cancel every collected handle. Idempotent.
    pub fn cancel_all(&self) {
        for handle in &self.handles {
            handle.cancel();
        }
    }
}

impl Drop for HandleSet {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PMutex;

    #[test]
    fn test_priority_order() {
        let scheduler = FrameScheduler::new();
        let order = Arc::new(PMutex::new(Vec::new()));

        for (priority, tag) in [(30, "c"), (10, "a"), (20, "b")] {
            let order = Arc::clone(&order);
            scheduler.add(
                priority,
                Box::new(move |_, _| order.lock().push(tag)),
            );
        }

        scheduler.tick(0.0);
        assert_eq!(*order.lock(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_ties_run_in_registration_order() {
        let scheduler = FrameScheduler::new();
        let order = Arc::new(PMutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            scheduler.add(0, Box::new(move |_, _| order.lock().push(tag)));
        }

        scheduler.tick(0.0);
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_delta_time() {
        let scheduler = FrameScheduler::new();
        let deltas = Arc::new(PMutex::new(Vec::new()));
        {
            let deltas = Arc::clone(&deltas);
            scheduler.add(0, Box::new(move |_, dt| deltas.lock().push(dt)));
        }

        scheduler.tick(1.0);
        scheduler.tick(1.016);
        scheduler.tick(3.0); // backgrounded tab: large delta passed through

        let deltas = deltas.lock();
        assert_eq!(deltas[0], 0.0);
        assert!((deltas[1] - 0.016).abs() < 1e-9);
        assert!((deltas[2] - 1.984).abs() < 1e-9);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let scheduler = FrameScheduler::new();
        let count = Arc::new(PMutex::new(0));
        let handle = {
            let count = Arc::clone(&count);
            scheduler.add(0, Box::new(move |_, _| *count.lock() += 1))
        };

        scheduler.tick(0.0);
        handle.cancel();
        handle.cancel();
        scheduler.tick(0.016);

        assert_eq!(*count.lock(), 1);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_cancel_from_within_callback() {
        let scheduler = FrameScheduler::new();
        let count = Arc::new(PMutex::new(0));
        let handle_slot: Arc<PMutex<Option<FrameHandle>>> = Arc::new(PMutex::new(None));

        let handle = {
            let count = Arc::clone(&count);
            let handle_slot = Arc::clone(&handle_slot);
            scheduler.add(
                0,
                Box::new(move |_, _| {
                    *count.lock() += 1;
                    if let Some(handle) = handle_slot.lock().as_ref() {
                        handle.cancel();
                    }
                }),
            )
        };
        *handle_slot.lock() = Some(handle);

        scheduler.tick(0.0);
        scheduler.tick(0.016);
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_add_during_dispatch_runs_next_tick() {
        let scheduler = FrameScheduler::new();
        let scheduler2 = FrameScheduler {
            inner: Arc::clone(&scheduler.inner),
        };
        let count = Arc::new(PMutex::new(0));

        {
            let count = Arc::clone(&count);
            let mut registered = false;
            scheduler.add(
                0,
                Box::new(move |_, _| {
                    // Register a one-shot from inside the tick, once.
                    if !registered {
                        registered = true;
                        let count = Arc::clone(&count);
                        scheduler2.add(0, Box::new(move |_, _| *count.lock() += 10));
                    }
                }),
            );
        }

        scheduler.tick(0.0);
        assert_eq!(*count.lock(), 0);
        scheduler.tick(0.016);
        assert_eq!(*count.lock(), 10);
    }

    #[test]
    fn test_handle_set_cancels_on_drop() {
        let scheduler = FrameScheduler::new();
        {
            let mut set = HandleSet::new();
            set.push(scheduler.add(0, Box::new(|_, _| {})));
            set.push(scheduler.add(1, Box::new(|_, _| {})));
            assert_eq!(scheduler.len(), 2);
        }
        assert_eq!(scheduler.len(), 0);
    }
}
