//! The trigger registry and per-frame dispatcher.
//!
//! All triggers are evaluated by one scheduler pass, in registration
//! order, once per frame. Callback fan-out is an explicit list of
//! (options, state, callbacks) entries, not ad hoc event propagation, so
//! the ordering guarantees hold.

use crate::machine::{transitions, Phase, TriggerEvent, TriggerState, WindowPixels};
use crate::options::TriggerOptions;
use crate::spec::{Boundary, TriggerError};
use common::{ElementId, Rect};
use indexmap::IndexMap;
use parking_lot::Mutex;
use scroll::ScrollState;
use std::sync::Arc;
use tracing::{debug, warn};

/// Event callback.
pub type EventCallback = Box<dyn FnMut() + Send>;
/// Progress callback; receives normalized window progress.
pub type ProgressCallback = Box<dyn FnMut(f32) + Send>;

/// Callbacks for one trigger. All optional.
#[derive(Default)]
pub struct TriggerCallbacks {
    pub on_enter: Option<EventCallback>,
    pub on_enter_back: Option<EventCallback>,
    pub on_leave: Option<EventCallback>,
    pub on_leave_back: Option<EventCallback>,
    /// Fires every tick while the trigger is active, regardless of scrub
    /// mode.
    pub on_progress: Option<ProgressCallback>,
}

impl TriggerCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_enter(mut self, callback: EventCallback) -> Self {
        self.on_enter = Some(callback);
        self
    }

    pub fn on_enter_back(mut self, callback: EventCallback) -> Self {
        self.on_enter_back = Some(callback);
        self
    }

    pub fn on_leave(mut self, callback: EventCallback) -> Self {
        self.on_leave = Some(callback);
        self
    }

    pub fn on_leave_back(mut self, callback: EventCallback) -> Self {
        self.on_leave_back = Some(callback);
        self
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }
}

/// Debug marker snapshot for one trigger, refreshed each tick when the
/// trigger's `markers` option is set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerMarkers {
    pub start_pixel: f32,
    pub end_pixel: f32,
    pub phase: Phase,
    pub progress: f32,
}

struct TriggerEntry {
    token: u64,
    options: TriggerOptions,
    start: Boundary,
    end: Boundary,
    state: TriggerState,
    /// Set when a `once` trigger has fired; suppresses all further
    /// evaluation for this registration.
    frozen: bool,
    callbacks: TriggerCallbacks,
    markers: Option<TriggerMarkers>,
}

struct SetInner {
    entries: IndexMap<ElementId, TriggerEntry>,
    dispatching: bool,
    next_token: u64,
}

/// Work for one trigger, collected under the lock and dispatched outside
/// it. Callbacks are checked out of the entry for the duration.
struct Dispatch {
    element: ElementId,
    token: u64,
    callbacks: TriggerCallbacks,
    events: smallvec::SmallVec<[TriggerEvent; 2]>,
    progress: Option<f32>,
}

/// The trigger set: owns every registered trigger and evaluates them all
/// in one deterministic pass per frame.
#[derive(Clone)]
pub struct TriggerSet {
    inner: Arc<Mutex<SetInner>>,
}

impl TriggerSet {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SetInner {
                entries: IndexMap::new(),
                dispatching: false,
                next_token: 0,
            })),
        }
    }

    /// Register a trigger for a tracked element. Boundary specs are parsed
    /// here so misconfiguration fails at registration, not mid-scroll.
    /// Registering an element that already has a trigger replaces it.
    pub fn register(
        &self,
        element: ElementId,
        options: TriggerOptions,
        callbacks: TriggerCallbacks,
    ) -> Result<TriggerGuard, TriggerError> {
        let (start, end) = options.boundaries()?;

        if options.pin {
            // Accepted on the config surface; the hold behavior is a
            // planned extension of the state machine.
            warn!(?element, "trigger `pin` option is not evaluated yet");
        }

        let mut inner = self.inner.lock();
        let token = inner.next_token;
        inner.next_token += 1;

        if inner.entries.contains_key(&element) {
            debug!(?element, "re-registering trigger, replacing prior entry");
        }
        inner.entries.insert(
            element,
            TriggerEntry {
                token,
                options,
                start,
                end,
                state: TriggerState::default(),
                frozen: false,
                callbacks,
                markers: None,
            },
        );

        Ok(TriggerGuard {
            inner: Arc::clone(&self.inner),
            element,
            token,
        })
    }

    /// Evaluate every trigger against the current frame's rects and scroll
    /// state. `rect_of` reads settled measurements from the rect tracker.
    ///
    /// Boundaries are re-resolved from the fresh rect on every call;
    /// nothing pixel-valued survives from the previous frame. An inert
    /// scroll state evaluates nothing: with no scrollable content, every
    /// trigger holds at `Before`.
    ///
    /// State is settled under the lock first, then callbacks run with the
    /// registry unlocked, so they may register, dispose, or query triggers
    /// freely. `rect_of` runs under the lock and must not touch the set.
    pub fn update(
        &self,
        rect_of: &dyn Fn(ElementId) -> Option<Rect>,
        scroll: &ScrollState,
        viewport_height: f32,
    ) {
        if scroll.is_inert() {
            return;
        }

        let mut dispatches: Vec<Dispatch> = Vec::new();
        {
            let mut inner = self.inner.lock();
            if inner.dispatching {
                return;
            }
            inner.dispatching = true;

            for (&element, entry) in inner.entries.iter_mut() {
                if entry.options.disabled || entry.frozen {
                    continue;
                }

                // Missing or unmounted element: no evaluation, no error. A
                // never-measured trigger stays Before indefinitely.
                let Some(rect) = rect_of(element) else {
                    continue;
                };

                let window = WindowPixels {
                    start: entry.start.resolve(&rect, scroll.position, viewport_height),
                    end: entry.end.resolve(&rect, scroll.position, viewport_height),
                };
                let (phase, progress) = window.classify(scroll.position);

                let events = transitions(entry.state.phase, phase);
                entry.state.phase = phase;
                entry.state.progress = progress;

                if events.contains(&TriggerEvent::Enter) {
                    entry.state.has_triggered_once = true;
                    // Once-mode freezes now but this tick's events are
                    // already collected, so a same-tick pass-through leave
                    // still fires.
                    if entry.options.once {
                        entry.frozen = true;
                    }
                }

                if entry.options.markers {
                    entry.markers = Some(TriggerMarkers {
                        start_pixel: window.start,
                        end_pixel: window.end,
                        phase,
                        progress,
                    });
                }

                let report_progress = phase == Phase::Active;
                if !events.is_empty() || report_progress {
                    dispatches.push(Dispatch {
                        element,
                        token: entry.token,
                        callbacks: std::mem::take(&mut entry.callbacks),
                        events,
                        progress: report_progress.then_some(progress),
                    });
                }
            }
        }

        for dispatch in dispatches.iter_mut() {
            for event in dispatch.events.clone() {
                let slot = match event {
                    TriggerEvent::Enter => &mut dispatch.callbacks.on_enter,
                    TriggerEvent::EnterBack => &mut dispatch.callbacks.on_enter_back,
                    TriggerEvent::Leave => &mut dispatch.callbacks.on_leave,
                    TriggerEvent::LeaveBack => &mut dispatch.callbacks.on_leave_back,
                };
                if let Some(callback) = slot.as_mut() {
                    callback();
                }
            }
            if let Some(progress) = dispatch.progress {
                if let Some(callback) = dispatch.callbacks.on_progress.as_mut() {
                    callback(progress);
                }
            }
        }

        let mut inner = self.inner.lock();
        inner.dispatching = false;
        for dispatch in dispatches {
            // Return the checked-out callbacks unless the registration was
            // replaced or disposed mid-dispatch.
            if let Some(entry) = inner.entries.get_mut(&dispatch.element) {
                if entry.token == dispatch.token {
                    entry.callbacks = dispatch.callbacks;
                }
            }
        }
    }

    /// Current state of an element's trigger.
    pub fn state_of(&self, element: ElementId) -> Option<TriggerState> {
        self.inner.lock().entries.get(&element).map(|e| e.state)
    }

    /// Latest debug markers, when the trigger was registered with
    /// `markers: true` and has been evaluated at least once.
    pub fn markers_of(&self, element: ElementId) -> Option<TriggerMarkers> {
        self.inner.lock().entries.get(&element).and_then(|e| e.markers)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Drop every trigger. Part of engine teardown.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }
}

impl Default for TriggerSet {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_if_token_matches(inner: &mut SetInner, element: ElementId, token: u64) {
    if inner
        .entries
        .get(&element)
        .is_some_and(|entry| entry.token == token)
    {
        inner.entries.shift_remove(&element);
    }
}

/// Disposer for a trigger registration. Idempotent; a stale guard (from a
/// replaced registration) never removes its replacement.
pub struct TriggerGuard {
    inner: Arc<Mutex<SetInner>>,
    element: ElementId,
    token: u64,
}

impl TriggerGuard {
    pub fn dispose(&self) {
        let mut inner = self.inner.lock();
        remove_if_token_matches(&mut inner, self.element, self.token);
    }

    pub fn element(&self) -> ElementId {
        self.element
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PMutex;
    use scroll::ScrollDirection;

    /// Element of height 200 whose top sits at document offset 1000.
    const DOC_TOP: f32 = 1000.0;
    const HEIGHT: f32 = 200.0;
    const VIEWPORT: f32 = 600.0;

    fn rect_at(scroll_position: f32) -> Rect {
        Rect::new(0.0, DOC_TOP - scroll_position, 300.0, HEIGHT)
    }

    fn scroll_state(position: f32) -> ScrollState {
        ScrollState {
            position,
            velocity: 0.0,
            limit: 10_000.0,
            direction: ScrollDirection::Still,
        }
    }

    fn recording_callbacks(log: &Arc<PMutex<Vec<String>>>) -> TriggerCallbacks {
        let push = |log: &Arc<PMutex<Vec<String>>>, tag: &'static str| {
            let log = Arc::clone(log);
            Box::new(move || log.lock().push(tag.to_string())) as EventCallback
        };
        TriggerCallbacks::new()
            .on_enter(push(log, "enter"))
            .on_enter_back(push(log, "enter_back"))
            .on_leave(push(log, "leave"))
            .on_leave_back(push(log, "leave_back"))
    }

    fn drive(set: &TriggerSet, positions: &[f32]) {
        for &position in positions {
            let state = scroll_state(position);
            set.update(&|_| Some(rect_at(position)), &state, VIEWPORT);
        }
    }

    #[test]
    fn test_boundary_pixels_and_progress_endpoints() {
        // start "top bottom" = T - V = 400, end "bottom top" = T + H = 1200.
        let set = TriggerSet::new();
        let element = ElementId::next();
        set.register(
            element,
            TriggerOptions {
                markers: true,
                ..Default::default()
            },
            TriggerCallbacks::new(),
        )
        .unwrap();

        drive(&set, &[400.0]);
        let markers = set.markers_of(element).unwrap();
        assert_eq!(markers.start_pixel, 400.0);
        assert_eq!(markers.end_pixel, 1200.0);
        assert_eq!(markers.phase, Phase::Active);
        assert_eq!(markers.progress, 0.0);

        drive(&set, &[1200.0]);
        let markers = set.markers_of(element).unwrap();
        assert_eq!(markers.phase, Phase::Active);
        assert_eq!(markers.progress, 1.0);
    }

    #[test]
    fn test_full_scroll_cycle_fires_all_events() {
        let set = TriggerSet::new();
        let element = ElementId::next();
        let log = Arc::new(PMutex::new(Vec::new()));
        set.register(
            element,
            TriggerOptions::default(),
            recording_callbacks(&log),
        )
        .unwrap();

        drive(&set, &[0.0, 800.0, 1500.0, 800.0, 0.0]);
        assert_eq!(
            *log.lock(),
            vec!["enter", "leave", "enter_back", "leave_back"]
        );
    }

    #[test]
    fn test_fast_jump_fires_pass_through_pair() {
        let set = TriggerSet::new();
        let element = ElementId::next();
        let log = Arc::new(PMutex::new(Vec::new()));
        set.register(
            element,
            TriggerOptions::default(),
            recording_callbacks(&log),
        )
        .unwrap();

        drive(&set, &[0.0, 5000.0, 0.0]);
        assert_eq!(
            *log.lock(),
            vec!["enter", "leave", "enter_back", "leave_back"]
        );
    }

    #[test]
    fn test_progress_is_monotonic_while_active() {
        let set = TriggerSet::new();
        let element = ElementId::next();
        let progress_log = Arc::new(PMutex::new(Vec::new()));
        let callbacks = {
            let progress_log = Arc::clone(&progress_log);
            TriggerCallbacks::new()
                .on_progress(Box::new(move |p| progress_log.lock().push(p)))
        };
        set.register(element, TriggerOptions::default(), callbacks)
            .unwrap();

        let positions: Vec<f32> = (0..=30).map(|i| 400.0 + i as f32 * 25.0).collect();
        drive(&set, &positions);

        let log = progress_log.lock();
        assert!(!log.is_empty());
        assert!(log.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(*log.first().unwrap(), 0.0);
    }

    #[test]
    fn test_once_fires_enter_exactly_once() {
        let set = TriggerSet::new();
        let element = ElementId::next();
        let log = Arc::new(PMutex::new(Vec::new()));
        set.register(
            element,
            TriggerOptions {
                once: true,
                ..Default::default()
            },
            recording_callbacks(&log),
        )
        .unwrap();

        // Cross the window repeatedly in both directions.
        drive(&set, &[0.0, 800.0, 0.0, 800.0, 1500.0, 0.0, 800.0]);

        let log = log.lock();
        assert_eq!(log.iter().filter(|e| *e == "enter").count(), 1);
        // Frozen after the first enter: nothing else ever fires.
        assert_eq!(*log, vec!["enter"]);

        let state = set.state_of(element).unwrap();
        assert!(state.has_triggered_once);
    }

    #[test]
    fn test_disabled_trigger_never_evaluates() {
        let set = TriggerSet::new();
        let element = ElementId::next();
        let log = Arc::new(PMutex::new(Vec::new()));
        set.register(
            element,
            TriggerOptions {
                disabled: true,
                ..Default::default()
            },
            recording_callbacks(&log),
        )
        .unwrap();

        drive(&set, &[0.0, 800.0, 1500.0]);
        assert!(log.lock().is_empty());
        assert_eq!(set.state_of(element).unwrap().phase, Phase::Before);
    }

    #[test]
    fn test_missing_rect_stays_before() {
        let set = TriggerSet::new();
        let element = ElementId::next();
        let log = Arc::new(PMutex::new(Vec::new()));
        set.register(
            element,
            TriggerOptions::default(),
            recording_callbacks(&log),
        )
        .unwrap();

        let state = scroll_state(800.0);
        set.update(&|_| None, &state, VIEWPORT);

        assert!(log.lock().is_empty());
        assert_eq!(set.state_of(element).unwrap().phase, Phase::Before);
    }

    #[test]
    fn test_resize_moves_boundaries_next_tick() {
        // The element reflows 500px further down the document between two
        // ticks; the window must follow immediately.
        let set = TriggerSet::new();
        let element = ElementId::next();
        set.register(
            element,
            TriggerOptions {
                markers: true,
                ..Default::default()
            },
            TriggerCallbacks::new(),
        )
        .unwrap();

        let state = scroll_state(800.0);
        set.update(&|_| Some(rect_at(800.0)), &state, VIEWPORT);
        assert_eq!(set.markers_of(element).unwrap().start_pixel, 400.0);

        let moved = Rect::new(0.0, DOC_TOP + 500.0 - 800.0, 300.0, HEIGHT);
        set.update(&|_| Some(moved), &state, VIEWPORT);
        assert_eq!(set.markers_of(element).unwrap().start_pixel, 900.0);
    }

    #[test]
    fn test_inert_scroll_keeps_triggers_before() {
        // An element visible in the viewport has start = T - V < 0, so it
        // would classify Active at position 0. With no scrollable content
        // nothing may evaluate at all.
        let set = TriggerSet::new();
        let element = ElementId::next();
        let log = Arc::new(PMutex::new(Vec::new()));
        set.register(element, TriggerOptions::default(), recording_callbacks(&log))
            .unwrap();

        let inert = ScrollState {
            position: 0.0,
            velocity: 0.0,
            limit: 0.0,
            direction: ScrollDirection::Still,
        };
        set.update(
            &|_| Some(Rect::new(0.0, 100.0, 300.0, 200.0)),
            &inert,
            VIEWPORT,
        );

        assert!(log.lock().is_empty());
        assert_eq!(set.state_of(element).unwrap().phase, Phase::Before);
    }

    #[test]
    fn test_queries_answer_from_inside_callbacks() {
        // State is settled before callbacks run, so a callback reading its
        // own trigger back through the set sees the new phase.
        let set = TriggerSet::new();
        let element = ElementId::next();
        let seen = Arc::new(PMutex::new(None));
        let callbacks = {
            let set = set.clone();
            let seen = Arc::clone(&seen);
            TriggerCallbacks::new().on_enter(Box::new(move || {
                *seen.lock() = set.state_of(element);
            }))
        };
        set.register(element, TriggerOptions::default(), callbacks)
            .unwrap();

        drive(&set, &[800.0]);

        let state = (*seen.lock()).expect("state readable during dispatch");
        assert_eq!(state.phase, Phase::Active);
    }

    #[test]
    fn test_dispose_from_inside_callback() {
        let set = TriggerSet::new();
        let element = ElementId::next();
        let guard = Arc::new(PMutex::new(None::<TriggerGuard>));
        let callbacks = {
            let guard = Arc::clone(&guard);
            TriggerCallbacks::new().on_enter(Box::new(move || {
                if let Some(guard) = guard.lock().as_ref() {
                    guard.dispose();
                }
            }))
        };
        *guard.lock() = Some(set.register(element, TriggerOptions::default(), callbacks).unwrap());

        drive(&set, &[800.0]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_reregister_replaces() {
        let set = TriggerSet::new();
        let element = ElementId::next();

        let first = set
            .register(element, TriggerOptions::default(), TriggerCallbacks::new())
            .unwrap();
        let _second = set
            .register(element, TriggerOptions::default(), TriggerCallbacks::new())
            .unwrap();
        assert_eq!(set.len(), 1);

        // Stale guard must not remove the replacement.
        first.dispose();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let set = TriggerSet::new();
        let element = ElementId::next();
        let guard = set
            .register(element, TriggerOptions::default(), TriggerCallbacks::new())
            .unwrap();

        guard.dispose();
        guard.dispose();
        assert!(set.is_empty());
    }

    #[test]
    fn test_invalid_spec_fails_registration() {
        let set = TriggerSet::new();
        let result = set.register(
            ElementId::next(),
            TriggerOptions {
                start: "top".to_string(),
                ..Default::default()
            },
            TriggerCallbacks::new(),
        );
        assert!(result.is_err());
        assert!(set.is_empty());
    }
}
