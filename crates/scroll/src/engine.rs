//! The virtual scroll engine.

use crate::input::{ScrollInput, WheelDeltaMode};
use common::easing::lerp;
use common::Easing;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Position changes below this many CSS pixels snap to the target instead
/// of asymptoting forever.
const SNAP_EPSILON: f32 = 0.01;

/// Movement below this many CSS pixels per tick counts as still.
const DIRECTION_EPSILON: f32 = 1e-3;

/// Smoothing filter constants, expressed as time constants in seconds so
/// behavior is frame-rate independent. Both default to roughly 100 ms.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SmoothingConfig {
    /// Time constant for the position filter.
    pub position: f32,
    /// Time constant for the velocity low-pass filter.
    pub velocity: f32,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            position: 0.1,
            velocity: 0.1,
        }
    }
}

/// Scroll engine configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScrollConfig {
    pub smoothing: SmoothingConfig,
    /// Touch deltas feel slower than wheel deltas; scale them up.
    pub touch_multiplier: f32,
    /// CSS pixels per wheel line (for `WheelDeltaMode::Line`).
    pub wheel_line_height: f32,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            smoothing: SmoothingConfig::default(),
            touch_multiplier: 2.0,
            wheel_line_height: 16.0,
        }
    }
}

/// Direction of the most recent scroll movement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrollDirection {
    /// Toward larger offsets (down the page).
    Forward,
    /// Toward smaller offsets.
    Backward,
    #[default]
    Still,
}

/// Snapshot of the scroll signal, updated once per frame tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollState {
    /// Virtual scroll offset in CSS pixels. May differ transiently from
    /// native scroll while smoothing.
    pub position: f32,
    /// Low-pass-filtered derivative of position, CSS pixels per second.
    pub velocity: f32,
    /// Maximum scrollable extent; non-positive means nothing to scroll.
    pub limit: f32,
    pub direction: ScrollDirection,
}

impl ScrollState {
    /// True when there is no scrollable content. Scroll-dependent UI (a
    /// custom scrollbar, say) hides itself rather than dividing by zero.
    pub fn is_inert(&self) -> bool {
        self.limit <= 0.0
    }

    /// Normalized scroll progress in `[0, 1]`, or 0 when inert.
    pub fn progress(&self) -> f32 {
        if self.is_inert() {
            0.0
        } else {
            (self.position / self.limit).clamp(0.0, 1.0)
        }
    }
}

/// Options for a programmatic scroll.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollToOptions {
    /// Eased transition over this many seconds. `None` retargets the
    /// smoother instead.
    pub duration: Option<f32>,
    #[serde(default)]
    pub easing: Easing,
    /// Skip interpolation entirely (drag-scroll).
    #[serde(default)]
    pub immediate: bool,
}

struct ScrollAnimation {
    from: f32,
    to: f32,
    elapsed: f32,
    duration: f32,
    easing: Easing,
}

/// Per-frame scroll state callback.
pub type ScrollCallback = Box<dyn FnMut(&ScrollState) + Send>;

struct Subscriber {
    cancelled: Arc<AtomicBool>,
    callback: ScrollCallback,
}

struct EngineInner {
    config: ScrollConfig,
    position: f32,
    target: f32,
    velocity: f32,
    limit: f32,
    viewport_height: f32,
    direction: ScrollDirection,
    animation: Option<ScrollAnimation>,
    last_touch_y: Option<f32>,
    subscribers: Vec<Subscriber>,
    /// True while `tick` notifies subscribers with the lock released.
    notifying: bool,
    /// Bumped by `teardown`, so a teardown from inside a subscriber
    /// callback discards the in-flight subscriber list.
    epoch: u64,
}

impl EngineInner {
    fn state(&self) -> ScrollState {
        ScrollState {
            position: self.position,
            velocity: self.velocity,
            limit: self.limit,
            direction: self.direction,
        }
    }

    fn clamp_target(&mut self) {
        self.target = self.target.clamp(0.0, self.limit.max(0.0));
    }
}

/// The process-wide scroll engine. Components borrow it; the engine
/// context owns it and tears it down at application shutdown.
#[derive(Clone)]
pub struct ScrollEngine {
    inner: Arc<Mutex<EngineInner>>,
}

impl ScrollEngine {
    pub fn new(config: ScrollConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EngineInner {
                config,
                position: 0.0,
                target: 0.0,
                velocity: 0.0,
                limit: 0.0,
                viewport_height: 0.0,
                direction: ScrollDirection::Still,
                animation: None,
                last_touch_y: None,
                subscribers: Vec::new(),
                notifying: false,
                epoch: 0,
            })),
        }
    }

    /// Update the scrollable extents (content reflow or window resize).
    /// `limit` is content height minus viewport height, unclamped.
    pub fn set_extents(&self, limit: f32, viewport_height: f32) {
        let mut inner = self.inner.lock();
        let was_inert = inner.limit <= 0.0;
        inner.limit = limit;
        inner.viewport_height = viewport_height;
        if limit <= 0.0 && !was_inert {
            debug!(limit, "scroll engine became inert");
        }
        inner.clamp_target();
    }

    /// Current scroll state snapshot.
    pub fn state(&self) -> ScrollState {
        self.inner.lock().state()
    }

    /// Subscribe to per-frame state updates. The returned subscription's
    /// `cancel` is idempotent. Callbacks run with the engine unlocked and
    /// may call back into it; a re-entrant `tick` is a no-op.
    pub fn subscribe(&self, callback: ScrollCallback) -> ScrollSubscription {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.inner.lock().subscribers.push(Subscriber {
            cancelled: Arc::clone(&cancelled),
            callback,
        });
        ScrollSubscription { cancelled }
    }

    /// Feed an intercepted input event. User input interrupts any running
    /// programmatic scroll.
    pub fn handle_input(&self, input: ScrollInput) {
        let mut inner = self.inner.lock();
        if inner.limit <= 0.0 {
            return;
        }

        match input {
            ScrollInput::Wheel { delta, mode } => {
                let pixels = match mode {
                    WheelDeltaMode::Pixel => delta,
                    WheelDeltaMode::Line => delta * inner.config.wheel_line_height,
                    WheelDeltaMode::Page => delta * inner.viewport_height,
                };
                inner.animation = None;
                inner.target += pixels;
            }
            ScrollInput::TouchStart { y } => {
                inner.animation = None;
                inner.last_touch_y = Some(y);
            }
            ScrollInput::TouchMove { y } => {
                if let Some(last) = inner.last_touch_y {
                    let delta = (last - y) * inner.config.touch_multiplier;
                    inner.target += delta;
                }
                inner.last_touch_y = Some(y);
            }
            ScrollInput::TouchEnd => {
                inner.last_touch_y = None;
            }
            ScrollInput::Drag { target } => {
                inner.animation = None;
                inner.target = target;
                inner.clamp_target();
                inner.position = inner.target;
            }
        }
        inner.clamp_target();
    }

    /// Programmatic scroll to an absolute offset.
    pub fn scroll_to(&self, target: f32, options: ScrollToOptions) {
        let mut inner = self.inner.lock();
        if inner.limit <= 0.0 {
            return;
        }

        inner.target = target;
        inner.clamp_target();
        let clamped = inner.target;

        if options.immediate {
            inner.animation = None;
            inner.position = clamped;
            return;
        }

        match options.duration {
            Some(duration) if duration > 0.0 => {
                inner.animation = Some(ScrollAnimation {
                    from: inner.position,
                    to: clamped,
                    elapsed: 0.0,
                    duration,
                    easing: options.easing,
                });
            }
            // Zero/absent duration: let the smoother catch up.
            _ => inner.animation = None,
        }
    }

    /// Advance the scroll signal by `dt` seconds and notify subscribers.
    /// Called once per frame at the scroll stage.
    pub fn tick(&self, dt: f64) {
        let mut inner = self.inner.lock();
        if inner.notifying {
            // Re-entrant tick from inside a subscriber is a no-op.
            return;
        }
        let dt = dt as f32;
        let previous = inner.position;

        if inner.limit <= 0.0 {
            // Inert: nothing to scroll, report a zeroed signal.
            inner.position = 0.0;
            inner.target = 0.0;
            inner.velocity = 0.0;
            inner.direction = ScrollDirection::Still;
            inner.animation = None;
        } else if let Some(animation) = inner.animation.as_mut() {
            animation.elapsed += dt;
            let t = (animation.elapsed / animation.duration).clamp(0.0, 1.0);
            let eased = animation.easing.apply(t);
            let (from, to) = (animation.from, animation.to);
            let finished = t >= 1.0;
            inner.position = lerp(from, to, eased);
            if finished {
                inner.position = to;
                inner.animation = None;
                trace!(to, "programmatic scroll finished");
            }
        } else if dt > 0.0 {
            let tau = inner.config.smoothing.position.max(1e-4);
            let alpha = 1.0 - (-dt / tau).exp();
            let step = (inner.target - inner.position) * alpha;
            inner.position += step;
            if (inner.target - inner.position).abs() < SNAP_EPSILON {
                inner.position = inner.target;
            }
        }

        // Velocity: low-pass-filtered derivative.
        if dt > 0.0 {
            let raw = (inner.position - previous) / dt;
            let tau = inner.config.smoothing.velocity.max(1e-4);
            let beta = 1.0 - (-dt / tau).exp();
            inner.velocity += (raw - inner.velocity) * beta;
        }

        let moved = inner.position - previous;
        inner.direction = if moved > DIRECTION_EPSILON {
            ScrollDirection::Forward
        } else if moved < -DIRECTION_EPSILON {
            ScrollDirection::Backward
        } else {
            ScrollDirection::Still
        };

        // Notify with the lock released so subscribers can call back into
        // the engine (read state, feed input, even tear down).
        let state = inner.state();
        let epoch = inner.epoch;
        let mut running = std::mem::take(&mut inner.subscribers);
        inner.notifying = true;
        drop(inner);

        running.retain(|s| !s.cancelled.load(Ordering::Relaxed));
        for subscriber in running.iter_mut() {
            (subscriber.callback)(&state);
        }

        let mut inner = self.inner.lock();
        inner.notifying = false;
        if inner.epoch == epoch {
            // Subscriptions made during notification landed in the fresh
            // list; keep them behind the existing ones.
            let added = std::mem::replace(&mut inner.subscribers, running);
            inner.subscribers.extend(added);
            inner
                .subscribers
                .retain(|s| !s.cancelled.load(Ordering::Relaxed));
        }
    }

    /// Drop all subscribers and reset the signal. Part of engine teardown.
    pub fn teardown(&self) {
        let mut inner = self.inner.lock();
        inner.epoch += 1;
        inner.subscribers.clear();
        inner.animation = None;
        inner.position = 0.0;
        inner.target = 0.0;
        inner.velocity = 0.0;
        inner.direction = ScrollDirection::Still;
    }
}

impl Default for ScrollEngine {
    fn default() -> Self {
        Self::new(ScrollConfig::default())
    }
}

/// Disposer for a scroll subscription.
#[derive(Clone)]
pub struct ScrollSubscription {
    cancelled: Arc<AtomicBool>,
}

impl ScrollSubscription {
    /// Cancel the subscription. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}
