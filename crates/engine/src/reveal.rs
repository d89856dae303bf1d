//! Reveal tweens: trigger-driven visual state for a slice.
//!
//! A reveal binds a trigger window to a `from -> to` tween of opacity,
//! translation, and scale. Without scrub the tween plays forward on
//! enter and reverses on leave-back; with scrub the window progress
//! drives the playhead directly, optionally through a smoothing lag.

use common::easing::lerp;
use common::Easing;
use glam::Vec2;
use parking_lot::Mutex;
use scheduler::{FrameCallback, FrameHandle};
use std::sync::Arc;
use trigger::{EventCallback, ProgressCallback, Scrub, TriggerCallbacks, TriggerGuard, TriggerOptions};

const PLAYHEAD_EPSILON: f32 = 1e-3;

/// The visual properties a reveal animates. The slice's render callback
/// reads this and folds it into its own uniforms.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisualState {
    pub opacity: f32,
    /// CSS-pixel offset from the element's measured position.
    pub translate: Vec2,
    pub scale: f32,
}

impl Default for VisualState {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            translate: Vec2::ZERO,
            scale: 1.0,
        }
    }
}

impl VisualState {
    /// The conventional pre-reveal state: transparent and shifted down.
    pub fn hidden() -> Self {
        Self {
            opacity: 0.0,
            translate: Vec2::new(0.0, 40.0),
            scale: 1.0,
        }
    }

    pub fn lerp(from: &Self, to: &Self, t: f32) -> Self {
        Self {
            opacity: lerp(from.opacity, to.opacity, t),
            translate: Vec2::new(
                lerp(from.translate.x, to.translate.x, t),
                lerp(from.translate.y, to.translate.y, t),
            ),
            scale: lerp(from.scale, to.scale, t),
        }
    }
}

/// Configuration for one reveal.
#[derive(Clone, Debug)]
pub struct RevealOptions {
    pub from: VisualState,
    pub to: VisualState,
    /// Tween length in seconds; ignored when scrubbing.
    pub duration: f32,
    pub easing: Easing,
    pub trigger: TriggerOptions,
}

impl Default for RevealOptions {
    fn default() -> Self {
        Self {
            from: VisualState::hidden(),
            to: VisualState::default(),
            duration: 0.6,
            easing: Easing::default(),
            trigger: TriggerOptions::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Playback {
    Idle,
    Forward,
    Reverse,
}

/// Shared tween state, mutated by trigger callbacks and advanced by the
/// animate stage.
pub(crate) struct RevealInner {
    playhead: f32,
    /// Scrub target; meaningful only when scrub is active.
    target: f32,
    playback: Playback,
    scrub: Scrub,
    from: VisualState,
    to: VisualState,
    easing: Easing,
    duration: f32,
}

impl RevealInner {
    pub(crate) fn new(options: &RevealOptions) -> Self {
        Self {
            playhead: 0.0,
            target: 0.0,
            playback: Playback::Idle,
            scrub: options.trigger.scrub,
            from: options.from,
            to: options.to,
            easing: options.easing,
            duration: options.duration,
        }
    }

    /// Trigger callbacks wiring the window into this tween.
    pub(crate) fn callbacks(inner: &Arc<Mutex<Self>>) -> TriggerCallbacks {
        let scrub_active = inner.lock().scrub.is_active();
        if scrub_active {
            let inner = Arc::clone(inner);
            TriggerCallbacks::new().on_progress(Box::new(move |progress| {
                inner.lock().target = progress;
            }) as ProgressCallback)
        } else {
            let on_enter = {
                let inner = Arc::clone(inner);
                Box::new(move || inner.lock().playback = Playback::Forward) as EventCallback
            };
            let on_leave_back = {
                let inner = Arc::clone(inner);
                Box::new(move || inner.lock().playback = Playback::Reverse) as EventCallback
            };
            TriggerCallbacks::new()
                .on_enter(on_enter)
                .on_leave_back(on_leave_back)
        }
    }

    /// The per-frame callback advancing the playhead.
    pub(crate) fn animator(inner: &Arc<Mutex<Self>>) -> FrameCallback {
        let inner = Arc::clone(inner);
        Box::new(move |_, dt| inner.lock().advance(dt as f32))
    }

    fn advance(&mut self, dt: f32) {
        if self.scrub.is_active() {
            match self.scrub.smoothing() {
                None => self.playhead = self.target,
                Some(lag) if lag <= 0.0 => self.playhead = self.target,
                Some(lag) => {
                    let alpha = 1.0 - (-dt / lag).exp();
                    self.playhead += (self.target - self.playhead) * alpha;
                    if (self.target - self.playhead).abs() < PLAYHEAD_EPSILON {
                        self.playhead = self.target;
                    }
                }
            }
            return;
        }

        let step = if self.duration > 0.0 {
            dt / self.duration
        } else {
            1.0
        };
        match self.playback {
            Playback::Idle => {}
            Playback::Forward => {
                self.playhead = (self.playhead + step).min(1.0);
                if self.playhead >= 1.0 {
                    self.playback = Playback::Idle;
                }
            }
            Playback::Reverse => {
                self.playhead = (self.playhead - step).max(0.0);
                if self.playhead <= 0.0 {
                    self.playback = Playback::Idle;
                }
            }
        }
    }

    fn current(&self) -> VisualState {
        VisualState::lerp(&self.from, &self.to, self.easing.apply(self.playhead))
    }
}

/// Disposer and live view for one reveal. Dropping the handle does not
/// dispose; call [`RevealHandle::dispose`].
pub struct RevealHandle {
    inner: Arc<Mutex<RevealInner>>,
    guard: TriggerGuard,
    frame: FrameHandle,
}

impl RevealHandle {
    pub(crate) fn new(inner: Arc<Mutex<RevealInner>>, guard: TriggerGuard, frame: FrameHandle) -> Self {
        Self {
            inner,
            guard,
            frame,
        }
    }

    /// The tweened visual state as of the last animate stage.
    pub fn current(&self) -> VisualState {
        self.inner.lock().current()
    }

    pub fn playhead(&self) -> f32 {
        self.inner.lock().playhead
    }

    /// Unbind the trigger and stop the animator. Idempotent.
    pub fn dispose(&self) {
        self.guard.dispose();
        self.frame.cancel();
    }
}
