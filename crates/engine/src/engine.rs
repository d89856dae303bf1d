//! Engine construction and the per-frame stage pipeline.

use crate::reveal::{RevealHandle, RevealInner, RevealOptions};
use crate::stage;
use common::{ElementId, SyncError, SyncResult};
use compositor::{plan_frame, Compositor, CompositorError, FramePlan, RenderSlice, SliceGuard, SliceRegistry};
use parking_lot::Mutex;
use projection::Camera;
use scheduler::{FrameScheduler, HandleSet};
use scroll::{ScrollConfig, ScrollEngine, ScrollInput, ScrollState, ScrollToOptions};
use std::sync::Arc;
use tracing::{debug, warn};
use tracking::{scroll_limit, LayoutSource, RectTracker, TrackHandle};
use trigger::{TriggerCallbacks, TriggerGuard, TriggerOptions, TriggerSet};

/// Engine-wide tuning.
#[derive(Clone, Copy, Debug)]
pub struct EngineConfig {
    pub scroll: ScrollConfig,
    /// Extra CSS pixels around the viewport that still count as visible
    /// when culling slices.
    pub cull_margin: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scroll: ScrollConfig::default(),
            cull_margin: 0.0,
        }
    }
}

/// The engine: owns every pipeline component and keeps them in step.
///
/// Driving it is one call per display frame:
///
/// ```ignore
/// engine.frame(now_seconds);
/// ```
///
/// The layout source is the embedder's view of the document. Its rects
/// are viewport-relative at the current scroll position; the engine marks
/// every tracked element dirty whenever scroll moves, so measurements
/// follow the virtual transform with one frame of latency.
pub struct Engine {
    layout: Arc<dyn LayoutSource + Send + Sync>,
    scheduler: FrameScheduler,
    scroll: ScrollEngine,
    tracker: RectTracker,
    triggers: TriggerSet,
    slices: SliceRegistry,
    camera: Arc<Mutex<Camera>>,
    compositor: Option<Arc<Mutex<Compositor>>>,
    last_plan: Arc<Mutex<FramePlan>>,
    stages: HandleSet,
    config: EngineConfig,
}

impl Engine {
    /// Build a headless engine: the full pipeline minus the GPU stage.
    /// The frame plan is still produced each frame and readable through
    /// [`Engine::last_plan`].
    pub fn new(layout: Arc<dyn LayoutSource + Send + Sync>, config: EngineConfig) -> Self {
        Self::build(layout, config, None)
    }

    /// Build an engine that composites through the given compositor each
    /// frame.
    pub fn with_compositor(
        layout: Arc<dyn LayoutSource + Send + Sync>,
        config: EngineConfig,
        compositor: Compositor,
    ) -> Self {
        Self::build(layout, config, Some(Arc::new(Mutex::new(compositor))))
    }

    fn build(
        layout: Arc<dyn LayoutSource + Send + Sync>,
        config: EngineConfig,
        compositor: Option<Arc<Mutex<Compositor>>>,
    ) -> Self {
        let scheduler = FrameScheduler::new();
        let scroll = ScrollEngine::new(config.scroll);
        let tracker = RectTracker::new();
        let triggers = TriggerSet::new();
        let slices = SliceRegistry::new();
        let camera = Arc::new(Mutex::new(Camera::new(
            layout.viewport(),
            layout.device_pixel_ratio(),
        )));
        let last_plan = Arc::new(Mutex::new(FramePlan::default()));
        let mut stages = HandleSet::new();

        // Measure: settle dirty rects and refresh extents before anything
        // else reads them.
        {
            let layout = Arc::clone(&layout);
            let tracker = tracker.clone();
            let scroll = scroll.clone();
            let camera = Arc::clone(&camera);
            stages.push(scheduler.add(
                stage::MEASURE,
                Box::new(move |_, _| {
                    tracker.flush(layout.as_ref());
                    let viewport = layout.viewport();
                    {
                        let mut camera = camera.lock();
                        camera.viewport = viewport;
                        camera.device_pixel_ratio = layout.device_pixel_ratio();
                    }
                    scroll.set_extents(scroll_limit(layout.as_ref()), viewport.height);
                }),
            ));
        }

        // Scroll: advance the smoother. When the position moved, every
        // tracked rect is stale.
        {
            let scroll = scroll.clone();
            let tracker = tracker.clone();
            let mut last_position = 0.0f32;
            stages.push(scheduler.add(
                stage::SCROLL,
                Box::new(move |_, dt| {
                    scroll.tick(dt);
                    let position = scroll.state().position;
                    if position != last_position {
                        last_position = position;
                        tracker.mark_all_dirty();
                    }
                }),
            ));
        }

        // Trigger: classify every window against the fresh scroll state.
        {
            let triggers = triggers.clone();
            let tracker = tracker.clone();
            let scroll = scroll.clone();
            let camera = Arc::clone(&camera);
            stages.push(scheduler.add(
                stage::TRIGGER,
                Box::new(move |_, _| {
                    let state = scroll.state();
                    let viewport_height = camera.lock().viewport.height;
                    let tracker = &tracker;
                    triggers.update(&|element| tracker.rect_of(element), &state, viewport_height);
                }),
            ));
        }

        // Project: push settled rects into the slice registry and plan.
        {
            let slices = slices.clone();
            let tracker = tracker.clone();
            let camera = Arc::clone(&camera);
            let last_plan = Arc::clone(&last_plan);
            let margin = config.cull_margin;
            stages.push(scheduler.add(
                stage::PROJECT,
                Box::new(move |_, _| {
                    for element in slices.elements() {
                        if let Some(rect) = tracker.rect_of(element) {
                            slices.set_rect(element, rect);
                        }
                    }
                    let camera = *camera.lock();
                    *last_plan.lock() = plan_frame(&slices, &camera, margin);
                }),
            ));
        }

        // Composite: execute the plan. Context loss drops every slice and
        // waits for the embedder to re-register them.
        if let Some(compositor) = compositor.clone() {
            let slices = slices.clone();
            let camera = Arc::clone(&camera);
            let margin = config.cull_margin;
            stages.push(scheduler.add(
                stage::COMPOSITE,
                Box::new(move |_, _| {
                    let camera = *camera.lock();
                    let mut compositor = compositor.lock();
                    match compositor.composite(&slices, &camera, margin) {
                        Ok(()) => {}
                        Err(CompositorError::ContextLost) => {
                            compositor.recover(&slices);
                        }
                        Err(err) => warn!(%err, "composite failed"),
                    }
                }),
            ));
        }

        Self {
            layout,
            scheduler,
            scroll,
            tracker,
            triggers,
            slices,
            camera,
            compositor,
            last_plan,
            stages,
            config,
        }
    }

    /// Run one frame of the pipeline at wall-clock time `now` (seconds).
    pub fn frame(&self, now: f64) {
        self.scheduler.tick(now);
    }

    /// Track an element's rect. The handle is this registration's
    /// disposer.
    pub fn track(&self, element: ElementId) -> TrackHandle {
        self.tracker.track(element)
    }

    /// Register a scroll trigger on a tracked element.
    pub fn add_trigger(
        &self,
        element: ElementId,
        options: TriggerOptions,
        callbacks: TriggerCallbacks,
    ) -> SyncResult<TriggerGuard> {
        self.triggers
            .register(element, options, callbacks)
            .map_err(|err| SyncError::trigger(err.to_string()))
    }

    /// Register a render slice for an element at z-order 0.
    pub fn add_slice(&self, element: ElementId, render: RenderSlice) -> SliceGuard {
        let rect = self.tracker.rect_of(element).unwrap_or_default();
        self.slices.register(element, rect, 0, render)
    }

    /// Bind a reveal tween to an element: a trigger plus a per-frame
    /// animation driving a [`crate::reveal::VisualState`].
    pub fn reveal(&self, element: ElementId, options: RevealOptions) -> SyncResult<RevealHandle> {
        let inner = Arc::new(Mutex::new(RevealInner::new(&options)));

        let guard = self
            .triggers
            .register(element, options.trigger.clone(), RevealInner::callbacks(&inner))
            .map_err(|err| SyncError::trigger(err.to_string()))?;
        let frame = self.scheduler.add(stage::ANIMATE, RevealInner::animator(&inner));

        debug!(?element, "reveal bound");
        Ok(RevealHandle::new(inner, guard, frame))
    }

    /// Route a raw input event into the scroll engine.
    pub fn handle_input(&self, input: ScrollInput) {
        self.scroll.handle_input(input);
    }

    /// Programmatic scroll.
    pub fn scroll_to(&self, target: f32, options: ScrollToOptions) {
        self.scroll.scroll_to(target, options);
    }

    /// Current scroll state snapshot.
    pub fn scroll_state(&self) -> ScrollState {
        self.scroll.state()
    }

    /// The plan produced by the most recent frame.
    pub fn last_plan(&self) -> FramePlan {
        self.last_plan.lock().clone()
    }

    pub fn scroll(&self) -> &ScrollEngine {
        &self.scroll
    }

    pub fn tracker(&self) -> &RectTracker {
        &self.tracker
    }

    pub fn triggers(&self) -> &TriggerSet {
        &self.triggers
    }

    pub fn slices(&self) -> &SliceRegistry {
        &self.slices
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn camera(&self) -> Camera {
        *self.camera.lock()
    }

    pub fn layout(&self) -> &Arc<dyn LayoutSource + Send + Sync> {
        &self.layout
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn compositor(&self) -> Option<&Arc<Mutex<Compositor>>> {
        self.compositor.as_ref()
    }

    /// Tear the engine down: every stage, subscription, trigger, slice,
    /// and tracked rect is released. Safe to call more than once.
    pub fn teardown(&self) {
        self.stages.cancel_all();
        self.scroll.teardown();
        self.triggers.clear();
        self.slices.clear();
        self.tracker.clear();
        self.scheduler.clear();
        *self.last_plan.lock() = FramePlan::default();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.teardown();
    }
}
