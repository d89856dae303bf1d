//! The orchestration layer: one engine owning the frame pipeline.
//!
//! The engine wires the rect tracker, virtual scroll, trigger set, and
//! slice compositor into a single per-frame pipeline with a fixed stage
//! order: measure, scroll, trigger, animate, project, composite. Each
//! stage is a scheduler callback at a fixed priority, so embedder
//! callbacks can interleave at any point by picking a priority between
//! stages.

pub mod engine;
pub mod reveal;

pub use engine::{Engine, EngineConfig};
pub use reveal::{RevealHandle, RevealOptions, VisualState};

/// Stage priorities for the frame pipeline. Gaps are deliberate so
/// embedder callbacks can slot between stages.
pub mod stage {
    use scheduler::Priority;

    /// Re-measure dirty rects and refresh viewport extents.
    pub const MEASURE: Priority = 0;
    /// Advance the virtual scroll smoother.
    pub const SCROLL: Priority = 100;
    /// Evaluate trigger windows against the new scroll state.
    pub const TRIGGER: Priority = 200;
    /// Advance reveal tweens.
    pub const ANIMATE: Priority = 300;
    /// Sync slice rects and plan the frame.
    pub const PROJECT: Priority = 400;
    /// Execute the plan on the GPU.
    pub const COMPOSITE: Priority = 500;
}
