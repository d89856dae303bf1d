//! Shared-canvas compositing.
//!
//! Many independent mini-scenes share one GPU context: each registered
//! slice is scissored to its tracked element's screen rectangle and
//! rendered by its own callback, so dozens of visuals cost one context and
//! one command submission instead of one context each.
//!
//! Planning is pure ([`plan::plan_frame`] needs no device) and execution
//! is effectful ([`executor::Compositor`]), so culling and ordering are
//! unit-testable without a GPU.

pub mod executor;
pub mod plan;
pub mod slices;
pub mod uniforms;

pub use executor::{Compositor, CompositorError, CompositorStats, SliceFrame};
pub use plan::{plan_frame, FramePlan, SliceDraw};
pub use slices::{RenderSlice, SliceGuard, SliceRegistry};
pub use uniforms::SliceUniforms;
