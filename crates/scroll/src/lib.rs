//! Virtualized scrolling.
//!
//! Native browser scroll events are jittery and fire outside the frame
//! loop, so the engine intercepts scroll-driving input and integrates its
//! own scroll position: input moves a *target* offset, and each frame the
//! reported position approaches the target by exponential smoothing.
//! Visual effects read the smoothed signal, never raw events.

pub mod engine;
pub mod input;

pub use engine::{
    ScrollCallback, ScrollConfig, ScrollDirection, ScrollEngine, ScrollState,
    ScrollSubscription, ScrollToOptions, SmoothingConfig,
};
pub use input::{ScrollInput, WheelDeltaMode};
