//! Scroll-driving input.

use serde::{Deserialize, Serialize};

/// Unit of a wheel event's delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WheelDeltaMode {
    Pixel,
    Line,
    Page,
}

/// An intercepted input event that drives the virtual scroll position.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ScrollInput {
    /// Wheel delta; positive scrolls forward (down the page).
    Wheel { delta: f32, mode: WheelDeltaMode },
    /// Finger down at viewport-relative `y`.
    TouchStart { y: f32 },
    /// Finger moved to `y`; dragging the content up scrolls forward.
    TouchMove { y: f32 },
    TouchEnd,
    /// Drag-scroll (e.g. a scrollbar thumb) jumping straight to a target
    /// offset; applied without interpolation.
    Drag { target: f32 },
}
