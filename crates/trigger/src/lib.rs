//! Scroll-triggered activation windows.
//!
//! A trigger watches one tracked element and reports where the scroll
//! position sits relative to an activation window derived from edge specs
//! like `"top bottom"` (element top meets viewport bottom). Per frame the
//! trigger set re-resolves every window from the element's *fresh* rect —
//! boundaries are never cached across frames, so layout changes cannot
//! desynchronize re-entrant elements — and advances a small state machine
//! that fires enter/leave callbacks and continuous progress.
//!
//! The machine only reports; it never animates. Scrub mode is a signal to
//! the consumer that progress should drive a timeline position directly.

pub mod machine;
pub mod options;
pub mod set;
pub mod spec;

pub use machine::{Phase, TriggerEvent, TriggerState, WindowPixels};
pub use options::{Scrub, TriggerOptions};
pub use set::{
    EventCallback, ProgressCallback, TriggerCallbacks, TriggerGuard, TriggerMarkers,
    TriggerSet,
};
pub use spec::{Boundary, Edge, TriggerError};
