//! Element geometry tracking.
//!
//! [`RectTracker`] keeps a current [`common::Rect`] for every tracked page
//! element. Measurement is batched: layout-affecting signals only mark
//! entries dirty, and the next frame's measure stage re-measures them
//! through the embedder's [`LayoutSource`]. Nothing here writes back to
//! layout.

pub mod source;
pub mod tracker;

pub use source::{scroll_limit, LayoutSource};
pub use tracker::{RectTracker, TrackHandle};
