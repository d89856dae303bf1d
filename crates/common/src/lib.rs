//! Shared primitives for the scroll-sync engine.

pub mod easing;
pub mod error;
pub mod geometry;
pub mod identity;

pub use easing::Easing;
pub use error::{SyncError, SyncResult};
pub use geometry::{PixelRect, Point, Rect, Size};
pub use identity::ElementId;
