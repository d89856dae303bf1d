//! The layout boundary.
//!
//! The engine never touches page layout directly; the embedder provides a
//! [`LayoutSource`] that can answer geometry queries. The source is only
//! consulted during the measure stage, never synchronously inside a render
//! pass.

use common::{ElementId, Rect, Size};

/// Read-only access to page geometry.
pub trait LayoutSource {
    /// Current viewport-relative bounding rect of an element, or `None`
    /// when the element is not mounted.
    fn measure(&self, element: ElementId) -> Option<Rect>;

    /// Viewport size in CSS pixels.
    fn viewport(&self) -> Size;

    /// Total scrollable content height in CSS pixels.
    fn content_height(&self) -> f32;

    /// Device pixel ratio, for CSS-to-device-pixel conversion.
    fn device_pixel_ratio(&self) -> f32 {
        1.0
    }
}

/// The maximum scrollable extent implied by a layout source: content
/// height minus viewport height. Deliberately unclamped — a non-positive
/// value puts the scroll engine in inert mode.
pub fn scroll_limit(source: &dyn LayoutSource) -> f32 {
    source.content_height() - source.viewport().height
}

pub mod test_support {
    //! A scriptable layout source for unit tests across the workspace.

    use super::*;
    use std::collections::HashMap;

    /// In-memory layout source with explicit element rects.
    pub struct FakeLayout {
        pub rects: HashMap<ElementId, Rect>,
        pub viewport: Size,
        pub content_height: f32,
        pub device_pixel_ratio: f32,
    }

    impl FakeLayout {
        pub fn new(viewport: Size, content_height: f32) -> Self {
            Self {
                rects: HashMap::new(),
                viewport,
                content_height,
                device_pixel_ratio: 1.0,
            }
        }

        pub fn place(&mut self, element: ElementId, rect: Rect) {
            self.rects.insert(element, rect);
        }

        pub fn unmount(&mut self, element: ElementId) {
            self.rects.remove(&element);
        }
    }

    impl LayoutSource for FakeLayout {
        fn measure(&self, element: ElementId) -> Option<Rect> {
            self.rects.get(&element).copied()
        }

        fn viewport(&self) -> Size {
            self.viewport
        }

        fn content_height(&self) -> f32 {
            self.content_height
        }

        fn device_pixel_ratio(&self) -> f32 {
            self.device_pixel_ratio
        }
    }
}
