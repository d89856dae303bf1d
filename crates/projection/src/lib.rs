//! CSS-rect to GPU world-space projection.
//!
//! The shared canvas uses an orthographic camera whose visible world size
//! equals the CSS pixel viewport, so one world unit is one CSS pixel and a
//! tracked element's rect converts to a world transform with nothing but a
//! recentering and a Y flip. Everything here is a pure function of its
//! inputs; the compositor applies the results.

use common::{PixelRect, Rect, Size};
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// The viewport-matched orthographic camera.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    /// Viewport size in CSS pixels; also the camera's visible world size.
    pub viewport: Size,
    /// CSS-to-device pixel scale, used only when producing scissor rects.
    pub device_pixel_ratio: f32,
}

impl Camera {
    pub fn new(viewport: Size, device_pixel_ratio: f32) -> Self {
        Self {
            viewport,
            device_pixel_ratio,
        }
    }

    /// Orthographic view-projection matrix: world origin at the viewport
    /// center, +Y up, world units equal to CSS pixels.
    pub fn view_projection(&self) -> Mat4 {
        let half_width = self.viewport.width / 2.0;
        let half_height = self.viewport.height / 2.0;
        Mat4::orthographic_rh(
            -half_width,
            half_width,
            -half_height,
            half_height,
            -1000.0,
            1000.0,
        )
    }
}

/// A tracked rect projected into camera-centered world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldTransform {
    pub position: Vec3,
    pub scale: Vec3,
    /// False when the rect lies entirely outside the viewport band; the
    /// compositor skips rendering such slices.
    pub visible: bool,
}

impl WorldTransform {
    /// Model matrix for a unit quad centered at the origin.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position) * Mat4::from_scale(self.scale)
    }
}

/// Project a viewport-relative rect into world space.
///
/// The rect center maps from top-left CSS coordinates to camera-centered
/// world coordinates; Y inverts because CSS Y grows downward and world Y
/// grows upward. Scale carries the rect size directly since world units
/// equal CSS pixels. `margin` widens the visibility band for predictive
/// loading.
pub fn project(rect: &Rect, camera: &Camera, margin: f32) -> WorldTransform {
    let center = rect.center();
    WorldTransform {
        position: Vec3::new(
            center.x - camera.viewport.width / 2.0,
            camera.viewport.height / 2.0 - center.y,
            0.0,
        ),
        scale: Vec3::new(rect.width, rect.height, 1.0),
        visible: rect.intersects_viewport(camera.viewport.height, margin),
    }
}

/// The rect's device-pixel footprint on the surface, for scissor and
/// viewport calls. `None` when the rect has no on-surface area.
pub fn physical_viewport_rect(rect: &Rect, camera: &Camera) -> Option<PixelRect> {
    let scale = camera.device_pixel_ratio;
    let surface_width = (camera.viewport.width * scale).round() as u32;
    let surface_height = (camera.viewport.height * scale).round() as u32;
    rect.to_pixel_rect(scale)
        .clamp_to_surface(surface_width, surface_height)
}
