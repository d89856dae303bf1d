//! Per-slice camera uniforms.

use bytemuck::{Pod, Zeroable};
use projection::{Camera, WorldTransform};

/// Uniform block giving a slice its scoped camera: the shared orthographic
/// view-projection plus the slice's own model matrix. Slices upload this
/// themselves; the compositor guarantees nothing about uniform state
/// between slice calls.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct SliceUniforms {
    pub view_projection: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
}

impl SliceUniforms {
    pub fn new(camera: &Camera, world: &WorldTransform) -> Self {
        Self {
            view_projection: camera.view_projection().to_cols_array_2d(),
            model: world.model_matrix().to_cols_array_2d(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Rect, Size};
    use glam::Vec4;
    use projection::project;

    #[test]
    fn test_viewport_rect_covers_clip_space() {
        // A slice matching the viewport should project a unit quad to the
        // full clip-space square.
        let camera = Camera::new(Size::new(800.0, 600.0), 1.0);
        let world = project(&Rect::new(0.0, 0.0, 800.0, 600.0), &camera, 0.0);
        let uniforms = SliceUniforms::new(&camera, &world);

        let view_projection = glam::Mat4::from_cols_array_2d(&uniforms.view_projection);
        let model = glam::Mat4::from_cols_array_2d(&uniforms.model);
        let corner = view_projection * model * Vec4::new(0.5, 0.5, 0.0, 1.0);

        assert!((corner.x - 1.0).abs() < 1e-4);
        assert!((corner.y - 1.0).abs() < 1e-4);
    }
}
