//! Pure frame planning.
//!
//! A frame plan is the ordered list of slice draws for one frame: which
//! slices are visible, their world transforms, and their device-pixel
//! scissor rects. Planning touches no GPU state, so culling and ordering
//! are plain unit tests.

use crate::slices::SliceRegistry;
use common::{ElementId, PixelRect};
use projection::{physical_viewport_rect, project, Camera, WorldTransform};

/// One slice draw within a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SliceDraw {
    pub element: ElementId,
    pub world: WorldTransform,
    /// Scissor/viewport rectangle in device pixels, clamped to the
    /// surface. `None` for a prepare-only draw: the slice is inside the
    /// cull margin but has no on-surface pixels yet, so its callback runs
    /// (to warm resources before it scrolls in) with an empty scissor.
    pub scissor: Option<PixelRect>,
}

/// The draws for one frame, in z-then-registration order.
#[derive(Clone, Debug, Default)]
pub struct FramePlan {
    pub draws: Vec<SliceDraw>,
    /// Slices skipped as off-screen this frame.
    pub culled: usize,
}

/// Plan one frame: project every registered slice, cull the off-screen
/// ones, and order the rest.
pub fn plan_frame(registry: &SliceRegistry, camera: &Camera, margin: f32) -> FramePlan {
    let inner = registry.inner.lock();

    let mut ordered: Vec<(&ElementId, &crate::slices::SliceEntry)> = inner.entries.iter().collect();
    ordered.sort_by_key(|(_, entry)| (entry.z, entry.seq));

    let mut plan = FramePlan::default();
    for (&element, entry) in ordered {
        let world = project(&entry.rect, camera, margin);
        if !world.visible {
            plan.culled += 1;
            continue;
        }
        // Margin-rescued slices may have no on-surface pixels yet; they
        // stay in the plan as prepare-only draws rather than being culled.
        let scissor = physical_viewport_rect(&entry.rect, camera);
        plan.draws.push(SliceDraw {
            element,
            world,
            scissor,
        });
    }
    plan
}
