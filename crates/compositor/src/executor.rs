//! The effectful half of compositing: one render pass, N scissored
//! slices.

use crate::plan::plan_frame;
use crate::slices::SliceRegistry;
use common::PixelRect;
use gpu::{GpuContext, GpuError};
use projection::{Camera, WorldTransform};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{trace, warn};

/// Errors from compositing a frame.
#[derive(Error, Debug)]
pub enum CompositorError {
    /// The GPU context was lost. Recovery is a full re-registration of
    /// every slice via [`Compositor::recover`], not a partial patch.
    #[error("GPU context lost")]
    ContextLost,
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Per-frame compositing statistics.
#[derive(Clone, Copy, Debug, Default)]
pub struct CompositorStats {
    pub slices_drawn: usize,
    pub slices_culled: usize,
    pub composite_time_ms: f32,
}

/// Everything a slice needs to draw: the shared render pass with viewport
/// and scissor already set to the slice's screen rectangle, the slice's
/// world transform, and the device/queue for uploads.
pub struct SliceFrame<'a, 'pass> {
    pub pass: &'a mut wgpu::RenderPass<'pass>,
    /// The slice's device-pixel rectangle; also the active scissor.
    /// Zero-sized for a prepare-only draw (see [`SliceFrame::is_on_screen`]).
    pub viewport: PixelRect,
    pub world: WorldTransform,
    pub camera: Camera,
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
}

impl SliceFrame<'_, '_> {
    /// False for a prepare-only draw: the slice sits inside the cull
    /// margin but has no visible pixels this frame, so it should upload
    /// and skip its draw calls.
    pub fn is_on_screen(&self) -> bool {
        self.viewport.width > 0 && self.viewport.height > 0
    }
}

/// Renders every visible slice through the shared GPU context.
pub struct Compositor {
    context: Arc<GpuContext>,
    clear_color: wgpu::Color,
    stats: CompositorStats,
}

impl Compositor {
    pub fn new(context: Arc<GpuContext>) -> Self {
        Self {
            context,
            clear_color: wgpu::Color::TRANSPARENT,
            stats: CompositorStats::default(),
        }
    }

    pub fn set_clear_color(&mut self, color: wgpu::Color) {
        self.clear_color = color;
    }

    /// Composite one frame. Plans first (pure), then walks the plan with
    /// one render pass, scissoring each slice to its rectangle. Culled
    /// slices never have their render callback invoked.
    ///
    /// Slice callbacks must not register or unregister slices; the
    /// registry is locked for the duration of the pass.
    pub fn composite(
        &mut self,
        registry: &SliceRegistry,
        camera: &Camera,
        margin: f32,
    ) -> Result<(), CompositorError> {
        let start = Instant::now();
        let plan = plan_frame(registry, camera, margin);

        let output = match self.context.get_current_texture() {
            Ok(output) => output,
            Err(GpuError::ContextLost) => return Err(CompositorError::ContextLost),
            Err(other) => return Err(other.into()),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.context.create_command_encoder();
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("slice composite pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let mut inner = registry.inner.lock();
            for draw in &plan.draws {
                let Some(entry) = inner.entries.get_mut(&draw.element) else {
                    continue;
                };

                // Viewport and scissor reset per slice; slices cannot rely
                // on state left over from the previous callback. A
                // prepare-only draw gets an empty scissor so any stray
                // drawing lands nowhere.
                let viewport = match draw.scissor {
                    Some(scissor) => {
                        pass.set_viewport(
                            scissor.x as f32,
                            scissor.y as f32,
                            scissor.width as f32,
                            scissor.height as f32,
                            0.0,
                            1.0,
                        );
                        pass.set_scissor_rect(
                            scissor.x as u32,
                            scissor.y as u32,
                            scissor.width,
                            scissor.height,
                        );
                        scissor
                    }
                    None => {
                        pass.set_scissor_rect(0, 0, 0, 0);
                        PixelRect::default()
                    }
                };

                let mut frame = SliceFrame {
                    pass: &mut pass,
                    viewport,
                    world: draw.world,
                    camera: *camera,
                    device: &self.context.device,
                    queue: &self.context.queue,
                };
                (entry.render)(&mut frame);
            }
        }

        self.context.submit(std::iter::once(encoder.finish()));
        output.present();

        self.stats = CompositorStats {
            slices_drawn: plan.draws.len(),
            slices_culled: plan.culled,
            composite_time_ms: start.elapsed().as_secs_f32() * 1000.0,
        };
        trace!(
            drawn = self.stats.slices_drawn,
            culled = self.stats.slices_culled,
            "composited frame"
        );
        Ok(())
    }

    /// Recover from context loss: reconfigure the surface and drop every
    /// slice so the embedder re-registers them all.
    pub fn recover(&self, registry: &SliceRegistry) {
        warn!("recovering GPU context; all slices must re-register");
        registry.clear();
        self.context.recover();
    }

    /// Statistics for the most recent composited frame.
    pub fn stats(&self) -> &CompositorStats {
        &self.stats
    }

    pub fn context(&self) -> &Arc<GpuContext> {
        &self.context
    }
}
