//! GPU context and device management.

use parking_lot::RwLock;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use wgpu::{
    Adapter, Device, Instance, Queue, Surface, SurfaceConfiguration, TextureFormat,
};

/// Errors that can occur during GPU operations.
#[derive(Error, Debug)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,
    #[error("Failed to request device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),
    #[error("Surface error: {0}")]
    Surface(wgpu::SurfaceError),
    #[error("Failed to create surface")]
    SurfaceCreation,
    #[error("No surface attached")]
    NoSurface,
    #[error("GPU context lost; slices must re-register after recovery")]
    ContextLost,
}

/// The shared GPU context: one per page.
pub struct GpuContext {
    /// wgpu instance.
    pub instance: Instance,
    /// GPU adapter.
    pub adapter: Adapter,
    /// GPU device.
    pub device: Device,
    /// Command queue.
    pub queue: Queue,
    /// Surface for the shared canvas, when attached to a window.
    surface: RwLock<Option<Surface<'static>>>,
    /// Surface configuration.
    surface_config: RwLock<Option<SurfaceConfiguration>>,
    /// Current surface size in device pixels.
    surface_size: RwLock<(u32, u32)>,
    /// Set when the surface reports loss; cleared by `recover`.
    lost: AtomicBool,
}

impl GpuContext {
    /// Create a headless context (no surface).
    pub async fn new() -> Result<Self, GpuError> {
        let instance = Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = request_device(&adapter).await?;

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            surface: RwLock::new(None),
            surface_config: RwLock::new(None),
            surface_size: RwLock::new((0, 0)),
            lost: AtomicBool::new(false),
        })
    }

    /// Create a context rendering to a window's shared canvas surface.
    pub async fn with_window<W>(window: Arc<W>) -> Result<Self, GpuError>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        let instance = Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|_| GpuError::SurfaceCreation)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = request_device(&adapter).await?;
        info!(adapter = %adapter.get_info().name, "GPU context created");

        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            surface: RwLock::new(Some(surface)),
            surface_config: RwLock::new(None),
            surface_size: RwLock::new((0, 0)),
            lost: AtomicBool::new(false),
        })
    }

    /// Configure the surface for the given size in device pixels. Also the
    /// resize path.
    pub fn configure_surface(&self, width: u32, height: u32) {
        let surface = self.surface.read();
        let Some(surface) = surface.as_ref() else {
            return;
        };

        let caps = surface.get_capabilities(&self.adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(caps.formats[0]);

        let config = SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&self.device, &config);

        *self.surface_config.write() = Some(config);
        *self.surface_size.write() = (width, height);
    }

    /// Get the surface format.
    pub fn surface_format(&self) -> Option<TextureFormat> {
        self.surface_config.read().as_ref().map(|c| c.format)
    }

    /// Acquire the current surface texture. Surface loss is recorded and
    /// reported as [`GpuError::ContextLost`]; the caller must no-op the
    /// frame and recover via full re-registration.
    pub fn get_current_texture(&self) -> Result<wgpu::SurfaceTexture, GpuError> {
        if self.is_lost() {
            return Err(GpuError::ContextLost);
        }
        let surface = self.surface.read();
        let surface = surface.as_ref().ok_or(GpuError::NoSurface)?;
        match surface.get_current_texture() {
            Ok(texture) => Ok(texture),
            Err(error @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                warn!(%error, "surface lost");
                self.lost.store(true, Ordering::Release);
                Err(GpuError::ContextLost)
            }
            Err(error) => Err(GpuError::Surface(error)),
        }
    }

    /// Whether the context is in the lost state.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    /// Reconfigure the surface after loss. The caller then re-registers
    /// every slice; recovery is never a partial patch.
    pub fn recover(&self) {
        let (width, height) = *self.surface_size.read();
        self.lost.store(false, Ordering::Release);
        if width > 0 && height > 0 {
            self.configure_surface(width, height);
        }
        info!("GPU context recovered");
    }

    /// Surface size in device pixels.
    pub fn surface_size(&self) -> (u32, u32) {
        *self.surface_size.read()
    }

    /// Create a command encoder.
    pub fn create_command_encoder(&self) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("slice composite encoder"),
            })
    }

    /// Submit commands to the queue.
    pub fn submit(&self, commands: impl IntoIterator<Item = wgpu::CommandBuffer>) {
        self.queue.submit(commands);
    }
}

async fn request_device(adapter: &Adapter) -> Result<(Device, Queue), GpuError> {
    adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("shared canvas device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        )
        .await
        .map_err(GpuError::DeviceRequest)
}
