//! The Explicit (wgpu) Backend
//!
//! Pipelines, bind groups and command encoders are created up front,
//! cached by key and replayed per frame — the Vulkan-like programming
//! model. Handle lifetimes ride on wgpu's internal reference counting;
//! dropping a cache entry releases its GPU object once the queue is done
//! with it, which is the scoped-ownership discipline the renderer relies
//! on.

mod context;
mod executor;
mod pipeline;
mod resources;

use rustc_hash::FxHashMap;

use crate::backend::cmd::FrameCommands;
use crate::backend::{BackbufferImage, RenderBackend};
use crate::errors::Result;
use crate::ids::{MaterialID, RenderID, TextureID};
use crate::resources::ResourceManager;
use crate::settings::RenderSettings;
use crate::vertex::VertexBufferData;

use self::context::WgpuContext;
use self::pipeline::PipelineCache;
use self::resources::GpuResources;

/// The explicit backend.
pub struct WgpuBackend {
    ctx: WgpuContext,
    resources: GpuResources,
    pipelines: PipelineCache,
    /// Per-material uniform bind groups; invalidated when a material's
    /// buffers grow.
    group0_cache: FxHashMap<MaterialID, wgpu::BindGroup>,
    /// Staging buffer of an in-flight screenshot copy:
    /// (buffer, width, height, padded bytes per row).
    pending_grab: Option<(wgpu::Buffer, u32, u32, u32)>,
}

impl WgpuBackend {
    /// Creates the device, surface and engine render targets.
    pub async fn new<W>(
        window: W,
        settings: &RenderSettings,
        width: u32,
        height: u32,
    ) -> Result<Self>
    where
        W: raw_window_handle::HasWindowHandle
            + raw_window_handle::HasDisplayHandle
            + Send
            + Sync
            + 'static,
    {
        let ctx = WgpuContext::new(window, settings, width, height).await?;
        let resources = GpuResources::new(&ctx.device, &ctx.queue, width, height);
        let pipelines = PipelineCache::new(&ctx.device);

        Ok(Self {
            ctx,
            resources,
            pipelines,
            group0_cache: FxHashMap::default(),
            pending_grab: None,
        })
    }
}

impl RenderBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn on_window_size_changed(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
        self.resources.resize(&self.ctx.device, width, height);
    }

    fn set_vsync_enabled(&mut self, enabled: bool) {
        self.ctx.set_vsync(enabled);
    }

    fn upload_render_object(
        &mut self,
        id: RenderID,
        data: &VertexBufferData,
        indices: Option<&[u32]>,
    ) {
        self.resources
            .upload_mesh(&self.ctx.device, &self.ctx.queue, id, data, indices);
    }

    fn destroy_render_object(&mut self, id: RenderID) {
        self.resources.meshes.remove(&id);
    }

    fn on_texture_replaced(&mut self, id: TextureID) {
        self.resources.invalidate_texture(id);
    }

    fn execute_frame(&mut self, frame: &FrameCommands, resources: &ResourceManager) -> Result<()> {
        self.execute(frame, resources)
    }

    fn read_backbuffer(&mut self) -> Result<BackbufferImage> {
        self.finish_backbuffer_read()
    }

    fn wait_idle(&mut self) {
        let _ = self.ctx.device.poll(wgpu::PollType::wait_indefinitely());
    }
}
