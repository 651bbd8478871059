//! Backend Abstraction
//!
//! The renderer builds a typed command stream ([`cmd::FrameCommands`]) once
//! per frame; the backend selected at build time executes it. Keeping the
//! frame graph single-sourced on the CPU side makes the two backends
//! behavioral twins and lets every pass-ordering invariant be tested
//! without a GPU.
//!
//! Two implementations exist:
//!
//! - [`wgpu`](self::wgpu) (`backend-wgpu`, default): the explicit API.
//!   Pipelines, bind groups and command encoders are created up front,
//!   cached per (shader, layout, state) key and replayed each frame.
//! - [`gl`](self::gl) (`backend-gl`): the state-machine API. GLSL is
//!   compiled at runtime, state transitions are lazy and uniforms are
//!   uploaded through a location table.
//!
//! There is no runtime switch. When both features are enabled the explicit
//! backend wins; `ember` is never built with neither in practice since
//! `backend-wgpu` is a default feature.

pub mod cmd;

#[cfg(feature = "backend-gl")]
pub mod gl;

#[cfg(feature = "backend-wgpu")]
pub mod wgpu;

use crate::errors::Result;
use crate::ids::{RenderID, TextureID};
use crate::resources::ResourceManager;
use crate::vertex::VertexBufferData;

use self::cmd::FrameCommands;

/// A backbuffer grab, handed to the screenshot encoder.
#[derive(Debug, Clone, Default)]
pub struct BackbufferImage {
    /// Tightly packed RGB8 pixels.
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Whether row 0 is the bottom of the image (GL convention). The
    /// encoder flips when this differs from the file format's origin.
    pub origin_bottom_left: bool,
}

/// The GPU-facing seam of the renderer.
///
/// All methods are called from the main thread. Static geometry is pushed
/// through [`upload_render_object`](Self::upload_render_object) when render
/// objects are created or their meshes reload; per-frame dynamic vertex data
/// travels inside [`FrameCommands`]. Texture and material residency is
/// ensured lazily during [`execute_frame`](Self::execute_frame) from the
/// resource tables.
pub trait RenderBackend {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Rebuilds the swapchain and every size-dependent attachment.
    fn on_window_size_changed(&mut self, width: u32, height: u32);

    /// Switches the present mode.
    fn set_vsync_enabled(&mut self, enabled: bool);

    /// Uploads (or re-uploads) one render object's vertex and index data.
    fn upload_render_object(
        &mut self,
        id: RenderID,
        data: &VertexBufferData,
        indices: Option<&[u32]>,
    );

    /// Frees the GPU resources of one render object.
    fn destroy_render_object(&mut self, id: RenderID);

    /// Invalidates cached state referencing `id` after a texture reload so
    /// descriptors are rewritten on next use.
    fn on_texture_replaced(&mut self, id: TextureID);

    /// Executes one frame's command stream and presents.
    fn execute_frame(&mut self, frame: &FrameCommands, resources: &ResourceManager) -> Result<()>;

    /// Copies the last presented backbuffer into host memory.
    fn read_backbuffer(&mut self) -> Result<BackbufferImage>;

    /// Blocks until all submitted GPU work completes. Called before
    /// resource teardown and on shutdown.
    fn wait_idle(&mut self);
}
