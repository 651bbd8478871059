//! The Frame Command Stream
//!
//! One [`FrameCommands`] value describes everything a backend must do for a
//! frame: uniform uploads, ordered render passes, the draws inside them and
//! the dynamic vertex streams those draws reference. The stream is plain
//! data — building it performs no GPU work, which is what makes the frame
//! graph testable headlessly.

use glam::Mat4;

use crate::ids::{MaterialID, RenderID, ShaderID};
use crate::vertex::VertexAttributes;

use bitflags::bitflags;

/// Primitive topology of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TopologyMode {
    PointList,
    LineList,
    LineStrip,
    #[default]
    TriangleList,
    TriangleStrip,
    TriangleFan,
}

/// Which faces are culled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullFace {
    #[default]
    Back,
    Front,
    FrontAndBack,
    None,
    /// In a draw-call override: inherit the render object's own cull face.
    Inherit,
}

/// Depth comparison function. The engine is reverse-Z: the default test is
/// `GEqual` and depth clears to 0.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthTestFunc {
    Always,
    Never,
    Less,
    LEqual,
    Greater,
    #[default]
    GEqual,
    Equal,
    NotEqual,
}

bitflags! {
    /// Attachments cleared at render pass begin.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClearFlags: u32 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Engine render targets addressed by the command stream. The backends own
/// the actual attachments and recreate the size-dependent ones on resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTargetId {
    /// The swapchain image plus its depth attachment.
    Backbuffer,
    /// Two color attachments (normal+roughness, albedo+metallic) + depth.
    GBuffer,
    /// Offscreen HDR scene target A (color + depth).
    OffscreenHdr0,
    /// Offscreen HDR scene target B, used by post-process ping-pong.
    OffscreenHdr1,
    /// TAA history color buffer.
    TaaHistory,
    /// One layer of the directional light's cascade array.
    ShadowCascade(u32),
    /// Raw half-resolution SSAO output.
    SsaoRaw,
    /// Horizontal blur target.
    SsaoBlurH,
    /// Vertical blur target (the final AO the shading pass samples).
    SsaoBlurV,
    /// The shared 512² R16G16 BRDF lookup table.
    BrdfLut,
    /// One face+mip of a material's generated environment cubemap.
    EnvCubemapFace {
        material: MaterialID,
        face: u32,
    },
    /// One face of a material's generated irradiance cubemap.
    IrradianceFace {
        material: MaterialID,
        face: u32,
    },
    /// One face+mip of a material's prefiltered environment map.
    PrefilterFace {
        material: MaterialID,
        face: u32,
        mip: u32,
    },
}

/// Geometry referenced by a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometrySource {
    /// A static render object uploaded through
    /// [`RenderBackend::upload_render_object`](super::RenderBackend::upload_render_object).
    RenderObject(RenderID),
    /// Index into this frame's [`FrameCommands::streams`].
    Stream(u32),
}

/// One dynamic vertex stream, rebuilt every frame (physics debug lines, UI
/// mesh, text, sprite quads). Backends keep N-in-flight copies of the
/// backing allocation; the data here is always this frame's full contents.
#[derive(Debug, Clone, Default)]
pub struct StreamData {
    pub attributes: VertexAttributes,
    pub data: Vec<f32>,
}

impl StreamData {
    /// Vertex count implied by the layout.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        let stride = self.attributes.stride_words();
        if stride == 0 { 0 } else { self.data.len() / stride }
    }
}

/// Packed uniform data for one material, uploaded before any pass runs.
#[derive(Debug, Clone, Default)]
pub struct MaterialUniformUpload {
    pub material: MaterialID,
    /// Per-frame constant buffer contents (layout per the shader's
    /// constant token set).
    pub constant: Vec<u8>,
    /// Per-object dynamic buffer contents; draws index into it with
    /// `dynamic_offset`.
    pub dynamic: Vec<u8>,
    /// Stride between objects in `dynamic`.
    pub dynamic_stride: u32,
}

/// One draw call.
#[derive(Debug, Clone)]
pub struct DrawCmd {
    pub geometry: GeometrySource,
    /// Material whose pipeline, samplers and uniforms are bound. For
    /// override draws (shadow, selected-object wireframe) this is the
    /// override material.
    pub material: MaterialID,
    /// Shader resolved from `material` at build time.
    pub shader: ShaderID,
    /// Material whose textures are sampled; differs from `material` only
    /// for override draws that keep the object's own maps.
    pub texture_source: MaterialID,
    pub topology: TopologyMode,
    pub cull: CullFace,
    pub depth_test: DepthTestFunc,
    pub depth_write: bool,
    /// Rasterize triangles as lines (selected-object wireframe).
    pub wireframe: bool,
    /// Byte offset of this object's slice of the material's dynamic buffer.
    pub dynamic_offset: u32,
    /// Explicit MVP override, used by the cubemap-capture and IBL paths
    /// where the pass camera replaces the scene camera.
    pub push_mvp: Option<Mat4>,
    /// Small per-draw constants (prefilter roughness in x); backends bind
    /// them as push constants or a scratch uniform.
    pub push_data: Option<glam::Vec4>,
    /// Engine targets this draw samples (GBuffer, SSAO result, shadow
    /// array, post-process source), bound in order after the material's
    /// own textures.
    pub inputs: Vec<RenderTargetId>,
    /// Texture bound in place of the material's albedo (per-sprite
    /// textures, font atlases).
    pub texture_override: Option<crate::ids::TextureID>,
    /// Subrange of a stream draw (first vertex, count); `None` draws the
    /// whole geometry.
    pub vertex_range: Option<(u32, u32)>,
}

impl DrawCmd {
    /// A draw with the common defaults: whole geometry, triangles,
    /// back-face culling, reverse-Z test, depth writes on.
    #[must_use]
    pub fn new(geometry: GeometrySource, material: MaterialID, shader: ShaderID) -> Self {
        Self {
            geometry,
            material,
            shader,
            texture_source: material,
            topology: TopologyMode::TriangleList,
            cull: CullFace::Back,
            depth_test: DepthTestFunc::GEqual,
            depth_write: true,
            wireframe: false,
            dynamic_offset: 0,
            push_mvp: None,
            push_data: None,
            inputs: Vec::new(),
            texture_override: None,
            vertex_range: None,
        }
    }
}

/// One render pass: a target, its clears and an ordered draw list.
#[derive(Debug, Clone)]
pub struct RenderPassCmd {
    /// Label for debugging and backend markers.
    pub label: &'static str,
    pub target: RenderTargetId,
    pub clear: ClearFlags,
    pub clear_color: [f32; 4],
    /// Reverse-Z: cleared depth is 0.0 (far).
    pub clear_depth: f32,
    pub draws: Vec<DrawCmd>,
    /// Copy this pass's depth attachment into another target's depth after
    /// the draws complete (GBuffer depth → HDR target).
    pub blit_depth_to: Option<RenderTargetId>,
    /// Copy another target's depth into this pass's depth before the draws
    /// run (HDR depth → backbuffer for depth-aware editor drawing).
    pub blit_depth_from: Option<RenderTargetId>,
    /// Copy this pass's color into another target after the draws (TAA
    /// history update).
    pub blit_color_to: Option<RenderTargetId>,
}

impl RenderPassCmd {
    /// A pass that loads its attachments without clearing.
    #[must_use]
    pub fn new(label: &'static str, target: RenderTargetId) -> Self {
        Self {
            label,
            target,
            clear: ClearFlags::empty(),
            clear_color: [0.0; 4],
            clear_depth: 0.0,
            draws: Vec::new(),
            blit_depth_to: None,
            blit_depth_from: None,
            blit_color_to: None,
        }
    }

    /// Adds clears to the pass.
    #[must_use]
    pub fn with_clear(mut self, clear: ClearFlags, color: [f32; 4]) -> Self {
        self.clear = clear;
        self.clear_color = color;
        self
    }
}

/// Everything a backend executes for one frame, in order.
#[derive(Debug, Clone, Default)]
pub struct FrameCommands {
    /// Uniform uploads, applied before the first pass.
    pub material_uniforms: Vec<MaterialUniformUpload>,
    /// Dynamic vertex streams referenced by `GeometrySource::Stream`.
    pub streams: Vec<StreamData>,
    /// Ordered render passes.
    pub passes: Vec<RenderPassCmd>,
    /// Present the backbuffer at the end of the frame.
    pub present: bool,
    /// Grab the backbuffer after present for the screenshot encoder.
    pub capture_screenshot: bool,
}

impl FrameCommands {
    /// Registers a stream and returns its `GeometrySource`.
    pub fn push_stream(&mut self, stream: StreamData) -> GeometrySource {
        self.streams.push(stream);
        GeometrySource::Stream((self.streams.len() - 1) as u32)
    }

    /// Total draw count across all passes.
    #[must_use]
    pub fn draw_count(&self) -> usize {
        self.passes.iter().map(|p| p.draws.len()).sum()
    }

    /// Finds a pass by label (test helper).
    #[must_use]
    pub fn pass(&self, label: &str) -> Option<&RenderPassCmd> {
        self.passes.iter().find(|p| p.label == label)
    }
}
