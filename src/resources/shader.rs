//! Shader Descriptors and the Built-in Registry
//!
//! Shaders are static descriptors: source file locations plus everything the
//! renderer needs to know *about* the program without parsing it — which
//! vertex attributes it consumes, which uniforms it declares (split into the
//! per-frame constant buffer and the per-object dynamic buffer), which
//! samplers it needs bound, and its pipeline-level flags (deferred,
//! translucent, depth write, attachment count).
//!
//! The uniform vocabulary is a closed set ([`Uniforms`]); a shader source
//! declaring anything outside it is not an error, the renderer simply never
//! writes the unrecognized uniform.
//!
//! The base registry ([`base_shaders`]) is authored in engine code and
//! registered at startup; materials resolve their shader by name.

use bitflags::bitflags;

use crate::settings::{MAX_POINT_LIGHT_COUNT, MAX_SSAO_KERNEL_SIZE, NUM_SHADOW_CASCADES};
use crate::vertex::VertexAttributes;

bitflags! {
    /// The closed set of uniform tokens the renderer recognizes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Uniforms: u64 {
        const MODEL                    = 1 << 0;
        const MODEL_INV_TRANSPOSE      = 1 << 1;
        const VIEW                     = 1 << 2;
        const VIEW_INV                 = 1 << 3;
        const PROJECTION               = 1 << 4;
        const PROJ_INV                 = 1 << 5;
        const VIEW_PROJECTION          = 1 << 6;
        const LAST_FRAME_VIEW_PROJ     = 1 << 7;
        const LIGHT_VIEW_PROJ          = 1 << 8;
        const CAM_POS                  = 1 << 9;
        const EXPOSURE                 = 1 << 10;
        const TIME                     = 1 << 11;
        const COLOR_MULTIPLIER         = 1 << 12;
        const DIR_LIGHT                = 1 << 13;
        const POINT_LIGHTS             = 1 << 14;
        const CONST_ALBEDO             = 1 << 15;
        const CONST_METALLIC           = 1 << 16;
        const CONST_ROUGHNESS          = 1 << 17;
        const CONST_AO                 = 1 << 18;
        const TEX_SIZE                 = 1 << 19;
        const TEXEL_STEP               = 1 << 20;
        const ENABLE_ALBEDO_SAMPLER    = 1 << 21;
        const ENABLE_NORMAL_SAMPLER    = 1 << 22;
        const ENABLE_METALLIC_SAMPLER  = 1 << 23;
        const ENABLE_ROUGHNESS_SAMPLER = 1 << 24;
        const ENABLE_AO_SAMPLER        = 1 << 25;
        const ENABLE_CUBEMAP_SAMPLER   = 1 << 26;
        const ENABLE_IRRADIANCE_SAMPLER = 1 << 27;
        const SHADOW_SAMPLING_DATA     = 1 << 28;
        const POST_PROCESS_MATRIX      = 1 << 29;
        const SSAO_SAMPLES             = 1 << 30;
        const SSAO_RADIUS              = 1 << 31;
        const SSAO_KERNEL_SIZE         = 1 << 32;
        const SSAO_BLUR_RADIUS         = 1 << 33;
        const SSAO_TEXEL_OFFSET        = 1 << 34;
        const SSAO_POW_EXP             = 1 << 35;
        const ENABLE_SSAO              = 1 << 36;
    }
}

bitflags! {
    /// Samplers a shader expects bound, beyond the material's framebuffer
    /// sampler list.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SamplerBits: u32 {
        const ALBEDO     = 1 << 0;
        const NORMAL     = 1 << 1;
        const METALLIC   = 1 << 2;
        const ROUGHNESS  = 1 << 3;
        const AO         = 1 << 4;
        const HDR_EQUIRECT = 1 << 5;
        const CUBEMAP    = 1 << 6;
        const IRRADIANCE = 1 << 7;
        const PREFILTER  = 1 << 8;
        const BRDF_LUT   = 1 << 9;
        const SHADOW_MAP = 1 << 10;
        const DEPTH      = 1 << 11;
        const NOISE      = 1 << 12;
        const FONT_ATLAS = 1 << 13;
    }
}

/// Uniform tokens in buffer packing order.
///
/// Ordering is what keeps the packed blob std140-compatible without pad
/// bytes: matrices first, then 16-byte groups, then vec2s, then scalars,
/// so every member lands on its natural alignment.
pub(crate) const UNIFORM_ORDER: [Uniforms; 37] = [
    // mat4
    Uniforms::MODEL,
    Uniforms::MODEL_INV_TRANSPOSE,
    Uniforms::VIEW,
    Uniforms::VIEW_INV,
    Uniforms::PROJECTION,
    Uniforms::PROJ_INV,
    Uniforms::VIEW_PROJECTION,
    Uniforms::LAST_FRAME_VIEW_PROJ,
    Uniforms::POST_PROCESS_MATRIX,
    Uniforms::LIGHT_VIEW_PROJ,
    // vec4 and vec4 arrays
    Uniforms::CAM_POS,
    Uniforms::COLOR_MULTIPLIER,
    Uniforms::DIR_LIGHT,
    Uniforms::POINT_LIGHTS,
    Uniforms::CONST_ALBEDO,
    Uniforms::SHADOW_SAMPLING_DATA,
    Uniforms::SSAO_SAMPLES,
    // vec2
    Uniforms::TEX_SIZE,
    Uniforms::TEXEL_STEP,
    Uniforms::SSAO_TEXEL_OFFSET,
    // scalars
    Uniforms::EXPOSURE,
    Uniforms::TIME,
    Uniforms::CONST_METALLIC,
    Uniforms::CONST_ROUGHNESS,
    Uniforms::CONST_AO,
    Uniforms::ENABLE_ALBEDO_SAMPLER,
    Uniforms::ENABLE_NORMAL_SAMPLER,
    Uniforms::ENABLE_METALLIC_SAMPLER,
    Uniforms::ENABLE_ROUGHNESS_SAMPLER,
    Uniforms::ENABLE_AO_SAMPLER,
    Uniforms::ENABLE_CUBEMAP_SAMPLER,
    Uniforms::ENABLE_IRRADIANCE_SAMPLER,
    Uniforms::SSAO_RADIUS,
    Uniforms::SSAO_KERNEL_SIZE,
    Uniforms::SSAO_BLUR_RADIUS,
    Uniforms::SSAO_POW_EXP,
    Uniforms::ENABLE_SSAO,
];

/// GLSL-side names parallel to [`UNIFORM_ORDER`].
const UNIFORM_NAMES: [&str; 37] = [
    "model",
    "modelInvTranspose",
    "view",
    "viewInv",
    "projection",
    "projInv",
    "viewProjection",
    "lastFrameViewProj",
    "postProcessMatrix",
    "lightViewProj",
    "camPos",
    "colorMultiplier",
    "dirLight",
    "pointLights",
    "constAlbedo",
    "shadowSamplingData",
    "ssaoSamples",
    "texSize",
    "texelStep",
    "ssaoTexelOffset",
    "exposure",
    "time",
    "constMetallic",
    "constRoughness",
    "constAO",
    "enableAlbedoSampler",
    "enableNormalSampler",
    "enableMetallicSampler",
    "enableRoughnessSampler",
    "enableAOSampler",
    "enableCubemapSampler",
    "enableIrradianceSampler",
    "ssaoRadius",
    "ssaoKernelSize",
    "ssaoBlurRadius",
    "ssaoPowExp",
    "enableSSAO",
];

/// Packed byte sizes parallel to [`UNIFORM_ORDER`]. Scalars pack tight;
/// the ordering keeps every member on its natural std140 alignment.
const UNIFORM_SIZES: [usize; 37] = [
    64,
    64,
    64,
    64,
    64,
    64,
    64,
    64,
    64,
    64 * NUM_SHADOW_CASCADES,
    16,
    16,
    48,
    48 * MAX_POINT_LIGHT_COUNT,
    16,
    32,
    16 * MAX_SSAO_KERNEL_SIZE,
    8,
    8,
    8,
    4,
    4,
    4,
    4,
    4,
    4,
    4,
    4,
    4,
    4,
    4,
    4,
    4,
    4,
    4,
    4,
    4,
];

impl Uniforms {
    fn order_index(self) -> Option<usize> {
        UNIFORM_ORDER.iter().position(|u| *u == self)
    }

    /// GLSL-side name of a single token.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.order_index().map_or("", |i| UNIFORM_NAMES[i])
    }

    /// Packed size of a single token in bytes.
    #[must_use]
    pub fn size_in_bytes(self) -> usize {
        self.order_index().map_or(4, |i| UNIFORM_SIZES[i])
    }

    /// Total packed size of every token in the set.
    #[must_use]
    pub fn calculate_size(self) -> usize {
        UNIFORM_ORDER
            .iter()
            .filter(|u| self.contains(**u))
            .map(|u| u.size_in_bytes())
            .sum()
    }
}

/// Byte layout of a packed uniform buffer for a token set.
///
/// Offsets follow [`UNIFORM_ORDER`]; the renderer writes values at these
/// offsets in `UpdateAllMaterialUniforms` and the backends bind the blob
/// verbatim.
#[derive(Debug, Clone, Default)]
pub struct UniformBufferLayout {
    tokens: Uniforms,
    size: usize,
}

impl UniformBufferLayout {
    /// Builds the layout for a token set.
    #[must_use]
    pub fn new(tokens: Uniforms) -> Self {
        Self {
            tokens,
            size: tokens.calculate_size(),
        }
    }

    /// Byte offset of `token`, or `None` when the set lacks it.
    #[must_use]
    pub fn offset_of(&self, token: Uniforms) -> Option<usize> {
        if !self.tokens.contains(token) {
            return None;
        }
        let mut offset = 0;
        for t in UNIFORM_ORDER {
            if t == token {
                return Some(offset);
            }
            if self.tokens.contains(t) {
                offset += t.size_in_bytes();
            }
        }
        None
    }

    /// Total buffer size in bytes.
    #[inline]
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// The token set this layout was built from.
    #[inline]
    #[must_use]
    pub fn tokens(&self) -> Uniforms {
        self.tokens
    }
}

/// Static descriptor of one shader program.
#[derive(Debug, Clone, Default)]
pub struct Shader {
    /// Registry name; materials resolve shaders by it.
    pub name: String,

    /// GLSL vertex stage path, relative to the resource root.
    pub vertex_shader_path: String,
    /// GLSL fragment stage path; empty for depth-only programs is allowed.
    pub fragment_shader_path: String,
    /// Optional GLSL geometry stage path.
    pub geometry_shader_path: String,
    /// Optional compute stage path (unused by the base registry).
    pub compute_shader_path: String,

    /// Uniforms written once per frame, shared by every object drawn with
    /// this shader.
    pub constant_buffer_uniforms: Uniforms,
    /// Uniforms written per object through the dynamic buffer.
    pub dynamic_buffer_uniforms: Uniforms,

    /// Vertex attributes the program consumes.
    pub vertex_attributes: VertexAttributes,

    /// Samplers the program expects bound.
    pub samplers: SamplerBits,

    /// Objects using this shader render in the deferred geometry pass.
    pub deferred: bool,
    /// Objects using this shader render in the forward pass after opaques.
    pub translucent: bool,
    /// Default depth-write state for pipelines built from this shader.
    pub depth_write_enable: bool,
    /// Subpass index on the explicit backend.
    pub subpass: u32,
    /// Number of fragment output attachments.
    pub num_attachments: u32,
}

impl Shader {
    /// Creates a descriptor with the common defaults (forward, opaque,
    /// depth-writing, one attachment).
    #[must_use]
    pub fn new(name: &str, vertex_path: &str, fragment_path: &str) -> Self {
        Self {
            name: name.to_string(),
            vertex_shader_path: vertex_path.to_string(),
            fragment_shader_path: fragment_path.to_string(),
            depth_write_enable: true,
            num_attachments: 1,
            ..Default::default()
        }
    }
}

/// Authors the base shader registry.
///
/// Order is load order; `ShaderID`s are indices into this list.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn base_shaders() -> Vec<Shader> {
    let per_frame_camera = Uniforms::VIEW | Uniforms::PROJECTION | Uniforms::VIEW_PROJECTION;

    let mut shaders = Vec::new();

    // Deferred geometry fill: writes normal+roughness / albedo+metallic.
    let mut pbr = Shader::new("pbr", "pbr.vert", "pbr.frag");
    pbr.constant_buffer_uniforms = per_frame_camera;
    pbr.dynamic_buffer_uniforms = Uniforms::MODEL
        | Uniforms::MODEL_INV_TRANSPOSE
        | Uniforms::CONST_ALBEDO
        | Uniforms::CONST_METALLIC
        | Uniforms::CONST_ROUGHNESS
        | Uniforms::CONST_AO
        | Uniforms::ENABLE_ALBEDO_SAMPLER
        | Uniforms::ENABLE_NORMAL_SAMPLER
        | Uniforms::ENABLE_METALLIC_SAMPLER
        | Uniforms::ENABLE_ROUGHNESS_SAMPLER
        | Uniforms::ENABLE_AO_SAMPLER;
    pbr.vertex_attributes = VertexAttributes::POSITION
        | VertexAttributes::UV
        | VertexAttributes::TANGENT
        | VertexAttributes::NORMAL;
    pbr.samplers = SamplerBits::ALBEDO
        | SamplerBits::NORMAL
        | SamplerBits::METALLIC
        | SamplerBits::ROUGHNESS
        | SamplerBits::AO;
    pbr.deferred = true;
    pbr.num_attachments = 2;
    shaders.push(pbr);

    // Deferred shading: one fullscreen pass over the GBuffer.
    let mut combine = Shader::new(
        "deferred_combine",
        "deferred_combine.vert",
        "deferred_combine.frag",
    );
    combine.constant_buffer_uniforms = Uniforms::CAM_POS
        | Uniforms::VIEW_INV
        | Uniforms::PROJ_INV
        | Uniforms::DIR_LIGHT
        | Uniforms::POINT_LIGHTS
        | Uniforms::LIGHT_VIEW_PROJ
        | Uniforms::SHADOW_SAMPLING_DATA
        | Uniforms::EXPOSURE
        | Uniforms::TIME
        | Uniforms::ENABLE_SSAO
        | Uniforms::SSAO_POW_EXP
        | Uniforms::ENABLE_IRRADIANCE_SAMPLER;
    combine.vertex_attributes = VertexAttributes::POSITION | VertexAttributes::UV;
    combine.samplers = SamplerBits::IRRADIANCE
        | SamplerBits::PREFILTER
        | SamplerBits::BRDF_LUT
        | SamplerBits::SHADOW_MAP
        | SamplerBits::DEPTH;
    combine.depth_write_enable = false;
    shaders.push(combine);

    // Flat vertex color, used by debug lines, gizmos, grid, wireframes.
    let mut color = Shader::new("color", "color.vert", "color.frag");
    color.constant_buffer_uniforms = per_frame_camera;
    color.dynamic_buffer_uniforms = Uniforms::MODEL | Uniforms::COLOR_MULTIPLIER;
    color.vertex_attributes = VertexAttributes::POSITION | VertexAttributes::COLOR128;
    color.translucent = true;
    shaders.push(color);

    // Skybox, also the target of scene-to-cubemap capture.
    let mut skybox = Shader::new("skybox", "skybox.vert", "skybox.frag");
    skybox.constant_buffer_uniforms = per_frame_camera | Uniforms::TIME;
    skybox.dynamic_buffer_uniforms = Uniforms::MODEL | Uniforms::ENABLE_CUBEMAP_SAMPLER;
    skybox.vertex_attributes = VertexAttributes::POSITION;
    skybox.samplers = SamplerBits::CUBEMAP;
    shaders.push(skybox);

    // IBL precompute chain.
    let mut equirect = Shader::new(
        "equirectangular_to_cube",
        "equirectangular_to_cube.vert",
        "equirectangular_to_cube.frag",
    );
    equirect.constant_buffer_uniforms = Uniforms::VIEW | Uniforms::PROJECTION;
    equirect.vertex_attributes = VertexAttributes::POSITION;
    equirect.samplers = SamplerBits::HDR_EQUIRECT;
    equirect.depth_write_enable = false;
    shaders.push(equirect);

    let mut irradiance = Shader::new("irradiance", "irradiance.vert", "irradiance.frag");
    irradiance.constant_buffer_uniforms = Uniforms::VIEW | Uniforms::PROJECTION;
    irradiance.vertex_attributes = VertexAttributes::POSITION;
    irradiance.samplers = SamplerBits::CUBEMAP;
    irradiance.depth_write_enable = false;
    shaders.push(irradiance);

    let mut prefilter = Shader::new("prefilter", "prefilter.vert", "prefilter.frag");
    prefilter.constant_buffer_uniforms =
        Uniforms::VIEW | Uniforms::PROJECTION | Uniforms::CONST_ROUGHNESS;
    prefilter.vertex_attributes = VertexAttributes::POSITION;
    prefilter.samplers = SamplerBits::CUBEMAP;
    prefilter.depth_write_enable = false;
    shaders.push(prefilter);

    let mut brdf = Shader::new("brdf", "brdf.vert", "brdf.frag");
    brdf.vertex_attributes = VertexAttributes::POSITION | VertexAttributes::UV;
    brdf.depth_write_enable = false;
    shaders.push(brdf);

    // Depth-only cascade rendering; ignores every attribute but position.
    let mut shadow = Shader::new("shadow", "shadow.vert", "shadow.frag");
    shadow.constant_buffer_uniforms = Uniforms::LIGHT_VIEW_PROJ;
    shadow.dynamic_buffer_uniforms = Uniforms::MODEL;
    shadow.vertex_attributes = VertexAttributes::POSITION;
    shadow.num_attachments = 0;
    shaders.push(shadow);

    // SSAO raw pass + separable blur.
    let mut ssao = Shader::new("ssao", "ssao.vert", "ssao.frag");
    ssao.constant_buffer_uniforms = Uniforms::PROJECTION
        | Uniforms::PROJ_INV
        | Uniforms::SSAO_SAMPLES
        | Uniforms::SSAO_RADIUS
        | Uniforms::SSAO_KERNEL_SIZE;
    ssao.vertex_attributes = VertexAttributes::POSITION | VertexAttributes::UV;
    ssao.samplers = SamplerBits::DEPTH | SamplerBits::NOISE;
    ssao.depth_write_enable = false;
    shaders.push(ssao);

    let mut ssao_blur = Shader::new("ssao_blur", "ssao_blur.vert", "ssao_blur.frag");
    ssao_blur.constant_buffer_uniforms = Uniforms::SSAO_BLUR_RADIUS;
    ssao_blur.dynamic_buffer_uniforms = Uniforms::SSAO_TEXEL_OFFSET;
    ssao_blur.vertex_attributes = VertexAttributes::POSITION | VertexAttributes::UV;
    ssao_blur.depth_write_enable = false;
    shaders.push(ssao_blur);

    // Tonemap + FXAA + TAA resolve.
    let mut post = Shader::new("post_process", "post_process.vert", "post_process.frag");
    post.constant_buffer_uniforms =
        Uniforms::POST_PROCESS_MATRIX | Uniforms::EXPOSURE | Uniforms::TIME;
    post.vertex_attributes = VertexAttributes::POSITION | VertexAttributes::UV;
    post.depth_write_enable = false;
    shaders.push(post);

    let mut fxaa = Shader::new("post_fxaa", "post_fxaa.vert", "post_fxaa.frag");
    fxaa.constant_buffer_uniforms = Uniforms::TEXEL_STEP;
    fxaa.vertex_attributes = VertexAttributes::POSITION | VertexAttributes::UV;
    fxaa.depth_write_enable = false;
    shaders.push(fxaa);

    let mut taa = Shader::new("taa_resolve", "taa_resolve.vert", "taa_resolve.frag");
    taa.constant_buffer_uniforms = Uniforms::VIEW_INV
        | Uniforms::PROJ_INV
        | Uniforms::LAST_FRAME_VIEW_PROJ
        | Uniforms::TEX_SIZE;
    taa.vertex_attributes = VertexAttributes::POSITION | VertexAttributes::UV;
    taa.samplers = SamplerBits::DEPTH;
    taa.depth_write_enable = false;
    shaders.push(taa);

    // Sprites, screen- and world-space.
    let mut sprite = Shader::new("sprite", "sprite.vert", "sprite.frag");
    sprite.constant_buffer_uniforms = Uniforms::VIEW | Uniforms::PROJECTION;
    sprite.dynamic_buffer_uniforms = Uniforms::MODEL | Uniforms::COLOR_MULTIPLIER;
    sprite.vertex_attributes = VertexAttributes::POSITION | VertexAttributes::UV;
    sprite.samplers = SamplerBits::ALBEDO;
    sprite.translucent = true;
    sprite.depth_write_enable = false;
    shaders.push(sprite);

    // SDF text; point-list vertices expanded to quads in the vertex stage.
    let mut font_ss = Shader::new("font_ss", "font_ss.vert", "font_ss.frag");
    font_ss.constant_buffer_uniforms = Uniforms::TEX_SIZE;
    font_ss.vertex_attributes = VertexAttributes::POSITION2
        | VertexAttributes::UV
        | VertexAttributes::COLOR128
        | VertexAttributes::EXTRA_VEC4
        | VertexAttributes::EXTRA_INT;
    font_ss.samplers = SamplerBits::FONT_ATLAS;
    font_ss.translucent = true;
    font_ss.depth_write_enable = false;
    shaders.push(font_ss);

    let mut font_ws = Shader::new("font_ws", "font_ws.vert", "font_ws.frag");
    font_ws.constant_buffer_uniforms = Uniforms::VIEW_PROJECTION | Uniforms::TEX_SIZE;
    font_ws.vertex_attributes = VertexAttributes::POSITION
        | VertexAttributes::UV
        | VertexAttributes::COLOR128
        | VertexAttributes::TANGENT
        | VertexAttributes::EXTRA_VEC4
        | VertexAttributes::EXTRA_INT;
    font_ws.samplers = SamplerBits::FONT_ATLAS;
    font_ws.translucent = true;
    font_ws.depth_write_enable = false;
    shaders.push(font_ws);

    // HUD / menu geometry with SDF edge anti-aliasing.
    let mut ui = Shader::new("ui", "ui.vert", "ui.frag");
    ui.dynamic_buffer_uniforms = Uniforms::COLOR_MULTIPLIER;
    ui.vertex_attributes = VertexAttributes::POSITION2
        | VertexAttributes::UV
        | VertexAttributes::COLOR128
        | VertexAttributes::EXTRA_VEC4;
    ui.translucent = true;
    ui.depth_write_enable = false;
    shaders.push(ui);

    shaders
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_sizes_cover_arrays() {
        assert_eq!(Uniforms::LIGHT_VIEW_PROJ.size_in_bytes(), 64 * NUM_SHADOW_CASCADES);
        assert_eq!(Uniforms::POINT_LIGHTS.size_in_bytes(), 48 * MAX_POINT_LIGHT_COUNT);
        assert_eq!(Uniforms::SSAO_SAMPLES.size_in_bytes(), 16 * MAX_SSAO_KERNEL_SIZE);
    }

    #[test]
    fn layout_offsets_accumulate_in_order() {
        let tokens = Uniforms::VIEW | Uniforms::PROJECTION | Uniforms::CAM_POS | Uniforms::TIME;
        let layout = UniformBufferLayout::new(tokens);
        assert_eq!(layout.offset_of(Uniforms::VIEW), Some(0));
        assert_eq!(layout.offset_of(Uniforms::PROJECTION), Some(64));
        assert_eq!(layout.offset_of(Uniforms::CAM_POS), Some(128));
        assert_eq!(layout.offset_of(Uniforms::TIME), Some(144));
        assert_eq!(layout.size(), 148);
        assert_eq!(layout.offset_of(Uniforms::MODEL), None);
    }

    #[test]
    fn base_registry_names_are_unique() {
        let shaders = base_shaders();
        let mut names: Vec<_> = shaders.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), shaders.len());
    }

    #[test]
    fn deferred_shaders_write_two_attachments() {
        let shaders = base_shaders();
        let pbr = shaders.iter().find(|s| s.name == "pbr").unwrap();
        assert!(pbr.deferred);
        assert_eq!(pbr.num_attachments, 2);
    }
}
