//! GL Object Ownership
//!
//! Buffers, vertex arrays, textures and framebuffer objects for the
//! state-machine backend, plus the redundant-state cache that keeps the
//! GL state machine from being touched when nothing changed.

use glow::HasContext;
use rustc_hash::FxHashMap;

use crate::backend::cmd::RenderTargetId;
use crate::ids::{MaterialID, RenderID, TextureID};
use crate::renderer::ssao::generate_ssao_noise;
use crate::resources::ResourceManager;
use crate::resources::texture::{Texture, TextureData};
use crate::settings::{NUM_SHADOW_CASCADES, SHADOW_CASCADE_RES, SSAO_NOISE_DIM};
use crate::vertex::VertexAttributes;
use crate::vertex::attributes::{ATTRIBUTE_ORDER, attribute_words};

/// One uploaded mesh: interleaved VBO + optional EBO, described by a VAO.
pub struct GlMesh {
    pub vao: glow::VertexArray,
    pub vbo: glow::Buffer,
    pub ebo: Option<glow::Buffer>,
    pub vertex_count: i32,
    pub index_count: i32,
}

/// One dynamic stream slot: a VAO/VBO pair whose store is orphaned and
/// rewritten every frame.
pub struct GlStream {
    pub vao: glow::VertexArray,
    pub vbo: glow::Buffer,
    pub capacity: usize,
    pub attributes: VertexAttributes,
    pub vertex_count: i32,
    /// Attributes configured with a per-instance divisor (glyph streams).
    pub instanced: bool,
}

/// An engine render target's backing texture.
pub struct GlTargetTexture {
    pub texture: glow::Texture,
    pub width: i32,
    pub height: i32,
}

/// Key for the framebuffer cache: a target plus its face/mip for cubemap
/// targets.
pub type FboKey = (RenderTargetId, u32, u32);

/// Per-probe-material generated images.
pub struct GlProbe {
    pub env: glow::Texture,
    pub env_depth: glow::Texture,
    pub irradiance: glow::Texture,
    pub prefilter: glow::Texture,
    pub size: i32,
    pub irr_size: i32,
    pub pre_size: i32,
}

/// Redundant-state cache.
#[derive(Default)]
pub struct GlState {
    pub program: Option<glow::Program>,
    pub depth_test: Option<u32>,
    pub depth_write: Option<bool>,
    pub cull: Option<Option<u32>>,
    pub blend: Option<bool>,
    pub wireframe: Option<bool>,
    pub fbo: Option<Option<glow::Framebuffer>>,
}

impl GlState {
    pub fn invalidate(&mut self) {
        *self = Self::default();
    }
}

/// Creates a render-target texture (no data, clamped, linear).
pub unsafe fn create_target_texture(
    gl: &glow::Context,
    internal_format: u32,
    width: i32,
    height: i32,
) -> glow::Texture {
    unsafe {
        let texture = gl.create_texture().expect("GL texture allocation failed");
        gl.bind_texture(glow::TEXTURE_2D, Some(texture));
        gl.tex_storage_2d(glow::TEXTURE_2D, 1, internal_format, width.max(1), height.max(1));
        gl.tex_parameter_i32(
            glow::TEXTURE_2D,
            glow::TEXTURE_MIN_FILTER,
            glow::LINEAR as i32,
        );
        gl.tex_parameter_i32(
            glow::TEXTURE_2D,
            glow::TEXTURE_MAG_FILTER,
            glow::LINEAR as i32,
        );
        gl.tex_parameter_i32(
            glow::TEXTURE_2D,
            glow::TEXTURE_WRAP_S,
            glow::CLAMP_TO_EDGE as i32,
        );
        gl.tex_parameter_i32(
            glow::TEXTURE_2D,
            glow::TEXTURE_WRAP_T,
            glow::CLAMP_TO_EDGE as i32,
        );
        texture
    }
}

unsafe fn create_cube_texture(
    gl: &glow::Context,
    internal_format: u32,
    size: i32,
    mip_levels: i32,
) -> glow::Texture {
    unsafe {
        let texture = gl.create_texture().expect("GL texture allocation failed");
        gl.bind_texture(glow::TEXTURE_CUBE_MAP, Some(texture));
        gl.tex_storage_2d(
            glow::TEXTURE_CUBE_MAP,
            mip_levels.max(1),
            internal_format,
            size.max(1),
            size.max(1),
        );
        gl.tex_parameter_i32(
            glow::TEXTURE_CUBE_MAP,
            glow::TEXTURE_MIN_FILTER,
            if mip_levels > 1 {
                glow::LINEAR_MIPMAP_LINEAR as i32
            } else {
                glow::LINEAR as i32
            },
        );
        gl.tex_parameter_i32(
            glow::TEXTURE_CUBE_MAP,
            glow::TEXTURE_MAG_FILTER,
            glow::LINEAR as i32,
        );
        gl.tex_parameter_i32(
            glow::TEXTURE_CUBE_MAP,
            glow::TEXTURE_WRAP_S,
            glow::CLAMP_TO_EDGE as i32,
        );
        gl.tex_parameter_i32(
            glow::TEXTURE_CUBE_MAP,
            glow::TEXTURE_WRAP_T,
            glow::CLAMP_TO_EDGE as i32,
        );
        gl.tex_parameter_i32(
            glow::TEXTURE_CUBE_MAP,
            glow::TEXTURE_WRAP_R,
            glow::CLAMP_TO_EDGE as i32,
        );
        texture
    }
}

/// Size-dependent engine attachments.
pub struct GlTargets {
    pub width: i32,
    pub height: i32,
    pub gbuffer0: GlTargetTexture,
    pub gbuffer1: GlTargetTexture,
    pub gbuffer_depth: GlTargetTexture,
    pub hdr0: GlTargetTexture,
    pub hdr0_depth: GlTargetTexture,
    pub hdr1: GlTargetTexture,
    pub hdr1_depth: GlTargetTexture,
    pub taa_history: GlTargetTexture,
    pub ssao_raw: GlTargetTexture,
    pub ssao_blur_h: GlTargetTexture,
    pub ssao_blur_v: GlTargetTexture,
    pub brdf_lut: GlTargetTexture,
}

impl GlTargets {
    pub fn new(gl: &glow::Context, width: i32, height: i32) -> Self {
        let make = |format: u32, w: i32, h: i32| GlTargetTexture {
            texture: unsafe { create_target_texture(gl, format, w, h) },
            width: w,
            height: h,
        };
        Self {
            width,
            height,
            gbuffer0: make(glow::RGBA16F, width, height),
            gbuffer1: make(glow::RGBA8, width, height),
            gbuffer_depth: make(glow::DEPTH_COMPONENT32F, width, height),
            hdr0: make(glow::RGBA16F, width, height),
            hdr0_depth: make(glow::DEPTH_COMPONENT32F, width, height),
            hdr1: make(glow::RGBA16F, width, height),
            hdr1_depth: make(glow::DEPTH_COMPONENT32F, width, height),
            taa_history: make(glow::RGBA16F, width, height),
            ssao_raw: make(glow::R16F, (width / 2).max(1), (height / 2).max(1)),
            ssao_blur_h: make(glow::R16F, width, height),
            ssao_blur_v: make(glow::R16F, width, height),
            brdf_lut: make(
                glow::RG16F,
                crate::renderer::ibl::BRDF_LUT_SIZE as i32,
                crate::renderer::ibl::BRDF_LUT_SIZE as i32,
            ),
        }
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            for t in [
                &self.gbuffer0,
                &self.gbuffer1,
                &self.gbuffer_depth,
                &self.hdr0,
                &self.hdr0_depth,
                &self.hdr1,
                &self.hdr1_depth,
                &self.taa_history,
                &self.ssao_raw,
                &self.ssao_blur_h,
                &self.ssao_blur_v,
                &self.brdf_lut,
            ] {
                gl.delete_texture(t.texture);
            }
        }
    }
}

pub struct GlResources {
    pub meshes: FxHashMap<RenderID, GlMesh>,
    pub textures: FxHashMap<TextureID, glow::Texture>,
    pub probes: FxHashMap<MaterialID, GlProbe>,
    pub streams: Vec<Option<GlStream>>,
    pub targets: GlTargets,
    pub fbos: FxHashMap<FboKey, glow::Framebuffer>,
    pub shadow_array: glow::Texture,
    pub ssao_noise: glow::Texture,
    pub white: glow::Texture,
    pub white_cube: glow::Texture,
    pub state: GlState,
}

impl GlResources {
    pub fn new(gl: &glow::Context, width: i32, height: i32) -> Self {
        let targets = GlTargets::new(gl, width, height);

        let (shadow_array, ssao_noise, white, white_cube) = unsafe {
            // Cascade depth array
            let shadow_array = gl.create_texture().expect("GL texture allocation failed");
            gl.bind_texture(glow::TEXTURE_2D_ARRAY, Some(shadow_array));
            gl.tex_storage_3d(
                glow::TEXTURE_2D_ARRAY,
                1,
                glow::DEPTH_COMPONENT32F,
                SHADOW_CASCADE_RES as i32,
                SHADOW_CASCADE_RES as i32,
                NUM_SHADOW_CASCADES as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D_ARRAY,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D_ARRAY,
                glow::TEXTURE_MAG_FILTER,
                glow::LINEAR as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D_ARRAY,
                glow::TEXTURE_COMPARE_MODE,
                glow::COMPARE_REF_TO_TEXTURE as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D_ARRAY,
                glow::TEXTURE_COMPARE_FUNC,
                glow::GEQUAL as i32,
            );

            // SSAO rotation noise
            let noise = generate_ssao_noise();
            let noise_flat: Vec<u8> = noise.iter().flat_map(|p| p.iter().copied()).collect();
            let ssao_noise = gl.create_texture().expect("GL texture allocation failed");
            gl.bind_texture(glow::TEXTURE_2D, Some(ssao_noise));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                SSAO_NOISE_DIM as i32,
                SSAO_NOISE_DIM as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                Some(&noise_flat),
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::NEAREST as i32,
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MAG_FILTER,
                glow::NEAREST as i32,
            );
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::REPEAT as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::REPEAT as i32);

            // 1×1 white fallbacks
            let white = gl.create_texture().expect("GL texture allocation failed");
            gl.bind_texture(glow::TEXTURE_2D, Some(white));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA8 as i32,
                1,
                1,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                Some(&[255, 255, 255, 255]),
            );
            gl.tex_parameter_i32(
                glow::TEXTURE_2D,
                glow::TEXTURE_MIN_FILTER,
                glow::NEAREST as i32,
            );

            let white_cube = gl.create_texture().expect("GL texture allocation failed");
            gl.bind_texture(glow::TEXTURE_CUBE_MAP, Some(white_cube));
            for face in 0..6 {
                gl.tex_image_2d(
                    glow::TEXTURE_CUBE_MAP_POSITIVE_X + face,
                    0,
                    glow::RGBA8 as i32,
                    1,
                    1,
                    0,
                    glow::RGBA,
                    glow::UNSIGNED_BYTE,
                    Some(&[255, 255, 255, 255]),
                );
            }
            gl.tex_parameter_i32(
                glow::TEXTURE_CUBE_MAP,
                glow::TEXTURE_MIN_FILTER,
                glow::LINEAR as i32,
            );

            (shadow_array, ssao_noise, white, white_cube)
        };

        Self {
            meshes: FxHashMap::default(),
            textures: FxHashMap::default(),
            probes: FxHashMap::default(),
            streams: Vec::new(),
            targets,
            fbos: FxHashMap::default(),
            shadow_array,
            ssao_noise,
            white,
            white_cube,
            state: GlState::default(),
        }
    }

    /// Recreates the size-dependent attachments and drops the FBO cache.
    pub fn resize(&mut self, gl: &glow::Context, width: i32, height: i32) {
        self.targets.destroy(gl);
        for (_, fbo) in self.fbos.drain() {
            unsafe { gl.delete_framebuffer(fbo) };
        }
        self.targets = GlTargets::new(gl, width, height);
        self.state.invalidate();
    }

    // ========================================================================
    // Meshes & streams
    // ========================================================================

    /// Configures the bound VAO's attribute pointers for an interleaved
    /// layout.
    unsafe fn configure_attributes(gl: &glow::Context, attrs: VertexAttributes, instanced: bool) {
        let stride = attrs.stride() as i32;
        let mut location = 0u32;
        let mut offset = 0i32;
        for attribute in ATTRIBUTE_ORDER {
            if !attrs.contains(attribute) {
                continue;
            }
            let words = attribute_words(attribute) as i32;
            unsafe {
                gl.enable_vertex_attrib_array(location);
                if attribute == VertexAttributes::COLOR32 {
                    gl.vertex_attrib_pointer_f32(
                        location,
                        4,
                        glow::UNSIGNED_BYTE,
                        true,
                        stride,
                        offset,
                    );
                } else if attribute == VertexAttributes::EXTRA_INT {
                    gl.vertex_attrib_pointer_i32(location, 1, glow::UNSIGNED_INT, stride, offset);
                } else {
                    gl.vertex_attrib_pointer_f32(
                        location,
                        words,
                        glow::FLOAT,
                        false,
                        stride,
                        offset,
                    );
                }
                if instanced {
                    gl.vertex_attrib_divisor(location, 1);
                }
            }
            location += 1;
            offset += words * 4;
        }
    }

    pub fn upload_mesh(
        &mut self,
        gl: &glow::Context,
        id: RenderID,
        data: &crate::vertex::VertexBufferData,
        indices: Option<&[u32]>,
    ) {
        self.destroy_mesh(gl, id);

        unsafe {
            let vao = gl.create_vertex_array().expect("GL VAO allocation failed");
            let vbo = gl.create_buffer().expect("GL buffer allocation failed");
            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, data.bytes(), glow::STATIC_DRAW);
            Self::configure_attributes(gl, data.attributes(), false);

            let (ebo, index_count) = match indices {
                Some(indices) if !indices.is_empty() => {
                    let ebo = gl.create_buffer().expect("GL buffer allocation failed");
                    gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));
                    gl.buffer_data_u8_slice(
                        glow::ELEMENT_ARRAY_BUFFER,
                        bytemuck::cast_slice(indices),
                        glow::STATIC_DRAW,
                    );
                    (Some(ebo), indices.len() as i32)
                }
                _ => (None, 0),
            };
            gl.bind_vertex_array(None);

            self.meshes.insert(
                id,
                GlMesh {
                    vao,
                    vbo,
                    ebo,
                    vertex_count: data.vertex_count() as i32,
                    index_count,
                },
            );
        }
    }

    pub fn destroy_mesh(&mut self, gl: &glow::Context, id: RenderID) {
        if let Some(mesh) = self.meshes.remove(&id) {
            unsafe {
                gl.delete_vertex_array(mesh.vao);
                gl.delete_buffer(mesh.vbo);
                if let Some(ebo) = mesh.ebo {
                    gl.delete_buffer(ebo);
                }
            }
        }
    }

    /// Rewrites a stream slot, orphaning the previous store.
    pub fn upload_stream(
        &mut self,
        gl: &glow::Context,
        slot: usize,
        attrs: VertexAttributes,
        data: &[f32],
        instanced: bool,
    ) {
        if slot >= self.streams.len() {
            self.streams.resize_with(slot + 1, || None);
        }

        let needs_new = match &self.streams[slot] {
            Some(stream) => stream.attributes != attrs || stream.instanced != instanced,
            None => true,
        };
        if needs_new {
            if let Some(old) = self.streams[slot].take() {
                unsafe {
                    gl.delete_vertex_array(old.vao);
                    gl.delete_buffer(old.vbo);
                }
            }
            unsafe {
                let vao = gl.create_vertex_array().expect("GL VAO allocation failed");
                let vbo = gl.create_buffer().expect("GL buffer allocation failed");
                gl.bind_vertex_array(Some(vao));
                gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
                Self::configure_attributes(gl, attrs, instanced);
                gl.bind_vertex_array(None);
                self.streams[slot] = Some(GlStream {
                    vao,
                    vbo,
                    capacity: 0,
                    attributes: attrs,
                    vertex_count: 0,
                    instanced,
                });
            }
        }

        let stream = self.streams[slot].as_mut().expect("stream slot just filled");
        let bytes: &[u8] = bytemuck::cast_slice(data);
        unsafe {
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(stream.vbo));
            if bytes.len() > stream.capacity {
                // Orphan + grow.
                gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytes, glow::DYNAMIC_DRAW);
                stream.capacity = bytes.len();
            } else {
                gl.buffer_data_size(
                    glow::ARRAY_BUFFER,
                    stream.capacity.max(4) as i32,
                    glow::DYNAMIC_DRAW,
                );
                gl.buffer_sub_data_u8_slice(glow::ARRAY_BUFFER, 0, bytes);
            }
        }
        let stride = attrs.stride_words().max(1);
        stream.vertex_count = (data.len() / stride) as i32;
    }

    // ========================================================================
    // Textures
    // ========================================================================

    pub fn ensure_texture(&mut self, gl: &glow::Context, id: TextureID, texture: &Texture) {
        if self.textures.contains_key(&id) {
            return;
        }

        let (internal, format, ty) = if texture.hdr {
            (glow::RGBA32F, glow::RGBA, glow::FLOAT)
        } else {
            match texture.channel_count {
                1 => (glow::R8, glow::RED, glow::UNSIGNED_BYTE),
                2 => (glow::RG8, glow::RG, glow::UNSIGNED_BYTE),
                _ => (glow::RGBA8, glow::RGBA, glow::UNSIGNED_BYTE),
            }
        };

        unsafe {
            let handle = gl.create_texture().expect("GL texture allocation failed");
            let target = if texture.is_cubemap {
                glow::TEXTURE_CUBE_MAP
            } else {
                glow::TEXTURE_2D
            };
            gl.bind_texture(target, Some(handle));

            match &texture.data {
                TextureData::Ldr(pixels) => {
                    gl.tex_image_2d(
                        glow::TEXTURE_2D,
                        0,
                        internal as i32,
                        texture.width.max(1) as i32,
                        texture.height.max(1) as i32,
                        0,
                        format,
                        ty,
                        Some(pixels),
                    );
                }
                TextureData::Hdr(pixels) => {
                    gl.tex_image_2d(
                        glow::TEXTURE_2D,
                        0,
                        internal as i32,
                        texture.width.max(1) as i32,
                        texture.height.max(1) as i32,
                        0,
                        format,
                        ty,
                        Some(bytemuck::cast_slice(pixels)),
                    );
                }
                TextureData::CubemapLdr(faces) => {
                    for (i, face) in faces.iter().enumerate() {
                        gl.tex_image_2d(
                            glow::TEXTURE_CUBE_MAP_POSITIVE_X + i as u32,
                            0,
                            internal as i32,
                            texture.width.max(1) as i32,
                            texture.height.max(1) as i32,
                            0,
                            format,
                            ty,
                            Some(face),
                        );
                    }
                }
                TextureData::Empty => {
                    gl.tex_image_2d(
                        glow::TEXTURE_2D,
                        0,
                        internal as i32,
                        texture.width.max(1) as i32,
                        texture.height.max(1) as i32,
                        0,
                        format,
                        ty,
                        None,
                    );
                }
            }

            if texture.generate_mip_maps && texture.mip_levels > 1 {
                gl.generate_mipmap(target);
                gl.tex_parameter_i32(
                    target,
                    glow::TEXTURE_MIN_FILTER,
                    glow::LINEAR_MIPMAP_LINEAR as i32,
                );
            } else {
                gl.tex_parameter_i32(target, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            }
            gl.tex_parameter_i32(target, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, glow::REPEAT as i32);
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, glow::REPEAT as i32);

            self.textures.insert(id, handle);
        }
    }

    pub fn invalidate_texture(&mut self, gl: &glow::Context, id: TextureID) {
        if let Some(handle) = self.textures.remove(&id) {
            unsafe { gl.delete_texture(handle) };
        }
    }

    pub fn texture_or_white(&self, id: TextureID) -> glow::Texture {
        self.textures.get(&id).copied().unwrap_or(self.white)
    }

    // ========================================================================
    // Probes & framebuffers
    // ========================================================================

    pub fn ensure_probe(
        &mut self,
        gl: &glow::Context,
        material: MaterialID,
        resources: &ResourceManager,
    ) {
        if self.probes.contains_key(&material) {
            return;
        }
        let Some(mat) = resources.material(material) else {
            return;
        };
        let env_size = resources
            .texture(mat.textures.cubemap)
            .map_or(512, |t| t.width) as i32;
        let irr_size = resources
            .texture(mat.textures.irradiance)
            .map_or(32, |t| t.width) as i32;
        let pre_size = resources
            .texture(mat.textures.prefiltered)
            .map_or(128, |t| t.width) as i32;

        unsafe {
            self.probes.insert(
                material,
                GlProbe {
                    env: create_cube_texture(gl, glow::RGBA16F, env_size, 1),
                    env_depth: create_target_texture(
                        gl,
                        glow::DEPTH_COMPONENT32F,
                        env_size,
                        env_size,
                    ),
                    irradiance: create_cube_texture(gl, glow::RGBA16F, irr_size, 1),
                    prefilter: create_cube_texture(
                        gl,
                        glow::RGBA16F,
                        pre_size,
                        crate::renderer::ibl::PREFILTER_MIP_LEVELS as i32,
                    ),
                    size: env_size,
                    irr_size,
                    pre_size,
                },
            );
        }
    }

    /// Framebuffer for one pass target, created and cached on first use.
    /// `None` is the backbuffer.
    pub fn framebuffer(
        &mut self,
        gl: &glow::Context,
        target: RenderTargetId,
    ) -> Option<glow::Framebuffer> {
        let key: FboKey = match target {
            RenderTargetId::Backbuffer => return None,
            RenderTargetId::EnvCubemapFace { face, .. } => (target, face, 0),
            RenderTargetId::IrradianceFace { face, .. } => (target, face, 0),
            RenderTargetId::PrefilterFace { face, mip, .. } => (target, face, mip),
            RenderTargetId::ShadowCascade(cascade) => (target, cascade, 0),
            _ => (target, 0, 0),
        };
        if let Some(fbo) = self.fbos.get(&key) {
            return Some(*fbo);
        }

        let t = &self.targets;
        unsafe {
            let fbo = gl.create_framebuffer().expect("GL FBO allocation failed");
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));

            let attach_2d = |attachment: u32, texture: glow::Texture| unsafe {
                gl.framebuffer_texture_2d(
                    glow::FRAMEBUFFER,
                    attachment,
                    glow::TEXTURE_2D,
                    Some(texture),
                    0,
                );
            };

            match target {
                RenderTargetId::GBuffer => {
                    attach_2d(glow::COLOR_ATTACHMENT0, t.gbuffer0.texture);
                    attach_2d(glow::COLOR_ATTACHMENT1, t.gbuffer1.texture);
                    attach_2d(glow::DEPTH_ATTACHMENT, t.gbuffer_depth.texture);
                    gl.draw_buffers(&[glow::COLOR_ATTACHMENT0, glow::COLOR_ATTACHMENT1]);
                }
                RenderTargetId::OffscreenHdr0 => {
                    attach_2d(glow::COLOR_ATTACHMENT0, t.hdr0.texture);
                    attach_2d(glow::DEPTH_ATTACHMENT, t.hdr0_depth.texture);
                }
                RenderTargetId::OffscreenHdr1 => {
                    attach_2d(glow::COLOR_ATTACHMENT0, t.hdr1.texture);
                    attach_2d(glow::DEPTH_ATTACHMENT, t.hdr1_depth.texture);
                }
                RenderTargetId::TaaHistory => {
                    attach_2d(glow::COLOR_ATTACHMENT0, t.taa_history.texture);
                }
                RenderTargetId::SsaoRaw => {
                    attach_2d(glow::COLOR_ATTACHMENT0, t.ssao_raw.texture);
                }
                RenderTargetId::SsaoBlurH => {
                    attach_2d(glow::COLOR_ATTACHMENT0, t.ssao_blur_h.texture);
                }
                RenderTargetId::SsaoBlurV => {
                    attach_2d(glow::COLOR_ATTACHMENT0, t.ssao_blur_v.texture);
                }
                RenderTargetId::BrdfLut => {
                    attach_2d(glow::COLOR_ATTACHMENT0, t.brdf_lut.texture);
                }
                RenderTargetId::ShadowCascade(cascade) => {
                    gl.framebuffer_texture_layer(
                        glow::FRAMEBUFFER,
                        glow::DEPTH_ATTACHMENT,
                        Some(self.shadow_array),
                        0,
                        cascade as i32,
                    );
                    gl.draw_buffers(&[]);
                }
                RenderTargetId::EnvCubemapFace { material, face } => {
                    if let Some(probe) = self.probes.get(&material) {
                        gl.framebuffer_texture_2d(
                            glow::FRAMEBUFFER,
                            glow::COLOR_ATTACHMENT0,
                            glow::TEXTURE_CUBE_MAP_POSITIVE_X + face,
                            Some(probe.env),
                            0,
                        );
                        attach_2d(glow::DEPTH_ATTACHMENT, probe.env_depth);
                    }
                }
                RenderTargetId::IrradianceFace { material, face } => {
                    if let Some(probe) = self.probes.get(&material) {
                        gl.framebuffer_texture_2d(
                            glow::FRAMEBUFFER,
                            glow::COLOR_ATTACHMENT0,
                            glow::TEXTURE_CUBE_MAP_POSITIVE_X + face,
                            Some(probe.irradiance),
                            0,
                        );
                    }
                }
                RenderTargetId::PrefilterFace {
                    material,
                    face,
                    mip,
                } => {
                    if let Some(probe) = self.probes.get(&material) {
                        gl.framebuffer_texture_2d(
                            glow::FRAMEBUFFER,
                            glow::COLOR_ATTACHMENT0,
                            glow::TEXTURE_CUBE_MAP_POSITIVE_X + face,
                            Some(probe.prefilter),
                            mip as i32,
                        );
                    }
                }
                RenderTargetId::Backbuffer => unreachable!(),
            }

            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            if status != glow::FRAMEBUFFER_COMPLETE {
                log::error!("Incomplete framebuffer for {target:?}: status {status:#x}");
            }
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);

            self.fbos.insert(key, fbo);
            Some(fbo)
        }
    }

    /// Viewport size of a pass target.
    pub fn target_size(&self, target: RenderTargetId, mip: u32) -> (i32, i32) {
        let t = &self.targets;
        match target {
            RenderTargetId::Backbuffer
            | RenderTargetId::GBuffer
            | RenderTargetId::OffscreenHdr0
            | RenderTargetId::OffscreenHdr1
            | RenderTargetId::TaaHistory
            | RenderTargetId::SsaoBlurH
            | RenderTargetId::SsaoBlurV => (t.width, t.height),
            RenderTargetId::SsaoRaw => (t.ssao_raw.width, t.ssao_raw.height),
            RenderTargetId::BrdfLut => (t.brdf_lut.width, t.brdf_lut.height),
            RenderTargetId::ShadowCascade(_) => {
                (SHADOW_CASCADE_RES as i32, SHADOW_CASCADE_RES as i32)
            }
            RenderTargetId::EnvCubemapFace { material, .. } => {
                let size = self.probes.get(&material).map_or(1, |p| p.size);
                (size.max(1), size.max(1))
            }
            RenderTargetId::IrradianceFace { material, .. } => {
                let size = self.probes.get(&material).map_or(1, |p| p.irr_size);
                (size.max(1), size.max(1))
            }
            RenderTargetId::PrefilterFace { material, .. } => {
                let size = self.probes.get(&material).map_or(1, |p| p.pre_size);
                ((size >> mip).max(1), (size >> mip).max(1))
            }
        }
    }
}
