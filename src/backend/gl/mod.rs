//! The State-Machine (OpenGL) Backend
//!
//! Drives a host-provided GL context through [`glow`]. GLSL is compiled at
//! runtime from `resources/shaders/`, uniforms upload through a per-program
//! location table, and framebuffer/vertex-array objects are cached per
//! target and mesh. State transitions are lazy: the redundant-state cache
//! skips GL calls when the pipeline state hasn't changed between draws.

mod program;
mod resources;

use glow::HasContext;
use rustc_hash::FxHashMap;

use crate::backend::cmd::{
    ClearFlags, CullFace, DepthTestFunc, DrawCmd, FrameCommands, GeometrySource, RenderTargetId,
    TopologyMode,
};
use crate::backend::{BackbufferImage, RenderBackend};
use crate::errors::Result;
use crate::ids::{MaterialID, RenderID, ShaderID, TextureID};
use crate::resources::ResourceManager;
use crate::resources::shader::SamplerBits;
use crate::settings::RenderSettings;
use crate::vertex::VertexBufferData;

use self::program::GlProgram;
use self::resources::GlResources;

fn map_depth(func: DepthTestFunc) -> u32 {
    match func {
        DepthTestFunc::Always => glow::ALWAYS,
        DepthTestFunc::Never => glow::NEVER,
        DepthTestFunc::Less => glow::LESS,
        DepthTestFunc::LEqual => glow::LEQUAL,
        DepthTestFunc::Greater => glow::GREATER,
        DepthTestFunc::GEqual => glow::GEQUAL,
        DepthTestFunc::Equal => glow::EQUAL,
        DepthTestFunc::NotEqual => glow::NOTEQUAL,
    }
}

fn map_cull(cull: CullFace) -> Option<u32> {
    match cull {
        CullFace::Back | CullFace::Inherit => Some(glow::BACK),
        CullFace::Front => Some(glow::FRONT),
        CullFace::FrontAndBack => Some(glow::FRONT_AND_BACK),
        CullFace::None => None,
    }
}

fn map_topology(topology: TopologyMode) -> u32 {
    match topology {
        TopologyMode::PointList => glow::POINTS,
        TopologyMode::LineList => glow::LINES,
        TopologyMode::LineStrip => glow::LINE_STRIP,
        TopologyMode::TriangleList => glow::TRIANGLES,
        TopologyMode::TriangleStrip => glow::TRIANGLE_STRIP,
        TopologyMode::TriangleFan => glow::TRIANGLE_FAN,
    }
}

/// GLSL sampler uniform name for one sampler bit.
fn sampler_uniform_name(bit: SamplerBits) -> &'static str {
    if bit == SamplerBits::ALBEDO {
        "albedoSampler"
    } else if bit == SamplerBits::NORMAL {
        "normalSampler"
    } else if bit == SamplerBits::METALLIC {
        "metallicSampler"
    } else if bit == SamplerBits::ROUGHNESS {
        "roughnessSampler"
    } else if bit == SamplerBits::AO {
        "aoSampler"
    } else if bit == SamplerBits::HDR_EQUIRECT {
        "hdrEquirectangularSampler"
    } else if bit == SamplerBits::CUBEMAP {
        "cubemapSampler"
    } else if bit == SamplerBits::IRRADIANCE {
        "irradianceSampler"
    } else if bit == SamplerBits::PREFILTER {
        "prefilterSampler"
    } else if bit == SamplerBits::BRDF_LUT {
        "brdfLUT"
    } else if bit == SamplerBits::SHADOW_MAP {
        "shadowMap"
    } else if bit == SamplerBits::DEPTH {
        "depthSampler"
    } else if bit == SamplerBits::NOISE {
        "noiseSampler"
    } else if bit == SamplerBits::FONT_ATLAS {
        "fontAtlas"
    } else {
        "albedoSampler"
    }
}

struct MaterialUniformState {
    constant: Vec<u8>,
    dynamic: Vec<u8>,
    dynamic_stride: u32,
}

/// The state-machine backend.
pub struct GlBackend {
    gl: glow::Context,
    width: i32,
    height: i32,
    resources: GlResources,
    /// Compiled programs; `None` marks a failed compile so the fallback
    /// path is taken without retrying every frame.
    programs: FxHashMap<ShaderID, Option<GlProgram>>,
    /// This frame's packed uniform blobs per material.
    material_uniforms: FxHashMap<MaterialID, MaterialUniformState>,
    /// Shader used by the bright-pink fallback material.
    fallback_shader: ShaderID,
}

impl GlBackend {
    /// Adopts the host's GL context through its loader function.
    pub fn new(
        mut loader: impl FnMut(&str) -> *const std::ffi::c_void,
        settings: &RenderSettings,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let gl = unsafe { glow::Context::from_loader_function(|s| loader(s)) };
        let resources = GlResources::new(&gl, width.max(1) as i32, height.max(1) as i32);

        unsafe {
            gl.enable(glow::TEXTURE_CUBE_MAP_SEAMLESS);
            gl.enable(glow::DEPTH_TEST);
            gl.depth_func(glow::GEQUAL);
            gl.clear_depth_f32(0.0);
        }

        if !settings.vsync {
            log::info!("VSync off requested; the host owns the GL swap interval");
        }

        log::info!("GL backend up: {width}x{height}");
        Ok(Self {
            gl,
            width: width.max(1) as i32,
            height: height.max(1) as i32,
            resources,
            programs: FxHashMap::default(),
            material_uniforms: FxHashMap::default(),
            fallback_shader: ShaderID::INVALID,
        })
    }

    fn program_for(
        &mut self,
        shader_id: ShaderID,
        resources: &ResourceManager,
    ) -> Option<ShaderID> {
        if !self.programs.contains_key(&shader_id) {
            let compiled = resources.shader(shader_id).and_then(|shader| {
                match GlProgram::load(&self.gl, shader) {
                    Ok(program) => Some(program),
                    Err(e) => {
                        log::error!("{e}; material falls back to the error color");
                        None
                    }
                }
            });
            self.programs.insert(shader_id, compiled);
        }

        if self.programs[&shader_id].is_some() {
            return Some(shader_id);
        }

        // Pink fallback: the flat-color program.
        if self.fallback_shader == ShaderID::INVALID {
            self.fallback_shader = resources.shader_id("color")?;
        }
        let fallback = self.fallback_shader;
        if fallback != shader_id {
            self.program_for(fallback, resources)
        } else {
            None
        }
    }

    #[allow(clippy::too_many_lines)]
    fn execute_pass_draw(
        &mut self,
        draw: &DrawCmd,
        resources: &ResourceManager,
        pink_fallback: bool,
        program_shader: ShaderID,
    ) {
        let gl = &self.gl;
        let Some(shader) = resources.shader(program_shader) else {
            return;
        };
        let Some(Some(program)) = self.programs.get_mut(&program_shader) else {
            return;
        };

        unsafe {
            // Pipeline state, lazily
            let state = &mut self.resources.state;
            if state.program != Some(program.program) {
                gl.use_program(Some(program.program));
                state.program = Some(program.program);
            }

            let depth = map_depth(draw.depth_test);
            if state.depth_test != Some(depth) {
                gl.depth_func(depth);
                state.depth_test = Some(depth);
            }
            if state.depth_write != Some(draw.depth_write) {
                gl.depth_mask(draw.depth_write);
                state.depth_write = Some(draw.depth_write);
            }

            let cull = map_cull(draw.cull);
            if state.cull != Some(cull) {
                match cull {
                    Some(mode) => {
                        gl.enable(glow::CULL_FACE);
                        gl.cull_face(mode);
                    }
                    None => gl.disable(glow::CULL_FACE),
                }
                state.cull = Some(cull);
            }

            let blend = shader.translucent;
            if state.blend != Some(blend) {
                if blend {
                    gl.enable(glow::BLEND);
                    gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
                } else {
                    gl.disable(glow::BLEND);
                }
                state.blend = Some(blend);
            }

            if state.wireframe != Some(draw.wireframe) {
                gl.polygon_mode(
                    glow::FRONT_AND_BACK,
                    if draw.wireframe { glow::LINE } else { glow::FILL },
                );
                state.wireframe = Some(draw.wireframe);
            }

            // Uniforms: per-frame constants, the per-object dynamic window,
            // then the per-draw push values.
            if let Some(uniforms) = self.material_uniforms.get(&draw.material) {
                program.upload_blob(gl, shader.constant_buffer_uniforms, &uniforms.constant);
                if uniforms.dynamic_stride > 0 {
                    let start = draw.dynamic_offset as usize;
                    let end = (start + uniforms.dynamic_stride as usize).min(uniforms.dynamic.len());
                    if start < end {
                        program.upload_blob(
                            gl,
                            shader.dynamic_buffer_uniforms,
                            &uniforms.dynamic[start..end],
                        );
                    }
                }
            }

            if let Some(location) = program.location("pushMvp") {
                let mvp = draw.push_mvp.unwrap_or(glam::Mat4::IDENTITY);
                gl.uniform_matrix_4_f32_slice(Some(location), false, &mvp.to_cols_array());
            }
            if let Some(location) = program.location("pushData") {
                let data = draw.push_data.unwrap_or(glam::Vec4::ZERO);
                gl.uniform_4_f32(Some(location), data.x, data.y, data.z, data.w);
            }
            if let Some(location) = program.location("pushFlags") {
                gl.uniform_4_f32(
                    Some(location),
                    f32::from(draw.push_mvp.is_some()),
                    0.0,
                    0.0,
                    0.0,
                );
            }
            if pink_fallback {
                if let Some(location) = program.location("colorMultiplier") {
                    gl.uniform_4_f32(Some(location), 1.0, 0.0, 1.0, 1.0);
                }
            }

            // Textures: scene inputs first, then declared samplers.
            let mut unit = 0i32;
            let mut bind = |target: u32, texture: glow::Texture, name: &str| {
                unsafe {
                    gl.active_texture(glow::TEXTURE0 + unit as u32);
                    gl.bind_texture(target, Some(texture));
                }
                program.bind_sampler_unit(gl, name, unit);
                unit += 1;
            };

            let t = &self.resources.targets;
            let mut scene_textures: Vec<glow::Texture> = Vec::new();
            for input in &draw.inputs {
                match input {
                    RenderTargetId::GBuffer => {
                        scene_textures.push(t.gbuffer0.texture);
                        scene_textures.push(t.gbuffer1.texture);
                    }
                    RenderTargetId::OffscreenHdr0 => scene_textures.push(t.hdr0.texture),
                    RenderTargetId::OffscreenHdr1 => scene_textures.push(t.hdr1.texture),
                    RenderTargetId::TaaHistory => scene_textures.push(t.taa_history.texture),
                    RenderTargetId::SsaoRaw => scene_textures.push(t.ssao_raw.texture),
                    RenderTargetId::SsaoBlurH => scene_textures.push(t.ssao_blur_h.texture),
                    RenderTargetId::SsaoBlurV => scene_textures.push(t.ssao_blur_v.texture),
                    _ => {}
                }
            }
            for (scene_index, texture) in scene_textures.iter().enumerate() {
                let name =
                    ["sceneSampler0", "sceneSampler1", "sceneSampler2"][scene_index.min(2)];
                bind(glow::TEXTURE_2D, *texture, name);
            }

            let textures = resources
                .material(draw.texture_source)
                .map(|m| m.textures)
                .unwrap_or_default();
            for bit in SamplerBits::all().iter() {
                if !shader.samplers.contains(bit) {
                    continue;
                }
                let name = sampler_uniform_name(bit);
                if bit == SamplerBits::ALBEDO || bit == SamplerBits::FONT_ATLAS {
                    let id = draw.texture_override.unwrap_or(textures.albedo);
                    bind(glow::TEXTURE_2D, self.resources.texture_or_white(id), name);
                } else if bit == SamplerBits::NORMAL {
                    bind(
                        glow::TEXTURE_2D,
                        self.resources.texture_or_white(textures.normal),
                        name,
                    );
                } else if bit == SamplerBits::METALLIC {
                    bind(
                        glow::TEXTURE_2D,
                        self.resources.texture_or_white(textures.metallic),
                        name,
                    );
                } else if bit == SamplerBits::ROUGHNESS {
                    bind(
                        glow::TEXTURE_2D,
                        self.resources.texture_or_white(textures.roughness),
                        name,
                    );
                } else if bit == SamplerBits::AO {
                    bind(
                        glow::TEXTURE_2D,
                        self.resources.texture_or_white(textures.ao),
                        name,
                    );
                } else if bit == SamplerBits::HDR_EQUIRECT {
                    bind(
                        glow::TEXTURE_2D,
                        self.resources
                            .texture_or_white(textures.hdr_equirectangular),
                        name,
                    );
                } else if bit == SamplerBits::CUBEMAP {
                    let texture = match self.resources.probes.get(&draw.texture_source) {
                        Some(probe) => probe.env,
                        None if textures.cubemap.is_valid() => {
                            self.resources.texture_or_white(textures.cubemap)
                        }
                        None => self.resources.white_cube,
                    };
                    bind(glow::TEXTURE_CUBE_MAP, texture, name);
                } else if bit == SamplerBits::IRRADIANCE {
                    let texture = self
                        .resources
                        .probes
                        .get(&draw.texture_source)
                        .map_or(self.resources.white_cube, |p| p.irradiance);
                    bind(glow::TEXTURE_CUBE_MAP, texture, name);
                } else if bit == SamplerBits::PREFILTER {
                    let texture = self
                        .resources
                        .probes
                        .get(&draw.texture_source)
                        .map_or(self.resources.white_cube, |p| p.prefilter);
                    bind(glow::TEXTURE_CUBE_MAP, texture, name);
                } else if bit == SamplerBits::BRDF_LUT {
                    bind(glow::TEXTURE_2D, t.brdf_lut.texture, name);
                } else if bit == SamplerBits::SHADOW_MAP {
                    bind(glow::TEXTURE_2D_ARRAY, self.resources.shadow_array, name);
                } else if bit == SamplerBits::DEPTH {
                    bind(glow::TEXTURE_2D, t.gbuffer_depth.texture, name);
                } else if bit == SamplerBits::NOISE {
                    bind(glow::TEXTURE_2D, self.resources.ssao_noise, name);
                }
            }

            // Geometry
            match draw.geometry {
                GeometrySource::RenderObject(id) => {
                    let Some(mesh) = self.resources.meshes.get(&id) else {
                        return;
                    };
                    gl.bind_vertex_array(Some(mesh.vao));
                    if mesh.ebo.is_some() {
                        gl.draw_elements(
                            map_topology(draw.topology),
                            mesh.index_count,
                            glow::UNSIGNED_INT,
                            0,
                        );
                    } else {
                        let (first, count) = draw
                            .vertex_range
                            .map_or((0, mesh.vertex_count), |(f, c)| (f as i32, c as i32));
                        gl.draw_arrays(map_topology(draw.topology), first, count);
                    }
                }
                GeometrySource::Stream(slot) => {
                    let Some(Some(stream)) = self.resources.streams.get(slot as usize) else {
                        return;
                    };
                    gl.bind_vertex_array(Some(stream.vao));
                    if stream.instanced {
                        // Glyph streams: a quad per instance, corners
                        // generated from gl_VertexID.
                        gl.draw_arrays_instanced(
                            glow::TRIANGLE_STRIP,
                            0,
                            4,
                            stream.vertex_count,
                        );
                    } else {
                        let (first, count) = draw
                            .vertex_range
                            .map_or((0, stream.vertex_count), |(f, c)| (f as i32, c as i32));
                        gl.draw_arrays(map_topology(draw.topology), first, count);
                    }
                }
            }
        }
    }

    fn bind_pass_target(&mut self, target: RenderTargetId) {
        let fbo = self.resources.framebuffer(&self.gl, target);
        let mip = match target {
            RenderTargetId::PrefilterFace { mip, .. } => mip,
            _ => 0,
        };
        let (w, h) = match target {
            RenderTargetId::Backbuffer => (self.width, self.height),
            _ => self.resources.target_size(target, mip),
        };
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, fbo);
            self.gl.viewport(0, 0, w, h);
        }
        self.resources.state.fbo = Some(fbo);
    }

    fn clear_pass(&mut self, clear: ClearFlags, color: [f32; 4], depth: f32) {
        if clear.is_empty() {
            return;
        }
        let gl = &self.gl;
        unsafe {
            let mut mask = 0;
            if clear.contains(ClearFlags::COLOR) {
                gl.clear_color(color[0], color[1], color[2], color[3]);
                mask |= glow::COLOR_BUFFER_BIT;
            }
            if clear.contains(ClearFlags::DEPTH) {
                // Clearing requires the depth mask on.
                gl.depth_mask(true);
                self.resources.state.depth_write = Some(true);
                gl.clear_depth_f32(depth);
                mask |= glow::DEPTH_BUFFER_BIT;
            }
            if clear.contains(ClearFlags::STENCIL) {
                mask |= glow::STENCIL_BUFFER_BIT;
            }
            gl.clear(mask);
        }
    }

    fn blit(&mut self, from: RenderTargetId, to: RenderTargetId, mask: u32) {
        let (sw, sh) = match from {
            RenderTargetId::Backbuffer => (self.width, self.height),
            _ => self.resources.target_size(from, 0),
        };
        let (dw, dh) = match to {
            RenderTargetId::Backbuffer => (self.width, self.height),
            _ => self.resources.target_size(to, 0),
        };
        let read = self.resources.framebuffer(&self.gl, from);
        let draw = self.resources.framebuffer(&self.gl, to);
        unsafe {
            self.gl.bind_framebuffer(glow::READ_FRAMEBUFFER, read);
            self.gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, draw);
            self.gl
                .blit_framebuffer(0, 0, sw, sh, 0, 0, dw, dh, mask, glow::NEAREST);
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
        self.resources.state.fbo = None;
    }
}

impl RenderBackend for GlBackend {
    fn name(&self) -> &'static str {
        "gl"
    }

    fn on_window_size_changed(&mut self, width: u32, height: u32) {
        self.width = width.max(1) as i32;
        self.height = height.max(1) as i32;
        self.resources.resize(&self.gl, self.width, self.height);
    }

    fn set_vsync_enabled(&mut self, enabled: bool) {
        // The swap interval lives on the host's context/window; the
        // renderer only records the preference.
        log::debug!("GL backend vsync preference: {enabled}");
    }

    fn upload_render_object(
        &mut self,
        id: RenderID,
        data: &VertexBufferData,
        indices: Option<&[u32]>,
    ) {
        self.resources.upload_mesh(&self.gl, id, data, indices);
    }

    fn destroy_render_object(&mut self, id: RenderID) {
        self.resources.destroy_mesh(&self.gl, id);
    }

    fn on_texture_replaced(&mut self, id: TextureID) {
        self.resources.invalidate_texture(&self.gl, id);
    }

    fn execute_frame(&mut self, frame: &FrameCommands, resources: &ResourceManager) -> Result<()> {
        // Residency + per-frame uploads
        self.material_uniforms.clear();
        for upload in &frame.material_uniforms {
            if let Some(material) = resources.material(upload.material) {
                for id in [
                    material.textures.albedo,
                    material.textures.normal,
                    material.textures.metallic,
                    material.textures.roughness,
                    material.textures.ao,
                    material.textures.hdr_equirectangular,
                    material.textures.cubemap,
                ] {
                    if let Some(texture) = resources.texture(id) {
                        self.resources.ensure_texture(&self.gl, id, texture);
                    }
                }
                if material.generates_ibl() || material.info.generate_reflection_probe_maps {
                    self.resources
                        .ensure_probe(&self.gl, upload.material, resources);
                }
            }
            self.material_uniforms.insert(
                upload.material,
                MaterialUniformState {
                    constant: upload.constant.clone(),
                    dynamic: upload.dynamic.clone(),
                    dynamic_stride: upload.dynamic_stride,
                },
            );
        }

        // Which streams draw as instanced glyph quads
        let mut stream_instanced = vec![false; frame.streams.len()];
        for pass in &frame.passes {
            for draw in &pass.draws {
                if let Some(id) = draw.texture_override {
                    if let Some(texture) = resources.texture(id) {
                        self.resources.ensure_texture(&self.gl, id, texture);
                    }
                }
                if let GeometrySource::Stream(slot) = draw.geometry {
                    if draw.topology == TopologyMode::PointList {
                        stream_instanced[slot as usize] = true;
                    }
                }
            }
            if let RenderTargetId::EnvCubemapFace { material, .. }
            | RenderTargetId::IrradianceFace { material, .. }
            | RenderTargetId::PrefilterFace { material, .. } = pass.target
            {
                self.resources.ensure_probe(&self.gl, material, resources);
            }
        }

        for (slot, stream) in frame.streams.iter().enumerate() {
            self.resources.upload_stream(
                &self.gl,
                slot,
                stream.attributes,
                &stream.data,
                stream_instanced[slot],
            );
        }

        for pass in &frame.passes {
            if let Some(from) = pass.blit_depth_from {
                self.blit(from, pass.target, glow::DEPTH_BUFFER_BIT);
            }

            self.bind_pass_target(pass.target);
            self.clear_pass(pass.clear, pass.clear_color, pass.clear_depth);

            for draw in &pass.draws {
                let Some(program_shader) = self.program_for(draw.shader, resources) else {
                    continue;
                };
                let pink_fallback = program_shader != draw.shader;
                self.execute_pass_draw(draw, resources, pink_fallback, program_shader);
            }

            if let Some(to) = pass.blit_depth_to {
                self.blit(pass.target, to, glow::DEPTH_BUFFER_BIT);
            }
            if let Some(to) = pass.blit_color_to {
                self.blit(pass.target, to, glow::COLOR_BUFFER_BIT);
            }
        }

        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            self.gl.bind_vertex_array(None);
        }
        self.resources.state.invalidate();

        // Present is the host's buffer swap; nothing to do here.
        Ok(())
    }

    fn read_backbuffer(&mut self) -> Result<BackbufferImage> {
        let width = self.width as u32;
        let height = self.height as u32;
        let mut pixels = vec![0u8; (width * height * 3) as usize];
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            self.gl.read_pixels(
                0,
                0,
                self.width,
                self.height,
                glow::RGB,
                glow::UNSIGNED_BYTE,
                glow::PixelPackData::Slice(&mut pixels),
            );
        }
        Ok(BackbufferImage {
            pixels,
            width,
            height,
            origin_bottom_left: true,
        })
    }

    fn wait_idle(&mut self) {
        unsafe {
            self.gl.finish();
        }
    }
}
