//! GLSL Program Compilation and Uniform Upload
//!
//! The state-machine backend compiles shader programs from the GLSL
//! sources under `resources/shaders/` at runtime. Uniform locations are
//! resolved once per program and cached; per-frame values arrive as the
//! packed blobs of the command stream and are walked token by token.

use glow::HasContext;
use rustc_hash::FxHashMap;

use crate::errors::{EmberError, Result};
use crate::resources::shader::{Shader, UNIFORM_ORDER, Uniforms};

/// Root of the runtime-compiled GLSL sources.
pub const SHADER_SOURCE_ROOT: &str = "resources/shaders";

/// One linked program with its uniform location table.
pub struct GlProgram {
    pub program: glow::Program,
    locations: FxHashMap<&'static str, glow::UniformLocation>,
    sampler_locations: FxHashMap<String, glow::UniformLocation>,
}

fn compile_stage(
    gl: &glow::Context,
    shader_name: &str,
    stage: u32,
    source: &str,
) -> Result<glow::Shader> {
    unsafe {
        let shader = gl
            .create_shader(stage)
            .map_err(|e| EmberError::ShaderCompileFailed {
                name: shader_name.to_string(),
                diagnostics: e,
            })?;
        gl.shader_source(shader, source);
        gl.compile_shader(shader);
        if !gl.get_shader_compile_status(shader) {
            let diagnostics = gl.get_shader_info_log(shader);
            gl.delete_shader(shader);
            return Err(EmberError::ShaderCompileFailed {
                name: shader_name.to_string(),
                diagnostics,
            });
        }
        Ok(shader)
    }
}

impl GlProgram {
    /// Loads, compiles and links one registry shader's GLSL stages.
    pub fn load(gl: &glow::Context, shader: &Shader) -> Result<Self> {
        let read = |path: &str| -> Result<String> {
            let full = format!("{SHADER_SOURCE_ROOT}/{path}");
            std::fs::read_to_string(&full).map_err(|e| EmberError::ResourceLoadFailed {
                path: full,
                reason: e.to_string(),
            })
        };

        let vertex_source = read(&shader.vertex_shader_path)?;
        let fragment_source = if shader.fragment_shader_path.is_empty() {
            None
        } else {
            Some(read(&shader.fragment_shader_path)?)
        };
        let geometry_source = if shader.geometry_shader_path.is_empty() {
            None
        } else {
            Some(read(&shader.geometry_shader_path)?)
        };

        unsafe {
            let program = gl
                .create_program()
                .map_err(|e| EmberError::ShaderCompileFailed {
                    name: shader.name.clone(),
                    diagnostics: e,
                })?;

            let mut stages = vec![compile_stage(gl, &shader.name, glow::VERTEX_SHADER, &vertex_source)?];
            if let Some(source) = &fragment_source {
                stages.push(compile_stage(gl, &shader.name, glow::FRAGMENT_SHADER, source)?);
            }
            if let Some(source) = &geometry_source {
                stages.push(compile_stage(gl, &shader.name, glow::GEOMETRY_SHADER, source)?);
            }

            for stage in &stages {
                gl.attach_shader(program, *stage);
            }
            gl.link_program(program);
            let linked = gl.get_program_link_status(program);
            let log_output = gl.get_program_info_log(program);
            for stage in stages {
                gl.detach_shader(program, stage);
                gl.delete_shader(stage);
            }
            if !linked {
                gl.delete_program(program);
                return Err(EmberError::ShaderCompileFailed {
                    name: shader.name.clone(),
                    diagnostics: log_output,
                });
            }

            // Resolve every recognized uniform the program declares.
            let mut locations = FxHashMap::default();
            for token in UNIFORM_ORDER {
                if let Some(location) = gl.get_uniform_location(program, token.name()) {
                    locations.insert(token.name(), location);
                }
            }
            // Per-draw push uniforms.
            for name in ["pushMvp", "pushData", "pushFlags"] {
                if let Some(location) = gl.get_uniform_location(program, name) {
                    locations.insert(name, location);
                }
            }

            log::info!("Linked GL program '{}'", shader.name);
            Ok(Self {
                program,
                locations,
                sampler_locations: FxHashMap::default(),
            })
        }
    }

    /// Location of a named uniform, if the program declares it.
    #[must_use]
    pub fn location(&self, name: &str) -> Option<&glow::UniformLocation> {
        self.locations.get(name)
    }

    /// Binds a named sampler uniform to a texture unit, resolving and
    /// caching its location on first use.
    pub fn bind_sampler_unit(&mut self, gl: &glow::Context, name: &str, unit: i32) {
        if !self.sampler_locations.contains_key(name) {
            let location = unsafe { gl.get_uniform_location(self.program, name) };
            if let Some(location) = location {
                self.sampler_locations.insert(name.to_string(), location);
            } else {
                return;
            }
        }
        if let Some(location) = self.sampler_locations.get(name) {
            unsafe {
                gl.uniform_1_i32(Some(location), unit);
            }
        }
    }

    /// Uploads the packed value of one uniform token.
    pub fn upload_token(&self, gl: &glow::Context, token: Uniforms, bytes: &[u8]) {
        let Some(location) = self.locations.get(token.name()) else {
            return;
        };
        let floats: &[f32] = bytemuck::cast_slice(bytes);

        let int_typed = token == Uniforms::SSAO_KERNEL_SIZE
            || token == Uniforms::SSAO_BLUR_RADIUS
            || token == Uniforms::ENABLE_SSAO
            || token == Uniforms::ENABLE_ALBEDO_SAMPLER
            || token == Uniforms::ENABLE_NORMAL_SAMPLER
            || token == Uniforms::ENABLE_METALLIC_SAMPLER
            || token == Uniforms::ENABLE_ROUGHNESS_SAMPLER
            || token == Uniforms::ENABLE_AO_SAMPLER
            || token == Uniforms::ENABLE_CUBEMAP_SAMPLER
            || token == Uniforms::ENABLE_IRRADIANCE_SAMPLER;

        unsafe {
            match token.size_in_bytes() {
                4 if int_typed => {
                    let ints: &[i32] = bytemuck::cast_slice(bytes);
                    gl.uniform_1_i32(Some(location), ints[0]);
                }
                4 => gl.uniform_1_f32(Some(location), floats[0]),
                8 => gl.uniform_2_f32(Some(location), floats[0], floats[1]),
                16 => gl.uniform_4_f32_slice(Some(location), floats),
                // One matrix.
                64 => gl.uniform_matrix_4_f32_slice(Some(location), false, floats),
                // Matrix arrays (cascade matrices).
                n if n % 64 == 0 && token == Uniforms::LIGHT_VIEW_PROJ => {
                    gl.uniform_matrix_4_f32_slice(Some(location), false, floats);
                }
                // Everything else is a vec4 array (lights, SSAO kernel,
                // shadow sampling data).
                _ => gl.uniform_4_f32_slice(Some(location), floats),
            }
        }
    }

    /// Walks a packed blob and uploads every token of `tokens`.
    pub fn upload_blob(&self, gl: &glow::Context, tokens: Uniforms, blob: &[u8]) {
        let mut offset = 0;
        for token in UNIFORM_ORDER {
            if !tokens.contains(token) {
                continue;
            }
            let size = token.size_in_bytes();
            if offset + size > blob.len() {
                break;
            }
            self.upload_token(gl, token, &blob[offset..offset + size]);
            offset += size;
        }
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_program(self.program);
        }
    }
}
