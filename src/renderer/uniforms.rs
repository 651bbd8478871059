//! Uniform Packing
//!
//! `UpdateAllMaterialUniforms` walks every registered material and writes
//! the current frame's values for each token its shader declares into the
//! material's backing buffer, in [`UNIFORM_ORDER`] packing order. Matrices
//! upload column-major. Per-object values go through the dynamic buffer at
//! 256-byte aligned offsets.

use glam::{Mat4, Vec2, Vec4};

use crate::resources::shader::{UNIFORM_ORDER, Uniforms};
use crate::settings::{MAX_SSAO_KERNEL_SIZE, NUM_SHADOW_CASCADES};

/// Alignment between objects in a dynamic uniform buffer.
pub const DYNAMIC_ALIGNMENT: u32 = 256;

/// Rounds a byte size up to the dynamic-offset alignment.
#[must_use]
pub fn align_dynamic(size: usize) -> u32 {
    ((size as u32) + DYNAMIC_ALIGNMENT - 1) / DYNAMIC_ALIGNMENT * DYNAMIC_ALIGNMENT
}

/// Per-frame values shared by every material.
#[derive(Debug, Clone)]
pub struct FrameConstants {
    pub view: Mat4,
    pub view_inv: Mat4,
    pub projection: Mat4,
    pub proj_inv: Mat4,
    pub view_projection: Mat4,
    pub last_frame_view_proj: Mat4,
    pub cam_pos: Vec4,
    pub exposure: f32,
    pub time: f32,

    pub light_view_projs: [Mat4; NUM_SHADOW_CASCADES],
    /// Cascade split depths (xyzw) followed by the shadow darkness factor.
    pub cascade_splits: Vec4,
    pub shadow_darkness: f32,
    pub dir_light: [f32; 12],
    pub point_lights: Vec<f32>,

    pub tex_size: Vec2,
    pub texel_step: Vec2,
    pub post_process_matrix: Mat4,

    pub ssao_kernel: Vec<Vec4>,
    pub ssao_radius: f32,
    pub ssao_kernel_size: i32,
    pub ssao_blur_radius: i32,
    pub ssao_pow_exp: f32,
    pub enable_ssao: bool,
}

impl Default for FrameConstants {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            view_inv: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            proj_inv: Mat4::IDENTITY,
            view_projection: Mat4::IDENTITY,
            last_frame_view_proj: Mat4::IDENTITY,
            cam_pos: Vec4::W,
            exposure: 1.0,
            time: 0.0,
            light_view_projs: [Mat4::IDENTITY; NUM_SHADOW_CASCADES],
            cascade_splits: Vec4::ZERO,
            shadow_darkness: 1.0,
            dir_light: [0.0; 12],
            point_lights: Vec::new(),
            tex_size: Vec2::ONE,
            texel_step: Vec2::ZERO,
            post_process_matrix: Mat4::IDENTITY,
            ssao_kernel: Vec::new(),
            ssao_radius: 0.5,
            ssao_kernel_size: MAX_SSAO_KERNEL_SIZE as i32,
            ssao_blur_radius: 2,
            ssao_pow_exp: 1.0,
            enable_ssao: true,
        }
    }
}

/// Per-object values written into the dynamic buffer.
#[derive(Debug, Clone)]
pub struct ObjectUniforms {
    pub model: Mat4,
    pub model_inv_transpose: Mat4,
    pub color_multiplier: Vec4,
    pub const_albedo: Vec4,
    pub const_metallic: f32,
    pub const_roughness: f32,
    pub const_ao: f32,
    pub enable_albedo_sampler: bool,
    pub enable_normal_sampler: bool,
    pub enable_metallic_sampler: bool,
    pub enable_roughness_sampler: bool,
    pub enable_ao_sampler: bool,
    pub enable_cubemap_sampler: bool,
    pub enable_irradiance_sampler: bool,
    pub ssao_texel_offset: Vec2,
}

impl Default for ObjectUniforms {
    fn default() -> Self {
        Self {
            model: Mat4::IDENTITY,
            model_inv_transpose: Mat4::IDENTITY,
            color_multiplier: Vec4::ONE,
            const_albedo: Vec4::ZERO,
            const_metallic: 0.0,
            const_roughness: 1.0,
            const_ao: 1.0,
            enable_albedo_sampler: false,
            enable_normal_sampler: false,
            enable_metallic_sampler: false,
            enable_roughness_sampler: false,
            enable_ao_sampler: false,
            enable_cubemap_sampler: false,
            enable_irradiance_sampler: false,
            ssao_texel_offset: Vec2::ZERO,
        }
    }
}

struct Writer {
    out: Vec<u8>,
}

impl Writer {
    fn mat4(&mut self, m: &Mat4) {
        self.out.extend_from_slice(bytemuck::bytes_of(&m.to_cols_array()));
    }
    fn f32s(&mut self, v: &[f32]) {
        self.out.extend_from_slice(bytemuck::cast_slice(v));
    }
    fn f32(&mut self, v: f32) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }
    fn i32(&mut self, v: i32) {
        self.out.extend_from_slice(&v.to_le_bytes());
    }
    fn boolean(&mut self, v: bool) {
        self.i32(i32::from(v));
    }
}

/// Packs the frame's value for every token of `tokens`, in packing order.
/// The result's length equals `tokens.calculate_size()`.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn pack_uniforms(
    tokens: Uniforms,
    frame: &FrameConstants,
    object: &ObjectUniforms,
) -> Vec<u8> {
    let mut w = Writer {
        out: Vec::with_capacity(tokens.calculate_size()),
    };

    for token in UNIFORM_ORDER {
        if !tokens.contains(token) {
            continue;
        }
        if token == Uniforms::MODEL {
            w.mat4(&object.model);
        } else if token == Uniforms::MODEL_INV_TRANSPOSE {
            w.mat4(&object.model_inv_transpose);
        } else if token == Uniforms::VIEW {
            w.mat4(&frame.view);
        } else if token == Uniforms::VIEW_INV {
            w.mat4(&frame.view_inv);
        } else if token == Uniforms::PROJECTION {
            w.mat4(&frame.projection);
        } else if token == Uniforms::PROJ_INV {
            w.mat4(&frame.proj_inv);
        } else if token == Uniforms::VIEW_PROJECTION {
            w.mat4(&frame.view_projection);
        } else if token == Uniforms::LAST_FRAME_VIEW_PROJ {
            w.mat4(&frame.last_frame_view_proj);
        } else if token == Uniforms::POST_PROCESS_MATRIX {
            w.mat4(&frame.post_process_matrix);
        } else if token == Uniforms::LIGHT_VIEW_PROJ {
            for m in &frame.light_view_projs {
                w.mat4(m);
            }
        } else if token == Uniforms::CAM_POS {
            w.f32s(&frame.cam_pos.to_array());
        } else if token == Uniforms::COLOR_MULTIPLIER {
            w.f32s(&object.color_multiplier.to_array());
        } else if token == Uniforms::DIR_LIGHT {
            w.f32s(&frame.dir_light);
        } else if token == Uniforms::POINT_LIGHTS {
            let expected = Uniforms::POINT_LIGHTS.size_in_bytes() / 4;
            w.f32s(&frame.point_lights);
            for _ in frame.point_lights.len()..expected {
                w.f32(0.0);
            }
        } else if token == Uniforms::CONST_ALBEDO {
            w.f32s(&object.const_albedo.to_array());
        } else if token == Uniforms::SHADOW_SAMPLING_DATA {
            w.f32s(&frame.cascade_splits.to_array());
            w.f32(frame.shadow_darkness);
            w.f32s(&[0.0; 3]);
        } else if token == Uniforms::SSAO_SAMPLES {
            for i in 0..MAX_SSAO_KERNEL_SIZE {
                let sample = frame.ssao_kernel.get(i).copied().unwrap_or(Vec4::ZERO);
                w.f32s(&sample.to_array());
            }
        } else if token == Uniforms::TEX_SIZE {
            w.f32s(&frame.tex_size.to_array());
        } else if token == Uniforms::TEXEL_STEP {
            w.f32s(&frame.texel_step.to_array());
        } else if token == Uniforms::SSAO_TEXEL_OFFSET {
            w.f32s(&object.ssao_texel_offset.to_array());
        } else if token == Uniforms::EXPOSURE {
            w.f32(frame.exposure);
        } else if token == Uniforms::TIME {
            w.f32(frame.time);
        } else if token == Uniforms::CONST_METALLIC {
            w.f32(object.const_metallic);
        } else if token == Uniforms::CONST_ROUGHNESS {
            w.f32(object.const_roughness);
        } else if token == Uniforms::CONST_AO {
            w.f32(object.const_ao);
        } else if token == Uniforms::ENABLE_ALBEDO_SAMPLER {
            w.boolean(object.enable_albedo_sampler);
        } else if token == Uniforms::ENABLE_NORMAL_SAMPLER {
            w.boolean(object.enable_normal_sampler);
        } else if token == Uniforms::ENABLE_METALLIC_SAMPLER {
            w.boolean(object.enable_metallic_sampler);
        } else if token == Uniforms::ENABLE_ROUGHNESS_SAMPLER {
            w.boolean(object.enable_roughness_sampler);
        } else if token == Uniforms::ENABLE_AO_SAMPLER {
            w.boolean(object.enable_ao_sampler);
        } else if token == Uniforms::ENABLE_CUBEMAP_SAMPLER {
            w.boolean(object.enable_cubemap_sampler);
        } else if token == Uniforms::ENABLE_IRRADIANCE_SAMPLER {
            w.boolean(object.enable_irradiance_sampler);
        } else if token == Uniforms::SSAO_RADIUS {
            w.f32(frame.ssao_radius);
        } else if token == Uniforms::SSAO_KERNEL_SIZE {
            w.i32(frame.ssao_kernel_size);
        } else if token == Uniforms::SSAO_BLUR_RADIUS {
            w.i32(frame.ssao_blur_radius);
        } else if token == Uniforms::SSAO_POW_EXP {
            w.f32(frame.ssao_pow_exp);
        } else if token == Uniforms::ENABLE_SSAO {
            w.boolean(frame.enable_ssao);
        }
    }

    debug_assert_eq!(w.out.len(), tokens.calculate_size());
    w.out
}

/// Builds the post-process color matrix from saturation, per-channel
/// brightness and offset.
#[must_use]
pub fn post_process_matrix(saturation: f32, brightness: [f32; 3], offset: [f32; 3]) -> Mat4 {
    // Luminance-preserving saturation matrix blended toward identity,
    // then scaled by brightness with the offset in the translation column.
    const LUM: [f32; 3] = [0.2126, 0.7152, 0.0722];

    let mut cols = [[0.0f32; 4]; 4];
    for (c, col) in cols.iter_mut().enumerate().take(3) {
        for (r, cell) in col.iter_mut().enumerate().take(3) {
            let gray = LUM[c] * (1.0 - saturation);
            *cell = brightness[r] * (gray + if r == c { saturation } else { 0.0 });
        }
    }
    cols[3] = [offset[0], offset[1], offset[2], 1.0];

    Mat4::from_cols_array_2d(&cols)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_size_matches_layout() {
        let tokens = Uniforms::VIEW
            | Uniforms::PROJECTION
            | Uniforms::CAM_POS
            | Uniforms::DIR_LIGHT
            | Uniforms::POINT_LIGHTS
            | Uniforms::TIME;
        let data = pack_uniforms(tokens, &FrameConstants::default(), &ObjectUniforms::default());
        assert_eq!(data.len(), tokens.calculate_size());
    }

    #[test]
    fn matrices_pack_column_major() {
        let mut frame = FrameConstants::default();
        frame.view = Mat4::from_cols_array(&[
            1.0, 2.0, 3.0, 4.0, // column 0
            5.0, 6.0, 7.0, 8.0, // column 1
            9.0, 10.0, 11.0, 12.0, // column 2
            13.0, 14.0, 15.0, 16.0, // column 3
        ]);
        let data = pack_uniforms(Uniforms::VIEW, &frame, &ObjectUniforms::default());
        let floats: &[f32] = bytemuck::cast_slice(&data);
        assert_eq!(&floats[0..4], &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn dynamic_alignment_rounds_up() {
        assert_eq!(align_dynamic(0), 0);
        assert_eq!(align_dynamic(1), 256);
        assert_eq!(align_dynamic(256), 256);
        assert_eq!(align_dynamic(257), 512);
    }

    #[test]
    fn identity_post_matrix_is_neutral() {
        let m = post_process_matrix(1.0, [1.0, 1.0, 1.0], [0.0, 0.0, 0.0]);
        assert!(m.abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }
}
