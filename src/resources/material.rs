//! Materials
//!
//! A material is a value type binding a shader to its per-object inputs:
//! texture paths, PBR constants, sampler toggles and the descriptors of any
//! generated resources (environment cubemap, irradiance map, prefiltered
//! map). Materials are created from a [`MaterialCreateInfo`], which is also
//! the JSON serialization unit — the materials file is an array of create
//! infos and round-trips without field loss.

use glam::{Vec2, Vec4};
use serde::{Deserialize, Serialize};

use crate::ids::{ShaderID, TextureID};

fn is_false(b: &bool) -> bool {
    !*b
}

fn default_true() -> bool {
    true
}

fn one() -> f32 {
    1.0
}

fn white() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

/// One texture slot of a material: an optional source path plus the
/// enable/generate pair controlling whether the sampler is bound and whether
/// the backing image is created by the renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerSlot {
    /// Relative file path; empty means "no source image".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// Bind the sampler when drawing.
    #[serde(default, skip_serializing_if = "is_false")]
    pub enabled: bool,
    /// Create the backing image at material initialization.
    #[serde(default, skip_serializing_if = "is_false")]
    pub generate: bool,
}

impl SamplerSlot {
    /// Slot that loads and binds `path`.
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        Self {
            path: path.to_string(),
            enabled: true,
            generate: true,
        }
    }
}

/// Everything needed to create a material. Serialized as one entry of the
/// materials file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialCreateInfo {
    /// Material name, unique within a scene.
    pub name: String,
    /// Registry name of the shader to bind.
    pub shader_name: String,

    /// Albedo (base color) texture slot.
    pub albedo: SamplerSlot,
    /// Tangent-space normal map slot.
    pub normal: SamplerSlot,
    /// Metallic map slot.
    pub metallic: SamplerSlot,
    /// Roughness map slot.
    pub roughness: SamplerSlot,
    /// Ambient-occlusion map slot.
    pub ao: SamplerSlot,
    /// Equirectangular HDR probe slot (source of generated cubemaps).
    pub hdr_equirectangular: SamplerSlot,

    /// Six explicit cubemap face paths, in RT, LF, UP, DN, BK, FT order.
    /// All empty when the cubemap is generated instead of loaded.
    pub cubemap_paths: [String; 6],
    /// Bind the environment cubemap sampler.
    pub enable_cubemap_sampler: bool,
    /// Create a cubemap image at initialization.
    pub generate_cubemap_sampler: bool,
    /// Use trilinear filtering across generated cubemap mips.
    pub enable_cubemap_trilinear_filtering: bool,
    /// Edge length of the generated cubemap.
    pub generated_cubemap_size: Vec2,

    /// Bind the irradiance cubemap sampler.
    pub enable_irradiance_sampler: bool,
    /// Convolve an irradiance cubemap at initialization.
    pub generate_irradiance_sampler: bool,
    /// Edge length of the generated irradiance cubemap.
    pub generated_irradiance_cubemap_size: Vec2,
    /// Environment map this material's IBL was generated from.
    pub environment_map_path: String,

    /// Bind the prefiltered environment sampler.
    pub enable_prefiltered_map: bool,
    /// Importance-sample a prefiltered environment map at initialization.
    pub generate_prefiltered_map: bool,
    /// Edge length of mip 0 of the generated prefiltered map.
    pub generated_prefiltered_cubemap_size: Vec2,

    /// Bind the shared BRDF lookup table.
    pub enable_brdf_lut: bool,
    /// Capture the scene into this material's cubemap and regenerate its
    /// IBL maps after static geometry is uploaded.
    pub generate_reflection_probe_maps: bool,
    /// Allow this material's objects to be drawn during cubemap capture.
    #[serde(default = "default_true")]
    pub render_to_cubemap: bool,

    /// Constant base color, used when the albedo sampler is disabled.
    pub const_albedo: [f32; 4],
    /// Constant metallic, used when the metallic sampler is disabled.
    pub const_metallic: f32,
    /// Constant roughness, used when the roughness sampler is disabled.
    pub const_roughness: f32,
    /// Constant ambient occlusion, used when the AO sampler is disabled.
    #[serde(default = "one")]
    pub const_ao: f32,

    /// Multiplied into the shader's output color.
    #[serde(default = "white")]
    pub color_multiplier: [f32; 4],
    /// UV scale applied to every sampler of this material.
    #[serde(default = "one")]
    pub texture_scale: f32,

    /// Engine materials survive scene changes.
    pub engine_material: bool,
}

impl Default for MaterialCreateInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            shader_name: String::new(),
            albedo: SamplerSlot::default(),
            normal: SamplerSlot::default(),
            metallic: SamplerSlot::default(),
            roughness: SamplerSlot::default(),
            ao: SamplerSlot::default(),
            hdr_equirectangular: SamplerSlot::default(),
            cubemap_paths: Default::default(),
            enable_cubemap_sampler: false,
            generate_cubemap_sampler: false,
            enable_cubemap_trilinear_filtering: false,
            generated_cubemap_size: Vec2::ZERO,
            enable_irradiance_sampler: false,
            generate_irradiance_sampler: false,
            generated_irradiance_cubemap_size: Vec2::ZERO,
            environment_map_path: String::new(),
            enable_prefiltered_map: false,
            generate_prefiltered_map: false,
            generated_prefiltered_cubemap_size: Vec2::ZERO,
            enable_brdf_lut: false,
            generate_reflection_probe_maps: false,
            render_to_cubemap: true,
            const_albedo: [0.0; 4],
            const_metallic: 0.0,
            const_roughness: 0.0,
            const_ao: 1.0,
            color_multiplier: white(),
            texture_scale: 1.0,
            engine_material: false,
        }
    }
}

/// Resolved texture bindings of one material.
///
/// Filled at initialization by interning every non-empty slot path; failed
/// loads resolve to the white placeholder and are logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialTextures {
    pub albedo: TextureID,
    pub normal: TextureID,
    pub metallic: TextureID,
    pub roughness: TextureID,
    pub ao: TextureID,
    pub hdr_equirectangular: TextureID,
    /// Loaded or generated environment cubemap.
    pub cubemap: TextureID,
    /// Generated irradiance cubemap.
    pub irradiance: TextureID,
    /// Generated prefiltered environment map.
    pub prefiltered: TextureID,
}

/// A registered material.
#[derive(Debug, Clone, Default)]
pub struct Material {
    /// The create info this material was built from; also its
    /// serialization form.
    pub info: MaterialCreateInfo,

    /// Shader resolved from `info.shader_name`.
    pub shader_id: ShaderID,

    /// Interned texture bindings.
    pub textures: MaterialTextures,
}

impl Material {
    /// Material name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Whether this material survives scene changes.
    #[inline]
    #[must_use]
    pub fn is_engine_material(&self) -> bool {
        self.info.engine_material
    }

    /// Color multiplier as a vector.
    #[inline]
    #[must_use]
    pub fn color_multiplier(&self) -> Vec4 {
        Vec4::from_array(self.info.color_multiplier)
    }

    /// Whether any IBL resource generation is requested.
    #[must_use]
    pub fn generates_ibl(&self) -> bool {
        self.info.generate_cubemap_sampler
            || self.info.generate_irradiance_sampler
            || self.info.generate_prefiltered_map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_info_json_round_trip_is_fixed_point() {
        let info = MaterialCreateInfo {
            name: "rusted sphere".into(),
            shader_name: "pbr".into(),
            albedo: SamplerSlot::from_path("textures/rust_albedo.png"),
            normal: SamplerSlot::from_path("textures/rust_normal.png"),
            const_metallic: 0.8,
            const_roughness: 0.35,
            color_multiplier: [1.0, 0.9, 0.8, 1.0],
            texture_scale: 2.0,
            engine_material: true,
            ..Default::default()
        };

        let json = serde_json::to_string_pretty(&info).unwrap();
        let back: MaterialCreateInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, back);
    }

    #[test]
    fn default_create_info_round_trips() {
        let info = MaterialCreateInfo::default();
        let json = serde_json::to_string(&info).unwrap();
        let back: MaterialCreateInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, back);
    }
}
