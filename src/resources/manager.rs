//! Resource Tables
//!
//! Sparse ID-indexed tables for shaders, materials and textures. Tables own
//! the authoritative objects; everything else holds IDs. Allocation always
//! returns the lowest free index so destroyed slots are recycled.

use std::path::Path;

use rustc_hash::FxHashMap;

use crate::errors::Result;
use crate::ids::{MaterialID, ShaderID, TextureID};

use super::material::{Material, MaterialCreateInfo};
use super::shader::{Shader, base_shaders};
use super::texture::{CubemapFacePaths, Texture};

/// Version tag written into the materials file.
const MATERIALS_FILE_VERSION: u32 = 1;

#[derive(serde::Serialize, serde::Deserialize)]
struct MaterialsFile {
    version: u32,
    materials: Vec<MaterialCreateInfo>,
}

/// Owns the shader registry and the material/texture tables.
#[derive(Default)]
pub struct ResourceManager {
    shaders: Vec<Shader>,
    materials: Vec<Option<Material>>,
    textures: Vec<Option<Texture>>,

    /// Library of materials parsed from the materials file but not yet
    /// registered; looked up lazily by name.
    parsed_materials: FxHashMap<String, MaterialCreateInfo>,

    /// 1×1 white fallback, created by [`create_placeholders`](Self::create_placeholders).
    white_texture: TextureID,
    /// 1×1 black fallback.
    black_texture: TextureID,
    /// 1×1 flat (+Z) normal-map fallback.
    flat_normal_texture: TextureID,
}

impl ResourceManager {
    /// Creates empty tables and registers the base shader set.
    #[must_use]
    pub fn new() -> Self {
        let mut manager = Self {
            shaders: base_shaders(),
            ..Default::default()
        };
        manager.create_placeholders();
        log::info!("Registered {} base shaders", manager.shaders.len());
        manager
    }

    fn create_placeholders(&mut self) {
        self.white_texture =
            self.insert_texture(Texture::placeholder("white", [255, 255, 255, 255]));
        self.black_texture = self.insert_texture(Texture::placeholder("black", [0, 0, 0, 255]));
        self.flat_normal_texture =
            self.insert_texture(Texture::placeholder("flat_normal", [128, 128, 255, 255]));
    }

    // ========================================================================
    // Shaders
    // ========================================================================

    /// Looks up a shader by registry name.
    #[must_use]
    pub fn shader_id(&self, name: &str) -> Option<ShaderID> {
        self.shaders
            .iter()
            .position(|s| s.name == name)
            .map(|i| ShaderID::new(i as u32))
    }

    /// Shader by ID; `None` when the ID is invalid or out of range.
    #[must_use]
    pub fn shader(&self, id: ShaderID) -> Option<&Shader> {
        if !id.is_valid() {
            return None;
        }
        self.shaders.get(id.index() as usize)
    }

    /// Number of registered shaders.
    #[must_use]
    pub fn shader_count(&self) -> usize {
        self.shaders.len()
    }

    /// Iterates over all shaders with their IDs.
    pub fn shaders(&self) -> impl Iterator<Item = (ShaderID, &Shader)> {
        self.shaders
            .iter()
            .enumerate()
            .map(|(i, s)| (ShaderID::new(i as u32), s))
    }

    // ========================================================================
    // Materials
    // ========================================================================

    /// Lowest material ID not currently in use.
    #[must_use]
    pub fn next_available_material_id(&self) -> MaterialID {
        for (i, slot) in self.materials.iter().enumerate() {
            if slot.is_none() {
                return MaterialID::new(i as u32);
            }
        }
        MaterialID::new(self.materials.len() as u32)
    }

    /// Inserts `material` at `id`, growing the table as needed. Replaces
    /// any existing entry at that slot.
    pub fn insert_material(&mut self, id: MaterialID, material: Material) {
        let index = id.index() as usize;
        if index >= self.materials.len() {
            self.materials.resize_with(index + 1, || None);
        }
        self.materials[index] = Some(material);
    }

    /// Material by ID.
    #[must_use]
    pub fn material(&self, id: MaterialID) -> Option<&Material> {
        if !id.is_valid() {
            return None;
        }
        self.materials.get(id.index() as usize)?.as_ref()
    }

    /// Mutable material by ID.
    pub fn material_mut(&mut self, id: MaterialID) -> Option<&mut Material> {
        if !id.is_valid() {
            return None;
        }
        self.materials.get_mut(id.index() as usize)?.as_mut()
    }

    /// Linear name lookup over registered materials.
    #[must_use]
    pub fn material_id_by_name(&self, name: &str) -> Option<MaterialID> {
        self.materials
            .iter()
            .position(|m| m.as_ref().is_some_and(|m| m.name() == name))
            .map(|i| MaterialID::new(i as u32))
    }

    /// Takes a create info out of the parsed-materials library, if the
    /// materials file declared one under `name`.
    pub fn take_parsed_material(&mut self, name: &str) -> Option<MaterialCreateInfo> {
        self.parsed_materials.remove(name)
    }

    /// Removes one material; a no-op (logged) for invalid IDs.
    pub fn remove_material(&mut self, id: MaterialID) {
        match self
            .materials
            .get_mut(id.index() as usize)
            .and_then(Option::take)
        {
            Some(removed) => log::info!("Removed material {}", removed.name()),
            None => log::warn!("remove_material called with invalid ID {id}"),
        }
    }

    /// Removes all materials; when `destroy_engine_materials` is `false`,
    /// entries flagged `engine_material` survive.
    pub fn clear_materials(&mut self, destroy_engine_materials: bool) {
        for slot in &mut self.materials {
            let keep = !destroy_engine_materials
                && slot.as_ref().is_some_and(Material::is_engine_material);
            if !keep {
                *slot = None;
            }
        }
    }

    /// Iterates over registered materials with their IDs.
    pub fn materials(&self) -> impl Iterator<Item = (MaterialID, &Material)> {
        self.materials
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.as_ref().map(|m| (MaterialID::new(i as u32), m)))
    }

    /// Number of registered materials.
    #[must_use]
    pub fn material_count(&self) -> usize {
        self.materials.iter().filter(|m| m.is_some()).count()
    }

    // ========================================================================
    // Textures
    // ========================================================================

    /// 1×1 white fallback texture.
    #[inline]
    #[must_use]
    pub fn white_texture(&self) -> TextureID {
        self.white_texture
    }

    /// 1×1 black fallback texture.
    #[inline]
    #[must_use]
    pub fn black_texture(&self) -> TextureID {
        self.black_texture
    }

    /// 1×1 flat normal fallback texture.
    #[inline]
    #[must_use]
    pub fn flat_normal_texture(&self) -> TextureID {
        self.flat_normal_texture
    }

    fn insert_texture(&mut self, texture: Texture) -> TextureID {
        for (i, slot) in self.textures.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(texture);
                return TextureID::new(i as u32);
            }
        }
        self.textures.push(Some(texture));
        TextureID::new((self.textures.len() - 1) as u32)
    }

    /// Finds a loaded texture by path. Lookup is linear; image counts are
    /// in the hundreds.
    #[must_use]
    pub fn find_texture(&self, path: &str) -> Option<TextureID> {
        self.textures
            .iter()
            .position(|t| t.as_ref().is_some_and(|t| t.path == path))
            .map(|i| TextureID::new(i as u32))
    }

    /// Interns a texture file: returns the existing ID when `path` was
    /// loaded before, decodes and inserts it otherwise. A failed decode
    /// leaves the table unchanged.
    pub fn initialize_texture(
        &mut self,
        path: &Path,
        channel_count: u32,
        flip_vertically: bool,
        generate_mip_maps: bool,
        hdr: bool,
    ) -> Result<TextureID> {
        let key = path.to_string_lossy();
        if let Some(existing) = self.find_texture(&key) {
            return Ok(existing);
        }
        let texture = Texture::load(path, channel_count, flip_vertically, generate_mip_maps, hdr)?;
        Ok(self.insert_texture(texture))
    }

    /// Interns a six-face cubemap, deduplicated by its first face path.
    pub fn initialize_cubemap(
        &mut self,
        face_paths: &CubemapFacePaths,
        generate_mip_maps: bool,
    ) -> Result<TextureID> {
        if let Some(existing) = self.find_texture(&face_paths[0]) {
            return Ok(existing);
        }
        let texture = Texture::load_cubemap(face_paths, generate_mip_maps)?;
        Ok(self.insert_texture(texture))
    }

    /// Inserts a generated (GPU-rendered) image descriptor.
    pub fn insert_render_target_texture(&mut self, texture: Texture) -> TextureID {
        self.insert_texture(texture)
    }

    /// Refills a texture slot with a reloaded image, keeping the ID stable.
    /// Descriptor sets referencing the slot must be rewritten by the
    /// backend afterwards.
    pub fn replace_texture(&mut self, id: TextureID, texture: Texture) {
        if let Some(slot) = self.textures.get_mut(id.index() as usize) {
            *slot = Some(texture);
        } else {
            log::warn!("replace_texture called with invalid ID {id}");
        }
    }

    /// Texture by ID.
    #[must_use]
    pub fn texture(&self, id: TextureID) -> Option<&Texture> {
        if !id.is_valid() {
            return None;
        }
        self.textures.get(id.index() as usize)?.as_ref()
    }

    /// Number of loaded textures (including placeholders).
    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.textures.iter().filter(|t| t.is_some()).count()
    }

    // ========================================================================
    // Materials file
    // ========================================================================

    /// Parses the materials file into the lazy library. Entries are
    /// registered with the scene on first lookup by name.
    pub fn load_materials_file(&mut self, json: &str) -> Result<usize> {
        let file: MaterialsFile = serde_json::from_str(json)?;
        if file.version != MATERIALS_FILE_VERSION {
            log::warn!(
                "Materials file version {} (expected {MATERIALS_FILE_VERSION}); attempting to use it anyway",
                file.version
            );
        }
        let count = file.materials.len();
        for info in file.materials {
            self.parsed_materials.insert(info.name.clone(), info);
        }
        log::info!("Parsed {count} materials into the material library");
        Ok(count)
    }

    /// Serializes every registered serializable material back into the
    /// materials file format.
    pub fn serialize_materials_file(&self) -> Result<String> {
        let file = MaterialsFile {
            version: MATERIALS_FILE_VERSION,
            materials: self
                .materials
                .iter()
                .filter_map(|m| m.as_ref())
                .filter(|m| !m.is_engine_material())
                .map(|m| m.info.clone())
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }
}
