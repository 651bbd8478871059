//! The Renderer
//!
//! Backend-agnostic renderer core. Higher layers register resources and
//! submit draws through this type; once per frame [`Renderer::draw`] builds
//! the command stream (§ the frame graph in [`frame`]) and hands it to the
//! active backend.
//!
//! # Lifecycle
//!
//! 1. [`Renderer::new`] — CPU state only, no GPU resources.
//! 2. `Renderer::init` — creates the backend (device, surface, swapchain)
//!    and uploads already-registered geometry.
//! 3. Per frame: external collaborators push transforms, sprites, text and
//!    debug lines; [`Renderer::update`] does bookkeeping;
//!    [`Renderer::draw`] renders.
//! 4. Drop — waits for the GPU, joins the screenshot worker.
//!
//! All calls are main-thread; the only background work is the screenshot
//! encoder.

pub mod batches;
pub mod debug_draw;
pub mod frame;
pub mod ibl;
pub mod lights;
pub mod object;
pub mod screenshot;
pub mod shadows;
pub mod sprite;
pub mod ssao;
pub mod text_draw;
pub mod ui_mesh;
pub mod uniforms;

use std::path::{Path, PathBuf};

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use crate::backend::RenderBackend;
use crate::backend::cmd::TopologyMode;
use crate::errors::Result;
use crate::ids::{MaterialID, PointLightID, RenderID, ShaderID, TextureID};
use crate::mesh::PrefabShape;
use crate::resources::ResourceManager;
use crate::resources::material::{Material, MaterialCreateInfo, MaterialTextures};
use crate::resources::texture::Texture;
use crate::settings::{PhysicsDebuggingSettings, PostProcessSettings, RenderSettings};
use crate::text::{AtlasBakeParams, BitmapFont, FontDefinitionFile, bake_font};
use crate::vertex::{VertexBufferData, VertexBufferDataCreateInfo};

use self::batches::Batches;
use self::debug_draw::PhysicsDebugDraw;
use self::lights::{DirectionalLight, LightRegistry, PointLightData};
use self::object::{ObjectTable, RenderObject, RenderObjectCreateInfo};
use self::screenshot::ScreenshotEncoder;
use self::sprite::{AnchorPoint, SpriteQuadDrawInfo};
use self::text_draw::TextCache;
use self::ui_mesh::UiMesh;

/// Seconds between monitor DPI re-checks in [`Renderer::update`].
const DPI_CHECK_INTERVAL: f32 = 2.0;

/// Seconds an editor overlay string stays on screen.
const EDITOR_STRING_DURATION: f32 = 1.5;

/// Fraction of the duration over which the editor string fades out.
const EDITOR_STRING_FADE_PERCENT: f32 = 0.25;

/// Camera state pushed by the host each frame. Projections use reverse-Z
/// (swapped near/far); the renderer only consumes the matrices.
#[derive(Debug, Clone)]
pub struct CameraInput {
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
    pub near: f32,
    pub far: f32,
    pub exposure: f32,
}

impl Default for CameraInput {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            position: Vec3::ZERO,
            near: 0.1,
            far: 1000.0,
            exposure: 1.0,
        }
    }
}

/// IDs of the engine-owned materials and meshes created at startup. These
/// survive scene changes (`engine_material` is set on all of them).
#[derive(Debug, Default, Clone)]
pub(crate) struct EngineIds {
    // Materials
    pub shadow_mat: MaterialID,
    pub deferred_combine_mat: MaterialID,
    pub ssao_mat: MaterialID,
    pub ssao_blur_mat: MaterialID,
    pub post_process_mat: MaterialID,
    pub post_fxaa_mat: MaterialID,
    pub taa_resolve_mat: MaterialID,
    pub sprite_mat: MaterialID,
    pub font_ss_mat: MaterialID,
    pub font_ws_mat: MaterialID,
    pub selected_object_mat: MaterialID,
    pub debug_line_mat: MaterialID,
    pub ui_mat: MaterialID,
    pub placeholder_mat: MaterialID,
    pub brdf_mat: MaterialID,
    pub equirect_mat: MaterialID,
    pub irradiance_mat: MaterialID,
    pub prefilter_mat: MaterialID,
    pub grid_mat: MaterialID,
    pub world_axis_mat: MaterialID,

    // Meshes
    pub fullscreen_tri: RenderID,
    pub quad_3d: RenderID,
    pub unit_cube: RenderID,
    pub grid_obj: RenderID,
    pub world_axis_obj: RenderID,
}

/// The renderer core.
pub struct Renderer {
    pub(crate) settings: RenderSettings,
    pub(crate) resources: ResourceManager,
    pub(crate) objects: ObjectTable,
    pub(crate) batches: Batches,
    pub(crate) lights: LightRegistry,
    pub(crate) engine: EngineIds,

    pub(crate) camera: CameraInput,
    pub(crate) prev_view_proj: Mat4,
    pub(crate) window_size: (u32, u32),
    pub(crate) time: f32,
    frames_rendered: u32,
    pub(crate) taa_jitter_index: usize,

    physics_debug: PhysicsDebugDraw,
    physics_debug_settings: PhysicsDebuggingSettings,
    ui_mesh: UiMesh,

    pub(crate) fonts: Vec<BitmapFont>,
    pub(crate) text_caches: Vec<Vec<TextCache>>,
    fonts_file: FontDefinitionFile,
    current_font: Option<usize>,
    monitor_dpi: f32,
    dpi_check_timer: f32,
    dpi_check_due: bool,

    pub(crate) queued_ss_sprites: Vec<SpriteQuadDrawInfo>,
    pub(crate) queued_ws_sprites: Vec<SpriteQuadDrawInfo>,

    pub(crate) selected_objects: Vec<RenderID>,
    render_grid: bool,
    /// Grid opacity eased toward the toggle state each update.
    grid_fade: f32,
    display_bounding_volumes: bool,
    editor_message: String,
    editor_message_remaining: f32,

    pub(crate) ssao_kernel: Vec<Vec4>,
    pub(crate) capture_screenshot: bool,
    pub(crate) capture_reflection_probes: bool,
    /// Materials whose IBL chain runs at the start of the next frame.
    pub(crate) pending_ibl: Vec<MaterialID>,
    /// Whether the shared BRDF LUT has been rendered.
    pub(crate) brdf_lut_generated: bool,
    reflection_probe_material: MaterialID,

    screenshot: ScreenshotEncoder,
    backend: Option<Box<dyn RenderBackend>>,
}

impl Renderer {
    /// Phase 1: creates the renderer with its CPU-side state. No GPU
    /// resources are allocated; the resource tables, engine materials and
    /// engine meshes exist immediately so scenes can register content
    /// before the backend comes up.
    #[must_use]
    pub fn new(settings: RenderSettings) -> Self {
        let ssao_kernel = ssao::generate_ssao_kernel(settings.ssao_kernel_size);

        let mut renderer = Self {
            settings,
            resources: ResourceManager::new(),
            objects: ObjectTable::default(),
            batches: Batches::default(),
            lights: LightRegistry::default(),
            engine: EngineIds::default(),
            camera: CameraInput::default(),
            prev_view_proj: Mat4::IDENTITY,
            window_size: (0, 0),
            time: 0.0,
            frames_rendered: 0,
            taa_jitter_index: 0,
            physics_debug: PhysicsDebugDraw::default(),
            physics_debug_settings: PhysicsDebuggingSettings::default(),
            ui_mesh: UiMesh::default(),
            fonts: Vec::new(),
            text_caches: Vec::new(),
            fonts_file: FontDefinitionFile::default(),
            current_font: None,
            monitor_dpi: 96.0,
            dpi_check_timer: DPI_CHECK_INTERVAL,
            dpi_check_due: false,
            queued_ss_sprites: Vec::new(),
            queued_ws_sprites: Vec::new(),
            selected_objects: Vec::new(),
            render_grid: true,
            grid_fade: 1.0,
            display_bounding_volumes: false,
            editor_message: String::new(),
            editor_message_remaining: 0.0,
            ssao_kernel,
            capture_screenshot: false,
            capture_reflection_probes: false,
            pending_ibl: Vec::new(),
            brdf_lut_generated: false,
            reflection_probe_material: MaterialID::INVALID,
            screenshot: ScreenshotEncoder::new(),
            backend: None,
        };

        renderer.initialize_engine_materials();
        renderer.initialize_engine_meshes();
        log::info!("Renderer created ({} engine materials)", renderer.resources.material_count());
        renderer
    }

    // ========================================================================
    // Backend lifecycle
    // ========================================================================

    /// Phase 2 (explicit backend): creates the device, surface and
    /// swapchain for `window`, then uploads every registered render
    /// object.
    #[cfg(feature = "backend-wgpu")]
    pub async fn init<W>(&mut self, window: W, width: u32, height: u32) -> Result<()>
    where
        W: raw_window_handle::HasWindowHandle
            + raw_window_handle::HasDisplayHandle
            + Send
            + Sync
            + 'static,
    {
        if self.backend.is_some() {
            return Ok(());
        }
        let backend =
            crate::backend::wgpu::WgpuBackend::new(window, &self.settings, width, height).await?;
        self.install_backend(Box::new(backend), width, height);
        Ok(())
    }

    /// Phase 2 (state-machine backend): adopts a current GL context through
    /// its loader function, then uploads every registered render object.
    #[cfg(feature = "backend-gl")]
    pub fn init_gl(
        &mut self,
        loader: impl FnMut(&str) -> *const std::ffi::c_void,
        width: u32,
        height: u32,
    ) -> Result<()> {
        if self.backend.is_some() {
            return Ok(());
        }
        let backend = crate::backend::gl::GlBackend::new(loader, &self.settings, width, height)?;
        self.install_backend(Box::new(backend), width, height);
        Ok(())
    }

    #[allow(dead_code)]
    fn install_backend(&mut self, mut backend: Box<dyn RenderBackend>, width: u32, height: u32) {
        self.window_size = (width, height);
        self.ui_mesh.set_window_size(width, height);
        backend.set_vsync_enabled(self.settings.vsync);

        // Everything registered before init becomes resident now.
        let ids: Vec<RenderID> = self.objects.iter().map(|(id, _)| id).collect();
        self.backend = Some(backend);
        for id in ids {
            self.upload_object_geometry(id);
        }

        if let Some(backend) = &self.backend {
            log::info!("Renderer initialized with {} backend", backend.name());
        }
    }

    /// Uploads one object's vertex stream remapped to its shader's
    /// attribute layout; attributes the mesh lacks are filled with their
    /// defaults.
    fn upload_object_geometry(&mut self, id: RenderID) {
        let Some(object) = self.objects.get(id) else {
            return;
        };
        let shader_attrs = self
            .resources
            .material(object.material_id)
            .and_then(|m| self.resources.shader(m.shader_id))
            .map(|s| s.vertex_attributes);

        let data = &object.vertex_buffer_data;
        let (upload, indices) = match shader_attrs {
            Some(attrs) if attrs != data.attributes() => {
                let mut remapped = Vec::new();
                data.copy_into(&mut remapped, attrs);
                let mut mapped = VertexBufferData::initialize_dynamic(attrs, 0);
                mapped.update_data(&remapped);
                (mapped, object.indices.clone())
            }
            _ => (data.clone(), object.indices.clone()),
        };

        if let Some(backend) = &mut self.backend {
            backend.upload_render_object(id, &upload, indices.as_deref());
        }
    }

    /// Whether a backend is installed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    // ========================================================================
    // Engine resources
    // ========================================================================

    fn engine_material(&mut self, name: &str, shader: &str) -> MaterialID {
        let info = MaterialCreateInfo {
            name: name.to_string(),
            shader_name: shader.to_string(),
            engine_material: true,
            ..Default::default()
        };
        self.initialize_material(&info, None)
    }

    fn initialize_engine_materials(&mut self) {
        self.engine.shadow_mat = self.engine_material("engine.shadow", "shadow");
        self.engine.deferred_combine_mat =
            self.engine_material("engine.deferred_combine", "deferred_combine");
        self.engine.ssao_mat = self.engine_material("engine.ssao", "ssao");
        self.engine.ssao_blur_mat = self.engine_material("engine.ssao_blur", "ssao_blur");
        self.engine.post_process_mat =
            self.engine_material("engine.post_process", "post_process");
        self.engine.post_fxaa_mat = self.engine_material("engine.post_fxaa", "post_fxaa");
        self.engine.taa_resolve_mat = self.engine_material("engine.taa_resolve", "taa_resolve");
        self.engine.sprite_mat = self.engine_material("engine.sprite", "sprite");
        self.engine.font_ss_mat = self.engine_material("engine.font_ss", "font_ss");
        self.engine.font_ws_mat = self.engine_material("engine.font_ws", "font_ws");
        self.engine.debug_line_mat = self.engine_material("engine.debug_line", "color");
        self.engine.ui_mat = self.engine_material("engine.ui", "ui");
        self.engine.brdf_mat = self.engine_material("engine.brdf", "brdf");
        self.engine.equirect_mat =
            self.engine_material("engine.equirect", "equirectangular_to_cube");
        self.engine.irradiance_mat = self.engine_material("engine.irradiance", "irradiance");
        self.engine.prefilter_mat = self.engine_material("engine.prefilter", "prefilter");
        self.engine.grid_mat = self.engine_material("engine.grid", "color");
        self.engine.world_axis_mat = self.engine_material("engine.world_axis", "color");

        // Selected-object override: flat color, pulsing multiplier.
        let selected = MaterialCreateInfo {
            name: "engine.selected_object".into(),
            shader_name: "color".into(),
            color_multiplier: [1.0, 0.58, 0.12, 1.0],
            engine_material: true,
            ..Default::default()
        };
        self.engine.selected_object_mat = self.initialize_material(&selected, None);

        // Bright pink fallback for failed shader compiles.
        let placeholder = MaterialCreateInfo {
            name: "engine.placeholder".into(),
            shader_name: "color".into(),
            color_multiplier: [1.0, 0.0, 1.0, 1.0],
            engine_material: true,
            ..Default::default()
        };
        self.engine.placeholder_mat = self.initialize_material(&placeholder, None);
    }

    fn initialize_engine_meshes(&mut self) {
        // Fullscreen triangle for the shading, SSAO, post and LUT passes.
        let tri = VertexBufferDataCreateInfo {
            attributes: crate::vertex::VertexAttributes::POSITION
                | crate::vertex::VertexAttributes::UV,
            positions_3: vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(3.0, -1.0, 0.0),
                Vec3::new(-1.0, 3.0, 0.0),
            ],
            tex_coords: vec![
                Vec2::new(0.0, 0.0),
                Vec2::new(2.0, 0.0),
                Vec2::new(0.0, 2.0),
            ],
            ..Default::default()
        };
        let mut info = RenderObjectCreateInfo::new(
            self.engine.deferred_combine_mat,
            VertexBufferData::initialize(&tri),
        );
        info.visible = false; // engine meshes are drawn explicitly, never batched
        info.visible_in_scene_explorer = false;
        self.engine.fullscreen_tri = self.initialize_render_object(info);

        // Unit sprite/text quad.
        let (quad, quad_indices) = PrefabShape::Plane.generate().build();
        let mut info = RenderObjectCreateInfo::new(self.engine.sprite_mat, quad);
        info.indices = Some(quad_indices);
        info.visible = false;
        info.visible_in_scene_explorer = false;
        self.engine.quad_3d = self.initialize_render_object(info);

        // Capture cube for the IBL chain.
        let (cube, cube_indices) = PrefabShape::Skybox.generate().build();
        let mut info = RenderObjectCreateInfo::new(self.engine.equirect_mat, cube);
        info.indices = Some(cube_indices);
        info.visible = false;
        info.visible_in_scene_explorer = false;
        self.engine.unit_cube = self.initialize_render_object(info);

        // Editor grid + world axes (depth-aware editor objects).
        let (grid, _) = PrefabShape::Grid { half_extent: 20 }.generate().build();
        let mut info = RenderObjectCreateInfo::new(self.engine.grid_mat, grid);
        info.editor_object = true;
        info.topology = TopologyMode::LineList;
        info.visible_in_scene_explorer = false;
        self.engine.grid_obj = self.initialize_render_object(info);

        let (axes, _) = PrefabShape::WorldAxisGround { half_length: 20.0 }
            .generate()
            .build();
        let mut info = RenderObjectCreateInfo::new(self.engine.world_axis_mat, axes);
        info.editor_object = true;
        info.topology = TopologyMode::LineList;
        info.visible_in_scene_explorer = false;
        self.engine.world_axis_obj = self.initialize_render_object(info);
    }

    // ========================================================================
    // Materials & textures
    // ========================================================================

    /// Registers a material from `create_info`, interning every referenced
    /// texture and resolving the shader by name. Returns
    /// `MaterialID::INVALID` (logged) when the shader name is unknown.
    /// `replace` refills an existing slot instead of allocating.
    pub fn initialize_material(
        &mut self,
        create_info: &MaterialCreateInfo,
        replace: Option<MaterialID>,
    ) -> MaterialID {
        let Some(shader_id) = self.resources.shader_id(&create_info.shader_name) else {
            log::error!(
                "initialize_material: unknown shader '{}' for material '{}'",
                create_info.shader_name,
                create_info.name
            );
            return MaterialID::INVALID;
        };

        let textures = self.intern_material_textures(create_info);

        let id = replace.unwrap_or_else(|| self.resources.next_available_material_id());
        self.resources.insert_material(
            id,
            Material {
                info: create_info.clone(),
                shader_id,
                textures,
            },
        );
        self.batches.mark_dirty();
        log::info!("Initialized material '{}' as {id}", create_info.name);
        id
    }

    fn intern_slot(&mut self, path: &str, hdr: bool, mips: bool) -> TextureID {
        if path.is_empty() {
            return TextureID::INVALID;
        }
        match self
            .resources
            .initialize_texture(Path::new(path), 4, false, mips, hdr)
        {
            Ok(id) => id,
            Err(e) => {
                log::warn!("{e}; substituting white placeholder");
                self.resources.white_texture()
            }
        }
    }

    fn intern_material_textures(&mut self, info: &MaterialCreateInfo) -> MaterialTextures {
        let mut textures = MaterialTextures::default();

        if info.albedo.enabled || info.albedo.generate {
            textures.albedo = self.intern_slot(&info.albedo.path, false, true);
        }
        if info.normal.enabled || info.normal.generate {
            textures.normal = self.intern_slot(&info.normal.path, false, true);
        }
        if info.metallic.enabled || info.metallic.generate {
            textures.metallic = self.intern_slot(&info.metallic.path, false, true);
        }
        if info.roughness.enabled || info.roughness.generate {
            textures.roughness = self.intern_slot(&info.roughness.path, false, true);
        }
        if info.ao.enabled || info.ao.generate {
            textures.ao = self.intern_slot(&info.ao.path, false, true);
        }
        if info.hdr_equirectangular.enabled || info.hdr_equirectangular.generate {
            textures.hdr_equirectangular =
                self.intern_slot(&info.hdr_equirectangular.path, true, false);
        }

        // Environment cubemap: explicit faces, or a generated target.
        if info.cubemap_paths.iter().any(|p| !p.is_empty()) {
            match self.resources.initialize_cubemap(&info.cubemap_paths, false) {
                Ok(id) => textures.cubemap = id,
                Err(e) => {
                    log::warn!("{e}; substituting white placeholder");
                    textures.cubemap = self.resources.white_texture();
                }
            }
        } else if info.generate_cubemap_sampler {
            let size = info.generated_cubemap_size.x.max(1.0) as u32;
            textures.cubemap = self.resources.insert_render_target_texture(
                Texture::render_target(
                    &format!("{}.env_cubemap", info.name),
                    size,
                    size,
                    true,
                    true,
                    if info.enable_cubemap_trilinear_filtering {
                        Texture::mip_count(size, size)
                    } else {
                        1
                    },
                ),
            );
        }

        if info.generate_irradiance_sampler {
            let size = info.generated_irradiance_cubemap_size.x.max(1.0) as u32;
            textures.irradiance = self.resources.insert_render_target_texture(
                Texture::render_target(&format!("{}.irradiance", info.name), size, size, true, true, 1),
            );
        }
        if info.generate_prefiltered_map {
            let size = info.generated_prefiltered_cubemap_size.x.max(1.0) as u32;
            textures.prefiltered = self.resources.insert_render_target_texture(
                Texture::render_target(
                    &format!("{}.prefilter", info.name),
                    size,
                    size,
                    true,
                    true,
                    ibl::PREFILTER_MIP_LEVELS,
                ),
            );
        }

        textures
    }

    /// Interns a texture file, deduplicated by path.
    pub fn initialize_texture(
        &mut self,
        path: &Path,
        channel_count: u32,
        flip_vertically: bool,
        generate_mip_maps: bool,
        hdr: bool,
    ) -> TextureID {
        match self.resources.initialize_texture(
            path,
            channel_count,
            flip_vertically,
            generate_mip_maps,
            hdr,
        ) {
            Ok(id) => id,
            Err(e) => {
                log::warn!("{e}");
                TextureID::INVALID
            }
        }
    }

    /// Removes one material; invalid IDs are a logged no-op.
    pub fn remove_material(&mut self, id: MaterialID) {
        self.resources.remove_material(id);
        self.batches.mark_dirty();
    }

    /// Removes all materials; engine materials survive unless
    /// `destroy_engine_mats` is set.
    pub fn clear_materials(&mut self, destroy_engine_mats: bool) {
        self.resources.clear_materials(destroy_engine_mats);
        self.batches.mark_dirty();
    }

    /// Material name lookup, falling through to the parsed materials file:
    /// a match there is lazily registered and its new ID returned.
    pub fn get_material_id_by_name(&mut self, name: &str) -> Option<MaterialID> {
        if let Some(id) = self.resources.material_id_by_name(name) {
            return Some(id);
        }
        let info = self.resources.take_parsed_material(name)?;
        log::info!("Lazily registering material '{name}' from the material library");
        let id = self.initialize_material(&info, None);
        id.is_valid().then_some(id)
    }

    /// Shader registry lookup by name.
    #[must_use]
    pub fn get_shader_id(&self, name: &str) -> Option<ShaderID> {
        self.resources.shader_id(name)
    }

    /// Access to the resource tables.
    #[must_use]
    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    /// The bright-pink fallback material.
    #[must_use]
    pub fn placeholder_material_id(&self) -> MaterialID {
        self.engine.placeholder_mat
    }

    /// Loads the materials file into the lazy library.
    pub fn load_materials_file(&mut self, json: &str) -> Result<usize> {
        self.resources.load_materials_file(json)
    }

    /// Serializes all scene materials back to the materials file format.
    pub fn serialize_materials_file(&self) -> Result<String> {
        self.resources.serialize_materials_file()
    }

    // ========================================================================
    // Render objects
    // ========================================================================

    /// Registers a render object, assigning the lowest free ID and marking
    /// the batch cache dirty. Geometry is uploaded immediately when a
    /// backend is installed.
    pub fn initialize_render_object(&mut self, create_info: RenderObjectCreateInfo) -> RenderID {
        let id = self.objects.next_available_render_id();
        let object: RenderObject = create_info.into();
        self.objects.insert(id, object);

        if self.backend.is_some() {
            self.upload_object_geometry(id);
        }

        self.batches.mark_dirty();
        id
    }

    /// Runs the generated-map chain for objects whose material requests it.
    /// Must be called after all static geometry is uploaded, because
    /// reflection-probe materials render the scene into their cubemap.
    pub fn post_initialize_render_object(&mut self, id: RenderID) {
        let Some(material_id) = self.objects.get(id).map(|o| o.material_id) else {
            log::warn!("post_initialize_render_object: invalid ID {id}");
            return;
        };
        let Some(material) = self.resources.material(material_id) else {
            return;
        };
        let generates_probe_maps = material.info.generate_reflection_probe_maps;
        let generates_ibl = material.generates_ibl();

        if generates_probe_maps {
            self.reflection_probe_material = material_id;
            self.capture_reflection_probes = true;
        } else if generates_ibl {
            self.generate_ibl_maps(material_id);
        }
    }

    /// Queues the IBL precompute chain for `material` on the next frame.
    pub(crate) fn generate_ibl_maps(&mut self, material: MaterialID) {
        if !self.pending_ibl.contains(&material) {
            self.pending_ibl.push(material);
        }
    }

    /// Destroys a render object, freeing its ID for reuse.
    pub fn destroy_render_object(&mut self, id: RenderID) {
        if self.objects.remove(id).is_none() {
            log::warn!("destroy_render_object: invalid ID {id}");
            return;
        }
        if let Some(backend) = &mut self.backend {
            backend.destroy_render_object(id);
        }
        self.batches.mark_dirty();
    }

    /// Rewrites a render object's vertex stream in place.
    pub fn update_vertex_data(
        &mut self,
        id: RenderID,
        data: VertexBufferData,
        indices: Option<Vec<u32>>,
    ) {
        let Some(object) = self.objects.get_mut(id) else {
            log::warn!("update_vertex_data: invalid ID {id}");
            return;
        };
        object.vertex_buffer_data = data;
        object.indices = indices;
        if self.backend.is_some() {
            self.upload_object_geometry(id);
        }
    }

    /// Sets a render object's primitive topology.
    pub fn set_topology_mode(&mut self, id: RenderID, topology: TopologyMode) {
        match self.objects.get_mut(id) {
            Some(object) => {
                object.topology = topology;
                self.batches.mark_dirty();
            }
            None => log::warn!("set_topology_mode: invalid ID {id}"),
        }
    }

    /// Rebinds a render object to another material. Geometry re-uploads
    /// since the new shader may consume a different attribute set.
    pub fn set_render_object_material_id(&mut self, id: RenderID, material: MaterialID) {
        match self.objects.get_mut(id) {
            Some(object) => object.material_id = material,
            None => {
                log::warn!("set_render_object_material_id: invalid ID {id}");
                return;
            }
        }
        if self.backend.is_some() {
            self.upload_object_geometry(id);
        }
        self.batches.mark_dirty();
    }

    /// Material bound to a render object.
    #[must_use]
    pub fn get_material_id(&self, id: RenderID) -> MaterialID {
        self.objects
            .get(id)
            .map_or(MaterialID::INVALID, |o| o.material_id)
    }

    /// Updates a render object's world transform.
    pub fn set_render_object_transform(&mut self, id: RenderID, transform: Mat4) {
        match self.objects.get_mut(id) {
            Some(object) => object.transform = transform,
            None => log::warn!("set_render_object_transform: invalid ID {id}"),
        }
    }

    /// Shows or hides a render object.
    pub fn set_render_object_visible(&mut self, id: RenderID, visible: bool) {
        match self.objects.get_mut(id) {
            Some(object) => {
                if object.visible != visible {
                    object.visible = visible;
                    self.batches.mark_dirty();
                }
            }
            None => log::warn!("set_render_object_visible: invalid ID {id}"),
        }
    }

    /// Flags the batch cache dirty after out-of-band object state edits.
    pub fn render_object_state_changed(&mut self) {
        self.batches.mark_dirty();
    }

    /// Number of live render objects.
    #[must_use]
    pub fn get_render_object_count(&self) -> usize {
        self.objects.count()
    }

    /// Render object table capacity.
    #[must_use]
    pub fn get_render_object_capacity(&self) -> usize {
        self.objects.capacity()
    }

    // ========================================================================
    // Scene lifecycle
    // ========================================================================

    /// Called before a scene unloads: non-engine materials and all scene
    /// render objects are dropped.
    pub fn on_pre_scene_change(&mut self) {
        let engine_objects = [
            self.engine.fullscreen_tri,
            self.engine.quad_3d,
            self.engine.unit_cube,
            self.engine.grid_obj,
            self.engine.world_axis_obj,
        ];
        let scene_objects: Vec<RenderID> = self
            .objects
            .iter()
            .map(|(id, _)| id)
            .filter(|id| !engine_objects.contains(id))
            .collect();
        for id in scene_objects {
            self.destroy_render_object(id);
        }

        self.clear_materials(false);
        self.lights.remove_all_point_lights();
        self.lights.remove_directional_light();
        self.selected_objects.clear();
        self.ui_mesh.clear();
        log::info!("Pre-scene-change cleanup complete");
    }

    /// Called once the new scene has loaded and post-initialized.
    pub fn on_post_scene_change(&mut self) {
        self.batches.mark_dirty();
        self.prev_view_proj = self.camera.projection * self.camera.view;
    }

    // ========================================================================
    // Camera, window, settings
    // ========================================================================

    /// Pushes the frame's camera state.
    pub fn set_camera(&mut self, camera: CameraInput) {
        self.camera = camera;
    }

    /// Resizes every size-dependent resource.
    pub fn on_window_size_changed(&mut self, width: u32, height: u32) {
        self.window_size = (width, height);
        self.ui_mesh.set_window_size(width, height);
        if let Some(backend) = &mut self.backend {
            backend.on_window_size_changed(width, height);
        }
    }

    /// Sets the HDR target clear color.
    pub fn set_clear_color(&mut self, r: f32, g: f32, b: f32) {
        self.settings.clear_color = [r, g, b, 1.0];
    }

    /// Toggles vertical sync.
    pub fn set_vsync_enabled(&mut self, enabled: bool) {
        self.settings.vsync = enabled;
        if let Some(backend) = &mut self.backend {
            backend.set_vsync_enabled(enabled);
        }
    }

    /// Whether vsync is on.
    #[must_use]
    pub fn is_vsync_enabled(&self) -> bool {
        self.settings.vsync
    }

    /// The post-process settings, editable between frames.
    pub fn post_process_settings_mut(&mut self) -> &mut PostProcessSettings {
        &mut self.settings.post
    }

    /// Current render settings.
    #[must_use]
    pub fn render_settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Whether TAA is enabled.
    #[must_use]
    pub fn is_taa_enabled(&self) -> bool {
        self.settings.enable_taa
    }

    /// Number of TAA jitter samples in the sequence.
    #[must_use]
    pub fn taa_sample_count(&self) -> usize {
        crate::settings::TAA_SAMPLE_COUNT
    }

    /// Writes the serializable settings to `path` as JSON.
    pub fn save_settings(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        std::fs::write(path, json)?;
        log::info!("Saved renderer settings to {}", path.display());
        Ok(())
    }

    /// Loads settings previously written by [`save_settings`](Self::save_settings).
    pub fn load_settings(&mut self, path: &Path) -> Result<()> {
        let json = std::fs::read_to_string(path)?;
        let settings: RenderSettings = serde_json::from_str(&json)?;
        let vsync = settings.vsync;
        self.ssao_kernel = ssao::generate_ssao_kernel(settings.ssao_kernel_size);
        self.settings = settings;
        self.set_vsync_enabled(vsync);
        Ok(())
    }

    // ========================================================================
    // Lights
    // ========================================================================

    /// Registers the directional light; `false` when one already exists.
    pub fn register_directional_light(&mut self, light: DirectionalLight) -> bool {
        self.lights.register_directional_light(light)
    }

    /// Removes the directional light.
    pub fn remove_directional_light(&mut self) {
        self.lights.remove_directional_light();
    }

    /// The directional light, if registered.
    #[must_use]
    pub fn directional_light(&self) -> Option<&DirectionalLight> {
        self.lights.directional_light()
    }

    /// Mutable directional light access for editor tweaks.
    pub fn directional_light_mut(&mut self) -> Option<&mut DirectionalLight> {
        self.lights.directional_light_mut()
    }

    /// Registers a point light into the lowest free slot.
    pub fn register_point_light(&mut self, light: PointLightData) -> PointLightID {
        self.lights.register_point_light(light)
    }

    /// Overwrites a point light's data.
    pub fn update_point_light(&mut self, id: PointLightID, data: PointLightData) {
        self.lights.update_point_light(id, data);
    }

    /// Removes one point light.
    pub fn remove_point_light(&mut self, id: PointLightID) {
        self.lights.remove_point_light(id);
    }

    /// Removes every point light.
    pub fn remove_all_point_lights(&mut self) {
        self.lights.remove_all_point_lights();
    }

    /// A registered point light.
    #[must_use]
    pub fn get_point_light(&self, id: PointLightID) -> Option<&PointLightData> {
        self.lights.point_light(id)
    }

    /// Number of registered point lights.
    #[must_use]
    pub fn point_light_count(&self) -> usize {
        self.lights.point_light_count()
    }

    // ========================================================================
    // Fonts & text
    // ========================================================================

    /// Parses the font definition file.
    pub fn load_font_definitions(&mut self, json: &str) -> Result<usize> {
        self.fonts_file = serde_json::from_str(json)?;
        Ok(self.fonts_file.fonts.len())
    }

    /// Serializes the font definition file back to JSON.
    pub fn serialize_font_definitions(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.fonts_file)?)
    }

    /// Bakes (or reloads from the cached SDF image) every declared font.
    /// Existing fonts are replaced; their caches are dropped.
    pub fn load_fonts(&mut self, force_render: bool) {
        self.fonts.clear();
        self.text_caches.clear();
        self.current_font = None;

        let metas = self.fonts_file.fonts.clone();
        for meta in metas {
            let atlas_path = Self::font_atlas_path(&meta.file_path, meta.size);
            match bake_font(
                &meta,
                self.monitor_dpi,
                &atlas_path,
                force_render,
                AtlasBakeParams::default(),
            ) {
                Ok(baked) => {
                    let atlas = self.register_font_atlas(&atlas_path, &baked);
                    self.fonts.push(BitmapFont {
                        size_px: f32::from(meta.size) * self.monitor_dpi / 96.0,
                        meta,
                        metrics: baked.metrics,
                        kerning: baked.kerning,
                        atlas,
                        atlas_size: baked.atlas_size,
                        freshly_rendered: baked.freshly_rendered,
                    });
                    self.text_caches.push(Vec::new());
                }
                Err(e) => log::warn!("Failed to load font {}: {e}", meta.name),
            }
        }

        if !self.fonts.is_empty() {
            self.current_font = Some(0);
        }
    }

    /// Cached SDF image path for a font file + size.
    #[must_use]
    pub fn font_atlas_path(font_file: &str, size: i16) -> PathBuf {
        let path = Path::new(font_file);
        let stem = path.file_stem().map_or_else(String::new, |s| {
            s.to_string_lossy().into_owned()
        });
        path.with_file_name(format!("{stem}-{size}-sdf.png"))
    }

    fn register_font_atlas(
        &mut self,
        atlas_path: &Path,
        baked: &crate::text::atlas::BakedAtlas,
    ) -> TextureID {
        let key = atlas_path.to_string_lossy().into_owned();
        if let Some(existing) = self.resources.find_texture(&key) {
            if let Some(image) = &baked.image {
                let mut texture = Texture::render_target(
                    &key,
                    baked.atlas_size.0,
                    baked.atlas_size.1,
                    false,
                    false,
                    1,
                );
                texture.data = crate::resources::texture::TextureData::Ldr(image.clone().into_raw());
                self.resources.replace_texture(existing, texture);
                if let Some(backend) = &mut self.backend {
                    backend.on_texture_replaced(existing);
                }
            }
            return existing;
        }

        let mut texture = Texture::render_target(
            &key,
            baked.atlas_size.0,
            baked.atlas_size.1,
            false,
            false,
            1,
        );
        if let Some(image) = &baked.image {
            texture.data = crate::resources::texture::TextureData::Ldr(image.clone().into_raw());
        }
        self.resources.insert_render_target_texture(texture)
    }

    /// Selects the current font by definition name.
    pub fn set_font(&mut self, name: &str) -> bool {
        match self.fonts.iter().position(|f| f.meta.name == name) {
            Some(i) => {
                self.current_font = Some(i);
                true
            }
            None => {
                log::warn!("set_font: unknown font '{name}'");
                false
            }
        }
    }

    /// The selected font.
    #[must_use]
    pub fn current_font(&self) -> Option<&BitmapFont> {
        self.current_font.and_then(|i| self.fonts.get(i))
    }

    /// Queues a screen-space string in the current font. Empty strings are
    /// a no-op.
    pub fn draw_string_ss(
        &mut self,
        text: &str,
        color: Vec4,
        anchor: AnchorPoint,
        pos: Vec2,
        letter_spacing: f32,
        scale: f32,
    ) {
        if text.is_empty() {
            return;
        }
        let Some(font) = self.current_font else {
            log::warn!("draw_string_ss called with no font loaded");
            return;
        };
        self.text_caches[font].push(TextCache {
            text: text.to_string(),
            anchor,
            position: pos.extend(0.0),
            rotation: Quat::IDENTITY,
            color,
            letter_spacing,
            scale,
        });
    }

    /// Queues a world-space string in the current font. Empty strings are
    /// a no-op.
    pub fn draw_string_ws(
        &mut self,
        text: &str,
        color: Vec4,
        pos: Vec3,
        rotation: Quat,
        letter_spacing: f32,
        scale: f32,
    ) {
        if text.is_empty() {
            return;
        }
        let Some(font) = self.current_font else {
            log::warn!("draw_string_ws called with no font loaded");
            return;
        };
        self.text_caches[font].push(TextCache {
            text: text.to_string(),
            anchor: AnchorPoint::Raw,
            position: pos,
            rotation,
            color,
            letter_spacing,
            scale,
        });
    }

    /// String width in pixels (or normalized to window width).
    #[must_use]
    pub fn get_string_width(&self, text: &str, letter_spacing: f32, normalized: bool) -> f32 {
        let Some(font) = self.current_font() else {
            return 0.0;
        };
        let px = font.string_width(text, letter_spacing);
        if normalized {
            px / (self.window_size.0.max(1) as f32)
        } else {
            px
        }
    }

    /// String height in pixels (or normalized to window height).
    #[must_use]
    pub fn get_string_height(&self, text: &str, normalized: bool) -> f32 {
        let Some(font) = self.current_font() else {
            return 0.0;
        };
        let px = font.string_height(text);
        if normalized {
            px / (self.window_size.1.max(1) as f32)
        } else {
            px
        }
    }

    /// Shows `text` centered on screen for a short time; an empty string
    /// clears the current message immediately.
    pub fn add_editor_string(&mut self, text: &str) {
        self.editor_message = text.to_string();
        self.editor_message_remaining = if text.is_empty() {
            0.0
        } else {
            EDITOR_STRING_DURATION
        };
    }

    pub(crate) fn editor_message_alpha(&self) -> f32 {
        if self.editor_message.is_empty() || self.editor_message_remaining <= 0.0 {
            return 0.0;
        }
        let fade_window = EDITOR_STRING_DURATION * EDITOR_STRING_FADE_PERCENT;
        (self.editor_message_remaining / fade_window).min(1.0)
    }

    pub(crate) fn editor_message(&self) -> &str {
        &self.editor_message
    }

    // ========================================================================
    // Sprites
    // ========================================================================

    /// Queues one sprite for this frame.
    pub fn enqueue_sprite(&mut self, info: SpriteQuadDrawInfo) {
        if info.screen_space {
            self.queued_ss_sprites.push(info);
        } else {
            self.queued_ws_sprites.push(info);
        }
    }

    /// Queues an untextured, anchored screen-space quad.
    pub fn enqueue_untextured_quad(
        &mut self,
        pos: Vec2,
        anchor: AnchorPoint,
        size: Vec2,
        color: Vec4,
    ) {
        self.enqueue_sprite(SpriteQuadDrawInfo {
            texture: self.resources.white_texture(),
            pos: pos.extend(0.0),
            anchor,
            scale: size.extend(1.0),
            color,
            screen_space: true,
            ..Default::default()
        });
    }

    /// Queues an untextured quad at raw pixel coordinates.
    pub fn enqueue_untextured_quad_raw(&mut self, pos: Vec2, size: Vec2, color: Vec4) {
        self.enqueue_untextured_quad(pos, AnchorPoint::Raw, size, color);
    }

    // ========================================================================
    // Physics debug & UI mesh
    // ========================================================================

    /// The physics debug drawer fed by the physics step.
    pub fn physics_debug_drawer(&mut self) -> &mut PhysicsDebugDraw {
        &mut self.physics_debug
    }

    pub(crate) fn physics_debug(&self) -> &PhysicsDebugDraw {
        &self.physics_debug
    }

    /// The physics debug toggles; applied to the drawer every update.
    pub fn physics_debugging_settings_mut(&mut self) -> &mut PhysicsDebuggingSettings {
        &mut self.physics_debug_settings
    }

    /// The per-frame UI mesh builder.
    pub fn ui_mesh(&mut self) -> &mut UiMesh {
        &mut self.ui_mesh
    }

    pub(crate) fn ui_mesh_ref(&self) -> &UiMesh {
        &self.ui_mesh
    }

    // ========================================================================
    // Editor state
    // ========================================================================

    /// Replaces the selected-object set drawn with the wireframe override.
    pub fn set_selected_objects(&mut self, selected: Vec<RenderID>) {
        self.selected_objects = selected;
    }

    /// Pulsing color multiplier for the selected-object pass.
    #[must_use]
    pub fn get_selected_object_color_multiplier(&self) -> Vec4 {
        let pulse = (self.time * 4.0).sin() * 0.2 + 0.8;
        Vec4::new(pulse, pulse * 0.6, 0.12, 1.0)
    }

    /// Toggles the editor grid.
    pub fn toggle_render_grid(&mut self) {
        self.render_grid = !self.render_grid;
    }

    /// Whether the editor grid is drawn.
    #[must_use]
    pub fn is_rendering_grid(&self) -> bool {
        self.render_grid
    }

    /// Sets the editor grid visibility.
    pub fn set_render_grid(&mut self, render_grid: bool) {
        self.render_grid = render_grid;
    }

    /// Current grid opacity.
    pub(crate) fn grid_fade(&self) -> f32 {
        self.grid_fade
    }

    /// Toggles bounding volume visualization.
    pub fn set_display_bounding_volumes(&mut self, enabled: bool) {
        self.display_bounding_volumes = enabled;
    }

    /// Whether bounding volumes are drawn.
    #[must_use]
    pub fn is_display_bounding_volumes_enabled(&self) -> bool {
        self.display_bounding_volumes
    }

    // ========================================================================
    // Reflection probes & screenshots
    // ========================================================================

    /// Sets the material whose probe maps
    /// [`recapture_reflection_probe`](Self::recapture_reflection_probe) refreshes.
    pub fn set_reflection_probe_material(&mut self, material: MaterialID) {
        self.reflection_probe_material = material;
    }

    /// Requests a scene capture into the reflection probe's cubemap on the
    /// next frame, followed by irradiance + prefilter regeneration.
    pub fn recapture_reflection_probe(&mut self) {
        if self.reflection_probe_material.is_valid() {
            self.capture_reflection_probes = true;
        } else {
            log::warn!("recapture_reflection_probe: no reflection probe material set");
        }
    }

    pub(crate) fn reflection_probe_material(&self) -> MaterialID {
        self.reflection_probe_material
    }

    /// Requests a screenshot of this frame's backbuffer.
    pub fn request_screenshot(&mut self) {
        self.capture_screenshot = true;
    }

    // ========================================================================
    // Per-frame driving
    // ========================================================================

    /// Per-frame bookkeeping: screenshot completion, monitor DPI cadence,
    /// editor overlay fade, physics debug mode refresh and the first-frame
    /// reflection probe capture rule.
    pub fn update(&mut self, dt: f32) {
        self.time += dt;

        self.screenshot.poll_completed();

        self.dpi_check_timer -= dt;
        if self.dpi_check_timer <= 0.0 {
            self.dpi_check_timer = DPI_CHECK_INTERVAL;
            self.dpi_check_due = true;
        }

        if self.editor_message_remaining > 0.0 {
            self.editor_message_remaining -= dt;
            if self.editor_message_remaining <= 0.0 {
                self.editor_message.clear();
            }
        }

        let settings = self.physics_debug_settings;
        self.physics_debug.update_debug_mode(&settings);

        // Grid fades in and out over a quarter second.
        let fade_target = if self.render_grid { 1.0 } else { 0.0 };
        let step = dt * 4.0;
        self.grid_fade = if self.grid_fade < fade_target {
            (self.grid_fade + step).min(fade_target)
        } else {
            (self.grid_fade - step).max(fade_target)
        };

        // First-frame rule: capture the probe once static geometry exists.
        if self.frames_rendered == 1 && self.reflection_probe_material.is_valid() {
            self.capture_reflection_probes = true;
        }
    }

    /// Whether the 2-second DPI poll cadence elapsed; clears the flag.
    /// The host answers by calling [`set_monitor_dpi`](Self::set_monitor_dpi).
    pub fn take_dpi_check_due(&mut self) -> bool {
        std::mem::take(&mut self.dpi_check_due)
    }

    /// Sets the monitor DPI used by font baking.
    pub fn set_monitor_dpi(&mut self, dpi: f32) {
        if (dpi - self.monitor_dpi).abs() > 0.5 {
            self.monitor_dpi = dpi;
            log::info!("Monitor DPI changed to {dpi}; fonts reload on next load_fonts");
        }
    }

    /// Renders one frame: builds the command stream, executes it on the
    /// backend, services the screenshot request and resets per-frame
    /// queues. Headless (no backend) builds and discards the stream, which
    /// keeps the CPU side exercised in tests.
    pub fn draw(&mut self) -> Result<()> {
        let frame = self.build_frame_commands();

        if let Some(backend) = &mut self.backend {
            backend.execute_frame(&frame, &self.resources)?;

            if frame.capture_screenshot {
                match backend.read_backbuffer() {
                    Ok(image) => self
                        .screenshot
                        .submit(image, ScreenshotEncoder::default_path()),
                    Err(e) => log::error!("Backbuffer read failed: {e}"),
                }
            }
        }

        self.end_frame();
        Ok(())
    }

    /// The CPU half of [`draw`](Self::draw): builds this frame's command
    /// stream without touching the backend.
    pub fn build_frame_commands(&mut self) -> crate::backend::cmd::FrameCommands {
        frame::build_frame(self)
    }

    fn end_frame(&mut self) {
        self.prev_view_proj = self.camera.projection * self.camera.view;
        self.frames_rendered += 1;
        self.taa_jitter_index = (self.taa_jitter_index + 1) % crate::settings::TAA_SAMPLE_COUNT;

        self.queued_ss_sprites.clear();
        self.queued_ws_sprites.clear();
        for caches in &mut self.text_caches {
            caches.clear();
        }
        self.physics_debug.clear_lines();
        self.ui_mesh.end_frame();
        self.capture_screenshot = false;
        self.capture_reflection_probes = false;
    }

    /// Frames rendered since creation.
    #[must_use]
    pub fn get_frames_rendered_count(&self) -> u32 {
        self.frames_rendered
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Some(backend) = &mut self.backend {
            backend.wait_idle();
        }
    }
}
