//! Frame Graph
//!
//! Builds one frame's command stream in the fixed pass order: IBL
//! precompute and probe capture (when queued), shadow cascades, deferred
//! geometry, SSAO + blur, deferred shading, forward objects, world-space
//! sprites and text, physics debug lines, the post-process chain, editor
//! passes and finally screen-space sprites and text.
//!
//! Building is pure CPU work over the renderer's state; no backend calls
//! happen here.

use glam::{Mat4, Vec2, Vec4};

use crate::backend::cmd::{
    ClearFlags, CullFace, DepthTestFunc, DrawCmd, FrameCommands, GeometrySource,
    MaterialUniformUpload, RenderPassCmd, RenderTargetId, StreamData, TopologyMode,
};
use crate::ids::{MaterialID, RenderID};
use crate::resources::shader::Uniforms;
use crate::settings::{NUM_SHADOW_CASCADES, TAA_SAMPLE_COUNT};

use super::Renderer;
use super::ibl;
use super::shadows;
use super::sprite;
use super::text_draw;
use super::ui_mesh::ui_vertex_attributes;
use super::uniforms::{FrameConstants, ObjectUniforms, align_dynamic, pack_uniforms, post_process_matrix};

/// Accumulates per-material uniform blobs while draws are built.
///
/// Each material's dynamic blob opens with the batched region — one slot
/// per batched object, at the offsets assigned by
/// [`Batches`](super::batches::Batches) during the rebatch — followed by
/// appended slots for override draws (sprites, blur directions, the
/// selected-object pass) that have no batch identity.
struct UniformStore {
    entries: Vec<StoreEntry>,
}

struct StoreEntry {
    material: MaterialID,
    constant: Vec<u8>,
    dynamic: Vec<u8>,
    stride: u32,
    dynamic_tokens: Uniforms,
}

impl UniformStore {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn entry_index(
        &mut self,
        renderer: &Renderer,
        frame_constants: &FrameConstants,
        material: MaterialID,
    ) -> Option<usize> {
        if let Some(i) = self.entries.iter().position(|e| e.material == material) {
            return Some(i);
        }

        let mat = renderer.resources.material(material)?;
        let shader = renderer.resources.shader(mat.shader_id)?;
        let constant = pack_uniforms(
            shader.constant_buffer_uniforms,
            frame_constants,
            &ObjectUniforms::default(),
        );
        let stride = align_dynamic(shader.dynamic_buffer_uniforms.calculate_size());
        // Reserve the batched region up front; appended slots follow it.
        let batched = renderer.batches.batched_object_count(material);
        self.entries.push(StoreEntry {
            material,
            constant,
            dynamic: vec![0; (batched * stride) as usize],
            stride,
            dynamic_tokens: shader.dynamic_buffer_uniforms,
        });
        Some(self.entries.len() - 1)
    }

    /// Writes a batched object's dynamic entry at its batch-assigned
    /// offset and returns that offset.
    fn write_batched(
        &mut self,
        renderer: &Renderer,
        frame_constants: &FrameConstants,
        material: MaterialID,
        offset: u32,
        object: &ObjectUniforms,
    ) -> u32 {
        let Some(index) = self.entry_index(renderer, frame_constants, material) else {
            return 0;
        };
        let entry = &mut self.entries[index];
        if entry.stride == 0 {
            return 0;
        }
        let start = offset as usize;
        let end = start + entry.stride as usize;
        if entry.dynamic.len() < end {
            entry.dynamic.resize(end, 0);
        }
        let packed = pack_uniforms(entry.dynamic_tokens, frame_constants, object);
        entry.dynamic[start..start + packed.len()].copy_from_slice(&packed);
        offset
    }

    /// Appends a dynamic entry past the batched region and returns its
    /// byte offset.
    fn append_object(
        &mut self,
        renderer: &Renderer,
        frame_constants: &FrameConstants,
        material: MaterialID,
        object: &ObjectUniforms,
    ) -> u32 {
        let Some(index) = self.entry_index(renderer, frame_constants, material) else {
            return 0;
        };
        let entry = &mut self.entries[index];
        if entry.stride == 0 {
            return 0;
        }
        let offset = entry.dynamic.len() as u32;
        let packed = pack_uniforms(entry.dynamic_tokens, frame_constants, object);
        entry.dynamic.extend_from_slice(&packed);
        entry.dynamic.resize((offset + entry.stride) as usize, 0);
        offset
    }

    /// Ensures a material has its constant blob uploaded even when no
    /// dynamic entries were pushed (fullscreen passes).
    fn touch(&mut self, renderer: &Renderer, frame_constants: &FrameConstants, material: MaterialID) {
        let _ = self.entry_index(renderer, frame_constants, material);
    }

    fn into_uploads(self) -> Vec<MaterialUniformUpload> {
        self.entries
            .into_iter()
            .map(|e| MaterialUniformUpload {
                material: e.material,
                constant: e.constant,
                dynamic: e.dynamic,
                dynamic_stride: e.stride,
            })
            .collect()
    }
}

/// Halton(2, 3) jitter sequence for TAA, in units of one pixel.
fn halton_jitter(index: usize) -> Vec2 {
    fn halton(mut i: u32, base: u32) -> f32 {
        let mut f = 1.0;
        let mut r = 0.0;
        while i > 0 {
            f /= base as f32;
            r += f * (i % base) as f32;
            i /= base;
        }
        r
    }
    let i = (index % TAA_SAMPLE_COUNT) as u32 + 1;
    Vec2::new(halton(i, 2) - 0.5, halton(i, 3) - 0.5)
}

fn object_uniforms(renderer: &Renderer, object: &super::object::RenderObject) -> ObjectUniforms {
    let mut uniforms = ObjectUniforms {
        model: object.transform,
        model_inv_transpose: object.transform.inverse().transpose(),
        ..Default::default()
    };

    if let Some(material) = renderer.resources.material(object.material_id) {
        uniforms.color_multiplier = material.color_multiplier();
        uniforms.const_albedo = Vec4::from_array(material.info.const_albedo);
        uniforms.const_metallic = material.info.const_metallic;
        uniforms.const_roughness = material.info.const_roughness;
        uniforms.const_ao = material.info.const_ao;
        uniforms.enable_albedo_sampler =
            material.info.albedo.enabled && material.textures.albedo.is_valid();
        uniforms.enable_normal_sampler =
            material.info.normal.enabled && material.textures.normal.is_valid();
        uniforms.enable_metallic_sampler =
            material.info.metallic.enabled && material.textures.metallic.is_valid();
        uniforms.enable_roughness_sampler =
            material.info.roughness.enabled && material.textures.roughness.is_valid();
        uniforms.enable_ao_sampler = material.info.ao.enabled && material.textures.ao.is_valid();
        uniforms.enable_cubemap_sampler =
            material.info.enable_cubemap_sampler && material.textures.cubemap.is_valid();
        uniforms.enable_irradiance_sampler =
            material.info.enable_irradiance_sampler && material.textures.irradiance.is_valid();
    }

    uniforms
}

/// One scene-object draw with its own material and state.
fn scene_draw(
    renderer: &Renderer,
    store: &mut UniformStore,
    constants: &FrameConstants,
    id: RenderID,
) -> Option<DrawCmd> {
    let object = renderer.objects.get(id)?;
    let material = renderer.resources.material(object.material_id)?;

    let mut draw = DrawCmd::new(
        GeometrySource::RenderObject(id),
        object.material_id,
        material.shader_id,
    );
    draw.topology = object.topology;
    draw.cull = object.cull_face;
    draw.depth_test = object.depth_test_func;
    draw.depth_write = object.depth_write_enable;
    draw.dynamic_offset = store.write_batched(
        renderer,
        constants,
        object.material_id,
        object.dynamic_offset,
        &object_uniforms(renderer, object),
    );
    Some(draw)
}

fn fullscreen_draw(
    renderer: &Renderer,
    store: &mut UniformStore,
    constants: &FrameConstants,
    material: MaterialID,
    inputs: Vec<RenderTargetId>,
) -> Option<DrawCmd> {
    let mat = renderer.resources.material(material)?;
    store.touch(renderer, constants, material);
    let mut draw = DrawCmd::new(
        GeometrySource::RenderObject(renderer.engine.fullscreen_tri),
        material,
        mat.shader_id,
    );
    draw.cull = CullFace::None;
    draw.depth_test = DepthTestFunc::Always;
    draw.depth_write = false;
    draw.inputs = inputs;
    Some(draw)
}

/// Builds the frame constants for the scene camera, applying the TAA
/// projection jitter when enabled.
fn build_frame_constants(renderer: &Renderer) -> FrameConstants {
    let camera = &renderer.camera;

    let mut projection = camera.projection;
    if renderer.settings.enable_taa && renderer.window_size.0 > 0 {
        let jitter = halton_jitter(renderer.taa_jitter_index);
        projection.z_axis.x += jitter.x * 2.0 / renderer.window_size.0 as f32;
        projection.z_axis.y += jitter.y * 2.0 / renderer.window_size.1 as f32;
    }

    let view_projection = projection * camera.view;
    let window = Vec2::new(
        renderer.window_size.0.max(1) as f32,
        renderer.window_size.1.max(1) as f32,
    );

    // Shadow cascades for the directional light.
    let mut light_view_projs = [Mat4::IDENTITY; NUM_SHADOW_CASCADES];
    let mut cascade_splits = Vec4::ZERO;
    if let Some(light) = renderer.lights.directional_light() {
        if light.enabled && light.cast_shadows {
            let shadow_far = camera.far.min(200.0);
            let cascades = shadows::compute_shadow_cascades(
                &camera.view,
                &camera.projection,
                camera.near,
                shadow_far,
                light.direction,
            );
            for i in 0..NUM_SHADOW_CASCADES {
                light_view_projs[i] = cascades.view_proj(i);
            }
            cascade_splits = cascades.splits;
        }
    }

    FrameConstants {
        view: camera.view,
        view_inv: camera.view.inverse(),
        projection,
        proj_inv: projection.inverse(),
        view_projection,
        last_frame_view_proj: renderer.prev_view_proj,
        cam_pos: camera.position.extend(1.0),
        exposure: camera.exposure,
        time: renderer.time,
        light_view_projs,
        cascade_splits,
        shadow_darkness: renderer
            .lights
            .directional_light()
            .map_or(1.0, |l| l.shadow_darkness),
        dir_light: renderer.lights.pack_dir_light(),
        point_lights: renderer.lights.pack_point_lights(),
        tex_size: window,
        texel_step: Vec2::new(1.0 / window.x, 1.0 / window.y),
        post_process_matrix: post_process_matrix(
            renderer.settings.post.saturation,
            renderer.settings.post.brightness,
            renderer.settings.post.offset,
        ),
        ssao_kernel: renderer.ssao_kernel.clone(),
        ssao_radius: 0.5,
        ssao_kernel_size: renderer.ssao_kernel.len() as i32,
        ssao_blur_radius: 2,
        ssao_pow_exp: 1.0,
        enable_ssao: renderer.settings.enable_ssao,
    }
}

/// Builds the whole frame. See the module docs for the pass order.
#[allow(clippy::too_many_lines)]
pub(crate) fn build_frame(renderer: &mut Renderer) -> FrameCommands {
    renderer
        .batches
        .rebatch_if_dirty(&mut renderer.objects, &renderer.resources);

    let constants = build_frame_constants(renderer);
    let mut frame = FrameCommands::default();
    let mut store = UniformStore::new();

    // ------------------------------------------------------------------
    // IBL precompute (queued by PostInitializeRenderObject)
    // ------------------------------------------------------------------
    if !renderer.brdf_lut_generated {
        if let Some(mat) = renderer.resources.material(renderer.engine.brdf_mat) {
            store.touch(renderer, &constants, renderer.engine.brdf_mat);
            frame.passes.push(ibl::build_brdf_lut_pass(
                renderer.engine.brdf_mat,
                mat.shader_id,
                renderer.engine.fullscreen_tri,
            ));
            renderer.brdf_lut_generated = true;
        }
    }

    let pending_ibl = std::mem::take(&mut renderer.pending_ibl);
    for material in pending_ibl {
        push_ibl_chain(renderer, &mut store, &constants, &mut frame, material, true);
    }

    // ------------------------------------------------------------------
    // Reflection probe capture: replay the scene passes once per face,
    // then regenerate the probe's irradiance + prefilter maps.
    // ------------------------------------------------------------------
    if renderer.capture_reflection_probes && renderer.reflection_probe_material().is_valid() {
        let probe = renderer.reflection_probe_material();
        push_probe_capture(renderer, &mut store, &constants, &mut frame, probe);
        push_ibl_chain(renderer, &mut store, &constants, &mut frame, probe, false);
    }

    // ------------------------------------------------------------------
    // Shadow cascades
    // ------------------------------------------------------------------
    let shadows_enabled = renderer
        .lights
        .directional_light()
        .is_some_and(|l| l.enabled && l.cast_shadows);
    if shadows_enabled {
        let shadow_shader = renderer
            .resources
            .material(renderer.engine.shadow_mat)
            .map(|m| m.shader_id);
        if let Some(shadow_shader) = shadow_shader {
            store.touch(renderer, &constants, renderer.engine.shadow_mat);
            for cascade in 0..NUM_SHADOW_CASCADES {
                let mut pass = RenderPassCmd::new(
                    "shadow_cascade",
                    RenderTargetId::ShadowCascade(cascade as u32),
                );
                pass.clear = ClearFlags::DEPTH;
                pass.clear_depth = 0.0;

                for batch in &renderer.batches.deferred {
                    for id in &batch.objects {
                        let Some(object) = renderer.objects.get(*id) else {
                            continue;
                        };
                        let mut draw = DrawCmd::new(
                            GeometrySource::RenderObject(*id),
                            renderer.engine.shadow_mat,
                            shadow_shader,
                        );
                        // Front-face culling reduces self-shadow acne.
                        draw.cull = CullFace::Front;
                        draw.topology = object.topology;
                        draw.push_mvp =
                            Some(constants.light_view_projs[cascade] * object.transform);
                        pass.draws.push(draw);
                    }
                }
                frame.passes.push(pass);
            }
        }
    }

    // ------------------------------------------------------------------
    // Deferred geometry → GBuffer, depth blitted to the HDR target
    // ------------------------------------------------------------------
    let mut gbuffer_pass = RenderPassCmd::new("deferred_geometry", RenderTargetId::GBuffer)
        .with_clear(ClearFlags::COLOR | ClearFlags::DEPTH, [0.0; 4]);
    gbuffer_pass.clear_depth = 0.0;
    gbuffer_pass.blit_depth_to = Some(RenderTargetId::OffscreenHdr0);
    let deferred_batches: Vec<RenderID> = renderer
        .batches
        .deferred
        .iter()
        .flat_map(|b| b.objects.iter().copied())
        .collect();
    for id in deferred_batches {
        if let Some(draw) = scene_draw(renderer, &mut store, &constants, id) {
            gbuffer_pass.draws.push(draw);
        }
    }
    frame.passes.push(gbuffer_pass);

    // ------------------------------------------------------------------
    // SSAO + edge-preserving separable blur
    // ------------------------------------------------------------------
    let mut ssao_source = RenderTargetId::SsaoRaw;
    if renderer.settings.enable_ssao {
        let mut ssao_pass = RenderPassCmd::new("ssao", RenderTargetId::SsaoRaw)
            .with_clear(ClearFlags::COLOR, [1.0; 4]);
        if let Some(draw) = fullscreen_draw(
            renderer,
            &mut store,
            &constants,
            renderer.engine.ssao_mat,
            vec![RenderTargetId::GBuffer],
        ) {
            ssao_pass.draws.push(draw);
        }
        frame.passes.push(ssao_pass);

        if renderer.settings.enable_ssao_blur {
            for (label, target, source, offset) in [
                (
                    "ssao_blur_h",
                    RenderTargetId::SsaoBlurH,
                    RenderTargetId::SsaoRaw,
                    Vec2::new(constants.texel_step.x, 0.0),
                ),
                (
                    "ssao_blur_v",
                    RenderTargetId::SsaoBlurV,
                    RenderTargetId::SsaoBlurH,
                    Vec2::new(0.0, constants.texel_step.y),
                ),
            ] {
                let mut pass = RenderPassCmd::new(label, target)
                    .with_clear(ClearFlags::COLOR, [1.0; 4]);
                if let Some(mut draw) = fullscreen_draw(
                    renderer,
                    &mut store,
                    &constants,
                    renderer.engine.ssao_blur_mat,
                    vec![source, RenderTargetId::GBuffer],
                ) {
                    draw.dynamic_offset = store.append_object(
                        renderer,
                        &constants,
                        renderer.engine.ssao_blur_mat,
                        &ObjectUniforms {
                            ssao_texel_offset: offset,
                            ..Default::default()
                        },
                    );
                    pass.draws.push(draw);
                }
                frame.passes.push(pass);
            }
            ssao_source = RenderTargetId::SsaoBlurV;
        }
    }

    // ------------------------------------------------------------------
    // Deferred shading into the offscreen HDR target
    // ------------------------------------------------------------------
    let mut shading_pass = RenderPassCmd::new("deferred_shading", RenderTargetId::OffscreenHdr0)
        .with_clear(ClearFlags::COLOR, renderer.settings.clear_color);
    // Positional inputs cover the GBuffer color attachments and the AO
    // result; the shadow array and depth bind through the shader's own
    // sampler slots, not through this list.
    let mut shading_inputs = vec![RenderTargetId::GBuffer];
    if renderer.settings.enable_ssao {
        shading_inputs.push(ssao_source);
    }
    if let Some(mut draw) = fullscreen_draw(
        renderer,
        &mut store,
        &constants,
        renderer.engine.deferred_combine_mat,
        shading_inputs,
    ) {
        // IBL maps come from the reflection probe material when one exists.
        if renderer.reflection_probe_material().is_valid() {
            draw.texture_source = renderer.reflection_probe_material();
        }
        shading_pass.draws.push(draw);
    }
    frame.passes.push(shading_pass);

    // ------------------------------------------------------------------
    // Forward objects over the HDR scene
    // ------------------------------------------------------------------
    let mut forward_pass = RenderPassCmd::new("forward", RenderTargetId::OffscreenHdr0);
    let forward_objects: Vec<RenderID> = renderer
        .batches
        .forward
        .iter()
        .flat_map(|b| b.objects.iter().copied())
        .collect();
    for id in forward_objects {
        if let Some(draw) = scene_draw(renderer, &mut store, &constants, id) {
            forward_pass.draws.push(draw);
        }
    }
    frame.passes.push(forward_pass);

    // ------------------------------------------------------------------
    // World-space sprites + text + physics debug lines
    // ------------------------------------------------------------------
    push_world_space_sprites(renderer, &mut store, &constants, &mut frame);
    push_text_pass(
        renderer,
        &mut store,
        &constants,
        &mut frame,
        false,
        "world_space_text",
    );
    push_debug_line_pass(renderer, &mut store, &constants, &mut frame);

    // ------------------------------------------------------------------
    // Post-process chain: optional TAA resolve, tonemap, optional FXAA
    // ------------------------------------------------------------------
    let mut scene_src = RenderTargetId::OffscreenHdr0;
    if renderer.settings.enable_taa {
        let mut taa_pass = RenderPassCmd::new("taa_resolve", RenderTargetId::OffscreenHdr1)
            .with_clear(ClearFlags::COLOR, [0.0; 4]);
        taa_pass.blit_color_to = Some(RenderTargetId::TaaHistory);
        // Scene + history are positional; the depth used for reprojection
        // binds through the shader's depth sampler slot.
        if let Some(draw) = fullscreen_draw(
            renderer,
            &mut store,
            &constants,
            renderer.engine.taa_resolve_mat,
            vec![scene_src, RenderTargetId::TaaHistory],
        ) {
            taa_pass.draws.push(draw);
        }
        frame.passes.push(taa_pass);
        scene_src = RenderTargetId::OffscreenHdr1;
    }

    let fxaa = renderer.settings.post.enable_fxaa;
    let tonemap_target = if fxaa {
        if scene_src == RenderTargetId::OffscreenHdr0 {
            RenderTargetId::OffscreenHdr1
        } else {
            RenderTargetId::OffscreenHdr0
        }
    } else {
        RenderTargetId::Backbuffer
    };

    let mut tonemap_pass = RenderPassCmd::new("post_process", tonemap_target)
        .with_clear(ClearFlags::COLOR, [0.0; 4]);
    if let Some(draw) = fullscreen_draw(
        renderer,
        &mut store,
        &constants,
        renderer.engine.post_process_mat,
        vec![scene_src],
    ) {
        tonemap_pass.draws.push(draw);
    }
    frame.passes.push(tonemap_pass);

    if fxaa {
        let mut fxaa_pass = RenderPassCmd::new("post_fxaa", RenderTargetId::Backbuffer)
            .with_clear(ClearFlags::COLOR, [0.0; 4]);
        if let Some(draw) = fullscreen_draw(
            renderer,
            &mut store,
            &constants,
            renderer.engine.post_fxaa_mat,
            vec![tonemap_target],
        ) {
            fxaa_pass.draws.push(draw);
        }
        frame.passes.push(fxaa_pass);
    }

    // ------------------------------------------------------------------
    // Editor passes over the backbuffer, depth-tested against the scene
    // ------------------------------------------------------------------
    let mut editor_pass = RenderPassCmd::new("editor_depth_aware", RenderTargetId::Backbuffer);
    editor_pass.blit_depth_from = Some(RenderTargetId::OffscreenHdr0);
    let grid_fade = renderer.grid_fade();
    let depth_aware: Vec<RenderID> = renderer
        .batches
        .depth_aware_editor
        .iter()
        .copied()
        .filter(|id| {
            grid_fade > 0.0
                || (*id != renderer.engine.grid_obj && *id != renderer.engine.world_axis_obj)
        })
        .collect();
    for id in depth_aware {
        let Some(mut draw) = scene_draw(renderer, &mut store, &constants, id) else {
            continue;
        };
        // The grid and world axes fade with the toggle instead of popping:
        // rewrite their batched entries with the faded multiplier.
        if id == renderer.engine.grid_obj || id == renderer.engine.world_axis_obj {
            if let Some(object) = renderer.objects.get(id) {
                draw.dynamic_offset = store.write_batched(
                    renderer,
                    &constants,
                    draw.material,
                    object.dynamic_offset,
                    &ObjectUniforms {
                        model: object.transform,
                        color_multiplier: Vec4::new(1.0, 1.0, 1.0, grid_fade),
                        ..Default::default()
                    },
                );
            }
        }
        editor_pass.draws.push(draw);
    }
    frame.passes.push(editor_pass);

    // Selected-object wireframe: always on top, color pulsing.
    let mut selected_pass =
        RenderPassCmd::new("selected_wireframe", RenderTargetId::Backbuffer);
    let selected_mat = renderer.engine.selected_object_mat;
    let selected_shader = renderer
        .resources
        .material(selected_mat)
        .map(|m| m.shader_id);
    if let Some(shader) = selected_shader {
        let selected: Vec<RenderID> = renderer.selected_objects.clone();
        for id in selected {
            let Some(object) = renderer.objects.get(id) else {
                continue;
            };
            let mut draw = DrawCmd::new(GeometrySource::RenderObject(id), selected_mat, shader);
            draw.topology = object.topology;
            draw.depth_test = DepthTestFunc::Always;
            draw.depth_write = false;
            draw.wireframe = true;
            let transform = object.transform;
            draw.dynamic_offset = store.append_object(
                renderer,
                &constants,
                selected_mat,
                &ObjectUniforms {
                    model: transform,
                    color_multiplier: renderer.get_selected_object_color_multiplier(),
                    ..Default::default()
                },
            );
            selected_pass.draws.push(draw);
        }
    }
    frame.passes.push(selected_pass);

    // Depth-unaware editor objects draw over a cleared depth buffer.
    let mut unaware_pass = RenderPassCmd::new("editor_depth_unaware", RenderTargetId::Backbuffer);
    unaware_pass.clear = ClearFlags::DEPTH;
    unaware_pass.clear_depth = 0.0;
    let depth_unaware: Vec<RenderID> = renderer.batches.depth_unaware_editor.clone();
    for id in depth_unaware {
        if let Some(draw) = scene_draw(renderer, &mut store, &constants, id) {
            unaware_pass.draws.push(draw);
        }
    }
    frame.passes.push(unaware_pass);

    // ------------------------------------------------------------------
    // Screen-space sprites, UI mesh, screen-space text
    // ------------------------------------------------------------------
    push_screen_space_sprites(renderer, &mut store, &constants, &mut frame);
    push_ui_mesh_pass(renderer, &mut store, &constants, &mut frame);
    push_text_pass(
        renderer,
        &mut store,
        &constants,
        &mut frame,
        true,
        "screen_space_text",
    );

    frame.material_uniforms = store.into_uploads();
    frame.present = true;
    frame.capture_screenshot = renderer.capture_screenshot;
    frame
}

/// Queues the equirect→cube / irradiance / prefilter chain for one
/// material, skipping stages its create info does not request.
/// `from_equirect` selects whether the environment cubemap itself is
/// (re)built from the HDR probe first.
fn push_ibl_chain(
    renderer: &Renderer,
    store: &mut UniformStore,
    constants: &FrameConstants,
    frame: &mut FrameCommands,
    material: MaterialID,
    from_equirect: bool,
) {
    let Some(mat) = renderer.resources.material(material) else {
        return;
    };
    let info = mat.info.clone();
    let textures = mat.textures;

    if from_equirect && info.generate_cubemap_sampler && textures.hdr_equirectangular.is_valid() {
        if let Some(equirect) = renderer.resources.material(renderer.engine.equirect_mat) {
            store.touch(renderer, constants, renderer.engine.equirect_mat);
            frame.passes.extend(ibl::build_equirect_to_cube_passes(
                material,
                renderer.engine.equirect_mat,
                equirect.shader_id,
                renderer.engine.unit_cube,
            ));
        }
    }

    if info.generate_irradiance_sampler && textures.irradiance.is_valid() {
        if let Some(irr) = renderer.resources.material(renderer.engine.irradiance_mat) {
            store.touch(renderer, constants, renderer.engine.irradiance_mat);
            frame.passes.extend(ibl::build_irradiance_passes(
                material,
                renderer.engine.irradiance_mat,
                irr.shader_id,
                renderer.engine.unit_cube,
            ));
        }
    }

    if info.generate_prefiltered_map && textures.prefiltered.is_valid() {
        if let Some(pre) = renderer.resources.material(renderer.engine.prefilter_mat) {
            store.touch(renderer, constants, renderer.engine.prefilter_mat);
            frame.passes.extend(ibl::build_prefilter_passes(
                material,
                renderer.engine.prefilter_mat,
                pre.shader_id,
                renderer.engine.unit_cube,
            ));
        }
    }
}

/// Renders the scene once per cube face into the probe material's
/// environment cubemap. Draw-call overrides keep their own depth funcs;
/// everything else uses the reverse-Z default.
fn push_probe_capture(
    renderer: &Renderer,
    store: &mut UniformStore,
    constants: &FrameConstants,
    frame: &mut FrameCommands,
    probe: MaterialID,
) {
    let views = ibl::capture_views();
    let proj = ibl::capture_projection();

    for (face, view) in views.iter().enumerate() {
        let mut pass = RenderPassCmd::new(
            "probe_capture",
            RenderTargetId::EnvCubemapFace {
                material: probe,
                face: face as u32,
            },
        )
        .with_clear(ClearFlags::COLOR | ClearFlags::DEPTH, renderer.settings.clear_color);
        pass.clear_depth = 0.0;

        let face_vp = proj * *view;
        for batch in renderer.batches.deferred.iter().chain(&renderer.batches.forward) {
            for id in &batch.objects {
                let Some(object) = renderer.objects.get(*id) else {
                    continue;
                };
                let Some(material) = renderer.resources.material(object.material_id) else {
                    continue;
                };
                if !material.info.render_to_cubemap || object.material_id == probe {
                    continue;
                }
                let mut draw = DrawCmd::new(
                    GeometrySource::RenderObject(*id),
                    object.material_id,
                    material.shader_id,
                );
                draw.topology = object.topology;
                draw.cull = object.cull_face;
                draw.depth_test = object.depth_test_func;
                draw.depth_write = object.depth_write_enable;
                draw.push_mvp = Some(face_vp * object.transform);
                // Per-object data is identical in every pass, so capture
                // draws reuse the batch-assigned slot.
                draw.dynamic_offset = store.write_batched(
                    renderer,
                    constants,
                    object.material_id,
                    object.dynamic_offset,
                    &object_uniforms(renderer, object),
                );
                pass.draws.push(draw);
            }
        }
        frame.passes.push(pass);
    }
}

fn push_world_space_sprites(
    renderer: &Renderer,
    store: &mut UniformStore,
    constants: &FrameConstants,
    frame: &mut FrameCommands,
) {
    let mut sprites = renderer.queued_ws_sprites.clone();

    // Editor overlays: point lights draw as billboarded icons.
    if renderer.is_rendering_grid() {
        for (_, light) in renderer.lights.point_lights() {
            sprites.push(sprite::SpriteQuadDrawInfo {
                texture: renderer.resources.white_texture(),
                pos: light.position,
                scale: glam::Vec3::splat(0.5),
                color: super::lights::LightRegistry::point_light_icon_color(light),
                screen_space: false,
                face_camera: true,
                ..Default::default()
            });
        }
    }

    if sprites.is_empty() {
        return;
    }

    let Some(mat) = renderer.resources.material(renderer.engine.sprite_mat) else {
        return;
    };
    let sprite_shader = mat.shader_id;
    let mut pass = RenderPassCmd::new("world_space_sprites", RenderTargetId::OffscreenHdr0);

    for info in &sprites {
        let model = sprite::world_space_sprite_matrix(info, &constants.view_inv);
        let mut draw = DrawCmd::new(
            GeometrySource::RenderObject(renderer.engine.quad_3d),
            renderer.engine.sprite_mat,
            sprite_shader,
        );
        draw.cull = CullFace::None;
        draw.depth_test = if info.read_depth {
            DepthTestFunc::GEqual
        } else {
            DepthTestFunc::Always
        };
        draw.depth_write = false;
        draw.push_mvp = Some(constants.view_projection * model);
        draw.texture_override = Some(info.texture);
        draw.dynamic_offset = store.append_object(
            renderer,
            constants,
            renderer.engine.sprite_mat,
            &ObjectUniforms {
                model,
                color_multiplier: info.color,
                ..Default::default()
            },
        );
        pass.draws.push(draw);
    }
    frame.passes.push(pass);
}

fn push_screen_space_sprites(
    renderer: &Renderer,
    store: &mut UniformStore,
    constants: &FrameConstants,
    frame: &mut FrameCommands,
) {
    if renderer.queued_ss_sprites.is_empty() {
        return;
    }
    let Some(mat) = renderer.resources.material(renderer.engine.sprite_mat) else {
        return;
    };
    let sprite_shader = mat.shader_id;
    let window = Vec2::new(
        renderer.window_size.0.max(1) as f32,
        renderer.window_size.1.max(1) as f32,
    );

    let mut pass = RenderPassCmd::new("screen_space_sprites", RenderTargetId::Backbuffer);
    for info in &renderer.queued_ss_sprites {
        let model = sprite::screen_space_sprite_matrix(info, window);
        let mut draw = DrawCmd::new(
            GeometrySource::RenderObject(renderer.engine.quad_3d),
            renderer.engine.sprite_mat,
            sprite_shader,
        );
        draw.cull = CullFace::None;
        draw.depth_test = DepthTestFunc::Always;
        draw.depth_write = false;
        draw.push_mvp = Some(model);
        draw.texture_override = Some(info.texture);
        draw.dynamic_offset = store.append_object(
            renderer,
            constants,
            renderer.engine.sprite_mat,
            &ObjectUniforms {
                model,
                color_multiplier: info.color,
                ..Default::default()
            },
        );
        pass.draws.push(draw);
    }
    frame.passes.push(pass);
}

fn push_debug_line_pass(
    renderer: &Renderer,
    store: &mut UniformStore,
    constants: &FrameConstants,
    frame: &mut FrameCommands,
) {
    let Some(data) = renderer.physics_debug().flush_lines() else {
        return;
    };
    let Some(mat) = renderer.resources.material(renderer.engine.debug_line_mat) else {
        return;
    };

    let mut pass = RenderPassCmd::new("physics_debug_lines", RenderTargetId::OffscreenHdr0);
    let geometry = frame.push_stream(StreamData {
        attributes: crate::vertex::VertexAttributes::POSITION
            | crate::vertex::VertexAttributes::COLOR128,
        data,
    });
    let mut draw = DrawCmd::new(geometry, renderer.engine.debug_line_mat, mat.shader_id);
    draw.topology = TopologyMode::LineList;
    draw.cull = CullFace::None;
    draw.depth_write = false;
    draw.dynamic_offset = store.append_object(
        renderer,
        constants,
        renderer.engine.debug_line_mat,
        &ObjectUniforms::default(),
    );
    pass.draws.push(draw);
    frame.passes.push(pass);
}

fn push_ui_mesh_pass(
    renderer: &Renderer,
    store: &mut UniformStore,
    constants: &FrameConstants,
    frame: &mut FrameCommands,
) {
    let ui = renderer.ui_mesh_ref();
    if ui.active_draws().count() == 0 {
        return;
    }
    let Some(mat) = renderer.resources.material(renderer.engine.ui_mat) else {
        return;
    };

    let mut pass = RenderPassCmd::new("ui_mesh", RenderTargetId::Backbuffer);
    let stride = ui_vertex_attributes().stride_words();
    for submesh in ui.active_draws() {
        // Expand indices; the UI stream path is non-indexed.
        let mut data = Vec::with_capacity(submesh.indices.len() * stride);
        for index in &submesh.indices {
            let base = *index as usize * stride;
            data.extend_from_slice(&submesh.vertex_data[base..base + stride]);
        }
        let geometry = frame.push_stream(StreamData {
            attributes: ui_vertex_attributes(),
            data,
        });
        let mut draw = DrawCmd::new(geometry, renderer.engine.ui_mat, mat.shader_id);
        draw.cull = CullFace::None;
        draw.depth_test = DepthTestFunc::Always;
        draw.depth_write = false;
        draw.dynamic_offset = store.append_object(
            renderer,
            constants,
            renderer.engine.ui_mat,
            &ObjectUniforms::default(),
        );
        pass.draws.push(draw);
    }
    frame.passes.push(pass);
}

fn push_text_pass(
    renderer: &Renderer,
    store: &mut UniformStore,
    constants: &FrameConstants,
    frame: &mut FrameCommands,
    screen_space: bool,
    label: &'static str,
) {
    let material = if screen_space {
        renderer.engine.font_ss_mat
    } else {
        renderer.engine.font_ws_mat
    };
    let Some(mat) = renderer.resources.material(material) else {
        return;
    };
    let shader = mat.shader_id;
    let window = Vec2::new(
        renderer.window_size.0.max(1) as f32,
        renderer.window_size.1.max(1) as f32,
    );
    let target = if screen_space {
        RenderTargetId::Backbuffer
    } else {
        RenderTargetId::OffscreenHdr0
    };

    let mut pass = RenderPassCmd::new(label, target);

    for (font_index, font) in renderer.fonts.iter().enumerate() {
        if font.meta.screen_space != screen_space {
            continue;
        }
        let mut caches = renderer.text_caches[font_index].clone();

        // The editor overlay string renders through the screen-space path
        // of the current font.
        if screen_space
            && renderer.current_font == Some(font_index)
            && !renderer.editor_message().is_empty()
        {
            let alpha = renderer.editor_message_alpha();
            if alpha > 0.0 {
                caches.push(super::text_draw::TextCache {
                    text: renderer.editor_message().to_string(),
                    anchor: super::sprite::AnchorPoint::Center,
                    position: glam::Vec3::ZERO,
                    rotation: glam::Quat::IDENTITY,
                    color: Vec4::new(1.0, 1.0, 1.0, alpha),
                    letter_spacing: 0.0,
                    scale: 1.0,
                });
            }
        }

        if caches.is_empty() {
            continue;
        }

        let data = if screen_space {
            text_draw::update_text_buffer_ss(font, &caches, window)
        } else {
            text_draw::update_text_buffer_ws(font, &caches)
        };
        if data.is_empty() {
            continue;
        }

        let geometry = frame.push_stream(StreamData {
            attributes: if screen_space {
                text_draw::text_vertex_attributes_ss()
            } else {
                text_draw::text_vertex_attributes_ws()
            },
            data,
        });
        store.touch(renderer, constants, material);
        let mut draw = DrawCmd::new(geometry, material, shader);
        draw.topology = TopologyMode::PointList;
        draw.cull = CullFace::None;
        draw.depth_test = if screen_space {
            DepthTestFunc::Always
        } else {
            DepthTestFunc::GEqual
        };
        draw.depth_write = false;
        draw.texture_override = Some(font.atlas);
        pass.draws.push(draw);
    }

    if !pass.draws.is_empty() {
        frame.passes.push(pass);
    }
}
