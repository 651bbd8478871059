//! Renderer Core Tests
//!
//! Headless coverage of the renderer's CPU side:
//! - Resource tables: lowest-free-ID allocation, slot recycling,
//!   engine-material survival across `clear_materials`
//! - Render object lifecycle and batching buckets
//! - The frame command stream: pass order, dynamic streams, draw counts
//! - Physics debug line buffering
//! - Sprite and text submission
//!
//! None of these touch a GPU; `Renderer::new` allocates CPU state only and
//! `build_frame_commands` is the pure half of `draw`.

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use ember::backend::cmd::{DepthTestFunc, FrameCommands};
use ember::ids::MaterialID;
use ember::mesh::PrefabShape;
use ember::renderer::Renderer;
use ember::renderer::lights::{DirectionalLight, PointLightData};
use ember::renderer::object::RenderObjectCreateInfo;
use ember::renderer::sprite::{AnchorPoint, SpriteQuadDrawInfo};
use ember::resources::material::MaterialCreateInfo;
use ember::settings::RenderSettings;

fn renderer() -> Renderer {
    Renderer::new(RenderSettings::default())
}

fn pbr_material(renderer: &mut Renderer, name: &str) -> MaterialID {
    let info = MaterialCreateInfo {
        name: name.into(),
        shader_name: "pbr".into(),
        const_roughness: 1.0,
        ..Default::default()
    };
    renderer.initialize_material(&info, None)
}

fn cube_object(renderer: &mut Renderer, material: MaterialID) -> ember::ids::RenderID {
    let (vertices, indices) = PrefabShape::Cube.generate().build();
    let mut info = RenderObjectCreateInfo::new(material, vertices);
    info.indices = Some(indices);
    renderer.initialize_render_object(info)
}

fn pass_index(frame: &FrameCommands, label: &str) -> Option<usize> {
    frame.passes.iter().position(|p| p.label == label)
}

// ============================================================================
// Materials & Shaders
// ============================================================================

#[test]
fn unknown_shader_name_yields_invalid_material() {
    let mut r = renderer();
    let info = MaterialCreateInfo {
        name: "broken".into(),
        shader_name: "no_such_shader".into(),
        ..Default::default()
    };
    assert_eq!(r.initialize_material(&info, None), MaterialID::INVALID);
}

#[test]
fn every_registered_material_references_a_live_shader() {
    let mut r = renderer();
    pbr_material(&mut r, "a");
    pbr_material(&mut r, "b");

    for (_, material) in r.resources().materials() {
        assert!(
            r.resources().shader(material.shader_id).is_some(),
            "material '{}' has a dangling shader",
            material.name()
        );
    }
}

#[test]
fn next_available_material_id_is_lowest_free() {
    let mut r = renderer();
    let a = pbr_material(&mut r, "a");
    let b = pbr_material(&mut r, "b");
    assert_eq!(b.index(), a.index() + 1);

    r.remove_material(a);
    let c = pbr_material(&mut r, "c");
    assert_eq!(c, a, "freed slot must be recycled first");
}

#[test]
fn clear_materials_keeps_engine_materials() {
    let mut r = renderer();
    pbr_material(&mut r, "scene_mat");

    r.clear_materials(false);

    assert!(r.resources().material_count() > 0);
    for (_, material) in r.resources().materials() {
        assert!(
            material.is_engine_material(),
            "non-engine material '{}' survived clear_materials(false)",
            material.name()
        );
    }
}

#[test]
fn material_library_fallback_registers_lazily() {
    let mut r = renderer();
    let json = r#"{
        "version": 1,
        "materials": [
            { "name": "library_mat", "shader_name": "pbr" }
        ]
    }"#;
    r.load_materials_file(json).unwrap();

    assert!(r.resources().material_id_by_name("library_mat").is_none());
    let id = r.get_material_id_by_name("library_mat").unwrap();
    assert!(id.is_valid());
    // Second lookup hits the registered table, not the library.
    assert_eq!(r.get_material_id_by_name("library_mat"), Some(id));
}

#[test]
fn materials_file_round_trips() {
    let mut r = renderer();
    pbr_material(&mut r, "exported");

    let json = r.serialize_materials_file().unwrap();
    let mut other = renderer();
    let count = other.load_materials_file(&json).unwrap();
    assert_eq!(count, 1);
    assert!(other.get_material_id_by_name("exported").is_some());
}

// ============================================================================
// Render Objects
// ============================================================================

#[test]
fn destroyed_render_object_slot_is_reused() {
    let mut r = renderer();
    let material = pbr_material(&mut r, "m");
    let baseline = r.get_render_object_count();

    let a = cube_object(&mut r, material);
    let b = cube_object(&mut r, material);
    assert_eq!(r.get_render_object_count(), baseline + 2);

    r.destroy_render_object(a);
    let c = cube_object(&mut r, material);
    assert_eq!(c, a, "lowest free render ID must be handed out");
    let _ = b;
}

#[test]
fn invalid_render_id_operations_are_no_ops() {
    let mut r = renderer();
    let bogus = ember::ids::RenderID::new(9999);
    let count = r.get_render_object_count();

    r.destroy_render_object(bogus);
    r.set_render_object_transform(bogus, Mat4::IDENTITY);
    r.set_render_object_visible(bogus, false);
    assert_eq!(r.get_render_object_count(), count);
    assert_eq!(r.get_material_id(bogus), MaterialID::INVALID);
}

// ============================================================================
// Frame Graph
// ============================================================================

#[test]
fn scene_passes_run_in_prescribed_order() {
    let mut r = renderer();
    r.register_directional_light(DirectionalLight::default());
    let material = pbr_material(&mut r, "m");
    cube_object(&mut r, material);

    let frame = r.build_frame_commands();

    let shadow = pass_index(&frame, "shadow_cascade").expect("shadow pass missing");
    let geometry = pass_index(&frame, "deferred_geometry").unwrap();
    let ssao = pass_index(&frame, "ssao").unwrap();
    let shading = pass_index(&frame, "deferred_shading").unwrap();
    let forward = pass_index(&frame, "forward").unwrap();
    let post = pass_index(&frame, "post_process").unwrap();
    let fxaa = pass_index(&frame, "post_fxaa").unwrap();
    let editor = pass_index(&frame, "editor_depth_aware").unwrap();

    assert!(shadow < geometry);
    assert!(geometry < ssao);
    assert!(ssao < shading);
    assert!(shading < forward);
    assert!(forward < post);
    assert!(post < fxaa);
    assert!(fxaa < editor);
    assert!(frame.present);
}

#[test]
fn deferred_and_forward_objects_split_by_shader() {
    let mut r = renderer();
    let pbr = pbr_material(&mut r, "deferred_mat");
    let color = r.initialize_material(
        &MaterialCreateInfo {
            name: "forward_mat".into(),
            shader_name: "color".into(),
            ..Default::default()
        },
        None,
    );

    cube_object(&mut r, pbr);
    cube_object(&mut r, color);

    let frame = r.build_frame_commands();
    let geometry = &frame.passes[pass_index(&frame, "deferred_geometry").unwrap()];
    let forward = &frame.passes[pass_index(&frame, "forward").unwrap()];

    assert_eq!(geometry.draws.len(), 1);
    assert_eq!(forward.draws.len(), 1);
}

#[test]
fn invisible_objects_are_not_batched() {
    let mut r = renderer();
    let material = pbr_material(&mut r, "m");
    let id = cube_object(&mut r, material);
    r.set_render_object_visible(id, false);

    let frame = r.build_frame_commands();
    let geometry = &frame.passes[pass_index(&frame, "deferred_geometry").unwrap()];
    assert!(geometry.draws.is_empty());
}

#[test]
fn batch_assigned_dynamic_offsets_flow_into_draws() {
    let stride = ember::renderer::uniforms::DYNAMIC_ALIGNMENT;
    let mut r = renderer();
    let material = pbr_material(&mut r, "m");
    cube_object(&mut r, material);
    cube_object(&mut r, material);

    let frame = r.build_frame_commands();
    let geometry = &frame.passes[pass_index(&frame, "deferred_geometry").unwrap()];
    let mut offsets: Vec<u32> = geometry.draws.iter().map(|d| d.dynamic_offset).collect();
    offsets.sort_unstable();
    assert_eq!(
        offsets,
        vec![0, stride],
        "each batched object owns one aligned slot"
    );

    // The uploaded dynamic blob covers exactly the batched region.
    let upload = frame
        .material_uniforms
        .iter()
        .find(|u| u.material == material)
        .unwrap();
    assert_eq!(upload.dynamic_stride, stride);
    assert_eq!(upload.dynamic.len(), 2 * stride as usize);
}

#[test]
fn shadow_passes_cover_every_cascade_and_cull_front_faces() {
    let mut r = renderer();
    r.register_directional_light(DirectionalLight::default());
    let material = pbr_material(&mut r, "m");
    cube_object(&mut r, material);

    let frame = r.build_frame_commands();
    let shadow_passes: Vec<_> = frame
        .passes
        .iter()
        .filter(|p| p.label == "shadow_cascade")
        .collect();

    assert_eq!(shadow_passes.len(), ember::settings::NUM_SHADOW_CASCADES);
    for pass in shadow_passes {
        assert_eq!(pass.draws.len(), 1);
        assert_eq!(pass.draws[0].cull, ember::backend::cmd::CullFace::Front);
        assert_eq!(pass.clear_depth, 0.0, "reverse-Z clears depth to zero");
    }
}

#[test]
fn no_directional_light_means_no_shadow_passes() {
    let mut r = renderer();
    let material = pbr_material(&mut r, "m");
    cube_object(&mut r, material);

    let frame = r.build_frame_commands();
    assert!(pass_index(&frame, "shadow_cascade").is_none());
}

#[test]
fn deferred_shading_depth_test_is_always_with_writes_off() {
    let mut r = renderer();
    let frame = r.build_frame_commands();
    let shading = &frame.passes[pass_index(&frame, "deferred_shading").unwrap()];
    assert_eq!(shading.draws.len(), 1);
    assert_eq!(shading.draws[0].depth_test, DepthTestFunc::Always);
    assert!(!shading.draws[0].depth_write);
}

#[test]
fn disabling_fxaa_sends_tonemap_to_backbuffer() {
    let mut r = renderer();
    r.post_process_settings_mut().enable_fxaa = false;

    let frame = r.build_frame_commands();
    assert!(pass_index(&frame, "post_fxaa").is_none());
    let post = &frame.passes[pass_index(&frame, "post_process").unwrap()];
    assert_eq!(
        post.target,
        ember::backend::cmd::RenderTargetId::Backbuffer
    );
}

#[test]
fn brdf_lut_renders_exactly_once() {
    let mut r = renderer();
    let first = r.build_frame_commands();
    assert!(pass_index(&first, "brdf_lut").is_some());

    let second = r.build_frame_commands();
    assert!(pass_index(&second, "brdf_lut").is_none());
}

#[test]
fn reflection_probe_material_triggers_capture_and_ibl() {
    let mut r = renderer();
    let probe = r.initialize_material(
        &MaterialCreateInfo {
            name: "probe".into(),
            shader_name: "pbr".into(),
            generate_reflection_probe_maps: true,
            generate_cubemap_sampler: true,
            generated_cubemap_size: Vec2::splat(256.0),
            generate_irradiance_sampler: true,
            generated_irradiance_cubemap_size: Vec2::splat(32.0),
            generate_prefiltered_map: true,
            generated_prefiltered_cubemap_size: Vec2::splat(128.0),
            ..Default::default()
        },
        None,
    );
    let sphere = {
        let (vertices, indices) = PrefabShape::UvSphere {
            width_segments: 16,
            height_segments: 8,
        }
        .generate()
        .build();
        let mut info = RenderObjectCreateInfo::new(probe, vertices);
        info.indices = Some(indices);
        r.initialize_render_object(info)
    };
    r.post_initialize_render_object(sphere);

    let frame = r.build_frame_commands();
    let capture_faces = frame
        .passes
        .iter()
        .filter(|p| p.label == "probe_capture")
        .count();
    assert_eq!(capture_faces, 6, "one capture pass per cube face");
    assert_eq!(
        frame.passes.iter().filter(|p| p.label == "irradiance").count(),
        6
    );
    assert_eq!(
        frame.passes.iter().filter(|p| p.label == "prefilter").count(),
        (ember::renderer::ibl::PREFILTER_MIP_LEVELS * 6) as usize
    );
}

// ============================================================================
// Physics Debug Lines
// ============================================================================

#[test]
fn empty_line_set_produces_zero_draw_calls() {
    let mut r = renderer();
    let frame = r.build_frame_commands();
    assert!(pass_index(&frame, "physics_debug_lines").is_none());
}

#[test]
fn thousand_lines_draw_once_and_capacity_survives_frames() {
    let mut r = renderer();

    for frame_index in 0..3 {
        for i in 0..1000 {
            r.physics_debug_drawer().draw_line(
                Vec3::new(i as f32, 0.0, 0.0),
                Vec3::new(i as f32, 1.0, 0.0),
                Vec3::ONE,
            );
        }

        let frame = r.build_frame_commands();
        let lines = &frame.passes[pass_index(&frame, "physics_debug_lines").unwrap()];
        assert_eq!(lines.draws.len(), 1, "frame {frame_index}: one line draw");

        // 1000 segments → 2000 vertices in the stream.
        let stream = &frame.streams[0];
        assert_eq!(stream.vertex_count(), 2000);

        r.draw().unwrap();
        assert!(
            r.physics_debug_drawer().capacity() >= 1000,
            "line storage capacity must be retained across frames"
        );
    }
}

// ============================================================================
// Sprites & Text
// ============================================================================

#[test]
fn screen_space_sprite_anchors_match_the_window() {
    let window = Vec2::new(1920.0, 1080.0);
    let size = Vec2::new(128.0, 128.0);

    let cases = [
        (AnchorPoint::TopLeft, Vec2::new(64.0, 64.0)),
        (AnchorPoint::Center, Vec2::new(960.0, 540.0)),
        (AnchorPoint::BottomRight, Vec2::new(1856.0, 1016.0)),
    ];
    for (anchor, expected) in cases {
        let center =
            ember::renderer::sprite::anchored_center_px(Vec2::ZERO, anchor, size, window);
        assert!(
            (center - expected).length() <= 1.0,
            "{anchor:?}: got {center}, expected {expected}"
        );
    }
}

#[test]
fn queued_sprites_emit_one_draw_each() {
    let mut r = renderer();
    r.on_window_size_changed(1920, 1080);

    for anchor in [AnchorPoint::TopLeft, AnchorPoint::Center, AnchorPoint::BottomRight] {
        r.enqueue_sprite(SpriteQuadDrawInfo {
            anchor,
            ..Default::default()
        });
    }

    let frame = r.build_frame_commands();
    let sprites = &frame.passes[pass_index(&frame, "screen_space_sprites").unwrap()];
    assert_eq!(sprites.draws.len(), 3);

    // Sprite queues are per-frame.
    r.draw().unwrap();
    let next = r.build_frame_commands();
    assert!(pass_index(&next, "screen_space_sprites").is_none());
}

#[test]
fn empty_string_draw_is_a_no_op() {
    let mut r = renderer();
    r.draw_string_ss(
        "",
        Vec4::ONE,
        AnchorPoint::Center,
        Vec2::ZERO,
        0.0,
        1.0,
    );
    r.draw_string_ws("", Vec4::ONE, Vec3::ZERO, Quat::IDENTITY, 0.0, 1.0);

    let frame = r.build_frame_commands();
    assert!(pass_index(&frame, "screen_space_text").is_none());
    assert!(pass_index(&frame, "world_space_text").is_none());
}

// ============================================================================
// UI Mesh
// ============================================================================

#[test]
fn ui_rects_flow_into_the_ui_pass() {
    let mut r = renderer();
    r.on_window_size_changed(1280, 720);
    r.ui_mesh()
        .draw_rect(Vec2::new(0.1, 0.1), Vec2::new(0.5, 0.4), Vec4::ONE, 0.0);
    r.ui_mesh()
        .draw_rect(Vec2::new(-0.5, -0.5), Vec2::new(0.0, 0.0), Vec4::ONE, 0.05);

    let frame = r.build_frame_commands();
    let ui = &frame.passes[pass_index(&frame, "ui_mesh").unwrap()];
    assert_eq!(ui.draws.len(), 2);

    // Slots free up after the frame and are reused without reallocating.
    r.draw().unwrap();
    r.ui_mesh()
        .draw_rect(Vec2::new(0.1, 0.1), Vec2::new(0.5, 0.4), Vec4::ONE, 0.0);
    assert_eq!(r.ui_mesh().slot_count(), 2);
}

// ============================================================================
// Lights
// ============================================================================

#[test]
fn point_light_registration_respects_capacity() {
    let mut r = renderer();
    let mut ids = Vec::new();
    for _ in 0..ember::settings::MAX_POINT_LIGHT_COUNT {
        let id = r.register_point_light(PointLightData::default());
        assert!(id.is_valid());
        ids.push(id);
    }
    assert!(!r.register_point_light(PointLightData::default()).is_valid());

    r.remove_point_light(ids[2]);
    let recycled = r.register_point_light(PointLightData::default());
    assert_eq!(recycled, ids[2]);
}

// ============================================================================
// Settings & bookkeeping
// ============================================================================

#[test]
fn vsync_toggle_is_tracked_without_a_backend() {
    let mut r = renderer();
    assert!(r.is_vsync_enabled());
    r.set_vsync_enabled(false);
    assert!(!r.is_vsync_enabled());
}

#[test]
fn update_drives_dpi_cadence_and_frame_counter() {
    let mut r = renderer();
    assert!(!r.take_dpi_check_due());
    r.update(2.5);
    assert!(r.take_dpi_check_due());
    assert!(!r.take_dpi_check_due(), "flag clears once taken");

    assert_eq!(r.get_frames_rendered_count(), 0);
    r.draw().unwrap();
    r.draw().unwrap();
    assert_eq!(r.get_frames_rendered_count(), 2);
}

#[test]
fn selected_object_color_pulses_in_range() {
    let mut r = renderer();
    for step in 0..20 {
        r.update(0.1 * step as f32);
        let color = r.get_selected_object_color_multiplier();
        assert!(color.x > 0.0 && color.x <= 1.0);
        assert!(color.w == 1.0);
    }
}
