//! Image-Based Lighting Precompute
//!
//! Builds the pass lists for the IBL chain: equirectangular probe →
//! environment cubemap, irradiance convolution, prefiltered environment
//! mips and the shared BRDF lookup table. All six-face renders share one
//! view matrix array and one 90° projection; every pass draws with depth
//! test `Always`, the one place the reverse-Z default is overridden.

use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec3, Vec4};

use crate::backend::cmd::{
    ClearFlags, CullFace, DepthTestFunc, DrawCmd, GeometrySource, RenderPassCmd, RenderTargetId,
};
use crate::ids::{MaterialID, RenderID, ShaderID};

/// Mip chain length of generated prefiltered environment maps.
pub const PREFILTER_MIP_LEVELS: u32 = 5;

/// Edge length of the shared BRDF lookup table.
pub const BRDF_LUT_SIZE: u32 = 512;

/// The six cubemap face views, in +X, -X, +Y, -Y, +Z, -Z order.
#[must_use]
pub fn capture_views() -> [Mat4; 6] {
    let eye = Vec3::ZERO;
    [
        Mat4::look_at_rh(eye, Vec3::X, -Vec3::Y),
        Mat4::look_at_rh(eye, Vec3::NEG_X, -Vec3::Y),
        Mat4::look_at_rh(eye, Vec3::Y, Vec3::Z),
        Mat4::look_at_rh(eye, Vec3::NEG_Y, Vec3::NEG_Z),
        Mat4::look_at_rh(eye, Vec3::Z, -Vec3::Y),
        Mat4::look_at_rh(eye, Vec3::NEG_Z, -Vec3::Y),
    ]
}

/// The shared 90° capture projection.
#[must_use]
pub fn capture_projection() -> Mat4 {
    Mat4::perspective_rh(FRAC_PI_2, 1.0, 0.1, 10.0)
}

fn cube_face_draw(
    cube: RenderID,
    material: MaterialID,
    shader: ShaderID,
    texture_source: MaterialID,
    face: usize,
) -> DrawCmd {
    let views = capture_views();
    let mut draw = DrawCmd::new(GeometrySource::RenderObject(cube), material, shader);
    draw.texture_source = texture_source;
    draw.cull = CullFace::None;
    draw.depth_test = DepthTestFunc::Always;
    draw.depth_write = false;
    draw.push_mvp = Some(capture_projection() * views[face]);
    draw
}

/// Six passes rendering the equirectangular HDR probe onto the faces of
/// `probe_material`'s environment cubemap.
#[must_use]
pub fn build_equirect_to_cube_passes(
    probe_material: MaterialID,
    equirect_material: MaterialID,
    equirect_shader: ShaderID,
    unit_cube: RenderID,
) -> Vec<RenderPassCmd> {
    (0..6)
        .map(|face| {
            let mut pass = RenderPassCmd::new(
                "equirect_to_cube",
                RenderTargetId::EnvCubemapFace {
                    material: probe_material,
                    face: face as u32,
                },
            )
            .with_clear(ClearFlags::COLOR, [0.0; 4]);
            pass.draws.push(cube_face_draw(
                unit_cube,
                equirect_material,
                equirect_shader,
                probe_material,
                face,
            ));
            pass
        })
        .collect()
}

/// Six passes convolving `probe_material`'s environment cubemap into its
/// irradiance cubemap.
#[must_use]
pub fn build_irradiance_passes(
    probe_material: MaterialID,
    irradiance_material: MaterialID,
    irradiance_shader: ShaderID,
    unit_cube: RenderID,
) -> Vec<RenderPassCmd> {
    (0..6)
        .map(|face| {
            let mut pass = RenderPassCmd::new(
                "irradiance",
                RenderTargetId::IrradianceFace {
                    material: probe_material,
                    face: face as u32,
                },
            )
            .with_clear(ClearFlags::COLOR, [0.0; 4]);
            pass.draws.push(cube_face_draw(
                unit_cube,
                irradiance_material,
                irradiance_shader,
                probe_material,
                face,
            ));
            pass
        })
        .collect()
}

/// `PREFILTER_MIP_LEVELS` × 6 passes importance-sampling the environment
/// cubemap into the prefiltered map; mip N uses roughness
/// `N / (mips - 1)`.
#[must_use]
pub fn build_prefilter_passes(
    probe_material: MaterialID,
    prefilter_material: MaterialID,
    prefilter_shader: ShaderID,
    unit_cube: RenderID,
) -> Vec<RenderPassCmd> {
    let mut passes = Vec::with_capacity((PREFILTER_MIP_LEVELS * 6) as usize);
    for mip in 0..PREFILTER_MIP_LEVELS {
        let roughness = mip as f32 / (PREFILTER_MIP_LEVELS - 1) as f32;
        for face in 0..6usize {
            let mut pass = RenderPassCmd::new(
                "prefilter",
                RenderTargetId::PrefilterFace {
                    material: probe_material,
                    face: face as u32,
                    mip,
                },
            )
            .with_clear(ClearFlags::COLOR, [0.0; 4]);
            let mut draw = cube_face_draw(
                unit_cube,
                prefilter_material,
                prefilter_shader,
                probe_material,
                face,
            );
            draw.push_data = Some(Vec4::new(roughness, 0.0, 0.0, 0.0));
            pass.draws.push(draw);
            passes.push(pass);
        }
    }
    passes
}

/// The one-time, material-independent BRDF LUT pass (fullscreen triangle
/// into the 512² R16G16 target).
#[must_use]
pub fn build_brdf_lut_pass(
    brdf_material: MaterialID,
    brdf_shader: ShaderID,
    fullscreen_tri: RenderID,
) -> RenderPassCmd {
    let mut pass = RenderPassCmd::new("brdf_lut", RenderTargetId::BrdfLut)
        .with_clear(ClearFlags::COLOR, [0.0; 4]);
    let mut draw = DrawCmd::new(
        GeometrySource::RenderObject(fullscreen_tri),
        brdf_material,
        brdf_shader,
    );
    draw.cull = CullFace::None;
    draw.depth_test = DepthTestFunc::Always;
    draw.depth_write = false;
    pass.draws.push(draw);
    pass
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_views_look_down_each_axis() {
        let views = capture_views();
        let targets = [
            Vec3::X,
            Vec3::NEG_X,
            Vec3::Y,
            Vec3::NEG_Y,
            Vec3::Z,
            Vec3::NEG_Z,
        ];
        for (view, target) in views.iter().zip(targets) {
            // The view transform must map the face direction onto -Z.
            let forward = view.transform_vector3(target);
            assert!(forward.abs_diff_eq(Vec3::NEG_Z, 1e-5), "{target:?} → {forward:?}");
        }
    }

    #[test]
    fn prefilter_roughness_covers_zero_to_one() {
        let passes = build_prefilter_passes(
            MaterialID::new(0),
            MaterialID::new(1),
            ShaderID::new(0),
            RenderID::new(0),
        );
        assert_eq!(passes.len(), (PREFILTER_MIP_LEVELS * 6) as usize);
        let first = passes.first().unwrap().draws[0].push_data.unwrap();
        let last = passes.last().unwrap().draws[0].push_data.unwrap();
        assert_eq!(first.x, 0.0);
        assert_eq!(last.x, 1.0);
    }

    #[test]
    fn ibl_passes_override_the_reverse_z_default() {
        let passes = build_irradiance_passes(
            MaterialID::new(0),
            MaterialID::new(1),
            ShaderID::new(0),
            RenderID::new(0),
        );
        assert_eq!(passes.len(), 6);
        for pass in &passes {
            assert_eq!(pass.draws[0].depth_test, DepthTestFunc::Always);
        }
    }
}
