//! Shadow Cascade Fitting
//!
//! The directional light renders [`NUM_SHADOW_CASCADES`] depth maps, each
//! covering a slice of the view frustum. Splits follow the practical split
//! scheme (log/uniform blend); each cascade's orthographic projection is
//! fit to the light-space AABB of its slice and snapped to the shadow
//! texel grid to prevent shimmer under camera motion.

use glam::{Mat4, Vec3, Vec4};

use crate::settings::{NUM_SHADOW_CASCADES, SHADOW_CASCADE_RES};

/// Blend between uniform (0.0) and logarithmic (1.0) split distribution.
const CASCADE_SPLIT_LAMBDA: f32 = 0.7;

/// View + projection matrices of every cascade, plus the view-space split
/// depths sampled by the shading pass.
#[derive(Debug, Clone, Default)]
pub struct ShadowCascades {
    pub view_mats: [Mat4; NUM_SHADOW_CASCADES],
    pub proj_mats: [Mat4; NUM_SHADOW_CASCADES],
    /// Far distance of each cascade in view space.
    pub splits: Vec4,
}

impl ShadowCascades {
    /// Combined view-projection of one cascade.
    #[must_use]
    pub fn view_proj(&self, cascade: usize) -> Mat4 {
        self.proj_mats[cascade] * self.view_mats[cascade]
    }
}

/// Computes cascade split distances with the practical split scheme.
#[must_use]
pub fn compute_cascade_splits(near: f32, far: f32) -> [f32; NUM_SHADOW_CASCADES] {
    let mut splits = [0.0f32; NUM_SHADOW_CASCADES];
    for (i, split) in splits.iter_mut().enumerate() {
        let p = (i + 1) as f32 / NUM_SHADOW_CASCADES as f32;
        let log_split = near * (far / near).powf(p);
        let uni_split = near + (far - near) * p;
        *split = CASCADE_SPLIT_LAMBDA * log_split + (1.0 - CASCADE_SPLIT_LAMBDA) * uni_split;
    }
    splits[NUM_SHADOW_CASCADES - 1] = far;
    splits
}

/// The 8 world-space corners of a view frustum slice.
fn frustum_slice_corners(
    view: &Mat4,
    proj: &Mat4,
    slice_near: f32,
    slice_far: f32,
) -> [Vec3; 8] {
    // Extract fov and aspect from the projection. For a perspective
    // matrix proj[1][1] = 1/tan(fov/2) and proj[0][0] = proj[1][1]/aspect;
    // this holds for the reverse-Z variants as well.
    let tan_half_fov = 1.0 / proj.y_axis.y;
    let aspect = proj.y_axis.y / proj.x_axis.x;

    let h_near = tan_half_fov * slice_near;
    let w_near = h_near * aspect;
    let h_far = tan_half_fov * slice_far;
    let w_far = h_far * aspect;

    let corners_view = [
        Vec3::new(-w_near, -h_near, -slice_near),
        Vec3::new(w_near, -h_near, -slice_near),
        Vec3::new(w_near, h_near, -slice_near),
        Vec3::new(-w_near, h_near, -slice_near),
        Vec3::new(-w_far, -h_far, -slice_far),
        Vec3::new(w_far, -h_far, -slice_far),
        Vec3::new(w_far, h_far, -slice_far),
        Vec3::new(-w_far, h_far, -slice_far),
    ];

    let inv_view = view.inverse();
    let mut corners_world = [Vec3::ZERO; 8];
    for (world, view_corner) in corners_world.iter_mut().zip(&corners_view) {
        *world = inv_view.transform_point3(*view_corner);
    }
    corners_world
}

/// Builds one cascade's view and (reverse-Z) orthographic projection.
fn fit_cascade(light_direction: Vec3, corners: &[Vec3; 8]) -> (Mat4, Mat4) {
    let safe_dir = if light_direction.length_squared() > 1e-6 {
        light_direction.normalize()
    } else {
        -Vec3::Z
    };

    let mut center = Vec3::ZERO;
    for c in corners {
        center += *c;
    }
    center /= 8.0;

    let up = if safe_dir.y.abs() > 0.99 { Vec3::X } else { Vec3::Y };
    let light_view = Mat4::look_at_rh(center - safe_dir, center, up);

    let mut ls_min = Vec3::splat(f32::MAX);
    let mut ls_max = Vec3::splat(f32::MIN);
    for c in corners {
        let ls = light_view.transform_point3(*c);
        ls_min = ls_min.min(ls);
        ls_max = ls_max.max(ls);
    }

    // Pull the near plane toward the light so casters between the camera
    // slice and the light still land in the map.
    let z_range = (ls_max.z - ls_min.z).max(1.0);
    ls_max.z += z_range.max(50.0);
    ls_min.z -= z_range;

    // Texel snap
    let texels = SHADOW_CASCADE_RES as f32;
    let per_texel_x = (ls_max.x - ls_min.x) / texels;
    let per_texel_y = (ls_max.y - ls_min.y) / texels;
    if per_texel_x > 0.0 {
        ls_min.x = (ls_min.x / per_texel_x).floor() * per_texel_x;
        ls_max.x = (ls_max.x / per_texel_x).ceil() * per_texel_x;
    }
    if per_texel_y > 0.0 {
        ls_min.y = (ls_min.y / per_texel_y).floor() * per_texel_y;
        ls_max.y = (ls_max.y / per_texel_y).ceil() * per_texel_y;
    }

    // Reverse-Z: swap near and far.
    let proj = Mat4::orthographic_rh(
        ls_min.x,
        ls_max.x,
        ls_min.y,
        ls_max.y,
        -ls_min.z,
        -ls_max.z,
    );

    (light_view, proj)
}

/// Computes all cascades for the current camera and light direction.
#[must_use]
pub fn compute_shadow_cascades(
    camera_view: &Mat4,
    camera_proj: &Mat4,
    camera_near: f32,
    shadow_far: f32,
    light_direction: Vec3,
) -> ShadowCascades {
    let near = camera_near.max(0.1);
    let far = shadow_far.max(near + 1.0);
    let splits = compute_cascade_splits(near, far);

    let mut cascades = ShadowCascades {
        splits: Vec4::from_array(splits),
        ..Default::default()
    };

    let mut prev_split = near;
    for i in 0..NUM_SHADOW_CASCADES {
        let corners = frustum_slice_corners(camera_view, camera_proj, prev_split, splits[i]);
        let (view, proj) = fit_cascade(light_direction, &corners);
        cascades.view_mats[i] = view;
        cascades.proj_mats[i] = proj;
        prev_split = splits[i];
    }

    cascades
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_increase_and_end_at_far() {
        let splits = compute_cascade_splits(0.1, 100.0);
        for pair in splits.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert!((splits[NUM_SHADOW_CASCADES - 1] - 100.0).abs() < 1e-4);
    }

    #[test]
    fn cascades_cover_frustum_slices() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 5.0, 10.0), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(1.0, 16.0 / 9.0, 0.1, 200.0);
        let cascades =
            compute_shadow_cascades(&view, &proj, 0.1, 100.0, Vec3::new(-0.5, -1.0, -0.3));

        // Every slice corner must land inside its cascade's clip volume.
        let splits = compute_cascade_splits(0.1, 100.0);
        let mut prev = 0.1;
        for i in 0..NUM_SHADOW_CASCADES {
            let corners = frustum_slice_corners(&view, &proj, prev, splits[i]);
            let vp = cascades.view_proj(i);
            for corner in corners {
                let clip = vp * corner.extend(1.0);
                let ndc = clip.truncate() / clip.w;
                assert!(ndc.x >= -1.001 && ndc.x <= 1.001, "x out of range: {ndc}");
                assert!(ndc.y >= -1.001 && ndc.y <= 1.001, "y out of range: {ndc}");
            }
            prev = splits[i];
        }
    }

    #[test]
    fn degenerate_light_direction_falls_back() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(1.2, 1.0, 0.1, 50.0);
        let cascades = compute_shadow_cascades(&view, &proj, 0.1, 50.0, Vec3::ZERO);
        assert!(cascades.view_mats[0].is_finite());
    }
}
