//! UI Mesh
//!
//! A per-frame dynamic mesh for HUD and menu geometry. Draw calls
//! tessellate into normalized screen-space positions (aspect-corrected so a
//! square stays square) with UVs arranged for SDF-based edge anti-aliasing
//! in the fragment shader. Each draw reuses a submesh slot from the
//! previous frame when one is free, rewriting its vertex data in place;
//! [`end_frame`](UiMesh::end_frame) releases every slot for the next frame.

use std::f32::consts::TAU;

use glam::{Vec2, Vec4};

use crate::vertex::VertexAttributes;

/// Vertex layout of UI submeshes.
#[must_use]
pub fn ui_vertex_attributes() -> VertexAttributes {
    VertexAttributes::POSITION2
        | VertexAttributes::UV
        | VertexAttributes::COLOR128
        | VertexAttributes::EXTRA_VEC4
}

/// One submesh slot.
#[derive(Debug, Default, Clone)]
pub struct DrawData {
    /// Interleaved vertex data in [`ui_vertex_attributes`] layout.
    pub vertex_data: Vec<f32>,
    /// Triangle indices into this slot's vertices.
    pub indices: Vec<u32>,
    /// Whether this slot was written this frame.
    pub in_use: bool,
}

/// The per-frame UI mesh builder.
#[derive(Debug, Default)]
pub struct UiMesh {
    draw_data: Vec<DrawData>,
    window_size: Vec2,
}

impl UiMesh {
    /// Updates the window size used for aspect correction and pixel-derived
    /// UV blend amounts.
    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_size = Vec2::new(width as f32, height as f32);
    }

    /// Draws an axis-aligned rect between two normalized corners, with an
    /// optional rounded-corner radius applied by the SDF shader.
    ///
    /// `bottom_left` must be strictly below/left of `top_right`; invalid
    /// rects are logged and skipped.
    pub fn draw_rect(
        &mut self,
        bottom_left: Vec2,
        top_right: Vec2,
        color: Vec4,
        corner_radius: f32,
    ) {
        if bottom_left.x >= top_right.x || bottom_left.y >= top_right.y {
            log::warn!(
                "Invalid rect parameters (bottom left {bottom_left:?}, top right {top_right:?})"
            );
            return;
        }

        let inv_aspect = if self.window_size.x > 0.0 {
            self.window_size.y / self.window_size.x
        } else {
            1.0
        };

        let width_px = (top_right.x - bottom_left.x) * inv_aspect * self.window_size.x;
        let height_px = (top_right.y - bottom_left.y) * self.window_size.y;

        let points = [
            bottom_left,
            top_right,
            Vec2::new(bottom_left.x, top_right.y),
            Vec2::new(top_right.x, bottom_left.y),
        ];
        let tex_coords = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
            Vec2::new(1.0, 0.0),
        ];
        let indices = vec![0, 2, 1, 0, 1, 3];

        // Half a pixel of SDF blend per side.
        let uv_blend = Vec2::new(0.5 / width_px.max(1.0), 0.5 / height_px.max(1.0));

        self.draw_polygon(&points, &tex_coords, indices, color, uv_blend, corner_radius);
    }

    /// Draws a tessellated ring segment. When the arc closes the full
    /// circle the seam's UV blend is disabled so no join is visible.
    pub fn draw_arc(
        &mut self,
        center: Vec2,
        start_angle: f32,
        end_angle: f32,
        inner_radius: f32,
        thickness: f32,
        segments_in_full_circle: u32,
        color: Vec4,
    ) {
        let inv_aspect = if self.window_size.x > 0.0 {
            self.window_size.y / self.window_size.x
        } else {
            1.0
        };

        let total_angle = (end_angle - start_angle).abs();
        let segments_per_radian = segments_in_full_circle as f32 / TAU;
        let radians_per_segment =
            (end_angle - start_angle).signum() * TAU / segments_in_full_circle as f32;
        let quad_count = ((total_angle * segments_per_radian).ceil() as u32).clamp(1, 8192);

        let outer_radius = inner_radius + thickness;
        let width_px = outer_radius * self.window_size.x;
        let height_px = thickness * self.window_size.y;

        let mut points = Vec::with_capacity((quad_count as usize + 1) * 2);
        let mut tex_coords = Vec::with_capacity(points.capacity());
        let mut indices = Vec::with_capacity(quad_count as usize * 6);

        for i in 0..=quad_count {
            let angle = if i == quad_count {
                end_angle
            } else {
                start_angle + i as f32 * radians_per_segment
            };
            let dir = Vec2::new(angle.cos(), angle.sin());
            let u = i as f32 / quad_count as f32;

            points.push(center + dir * inner_radius * Vec2::new(inv_aspect, 1.0));
            points.push(center + dir * outer_radius * Vec2::new(inv_aspect, 1.0));
            tex_coords.push(Vec2::new(u, 0.0));
            tex_coords.push(Vec2::new(u, 1.0));

            if i < quad_count {
                let base = i * 2;
                indices.extend_from_slice(&[
                    base,
                    base + 1,
                    base + 2,
                    base + 2,
                    base + 1,
                    base + 3,
                ]);
            }
        }

        let mut uv_blend = Vec2::new(4.0 / width_px.max(1.0), 4.0 / height_px.max(1.0));
        let full_circle = (total_angle - TAU).abs() < 1e-4;
        if full_circle {
            // No seam blend on a closed ring.
            uv_blend.x = 1e-6;
        }

        self.draw_polygon(&points, &tex_coords, indices, color, uv_blend, 0.0);
    }

    /// Low-level entry point: writes one submesh into a free slot (or a new
    /// one), interleaving position, UV, color and the per-submesh SDF
    /// parameters.
    pub fn draw_polygon(
        &mut self,
        points: &[Vec2],
        tex_coords: &[Vec2],
        indices: Vec<u32>,
        color: Vec4,
        uv_blend_amount: Vec2,
        corner_radius: f32,
    ) {
        debug_assert_eq!(points.len(), tex_coords.len());

        let slot = match self.draw_data.iter().position(|d| !d.in_use) {
            Some(i) => i,
            None => {
                self.draw_data.push(DrawData::default());
                self.draw_data.len() - 1
            }
        };

        let data = &mut self.draw_data[slot];
        data.vertex_data.clear();
        data.vertex_data
            .reserve(points.len() * ui_vertex_attributes().stride_words());
        for (point, uv) in points.iter().zip(tex_coords) {
            data.vertex_data.extend_from_slice(&point.to_array());
            data.vertex_data.extend_from_slice(&uv.to_array());
            data.vertex_data.extend_from_slice(&color.to_array());
            data.vertex_data.extend_from_slice(&[
                uv_blend_amount.x,
                uv_blend_amount.y,
                corner_radius,
                0.0,
            ]);
        }
        data.indices = indices;
        data.in_use = true;
    }

    /// Submeshes written this frame.
    pub fn active_draws(&self) -> impl Iterator<Item = &DrawData> {
        self.draw_data.iter().filter(|d| d.in_use)
    }

    /// Number of allocated slots (used and free).
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.draw_data.len()
    }

    /// Marks every slot free for the next frame. Allocations are retained.
    pub fn end_frame(&mut self) {
        for data in &mut self.draw_data {
            data.in_use = false;
        }
    }

    /// Drops all slots (scene change).
    pub fn clear(&mut self) {
        self.draw_data.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh() -> UiMesh {
        let mut m = UiMesh::default();
        m.set_window_size(1920, 1080);
        m
    }

    #[test]
    fn rect_uses_one_slot_and_six_indices() {
        let mut m = mesh();
        m.draw_rect(Vec2::new(0.1, 0.1), Vec2::new(0.4, 0.3), Vec4::ONE, 0.0);
        assert_eq!(m.active_draws().count(), 1);
        let draw = m.active_draws().next().unwrap();
        assert_eq!(draw.indices.len(), 6);
        assert_eq!(
            draw.vertex_data.len(),
            4 * ui_vertex_attributes().stride_words()
        );
    }

    #[test]
    fn invalid_rect_is_skipped() {
        let mut m = mesh();
        m.draw_rect(Vec2::new(0.5, 0.5), Vec2::new(0.1, 0.1), Vec4::ONE, 0.0);
        assert_eq!(m.active_draws().count(), 0);
    }

    #[test]
    fn slots_are_reused_across_frames() {
        let mut m = mesh();
        m.draw_rect(Vec2::ZERO, Vec2::ONE, Vec4::ONE, 0.0);
        m.draw_rect(Vec2::new(-1.0, -1.0), Vec2::ZERO, Vec4::ONE, 0.0);
        assert_eq!(m.slot_count(), 2);

        m.end_frame();
        m.draw_rect(Vec2::ZERO, Vec2::ONE, Vec4::ONE, 0.0);
        // Reused slot 0, no new allocation.
        assert_eq!(m.slot_count(), 2);
        assert_eq!(m.active_draws().count(), 1);
    }

    #[test]
    fn full_circle_arc_disables_seam_blend() {
        let mut m = mesh();
        m.draw_arc(Vec2::ZERO, 0.0, TAU, 0.2, 0.05, 32, Vec4::ONE);
        let draw = m.active_draws().next().unwrap();
        let stride = ui_vertex_attributes().stride_words();
        // EXTRA_VEC4.x of the first vertex holds the seam blend.
        let uv_blend_x = draw.vertex_data[stride - 4];
        assert!(uv_blend_x <= 1e-6);
        // One vertex pair per quad boundary (rounding of the angle sum
        // may add one segment).
        let quads = draw.indices.len() / 6;
        assert!((32..=33).contains(&quads));
        assert_eq!(draw.vertex_data.len() / stride, (quads + 1) * 2);
    }

    #[test]
    fn partial_arc_quad_count_follows_angle() {
        let mut m = mesh();
        m.draw_arc(Vec2::ZERO, 0.0, TAU / 4.0, 0.2, 0.05, 32, Vec4::ONE);
        let draw = m.active_draws().next().unwrap();
        let stride = ui_vertex_attributes().stride_words();
        // A quarter of 32 segments is 8 quads, give or take the angle
        // rounding.
        let quads = draw.indices.len() / 6;
        assert!((8..=9).contains(&quads));
        assert_eq!(draw.vertex_data.len() / stride, (quads + 1) * 2);
    }
}
