//! Physics Debug Drawing
//!
//! The physics engine pushes line segments through the bullet-style debug
//! interface (`draw_line`, `draw_contact_point`, `flush_lines`); the
//! renderer turns the accumulated segments into one dynamic vertex stream
//! per frame. [`clear_lines`](PhysicsDebugDraw::clear_lines) resets the
//! logical length without releasing capacity, so steady-state frames do not
//! allocate.

use bitflags::bitflags;
use glam::{Vec3, Vec4};

use crate::settings::PhysicsDebuggingSettings;
use crate::vertex::VertexAttributes;

bitflags! {
    /// Bullet-compatible debug draw mode bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DebugMode: u32 {
        const WIREFRAME              = 1 << 0;
        const AABB                   = 1 << 1;
        const CONTACT_POINTS         = 1 << 3;
        const NO_DEACTIVATION        = 1 << 4;
        const CONSTRAINTS            = 1 << 11;
        const CONSTRAINT_LIMITS      = 1 << 12;
        const FAST_WIREFRAME         = 1 << 13;
        const NORMALS                = 1 << 14;
        const FRAMES                 = 1 << 15;
        const CCD                    = 1 << 16;
    }
}

/// One debug line in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSegment {
    pub start: Vec3,
    pub end: Vec3,
    pub color: Vec4,
}

/// Accumulates debug lines over a frame.
#[derive(Debug, Default)]
pub struct PhysicsDebugDraw {
    segments: Vec<LineSegment>,
    debug_mode: DebugMode,
}

impl PhysicsDebugDraw {
    /// Appends one opaque line.
    pub fn draw_line(&mut self, from: Vec3, to: Vec3, color: Vec3) {
        self.draw_line_with_alpha(from, to, color.extend(1.0));
    }

    /// Appends one line with explicit alpha.
    pub fn draw_line_with_alpha(&mut self, from: Vec3, to: Vec3, color: Vec4) {
        self.segments.push(LineSegment {
            start: from,
            end: to,
            color,
        });
    }

    /// Draws a contact point as a short line along its normal.
    pub fn draw_contact_point(
        &mut self,
        point: Vec3,
        normal: Vec3,
        distance: f32,
        _lifetime: i32,
        color: Vec3,
    ) {
        self.draw_line(point, point + normal * distance.max(0.05), color);
    }

    /// Resets the logical segment count to zero without freeing capacity;
    /// the next `draw_line` writes index 0.
    pub fn clear_lines(&mut self) {
        self.segments.clear();
    }

    /// Segments accumulated this frame.
    #[must_use]
    pub fn line_segments(&self) -> &[LineSegment] {
        &self.segments
    }

    /// Capacity of the segment store; retained across frames.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.segments.capacity()
    }

    /// Current debug mode bits.
    #[must_use]
    pub fn debug_mode(&self) -> DebugMode {
        self.debug_mode
    }

    /// Sets the debug mode bits directly.
    pub fn set_debug_mode(&mut self, mode: DebugMode) {
        self.debug_mode = mode;
    }

    /// Maps the engine's per-toggle settings onto the debug-mode bitmask.
    pub fn update_debug_mode(&mut self, settings: &PhysicsDebuggingSettings) {
        let mut mode = DebugMode::empty();
        if !settings.disable_all {
            mode.set(DebugMode::WIREFRAME, settings.wireframe);
            mode.set(DebugMode::AABB, settings.aabb);
            mode.set(DebugMode::CONTACT_POINTS, settings.draw_contact_points);
            mode.set(DebugMode::NO_DEACTIVATION, settings.no_deactivation);
            mode.set(DebugMode::CONSTRAINTS, settings.draw_constraints);
            mode.set(DebugMode::CONSTRAINT_LIMITS, settings.draw_constraint_limits);
            mode.set(DebugMode::FAST_WIREFRAME, settings.fast_wireframe);
            mode.set(DebugMode::NORMALS, settings.draw_normals);
            mode.set(DebugMode::FRAMES, settings.draw_frames);
            mode.set(DebugMode::CCD, settings.enable_ccd);
        }
        self.debug_mode = mode;
    }

    /// Flushes the segment list into an interleaved `POSITION + COLOR128`
    /// stream for a `LineList` draw. Returns `None` when no lines were
    /// submitted, so an empty set produces zero draw calls.
    #[must_use]
    pub fn flush_lines(&self) -> Option<Vec<f32>> {
        if self.segments.is_empty() {
            return None;
        }

        let stride =
            (VertexAttributes::POSITION | VertexAttributes::COLOR128).stride_words();
        let mut data = Vec::with_capacity(self.segments.len() * 2 * stride);
        for segment in &self.segments {
            for point in [segment.start, segment.end] {
                data.extend_from_slice(&point.to_array());
                data.extend_from_slice(&segment.color.to_array());
            }
        }
        Some(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_keeps_capacity() {
        let mut drawer = PhysicsDebugDraw::default();
        for i in 0..1000 {
            drawer.draw_line(Vec3::splat(i as f32), Vec3::ZERO, Vec3::ONE);
        }
        let capacity = drawer.capacity();
        drawer.clear_lines();

        assert_eq!(drawer.line_segments().len(), 0);
        assert!(drawer.capacity() >= capacity);

        drawer.draw_line(Vec3::X, Vec3::Y, Vec3::ONE);
        assert_eq!(drawer.line_segments()[0].start, Vec3::X);
    }

    #[test]
    fn empty_set_flushes_to_none() {
        let drawer = PhysicsDebugDraw::default();
        assert!(drawer.flush_lines().is_none());
    }

    #[test]
    fn flush_interleaves_position_and_color() {
        let mut drawer = PhysicsDebugDraw::default();
        drawer.draw_line_with_alpha(Vec3::X, Vec3::Y, Vec4::new(0.0, 1.0, 0.0, 0.5));
        let data = drawer.flush_lines().unwrap();
        assert_eq!(data.len(), 2 * 7);
        assert_eq!(&data[0..3], &[1.0, 0.0, 0.0]);
        assert_eq!(&data[3..7], &[0.0, 1.0, 0.0, 0.5]);
    }

    #[test]
    fn debug_mode_maps_settings_bits() {
        let mut drawer = PhysicsDebugDraw::default();
        let settings = PhysicsDebuggingSettings {
            wireframe: true,
            draw_contact_points: true,
            ..Default::default()
        };
        drawer.update_debug_mode(&settings);
        assert_eq!(
            drawer.debug_mode(),
            DebugMode::WIREFRAME | DebugMode::CONTACT_POINTS
        );

        let disabled = PhysicsDebuggingSettings {
            disable_all: true,
            wireframe: true,
            ..settings
        };
        drawer.update_debug_mode(&disabled);
        assert!(drawer.debug_mode().is_empty());
    }
}
