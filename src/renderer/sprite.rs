//! Sprite Submission
//!
//! Sprites are textured quads queued per frame, either in world space
//! (billboarded toward the camera when flagged; light icons in editor
//! views) or in screen space (HUD icons). Screen-space sprites are placed
//! by an anchor: the given position offsets the sprite from the anchor's
//! corner or edge, with the sprite kept fully on screen at offset zero.

use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

use crate::ids::{MaterialID, TextureID};

/// Screen-space anchor for sprite and text placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorPoint {
    #[default]
    Center,
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
    /// Position is used as-is (already in pixels from the top-left).
    Raw,
}

/// One queued sprite draw.
#[derive(Debug, Clone)]
pub struct SpriteQuadDrawInfo {
    /// Texture sampled by the sprite shader.
    pub texture: TextureID,
    /// Material override; `INVALID` uses the engine sprite material.
    pub material: MaterialID,
    /// Screen-space: pixel offset from the anchor. World-space: position.
    pub pos: Vec3,
    /// World-space orientation; ignored when `face_camera` is set.
    pub rotation: Quat,
    /// Sprite size: pixels (screen space) or world units.
    pub scale: Vec3,
    pub anchor: AnchorPoint,
    pub color: Vec4,
    pub screen_space: bool,
    /// Billboard toward the current camera (world space only).
    pub face_camera: bool,
    /// Depth-test against the scene (world space only).
    pub read_depth: bool,
}

impl Default for SpriteQuadDrawInfo {
    fn default() -> Self {
        Self {
            texture: TextureID::INVALID,
            material: MaterialID::INVALID,
            pos: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::splat(128.0),
            anchor: AnchorPoint::Center,
            color: Vec4::ONE,
            screen_space: true,
            face_camera: false,
            read_depth: true,
        }
    }
}

/// Resolves an anchored screen-space sprite to its center in pixels,
/// measured from the top-left of the window. At offset `(0,0)` the sprite
/// sits flush with its anchor, fully on screen.
#[must_use]
pub fn anchored_center_px(
    offset: Vec2,
    anchor: AnchorPoint,
    size_px: Vec2,
    window_px: Vec2,
) -> Vec2 {
    let half = size_px * 0.5;
    let base = match anchor {
        AnchorPoint::Center => window_px * 0.5,
        AnchorPoint::TopLeft => half,
        AnchorPoint::Top => Vec2::new(window_px.x * 0.5, half.y),
        AnchorPoint::TopRight => Vec2::new(window_px.x - half.x, half.y),
        AnchorPoint::Right => Vec2::new(window_px.x - half.x, window_px.y * 0.5),
        AnchorPoint::BottomRight => window_px - half,
        AnchorPoint::Bottom => Vec2::new(window_px.x * 0.5, window_px.y - half.y),
        AnchorPoint::BottomLeft => Vec2::new(half.x, window_px.y - half.y),
        AnchorPoint::Left => Vec2::new(half.x, window_px.y * 0.5),
        AnchorPoint::Raw => Vec2::ZERO,
    };
    base + offset
}

/// Model matrix for a screen-space sprite: maps the unit quad to clip
/// space at the anchored position.
#[must_use]
pub fn screen_space_sprite_matrix(info: &SpriteQuadDrawInfo, window_px: Vec2) -> Mat4 {
    let center = anchored_center_px(
        Vec2::new(info.pos.x, info.pos.y),
        info.anchor,
        Vec2::new(info.scale.x, info.scale.y),
        window_px,
    );

    // Pixels → NDC (y down in pixels, up in clip space)
    let ndc = Vec2::new(
        center.x / window_px.x * 2.0 - 1.0,
        1.0 - center.y / window_px.y * 2.0,
    );
    let scale_ndc = Vec2::new(info.scale.x / window_px.x, info.scale.y / window_px.y);

    Mat4::from_translation(Vec3::new(ndc.x, ndc.y, 0.0))
        * Mat4::from_quat(info.rotation)
        * Mat4::from_scale(Vec3::new(scale_ndc.x, scale_ndc.y, 1.0))
}

/// Model matrix for a world-space sprite, billboarded when requested.
#[must_use]
pub fn world_space_sprite_matrix(info: &SpriteQuadDrawInfo, camera_view_inv: &Mat4) -> Mat4 {
    let rotation = if info.face_camera {
        // Take the camera's orientation so the quad faces the viewer.
        Quat::from_mat4(camera_view_inv)
    } else {
        info.rotation
    };
    Mat4::from_scale_rotation_translation(info.scale, rotation, info.pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Vec2 = Vec2::new(1920.0, 1080.0);
    const SIZE: Vec2 = Vec2::new(128.0, 128.0);

    #[test]
    fn anchors_keep_sprites_on_screen() {
        let top_left = anchored_center_px(Vec2::ZERO, AnchorPoint::TopLeft, SIZE, WINDOW);
        let center = anchored_center_px(Vec2::ZERO, AnchorPoint::Center, SIZE, WINDOW);
        let bottom_right = anchored_center_px(Vec2::ZERO, AnchorPoint::BottomRight, SIZE, WINDOW);

        assert_eq!(top_left, Vec2::new(64.0, 64.0));
        assert_eq!(center, Vec2::new(960.0, 540.0));
        assert_eq!(bottom_right, Vec2::new(1856.0, 1016.0));
    }

    #[test]
    fn offset_shifts_from_the_anchor() {
        let shifted = anchored_center_px(
            Vec2::new(10.0, -4.0),
            AnchorPoint::TopLeft,
            SIZE,
            WINDOW,
        );
        assert_eq!(shifted, Vec2::new(74.0, 60.0));
    }

    #[test]
    fn screen_space_matrix_centers_the_unit_quad() {
        let info = SpriteQuadDrawInfo {
            anchor: AnchorPoint::Center,
            ..Default::default()
        };
        let m = screen_space_sprite_matrix(&info, WINDOW);
        let center = m.transform_point3(Vec3::ZERO);
        assert!(center.abs_diff_eq(Vec3::ZERO, 1e-6));
    }
}
