//! Text Submission
//!
//! Strings are queued per font into `TextCache` entries and flushed once
//! per frame into point-list vertex streams: one vertex per glyph, expanded
//! to a quad in the vertex shader. Screen-space strings anchor like sprites
//! and lay out in pixels; world-space strings advance along the rotated
//! right axis and carry a tangent for quad expansion.

use glam::{Quat, Vec2, Vec3, Vec4};

use crate::text::BitmapFont;
use crate::vertex::VertexAttributes;

use super::sprite::AnchorPoint;

/// One queued string.
#[derive(Debug, Clone)]
pub struct TextCache {
    pub text: String,
    /// Screen-space anchor; ignored in world space.
    pub anchor: AnchorPoint,
    /// Screen-space: pixel offset from the anchor. World-space: position.
    pub position: Vec3,
    /// World-space orientation.
    pub rotation: Quat,
    pub color: Vec4,
    /// Extra advance between glyphs, in multiples of a space's advance.
    pub letter_spacing: f32,
    pub scale: f32,
}

/// Vertex layout of the screen-space text stream.
#[must_use]
pub fn text_vertex_attributes_ss() -> VertexAttributes {
    VertexAttributes::POSITION2
        | VertexAttributes::UV
        | VertexAttributes::COLOR128
        | VertexAttributes::EXTRA_VEC4
        | VertexAttributes::EXTRA_INT
}

/// Vertex layout of the world-space text stream.
#[must_use]
pub fn text_vertex_attributes_ws() -> VertexAttributes {
    VertexAttributes::POSITION
        | VertexAttributes::UV
        | VertexAttributes::COLOR128
        | VertexAttributes::TANGENT
        | VertexAttributes::EXTRA_VEC4
        | VertexAttributes::EXTRA_INT
}

fn push_glyph_common(
    out: &mut Vec<f32>,
    metric: &crate::text::FontMetric,
    color: Vec4,
) {
    let uv_size = metric.uv_max - metric.uv_min;

    out.extend_from_slice(&metric.uv_min.to_array());
    out.extend_from_slice(&color.to_array());
    // Pixel size + normalized size of the glyph quad.
    out.extend_from_slice(&[metric.size.x, metric.size.y, uv_size.x, uv_size.y]);
    out.push(f32::from_bits(u32::from(metric.channel)));
}

/// Emits the screen-space vertex stream for one font's caches.
///
/// Returns one point vertex per glyph; empty strings emit nothing.
#[must_use]
pub fn update_text_buffer_ss(
    font: &BitmapFont,
    caches: &[TextCache],
    window_px: Vec2,
) -> Vec<f32> {
    let mut out = Vec::new();
    if window_px.x <= 0.0 || window_px.y <= 0.0 {
        return out;
    }

    for cache in caches {
        if cache.text.is_empty() {
            continue;
        }

        let spacing_px = font
            .metric(' ')
            .map_or(0.0, |m| m.advance_x * cache.letter_spacing);
        let width_px = font.string_width(&cache.text, spacing_px) * cache.scale;
        let size_px = Vec2::new(width_px, font.string_height(&cache.text) * cache.scale);
        let start = super::sprite::anchored_center_px(
            Vec2::new(cache.position.x, cache.position.y),
            cache.anchor,
            size_px,
            window_px,
        ) - Vec2::new(width_px * 0.5, 0.0);

        let mut pen_x = start.x;
        let mut prev: Option<char> = None;
        for ch in cache.text.chars() {
            let Some(metric) = font.metric(ch) else {
                prev = Some(ch);
                continue;
            };
            if let Some(p) = prev {
                pen_x += font.kern(p, ch) * cache.scale;
            }

            // Pixels → NDC, y up.
            let glyph_pos = Vec2::new(
                (pen_x + metric.offset.x * cache.scale) / window_px.x * 2.0 - 1.0,
                1.0 - (start.y - metric.offset.y * cache.scale) / window_px.y * 2.0,
            );
            out.extend_from_slice(&glyph_pos.to_array());
            push_glyph_common(&mut out, metric, cache.color);

            pen_x += (metric.advance_x + spacing_px) * cache.scale;
            prev = Some(ch);
        }
    }

    out
}

/// Emits the world-space vertex stream for one font's caches.
#[must_use]
pub fn update_text_buffer_ws(font: &BitmapFont, caches: &[TextCache]) -> Vec<f32> {
    let mut out = Vec::new();

    for cache in caches {
        if cache.text.is_empty() {
            continue;
        }

        let right = cache.rotation * Vec3::X;
        let spacing = font
            .metric(' ')
            .map_or(0.0, |m| m.advance_x * cache.letter_spacing);

        // World units per font pixel, so size tracks the baked glyph size.
        let px_to_world = cache.scale / font.size_px.max(1.0);

        let width = font.string_width(&cache.text, spacing) * px_to_world;
        let mut pen = cache.position - right * (width * 0.5);

        let mut prev: Option<char> = None;
        for ch in cache.text.chars() {
            let Some(metric) = font.metric(ch) else {
                prev = Some(ch);
                continue;
            };
            if let Some(p) = prev {
                pen += right * (font.kern(p, ch) * px_to_world);
            }

            let glyph_pos = pen + right * (metric.offset.x * px_to_world);
            out.extend_from_slice(&glyph_pos.to_array());
            out.extend_from_slice(&metric.uv_min.to_array());
            out.extend_from_slice(&cache.color.to_array());
            out.extend_from_slice(&right.to_array());
            let uv_size = metric.uv_max - metric.uv_min;
            out.extend_from_slice(&[
                metric.size.x * px_to_world,
                metric.size.y * px_to_world,
                uv_size.x,
                uv_size.y,
            ]);
            out.push(f32::from_bits(u32::from(metric.channel)));

            pen += right * ((metric.advance_x + spacing) * px_to_world);
            prev = Some(ch);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::FontMetric;
    use glam::Vec2;

    fn test_font() -> BitmapFont {
        let mut font = BitmapFont {
            size_px: 16.0,
            atlas_size: (64, 64),
            ..Default::default()
        };
        for (i, ch) in [' ', 'a', 'b'].iter().enumerate() {
            font.metrics.insert(
                *ch,
                FontMetric {
                    advance_x: 8.0,
                    size: Vec2::new(10.0, 12.0),
                    uv_min: Vec2::new(i as f32 * 0.2, 0.0),
                    uv_max: Vec2::new(i as f32 * 0.2 + 0.15, 0.2),
                    channel: (i % 4) as u8,
                    ..Default::default()
                },
            );
        }
        font
    }

    fn cache(text: &str) -> TextCache {
        TextCache {
            text: text.into(),
            anchor: AnchorPoint::Center,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            color: Vec4::ONE,
            letter_spacing: 0.0,
            scale: 1.0,
        }
    }

    #[test]
    fn one_point_vertex_per_glyph() {
        let font = test_font();
        let out = update_text_buffer_ss(&font, &[cache("ab")], Vec2::new(1280.0, 720.0));
        let stride = text_vertex_attributes_ss().stride_words();
        assert_eq!(out.len(), 2 * stride);
    }

    #[test]
    fn empty_string_emits_nothing() {
        let font = test_font();
        let out = update_text_buffer_ss(&font, &[cache("")], Vec2::new(1280.0, 720.0));
        assert!(out.is_empty());
    }

    #[test]
    fn ws_vertices_carry_tangent() {
        let font = test_font();
        let out = update_text_buffer_ws(&font, &[cache("a")]);
        let stride = text_vertex_attributes_ws().stride_words();
        assert_eq!(out.len(), stride);
        // tangent words follow position(3) + uv(2) + color(4)
        assert_eq!(&out[9..12], &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn channel_index_rides_in_extra_int() {
        let font = test_font();
        let out = update_text_buffer_ss(&font, &[cache("b")], Vec2::new(1280.0, 720.0));
        let stride = text_vertex_attributes_ss().stride_words();
        let channel = out[stride - 1].to_bits();
        assert_eq!(channel, 2);
    }
}
