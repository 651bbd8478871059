//! Font & Atlas Tests
//!
//! Headless coverage of the SDF atlas machinery:
//! - Four-channel region packing: shared rectangles, near-square growth,
//!   the width law along the growth axis
//! - Font definition file round-trips
//! - Glyph vertex emission and string measurement with kerning

use glam::{Quat, Vec2, Vec3, Vec4};

use ember::renderer::sprite::AnchorPoint;
use ember::renderer::text_draw::{
    TextCache, text_vertex_attributes_ss, update_text_buffer_ss, update_text_buffer_ws,
};
use ember::text::font::FontMetric;
use ember::text::{BitmapFont, FontDefinitionFile, FontMetaData, pack_glyph_regions};

// ============================================================================
// Packing
// ============================================================================

#[test]
fn four_glyphs_share_one_region_across_channels() {
    let sizes = [(12, 18), (10, 20), (14, 16), (11, 19)];
    let (placements, _, _) = pack_glyph_regions(&sizes, 1);

    let origin = (placements[0].x, placements[0].y);
    for (i, p) in placements.iter().enumerate() {
        assert_eq!((p.x, p.y), origin, "glyph {i} left its shared region");
        assert_eq!(p.channel, i as u8);
    }
}

#[test]
fn atlas_width_equals_row_extent_plus_padding() {
    let padding = 1u32;
    let sizes: Vec<(u32, u32)> = (0..48).map(|i| (10 + (i % 4), 14)).collect();
    let (placements, atlas_w, atlas_h) = pack_glyph_regions(&sizes, padding);

    // Reconstruct rows from region origins; the atlas width must equal
    // padding plus the sum of (region width + padding) of its widest row.
    let mut rows: Vec<(u32, u32)> = Vec::new(); // (y, extent)
    for group in placements.chunks(4) {
        let region_w = group.iter().map(|p| p.width).max().unwrap();
        let y = group[0].y;
        match rows.iter_mut().find(|(row_y, _)| *row_y == y) {
            Some((_, extent)) => *extent += region_w + padding,
            None => rows.push((y, padding + region_w + padding)),
        }
    }
    let widest = rows.iter().map(|(_, e)| *e).max().unwrap();
    assert_eq!(atlas_w, widest);
    assert!(atlas_h > 0);
}

#[test]
fn packing_alternates_growth_to_stay_near_square() {
    let sizes: Vec<(u32, u32)> = (0..256).map(|_| (12, 12)).collect();
    let (_, w, h) = pack_glyph_regions(&sizes, 1);
    let ratio = f64::from(w.max(h)) / f64::from(w.min(h));
    assert!(ratio < 2.0, "atlas {w}x{h} drifted from square");
}

#[test]
fn empty_glyph_set_packs_to_empty_atlas() {
    let (placements, w, h) = pack_glyph_regions(&[], 1);
    assert!(placements.is_empty());
    assert_eq!((w, h), (0, 0));
}

// ============================================================================
// Font definition file
// ============================================================================

#[test]
fn font_definition_file_round_trips_every_field() {
    let file = FontDefinitionFile {
        fonts: vec![FontMetaData {
            name: "hud".into(),
            file_path: "fonts/hud.ttf".into(),
            size: 24,
            screen_space: true,
            threshold: 0.55,
            shadow_opacity: 0.35,
            shadow_offset: Vec2::new(0.008, 0.004),
            soften: 0.02,
        }],
    };

    let json = serde_json::to_string_pretty(&file).unwrap();
    let back: FontDefinitionFile = serde_json::from_str(&json).unwrap();
    assert_eq!(file, back);
}

// ============================================================================
// Glyph emission
// ============================================================================

fn synthetic_font() -> BitmapFont {
    let mut font = BitmapFont {
        size_px: 16.0,
        atlas_size: (128, 128),
        ..Default::default()
    };
    for (i, ch) in "abc def".chars().enumerate() {
        font.metrics.insert(
            ch,
            FontMetric {
                advance_x: 9.0,
                offset: Vec2::new(1.0, -2.0),
                size: Vec2::new(12.0, 14.0),
                channel: (i % 4) as u8,
                uv_min: Vec2::new(0.1 * i as f32, 0.0),
                uv_max: Vec2::new(0.1 * i as f32 + 0.09, 0.11),
                ..Default::default()
            },
        );
    }
    font.kerning.insert(('a', 'b'), -1.5);
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
fn one_vertex_per_glyph_in_both_spaces() {
    let font = synthetic_font();
    let window = Vec2::new(1280.0, 720.0);

    let ss = update_text_buffer_ss(&font, &[cache("abc")], window);
    assert_eq!(ss.len() / text_vertex_attributes_ss().stride_words(), 3);

    let ws = update_text_buffer_ws(&font, &[cache("abc")]);
    assert_eq!(
        ws.len() / ember::renderer::text_draw::text_vertex_attributes_ws().stride_words(),
        3
    );
}

#[test]
fn string_width_accounts_for_kerning_pairs() {
    let font = synthetic_font();
    assert!(font.use_kerning());

    let plain = font.string_width("ba", 0.0);
    let kerned = font.string_width("ab", 0.0);
    assert!((plain - 18.0).abs() < 1e-5);
    assert!((kerned - 16.5).abs() < 1e-5, "kerning must shorten 'ab'");
}

#[test]
fn glyphs_missing_from_the_font_are_skipped() {
    let font = synthetic_font();
    let window = Vec2::new(1280.0, 720.0);
    // 'x' and 'y' were never baked.
    let out = update_text_buffer_ss(&font, &[cache("axyb")], window);
    assert_eq!(out.len() / text_vertex_attributes_ss().stride_words(), 2);
}

#[test]
fn atlas_path_derives_from_font_file_and_size() {
    let path = ember::renderer::Renderer::font_atlas_path("fonts/UbuntuMono.ttf", 16);
    assert_eq!(
        path.to_string_lossy().replace('\\', "/"),
        "fonts/UbuntuMono-16-sdf.png"
    );
}
