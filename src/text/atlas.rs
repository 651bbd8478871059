//! SDF atlas baking.
//!
//! Each glyph is rasterized at a high-resolution scale, converted to a
//! signed distance field, and packed into one channel of a shared RGBA
//! atlas. Glyphs are grouped four to a region — one per channel — so four
//! glyphs share the same rectangle without collision. Regions are placed
//! with alternating horizontal/vertical growth to keep the atlas
//! near-square.
//!
//! The finished atlas is saved next to the font resources; on later runs the
//! image is loaded back and only the metrics are recomputed, skipping the
//! expensive render entirely.

use std::path::Path;

use glam::Vec2;
use rustc_hash::FxHashMap;

use crate::errors::{EmberError, Result};

use super::font::{FontMetaData, FontMetric};

/// Bake parameters. The defaults match the engine's shipped fonts.
#[derive(Debug, Clone, Copy)]
pub struct AtlasBakeParams {
    /// High-resolution render scale per output texel.
    pub sample_density: u32,
    /// Padding in texels around each packed region.
    pub padding: u32,
    /// Distance-field range in output texels.
    pub spread: u32,
    /// Inclusive Unicode code point range to bake.
    pub glyph_range: (u32, u32),
}

impl Default for AtlasBakeParams {
    fn default() -> Self {
        Self {
            sample_density: 32,
            padding: 1,
            spread: 5,
            glyph_range: (0x20, 0x7E),
        }
    }
}

/// Placement of one glyph inside the atlas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlyphPlacement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Channel (0–3) within the shared region.
    pub channel: u8,
}

/// Result of a bake or a cached-atlas reload.
#[derive(Debug, Default)]
pub struct BakedAtlas {
    /// Per-glyph metrics with normalized UVs.
    pub metrics: FxHashMap<char, FontMetric>,
    /// Kerning pairs in pixels at the baked size.
    pub kerning: FxHashMap<(char, char), f32>,
    /// Atlas dimensions in texels.
    pub atlas_size: (u32, u32),
    /// Atlas pixels; `None` when the cached image on disk is authoritative.
    pub image: Option<image::RgbaImage>,
    /// Whether the atlas was rendered this call.
    pub freshly_rendered: bool,
}

// ============================================================================
// Packing
// ============================================================================

/// Packs glyph boxes into channel regions.
///
/// Consecutive groups of four glyphs share one region sized to the largest
/// member; regions are appended to the current row while the atlas is
/// taller than wide and wrapped to a new row otherwise, alternating the
/// growth axis to stay near-square. Returns per-glyph placements plus the
/// final atlas dimensions.
#[must_use]
pub fn pack_glyph_regions(
    sizes: &[(u32, u32)],
    padding: u32,
) -> (Vec<GlyphPlacement>, u32, u32) {
    let mut placements = vec![GlyphPlacement::default(); sizes.len()];

    let mut cursor_x = padding;
    let mut cursor_y = padding;
    let mut row_height = 0u32;
    let mut atlas_w = 0u32;
    let mut atlas_h = 0u32;

    for (group_index, group) in sizes.chunks(4).enumerate() {
        let region_w = group.iter().map(|s| s.0).max().unwrap_or(0);
        let region_h = group.iter().map(|s| s.1).max().unwrap_or(0);

        // Alternate growth: extend the row while width trails height,
        // otherwise wrap and grow vertically.
        let row_full = atlas_w > 0 && cursor_x + region_w + padding > atlas_h.max(atlas_w);
        if row_full && cursor_x > padding {
            cursor_x = padding;
            cursor_y += row_height + padding;
            row_height = 0;
        }

        for (i, _) in group.iter().enumerate() {
            let glyph_index = group_index * 4 + i;
            placements[glyph_index] = GlyphPlacement {
                x: cursor_x,
                y: cursor_y,
                width: sizes[glyph_index].0,
                height: sizes[glyph_index].1,
                channel: i as u8,
            };
        }

        cursor_x += region_w + padding;
        row_height = row_height.max(region_h);
        atlas_w = atlas_w.max(cursor_x);
        atlas_h = atlas_h.max(cursor_y + row_height + padding);
    }

    (placements, atlas_w, atlas_h)
}

// ============================================================================
// Distance transform
// ============================================================================

/// Two-pass chamfer distance transform over a binary mask.
///
/// Returns per-cell distance to the nearest `true` cell, in cell units.
fn chamfer_distance(mask: &[bool], width: usize, height: usize) -> Vec<f32> {
    const ORTH: f32 = 1.0;
    const DIAG: f32 = std::f32::consts::SQRT_2;
    let inf = (width + height) as f32 * 2.0;

    let mut dist: Vec<f32> = mask
        .iter()
        .map(|inside| if *inside { 0.0 } else { inf })
        .collect();

    let idx = |x: usize, y: usize| y * width + x;

    // Forward pass
    for y in 0..height {
        for x in 0..width {
            let mut d = dist[idx(x, y)];
            if x > 0 {
                d = d.min(dist[idx(x - 1, y)] + ORTH);
            }
            if y > 0 {
                d = d.min(dist[idx(x, y - 1)] + ORTH);
                if x > 0 {
                    d = d.min(dist[idx(x - 1, y - 1)] + DIAG);
                }
                if x + 1 < width {
                    d = d.min(dist[idx(x + 1, y - 1)] + DIAG);
                }
            }
            dist[idx(x, y)] = d;
        }
    }

    // Backward pass
    for y in (0..height).rev() {
        for x in (0..width).rev() {
            let mut d = dist[idx(x, y)];
            if x + 1 < width {
                d = d.min(dist[idx(x + 1, y)] + ORTH);
            }
            if y + 1 < height {
                d = d.min(dist[idx(x, y + 1)] + ORTH);
                if x + 1 < width {
                    d = d.min(dist[idx(x + 1, y + 1)] + DIAG);
                }
                if x > 0 {
                    d = d.min(dist[idx(x - 1, y + 1)] + DIAG);
                }
            }
            dist[idx(x, y)] = d;
        }
    }

    dist
}

/// Converts a high-resolution coverage bitmap into a downsampled SDF tile.
///
/// Output texels map `signed distance / spread` into 0–255 with 127.5 on the
/// glyph edge.
fn coverage_to_sdf(
    coverage: &[u8],
    hi_w: usize,
    hi_h: usize,
    upscale: u32,
    spread: u32,
) -> (Vec<u8>, usize, usize) {
    let out_w = hi_w.div_ceil(upscale as usize) + 2 * spread as usize;
    let out_h = hi_h.div_ceil(upscale as usize) + 2 * spread as usize;

    if hi_w == 0 || hi_h == 0 {
        return (vec![0; out_w * out_h], out_w, out_h);
    }

    let inside_mask: Vec<bool> = coverage.iter().map(|c| *c >= 128).collect();
    let outside_mask: Vec<bool> = coverage.iter().map(|c| *c < 128).collect();

    let dist_to_inside = chamfer_distance(&inside_mask, hi_w, hi_h);
    let dist_to_outside = chamfer_distance(&outside_mask, hi_w, hi_h);

    let max_dist = (spread * upscale) as f32;
    let mut out = vec![0u8; out_w * out_h];

    for y in 0..out_h {
        for x in 0..out_w {
            // Sample point in high-res space; border texels fall outside
            // the bitmap and clamp to its edge.
            let hx = ((x as f32 - spread as f32 + 0.5) * upscale as f32)
                .clamp(0.0, (hi_w - 1) as f32) as usize;
            let hy = ((y as f32 - spread as f32 + 0.5) * upscale as f32)
                .clamp(0.0, (hi_h - 1) as f32) as usize;
            let in_bitmap_x = (x as f32 - spread as f32 + 0.5) * upscale as f32;
            let in_bitmap_y = (y as f32 - spread as f32 + 0.5) * upscale as f32;
            let outside_bitmap = in_bitmap_x < 0.0
                || in_bitmap_y < 0.0
                || in_bitmap_x >= hi_w as f32
                || in_bitmap_y >= hi_h as f32;

            let cell = hy * hi_w + hx;
            let mut signed = if inside_mask[cell] {
                dist_to_outside[cell]
            } else {
                -dist_to_inside[cell]
            };
            if outside_bitmap {
                // Distance continues past the bitmap edge.
                let dx = (in_bitmap_x - hx as f32).abs();
                let dy = (in_bitmap_y - hy as f32).abs();
                signed -= dx.max(dy);
            }

            let normalized = (signed / max_dist).clamp(-1.0, 1.0);
            out[y * out_w + x] = ((normalized * 0.5 + 0.5) * 255.0) as u8;
        }
    }

    (out, out_w, out_h)
}

// ============================================================================
// Bake
// ============================================================================

/// Bakes or reloads the SDF atlas for one font definition entry.
///
/// When the cached atlas image already exists at `atlas_path` (and
/// `force_render` is off), the image is loaded and only placements and
/// metrics are recomputed from the font file. Otherwise every glyph in the
/// configured range is rendered, the atlas is assembled and saved to
/// `atlas_path` for reuse.
pub fn bake_font(
    meta: &FontMetaData,
    dpi: f32,
    atlas_path: &Path,
    force_render: bool,
    params: AtlasBakeParams,
) -> Result<BakedAtlas> {
    let font_bytes = std::fs::read(&meta.file_path).map_err(|e| EmberError::ResourceLoadFailed {
        path: meta.file_path.clone(),
        reason: e.to_string(),
    })?;
    let font = fontdue::Font::from_bytes(font_bytes.as_slice(), fontdue::FontSettings::default())
        .map_err(|e| EmberError::ResourceLoadFailed {
            path: meta.file_path.clone(),
            reason: e.to_string(),
        })?;

    let size_px = f32::from(meta.size) * dpi / 96.0;
    let upscale = params.sample_density.max(1);
    let spread = params.spread;

    let glyphs: Vec<char> = (params.glyph_range.0..=params.glyph_range.1)
        .filter_map(char::from_u32)
        .filter(|ch| font.lookup_glyph_index(*ch) != 0)
        .collect();

    let use_cached = !force_render && atlas_path.exists();

    // SDF tile sizes drive the packing; on the cached path they are derived
    // from the layout metrics alone so no glyph is rendered.
    let mut tiles: Vec<(Vec<u8>, usize, usize)> = Vec::new();
    let mut sizes: Vec<(u32, u32)> = Vec::with_capacity(glyphs.len());

    for ch in &glyphs {
        if use_cached {
            let m = font.metrics(*ch, size_px);
            sizes.push((
                m.width as u32 + 2 * spread,
                m.height as u32 + 2 * spread,
            ));
        } else {
            let (m, coverage) = font.rasterize(*ch, size_px * upscale as f32);
            let (tile, w, h) = coverage_to_sdf(&coverage, m.width, m.height, upscale, spread);
            sizes.push((w as u32, h as u32));
            tiles.push((tile, w, h));
        }
    }

    let (placements, atlas_w, atlas_h) = pack_glyph_regions(&sizes, params.padding);

    let mut baked = BakedAtlas {
        atlas_size: (atlas_w, atlas_h),
        freshly_rendered: !use_cached,
        ..Default::default()
    };

    // Metrics + normalized UVs
    for (i, ch) in glyphs.iter().enumerate() {
        let m = font.metrics(*ch, size_px);
        let p = placements[i];
        baked.metrics.insert(
            *ch,
            FontMetric {
                advance_x: m.advance_width,
                offset: Vec2::new(
                    m.xmin as f32 - spread as f32,
                    m.ymin as f32 - spread as f32,
                ),
                size: Vec2::new(p.width as f32, p.height as f32),
                channel: p.channel,
                uv_min: Vec2::new(p.x as f32 / atlas_w as f32, p.y as f32 / atlas_h as f32),
                uv_max: Vec2::new(
                    (p.x + p.width) as f32 / atlas_w as f32,
                    (p.y + p.height) as f32 / atlas_h as f32,
                ),
            },
        );
    }

    // Kerning pairs
    for left in &glyphs {
        for right in &glyphs {
            if let Some(kern) = font.horizontal_kern(*left, *right, size_px) {
                if kern != 0.0 {
                    baked.kerning.insert((*left, *right), kern);
                }
            }
        }
    }

    if use_cached {
        // Confirm the cached image decodes; its pixels stay on disk until
        // the backend uploads them.
        let img = image::open(atlas_path).map_err(|e| EmberError::ResourceLoadFailed {
            path: atlas_path.to_string_lossy().into_owned(),
            reason: e.to_string(),
        })?;
        baked.atlas_size = (img.width(), img.height());
        baked.image = Some(img.into_rgba8());
        log::info!(
            "Loaded font atlas texture from {} for font {}",
            atlas_path.display(),
            meta.name
        );
        return Ok(baked);
    }

    // Assemble the atlas: one glyph per channel within each shared region.
    let mut atlas = image::RgbaImage::new(atlas_w.max(1), atlas_h.max(1));
    for (i, (tile, w, h)) in tiles.iter().enumerate() {
        let p = placements[i];
        for ty in 0..*h {
            for tx in 0..*w {
                let px = atlas.get_pixel_mut(p.x + tx as u32, p.y + ty as u32);
                px.0[p.channel as usize] = tile[ty * w + tx];
            }
        }
    }

    if let Some(parent) = atlas_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    atlas
        .save(atlas_path)
        .map_err(|e| EmberError::ResourceLoadFailed {
            path: atlas_path.to_string_lossy().into_owned(),
            reason: e.to_string(),
        })?;

    log::info!(
        "Rendered font atlas for {} ({}x{}, {} glyphs) to {}",
        meta.name,
        atlas_w,
        atlas_h,
        glyphs.len(),
        atlas_path.display()
    );

    baked.image = Some(atlas);
    Ok(baked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_of_four_share_one_region() {
        let sizes = [(10, 12), (8, 14), (12, 10), (9, 9)];
        let (placements, w, h) = pack_glyph_regions(&sizes, 1);

        // All four glyphs sit at the same origin in different channels.
        for (i, p) in placements.iter().enumerate() {
            assert_eq!((p.x, p.y), (1, 1));
            assert_eq!(p.channel, i as u8);
        }
        // Region spans the max member + padding on both sides.
        assert_eq!(w, 1 + 12 + 1);
        assert_eq!(h, 1 + 14 + 1);
    }

    #[test]
    fn atlas_stays_near_square() {
        let sizes: Vec<(u32, u32)> = (0..64).map(|_| (16, 16)).collect();
        let (_, w, h) = pack_glyph_regions(&sizes, 1);
        let ratio = f64::from(w.max(h)) / f64::from(w.min(h));
        assert!(ratio < 2.5, "atlas {w}x{h} is too elongated");
    }

    #[test]
    fn sdf_edge_sits_at_midgray() {
        // A solid square: its center is deep inside, corners deep outside.
        let hi = 64usize;
        let coverage = vec![255u8; hi * hi];
        let (tile, w, h) = coverage_to_sdf(&coverage, hi, hi, 8, 5);

        let center = tile[(h / 2) * w + w / 2];
        let corner = tile[0];
        assert!(center > 200, "center should read far inside ({center})");
        assert!(corner < 100, "corner should read outside ({corner})");
    }
}
