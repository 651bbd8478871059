//! Font metadata and glyph metrics.

use glam::Vec2;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::ids::TextureID;

/// One entry of the font definition file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontMetaData {
    /// Display name, also the key the renderer sets fonts by.
    pub name: String,
    /// TrueType source path.
    pub file_path: String,
    /// Glyph pixel size at 96 DPI.
    pub size: i16,
    /// Whether strings using this font are laid out in screen space.
    pub screen_space: bool,
    /// SDF threshold at which a fragment counts as inside the glyph.
    pub threshold: f32,
    /// Opacity of the drop shadow; 0 disables it.
    pub shadow_opacity: f32,
    /// Shadow offset in UV units.
    pub shadow_offset: Vec2,
    /// Softness of the SDF edge falloff.
    pub soften: f32,
}

impl Default for FontMetaData {
    fn default() -> Self {
        Self {
            name: String::new(),
            file_path: String::new(),
            size: 16,
            screen_space: true,
            threshold: 0.5,
            shadow_opacity: 0.0,
            shadow_offset: Vec2::new(0.006, 0.002),
            soften: 0.035,
        }
    }
}

/// The font definition file: a list of font entries, re-serialized in place
/// when the debug UI saves its tweaks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FontDefinitionFile {
    /// All declared fonts.
    pub fonts: Vec<FontMetaData>,
}

/// Metrics of one baked glyph.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FontMetric {
    /// Horizontal advance in pixels.
    pub advance_x: f32,
    /// Bearing from the pen position to the glyph box origin.
    pub offset: Vec2,
    /// Glyph box size in pixels.
    pub size: Vec2,
    /// Which atlas channel (0–3) holds the glyph.
    pub channel: u8,
    /// Normalized UV of the glyph box minimum corner.
    pub uv_min: Vec2,
    /// Normalized UV of the glyph box maximum corner.
    pub uv_max: Vec2,
}

/// A baked font: glyph metrics plus its atlas texture.
#[derive(Debug, Default)]
pub struct BitmapFont {
    /// Definition entry this font was baked from.
    pub meta: FontMetaData,
    /// Effective pixel size after DPI scaling.
    pub size_px: f32,
    /// Per-glyph metrics.
    pub metrics: FxHashMap<char, FontMetric>,
    /// Kerning adjustments for glyph pairs, in pixels. Empty when the font
    /// provides none.
    pub kerning: FxHashMap<(char, char), f32>,
    /// Atlas texture registered in the texture table.
    pub atlas: TextureID,
    /// Atlas dimensions in texels.
    pub atlas_size: (u32, u32),
    /// Whether the atlas was baked this run (as opposed to loaded from the
    /// cached image).
    pub freshly_rendered: bool,
}

impl BitmapFont {
    /// Metric for `ch`, if the glyph was baked.
    #[must_use]
    pub fn metric(&self, ch: char) -> Option<&FontMetric> {
        self.metrics.get(&ch)
    }

    /// Kerning between two glyphs, zero when the font provides none.
    #[must_use]
    pub fn kern(&self, left: char, right: char) -> f32 {
        self.kerning.get(&(left, right)).copied().unwrap_or(0.0)
    }

    /// Whether any kerning pairs were loaded.
    #[must_use]
    pub fn use_kerning(&self) -> bool {
        !self.kerning.is_empty()
    }

    /// Measures a string in pixels, applying kerning when present.
    #[must_use]
    pub fn string_width(&self, text: &str, letter_spacing: f32) -> f32 {
        let mut width = 0.0;
        let mut prev: Option<char> = None;
        for ch in text.chars() {
            if let Some(metric) = self.metric(ch) {
                if let Some(p) = prev {
                    width += self.kern(p, ch);
                }
                width += metric.advance_x + letter_spacing;
            }
            prev = Some(ch);
        }
        width
    }

    /// Height of a string in pixels: the tallest glyph box.
    #[must_use]
    pub fn string_height(&self, text: &str) -> f32 {
        text.chars()
            .filter_map(|ch| self.metric(ch).map(|m| m.size.y))
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn font_definition_round_trip_is_fixed_point() {
        let file = FontDefinitionFile {
            fonts: vec![
                FontMetaData {
                    name: "editor-small".into(),
                    file_path: "fonts/UbuntuCondensed-Regular.ttf".into(),
                    size: 12,
                    ..Default::default()
                },
                FontMetaData {
                    name: "world-large".into(),
                    file_path: "fonts/UbuntuCondensed-Regular.ttf".into(),
                    size: 32,
                    screen_space: false,
                    shadow_opacity: 0.8,
                    ..Default::default()
                },
            ],
        };

        let json = serde_json::to_string_pretty(&file).unwrap();
        let back: FontDefinitionFile = serde_json::from_str(&json).unwrap();
        assert_eq!(file, back);
    }

    #[test]
    fn string_width_applies_kerning() {
        let mut font = BitmapFont::default();
        font.metrics.insert(
            'A',
            FontMetric {
                advance_x: 10.0,
                ..Default::default()
            },
        );
        font.metrics.insert(
            'V',
            FontMetric {
                advance_x: 10.0,
                ..Default::default()
            },
        );
        font.kerning.insert(('A', 'V'), -2.0);

        assert!((font.string_width("AV", 0.0) - 18.0).abs() < f32::EPSILON);
        assert!((font.string_width("VA", 0.0) - 20.0).abs() < f32::EPSILON);
    }

    #[test]
    fn empty_string_measures_zero() {
        let font = BitmapFont::default();
        assert_eq!(font.string_width("", 0.0), 0.0);
        assert_eq!(font.string_height(""), 0.0);
    }
}
