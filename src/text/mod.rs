//! Fonts and the SDF Atlas Bake
//!
//! Text rendering is driven by signed-distance-field atlases baked on the
//! CPU from TrueType sources. A bake is expensive, so its result — the
//! four-channel atlas image — is written next to the resources and reused on
//! subsequent runs; only the metrics are recomputed from the font file.
//!
//! The font definition file is a JSON document listing one entry per font
//! (name, file path, pixel size, screen-space flag, and the SDF shading
//! parameters threshold / shadow / soften). The renderer reads and
//! re-serializes this file; the debug UI edits entries in place.

pub mod atlas;
pub mod font;

pub use atlas::{AtlasBakeParams, GlyphPlacement, bake_font, pack_glyph_regions};
pub use font::{BitmapFont, FontDefinitionFile, FontMetaData, FontMetric};
