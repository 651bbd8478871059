//! Textures
//!
//! CPU-side texture objects: decoded pixel data plus the metadata the
//! backends need to create their images. Textures are interned by path in
//! the [`ResourceManager`](super::manager::ResourceManager); a failed load
//! leaves the table untouched and the caller falls back to the 1×1 white
//! placeholder.
//!
//! Channel counts of 4 normalize to `R8G8B8A8_UNORM` (LDR) or
//! `R32G32B32A32_SFLOAT` (HDR); smaller channel counts keep their natural
//! formats on both backends.

use std::path::Path;

use crate::errors::{EmberError, Result};

/// Cubemap face paths in RT, LF, UP, DN, BK, FT order.
pub type CubemapFacePaths = [String; 6];

/// Decoded pixel storage.
#[derive(Debug, Clone)]
pub enum TextureData {
    /// 8-bit channels, tightly packed, `channel_count` channels per pixel.
    Ldr(Vec<u8>),
    /// 32-bit float channels, tightly packed.
    Hdr(Vec<f32>),
    /// Six LDR faces in RT, LF, UP, DN, BK, FT order.
    CubemapLdr([Vec<u8>; 6]),
    /// No CPU data; the image is rendered into by the GPU
    /// (framebuffer attachments, generated IBL maps, the font atlas before
    /// its first save).
    Empty,
}

impl Default for TextureData {
    fn default() -> Self {
        TextureData::Empty
    }
}

/// One texture table entry.
#[derive(Debug, Clone, Default)]
pub struct Texture {
    /// Absolute path this texture was interned under; empty for generated
    /// images.
    pub path: String,
    /// Face paths when this is a loaded cubemap.
    pub cubemap_paths: Option<CubemapFacePaths>,

    pub width: u32,
    pub height: u32,
    /// Channels per pixel after normalization (1, 2 or 4).
    pub channel_count: u32,
    /// Mip chain length; 1 when `generate_mip_maps` is off.
    pub mip_levels: u32,

    pub hdr: bool,
    pub flip_vertically: bool,
    pub generate_mip_maps: bool,
    /// Whether this entry is a cubemap (loaded or generated).
    pub is_cubemap: bool,

    /// Decoded pixels, retained for backend upload.
    pub data: TextureData,
}

impl Texture {
    /// Full mip chain length for a square-ish image.
    #[must_use]
    pub fn mip_count(width: u32, height: u32) -> u32 {
        32 - width.max(height).max(1).leading_zeros()
    }

    /// Loads and decodes an image file.
    ///
    /// `channel_count` is the requested channel count; 3 is widened to 4 to
    /// match the backend formats. HDR sources decode to float data
    /// regardless of `channel_count`.
    pub fn load(
        path: &Path,
        channel_count: u32,
        flip_vertically: bool,
        generate_mip_maps: bool,
        hdr: bool,
    ) -> Result<Self> {
        let path_str = path.to_string_lossy().into_owned();
        let dyn_img = image::open(path).map_err(|e| EmberError::ResourceLoadFailed {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;

        let dyn_img = if flip_vertically {
            dyn_img.flipv()
        } else {
            dyn_img
        };

        let width = dyn_img.width();
        let height = dyn_img.height();
        let mip_levels = if generate_mip_maps {
            Self::mip_count(width, height)
        } else {
            1
        };

        let (channel_count, data) = if hdr {
            let rgba = dyn_img.into_rgba32f();
            (4, TextureData::Hdr(rgba.into_raw()))
        } else {
            match channel_count {
                1 => (1, TextureData::Ldr(dyn_img.into_luma8().into_raw())),
                2 => (2, TextureData::Ldr(dyn_img.into_luma_alpha8().into_raw())),
                _ => (4, TextureData::Ldr(dyn_img.into_rgba8().into_raw())),
            }
        };

        log::info!("Loaded texture {path_str} ({width}x{height}, {channel_count}ch, hdr={hdr})");

        Ok(Self {
            path: path_str,
            cubemap_paths: None,
            width,
            height,
            channel_count,
            mip_levels,
            hdr,
            flip_vertically,
            generate_mip_maps,
            is_cubemap: false,
            data,
        })
    }

    /// Loads six cubemap faces (RT, LF, UP, DN, BK, FT). All faces must
    /// decode and share dimensions.
    pub fn load_cubemap(face_paths: &CubemapFacePaths, generate_mip_maps: bool) -> Result<Self> {
        let mut faces: [Vec<u8>; 6] = Default::default();
        let mut width = 0;
        let mut height = 0;

        for (i, face_path) in face_paths.iter().enumerate() {
            let img = image::open(Path::new(face_path))
                .map_err(|e| EmberError::ResourceLoadFailed {
                    path: face_path.clone(),
                    reason: e.to_string(),
                })?
                .into_rgba8();

            if i == 0 {
                width = img.width();
                height = img.height();
            } else if img.width() != width || img.height() != height {
                return Err(EmberError::ResourceLoadFailed {
                    path: face_path.clone(),
                    reason: format!(
                        "cubemap face size {}x{} does not match first face {}x{}",
                        img.width(),
                        img.height(),
                        width,
                        height
                    ),
                });
            }
            faces[i] = img.into_raw();
        }

        log::info!("Loaded cubemap {} ({width}x{height})", face_paths[0]);

        Ok(Self {
            path: face_paths[0].clone(),
            cubemap_paths: Some(face_paths.clone()),
            width,
            height,
            channel_count: 4,
            mip_levels: if generate_mip_maps {
                Self::mip_count(width, height)
            } else {
                1
            },
            hdr: false,
            flip_vertically: false,
            generate_mip_maps,
            is_cubemap: true,
            data: TextureData::CubemapLdr(faces),
        })
    }

    /// A 1×1 solid-color placeholder (`rgba` in 0–255).
    #[must_use]
    pub fn placeholder(name: &str, rgba: [u8; 4]) -> Self {
        Self {
            path: name.to_string(),
            width: 1,
            height: 1,
            channel_count: 4,
            mip_levels: 1,
            data: TextureData::Ldr(rgba.to_vec()),
            ..Default::default()
        }
    }

    /// An empty GPU-rendered image descriptor (generated cubemaps, LUTs).
    #[must_use]
    pub fn render_target(name: &str, width: u32, height: u32, hdr: bool, is_cubemap: bool, mip_levels: u32) -> Self {
        Self {
            path: name.to_string(),
            width,
            height,
            channel_count: 4,
            mip_levels,
            hdr,
            is_cubemap,
            data: TextureData::Empty,
            ..Default::default()
        }
    }

    /// Size of the level-0 pixel data in bytes.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        let pixel = self.channel_count as usize * if self.hdr { 4 } else { 1 };
        let face = self.width as usize * self.height as usize * pixel;
        if self.is_cubemap { face * 6 } else { face }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_count_covers_full_chain() {
        assert_eq!(Texture::mip_count(1, 1), 1);
        assert_eq!(Texture::mip_count(2, 2), 2);
        assert_eq!(Texture::mip_count(1024, 512), 11);
        assert_eq!(Texture::mip_count(1000, 600), 10);
    }

    #[test]
    fn placeholder_is_single_white_pixel() {
        let tex = Texture::placeholder("white", [255, 255, 255, 255]);
        assert_eq!((tex.width, tex.height), (1, 1));
        match &tex.data {
            TextureData::Ldr(px) => assert_eq!(px, &vec![255, 255, 255, 255]),
            _ => panic!("expected LDR data"),
        }
    }
}
