//! glTF / GLB import.
//!
//! Imports the attribute set the renderer understands — POSITION, NORMAL,
//! TANGENT, TEXCOORD_0, COLOR_0 and u8/u16/u32 indices — into one
//! [`MeshData`] per file (primitives are concatenated). Missing attributes
//! are left empty here and filled with defaults at upload time.

use std::path::Path;

use glam::{Vec2, Vec3, Vec4};

use crate::errors::Result;
use crate::vertex::VertexAttributes;

use super::prefab::MeshData;

/// Per-mesh import fixups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshImportSettings {
    /// Swap each normal's Y and Z components.
    pub swap_normal_yz: bool,
    /// Negate each normal's Z component (applied after the swap).
    pub flip_normal_z: bool,
    /// Mirror the U texture coordinate.
    pub flip_u: bool,
    /// Mirror the V texture coordinate.
    pub flip_v: bool,
}

/// Imports a glTF or GLB file.
pub fn load_gltf(path: &Path, settings: MeshImportSettings) -> Result<MeshData> {
    let (document, buffers, _images) = gltf::import(path)?;

    let mut mesh = MeshData::default();
    let mut attributes = VertexAttributes::POSITION;

    for gltf_mesh in document.meshes() {
        for primitive in gltf_mesh.primitives() {
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

            let base_vertex = mesh.vertices.positions_3.len() as u32;

            let Some(positions) = reader.read_positions() else {
                log::warn!(
                    "glTF primitive in {} has no POSITION stream; skipping",
                    path.display()
                );
                continue;
            };
            mesh.vertices
                .positions_3
                .extend(positions.map(Vec3::from_array));

            if let Some(normals) = reader.read_normals() {
                attributes |= VertexAttributes::NORMAL;
                mesh.vertices.normals.extend(normals.map(|n| {
                    let mut n = Vec3::from_array(n);
                    if settings.swap_normal_yz {
                        n = Vec3::new(n.x, n.z, n.y);
                    }
                    if settings.flip_normal_z {
                        n.z = -n.z;
                    }
                    n
                }));
            }

            if let Some(tangents) = reader.read_tangents() {
                attributes |= VertexAttributes::TANGENT;
                mesh.vertices
                    .tangents
                    .extend(tangents.map(|t| Vec3::new(t[0], t[1], t[2])));
            }

            if let Some(tex_coords) = reader.read_tex_coords(0) {
                attributes |= VertexAttributes::UV;
                mesh.vertices
                    .tex_coords
                    .extend(tex_coords.into_f32().map(|uv| {
                        Vec2::new(
                            if settings.flip_u { 1.0 - uv[0] } else { uv[0] },
                            if settings.flip_v { 1.0 - uv[1] } else { uv[1] },
                        )
                    }));
            }

            if let Some(colors) = reader.read_colors(0) {
                attributes |= VertexAttributes::COLOR128;
                mesh.vertices
                    .colors
                    .extend(colors.into_rgba_f32().map(Vec4::from_array));
            }

            if let Some(indices) = reader.read_indices() {
                mesh.indices
                    .extend(indices.into_u32().map(|i| i + base_vertex));
            }
        }
    }

    mesh.vertices.attributes = attributes;

    log::info!(
        "Imported {} ({} vertices, {} indices)",
        path.display(),
        mesh.vertices.positions_3.len(),
        mesh.indices.len()
    );

    Ok(mesh)
}
