//! Mesh Construction
//!
//! The renderer consumes interleaved [`VertexBufferData`] plus an optional
//! index list; this module is where those come from. Meshes are either
//! procedurally built from a [`PrefabShape`] or imported from glTF/GLB.
//! Attributes absent from a source are filled with defaults at upload time
//! by [`VertexBufferData::copy_into`].

pub mod prefab;

#[cfg(feature = "gltf")]
pub mod gltf_import;

pub use prefab::{MeshData, PrefabShape};

#[cfg(feature = "gltf")]
pub use gltf_import::{MeshImportSettings, load_gltf};

use crate::vertex::VertexBufferData;

impl MeshData {
    /// Converts the per-attribute arrays into an interleaved buffer.
    #[must_use]
    pub fn build(&self) -> (VertexBufferData, Vec<u32>) {
        (
            VertexBufferData::initialize(&self.vertices),
            self.indices.clone(),
        )
    }
}
