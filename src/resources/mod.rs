//! CPU-Side Resource Descriptors and Tables
//!
//! Everything in this module is backend-agnostic: shaders, materials and
//! textures are plain data owned by sparse ID-indexed tables. The active
//! backend makes them GPU-resident lazily and keeps its handles in its own
//! caches, keyed by the same IDs.

pub mod manager;
pub mod material;
pub mod shader;
pub mod texture;

pub use manager::ResourceManager;
pub use material::{Material, MaterialCreateInfo};
pub use shader::{SamplerBits, Shader, UniformBufferLayout, Uniforms};
pub use texture::{CubemapFacePaths, Texture, TextureData};
