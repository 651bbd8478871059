//! Vertex Streams
//!
//! Vertex data flows through the renderer as interleaved `f32` buffers with
//! a layout derived from an attribute bitmask. Static meshes build their
//! buffer once; the dynamic streams (physics debug lines, UI mesh, text,
//! sprites) pre-allocate for a maximum vertex count and are rewritten in
//! place every frame.

pub mod attributes;
pub mod buffer;

pub use attributes::{VertexAttributes, attribute_default, attribute_words};
pub use buffer::{VertexBufferData, VertexBufferDataCreateInfo};
