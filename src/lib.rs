#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

//! Ember renderer core.
//!
//! This crate owns GPU resources, translates scene data into draw
//! submissions and exposes a backend-agnostic renderer to the rest of the
//! engine. Two backends are provided and selected at build time:
//!
//! - `backend-wgpu` (default): an explicit, Vulkan-like API. Pipelines,
//!   bind groups and command encoders are created up front and cached per
//!   render object.
//! - `backend-gl`: an OpenGL-like state machine driven through [`glow`],
//!   compiling GLSL from `resources/shaders/` at runtime.
//!
//! Higher layers talk to [`renderer::Renderer`] exclusively; the backend
//! split is an internal seam. The renderer follows a two-phase lifecycle:
//! [`renderer::Renderer::new`] allocates no GPU resources, and
//! `Renderer::init` creates the device, surface and swapchain. All CPU-side
//! state (resource tables, batching, text layout, debug lines, UI mesh,
//! sprite queues) works without a backend, which is what the integration
//! tests exercise.

pub mod backend;
pub mod errors;
pub mod ids;
pub mod mesh;
pub mod renderer;
pub mod resources;
pub mod settings;
pub mod text;
pub mod vertex;

pub use errors::{EmberError, Result};
pub use ids::{MaterialID, PointLightID, RenderID, ShaderID, TextureID};
pub use renderer::Renderer;
pub use renderer::debug_draw::PhysicsDebugDraw;
pub use renderer::sprite::{AnchorPoint, SpriteQuadDrawInfo};
pub use renderer::ui_mesh::UiMesh;
pub use resources::material::{Material, MaterialCreateInfo};
pub use resources::shader::Shader;
pub use settings::{PhysicsDebuggingSettings, PostProcessSettings, RenderSettings};
pub use vertex::{VertexAttributes, VertexBufferData};
