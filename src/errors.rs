//! Error Types
//!
//! The main error type [`EmberError`] covers the failure modes of the
//! renderer core. Most rendering errors are *recoverable by contract*: a
//! missing texture falls back to the 1×1 white placeholder, a failing shader
//! falls back to the bright-pink error material, and the offending call is
//! logged rather than surfaced. `EmberError` is therefore reserved for the
//! boundaries where the caller genuinely has to react: backend
//! initialization, file I/O performed on behalf of the caller, and fatal GPU
//! allocation failures.

use thiserror::Error;

/// The main error type for the Ember renderer core.
#[derive(Error, Debug)]
pub enum EmberError {
    // ========================================================================
    // GPU & Backend Errors
    // ========================================================================
    /// Failed to request a compatible GPU adapter.
    #[error("Failed to request GPU adapter: {0}")]
    AdapterRequestFailed(String),

    /// Failed to create the GPU device.
    #[error("Failed to create GPU device: {0}")]
    DeviceCreateFailed(String),

    /// Failed to create or configure the presentation surface.
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// The GPU ran out of memory while allocating an image or buffer.
    /// This is the one unrecoverable rendering error.
    #[error("GPU allocation failed: {0}")]
    OutOfMemory(String),

    /// The renderer was used before `init` was called.
    #[error("Renderer backend not initialized")]
    BackendNotInitialized,

    // ========================================================================
    // Resource Errors
    // ========================================================================
    /// A texture, font or mesh file failed to load or decode.
    #[error("Resource load failed: {path}: {reason}")]
    ResourceLoadFailed {
        /// Path of the file that failed.
        path: String,
        /// Decoder or I/O failure description.
        reason: String,
    },

    /// Shader source failed to compile or link.
    #[error("Shader compile failed: {name}: {diagnostics}")]
    ShaderCompileFailed {
        /// Shader name as registered.
        name: String,
        /// Compiler diagnostics.
        diagnostics: String,
    },

    /// glTF parsing or import error.
    #[cfg(feature = "gltf")]
    #[error("glTF error: {0}")]
    GltfError(String),

    // ========================================================================
    // I/O & Serialization Errors
    // ========================================================================
    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error (materials file, font definition file, settings).
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Image decoding error.
    #[error("Image decode error: {0}")]
    ImageDecodeError(String),
}

impl From<image::ImageError> for EmberError {
    fn from(err: image::ImageError) -> Self {
        EmberError::ImageDecodeError(err.to_string())
    }
}

#[cfg(feature = "gltf")]
impl From<gltf::Error> for EmberError {
    fn from(err: gltf::Error) -> Self {
        EmberError::GltfError(err.to_string())
    }
}

/// Alias for `Result<T, EmberError>`.
pub type Result<T> = std::result::Result<T, EmberError>;
