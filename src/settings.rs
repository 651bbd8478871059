//! Renderer Configuration
//!
//! Pure-data settings consumed by the renderer and the active backend. The
//! backend-independent parts (`RenderSettings`, `PostProcessSettings`) are
//! serializable so the host can persist them between runs; the renderer
//! reads and writes them through
//! [`Renderer::save_settings`](crate::renderer::Renderer::save_settings) /
//! [`Renderer::load_settings`](crate::renderer::Renderer::load_settings).

use serde::{Deserialize, Serialize};

/// Number of cascades used by the directional light's shadow map.
pub const NUM_SHADOW_CASCADES: usize = 4;

/// Resolution of each shadow cascade layer.
pub const SHADOW_CASCADE_RES: u32 = 2048;

/// Upper bound on the SSAO hemisphere kernel.
pub const MAX_SSAO_KERNEL_SIZE: usize = 64;

/// Side length of the tiled SSAO rotation noise texture.
pub const SSAO_NOISE_DIM: u32 = 4;

/// Fixed capacity of the point light array.
pub const MAX_POINT_LIGHT_COUNT: usize = 8;

/// Number of projection jitter samples in the TAA sequence.
pub const TAA_SAMPLE_COUNT: usize = 16;

/// Configuration options for the rendering system.
///
/// Constructed once by the host and handed to
/// [`Renderer::new`](crate::renderer::Renderer::new). Fields that map to
/// swapchain state (`vsync`) can be changed later through the renderer's
/// setters; the rest are fixed for the renderer's lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Enable vertical synchronization.
    ///
    /// When `true` presentation blocks on the display refresh, capping the
    /// framerate; when `false` the swapchain presents immediately.
    pub vsync: bool,

    /// Background clear color of the offscreen HDR target (linear RGBA).
    pub clear_color: [f32; 4],

    /// Enable the SSAO pass and its separable blur.
    pub enable_ssao: bool,

    /// Enable the edge-preserving SSAO blur (raw AO is used directly when off).
    pub enable_ssao_blur: bool,

    /// Number of hemisphere samples used by the SSAO pass (clamped to
    /// [`MAX_SSAO_KERNEL_SIZE`]).
    pub ssao_kernel_size: usize,

    /// Enable temporal anti-aliasing resolve.
    pub enable_taa: bool,

    /// Post-process settings (tonemap pass and FXAA).
    pub post: PostProcessSettings,

    /// Shadow darkness multiplier applied in the deferred shading pass.
    pub shadow_darkness: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            vsync: true,
            clear_color: [0.08, 0.13, 0.2, 1.0],
            enable_ssao: true,
            enable_ssao_blur: true,
            ssao_kernel_size: MAX_SSAO_KERNEL_SIZE,
            enable_taa: false,
            post: PostProcessSettings::default(),
            shadow_darkness: 1.0,
        }
    }
}

/// Settings consumed by the tonemap/post-process pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostProcessSettings {
    /// Saturation multiplier. `1.0` is neutral.
    pub saturation: f32,

    /// Per-channel brightness multiplier.
    pub brightness: [f32; 3],

    /// Per-channel additive offset.
    pub offset: [f32; 3],

    /// Enable the FXAA pass after tonemapping.
    pub enable_fxaa: bool,

    /// Debug view tinting FXAA-detected edges.
    pub fxaa_show_edges: bool,
}

impl Default for PostProcessSettings {
    fn default() -> Self {
        Self {
            saturation: 1.0,
            brightness: [1.0, 1.0, 1.0],
            offset: [0.0, 0.0, 0.0],
            enable_fxaa: true,
            fxaa_show_edges: false,
        }
    }
}

/// Per-toggle physics debug visualization switches.
///
/// The physics debug drawer maps these onto its internal debug-mode bitmask
/// each frame; see
/// [`PhysicsDebugDraw::update_debug_mode`](crate::renderer::debug_draw::PhysicsDebugDraw::update_debug_mode).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicsDebuggingSettings {
    /// Master switch. When off, nothing is drawn regardless of other toggles.
    pub disable_all: bool,

    /// Draw collision shape wireframes.
    pub wireframe: bool,

    /// Draw axis-aligned bounding boxes.
    pub aabb: bool,

    /// Draw contact points and lifetimes.
    pub draw_contact_points: bool,

    /// Prevent bodies from being deactivated (drawn slightly differently).
    pub no_deactivation: bool,

    /// Draw constraint pivots.
    pub draw_constraints: bool,

    /// Draw constraint limits.
    pub draw_constraint_limits: bool,

    /// Use the fast (unbatched) wireframe path.
    pub fast_wireframe: bool,

    /// Draw contact normals.
    pub draw_normals: bool,

    /// Draw body reference frames.
    pub draw_frames: bool,

    /// Visualize continuous collision detection.
    pub enable_ccd: bool,
}
