//! GPU Residency for the Explicit Backend
//!
//! Owns the device-side mirrors of the CPU resource tables: mesh buffers
//! per `RenderID`, images per `TextureID`, per-material uniform buffers,
//! the engine render targets (GBuffer, HDR scene targets, SSAO chain,
//! shadow cascade array, BRDF LUT) and the per-material probe cubemaps.
//! Everything is created lazily and recreated on resize or texture reload.

use rustc_hash::FxHashMap;

use crate::backend::cmd::RenderTargetId;
use crate::ids::{MaterialID, RenderID, TextureID};
use crate::renderer::ssao::generate_ssao_noise;
use crate::resources::ResourceManager;
use crate::resources::texture::{Texture, TextureData};
use crate::settings::{NUM_SHADOW_CASCADES, SSAO_NOISE_DIM};
use crate::vertex::VertexBufferData;

/// HDR scene / probe color format.
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
/// Depth format everywhere (reverse-Z friendly).
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
/// Raw and blurred ambient-occlusion format.
pub const AO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R16Float;
/// Split-sum BRDF lookup format.
pub const BRDF_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rg16Float;

/// One uploaded mesh.
pub struct GpuMesh {
    pub vertex_buffer: wgpu::Buffer,
    pub vertex_count: u32,
    pub index_buffer: Option<wgpu::Buffer>,
    pub index_count: u32,
}

/// One resident image.
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// Constant + dynamic uniform buffers of one material.
pub struct MaterialBuffers {
    pub constant: wgpu::Buffer,
    pub constant_capacity: u64,
    pub dynamic: wgpu::Buffer,
    pub dynamic_capacity: u64,
}

/// Generated IBL images of one probe material.
pub struct ProbeTargets {
    pub env: GpuTexture,
    pub env_depth: GpuTexture,
    pub irradiance: GpuTexture,
    pub prefilter: GpuTexture,
}

/// The size-dependent engine attachments.
pub struct RenderTargets {
    pub width: u32,
    pub height: u32,

    pub backbuffer_depth: GpuTexture,
    pub gbuffer0: GpuTexture,
    pub gbuffer1: GpuTexture,
    pub gbuffer_depth: GpuTexture,
    pub hdr0: GpuTexture,
    pub hdr0_depth: GpuTexture,
    pub hdr1: GpuTexture,
    pub hdr1_depth: GpuTexture,
    pub taa_history: GpuTexture,
    pub ssao_raw: GpuTexture,
    pub ssao_blur_h: GpuTexture,
    pub ssao_blur_v: GpuTexture,
}

pub struct GpuResources {
    pub meshes: FxHashMap<RenderID, GpuMesh>,
    pub textures: FxHashMap<TextureID, GpuTexture>,
    pub material_buffers: FxHashMap<MaterialID, MaterialBuffers>,
    pub probes: FxHashMap<MaterialID, ProbeTargets>,
    pub targets: RenderTargets,

    /// The shadow cascade array (one `Depth32Float` layer per cascade).
    pub shadow_array: GpuTexture,
    /// Per-cascade layer views for rendering.
    pub shadow_layer_views: Vec<wgpu::TextureView>,
    /// The shared BRDF lookup table.
    pub brdf_lut: GpuTexture,
    /// 4×4 SSAO rotation noise.
    pub ssao_noise: GpuTexture,

    /// Dynamic vertex stream buffers, grown in place and reused across
    /// frames (the queue timeline provides the in-flight copies).
    pub stream_buffers: Vec<Option<(wgpu::Buffer, u64)>>,
    /// Per-draw push constants scratch (dynamic offsets).
    pub push_buffer: wgpu::Buffer,
    pub push_capacity: u64,

    /// Fallback bindings.
    pub white: GpuTexture,
    pub white_cube: GpuTexture,

    pub linear_sampler: wgpu::Sampler,
    pub nearest_sampler: wgpu::Sampler,
    pub shadow_sampler: wgpu::Sampler,
}

fn create_target(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
    extra_usage: wgpu::TextureUsages,
) -> GpuTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | extra_usage,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture { texture, view }
}

fn create_cube(
    device: &wgpu::Device,
    label: &str,
    size: u32,
    mip_levels: u32,
    format: wgpu::TextureFormat,
) -> GpuTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: size.max(1),
            height: size.max(1),
            depth_or_array_layers: 6,
        },
        mip_level_count: mip_levels.max(1),
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        dimension: Some(wgpu::TextureViewDimension::Cube),
        ..Default::default()
    });
    GpuTexture { texture, view }
}

impl RenderTargets {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let half_w = (width / 2).max(1);
        let half_h = (height / 2).max(1);
        Self {
            width,
            height,
            backbuffer_depth: create_target(
                device,
                "Backbuffer Depth",
                width,
                height,
                DEPTH_FORMAT,
                wgpu::TextureUsages::COPY_DST,
            ),
            gbuffer0: create_target(
                device,
                "GBuffer Normal+Roughness",
                width,
                height,
                HDR_FORMAT,
                wgpu::TextureUsages::empty(),
            ),
            gbuffer1: create_target(
                device,
                "GBuffer Albedo+Metallic",
                width,
                height,
                wgpu::TextureFormat::Rgba8Unorm,
                wgpu::TextureUsages::empty(),
            ),
            gbuffer_depth: create_target(
                device,
                "GBuffer Depth",
                width,
                height,
                DEPTH_FORMAT,
                wgpu::TextureUsages::COPY_SRC,
            ),
            hdr0: create_target(
                device,
                "Offscreen HDR 0",
                width,
                height,
                HDR_FORMAT,
                wgpu::TextureUsages::empty(),
            ),
            hdr0_depth: create_target(
                device,
                "Offscreen HDR 0 Depth",
                width,
                height,
                DEPTH_FORMAT,
                wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
            ),
            hdr1: create_target(
                device,
                "Offscreen HDR 1",
                width,
                height,
                HDR_FORMAT,
                wgpu::TextureUsages::COPY_SRC,
            ),
            hdr1_depth: create_target(
                device,
                "Offscreen HDR 1 Depth",
                width,
                height,
                DEPTH_FORMAT,
                wgpu::TextureUsages::empty(),
            ),
            taa_history: create_target(
                device,
                "TAA History",
                width,
                height,
                HDR_FORMAT,
                wgpu::TextureUsages::COPY_DST,
            ),
            ssao_raw: create_target(
                device,
                "SSAO Raw",
                half_w,
                half_h,
                AO_FORMAT,
                wgpu::TextureUsages::empty(),
            ),
            ssao_blur_h: create_target(
                device,
                "SSAO Blur H",
                width,
                height,
                AO_FORMAT,
                wgpu::TextureUsages::empty(),
            ),
            ssao_blur_v: create_target(
                device,
                "SSAO Blur V",
                width,
                height,
                AO_FORMAT,
                wgpu::TextureUsages::empty(),
            ),
        }
    }
}

impl GpuResources {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, width: u32, height: u32) -> Self {
        let targets = RenderTargets::new(device, width, height);

        // Shadow cascade array
        let shadow_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Shadow Cascades"),
            size: wgpu::Extent3d {
                width: crate::settings::SHADOW_CASCADE_RES,
                height: crate::settings::SHADOW_CASCADE_RES,
                depth_or_array_layers: NUM_SHADOW_CASCADES as u32,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let shadow_layer_views = (0..NUM_SHADOW_CASCADES as u32)
            .map(|layer| {
                shadow_texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("Shadow Cascade Layer"),
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: layer,
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();
        let shadow_view = shadow_texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });
        let shadow_array = GpuTexture {
            texture: shadow_texture,
            view: shadow_view,
        };

        let brdf_lut = create_target(
            device,
            "BRDF LUT",
            crate::renderer::ibl::BRDF_LUT_SIZE,
            crate::renderer::ibl::BRDF_LUT_SIZE,
            BRDF_FORMAT,
            wgpu::TextureUsages::empty(),
        );

        // SSAO noise
        let noise = generate_ssao_noise();
        let noise_flat: Vec<u8> = noise.iter().flat_map(|p| p.iter().copied()).collect();
        let ssao_noise_tex = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("SSAO Noise"),
            size: wgpu::Extent3d {
                width: SSAO_NOISE_DIM,
                height: SSAO_NOISE_DIM,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &ssao_noise_tex,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &noise_flat,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * SSAO_NOISE_DIM),
                rows_per_image: Some(SSAO_NOISE_DIM),
            },
            wgpu::Extent3d {
                width: SSAO_NOISE_DIM,
                height: SSAO_NOISE_DIM,
                depth_or_array_layers: 1,
            },
        );
        let ssao_noise_view = ssao_noise_tex.create_view(&wgpu::TextureViewDescriptor::default());

        // 1×1 white fallbacks (2D and cube)
        let white = Self::create_solid_texture(device, queue, "White Fallback", [255; 4]);
        let white_cube = create_cube(device, "White Cube Fallback", 1, 1, wgpu::TextureFormat::Rgba8Unorm);
        for layer in 0..6 {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &white_cube.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: layer,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                &[255u8; 4],
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4),
                    rows_per_image: Some(1),
                },
                wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
            );
        }

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Linear Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            ..Default::default()
        });
        let nearest_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Nearest Sampler"),
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            ..Default::default()
        });
        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Compare Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            compare: Some(wgpu::CompareFunction::GreaterEqual),
            ..Default::default()
        });

        let push_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Push Scratch Buffer"),
            size: 256 * 1024,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            meshes: FxHashMap::default(),
            textures: FxHashMap::default(),
            material_buffers: FxHashMap::default(),
            probes: FxHashMap::default(),
            targets,
            shadow_array,
            shadow_layer_views,
            brdf_lut,
            ssao_noise: GpuTexture {
                texture: ssao_noise_tex,
                view: ssao_noise_view,
            },
            stream_buffers: Vec::new(),
            push_buffer,
            push_capacity: 256 * 1024,
            white,
            white_cube,
            linear_sampler,
            nearest_sampler,
            shadow_sampler,
        }
    }

    fn create_solid_texture(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        label: &str,
        rgba: [u8; 4],
    ) -> GpuTexture {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4),
                rows_per_image: Some(1),
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        GpuTexture { texture, view }
    }

    /// Recreates every size-dependent attachment.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.targets = RenderTargets::new(device, width, height);
    }

    // ========================================================================
    // Meshes
    // ========================================================================

    pub fn upload_mesh(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        id: RenderID,
        data: &VertexBufferData,
        indices: Option<&[u32]>,
    ) {
        let bytes = data.bytes();
        let size = (bytes.len().max(4) as u64).next_multiple_of(4);

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Mesh Vertex Buffer"),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if !bytes.is_empty() {
            queue.write_buffer(&vertex_buffer, 0, bytes);
        }

        let (index_buffer, index_count) = match indices {
            Some(indices) if !indices.is_empty() => {
                let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Mesh Index Buffer"),
                    size: (indices.len() * 4) as u64,
                    usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                queue.write_buffer(&buffer, 0, bytemuck::cast_slice(indices));
                (Some(buffer), indices.len() as u32)
            }
            _ => (None, 0),
        };

        self.meshes.insert(
            id,
            GpuMesh {
                vertex_buffer,
                vertex_count: data.vertex_count() as u32,
                index_buffer,
                index_count,
            },
        );
    }

    // ========================================================================
    // Textures
    // ========================================================================

    /// Makes one CPU texture resident, uploading its pixel data.
    pub fn ensure_texture(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        id: TextureID,
        texture: &Texture,
    ) {
        if self.textures.contains_key(&id) {
            return;
        }

        let format = if texture.hdr {
            wgpu::TextureFormat::Rgba32Float
        } else {
            match texture.channel_count {
                1 => wgpu::TextureFormat::R8Unorm,
                2 => wgpu::TextureFormat::Rg8Unorm,
                _ => wgpu::TextureFormat::Rgba8Unorm,
            }
        };
        let bytes_per_pixel = texture.channel_count * if texture.hdr { 4 } else { 1 };
        let layers = if texture.is_cubemap { 6 } else { 1 };

        let gpu = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(texture.path.as_str()),
            size: wgpu::Extent3d {
                width: texture.width.max(1),
                height: texture.height.max(1),
                depth_or_array_layers: layers,
            },
            mip_level_count: texture.mip_levels.max(1),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let mut write_layer = |pixels: &[u8], layer: u32| {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &gpu,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: layer,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_pixel * texture.width.max(1)),
                    rows_per_image: Some(texture.height.max(1)),
                },
                wgpu::Extent3d {
                    width: texture.width.max(1),
                    height: texture.height.max(1),
                    depth_or_array_layers: 1,
                },
            );
        };

        match &texture.data {
            TextureData::Ldr(pixels) => write_layer(pixels, 0),
            TextureData::Hdr(pixels) => write_layer(bytemuck::cast_slice(pixels), 0),
            TextureData::CubemapLdr(faces) => {
                for (layer, face) in faces.iter().enumerate() {
                    write_layer(face, layer as u32);
                }
            }
            TextureData::Empty => {}
        }

        let view = gpu.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(if texture.is_cubemap {
                wgpu::TextureViewDimension::Cube
            } else {
                wgpu::TextureViewDimension::D2
            }),
            ..Default::default()
        });

        self.textures.insert(id, GpuTexture { texture: gpu, view });
    }

    /// Drops the resident copy so the next use re-uploads.
    pub fn invalidate_texture(&mut self, id: TextureID) {
        self.textures.remove(&id);
    }

    /// Resident view for a texture ID, falling back to white.
    pub fn texture_view(&self, id: TextureID) -> &wgpu::TextureView {
        self.textures.get(&id).map_or(&self.white.view, |t| &t.view)
    }

    // ========================================================================
    // Probe targets
    // ========================================================================

    /// Lazily creates the generated IBL images for a probe material, sized
    /// from its CPU texture descriptors.
    pub fn ensure_probe_targets(
        &mut self,
        device: &wgpu::Device,
        material: MaterialID,
        resources: &ResourceManager,
    ) {
        if self.probes.contains_key(&material) {
            return;
        }
        let Some(mat) = resources.material(material) else {
            return;
        };

        let env_size = resources
            .texture(mat.textures.cubemap)
            .map_or(512, |t| t.width);
        let irr_size = resources
            .texture(mat.textures.irradiance)
            .map_or(32, |t| t.width);
        let pre_size = resources
            .texture(mat.textures.prefiltered)
            .map_or(128, |t| t.width);

        self.probes.insert(
            material,
            ProbeTargets {
                env: create_cube(device, "Probe Env Cubemap", env_size, 1, HDR_FORMAT),
                env_depth: create_target(
                    device,
                    "Probe Env Depth",
                    env_size,
                    env_size,
                    DEPTH_FORMAT,
                    wgpu::TextureUsages::empty(),
                ),
                irradiance: create_cube(device, "Probe Irradiance", irr_size, 1, HDR_FORMAT),
                prefilter: create_cube(
                    device,
                    "Probe Prefilter",
                    pre_size,
                    crate::renderer::ibl::PREFILTER_MIP_LEVELS,
                    HDR_FORMAT,
                ),
            },
        );
    }

    // ========================================================================
    // Uniform + stream buffers
    // ========================================================================

    fn grow_buffer(
        device: &wgpu::Device,
        label: &str,
        usage: wgpu::BufferUsages,
        capacity: &mut u64,
        required: u64,
    ) -> Option<wgpu::Buffer> {
        if required <= *capacity {
            return None;
        }
        let mut new_capacity = (*capacity).max(256);
        while new_capacity < required {
            new_capacity *= 2;
        }
        *capacity = new_capacity;
        Some(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: new_capacity,
            usage,
            mapped_at_creation: false,
        }))
    }

    /// Uploads one material's constant + dynamic blobs, growing buffers as
    /// needed. Returns `true` when a buffer was recreated (bind groups
    /// referencing it must be rebuilt).
    pub fn upload_material_uniforms(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        material: MaterialID,
        constant: &[u8],
        dynamic: &[u8],
    ) -> bool {
        let usage = wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST;
        let mut recreated = false;

        let entry = self.material_buffers.entry(material).or_insert_with(|| {
            recreated = true;
            let mut constant_capacity = (constant.len().max(16) as u64).next_power_of_two();
            let mut dynamic_capacity = (dynamic.len().max(256) as u64).next_power_of_two();
            let constant_buf = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Material Constant UBO"),
                size: constant_capacity,
                usage,
                mapped_at_creation: false,
            });
            let dynamic_buf = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Material Dynamic UBO"),
                size: dynamic_capacity,
                usage,
                mapped_at_creation: false,
            });
            // Capacities already cover the first upload.
            constant_capacity = constant_capacity.max(constant.len() as u64);
            dynamic_capacity = dynamic_capacity.max(dynamic.len() as u64);
            MaterialBuffers {
                constant: constant_buf,
                constant_capacity,
                dynamic: dynamic_buf,
                dynamic_capacity,
            }
        });

        if let Some(new_buf) = Self::grow_buffer(
            device,
            "Material Constant UBO",
            usage,
            &mut entry.constant_capacity,
            constant.len() as u64,
        ) {
            entry.constant = new_buf;
            recreated = true;
        }
        if let Some(new_buf) = Self::grow_buffer(
            device,
            "Material Dynamic UBO",
            usage,
            &mut entry.dynamic_capacity,
            dynamic.len() as u64,
        ) {
            entry.dynamic = new_buf;
            recreated = true;
        }

        if !constant.is_empty() {
            queue.write_buffer(&entry.constant, 0, constant);
        }
        if !dynamic.is_empty() {
            queue.write_buffer(&entry.dynamic, 0, dynamic);
        }
        recreated
    }

    /// Uploads one dynamic vertex stream, reusing the slot's buffer.
    pub fn upload_stream(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        slot: usize,
        data: &[f32],
    ) {
        if slot >= self.stream_buffers.len() {
            self.stream_buffers.resize_with(slot + 1, || None);
        }
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let required = bytes.len().max(4) as u64;

        let needs_new = match &self.stream_buffers[slot] {
            Some((_, capacity)) => *capacity < required,
            None => true,
        };
        if needs_new {
            let capacity = required.next_power_of_two().max(1024);
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Dynamic Stream Buffer"),
                size: capacity,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.stream_buffers[slot] = Some((buffer, capacity));
        }
        if let Some((buffer, _)) = &self.stream_buffers[slot] {
            if !bytes.is_empty() {
                queue.write_buffer(buffer, 0, bytes);
            }
        }
    }

    /// Grows and fills the per-draw push scratch buffer.
    pub fn upload_push_data(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, data: &[u8]) {
        if (data.len() as u64) > self.push_capacity {
            self.push_capacity = (data.len() as u64).next_power_of_two();
            self.push_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Push Scratch Buffer"),
                size: self.push_capacity,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
        }
        if !data.is_empty() {
            queue.write_buffer(&self.push_buffer, 0, data);
        }
    }

    /// Color view + format of one render target.
    pub fn color_attachment(
        &self,
        target: RenderTargetId,
    ) -> Option<(&wgpu::TextureView, wgpu::TextureFormat)> {
        match target {
            RenderTargetId::Backbuffer | RenderTargetId::GBuffer => None, // handled by the executor
            RenderTargetId::OffscreenHdr0 => Some((&self.targets.hdr0.view, HDR_FORMAT)),
            RenderTargetId::OffscreenHdr1 => Some((&self.targets.hdr1.view, HDR_FORMAT)),
            RenderTargetId::TaaHistory => Some((&self.targets.taa_history.view, HDR_FORMAT)),
            RenderTargetId::SsaoRaw => Some((&self.targets.ssao_raw.view, AO_FORMAT)),
            RenderTargetId::SsaoBlurH => Some((&self.targets.ssao_blur_h.view, AO_FORMAT)),
            RenderTargetId::SsaoBlurV => Some((&self.targets.ssao_blur_v.view, AO_FORMAT)),
            RenderTargetId::BrdfLut => Some((&self.brdf_lut.view, BRDF_FORMAT)),
            RenderTargetId::ShadowCascade(_)
            | RenderTargetId::EnvCubemapFace { .. }
            | RenderTargetId::IrradianceFace { .. }
            | RenderTargetId::PrefilterFace { .. } => None, // resolved per-face by the executor
        }
    }
}
