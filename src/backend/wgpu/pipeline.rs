//! Pipeline and Bind Group Layout Caches
//!
//! Pipelines are created up front per (shader, vertex layout, state,
//! target formats) key and replayed every frame. The bind group scheme is
//! fixed:
//!
//! - group 0: material constant UBO, material dynamic UBO (dynamic
//!   offset), per-draw push scratch (dynamic offset). Shared layout.
//! - group 1: texture/sampler pairs in binding-plan order — the shader's
//!   scene inputs first, then its declared samplers in bit order.
//!
//! WGSL sources are embedded per shader name; the GLSL set under
//! `resources/shaders/` is the GL backend's equivalent.

use rustc_hash::FxHashMap;

use crate::ids::ShaderID;
use crate::resources::shader::{SamplerBits, Shader};
use crate::vertex::attributes::{ATTRIBUTE_ORDER, attribute_words};
use crate::vertex::VertexAttributes;

use super::resources::DEPTH_FORMAT;

/// Bytes per entry in the per-draw push scratch buffer: an MVP matrix, a
/// data vector and a flags vector, aligned to the dynamic-offset minimum.
pub const PUSH_ENTRY_SIZE: u64 = 256;

/// One texture/sampler pair of a shader's group-1 layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindSlot {
    /// The n-th flattened scene input of the draw (GBuffer color,
    /// post-process source, TAA history).
    SceneInput(usize),
    /// One declared sampler bit.
    Sampler(SamplerBits),
}

/// Number of flattened scene-input color textures a shader samples.
#[must_use]
pub fn scene_input_count(shader_name: &str) -> usize {
    match shader_name {
        // normal+roughness, albedo+metallic, ambient occlusion
        "deferred_combine" => 3,
        // source, gbuffer normals
        "ssao_blur" => 2,
        // scene, history
        "taa_resolve" => 2,
        // gbuffer normals
        "ssao" => 1,
        "post_process" | "post_fxaa" => 1,
        _ => 0,
    }
}

/// The fixed binding order of a shader's group 1.
#[must_use]
pub fn binding_plan(shader: &Shader) -> Vec<BindSlot> {
    let mut plan = Vec::new();
    for i in 0..scene_input_count(&shader.name) {
        plan.push(BindSlot::SceneInput(i));
    }
    for bit in SamplerBits::all().iter() {
        if shader.samplers.contains(bit) {
            plan.push(BindSlot::Sampler(bit));
        }
    }
    plan
}

fn slot_layout_entries(slot: BindSlot, base_binding: u32) -> [wgpu::BindGroupLayoutEntry; 2] {
    let (sample_type, view_dimension, sampler_type) = if let BindSlot::Sampler(bit) = slot {
        if bit == SamplerBits::SHADOW_MAP {
            (
                wgpu::TextureSampleType::Depth,
                wgpu::TextureViewDimension::D2Array,
                wgpu::SamplerBindingType::Comparison,
            )
        } else if bit == SamplerBits::DEPTH {
            (
                wgpu::TextureSampleType::Depth,
                wgpu::TextureViewDimension::D2,
                wgpu::SamplerBindingType::NonFiltering,
            )
        } else if bit == SamplerBits::CUBEMAP
            || bit == SamplerBits::IRRADIANCE
            || bit == SamplerBits::PREFILTER
        {
            (
                wgpu::TextureSampleType::Float { filterable: true },
                wgpu::TextureViewDimension::Cube,
                wgpu::SamplerBindingType::Filtering,
            )
        } else {
            (
                wgpu::TextureSampleType::Float { filterable: true },
                wgpu::TextureViewDimension::D2,
                wgpu::SamplerBindingType::Filtering,
            )
        }
    } else {
        (
            wgpu::TextureSampleType::Float { filterable: true },
            wgpu::TextureViewDimension::D2,
            wgpu::SamplerBindingType::Filtering,
        )
    };

    [
        wgpu::BindGroupLayoutEntry {
            binding: base_binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type,
                view_dimension,
                multisampled: false,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: base_binding + 1,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Sampler(sampler_type),
            count: None,
        },
    ]
}

/// Embedded WGSL source per registry shader name.
#[must_use]
pub fn wgsl_source(name: &str) -> Option<&'static str> {
    Some(match name {
        "pbr" => include_str!("shaders/pbr.wgsl"),
        "deferred_combine" => include_str!("shaders/deferred_combine.wgsl"),
        "color" => include_str!("shaders/color.wgsl"),
        "skybox" => include_str!("shaders/skybox.wgsl"),
        "equirectangular_to_cube" => include_str!("shaders/equirectangular_to_cube.wgsl"),
        "irradiance" => include_str!("shaders/irradiance.wgsl"),
        "prefilter" => include_str!("shaders/prefilter.wgsl"),
        "brdf" => include_str!("shaders/brdf.wgsl"),
        "shadow" => include_str!("shaders/shadow.wgsl"),
        "ssao" => include_str!("shaders/ssao.wgsl"),
        "ssao_blur" => include_str!("shaders/ssao_blur.wgsl"),
        "post_process" => include_str!("shaders/post_process.wgsl"),
        "post_fxaa" => include_str!("shaders/post_fxaa.wgsl"),
        "taa_resolve" => include_str!("shaders/taa_resolve.wgsl"),
        "sprite" => include_str!("shaders/sprite.wgsl"),
        "font_ss" => include_str!("shaders/font_ss.wgsl"),
        "font_ws" => include_str!("shaders/font_ws.wgsl"),
        "ui" => include_str!("shaders/ui.wgsl"),
        _ => return None,
    })
}

/// Vertex attribute formats + locations for an attribute set, in
/// declaration order.
#[must_use]
pub fn vertex_attributes(attrs: VertexAttributes) -> Vec<wgpu::VertexAttribute> {
    let mut out = Vec::new();
    let mut offset = 0u64;
    let mut location = 0u32;
    for attribute in ATTRIBUTE_ORDER {
        if !attrs.contains(attribute) {
            continue;
        }
        let format = if attribute == VertexAttributes::COLOR32 {
            wgpu::VertexFormat::Unorm8x4
        } else if attribute == VertexAttributes::EXTRA_INT {
            wgpu::VertexFormat::Uint32
        } else {
            match attribute_words(attribute) {
                2 => wgpu::VertexFormat::Float32x2,
                3 => wgpu::VertexFormat::Float32x3,
                _ => wgpu::VertexFormat::Float32x4,
            }
        };
        out.push(wgpu::VertexAttribute {
            format,
            offset,
            shader_location: location,
        });
        offset += attribute_words(attribute) as u64 * 4;
        location += 1;
    }
    out
}

/// Everything that makes two pipelines distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub shader: ShaderID,
    pub attrs: VertexAttributes,
    pub topology: wgpu::PrimitiveTopology,
    pub cull: Option<wgpu::Face>,
    pub depth_compare: wgpu::CompareFunction,
    pub depth_write: bool,
    pub wireframe: bool,
    /// Glyph streams draw as instanced quads, one instance per vertex.
    pub instanced: bool,
    pub color_formats: Vec<wgpu::TextureFormat>,
    pub has_depth: bool,
    pub blend: bool,
}

pub struct PipelineCache {
    pub group0_layout: wgpu::BindGroupLayout,
    modules: FxHashMap<ShaderID, Option<wgpu::ShaderModule>>,
    group1_layouts: FxHashMap<ShaderID, wgpu::BindGroupLayout>,
    pipeline_layouts: FxHashMap<ShaderID, wgpu::PipelineLayout>,
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        let group0_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Uniform BindGroup Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(PUSH_ENTRY_SIZE),
                    },
                    count: None,
                },
            ],
        });

        Self {
            group0_layout,
            modules: FxHashMap::default(),
            group1_layouts: FxHashMap::default(),
            pipeline_layouts: FxHashMap::default(),
            pipelines: FxHashMap::default(),
        }
    }

    /// Shader module for an ID, compiled on first use. `None` when the
    /// registry name has no embedded WGSL (the draw falls back to the
    /// error material upstream).
    pub fn module(
        &mut self,
        device: &wgpu::Device,
        id: ShaderID,
        shader: &Shader,
    ) -> Option<&wgpu::ShaderModule> {
        self.modules
            .entry(id)
            .or_insert_with(|| {
                let source = wgsl_source(&shader.name)?;
                log::info!("Compiling shader module '{}'", shader.name);
                Some(device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(shader.name.as_str()),
                    source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(source)),
                }))
            })
            .as_ref()
    }

    /// Group-1 layout for a shader's binding plan.
    pub fn group1_layout(
        &mut self,
        device: &wgpu::Device,
        id: ShaderID,
        shader: &Shader,
    ) -> &wgpu::BindGroupLayout {
        self.group1_layouts.entry(id).or_insert_with(|| {
            let mut entries = Vec::new();
            for (i, slot) in binding_plan(shader).into_iter().enumerate() {
                entries.extend_from_slice(&slot_layout_entries(slot, (i * 2) as u32));
            }
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(&format!("{} Texture Layout", shader.name)),
                entries: &entries,
            })
        })
    }

    fn pipeline_layout(
        &mut self,
        device: &wgpu::Device,
        id: ShaderID,
        shader: &Shader,
    ) -> &wgpu::PipelineLayout {
        if !self.pipeline_layouts.contains_key(&id) {
            let group1 = self.group1_layout(device, id, shader).clone();
            let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(&format!("{} Pipeline Layout", shader.name)),
                bind_group_layouts: &[Some(&self.group0_layout), Some(&group1)],
                immediate_size: 0,
            });
            self.pipeline_layouts.insert(id, layout);
        }
        &self.pipeline_layouts[&id]
    }

    /// Pipeline for a key, created on first use.
    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        key: &PipelineKey,
        shader: &Shader,
        wireframe_supported: bool,
    ) -> Option<&wgpu::RenderPipeline> {
        if !self.pipelines.contains_key(key) {
            let module = self.module(device, key.shader, shader)?.clone();
            let layout = self.pipeline_layout(device, key.shader, shader).clone();

            let vertex_attrs = vertex_attributes(key.attrs);
            let vertex_layout = wgpu::VertexBufferLayout {
                array_stride: key.attrs.stride() as u64,
                step_mode: if key.instanced {
                    wgpu::VertexStepMode::Instance
                } else {
                    wgpu::VertexStepMode::Vertex
                },
                attributes: &vertex_attrs,
            };

            let blend = key.blend.then_some(wgpu::BlendState::ALPHA_BLENDING);
            let targets: Vec<Option<wgpu::ColorTargetState>> = key
                .color_formats
                .iter()
                .map(|format| {
                    Some(wgpu::ColorTargetState {
                        format: *format,
                        blend,
                        write_mask: wgpu::ColorWrites::ALL,
                    })
                })
                .collect();

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&format!("{} Pipeline", shader.name)),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    buffers: &[vertex_layout],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: if targets.is_empty() {
                    None
                } else {
                    Some(wgpu::FragmentState {
                        module: &module,
                        entry_point: Some("fs_main"),
                        targets: &targets,
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    })
                },
                primitive: wgpu::PrimitiveState {
                    topology: key.topology,
                    cull_mode: key.cull,
                    polygon_mode: if key.wireframe && wireframe_supported {
                        wgpu::PolygonMode::Line
                    } else {
                        wgpu::PolygonMode::Fill
                    },
                    ..Default::default()
                },
                depth_stencil: key.has_depth.then_some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: Some(key.depth_write),
                    depth_compare: Some(key.depth_compare),
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview_mask: None,
                cache: None,
            });
            self.pipelines.insert(key.clone(), pipeline);
        }
        self.pipelines.get(key)
    }
}
