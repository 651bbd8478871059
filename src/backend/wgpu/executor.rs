//! Frame Command Execution
//!
//! Translates one [`FrameCommands`] stream into wgpu passes. All GPU work
//! for the frame goes into a single command encoder and one submit; the
//! queue timeline orders the uniform/stream writes before the passes that
//! read them.
//!
//! Encoding is two-phase per pass: first every draw's pipeline and bind
//! groups are prepared (which may create cache entries), then the render
//! pass is recorded against the prepared list.

use glam::{Mat4, Vec4};

use crate::backend::BackbufferImage;
use crate::backend::cmd::{
    ClearFlags, CullFace, DepthTestFunc, DrawCmd, FrameCommands, GeometrySource, RenderPassCmd,
    RenderTargetId, TopologyMode,
};
use crate::errors::{EmberError, Result};
use crate::ids::MaterialID;
use crate::resources::ResourceManager;
use crate::resources::shader::SamplerBits;

use super::WgpuBackend;
use super::pipeline::{BindSlot, PUSH_ENTRY_SIZE, PipelineKey, binding_plan};
use super::resources::{AO_FORMAT, BRDF_FORMAT, GpuResources, HDR_FORMAT};

fn map_topology(topology: TopologyMode) -> wgpu::PrimitiveTopology {
    match topology {
        TopologyMode::PointList => wgpu::PrimitiveTopology::PointList,
        TopologyMode::LineList => wgpu::PrimitiveTopology::LineList,
        TopologyMode::LineStrip => wgpu::PrimitiveTopology::LineStrip,
        TopologyMode::TriangleList => wgpu::PrimitiveTopology::TriangleList,
        TopologyMode::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        TopologyMode::TriangleFan => {
            // Fans are a GL-only topology; the frame graph never emits
            // them for this backend.
            log::warn!("TriangleFan topology is unsupported on the explicit backend");
            wgpu::PrimitiveTopology::TriangleList
        }
    }
}

fn map_cull(cull: CullFace) -> Option<wgpu::Face> {
    match cull {
        CullFace::Back | CullFace::Inherit => Some(wgpu::Face::Back),
        CullFace::Front | CullFace::FrontAndBack => Some(wgpu::Face::Front),
        CullFace::None => None,
    }
}

fn map_depth(func: DepthTestFunc) -> wgpu::CompareFunction {
    match func {
        DepthTestFunc::Always => wgpu::CompareFunction::Always,
        DepthTestFunc::Never => wgpu::CompareFunction::Never,
        DepthTestFunc::Less => wgpu::CompareFunction::Less,
        DepthTestFunc::LEqual => wgpu::CompareFunction::LessEqual,
        DepthTestFunc::Greater => wgpu::CompareFunction::Greater,
        DepthTestFunc::GEqual => wgpu::CompareFunction::GreaterEqual,
        DepthTestFunc::Equal => wgpu::CompareFunction::Equal,
        DepthTestFunc::NotEqual => wgpu::CompareFunction::NotEqual,
    }
}

/// Per-draw push entry: mvp, data, flags (x = use-mvp).
fn push_entry_bytes(draw: &DrawCmd) -> [u8; 96] {
    let mut out = [0u8; 96];
    let mvp = draw.push_mvp.unwrap_or(Mat4::IDENTITY);
    out[0..64].copy_from_slice(bytemuck::bytes_of(&mvp.to_cols_array()));
    let data = draw.push_data.unwrap_or(Vec4::ZERO);
    out[64..80].copy_from_slice(bytemuck::bytes_of(&data.to_array()));
    let flags = Vec4::new(f32::from(draw.push_mvp.is_some()), 0.0, 0.0, 0.0);
    out[80..96].copy_from_slice(bytemuck::bytes_of(&flags.to_array()));
    out
}

struct PreparedDraw {
    pipeline: wgpu::RenderPipeline,
    group0: wgpu::BindGroup,
    group1: wgpu::BindGroup,
    instanced: bool,
    stream_vertex_count: u32,
}

impl WgpuBackend {
    /// Makes every resource the frame references resident and uploads this
    /// frame's uniform, stream and push data.
    fn prepare_frame(&mut self, frame: &FrameCommands, resources: &ResourceManager) {
        for upload in &frame.material_uniforms {
            if let Some(material) = resources.material(upload.material) {
                for id in [
                    material.textures.albedo,
                    material.textures.normal,
                    material.textures.metallic,
                    material.textures.roughness,
                    material.textures.ao,
                    material.textures.hdr_equirectangular,
                    material.textures.cubemap,
                ] {
                    if let Some(texture) = resources.texture(id) {
                        self.resources
                            .ensure_texture(&self.ctx.device, &self.ctx.queue, id, texture);
                    }
                }
                if material.generates_ibl() || material.info.generate_reflection_probe_maps {
                    self.resources
                        .ensure_probe_targets(&self.ctx.device, upload.material, resources);
                }
            }
            let recreated = self.resources.upload_material_uniforms(
                &self.ctx.device,
                &self.ctx.queue,
                upload.material,
                &upload.constant,
                &upload.dynamic,
            );
            if recreated {
                self.group0_cache.remove(&upload.material);
            }
        }

        for pass in &frame.passes {
            if let RenderTargetId::EnvCubemapFace { material, .. }
            | RenderTargetId::IrradianceFace { material, .. }
            | RenderTargetId::PrefilterFace { material, .. } = pass.target
            {
                self.resources
                    .ensure_probe_targets(&self.ctx.device, material, resources);
            }
            for draw in &pass.draws {
                if let Some(id) = draw.texture_override {
                    if let Some(texture) = resources.texture(id) {
                        self.resources.ensure_texture(
                            &self.ctx.device,
                            &self.ctx.queue,
                            id,
                            texture,
                        );
                    }
                }
                if draw.texture_source != draw.material {
                    if let Some(material) = resources.material(draw.texture_source) {
                        if material.generates_ibl()
                            || material.info.generate_reflection_probe_maps
                        {
                            self.resources.ensure_probe_targets(
                                &self.ctx.device,
                                draw.texture_source,
                                resources,
                            );
                        }
                    }
                }
            }
        }

        for (slot, stream) in frame.streams.iter().enumerate() {
            self.resources
                .upload_stream(&self.ctx.device, &self.ctx.queue, slot, &stream.data);
        }

        // Push scratch: one aligned entry per draw, in encode order.
        let draw_count = frame.draw_count().max(1);
        let mut push_data = vec![0u8; draw_count * PUSH_ENTRY_SIZE as usize];
        let mut index = 0;
        for pass in &frame.passes {
            for draw in &pass.draws {
                let offset = index * PUSH_ENTRY_SIZE as usize;
                push_data[offset..offset + 96].copy_from_slice(&push_entry_bytes(draw));
                index += 1;
            }
        }
        self.resources
            .upload_push_data(&self.ctx.device, &self.ctx.queue, &push_data);
    }

    /// Color formats + depth presence of a pass target, without borrowing
    /// any view.
    fn pass_formats(&self, target: RenderTargetId) -> (Vec<wgpu::TextureFormat>, bool) {
        match target {
            RenderTargetId::Backbuffer => (vec![self.ctx.config.format], true),
            RenderTargetId::GBuffer => (vec![HDR_FORMAT, wgpu::TextureFormat::Rgba8Unorm], true),
            RenderTargetId::OffscreenHdr0 | RenderTargetId::OffscreenHdr1 => {
                (vec![HDR_FORMAT], true)
            }
            RenderTargetId::TaaHistory => (vec![HDR_FORMAT], false),
            RenderTargetId::SsaoRaw | RenderTargetId::SsaoBlurH | RenderTargetId::SsaoBlurV => {
                (vec![AO_FORMAT], false)
            }
            RenderTargetId::BrdfLut => (vec![BRDF_FORMAT], false),
            RenderTargetId::ShadowCascade(_) => (Vec::new(), true),
            RenderTargetId::EnvCubemapFace { .. } => (vec![HDR_FORMAT], true),
            RenderTargetId::IrradianceFace { .. } | RenderTargetId::PrefilterFace { .. } => {
                (vec![HDR_FORMAT], false)
            }
        }
    }

    /// Face view for cubemap-face targets; `None` for everything else.
    fn face_view(&self, target: RenderTargetId) -> Option<wgpu::TextureView> {
        let (texture, face, mip) = match target {
            RenderTargetId::EnvCubemapFace { material, face } => {
                (&self.resources.probes.get(&material)?.env.texture, face, 0)
            }
            RenderTargetId::IrradianceFace { material, face } => (
                &self.resources.probes.get(&material)?.irradiance.texture,
                face,
                0,
            ),
            RenderTargetId::PrefilterFace {
                material,
                face,
                mip,
            } => (
                &self.resources.probes.get(&material)?.prefilter.texture,
                face,
                mip,
            ),
            _ => return None,
        };
        Some(texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Cubemap Face View"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            base_array_layer: face,
            array_layer_count: Some(1),
            base_mip_level: mip,
            mip_level_count: Some(1),
            ..Default::default()
        }))
    }

    /// View bound for one sampler bit of a draw.
    fn sampler_view(
        &self,
        bit: SamplerBits,
        draw: &DrawCmd,
        resources: &ResourceManager,
    ) -> &wgpu::TextureView {
        let textures = resources
            .material(draw.texture_source)
            .map(|m| m.textures)
            .unwrap_or_default();

        if bit == SamplerBits::ALBEDO || bit == SamplerBits::FONT_ATLAS {
            return match draw.texture_override {
                Some(id) => self.resources.texture_view(id),
                None => self.resources.texture_view(textures.albedo),
            };
        }
        if bit == SamplerBits::NORMAL {
            return self.resources.texture_view(textures.normal);
        }
        if bit == SamplerBits::METALLIC {
            return self.resources.texture_view(textures.metallic);
        }
        if bit == SamplerBits::ROUGHNESS {
            return self.resources.texture_view(textures.roughness);
        }
        if bit == SamplerBits::AO {
            return self.resources.texture_view(textures.ao);
        }
        if bit == SamplerBits::HDR_EQUIRECT {
            return self.resources.texture_view(textures.hdr_equirectangular);
        }
        if bit == SamplerBits::CUBEMAP {
            return match self.resources.probes.get(&draw.texture_source) {
                Some(probe) => &probe.env.view,
                None if textures.cubemap.is_valid() => {
                    self.resources.texture_view(textures.cubemap)
                }
                None => &self.resources.white_cube.view,
            };
        }
        if bit == SamplerBits::IRRADIANCE {
            return self
                .resources
                .probes
                .get(&draw.texture_source)
                .map_or(&self.resources.white_cube.view, |p| &p.irradiance.view);
        }
        if bit == SamplerBits::PREFILTER {
            return self
                .resources
                .probes
                .get(&draw.texture_source)
                .map_or(&self.resources.white_cube.view, |p| &p.prefilter.view);
        }
        if bit == SamplerBits::BRDF_LUT {
            return &self.resources.brdf_lut.view;
        }
        if bit == SamplerBits::SHADOW_MAP {
            return &self.resources.shadow_array.view;
        }
        if bit == SamplerBits::DEPTH {
            return &self.resources.targets.gbuffer_depth.view;
        }
        if bit == SamplerBits::NOISE {
            return &self.resources.ssao_noise.view;
        }
        &self.resources.white.view
    }

    /// Flattened scene-input views of a draw (GBuffer color attachments,
    /// post sources).
    fn scene_input_view(&self, input: RenderTargetId, sub: usize) -> Option<&wgpu::TextureView> {
        let t = &self.resources.targets;
        match (input, sub) {
            (RenderTargetId::GBuffer, 0) => Some(&t.gbuffer0.view),
            (RenderTargetId::GBuffer, 1) => Some(&t.gbuffer1.view),
            (RenderTargetId::OffscreenHdr0, 0) => Some(&t.hdr0.view),
            (RenderTargetId::OffscreenHdr1, 0) => Some(&t.hdr1.view),
            (RenderTargetId::TaaHistory, 0) => Some(&t.taa_history.view),
            (RenderTargetId::SsaoRaw, 0) => Some(&t.ssao_raw.view),
            (RenderTargetId::SsaoBlurH, 0) => Some(&t.ssao_blur_h.view),
            (RenderTargetId::SsaoBlurV, 0) => Some(&t.ssao_blur_v.view),
            _ => None,
        }
    }

    fn flattened_inputs(&self, draw: &DrawCmd) -> Vec<&wgpu::TextureView> {
        let mut views = Vec::new();
        for input in &draw.inputs {
            if let Some(view) = self.scene_input_view(*input, 0) {
                views.push(view);
            }
            // The GBuffer contributes both color attachments.
            if *input == RenderTargetId::GBuffer {
                if let Some(view) = self.scene_input_view(*input, 1) {
                    views.push(view);
                }
            }
        }
        views
    }

    fn group0_bind_group(&mut self, material: MaterialID) -> Option<wgpu::BindGroup> {
        if let Some(bg) = self.group0_cache.get(&material) {
            return Some(bg.clone());
        }
        let buffers = self.resources.material_buffers.get(&material)?;
        let bg = self
            .ctx
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Uniform BindGroup"),
                layout: &self.pipelines.group0_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: &buffers.constant,
                            offset: 0,
                            size: None,
                        }),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: &buffers.dynamic,
                            offset: 0,
                            size: wgpu::BufferSize::new(256),
                        }),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: &self.resources.push_buffer,
                            offset: 0,
                            size: wgpu::BufferSize::new(PUSH_ENTRY_SIZE),
                        }),
                    },
                ],
            });
        self.group0_cache.insert(material, bg.clone());
        Some(bg)
    }

    fn prepare_draw(
        &mut self,
        draw: &DrawCmd,
        formats: &[wgpu::TextureFormat],
        has_depth: bool,
        resources: &ResourceManager,
        stream_counts: &[u32],
    ) -> Option<PreparedDraw> {
        let shader = resources.shader(draw.shader)?.clone();

        let instanced = draw.topology == TopologyMode::PointList
            && matches!(draw.geometry, GeometrySource::Stream(_));

        let stream_vertex_count = match draw.geometry {
            GeometrySource::Stream(slot) => draw
                .vertex_range
                .map_or_else(|| stream_counts.get(slot as usize).copied().unwrap_or(0), |(_, count)| count),
            GeometrySource::RenderObject(_) => 0,
        };

        let key = PipelineKey {
            shader: draw.shader,
            attrs: shader.vertex_attributes,
            topology: if instanced {
                wgpu::PrimitiveTopology::TriangleStrip
            } else {
                map_topology(draw.topology)
            },
            cull: map_cull(draw.cull),
            depth_compare: map_depth(draw.depth_test),
            depth_write: draw.depth_write,
            wireframe: draw.wireframe,
            instanced,
            color_formats: formats.to_vec(),
            has_depth,
            blend: shader.translucent && !formats.is_empty(),
        };

        // Mutable cache accesses first; the view borrows below must not
        // overlap them.
        let pipeline = self
            .pipelines
            .get_or_create(&self.ctx.device, &key, &shader, self.ctx.wireframe_supported)?
            .clone();
        let group0 = self.group0_bind_group(draw.material)?;
        let group1_layout = self
            .pipelines
            .group1_layout(&self.ctx.device, draw.shader, &shader)
            .clone();

        let scene_views = self.flattened_inputs(draw);
        let plan = binding_plan(&shader);
        let mut entries = Vec::with_capacity(plan.len() * 2);
        for (i, slot) in plan.iter().enumerate() {
            let view = match slot {
                BindSlot::SceneInput(n) => scene_views
                    .get(*n)
                    .copied()
                    .unwrap_or(&self.resources.white.view),
                BindSlot::Sampler(bit) => self.sampler_view(*bit, draw, resources),
            };
            let sampler = match slot {
                BindSlot::Sampler(bit) if *bit == SamplerBits::SHADOW_MAP => {
                    &self.resources.shadow_sampler
                }
                BindSlot::Sampler(bit)
                    if *bit == SamplerBits::NOISE || *bit == SamplerBits::DEPTH =>
                {
                    &self.resources.nearest_sampler
                }
                _ => &self.resources.linear_sampler,
            };
            entries.push(wgpu::BindGroupEntry {
                binding: (i * 2) as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: (i * 2 + 1) as u32,
                resource: wgpu::BindingResource::Sampler(sampler),
            });
        }
        let group1 = self
            .ctx
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Draw Texture BindGroup"),
                layout: &group1_layout,
                entries: &entries,
            });

        Some(PreparedDraw {
            pipeline,
            group0,
            group1,
            instanced,
            stream_vertex_count,
        })
    }

    /// Runs the whole frame.
    pub(super) fn execute(
        &mut self,
        frame: &FrameCommands,
        resources: &ResourceManager,
    ) -> Result<()> {
        self.prepare_frame(frame, resources);

        let surface_texture = match self.ctx.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(output)
            | wgpu::CurrentSurfaceTexture::Suboptimal(output) => output,
            wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                // Transient: rebuild the swapchain and skip this frame.
                let (w, h) = (self.ctx.config.width, self.ctx.config.height);
                self.ctx.resize(w, h);
                return Ok(());
            }
            wgpu::CurrentSurfaceTexture::Timeout | wgpu::CurrentSurfaceTexture::Occluded => {
                return Ok(());
            }
            wgpu::CurrentSurfaceTexture::Validation => {
                return Err(EmberError::SurfaceError("surface validation error".to_string()));
            }
        };
        let surface_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let stream_counts: Vec<u32> = frame
            .streams
            .iter()
            .map(|s| s.vertex_count() as u32)
            .collect();

        let mut encoder =
            self.ctx
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Frame Encoder"),
                });

        let mut push_index: u64 = 0;
        for pass in &frame.passes {
            // Phase 1 (mutable): pipelines + bind groups.
            let (formats, has_depth) = self.pass_formats(pass.target);
            let prepared: Vec<Option<PreparedDraw>> = pass
                .draws
                .iter()
                .map(|draw| {
                    self.prepare_draw(draw, &formats, has_depth, resources, &stream_counts)
                })
                .collect();

            if let Some(from) = pass.blit_depth_from {
                self.blit_depth(&mut encoder, from, pass.target);
            }

            // Phase 2 (immutable): record the pass.
            let face_view = self.face_view(pass.target);
            encode_pass(
                &self.resources,
                &mut encoder,
                pass,
                &prepared,
                &surface_view,
                face_view.as_ref(),
                &mut push_index,
            );

            if let Some(to) = pass.blit_depth_to {
                self.blit_depth(&mut encoder, pass.target, to);
            }
            if let Some(to) = pass.blit_color_to {
                self.blit_color(&mut encoder, pass.target, to);
            }
        }

        if frame.capture_screenshot {
            self.queue_backbuffer_copy(&mut encoder, &surface_texture.texture);
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        if frame.present {
            surface_texture.present();
        }
        Ok(())
    }

    fn depth_texture(&self, target: RenderTargetId) -> Option<&wgpu::Texture> {
        let t = &self.resources.targets;
        match target {
            RenderTargetId::Backbuffer => Some(&t.backbuffer_depth.texture),
            RenderTargetId::GBuffer => Some(&t.gbuffer_depth.texture),
            RenderTargetId::OffscreenHdr0 => Some(&t.hdr0_depth.texture),
            RenderTargetId::OffscreenHdr1 => Some(&t.hdr1_depth.texture),
            _ => None,
        }
    }

    fn blit_depth(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        from: RenderTargetId,
        to: RenderTargetId,
    ) {
        let (Some(src), Some(dst)) = (self.depth_texture(from), self.depth_texture(to)) else {
            log::warn!("Unsupported depth blit {from:?} -> {to:?}");
            return;
        };
        encoder.copy_texture_to_texture(
            src.as_image_copy(),
            dst.as_image_copy(),
            wgpu::Extent3d {
                width: self.resources.targets.width.max(1),
                height: self.resources.targets.height.max(1),
                depth_or_array_layers: 1,
            },
        );
    }

    fn blit_color(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        from: RenderTargetId,
        to: RenderTargetId,
    ) {
        let t = &self.resources.targets;
        let src = match from {
            RenderTargetId::OffscreenHdr0 => &t.hdr0.texture,
            RenderTargetId::OffscreenHdr1 => &t.hdr1.texture,
            _ => {
                log::warn!("Unsupported color blit source {from:?}");
                return;
            }
        };
        let dst = match to {
            RenderTargetId::TaaHistory => &t.taa_history.texture,
            _ => {
                log::warn!("Unsupported color blit destination {to:?}");
                return;
            }
        };
        encoder.copy_texture_to_texture(
            src.as_image_copy(),
            dst.as_image_copy(),
            wgpu::Extent3d {
                width: t.width.max(1),
                height: t.height.max(1),
                depth_or_array_layers: 1,
            },
        );
    }

    fn queue_backbuffer_copy(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        surface: &wgpu::Texture,
    ) {
        let width = self.ctx.config.width;
        let height = self.ctx.config.height;
        let bytes_per_row = (width * 4).next_multiple_of(256);

        let staging = self.ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Screenshot Staging"),
            size: u64::from(bytes_per_row) * u64::from(height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        encoder.copy_texture_to_buffer(
            surface.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        self.pending_grab = Some((staging, width, height, bytes_per_row));
    }

    /// Maps the staging buffer written by the last capture and converts it
    /// to tightly packed RGB.
    pub(super) fn finish_backbuffer_read(&mut self) -> Result<BackbufferImage> {
        let Some((staging, width, height, bytes_per_row)) = self.pending_grab.take() else {
            return Err(EmberError::SurfaceError(
                "no backbuffer capture was queued this frame".into(),
            ));
        };

        let slice = staging.slice(..);
        slice.map_async(wgpu::MapMode::Read, |_| {});
        let _ = self.ctx.device.poll(wgpu::PollType::wait_indefinitely());

        let data = slice.get_mapped_range();
        let bgra = matches!(
            self.ctx.config.format,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
        );

        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for row in 0..height {
            let start = (row * bytes_per_row) as usize;
            for px in 0..width as usize {
                let p = start + px * 4;
                if bgra {
                    pixels.extend_from_slice(&[data[p + 2], data[p + 1], data[p]]);
                } else {
                    pixels.extend_from_slice(&data[p..p + 3]);
                }
            }
        }
        drop(data);
        staging.unmap();

        Ok(BackbufferImage {
            pixels,
            width,
            height,
            origin_bottom_left: false,
        })
    }
}

/// Records one render pass from its prepared draw list.
#[allow(clippy::too_many_arguments)]
fn encode_pass(
    gpu: &GpuResources,
    encoder: &mut wgpu::CommandEncoder,
    pass: &RenderPassCmd,
    prepared: &[Option<PreparedDraw>],
    surface_view: &wgpu::TextureView,
    face_view: Option<&wgpu::TextureView>,
    push_index: &mut u64,
) {
    let t = &gpu.targets;

    let (colors, depth): (Vec<&wgpu::TextureView>, Option<&wgpu::TextureView>) = match pass.target
    {
        RenderTargetId::Backbuffer => (vec![surface_view], Some(&t.backbuffer_depth.view)),
        RenderTargetId::GBuffer => (
            vec![&t.gbuffer0.view, &t.gbuffer1.view],
            Some(&t.gbuffer_depth.view),
        ),
        RenderTargetId::OffscreenHdr0 => (vec![&t.hdr0.view], Some(&t.hdr0_depth.view)),
        RenderTargetId::OffscreenHdr1 => (vec![&t.hdr1.view], Some(&t.hdr1_depth.view)),
        RenderTargetId::TaaHistory => (vec![&t.taa_history.view], None),
        RenderTargetId::SsaoRaw => (vec![&t.ssao_raw.view], None),
        RenderTargetId::SsaoBlurH => (vec![&t.ssao_blur_h.view], None),
        RenderTargetId::SsaoBlurV => (vec![&t.ssao_blur_v.view], None),
        RenderTargetId::BrdfLut => (vec![&gpu.brdf_lut.view], None),
        RenderTargetId::ShadowCascade(cascade) => (
            Vec::new(),
            gpu.shadow_layer_views.get(cascade as usize),
        ),
        RenderTargetId::EnvCubemapFace { material, .. } => (
            face_view.into_iter().collect(),
            gpu.probes.get(&material).map(|p| &p.env_depth.view),
        ),
        RenderTargetId::IrradianceFace { .. } | RenderTargetId::PrefilterFace { .. } => {
            (face_view.into_iter().collect(), None)
        }
    };

    if colors.is_empty() && depth.is_none() {
        log::warn!("Render pass '{}' has no attachments; skipping", pass.label);
        *push_index += pass.draws.len() as u64;
        return;
    }

    let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = colors
        .iter()
        .map(|view| {
            Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: if pass.clear.contains(ClearFlags::COLOR) {
                        wgpu::LoadOp::Clear(wgpu::Color {
                            r: f64::from(pass.clear_color[0]),
                            g: f64::from(pass.clear_color[1]),
                            b: f64::from(pass.clear_color[2]),
                            a: f64::from(pass.clear_color[3]),
                        })
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                },
            })
        })
        .collect();

    let depth_attachment = depth.map(|view| wgpu::RenderPassDepthStencilAttachment {
        view,
        depth_ops: Some(wgpu::Operations {
            load: if pass.clear.contains(ClearFlags::DEPTH) {
                wgpu::LoadOp::Clear(pass.clear_depth)
            } else {
                wgpu::LoadOp::Load
            },
            store: wgpu::StoreOp::Store,
        }),
        stencil_ops: None,
    });

    let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(pass.label),
        color_attachments: &color_attachments,
        depth_stencil_attachment: depth_attachment,
        timestamp_writes: None,
        occlusion_query_set: None,
        multiview_mask: None,
    });

    for (draw, ready) in pass.draws.iter().zip(prepared) {
        let push_offset = (*push_index * PUSH_ENTRY_SIZE) as u32;
        *push_index += 1;
        let Some(ready) = ready else { continue };

        rpass.set_pipeline(&ready.pipeline);
        rpass.set_bind_group(0, &ready.group0, &[draw.dynamic_offset, push_offset]);
        rpass.set_bind_group(1, &ready.group1, &[]);

        match draw.geometry {
            GeometrySource::RenderObject(id) => {
                let Some(mesh) = gpu.meshes.get(&id) else {
                    continue;
                };
                rpass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                if let Some(index_buffer) = &mesh.index_buffer {
                    rpass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
                } else {
                    let (first, count) = draw.vertex_range.unwrap_or((0, mesh.vertex_count));
                    rpass.draw(first..first + count, 0..1);
                }
            }
            GeometrySource::Stream(slot) => {
                let Some(Some((buffer, _))) = gpu.stream_buffers.get(slot as usize) else {
                    continue;
                };
                rpass.set_vertex_buffer(0, buffer.slice(..));
                if ready.instanced {
                    // Glyph streams: four corners per instance, expanded
                    // in the vertex stage.
                    rpass.draw(0..4, 0..ready.stream_vertex_count);
                } else {
                    let (first, count) =
                        draw.vertex_range.unwrap_or((0, ready.stream_vertex_count));
                    rpass.draw(first..first + count, 0..1);
                }
            }
        }
    }
}
