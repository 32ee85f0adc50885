//! wgpu implementation of [`GpuBackend`].
//!
//! Resource calls (create, upload, write, destroy) reach the device
//! immediately; state and draw calls are recorded and replayed into one
//! encoder at [`end_frame`](GpuBackend::end_frame). Destruction is deferred
//! until after that submit: recorded draws may still reference the storage
//! (a buffer that grew mid-frame keeps serving the draws recorded before).
//!
//! Queue writes land before the frame's commands execute, so a buffer
//! region must be written at most once per frame; the batcher appends and
//! the tilemap rebuilds at most once per frame.

mod pipelines;
mod replay;

use std::collections::HashMap;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::coords::{Rect, Viewport};
use crate::error::{RenderError, RenderResult, ResourceKind};
use crate::paint::Color;

use super::{
    BufferKind, DrawCall, FilterMode, GpuBackend, Gpu, Program, RawBuffer, RawFramebuffer,
    RawTexture, SamplerStyle, StencilState, TexelRegion, WrapMode,
};
use pipelines::{DrawUniform, PipelineKey, Pipelines, OFFSCREEN_FORMAT, STENCIL_FORMAT};

struct TextureEntry {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    style: SamplerStyle,
    bind_group: Option<wgpu::BindGroup>,
}

struct BufferEntry {
    buffer: wgpu::Buffer,
}

struct StencilAttachment {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct FramebufferEntry {
    color: u32,
    stencil: StencilAttachment,
}

/// Graphics state at the time a draw is recorded.
#[derive(Debug, Clone, Copy)]
struct RecordState {
    program: Program,
    stencil: StencilState,
    texture: Option<u32>,
    geometry: Option<(u32, u32)>,
    target: Option<u32>,
    area: Rect,
}

struct DrawRecord {
    pipeline: PipelineKey,
    stencil_reference: u32,
    texture: u32,
    vertices: u32,
    indices: u32,
    range: Range<u32>,
    base_vertex: i32,
    uniform_offset: u32,
    viewport: [f32; 4],
}

enum Command {
    Target(Option<u32>),
    ClearColor(Color),
    ClearStencil,
    Draw(DrawRecord),
}

/// Storage scheduled for removal once the frame is submitted. Ids are
/// never handed out twice, so the entries stay resolvable until then.
#[derive(Debug, Copy, Clone)]
enum Doomed {
    Texture(u32),
    Buffer(u32),
    Framebuffer(u32),
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_format: wgpu::TextureFormat,
    lost: Arc<AtomicBool>,
    pipelines: Pipelines,

    textures: HashMap<u32, TextureEntry>,
    buffers: HashMap<u32, BufferEntry>,
    framebuffers: HashMap<u32, FramebufferEntry>,
    samplers: HashMap<SamplerStyle, wgpu::Sampler>,
    next_id: u32,

    surface_view: Option<(wgpu::TextureView, u32, u32)>,
    screen_stencil: Option<StencilAttachment>,

    state: RecordState,
    commands: Vec<Command>,
    uniforms: Vec<u8>,
    uniform_stride: u32,
    uniform_buffer: Option<(wgpu::Buffer, wgpu::BindGroup, u64)>,
    doomed: Vec<Doomed>,
    upload_scratch: Vec<u8>,
}

impl WgpuBackend {
    pub fn new(gpu: &Gpu<'_>) -> Self {
        let device = gpu.device().clone();
        let align = device.limits().min_uniform_buffer_offset_alignment.max(1);
        let size = std::mem::size_of::<DrawUniform>() as u32;
        let uniform_stride = size.div_ceil(align) * align;

        Self {
            pipelines: Pipelines::new(&device),
            queue: gpu.queue().clone(),
            surface_format: gpu.surface_format(),
            lost: gpu.lost_flag(),
            device,
            textures: HashMap::new(),
            buffers: HashMap::new(),
            framebuffers: HashMap::new(),
            samplers: HashMap::new(),
            next_id: 1,
            surface_view: None,
            screen_stencil: None,
            state: RecordState::initial(Viewport::default()),
            commands: Vec::new(),
            uniforms: Vec::new(),
            uniform_stride,
            uniform_buffer: None,
            doomed: Vec::new(),
            upload_scratch: Vec::new(),
        }
    }

    /// Swapchain view the next frame renders into. Without one, screen
    /// draws are dropped.
    pub fn set_surface_view(&mut self, view: wgpu::TextureView, width: u32, height: u32) {
        self.surface_view = Some((view, width, height));
    }

    fn bury(&mut self) {
        for doomed in self.doomed.drain(..) {
            match doomed {
                Doomed::Texture(id) => {
                    self.textures.remove(&id);
                }
                Doomed::Buffer(id) => {
                    self.buffers.remove(&id);
                }
                Doomed::Framebuffer(id) => {
                    if let Some(entry) = self.framebuffers.remove(&id) {
                        self.textures.remove(&entry.color);
                    }
                }
            }
        }
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }

    fn check_extent(&self, kind: ResourceKind, width: u32, height: u32) -> RenderResult<()> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(RenderError::AllocationFailed {
                kind,
                width,
                height,
                reason: format!("extent outside 1..={max}"),
            });
        }
        if self.is_context_lost() {
            return Err(RenderError::AllocationFailed {
                kind,
                width,
                height,
                reason: "device lost".into(),
            });
        }
        Ok(())
    }

    fn create_color_texture(
        &self,
        width: u32,
        height: u32,
        usage: wgpu::TextureUsages,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("tilescape texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OFFSCREEN_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    fn create_stencil(&self, width: u32, height: u32) -> StencilAttachment {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("tilescape stencil"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: STENCIL_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        StencilAttachment {
            _texture: texture,
            view,
            width,
            height,
        }
    }

    fn sampler(&mut self, style: SamplerStyle) -> wgpu::Sampler {
        self.samplers
            .entry(style)
            .or_insert_with(|| {
                let filter = match style.filter {
                    FilterMode::Nearest => wgpu::FilterMode::Nearest,
                    FilterMode::Linear => wgpu::FilterMode::Linear,
                };
                let address = match style.wrap {
                    WrapMode::Clamp => wgpu::AddressMode::ClampToEdge,
                    WrapMode::Repeat => wgpu::AddressMode::Repeat,
                };
                self.device.create_sampler(&wgpu::SamplerDescriptor {
                    label: Some("tilescape sampler"),
                    address_mode_u: address,
                    address_mode_v: address,
                    address_mode_w: address,
                    mag_filter: filter,
                    min_filter: filter,
                    mipmap_filter: wgpu::MipmapFilterMode::Nearest,
                    ..Default::default()
                })
            })
            .clone()
    }

    fn target_format(&self, target: Option<u32>) -> wgpu::TextureFormat {
        match target {
            None => self.surface_format,
            Some(_) => OFFSCREEN_FORMAT,
        }
    }

    fn target_size(&self, target: Option<u32>) -> Option<(u32, u32)> {
        match target {
            None => self.surface_view.as_ref().map(|(_, w, h)| (*w, *h)),
            Some(fb) => self
                .framebuffers
                .get(&fb)
                .map(|f| (f.stencil.width, f.stencil.height)),
        }
    }
}

impl RecordState {
    fn initial(screen: Viewport) -> Self {
        Self {
            program: Program::Textured,
            stencil: StencilState::Disabled,
            texture: None,
            geometry: None,
            target: None,
            area: Rect::new(0.0, 0.0, screen.width, screen.height),
        }
    }
}

impl GpuBackend for WgpuBackend {
    fn create_texture(&mut self, width: u32, height: u32) -> RenderResult<RawTexture> {
        self.check_extent(ResourceKind::Texture, width, height)?;
        let (texture, view) = self.create_color_texture(
            width,
            height,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        let id = self.next();
        self.textures.insert(
            id,
            TextureEntry {
                texture,
                view,
                style: SamplerStyle::default(),
                bind_group: None,
            },
        );
        Ok(RawTexture(id))
    }

    fn upload_texture(&mut self, texture: RawTexture, region: TexelRegion, pixels: &[u8]) {
        let Some(entry) = self.textures.get(&texture.0) else {
            log::debug!("upload to unknown texture {texture:?}");
            return;
        };
        let expected = region.width as usize * region.height as usize * 4;
        if pixels.len() < expected {
            log::warn!("upload of {} bytes, region needs {expected}", pixels.len());
            return;
        }

        // Device textures hold premultiplied color.
        self.upload_scratch.clear();
        self.upload_scratch.extend_from_slice(&pixels[..expected]);
        for px in self.upload_scratch.chunks_exact_mut(4) {
            let a = px[3] as u16;
            for c in &mut px[..3] {
                *c = ((*c as u16 * a + 127) / 255) as u8;
            }
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &entry.texture,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: region.x,
                    y: region.y,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            &self.upload_scratch,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(region.width * 4),
                rows_per_image: Some(region.height),
            },
            wgpu::Extent3d {
                width: region.width,
                height: region.height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn apply_sampler(&mut self, texture: RawTexture, style: SamplerStyle) {
        if let Some(entry) = self.textures.get_mut(&texture.0) {
            if entry.style != style {
                entry.style = style;
                entry.bind_group = None;
            }
        }
    }

    fn destroy_texture(&mut self, texture: RawTexture) {
        self.doomed.push(Doomed::Texture(texture.0));
    }

    fn bind_texture(&mut self, unit: u32, texture: RawTexture) {
        // The quad shader samples unit 0 only.
        if unit == 0 {
            self.state.texture = Some(texture.0);
        }
    }

    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> RenderResult<RawBuffer> {
        let max = self.device.limits().max_buffer_size;
        if size == 0 || size > max || self.is_context_lost() {
            return Err(RenderError::AllocationFailed {
                kind: ResourceKind::Buffer,
                width: u32::try_from(size).unwrap_or(u32::MAX),
                height: 1,
                reason: format!("size outside 1..={max} or device lost"),
            });
        }
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        };
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tilescape geometry buffer"),
            // COPY_BUFFER_ALIGNMENT is 4.
            size: size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let id = self.next();
        self.buffers.insert(id, BufferEntry { buffer });
        Ok(RawBuffer(id))
    }

    fn write_buffer(&mut self, buffer: RawBuffer, offset: u64, data: &[u8]) {
        let Some(entry) = self.buffers.get(&buffer.0) else {
            log::debug!("write to unknown buffer {buffer:?}");
            return;
        };
        if data.len() % 4 == 0 {
            self.queue.write_buffer(&entry.buffer, offset, data);
        } else {
            let mut padded = data.to_vec();
            padded.resize(data.len().next_multiple_of(4), 0);
            self.queue.write_buffer(&entry.buffer, offset, &padded);
        }
    }

    fn destroy_buffer(&mut self, buffer: RawBuffer) {
        self.doomed.push(Doomed::Buffer(buffer.0));
    }

    fn bind_geometry(&mut self, vertices: RawBuffer, indices: RawBuffer) {
        self.state.geometry = Some((vertices.0, indices.0));
    }

    fn create_framebuffer(
        &mut self,
        width: u32,
        height: u32,
    ) -> RenderResult<(RawFramebuffer, RawTexture)> {
        self.check_extent(ResourceKind::Framebuffer, width, height)?;
        let (texture, view) = self.create_color_texture(
            width,
            height,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        );
        let color = self.next();
        self.textures.insert(
            color,
            TextureEntry {
                texture,
                view,
                style: SamplerStyle::default(),
                bind_group: None,
            },
        );
        let stencil = self.create_stencil(width, height);
        let id = self.next();
        self.framebuffers.insert(id, FramebufferEntry { color, stencil });
        Ok((RawFramebuffer(id), RawTexture(color)))
    }

    fn destroy_framebuffer(&mut self, framebuffer: RawFramebuffer) {
        self.doomed.push(Doomed::Framebuffer(framebuffer.0));
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<RawFramebuffer>, area: Rect) {
        let target = framebuffer.map(|f| f.0);
        if target != self.state.target {
            self.commands.push(Command::Target(target));
        }
        self.state.target = target;
        self.state.area = area;
    }

    fn clear_color(&mut self, color: Color) {
        self.commands.push(Command::ClearColor(color));
    }

    fn set_stencil(&mut self, state: StencilState) {
        self.state.stencil = state;
    }

    fn clear_stencil(&mut self) {
        self.commands.push(Command::ClearStencil);
    }

    fn set_program(&mut self, program: Program) {
        self.state.program = program;
    }

    fn draw(&mut self, call: DrawCall) {
        let state = self.state;
        let (Some(texture), Some((vertices, indices))) = (state.texture, state.geometry) else {
            log::debug!("draw without texture or geometry skipped");
            return;
        };
        let Some((tw, th)) = self.target_size(state.target) else {
            return;
        };

        let area = state.area;
        let uniform = DrawUniform::new(
            [area.origin.x, area.origin.y, area.size.x, area.size.y],
            call.translate,
            &state.program,
        );
        let uniform_offset = self.uniforms.len() as u32;
        self.uniforms.extend_from_slice(bytemuck::bytes_of(&uniform));
        self.uniforms
            .resize(uniform_offset as usize + self.uniform_stride as usize, 0);

        self.commands.push(Command::Draw(DrawRecord {
            pipeline: PipelineKey::new(&state.program, state.stencil, self.target_format(state.target)),
            stencil_reference: pipelines::stencil_reference(state.stencil),
            texture,
            vertices,
            indices,
            range: call.indices,
            base_vertex: call.base_vertex,
            uniform_offset,
            viewport: [
                0.0,
                0.0,
                area.size.x.clamp(1.0, tw as f32),
                area.size.y.clamp(1.0, th as f32),
            ],
        }));
    }

    fn begin_frame(&mut self, screen: Viewport) {
        self.commands.clear();
        self.uniforms.clear();
        self.state = RecordState::initial(screen);

        if let Some((_, w, h)) = &self.surface_view {
            let (w, h) = (*w, *h);
            let stale = self
                .screen_stencil
                .as_ref()
                .is_none_or(|s| s.width != w || s.height != h);
            if stale {
                self.screen_stencil = Some(self.create_stencil(w, h));
            }
        }
    }

    fn end_frame(&mut self) {
        if !self.is_context_lost() {
            self.submit();
        }
        self.commands.clear();
        self.uniforms.clear();
        self.bury();
        self.surface_view = None;
    }

    fn is_context_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    fn forget_resources(&mut self) {
        self.textures.clear();
        self.buffers.clear();
        self.framebuffers.clear();
        self.samplers.clear();
        self.doomed.clear();
        self.commands.clear();
        self.uniforms.clear();
        self.uniform_buffer = None;
        self.screen_stencil = None;
    }
}
