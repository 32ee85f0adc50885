//! Test backend that records every call instead of talking to a device.

use crate::coords::{Rect, Viewport};
use crate::error::{RenderError, RenderResult, ResourceKind};
use crate::paint::Color;

use super::{
    BufferKind, DrawCall, GpuBackend, Program, RawBuffer, RawFramebuffer, RawTexture,
    SamplerStyle, StencilState, TexelRegion,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateTexture { texture: RawTexture, width: u32, height: u32 },
    UploadTexture { texture: RawTexture, region: TexelRegion },
    ApplySampler { texture: RawTexture, style: SamplerStyle },
    DestroyTexture(RawTexture),
    BindTexture { unit: u32, texture: RawTexture },
    CreateBuffer { buffer: RawBuffer, kind: BufferKind, size: u64 },
    WriteBuffer { buffer: RawBuffer, offset: u64, len: usize },
    DestroyBuffer(RawBuffer),
    BindGeometry { vertices: RawBuffer, indices: RawBuffer },
    CreateFramebuffer { framebuffer: RawFramebuffer, texture: RawTexture, width: u32, height: u32 },
    DestroyFramebuffer(RawFramebuffer),
    BindFramebuffer { framebuffer: Option<RawFramebuffer>, area: Rect },
    ClearColor(Color),
    SetStencil(StencilState),
    ClearStencil,
    SetProgram(Program),
    Draw(DrawCall),
    BeginFrame(Viewport),
    EndFrame,
}

#[derive(Debug)]
pub struct RecordingBackend {
    pub calls: Vec<Call>,
    /// Every `create_*` fails while set.
    pub fail_allocations: bool,
    pub max_texture_size: u32,
    pub lost: bool,
    next_id: u32,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            fail_allocations: false,
            max_texture_size: 4096,
            lost: false,
            next_id: 1,
        }
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|c| pred(c)).count()
    }

    pub fn draws(&self) -> Vec<&DrawCall> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Draw(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    pub fn take(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn check(&self, kind: ResourceKind, width: u32, height: u32) -> RenderResult<()> {
        if self.fail_allocations {
            return Err(RenderError::AllocationFailed {
                kind,
                width,
                height,
                reason: "simulated failure".into(),
            });
        }
        if kind != ResourceKind::Buffer
            && (width == 0 || height == 0 || width > self.max_texture_size || height > self.max_texture_size)
        {
            return Err(RenderError::AllocationFailed {
                kind,
                width,
                height,
                reason: format!("exceeds {}", self.max_texture_size),
            });
        }
        Ok(())
    }
}

impl GpuBackend for RecordingBackend {
    fn create_texture(&mut self, width: u32, height: u32) -> RenderResult<RawTexture> {
        self.check(ResourceKind::Texture, width, height)?;
        let texture = RawTexture(self.next());
        self.calls.push(Call::CreateTexture { texture, width, height });
        Ok(texture)
    }

    fn upload_texture(&mut self, texture: RawTexture, region: TexelRegion, _pixels: &[u8]) {
        self.calls.push(Call::UploadTexture { texture, region });
    }

    fn apply_sampler(&mut self, texture: RawTexture, style: SamplerStyle) {
        self.calls.push(Call::ApplySampler { texture, style });
    }

    fn destroy_texture(&mut self, texture: RawTexture) {
        self.calls.push(Call::DestroyTexture(texture));
    }

    fn bind_texture(&mut self, unit: u32, texture: RawTexture) {
        self.calls.push(Call::BindTexture { unit, texture });
    }

    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> RenderResult<RawBuffer> {
        self.check(ResourceKind::Buffer, size as u32, 1)?;
        let buffer = RawBuffer(self.next());
        self.calls.push(Call::CreateBuffer { buffer, kind, size });
        Ok(buffer)
    }

    fn write_buffer(&mut self, buffer: RawBuffer, offset: u64, data: &[u8]) {
        self.calls.push(Call::WriteBuffer { buffer, offset, len: data.len() });
    }

    fn destroy_buffer(&mut self, buffer: RawBuffer) {
        self.calls.push(Call::DestroyBuffer(buffer));
    }

    fn bind_geometry(&mut self, vertices: RawBuffer, indices: RawBuffer) {
        self.calls.push(Call::BindGeometry { vertices, indices });
    }

    fn create_framebuffer(
        &mut self,
        width: u32,
        height: u32,
    ) -> RenderResult<(RawFramebuffer, RawTexture)> {
        self.check(ResourceKind::Framebuffer, width, height)?;
        let framebuffer = RawFramebuffer(self.next());
        let texture = RawTexture(self.next());
        self.calls.push(Call::CreateFramebuffer { framebuffer, texture, width, height });
        Ok((framebuffer, texture))
    }

    fn destroy_framebuffer(&mut self, framebuffer: RawFramebuffer) {
        self.calls.push(Call::DestroyFramebuffer(framebuffer));
    }

    fn bind_framebuffer(&mut self, framebuffer: Option<RawFramebuffer>, area: Rect) {
        self.calls.push(Call::BindFramebuffer { framebuffer, area });
    }

    fn clear_color(&mut self, color: Color) {
        self.calls.push(Call::ClearColor(color));
    }

    fn set_stencil(&mut self, state: StencilState) {
        self.calls.push(Call::SetStencil(state));
    }

    fn clear_stencil(&mut self) {
        self.calls.push(Call::ClearStencil);
    }

    fn set_program(&mut self, program: Program) {
        self.calls.push(Call::SetProgram(program));
    }

    fn draw(&mut self, call: DrawCall) {
        self.calls.push(Call::Draw(call));
    }

    fn begin_frame(&mut self, screen: Viewport) {
        self.calls.push(Call::BeginFrame(screen));
    }

    fn end_frame(&mut self) {
        self.calls.push(Call::EndFrame);
    }

    fn is_context_lost(&self) -> bool {
        self.lost
    }

    fn forget_resources(&mut self) {
        self.lost = false;
    }
}
