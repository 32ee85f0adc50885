use core::ops::Range;

use crate::coords::{Rect, Viewport};
use crate::error::RenderResult;
use crate::paint::Color;

/// Device texture storage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RawTexture(pub u32);

/// Device buffer storage.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RawBuffer(pub u32);

/// Offscreen framebuffer (color + stencil attachments).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct RawFramebuffer(pub u32);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum BufferKind {
    #[default]
    Vertex,
    Index,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub enum WrapMode {
    #[default]
    Clamp,
    Repeat,
}

/// Sampling parameters of a texture.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
pub struct SamplerStyle {
    pub filter: FilterMode,
    pub wrap: WrapMode,
}

/// Texel rectangle of an upload.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TexelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TexelRegion {
    #[inline]
    pub const fn full(width: u32, height: u32) -> Self {
        Self { x: 0, y: 0, width, height }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StencilOp {
    Increment,
    Decrement,
    Replace,
}

/// Stencil configuration for subsequent draws.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StencilState {
    /// Stencil ignored.
    Disabled,
    /// Color writes off. `Increment`/`Decrement` apply where the stencil
    /// equals `reference`; `Replace` writes `reference` everywhere covered.
    Write { reference: u32, op: StencilOp },
    /// Color drawn only where the stencil equals `reference`.
    TestEqual(u32),
}

/// Shader program plus its per-draw parameters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Program {
    /// Textured, tinted quads (sprites, fills, tiles, composites).
    Textured,
    /// 4x5 row-major color matrix applied to the sampled color.
    ColorMatrix([f32; 20]),
    /// Nine-tap gaussian along `direction` (pixels per tap).
    Blur { direction: [f32; 2] },
}

/// One indexed draw against the bound geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub indices: Range<u32>,
    pub base_vertex: i32,
    /// Pixel offset added to every vertex position.
    pub translate: [f32; 2],
}

/// Device seam used by the binder.
///
/// Implementations execute what they are told; redundant-call elimination
/// lives in [`Binder`](crate::resource::Binder), which is the only caller.
/// Every method is called from the frame thread.
pub trait GpuBackend {
    fn create_texture(&mut self, width: u32, height: u32) -> RenderResult<RawTexture>;
    fn upload_texture(&mut self, texture: RawTexture, region: TexelRegion, pixels: &[u8]);
    fn apply_sampler(&mut self, texture: RawTexture, style: SamplerStyle);
    fn destroy_texture(&mut self, texture: RawTexture);
    fn bind_texture(&mut self, unit: u32, texture: RawTexture);

    fn create_buffer(&mut self, kind: BufferKind, size: u64) -> RenderResult<RawBuffer>;
    fn write_buffer(&mut self, buffer: RawBuffer, offset: u64, data: &[u8]);
    fn destroy_buffer(&mut self, buffer: RawBuffer);
    fn bind_geometry(&mut self, vertices: RawBuffer, indices: RawBuffer);

    /// Creates a framebuffer and returns it with its color texture.
    fn create_framebuffer(
        &mut self,
        width: u32,
        height: u32,
    ) -> RenderResult<(RawFramebuffer, RawTexture)>;
    fn destroy_framebuffer(&mut self, framebuffer: RawFramebuffer);

    /// Targets `framebuffer` (`None` = screen). `area` is the pixel region
    /// of scene space that maps onto the target's top-left `area.size`.
    fn bind_framebuffer(&mut self, framebuffer: Option<RawFramebuffer>, area: Rect);
    fn clear_color(&mut self, color: Color);

    fn set_stencil(&mut self, state: StencilState);
    fn clear_stencil(&mut self);
    fn set_program(&mut self, program: Program);
    fn draw(&mut self, call: DrawCall);

    fn begin_frame(&mut self, screen: Viewport);
    fn end_frame(&mut self);

    /// `true` once the device is gone.
    fn is_context_lost(&self) -> bool;

    /// Forgets every resource table without touching the device. Called
    /// after a loss; ids handed out earlier are never used again.
    fn forget_resources(&mut self);
}
