/// Acquired swapchain image. Presented by [`Gpu::present`](super::Gpu::present);
/// holding it blocks acquisition of the next one.
pub struct GpuFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
}
