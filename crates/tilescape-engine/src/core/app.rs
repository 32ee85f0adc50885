use anyhow::Result;
use winit::event::WindowEvent;

use crate::context::RenderContext;
use crate::device::WgpuBackend;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract driven by the runtime.
pub trait App {
    /// Called once the device exists, before the first frame. Load
    /// textures and build the scene here.
    fn on_start(&mut self, render: &mut RenderContext<WgpuBackend>) -> Result<()>;

    /// Called for window events.
    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// Called at the configured tick rate, at most once per frame, before
    /// [`on_frame`](Self::on_frame).
    fn on_tick(&mut self, render: &mut RenderContext<WgpuBackend>) -> AppControl {
        let _ = render;
        AppControl::Continue
    }

    /// Called once per redraw.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;
}
