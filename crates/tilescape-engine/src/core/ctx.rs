use winit::window::Window;

use crate::context::RenderContext;
use crate::device::{Gpu, SurfaceErrorAction, WgpuBackend};
use crate::scene::{render_scene, FrameOutcome, NodeId, SceneGraph};
use crate::time::FrameTime;

use super::app::AppControl;

/// Per-frame context passed to [`App::on_frame`](super::App::on_frame).
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window-borrow lifetime carried by `Gpu<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: &'a Window,
    pub gpu: &'a mut Gpu<'w>,
    pub render: &'a mut RenderContext<WgpuBackend>,
    pub time: FrameTime,
    /// Whether a logic tick fired before this frame.
    pub ticked: bool,
}

impl<'a, 'w> FrameCtx<'a, 'w> {
    /// Logical window size as `(width, height)`.
    pub fn logical_size(&self) -> (f32, f32) {
        let phys = self.window.inner_size();
        let logi: winit::dpi::LogicalSize<f64> = phys.to_logical(self.window.scale_factor());
        (logi.width as f32, logi.height as f32)
    }

    /// Acquires the swapchain image, renders the tree at `root` into it and
    /// presents it.
    ///
    /// Surface errors skip the frame; only an out-of-memory surface asks the
    /// runtime to exit.
    pub fn render_scene(&mut self, graph: &mut SceneGraph, root: NodeId) -> AppControl {
        let frame = match self.gpu.begin_frame() {
            Ok(f) => f,
            Err(err) => {
                let action = self.gpu.handle_surface_error(err);
                if action == SurfaceErrorAction::Fatal {
                    log::error!("surface out of memory");
                    return AppControl::Exit;
                }
                return AppControl::Continue;
            }
        };

        let size = self.gpu.size();
        self.render
            .backend_mut()
            .set_surface_view(frame.view.clone(), size.width, size.height);

        if render_scene(self.render, graph, root) == FrameOutcome::Abandoned {
            log::debug!("frame {} abandoned", self.time.frame_index);
        }

        self.window.pre_present_notify();
        self.gpu.present(frame);
        AppControl::Continue
    }
}
