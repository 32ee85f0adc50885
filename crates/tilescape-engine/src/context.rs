//! Process-wide render state.
//!
//! One [`RenderContext`] is created at startup and passed by reference to
//! every subsystem; nothing in the crate reaches it through a global.

use crate::coords::{Rect, Viewport};
use crate::device::{GpuBackend, Program, RawFramebuffer, StencilState, Vertex};
use crate::error::RenderError;
use crate::paint::Color;
use crate::pool::PoolRegistry;
use crate::resource::{
    Binder, Diagnostics, FilterTargetPool, RenderTargetId, RenderTargetPool, TargetStorage,
    TextureStore,
};
use crate::scene::{BatchTexture, FilterFrame, QuadBatcher, StencilFrame};

/// Stencil value written over chrome windows; above any mask level.
pub(crate) const CHROME_STENCIL: u32 = 0xFF;

/// Owner of the binder, every resource store and every pool.
pub struct RenderContext<B: GpuBackend> {
    pub(crate) binder: Binder<B>,
    pub(crate) textures: TextureStore,
    pub(crate) render_targets: RenderTargetPool,
    pub(crate) filter_targets: FilterTargetPool,
    pub(crate) pools: PoolRegistry,
    pub(crate) diagnostics: Diagnostics,

    pub(crate) batcher: QuadBatcher,
    pub(crate) filter_stack: Vec<FilterFrame>,
    pub(crate) stencil_stack: Vec<StencilFrame>,
    /// Stencil value inside the innermost mask of the current target.
    pub(crate) stencil_level: u32,
    /// Level 0 draws test `EQUAL 0` instead of ignoring the stencil.
    pub(crate) window_clip: bool,
    pub(crate) target: (Option<RawFramebuffer>, Rect),
    pub(crate) programs: Vec<Program>,

    screen: Viewport,
    clear_color: Color,
}

impl<B: GpuBackend> RenderContext<B> {
    pub fn new(backend: B, screen: Viewport) -> Self {
        Self {
            binder: Binder::new(backend),
            textures: TextureStore::new(),
            render_targets: RenderTargetPool::new(),
            filter_targets: FilterTargetPool::new(),
            pools: PoolRegistry::new(),
            diagnostics: Diagnostics::new(),
            batcher: QuadBatcher::new(),
            filter_stack: Vec::new(),
            stencil_stack: Vec::new(),
            stencil_level: 0,
            window_clip: false,
            target: (None, screen_rect(screen)),
            programs: Vec::new(),
            screen,
            clear_color: Color::BLACK,
        }
    }

    // ── accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn screen(&self) -> Viewport {
        self.screen
    }

    pub fn resize(&mut self, screen: Viewport) {
        if screen.is_valid() {
            self.screen = screen;
        } else {
            log::warn!("ignoring invalid screen size {screen:?}");
        }
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    #[inline]
    pub fn binder(&self) -> &Binder<B> {
        &self.binder
    }

    #[inline]
    pub fn backend(&self) -> &B {
        self.binder.backend()
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        self.binder.backend_mut()
    }

    #[inline]
    pub fn textures(&self) -> &TextureStore {
        &self.textures
    }

    #[inline]
    pub fn textures_mut(&mut self) -> &mut TextureStore {
        &mut self.textures
    }

    #[inline]
    pub fn render_targets(&self) -> &RenderTargetPool {
        &self.render_targets
    }

    #[inline]
    pub fn render_targets_mut(&mut self) -> &mut RenderTargetPool {
        &mut self.render_targets
    }

    #[inline]
    pub fn filter_targets(&self) -> &FilterTargetPool {
        &self.filter_targets
    }

    #[inline]
    pub fn pools_mut(&mut self) -> &mut PoolRegistry {
        &mut self.pools
    }

    #[inline]
    pub fn pools(&self) -> &PoolRegistry {
        &self.pools
    }

    #[inline]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    #[inline]
    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    #[inline]
    pub fn batcher(&self) -> &QuadBatcher {
        &self.batcher
    }

    /// Device storage of a leased render target, created on demand.
    pub fn render_target_storage(&mut self, id: RenderTargetId) -> Option<TargetStorage> {
        self.render_targets
            .ensure_storage(id, &mut self.binder, &mut self.diagnostics)
    }

    // ── loss and teardown ─────────────────────────────────────────────────

    /// Starts a new context generation.
    ///
    /// Every owner forgets its storage ids without device calls; the next
    /// bind of each resource allocates again.
    pub fn handle_context_lost(&mut self) {
        log::warn!(
            "graphics context lost (generation {}); resources will be re-created",
            self.binder.generation()
        );
        self.binder.invalidate_all();
        self.textures.forget_storage();
        self.render_targets.forget_storage();
        self.filter_targets.forget_storage();
        self.batcher.forget_storage();
        self.diagnostics.report(RenderError::ContextLost);
    }

    /// Installs a backend for a re-created device and returns the old one.
    pub fn replace_backend(&mut self, backend: B) -> B {
        self.handle_context_lost();
        self.binder.replace_backend(backend)
    }

    /// Empties every object pool and destroys storage nobody holds: free
    /// render targets and retired textures.
    pub fn drain_pools(&mut self) {
        self.pools.drain_all();
        self.render_targets.drain(&mut self.binder);
        self.filter_targets.drain(&mut self.binder);
        let generation = self.binder.generation();
        for retired in self.textures.drain_retired() {
            if retired.generation == generation {
                self.binder.destroy_texture(retired.raw);
            }
        }
    }

    /// Destroys all device storage and hands the backend back.
    pub fn teardown(mut self) -> B {
        self.drain_pools();
        let generation = self.binder.generation();
        for (raw, g) in self.textures.take_all_storage() {
            if g == generation {
                self.binder.destroy_texture(raw);
            }
        }
        self.batcher.release_storage(&mut self.binder);
        self.binder.release_placeholder();
        log::info!("render context torn down");
        self.binder.into_backend()
    }

    // ── frame plumbing used by the scene pipeline ─────────────────────────

    pub(crate) fn begin_frame(&mut self) {
        let screen = self.screen;
        self.binder.begin_frame(screen);
        self.batcher.begin_frame();
        self.stencil_level = 0;
        self.window_clip = false;
        self.set_target(None, screen_rect(screen));
        self.binder.clear_color(self.clear_color);
        self.binder.set_stencil(StencilState::Disabled);
    }

    pub(crate) fn end_frame(&mut self) {
        self.binder.end_frame();
    }

    /// Unwinds every stack after the frame was abandoned.
    pub(crate) fn abandon_frame(&mut self) {
        for frame in self.filter_stack.drain(..) {
            if let Some(id) = frame.target {
                if let Err(err) = self.filter_targets.release(id) {
                    self.diagnostics.report(err);
                }
            }
            self.pools.release(frame);
        }
        for frame in self.stencil_stack.drain(..) {
            self.pools.release(frame);
        }
        self.batcher.begin_frame();
        self.stencil_level = 0;
        self.window_clip = false;
    }

    pub(crate) fn set_target(&mut self, framebuffer: Option<RawFramebuffer>, area: Rect) {
        self.target = (framebuffer, area);
        self.binder.bind_framebuffer(framebuffer, area);
    }

    /// Stencil state for ordinary draws at the current level.
    pub(crate) fn content_stencil(&self) -> StencilState {
        if self.stencil_level > 0 || self.window_clip {
            StencilState::TestEqual(self.stencil_level)
        } else {
            StencilState::Disabled
        }
    }

    pub(crate) fn push_quad(&mut self, texture: BatchTexture, program: Program, quad: [Vertex; 4]) {
        if self.batcher.breaks_run(texture, program) {
            self.flush();
        }
        self.batcher.push(texture, program, quad);
    }

    pub(crate) fn flush(&mut self) {
        self.batcher
            .flush(&mut self.binder, &mut self.textures, &mut self.diagnostics);
    }
}

fn screen_rect(screen: Viewport) -> Rect {
    Rect::new(0.0, 0.0, screen.width, screen.height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::recording::{Call, RecordingBackend};
    use crate::resource::ImageData;

    fn ctx() -> RenderContext<RecordingBackend> {
        RenderContext::new(RecordingBackend::new(), Viewport::new(320.0, 240.0))
    }

    #[test]
    fn context_loss_forgets_storage_without_device_calls() {
        let mut ctx = ctx();
        let tex = ctx.textures_mut().create_from_image(ImageData::filled(4, 4, [1; 4]));
        let target = ctx.render_targets_mut().acquire(64.0, 64.0, 1.0);
        ctx.render_target_storage(target).unwrap();
        ctx.binder
            .bind_texture(0, &mut ctx.textures, Some(tex), &mut ctx.diagnostics);
        ctx.backend_mut().take();

        ctx.handle_context_lost();

        assert!(ctx.backend().calls.is_empty());
        assert_eq!(ctx.binder().generation(), 1);
        assert!(!ctx.textures().get(tex).unwrap().is_resident(1));
        assert_eq!(ctx.diagnostics().counts().context_losses, 1);

        // The next bind allocates again.
        ctx.binder
            .bind_texture(0, &mut ctx.textures, Some(tex), &mut ctx.diagnostics);
        assert_eq!(
            ctx.backend()
                .count(|c| matches!(c, Call::CreateTexture { width: 4, .. })),
            1
        );
    }

    #[test]
    fn drain_destroys_free_targets_and_retired_textures() {
        let mut ctx = ctx();
        let tex = ctx.textures_mut().create_from_image(ImageData::filled(4, 4, [1; 4]));
        ctx.binder
            .bind_texture(0, &mut ctx.textures, Some(tex), &mut ctx.diagnostics);
        ctx.textures_mut().release(tex);
        let target = ctx.render_targets_mut().acquire(32.0, 32.0, 1.0);
        ctx.render_target_storage(target).unwrap();
        ctx.render_targets_mut().release(target).unwrap();
        ctx.backend_mut().take();

        ctx.drain_pools();

        let backend = ctx.backend();
        assert_eq!(backend.count(|c| matches!(c, Call::DestroyFramebuffer(_))), 1);
        assert_eq!(backend.count(|c| matches!(c, Call::DestroyTexture(_))), 1);
        assert!(ctx.render_targets().is_empty());
    }

    #[test]
    fn teardown_returns_the_backend_after_destroying_storage() {
        let mut ctx = ctx();
        let tex = ctx.textures_mut().create_from_image(ImageData::filled(2, 2, [9; 4]));
        ctx.binder
            .bind_texture(0, &mut ctx.textures, Some(tex), &mut ctx.diagnostics);

        let backend = ctx.teardown();

        // No placeholder was ever needed, so only the live texture goes.
        assert_eq!(backend.count(|c| matches!(c, Call::DestroyTexture(_))), 1);
    }

    #[test]
    fn invalid_resize_is_ignored() {
        let mut ctx = ctx();
        ctx.resize(Viewport::new(0.0, 100.0));
        assert_eq!(ctx.screen(), Viewport::new(320.0, 240.0));
    }
}
