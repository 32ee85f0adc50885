use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::context::RenderContext;
use crate::coords::Viewport;
use crate::core::{App as CoreApp, AppControl, FrameCtx};
use crate::device::{Gpu, GpuInit, WgpuBackend};
use crate::time::{FrameClock, FrameTime, PacerConfig, TickPacer};

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    /// Logic ticks per second fed to [`App::on_tick`](crate::core::App::on_tick).
    pub tick_rate: f32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "tilescape".to_string(),
            initial_size: LogicalSize::new(816.0, 624.0),
            tick_rate: PacerConfig::default().target_rate,
        }
    }
}

/// Entry point for the runtime.
///
/// Drives a single window: the render context is process-wide, so there is
/// exactly one swapchain to draw into.
pub struct Runtime;

impl Runtime {
    pub fn run<A>(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: 'static + CoreApp,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    clock: FrameClock,

    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

fn build_entry(window: Window, clock: FrameClock, gpu_init: GpuInit) -> Result<WindowEntry> {
    WindowEntryTryBuilder {
        clock,
        window,
        gpu_builder: |w| pollster::block_on(Gpu::new(w, gpu_init)),
    }
    .try_build()
}

fn logical_viewport(window: &Window, size: PhysicalSize<u32>) -> Viewport {
    let logical: LogicalSize<f64> = size.to_logical(window.scale_factor());
    Viewport::new(logical.width as f32, logical.height as f32)
}

struct AppState<A>
where
    A: CoreApp + 'static,
{
    config: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,

    entry: Option<WindowEntry>,
    render: Option<RenderContext<WgpuBackend>>,
    pacer: TickPacer,

    exit_requested: bool,
    failure: Option<anyhow::Error>,
}

impl<A> AppState<A>
where
    A: CoreApp + 'static,
{
    fn new(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Self {
        let pacer = TickPacer::new(PacerConfig {
            target_rate: config.tick_rate,
        });
        Self {
            config,
            gpu_init,
            app,
            entry: None,
            render: None,
            pacer,
            exit_requested: false,
            failure: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.failure = Some(err);
        self.exit_requested = true;
        event_loop.exit();
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let entry = build_entry(window, FrameClock::default(), self.gpu_init.clone())
            .context("GPU initialization failed for window")?;

        let backend = entry.with_gpu(|gpu| WgpuBackend::new(gpu));
        let screen = entry.with_window(|w| logical_viewport(w, w.inner_size()));
        let mut render = RenderContext::new(backend, screen);

        self.app
            .on_start(&mut render)
            .context("application start-up failed")?;

        log::info!(
            "runtime started: {}x{} logical, {} ticks/s",
            screen.width,
            screen.height,
            self.config.tick_rate
        );

        entry.with_window(|w| w.request_redraw());
        self.entry = Some(entry);
        self.render = Some(render);
        Ok(())
    }

    /// Replaces a lost device with a new one on the same window.
    fn recreate_device(&mut self) -> Result<()> {
        let Some(entry) = self.entry.take() else {
            return Ok(());
        };
        let heads = entry.into_heads();
        let entry = build_entry(heads.window, heads.clock, self.gpu_init.clone())
            .context("failed to re-create GPU device after loss")?;

        let backend = entry.with_gpu(|gpu| WgpuBackend::new(gpu));
        if let Some(render) = self.render.as_mut() {
            drop(render.replace_backend(backend));
        }
        log::info!("GPU device re-created");

        self.entry = Some(entry);
        Ok(())
    }

    fn device_lost(&self) -> bool {
        self.entry
            .as_ref()
            .is_some_and(|e| e.with_gpu(|gpu| gpu.lost_flag().load(Ordering::Acquire)))
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        let Some(entry) = self.entry.as_mut() else {
            return;
        };
        entry.with_gpu_mut(|gpu| gpu.resize(new_size));
        let screen = entry.with_window(|w| logical_viewport(w, new_size));
        if let Some(render) = self.render.as_mut() {
            render.resize(screen);
        }
        entry.with_window(|w| w.request_redraw());
    }

    fn redraw(&mut self) -> AppControl {
        let (app, render, entry, pacer) = (
            &mut self.app,
            &mut self.render,
            &mut self.entry,
            &mut self.pacer,
        );
        let (Some(entry), Some(render)) = (entry.as_mut(), render.as_mut()) else {
            return AppControl::Continue;
        };

        let mut control = AppControl::Continue;
        entry.with_mut(|fields| {
            let time: FrameTime = fields.clock.tick();

            let ticked = pacer.advance(time.dt);
            if ticked && app.on_tick(render) == AppControl::Exit {
                control = AppControl::Exit;
                return;
            }

            let mut ctx = FrameCtx {
                window: fields.window,
                gpu: fields.gpu,
                render: &mut *render,
                time,
                ticked,
            };
            control = app.on_frame(&mut ctx);
        });
        control
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: CoreApp + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() || self.exit_requested {
            return;
        }

        if let Err(e) = self.start(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);

        // Continuous redraw; the tilemap animates and scrolls every tick.
        if let Some(entry) = self.entry.as_ref() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        if self.app.on_window_event(&event) == AppControl::Exit {
            self.exit_requested = true;
            event_loop.exit();
            return;
        }

        match &event {
            WindowEvent::CloseRequested => {
                self.exit_requested = true;
                event_loop.exit();
            }

            WindowEvent::Resized(new_size) => self.resize(*new_size),

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self
                    .entry
                    .as_ref()
                    .map(|e| e.with_window(|w| w.inner_size()))
                {
                    self.resize(size);
                }
            }

            WindowEvent::RedrawRequested => {
                if self.redraw() == AppControl::Exit {
                    self.exit_requested = true;
                    event_loop.exit();
                    return;
                }

                if self.device_lost() {
                    if let Err(e) = self.recreate_device() {
                        self.fail(event_loop, e);
                    }
                }
            }

            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Storage must go before the device that owns it.
        if let Some(render) = self.render.take() {
            drop(render.teardown());
        }
        self.entry = None;
    }
}
