mod assets;

use anyhow::{anyhow, Result};
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{Key, NamedKey};

use tilescape_engine::context::RenderContext;
use tilescape_engine::core::{App, AppControl, FrameCtx};
use tilescape_engine::coords::Viewport;
use tilescape_engine::device::{GpuInit, WgpuBackend};
use tilescape_engine::logging::{init_logging, LoggingConfig};
use tilescape_engine::paint::Color;
use tilescape_engine::scene::{
    BlurFilter, ColorMatrixFilter, Fill, NodeContent, NodeId, NodeTag, SceneGraph, Sprite,
};
use tilescape_engine::tilemap::{TileRenderer, TilemapConfig};
use tilescape_engine::window::{Runtime, RuntimeConfig};

/// Frames between diagnostics reports.
const REPORT_EVERY: u64 = 600;

struct Nodes {
    root: NodeId,
    tilemap: NodeId,
    crystal: NodeId,
    cursor: NodeId,
}

#[derive(Default)]
struct Demo {
    graph: SceneGraph,
    nodes: Option<Nodes>,
    scroll: (f32, f32),
    phase: f32,
}

impl Demo {
    fn build(&mut self, render: &mut RenderContext<WgpuBackend>) -> Result<Nodes> {
        let screen = render.screen();
        let textures = render.textures_mut();
        let floor = textures.create_from_image(assets::floor_page());
        let decor = textures.create_from_image(assets::decoration_page());
        let crystal_tex = textures.create_from_image(assets::crystal());

        let g = &mut self.graph;
        let root = g.create_node(NodeContent::Container);

        // Tilemap
        let config = TilemapConfig {
            viewport: screen,
            ..TilemapConfig::default()
        };
        let mut tiles = TileRenderer::new(config, Box::new(assets::meadow()), render.pools_mut());
        tiles.set_flags(assets::tileset_flags());
        tiles.set_page(1, Some(floor));
        tiles.set_page(5, Some(decor));
        let tilemap = g.create_node(NodeContent::Tilemap(Box::new(tiles)));
        g.add_child(root, tilemap);

        // Filtered sprite
        let crystal = g.create_node(NodeContent::Sprite(Sprite::new(crystal_tex)));
        g.set_position(crystal, 180.0, 200.0);
        g.set_pivot(crystal, 32.0, 32.0);
        let mut tone = ColorMatrixFilter::acquire(render.pools_mut());
        tone.set_grayscale(0.6);
        tone.set_tone(0.1, 0.0, -0.05);
        g.add_filter(crystal, tone)
            .map_err(|_| anyhow!("crystal node missing"))?;
        let mut blur = BlurFilter::acquire(render.pools_mut());
        blur.strength = 2.0;
        g.add_filter(crystal, blur)
            .map_err(|_| anyhow!("crystal node missing"))?;
        g.add_child(root, crystal);

        // Masked sprite
        let porthole = g.create_node(NodeContent::Fill(Fill::new(120.0, 120.0, Color::WHITE)));
        g.set_position(porthole, 420.0, 180.0);
        g.add_child(root, porthole);
        let behind = g.create_node(NodeContent::Sprite(Sprite::new(crystal_tex)));
        g.set_position(behind, 400.0, 160.0);
        g.set_scale(behind, 3.0, 3.0);
        g.set_mask(behind, Some(porthole));
        g.add_child(root, behind);

        // Window layer: a message box that clips the cursor.
        let layer = g.create_node(NodeContent::WindowLayer);
        g.add_child(root, layer);
        let message = g.create_node(NodeContent::Fill(Fill::new(
            screen.width - 40.0,
            140.0,
            Color::from_straight(0.1, 0.15, 0.35, 0.85),
        )));
        g.set_position(message, 20.0, screen.height - 160.0);
        g.set_tag(message, NodeTag::Chrome);
        g.add_child(layer, message);
        let cursor = g.create_node(NodeContent::Fill(Fill::new(
            32.0,
            32.0,
            Color::from_straight(1.0, 0.85, 0.2, 1.0),
        )));
        g.add_child(layer, cursor);

        render.set_clear_color(Color::from_srgb_u8(16, 16, 24, 255));
        log::info!("demo scene built: {} nodes", self.graph.len());

        Ok(Nodes {
            root,
            tilemap,
            crystal,
            cursor,
        })
    }

    fn report(&mut self, render: &mut RenderContext<WgpuBackend>, frame: u64) {
        for err in render.diagnostics_mut().drain() {
            log::warn!("render diagnostic: {err}");
        }
        if let Some(tiles) = self
            .nodes
            .as_ref()
            .and_then(|n| self.graph.node(n.tilemap))
            .and_then(|n| match n.content() {
                NodeContent::Tilemap(t) => Some(t),
                _ => None,
            })
        {
            log::debug!(
                "frame {frame}: tilemap rebuilds {}, last paint {:?}",
                tiles.rebuild_count(),
                tiles.paint_stats()
            );
        }
    }
}

impl App for Demo {
    fn on_start(&mut self, render: &mut RenderContext<WgpuBackend>) -> Result<()> {
        let nodes = self.build(render)?;
        self.nodes = Some(nodes);
        Ok(())
    }

    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        if let WindowEvent::KeyboardInput { event, .. } = event {
            if event.state == ElementState::Pressed
                && event.logical_key == Key::Named(NamedKey::Escape)
            {
                return AppControl::Exit;
            }
        }
        AppControl::Continue
    }

    fn on_tick(&mut self, _render: &mut RenderContext<WgpuBackend>) -> AppControl {
        let Some(nodes) = self.nodes.as_ref() else {
            return AppControl::Continue;
        };
        self.scroll.0 += 1.0;
        self.scroll.1 += 0.5;
        self.phase += 0.02;

        if let Some(tiles) = self.graph.tilemap_mut(nodes.tilemap) {
            tiles.set_scroll_origin(self.scroll.0, self.scroll.1);
            tiles.update();
        }
        self.graph.set_rotation(nodes.crystal, self.phase);
        self.graph.set_position(
            nodes.cursor,
            400.0 + 360.0 * self.phase.cos(),
            460.0 + 80.0 * (self.phase * 2.0).sin(),
        );
        AppControl::Continue
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let Some((root, tilemap)) = self.nodes.as_ref().map(|n| (n.root, n.tilemap)) else {
            return AppControl::Continue;
        };

        let screen: Viewport = ctx.render.screen();
        if let Some(tiles) = self.graph.tilemap_mut(tilemap) {
            if tiles.viewport() != screen {
                tiles.resize_viewport(screen);
            }
        }

        let control = ctx.render_scene(&mut self.graph, root);

        if ctx.time.frame_index % REPORT_EVERY == 0 {
            self.report(ctx.render, ctx.time.frame_index);
        }
        control
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = RuntimeConfig {
        title: "tilescape demo".to_string(),
        ..RuntimeConfig::default()
    };
    Runtime::run(config, GpuInit::default(), Demo::default())
}
