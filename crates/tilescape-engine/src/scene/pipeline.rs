use crate::context::RenderContext;
use crate::coords::{Affine, Rect, Vec2};
use crate::device::{GpuBackend, Program, StencilOp, StencilState, Vertex, FLAT_PAGE};
use crate::paint::Color;
use crate::tilemap::TileLayerKind;

use super::batcher::BatchTexture;
use super::filter::FilterFrame;
use super::mask::StencilFrame;
use super::node::{sprite_size, Fill, NodeContent, NodeId, RenderMode, Sprite};
use super::window_layer::render_window_layer;
use super::SceneGraph;

/// How a call to [`render_scene`] ended.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FrameOutcome {
    Rendered,
    /// The context was lost; nothing was presented and every resource will
    /// be re-created on next use.
    Abandoned,
}

/// Renders the tree at `root` as one frame.
///
/// Transforms are brought up to date first. A context loss noticed before
/// or during the traversal abandons the frame.
pub fn render_scene<B: GpuBackend>(
    ctx: &mut RenderContext<B>,
    graph: &mut SceneGraph,
    root: NodeId,
) -> FrameOutcome {
    graph.update_transforms(root);

    if ctx.binder.is_context_lost() {
        ctx.handle_context_lost();
        if ctx.binder.is_context_lost() {
            return FrameOutcome::Abandoned;
        }
    }

    ctx.begin_frame();
    render_node(ctx, graph, root);
    ctx.flush();

    if ctx.binder.is_context_lost() {
        log::warn!("context lost mid-frame; frame abandoned");
        ctx.abandon_frame();
        ctx.handle_context_lost();
        ctx.end_frame();
        return FrameOutcome::Abandoned;
    }
    debug_assert!(ctx.filter_stack.is_empty() && ctx.stencil_stack.is_empty());
    ctx.end_frame();
    FrameOutcome::Rendered
}

pub(crate) fn render_node<B: GpuBackend>(ctx: &mut RenderContext<B>, graph: &mut SceneGraph, id: NodeId) {
    if ctx.binder.is_context_lost() {
        return;
    }
    let Some(node) = graph.node(id) else {
        return;
    };
    if !node.visible {
        return;
    }
    match node.mode {
        RenderMode::Plain => render_plain(ctx, graph, id),
        RenderMode::Filtered => render_filtered(ctx, graph, id),
        RenderMode::Masked => render_masked(ctx, graph, id),
    }
}

// ── modes ─────────────────────────────────────────────────────────────────

fn render_plain<B: GpuBackend>(ctx: &mut RenderContext<B>, graph: &mut SceneGraph, id: NodeId) {
    draw_content(ctx, graph, id, TileLayerKind::Lower);
    let is_window_layer = graph
        .node(id)
        .is_some_and(|n| matches!(n.content, NodeContent::WindowLayer));
    if is_window_layer {
        render_window_layer(ctx, graph, id);
    } else {
        render_children(ctx, graph, id);
    }
    draw_content(ctx, graph, id, TileLayerKind::Upper);
}

/// Offscreen pass through the node's filters; a mask, if any, clips inside.
fn render_filtered<B: GpuBackend>(ctx: &mut RenderContext<B>, graph: &mut SceneGraph, id: NodeId) {
    filter_pass(ctx, graph, id, render_masked_or_plain);
}

/// Stencil clip to the mask's shape; filters, if any, apply inside.
fn render_masked<B: GpuBackend>(ctx: &mut RenderContext<B>, graph: &mut SceneGraph, id: NodeId) {
    let Some(mask) = graph.node(id).and_then(|n| n.mask) else {
        return render_plain(ctx, graph, id);
    };
    push_mask(ctx, graph, mask);
    if graph.node(id).is_some_and(|n| !n.filters.is_empty()) {
        filter_pass(ctx, graph, id, render_plain);
    } else {
        render_plain(ctx, graph, id);
    }
    pop_mask(ctx, graph);
}

fn render_masked_or_plain<B: GpuBackend>(ctx: &mut RenderContext<B>, graph: &mut SceneGraph, id: NodeId) {
    match graph.node(id).and_then(|n| n.mask) {
        Some(mask) => {
            push_mask(ctx, graph, mask);
            render_plain(ctx, graph, id);
            pop_mask(ctx, graph);
        }
        None => render_plain(ctx, graph, id),
    }
}

type Body<B> = fn(&mut RenderContext<B>, &mut SceneGraph, NodeId);

/// Renders `body` into a filter target and composites it back through the
/// node's filter programs. Falls back to drawing `body` unfiltered when no
/// target can be had.
fn filter_pass<B: GpuBackend>(
    ctx: &mut RenderContext<B>,
    graph: &mut SceneGraph,
    id: NodeId,
    body: Body<B>,
) {
    let Some(area) = filter_area(ctx, graph, id) else {
        return;
    };
    ctx.flush();
    if !push_filter(ctx, area) {
        log::debug!("filter target unavailable; drawing {id:?} unfiltered");
        return body(ctx, graph, id);
    }
    body(ctx, graph, id);

    let mut programs = std::mem::take(&mut ctx.programs);
    programs.clear();
    if let Some(node) = graph.node(id) {
        for filter in &node.filters {
            programs.extend((0..filter.passes()).map(|pass| filter.program(pass)));
        }
    }
    pop_filter(ctx, &programs);
    ctx.programs = programs;
}

pub(crate) fn render_children<B: GpuBackend>(
    ctx: &mut RenderContext<B>,
    graph: &mut SceneGraph,
    id: NodeId,
) {
    let mut i = 0;
    while let Some(child) = graph.node(id).and_then(|n| n.children.get(i).copied()) {
        i += 1;
        if graph.node(child).is_some_and(|c| c.masker_count > 0) {
            continue;
        }
        render_node(ctx, graph, child);
    }
}

// ── filters ───────────────────────────────────────────────────────────────

/// Explicit or computed area, padded, snapped and clipped to the current
/// target. `None` when nothing of it is visible.
fn filter_area<B: GpuBackend>(ctx: &RenderContext<B>, graph: &SceneGraph, id: NodeId) -> Option<Rect> {
    let node = graph.node(id)?;
    let padding = node.filters.iter().map(|f| f.padding()).fold(0.0, f32::max);
    let area = match node.filter_area {
        Some(area) => area,
        None => graph.world_bounds(id, &ctx.textures),
    };
    if area.is_empty() {
        return None;
    }
    area.pad(padding).snap_outward().intersect(ctx.target.1)
}

fn push_filter<B: GpuBackend>(ctx: &mut RenderContext<B>, area: Rect) -> bool {
    let target = ctx.filter_targets.acquire(area.size.x, area.size.y);
    let Some(storage) = ctx
        .filter_targets
        .ensure_storage(target, &mut ctx.binder, &mut ctx.diagnostics)
    else {
        if let Err(err) = ctx.filter_targets.release(target) {
            ctx.diagnostics.report(err);
        }
        return false;
    };

    let mut frame = ctx.pools.acquire::<FilterFrame>();
    frame.target = Some(target);
    frame.storage = Some(storage);
    frame.area = area;
    frame.previous = ctx.target;
    frame.previous_stencil = ctx.stencil_level;
    frame.previous_window_clip = ctx.window_clip;
    ctx.filter_stack.push(frame);

    ctx.stencil_level = 0;
    ctx.window_clip = false;
    ctx.set_target(Some(storage.framebuffer), area);
    ctx.binder.clear_color(Color::TRANSPARENT);
    ctx.binder.clear_stencil();
    ctx.binder.set_stencil(StencilState::Disabled);
    true
}

/// Runs `programs` over the filtered rendering and composites the result
/// into the previous target. Passes ping-pong between two targets.
fn pop_filter<B: GpuBackend>(ctx: &mut RenderContext<B>, programs: &[Program]) {
    ctx.flush();
    let Some(mut frame) = ctx.filter_stack.pop() else {
        return;
    };
    let (Some(mut input_id), Some(mut input)) = (frame.target.take(), frame.storage.take()) else {
        ctx.pools.release(frame);
        return;
    };
    let area = frame.area;

    let mut spare = None;
    let passes = programs.len().max(1);
    for pass in 0..passes {
        let program = programs.get(pass).copied().unwrap_or(Program::Textured);
        let mut last = pass + 1 == passes;
        if !last && spare.is_none() {
            let id = ctx.filter_targets.acquire(area.size.x, area.size.y);
            match ctx
                .filter_targets
                .ensure_storage(id, &mut ctx.binder, &mut ctx.diagnostics)
            {
                Some(storage) => spare = Some((id, storage)),
                None => {
                    release_filter_target(ctx, id);
                    last = true;
                }
            }
        }

        if last {
            ctx.stencil_level = frame.previous_stencil;
            ctx.window_clip = frame.previous_window_clip;
            ctx.set_target(frame.previous.0, frame.previous.1);
            ctx.binder.set_stencil(ctx.content_stencil());
        } else if let Some((_, out)) = spare {
            ctx.set_target(Some(out.framebuffer), area);
            ctx.binder.clear_color(Color::TRANSPARENT);
        }

        let quad = Vertex::quad(
            [area.origin.x, area.origin.y, area.size.x, area.size.y],
            [0.0, 0.0, area.size.x, area.size.y],
            Color::WHITE.to_array(),
            0.0,
        );
        ctx.push_quad(BatchTexture::Raw(input.texture), program, quad);
        ctx.flush();

        if last {
            break;
        }
        if let Some((out_id, out)) = spare.take() {
            spare = Some((input_id, input));
            input_id = out_id;
            input = out;
        }
    }

    release_filter_target(ctx, input_id);
    if let Some((id, _)) = spare {
        release_filter_target(ctx, id);
    }
    ctx.pools.release(frame);
}

fn release_filter_target<B: GpuBackend>(ctx: &mut RenderContext<B>, id: crate::resource::RenderTargetId) {
    if let Err(err) = ctx.filter_targets.release(id) {
        ctx.diagnostics.report(err);
    }
}

// ── masks ─────────────────────────────────────────────────────────────────

fn push_mask<B: GpuBackend>(ctx: &mut RenderContext<B>, graph: &mut SceneGraph, mask: NodeId) {
    ctx.flush();
    let level = ctx.stencil_level;
    graph.update_transforms(mask);
    ctx.binder.set_stencil(StencilState::Write {
        reference: level,
        op: StencilOp::Increment,
    });
    draw_shape(ctx, graph, mask);
    ctx.flush();

    let mut frame = ctx.pools.acquire::<StencilFrame>();
    frame.mask = mask;
    frame.level = level + 1;
    ctx.stencil_stack.push(frame);
    ctx.stencil_level = level + 1;
    ctx.binder.set_stencil(ctx.content_stencil());
}

fn pop_mask<B: GpuBackend>(ctx: &mut RenderContext<B>, graph: &mut SceneGraph) {
    ctx.flush();
    let Some(frame) = ctx.stencil_stack.pop() else {
        return;
    };
    ctx.binder.set_stencil(StencilState::Write {
        reference: frame.level,
        op: StencilOp::Decrement,
    });
    draw_shape(ctx, graph, frame.mask);
    ctx.flush();

    ctx.stencil_level = frame.level.saturating_sub(1);
    ctx.binder.set_stencil(ctx.content_stencil());
    ctx.pools.release(frame);
}

/// Draws a mask's content and its subtree's content, ignoring modes. The
/// mask's own visibility is ignored; hidden descendants are skipped.
fn draw_shape<B: GpuBackend>(ctx: &mut RenderContext<B>, graph: &mut SceneGraph, id: NodeId) {
    draw_content(ctx, graph, id, TileLayerKind::Lower);
    let mut i = 0;
    while let Some(child) = graph.node(id).and_then(|n| n.children.get(i).copied()) {
        i += 1;
        if graph.node(child).is_some_and(|c| c.visible) {
            draw_shape(ctx, graph, child);
        }
    }
    draw_content(ctx, graph, id, TileLayerKind::Upper);
}

// ── content ───────────────────────────────────────────────────────────────

fn draw_content<B: GpuBackend>(
    ctx: &mut RenderContext<B>,
    graph: &mut SceneGraph,
    id: NodeId,
    layer: TileLayerKind,
) {
    let Some(node) = graph.node_mut(id) else {
        return;
    };
    let world = node.world;
    match (&mut node.content, layer) {
        (NodeContent::Sprite(sprite), TileLayerKind::Lower) => {
            let sprite = *sprite;
            draw_sprite(ctx, world, &sprite);
        }
        (NodeContent::Fill(fill), TileLayerKind::Lower) => {
            let fill = *fill;
            draw_fill(ctx, world, &fill);
        }
        (NodeContent::Tilemap(tilemap), _) => {
            ctx.flush();
            if layer == TileLayerKind::Lower {
                tilemap.prepare(&mut ctx.diagnostics);
            }
            let origin = Vec2::new(world.tx, world.ty);
            tilemap.draw(layer, origin, &mut ctx.binder, &mut ctx.textures, &mut ctx.diagnostics);
        }
        _ => {}
    }
}

fn draw_sprite<B: GpuBackend>(ctx: &mut RenderContext<B>, world: Affine, sprite: &Sprite) {
    let Some(texture) = sprite.texture else {
        return;
    };
    let textures = &ctx.textures;
    let Some(size) = sprite_size(sprite, |t| textures.get(t).map(|t| (t.width(), t.height()))) else {
        return;
    };
    let src = match sprite.frame {
        Some(f) => [f.origin.x, f.origin.y, f.size.x, f.size.y],
        None => [0.0, 0.0, size.x, size.y],
    };
    let local = Rect::new(
        -sprite.anchor.x * size.x,
        -sprite.anchor.y * size.y,
        size.x,
        size.y,
    );
    let quad = Vertex::quad_corners(corners(world, local), src, sprite.tint.to_array(), 0.0);
    ctx.push_quad(BatchTexture::Texture(texture), Program::Textured, quad);
}

fn draw_fill<B: GpuBackend>(ctx: &mut RenderContext<B>, world: Affine, fill: &Fill) {
    let local = Rect::new(0.0, 0.0, fill.size.x, fill.size.y);
    if local.is_empty() {
        return;
    }
    let quad = Vertex::quad_corners(corners(world, local), [0.0; 4], fill.color.to_array(), FLAT_PAGE);
    ctx.push_quad(BatchTexture::Flat, Program::Textured, quad);
}

/// Flat quad over a scene-space rectangle.
pub(crate) fn flat_quad(rect: Rect, color: Color) -> [Vertex; 4] {
    Vertex::quad(
        [rect.origin.x, rect.origin.y, rect.size.x, rect.size.y],
        [0.0; 4],
        color.to_array(),
        FLAT_PAGE,
    )
}

/// Top-left, top-right, bottom-left, bottom-right after `world`.
fn corners(world: Affine, local: Rect) -> [[f32; 2]; 4] {
    let (min, max) = (local.min(), local.max());
    [
        Vec2::new(min.x, min.y),
        Vec2::new(max.x, min.y),
        Vec2::new(min.x, max.y),
        Vec2::new(max.x, max.y),
    ]
    .map(|p| {
        let q = world.apply(p);
        [q.x, q.y]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Viewport;
    use crate::device::recording::{Call, RecordingBackend};
    use crate::resource::ImageData;
    use crate::scene::{BlurFilter, ColorMatrixFilter, Filter};

    fn setup() -> (RenderContext<RecordingBackend>, SceneGraph, NodeId) {
        let ctx = RenderContext::new(RecordingBackend::new(), Viewport::new(320.0, 240.0));
        let mut graph = SceneGraph::new();
        let root = graph.create_node(NodeContent::Container);
        (ctx, graph, root)
    }

    fn fill(graph: &mut SceneGraph, parent: NodeId, w: f32, h: f32) -> NodeId {
        let id = graph.create_node(NodeContent::Fill(Fill::new(w, h, Color::WHITE)));
        graph.add_child(parent, id);
        id
    }

    fn stencil_calls(ctx: &RenderContext<RecordingBackend>) -> Vec<StencilState> {
        ctx.backend()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::SetStencil(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    // ── plain ─────────────────────────────────────────────────────────────

    #[test]
    fn sprites_sharing_a_texture_draw_once() {
        let (mut ctx, mut graph, root) = setup();
        let tex = ctx.textures_mut().create_from_image(ImageData::filled(16, 16, [255; 4]));
        for i in 0..5 {
            let s = graph.create_node(NodeContent::Sprite(Sprite::new(tex)));
            graph.add_child(root, s);
            graph.set_position(s, i as f32 * 20.0, 0.0);
        }

        assert_eq!(render_scene(&mut ctx, &mut graph, root), FrameOutcome::Rendered);

        assert_eq!(ctx.backend().draws().len(), 1);
        assert_eq!(ctx.backend().draws()[0].indices, 0..30);
        assert_eq!(ctx.batcher().stats().quads, 5);
    }

    #[test]
    fn hidden_nodes_and_masks_are_not_drawn_as_children() {
        let (mut ctx, mut graph, root) = setup();
        let hidden = fill(&mut graph, root, 10.0, 10.0);
        graph.set_visible(hidden, false);
        let mask = fill(&mut graph, root, 10.0, 10.0);
        let masked = fill(&mut graph, root, 10.0, 10.0);
        graph.set_mask(masked, Some(mask));

        render_scene(&mut ctx, &mut graph, root);

        // masked node: increment shape, content, decrement shape.
        assert_eq!(ctx.batcher().stats().quads, 3);
    }

    #[test]
    fn frame_starts_with_clear_on_screen() {
        let (mut ctx, mut graph, root) = setup();
        render_scene(&mut ctx, &mut graph, root);
        let calls = &ctx.backend().calls;
        assert_eq!(calls[0], Call::BeginFrame(Viewport::new(320.0, 240.0)));
        assert!(calls.contains(&Call::ClearColor(Color::BLACK)));
        assert_eq!(calls.last(), Some(&Call::EndFrame));
    }

    // ── masks ─────────────────────────────────────────────────────────────

    #[test]
    fn mask_pushes_increment_tests_then_decrements() {
        let (mut ctx, mut graph, root) = setup();
        let mask = graph.create_node(NodeContent::Fill(Fill::new(50.0, 50.0, Color::WHITE)));
        let content = fill(&mut graph, root, 100.0, 100.0);
        graph.set_mask(content, Some(mask));

        render_scene(&mut ctx, &mut graph, root);

        assert_eq!(
            stencil_calls(&ctx),
            vec![
                StencilState::Disabled,
                StencilState::Write { reference: 0, op: StencilOp::Increment },
                StencilState::TestEqual(1),
                StencilState::Write { reference: 1, op: StencilOp::Decrement },
                StencilState::Disabled,
            ]
        );
        assert_eq!(ctx.backend().draws().len(), 3);
        assert!(ctx.stencil_stack.is_empty());
    }

    #[test]
    fn nested_masks_stack_levels() {
        let (mut ctx, mut graph, root) = setup();
        let outer_mask = graph.create_node(NodeContent::Fill(Fill::new(50.0, 50.0, Color::WHITE)));
        let inner_mask = graph.create_node(NodeContent::Fill(Fill::new(20.0, 20.0, Color::WHITE)));
        let outer = graph.create_node(NodeContent::Container);
        graph.add_child(root, outer);
        let inner = fill(&mut graph, outer, 100.0, 100.0);
        graph.set_mask(outer, Some(outer_mask));
        graph.set_mask(inner, Some(inner_mask));

        render_scene(&mut ctx, &mut graph, root);

        let calls = stencil_calls(&ctx);
        assert!(calls.contains(&StencilState::Write { reference: 1, op: StencilOp::Increment }));
        assert!(calls.contains(&StencilState::TestEqual(2)));
        assert!(calls.contains(&StencilState::Write { reference: 2, op: StencilOp::Decrement }));
        assert_eq!(calls.last(), Some(&StencilState::Disabled));
        let pool = ctx.pools().stats::<StencilFrame>().unwrap();
        assert_eq!((pool.created, pool.outstanding), (2, 0));
    }

    // ── filters ───────────────────────────────────────────────────────────

    #[test]
    fn filtered_node_renders_offscreen_and_composites() {
        let (mut ctx, mut graph, root) = setup();
        let node = fill(&mut graph, root, 40.0, 30.0);
        graph.set_position(node, 10.0, 10.0);
        let filter = ColorMatrixFilter::acquire(ctx.pools_mut());
        graph.add_filter(node, filter).unwrap();

        render_scene(&mut ctx, &mut graph, root);

        let calls = &ctx.backend().calls;
        let fb = calls
            .iter()
            .find_map(|c| match c {
                Call::CreateFramebuffer { framebuffer, width, height, .. } => {
                    Some((*framebuffer, *width, *height))
                }
                _ => None,
            })
            .unwrap();
        // 40x30 rounds up to a 64x32 bucket.
        assert_eq!((fb.1, fb.2), (64, 32));
        assert!(calls.contains(&Call::BindFramebuffer {
            framebuffer: Some(fb.0),
            area: Rect::new(10.0, 10.0, 40.0, 30.0),
        }));
        assert!(calls.contains(&Call::SetProgram(Program::ColorMatrix(
            ColorMatrixFilter::default().matrix
        ))));
        assert_eq!(ctx.backend().draws().len(), 2);
        assert_eq!(ctx.filter_targets().targets().free_len(), 1);
        assert!(ctx.filter_stack.is_empty());
    }

    #[test]
    fn two_pass_filter_ping_pongs_targets() {
        let (mut ctx, mut graph, root) = setup();
        let node = fill(&mut graph, root, 20.0, 20.0);
        graph.set_position(node, 50.0, 50.0);
        let blur = BlurFilter::acquire(ctx.pools_mut());
        graph.add_filter(node, blur).unwrap();

        render_scene(&mut ctx, &mut graph, root);

        let backend = ctx.backend();
        assert_eq!(backend.count(|c| matches!(c, Call::CreateFramebuffer { .. })), 2);
        // content, horizontal pass, vertical composite
        assert_eq!(backend.draws().len(), 3);
        assert_eq!(ctx.filter_targets().targets().free_len(), 2);

        // Second frame reuses both targets.
        ctx.backend_mut().take();
        render_scene(&mut ctx, &mut graph, root);
        assert_eq!(ctx.backend().count(|c| matches!(c, Call::CreateFramebuffer { .. })), 0);
    }

    #[test]
    fn filter_area_off_screen_skips_the_node() {
        let (mut ctx, mut graph, root) = setup();
        let node = fill(&mut graph, root, 20.0, 20.0);
        graph.set_position(node, 1000.0, 1000.0);
        let filter: Box<dyn Filter> = ColorMatrixFilter::acquire(ctx.pools_mut());
        graph.add_filter(node, filter).unwrap();

        render_scene(&mut ctx, &mut graph, root);

        assert!(ctx.backend().draws().is_empty());
    }

    #[test]
    fn filter_allocation_failure_falls_back_to_plain() {
        let (mut ctx, mut graph, root) = setup();
        let node = fill(&mut graph, root, 20.0, 20.0);
        let filter = ColorMatrixFilter::acquire(ctx.pools_mut());
        graph.add_filter(node, filter).unwrap();
        ctx.backend_mut().max_texture_size = 8;

        assert_eq!(render_scene(&mut ctx, &mut graph, root), FrameOutcome::Rendered);

        assert_eq!(ctx.backend().draws().len(), 1);
        assert_eq!(ctx.diagnostics().counts().allocation_failures, 1);
        assert_eq!(ctx.filter_targets().targets().free_len(), 1);
    }

    #[test]
    fn masked_content_inside_filter_composites_under_outer_mask() {
        let (mut ctx, mut graph, root) = setup();
        let mask = graph.create_node(NodeContent::Fill(Fill::new(100.0, 100.0, Color::WHITE)));
        let group = graph.create_node(NodeContent::Container);
        graph.add_child(root, group);
        graph.set_mask(group, Some(mask));
        let filtered = fill(&mut graph, group, 20.0, 20.0);
        let filter = ColorMatrixFilter::acquire(ctx.pools_mut());
        graph.add_filter(filtered, filter).unwrap();

        render_scene(&mut ctx, &mut graph, root);

        assert_eq!(
            stencil_calls(&ctx),
            vec![
                StencilState::Disabled,
                StencilState::Write { reference: 0, op: StencilOp::Increment },
                StencilState::TestEqual(1),
                // offscreen content ignores the outer stencil
                StencilState::Disabled,
                // the composite is clipped by it
                StencilState::TestEqual(1),
                StencilState::Write { reference: 1, op: StencilOp::Decrement },
                StencilState::Disabled,
            ]
        );
        assert!(ctx.stencil_stack.is_empty());
    }

    // ── context loss ──────────────────────────────────────────────────────

    #[test]
    fn loss_before_the_frame_is_recovered() {
        let (mut ctx, mut graph, root) = setup();
        fill(&mut graph, root, 10.0, 10.0);
        render_scene(&mut ctx, &mut graph, root);
        ctx.backend_mut().lost = true;

        // The recording backend recovers as soon as resources are forgotten.
        assert_eq!(render_scene(&mut ctx, &mut graph, root), FrameOutcome::Rendered);
        assert_eq!(ctx.diagnostics().counts().context_losses, 1);
        assert_eq!(ctx.binder().generation(), 1);
    }

    #[test]
    fn abandoning_a_frame_returns_leased_filter_targets() {
        let (mut ctx, mut graph, root) = setup();
        fill(&mut graph, root, 10.0, 10.0);
        ctx.begin_frame();
        assert!(push_filter(&mut ctx, Rect::new(0.0, 0.0, 32.0, 32.0)));
        ctx.backend_mut().lost = true;

        render_node(&mut ctx, &mut graph, root);
        ctx.abandon_frame();

        assert!(ctx.backend().draws().is_empty());
        assert!(ctx.filter_stack.is_empty());
        assert_eq!(ctx.filter_targets().targets().free_len(), 1);
        assert_eq!(ctx.pools().stats::<FilterFrame>().unwrap().outstanding, 0);
    }
}
