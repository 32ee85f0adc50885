//! Chrome windows that occlude each other without overdraw.
//!
//! Chrome children are visited topmost (last) first: each draws only where
//! no window above it has, then stamps its bounds into the stencil.
//! Ordinary children draw afterwards without stencil, in child order.

use crate::context::{RenderContext, CHROME_STENCIL};
use crate::device::{GpuBackend, Program, StencilOp, StencilState};
use crate::paint::Color;

use super::batcher::BatchTexture;
use super::node::{NodeId, NodeTag};
use super::pipeline::{flat_quad, render_children, render_node};
use super::SceneGraph;

pub(crate) fn render_window_layer<B: GpuBackend>(
    ctx: &mut RenderContext<B>,
    graph: &mut SceneGraph,
    id: NodeId,
) {
    ctx.flush();
    if ctx.stencil_level != 0 {
        // Chrome stamps would clobber the enclosing mask levels.
        log::debug!("window layer {id:?} inside a mask; drawing children unclipped");
        return render_children(ctx, graph, id);
    }

    ctx.binder.clear_stencil();
    ctx.window_clip = true;

    let count = graph.node(id).map_or(0, |n| n.children.len());
    for i in (0..count).rev() {
        let Some(child) = graph.node(id).and_then(|n| n.children.get(i).copied()) else {
            continue;
        };
        let Some(node) = graph.node(child) else {
            continue;
        };
        if node.tag != NodeTag::Chrome || !node.visible || node.masker_count > 0 {
            continue;
        }
        ctx.binder.set_stencil(StencilState::TestEqual(0));
        render_node(ctx, graph, child);
        ctx.flush();

        let bounds = graph.world_bounds(child, &ctx.textures);
        if bounds.is_empty() {
            continue;
        }
        ctx.binder.set_stencil(StencilState::Write {
            reference: CHROME_STENCIL,
            op: StencilOp::Replace,
        });
        ctx.push_quad(BatchTexture::Flat, Program::Textured, flat_quad(bounds, Color::TRANSPARENT));
        ctx.flush();
    }

    ctx.window_clip = false;
    ctx.binder.set_stencil(StencilState::Disabled);
    ctx.binder.clear_stencil();

    let mut i = 0;
    while let Some(child) = graph.node(id).and_then(|n| n.children.get(i).copied()) {
        i += 1;
        let ordinary = graph
            .node(child)
            .is_some_and(|n| n.tag == NodeTag::Ordinary && n.masker_count == 0);
        if ordinary {
            render_node(ctx, graph, child);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::coords::Viewport;
    use crate::device::recording::{Call, RecordingBackend};
    use crate::device::{StencilOp, StencilState};
    use crate::paint::Color;
    use crate::context::{RenderContext, CHROME_STENCIL};
    use crate::resource::ImageData;
    use crate::scene::{render_scene, Fill, NodeContent, NodeId, NodeTag, SceneGraph, Sprite};

    fn window(graph: &mut SceneGraph, layer: NodeId, x: f32, tag: NodeTag) -> NodeId {
        let id = graph.create_node(NodeContent::Fill(Fill::new(100.0, 80.0, Color::WHITE)));
        graph.set_position(id, x, 0.0);
        graph.set_tag(id, tag);
        graph.add_child(layer, id);
        id
    }

    fn setup() -> (RenderContext<RecordingBackend>, SceneGraph, NodeId, NodeId) {
        let ctx = RenderContext::new(RecordingBackend::new(), Viewport::new(320.0, 240.0));
        let mut graph = SceneGraph::new();
        let root = graph.create_node(NodeContent::Container);
        let layer = graph.create_node(NodeContent::WindowLayer);
        graph.add_child(root, layer);
        (ctx, graph, root, layer)
    }

    #[test]
    fn chrome_windows_test_then_stamp_their_bounds() {
        let (mut ctx, mut graph, root, layer) = setup();
        window(&mut graph, layer, 0.0, NodeTag::Chrome);
        window(&mut graph, layer, 50.0, NodeTag::Chrome);

        render_scene(&mut ctx, &mut graph, root);

        let stencil: Vec<_> = ctx
            .backend()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::SetStencil(s) => Some(*s),
                _ => None,
            })
            .collect();
        let stamp = StencilState::Write {
            reference: CHROME_STENCIL,
            op: StencilOp::Replace,
        };
        assert_eq!(
            stencil,
            vec![
                StencilState::Disabled,
                StencilState::TestEqual(0),
                stamp,
                StencilState::TestEqual(0),
                stamp,
                StencilState::Disabled,
            ]
        );
        // window + stamp per chrome child
        assert_eq!(ctx.backend().draws().len(), 4);
        assert!(!ctx.window_clip);
    }

    #[test]
    fn topmost_chrome_window_claims_the_overlap_first() {
        let (mut ctx, mut graph, root, layer) = setup();
        let lower = ctx.textures_mut().create_from_image(ImageData::filled(16, 16, [255; 4]));
        let upper = ctx.textures_mut().create_from_image(ImageData::filled(32, 32, [255; 4]));
        for texture in [lower, upper] {
            let id = graph.create_node(NodeContent::Sprite(Sprite::new(texture)));
            graph.set_tag(id, NodeTag::Chrome);
            graph.add_child(layer, id);
        }

        render_scene(&mut ctx, &mut graph, root);

        let calls = &ctx.backend().calls;
        let created = |w: u32| {
            calls
                .iter()
                .position(|c| matches!(c, Call::CreateTexture { width, .. } if *width == w))
                .unwrap()
        };
        let first_stamp = calls
            .iter()
            .position(|c| {
                *c == Call::SetStencil(StencilState::Write {
                    reference: CHROME_STENCIL,
                    op: StencilOp::Replace,
                })
            })
            .unwrap();
        // The last child draws and stamps before the first child is touched.
        assert!(created(32) < first_stamp);
        assert!(first_stamp < created(16));
    }

    #[test]
    fn ordinary_children_draw_after_the_stencil_is_cleared() {
        let (mut ctx, mut graph, root, layer) = setup();
        window(&mut graph, layer, 0.0, NodeTag::Ordinary);
        window(&mut graph, layer, 0.0, NodeTag::Chrome);

        render_scene(&mut ctx, &mut graph, root);

        let calls = &ctx.backend().calls;
        let last_clear = calls.iter().rposition(|c| *c == Call::ClearStencil).unwrap();
        let last_draw = calls.iter().rposition(|c| matches!(c, Call::Draw(_))).unwrap();
        assert!(last_clear < last_draw);
        assert_eq!(ctx.backend().count(|c| *c == Call::ClearStencil), 2);
        assert_eq!(ctx.backend().draws().len(), 3);
    }

    #[test]
    fn hidden_chrome_is_neither_drawn_nor_stamped() {
        let (mut ctx, mut graph, root, layer) = setup();
        let hidden = window(&mut graph, layer, 0.0, NodeTag::Chrome);
        graph.set_visible(hidden, false);

        render_scene(&mut ctx, &mut graph, root);

        assert!(ctx.backend().draws().is_empty());
    }

    #[test]
    fn window_layer_inside_a_mask_draws_unclipped() {
        let (mut ctx, mut graph, root, layer) = setup();
        let mask = graph.create_node(NodeContent::Fill(Fill::new(50.0, 50.0, Color::WHITE)));
        graph.set_mask(layer, Some(mask));
        window(&mut graph, layer, 0.0, NodeTag::Chrome);

        render_scene(&mut ctx, &mut graph, root);

        assert!(!ctx.backend().calls.contains(&Call::SetStencil(StencilState::Write {
            reference: CHROME_STENCIL,
            op: StencilOp::Replace,
        })));
        // increment shape, window, decrement shape
        assert_eq!(ctx.backend().draws().len(), 3);
    }
}
