use slotmap::SlotMap;

use crate::coords::{Affine, Rect, Vec2};
use crate::pool::PoolRegistry;
use crate::resource::TextureStore;
use crate::tilemap::TileRenderer;

use super::filter::Filter;
use super::node::{NodeContent, NodeId, NodeTag, RenderMode, SceneNode, Transform, STALE_EPOCH};

/// Transform work done by [`SceneGraph::update_transforms`].
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct TransformStats {
    pub local_recomputes: u64,
    pub world_recomputes: u64,
}

/// Retained node tree.
///
/// Nodes live in an arena and refer to each other by [`NodeId`]; a node
/// belongs to at most one parent. Filter and mask mutators switch the
/// node's [`RenderMode`] immediately.
#[derive(Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeId, SceneNode>,
    transform_stats: TransformStats,
    walk: Vec<NodeId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_node(&mut self, content: NodeContent) -> NodeId {
        self.nodes.insert(SceneNode::new(content))
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn mode(&self, id: NodeId) -> Option<RenderMode> {
        self.nodes.get(id).map(|n| n.mode)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id)
    }

    // ── hierarchy ─────────────────────────────────────────────────────────

    /// Appends `child` to `parent`, detaching it from any previous parent.
    /// Returns `false` if either id is unknown or the link would form a
    /// cycle.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if parent == child
            || !self.nodes.contains_key(parent)
            || !self.nodes.contains_key(child)
            || self.is_ancestor(child, parent)
        {
            return false;
        }
        self.detach(child);
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
            c.parent_world_seen = STALE_EPOCH;
        }
        true
    }

    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.nodes.get(child).and_then(|c| c.parent) != Some(parent) {
            return false;
        }
        self.detach(child);
        true
    }

    fn detach(&mut self, child: NodeId) {
        let Some(parent) = self.nodes.get_mut(child).and_then(|c| c.parent.take()) else {
            return;
        };
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent_world_seen = STALE_EPOCH;
        }
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|&id| id != child);
        }
    }

    fn is_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        while let Some(parent) = self.nodes.get(node).and_then(|n| n.parent) {
            if parent == ancestor {
                return true;
            }
            node = parent;
        }
        false
    }

    /// Destroys `id` and its subtree.
    ///
    /// Filters go back to their pools, tilemap geometry is recycled, masks
    /// used by destroyed nodes lose a masker, and nodes masked by a
    /// destroyed node drop their mask.
    pub fn destroy_node(&mut self, id: NodeId, pools: &mut PoolRegistry) {
        if !self.nodes.contains_key(id) {
            return;
        }
        self.detach(id);

        let mut doomed = std::mem::take(&mut self.walk);
        doomed.clear();
        doomed.push(id);
        let mut i = 0;
        while i < doomed.len() {
            if let Some(n) = self.nodes.get(doomed[i]) {
                doomed.extend_from_slice(&n.children);
            }
            i += 1;
        }

        for &dead in &doomed {
            let Some(mut node) = self.nodes.remove(dead) else {
                continue;
            };
            for filter in node.filters.drain(..) {
                filter.recycle(pools);
            }
            if let Some(mask) = node.mask {
                if let Some(m) = self.nodes.get_mut(mask) {
                    m.masker_count = m.masker_count.saturating_sub(1);
                }
            }
            if node.masker_count > 0 {
                self.cancel_maskers(dead);
            }
            if let NodeContent::Tilemap(tilemap) = node.content {
                tilemap.recycle(pools);
            }
        }
        doomed.clear();
        self.walk = doomed;
    }

    fn cancel_maskers(&mut self, mask: NodeId) {
        for node in self.nodes.values_mut() {
            if node.mask == Some(mask) {
                node.mask = None;
                node.mode = mode_without_mask(node);
            }
        }
    }

    // ── filters ───────────────────────────────────────────────────────────

    pub fn add_filter(&mut self, id: NodeId, filter: Box<dyn Filter>) -> Result<(), Box<dyn Filter>> {
        let Some(node) = self.nodes.get_mut(id) else {
            return Err(filter);
        };
        node.filters.push(filter);
        node.mode = RenderMode::Filtered;
        Ok(())
    }

    /// Removes the filter at `index` and returns it to its pool.
    pub fn remove_filter(&mut self, id: NodeId, index: usize, pools: &mut PoolRegistry) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        if index >= node.filters.len() {
            return false;
        }
        node.filters.remove(index).recycle(pools);
        if node.filters.is_empty() {
            leave_filtered(node);
        }
        true
    }

    pub fn clear_filters(&mut self, id: NodeId, pools: &mut PoolRegistry) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        for filter in node.filters.drain(..) {
            filter.recycle(pools);
        }
        leave_filtered(node);
    }

    /// Fixes the filtered area instead of computing it from bounds.
    pub fn set_filter_area(&mut self, id: NodeId, area: Option<Rect>) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.filter_area = area;
        }
    }

    // ── masks ─────────────────────────────────────────────────────────────

    /// Clips `id` to the shape of `mask`. The mask is referenced, not owned.
    pub fn set_mask(&mut self, id: NodeId, mask: Option<NodeId>) -> bool {
        if mask.is_some_and(|m| m == id || !self.nodes.contains_key(m)) {
            return false;
        }
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        let previous = std::mem::replace(&mut node.mask, mask);
        node.mode = match mask {
            Some(_) => RenderMode::Masked,
            None => mode_without_mask(node),
        };
        if let Some(m) = previous.and_then(|p| self.nodes.get_mut(p)) {
            m.masker_count = m.masker_count.saturating_sub(1);
        }
        if let Some(m) = mask.and_then(|m| self.nodes.get_mut(m)) {
            m.masker_count += 1;
        }
        true
    }

    // ── properties ────────────────────────────────────────────────────────

    pub fn set_position(&mut self, id: NodeId, x: f32, y: f32) {
        self.edit_transform(id, |t| t.position = Vec2::new(x, y));
    }

    pub fn set_scale(&mut self, id: NodeId, x: f32, y: f32) {
        self.edit_transform(id, |t| t.scale = Vec2::new(x, y));
    }

    pub fn set_rotation(&mut self, id: NodeId, radians: f32) {
        self.edit_transform(id, |t| t.rotation = radians);
    }

    pub fn set_skew(&mut self, id: NodeId, x: f32, y: f32) {
        self.edit_transform(id, |t| t.skew = Vec2::new(x, y));
    }

    pub fn set_pivot(&mut self, id: NodeId, x: f32, y: f32) {
        self.edit_transform(id, |t| t.pivot = Vec2::new(x, y));
    }

    fn edit_transform(&mut self, id: NodeId, edit: impl FnOnce(&mut Transform)) {
        if let Some(node) = self.nodes.get_mut(id) {
            edit(&mut node.transform);
            node.local_epoch += 1;
        }
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.visible = visible;
        }
    }

    pub fn set_tag(&mut self, id: NodeId, tag: NodeTag) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.tag = tag;
        }
    }

    /// Replaces the node's content; a replaced tilemap is recycled.
    pub fn set_content(&mut self, id: NodeId, content: NodeContent, pools: &mut PoolRegistry) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if let NodeContent::Tilemap(old) = std::mem::replace(&mut node.content, content) {
            old.recycle(pools);
        }
    }

    pub fn content_mut(&mut self, id: NodeId) -> Option<&mut NodeContent> {
        self.nodes.get_mut(id).map(|n| &mut n.content)
    }

    pub fn tilemap_mut(&mut self, id: NodeId) -> Option<&mut TileRenderer> {
        self.content_mut(id).and_then(NodeContent::as_tilemap_mut)
    }

    // ── transforms ────────────────────────────────────────────────────────

    #[inline]
    pub fn transform_stats(&self) -> TransformStats {
        self.transform_stats
    }

    pub fn reset_transform_stats(&mut self) {
        self.transform_stats = TransformStats::default();
    }

    /// Brings world matrices of `root`'s subtree up to date.
    ///
    /// A local matrix is rebuilt only when its epoch moved; a world matrix
    /// only when the parent's world epoch differs from the one it was built
    /// against. Invisible subtrees are updated too since masks are often
    /// hidden.
    pub fn update_transforms(&mut self, root: NodeId) {
        let (parent_world, parent_epoch) = match self.nodes.get(root).and_then(|n| n.parent) {
            Some(p) => self.nodes.get(p).map_or((Affine::IDENTITY, 0), |p| (p.world, p.world_epoch)),
            None => (Affine::IDENTITY, 0),
        };

        let mut stack = std::mem::take(&mut self.walk);
        stack.clear();
        self.update_one(root, parent_world, parent_epoch);
        stack.push(root);

        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            let (world, epoch) = (node.world, node.world_epoch);
            let first = stack.len();
            stack.extend_from_slice(&node.children);
            for i in first..stack.len() {
                self.update_one(stack[i], world, epoch);
            }
        }
        self.walk = stack;
    }

    fn update_one(&mut self, id: NodeId, parent_world: Affine, parent_epoch: u64) {
        let Some(node) = self.nodes.get_mut(id) else {
            return;
        };
        if node.local_built != node.local_epoch {
            node.local = node.transform.to_affine();
            node.local_built = node.local_epoch;
            node.parent_world_seen = STALE_EPOCH;
            self.transform_stats.local_recomputes += 1;
        }
        if node.parent_world_seen != parent_epoch {
            node.world = parent_world.then(node.local);
            node.parent_world_seen = parent_epoch;
            node.world_epoch += 1;
            self.transform_stats.world_recomputes += 1;
        }
    }

    // ── bounds ────────────────────────────────────────────────────────────

    /// World bounds of the visible subtree at `id`.
    pub fn world_bounds(&self, id: NodeId, textures: &TextureStore) -> Rect {
        let texture_size = |t| textures.get(t).map(|t| (t.width(), t.height()));
        let mut bounds = Rect::EMPTY;
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            bounds = bounds.union(node.content_bounds(&texture_size));
            stack.extend(node.children.iter().copied());
        }
        bounds
    }
}

fn mode_without_mask(node: &SceneNode) -> RenderMode {
    if node.filters.is_empty() {
        RenderMode::Plain
    } else {
        RenderMode::Filtered
    }
}

/// Zero filters left: plain, even if a mask is still assigned.
fn leave_filtered(node: &mut SceneNode) {
    if node.mask.is_some() && node.mode != RenderMode::Plain {
        log::debug!("filters cleared on a masked node; mask ignored until reassigned");
    }
    node.mode = RenderMode::Plain;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::Color;
    use crate::scene::{ColorMatrixFilter, Fill};

    fn container(graph: &mut SceneGraph) -> NodeId {
        graph.create_node(NodeContent::Container)
    }

    fn filter(pools: &mut PoolRegistry) -> Box<dyn Filter> {
        ColorMatrixFilter::acquire(pools)
    }

    // ── hierarchy ─────────────────────────────────────────────────────────

    #[test]
    fn add_child_reparents() {
        let mut g = SceneGraph::new();
        let (a, b, c) = (container(&mut g), container(&mut g), container(&mut g));
        assert!(g.add_child(a, c));
        assert!(g.add_child(b, c));
        assert!(g.node(a).unwrap().children().is_empty());
        assert_eq!(g.node(b).unwrap().children(), &[c]);
        assert_eq!(g.node(c).unwrap().parent(), Some(b));
    }

    #[test]
    fn cycles_are_refused() {
        let mut g = SceneGraph::new();
        let (a, b) = (container(&mut g), container(&mut g));
        g.add_child(a, b);
        assert!(!g.add_child(b, a));
        assert!(!g.add_child(a, a));
    }

    #[test]
    fn destroy_is_recursive_and_recycles_filters() {
        let mut g = SceneGraph::new();
        let mut pools = PoolRegistry::new();
        let (root, child, grandchild) = (container(&mut g), container(&mut g), container(&mut g));
        g.add_child(root, child);
        g.add_child(child, grandchild);
        g.add_filter(grandchild, filter(&mut pools)).unwrap();

        g.destroy_node(child, &mut pools);

        assert!(!g.contains(child));
        assert!(!g.contains(grandchild));
        assert!(g.node(root).unwrap().children().is_empty());
        let stats = pools.stats::<Box<ColorMatrixFilter>>().unwrap();
        assert_eq!(stats.outstanding, 0);
        assert_eq!(pools.pool_mut::<Box<ColorMatrixFilter>>().free_len(), 1);
    }

    // ── modes ─────────────────────────────────────────────────────────────

    #[test]
    fn removing_last_filter_returns_to_plain_even_when_masked() {
        let mut g = SceneGraph::new();
        let mut pools = PoolRegistry::new();
        let (node, mask) = (container(&mut g), container(&mut g));

        g.set_mask(node, Some(mask));
        assert_eq!(g.mode(node), Some(RenderMode::Masked));
        g.add_filter(node, filter(&mut pools)).unwrap();
        assert_eq!(g.mode(node), Some(RenderMode::Filtered));
        assert!(g.remove_filter(node, 0, &mut pools));

        assert_eq!(g.mode(node), Some(RenderMode::Plain));
    }

    #[test]
    fn clearing_the_mask_falls_back_to_filters() {
        let mut g = SceneGraph::new();
        let mut pools = PoolRegistry::new();
        let (node, mask) = (container(&mut g), container(&mut g));
        g.add_filter(node, filter(&mut pools)).unwrap();
        g.set_mask(node, Some(mask));
        g.set_mask(node, None);
        assert_eq!(g.mode(node), Some(RenderMode::Filtered));

        g.clear_filters(node, &mut pools);
        assert_eq!(g.mode(node), Some(RenderMode::Plain));
    }

    #[test]
    fn mask_counts_follow_assignment() {
        let mut g = SceneGraph::new();
        let (a, b, m1, m2) = (container(&mut g), container(&mut g), container(&mut g), container(&mut g));
        g.set_mask(a, Some(m1));
        g.set_mask(b, Some(m1));
        assert_eq!(g.node(m1).unwrap().masker_count(), 2);

        g.set_mask(a, Some(m2));
        assert_eq!(g.node(m1).unwrap().masker_count(), 1);
        assert_eq!(g.node(m2).unwrap().masker_count(), 1);

        g.set_mask(b, None);
        assert_eq!(g.node(m1).unwrap().masker_count(), 0);
    }

    #[test]
    fn destroying_a_mask_cancels_its_maskers() {
        let mut g = SceneGraph::new();
        let mut pools = PoolRegistry::new();
        let (node, mask) = (container(&mut g), container(&mut g));
        g.set_mask(node, Some(mask));

        g.destroy_node(mask, &mut pools);

        assert_eq!(g.node(node).unwrap().mask(), None);
        assert_eq!(g.mode(node), Some(RenderMode::Plain));
    }

    #[test]
    fn destroying_a_masker_decrements_the_mask() {
        let mut g = SceneGraph::new();
        let mut pools = PoolRegistry::new();
        let (node, mask) = (container(&mut g), container(&mut g));
        g.set_mask(node, Some(mask));
        g.destroy_node(node, &mut pools);
        assert_eq!(g.node(mask).unwrap().masker_count(), 0);
    }

    // ── transforms ────────────────────────────────────────────────────────

    #[test]
    fn unchanged_tree_does_no_transform_work() {
        let mut g = SceneGraph::new();
        let root = container(&mut g);
        let child = container(&mut g);
        g.add_child(root, child);

        g.update_transforms(root);
        assert_eq!(g.transform_stats().world_recomputes, 2);
        g.reset_transform_stats();

        g.update_transforms(root);
        assert_eq!(g.transform_stats(), TransformStats::default());
    }

    #[test]
    fn parent_move_recomputes_world_only() {
        let mut g = SceneGraph::new();
        let root = container(&mut g);
        let (a, b) = (container(&mut g), container(&mut g));
        g.add_child(root, a);
        g.add_child(a, b);
        g.set_position(b, 5.0, 0.0);
        g.update_transforms(root);
        g.reset_transform_stats();

        g.set_position(a, 10.0, 20.0);
        g.update_transforms(root);

        let stats = g.transform_stats();
        assert_eq!(stats.local_recomputes, 1);
        assert_eq!(stats.world_recomputes, 2);
        let world = g.node(b).unwrap().world_transform();
        assert_eq!(world.apply(Vec2::ZERO), Vec2::new(15.0, 20.0));
    }

    #[test]
    fn reparented_node_picks_up_new_parent_world() {
        let mut g = SceneGraph::new();
        let root = container(&mut g);
        let (a, b, c) = (container(&mut g), container(&mut g), container(&mut g));
        g.add_child(root, a);
        g.add_child(root, b);
        g.add_child(a, c);
        g.set_position(b, 100.0, 0.0);
        g.update_transforms(root);

        g.add_child(b, c);
        g.update_transforms(root);

        assert_eq!(g.node(c).unwrap().world_transform().tx, 100.0);
    }

    // ── bounds ────────────────────────────────────────────────────────────

    #[test]
    fn world_bounds_union_visible_content() {
        let mut g = SceneGraph::new();
        let textures = TextureStore::new();
        let root = container(&mut g);
        let a = g.create_node(NodeContent::Fill(Fill::new(10.0, 10.0, Color::WHITE)));
        let b = g.create_node(NodeContent::Fill(Fill::new(10.0, 10.0, Color::WHITE)));
        let hidden = g.create_node(NodeContent::Fill(Fill::new(500.0, 500.0, Color::WHITE)));
        g.add_child(root, a);
        g.add_child(root, b);
        g.add_child(root, hidden);
        g.set_position(b, 20.0, 5.0);
        g.set_visible(hidden, false);
        g.update_transforms(root);

        assert_eq!(g.world_bounds(root, &textures), Rect::new(0.0, 0.0, 30.0, 15.0));
    }
}
