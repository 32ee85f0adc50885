use slotmap::new_key_type;

use crate::coords::{Affine, Rect, Vec2};
use crate::paint::Color;
use crate::resource::TextureId;
use crate::tilemap::TileRenderer;

use super::filter::Filter;

new_key_type! {
    /// Handle to a node in a [`SceneGraph`](super::SceneGraph).
    pub struct NodeId;
}

/// Render function a node dispatches to. Switched synchronously by the
/// filter and mask mutators of the graph.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum RenderMode {
    #[default]
    Plain,
    Filtered,
    Masked,
}

/// How the window layer treats a direct child.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub enum NodeTag {
    #[default]
    Ordinary,
    /// UI window; clipped so it never draws over earlier chrome siblings.
    Chrome,
}

/// Textured quad. `frame` is the texel rectangle to show (`None` = whole
/// texture); the node's local origin sits at `anchor` (0..1) of it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Sprite {
    pub texture: Option<TextureId>,
    pub frame: Option<Rect>,
    pub anchor: Vec2,
    pub tint: Color,
}

impl Sprite {
    pub fn new(texture: TextureId) -> Self {
        Self {
            texture: Some(texture),
            frame: None,
            anchor: Vec2::ZERO,
            tint: Color::WHITE,
        }
    }

    pub fn with_frame(mut self, frame: Rect) -> Self {
        self.frame = Some(frame);
        self
    }
}

/// Untextured rectangle from the local origin.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Fill {
    pub size: Vec2,
    pub color: Color,
}

impl Fill {
    pub fn new(width: f32, height: f32, color: Color) -> Self {
        Self {
            size: Vec2::new(width, height),
            color,
        }
    }
}

/// What a node draws before (and, for tilemaps, after) its children.
#[derive(Default)]
pub enum NodeContent {
    #[default]
    Container,
    Sprite(Sprite),
    Fill(Fill),
    Tilemap(Box<TileRenderer>),
    /// Clips `Chrome` children against each other, then draws the rest.
    WindowLayer,
}

impl NodeContent {
    pub fn as_tilemap_mut(&mut self) -> Option<&mut TileRenderer> {
        match self {
            NodeContent::Tilemap(t) => Some(t),
            _ => None,
        }
    }
}

impl core::fmt::Debug for NodeContent {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            NodeContent::Container => f.write_str("Container"),
            NodeContent::Sprite(s) => f.debug_tuple("Sprite").field(s).finish(),
            NodeContent::Fill(c) => f.debug_tuple("Fill").field(c).finish(),
            NodeContent::Tilemap(_) => f.write_str("Tilemap"),
            NodeContent::WindowLayer => f.write_str("WindowLayer"),
        }
    }
}

/// Decomposed local transform.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub position: Vec2,
    pub scale: Vec2,
    pub rotation: f32,
    pub skew: Vec2,
    pub pivot: Vec2,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
            skew: Vec2::ZERO,
            pivot: Vec2::ZERO,
        }
    }
}

impl Transform {
    pub fn to_affine(&self) -> Affine {
        Affine::from_parts(self.position, self.scale, self.rotation, self.skew, self.pivot)
    }
}

/// Parent world epoch that never matches; forces a world recompute.
pub(crate) const STALE_EPOCH: u64 = u64::MAX;

pub struct SceneNode {
    pub(crate) transform: Transform,

    /// Bumped by every transform setter.
    pub(crate) local_epoch: u64,
    /// `local_epoch` the cached `local` was built from.
    pub(crate) local_built: u64,
    pub(crate) local: Affine,

    pub(crate) world: Affine,
    pub(crate) world_epoch: u64,
    /// Parent `world_epoch` the cached `world` was built from.
    pub(crate) parent_world_seen: u64,

    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) visible: bool,

    pub(crate) filters: Vec<Box<dyn Filter>>,
    pub(crate) filter_area: Option<Rect>,

    /// Non-owning; the mask node is never destroyed through this reference.
    pub(crate) mask: Option<NodeId>,
    /// Nodes currently using this node as their mask.
    pub(crate) masker_count: u32,

    pub(crate) mode: RenderMode,
    pub(crate) tag: NodeTag,
    pub(crate) content: NodeContent,
}

impl SceneNode {
    pub(crate) fn new(content: NodeContent) -> Self {
        Self {
            transform: Transform::default(),
            local_epoch: 1,
            local_built: 0,
            local: Affine::IDENTITY,
            world: Affine::IDENTITY,
            world_epoch: 0,
            parent_world_seen: STALE_EPOCH,
            parent: None,
            children: Vec::new(),
            visible: true,
            filters: Vec::new(),
            filter_area: None,
            mask: None,
            masker_count: 0,
            mode: RenderMode::Plain,
            tag: NodeTag::Ordinary,
            content,
        }
    }

    #[inline]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    #[inline]
    pub fn world_transform(&self) -> Affine {
        self.world
    }

    #[inline]
    pub fn world_epoch(&self) -> u64 {
        self.world_epoch
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    #[inline]
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    #[inline]
    pub fn filter_area(&self) -> Option<Rect> {
        self.filter_area
    }

    #[inline]
    pub fn mask(&self) -> Option<NodeId> {
        self.mask
    }

    #[inline]
    pub fn masker_count(&self) -> u32 {
        self.masker_count
    }

    #[inline]
    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    #[inline]
    pub fn tag(&self) -> NodeTag {
        self.tag
    }

    #[inline]
    pub fn content(&self) -> &NodeContent {
        &self.content
    }

    /// World-space bounds of this node's own content (children excluded).
    pub(crate) fn content_bounds(&self, texture_size: impl Fn(TextureId) -> Option<(u32, u32)>) -> Rect {
        let local = match &self.content {
            NodeContent::Sprite(s) => match sprite_size(s, texture_size) {
                Some(size) => Rect::new(-s.anchor.x * size.x, -s.anchor.y * size.y, size.x, size.y),
                None => return Rect::EMPTY,
            },
            NodeContent::Fill(f) => Rect::new(0.0, 0.0, f.size.x, f.size.y),
            NodeContent::Tilemap(t) => {
                let vp = t.viewport();
                Rect::new(0.0, 0.0, vp.width, vp.height)
            }
            NodeContent::Container | NodeContent::WindowLayer => return Rect::EMPTY,
        };
        self.world.transform_rect(local)
    }
}

/// Display size of a sprite: its frame, else its texture. `None` while the
/// texture is pending or missing.
pub(crate) fn sprite_size(
    sprite: &Sprite,
    texture_size: impl Fn(TextureId) -> Option<(u32, u32)>,
) -> Option<Vec2> {
    if let Some(frame) = sprite.frame {
        return Some(frame.size);
    }
    let (w, h) = texture_size(sprite.texture?)?;
    (w > 0 && h > 0).then(|| Vec2::new(w as f32, h as f32))
}
