//! Retained scene graph and its per-frame render pipeline.
//!
//! - [`SceneGraph`]: arena of [`SceneNode`]s addressed by [`NodeId`]
//! - [`render_scene`]: one traversal per frame, dispatching on each node's
//!   [`RenderMode`]
//! - [`Filter`]s render a node offscreen and composite it back; masks clip
//!   through the stencil
//! - [`QuadBatcher`]: merges consecutive quads that share a texture

mod batcher;
mod filter;
mod graph;
mod mask;
mod node;
mod pipeline;
mod window_layer;

pub use batcher::{BatchStats, BatchTexture, QuadBatcher};
pub use filter::{BlurFilter, ColorMatrixFilter, Filter, FilterFrame};
pub use graph::{SceneGraph, TransformStats};
pub use mask::StencilFrame;
pub use node::{Fill, NodeContent, NodeId, NodeTag, RenderMode, SceneNode, Sprite, Transform};
pub use pipeline::{render_scene, FrameOutcome};
