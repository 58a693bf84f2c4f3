//! Retained scene
//!
//! Scene graph, materials, textures and tweens the entity renderer builds
//! its objects from.

pub mod bounds;
pub mod graph;
pub mod material;
pub mod texture;
pub mod tween;

pub use bounds::Aabb;
pub use graph::{NodeId, NodeKind, SceneGraph, SceneNode};
pub use material::{Color, Geometry, Material, MaterialKind, Rgba};
pub use texture::{AtlasKind, ImageData, Texture, TextureId, TextureSource, TextureStore};
pub use tween::{Interpolate, TweenProperty, TweenSet};
