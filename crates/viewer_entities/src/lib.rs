//! # Viewer Entities
//!
//! Live entity rendering for a block-game world viewer. Entity snapshots
//! from the game client become scene graph subtrees that follow the
//! entity's movement, equipment and metadata.
//!
//! ## Features
//!
//! - **Scene Graph**: Arena-backed nodes with owned textures and tweens
//! - **Player Models**: Skinned rigs with capes, elytra, ears and limb animation
//! - **Equipment**: Held items, armor pieces with leather tinting, player heads
//! - **Labels**: Name tags, custom names and text displays
//! - **Special Entities**: Armor stand poses, item frames with maps, dropped items
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use viewer_entities::prelude::*;
//!
//! struct Schema;
//!
//! impl EntitySchema for Schema {
//!     fn metadata_keys(&self, _entity_name: &str) -> Option<&[String]> {
//!         None
//!     }
//!
//!     fn is_attackable(&self, _entity: &EntitySnapshot) -> bool {
//!         true
//!     }
//! }
//!
//! fn run(provider: Box<dyn ResourceProvider>) {
//!     let mut entities = Entities::new(EntitiesConfig::default(), provider, Box::new(Schema));
//!     entities.update(EntitySnapshot::new(1, "zombie"), MeshOverrides::default());
//!     loop {
//!         entities.render();
//!         for request in entities.drain_skin_requests() {
//!             // fetch the skin, then answer with complete_skin_url / apply_skin_image
//!             println!("skin work for {}", request.entity());
//!         }
//!     }
//! }
//! ```

pub mod config;
pub mod data;
pub mod entities;
pub mod error;
pub mod foundation;
pub mod providers;
pub mod render;
pub mod scene;

pub use entities::{AnimationTarget, Entities, EntityEvent, RaycastHit, ResourcesEvent, SceneEntity};
pub use error::EntityError;

/// Common imports for entity renderer users
pub mod prelude {
    pub use crate::{
        config::{Config, DebugMode, EntitiesConfig},
        data::{
            EntityId, EntityKind, EntitySchema, EntitySnapshot, Item, MeshOverrides, MetadataValue, Team, Username,
        },
        entities::{AnimationTarget, Entities, EntityEvent, RaycastHit, ResourcesEvent, SceneEntity},
        error::EntityError,
        foundation::math::Vec3,
        providers::{ItemRenderData, ModelNode, ResourceProvider, TextMeasure, ViewerState},
        render::player::{PlayerAnimation, SkinRequest, SkinSource},
        scene::{NodeId, SceneGraph, TextureStore},
    };
}
