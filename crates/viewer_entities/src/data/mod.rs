//! Entity data as delivered by the game client
//!
//! Snapshots, items, metadata and chat text. Nothing here touches the scene.

pub mod entity;
pub mod item;
pub mod metadata;
pub mod text;

pub use entity::{
    EntityId, EntityKind, EntitySnapshot, EquipmentSlot, HeadRotation, MeshOverrides, NameTagVisibility,
    RotationOverride, Team, Username,
};
pub use item::{DisplayContext, Item, ItemComponent};
pub use metadata::{ArmorStandFlags, EntityFlags, EntityMetadata, EntitySchema, MetadataValue, TextDisplayFlags};
pub use text::{parse_entity_label, strip_formatting};
