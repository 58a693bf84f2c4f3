//! Entity metadata values and schema-keyed access
//!
//! The protocol delivers metadata as an indexed list. Which index means what
//! depends on the entity type and the protocol version, so lookups by name go
//! through an [`EntitySchema`] supplied by the host.

use super::entity::EntitySnapshot;
use super::item::Item;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Shared entity flags (metadata index 0)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntityFlags: u8 {
        /// Entity is on fire
        const ON_FIRE = 0x01;
        /// Entity is crouching
        const CROUCHING = 0x02;
        /// Entity is sprinting
        const SPRINTING = 0x08;
        /// Entity is swimming
        const SWIMMING = 0x10;
        /// Entity is invisible
        const INVISIBLE = 0x20;
        /// Entity is glowing
        const GLOWING = 0x40;
        /// Entity is flying with an elytra
        const FALL_FLYING = 0x80;
    }
}

bitflags! {
    /// Armor stand `client_flags`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ArmorStandFlags: u8 {
        /// Half size
        const SMALL = 0x01;
        /// Arms are shown
        const ARMS = 0x04;
        /// Base plate is hidden
        const NO_BASEPLATE = 0x08;
        /// Marker: no hitbox, no shadow
        const MARKER = 0x10;
    }
}

bitflags! {
    /// Text display `style_flags`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TextDisplayFlags: u8 {
        /// Text has a shadow
        const SHADOW = 0x01;
        /// Visible through blocks
        const SEE_THROUGH = 0x02;
        /// Use the default background colour instead of `background_color`
        const DEFAULT_BACKGROUND = 0x04;
    }
}

/// A single metadata entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataValue {
    /// Byte, varint or long
    Int(i64),
    /// Float
    Float(f32),
    /// Boolean
    Bool(bool),
    /// String (also SNBT encoded chat components)
    String(String),
    /// Simplified NBT or chat component
    Nbt(serde_json::Value),
    /// Item stack
    Item(Item),
    /// Vector
    Vector {
        /// X
        x: f32,
        /// Y
        y: f32,
        /// Z
        z: f32,
    },
    /// Quaternion
    Quaternion {
        /// X
        x: f32,
        /// Y
        y: f32,
        /// Z
        z: f32,
        /// W
        w: f32,
    },
    /// Armor stand rotations in degrees
    Rotations {
        /// Pitch
        pitch: f32,
        /// Yaw
        yaw: f32,
        /// Roll
        roll: f32,
    },
    /// Raw float array
    Array(Vec<f32>),
}

impl MetadataValue {
    /// Integer view; strings are parsed like the protocol layer does
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            MetadataValue::Int(v) => Some(*v),
            MetadataValue::Bool(b) => Some(i64::from(*b)),
            MetadataValue::Float(f) => Some(*f as i64),
            MetadataValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Low eight bits, for flag bytes
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn as_flags(&self) -> u8 {
        self.as_i64().map_or(0, |v| v as u8)
    }

    /// String view
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Item view
    pub fn as_item(&self) -> Option<&Item> {
        match self {
            MetadataValue::Item(item) => Some(item),
            _ => None,
        }
    }

    /// Whether the value counts as set (non-zero, non-empty, true)
    pub fn is_truthy(&self) -> bool {
        match self {
            MetadataValue::Int(v) => *v != 0,
            MetadataValue::Float(f) => *f != 0.0,
            MetadataValue::Bool(b) => *b,
            MetadataValue::String(s) => !s.is_empty(),
            MetadataValue::Nbt(v) => !v.is_null(),
            _ => true,
        }
    }
}

/// Entity type tables supplied by the host
pub trait EntitySchema {
    /// Metadata key names in index order for an entity type
    fn metadata_keys(&self, entity_name: &str) -> Option<&[String]>;

    /// Whether the entity can be attacked (gets a fallback model)
    fn is_attackable(&self, entity: &EntitySnapshot) -> bool;
}

/// Name keyed view over an entity's metadata list
pub struct EntityMetadata<'a> {
    keys: Option<&'a [String]>,
    values: &'a [Option<MetadataValue>],
}

impl<'a> EntityMetadata<'a> {
    /// Metadata view for any entity type
    pub fn general(schema: &'a dyn EntitySchema, entity: &'a EntitySnapshot) -> Self {
        Self {
            keys: schema.metadata_keys(&entity.name),
            values: &entity.metadata,
        }
    }

    /// Metadata view only available when the entity is of type `name`
    pub fn specific(schema: &'a dyn EntitySchema, entity: &'a EntitySnapshot, name: &str) -> Option<Self> {
        (entity.name == name).then(|| Self::general(schema, entity))
    }

    /// Value stored under `key`
    pub fn get(&self, key: &str) -> Option<&'a MetadataValue> {
        let index = self.keys?.iter().position(|k| k == key)?;
        self.values.get(index)?.as_ref()
    }

    /// Integer value stored under `key`
    pub fn int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(MetadataValue::as_i64)
    }

    /// Whether `key` holds a truthy value
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(MetadataValue::is_truthy)
    }
}
