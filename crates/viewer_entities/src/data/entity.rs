//! Entity snapshots as delivered by the game client

use super::item::Item;
use super::metadata::MetadataValue;
use super::text;
use crate::foundation::math::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Network id of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub i32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Broad entity category reported by the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// Another player
    Player,
    /// Passive mob
    Mob,
    /// Hostile mob
    Hostile,
    /// Thrown or shot entity
    Projectile,
    /// Non-living object (item, frame, minecart...)
    Object,
    /// Anything else
    #[default]
    #[serde(other)]
    Other,
}

/// Display name of a player: either plain text with formatting codes or a
/// chat component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Username {
    /// Plain string, possibly containing `§` formatting codes
    Plain(String),
    /// Chat component
    Component(serde_json::Value),
}

impl Username {
    /// Text content with formatting removed
    pub fn plain_text(&self) -> String {
        match self {
            Username::Plain(s) => text::strip_formatting(s),
            Username::Component(value) => text::component_to_plain(value),
        }
    }

    /// The raw string form used for skin lookups
    pub fn as_lookup_name(&self) -> Option<&str> {
        match self {
            Username::Plain(s) => Some(s),
            Username::Component(_) => None,
        }
    }
}

impl From<&str> for Username {
    fn from(s: &str) -> Self {
        Username::Plain(s.to_string())
    }
}

/// Who may see an entity's name tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NameTagVisibility {
    /// Everyone
    #[default]
    Always,
    /// Nobody
    Never,
    /// Members of the same team only
    HideForOtherTeams,
    /// Everyone except members of the same team
    HideForOwnTeam,
}

/// Scoreboard team membership
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    /// Team identifier
    pub team: String,
    /// Name tag rule of the team
    #[serde(default)]
    pub name_tag_visibility: NameTagVisibility,
}

/// Equipment slot order used by [`EntitySnapshot::equipment`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EquipmentSlot {
    /// Main hand item
    MainHand = 0,
    /// Off hand item
    OffHand = 1,
    /// Boots
    Feet = 2,
    /// Leggings
    Legs = 3,
    /// Chestplate or elytra
    Chest = 4,
    /// Helmet or head item
    Head = 5,
}

/// Latest known state of an entity
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitySnapshot {
    /// Network id
    pub id: EntityId,
    /// Entity type name (`zombie`, `item_frame`, sometimes `PascalCase`)
    pub name: String,
    /// Category
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Player name or display name
    pub username: Option<Username>,
    /// Player UUID
    pub uuid: Option<String>,
    /// Current position
    pub position: Option<Vec3>,
    /// Spawn position, preferred over `position` when the entity is created
    pub pos: Option<Vec3>,
    /// Body yaw in radians
    pub yaw: f32,
    /// Pitch in radians
    pub pitch: f32,
    /// Bounding box width
    pub width: f32,
    /// Bounding box height
    pub height: f32,
    /// Indexed metadata; holes are `None`
    pub metadata: Vec<Option<MetadataValue>>,
    /// Main hand, off hand, feet, legs, chest, head
    pub equipment: Option<[Option<Item>; 6]>,
    /// Team membership
    pub team: Option<Team>,
    /// Block state of a falling block
    pub object_data: Option<i32>,
    /// Destroy instead of update
    pub delete: bool,
}

impl EntitySnapshot {
    /// Snapshot with just an id and a type name
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id: EntityId(id),
            name: name.into(),
            width: 0.6,
            height: 1.8,
            ..Default::default()
        }
    }

    /// Position to place a freshly created entity at
    pub fn spawn_position(&self) -> Vec3 {
        self.pos.or(self.position).unwrap_or_else(Vec3::zeros)
    }

    /// Item in `slot`, if equipment is known
    pub fn equipment_item(&self, slot: EquipmentSlot) -> Option<&Item> {
        self.equipment.as_ref()?[slot as usize].as_ref()
    }

    /// Raw metadata value at `index`
    pub fn metadata_at(&self, index: usize) -> Option<&MetadataValue> {
        self.metadata.get(index)?.as_ref()
    }

    /// Plain username, if any
    pub fn plain_username(&self) -> Option<String> {
        self.username.as_ref().map(Username::plain_text)
    }

    /// Copy of this snapshot marked for deletion
    pub fn as_deleted(&self) -> Self {
        Self {
            delete: true,
            ..self.clone()
        }
    }
}

/// Per-update model overrides
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshOverrides {
    /// Replacement main texture (or skin URL for players)
    pub texture: Option<String>,
    /// Replacement textures by model texture slot
    pub textures: HashMap<String, String>,
    /// Head rotation override
    pub rotation: Option<RotationOverride>,
}

/// Rotation overrides applied after the position update
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationOverride {
    /// Head look direction
    pub head: Option<HeadRotation>,
}

/// Absolute head yaw and pitch in radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HeadRotation {
    /// Pitch
    pub x: f32,
    /// Yaw
    pub y: f32,
}
