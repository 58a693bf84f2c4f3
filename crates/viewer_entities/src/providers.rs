//! Host collaborators
//!
//! The entity renderer does not know how block and entity models are built,
//! where textures live or how text is measured. The host supplies that
//! through the traits here, and keeps a [`ViewerState`] up to date with the
//! camera and world state the renderer reads each frame.

use crate::data::{DisplayContext, EntityId, Item, MeshOverrides, Team};
use crate::error::EntityError;
use crate::foundation::math::{Transform, Vec3};
use crate::scene::{AtlasKind, Geometry};
use std::collections::HashSet;

/// Texture reference inside a provider built model
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ModelTexture {
    /// Untextured
    #[default]
    None,
    /// Texture loaded from a URL or asset path, owned by the node
    Url(String),
    /// Region of a shared atlas
    Atlas(AtlasKind),
}

/// Model description produced by the host, instantiated into the scene graph
#[derive(Debug, Clone, PartialEq)]
pub struct ModelNode {
    /// Node name (`bone_head`, `geometry_frame`, ...)
    pub name: String,
    /// Local transform
    pub transform: Transform,
    /// Shape, `None` for pure groups
    pub geometry: Option<Geometry>,
    /// Texture of the shape
    pub texture: ModelTexture,
    /// Initial visibility
    pub visible: bool,
    /// Child nodes
    pub children: Vec<ModelNode>,
}

impl ModelNode {
    /// Empty group
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::identity(),
            geometry: None,
            texture: ModelTexture::None,
            visible: true,
            children: Vec::new(),
        }
    }

    /// Textured shape
    pub fn shape(name: impl Into<String>, geometry: Geometry, texture: ModelTexture) -> Self {
        Self {
            geometry: Some(geometry),
            texture,
            ..Self::group(name)
        }
    }

    /// Builder style child append
    pub fn with_child(mut self, child: ModelNode) -> Self {
        self.children.push(child);
        self
    }
}

/// How an item is drawn
#[derive(Debug, Clone, PartialEq)]
pub enum ItemRenderData {
    /// Full block model
    Block {
        /// Resolved model name
        model_name: String,
        /// Block model
        model: ModelNode,
    },
    /// Flat sprite cut from an atlas
    Flat {
        /// Resolved model name
        model_name: String,
        /// Atlas holding the sprite
        atlas: AtlasKind,
        /// Left edge in UV space
        u: f32,
        /// Top edge in UV space
        v: f32,
        /// Width in UV space
        su: f32,
        /// Height in UV space
        sv: f32,
    },
}

impl ItemRenderData {
    /// Resolved model name
    pub fn model_name(&self) -> &str {
        match self {
            ItemRenderData::Block { model_name, .. } | ItemRenderData::Flat { model_name, .. } => model_name,
        }
    }
}

/// Armor slot with a wearable model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmorSlot {
    /// Boots
    Feet,
    /// Leggings
    Legs,
    /// Chestplate
    Chest,
    /// Helmet
    Head,
}

impl ArmorSlot {
    /// Lower case slot name used in node names
    pub fn as_str(self) -> &'static str {
        match self {
            ArmorSlot::Feet => "feet",
            ArmorSlot::Legs => "legs",
            ArmorSlot::Chest => "chest",
            ArmorSlot::Head => "head",
        }
    }
}

/// Models and textures supplied by the host's resource manager
pub trait ResourceProvider {
    /// How to draw `item` in `context`, `None` when the item has no model
    fn item_render_data(&self, item: &Item, context: DisplayContext) -> Option<ItemRenderData>;

    /// Model of an entity type, `Ok(None)` when the type has no model
    fn entity_model(&self, entity_name: &str, overrides: &MeshOverrides) -> Result<Option<ModelNode>, EntityError>;

    /// Wearable model of an armor slot
    fn armor_model(&self, slot: ArmorSlot) -> Option<ModelNode>;

    /// Armor texture from the active resource pack
    fn custom_armor_texture(&self, texture_name: &str) -> Option<String>;

    /// Built-in armor texture
    fn default_armor_texture(&self, texture_name: &str) -> Option<String>;
}

/// Text width measurement for name tag layout
pub trait TextMeasure {
    /// Width of `text` in canvas pixels
    fn measure(&self, text: &str, font_size: f32, font_family: &str) -> f32;
}

/// Fixed advance approximation, used when the host has no font metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct MonospaceMeasure;

impl TextMeasure for MonospaceMeasure {
    fn measure(&self, text: &str, font_size: f32, _font_family: &str) -> f32 {
        text.chars().count() as f32 * font_size * 0.6
    }
}

/// Camera and world state the renderer reads every frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewerState {
    /// Camera position
    pub camera_position: Vec3,
    /// Camera yaw in radians (without shake)
    pub camera_yaw: f32,
    /// Camera pitch in radians (without shake)
    pub camera_pitch: f32,
    /// Position used for entity distance culling
    pub viewer_chunk_position: Option<Vec3>,
    /// Local player eye height
    pub eye_height: f32,
    /// Third person camera active
    pub third_person: bool,
    /// Local player is a spectator
    pub spectator: bool,
    /// Entity the spectator camera is attached to
    pub spectating_entity: Option<EntityId>,
    /// Local player's team
    pub team: Option<Team>,
    /// Render distance in chunks
    pub view_distance: u32,
    /// Chunk columns whose meshes are complete
    pub finished_chunks: HashSet<(i32, i32)>,
}

impl ViewerState {
    /// Chunk column containing `position`
    #[allow(clippy::cast_possible_truncation)]
    pub fn chunk_of(position: Vec3) -> (i32, i32) {
        ((position.x / 16.0).floor() as i32, (position.z / 16.0).floor() as i32)
    }

    /// Mark the chunk column containing `position` as finished
    pub fn mark_chunk_finished(&mut self, position: Vec3) {
        self.finished_chunks.insert(Self::chunk_of(position));
    }

    /// Whether the chunk holding `position` has finished meshing
    pub fn is_chunk_finished(&self, position: Vec3) -> bool {
        self.finished_chunks.contains(&Self::chunk_of(position))
    }

    /// Unit vector the camera looks along
    pub fn camera_direction(&self) -> Vec3 {
        let (sy, cy) = self.camera_yaw.sin_cos();
        let (sp, cp) = self.camera_pitch.sin_cos();
        Vec3::new(-sy * cp, sp, -cy * cp)
    }

    /// Whether the spectator camera sits inside `id`
    pub fn is_spectating(&self, id: EntityId) -> bool {
        self.spectator && self.spectating_entity == Some(id)
    }
}
