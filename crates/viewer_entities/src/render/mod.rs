//! Scene building helpers
//!
//! Everything that turns entity data into scene nodes: name tags, item
//! meshes, armor, armor stand poses, item frames and the player rig. The
//! helpers work on a [`RenderContext`] borrowed from the entity manager.

pub mod armor;
pub mod armor_stand;
pub mod item_frame;
pub mod item_mesh;
pub mod nametag;
pub mod player;
pub mod pose;

use crate::config::EntitiesConfig;
use crate::providers::{ModelNode, ModelTexture, ResourceProvider, TextMeasure};
use crate::scene::{
    AtlasKind, Material, MaterialKind, NodeId, NodeKind, SceneGraph, SceneNode, Texture, TextureId, TextureSource,
    TextureStore,
};

/// Shared atlases owned by the world renderer; never disposed here
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Atlases {
    /// Item sprite atlas
    pub items: TextureId,
    /// Block texture atlas
    pub blocks: TextureId,
}

impl Atlases {
    /// Register both atlases in `textures`
    pub fn register(textures: &mut TextureStore) -> Self {
        Self {
            items: textures.insert(Texture::pixelated(TextureSource::Atlas(AtlasKind::Items))),
            blocks: textures.insert(Texture::pixelated(TextureSource::Atlas(AtlasKind::Blocks))),
        }
    }

    /// Atlas texture of the given kind
    pub fn get(&self, kind: AtlasKind) -> TextureId {
        match kind {
            AtlasKind::Items => self.items,
            AtlasKind::Blocks => self.blocks,
        }
    }
}

/// Mutable scene state and collaborators borrowed for one operation
pub struct RenderContext<'a> {
    /// Scene graph
    pub graph: &'a mut SceneGraph,
    /// Texture arena
    pub textures: &'a mut TextureStore,
    /// Shared atlases
    pub atlases: Atlases,
    /// Model and texture source
    pub provider: &'a dyn ResourceProvider,
    /// Font metrics
    pub measure: &'a dyn TextMeasure,
    /// Renderer options
    pub config: &'a EntitiesConfig,
}

impl RenderContext<'_> {
    /// Destroy a node and dispose the textures it owned
    pub fn destroy_node(&mut self, id: NodeId) {
        let released = self.graph.destroy(id);
        self.textures.dispose_all(released);
    }

    /// Build `model` below `parent`, returning the new subtree root
    pub fn instantiate_model(&mut self, parent: NodeId, model: &ModelNode) -> NodeId {
        let mut owned = Vec::new();
        let map = match &model.texture {
            ModelTexture::None => None,
            ModelTexture::Atlas(kind) => Some(self.atlases.get(*kind)),
            ModelTexture::Url(url) => {
                let id = self.textures.insert(Texture::pixelated(TextureSource::Url(url.clone())));
                owned.push(id);
                Some(id)
            }
        };

        let kind = match &model.geometry {
            Some(geometry) => NodeKind::Mesh {
                geometry: geometry.clone(),
                materials: vec![Material::cutout(MaterialKind::Lambert, map)],
            },
            None => NodeKind::Group,
        };
        let mut node = SceneNode::new(model.name.clone(), kind);
        node.transform = model.transform.clone();
        node.visible = model.visible;
        node.owned_textures = owned;

        let id = self.graph.spawn(parent, node);
        for child in &model.children {
            self.instantiate_model(id, child);
        }
        id
    }
}
