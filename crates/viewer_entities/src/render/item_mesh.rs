//! Item models
//!
//! Block items reuse the block model; everything else is a flat sprite cut
//! out of the item (or block) atlas. Flat items shown in the world are a
//! zero-depth box so both faces render, the back face with a mirrored copy
//! of the texture.

use super::RenderContext;
use crate::data::{DisplayContext, Item};
use crate::providers::ItemRenderData;
use crate::scene::{Color, Geometry, Material, MaterialKind, NodeId, NodeKind, SceneNode, TextureId};

/// An item model ready to be attached to the scene
#[derive(Debug, Clone, PartialEq)]
pub struct ItemMesh {
    /// Detached root node of the model
    pub node: NodeId,
    /// Built from a block model
    pub is_block: bool,
    /// Atlas copies owned by `node`
    pub textures: Vec<TextureId>,
    /// Resolved model name
    pub model_name: String,
}

/// Build a detached item model.
///
/// Returns `None` when the item has no model or when its resolved model is
/// `previous_model` (nothing to rebuild).
pub fn get_item_mesh(
    ctx: &mut RenderContext<'_>,
    item: &Item,
    context: DisplayContext,
    face_camera: bool,
    previous_model: Option<&str>,
) -> Option<ItemMesh> {
    let render_data = ctx.provider.item_render_data(item, context)?;
    if previous_model == Some(render_data.model_name()) {
        return None;
    }
    let scale = context.scale();

    match render_data {
        ItemRenderData::Block { model_name, model } => {
            let outer = ctx.graph.create(SceneNode::group("item_block"));
            let inner = ctx.instantiate_model(outer, &model);
            if let Some(node) = ctx.graph.get_mut(inner) {
                node.transform.set_uniform_scale(scale);
            }
            Some(ItemMesh {
                node: outer,
                is_block: true,
                textures: Vec::new(),
                model_name,
            })
        }
        ItemRenderData::Flat { model_name, atlas, u, v, su, sv } => {
            let Some(texture) = ctx.textures.clone_texture(ctx.atlases.get(atlas)) else {
                log::warn!("Atlas for item '{}' is not registered", model_name);
                return None;
            };
            if let Some(t) = ctx.textures.get_mut(texture) {
                t.flip_y = true;
                t.offset.x = u;
                t.offset.y = 1.0 - v - sv;
                t.repeat.x = su;
                t.repeat.y = sv;
                t.nearest = true;
                t.needs_update = true;
            }

            let mut textures = vec![texture];
            let mut node = if face_camera {
                let material = Material::cutout(MaterialKind::Sprite, Some(texture));
                SceneNode::new("item_sprite", NodeKind::Sprite { material })
            } else {
                let Some(flipped) = ctx.textures.clone_texture(texture) else {
                    ctx.textures.dispose(texture);
                    return None;
                };
                if let Some(t) = ctx.textures.get_mut(flipped) {
                    t.repeat.x = -t.repeat.x;
                    t.offset.x = u + su;
                    t.offset.y = 1.0 - v - sv;
                    t.needs_update = true;
                }
                textures.push(flipped);

                // edges are black, the two large faces carry the texture
                let mut materials = vec![Material::basic(Color::BLACK); 4];
                materials.push(Material::cutout(MaterialKind::Standard, Some(texture)));
                materials.push(Material::cutout(MaterialKind::Standard, Some(flipped)));
                SceneNode::mesh("item_flat", Geometry::cuboid(1.0, 1.0, 0.0), materials)
            };
            node.transform.set_uniform_scale(scale);
            node.owned_textures.clone_from(&textures);

            Some(ItemMesh {
                node: ctx.graph.create(node),
                is_block: false,
                textures,
                model_name,
            })
        }
    }
}
