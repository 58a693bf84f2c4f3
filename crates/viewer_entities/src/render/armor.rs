//! Armor and held items
//!
//! Armor pieces are provider models attached to the entity root and named
//! `geometry_armor_<slot>` (plus `_overlay` for the tinted second layer of
//! leather armor). Held items hang below the model's hand bone.

use super::item_mesh::get_item_mesh;
use super::player::rig::PlayerRig;
use super::player::skin::STEVE_SKIN_URL;
use super::RenderContext;
use crate::data::{DisplayContext, Item};
use crate::error::EntityError;
use crate::foundation::math::Euler;
use crate::providers::ArmorSlot;
use crate::scene::{Color, Material, NodeId, SceneGraph, SceneNode, Texture, TextureSource};
use base64::Engine;
use serde_json::Value;
use std::f32::consts::PI;

/// Default tint of undyed leather armor
pub const LEATHER_DEFAULT_COLOR: u32 = 0xB5_6D_51;

/// Which hand an item is held in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hand {
    /// Left hand
    Left,
    /// Right hand
    Right,
}

impl Hand {
    /// Lower case name used in bone and node names
    pub fn as_str(self) -> &'static str {
        match self {
            Hand::Left => "left",
            Hand::Right => "right",
        }
    }
}

/// Node name of an armor piece
pub fn armor_node_name(slot: ArmorSlot, overlay: bool) -> String {
    format!("geometry_armor_{}{}", slot.as_str(), if overlay { "_overlay" } else { "" })
}

/// Skin URL stored in a player head's NBT.
///
/// Reads `SkullOwner.Properties.textures[0].Value` or the `textures` entry of
/// `minecraft:profile.Properties`, base64 decodes it and returns
/// `textures.SKIN.url`, rewritten to `proxy` when one is configured.
pub fn player_head_skin_url(nbt: &Value, proxy: Option<&str>) -> Result<Option<String>, EntityError> {
    let encoded = if let Some(owner) = nbt.get("SkullOwner") {
        owner
            .pointer("/Properties/textures/0/Value")
            .and_then(Value::as_str)
    } else {
        nbt.get("minecraft:profile")
            .and_then(|p| p.get("Properties"))
            .and_then(Value::as_array)
            .and_then(|props| props.iter().find(|p| p.get("name").and_then(Value::as_str) == Some("textures")))
            .and_then(|p| p.get("value"))
            .and_then(Value::as_str)
    };
    let Some(encoded) = encoded else {
        return Ok(None);
    };

    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded)?;
    let payload: Value = serde_json::from_slice(&decoded)?;
    let url = payload.pointer("/textures/SKIN/url").and_then(Value::as_str);

    Ok(url.map(|url| match proxy {
        Some(proxy) => url
            .replace("http://textures.minecraft.net/", proxy)
            .replace("https://textures.minecraft.net/", proxy),
        None => url.to_string(),
    }))
}

fn leather_color(item: &Item) -> Color {
    let dyed = item
        .nbt
        .as_ref()
        .and_then(|nbt| nbt.pointer("/display/color"))
        .and_then(Value::as_i64)
        .filter(|&c| c != 0);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let hex = dyed.map_or(LEATHER_DEFAULT_COLOR, |c| (c & 0xff_ff_ff) as u32);
    Color::from_hex(hex)
}

fn for_each_material(graph: &mut SceneGraph, root: NodeId, mut f: impl FnMut(&mut Material)) {
    for id in graph.traverse(root) {
        if let Some(node) = graph.get_mut(id) {
            for material in node.materials_mut() {
                f(material);
            }
        }
    }
}

/// Remove the armor piece (and its overlay) of `slot`
pub fn remove_armor_model(ctx: &mut RenderContext<'_>, entity: NodeId, slot: ArmorSlot) {
    let names = [armor_node_name(slot, false), armor_node_name(slot, true)];
    let pieces: Vec<NodeId> = ctx
        .graph
        .children(entity)
        .iter()
        .copied()
        .filter(|&c| ctx.graph.get(c).is_some_and(|n| names.contains(&n.name)))
        .collect();
    for piece in pieces {
        ctx.destroy_node(piece);
    }
}

/// Put `item` on `slot` of `entity`, or take the slot off when `item` is `None`
pub fn add_armor_model(
    ctx: &mut RenderContext<'_>,
    entity: NodeId,
    slot: ArmorSlot,
    item: Option<&Item>,
    layer: u8,
    overlay: bool,
) {
    let Some(item) = item else {
        remove_armor_model(ctx, entity, slot);
        return;
    };

    let is_player_head = slot == ArmorSlot::Head && item.name == "player_head";
    let mut texture_path = None;
    if is_player_head {
        remove_armor_model(ctx, entity, slot);
        match &item.nbt {
            Some(nbt) => match player_head_skin_url(nbt, ctx.config.skin_textures_proxy.as_deref()) {
                Ok(url) => texture_path = url,
                Err(err) => log::error!("Error decoding player head texture: {}", err),
            },
            None => texture_path = Some(STEVE_SKIN_URL.to_string()),
        }
    }

    let material_name = item.material();
    if texture_path.is_none() {
        let texture_name = format!("{material_name}_layer_{layer}{}", if overlay { "_overlay" } else { "" });
        texture_path = ctx
            .provider
            .custom_armor_texture(&texture_name)
            .or_else(|| ctx.provider.default_armor_texture(&texture_name));
    }
    let (Some(texture_path), Some(model)) = (texture_path, ctx.provider.armor_model(slot)) else {
        remove_armor_model(ctx, entity, slot);
        return;
    };

    let mesh_name = armor_node_name(slot, overlay);
    let piece = match ctx.graph.find_last_child(entity, &mesh_name) {
        Some(existing) => {
            let old = ctx
                .graph
                .get_mut(existing)
                .map(|n| std::mem::take(&mut n.owned_textures))
                .unwrap_or_default();
            ctx.textures.dispose_all(old);
            existing
        }
        None => {
            let piece = ctx.instantiate_model(entity, &model);
            if let Some(node) = ctx.graph.get_mut(piece) {
                node.name.clone_from(&mesh_name);
            }
            if slot == ArmorSlot::Head {
                // lift off the head surface to avoid z-fighting
                if let Some(node) = ctx.graph.child_at(piece, 0).and_then(|c| ctx.graph.get_mut(c)) {
                    node.transform.position.y += 0.01;
                }
            }
            for_each_material(ctx.graph, piece, |m| m.double_sided = !is_player_head);
            piece
        }
    };

    let texture = ctx.textures.insert(Texture {
        flip_y: false,
        mirrored_wrap: true,
        ..Texture::pixelated(TextureSource::Url(texture_path))
    });
    if let Some(node) = ctx.graph.get_mut(piece) {
        node.owned_textures.push(texture);
    }

    let tinted = material_name == "leather" && !overlay;
    let color = if tinted { leather_color(item) } else { Color::WHITE };
    for_each_material(ctx.graph, piece, |m| {
        m.map = Some(texture);
        m.color = color;
    });

    if tinted {
        add_armor_model(ctx, entity, slot, Some(item), layer, true);
    } else if !overlay {
        // a previous leather piece may have left its overlay behind
        if let Some(stale) = ctx.graph.find_child(entity, &armor_node_name(slot, true)) {
            ctx.destroy_node(stale);
        }
    }
}

/// Copy leg and head rotations of a player rig onto its armor pieces
pub fn sync_armor_to_rig(graph: &mut SceneGraph, entity: NodeId, rig: &PlayerRig) {
    let bone_rotation = |graph: &SceneGraph, bone: NodeId| graph.get(bone).map(|n| n.transform.rotation);
    let (Some(head), Some(left_leg), Some(right_leg)) = (
        bone_rotation(graph, rig.bones.head),
        bone_rotation(graph, rig.bones.left_leg),
        bone_rotation(graph, rig.bones.right_leg),
    ) else {
        return;
    };
    let mirrored = |r: Euler| Euler::with_order(-r.x, r.y, r.z, r.order);

    for piece in graph.children(entity).to_vec() {
        let Some(name) = graph.get(piece).map(|n| n.name.clone()) else {
            continue;
        };
        let Some(parts) = graph.child_at(piece, 0) else {
            continue;
        };
        let targets: Vec<(usize, Euler)> = match name.as_str() {
            "geometry_armor_head" => vec![(0, mirrored(head))],
            "geometry_armor_legs" => vec![(2, mirrored(left_leg)), (1, mirrored(right_leg))],
            "geometry_armor_feet" => vec![
                (0, mirrored(right_leg)),
                (1, Euler::with_order(-left_leg.x, left_leg.y, -left_leg.z, left_leg.order)),
            ],
            _ => continue,
        };
        for (index, rotation) in targets {
            if let Some(node) = graph.child_at(parts, index).and_then(|c| graph.get_mut(c)) {
                node.transform.rotation = rotation;
            }
        }
    }
}

/// Attach `item` to the hand bone of `entity`, replacing the previous item
pub fn add_item_model(ctx: &mut RenderContext<'_>, entity: NodeId, hand: Hand, item: Option<&Item>, is_player: bool) {
    let item_name = format!("custom_item_{}", hand.as_str());
    for existing in ctx.graph.descendants_named(entity, &item_name) {
        ctx.destroy_node(existing);
    }
    let Some(item) = item else {
        return;
    };
    let Some(item_mesh) = get_item_mesh(ctx, item, DisplayContext::Thirdperson, false, None) else {
        return;
    };

    let bedrock_bone = format!("bone_{}item", hand.as_str());
    let arm_bone = format!("{}Arm", hand.as_str());
    let bone = ctx.graph.traverse(entity).into_iter().skip(1).find(|&id| {
        ctx.graph
            .get(id)
            .is_some_and(|n| n.name.to_lowercase() == bedrock_bone || n.name == arm_bone)
    });
    let Some(bone) = bone else {
        log::debug!("No hand bone for {} on entity node {:?}", item_name, entity);
        ctx.destroy_node(item_mesh.node);
        return;
    };

    let mut group = SceneNode::group(item_name);
    group.transform.rotation.z = -PI / 16.0;
    if item_mesh.is_block {
        group.transform.rotation.y = PI / 4.0;
    } else {
        if let Some(mesh) = ctx.graph.get_mut(item_mesh.node) {
            mesh.transform.rotation.z = -PI / 4.0;
        }
        group.transform.rotation.y = PI / 2.0;
        group.transform.scale *= 2.0;
    }
    if is_player {
        group.transform.position.x = if hand == Hand::Left { 1.0 } else { -1.0 };
        group.transform.position.y = -8.0;
        group.transform.position.z = 5.0;
        group.transform.rotation.x = PI;
    }

    let group = ctx.graph.spawn(bone, group);
    ctx.graph.add_child(group, item_mesh.node);
}
