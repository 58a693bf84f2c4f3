//! Player rig
//!
//! A 64x64-skin player model built from boxes in pixel units. The wrapper
//! node scales it down to blocks and turns it to face +Z like other entity
//! models. Skin, cape and ears textures are owned by the wrapper so that
//! destroying the entity releases them.

use super::animation::WalkingGeneralSwing;
use super::skin::SkinModel;
use crate::foundation::math::Vec3;
use crate::scene::{
    Geometry, Material, MaterialKind, NodeId, NodeKind, SceneGraph, SceneNode, Texture, TextureId, TextureSource, TextureStore,
};
use std::f32::consts::PI;

/// Height of the rig origin above the feet, in pixels
pub const RIG_ORIGIN_HEIGHT: f32 = 16.0;

/// Pixels per block
pub const PIXELS_PER_BLOCK: f32 = 16.0;

const INNER_LAYER: &str = "inner";
const OUTER_LAYER: &str = "outer";

/// What hangs on the player's back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackEquipment {
    /// Cape
    Cape,
    /// Elytra wings
    Elytra,
}

/// Node ids of a player rig
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RigBones {
    /// Outer group: block scale, turned around Y
    pub wrapper: NodeId,
    /// Rig origin, raised to hip height
    pub player: NodeId,
    /// Parent of all skin covered bones
    pub skin: NodeId,
    /// Head
    pub head: NodeId,
    /// Torso
    pub body: NodeId,
    /// Left arm
    pub left_arm: NodeId,
    /// Right arm
    pub right_arm: NodeId,
    /// Left leg
    pub left_leg: NodeId,
    /// Right leg
    pub right_leg: NodeId,
    /// Cape
    pub cape: NodeId,
    /// Elytra wings
    pub elytra: NodeId,
    /// Ears, below the head
    pub ears: NodeId,
}

fn skin_box(width: f32, height: f32, depth: f32, offset: Vec3) -> Geometry {
    Geometry::Box { width, height, depth, offset }
}

/// Bone group with an inner and a slightly inflated outer layer
fn spawn_bone(graph: &mut SceneGraph, parent: NodeId, name: &str, position: Vec3, size: Vec3, offset: Vec3) -> NodeId {
    let bone = graph.spawn(parent, SceneNode::group(name).at(position));
    graph.spawn(
        bone,
        SceneNode::mesh(
            INNER_LAYER,
            skin_box(size.x, size.y, size.z, offset),
            vec![Material::cutout(MaterialKind::Standard, None)],
        ),
    );
    let mut outer_material = Material::cutout(MaterialKind::Standard, None);
    outer_material.double_sided = true;
    let inflated = size + Vec3::repeat(1.0);
    graph.spawn(
        bone,
        SceneNode::mesh(OUTER_LAYER, skin_box(inflated.x, inflated.y, inflated.z, offset), vec![outer_material]),
    );
    bone
}

/// Build the rig nodes below `parent`
pub fn build_rig_bones(graph: &mut SceneGraph, parent: NodeId) -> RigBones {
    let mut wrapper = SceneNode::group("player_wrapper");
    wrapper.transform.set_uniform_scale(1.0 / PIXELS_PER_BLOCK);
    wrapper.transform.rotation.y = PI;
    let wrapper = graph.spawn(parent, wrapper);
    let player = graph.spawn(wrapper, SceneNode::group("player").at(Vec3::new(0.0, RIG_ORIGIN_HEIGHT, 0.0)));
    let skin = graph.spawn(player, SceneNode::group("skin"));

    let limb = Vec3::new(4.0, 12.0, 4.0);
    let head = spawn_bone(graph, skin, "head", Vec3::new(0.0, 8.0, 0.0), Vec3::repeat(8.0), Vec3::new(0.0, 4.0, 0.0));
    let body = spawn_bone(graph, skin, "body", Vec3::new(0.0, 8.0, 0.0), Vec3::new(8.0, 12.0, 4.0), Vec3::new(0.0, -6.0, 0.0));
    let right_arm = spawn_bone(graph, skin, "rightArm", Vec3::new(-6.0, 6.0, 0.0), limb, Vec3::new(0.0, -4.0, 0.0));
    let left_arm = spawn_bone(graph, skin, "leftArm", Vec3::new(6.0, 6.0, 0.0), limb, Vec3::new(0.0, -4.0, 0.0));
    let right_leg = spawn_bone(graph, skin, "rightLeg", Vec3::new(-2.0, -4.0, 0.0), limb, Vec3::new(0.0, -6.0, 0.0));
    let left_leg = spawn_bone(graph, skin, "leftLeg", Vec3::new(2.0, -4.0, 0.0), limb, Vec3::new(0.0, -6.0, 0.0));

    let mut ears = SceneNode::mesh(
        "ears",
        skin_box(14.0, 7.0, 1.0, Vec3::zeros()),
        vec![Material::cutout(MaterialKind::Standard, None)],
    )
    .at(Vec3::new(0.0, 10.0, 0.0));
    ears.visible = false;
    let ears = graph.spawn(head, ears);

    let mut cape = SceneNode::group("cape").at(Vec3::new(0.0, 8.0, -2.0));
    cape.transform.rotation.y = PI;
    cape.visible = false;
    let cape = graph.spawn(player, cape);
    graph.spawn(
        cape,
        SceneNode::mesh(
            "cape_mesh",
            skin_box(10.0, 16.0, 1.0, Vec3::new(0.0, -8.0, 0.5)),
            vec![Material::cutout(MaterialKind::Standard, None)],
        ),
    );

    let mut elytra = SceneNode::group("elytra").at(Vec3::new(0.0, 8.0, -2.0));
    elytra.visible = false;
    let elytra = graph.spawn(player, elytra);
    for (name, x) in [("left_wing", 5.0), ("right_wing", -5.0)] {
        let mut material = Material::cutout(MaterialKind::Standard, None);
        material.double_sided = true;
        graph.spawn(
            elytra,
            SceneNode::mesh(name, skin_box(12.0, 22.0, 4.0, Vec3::new(0.0, -11.0, -2.0)), vec![material])
                .at(Vec3::new(x, 0.0, 0.0)),
        );
    }

    RigBones {
        wrapper,
        player,
        skin,
        head,
        body,
        left_arm,
        right_arm,
        left_leg,
        right_leg,
        cape,
        elytra,
        ears,
    }
}

/// Player model with its textures and animation
#[derive(Debug, Clone)]
pub struct PlayerRig {
    /// Scene nodes
    pub bones: RigBones,
    /// Limb animation
    pub animation: WalkingGeneralSwing,
    /// Arm width in use
    pub model_type: SkinModel,
    /// Cape, elytra or nothing
    pub back_equipment: Option<BackEquipment>,
    /// UUID the player joined with
    pub real_uuid: String,
    /// Username the player joined with
    pub real_username: String,
    skin_texture: Option<TextureId>,
    cape_texture: Option<TextureId>,
    ears_texture: Option<TextureId>,
}

impl PlayerRig {
    /// Build a rig below `parent` with an idle animation
    pub fn build(graph: &mut SceneGraph, parent: NodeId, uuid: &str, username: &str) -> Self {
        Self {
            bones: build_rig_bones(graph, parent),
            animation: WalkingGeneralSwing::new(),
            model_type: SkinModel::Default,
            back_equipment: None,
            real_uuid: uuid.to_string(),
            real_username: username.to_string(),
            skin_texture: None,
            cape_texture: None,
            ears_texture: None,
        }
    }

    /// Current skin texture
    pub fn skin_texture(&self) -> Option<TextureId> {
        self.skin_texture
    }

    /// Current cape texture, shared with the elytra
    pub fn cape_texture(&self) -> Option<TextureId> {
        self.cape_texture
    }

    /// Current ears texture
    pub fn ears_texture(&self) -> Option<TextureId> {
        self.ears_texture
    }

    /// Dispose `old`, hand `new` to the wrapper
    fn swap_owned(&self, graph: &mut SceneGraph, textures: &mut TextureStore, old: Option<TextureId>, new: Option<TextureId>) {
        if let Some(wrapper) = graph.get_mut(self.bones.wrapper) {
            if let Some(old) = old {
                wrapper.owned_textures.retain(|&t| t != old);
            }
            wrapper.owned_textures.extend(new);
        }
        if let Some(old) = old {
            textures.dispose(old);
        }
    }

    fn set_map(graph: &mut SceneGraph, root: NodeId, map: Option<TextureId>, filter: impl Fn(&str) -> bool) {
        for id in graph.traverse(root) {
            if let Some(node) = graph.get_mut(id) {
                if filter(&node.name) {
                    for material in node.materials_mut() {
                        material.map = map;
                    }
                }
            }
        }
    }

    /// Replace the skin texture and arm width
    pub fn set_skin(&mut self, graph: &mut SceneGraph, textures: &mut TextureStore, source: TextureSource, model: SkinModel) {
        let texture = textures.insert(Texture::pixelated(source));
        self.swap_owned(graph, textures, self.skin_texture, Some(texture));
        self.skin_texture = Some(texture);
        Self::set_map(graph, self.bones.skin, Some(texture), |name| name == INNER_LAYER || name == OUTER_LAYER);
        self.set_model_type(graph, model);
    }

    /// Switch between wide and slim arms
    pub fn set_model_type(&mut self, graph: &mut SceneGraph, model: SkinModel) {
        self.model_type = model;
        let (width, shift) = match model {
            SkinModel::Default => (4.0, 0.0),
            SkinModel::Slim => (3.0, 0.5),
        };
        for (arm, side) in [(self.bones.right_arm, 1.0), (self.bones.left_arm, -1.0)] {
            for layer in graph.children(arm).to_vec() {
                let Some(node) = graph.get_mut(layer) else {
                    continue;
                };
                let inflate = if node.name == OUTER_LAYER { 1.0 } else { 0.0 };
                if let NodeKind::Mesh { geometry: Geometry::Box { width: w, offset, .. }, .. } = &mut node.kind {
                    *w = width + inflate;
                    offset.x = shift * side;
                }
            }
        }
    }

    /// Show ears with `source`, or hide them
    pub fn set_ears(&mut self, graph: &mut SceneGraph, textures: &mut TextureStore, source: Option<TextureSource>) {
        let texture = source.map(|s| textures.insert(Texture::pixelated(s)));
        self.swap_owned(graph, textures, self.ears_texture, texture);
        self.ears_texture = texture;
        Self::set_map(graph, self.bones.ears, texture, |_| true);
        if let Some(node) = graph.get_mut(self.bones.ears) {
            node.visible = texture.is_some();
        }
    }

    /// Use `source` for the cape and the elytra
    pub fn set_cape(&mut self, graph: &mut SceneGraph, textures: &mut TextureStore, source: TextureSource) {
        let texture = textures.insert(Texture::pixelated(source));
        self.swap_owned(graph, textures, self.cape_texture, Some(texture));
        self.cape_texture = Some(texture);
        Self::set_map(graph, self.bones.cape, Some(texture), |_| true);
        Self::set_map(graph, self.bones.elytra, Some(texture), |_| true);
        if self.back_equipment.is_none() {
            self.back_equipment = Some(BackEquipment::Cape);
        }
        self.refresh_back(graph);
    }

    /// Drop the cape texture and back equipment
    pub fn clear_cape(&mut self, graph: &mut SceneGraph, textures: &mut TextureStore) {
        self.swap_owned(graph, textures, self.cape_texture, None);
        self.cape_texture = None;
        Self::set_map(graph, self.bones.cape, None, |_| true);
        Self::set_map(graph, self.bones.elytra, None, |_| true);
        self.back_equipment = None;
        self.refresh_back(graph);
    }

    /// Choose what hangs on the back
    pub fn set_back_equipment(&mut self, graph: &mut SceneGraph, equipment: Option<BackEquipment>) {
        self.back_equipment = equipment;
        self.refresh_back(graph);
    }

    /// Hide the cape until a texture arrives
    pub fn hide_cape(&self, graph: &mut SceneGraph) {
        if let Some(node) = graph.get_mut(self.bones.cape) {
            node.visible = false;
        }
    }

    fn refresh_back(&self, graph: &mut SceneGraph) {
        let cape_visible = self.back_equipment == Some(BackEquipment::Cape) && self.cape_texture.is_some();
        let elytra_visible = self.back_equipment == Some(BackEquipment::Elytra);
        if let Some(node) = graph.get_mut(self.bones.cape) {
            node.visible = cape_visible;
        }
        if let Some(node) = graph.get_mut(self.bones.elytra) {
            node.visible = elytra_visible;
        }
    }

    /// Advance the limb animation
    pub fn animate(&mut self, graph: &mut SceneGraph, dt: f32) {
        self.animation.update(graph, &self.bones, dt);
    }

    /// Y of a name tag above the head, in wrapper units
    pub fn name_tag_height(&self, graph: &SceneGraph) -> f32 {
        let (y, scale) = graph
            .get(self.bones.player)
            .map_or((RIG_ORIGIN_HEIGHT, 1.0), |n| (n.transform.position.y, n.transform.scale.y));
        y + scale * 16.0 + 3.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rig() -> (SceneGraph, TextureStore, PlayerRig) {
        let mut graph = SceneGraph::new();
        let root = graph.root();
        let rig = PlayerRig::build(&mut graph, root, "uuid-1", "Steve");
        (graph, TextureStore::new(), rig)
    }

    #[test]
    fn test_rig_layout() {
        let (graph, _, rig) = rig();
        let wrapper = graph.get(rig.bones.wrapper).unwrap();
        assert_relative_eq!(wrapper.transform.scale.x, 1.0 / 16.0);
        assert_relative_eq!(wrapper.transform.rotation.y, PI);
        assert_eq!(graph.find_descendant(rig.bones.wrapper, "rightArm"), Some(rig.bones.right_arm));
        assert_eq!(graph.find_descendant(rig.bones.wrapper, "head"), Some(rig.bones.head));
        assert!(!graph.get(rig.bones.cape).unwrap().visible);
        assert!(!graph.get(rig.bones.ears).unwrap().visible);
        assert_relative_eq!(rig.name_tag_height(&graph), 35.0);
        assert_eq!(rig.real_username, "Steve");
    }

    #[test]
    fn test_skin_replaced_and_disposed() {
        let (mut graph, mut textures, mut rig) = rig();
        rig.set_skin(&mut graph, &mut textures, TextureSource::Url("a.png".into()), SkinModel::Default);
        let first = rig.skin_texture().unwrap();
        rig.set_skin(&mut graph, &mut textures, TextureSource::Url("b.png".into()), SkinModel::Slim);

        assert!(!textures.contains(first));
        assert_eq!(textures.live_count(), 1);
        let head_layer = graph.child_at(rig.bones.head, 0).unwrap();
        assert_eq!(graph.get(head_layer).unwrap().materials()[0].map, rig.skin_texture());
        assert_eq!(graph.get(rig.bones.wrapper).unwrap().owned_textures, vec![rig.skin_texture().unwrap()]);

        let arm_layer = graph.get(graph.child_at(rig.bones.right_arm, 0).unwrap()).unwrap();
        match &arm_layer.kind {
            NodeKind::Mesh { geometry: Geometry::Box { width, offset, .. }, .. } => {
                assert_relative_eq!(*width, 3.0);
                assert_relative_eq!(offset.x, 0.5);
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_cape_and_elytra_visibility() {
        let (mut graph, mut textures, mut rig) = rig();
        rig.set_cape(&mut graph, &mut textures, TextureSource::Url("cape.png".into()));
        assert_eq!(rig.back_equipment, Some(BackEquipment::Cape));
        assert!(graph.get(rig.bones.cape).unwrap().visible);

        rig.set_back_equipment(&mut graph, Some(BackEquipment::Elytra));
        assert!(!graph.get(rig.bones.cape).unwrap().visible);
        assert!(graph.get(rig.bones.elytra).unwrap().visible);
        let wing = graph.child_at(rig.bones.elytra, 0).unwrap();
        assert_eq!(graph.get(wing).unwrap().materials()[0].map, rig.cape_texture());

        rig.clear_cape(&mut graph, &mut textures);
        assert_eq!(textures.live_count(), 0);
        assert!(!graph.get(rig.bones.elytra).unwrap().visible);
    }

    #[test]
    fn test_ears_toggle() {
        let (mut graph, mut textures, mut rig) = rig();
        rig.set_ears(&mut graph, &mut textures, Some(TextureSource::Url("ears".into())));
        assert!(graph.get(rig.bones.ears).unwrap().visible);
        rig.set_ears(&mut graph, &mut textures, None);
        assert!(!graph.get(rig.bones.ears).unwrap().visible);
        assert_eq!(textures.live_count(), 0);
    }
}
