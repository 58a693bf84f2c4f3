//! Armor stand flags and bone poses

use super::pose::{pose_to_euler, rotations};
use crate::data::{ArmorStandFlags, EntityMetadata, MetadataValue};
use crate::foundation::math::Vec3;
use crate::scene::{NodeId, SceneGraph};

/// Hide a bone by collapsing its scale
fn set_scaled_visible(graph: &mut SceneGraph, id: NodeId, visible: bool) {
    if let Some(node) = graph.get_mut(id) {
        node.transform.scale = if visible { Vec3::repeat(1.0) } else { Vec3::zeros() };
    }
}

/// Apply client flags and poses to an armor stand.
///
/// `entity` is the scene entity root, `mesh` the provider model below it.
/// Arm and leg bones read the opposite side's pose key, the bone names in
/// the model being mirrored relative to the metadata.
pub fn apply_armor_stand_pose(graph: &mut SceneGraph, entity: NodeId, mesh: Option<NodeId>, meta: &EntityMetadata<'_>) {
    let flags = ArmorStandFlags::from_bits_truncate(meta.get("client_flags").map_or(0, MetadataValue::as_flags));
    let has_arms = flags.contains(ArmorStandFlags::ARMS);
    let has_baseplate = !flags.contains(ArmorStandFlags::NO_BASEPLATE);
    let is_marker = flags.contains(ArmorStandFlags::MARKER);

    if let Some(node) = mesh.and_then(|m| graph.get_mut(m)) {
        node.cast_shadow = !is_marker;
        node.receive_shadow = !is_marker;
    }
    let Some(root) = graph.get_mut(entity) else {
        return;
    };
    root.transform.set_uniform_scale(if flags.contains(ArmorStandFlags::SMALL) { 0.5 } else { 1.0 });
    let root_yaw = root.transform.rotation.y;

    let right_arm_default = rotations(-10.0, -10.0, 0.0);
    let left_arm_default = rotations(-10.0, 10.0, 0.0);
    let right_leg_default = rotations(-1.0, -1.0, 0.0);
    let left_leg_default = rotations(1.0, 1.0, 0.0);

    for id in graph.traverse(entity) {
        let Some(name) = graph.get(id).map(|n| n.name.clone()) else {
            continue;
        };
        let under_armor = graph
            .parent(id)
            .and_then(|p| graph.get(p))
            .is_some_and(|p| p.name == "bone_armor");

        let pose = match name.as_str() {
            "bone_baseplate" => {
                set_scaled_visible(graph, id, has_baseplate);
                if let Some(node) = graph.get_mut(id) {
                    node.transform.rotation.y = -root_yaw;
                }
                continue;
            }
            "bone_head" => meta.get("head_pose"),
            "bone_body" => meta.get("body_pose"),
            "bone_rightarm" | "bone_leftarm" => {
                if !under_armor {
                    set_scaled_visible(graph, id, has_arms);
                }
                Some(if name == "bone_rightarm" {
                    meta.get("left_arm_pose").unwrap_or(&right_arm_default)
                } else {
                    meta.get("right_arm_pose").unwrap_or(&left_arm_default)
                })
            }
            "bone_rightleg" => Some(meta.get("left_leg_pose").unwrap_or(&right_leg_default)),
            "bone_leftleg" => Some(meta.get("right_leg_pose").unwrap_or(&left_leg_default)),
            _ => continue,
        };

        if let (Some(pose), Some(node)) = (pose, graph.get_mut(id)) {
            node.transform.set_rotation_from_euler(pose_to_euler(Some(pose)));
        }
    }
}
