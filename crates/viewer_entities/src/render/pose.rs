//! Rotation values carried in entity metadata

use crate::data::MetadataValue;
use crate::foundation::math::{deg_to_rad, quat_from_xyzw, Euler, EulerOrder, Quat};

/// Quaternion from a `{x, y, z, w}` value or a `[x, y, z, w]` array
pub fn to_quaternion(value: &MetadataValue) -> Option<Quat> {
    match value {
        MetadataValue::Quaternion { x, y, z, w } => Some(quat_from_xyzw(*x, *y, *z, *w)),
        MetadataValue::Array(v) if v.len() >= 4 => Some(quat_from_xyzw(v[0], v[1], v[2], v[3])),
        _ => None,
    }
}

/// Euler rotation of an armor stand pose.
///
/// * `{pitch, yaw, roll}` in degrees: ZYX order, pitch and yaw negated
/// * `{x, y, z}` in radians: ZYX order with X and Z swapped
/// * `[x, y, z]` in radians: XYZ order
///
/// Anything else yields the identity rotation.
pub fn pose_to_euler(value: Option<&MetadataValue>) -> Euler {
    match value {
        Some(MetadataValue::Rotations { pitch, yaw, roll }) => Euler::with_order(
            -deg_to_rad(*pitch),
            -deg_to_rad(*yaw),
            deg_to_rad(*roll),
            EulerOrder::Zyx,
        ),
        Some(MetadataValue::Vector { x, y, z }) => Euler::with_order(*z, *y, *x, EulerOrder::Zyx),
        Some(MetadataValue::Array(v)) if v.len() >= 3 => Euler::new(v[0], v[1], v[2]),
        _ => Euler::default(),
    }
}

/// Pose from degrees, as used for the built-in armor stand defaults
pub fn rotations(pitch: f32, yaw: f32, roll: f32) -> MetadataValue {
    MetadataValue::Rotations { pitch, yaw, roll }
}
