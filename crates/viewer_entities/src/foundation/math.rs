//! Math utilities and types
//!
//! Provides the vector and rotation types used by the scene graph. Node
//! rotations are stored as Euler angles so individual axes can be driven
//! directly (entity yaw, bone pitch), and converted to quaternions whenever
//! rotations have to be composed.

pub use nalgebra::{Quaternion, Unit, Vector2, Vector3};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Convert degrees to radians
pub fn deg_to_rad(degrees: f32) -> f32 {
    degrees.to_radians()
}

/// Build a unit quaternion from raw `x, y, z, w` components
pub fn quat_from_xyzw(x: f32, y: f32, z: f32, w: f32) -> Quat {
    Unit::new_normalize(Quaternion::new(w, x, y, z))
}

/// Order in which Euler angles are applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EulerOrder {
    /// Rotation matrix is `Rx * Ry * Rz`
    #[default]
    Xyz,
    /// Rotation matrix is `Rz * Ry * Rx`
    Zyx,
}

/// Euler rotation in radians
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Euler {
    /// Rotation around X
    pub x: f32,
    /// Rotation around Y
    pub y: f32,
    /// Rotation around Z
    pub z: f32,
    /// Application order
    pub order: EulerOrder,
}

impl Euler {
    /// Create an XYZ-ordered rotation
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z, order: EulerOrder::Xyz }
    }

    /// Create a rotation with an explicit order
    pub fn with_order(x: f32, y: f32, z: f32, order: EulerOrder) -> Self {
        Self { x, y, z, order }
    }

    /// Set all three angles and the order at once
    pub fn set(&mut self, x: f32, y: f32, z: f32, order: EulerOrder) {
        self.x = x;
        self.y = y;
        self.z = z;
        self.order = order;
    }

    /// Convert to a quaternion
    pub fn to_quaternion(&self) -> Quat {
        let (s1, c1) = (self.x / 2.0).sin_cos();
        let (s2, c2) = (self.y / 2.0).sin_cos();
        let (s3, c3) = (self.z / 2.0).sin_cos();

        let (x, y, z, w) = match self.order {
            EulerOrder::Xyz => (
                s1 * c2 * c3 + c1 * s2 * s3,
                c1 * s2 * c3 - s1 * c2 * s3,
                c1 * c2 * s3 + s1 * s2 * c3,
                c1 * c2 * c3 - s1 * s2 * s3,
            ),
            EulerOrder::Zyx => (
                s1 * c2 * c3 - c1 * s2 * s3,
                c1 * s2 * c3 + s1 * c2 * s3,
                c1 * c2 * s3 - s1 * s2 * c3,
                c1 * c2 * c3 + s1 * s2 * s3,
            ),
        };
        quat_from_xyzw(x, y, z, w)
    }

    /// Decompose a quaternion into Euler angles of the given order
    pub fn from_quaternion(q: &Quat, order: EulerOrder) -> Self {
        let rotation = q.to_rotation_matrix();
        let m = rotation.matrix();
        let (m11, m12, m13) = (m[(0, 0)], m[(0, 1)], m[(0, 2)]);
        let (m21, m22, m23) = (m[(1, 0)], m[(1, 1)], m[(1, 2)]);
        let (m31, m32, m33) = (m[(2, 0)], m[(2, 1)], m[(2, 2)]);

        match order {
            EulerOrder::Xyz => {
                let y = m13.clamp(-1.0, 1.0).asin();
                let (x, z) = if m13.abs() < 0.999_999_9 {
                    ((-m23).atan2(m33), (-m12).atan2(m11))
                } else {
                    (m32.atan2(m22), 0.0)
                };
                Self::with_order(x, y, z, order)
            }
            EulerOrder::Zyx => {
                let y = (-m31.clamp(-1.0, 1.0)).asin();
                let (x, z) = if m31.abs() < 0.999_999_9 {
                    (m32.atan2(m33), m21.atan2(m11))
                } else {
                    (0.0, (-m12).atan2(m22))
                };
                Self::with_order(x, y, z, order)
            }
        }
    }
}

/// Local transform of a scene node
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Position relative to the parent
    pub position: Vec3,
    /// Rotation relative to the parent
    pub rotation: Euler,
    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Euler::default(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create an identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Set a uniform scale
    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.scale = Vec3::new(scale, scale, scale);
    }

    /// Rotation as a quaternion
    pub fn quaternion(&self) -> Quat {
        self.rotation.to_quaternion()
    }

    /// Replace the rotation, keeping the current Euler order
    pub fn set_rotation_from_quaternion(&mut self, q: &Quat) {
        self.rotation = Euler::from_quaternion(q, self.rotation.order);
    }

    /// Replace the rotation with the given Euler angles
    pub fn set_rotation_from_euler(&mut self, euler: Euler) {
        // the quaternion round trip re-expresses the angles in our order
        let q = euler.to_quaternion();
        self.set_rotation_from_quaternion(&q);
    }

    /// Rotate around the local Y axis
    pub fn rotate_y(&mut self, angle: f32) {
        let q = self.quaternion() * Quat::from_axis_angle(&Vec3::y_axis(), angle);
        self.set_rotation_from_quaternion(&q);
    }

    /// Rotate around the local Z axis
    pub fn rotate_z(&mut self, angle: f32) {
        let q = self.quaternion() * Quat::from_axis_angle(&Vec3::z_axis(), angle);
        self.set_rotation_from_quaternion(&q);
    }

    /// Pre-multiply the rotation by `q` and rotate the position with it
    pub fn apply_quaternion(&mut self, q: &Quat) {
        self.position = q * self.position;
        let rotated = q * self.quaternion();
        self.set_rotation_from_quaternion(&rotated);
    }

    /// Transform a point from local space into parent space
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.quaternion() * self.scale.component_mul(&point)
    }
}
