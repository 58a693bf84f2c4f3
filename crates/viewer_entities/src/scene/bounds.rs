//! Axis-aligned bounds used by debug helpers and scene raycasts

use crate::foundation::math::Vec3;

/// Axis-Aligned Bounding Box for spatial queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Box standing on the origin with the footprint `width x width`
    pub fn entity_box(width: f32, height: f32) -> Self {
        let half = width / 2.0;
        Self {
            min: Vec3::new(-half, 0.0, -half),
            max: Vec3::new(half, height, half),
        }
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Same box moved by `offset`
    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Test ray intersection with this AABB using slab method
    /// Returns the distance to the entry point if the ray intersects, None otherwise
    pub fn intersect_ray(&self, ray_origin: Vec3, ray_dir: Vec3) -> Option<f32> {
        let inv_dir = Vec3::new(
            if ray_dir.x != 0.0 { 1.0 / ray_dir.x } else { f32::INFINITY },
            if ray_dir.y != 0.0 { 1.0 / ray_dir.y } else { f32::INFINITY },
            if ray_dir.z != 0.0 { 1.0 / ray_dir.z } else { f32::INFINITY },
        );

        let t1 = (self.min.x - ray_origin.x) * inv_dir.x;
        let t2 = (self.max.x - ray_origin.x) * inv_dir.x;
        let t3 = (self.min.y - ray_origin.y) * inv_dir.y;
        let t4 = (self.max.y - ray_origin.y) * inv_dir.y;
        let t5 = (self.min.z - ray_origin.z) * inv_dir.z;
        let t6 = (self.max.z - ray_origin.z) * inv_dir.z;

        let tmin = t1.min(t2).max(t3.min(t4)).max(t5.min(t6));
        let tmax = t1.max(t2).min(t3.max(t4)).min(t5.max(t6));

        // Ray intersects if tmax >= tmin and tmax >= 0
        if tmax >= tmin && tmax >= 0.0 {
            // Entry point distance, or 0 when the origin is inside the box
            Some(tmin.max(0.0))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_box_footprint() {
        let aabb = Aabb::entity_box(0.6, 1.8);
        assert!(aabb.contains_point(Vec3::new(0.0, 0.9, 0.0)));
        assert!(aabb.contains_point(Vec3::new(0.3, 1.8, -0.3)));
        assert!(!aabb.contains_point(Vec3::new(0.0, -0.1, 0.0)));
        assert_eq!(aabb.center(), Vec3::new(0.0, 0.9, 0.0));
    }

    #[test]
    fn test_ray_hits_translated_box() {
        let aabb = Aabb::entity_box(1.0, 2.0).translated(Vec3::new(0.0, 0.0, -5.0));
        let hit = aabb.intersect_ray(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, -1.0));
        assert_eq!(hit, Some(4.5));

        let miss = aabb.intersect_ray(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(miss, None);
    }

    #[test]
    fn test_ray_from_inside_reports_zero() {
        let aabb = Aabb::entity_box(2.0, 2.0);
        let hit = aabb.intersect_ray(Vec3::new(0.0, 1.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(hit, Some(0.0));
    }
}
