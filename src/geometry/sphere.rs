use crate::geometry::Ray;
use ultraviolet::{Vec3, Vec3x8};
use wide::{CmpGt, CmpLt, f32x8};

/// Represents a sphere in 3D space
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SphereData {
    /// Center of the sphere
    pub center: Vec3,
    radius: f32,
    r_sq: f32,
}

impl SphereData {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self {
            center,
            radius,
            r_sq: radius * radius,
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// Nearest root of the ray inside `(t_near, t_far)`.
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        // direction is normalized, so the quadratic's `a` is 1
        let oc = ray.origin - self.center;
        let b = ray.direction.dot(oc);
        let c = oc.dot(oc) - self.r_sq;
        let discriminant = b.mul_add(b, -c);
        if discriminant < 0.0 {
            return None;
        }
        let sqrt = discriminant.sqrt();
        [-b - sqrt, -b + sqrt]
            .into_iter()
            .find(|&t| t > ray.t_near && t < ray.t_far)
    }

    pub fn normal_at(&self, point: Vec3) -> Vec3 {
        (point - self.center) / self.radius
    }

    /// Eight rays against this sphere at once. Lanes without a root in `(t_near, t_far)`
    /// come back as infinity.
    pub fn intersect_x8(
        &self,
        origins: Vec3x8,
        directions: Vec3x8,
        t_near: f32x8,
        t_far: f32x8,
    ) -> f32x8 {
        let center = Vec3x8::splat(self.center);
        let r_sq = f32x8::splat(self.r_sq);
        let zero = f32x8::ZERO;
        let invalid = f32x8::splat(f32::INFINITY);

        let oc = origins - center;
        let b = directions.dot(oc);
        let c = oc.dot(oc) - r_sq;
        let discriminant = b * b - c;

        let discriminant_pos = !discriminant.cmp_lt(zero);
        if discriminant_pos.none() {
            return invalid;
        }

        let sqrt = discriminant.max(zero).sqrt();
        let t0 = -b - sqrt;
        let t1 = -b + sqrt;

        let t0_valid = discriminant_pos & t0.cmp_gt(t_near) & t0.cmp_lt(t_far);
        let t1_valid = discriminant_pos & t1.cmp_gt(t_near) & t1.cmp_lt(t_far);

        // t0 is the nearer root whenever it is valid
        t0_valid.blend(t0, t1_valid.blend(t1, invalid))
    }
}
