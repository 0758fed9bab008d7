use crate::geometry::Ray;
use ultraviolet::Vec3;

/// Represents a triangle in 3D space
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TriangleData {
    /// The three vertices of the triangle
    ///        v3
    ///         *
    ///         |\
    ///         | \
    ///      e2 |  \
    ///         |   \
    ///         *----*
    ///        v1 e1 v2
    pub vertex1: Vec3,
    pub vertex2: Vec3,
    pub vertex3: Vec3,

    edge1: Vec3,
    edge2: Vec3,

    /// Pre-computed face normal
    pub normal: Vec3,
}

impl TriangleData {
    pub fn new(vertex1: Vec3, vertex2: Vec3, vertex3: Vec3) -> Self {
        let edge1 = vertex2 - vertex1;
        let edge2 = vertex3 - vertex1;
        let normal = edge1.cross(edge2).normalized();

        Self {
            vertex1,
            vertex2,
            vertex3,
            edge1,
            edge2,
            normal,
        }
    }

    /// Möller-Trumbore; returns the hit distance inside `(t_near, t_far)`.
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        let p = ray.direction.cross(self.edge2);
        let det = self.edge1.dot(p);
        if det.abs() < f32::EPSILON {
            return None;
        }
        let inv_det = det.recip();

        let s = ray.origin - self.vertex1;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(self.edge1);
        let v = ray.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = self.edge2.dot(q) * inv_det;
        (t > ray.t_near && t < ray.t_far).then_some(t)
    }
}
