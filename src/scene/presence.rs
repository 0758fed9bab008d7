use crate::geometry::Ray;

/// Depth-limited presence march used by semi-transparent shadow rays.
pub trait PresenceTracer: Send + Sync {
    /// Accumulated blockage in `[0, 1]` over at most `max_depth` surfaces, front to back.
    /// Surfaces closer than `ray_epsilon` past the ray start are skipped.
    fn accumulate_ray_presence(&self, ray: &Ray, ray_epsilon: f32, max_depth: u32) -> f32;
}
