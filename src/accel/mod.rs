//! Intersection providers consumed by the handlers.
//!
//! The scheduler only sees these traits; the concrete accelerators in this module are
//! brute-force reference implementations used by the demo and tests.

mod emulated_gpu;
mod geometry_accel;

pub use emulated_gpu::EmulatedGpuAccelerator;
pub use geometry_accel::GeometryAccelerator;

use crate::Result;
use crate::geometry::Ray;
use crate::scene::MaterialId;
use ultraviolet::Vec3;

/// CPU scene intersection.
pub trait Accelerator: Send + Sync {
    /// Nearest hit inside the ray's interval, written into `ray.hit`.
    fn intersect(&self, ray: &mut Ray);

    /// Batch form of [`Accelerator::intersect`].
    fn intersect_bundle(&self, rays: &mut [Ray]) {
        for ray in rays {
            self.intersect(ray);
        }
    }

    /// Any hit inside the ray's interval.
    fn occluded(&self, ray: &Ray) -> bool;
}

/// Maps intersected geometry to the material bound to it.
pub trait Layer: Send + Sync {
    fn lookup_material(&self, geom_id: u32, prim_id: u32) -> Option<MaterialId>;
}

/// Occlusion ray in the flat layout uploaded to the device.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct GpuRay {
    pub origin: [f32; 3],
    pub t_near: f32,
    pub direction: [f32; 3],
    pub t_far: f32,
    pub time: f32,
    pub index: u32,
}

impl GpuRay {
    pub fn to_ray(&self) -> Ray {
        let mut ray = Ray::new(Vec3::from(self.origin), Vec3::from(self.direction))
            .with_interval(self.t_near, self.t_far)
            .with_time(self.time);
        // already normalized on upload
        ray.direction = Vec3::from(self.direction);
        ray
    }
}

/// GPU occlusion. Synchronous: returns once the device batch has completed.
pub trait GpuAccelerator: Send + Sync {
    /// Writes `1` into `output_mask[i]` when `rays[i]` is occluded and `0` otherwise.
    fn occluded(&self, thread_idx: usize, rays: &[GpuRay], output_mask: &mut [u8]) -> Result<()>;
}
