use crate::accel::{Accelerator, GeometryAccelerator, GpuAccelerator, GpuRay};
use crate::{DispatchError, Result};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Software stand-in for a device occlusion kernel.
///
/// A launch takes the whole batch, runs every ray data-parallel on the rayon pool and
/// returns only after all lanes have written their mask entry, like a synchronous device
/// call would.
#[derive(Debug)]
pub struct EmulatedGpuAccelerator {
    scene: GeometryAccelerator,
    launches: AtomicUsize,
    rays_traced: AtomicUsize,
    occluded_rays: Mutex<Vec<GpuRay>>,
}

impl EmulatedGpuAccelerator {
    pub fn new(scene: GeometryAccelerator) -> Self {
        Self {
            scene,
            launches: AtomicUsize::new(0),
            rays_traced: AtomicUsize::new(0),
            occluded_rays: Mutex::new(Vec::new()),
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::Relaxed)
    }

    pub fn rays_traced(&self) -> usize {
        self.rays_traced.load(Ordering::Relaxed)
    }

    /// Every uploaded ray whose mask entry came back set, in launch order.
    pub fn occluded_rays(&self) -> Vec<GpuRay> {
        self.occluded_rays.lock().clone()
    }
}

impl GpuAccelerator for EmulatedGpuAccelerator {
    #[tracing::instrument(level = "trace", skip_all, fields(thread_idx = thread_idx, rays = rays.len()))]
    fn occluded(&self, thread_idx: usize, rays: &[GpuRay], output_mask: &mut [u8]) -> Result<()> {
        if rays.len() != output_mask.len() {
            return Err(DispatchError::GpuBufferMismatch {
                expected: rays.len(),
                actual: output_mask.len(),
            });
        }
        self.launches.fetch_add(1, Ordering::Relaxed);
        self.rays_traced.fetch_add(rays.len(), Ordering::Relaxed);

        rays.par_iter()
            .zip(output_mask.par_iter_mut())
            .for_each(|(ray, out)| *out = u8::from(self.scene.occluded(&ray.to_ray())));

        self.occluded_rays.lock().extend(
            rays.iter()
                .zip(output_mask.iter())
                .filter(|&(_, &out)| out != 0)
                .map(|(ray, _)| *ray),
        );
        Ok(())
    }
}
