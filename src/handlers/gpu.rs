use crate::accel::GpuAccelerator;
use crate::handlers::occlusion::{partition_standard_first, resolve_forced, resolve_standard};
use crate::handlers::retire::retire_occl_ray;
use crate::handlers::{BatchOutcome, FrameState, WorkerState};
use crate::macros::check_cancellation;
use crate::raytracing::{BundledOcclRay, BundledRadiance};
use crate::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Routes occlusion batches through a device accelerator.
///
/// Only `STANDARD` tests are uploaded; forced rays are resolved on the host in the same
/// batch. Outcomes match the CPU handler for the same input.
#[derive(Clone)]
pub struct GpuOcclusionBridge {
    gpu: Arc<dyn GpuAccelerator>,
    threads_using_gpu: Arc<AtomicUsize>,
}

impl std::fmt::Debug for GpuOcclusionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuOcclusionBridge")
            .field("threads_using_gpu", &self.threads_using_gpu())
            .finish_non_exhaustive()
    }
}

/// Counts one device call in progress for as long as it lives.
///
/// A worker blocked in a launch can steal another batch and launch again, so this counts
/// calls rather than distinct threads.
struct GpuUsageGuard<'a>(&'a AtomicUsize);

impl<'a> GpuUsageGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for GpuUsageGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl GpuOcclusionBridge {
    pub fn new(gpu: Arc<dyn GpuAccelerator>) -> Self {
        Self {
            gpu,
            threads_using_gpu: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Device calls currently in progress, nested calls from one worker included.
    pub fn threads_using_gpu(&self) -> usize {
        self.threads_using_gpu.load(Ordering::Acquire)
    }

    #[tracing::instrument(name = "gpu_occlusion_query_bundle_handler", skip_all, fields(thread_idx = worker.thread_idx, rays = rays.len()))]
    pub fn occlusion_query_bundle_handler(
        &self,
        worker: &mut WorkerState,
        frame: &FrameState,
        mut rays: Vec<BundledOcclRay>,
    ) -> Result<BatchOutcome> {
        let num_entries = rays.len();
        if num_entries == 0 {
            return Ok(BatchOutcome::Completed);
        }
        for (index, ray) in rays.iter().enumerate() {
            ray.validate(index)?;
        }
        worker.stats.occlusion_rays += num_entries as u64;
        worker.stats.bundled_gpu_occlusion_rays += num_entries as u64;

        let num_standard = partition_standard_first(&mut rays);

        let mark = worker.arena.mark();
        let gpu_rays = mark.alloc_slice_from_iter(
            rays[..num_standard]
                .iter()
                .enumerate()
                .map(|(index, ray)| ray.to_gpu_ray(index as u32)),
        )?;
        let mask = mark.alloc_slice_fill(num_standard, 0u8)?;
        if num_standard > 0 {
            let _usage = GpuUsageGuard::enter(&self.threads_using_gpu);
            self.gpu.occluded(worker.thread_idx, gpu_rays, mask)?;
        }

        let results = mark.alloc_slice_fill(num_entries, BundledRadiance::default())?;
        let mut num_filled = 0;
        for (index, ray) in rays.into_iter().enumerate() {
            let resolved = if index < num_standard {
                resolve_standard(frame, &ray, mask[index] != 0)?
            } else {
                Some(resolve_forced(frame, &ray)?)
            };
            if let Some(result) = resolved {
                results[num_filled] = result;
                num_filled += 1;
            }
            retire_occl_ray(frame, ray)?;
        }

        // results not yet flushed keep their deep and cryptomatte references on cancellation
        check_cancellation!(frame, "gpu occlusion");

        frame.radiance_queue.add_radiance_entries(&results[..num_filled])?;
        worker.stats.radiance_entries += num_filled as u64;
        tracing::debug!(
            uploaded = num_standard,
            forced = num_entries - num_standard,
            emitted = num_filled,
            "gpu occlusion bundle done"
        );
        Ok(BatchOutcome::Completed)
    }
}
