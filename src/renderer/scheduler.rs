use crate::handlers::{
    BatchOutcome, FrameState, RayStatistics, WorkerState, occlusion_query_bundle_handler,
    presence_shadows_query_bundle_handler, ray_bundle_handler,
};
use crate::raytracing::{BundledOcclRay, RayState};
use crate::{DispatchError, Result};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;

/// Where occlusion bundles are resolved.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum OcclusionBackend {
    #[default]
    Cpu,
    /// Falls back to the CPU when the frame has no device attached.
    Gpu,
}

/// Runs handler batches on a fixed worker pool over one shared frame.
///
/// Each rayon split gets its own [`WorkerState`], so arenas are never shared. Statistics
/// of all batches are merged; the first fatal error stops the dispatch and is returned.
pub struct BundleScheduler {
    pool: ThreadPool,
    frame: Arc<FrameState>,
}

impl std::fmt::Debug for BundleScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleScheduler")
            .field("threads", &self.pool.current_num_threads())
            .field("frame", &self.frame)
            .finish()
    }
}

impl BundleScheduler {
    pub fn new(frame: FrameState) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(frame.settings.worker_threads)
            .thread_name(|index| format!("raydispatch-worker-{index}"))
            .build()
            .map_err(|err| DispatchError::ThreadPool(err.to_string()))?;
        tracing::debug!(threads = pool.current_num_threads(), "scheduler started");
        Ok(Self {
            pool,
            frame: Arc::new(frame),
        })
    }

    pub fn frame(&self) -> &FrameState {
        &self.frame
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn dispatch_ray_bundles(&self, batches: Vec<Vec<RayState>>) -> Result<RayStatistics> {
        self.dispatch("ray", batches, ray_bundle_handler)
    }

    pub fn dispatch_occlusion_bundles(
        &self,
        batches: Vec<Vec<BundledOcclRay>>,
        backend: OcclusionBackend,
    ) -> Result<RayStatistics> {
        match (backend, self.frame.gpu.as_ref()) {
            (OcclusionBackend::Gpu, Some(bridge)) => {
                self.dispatch("gpu occlusion", batches, |worker, frame, rays| {
                    bridge.occlusion_query_bundle_handler(worker, frame, rays)
                })
            }
            (OcclusionBackend::Gpu, None) => {
                tracing::debug!("no device attached, resolving occlusion on the cpu");
                self.dispatch("occlusion", batches, occlusion_query_bundle_handler)
            }
            (OcclusionBackend::Cpu, _) => {
                self.dispatch("occlusion", batches, occlusion_query_bundle_handler)
            }
        }
    }

    pub fn dispatch_presence_bundles(
        &self,
        batches: Vec<Vec<BundledOcclRay>>,
    ) -> Result<RayStatistics> {
        self.dispatch("presence", batches, presence_shadows_query_bundle_handler)
    }

    fn dispatch<B, H>(&self, kind: &'static str, batches: Vec<B>, handler: H) -> Result<RayStatistics>
    where
        B: Send,
        H: Fn(&mut WorkerState, &FrameState, B) -> Result<BatchOutcome> + Sync,
    {
        let frame = &*self.frame;
        let arena_bytes = frame.settings.scratch_arena_bytes;
        let num_batches = batches.len();

        let stats = self.pool.install(|| {
            batches
                .into_par_iter()
                .map_init(
                    || WorkerState::new(rayon::current_thread_index().unwrap_or(0), arena_bytes),
                    |worker, batch| {
                        let outcome = handler(worker, frame, batch).inspect_err(|err| {
                            tracing::error!(%err, kind, thread_idx = worker.thread_idx, "batch failed");
                        })?;
                        let mut stats = std::mem::take(&mut worker.stats);
                        if outcome == BatchOutcome::Cancelled {
                            stats.cancelled_batches += 1;
                        }
                        Ok(stats)
                    },
                )
                .try_reduce(RayStatistics::default, |mut acc, stats| {
                    acc += stats;
                    Ok(acc)
                })
        })?;

        tracing::debug!(
            kind,
            batches = num_batches,
            cancelled = stats.cancelled_batches,
            "dispatch done"
        );
        Ok(stats)
    }
}
