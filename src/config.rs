//! Frame-wide settings read by every handler.

use crate::{MAX_BATCH_SIZE, SCRATCH_ARENA_BYTES, SORT_CUTOFF};

/// Integrator and scheduler settings for one frame. Immutable once the frame starts.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSettings {
    /// When false every occlusion test is treated as unoccluded.
    pub enable_shadowing: bool,
    /// Light samples taken per light at a surface hit.
    pub light_sample_count: u32,
    /// Upper bound on surfaces visited by a presence march.
    pub max_presence_depth: u32,
    pub initial_seed: u32,
    /// Batches smaller than this use the bucket sort.
    pub sort_cutoff: usize,
    pub scratch_arena_bytes: usize,
    pub max_batch_size: usize,
    /// Worker threads in the scheduler pool; 0 picks the rayon default.
    pub worker_threads: usize,
}

impl Default for FrameSettings {
    fn default() -> Self {
        Self {
            enable_shadowing: true,
            light_sample_count: 1,
            max_presence_depth: 16,
            initial_seed: 0,
            sort_cutoff: SORT_CUTOFF,
            scratch_arena_bytes: SCRATCH_ARENA_BYTES,
            max_batch_size: MAX_BATCH_SIZE,
            worker_threads: 0,
        }
    }
}

impl FrameSettings {
    pub fn with_shadowing(mut self, enable_shadowing: bool) -> Self {
        self.enable_shadowing = enable_shadowing;
        self
    }

    pub fn with_light_sample_count(mut self, light_sample_count: u32) -> Self {
        self.light_sample_count = light_sample_count;
        self
    }

    pub fn with_max_presence_depth(mut self, max_presence_depth: u32) -> Self {
        self.max_presence_depth = max_presence_depth;
        self
    }

    pub fn with_initial_seed(mut self, initial_seed: u32) -> Self {
        self.initial_seed = initial_seed;
        self
    }

    pub fn with_sort_cutoff(mut self, sort_cutoff: usize) -> Self {
        self.sort_cutoff = sort_cutoff;
        self
    }

    pub fn with_scratch_arena_bytes(mut self, scratch_arena_bytes: usize) -> Self {
        self.scratch_arena_bytes = scratch_arena_bytes;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }
}
