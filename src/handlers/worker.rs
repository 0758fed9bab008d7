use crate::arena::ScratchArena;
use crate::handlers::RayStatistics;

/// Everything a worker owns exclusively while it processes batches.
#[derive(Debug)]
pub struct WorkerState {
    pub thread_idx: usize,
    pub arena: ScratchArena,
    pub stats: RayStatistics,
}

impl WorkerState {
    pub fn new(thread_idx: usize, arena_bytes: usize) -> Self {
        Self {
            thread_idx,
            arena: ScratchArena::new(arena_bytes),
            stats: RayStatistics::default(),
        }
    }
}
