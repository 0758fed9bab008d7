//! Error types for the dispatch core.
//!
//! Every variant is a fatal condition for the batch that raised it: the handler stops,
//! and the scheduler stops handing out further batches. Expected outcomes such as a ray
//! finding no light are ordinary control flow and never surface here.

use thiserror::Error;

/// Fatal scheduler error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// A ray entered a handler in a state the handler cannot process
    #[error("Invalid ray state {id}: {reason}")]
    InvalidRayState { id: u32, reason: &'static str },

    /// An occlusion ray carries degenerate geometry
    #[error("Invalid occlusion ray at index {index}: {reason}")]
    InvalidOcclusionRay { index: usize, reason: &'static str },

    /// Batch larger than the configured maximum
    #[error("Batch of {len} entries exceeds the maximum batch size {max}")]
    BatchOverflow { len: usize, max: usize },

    /// Scratch arena capacity exceeded
    #[error("Scratch arena overflow: requested {requested} bytes with {available} available")]
    ArenaOverflow { requested: usize, available: usize },

    /// Ray state pool has no free slot left
    #[error("Ray state pool exhausted (capacity: {capacity})")]
    PoolExhausted { capacity: usize },

    /// Sort key outside the range the sort was sized for
    #[error("Sort key {key} out of range (max: {max})")]
    SortKeyOutOfRange { key: u32, max: u32 },

    /// Material id 0 is reserved for misses
    #[error("Material id 0 is reserved for rays that hit nothing")]
    ReservedMaterialId,

    /// Material id not present in the material table
    #[error("Material {0} is not registered")]
    UnknownMaterial(u32),

    /// Light id not present in the light set
    #[error("Light {0} is not registered")]
    UnknownLight(u32),

    /// Presence shadow ray without its side-data list
    #[error("Presence shadow ray at index {0} has no side data")]
    MissingSideData(usize),

    /// Handle released after its reference count already reached zero
    #[error("{table} handle {handle} released more often than acquired")]
    DoubleRelease { table: &'static str, handle: u32 },

    /// Handle does not reference a live slot, or its slot was recycled since
    #[error("{table} handle {handle} does not reference a live entry")]
    StaleHandle { table: &'static str, handle: u32 },

    /// Ray states left the batch without being forwarded or released
    #[error("{count} ray states were neither forwarded nor released")]
    RayStateLeak { count: usize },

    /// GPU occlusion mask does not match the submitted batch
    #[error("GPU occlusion buffer holds {actual} entries, expected {expected}")]
    GpuBufferMismatch { expected: usize, actual: usize },

    /// Radiance entry addressed outside the film
    #[error("Pixel ({x}, {y}) lies outside the film")]
    PixelOutOfBounds { x: u32, y: u32 },

    /// Worker pool could not be created
    #[error("Worker pool creation failed: {0}")]
    ThreadPool(String),
}

/// Result alias used throughout the crate.
pub type Result<T, E = DispatchError> = std::result::Result<T, E>;
