//! Bundled ray dispatch and deferred-shading scheduler for a Monte Carlo ray tracer.
//!
//! Batches of in-flight [`RayState`](raytracing::RayState)s are intersected, folded with
//! volumetric transmittance, sorted by material and handed to per-material shade queues.
//! Occlusion and presence shadow batches are resolved on the CPU or on a GPU back end and
//! retired into a shared radiance queue.

pub mod accel;
pub mod aov;
pub mod arena;
pub mod color;
pub mod config;
pub mod error;
pub mod float_ext;
pub mod geometry;
pub mod handlers;
pub mod handles;
pub mod helpers;
mod macros;
pub mod output;
pub mod random;
pub mod raytracing;
pub mod renderer;
pub mod scene;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{DispatchError, Result};

const fn parse_env_or(value: Option<&str>, default: usize) -> usize {
    match value {
        Some(value) => match usize::from_str_radix(value, 10) {
            Ok(parsed) => parsed,
            Err(_) => default,
        },
        None => default,
    }
}

/// Batch size below which the material sort uses the bounded bucket sort.
pub const SORT_CUTOFF: usize = parse_env_or(option_env!("RAYDISPATCH_SORT_CUTOFF"), 200);

/// Per-worker scratch arena capacity in bytes.
pub const SCRATCH_ARENA_BYTES: usize =
    parse_env_or(option_env!("RAYDISPATCH_SCRATCH_BYTES"), 8 * 1024 * 1024);

/// Largest batch a single handler invocation accepts.
pub const MAX_BATCH_SIZE: usize = parse_env_or(option_env!("RAYDISPATCH_MAX_BATCH"), 4096);
