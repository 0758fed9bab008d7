//! The bundled ray handlers.
//!
//! Every entry point consumes a batch, routes each element to exactly one exit and returns
//! once the batch is fully accounted for:
//!
//! * [`ray_bundle_handler`]: intersection, volume, material sort, miss retirement and shade
//!   submission for in-flight ray states.
//! * [`occlusion_query_bundle_handler`]: binary shadow tests on the CPU accelerator.
//! * [`GpuOcclusionBridge::occlusion_query_bundle_handler`]: the same tests on a device.
//! * [`presence_shadows_query_bundle_handler`]: fractional shadowing through partially
//!   present geometry.

mod dispatch;
mod frame;
mod gpu;
mod intersection;
mod miss;
mod occlusion;
mod presence;
mod retire;
mod sort;
mod stats;
mod worker;

#[cfg(test)]
mod tests;

pub use dispatch::ray_bundle_handler;
pub use frame::{CancellationFlag, FrameState, FrameStateBuilder};
pub use gpu::GpuOcclusionBridge;
pub use occlusion::occlusion_query_bundle_handler;
pub use presence::presence_shadows_query_bundle_handler;
pub use sort::{SortedEntry, shade_locality_key, smart_sort};
pub use stats::RayStatistics;
pub use worker::WorkerState;

/// How a handler invocation ended.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[must_use]
pub enum BatchOutcome {
    Completed,
    /// Cancellation was observed between stages. Rays already routed stay routed; the rest
    /// of the batch is dropped.
    Cancelled,
}
