//! Frame-level driver over the bundle handlers.

mod scheduler;

pub use scheduler::{BundleScheduler, OcclusionBackend};
