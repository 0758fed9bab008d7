use crate::Result;
use crate::handlers::FrameState;
use crate::raytracing::{BundledOcclRay, RayState};

/// Returns ray states that end in this batch to the pool, dropping the side-data
/// references they hold.
pub(super) fn release_ray_states(frame: &FrameState, ray_states: Vec<RayState>) -> Result<()> {
    if ray_states.is_empty() {
        return Ok(());
    }
    for rs in &ray_states {
        frame.side_data.release_deep(rs.deep_data)?;
        frame.side_data.release_cryptomatte(rs.crypto_data)?;
    }
    let released = frame.ray_states.release_bulk(ray_states)?;
    tracing::trace!(released, "ray states released");
    Ok(())
}

/// Final step for every shadow ray on every path: consumes the ray and drops its
/// side-data list and its deep and cryptomatte references.
pub(super) fn retire_occl_ray(frame: &FrameState, ray: BundledOcclRay) -> Result<()> {
    frame.side_data.release_occl_list(ray.data)?;
    frame.side_data.release_deep(ray.deep_data)?;
    frame.side_data.release_cryptomatte(ray.crypto_data)?;
    Ok(())
}
