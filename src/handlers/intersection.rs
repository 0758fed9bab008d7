use crate::float_ext::AbsDiffEq;
use crate::handlers::{FrameState, WorkerState};
use crate::raytracing::RayState;
use crate::{DispatchError, Result};
use itertools::izip;

fn validate(rs: &RayState) -> Result<()> {
    let d = rs.ray.direction;
    if !(d.x.is_finite() && d.y.is_finite() && d.z.is_finite()) || d.mag_sq().is_nearly_zero() {
        return Err(DispatchError::InvalidRayState {
            id: rs.id(),
            reason: "degenerate direction",
        });
    }
    if rs.ray.t_far.is_nan() || rs.ray.t_near.is_nan() || rs.ray.t_far < rs.ray.t_near {
        return Err(DispatchError::InvalidRayState {
            id: rs.id(),
            reason: "empty interval",
        });
    }
    Ok(())
}

/// Nearest-hit intersection of the whole batch in one accelerator call.
pub(super) fn intersect_ray_states(
    worker: &mut WorkerState,
    frame: &FrameState,
    ray_states: &mut [RayState],
) -> Result<()> {
    ray_states.iter().try_for_each(validate)?;

    let num_rays = ray_states.len() as u64;
    worker.stats.intersection_rays += num_rays;
    worker.stats.bundled_intersection_rays += num_rays;

    let mark = worker.arena.mark();
    let rays = mark.alloc_slice_from_iter(ray_states.iter().map(|rs| {
        let mut ray = rs.ray;
        ray.hit = None;
        ray
    }))?;
    frame.accel.intersect_bundle(rays);

    for (rs, ray) in izip!(ray_states.iter_mut(), rays.iter()) {
        rs.ray.hit = ray.hit;
    }
    tracing::trace!(
        hits = ray_states.iter().filter(|rs| rs.ray.is_hit()).count(),
        "intersection"
    );
    Ok(())
}

/// Volume radiance and transmittance up to each ray's hit (or to infinity on a miss).
pub(super) fn compute_volume_contributions(frame: &FrameState, ray_states: &mut [RayState]) {
    for rs in ray_states {
        rs.volume = frame
            .volumes
            .compute_radiance_volume(&rs.ray, rs.volume_ray_type())
            .into();
    }
}
