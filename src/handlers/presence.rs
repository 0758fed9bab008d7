use crate::aov::{LpePrefix, OcclAovContext};
use crate::color::ColorTransmittanceExt;
use crate::handlers::occlusion::occl_transmittance;
use crate::handlers::retire::retire_occl_ray;
use crate::handlers::{BatchOutcome, FrameState, WorkerState};
use crate::helpers::ColorType;
use crate::macros::check_cancellation;
use crate::raytracing::{BundledOcclRay, BundledRadiance};
use crate::{DispatchError, Result};

/// Resolves shadow rays cast through partially present geometry.
///
/// Instead of a binary test, each ray accumulates the presence of every surface it crosses.
/// The light contribution is scaled by the remaining `1 - presence`; every ray is emitted,
/// even a fully blocked one.
#[tracing::instrument(skip_all, fields(thread_idx = worker.thread_idx, rays = rays.len()))]
pub fn presence_shadows_query_bundle_handler(
    worker: &mut WorkerState,
    frame: &FrameState,
    rays: Vec<BundledOcclRay>,
) -> Result<BatchOutcome> {
    let num_entries = rays.len();
    if num_entries == 0 {
        return Ok(BatchOutcome::Completed);
    }
    for (index, ray) in rays.iter().enumerate() {
        ray.validate(index)?;
    }
    worker.stats.presence_shadow_rays += num_entries as u64;

    let mark = worker.arena.mark();
    let results = mark.alloc_slice_fill(num_entries, BundledRadiance::default())?;

    for (index, (ray, result)) in rays.into_iter().zip(results.iter_mut()).enumerate() {
        let side = frame
            .side_data
            .occl_list(ray.data)
            .filter(|side| !side.is_empty())
            .ok_or(DispatchError::MissingSideData(index))?;

        let presence = frame.presence.accumulate_ray_presence(
            &ray.to_ray(),
            side[0].ray_epsilon,
            frame.settings.max_presence_depth,
        );
        let tr = occl_transmittance(frame, &ray);
        let radiance = ray.radiance * tr;
        let radiance = if presence == 0.0 || !frame.settings.enable_shadowing {
            radiance
        } else {
            radiance * (1.0 - presence)
        };
        *result = BundledRadiance::from_occl_ray(&ray, radiance, &frame.side_data)?;

        if !frame.aov_schema.is_empty() {
            let ctx = OcclAovContext {
                pixel: ray.pixel,
                light: ray.light,
                side: &side,
            };
            let occlusion = tr * (1.0 - presence);
            frame
                .aovs
                .accum_light_aovs(&ctx, ColorType::white(), Some(occlusion), LpePrefix::Unoccluded);
            frame
                .aovs
                .accum_visibility_aovs(&ctx, occlusion.reduce_transparency());
        }

        retire_occl_ray(frame, ray)?;
    }

    // results not yet flushed keep their deep and cryptomatte references on cancellation
    check_cancellation!(frame, "presence");

    frame.radiance_queue.add_radiance_entries(results)?;
    worker.stats.radiance_entries += num_entries as u64;
    Ok(BatchOutcome::Completed)
}
