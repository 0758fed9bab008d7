use crate::aov::{LpePrefix, OcclAovContext};
use crate::color::ColorTransmittanceExt;
use crate::handlers::retire::retire_occl_ray;
use crate::handlers::{BatchOutcome, FrameState, WorkerState};
use crate::helpers::ColorType;
use crate::macros::check_cancellation;
use crate::raytracing::{BundledOcclRay, BundledRadiance, OcclTestType};
use crate::scene::shadow_falloff;
use crate::Result;

/// Volume transmittance along the shadow ray's segment.
pub(super) fn occl_transmittance(frame: &FrameState, ray: &BundledOcclRay) -> ColorType {
    frame
        .volumes
        .transmittance(ray.origin, ray.direction, ray.min_t, ray.max_t, ray.time)
}

/// Runs `f` with the ray's AOV context when it carries a side list and the frame has AOVs.
fn with_aov_context(frame: &FrameState, ray: &BundledOcclRay, f: impl FnOnce(&OcclAovContext<'_>)) {
    if ray.data.is_null() || frame.aov_schema.is_empty() {
        return;
    }
    if let Some(side) = frame.side_data.occl_list(ray.data) {
        f(&OcclAovContext {
            pixel: ray.pixel,
            light: ray.light,
            side: &side,
        });
    }
}

/// Outcome of one `STANDARD` test, shared by the CPU and GPU paths.
pub(super) fn resolve_standard(
    frame: &FrameState,
    ray: &BundledOcclRay,
    occluded: bool,
) -> Result<Option<BundledRadiance>> {
    if !occluded || !frame.settings.enable_shadowing {
        let tr = occl_transmittance(frame, ray);
        let result = BundledRadiance::from_occl_ray(ray, ray.radiance * tr, &frame.side_data)?;
        with_aov_context(frame, ray, |ctx| {
            frame
                .aovs
                .accum_light_aovs(ctx, ColorType::white(), Some(tr), LpePrefix::Unoccluded);
            frame.aovs.accum_visibility_aovs(ctx, tr.reduce_transparency());
        });
        return Ok(Some(result));
    }

    let light = frame.lights.get(ray.light)?;
    let mut result = None;
    let falloff_distance = light.clear_radius_falloff_distance();
    if falloff_distance != 0.0 && ray.max_t < light.clear_radius() + falloff_distance {
        let tr = occl_transmittance(frame, ray);
        let faded = shadow_falloff(light, ray.max_t, tr * ray.radiance);
        result = Some(BundledRadiance::from_occl_ray(ray, faded, &frame.side_data)?);
    }

    with_aov_context(frame, ray, |ctx| {
        frame.aovs.accum_visibility_aovs_occluded(ctx);
        if frame.aov_schema.has_lpe_prefix_flags(LpePrefix::Unoccluded) {
            frame
                .aovs
                .accum_light_aovs(ctx, ColorType::white(), None, LpePrefix::Unoccluded);
        }
    });
    Ok(result)
}

/// Outcome of a `FORCE_NOT_OCCLUDED` ray: always emitted, never tested.
pub(super) fn resolve_forced(frame: &FrameState, ray: &BundledOcclRay) -> Result<BundledRadiance> {
    let tr = occl_transmittance(frame, ray);
    let result = BundledRadiance::from_occl_ray(ray, ray.radiance * tr, &frame.side_data)?;
    with_aov_context(frame, ray, |ctx| {
        frame.aovs.accum_light_aovs(ctx, tr, None, LpePrefix::None);
    });
    Ok(result)
}

/// Moves standard tests in front of forced ones, keeping relative order, and returns the
/// number of standard tests.
pub(super) fn partition_standard_first(rays: &mut [BundledOcclRay]) -> usize {
    rays.sort_by_key(|ray| ray.test_type);
    rays.partition_point(|ray| ray.test_type == OcclTestType::Standard)
}

/// Resolves a batch of shadow rays on the CPU accelerator.
#[tracing::instrument(skip_all, fields(thread_idx = worker.thread_idx, rays = rays.len()))]
pub fn occlusion_query_bundle_handler(
    worker: &mut WorkerState,
    frame: &FrameState,
    mut rays: Vec<BundledOcclRay>,
) -> Result<BatchOutcome> {
    let num_entries = rays.len();
    if num_entries == 0 {
        return Ok(BatchOutcome::Completed);
    }
    for (index, ray) in rays.iter().enumerate() {
        ray.validate(index)?;
    }
    worker.stats.occlusion_rays += num_entries as u64;
    worker.stats.bundled_occlusion_rays += num_entries as u64;

    let num_standard = partition_standard_first(&mut rays);

    let mark = worker.arena.mark();
    let results = mark.alloc_slice_fill(num_entries, BundledRadiance::default())?;
    let mut num_filled = 0;

    for (index, ray) in rays.into_iter().enumerate() {
        let resolved = if index < num_standard {
            let occluded = frame.accel.occluded(&ray.to_ray());
            resolve_standard(frame, &ray, occluded)?
        } else {
            Some(resolve_forced(frame, &ray)?)
        };
        if let Some(result) = resolved {
            results[num_filled] = result;
            num_filled += 1;
        }
        retire_occl_ray(frame, ray)?;
    }

    // results not yet flushed keep their deep and cryptomatte references on cancellation
    check_cancellation!(frame, "occlusion");

    frame.radiance_queue.add_radiance_entries(&results[..num_filled])?;
    worker.stats.radiance_entries += num_filled as u64;
    tracing::debug!(
        standard = num_standard,
        forced = num_entries - num_standard,
        emitted = num_filled,
        "occlusion bundle done"
    );
    Ok(BatchOutcome::Completed)
}
