use crate::arena::ArenaMark;
use crate::color::ColorTransmittanceExt;
use crate::handlers::{FrameState, RayStatistics, SortedEntry};
use crate::helpers::ColorType;
use crate::random::light_choice_sample;
use crate::raytracing::{BundledRadiance, RayState};
use crate::{DispatchError, Result};
use itertools::izip;

/// Retires the leading run of misses: one radiance entry per ray, submitted together,
/// and the states moved into `retired` for the bulk release.
pub(super) fn handle_misses(
    mark: &ArenaMark<'_>,
    stats: &mut RayStatistics,
    frame: &FrameState,
    slots: &mut [Option<RayState>],
    misses: &[SortedEntry],
    retired: &mut Vec<RayState>,
) -> Result<()> {
    let radiances = mark.alloc_slice_fill(misses.len(), BundledRadiance::default())?;
    for (entry, radiance) in izip!(misses, radiances.iter_mut()) {
        let rs = slots[entry.rs_idx as usize]
            .take()
            .ok_or(DispatchError::InvalidRayState {
                id: entry.rs_idx,
                reason: "miss visited twice",
            })?;
        *radiance = resolve_miss(frame, &rs)?;
        retired.push(rs);
    }

    frame.radiance_queue.add_radiance_entries(radiances)?;
    stats.misses += misses.len() as u64;
    stats.radiance_entries += misses.len() as u64;
    Ok(())
}

fn volume_alpha(rs: &RayState) -> f32 {
    rs.path.path_pixel_weight * (1.0 - rs.volume.talpha.reduce_transparency())
}

/// Light seen directly by a camera ray, volume emission and alpha for one miss.
pub(super) fn resolve_miss(frame: &FrameState, rs: &RayState) -> Result<BundledRadiance> {
    let mut radiance = ColorType::black();
    let mut alpha = 0.0;
    let mut hit_light = None;

    if rs.ray.depth == 0 {
        let sample = light_choice_sample(
            rs.subpixel.pixel,
            rs.subpixel.subpixel_index,
            frame.settings.initial_seed,
        );
        let visible = frame.lights.intersect_visible_light(
            rs.ray.origin,
            rs.ray.direction,
            rs.ray.time,
            f32::INFINITY,
            sample,
        );
        if let Some(visible) = visible {
            let light = frame.lights.get(visible.light)?;
            // one light was sampled out of `num_hits`
            radiance = rs.path.throughput
                * light.eval(rs.ray.direction, rs.ray.origin, &visible.isect, rs.ray.time)
                * visible.num_hits as f32;
            if rs.volume.hit {
                radiance = radiance * (rs.volume.tr * rs.volume.th);
            }

            alpha = if light.is_opaque_in_alpha() {
                rs.path.path_pixel_weight
            } else if rs.volume.hit {
                volume_alpha(rs)
            } else {
                0.0
            };
            hit_light = Some(visible.light);
        } else if rs.volume.hit {
            alpha = volume_alpha(rs);
        }
    }

    radiance = radiance + rs.volume.radiance;
    let entry = BundledRadiance::from_ray_state(rs, radiance, alpha, &frame.side_data)?;

    if !frame.aov_schema.is_empty() {
        let aovs = &frame.aovs;
        aovs.accum_background(rs.subpixel.pixel, rs.path.lpe_state_id, radiance);

        if rs.ray.depth == 0 && rs.volume.hit && rs.volume.surface_t < f32::MAX {
            aovs.accum_volume_state(rs.subpixel.pixel, rs.volume.surface_t, rs.volume.tr);
        }

        let lpe_state_id = if rs.ray.depth == 0 {
            match hit_light {
                Some(light) if rs.path.lpe_state_id >= 0 => {
                    aovs.light_event_transition(rs.path.lpe_state_id, light)
                }
                _ => -1,
            }
        } else {
            rs.path.lpe_state_id_light
        };
        if lpe_state_id >= 0 {
            aovs.accum_direct_light(rs.subpixel.pixel, lpe_state_id, radiance);
        }
    }

    Ok(entry)
}
