use crate::color::ColorTransmittanceExt;
use crate::handlers::intersection::{compute_volume_contributions, intersect_ray_states};
use crate::handlers::miss::handle_misses;
use crate::handlers::retire::release_ray_states;
use crate::handlers::sort::{SortedEntry, shade_locality_key, smart_sort};
use crate::handlers::{BatchOutcome, FrameState, WorkerState};
use crate::macros::check_cancellation;
use crate::raytracing::{BundledRadiance, RayState};
use crate::scene::{MaterialId, ShadeEntry};
use crate::{DispatchError, Result};
use smallvec::SmallVec;

/// Intersects a batch of ray states and routes every one of them to exactly one exit.
///
/// Stages, in order:
/// 1. nearest-hit intersection of the whole batch;
/// 2. volume radiance and transmittance per ray;
/// 3. classification: misses get key 0, hits without a material are retired on the spot
///    (emitting their volume contribution if any), hits with a material get its
///    ray-switch-resolved id as key;
/// 4. sort by key; the leading key-0 run is retired by the miss handler;
/// 5. every following run goes to its material's shade queue in one submission, ordered
///    by geometry/primitive locality.
///
/// Cancellation is polled after stages 1, 2, 4 and after each submission.
#[tracing::instrument(skip_all, fields(thread_idx = worker.thread_idx, rays = ray_states.len()))]
pub fn ray_bundle_handler(
    worker: &mut WorkerState,
    frame: &FrameState,
    mut ray_states: Vec<RayState>,
) -> Result<BatchOutcome> {
    let num_entries = ray_states.len();
    if num_entries == 0 {
        return Ok(BatchOutcome::Completed);
    }
    if num_entries > frame.settings.max_batch_size {
        return Err(DispatchError::BatchOverflow {
            len: num_entries,
            max: frame.settings.max_batch_size,
        });
    }

    intersect_ray_states(worker, frame, &mut ray_states)?;
    check_cancellation!(frame, "intersection");

    compute_volume_contributions(frame, &mut ray_states);
    check_cancellation!(frame, "volume");

    let WorkerState {
        thread_idx,
        arena,
        stats,
    } = worker;
    let mut slots: Vec<Option<RayState>> = ray_states.into_iter().map(Some).collect();

    let mark = arena.mark();
    let entries = mark.alloc_slice_fill(num_entries, SortedEntry::MISS)?;
    let mut num_sorted = 0;
    let mut max_key = 0;
    let mut retired = Vec::new();
    let mut volume_only: SmallVec<[BundledRadiance; 8]> = SmallVec::new();
    let visibility_attempts = frame
        .settings
        .light_sample_count
        .saturating_mul(u32::try_from(frame.lights.len()).unwrap_or(u32::MAX));

    for (rs_idx, slot) in slots.iter_mut().enumerate() {
        let rs = slot.as_ref().ok_or(DispatchError::InvalidRayState {
            id: rs_idx as u32,
            reason: "slot emptied before classification",
        })?;

        let Some(hit) = rs.ray.hit else {
            entries[num_sorted] = SortedEntry {
                sort_key: 0,
                rs_idx: rs_idx as u32,
                material: None,
            };
            num_sorted += 1;
            // primary misses on a geometry edge would otherwise alias the visibility AOVs
            if rs.ray.depth == 0 && !frame.aov_schema.is_empty() {
                frame.aovs.accum_visibility_attempts(
                    rs.subpixel.pixel,
                    rs.path.lpe_state_id,
                    visibility_attempts,
                );
            }
            continue;
        };

        match frame.layer.lookup_material(hit.geom_id, hit.prim_id) {
            Some(material) => {
                let material = frame
                    .materials
                    .resolve(material, rs.path.lobe_type.ray_type())?;
                entries[num_sorted] = SortedEntry {
                    sort_key: material.get(),
                    rs_idx: rs_idx as u32,
                    material: Some(material),
                };
                num_sorted += 1;
                max_key = max_key.max(material.get());
            }
            None => {
                if rs.volume.hit {
                    let alpha = if rs.ray.depth == 0 {
                        rs.path.path_pixel_weight * (1.0 - rs.volume.talpha.reduce_transparency())
                    } else {
                        0.0
                    };
                    volume_only.push(BundledRadiance::from_ray_state(
                        rs,
                        rs.volume.radiance,
                        alpha,
                        &frame.side_data,
                    )?);
                }
                stats.null_material_hits += 1;
                retired.extend(slot.take());
            }
        }
    }

    if !volume_only.is_empty() {
        frame.radiance_queue.add_radiance_entries(&volume_only)?;
        stats.radiance_entries += volume_only.len() as u64;
    }

    let entries = &mut entries[..num_sorted];
    smart_sort(&mark, entries, max_key, frame.settings.sort_cutoff)?;

    let num_misses = entries.partition_point(|e| e.sort_key == 0);
    if num_misses > 0 {
        handle_misses(
            &mark,
            stats,
            frame,
            &mut slots,
            &entries[..num_misses],
            &mut retired,
        )?;
    }
    release_ray_states(frame, retired)?;
    check_cancellation!(frame, "misses");

    let mut run_mark = arena.mark();
    for run in entries[num_misses..].chunk_by(|a, b| a.sort_key == b.sort_key) {
        let material = run[0]
            .material
            .map_or_else(|| MaterialId::new(run[0].sort_key), Ok)?;

        let shade_keys = run_mark.alloc_slice_from_iter(run.iter().map(|entry| {
            let locality = slots[entry.rs_idx as usize]
                .as_ref()
                .and_then(|rs| rs.ray.hit)
                .map_or(0, |hit| shade_locality_key(hit.geom_id, hit.prim_id));
            (locality, entry.rs_idx)
        }))?;
        shade_keys.sort_unstable_by_key(|&(locality, _)| locality);

        let batch = shade_keys
            .iter()
            .map(|&(sort_key, rs_idx)| {
                slots[rs_idx as usize]
                    .take()
                    .map(|ray_state| ShadeEntry {
                        sort_key,
                        ray_state,
                    })
                    .ok_or(DispatchError::InvalidRayState {
                        id: rs_idx,
                        reason: "routed to a shade queue twice",
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        stats.shade_submissions += 1;
        stats.shaded_rays += batch.len() as u64;
        tracing::trace!(material = material.get(), rays = batch.len(), "shade submission");
        frame.materials.queue(material)?.add_entries(*thread_idx, batch);

        check_cancellation!(frame, "shade submission");
        run_mark.reset();
    }

    let leaked = slots.iter().filter(|slot| slot.is_some()).count();
    if leaked > 0 {
        return Err(DispatchError::RayStateLeak { count: leaked });
    }

    tracing::debug!(
        misses = num_misses,
        shaded = num_sorted - num_misses,
        high_water = arena.high_water_mark(),
        "ray bundle done"
    );
    Ok(BatchOutcome::Completed)
}
