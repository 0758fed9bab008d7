use crate::arena::ArenaMark;
use crate::scene::MaterialId;
use crate::{DispatchError, Result};

/// Batch-scoped sort record. Key 0 is a miss; material keys start at 1.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SortedEntry {
    pub sort_key: u32,
    pub rs_idx: u32,
    pub material: Option<MaterialId>,
}

impl SortedEntry {
    pub const MISS: SortedEntry = SortedEntry {
        sort_key: 0,
        rs_idx: 0,
        material: None,
    };
}

/// Locality key inside a material run: geometry first, primitive second.
#[inline(always)]
pub fn shade_locality_key(geom_id: u32, prim_id: u32) -> u32 {
    ((geom_id & 0xfff) << 20) | (prim_id & 0xfffff)
}

/// Orders `entries` by ascending key.
///
/// Below `cutoff` entries a counting sort over `0..=max_key` is used, with its buckets and
/// output carved from `mark`; larger batches use the comparison sort. Either way only the
/// grouping is guaranteed, not the order of ties.
pub fn smart_sort(
    mark: &ArenaMark<'_>,
    entries: &mut [SortedEntry],
    max_key: u32,
    cutoff: usize,
) -> Result<()> {
    if let Some(bad) = entries.iter().find(|e| e.sort_key > max_key) {
        return Err(DispatchError::SortKeyOutOfRange {
            key: bad.sort_key,
            max: max_key,
        });
    }
    if entries.len() < cutoff {
        bucket_sort(mark, entries, max_key)
    } else {
        entries.sort_unstable_by_key(|e| e.sort_key);
        Ok(())
    }
}

fn bucket_sort(mark: &ArenaMark<'_>, entries: &mut [SortedEntry], max_key: u32) -> Result<()> {
    let offsets = mark.alloc_slice_fill(max_key as usize + 2, 0u32)?;
    for entry in entries.iter() {
        offsets[entry.sort_key as usize + 1] += 1;
    }
    for i in 1..offsets.len() {
        offsets[i] += offsets[i - 1];
    }

    let sorted = mark.alloc_slice_fill(entries.len(), SortedEntry::MISS)?;
    for entry in entries.iter() {
        let slot = &mut offsets[entry.sort_key as usize];
        sorted[*slot as usize] = *entry;
        *slot += 1;
    }
    entries.copy_from_slice(sorted);
    Ok(())
}
