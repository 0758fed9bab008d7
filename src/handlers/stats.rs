use std::ops::AddAssign;

/// Per-worker ray counters, merged by the scheduler at the end of a dispatch.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct RayStatistics {
    pub intersection_rays: u64,
    pub bundled_intersection_rays: u64,
    pub occlusion_rays: u64,
    pub bundled_occlusion_rays: u64,
    pub bundled_gpu_occlusion_rays: u64,
    pub presence_shadow_rays: u64,
    pub misses: u64,
    pub null_material_hits: u64,
    pub shade_submissions: u64,
    pub shaded_rays: u64,
    pub radiance_entries: u64,
    pub cancelled_batches: u64,
}

impl AddAssign for RayStatistics {
    fn add_assign(&mut self, rhs: Self) {
        self.intersection_rays += rhs.intersection_rays;
        self.bundled_intersection_rays += rhs.bundled_intersection_rays;
        self.occlusion_rays += rhs.occlusion_rays;
        self.bundled_occlusion_rays += rhs.bundled_occlusion_rays;
        self.bundled_gpu_occlusion_rays += rhs.bundled_gpu_occlusion_rays;
        self.presence_shadow_rays += rhs.presence_shadow_rays;
        self.misses += rhs.misses;
        self.null_material_hits += rhs.null_material_hits;
        self.shade_submissions += rhs.shade_submissions;
        self.shaded_rays += rhs.shaded_rays;
        self.radiance_entries += rhs.radiance_entries;
        self.cancelled_batches += rhs.cancelled_batches;
    }
}

impl std::iter::Sum for RayStatistics {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |mut total, stats| {
            total += stats;
            total
        })
    }
}
