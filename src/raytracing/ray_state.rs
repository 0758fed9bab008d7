use crate::color::ColorTransmittanceExt;
use crate::geometry::Ray;
use crate::handles::Handle;
use crate::helpers::{ColorType, PixelCoord};
use crate::scene::{RayType, VolumeSample, VolumeTransmittance};
use crate::{DispatchError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use ultraviolet::{Vec2, Vec3};

/// Scattering lobe that produced a ray.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum LobeType {
    #[default]
    Camera,
    Diffuse,
    Glossy,
    Mirror,
}

impl LobeType {
    pub fn ray_type(self) -> RayType {
        match self {
            LobeType::Camera => RayType::Camera,
            LobeType::Diffuse => RayType::Diffuse,
            LobeType::Glossy => RayType::Glossy,
            LobeType::Mirror => RayType::Mirror,
        }
    }
}

/// Path-tracing state carried from bounce to bounce.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PathVertex {
    pub throughput: ColorType,
    pub path_pixel_weight: f32,
    pub lpe_state_id: i32,
    /// State after a light event, precomputed by the integrator for secondary rays.
    pub lpe_state_id_light: i32,
    pub non_mirror_depth: u32,
    pub lobe_type: LobeType,
}

impl Default for PathVertex {
    fn default() -> Self {
        Self {
            throughput: ColorType::white(),
            path_pixel_weight: 1.0,
            lpe_state_id: 0,
            lpe_state_id_light: -1,
            non_mirror_depth: 0,
            lobe_type: LobeType::Camera,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct Subpixel {
    pub pixel: PixelCoord,
    pub subpixel_index: u32,
}

/// Volume results stored on the ray by the intersection stage.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VolumeScratch {
    pub radiance: ColorType,
    pub tr: ColorType,
    pub th: ColorType,
    pub talpha: ColorType,
    pub tm: ColorType,
    pub hit: bool,
    pub surface_t: f32,
}

impl Default for VolumeScratch {
    fn default() -> Self {
        Self::from(VolumeSample {
            hit: false,
            radiance: ColorType::black(),
            transmittance: VolumeTransmittance::unit(),
            surface_t: f32::INFINITY,
        })
    }
}

impl From<VolumeSample> for VolumeScratch {
    fn from(sample: VolumeSample) -> Self {
        Self {
            radiance: sample.radiance,
            tr: sample.transmittance.e,
            th: sample.transmittance.h,
            talpha: sample.transmittance.alpha,
            tm: sample.transmittance.min,
            hit: sample.hit,
            surface_t: sample.surface_t,
        }
    }
}

/// One in-flight ray. Not `Clone`: a state moves through the scheduler and leaves it
/// exactly once, either into a shade queue or back to its [`RayStatePool`].
#[derive(Debug, PartialEq)]
pub struct RayState {
    id: u32,
    pub ray: Ray,
    pub path: PathVertex,
    pub subpixel: Subpixel,
    pub sequence_id: u32,
    pub deep_data: Handle,
    pub crypto_data: Handle,
    pub crypto_ref_position: Vec3,
    pub crypto_ref_normal: Vec3,
    pub crypto_uv: Vec2,
    pub tile_pass: u32,
    pub volume: VolumeScratch,
}

impl RayState {
    #[inline(always)]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Ray type seen by the volume pass: camera until the path leaves the mirror chain.
    #[inline]
    pub fn volume_ray_type(&self) -> RayType {
        if self.path.non_mirror_depth == 0 {
            RayType::Camera
        } else {
            self.path.lobe_type.ray_type()
        }
    }
}

#[derive(Debug)]
struct PoolSlots {
    free: Vec<u32>,
    next: u32,
    live: Vec<bool>,
}

/// Fixed-capacity source of [`RayState`]s, shared by every worker.
///
/// Counts every acquire and release so a frame can prove nothing leaked.
#[derive(Debug)]
pub struct RayStatePool {
    capacity: usize,
    slots: Mutex<PoolSlots>,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl RayStatePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Mutex::new(PoolSlots {
                free: Vec::new(),
                next: 0,
                live: vec![false; capacity],
            }),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    pub fn acquire(&self, ray: Ray, subpixel: Subpixel) -> Result<RayState> {
        let id = {
            let mut slots = self.slots.lock();
            let id = match slots.free.pop() {
                Some(id) => id,
                None if (slots.next as usize) < self.capacity => {
                    slots.next += 1;
                    slots.next - 1
                }
                None => {
                    return Err(DispatchError::PoolExhausted {
                        capacity: self.capacity,
                    });
                }
            };
            slots.live[id as usize] = true;
            id
        };
        self.acquired.fetch_add(1, Ordering::Relaxed);

        Ok(RayState {
            id,
            ray,
            path: PathVertex::default(),
            subpixel,
            sequence_id: 0,
            deep_data: Handle::NULL,
            crypto_data: Handle::NULL,
            crypto_ref_position: Vec3::zero(),
            crypto_ref_normal: Vec3::zero(),
            crypto_uv: Vec2::zero(),
            tile_pass: 0,
            volume: VolumeScratch::default(),
        })
    }

    /// Returns many states at once, under a single lock.
    pub fn release_bulk(&self, states: impl IntoIterator<Item = RayState>) -> Result<usize> {
        let mut slots = self.slots.lock();
        let mut count = 0;
        for state in states {
            match slots.live.get_mut(state.id as usize) {
                Some(live) if *live => *live = false,
                _ => {
                    return Err(DispatchError::InvalidRayState {
                        id: state.id,
                        reason: "released while not live",
                    });
                }
            }
            slots.free.push(state.id);
            count += 1;
        }
        drop(slots);
        self.released.fetch_add(count, Ordering::Relaxed);
        Ok(count)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::Relaxed)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::Relaxed)
    }

    /// States handed out and not yet returned.
    pub fn outstanding(&self) -> usize {
        self.acquired() - self.released()
    }
}
