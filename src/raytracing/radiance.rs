use crate::Result;
use crate::color::ColorTransmittanceExt;
use crate::handles::{Handle, SideDataStore};
use crate::helpers::{ColorType, PixelCoord, RenderColor};
use crate::raytracing::{BundledOcclRay, RayState};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::atomic::{AtomicUsize, Ordering};
use ultraviolet::{Vec2, Vec3};

/// One retired contribution headed for the film.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BundledRadiance {
    pub radiance: RenderColor,
    pub path_pixel_weight: f32,
    pub pixel: PixelCoord,
    pub subpixel_index: u32,
    /// Referenced on creation; the consumer releases it.
    pub deep_data: Handle,
    pub crypto_data: Handle,
    pub crypto_ref_position: Vec3,
    pub crypto_ref_normal: Vec3,
    pub crypto_uv: Vec2,
    pub tile_pass: u32,
}

impl Default for BundledRadiance {
    fn default() -> Self {
        Self {
            radiance: ColorType::black().with_alpha(0.0),
            path_pixel_weight: 0.0,
            pixel: PixelCoord::default(),
            subpixel_index: 0,
            deep_data: Handle::NULL,
            crypto_data: Handle::NULL,
            crypto_ref_position: Vec3::zero(),
            crypto_ref_normal: Vec3::zero(),
            crypto_uv: Vec2::zero(),
            tile_pass: 0,
        }
    }
}

impl BundledRadiance {
    /// Contribution of a shadow ray: no alpha, no pixel weight.
    pub fn from_occl_ray(ray: &BundledOcclRay, radiance: ColorType, side_data: &SideDataStore) -> Result<Self> {
        Ok(Self {
            radiance: radiance.with_alpha(0.0),
            path_pixel_weight: 0.0,
            pixel: ray.pixel,
            subpixel_index: ray.subpixel_index,
            deep_data: side_data.acquire_deep(ray.deep_data)?,
            crypto_data: side_data.acquire_cryptomatte(ray.crypto_data)?,
            crypto_ref_position: ray.crypto_ref_position,
            crypto_ref_normal: ray.crypto_ref_normal,
            crypto_uv: ray.crypto_uv,
            tile_pass: ray.tile_pass,
        })
    }

    /// Contribution of a ray state that ends here.
    pub fn from_ray_state(rs: &RayState, radiance: ColorType, alpha: f32, side_data: &SideDataStore) -> Result<Self> {
        Ok(Self {
            radiance: radiance.with_alpha(alpha),
            path_pixel_weight: rs.path.path_pixel_weight,
            pixel: rs.subpixel.pixel,
            subpixel_index: rs.subpixel.subpixel_index,
            deep_data: side_data.acquire_deep(rs.deep_data)?,
            crypto_data: side_data.acquire_cryptomatte(rs.crypto_data)?,
            crypto_ref_position: rs.crypto_ref_position,
            crypto_ref_normal: rs.crypto_ref_normal,
            crypto_uv: rs.crypto_uv,
            tile_pass: rs.tile_pass,
        })
    }

    #[inline]
    pub fn color(&self) -> ColorType {
        self.radiance.color
    }
}

/// Thread-safe consumer of retired radiance. Owns the handles of every entry it accepts.
pub trait RadianceQueue: Send + Sync + Debug {
    fn add_radiance_entries(&self, entries: &[BundledRadiance]) -> Result<()>;
}

/// Radiance queue that keeps entries for inspection and releases their handles.
#[derive(Debug)]
pub struct CollectingRadianceQueue {
    entries: Mutex<Vec<BundledRadiance>>,
    batches: AtomicUsize,
    side_data: std::sync::Arc<SideDataStore>,
}

impl CollectingRadianceQueue {
    pub fn new(side_data: std::sync::Arc<SideDataStore>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            batches: AtomicUsize::new(0),
            side_data,
        }
    }

    pub fn entries(&self) -> Vec<BundledRadiance> {
        self.entries.lock().clone()
    }

    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl RadianceQueue for CollectingRadianceQueue {
    fn add_radiance_entries(&self, entries: &[BundledRadiance]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        for entry in entries {
            self.side_data.release_deep(entry.deep_data)?;
            self.side_data.release_cryptomatte(entry.crypto_data)?;
        }
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().extend_from_slice(entries);
        Ok(())
    }
}
