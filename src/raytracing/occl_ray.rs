use crate::accel::GpuRay;
use crate::float_ext::AbsDiffEq;
use crate::geometry::Ray;
use crate::handles::Handle;
use crate::helpers::{ColorType, PixelCoord};
use crate::scene::LightId;
use crate::{DispatchError, Result};
use ultraviolet::{Vec2, Vec3};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Default)]
pub enum OcclTestType {
    #[default]
    Standard,
    /// Skips the intersection test; the radiance is always emitted.
    ForceNotOccluded,
}

/// One shadow query toward a light sample.
///
/// Not `Clone`: the handles it carries are released when the ray is retired, and the ray
/// can only be retired once.
#[derive(Debug, PartialEq)]
pub struct BundledOcclRay {
    pub origin: Vec3,
    pub direction: Vec3,
    pub min_t: f32,
    pub max_t: f32,
    pub time: f32,
    pub depth: u32,
    pub test_type: OcclTestType,
    pub light: LightId,
    /// Contribution gated by the test.
    pub radiance: ColorType,
    pub pixel: PixelCoord,
    pub subpixel_index: u32,
    pub tile_pass: u32,
    /// AOV/LPE side list, see [`SideDataStore`](crate::handles::SideDataStore).
    pub data: Handle,
    pub deep_data: Handle,
    pub crypto_data: Handle,
    pub crypto_ref_position: Vec3,
    pub crypto_ref_normal: Vec3,
    pub crypto_uv: Vec2,
}

impl BundledOcclRay {
    pub fn new(
        origin: Vec3,
        direction: Vec3,
        max_t: f32,
        light: LightId,
        radiance: ColorType,
        pixel: PixelCoord,
    ) -> Self {
        Self {
            origin,
            direction: direction.normalized(),
            min_t: 1.0e-4,
            max_t,
            time: 0.0,
            depth: 1,
            test_type: OcclTestType::Standard,
            light,
            radiance,
            pixel,
            subpixel_index: 0,
            tile_pass: 0,
            data: Handle::NULL,
            deep_data: Handle::NULL,
            crypto_data: Handle::NULL,
            crypto_ref_position: Vec3::zero(),
            crypto_ref_normal: Vec3::zero(),
            crypto_uv: Vec2::zero(),
        }
    }

    pub fn forced(mut self) -> Self {
        self.test_type = OcclTestType::ForceNotOccluded;
        self
    }

    pub fn with_side_data(mut self, data: Handle) -> Self {
        self.data = data;
        self
    }

    /// Degenerate geometry or radiance is a bug upstream, not a miss.
    pub fn validate(&self, index: usize) -> Result<()> {
        let invalid = |reason| Err(DispatchError::InvalidOcclusionRay { index, reason });
        if !(self.origin.x.is_finite() && self.origin.y.is_finite() && self.origin.z.is_finite()) {
            return invalid("non-finite origin");
        }
        if !self.direction.mag_sq().abs_diff_eq(&1.0, 1.0e-3) {
            return invalid("direction is not normalized");
        }
        if self.min_t.is_nan() || self.max_t.is_nan() || self.max_t < self.min_t {
            return invalid("empty or NaN interval");
        }
        if !(self.radiance.red.is_finite()
            && self.radiance.green.is_finite()
            && self.radiance.blue.is_finite())
        {
            return invalid("non-finite radiance");
        }
        Ok(())
    }

    pub fn to_ray(&self) -> Ray {
        let mut ray = Ray::new(self.origin, self.direction)
            .with_interval(self.min_t, self.max_t)
            .with_time(self.time)
            .with_depth(self.depth);
        ray.direction = self.direction;
        ray
    }

    pub fn to_gpu_ray(&self, index: u32) -> GpuRay {
        GpuRay {
            origin: self.origin.into(),
            t_near: self.min_t,
            direction: self.direction.into(),
            t_far: self.max_t,
            time: self.time,
            index,
        }
    }
}
