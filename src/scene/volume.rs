use crate::color::ColorTransmittanceExt;
use crate::geometry::Ray;
use crate::helpers::ColorType;
use crate::scene::RayType;
use std::fmt::Debug;
use ultraviolet::Vec3;

/// The four transmittance components tracked along a camera segment.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VolumeTransmittance {
    /// Extinction
    pub e: ColorType,
    /// Holdout
    pub h: ColorType,
    /// Used for alpha
    pub alpha: ColorType,
    /// Minimum over the segment
    pub min: ColorType,
}

impl VolumeTransmittance {
    pub fn unit() -> Self {
        let white = ColorType::white();
        Self {
            e: white,
            h: white,
            alpha: white,
            min: white,
        }
    }

    /// Attenuation applied to light seen through the volume.
    #[inline]
    pub fn combined(&self) -> ColorType {
        self.e * self.h
    }
}

/// Result of integrating the media along a ray up to its hit.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VolumeSample {
    pub hit: bool,
    pub radiance: ColorType,
    pub transmittance: VolumeTransmittance,
    /// Distance at which the ray first entered a volume; infinity when it never did.
    pub surface_t: f32,
}

impl VolumeSample {
    pub fn empty() -> Self {
        Self {
            hit: false,
            radiance: ColorType::black(),
            transmittance: VolumeTransmittance::unit(),
            surface_t: f32::INFINITY,
        }
    }
}

/// Volumetric radiance and transmittance provider.
pub trait VolumeIntegrator: Send + Sync + Debug {
    fn compute_radiance_volume(&self, ray: &Ray, ray_type: RayType) -> VolumeSample;

    /// Transmittance between `t_near` and `t_far` along a shadow ray.
    fn transmittance(&self, origin: Vec3, direction: Vec3, t_near: f32, t_far: f32, time: f32)
    -> ColorType;
}

#[derive(Debug, Copy, Clone, Default)]
pub struct NoVolumes;

impl VolumeIntegrator for NoVolumes {
    fn compute_radiance_volume(&self, _ray: &Ray, _ray_type: RayType) -> VolumeSample {
        VolumeSample::empty()
    }

    fn transmittance(&self, _: Vec3, _: Vec3, _: f32, _: f32, _: f32) -> ColorType {
        ColorType::white()
    }
}

/// Emissive, absorbing fog filling a sphere.
#[derive(Debug, Clone)]
pub struct HomogeneousFog {
    center: Vec3,
    radius: f32,
    sigma_t: ColorType,
    emission: ColorType,
    /// Camera rays see emission but not extinction.
    holdout: bool,
}

impl HomogeneousFog {
    pub fn new(center: Vec3, radius: f32, sigma_t: ColorType, emission: ColorType) -> Self {
        Self {
            center,
            radius,
            sigma_t,
            emission,
            holdout: false,
        }
    }

    pub fn as_holdout(mut self) -> Self {
        self.holdout = true;
        self
    }

    /// Overlap of `[t_near, t_far]` with the fog sphere.
    fn overlap(&self, origin: Vec3, direction: Vec3, t_near: f32, t_far: f32) -> Option<(f32, f32)> {
        let oc = origin - self.center;
        let b = direction.dot(oc);
        let c = oc.dot(oc) - self.radius * self.radius;
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }
        let sqrt = discriminant.sqrt();
        let enter = (-b - sqrt).max(t_near);
        let exit = (-b + sqrt).min(t_far);
        (exit > enter).then_some((enter, exit))
    }

    fn segment_transmittance(&self, length: f32) -> ColorType {
        self.sigma_t.map_channels(|sigma| (-sigma * length).exp())
    }
}

impl VolumeIntegrator for HomogeneousFog {
    fn compute_radiance_volume(&self, ray: &Ray, _ray_type: RayType) -> VolumeSample {
        let Some((enter, exit)) =
            self.overlap(ray.origin, ray.direction, ray.t_near, ray.hit_distance())
        else {
            return VolumeSample::empty();
        };

        let tr = self.segment_transmittance(exit - enter);
        let white = ColorType::white();
        let (e, h) = if self.holdout { (white, tr) } else { (tr, white) };
        VolumeSample {
            hit: true,
            radiance: self.emission * (white - tr),
            transmittance: VolumeTransmittance {
                e,
                h,
                alpha: tr,
                min: tr,
            },
            surface_t: enter,
        }
    }

    fn transmittance(&self, origin: Vec3, direction: Vec3, t_near: f32, t_far: f32, _time: f32) -> ColorType {
        self.overlap(origin, direction, t_near, t_far)
            .map_or(ColorType::white(), |(enter, exit)| {
                self.segment_transmittance(exit - enter)
            })
    }
}

#[cfg(test)]
mod test_volumes {
    use super::*;
    use assert_float_eq::assert_f32_near;

    #[test]
    fn test_fog_segment_and_entry_distance() {
        let fog = HomogeneousFog::new(
            Vec3::new(0.0, 0.0, 5.0),
            1.0,
            ColorType::splat(0.5),
            ColorType::splat(2.0),
        );
        let ray = Ray::new(Vec3::zero(), Vec3::unit_z());
        let sample = fog.compute_radiance_volume(&ray, RayType::Camera);

        let expected_tr = (-1.0f32).exp();
        assert!(sample.hit);
        assert_f32_near!(sample.surface_t, 4.0, 8);
        assert_f32_near!(sample.transmittance.alpha.red, expected_tr, 8);
        assert_f32_near!(sample.radiance.green, 2.0 * (1.0 - expected_tr), 8);
        assert_eq!(sample.transmittance.h, ColorType::white());
    }

    #[test]
    fn test_fog_clipped_by_hit_and_missed() {
        let fog = HomogeneousFog::new(Vec3::zero(), 2.0, ColorType::splat(1.0), ColorType::black());
        let short = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::unit_z()).with_interval(0.0, 3.5);
        assert_f32_near!(fog.transmittance(short.origin, short.direction, 0.0, 3.5, 0.0).blue, (-0.5f32).exp(), 8);

        let away = Ray::new(Vec3::new(0.0, 5.0, 0.0), Vec3::unit_y());
        assert_eq!(fog.compute_radiance_volume(&away, RayType::Camera), VolumeSample::empty());
    }

    #[test]
    fn test_holdout_fog_moves_attenuation_to_h() {
        let fog = HomogeneousFog::new(Vec3::zero(), 1.0, ColorType::splat(1.0), ColorType::black())
            .as_holdout();
        let ray = Ray::new(Vec3::new(0.0, 0.0, -3.0), Vec3::unit_z());
        let sample = fog.compute_radiance_volume(&ray, RayType::Camera);
        assert_eq!(sample.transmittance.e, ColorType::white());
        assert_f32_near!(sample.transmittance.h.red, (-2.0f32).exp(), 8);
    }
}
