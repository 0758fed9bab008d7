use crate::geometry::{Ray, SphereData};
use crate::helpers::ColorType;
use std::fmt::Debug;
use ultraviolet::Vec3;

/// Where a ray met a light.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LightIntersection {
    pub distance: f32,
    pub position: Vec3,
    pub normal: Vec3,
}

/// Shape of the shadow fade between the clear radius and clear radius + falloff distance.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum FalloffCurve {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl FalloffCurve {
    /// Maps `t` in `[0, 1]` onto the curve.
    #[inline]
    pub fn eval(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            FalloffCurve::Linear => t,
            FalloffCurve::EaseIn => t * t,
            FalloffCurve::EaseOut => t * (2.0 - t),
            FalloffCurve::EaseInOut => t * t * (3.0 - 2.0 * t),
        }
    }
}

/// Base trait for all light types
pub trait Light: Send + Sync + Debug {
    /// Hit test of a ray against the light itself, used for lights seen directly.
    fn intersect(
        &self,
        origin: Vec3,
        direction: Vec3,
        time: f32,
        max_distance: f32,
    ) -> Option<LightIntersection>;

    /// Radiance leaving the light toward `origin` along `direction`.
    fn eval(&self, direction: Vec3, origin: Vec3, isect: &LightIntersection, time: f32)
    -> ColorType;

    /// Occluders closer to the light than this do not cast shadows.
    fn clear_radius(&self) -> f32 {
        0.0
    }

    fn clear_radius_falloff_distance(&self) -> f32 {
        0.0
    }

    fn falloff_curve(&self) -> FalloffCurve {
        FalloffCurve::Linear
    }

    /// Whether seeing this light directly makes the pixel opaque.
    fn is_opaque_in_alpha(&self) -> bool;

    fn is_visible_in_camera(&self) -> bool {
        true
    }
}

/// Fades `unoccluded` for an occluder `distance` away along a shadow ray: full strength
/// inside the clear radius, zero beyond clear radius + falloff distance.
pub fn shadow_falloff(light: &dyn Light, distance: f32, unoccluded: ColorType) -> ColorType {
    let clear_radius = light.clear_radius();
    if distance <= clear_radius {
        return unoccluded;
    }
    let falloff = light.clear_radius_falloff_distance();
    if falloff <= 0.0 {
        return ColorType::new(0.0, 0.0, 0.0);
    }
    let param = 1.0 - ((distance - clear_radius) / falloff).clamp(0.0, 1.0);
    unoccluded * light.falloff_curve().eval(param)
}

/// Spherical area light.
#[derive(Debug, Clone)]
pub struct SphereLight {
    shape: SphereData,
    radiance: ColorType,
    clear_radius: f32,
    falloff_distance: f32,
    falloff_curve: FalloffCurve,
}

impl SphereLight {
    pub fn new(center: Vec3, radius: f32, radiance: ColorType) -> Self {
        Self {
            shape: SphereData::new(center, radius),
            radiance,
            clear_radius: 0.0,
            falloff_distance: 0.0,
            falloff_curve: FalloffCurve::Linear,
        }
    }

    pub fn with_clear_radius(mut self, clear_radius: f32, falloff_distance: f32, curve: FalloffCurve) -> Self {
        self.clear_radius = clear_radius;
        self.falloff_distance = falloff_distance;
        self.falloff_curve = curve;
        self
    }
}

impl Light for SphereLight {
    fn intersect(
        &self,
        origin: Vec3,
        direction: Vec3,
        time: f32,
        max_distance: f32,
    ) -> Option<LightIntersection> {
        let ray = Ray::new(origin, direction)
            .with_interval(0.0, max_distance)
            .with_time(time);
        self.shape.intersect(&ray).map(|distance| {
            let position = ray.at(distance);
            LightIntersection {
                distance,
                position,
                normal: self.shape.normal_at(position),
            }
        })
    }

    fn eval(&self, direction: Vec3, _origin: Vec3, isect: &LightIntersection, _time: f32) -> ColorType {
        if direction.dot(isect.normal) < 0.0 {
            self.radiance
        } else {
            ColorType::new(0.0, 0.0, 0.0)
        }
    }

    fn clear_radius(&self) -> f32 {
        self.clear_radius
    }

    fn clear_radius_falloff_distance(&self) -> f32 {
        self.falloff_distance
    }

    fn falloff_curve(&self) -> FalloffCurve {
        self.falloff_curve
    }

    fn is_opaque_in_alpha(&self) -> bool {
        true
    }
}

/// Light at infinity subtending a cone around `direction`.
#[derive(Debug, Clone)]
pub struct DistantLight {
    direction: Vec3, // toward the light
    cos_half_angle: f32,
    radiance: ColorType,
}

impl DistantLight {
    pub fn new(direction: Vec3, half_angle_radians: f32, radiance: ColorType) -> Self {
        Self {
            direction: direction.normalized(),
            cos_half_angle: half_angle_radians.cos(),
            radiance,
        }
    }
}

impl Light for DistantLight {
    fn intersect(
        &self,
        origin: Vec3,
        direction: Vec3,
        _time: f32,
        max_distance: f32,
    ) -> Option<LightIntersection> {
        if max_distance < f32::INFINITY || direction.dot(self.direction) < self.cos_half_angle {
            return None;
        }
        Some(LightIntersection {
            distance: f32::INFINITY,
            position: origin + direction * 1.0e6,
            normal: -self.direction,
        })
    }

    fn eval(&self, _direction: Vec3, _origin: Vec3, _isect: &LightIntersection, _time: f32) -> ColorType {
        self.radiance
    }

    fn is_opaque_in_alpha(&self) -> bool {
        false
    }
}
