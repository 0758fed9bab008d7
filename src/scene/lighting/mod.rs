mod light;

pub use light::{
    DistantLight, FalloffCurve, Light, LightIntersection, SphereLight, shadow_falloff,
};

use crate::{DispatchError, Result};
use smallvec::SmallVec;
use ultraviolet::Vec3;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct LightId(pub u32);

/// A light found along a camera ray, chosen among `num_hits` candidates.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct VisibleLightHit {
    pub light: LightId,
    pub isect: LightIntersection,
    pub num_hits: u32,
}

/// All lights of a frame, addressed by [`LightId`].
#[derive(Debug, Default)]
pub struct LightSet {
    lights: Vec<Box<dyn Light>>,
}

impl LightSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, light: impl Light + 'static) -> LightId {
        self.lights.push(Box::new(light));
        LightId(self.lights.len() as u32 - 1)
    }

    pub fn get(&self, id: LightId) -> Result<&dyn Light> {
        self.lights
            .get(id.0 as usize)
            .map(|light| light.as_ref())
            .ok_or(DispatchError::UnknownLight(id.0))
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Picks one of the camera-visible lights the ray hits using a single sample in
    /// `[0, 1)`. The hit count comes back so the caller can undo the selection probability.
    pub fn intersect_visible_light(
        &self,
        origin: Vec3,
        direction: Vec3,
        time: f32,
        max_distance: f32,
        sample: f32,
    ) -> Option<VisibleLightHit> {
        let hits: SmallVec<[(LightId, LightIntersection); 4]> = self
            .lights
            .iter()
            .enumerate()
            .filter(|(_, light)| light.is_visible_in_camera())
            .filter_map(|(index, light)| {
                light
                    .intersect(origin, direction, time, max_distance)
                    .map(|isect| (LightId(index as u32), isect))
            })
            .collect();

        let num_hits = hits.len();
        if num_hits == 0 {
            return None;
        }
        let chosen = ((sample * num_hits as f32) as usize).min(num_hits - 1);
        let (light, isect) = hits[chosen];
        Some(VisibleLightHit {
            light,
            isect,
            num_hits: num_hits as u32,
        })
    }
}
