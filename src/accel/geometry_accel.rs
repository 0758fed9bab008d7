use crate::accel::{Accelerator, Layer};
use crate::geometry::{GeometryCollection, Ray};
use crate::scene::{MaterialId, PresenceTracer};
use itertools::izip;
use std::sync::Arc;
use ultraviolet::Vec3x8;
use wide::f32x8;

const PACKET_WIDTH: usize = 8;

/// Brute-force accelerator over a [`GeometryCollection`].
///
/// Spheres are tested eight rays at a time; full packets go through the SIMD path and the
/// remainder of a bundle falls back to scalar tests.
#[derive(Debug, Clone)]
pub struct GeometryAccelerator {
    geometry: Arc<GeometryCollection>,
}

impl GeometryAccelerator {
    pub fn new(geometry: Arc<GeometryCollection>) -> Self {
        Self { geometry }
    }

    pub fn geometry(&self) -> &GeometryCollection {
        &self.geometry
    }

    fn intersect_packet(&self, packet: &mut [Ray]) {
        debug_assert_eq!(packet.len(), PACKET_WIDTH);
        let origins = Vec3x8::from(std::array::from_fn::<_, PACKET_WIDTH, _>(|i| packet[i].origin));
        let directions =
            Vec3x8::from(std::array::from_fn::<_, PACKET_WIDTH, _>(|i| packet[i].direction));
        let t_near = f32x8::from(std::array::from_fn::<_, PACKET_WIDTH, _>(|i| packet[i].t_near));
        let t_far = f32x8::from(std::array::from_fn::<_, PACKET_WIDTH, _>(|i| packet[i].t_far));

        for (instance, sphere) in self.geometry.spheres() {
            let hits = sphere.intersect_x8(origins, directions, t_near, t_far).to_array();
            for (ray, t) in izip!(packet.iter_mut(), hits) {
                if t.is_finite() {
                    let normal = sphere.normal_at(ray.at(t));
                    ray.try_commit(t, instance.geom_id, instance.prim_id, normal);
                }
            }
        }

        for instance in self.geometry.non_spheres() {
            for ray in packet.iter_mut() {
                if let Some(t) = instance.geometry.intersect(ray) {
                    let normal = instance.geometry.normal_at(ray.at(t));
                    ray.try_commit(t, instance.geom_id, instance.prim_id, normal);
                }
            }
        }
    }
}

impl Accelerator for GeometryAccelerator {
    fn intersect(&self, ray: &mut Ray) {
        for instance in self.geometry.instances() {
            if let Some(t) = instance.geometry.intersect(ray) {
                let normal = instance.geometry.normal_at(ray.at(t));
                ray.try_commit(t, instance.geom_id, instance.prim_id, normal);
            }
        }
    }

    fn intersect_bundle(&self, rays: &mut [Ray]) {
        let mut packets = rays.chunks_exact_mut(PACKET_WIDTH);
        for packet in packets.by_ref() {
            self.intersect_packet(packet);
        }
        for ray in packets.into_remainder() {
            self.intersect(ray);
        }
    }

    fn occluded(&self, ray: &Ray) -> bool {
        self.geometry
            .instances()
            .iter()
            .any(|instance| instance.geometry.intersect(ray).is_some())
    }
}

impl Layer for GeometryAccelerator {
    fn lookup_material(&self, geom_id: u32, prim_id: u32) -> Option<MaterialId> {
        self.geometry
            .find(geom_id, prim_id)
            .and_then(|instance| instance.material)
    }
}

impl PresenceTracer for GeometryAccelerator {
    fn accumulate_ray_presence(&self, ray: &Ray, ray_epsilon: f32, max_depth: u32) -> f32 {
        let ray = ray.with_interval(ray.t_near + ray_epsilon, ray.t_far);
        let mut hits: Vec<(f32, f32)> = self
            .geometry
            .instances()
            .iter()
            .filter_map(|instance| {
                instance
                    .geometry
                    .intersect(&ray)
                    .map(|t| (t, instance.presence))
            })
            .collect();
        hits.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

        let mut total = 0.0f32;
        for (_, presence) in hits.into_iter().take(max_depth as usize) {
            total += (1.0 - total) * presence;
            if total >= 1.0 {
                return 1.0;
            }
        }
        total
    }
}

#[cfg(test)]
mod test_geometry_accelerator {
    use super::*;
    use crate::geometry::{SphereData, TriangleData};
    use assert_float_eq::assert_f32_near;
    use ultraviolet::Vec3;

    fn scene() -> GeometryAccelerator {
        let mut geometry = GeometryCollection::new();
        for i in 0..3 {
            geometry.add_sphere(
                SphereData::new(Vec3::new(i as f32 * 3.0 - 3.0, 0.0, 8.0), 1.0),
                None,
            );
        }
        geometry.add_mesh(
            [TriangleData::new(
                Vec3::new(-10.0, -1.0, -10.0),
                Vec3::new(10.0, -1.0, -10.0),
                Vec3::new(0.0, -1.0, 30.0),
            )],
            None,
        );
        GeometryAccelerator::new(Arc::new(geometry))
    }

    #[test]
    fn test_bundle_matches_single_rays() {
        let accel = scene();
        let rays: Vec<Ray> = (0..19)
            .map(|i| {
                let x = (i as f32 / 18.0) * 2.0 - 1.0;
                Ray::new(Vec3::zero(), Vec3::new(x * 0.6, -0.1, 1.0)).with_interval(1e-3, 1e3)
            })
            .collect();

        let mut bundled = rays.clone();
        accel.intersect_bundle(&mut bundled);

        for (mut single, bundled) in rays.into_iter().zip(bundled) {
            accel.intersect(&mut single);
            match (single.hit, bundled.hit) {
                (Some(a), Some(b)) => {
                    assert_eq!((a.geom_id, a.prim_id), (b.geom_id, b.prim_id));
                    assert_f32_near!(a.t, b.t, 64);
                }
                (a, b) => assert_eq!(a.is_none(), b.is_none()),
            }
        }
    }

    #[test]
    fn test_presence_accumulates_front_to_back() {
        let mut geometry = GeometryCollection::new();
        for z in [4.0, 8.0, 12.0] {
            geometry.add_presence_sphere(SphereData::new(Vec3::new(0.0, 0.0, z), 1.0), None, 0.5);
        }
        let accel = GeometryAccelerator::new(Arc::new(geometry));
        let ray = Ray::new(Vec3::zero(), Vec3::unit_z()).with_interval(1e-3, 100.0);

        assert_f32_near!(accel.accumulate_ray_presence(&ray, 0.0, 16), 0.875, 4);
        assert_f32_near!(accel.accumulate_ray_presence(&ray, 0.0, 1), 0.5, 4);
        assert_f32_near!(accel.accumulate_ray_presence(&ray, 0.0, 2), 0.75, 4);
        assert_eq!(accel.accumulate_ray_presence(&ray, 0.0, 0), 0.0);
    }
}
