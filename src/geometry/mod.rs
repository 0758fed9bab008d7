mod ray;
mod sphere;
mod triangle;

pub use ray::{Ray, RayHit};
pub use sphere::SphereData;
pub use triangle::TriangleData;

use crate::scene::MaterialId;
use enumcapsulate::{Encapsulate, VariantDiscriminant};
use ultraviolet::Vec3;

/// Enum that represents all primitive types the reference accelerator knows
#[derive(Debug, Clone, Encapsulate, VariantDiscriminant)]
#[enumcapsulate(discriminant(name = GeometryKind))]
pub enum SceneGeometry {
    Sphere(SphereData),
    Triangle(TriangleData),
}

impl SceneGeometry {
    pub fn intersect(&self, ray: &Ray) -> Option<f32> {
        match self {
            SceneGeometry::Sphere(sphere) => sphere.intersect(ray),
            SceneGeometry::Triangle(triangle) => triangle.intersect(ray),
        }
    }

    pub fn normal_at(&self, point: Vec3) -> Vec3 {
        match self {
            SceneGeometry::Sphere(sphere) => sphere.normal_at(point),
            SceneGeometry::Triangle(triangle) => triangle.normal,
        }
    }
}

/// One primitive placed in the scene.
#[derive(Debug, Clone)]
pub struct GeometryInstance {
    pub geom_id: u32,
    pub prim_id: u32,
    pub geometry: SceneGeometry,
    /// `None` marks geometry that only bounds a volume or a holdout.
    pub material: Option<MaterialId>,
    /// Partial blockage in `[0, 1]` seen by presence shadow rays.
    pub presence: f32,
}

/// Flat primitive list. Each `add_*` call creates a new geometry id; triangles of one
/// mesh share it and get consecutive primitive ids.
#[derive(Debug, Clone, Default)]
pub struct GeometryCollection {
    instances: Vec<GeometryInstance>,
    next_geom_id: u32,
}

impl GeometryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_sphere(&mut self, sphere: SphereData, material: Option<MaterialId>) -> u32 {
        self.add_presence_sphere(sphere, material, 1.0)
    }

    pub fn add_presence_sphere(
        &mut self,
        sphere: SphereData,
        material: Option<MaterialId>,
        presence: f32,
    ) -> u32 {
        let geom_id = self.next_geom_id;
        self.next_geom_id += 1;
        self.instances.push(GeometryInstance {
            geom_id,
            prim_id: 0,
            geometry: sphere.into(),
            material,
            presence: presence.clamp(0.0, 1.0),
        });
        geom_id
    }

    pub fn add_mesh(
        &mut self,
        triangles: impl IntoIterator<Item = TriangleData>,
        material: Option<MaterialId>,
    ) -> u32 {
        let geom_id = self.next_geom_id;
        self.next_geom_id += 1;
        self.instances.extend(
            triangles
                .into_iter()
                .enumerate()
                .map(|(prim_id, triangle)| GeometryInstance {
                    geom_id,
                    prim_id: prim_id as u32,
                    geometry: triangle.into(),
                    material,
                    presence: 1.0,
                }),
        );
        geom_id
    }

    pub fn instances(&self) -> &[GeometryInstance] {
        &self.instances
    }

    pub fn spheres(&self) -> impl Iterator<Item = (&GeometryInstance, &SphereData)> {
        self.instances
            .iter()
            .filter_map(|instance| match &instance.geometry {
                SceneGeometry::Sphere(sphere) => Some((instance, sphere)),
                SceneGeometry::Triangle(_) => None,
            })
    }

    pub fn non_spheres(&self) -> impl Iterator<Item = &GeometryInstance> {
        self.instances
            .iter()
            .filter(|instance| instance.geometry.variant_discriminant() != GeometryKind::Sphere)
    }

    pub fn find(&self, geom_id: u32, prim_id: u32) -> Option<&GeometryInstance> {
        self.instances
            .iter()
            .find(|instance| instance.geom_id == geom_id && instance.prim_id == prim_id)
    }

    pub fn count_of(&self, kind: GeometryKind) -> usize {
        self.instances
            .iter()
            .filter(|instance| instance.geometry.variant_discriminant() == kind)
            .count()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
