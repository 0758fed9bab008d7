//! Scene and frame fixtures shared by the handler and scheduler tests.

use crate::accel::{EmulatedGpuAccelerator, GeometryAccelerator};
use crate::aov::{AovSchema, RecordingAovs};
use crate::config::FrameSettings;
use crate::geometry::{GeometryCollection, Ray, SphereData};
use crate::handlers::{FrameState, FrameStateBuilder};
use crate::handles::{Handle, OcclSideItem, OcclSideList, SideDataStore};
use crate::helpers::{ColorType, PixelCoord};
use crate::raytracing::{CollectingRadianceQueue, RayState, Subpixel};
use crate::scene::{
    CollectingShadeQueue, MaterialId, MaterialTable, RayType, ShadeQueue, VolumeIntegrator,
    VolumeSample,
};
use smallvec::smallvec;
use std::sync::Arc;
use ultraviolet::Vec3;

/// Transmittance that is the same along every segment, and no volume radiance.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ConstantTransmittance(pub ColorType);

impl VolumeIntegrator for ConstantTransmittance {
    fn compute_radiance_volume(&self, _ray: &Ray, _ray_type: RayType) -> VolumeSample {
        VolumeSample::empty()
    }

    fn transmittance(&self, _: Vec3, _: Vec3, _: f32, _: f32, _: f32) -> ColorType {
        self.0
    }
}

/// Three unit spheres five units down +z: `a` at the origin's axis, `b` to the right and an
/// unassigned one to the left. Anything aimed along +y misses.
pub(crate) struct SphereScene {
    pub geometry: GeometryCollection,
    pub materials: MaterialTable,
    pub a: MaterialId,
    pub b: MaterialId,
    pub queue_a: Arc<CollectingShadeQueue>,
    pub queue_b: Arc<CollectingShadeQueue>,
}

pub(crate) const TOWARD_A: Vec3 = Vec3::new(0.0, 0.0, 1.0);
pub(crate) const TOWARD_NULL: Vec3 = Vec3::new(-3.0, 0.0, 5.0);
pub(crate) const TOWARD_B: Vec3 = Vec3::new(3.0, 0.0, 5.0);
pub(crate) const TOWARD_SKY: Vec3 = Vec3::new(0.0, 1.0, 0.0);

pub(crate) fn sphere_scene() -> SphereScene {
    let queue_a = Arc::new(CollectingShadeQueue::new());
    let queue_b = Arc::new(CollectingShadeQueue::new());
    let mut materials = MaterialTable::new();
    let a = materials.register("a", queue_a.clone() as Arc<dyn ShadeQueue>);
    let b = materials.register("b", queue_b.clone() as Arc<dyn ShadeQueue>);

    let mut geometry = GeometryCollection::new();
    geometry.add_sphere(SphereData::new(Vec3::new(0.0, 0.0, 5.0), 1.0), Some(a));
    geometry.add_sphere(SphereData::new(Vec3::new(3.0, 0.0, 5.0), 1.0), Some(b));
    geometry.add_sphere(SphereData::new(Vec3::new(-3.0, 0.0, 5.0), 1.0), None);

    SphereScene {
        geometry,
        materials,
        a,
        b,
        queue_a,
        queue_b,
    }
}

/// A frame plus handles on everything it writes to.
pub(crate) struct TestFrame {
    pub frame: FrameState,
    pub radiance: Arc<CollectingRadianceQueue>,
    pub aovs: Arc<RecordingAovs>,
    pub side_data: Arc<SideDataStore>,
    pub gpu: Arc<EmulatedGpuAccelerator>,
}

/// Builds a frame over `geometry` with recording AOVs on `schema`, a collecting radiance
/// queue and an emulated device; `configure` sets the rest.
pub(crate) fn test_frame(
    geometry: GeometryCollection,
    schema: AovSchema,
    configure: impl FnOnce(FrameStateBuilder) -> FrameStateBuilder,
) -> TestFrame {
    let scene = GeometryAccelerator::new(Arc::new(geometry));
    let gpu = Arc::new(EmulatedGpuAccelerator::new(scene.clone()));
    let side_data = Arc::new(SideDataStore::default());
    let radiance = Arc::new(CollectingRadianceQueue::new(side_data.clone()));
    let aovs = Arc::new(RecordingAovs::new());

    let builder = FrameState::builder(Arc::new(scene))
        .settings(FrameSettings::default().with_sort_cutoff(200))
        .side_data(side_data.clone())
        .radiance_queue(radiance.clone())
        .aovs(schema, aovs.clone())
        .gpu(gpu.clone());

    TestFrame {
        frame: configure(builder).build(),
        radiance,
        aovs,
        side_data,
        gpu,
    }
}

pub(crate) fn camera_state(frame: &FrameState, direction: Vec3, x: u32) -> RayState {
    frame
        .ray_states
        .acquire(
            Ray::new(Vec3::zero(), direction),
            Subpixel {
                pixel: PixelCoord::new(x, 0),
                subpixel_index: 0,
            },
        )
        .unwrap()
}

pub(crate) fn side_list(side_data: &SideDataStore, ray_epsilon: f32) -> Handle {
    let list: OcclSideList = smallvec![OcclSideItem {
        lpe_state_id: 3,
        ray_epsilon,
    }];
    side_data.insert_occl_list(list)
}
