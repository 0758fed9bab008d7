use crate::accel::{Accelerator, GpuAccelerator, Layer};
use crate::aov::{AovAccumulator, AovSchema, NullAovs};
use crate::config::FrameSettings;
use crate::handlers::GpuOcclusionBridge;
use crate::handles::SideDataStore;
use crate::raytracing::{CollectingRadianceQueue, RadianceQueue, RayStatePool};
use crate::scene::{LightSet, MaterialTable, NoVolumes, PresenceTracer, VolumeIntegrator};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide cancellation, polled by the handlers between stages.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline(always)]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Read-only context shared by every worker for the duration of a frame.
pub struct FrameState {
    pub settings: FrameSettings,
    pub accel: Arc<dyn Accelerator>,
    pub layer: Arc<dyn Layer>,
    pub presence: Arc<dyn PresenceTracer>,
    pub gpu: Option<GpuOcclusionBridge>,
    pub lights: Arc<LightSet>,
    pub materials: Arc<MaterialTable>,
    pub volumes: Arc<dyn VolumeIntegrator>,
    pub aov_schema: AovSchema,
    pub aovs: Arc<dyn AovAccumulator>,
    pub radiance_queue: Arc<dyn RadianceQueue>,
    pub side_data: Arc<SideDataStore>,
    pub ray_states: Arc<RayStatePool>,
    pub cancellation: CancellationFlag,
}

impl std::fmt::Debug for FrameState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameState")
            .field("settings", &self.settings)
            .field("lights", &self.lights.len())
            .field("materials", &self.materials.len())
            .field("aov_schema", &self.aov_schema)
            .field("gpu", &self.gpu.is_some())
            .finish_non_exhaustive()
    }
}

impl FrameState {
    /// Starts a frame over a scene that intersects, resolves materials and traces presence.
    pub fn builder<S>(scene: Arc<S>) -> FrameStateBuilder
    where
        S: Accelerator + Layer + PresenceTracer + 'static,
    {
        FrameStateBuilder {
            settings: FrameSettings::default(),
            accel: scene.clone(),
            layer: scene.clone(),
            presence: scene,
            gpu: None,
            lights: Arc::new(LightSet::new()),
            materials: Arc::new(MaterialTable::new()),
            volumes: Arc::new(NoVolumes),
            aov_schema: AovSchema::default(),
            aovs: Arc::new(NullAovs),
            radiance_queue: None,
            side_data: Arc::new(SideDataStore::default()),
            ray_state_capacity: None,
            cancellation: CancellationFlag::new(),
        }
    }
}

pub struct FrameStateBuilder {
    settings: FrameSettings,
    accel: Arc<dyn Accelerator>,
    layer: Arc<dyn Layer>,
    presence: Arc<dyn PresenceTracer>,
    gpu: Option<Arc<dyn GpuAccelerator>>,
    lights: Arc<LightSet>,
    materials: Arc<MaterialTable>,
    volumes: Arc<dyn VolumeIntegrator>,
    aov_schema: AovSchema,
    aovs: Arc<dyn AovAccumulator>,
    radiance_queue: Option<Arc<dyn RadianceQueue>>,
    side_data: Arc<SideDataStore>,
    ray_state_capacity: Option<usize>,
    cancellation: CancellationFlag,
}

impl FrameStateBuilder {
    pub fn settings(mut self, settings: FrameSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn gpu(mut self, gpu: Arc<dyn GpuAccelerator>) -> Self {
        self.gpu = Some(gpu);
        self
    }

    pub fn lights(mut self, lights: LightSet) -> Self {
        self.lights = Arc::new(lights);
        self
    }

    pub fn materials(mut self, materials: MaterialTable) -> Self {
        self.materials = Arc::new(materials);
        self
    }

    pub fn volumes(mut self, volumes: Arc<dyn VolumeIntegrator>) -> Self {
        self.volumes = volumes;
        self
    }

    pub fn aovs(mut self, schema: AovSchema, aovs: Arc<dyn AovAccumulator>) -> Self {
        self.aov_schema = schema;
        self.aovs = aovs;
        self
    }

    pub fn radiance_queue(mut self, queue: Arc<dyn RadianceQueue>) -> Self {
        self.radiance_queue = Some(queue);
        self
    }

    /// Shares an existing store, e.g. the one the radiance queue releases into.
    pub fn side_data(mut self, side_data: Arc<SideDataStore>) -> Self {
        self.side_data = side_data;
        self
    }

    pub fn ray_state_capacity(mut self, capacity: usize) -> Self {
        self.ray_state_capacity = Some(capacity);
        self
    }

    pub fn cancellation(mut self, cancellation: CancellationFlag) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn build(self) -> FrameState {
        let radiance_queue = self.radiance_queue.unwrap_or_else(|| {
            Arc::new(CollectingRadianceQueue::new(self.side_data.clone()))
        });
        let capacity = self
            .ray_state_capacity
            .unwrap_or(self.settings.max_batch_size * 4);
        FrameState {
            settings: self.settings,
            accel: self.accel,
            layer: self.layer,
            presence: self.presence,
            gpu: self.gpu.map(GpuOcclusionBridge::new),
            lights: self.lights,
            materials: self.materials,
            volumes: self.volumes,
            aov_schema: self.aov_schema,
            aovs: self.aovs,
            radiance_queue,
            side_data: self.side_data,
            ray_states: Arc::new(RayStatePool::new(capacity)),
            cancellation: self.cancellation,
        }
    }
}
