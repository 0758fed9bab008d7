mod lighting;
mod material;
mod presence;
mod volume;

pub use lighting::{
    DistantLight, FalloffCurve, Light, LightId, LightIntersection, LightSet, SphereLight,
    VisibleLightHit, shadow_falloff,
};
pub use material::{
    CollectingShadeQueue, MaterialId, MaterialTable, RayType, ShadeEntry, ShadeQueue,
};
pub use presence::PresenceTracer;
pub use volume::{HomogeneousFog, NoVolumes, VolumeIntegrator, VolumeSample, VolumeTransmittance};
