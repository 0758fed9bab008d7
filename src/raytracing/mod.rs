mod occl_ray;
mod radiance;
mod ray_state;

pub use occl_ray::{BundledOcclRay, OcclTestType};
pub use radiance::{BundledRadiance, CollectingRadianceQueue, RadianceQueue};
pub use ray_state::{LobeType, PathVertex, RayState, RayStatePool, Subpixel, VolumeScratch};
