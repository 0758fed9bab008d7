use raydispatch::accel::{EmulatedGpuAccelerator, GeometryAccelerator};
use raydispatch::color::ColorTransmittanceExt;
use raydispatch::config::FrameSettings;
use raydispatch::geometry::{GeometryCollection, Ray, SphereData, TriangleData};
use raydispatch::handlers::FrameState;
use raydispatch::handles::{OcclSideItem, SideDataStore};
use raydispatch::helpers::{ColorType, PixelCoord, RenderTiming};
use raydispatch::output::{Film, PngOutput};
use raydispatch::raytracing::{BundledOcclRay, Subpixel};
use raydispatch::renderer::{BundleScheduler, OcclusionBackend};
use raydispatch::scene::{
    CollectingShadeQueue, HomogeneousFog, LightId, LightSet, MaterialId, MaterialTable,
    ShadeEntry, SphereLight,
};
use smallvec::smallvec;
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use ultraviolet::Vec3;

const IMAGE_WIDTH: u32 = 320;
const IMAGE_HEIGHT: u32 = 240;
const FIELD_OF_VIEW_TAN: f32 = 0.5;

const LIGHT_CENTER: Vec3 = Vec3::new(-4.0, 6.0, 2.0);
const LIGHT_RADIUS: f32 = 0.75;
const LIGHT_RADIANCE: f32 = 60.0;

struct DemoMaterial {
    id: MaterialId,
    albedo: ColorType,
    queue: Arc<CollectingShadeQueue>,
    /// Shadow rays from this material go through partially present geometry.
    presence_shadows: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match render("raydispatch.png") {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "render failed");
            ExitCode::FAILURE
        }
    }
}

fn render(path: &str) -> Result<(), Box<dyn Error>> {
    let mut timing = RenderTiming::default();

    let mut materials = MaterialTable::new();
    let mut register = |name: &str, albedo: ColorType, presence_shadows: bool| {
        let queue = Arc::new(CollectingShadeQueue::new());
        DemoMaterial {
            id: materials.register(name, queue.clone()),
            albedo,
            queue,
            presence_shadows,
        }
    };
    let demo_materials = [
        register("red", ColorType::new(0.8, 0.1, 0.1), false),
        register("ghost", ColorType::new(0.2, 0.5, 0.9), false),
        register("ground", ColorType::splat(0.6), true),
    ];

    let mut geometry = GeometryCollection::new();
    geometry.add_sphere(SphereData::new(Vec3::new(0.0, 0.0, 6.0), 1.5), Some(demo_materials[0].id));
    geometry.add_presence_sphere(
        SphereData::new(Vec3::new(2.5, -0.5, 5.0), 1.0),
        Some(demo_materials[1].id),
        0.5,
    );
    let (a, b, c, d) = (
        Vec3::new(-20.0, -1.5, 0.0),
        Vec3::new(20.0, -1.5, 0.0),
        Vec3::new(20.0, -1.5, 40.0),
        Vec3::new(-20.0, -1.5, 40.0),
    );
    geometry.add_mesh(
        [TriangleData::new(a, c, b), TriangleData::new(a, d, c)],
        Some(demo_materials[2].id),
    );
    let scene = GeometryAccelerator::new(Arc::new(geometry));

    let mut lights = LightSet::new();
    let light = lights.add(SphereLight::new(
        LIGHT_CENTER,
        LIGHT_RADIUS,
        ColorType::splat(LIGHT_RADIANCE),
    ));

    let side_data = Arc::new(SideDataStore::default());
    let film = Arc::new(Film::new(IMAGE_WIDTH, IMAGE_HEIGHT, side_data.clone()));
    let fog = HomogeneousFog::new(
        Vec3::new(0.0, 0.0, 6.0),
        3.0,
        ColorType::splat(0.08),
        ColorType::new(0.05, 0.05, 0.08),
    );
    let frame = FrameState::builder(Arc::new(scene.clone()))
        .settings(FrameSettings::default())
        .gpu(Arc::new(EmulatedGpuAccelerator::new(scene)))
        .lights(lights)
        .materials(materials)
        .volumes(Arc::new(fog))
        .side_data(side_data.clone())
        .radiance_queue(film.clone())
        .ray_state_capacity((IMAGE_WIDTH * IMAGE_HEIGHT) as usize)
        .build();
    let scheduler = BundleScheduler::new(frame)?;
    let frame = scheduler.frame();

    let mut camera_batches = Vec::new();
    let mut batch = Vec::with_capacity(frame.settings.max_batch_size);
    for y in 0..IMAGE_HEIGHT {
        for x in 0..IMAGE_WIDTH {
            batch.push(frame.ray_states.acquire(
                camera_ray(x, y),
                Subpixel {
                    pixel: PixelCoord::new(x, y),
                    subpixel_index: 0,
                },
            )?);
            if batch.len() == frame.settings.max_batch_size {
                camera_batches.push(std::mem::take(&mut batch));
            }
        }
    }
    if !batch.is_empty() {
        camera_batches.push(batch);
    }
    let mut stats = scheduler.dispatch_ray_bundles(camera_batches)?;
    tracing::info!(elapsed = ?timing.next(), "camera rays dispatched");

    let mut shadow_rays = Vec::new();
    let mut presence_rays = Vec::new();
    for material in &demo_materials {
        let entries = material.queue.drain();
        for entry in &entries {
            let Some(ray) = shadow_ray(entry, material.albedo, light) else {
                continue;
            };
            if material.presence_shadows {
                let list = smallvec![OcclSideItem {
                    lpe_state_id: 0,
                    ray_epsilon: 1.0e-3,
                }];
                presence_rays.push(ray.with_side_data(side_data.insert_occl_list(list)));
            } else {
                shadow_rays.push(ray);
            }
        }
        frame
            .ray_states
            .release_bulk(entries.into_iter().map(|entry| entry.ray_state))?;
    }

    let batch_size = frame.settings.max_batch_size;
    stats += scheduler.dispatch_occlusion_bundles(into_batches(shadow_rays, batch_size), OcclusionBackend::Gpu)?;
    stats += scheduler.dispatch_presence_bundles(into_batches(presence_rays, batch_size))?;
    tracing::info!(elapsed = ?timing.next(), "shadow rays dispatched");

    PngOutput::new(path).write_film(&film, 1)?;
    tracing::info!(
        ?stats,
        outstanding = frame.ray_states.outstanding(),
        total = ?timing.total(),
        "frame done"
    );
    Ok(())
}

fn camera_ray(x: u32, y: u32) -> Ray {
    let aspect = IMAGE_WIDTH as f32 / IMAGE_HEIGHT as f32;
    let u = (2.0 * (x as f32 + 0.5) / IMAGE_WIDTH as f32 - 1.0) * aspect * FIELD_OF_VIEW_TAN;
    let v = (1.0 - 2.0 * (y as f32 + 0.5) / IMAGE_HEIGHT as f32) * FIELD_OF_VIEW_TAN;
    Ray::new(Vec3::zero(), Vec3::new(u, v, 1.0))
}

/// Lambertian light sample toward the center of the demo light.
fn shadow_ray(entry: &ShadeEntry, albedo: ColorType, light: LightId) -> Option<BundledOcclRay> {
    let rs = &entry.ray_state;
    let hit = rs.ray.hit?;
    let normal = if hit.normal.dot(rs.ray.direction) > 0.0 {
        -hit.normal
    } else {
        hit.normal
    };
    let origin = rs.ray.at(hit.t) + normal * 1.0e-3;
    let to_light = LIGHT_CENTER - origin;
    let distance = to_light.mag();
    let direction = to_light / distance;
    let cos_theta = normal.dot(direction);
    if cos_theta <= 0.0 {
        return None;
    }

    let falloff = cos_theta * LIGHT_RADIUS * LIGHT_RADIUS / (distance * distance);
    let radiance = rs.path.throughput * albedo * ColorType::splat(LIGHT_RADIANCE * falloff);
    let mut ray = BundledOcclRay::new(
        origin,
        direction,
        distance - LIGHT_RADIUS,
        light,
        radiance,
        rs.subpixel.pixel,
    );
    ray.subpixel_index = rs.subpixel.subpixel_index;
    Some(ray)
}

fn into_batches<T>(items: Vec<T>, batch_size: usize) -> Vec<Vec<T>> {
    let mut batches = Vec::with_capacity(items.len().div_ceil(batch_size.max(1)));
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        batches.push(items.by_ref().take(batch_size.max(1)).collect());
    }
    batches
}
