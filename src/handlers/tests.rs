use super::*;
use crate::accel::{Accelerator, GeometryAccelerator};
use crate::aov::{AovEvent, AovSchema, LpePrefix};
use crate::color::ColorTransmittanceExt;
use crate::config::FrameSettings;
use crate::geometry::{GeometryCollection, SphereData};
use crate::handles::{CryptomatteData, DeepData, SideDataCounts};
use crate::helpers::{ColorType, PixelCoord};
use crate::raytracing::{BundledOcclRay, BundledRadiance, OcclTestType, RayState};
use crate::scene::{DistantLight, HomogeneousFog, LightId, LightSet, RayType, SphereLight};
use crate::testing::*;
use crate::DispatchError;
use assert_float_eq::assert_f32_near;
use std::sync::Arc;
use ultraviolet::Vec3;

fn worker() -> WorkerState {
    WorkerState::new(0, 1 << 20)
}

fn states(frame: &FrameState, directions: &[Vec3]) -> Vec<RayState> {
    directions
        .iter()
        .enumerate()
        .map(|(x, &direction)| camera_state(frame, direction, x as u32))
        .collect()
}

fn shadow_ray(direction: Vec3, max_t: f32, light: LightId, x: u32) -> BundledOcclRay {
    BundledOcclRay::new(
        Vec3::zero(),
        direction,
        max_t,
        light,
        ColorType::white(),
        PixelCoord::new(x, 0),
    )
}

/// A light far down +z, behind sphere `a`.
fn light_behind_a() -> (LightSet, LightId) {
    let mut lights = LightSet::new();
    let light = lights.add(SphereLight::new(Vec3::new(0.0, 0.0, 20.0), 1.0, ColorType::white()));
    (lights, light)
}

#[test]
fn test_every_ray_state_leaves_exactly_once() {
    for cutoff in [0, usize::MAX] {
        let SphereScene {
            geometry,
            materials,
            queue_a,
            queue_b,
            ..
        } = sphere_scene();
        let t = test_frame(geometry, AovSchema::default(), |f| {
            f.materials(materials)
                .settings(FrameSettings::default().with_sort_cutoff(cutoff))
        });
        let batch = states(
            &t.frame,
            &[
                TOWARD_A, TOWARD_SKY, TOWARD_B, TOWARD_A, TOWARD_NULL, TOWARD_B, TOWARD_SKY, TOWARD_A,
            ],
        );
        let mut worker = worker();

        let outcome = ray_bundle_handler(&mut worker, &t.frame, batch).unwrap();

        assert_eq!(outcome, BatchOutcome::Completed);
        assert_eq!((queue_a.submissions(), queue_a.len()), (1, 3));
        assert_eq!((queue_b.submissions(), queue_b.len()), (1, 2));
        assert_eq!(t.radiance.len(), 2);
        assert_eq!(t.frame.ray_states.released(), 3);
        assert_eq!(t.frame.ray_states.outstanding(), 5);

        let stats = worker.stats;
        assert_eq!(stats.intersection_rays, 8);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.null_material_hits, 1);
        assert_eq!(stats.shade_submissions, 2);
        assert_eq!(stats.shaded_rays, 5);
        assert_eq!(stats.radiance_entries, 2);

        let shaded = queue_a.drain();
        assert!(shaded.windows(2).all(|w| w[0].sort_key <= w[1].sort_key));
        assert!(
            shaded
                .iter()
                .all(|entry| entry.ray_state.ray.hit.is_some_and(|hit| hit.geom_id == 0))
        );
        assert_eq!(worker.arena.bytes_in_use(), 0);
    }
}

#[test]
fn test_repeated_misses_are_identical_and_transparent() {
    let SphereScene {
        geometry, materials, ..
    } = sphere_scene();
    let t = test_frame(geometry, AovSchema::default(), |f| f.materials(materials));
    let mut batch = states(&t.frame, &[TOWARD_SKY, TOWARD_SKY]);
    batch[1].subpixel.pixel = batch[0].subpixel.pixel;

    ray_bundle_handler(&mut worker(), &t.frame, batch).unwrap();

    let entries = t.radiance.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], entries[1]);
    assert!(entries[0].color().is_black());
    assert_eq!(entries[0].radiance.alpha, 0.0);
}

#[test]
fn test_ray_switch_sends_camera_hits_elsewhere() {
    let SphereScene {
        geometry,
        mut materials,
        a,
        b,
        queue_a,
        queue_b,
    } = sphere_scene();
    materials.set_ray_switch(a, RayType::Camera, b).unwrap();
    let t = test_frame(geometry, AovSchema::default(), |f| f.materials(materials));
    let batch = states(&t.frame, &[TOWARD_A, TOWARD_B, TOWARD_A]);

    ray_bundle_handler(&mut worker(), &t.frame, batch).unwrap();

    assert!(queue_a.is_empty());
    assert_eq!((queue_b.submissions(), queue_b.len()), (1, 3));
}

#[test]
fn test_camera_miss_sees_light() {
    let SphereScene {
        geometry, materials, ..
    } = sphere_scene();
    let mut lights = LightSet::new();
    let radiance = ColorType::new(2.0, 3.0, 4.0);
    lights.add(SphereLight::new(Vec3::new(0.0, 10.0, 0.0), 1.0, radiance));
    let t = test_frame(geometry, AovSchema::new(4), |f| {
        f.materials(materials).lights(lights)
    });
    let batch = states(&t.frame, &[TOWARD_SKY]);

    ray_bundle_handler(&mut worker(), &t.frame, batch).unwrap();

    let entries = t.radiance.entries();
    assert_eq!(entries[0].color(), radiance);
    assert_eq!(entries[0].radiance.alpha, 1.0);

    let pixel = PixelCoord::new(0, 0);
    assert_eq!(
        t.aovs.events(),
        vec![
            AovEvent::VisibilityAttempts {
                pixel,
                lpe_state_id: 0,
                attempts: 1,
            },
            AovEvent::Background {
                pixel,
                lpe_state_id: 0,
                radiance,
            },
            AovEvent::DirectLight {
                pixel,
                lpe_state_id: 1,
                radiance,
            },
        ]
    );
}

#[test]
fn test_visibility_attempts_saturate() {
    let SphereScene {
        geometry, materials, ..
    } = sphere_scene();
    let mut lights = bulb();
    lights.add(DistantLight::new(Vec3::unit_x(), 0.1, ColorType::white()));
    let t = test_frame(geometry, AovSchema::new(4), |f| {
        f.materials(materials)
            .lights(lights)
            .settings(FrameSettings::default().with_light_sample_count(u32::MAX))
    });
    let batch = states(&t.frame, &[TOWARD_SKY]);

    ray_bundle_handler(&mut worker(), &t.frame, batch).unwrap();

    assert!(matches!(
        t.aovs.events().first(),
        Some(AovEvent::VisibilityAttempts {
            attempts: u32::MAX,
            ..
        })
    ));
}

/// One camera ray toward the sky, optionally through fog wrapped around the camera.
fn sky_miss(lights: LightSet, fog: Option<HomogeneousFog>) -> BundledRadiance {
    let SphereScene {
        geometry, materials, ..
    } = sphere_scene();
    let t = test_frame(geometry, AovSchema::default(), |f| {
        let f = f.materials(materials).lights(lights);
        match fog {
            Some(fog) => f.volumes(Arc::new(fog)),
            None => f,
        }
    });
    let batch = states(&t.frame, &[TOWARD_SKY]);

    ray_bundle_handler(&mut worker(), &t.frame, batch).unwrap();

    let mut entries = t.radiance.entries();
    assert_eq!(entries.len(), 1);
    entries.remove(0)
}

fn sun() -> LightSet {
    let mut lights = LightSet::new();
    lights.add(DistantLight::new(Vec3::unit_y(), 0.1, ColorType::white()));
    lights
}

fn bulb() -> LightSet {
    let mut lights = LightSet::new();
    lights.add(SphereLight::new(Vec3::new(0.0, 10.0, 0.0), 1.0, ColorType::white()));
    lights
}

/// Absorbs `1 - e^-1` over the two units a sky ray spends inside it, emits nothing.
fn dark_fog() -> HomogeneousFog {
    HomogeneousFog::new(Vec3::zero(), 2.0, ColorType::splat(0.5), ColorType::black())
}

#[test]
fn test_miss_alpha_follows_light_and_volume() {
    let tr = (-1.0f32).exp();

    let opaque_fogged = sky_miss(bulb(), Some(dark_fog()));
    assert_f32_near!(opaque_fogged.color().red, tr, 8);
    assert_f32_near!(opaque_fogged.radiance.alpha, 1.0);

    let sun_fogged = sky_miss(sun(), Some(dark_fog()));
    assert_f32_near!(sun_fogged.color().green, tr, 8);
    assert_f32_near!(sun_fogged.radiance.alpha, 1.0 - tr, 8);

    let sun_clear = sky_miss(sun(), None);
    assert_f32_near!(sun_clear.color().blue, 1.0);
    assert_eq!(sun_clear.radiance.alpha, 0.0);

    let glowing_fog = HomogeneousFog::new(Vec3::zero(), 2.0, ColorType::splat(0.5), ColorType::white());
    let unlit_fogged = sky_miss(LightSet::new(), Some(glowing_fog));
    assert_f32_near!(unlit_fogged.color().red, 1.0 - tr, 8);
    assert_f32_near!(unlit_fogged.radiance.alpha, 1.0 - tr, 8);
}

#[test]
fn test_secondary_miss_uses_precomputed_light_state() {
    let SphereScene {
        geometry, materials, ..
    } = sphere_scene();
    let mut lights = LightSet::new();
    lights.add(SphereLight::new(Vec3::new(0.0, 10.0, 0.0), 1.0, ColorType::white()));
    let t = test_frame(geometry, AovSchema::new(4), |f| {
        f.materials(materials).lights(lights)
    });
    let mut batch = states(&t.frame, &[TOWARD_SKY]);
    batch[0].ray.depth = 1;
    batch[0].path.lpe_state_id_light = 7;

    ray_bundle_handler(&mut worker(), &t.frame, batch).unwrap();

    let entries = t.radiance.entries();
    assert!(entries[0].color().is_black());
    assert_eq!(entries[0].radiance.alpha, 0.0);
    assert!(matches!(
        t.aovs.events().last(),
        Some(AovEvent::DirectLight { lpe_state_id: 7, .. })
    ));
    assert!(
        !t.aovs
            .events()
            .iter()
            .any(|event| matches!(event, AovEvent::VisibilityAttempts { .. }))
    );
}

#[test]
fn test_null_material_hit_emits_volume_only() {
    let SphereScene {
        geometry, materials, ..
    } = sphere_scene();
    let fog = HomogeneousFog::new(Vec3::zero(), 2.0, ColorType::splat(0.5), ColorType::white());
    let t = test_frame(geometry, AovSchema::default(), |f| {
        f.materials(materials).volumes(Arc::new(fog))
    });
    let batch = states(&t.frame, &[TOWARD_NULL]);
    let mut worker = worker();

    ray_bundle_handler(&mut worker, &t.frame, batch).unwrap();

    let entries = t.radiance.entries();
    assert_eq!(entries.len(), 1);
    let absorbed = 1.0 - (-1.0f32).exp();
    assert_f32_near!(entries[0].color().red, absorbed, 8);
    assert_f32_near!(entries[0].radiance.alpha, absorbed, 8);
    assert_eq!(worker.stats.null_material_hits, 1);
    assert_eq!(t.frame.ray_states.outstanding(), 0);
}

#[test]
fn test_cancelled_batch_stops_before_routing() {
    let SphereScene {
        geometry,
        materials,
        queue_a,
        ..
    } = sphere_scene();
    let cancellation = CancellationFlag::new();
    let t = test_frame(geometry, AovSchema::default(), |f| {
        f.materials(materials).cancellation(cancellation.clone())
    });
    let batch = states(&t.frame, &[TOWARD_A, TOWARD_SKY]);
    cancellation.cancel();

    let outcome = ray_bundle_handler(&mut worker(), &t.frame, batch).unwrap();

    assert_eq!(outcome, BatchOutcome::Cancelled);
    assert!(queue_a.is_empty());
    assert!(t.radiance.is_empty());
}

#[test]
fn test_oversized_batch_is_rejected() {
    let SphereScene {
        geometry, materials, ..
    } = sphere_scene();
    let t = test_frame(geometry, AovSchema::default(), |f| {
        f.materials(materials)
            .settings(FrameSettings::default().with_max_batch_size(1))
    });
    let batch = states(&t.frame, &[TOWARD_A, TOWARD_B]);

    assert_eq!(
        ray_bundle_handler(&mut worker(), &t.frame, batch),
        Err(DispatchError::BatchOverflow { len: 2, max: 1 })
    );
}

#[test]
fn test_occlusion_branches_and_aovs() {
    let (lights, light) = light_behind_a();
    let t = test_frame(sphere_scene().geometry, AovSchema::new(2), |f| {
        f.lights(lights)
            .volumes(Arc::new(ConstantTransmittance(ColorType::splat(0.5))))
    });
    let rays: Vec<_> = [
        shadow_ray(TOWARD_A, 19.0, light, 0).forced(),
        shadow_ray(TOWARD_SKY, 9.0, light, 1),
        shadow_ray(TOWARD_A, 19.0, light, 2),
    ]
    .into_iter()
    .map(|ray| ray.with_side_data(side_list(&t.side_data, 1.0e-3)))
    .collect();
    let mut worker = worker();

    occlusion_query_bundle_handler(&mut worker, &t.frame, rays).unwrap();

    let entries = t.radiance.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].pixel, PixelCoord::new(1, 0));
    assert_eq!(entries[1].pixel, PixelCoord::new(0, 0));
    for entry in &entries {
        assert_eq!(entry.color(), ColorType::splat(0.5));
        assert_eq!(entry.radiance.alpha, 0.0);
        assert_eq!(entry.path_pixel_weight, 0.0);
    }

    let events = t.aovs.events();
    assert_eq!(events.len(), 4);
    assert!(matches!(
        events[0],
        AovEvent::Light {
            prefix: LpePrefix::Unoccluded,
            transmittance: Some(_),
            items: 1,
            ..
        }
    ));
    match events[1] {
        AovEvent::Visibility { visibility, .. } => assert_f32_near!(visibility, 0.5),
        ref other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(events[2], AovEvent::VisibilityOccluded { .. }));
    assert_eq!(
        events[3],
        AovEvent::Light {
            pixel: PixelCoord::new(0, 0),
            light,
            value: ColorType::splat(0.5),
            transmittance: None,
            prefix: LpePrefix::None,
            items: 1,
        }
    );

    assert_eq!(t.side_data.live_counts().total(), 0);
    assert_eq!(t.side_data.occl_list_releases(), 3);
    assert_eq!(worker.stats.occlusion_rays, 3);
    assert_eq!(worker.stats.radiance_entries, 2);
}

#[test]
fn test_occluded_ray_with_unoccluded_prefix() {
    let (lights, light) = light_behind_a();
    let schema = AovSchema::new(2).with_prefix(LpePrefix::Unoccluded);
    let t = test_frame(sphere_scene().geometry, schema, |f| f.lights(lights));
    let ray = shadow_ray(TOWARD_A, 19.0, light, 0).with_side_data(side_list(&t.side_data, 0.0));

    occlusion_query_bundle_handler(&mut worker(), &t.frame, vec![ray]).unwrap();

    assert!(t.radiance.is_empty());
    let events = t.aovs.events();
    assert!(matches!(events[0], AovEvent::VisibilityOccluded { .. }));
    assert!(matches!(
        events[1],
        AovEvent::Light {
            transmittance: None,
            prefix: LpePrefix::Unoccluded,
            ..
        }
    ));
}

#[test]
fn test_disabled_shadowing_emits_blocked_rays() {
    let (lights, light) = light_behind_a();
    let t = test_frame(sphere_scene().geometry, AovSchema::default(), |f| {
        f.lights(lights)
            .settings(FrameSettings::default().with_shadowing(false))
    });

    occlusion_query_bundle_handler(
        &mut worker(),
        &t.frame,
        vec![shadow_ray(TOWARD_A, 19.0, light, 0)],
    )
    .unwrap();

    assert_eq!(t.radiance.entries()[0].color(), ColorType::white());
}

#[test]
fn test_clear_radius_fades_shadow() {
    let mut lights = LightSet::new();
    let light = lights.add(
        SphereLight::new(Vec3::new(0.0, 0.0, 20.0), 1.0, ColorType::white()).with_clear_radius(
            5.0,
            10.0,
            crate::scene::FalloffCurve::Linear,
        ),
    );
    let t = test_frame(sphere_scene().geometry, AovSchema::default(), |f| f.lights(lights));
    let rays = vec![
        shadow_ray(TOWARD_A, 8.0, light, 0),
        shadow_ray(TOWARD_A, 19.0, light, 1),
    ];

    occlusion_query_bundle_handler(&mut worker(), &t.frame, rays).unwrap();

    let entries = t.radiance.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].pixel, PixelCoord::new(0, 0));
    assert_f32_near!(entries[0].color().green, 0.7, 4);
}

/// One unoccluded and one occluded shadow ray, each carrying all three handles.
fn rays_with_side_data(t: &TestFrame, light: LightId) -> Vec<BundledOcclRay> {
    [TOWARD_SKY, TOWARD_A]
        .into_iter()
        .enumerate()
        .map(|(x, direction)| {
            let mut ray = shadow_ray(direction, 9.0, light, x as u32)
                .with_side_data(side_list(&t.side_data, 0.0));
            ray.deep_data = t.side_data.insert_deep(DeepData {
                z: 1.0,
                normal: Vec3::unit_z(),
                layer: 0,
            });
            ray.crypto_data = t.side_data.insert_cryptomatte(CryptomatteData {
                id: 0.25,
                position: Vec3::zero(),
                normal: Vec3::unit_z(),
            });
            ray
        })
        .collect()
}

#[test]
fn test_side_data_released_on_every_exit() {
    let (lights, light) = light_behind_a();
    let t = test_frame(sphere_scene().geometry, AovSchema::new(1), |f| f.lights(lights));
    let rays = rays_with_side_data(&t, light);
    assert_eq!(t.side_data.live_counts().total(), 6);

    occlusion_query_bundle_handler(&mut worker(), &t.frame, rays).unwrap();

    assert_eq!(t.radiance.len(), 1);
    assert_eq!(t.side_data.live_counts().total(), 0);
}

#[test]
fn test_cancelled_occlusion_keeps_unflushed_references() {
    let (lights, light) = light_behind_a();
    let cancellation = CancellationFlag::new();
    let t = test_frame(sphere_scene().geometry, AovSchema::new(1), |f| {
        f.lights(lights).cancellation(cancellation.clone())
    });
    let rays = rays_with_side_data(&t, light);
    cancellation.cancel();

    let outcome = occlusion_query_bundle_handler(&mut worker(), &t.frame, rays).unwrap();

    assert_eq!(outcome, BatchOutcome::Cancelled);
    assert!(t.radiance.is_empty());
    // every ray released its own handles; only the unflushed result's references remain
    assert_eq!(
        t.side_data.live_counts(),
        SideDataCounts {
            occl_lists: 0,
            deep: 1,
            cryptomatte: 1,
        }
    );
}

#[test]
fn test_invalid_shadow_ray_is_rejected() {
    let (lights, light) = light_behind_a();
    let t = test_frame(sphere_scene().geometry, AovSchema::default(), |f| f.lights(lights));
    let mut ray = shadow_ray(TOWARD_SKY, 9.0, light, 0);
    ray.max_t = 0.0;

    assert!(matches!(
        occlusion_query_bundle_handler(&mut worker(), &t.frame, vec![ray]),
        Err(DispatchError::InvalidOcclusionRay { index: 0, .. })
    ));
}

#[test]
fn test_gpu_matches_cpu() {
    let rays = |light: LightId| {
        vec![
            shadow_ray(TOWARD_A, 19.0, light, 0),
            shadow_ray(TOWARD_SKY, 9.0, light, 1).forced(),
            shadow_ray(TOWARD_B, 19.0, light, 2),
            shadow_ray(TOWARD_SKY, 9.0, light, 3),
        ]
    };

    let (lights, light) = light_behind_a();
    let cpu = test_frame(sphere_scene().geometry, AovSchema::default(), |f| f.lights(lights));
    occlusion_query_bundle_handler(&mut worker(), &cpu.frame, rays(light)).unwrap();

    let (lights, light) = light_behind_a();
    let gpu = test_frame(sphere_scene().geometry, AovSchema::default(), |f| f.lights(lights));
    let bridge = gpu.frame.gpu.as_ref().unwrap();
    let mut gpu_worker = worker();
    bridge
        .occlusion_query_bundle_handler(&mut gpu_worker, &gpu.frame, rays(light))
        .unwrap();

    assert_eq!(cpu.radiance.entries(), gpu.radiance.entries());

    // uploads keep the order of the standard rays
    let scene = GeometryAccelerator::new(Arc::new(sphere_scene().geometry));
    let submitted = rays(light);
    let cpu_occluded: Vec<u32> = submitted
        .iter()
        .filter(|ray| ray.test_type == OcclTestType::Standard)
        .enumerate()
        .filter(|(_, ray)| scene.occluded(&ray.to_ray()))
        .map(|(index, _)| index as u32)
        .collect();
    let mut gpu_occluded: Vec<u32> = gpu.gpu.occluded_rays().iter().map(|ray| ray.index).collect();
    gpu_occluded.sort_unstable();
    assert_eq!(cpu_occluded, vec![0, 1]);
    assert_eq!(gpu_occluded, cpu_occluded);

    assert_eq!(gpu.gpu.launches(), 1);
    assert_eq!(gpu.gpu.rays_traced(), 3);
    assert_eq!(bridge.threads_using_gpu(), 0);
    assert_eq!(gpu_worker.stats.bundled_gpu_occlusion_rays, 4);
}

fn presence_geometry() -> GeometryCollection {
    let mut geometry = GeometryCollection::new();
    geometry.add_presence_sphere(SphereData::new(Vec3::new(0.0, 0.0, 5.0), 1.0), None, 0.4);
    geometry
}

#[test]
fn test_presence_scales_by_remaining_transmission() {
    let (lights, light) = light_behind_a();
    let t = test_frame(presence_geometry(), AovSchema::new(1), |f| f.lights(lights));
    let ray = shadow_ray(TOWARD_A, 19.0, light, 0).with_side_data(side_list(&t.side_data, 1.0e-3));
    let mut worker = worker();

    presence_shadows_query_bundle_handler(&mut worker, &t.frame, vec![ray]).unwrap();

    let entries = t.radiance.entries();
    assert_f32_near!(entries[0].color().blue, 0.6, 4);
    match t.aovs.events().as_slice() {
        [
            AovEvent::Light {
                transmittance: Some(occlusion),
                prefix: LpePrefix::Unoccluded,
                ..
            },
            AovEvent::Visibility { visibility, .. },
        ] => {
            assert_f32_near!(occlusion.red, 0.6, 4);
            assert_f32_near!(*visibility, 0.6, 4);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(worker.stats.presence_shadow_rays, 1);
    assert_eq!(t.side_data.live_counts().total(), 0);
}

#[test]
fn test_presence_ignored_without_shadowing() {
    let (lights, light) = light_behind_a();
    let t = test_frame(presence_geometry(), AovSchema::default(), |f| {
        f.lights(lights)
            .settings(FrameSettings::default().with_shadowing(false))
    });
    let ray = shadow_ray(TOWARD_A, 19.0, light, 0).with_side_data(side_list(&t.side_data, 1.0e-3));

    presence_shadows_query_bundle_handler(&mut worker(), &t.frame, vec![ray]).unwrap();

    assert_eq!(t.radiance.entries()[0].color(), ColorType::white());
}

#[test]
fn test_presence_requires_side_list() {
    let (lights, light) = light_behind_a();
    let t = test_frame(presence_geometry(), AovSchema::default(), |f| f.lights(lights));

    assert_eq!(
        presence_shadows_query_bundle_handler(
            &mut worker(),
            &t.frame,
            vec![shadow_ray(TOWARD_A, 19.0, light, 0)]
        ),
        Err(DispatchError::MissingSideData(0))
    );
}
