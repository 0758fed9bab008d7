//! AOV and light-path-expression accounting hooks.
//!
//! The handlers decide *when* a contribution is accounted; what the channels mean is up to
//! the [`AovAccumulator`] implementation.

use crate::handles::OcclSideList;
use crate::helpers::{ColorType, PixelCoord};
use crate::scene::LightId;
use parking_lot::Mutex;
use std::fmt::Debug;

const UNOCCLUDED_PREFIX_FLAG: u32 = 1 << 0;

/// Light-path-expression prefix a light AOV contribution is filed under.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum LpePrefix {
    #[default]
    None,
    Unoccluded,
}

impl LpePrefix {
    fn flag(self) -> u32 {
        match self {
            LpePrefix::None => 0,
            LpePrefix::Unoccluded => UNOCCLUDED_PREFIX_FLAG,
        }
    }
}

/// Which output channels are active for the frame.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct AovSchema {
    num_channels: usize,
    lpe_prefix_flags: u32,
}

impl AovSchema {
    pub fn new(num_channels: usize) -> Self {
        Self {
            num_channels,
            lpe_prefix_flags: 0,
        }
    }

    pub fn with_prefix(mut self, prefix: LpePrefix) -> Self {
        self.lpe_prefix_flags |= prefix.flag();
        self
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn is_empty(&self) -> bool {
        self.num_channels == 0
    }

    pub fn has_lpe_prefix_flags(&self, prefix: LpePrefix) -> bool {
        let flag = prefix.flag();
        flag != 0 && self.lpe_prefix_flags & flag == flag
    }
}

/// What an occlusion ray's AOV calls are keyed by.
#[derive(Debug, Clone, Copy)]
pub struct OcclAovContext<'a> {
    pub pixel: PixelCoord,
    pub light: LightId,
    pub side: &'a OcclSideList,
}

/// Sink for AOV/LPE accounting. Called concurrently from every worker.
pub trait AovAccumulator: Send + Sync + Debug {
    /// Light samples a primary ray would have taken had it hit something.
    fn accum_visibility_attempts(&self, pixel: PixelCoord, lpe_state_id: i32, attempts: u32);

    fn accum_light_aovs(
        &self,
        ctx: &OcclAovContext<'_>,
        value: ColorType,
        transmittance: Option<ColorType>,
        prefix: LpePrefix,
    );

    fn accum_visibility_aovs(&self, ctx: &OcclAovContext<'_>, visibility: f32);

    fn accum_visibility_aovs_occluded(&self, ctx: &OcclAovContext<'_>);

    fn accum_background(&self, pixel: PixelCoord, lpe_state_id: i32, radiance: ColorType);

    /// State AOVs of a primary ray that only ever saw a volume.
    fn accum_volume_state(&self, pixel: PixelCoord, surface_t: f32, transmittance: ColorType);

    /// LPE state after the path hits `light`; negative when no expression matches.
    fn light_event_transition(&self, lpe_state_id: i32, light: LightId) -> i32;

    fn accum_direct_light(&self, pixel: PixelCoord, lpe_state_id: i32, radiance: ColorType);
}

/// Accumulator for frames without AOVs.
#[derive(Debug, Copy, Clone, Default)]
pub struct NullAovs;

impl AovAccumulator for NullAovs {
    fn accum_visibility_attempts(&self, _: PixelCoord, _: i32, _: u32) {}

    fn accum_light_aovs(&self, _: &OcclAovContext<'_>, _: ColorType, _: Option<ColorType>, _: LpePrefix) {}

    fn accum_visibility_aovs(&self, _: &OcclAovContext<'_>, _: f32) {}

    fn accum_visibility_aovs_occluded(&self, _: &OcclAovContext<'_>) {}

    fn accum_background(&self, _: PixelCoord, _: i32, _: ColorType) {}

    fn accum_volume_state(&self, _: PixelCoord, _: f32, _: ColorType) {}

    fn light_event_transition(&self, _: i32, _: LightId) -> i32 {
        -1
    }

    fn accum_direct_light(&self, _: PixelCoord, _: i32, _: ColorType) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum AovEvent {
    VisibilityAttempts {
        pixel: PixelCoord,
        lpe_state_id: i32,
        attempts: u32,
    },
    Light {
        pixel: PixelCoord,
        light: LightId,
        value: ColorType,
        transmittance: Option<ColorType>,
        prefix: LpePrefix,
        items: usize,
    },
    Visibility {
        pixel: PixelCoord,
        light: LightId,
        visibility: f32,
    },
    VisibilityOccluded {
        pixel: PixelCoord,
        light: LightId,
    },
    Background {
        pixel: PixelCoord,
        lpe_state_id: i32,
        radiance: ColorType,
    },
    VolumeState {
        pixel: PixelCoord,
        surface_t: f32,
        transmittance: ColorType,
    },
    DirectLight {
        pixel: PixelCoord,
        lpe_state_id: i32,
        radiance: ColorType,
    },
}

/// Keeps every call in order of arrival. Light transitions advance the state id by one.
#[derive(Debug, Default)]
pub struct RecordingAovs {
    events: Mutex<Vec<AovEvent>>,
}

impl RecordingAovs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AovEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    fn push(&self, event: AovEvent) {
        self.events.lock().push(event);
    }
}

impl AovAccumulator for RecordingAovs {
    fn accum_visibility_attempts(&self, pixel: PixelCoord, lpe_state_id: i32, attempts: u32) {
        self.push(AovEvent::VisibilityAttempts {
            pixel,
            lpe_state_id,
            attempts,
        });
    }

    fn accum_light_aovs(
        &self,
        ctx: &OcclAovContext<'_>,
        value: ColorType,
        transmittance: Option<ColorType>,
        prefix: LpePrefix,
    ) {
        self.push(AovEvent::Light {
            pixel: ctx.pixel,
            light: ctx.light,
            value,
            transmittance,
            prefix,
            items: ctx.side.len(),
        });
    }

    fn accum_visibility_aovs(&self, ctx: &OcclAovContext<'_>, visibility: f32) {
        self.push(AovEvent::Visibility {
            pixel: ctx.pixel,
            light: ctx.light,
            visibility,
        });
    }

    fn accum_visibility_aovs_occluded(&self, ctx: &OcclAovContext<'_>) {
        self.push(AovEvent::VisibilityOccluded {
            pixel: ctx.pixel,
            light: ctx.light,
        });
    }

    fn accum_background(&self, pixel: PixelCoord, lpe_state_id: i32, radiance: ColorType) {
        self.push(AovEvent::Background {
            pixel,
            lpe_state_id,
            radiance,
        });
    }

    fn accum_volume_state(&self, pixel: PixelCoord, surface_t: f32, transmittance: ColorType) {
        self.push(AovEvent::VolumeState {
            pixel,
            surface_t,
            transmittance,
        });
    }

    fn light_event_transition(&self, lpe_state_id: i32, _light: LightId) -> i32 {
        lpe_state_id + 1
    }

    fn accum_direct_light(&self, pixel: PixelCoord, lpe_state_id: i32, radiance: ColorType) {
        self.push(AovEvent::DirectLight {
            pixel,
            lpe_state_id,
            radiance,
        });
    }
}
