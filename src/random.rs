use crate::helpers::PixelCoord;
use rand::prelude::SmallRng;
use rand::{Rng, SeedableRng};

/// Deterministic generator for one subpixel sample sequence.
///
/// The same pixel, subpixel and frame seed always produce the same stream, so
/// stochastic choices made by the handlers are repeatable across runs and back ends.
#[inline]
pub fn sequence_rng(pixel: PixelCoord, subpixel_index: u32, seed: u32) -> SmallRng {
    let mut h = (pixel.x as u64) | ((pixel.y as u64) << 32);
    h ^= (subpixel_index as u64).rotate_left(17) ^ (seed as u64).rotate_left(41);
    // splitmix64 finalizer
    h = (h ^ (h >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    h ^= h >> 31;
    SmallRng::seed_from_u64(h)
}

/// One light-choice sample in `[0, 1)` for a subpixel.
#[inline]
pub fn light_choice_sample(pixel: PixelCoord, subpixel_index: u32, seed: u32) -> f32 {
    sequence_rng(pixel, subpixel_index, seed).r#gen::<f32>()
}
