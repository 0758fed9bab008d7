use palette::{LinSrgb, LinSrgba};
use std::time::{Duration, Instant};

/// Linear RGB used for radiance, throughput and transmittance.
pub type ColorType = LinSrgb<f32>;

/// Linear RGB plus alpha, as retired into the radiance queue.
pub type RenderColor = LinSrgba<f32>;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Default)]
pub struct PixelCoord {
    pub x: u32,
    pub y: u32,
}

impl PixelCoord {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    #[inline(always)]
    pub fn linear_index(&self, width: u32) -> usize {
        self.y as usize * width as usize + self.x as usize
    }
}

impl From<(u32, u32)> for PixelCoord {
    fn from((x, y): (u32, u32)) -> Self {
        Self { x, y }
    }
}

/// Wall-clock stage timer, one lap per `next` call.
#[derive(Debug, Clone)]
pub struct RenderTiming {
    start: Instant,
    laps: Vec<Duration>,
}

impl Default for RenderTiming {
    fn default() -> Self {
        Self {
            start: Instant::now(),
            laps: Vec::new(),
        }
    }
}

impl RenderTiming {
    pub fn next(&mut self) -> Duration {
        let now = Instant::now();
        let lap = now - self.start;
        self.laps.push(lap);
        self.start = now;
        lap
    }

    pub fn total(&self) -> Duration {
        self.laps.iter().sum()
    }

    pub fn laps(&self) -> &[Duration] {
        &self.laps
    }
}

#[cfg(test)]
mod test_pixel_coord {
    use super::*;

    #[test]
    fn test_linear_index() {
        let p = PixelCoord::from((3, 2));
        assert_eq!(p.linear_index(10), 23);
        assert_eq!(PixelCoord::new(0, 0).linear_index(10), 0);
    }
}
