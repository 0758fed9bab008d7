use crate::color::ColorTransmittanceExt;
use crate::handles::SideDataStore;
use crate::helpers::{ColorType, PixelCoord, RenderColor};
use crate::raytracing::{BundledRadiance, RadianceQueue};
use crate::{DispatchError, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Per-pixel additive accumulation of retired radiance.
///
/// Accepting an entry takes over its deep and cryptomatte references; the film keeps only
/// color and alpha, so it releases them immediately.
#[derive(Debug)]
pub struct Film {
    width: u32,
    height: u32,
    pixels: Mutex<Vec<RenderColor>>,
    side_data: Arc<SideDataStore>,
}

impl Film {
    pub fn new(width: u32, height: u32, side_data: Arc<SideDataStore>) -> Self {
        Self {
            width,
            height,
            pixels: Mutex::new(vec![ColorType::black().with_alpha(0.0); width as usize * height as usize]),
            side_data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, pixel: PixelCoord) -> Option<RenderColor> {
        self.contains(pixel)
            .then(|| self.pixels.lock()[pixel.linear_index(self.width)])
    }

    /// Accumulated values divided by the sample count, row by row.
    pub fn resolve(&self, samples_per_pixel: u32) -> Vec<RenderColor> {
        let scale = 1.0 / samples_per_pixel.max(1) as f32;
        self.pixels
            .lock()
            .iter()
            .map(|p| RenderColor::new(p.red * scale, p.green * scale, p.blue * scale, p.alpha * scale))
            .collect()
    }

    fn contains(&self, pixel: PixelCoord) -> bool {
        pixel.x < self.width && pixel.y < self.height
    }
}

impl RadianceQueue for Film {
    fn add_radiance_entries(&self, entries: &[BundledRadiance]) -> Result<()> {
        if let Some(outside) = entries.iter().find(|entry| !self.contains(entry.pixel)) {
            return Err(DispatchError::PixelOutOfBounds {
                x: outside.pixel.x,
                y: outside.pixel.y,
            });
        }

        {
            let mut pixels = self.pixels.lock();
            for entry in entries {
                let p = &mut pixels[entry.pixel.linear_index(self.width)];
                p.red += entry.radiance.red;
                p.green += entry.radiance.green;
                p.blue += entry.radiance.blue;
                p.alpha += entry.radiance.alpha;
            }
        }

        for entry in entries {
            self.side_data.release_deep(entry.deep_data)?;
            self.side_data.release_cryptomatte(entry.crypto_data)?;
        }
        Ok(())
    }
}
