use crate::helpers::{ColorType, RenderColor};

/// Channel helpers for radiance and transmittance colors.
pub trait ColorTransmittanceExt: Sized {
    fn black() -> Self;

    fn white() -> Self;

    fn splat(value: f32) -> Self;

    /// Collapses an RGB transmittance to the scalar used for alpha and visibility.
    fn reduce_transparency(&self) -> f32;

    fn is_black(&self) -> bool;

    fn map_channels(&self, f: impl Fn(f32) -> f32) -> Self;

    fn with_alpha(&self, alpha: f32) -> RenderColor;
}

impl ColorTransmittanceExt for ColorType {
    #[inline(always)]
    fn black() -> Self {
        ColorType::new(0.0, 0.0, 0.0)
    }

    #[inline(always)]
    fn white() -> Self {
        ColorType::new(1.0, 1.0, 1.0)
    }

    #[inline(always)]
    fn splat(value: f32) -> Self {
        ColorType::new(value, value, value)
    }

    #[inline(always)]
    fn reduce_transparency(&self) -> f32 {
        (self.red + self.green + self.blue) * (1.0 / 3.0)
    }

    #[inline(always)]
    fn is_black(&self) -> bool {
        self.red == 0.0 && self.green == 0.0 && self.blue == 0.0
    }

    #[inline(always)]
    fn map_channels(&self, f: impl Fn(f32) -> f32) -> Self {
        ColorType::new(f(self.red), f(self.green), f(self.blue))
    }

    #[inline(always)]
    fn with_alpha(&self, alpha: f32) -> RenderColor {
        RenderColor::new(self.red, self.green, self.blue, alpha)
    }
}
