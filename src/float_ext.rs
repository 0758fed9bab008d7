use num_traits::Float;

/// Tolerance comparisons forwarded to `approx`.
pub trait AbsDiffEq: Float {
    fn default_epsilon() -> Self;

    fn abs_diff_eq(&self, other: &Self, epsilon: Self) -> bool;

    #[inline(always)]
    fn abs_diff_eq_default(&self, other: &Self) -> bool {
        self.abs_diff_eq(other, Self::default_epsilon())
    }

    #[inline(always)]
    fn is_nearly_zero(&self) -> bool {
        self.abs_diff_eq_default(&Self::zero())
    }
}

macro_rules! impl_abs_diff_eq_approx_forward {
    ($($t:ty),*) => {
        $(
            impl AbsDiffEq for $t {
                #[inline(always)]
                fn default_epsilon() -> Self {
                    <$t as approx::AbsDiffEq>::default_epsilon()
                }

                #[inline(always)]
                fn abs_diff_eq(&self, other: &Self, epsilon: Self) -> bool {
                    <$t as approx::AbsDiffEq>::abs_diff_eq(self, other, epsilon)
                }
            }
        )*
    };
}

impl_abs_diff_eq_approx_forward!(f32, f64);

#[cfg(test)]
mod test_abs_diff_eq {
    use super::*;

    #[test]
    fn test_nearly_zero() {
        assert!(0.0f32.is_nearly_zero());
        assert!((f32::EPSILON * 0.5).is_nearly_zero());
        assert!(!0.4f32.is_nearly_zero());
        assert!(1.0f64.abs_diff_eq(&1.05, 0.1));
    }
}
