use ndarray::{LinalgScalar, ScalarOperand};
use rand::distributions::uniform::SampleUniform;

pub use num::{Float, FromPrimitive, One, Zero};

/// Element type of every matrix in this crate.
pub trait Numeric:
    Float
    + FromPrimitive
    + LinalgScalar
    + ScalarOperand
    + SampleUniform
    + Default
    + std::fmt::Debug
    + std::fmt::Display
{
    /// Convert an `f64` literal, e.g. a hyperparameter default.
    #[inline]
    fn lit(value: f64) -> Self {
        <Self as FromPrimitive>::from_f64(value).unwrap_or_else(Self::nan)
    }
}

// https://stackoverflow.com/questions/42381185/specifying-generic-parameter-to-belong-to-a-small-set-of-types
macro_rules! numeric_impl {
    ($($t: ty),+) => {
        $(
            impl Numeric for $t {}
        )+
    }
}

numeric_impl!(f32, f64);

#[test]
fn test_lit() {
    assert_eq!(f32::lit(0.5), 0.5f32);
    assert_eq!(f64::lit(-1e-3), -1e-3);
}
