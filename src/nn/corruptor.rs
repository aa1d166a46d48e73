use rand::rngs::StdRng;
use rand_distr::{Bernoulli, Distribution, Normal};

use crate::error::{AutoencoderError, Result};
use crate::tensor::{Matrix, Numeric};

/// Stochastic perturbation of an input batch, used by denoising layers.
///
/// The layer owns the random stream and passes it in, so a seeded layer
/// corrupts reproducibly.
pub trait Corruptor<T: Numeric> {
    fn corrupt(&self, inputs: &Matrix<T>, rng: &mut StdRng) -> Matrix<T>;
}

impl<T, F> Corruptor<T> for F
where
    T: Numeric,
    F: Fn(&Matrix<T>, &mut StdRng) -> Matrix<T>,
{
    fn corrupt(&self, inputs: &Matrix<T>, rng: &mut StdRng) -> Matrix<T> {
        self(inputs, rng)
    }
}

/// Zeroes each entry independently with probability `corruption_level`.
#[derive(Debug, Clone)]
pub struct BinomialCorruptor {
    corruption_level: f64,
    keep: Bernoulli,
}

impl BinomialCorruptor {
    pub fn new(corruption_level: f64) -> Result<Self> {
        let keep = Bernoulli::new(1.0 - corruption_level).map_err(|_| {
            AutoencoderError::InvalidCorruption(format!(
                "corruption_level must be in [0, 1], got {corruption_level}"
            ))
        })?;
        Ok(BinomialCorruptor {
            corruption_level,
            keep,
        })
    }

    pub fn corruption_level(&self) -> f64 {
        self.corruption_level
    }
}

impl<T: Numeric> Corruptor<T> for BinomialCorruptor {
    fn corrupt(&self, inputs: &Matrix<T>, rng: &mut StdRng) -> Matrix<T> {
        inputs.mapv(|x| if self.keep.sample(&mut *rng) { x } else { T::zero() })
    }
}

/// Adds independent `Normal(0, stdev)` noise to every entry.
#[derive(Debug, Clone)]
pub struct GaussianCorruptor {
    stdev: f64,
    noise: Normal<f64>,
}

impl GaussianCorruptor {
    pub fn new(stdev: f64) -> Result<Self> {
        if !(stdev >= 0.0 && stdev.is_finite()) {
            return Err(AutoencoderError::InvalidCorruption(format!(
                "stdev must be finite and non-negative, got {stdev}"
            )));
        }
        let noise = Normal::new(0.0, stdev)
            .map_err(|e| AutoencoderError::InvalidCorruption(e.to_string()))?;
        Ok(GaussianCorruptor { stdev, noise })
    }

    pub fn stdev(&self) -> f64 {
        self.stdev
    }
}

impl<T: Numeric> Corruptor<T> for GaussianCorruptor {
    fn corrupt(&self, inputs: &Matrix<T>, rng: &mut StdRng) -> Matrix<T> {
        inputs.mapv(|x| x + T::lit(self.noise.sample(&mut *rng)))
    }
}

#[test]
fn test_binomial_masks_roughly_the_requested_fraction() {
    use rand::SeedableRng;
    let mut rng = StdRng::seed_from_u64(0);
    let corruptor = BinomialCorruptor::new(0.25).unwrap();
    let x = Matrix::from_elem((50, 40), 1.0f64);
    let y = corruptor.corrupt(&x, &mut rng);
    let zeroed = y.iter().filter(|&&v| v == 0.0).count() as f64 / 2000.0;
    assert!((zeroed - 0.25).abs() < 0.05, "zeroed={zeroed}");
    assert!(y.iter().all(|&v| v == 0.0 || v == 1.0));
}

#[test]
fn test_gaussian_noise_is_centered() {
    use rand::SeedableRng;
    let mut rng = StdRng::seed_from_u64(0);
    let corruptor = GaussianCorruptor::new(0.5).unwrap();
    let x = Matrix::from_elem((100, 50), 2.0f32);
    let y = corruptor.corrupt(&x, &mut rng);
    let mean = y.sum() / 5000.0;
    assert!((mean - 2.0).abs() < 0.05, "mean={mean}");
    assert!(y.iter().any(|&v| v != 2.0));
}

#[test]
fn test_invalid_settings() {
    assert!(BinomialCorruptor::new(1.5).is_err());
    assert!(BinomialCorruptor::new(-0.1).is_err());
    assert!(GaussianCorruptor::new(-1.0).is_err());
    assert!(GaussianCorruptor::new(f64::NAN).is_err());
    assert_eq!(BinomialCorruptor::new(0.0).unwrap().corruption_level(), 0.0);
}

#[test]
fn test_closures_are_corruptors() {
    use rand::{Rng, SeedableRng};
    let flip = |x: &Matrix<f64>, rng: &mut StdRng| {
        let sign = if rng.gen::<bool>() { 1.0 } else { -1.0 };
        x.mapv(|v| v * sign)
    };
    let mut rng = StdRng::seed_from_u64(1);
    let y = flip.corrupt(&Matrix::from_elem((1, 2), 3.0), &mut rng);
    assert_eq!(y[[0, 0]].abs(), 3.0);
}
