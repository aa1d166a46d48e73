use ndarray::{ArrayView2, ArrayViewD, ArrayViewMutD, Ix1, Ix2};
use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::tensor::{Matrix, Numeric, Vector};

/// Read-only handle on one learnable tensor.
#[derive(Debug)]
pub struct Param<'a, T> {
    pub name: &'static str,
    pub value: ArrayViewD<'a, T>,
}

/// Mutable handle on one learnable tensor, for an external optimizer.
#[derive(Debug)]
pub struct ParamMut<'a, T> {
    pub name: &'static str,
    pub value: ArrayViewMutD<'a, T>,
}

/// How the decoder gets its weights.
#[derive(Debug, Clone, PartialEq)]
pub enum DecoderWeights<T: Numeric> {
    /// The transpose of the encoder weights; never stored or learned separately.
    Tied,
    /// An independent `nhid × nvis` matrix.
    Untied(Matrix<T>),
}

/// Fully allocated parameters of one autoencoder layer.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoencoderParams<T: Numeric> {
    /// `nvis × nhid`
    pub(crate) weights: Matrix<T>,
    pub(crate) hidbias: Vector<T>,
    pub(crate) visbias: Vector<T>,
    pub(crate) decoder: DecoderWeights<T>,
}

/// Whether `irange` can parameterize the initial weight distribution:
/// finite, non-negative, and small enough that sampling can't overflow.
pub(crate) fn valid_irange<T: Numeric>(irange: T) -> bool {
    irange >= T::zero() && (irange / (T::one() - T::epsilon())).is_finite()
}

/// Uniform in `[-irange/2, irange/2]`. `irange` must pass [`valid_irange`].
pub(crate) fn uniform_matrix<T: Numeric, R: Rng + ?Sized>(
    shape: (usize, usize),
    irange: T,
    rng: &mut R,
) -> Matrix<T> {
    let half = irange / T::lit(2.0);
    let dist = Uniform::new_inclusive(-half, half);
    Matrix::from_shape_simple_fn(shape, || dist.sample(&mut *rng))
}

impl<T: Numeric> AutoencoderParams<T> {
    pub(crate) fn allocate<R: Rng + ?Sized>(
        nvis: usize,
        hidbias: Vector<T>,
        tied_weights: bool,
        irange: T,
        rng: &mut R,
    ) -> Self {
        let nhid = hidbias.len();
        let weights = uniform_matrix((nvis, nhid), irange, rng);
        let decoder = if tied_weights {
            DecoderWeights::Tied
        } else {
            DecoderWeights::Untied(uniform_matrix((nhid, nvis), irange, rng))
        };
        AutoencoderParams {
            weights,
            hidbias,
            visbias: Vector::zeros(nvis),
            decoder,
        }
    }

    pub fn nvis(&self) -> usize {
        self.weights.nrows()
    }

    pub fn nhid(&self) -> usize {
        self.weights.ncols()
    }

    pub fn weights(&self) -> &Matrix<T> {
        &self.weights
    }

    pub fn hidbias(&self) -> &Vector<T> {
        &self.hidbias
    }

    pub fn visbias(&self) -> &Vector<T> {
        &self.visbias
    }

    pub fn is_tied(&self) -> bool {
        matches!(self.decoder, DecoderWeights::Tied)
    }

    /// `nhid × nvis`; a transposed view of the encoder weights when tied.
    pub fn decoder_weights(&self) -> ArrayView2<'_, T> {
        match &self.decoder {
            DecoderWeights::Tied => self.weights.t(),
            DecoderWeights::Untied(w_prime) => w_prime.view(),
        }
    }

    pub fn params(&self) -> Vec<Param<'_, T>> {
        let mut params = vec![
            Param {
                name: "vb",
                value: self.visbias.view().into_dyn(),
            },
            Param {
                name: "hb",
                value: self.hidbias.view().into_dyn(),
            },
            Param {
                name: "W",
                value: self.weights.view().into_dyn(),
            },
        ];
        if let DecoderWeights::Untied(w_prime) = &self.decoder {
            params.push(Param {
                name: "Wprime",
                value: w_prime.view().into_dyn(),
            });
        }
        params
    }

    pub fn params_mut(&mut self) -> Vec<ParamMut<'_, T>> {
        let AutoencoderParams {
            weights,
            hidbias,
            visbias,
            decoder,
        } = self;
        let mut params = vec![
            ParamMut {
                name: "vb",
                value: visbias.view_mut().into_dyn(),
            },
            ParamMut {
                name: "hb",
                value: hidbias.view_mut().into_dyn(),
            },
            ParamMut {
                name: "W",
                value: weights.view_mut().into_dyn(),
            },
        ];
        if let DecoderWeights::Untied(w_prime) = decoder {
            params.push(ParamMut {
                name: "Wprime",
                value: w_prime.view_mut().into_dyn(),
            });
        }
        params
    }
}

impl<'a, T> Param<'a, T> {
    pub fn as_vector(&self) -> Option<ndarray::ArrayView1<'_, T>> {
        self.value.view().into_dimensionality::<Ix1>().ok()
    }

    pub fn as_matrix(&self) -> Option<ArrayView2<'_, T>> {
        self.value.view().into_dimensionality::<Ix2>().ok()
    }
}

#[test]
fn test_uniform_matrix_bounds() {
    use rand::SeedableRng;
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let w = uniform_matrix((20, 30), 0.2f64, &mut rng);
    assert_eq!(w.dim(), (20, 30));
    assert!(w.iter().all(|&v| (-0.1..=0.1).contains(&v)));
    assert!(w.iter().any(|&v| v < 0.0) && w.iter().any(|&v| v > 0.0));
    let mean = w.sum() / 600.0;
    assert!(mean.abs() < 0.01, "mean={mean}");
}

#[test]
fn test_valid_irange() {
    assert!(valid_irange(0.0f64));
    assert!(valid_irange(1e300f64));
    assert!(!valid_irange(-1e-3f64));
    assert!(!valid_irange(f64::NAN));
    assert!(!valid_irange(f64::INFINITY));
    assert!(!valid_irange(f64::MAX));
    assert!(!valid_irange(f32::MAX));
}

#[test]
fn test_tied_params_are_deduplicated() {
    use rand::SeedableRng;
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let tied = AutoencoderParams::allocate(5, Vector::<f64>::zeros(3), true, 1e-3, &mut rng);
    let names: Vec<_> = tied.params().iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["vb", "hb", "W"]);
    assert_eq!(tied.decoder_weights(), tied.weights().t());

    let untied = AutoencoderParams::allocate(5, Vector::<f64>::zeros(3), false, 1e-3, &mut rng);
    let names: Vec<_> = untied.params().iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["vb", "hb", "W", "Wprime"]);
    assert_eq!(untied.decoder_weights().dim(), (3, 5));
    assert_eq!(untied.params()[2].as_matrix().unwrap().dim(), (5, 3));
    assert_eq!(untied.params()[0].as_vector().unwrap().len(), 5);
}
