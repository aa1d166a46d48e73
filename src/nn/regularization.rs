use std::fmt;

use crate::error::{AutoencoderError, Result};
use crate::tensor::{Matrix, Numeric};

/// Sparsity penalty on the hidden activations.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Regularization<T: Numeric> {
    #[default]
    None,
    /// `sparse_penalty * Σ h`
    L1 { sparse_penalty: T },
    /// `sparsity_target_penalty * Σ (h - sparsity_target)²`
    Quadratic {
        sparsity_target: T,
        sparsity_target_penalty: T,
    },
}

impl<T: Numeric> Regularization<T> {
    /// Build from the classic `solution` string plus coefficients.
    ///
    /// Only the coefficients the chosen kind uses are kept. Unknown kinds are
    /// an error rather than a silent zero penalty.
    pub fn from_solution(
        solution: &str,
        sparse_penalty: T,
        sparsity_target: T,
        sparsity_target_penalty: T,
    ) -> Result<Self> {
        match solution {
            "" | "none" => Ok(Regularization::None),
            "l1_penalty" => Ok(Regularization::L1 { sparse_penalty }),
            "sqr_penalty" => Ok(Regularization::Quadratic {
                sparsity_target,
                sparsity_target_penalty,
            }),
            other => Err(AutoencoderError::UnknownRegularization(other.to_string())),
        }
    }

    pub fn l1(sparse_penalty: T) -> Self {
        Regularization::L1 { sparse_penalty }
    }

    pub fn quadratic(sparsity_target: T, sparsity_target_penalty: T) -> Self {
        Regularization::Quadratic {
            sparsity_target,
            sparsity_target_penalty,
        }
    }

    pub fn solution(&self) -> &'static str {
        match self {
            Regularization::None => "",
            Regularization::L1 { .. } => "l1_penalty",
            Regularization::Quadratic { .. } => "sqr_penalty",
        }
    }

    pub fn compute(&self, hiddens: &Matrix<T>) -> T {
        match *self {
            Regularization::None => T::zero(),
            Regularization::L1 { sparse_penalty } => sparse_penalty * hiddens.sum(),
            Regularization::Quadratic {
                sparsity_target,
                sparsity_target_penalty,
            } => {
                let squared = hiddens.fold(T::zero(), |acc, &h| {
                    let d = h - sparsity_target;
                    acc + d * d
                });
                sparsity_target_penalty * squared
            }
        }
    }
}

impl<T: Numeric> fmt::Display for Regularization<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regularization::None => f.write_str("none"),
            Regularization::L1 { sparse_penalty } => write!(f, "l1_penalty({sparse_penalty})"),
            Regularization::Quadratic {
                sparsity_target,
                sparsity_target_penalty,
            } => write!(
                f,
                "sqr_penalty(target={sparsity_target}, weight={sparsity_target_penalty})"
            ),
        }
    }
}

#[test]
fn test_l1_is_scaled_sum() {
    let h = Matrix::from_shape_vec((2, 3), vec![0.1f64, 0.2, 0.3, 0.4, 0.5, 0.6]).unwrap();
    let reg = Regularization::from_solution("l1_penalty", 0.5, 0.0, 0.0).unwrap();
    assert!((reg.compute(&h) - 0.5 * 2.1).abs() < 1e-12);
}

#[test]
fn test_quadratic_target() {
    let h = Matrix::from_shape_vec((1, 3), vec![0.0f64, 0.5, 1.0]).unwrap();
    let reg = Regularization::quadratic(0.5, 2.0);
    // (0.25 + 0 + 0.25) * 2
    assert!((reg.compute(&h) - 1.0).abs() < 1e-12);
    assert_eq!(reg.solution(), "sqr_penalty");
}

#[test]
fn test_none_and_unknown() {
    let h = Matrix::from_elem((4, 4), 3.0f64);
    assert_eq!(Regularization::None.compute(&h), 0.0);
    assert_eq!(
        Regularization::<f64>::from_solution("", 1.0, 1.0, 1.0).unwrap(),
        Regularization::None
    );
    assert_eq!(
        Regularization::<f64>::from_solution("l2_penalty", 1.0, 1.0, 1.0),
        Err(AutoencoderError::UnknownRegularization("l2_penalty".into()))
    );
}
