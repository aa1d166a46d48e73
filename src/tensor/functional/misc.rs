use ndarray::Axis;

use crate::tensor::numeric::*;
use crate::tensor::Matrix;

/// Row-wise softmax. Each output depends on the whole row, so this is not elementwise.
pub fn softmax<T: Numeric>(x: &Matrix<T>) -> Matrix<T> {
    let mut out = x.clone();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.fold(T::neg_infinity(), |acc, &v| acc.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let total = row.sum();
        row.mapv_inplace(|v| v / total);
    }
    out
}

/// Derivative of `Σ f(a)` with respect to `a` by central differences.
///
/// Only meaningful for elementwise `f`: every coordinate is shifted at once.
pub fn sum_grad_finite_difference<T, F>(f: F, acts: &Matrix<T>) -> Matrix<T>
where
    T: Numeric,
    F: Fn(&Matrix<T>) -> Matrix<T>,
{
    let step = T::epsilon().cbrt();
    let ahead = f(&acts.mapv(|a| a + step));
    let behind = f(&acts.mapv(|a| a - step));
    (ahead - behind).mapv(|d| d / (step + step))
}

#[test]
fn test_softmax_rows_sum_to_one() {
    let x = Matrix::from_shape_vec((2, 3), vec![1.0f64, 2.0, 3.0, -1.0, 0.0, 1000.0]).unwrap();
    let y = softmax(&x);
    for row in y.axis_iter(Axis(0)) {
        assert!((row.sum() - 1.0).abs() < 1e-12);
    }
    assert!(y[[0, 2]] > y[[0, 1]]);
    assert!((y[[1, 2]] - 1.0).abs() < 1e-12);
}

#[test]
fn test_sum_grad_finite_difference_of_square() {
    let acts = Matrix::from_shape_vec((1, 3), vec![-1.0f64, 0.5, 2.0]).unwrap();
    let grad = sum_grad_finite_difference(|a: &Matrix<f64>| a.mapv(|v| v * v), &acts);
    for (g, a) in grad.iter().zip(acts.iter()) {
        assert!((g - 2.0 * a).abs() < 1e-6);
    }
}
