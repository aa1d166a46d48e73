//! Scalar nonlinearities and their derivatives, applied elementwise with `mapv`.
use crate::tensor::numeric::*;

pub fn sigmoid<T: Numeric>(x: T) -> T {
    T::one() / (T::one() + (-x).exp())
}

pub fn sigmoid_grad<T: Numeric>(x: T) -> T {
    let s = sigmoid(x);
    s * (T::one() - s)
}

pub fn tanh<T: Numeric>(x: T) -> T {
    x.tanh()
}

pub fn tanh_grad<T: Numeric>(x: T) -> T {
    T::one() - x.tanh().powi(2)
}

pub fn rectifier<T: Numeric>(x: T) -> T {
    x.max(T::zero())
}

// Subgradient 0 at the kink.
pub fn rectifier_grad<T: Numeric>(x: T) -> T {
    if x > T::zero() {
        T::one()
    } else {
        T::zero()
    }
}

pub fn softplus<T: Numeric>(x: T) -> T {
    // log(1 + e^x) overflows for large x, where it is x to working precision
    if x > T::lit(30.0) {
        x
    } else {
        x.exp().ln_1p()
    }
}

pub fn softplus_grad<T: Numeric>(x: T) -> T {
    sigmoid(x)
}

pub fn softsign<T: Numeric>(x: T) -> T {
    x / (T::one() + x.abs())
}

pub fn softsign_grad<T: Numeric>(x: T) -> T {
    let denom = T::one() + x.abs();
    T::one() / (denom * denom)
}

pub fn hard_sigmoid<T: Numeric>(x: T) -> T {
    (T::lit(0.2) * x + T::lit(0.5)).max(T::zero()).min(T::one())
}

pub fn hard_sigmoid_grad<T: Numeric>(x: T) -> T {
    if x > T::lit(-2.5) && x < T::lit(2.5) {
        T::lit(0.2)
    } else {
        T::zero()
    }
}

pub fn exp<T: Numeric>(x: T) -> T {
    x.exp()
}

pub fn exp_grad<T: Numeric>(x: T) -> T {
    x.exp()
}

#[cfg(test)]
fn check_grad(f: fn(f64) -> f64, grad: fn(f64) -> f64) {
    let epsilon = 1e-6;
    for &x in [-3.1, -0.7, 0.3, 1.9, 4.2].iter() {
        let numerical = (f(x + epsilon) - f(x - epsilon)) / (2.0 * epsilon);
        let analytic = grad(x);
        assert!(
            (numerical - analytic).abs() < 1e-6,
            "x={x}, numerical={numerical}, analytic={analytic}"
        );
    }
}

#[test]
fn test_derivatives_match_finite_differences() {
    check_grad(sigmoid, sigmoid_grad);
    check_grad(tanh, tanh_grad);
    check_grad(rectifier, rectifier_grad);
    check_grad(softplus, softplus_grad);
    check_grad(softsign, softsign_grad);
    check_grad(hard_sigmoid, hard_sigmoid_grad);
    check_grad(exp, exp_grad);
}

#[test]
fn test_values() {
    assert_eq!(sigmoid(0.0f64), 0.5);
    assert_eq!(rectifier(-2.0f64), 0.0);
    assert_eq!(rectifier(2.0f32), 2.0);
    assert_eq!(hard_sigmoid(10.0f64), 1.0);
    assert_eq!(softplus(100.0f64), 100.0);
    assert!((softplus(0.0f64) - 2f64.ln()).abs() < 1e-12);
}
