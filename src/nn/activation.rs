//! Activation functions: the registry of built-ins and resolution of
//! user-facing specs into something a layer can apply.
use std::fmt;
use std::rc::Rc;

use crate::error::{AutoencoderError, Result};
use crate::tensor::functional;
use crate::tensor::{Matrix, Numeric};

pub type MatrixFn<T> = Rc<dyn Fn(&Matrix<T>) -> Matrix<T>>;

/// Every name [`lookup`] understands.
pub const BUILTIN_ACTIVATIONS: &[&str] = &[
    "linear",
    "sigmoid",
    "tanh",
    "rectifier",
    "relu",
    "softplus",
    "softsign",
    "hard_sigmoid",
    "exp",
    "softmax",
];

/// A resolved activation. Immutable once a layer holds it.
#[derive(Clone)]
pub enum Activation<T: Numeric> {
    Linear,
    /// Scalar function applied to each coordinate, with its derivative.
    Elementwise {
        name: &'static str,
        f: fn(T) -> T,
        grad: fn(T) -> T,
    },
    /// Arbitrary matrix-to-matrix function. May or may not be elementwise.
    Matrix { name: String, f: MatrixFn<T> },
}

impl<T: Numeric> fmt::Debug for Activation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Activation::Linear => f.write_str("Linear"),
            Activation::Elementwise { name, .. } => write!(f, "Elementwise({name})"),
            Activation::Matrix { name, .. } => write!(f, "Matrix({name})"),
        }
    }
}

impl<T: Numeric> Activation<T> {
    /// Wrap a user callable.
    pub fn custom<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Matrix<T>) -> Matrix<T> + 'static,
    {
        Activation::Matrix {
            name: name.into(),
            f: Rc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Activation::Linear => "linear",
            Activation::Elementwise { name, .. } => name,
            Activation::Matrix { name, .. } => name,
        }
    }

    pub fn apply(&self, x: Matrix<T>) -> Matrix<T> {
        match self {
            Activation::Linear => x,
            Activation::Elementwise { f, .. } => x.mapv_into(*f),
            Activation::Matrix { f, .. } => f(&x),
        }
    }

    /// `d Σ f(a) / d a`, i.e. `f'(a)` coordinate by coordinate for elementwise `f`.
    pub fn sum_grad(&self, acts: &Matrix<T>) -> Matrix<T> {
        match self {
            Activation::Linear => Matrix::ones(acts.raw_dim()),
            Activation::Elementwise { grad, .. } => acts.mapv(*grad),
            Activation::Matrix { f, .. } => {
                functional::sum_grad_finite_difference(|a: &Matrix<T>| f(a), acts)
            }
        }
    }

    pub fn is_elementwise(&self) -> bool {
        match self {
            Activation::Linear | Activation::Elementwise { .. } => true,
            Activation::Matrix { f, .. } => probe_elementwise(f.as_ref()),
        }
    }
}

/// Run `f` on a placeholder and nudge one coordinate at a time: an
/// elementwise function keeps its output shape and never lets a nudge leak
/// into another coordinate.
fn probe_elementwise<T: Numeric>(f: &dyn Fn(&Matrix<T>) -> Matrix<T>) -> bool {
    let placeholder =
        Matrix::from_shape_fn((3, 4), |(i, j)| T::lit(-1.5 + 0.3 * (4 * i + j) as f64));
    let base = f(&placeholder);
    if base.dim() != placeholder.dim() {
        return false;
    }
    let unchanged = |a: T, b: T| a == b || (a.is_nan() && b.is_nan());
    for (i, j) in placeholder.indexed_iter().map(|(idx, _)| idx) {
        let mut nudged = placeholder.clone();
        nudged[[i, j]] = nudged[[i, j]] + T::lit(0.5);
        let out = f(&nudged);
        if out.dim() != base.dim() {
            return false;
        }
        let leaked = out
            .indexed_iter()
            .any(|(idx, &v)| idx != (i, j) && !unchanged(v, base[idx]));
        if leaked {
            return false;
        }
    }
    true
}

fn elementwise<T: Numeric>(name: &'static str, f: fn(T) -> T, grad: fn(T) -> T) -> Activation<T> {
    Activation::Elementwise { name, f, grad }
}

/// Resolve a built-in activation by name.
pub fn lookup<T: Numeric>(name: &str) -> Option<Activation<T>> {
    let activation = match name {
        "linear" => Activation::Linear,
        "softmax" => Activation::Matrix {
            name: "softmax".to_string(),
            f: Rc::new(functional::softmax::<T>),
        },
        "sigmoid" => elementwise("sigmoid", functional::sigmoid, functional::sigmoid_grad),
        "tanh" => elementwise("tanh", functional::tanh, functional::tanh_grad),
        "rectifier" | "relu" => elementwise(
            "rectifier",
            functional::rectifier,
            functional::rectifier_grad,
        ),
        "softplus" => elementwise("softplus", functional::softplus, functional::softplus_grad),
        "softsign" => elementwise("softsign", functional::softsign, functional::softsign_grad),
        "hard_sigmoid" => elementwise(
            "hard_sigmoid",
            functional::hard_sigmoid,
            functional::hard_sigmoid_grad,
        ),
        "exp" => elementwise("exp", functional::exp, functional::exp_grad),
        _ => return None,
    };
    Some(activation)
}

/// What a caller hands to a constructor: nothing (linear), a name, or a callable.
#[derive(Clone, Debug)]
pub enum ActivationSpec<T: Numeric> {
    Linear,
    Named(String),
    Callable(Activation<T>),
}

impl<T: Numeric> Default for ActivationSpec<T> {
    fn default() -> Self {
        ActivationSpec::Linear
    }
}

impl<T: Numeric> From<&str> for ActivationSpec<T> {
    fn from(name: &str) -> Self {
        ActivationSpec::Named(name.to_string())
    }
}

impl<T: Numeric> From<String> for ActivationSpec<T> {
    fn from(name: String) -> Self {
        ActivationSpec::Named(name)
    }
}

impl<T: Numeric> From<Option<&str>> for ActivationSpec<T> {
    fn from(name: Option<&str>) -> Self {
        name.map_or(ActivationSpec::Linear, ActivationSpec::from)
    }
}

impl<T: Numeric> From<Activation<T>> for ActivationSpec<T> {
    fn from(activation: Activation<T>) -> Self {
        ActivationSpec::Callable(activation)
    }
}

impl<T: Numeric> ActivationSpec<T> {
    /// `field` names the constructor argument in the error message.
    pub fn resolve(&self, field: &'static str) -> Result<Activation<T>> {
        match self {
            ActivationSpec::Linear => Ok(Activation::Linear),
            ActivationSpec::Named(name) => {
                lookup(name).ok_or_else(|| AutoencoderError::UnknownActivation {
                    field,
                    name: name.clone(),
                })
            }
            ActivationSpec::Callable(activation) => Ok(activation.clone()),
        }
    }
}

#[test]
fn test_every_builtin_resolves() {
    for name in BUILTIN_ACTIVATIONS {
        let spec: ActivationSpec<f64> = ActivationSpec::from(*name);
        assert!(spec.resolve("act_enc").is_ok(), "{name}");
    }
    let relu: Activation<f64> = lookup("relu").unwrap();
    assert_eq!(relu.name(), "rectifier");
}

#[test]
fn test_unknown_name_is_rejected() {
    let spec: ActivationSpec<f64> = "sigmoidd".into();
    assert_eq!(
        spec.resolve("act_dec").unwrap_err(),
        AutoencoderError::UnknownActivation {
            field: "act_dec",
            name: "sigmoidd".to_string()
        }
    );
}

#[test]
fn test_none_is_linear() {
    let spec: ActivationSpec<f32> = None::<&str>.into();
    let act = spec.resolve("act_enc").unwrap();
    assert_eq!(act.name(), "linear");
    let x = Matrix::from_elem((2, 2), 3.0f32);
    assert_eq!(act.apply(x.clone()), x);
}

#[test]
fn test_elementwise_probe() {
    let softmax: Activation<f64> = lookup("softmax").unwrap();
    assert!(!softmax.is_elementwise());
    assert!(lookup::<f64>("sigmoid").unwrap().is_elementwise());

    let cube = Activation::custom("cube", |x: &Matrix<f64>| x.mapv(|v| v * v * v));
    assert!(cube.is_elementwise());

    let row_sum = Activation::custom("row_sum", |x: &Matrix<f64>| {
        let totals = x.sum_axis(ndarray::Axis(1)).insert_axis(ndarray::Axis(1));
        x + &totals
    });
    assert!(!row_sum.is_elementwise());

    let shrink = Activation::custom("first_column", |x: &Matrix<f64>| {
        x.slice(ndarray::s![.., 0..1]).to_owned()
    });
    assert!(!shrink.is_elementwise());
}

#[test]
fn test_custom_sum_grad_uses_finite_differences() {
    let cube = Activation::custom("cube", |x: &Matrix<f64>| x.mapv(|v| v * v * v));
    let acts = Matrix::from_shape_vec((1, 3), vec![-1.0, 0.5, 2.0]).unwrap();
    let grad = cube.sum_grad(&acts);
    for (g, a) in grad.iter().zip(acts.iter()) {
        assert!((g - 3.0 * a * a).abs() < 1e-6, "g={g}, a={a}");
    }
}
