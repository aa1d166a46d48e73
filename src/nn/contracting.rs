use ndarray::Axis;
use tracing::debug;

use crate::error::{AutoencoderError, Result};
use crate::nn::autoencoder::{Autoencoder, AutoencoderConfig, Reconstruction};
use crate::nn::module::{private, Block};
use crate::nn::params::{Param, ParamMut};
use crate::tensor::{Batched, Matrix, Minibatch, Numeric, RngSource};

/// A regular autoencoder plus a penalty on the Jacobian of its encoder.
#[derive(Debug, Clone)]
pub struct ContractingAutoencoder<T: Numeric> {
    base: Autoencoder<T>,
}

impl<T: Numeric> ContractingAutoencoder<T> {
    /// Fails if the encoder activation mixes coordinates, since the penalty
    /// below relies on `f_enc` acting on each hidden unit independently.
    pub fn new<'r>(config: AutoencoderConfig<T>, rng: impl Into<RngSource<'r>>) -> Result<Self> {
        let base = Autoencoder::new(config, rng)?;
        let act_enc = base.encoder_activation();
        if !act_enc.is_elementwise() {
            debug!(act_enc = act_enc.name(), "rejected non-elementwise encoder");
            return Err(AutoencoderError::NonElementwiseActivation(
                act_enc.name().to_string(),
            ));
        }
        Ok(ContractingAutoencoder { base })
    }

    pub fn base(&self) -> &Autoencoder<T> {
        &self.base
    }

    pub(crate) fn base_mut(&mut self) -> &mut Autoencoder<T> {
        &mut self.base
    }

    /// Squared Frobenius norm of `∂h/∂x`, summed over the batch.
    ///
    /// For `h = s(x·W + b)` with elementwise `s`, the Jacobian of example `n`
    /// is `W[i, j] * s'(a[n, j])`, so its squared norm factors into
    /// `Σ_j s'(a[n, j])² · Σ_i W[i, j]²` and the full tensor is never built.
    pub fn contraction_penalty_batch(&self, x: &Matrix<T>) -> Result<T> {
        let acts = self.base.hidden_input(x)?;
        let act_grad = self.base.encoder_activation().sum_grad(&acts);
        let weights = self.base.initialized()?.weights();
        let column_norms = weights.mapv(|w| w * w).sum_axis(Axis(0));
        let penalty = (act_grad.mapv(|g| g * g) * &column_norms).sum();
        Ok(penalty)
    }

    pub fn contraction_penalty(&self, inputs: &Minibatch<T>) -> Result<Batched<T>> {
        inputs.try_map(|x| self.contraction_penalty_batch(x))
    }
}

impl<T: Numeric> private::Private for ContractingAutoencoder<T> {}

impl<T: Numeric> Block<T> for ContractingAutoencoder<T> {
    fn nvis(&self) -> Option<usize> {
        self.base.nvis()
    }

    fn nhid(&self) -> usize {
        self.base.nhid()
    }

    fn set_visible_size(&mut self, nvis: usize) -> Result<()> {
        self.base.set_visible_size(nvis)
    }

    fn encode(&self, inputs: &Minibatch<T>) -> Result<Minibatch<T>> {
        self.base.encode(inputs)
    }

    fn decode(&self, hiddens: &Minibatch<T>) -> Result<Minibatch<T>> {
        self.base.decode(hiddens)
    }

    fn reconstruct(&self, inputs: &Minibatch<T>) -> Result<Batched<Reconstruction<T>>> {
        self.base.reconstruct(inputs)
    }

    fn params(&self) -> Vec<Param<'_, T>> {
        self.base.params()
    }

    fn params_mut(&mut self) -> Vec<ParamMut<'_, T>> {
        self.base.params_mut()
    }
}

#[cfg(test)]
fn explicit_penalty(cae: &ContractingAutoencoder<f64>, x: &Matrix<f64>) -> f64 {
    // Finite-difference Jacobian of the encoder, one example and input at a time.
    let epsilon = 1e-6;
    let mut total = 0.0;
    for n in 0..x.nrows() {
        let row = x.row(n).to_owned().insert_axis(Axis(0));
        for i in 0..x.ncols() {
            let mut ahead = row.clone();
            let mut behind = row.clone();
            ahead[[0, i]] += epsilon;
            behind[[0, i]] -= epsilon;
            let dh = cae.base().encode_batch(&ahead).unwrap()
                - cae.base().encode_batch(&behind).unwrap();
            total += dh.mapv(|d| (d / (2.0 * epsilon)).powi(2)).sum();
        }
    }
    total
}

#[test]
fn test_penalty_matches_explicit_jacobian() {
    for act in ["sigmoid", "tanh", "softplus", "linear"] {
        let cae = ContractingAutoencoder::<f64>::new(
            AutoencoderConfig::new(4, 3).act_enc(act).irange(2.0),
            17u64,
        )
        .unwrap();
        let x = Matrix::from_shape_fn((3, 4), |(i, j)| 0.3 * i as f64 - 0.2 * j as f64);
        let fast = cae.contraction_penalty_batch(&x).unwrap();
        let slow = explicit_penalty(&cae, &x);
        assert!(
            (fast - slow).abs() < 1e-5 * slow.max(1.0),
            "act={act}, fast={fast}, slow={slow}"
        );
    }
}

#[test]
fn test_penalty_over_sequence() {
    let cae = ContractingAutoencoder::<f64>::new(
        AutoencoderConfig::new(2, 2).act_enc("sigmoid").irange(1.0),
        3u64,
    )
    .unwrap();
    let a = Matrix::from_elem((1, 2), 0.5);
    let b = Matrix::from_elem((2, 2), -0.5);
    let penalties = cae
        .contraction_penalty(&Batched::sequence(vec![a.clone(), b.clone()]))
        .unwrap();
    let values: Vec<f64> = penalties.iter().copied().collect();
    assert_eq!(
        values,
        vec![
            cae.contraction_penalty_batch(&a).unwrap(),
            cae.contraction_penalty_batch(&b).unwrap()
        ]
    );
}

#[test]
fn test_rejects_non_elementwise_encoder() {
    let err = ContractingAutoencoder::<f64>::new(
        AutoencoderConfig::new(4, 3).act_enc("softmax"),
        0u64,
    )
    .unwrap_err();
    assert_eq!(
        err,
        AutoencoderError::NonElementwiseActivation("softmax".into())
    );
    assert!(ContractingAutoencoder::<f64>::new(
        AutoencoderConfig::new(4, 3).act_enc("sigmoid"),
        0u64
    )
    .is_ok());
}

#[test]
fn test_custom_elementwise_encoder_is_accepted() {
    use crate::nn::Activation;
    let cube = Activation::custom("cube", |x: &Matrix<f64>| x.mapv(|v| v * v * v));
    let cae = ContractingAutoencoder::new(
        AutoencoderConfig::new(3, 2).act_enc(cube).irange(1.0),
        4u64,
    )
    .unwrap();
    let x = Matrix::from_shape_fn((2, 3), |(i, j)| 0.1 * (i + j) as f64 + 0.2);
    let fast = cae.contraction_penalty_batch(&x).unwrap();
    let slow = explicit_penalty(&cae, &x);
    assert!((fast - slow).abs() < 1e-5 * slow.max(1.0), "fast={fast}, slow={slow}");
}
