use std::cell::RefCell;

use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, trace};

use crate::error::{AutoencoderError, Result};
use crate::nn::activation::{Activation, ActivationSpec};
use crate::nn::module::{private, Block};
use crate::nn::params::{valid_irange, AutoencoderParams, Param, ParamMut};
use crate::nn::regularization::Regularization;
use crate::tensor::{child_stream, Batched, Matrix, Minibatch, Numeric, RngSource, Vector};

/// Hyperparameters of a single autoencoder layer.
///
/// ```
/// # use rust_dae::nn::{AutoencoderConfig, Regularization};
/// let config = AutoencoderConfig::<f64>::new(784, 500)
///     .act_enc("sigmoid")
///     .act_dec("sigmoid")
///     .tied_weights(true)
///     .regularization(Regularization::l1(1e-4));
/// assert_eq!(config.nhid, 500);
/// ```
#[derive(Debug, Clone)]
pub struct AutoencoderConfig<T: Numeric> {
    /// Input width. `0` defers allocation of the visible-side parameters.
    pub nvis: usize,
    pub nhid: usize,
    pub act_enc: ActivationSpec<T>,
    pub act_dec: ActivationSpec<T>,
    pub tied_weights: bool,
    pub regularization: Regularization<T>,
    /// Width of the interval around zero the initial weights are drawn from.
    pub irange: T,
}

impl<T: Numeric> AutoencoderConfig<T> {
    pub fn new(nvis: usize, nhid: usize) -> Self {
        AutoencoderConfig {
            nvis,
            nhid,
            act_enc: ActivationSpec::Linear,
            act_dec: ActivationSpec::Linear,
            tied_weights: false,
            regularization: Regularization::None,
            irange: T::lit(1e-3),
        }
    }

    pub fn act_enc(mut self, act_enc: impl Into<ActivationSpec<T>>) -> Self {
        self.act_enc = act_enc.into();
        self
    }

    pub fn act_dec(mut self, act_dec: impl Into<ActivationSpec<T>>) -> Self {
        self.act_dec = act_dec.into();
        self
    }

    pub fn tied_weights(mut self, tied_weights: bool) -> Self {
        self.tied_weights = tied_weights;
        self
    }

    pub fn regularization(mut self, regularization: Regularization<T>) -> Self {
        self.regularization = regularization;
        self
    }

    pub fn irange(mut self, irange: T) -> Self {
        self.irange = irange;
        self
    }
}

/// Parameter lifecycle: visible-side tensors exist only once `nvis` is known.
#[derive(Debug, Clone, PartialEq)]
pub enum Parameters<T: Numeric> {
    Deferred { hidbias: Vector<T> },
    Initialized(AutoencoderParams<T>),
}

/// Output of one reconstruction pass over a single batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction<T: Numeric> {
    pub reconstruction: Matrix<T>,
    /// Hidden activations the reconstruction was decoded from.
    pub hiddens: Matrix<T>,
    /// Sparsity penalty evaluated on `hiddens`.
    pub regularization: T,
}

impl<T: Numeric> Batched<Reconstruction<T>> {
    pub fn total_regularization(&self) -> T {
        self.iter().fold(T::zero(), |acc, rec| acc + rec.regularization)
    }

    pub fn reconstructions(&self) -> Minibatch<T> {
        self.map(|rec| rec.reconstruction.clone())
    }

    pub fn hiddens(&self) -> Minibatch<T> {
        self.map(|rec| rec.hiddens.clone())
    }
}

/// A plain autoencoder: `h = f_enc(x·W + b_hid)`, `x' = f_dec(h·W' + b_vis)`.
#[derive(Debug, Clone)]
pub struct Autoencoder<T: Numeric> {
    nhid: usize,
    irange: T,
    tied_weights: bool,
    act_enc: Activation<T>,
    act_dec: Activation<T>,
    regularization: Regularization<T>,
    parameters: Parameters<T>,
    // for deferred initialization
    rng: StdRng,
    noise: RefCell<StdRng>,
}

impl<T: Numeric> Autoencoder<T> {
    pub fn new<'r>(config: AutoencoderConfig<T>, rng: impl Into<RngSource<'r>>) -> Result<Self> {
        let AutoencoderConfig {
            nvis,
            nhid,
            act_enc,
            act_dec,
            tied_weights,
            regularization,
            irange,
        } = config;
        if nhid == 0 {
            return Err(AutoencoderError::InvalidHiddenSize(nhid));
        }
        if !valid_irange(irange) {
            return Err(AutoencoderError::InvalidRange(irange.to_string()));
        }
        let act_enc = act_enc.resolve("act_enc")?;
        let act_dec = act_dec.resolve("act_dec")?;

        let hidbias = Vector::zeros(nhid);
        let (parameters, rng, noise) = rng.into().with_rng(|source| {
            let parameters = if nvis > 0 {
                Parameters::Initialized(AutoencoderParams::allocate(
                    nvis,
                    hidbias,
                    tied_weights,
                    irange,
                    source,
                ))
            } else {
                Parameters::Deferred { hidbias }
            };
            (parameters, child_stream(source), child_stream(source))
        });
        let noise = RefCell::new(noise);

        debug!(
            nvis,
            nhid,
            tied_weights,
            act_enc = act_enc.name(),
            act_dec = act_dec.name(),
            regularization = %regularization,
            "allocated autoencoder"
        );
        Ok(Autoencoder {
            nhid,
            irange,
            tied_weights,
            act_enc,
            act_dec,
            regularization,
            parameters,
            rng,
            noise,
        })
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self.parameters, Parameters::Initialized(_))
    }

    pub fn tied_weights(&self) -> bool {
        self.tied_weights
    }

    pub fn irange(&self) -> T {
        self.irange
    }

    pub fn encoder_activation(&self) -> &Activation<T> {
        &self.act_enc
    }

    pub fn decoder_activation(&self) -> &Activation<T> {
        &self.act_dec
    }

    pub fn regularization(&self) -> &Regularization<T> {
        &self.regularization
    }

    pub fn parameters(&self) -> &Parameters<T> {
        &self.parameters
    }

    pub fn hidbias(&self) -> &Vector<T> {
        match &self.parameters {
            Parameters::Deferred { hidbias } => hidbias,
            Parameters::Initialized(params) => params.hidbias(),
        }
    }

    pub fn weights(&self) -> Option<&Matrix<T>> {
        self.initialized().ok().map(AutoencoderParams::weights)
    }

    pub fn visbias(&self) -> Option<&Vector<T>> {
        self.initialized().ok().map(AutoencoderParams::visbias)
    }

    /// Transposed view of [`Autoencoder::weights`] when weights are tied.
    pub fn decoder_weights(&self) -> Option<ArrayView2<'_, T>> {
        self.initialized().ok().map(AutoencoderParams::decoder_weights)
    }

    pub(crate) fn initialized(&self) -> Result<&AutoencoderParams<T>> {
        match &self.parameters {
            Parameters::Initialized(params) => Ok(params),
            Parameters::Deferred { .. } => Err(AutoencoderError::Uninitialized),
        }
    }

    /// Like [`Block::set_visible_size`], drawing the new weights from `rng`
    /// instead of the generator captured at construction.
    pub fn set_visible_size_with<'r>(
        &mut self,
        nvis: usize,
        rng: impl Into<RngSource<'r>>,
    ) -> Result<()> {
        self.check_deferred(nvis)?;
        let params = rng
            .into()
            .with_rng(|source| self.allocate_visible(nvis, source));
        self.install(params);
        Ok(())
    }

    fn check_deferred(&self, nvis: usize) -> Result<()> {
        if self.is_initialized() {
            return Err(AutoencoderError::AlreadyInitialized);
        }
        if nvis == 0 {
            return Err(AutoencoderError::InvalidVisibleSize);
        }
        Ok(())
    }

    fn allocate_visible<R>(&self, nvis: usize, rng: &mut R) -> AutoencoderParams<T>
    where
        R: Rng + ?Sized,
    {
        AutoencoderParams::allocate(
            nvis,
            self.hidbias().clone(),
            self.tied_weights,
            self.irange,
            rng,
        )
    }

    fn install(&mut self, params: AutoencoderParams<T>) {
        debug!(nvis = params.nvis(), nhid = self.nhid, "initialized visible parameters");
        self.parameters = Parameters::Initialized(params);
    }

    fn initialize_visible(&mut self, nvis: usize) -> Result<()> {
        self.check_deferred(nvis)?;
        let mut rng = self.rng.clone();
        let params = self.allocate_visible(nvis, &mut rng);
        self.rng = rng;
        self.install(params);
        Ok(())
    }

    /// Pre-activation of the hidden layer, `x·W + b_hid`.
    pub fn hidden_input(&self, x: &Matrix<T>) -> Result<Matrix<T>> {
        let params = self.initialized()?;
        if x.ncols() != params.nvis() {
            return Err(AutoencoderError::ShapeMismatch {
                expected: params.nvis(),
                got: x.ncols(),
            });
        }
        Ok(x.dot(params.weights()) + params.hidbias())
    }

    pub fn encode_batch(&self, x: &Matrix<T>) -> Result<Matrix<T>> {
        trace!(rows = x.nrows(), cols = x.ncols(), "encode");
        Ok(self.act_enc.apply(self.hidden_input(x)?))
    }

    pub fn decode_batch(&self, hiddens: &Matrix<T>) -> Result<Matrix<T>> {
        let params = self.initialized()?;
        if hiddens.ncols() != self.nhid {
            return Err(AutoencoderError::ShapeMismatch {
                expected: self.nhid,
                got: hiddens.ncols(),
            });
        }
        let pre = hiddens.dot(&params.decoder_weights()) + params.visbias();
        Ok(self.act_dec.apply(pre))
    }

    pub fn reconstruct_batch(&self, x: &Matrix<T>) -> Result<Reconstruction<T>> {
        let hiddens = self.encode_batch(x)?;
        let regularization = self.compute_regularization(&hiddens);
        let reconstruction = self.decode_batch(&hiddens)?;
        Ok(Reconstruction {
            reconstruction,
            hiddens,
            regularization,
        })
    }

    pub fn compute_regularization(&self, hiddens: &Matrix<T>) -> T {
        self.regularization.compute(hiddens)
    }

    /// Borrow this layer's noise stream.
    pub(crate) fn with_noise<R>(&self, f: impl FnOnce(&mut StdRng) -> R) -> R {
        f(&mut self.noise.borrow_mut())
    }
}

impl<T: Numeric> private::Private for Autoencoder<T> {}

impl<T: Numeric> Block<T> for Autoencoder<T> {
    fn nvis(&self) -> Option<usize> {
        self.initialized().ok().map(AutoencoderParams::nvis)
    }

    fn nhid(&self) -> usize {
        self.nhid
    }

    fn set_visible_size(&mut self, nvis: usize) -> Result<()> {
        self.initialize_visible(nvis)
    }

    fn encode(&self, inputs: &Minibatch<T>) -> Result<Minibatch<T>> {
        inputs.try_map(|x| self.encode_batch(x))
    }

    fn decode(&self, hiddens: &Minibatch<T>) -> Result<Minibatch<T>> {
        hiddens.try_map(|h| self.decode_batch(h))
    }

    fn reconstruct(&self, inputs: &Minibatch<T>) -> Result<Batched<Reconstruction<T>>> {
        inputs.try_map(|x| self.reconstruct_batch(x))
    }

    fn params(&self) -> Vec<Param<'_, T>> {
        match &self.parameters {
            Parameters::Deferred { hidbias } => vec![Param {
                name: "hb",
                value: hidbias.view().into_dyn(),
            }],
            Parameters::Initialized(params) => params.params(),
        }
    }

    fn params_mut(&mut self) -> Vec<ParamMut<'_, T>> {
        match &mut self.parameters {
            Parameters::Deferred { hidbias } => vec![ParamMut {
                name: "hb",
                value: hidbias.view_mut().into_dyn(),
            }],
            Parameters::Initialized(params) => params.params_mut(),
        }
    }
}

#[cfg(test)]
fn batch(rows: usize, cols: usize) -> Matrix<f64> {
    Matrix::from_shape_fn((rows, cols), |(i, j)| ((i * cols + j) as f64 * 0.37).sin())
}

#[test]
fn test_encode_shape() {
    for (nvis, nhid) in [(1, 1), (7, 3), (3, 7), (10, 10)] {
        let ae = Autoencoder::<f64>::new(
            AutoencoderConfig::new(nvis, nhid).act_enc("tanh").act_dec("sigmoid"),
            42u64,
        )
        .unwrap();
        let h = ae.encode(&batch(5, nvis).into()).unwrap();
        assert_eq!(h.into_single().unwrap().dim(), (5, nhid));
    }
}

#[test]
fn test_reconstruct_shape_and_forward_alias() {
    let ae =
        Autoencoder::<f64>::new(AutoencoderConfig::new(6, 4).act_enc("sigmoid"), 1u64).unwrap();
    let x: Minibatch<f64> = batch(3, 6).into();
    let rec = ae.reconstruct(&x).unwrap().into_single().unwrap();
    assert_eq!(rec.reconstruction.dim(), (3, 6));
    assert_eq!(rec.hiddens.dim(), (3, 4));
    assert_eq!(rec.regularization, 0.0);
    assert_eq!(ae.forward(&x).unwrap(), ae.encode(&x).unwrap());
}

#[test]
fn test_sequence_input_is_mapped_in_order() {
    let ae = Autoencoder::<f64>::new(AutoencoderConfig::new(4, 2).act_enc("tanh"), 5u64).unwrap();
    let batches = vec![batch(1, 4), batch(2, 4), batch(3, 4)];
    let encoded = ae.encode(&Batched::sequence(batches.clone())).unwrap();
    let rows: Vec<_> = encoded.iter().map(|h| h.nrows()).collect();
    assert_eq!(rows, vec![1, 2, 3]);
    for (h, x) in encoded.iter().zip(batches.iter()) {
        assert_eq!(h, &ae.encode_batch(x).unwrap());
    }
    let recs = ae.reconstruct(&Batched::sequence(batches)).unwrap();
    assert_eq!(recs.len(), 3);
}

#[test]
fn test_encode_matches_formula() {
    let ae = Autoencoder::<f64>::new(
        AutoencoderConfig::new(3, 2).act_enc("sigmoid").irange(0.5),
        9u64,
    )
    .unwrap();
    let x = batch(2, 3);
    let w = ae.weights().unwrap();
    let h = ae.encode_batch(&x).unwrap();
    for r in 0..2 {
        for c in 0..2 {
            let pre: f64 = (0..3).map(|k| x[[r, k]] * w[[k, c]]).sum();
            let expected = 1.0 / (1.0 + (-pre).exp());
            assert!((h[[r, c]] - expected).abs() < 1e-12);
        }
    }
}

#[test]
fn test_l1_regularization_is_reported_per_batch() {
    let ae = Autoencoder::<f64>::new(
        AutoencoderConfig::new(5, 3)
            .act_enc("sigmoid")
            .regularization(Regularization::from_solution("l1_penalty", 0.1, 0.0, 0.0).unwrap()),
        3u64,
    )
    .unwrap();
    let rec = ae.reconstruct_batch(&batch(4, 5)).unwrap();
    assert!((rec.regularization - 0.1 * rec.hiddens.sum()).abs() < 1e-12);
    assert_eq!(ae.compute_regularization(&rec.hiddens), rec.regularization);
}

#[test]
fn test_initial_weights_within_irange() {
    let ae = Autoencoder::<f64>::new(AutoencoderConfig::new(30, 20).irange(0.1), 11u64).unwrap();
    let w = ae.weights().unwrap();
    assert!(w.iter().all(|v| v.abs() <= 0.05));
    assert!(ae.hidbias().iter().all(|&b| b == 0.0));
    assert!(ae.visbias().unwrap().iter().all(|&b| b == 0.0));
}

#[test]
fn test_invalid_construction() {
    let err = Autoencoder::<f64>::new(AutoencoderConfig::new(3, 0), 0u64).unwrap_err();
    assert_eq!(err, AutoencoderError::InvalidHiddenSize(0));

    let err = Autoencoder::<f64>::new(AutoencoderConfig::new(3, 2).act_dec("nope"), 0u64)
        .unwrap_err();
    assert_eq!(
        err,
        AutoencoderError::UnknownActivation {
            field: "act_dec",
            name: "nope".into()
        }
    );

    let err =
        Autoencoder::<f64>::new(AutoencoderConfig::new(3, 2).irange(-1.0), 0u64).unwrap_err();
    assert!(matches!(err, AutoencoderError::InvalidRange(_)));
}

#[test]
fn test_shape_mismatch() {
    let ae = Autoencoder::<f64>::new(AutoencoderConfig::new(3, 2), 0u64).unwrap();
    assert_eq!(
        ae.encode_batch(&batch(2, 4)).unwrap_err(),
        AutoencoderError::ShapeMismatch {
            expected: 3,
            got: 4
        }
    );
    assert_eq!(
        ae.decode_batch(&batch(2, 3)).unwrap_err(),
        AutoencoderError::ShapeMismatch {
            expected: 2,
            got: 3
        }
    );
}

#[test]
fn test_deferred_initialization() {
    let mut ae = Autoencoder::<f64>::new(
        AutoencoderConfig::new(0, 4).act_enc("tanh").tied_weights(true),
        2u64,
    )
    .unwrap();
    assert_eq!(ae.nvis(), None);
    assert!(ae.weights().is_none());
    assert_eq!(ae.params().len(), 1);
    assert_eq!(
        ae.encode_batch(&batch(2, 3)).unwrap_err(),
        AutoencoderError::Uninitialized
    );
    assert_eq!(
        ae.set_visible_size(0).unwrap_err(),
        AutoencoderError::InvalidVisibleSize
    );

    ae.set_visible_size(7).unwrap();
    assert_eq!(ae.nvis(), Some(7));
    assert_eq!(ae.encode_batch(&batch(3, 7)).unwrap().dim(), (3, 4));
    assert_eq!(ae.decoder_weights().unwrap(), ae.weights().unwrap().t());

    assert_eq!(
        ae.set_visible_size(7).unwrap_err(),
        AutoencoderError::AlreadyInitialized
    );
    assert_eq!(
        ae.set_visible_size_with(5, 3u64).unwrap_err(),
        AutoencoderError::AlreadyInitialized
    );
}

#[test]
fn test_deferred_initialization_with_explicit_rng() {
    let config = AutoencoderConfig::<f64>::new(0, 4);
    let mut a = Autoencoder::<f64>::new(config.clone(), 1u64).unwrap();
    let mut b = Autoencoder::<f64>::new(config, 2u64).unwrap();
    a.set_visible_size_with(3, 77u64).unwrap();
    b.set_visible_size_with(3, 77u64).unwrap();
    assert_eq!(a.weights(), b.weights());
}

#[test]
fn test_same_seed_same_parameters() {
    let config = AutoencoderConfig::<f64>::new(8, 5).act_enc("sigmoid");
    let a = Autoencoder::<f64>::new(config.clone(), 1234u64).unwrap();
    let b = Autoencoder::<f64>::new(config.clone(), 1234u64).unwrap();
    let c = Autoencoder::<f64>::new(config, 4321u64).unwrap();
    assert_eq!(a.parameters(), b.parameters());
    assert_ne!(a.parameters(), c.parameters());
}

#[test]
fn test_seed_matches_equally_seeded_generator() {
    use rand::SeedableRng;
    for nvis in [0, 6] {
        let config = AutoencoderConfig::<f64>::new(nvis, 4).act_enc("tanh").irange(0.5);
        let mut seeded = Autoencoder::new(config.clone(), 42u64).unwrap();
        let mut generator = StdRng::seed_from_u64(42);
        let mut passed = Autoencoder::new(config, &mut generator).unwrap();
        if nvis == 0 {
            seeded.set_visible_size(6).unwrap();
            passed.set_visible_size(6).unwrap();
        }
        assert_eq!(seeded.parameters(), passed.parameters());
        let x = batch(3, 6);
        let noise = |ae: &Autoencoder<f64>| ae.with_noise(|rng| rng.gen::<u64>());
        assert_eq!(noise(&seeded), noise(&passed));
        assert_eq!(seeded.encode_batch(&x).unwrap(), passed.encode_batch(&x).unwrap());
    }
}

#[test]
fn test_passed_generator_is_advanced() {
    use rand::SeedableRng;
    let config = AutoencoderConfig::<f64>::new(5, 3).irange(1.0);
    let mut generator = StdRng::seed_from_u64(7);
    let first = Autoencoder::new(config.clone(), &mut generator).unwrap();
    let second = Autoencoder::new(config, &mut generator).unwrap();
    assert_ne!(first.parameters(), second.parameters());
}

#[test]
fn test_irange_too_wide_to_sample_is_rejected() {
    for irange in [f64::MAX, f64::INFINITY, f64::NAN] {
        let err = Autoencoder::<f64>::new(AutoencoderConfig::new(3, 2).irange(irange), 1u64)
            .unwrap_err();
        assert!(matches!(err, AutoencoderError::InvalidRange(_)), "irange={irange}");
    }
    let err = Autoencoder::<f32>::new(AutoencoderConfig::new(0, 2).irange(f32::MAX), 1u64)
        .unwrap_err();
    assert!(matches!(err, AutoencoderError::InvalidRange(_)));
    assert!(Autoencoder::<f64>::new(AutoencoderConfig::new(3, 2).irange(1e300), 1u64).is_ok());
}
