use std::rc::Rc;

use itertools::izip;
use tracing::debug;

use crate::error::{AutoencoderError, Result};
use crate::nn::activation::ActivationSpec;
use crate::nn::autoencoder::{Autoencoder, AutoencoderConfig, Reconstruction};
use crate::nn::contracting::ContractingAutoencoder;
use crate::nn::corruptor::Corruptor;
use crate::nn::denoising::DenoisingAutoencoder;
use crate::nn::layer::Layer;
use crate::nn::module::{private, Block};
use crate::nn::params::{Param, ParamMut};
use crate::nn::regularization::Regularization;
use crate::tensor::{child_stream, Batched, Matrix, Minibatch, Numeric, RngSource};

pub type SharedCorruptor<T> = Rc<dyn Corruptor<T>>;

/// A hyperparameter given once for the whole stack, or once per layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PerLayer<V> {
    All(V),
    Each(Vec<V>),
}

impl<V: Default> Default for PerLayer<V> {
    fn default() -> Self {
        PerLayer::All(V::default())
    }
}

impl<V> PerLayer<V> {
    pub fn all(value: impl Into<V>) -> Self {
        PerLayer::All(value.into())
    }

    pub fn each<I>(values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<V>,
    {
        PerLayer::Each(values.into_iter().map(Into::into).collect())
    }
}

impl<V: Clone> PerLayer<V> {
    /// One value per layer. `field` names the setting in the error.
    pub fn expand(self, field: &'static str, layers: usize) -> Result<Vec<V>> {
        match self {
            PerLayer::All(value) => Ok(vec![value; layers]),
            PerLayer::Each(values) if values.len() == layers => Ok(values),
            PerLayer::Each(values) => Err(AutoencoderError::LayerCountMismatch {
                field,
                expected: layers,
                got: values.len(),
            }),
        }
    }
}

/// Hyperparameters for [`build_stacked_ae`].
#[derive(Clone)]
pub struct StackConfig<T: Numeric> {
    /// Input width of the first layer; `0` defers it.
    pub nvis: usize,
    /// Hidden width of each layer, bottom to top.
    pub nhids: Vec<usize>,
    pub act_enc: PerLayer<ActivationSpec<T>>,
    pub act_dec: PerLayer<ActivationSpec<T>>,
    pub tied_weights: PerLayer<bool>,
    pub irange: PerLayer<T>,
    /// A layer with a corruptor becomes a denoising autoencoder.
    pub corruptor: PerLayer<Option<SharedCorruptor<T>>>,
    /// A layer with this flag becomes a contracting autoencoder.
    pub contracting: PerLayer<bool>,
    pub regularization: PerLayer<Regularization<T>>,
}

impl<T: Numeric> StackConfig<T> {
    pub fn new(nvis: usize, nhids: Vec<usize>) -> Self {
        StackConfig {
            nvis,
            nhids,
            act_enc: PerLayer::All(ActivationSpec::Linear),
            act_dec: PerLayer::All(ActivationSpec::Linear),
            tied_weights: PerLayer::All(false),
            irange: PerLayer::All(T::lit(1e-3)),
            corruptor: PerLayer::All(None),
            contracting: PerLayer::All(false),
            regularization: PerLayer::All(Regularization::None),
        }
    }

    pub fn act_enc(mut self, act_enc: PerLayer<ActivationSpec<T>>) -> Self {
        self.act_enc = act_enc;
        self
    }

    pub fn act_dec(mut self, act_dec: PerLayer<ActivationSpec<T>>) -> Self {
        self.act_dec = act_dec;
        self
    }

    pub fn tied_weights(mut self, tied_weights: PerLayer<bool>) -> Self {
        self.tied_weights = tied_weights;
        self
    }

    pub fn irange(mut self, irange: PerLayer<T>) -> Self {
        self.irange = irange;
        self
    }

    pub fn corruptor(mut self, corruptor: PerLayer<Option<SharedCorruptor<T>>>) -> Self {
        self.corruptor = corruptor;
        self
    }

    /// Make every layer denoising with the same corruptor.
    pub fn denoising(self, corruptor: impl Corruptor<T> + 'static) -> Self {
        let shared: SharedCorruptor<T> = Rc::new(corruptor);
        self.corruptor(PerLayer::All(Some(shared)))
    }

    pub fn contracting(mut self, contracting: PerLayer<bool>) -> Self {
        self.contracting = contracting;
        self
    }

    pub fn regularization(mut self, regularization: PerLayer<Regularization<T>>) -> Self {
        self.regularization = regularization;
        self
    }
}

/// Build one autoencoder per entry of `nhids`, feeding each layer's hidden
/// width into the next layer's input width.
///
/// ```
/// use rust_dae::nn::{build_stacked_ae, Block, PerLayer, StackConfig};
/// use rust_dae::tensor::Matrix;
///
/// let stack = build_stacked_ae(
///     StackConfig::<f64>::new(10, vec![8, 4, 2]).act_enc(PerLayer::all("sigmoid")),
///     9001u64,
/// )
/// .unwrap();
/// let codes = stack.encode(&Matrix::zeros((5, 10)).into()).unwrap();
/// assert_eq!(codes.into_single().unwrap().dim(), (5, 2));
/// ```
pub fn build_stacked_ae<'r, T: Numeric>(
    config: StackConfig<T>,
    rng: impl Into<RngSource<'r>>,
) -> Result<StackedBlocks<T>> {
    let StackConfig {
        nvis,
        nhids,
        act_enc,
        act_dec,
        tied_weights,
        irange,
        corruptor,
        contracting,
        regularization,
    } = config;
    let n = nhids.len();
    if n == 0 {
        return Err(AutoencoderError::EmptyStack);
    }
    let act_enc = act_enc.expand("act_enc", n)?;
    let act_dec = act_dec.expand("act_dec", n)?;
    let tied_weights = tied_weights.expand("tied_weights", n)?;
    let irange = irange.expand("irange", n)?;
    let corruptor = corruptor.expand("corruptor", n)?;
    let contracting = contracting.expand("contracting", n)?;
    let regularization = regularization.expand("regularization", n)?;

    if let Some(layer) = corruptor
        .iter()
        .zip(contracting.iter())
        .position(|(corr, &cae)| corr.is_some() && cae)
    {
        return Err(AutoencoderError::ConflictingObjectives(layer));
    }

    let nviss: Vec<usize> = std::iter::once(nvis)
        .chain(nhids.iter().copied().take(n - 1))
        .collect();

    let settings = izip!(
        nhids,
        nviss,
        act_enc,
        act_dec,
        corruptor,
        contracting,
        tied_weights,
        irange,
        regularization
    );
    // Every layer forks its own stream from the one source.
    let layers = rng.into().with_rng(|parent| -> Result<Vec<Layer<T>>> {
        let mut layers = Vec::with_capacity(n);
        for (index, (nhid, nvis, act_enc, act_dec, corr, cae, tied, ir, reg)) in
            settings.enumerate()
        {
            let layer_config = AutoencoderConfig {
                nvis,
                nhid,
                act_enc,
                act_dec,
                tied_weights: tied,
                regularization: reg,
                irange: ir,
            };
            let mut layer_rng = child_stream(parent);
            let layer = match (corr, cae) {
                (Some(corr), _) => Layer::Denoising(DenoisingAutoencoder::new(
                    corr,
                    layer_config,
                    &mut layer_rng,
                )?),
                (None, true) => {
                    Layer::Contracting(ContractingAutoencoder::new(layer_config, &mut layer_rng)?)
                }
                (None, false) => Layer::Plain(Autoencoder::new(layer_config, &mut layer_rng)?),
            };
            debug!(layer = index, kind = layer.kind(), nvis, nhid, "built stack layer");
            layers.push(layer);
        }
        Ok(layers)
    })?;
    StackedBlocks::new(layers)
}

/// An ordered, fixed sequence of layers used as a single block.
#[derive(Debug, Clone)]
pub struct StackedBlocks<T: Numeric> {
    layers: Vec<Layer<T>>,
}

impl<T: Numeric> StackedBlocks<T> {
    /// Checks that each layer's hidden width is the next layer's input width.
    pub fn new(layers: Vec<Layer<T>>) -> Result<Self> {
        if layers.is_empty() {
            return Err(AutoencoderError::EmptyStack);
        }
        for (layer, pair) in layers.windows(2).enumerate() {
            let (below, above) = (&pair[0], &pair[1]);
            if above.nvis() != Some(below.nhid()) {
                return Err(AutoencoderError::LayerWidthMismatch {
                    layer,
                    nhid: below.nhid(),
                    next_nvis: above.nvis(),
                });
            }
        }
        debug!(layers = layers.len(), "assembled stack");
        Ok(StackedBlocks { layers })
    }

    pub fn layers(&self) -> &[Layer<T>] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Layer<T>> {
        self.layers.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Layer<T>> {
        self.layers.iter()
    }

    /// Representation after each layer, bottom to top.
    ///
    /// Entry `i` is what layer `i + 1` trains on in greedy layer-wise training.
    pub fn upward_pass(&self, inputs: &Minibatch<T>) -> Result<Vec<Minibatch<T>>> {
        let mut representations = Vec::with_capacity(self.layers.len());
        let mut current = inputs.clone();
        for layer in &self.layers {
            current = layer.encode(&current)?;
            representations.push(current.clone());
        }
        Ok(representations)
    }

    fn reconstruct_batch(&self, x: &Matrix<T>) -> Result<Reconstruction<T>> {
        let mut hiddens = x.clone();
        let mut regularization = T::zero();
        for layer in &self.layers {
            let ae = layer.autoencoder();
            hiddens = ae.encode_batch(&hiddens)?;
            regularization = regularization + ae.compute_regularization(&hiddens);
        }
        let reconstruction = self
            .layers
            .iter()
            .rev()
            .try_fold(hiddens.clone(), |h, layer| layer.autoencoder().decode_batch(&h))?;
        Ok(Reconstruction {
            reconstruction,
            hiddens,
            regularization,
        })
    }
}

impl<'a, T: Numeric> IntoIterator for &'a StackedBlocks<T> {
    type Item = &'a Layer<T>;
    type IntoIter = std::slice::Iter<'a, Layer<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.layers.iter()
    }
}

impl<T: Numeric> private::Private for StackedBlocks<T> {}

impl<T: Numeric> Block<T> for StackedBlocks<T> {
    fn nvis(&self) -> Option<usize> {
        self.layers[0].nvis()
    }

    fn nhid(&self) -> usize {
        self.layers[self.layers.len() - 1].nhid()
    }

    fn set_visible_size(&mut self, nvis: usize) -> Result<()> {
        self.layers[0].set_visible_size(nvis)
    }

    fn encode(&self, inputs: &Minibatch<T>) -> Result<Minibatch<T>> {
        self.layers
            .iter()
            .try_fold(inputs.clone(), |prev, layer| layer.encode(&prev))
    }

    fn decode(&self, hiddens: &Minibatch<T>) -> Result<Minibatch<T>> {
        self.layers
            .iter()
            .rev()
            .try_fold(hiddens.clone(), |prev, layer| layer.decode(&prev))
    }

    /// Clean pass up the whole stack and back down. The regularization is
    /// summed over every layer's hidden activations.
    fn reconstruct(&self, inputs: &Minibatch<T>) -> Result<Batched<Reconstruction<T>>> {
        inputs.try_map(|x| self.reconstruct_batch(x))
    }

    fn params(&self) -> Vec<Param<'_, T>> {
        self.layers.iter().flat_map(|layer| layer.params()).collect()
    }

    fn params_mut(&mut self) -> Vec<ParamMut<'_, T>> {
        self.layers
            .iter_mut()
            .flat_map(|layer| layer.params_mut())
            .collect()
    }
}

#[test]
fn test_per_layer_expand() {
    assert_eq!(PerLayer::All(3).expand("x", 2).unwrap(), vec![3, 3]);
    assert_eq!(PerLayer::<i32>::each([1, 2]).expand("x", 2).unwrap(), vec![1, 2]);
    assert_eq!(
        PerLayer::<i32>::each([1, 2, 3]).expand("irange", 2).unwrap_err(),
        AutoencoderError::LayerCountMismatch {
            field: "irange",
            expected: 2,
            got: 3
        }
    );
    // a one-element list is not a scalar
    assert!(PerLayer::<i32>::each([1]).expand("x", 2).is_err());
}

#[test]
fn test_stack_widths_chain() {
    let stack = build_stacked_ae(
        StackConfig::<f64>::new(10, vec![8, 4, 2]).act_enc(PerLayer::all("tanh")),
        5u64,
    )
    .unwrap();
    let nviss: Vec<_> = stack.iter().map(|l| l.nvis()).collect();
    let nhids: Vec<_> = stack.iter().map(|l| l.nhid()).collect();
    assert_eq!(nviss, vec![Some(10), Some(8), Some(4)]);
    assert_eq!(nhids, vec![8, 4, 2]);
    assert_eq!(stack.nvis(), Some(10));
    assert_eq!(stack.nhid(), 2);
}

#[test]
fn test_layer_kinds_follow_objectives() {
    use crate::nn::BinomialCorruptor;
    let corr: SharedCorruptor<f64> = Rc::new(BinomialCorruptor::new(0.3).unwrap());
    let stack = build_stacked_ae(
        StackConfig::<f64>::new(6, vec![5, 4, 3])
            .act_enc(PerLayer::all("sigmoid"))
            .corruptor(PerLayer::each([Some(corr), None, None]))
            .contracting(PerLayer::each([false, false, true])),
        1u64,
    )
    .unwrap();
    let kinds: Vec<_> = stack.iter().map(Layer::kind).collect();
    assert_eq!(kinds, vec!["denoising", "plain", "contracting"]);
}

#[test]
fn test_conflicting_objectives_rejected() {
    use crate::nn::GaussianCorruptor;
    let err = build_stacked_ae(
        StackConfig::<f64>::new(6, vec![5, 4])
            .act_enc(PerLayer::all("sigmoid"))
            .denoising(GaussianCorruptor::new(0.1).unwrap())
            .contracting(PerLayer::each([false, true])),
        1u64,
    )
    .unwrap_err();
    assert_eq!(err, AutoencoderError::ConflictingObjectives(1));
}

#[test]
fn test_empty_stack_and_width_mismatch() {
    assert_eq!(
        build_stacked_ae(StackConfig::<f64>::new(6, vec![]), 1u64).unwrap_err(),
        AutoencoderError::EmptyStack
    );
    let a = Autoencoder::<f64>::new(AutoencoderConfig::new(4, 3), 1u64).unwrap();
    let b = Autoencoder::<f64>::new(AutoencoderConfig::new(2, 2), 1u64).unwrap();
    assert_eq!(
        StackedBlocks::new(vec![a.into(), b.into()]).unwrap_err(),
        AutoencoderError::LayerWidthMismatch {
            layer: 0,
            nhid: 3,
            next_nvis: Some(2)
        }
    );
}

#[test]
fn test_deferred_first_layer() {
    let mut stack = build_stacked_ae(StackConfig::<f64>::new(0, vec![3, 2]), 1u64).unwrap();
    assert_eq!(stack.nvis(), None);
    stack.set_visible_size(5).unwrap();
    let x: Minibatch<f64> = Matrix::zeros((4, 5)).into();
    assert_eq!(stack.encode(&x).unwrap().into_single().unwrap().dim(), (4, 2));
    assert_eq!(
        stack.set_visible_size(5).unwrap_err(),
        AutoencoderError::AlreadyInitialized
    );
}

#[test]
fn test_stack_reconstruct_sums_layer_penalties() {
    let stack = build_stacked_ae(
        StackConfig::<f64>::new(6, vec![4, 2])
            .act_enc(PerLayer::all("sigmoid"))
            .regularization(PerLayer::each([
                Regularization::l1(0.5),
                Regularization::quadratic(0.1, 2.0),
            ])),
        21u64,
    )
    .unwrap();
    let x = Matrix::from_shape_fn((3, 6), |(i, j)| (i as f64 - j as f64) * 0.1);
    let rec = stack
        .reconstruct(&x.clone().into())
        .unwrap()
        .into_single()
        .unwrap();
    assert_eq!(rec.reconstruction.dim(), (3, 6));
    assert_eq!(rec.hiddens.dim(), (3, 2));

    let reps = stack.upward_pass(&x.clone().into()).unwrap();
    let h0 = reps[0].as_single().unwrap();
    let h1 = reps[1].as_single().unwrap();
    assert_eq!(h1, &rec.hiddens);
    let expected = stack.layers()[0].compute_regularization(h0)
        + stack.layers()[1].compute_regularization(h1);
    assert!((rec.regularization - expected).abs() < 1e-12);

    let decoded = stack.decode(&rec.hiddens.clone().into()).unwrap();
    assert_eq!(decoded.into_single().unwrap(), rec.reconstruction);
}

#[test]
fn test_in_place_updates_keep_widths() {
    let mut stack = build_stacked_ae(
        StackConfig::<f64>::new(10, vec![8, 4, 2]).act_enc(PerLayer::all("sigmoid")),
        13u64,
    )
    .unwrap();
    for mut param in stack.params_mut() {
        param.value.fill(0.1);
    }
    let nviss: Vec<_> = stack.iter().map(|l| l.nvis()).collect();
    assert_eq!(nviss, vec![Some(10), Some(8), Some(4)]);
    assert_eq!(
        stack.set_visible_size(3).unwrap_err(),
        AutoencoderError::AlreadyInitialized
    );
    let x: Minibatch<f64> = Matrix::from_elem((2, 10), 1.0).into();
    assert_eq!(stack.encode(&x).unwrap().into_single().unwrap().dim(), (2, 2));
}

#[test]
fn test_seed_matches_equally_seeded_generator() {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    let config = || StackConfig::<f64>::new(6, vec![4, 3]).irange(PerLayer::all(0.5));
    let seeded = build_stacked_ae(config(), 42u64).unwrap();
    let mut generator = StdRng::seed_from_u64(42);
    let passed = build_stacked_ae(config(), &mut generator).unwrap();
    let values = |s: &StackedBlocks<f64>| -> Vec<ndarray::ArrayD<f64>> {
        s.params().iter().map(|p| p.value.to_owned()).collect()
    };
    assert_eq!(values(&seeded), values(&passed));
}
