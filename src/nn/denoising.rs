use std::rc::Rc;

use crate::error::Result;
use crate::nn::autoencoder::{Autoencoder, AutoencoderConfig, Reconstruction};
use crate::nn::corruptor::Corruptor;
use crate::nn::module::{private, Block};
use crate::nn::params::{Param, ParamMut};
use crate::tensor::{Batched, Matrix, Minibatch, Numeric, RngSource};

/// An autoencoder that learns to reconstruct its input from a corrupted copy of it.
#[derive(Clone)]
pub struct DenoisingAutoencoder<T: Numeric> {
    base: Autoencoder<T>,
    corruptor: Rc<dyn Corruptor<T>>,
}

impl<T: Numeric> std::fmt::Debug for DenoisingAutoencoder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DenoisingAutoencoder")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl<T: Numeric> DenoisingAutoencoder<T> {
    pub fn new<'r>(
        corruptor: Rc<dyn Corruptor<T>>,
        config: AutoencoderConfig<T>,
        rng: impl Into<RngSource<'r>>,
    ) -> Result<Self> {
        let base = Autoencoder::new(config, rng)?;
        Ok(DenoisingAutoencoder { base, corruptor })
    }

    pub fn base(&self) -> &Autoencoder<T> {
        &self.base
    }

    pub(crate) fn base_mut(&mut self) -> &mut Autoencoder<T> {
        &mut self.base
    }

    pub fn corruptor(&self) -> &Rc<dyn Corruptor<T>> {
        &self.corruptor
    }

    /// Draws from this layer's own noise stream.
    pub fn corrupt(&self, x: &Matrix<T>) -> Matrix<T> {
        self.base.with_noise(|rng| self.corruptor.corrupt(x, rng))
    }

    /// Corrupt `x`, then encode and decode the corrupted batch.
    pub fn reconstruct_batch(&self, x: &Matrix<T>) -> Result<Reconstruction<T>> {
        let corrupted = self.corrupt(x);
        self.base.reconstruct_batch(&corrupted)
    }
}

impl<T: Numeric> private::Private for DenoisingAutoencoder<T> {}

impl<T: Numeric> Block<T> for DenoisingAutoencoder<T> {
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
        inputs.try_map(|x| self.reconstruct_batch(x))
    }

    fn params(&self) -> Vec<Param<'_, T>> {
        self.base.params()
    }

    fn params_mut(&mut self) -> Vec<ParamMut<'_, T>> {
        self.base.params_mut()
    }
}

#[cfg(test)]
fn zero_first_column() -> Rc<dyn Corruptor<f64>> {
    Rc::new(|x: &Matrix<f64>, _rng: &mut rand::rngs::StdRng| {
        let mut y = x.clone();
        y.column_mut(0).fill(0.0);
        y
    })
}

#[test]
fn test_reconstruct_uses_corrupted_input() {
    let config = AutoencoderConfig::new(3, 2).act_enc("tanh");
    let dae = DenoisingAutoencoder::new(zero_first_column(), config, 8u64).unwrap();
    let x = Matrix::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    let corrupted = Matrix::from_shape_vec((2, 3), vec![0.0, 2.0, 3.0, 0.0, 5.0, 6.0]).unwrap();

    let rec = dae.reconstruct(&x.clone().into()).unwrap().into_single().unwrap();
    assert_eq!(rec, dae.base().reconstruct_batch(&corrupted).unwrap());
    assert_ne!(rec.hiddens, dae.base().encode_batch(&x).unwrap());
    // encoding stays clean
    assert_eq!(
        dae.encode(&x.clone().into()).unwrap().into_single().unwrap(),
        dae.base().encode_batch(&x).unwrap()
    );
}

#[test]
fn test_corruption_is_reproducible_per_seed() {
    use crate::nn::BinomialCorruptor;
    let corruptor: Rc<dyn Corruptor<f64>> = Rc::new(BinomialCorruptor::new(0.5).unwrap());
    let config = AutoencoderConfig::<f64>::new(20, 5);
    let a = DenoisingAutoencoder::new(corruptor.clone(), config.clone(), 99u64).unwrap();
    let b = DenoisingAutoencoder::new(corruptor, config, 99u64).unwrap();
    let x = Matrix::from_elem((4, 20), 1.0);
    let first = a.corrupt(&x);
    assert_eq!(first, b.corrupt(&x));
    assert_eq!(a.corrupt(&x), b.corrupt(&x));
    // the stream advances between calls
    assert_ne!(first, a.corrupt(&x));
}
