use crate::error::Result;
use crate::nn::autoencoder::{Autoencoder, Reconstruction};
use crate::nn::contracting::ContractingAutoencoder;
use crate::nn::denoising::DenoisingAutoencoder;
use crate::nn::module::{private, Block};
use crate::nn::params::{Param, ParamMut};
use crate::tensor::{Batched, Matrix, Minibatch, Numeric};

/// One layer of a stack, tagged with its training objective.
#[derive(Debug, Clone)]
pub enum Layer<T: Numeric> {
    Plain(Autoencoder<T>),
    Denoising(DenoisingAutoencoder<T>),
    Contracting(ContractingAutoencoder<T>),
}

impl<T: Numeric> From<Autoencoder<T>> for Layer<T> {
    fn from(ae: Autoencoder<T>) -> Self {
        Layer::Plain(ae)
    }
}

impl<T: Numeric> From<DenoisingAutoencoder<T>> for Layer<T> {
    fn from(dae: DenoisingAutoencoder<T>) -> Self {
        Layer::Denoising(dae)
    }
}

impl<T: Numeric> From<ContractingAutoencoder<T>> for Layer<T> {
    fn from(cae: ContractingAutoencoder<T>) -> Self {
        Layer::Contracting(cae)
    }
}

impl<T: Numeric> Layer<T> {
    pub fn kind(&self) -> &'static str {
        match self {
            Layer::Plain(_) => "plain",
            Layer::Denoising(_) => "denoising",
            Layer::Contracting(_) => "contracting",
        }
    }

    /// The underlying plain autoencoder, whatever the objective.
    pub fn autoencoder(&self) -> &Autoencoder<T> {
        match self {
            Layer::Plain(ae) => ae,
            Layer::Denoising(dae) => dae.base(),
            Layer::Contracting(cae) => cae.base(),
        }
    }

    fn autoencoder_mut(&mut self) -> &mut Autoencoder<T> {
        match self {
            Layer::Plain(ae) => ae,
            Layer::Denoising(dae) => dae.base_mut(),
            Layer::Contracting(cae) => cae.base_mut(),
        }
    }

    pub fn as_denoising(&self) -> Option<&DenoisingAutoencoder<T>> {
        match self {
            Layer::Denoising(dae) => Some(dae),
            _ => None,
        }
    }

    pub fn as_contracting(&self) -> Option<&ContractingAutoencoder<T>> {
        match self {
            Layer::Contracting(cae) => Some(cae),
            _ => None,
        }
    }

    pub fn compute_regularization(&self, hiddens: &Matrix<T>) -> T {
        self.autoencoder().compute_regularization(hiddens)
    }
}

impl<T: Numeric> private::Private for Layer<T> {}

impl<T: Numeric> Block<T> for Layer<T> {
    fn nvis(&self) -> Option<usize> {
        self.autoencoder().nvis()
    }

    fn nhid(&self) -> usize {
        self.autoencoder().nhid()
    }

    fn set_visible_size(&mut self, nvis: usize) -> Result<()> {
        self.autoencoder_mut().set_visible_size(nvis)
    }

    fn encode(&self, inputs: &Minibatch<T>) -> Result<Minibatch<T>> {
        self.autoencoder().encode(inputs)
    }

    fn decode(&self, hiddens: &Minibatch<T>) -> Result<Minibatch<T>> {
        self.autoencoder().decode(hiddens)
    }

    // Only the objective-specific step differs between variants.
    fn reconstruct(&self, inputs: &Minibatch<T>) -> Result<Batched<Reconstruction<T>>> {
        match self {
            Layer::Plain(ae) => ae.reconstruct(inputs),
            Layer::Denoising(dae) => dae.reconstruct(inputs),
            Layer::Contracting(cae) => cae.reconstruct(inputs),
        }
    }

    fn params(&self) -> Vec<Param<'_, T>> {
        self.autoencoder().params()
    }

    fn params_mut(&mut self) -> Vec<ParamMut<'_, T>> {
        self.autoencoder_mut().params_mut()
    }
}
