use crate::error::Result;
use crate::nn::params::{Param, ParamMut};
use crate::nn::Reconstruction;
use crate::tensor::{Batched, Minibatch, Numeric};

pub(crate) mod private {
    pub trait Private {}
}

/// The capability every autoencoder flavour (and a whole stack of them) shares.
///
/// Sealed: the set of implementors is closed and lives in this crate.
pub trait Block<T: Numeric>: private::Private {
    /// Input width, or `None` while visible parameters are still deferred.
    fn nvis(&self) -> Option<usize>;

    /// Output width of [`Block::encode`].
    fn nhid(&self) -> usize;

    /// Late-bind the input width of a model built with `nvis == 0`.
    fn set_visible_size(&mut self, nvis: usize) -> Result<()>;

    fn encode(&self, inputs: &Minibatch<T>) -> Result<Minibatch<T>>;

    fn decode(&self, hiddens: &Minibatch<T>) -> Result<Minibatch<T>>;

    fn reconstruct(&self, inputs: &Minibatch<T>) -> Result<Batched<Reconstruction<T>>>;

    /// Representation to hand to the block above; same as [`Block::encode`].
    fn forward(&self, inputs: &Minibatch<T>) -> Result<Minibatch<T>> {
        self.encode(inputs)
    }

    /// Learnable parameters, ordered and without duplicates.
    fn params(&self) -> Vec<Param<'_, T>>;

    fn params_mut(&mut self) -> Vec<ParamMut<'_, T>>;
}
