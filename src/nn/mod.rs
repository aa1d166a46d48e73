mod activation;
mod autoencoder;
mod contracting;
mod corruptor;
mod denoising;
mod layer;
mod module;
mod params;
mod regularization;
mod stack;

pub use activation::{lookup, Activation, ActivationSpec, MatrixFn, BUILTIN_ACTIVATIONS};
pub use autoencoder::{Autoencoder, AutoencoderConfig, Parameters, Reconstruction};
pub use contracting::ContractingAutoencoder;
pub use corruptor::{BinomialCorruptor, Corruptor, GaussianCorruptor};
pub use denoising::DenoisingAutoencoder;
pub use layer::Layer;
pub use module::Block;
pub use params::{AutoencoderParams, DecoderWeights, Param, ParamMut};
pub use regularization::Regularization;
pub use stack::{build_stacked_ae, PerLayer, SharedCorruptor, StackConfig, StackedBlocks};
