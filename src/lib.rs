//! Autoencoders and stacks of them: plain, denoising and contracting
//! variants built on `ndarray` matrices.

pub mod error;
pub mod nn;
pub mod optim;
pub mod tensor;

pub use error::{AutoencoderError, Result};
