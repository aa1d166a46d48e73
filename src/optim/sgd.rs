use ndarray::ArrayD;
use tracing::debug;

use crate::error::{AutoencoderError, Result};
use crate::nn::Block;
use crate::tensor::Numeric;

/// One plain gradient-descent update, `p -= step_size * g`, applied in place.
///
/// `grads` must line up with `block.params()`: same count, same order and
/// same shapes. Nothing is updated if any of them disagree.
pub fn sgd_step<T, B>(block: &mut B, grads: &[ArrayD<T>], step_size: T) -> Result<()>
where
    T: Numeric,
    B: Block<T> + ?Sized,
{
    let mut params = block.params_mut();
    if params.len() != grads.len() {
        return Err(AutoencoderError::GradientMismatch(format!(
            "{} gradients for {} parameters",
            grads.len(),
            params.len()
        )));
    }
    if let Some((param, grad)) = params
        .iter()
        .zip(grads)
        .find(|(param, grad)| param.value.shape() != grad.shape())
    {
        return Err(AutoencoderError::GradientMismatch(format!(
            "{} has shape {:?} but its gradient has shape {:?}",
            param.name,
            param.value.shape(),
            grad.shape()
        )));
    }
    for (param, grad) in params.iter_mut().zip(grads) {
        param.value.scaled_add(-step_size, grad);
    }
    debug!(params = grads.len(), %step_size, "sgd step");
    Ok(())
}

#[cfg(test)]
fn ones_like<T: Numeric, B: Block<T>>(block: &B) -> Vec<ArrayD<T>> {
    block
        .params()
        .iter()
        .map(|p| ArrayD::from_elem(p.value.shape(), T::one()))
        .collect()
}

#[test]
fn test_step_keeps_tied_decoder_in_sync() {
    use crate::nn::{Autoencoder, AutoencoderConfig};
    let mut ae = Autoencoder::<f64>::new(
        AutoencoderConfig::new(4, 3).act_enc("sigmoid").tied_weights(true),
        12u64,
    )
    .unwrap();
    let before = ae.weights().unwrap().clone();
    let grads = ones_like(&ae);
    assert_eq!(grads.len(), 3);

    sgd_step(&mut ae, &grads, 0.5).unwrap();
    let after = ae.weights().unwrap();
    assert_eq!(after, &before.mapv(|w| w - 0.5));
    assert_eq!(ae.decoder_weights().unwrap(), after.t());
    assert!(ae.hidbias().iter().all(|&b| b == -0.5));
}

#[test]
fn test_mismatched_gradients_leave_params_untouched() {
    use crate::nn::{Autoencoder, AutoencoderConfig};
    let mut ae = Autoencoder::<f64>::new(AutoencoderConfig::new(4, 3), 12u64).unwrap();
    let snapshot = ae.parameters().clone();

    let mut grads = ones_like(&ae);
    grads.pop();
    assert!(matches!(
        sgd_step(&mut ae, &grads, 0.1),
        Err(AutoencoderError::GradientMismatch(_))
    ));

    let mut grads = ones_like(&ae);
    grads[2] = ArrayD::zeros(vec![3, 4]);
    assert!(matches!(
        sgd_step(&mut ae, &grads, 0.1),
        Err(AutoencoderError::GradientMismatch(_))
    ));
    assert_eq!(ae.parameters(), &snapshot);
}
