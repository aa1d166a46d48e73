use std::rc::Rc;

use approx::assert_abs_diff_eq;
use ndarray::ArrayD;

use rust_dae::nn::{
    build_stacked_ae, Autoencoder, AutoencoderConfig, BinomialCorruptor, Block, Layer, PerLayer,
    SharedCorruptor, StackConfig, StackedBlocks,
};
use rust_dae::optim::sgd::sgd_step;
use rust_dae::tensor::{Batched, Matrix, Minibatch};
use rust_dae::AutoencoderError;

fn config() -> StackConfig<f64> {
    StackConfig::new(10, vec![8, 4, 2]).act_enc(PerLayer::all("sigmoid"))
}

#[test]
fn test_stack_shapes() {
    let stack = build_stacked_ae(config(), 9001u64).unwrap();
    assert_eq!(stack.len(), 3);
    let nviss: Vec<_> = stack.iter().map(|l| l.nvis().unwrap()).collect();
    let nhids: Vec<_> = stack.iter().map(|l| l.nhid()).collect();
    assert_eq!(nviss, vec![10, 8, 4]);
    assert_eq!(nhids, vec![8, 4, 2]);

    let x: Minibatch<f64> = Matrix::from_elem((5, 10), 0.5).into();
    let codes = stack.encode(&x).unwrap();
    assert_eq!(codes.as_single().unwrap().dim(), (5, 2));
    assert_eq!(stack.forward(&x).unwrap(), codes);
    assert_eq!(stack.decode(&codes).unwrap().into_single().unwrap().dim(), (5, 10));
}

#[test]
fn test_upward_pass_feeds_each_layer() {
    let stack = build_stacked_ae(config(), 3u64).unwrap();
    let x: Minibatch<f64> = Batched::sequence(vec![
        Matrix::from_elem((2, 10), 0.1),
        Matrix::from_elem((3, 10), -0.2),
    ]);
    let x_copy = x.clone();
    let reps = stack.upward_pass(&x).unwrap();
    assert_eq!(reps.len(), 3);
    let mut below = x;
    for (layer, rep) in stack.iter().zip(reps.iter()) {
        assert_eq!(&layer.encode(&below).unwrap(), rep);
        below = rep.clone();
    }
    assert_eq!(reps[2], stack.encode(&x_copy).unwrap());
}

#[test]
fn test_per_layer_length_mismatch() {
    let err = build_stacked_ae(
        config().tied_weights(PerLayer::each([true, false])),
        1u64,
    )
    .unwrap_err();
    assert_eq!(
        err,
        AutoencoderError::LayerCountMismatch {
            field: "tied_weights",
            expected: 3,
            got: 2
        }
    );
    let err = build_stacked_ae(
        config().act_dec(PerLayer::each(["sigmoid", "linear", "tanh", "tanh"])),
        1u64,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        AutoencoderError::LayerCountMismatch { field: "act_dec", .. }
    ));
}

#[test]
fn test_denoising_and_contracting_conflict() {
    let corruptor: SharedCorruptor<f64> = Rc::new(BinomialCorruptor::new(0.2).unwrap());
    let err = build_stacked_ae(
        config()
            .corruptor(PerLayer::each([None, Some(corruptor), None]))
            .contracting(PerLayer::all(true)),
        1u64,
    )
    .unwrap_err();
    assert_eq!(err, AutoencoderError::ConflictingObjectives(1));
}

#[test]
fn test_unknown_activation_reports_field() {
    let err = build_stacked_ae(
        config().act_enc(PerLayer::each(["sigmoid", "sigmoid", "swish"])),
        1u64,
    )
    .unwrap_err();
    assert_eq!(
        err,
        AutoencoderError::UnknownActivation {
            field: "act_enc",
            name: "swish".into()
        }
    );
}

#[test]
fn test_same_seed_same_stack() {
    let a = build_stacked_ae(config().tied_weights(PerLayer::all(true)), 55u64).unwrap();
    let b = build_stacked_ae(config().tied_weights(PerLayer::all(true)), 55u64).unwrap();
    let c = build_stacked_ae(config().tied_weights(PerLayer::all(true)), 56u64).unwrap();
    let values = |s: &StackedBlocks<f64>| -> Vec<ArrayD<f64>> {
        s.params().iter().map(|p| p.value.to_owned()).collect()
    };
    assert_eq!(values(&a), values(&b));
    assert_ne!(values(&a), values(&c));
}

#[test]
fn test_sgd_over_whole_stack() {
    let mut stack = build_stacked_ae(config().tied_weights(PerLayer::all(true)), 8u64).unwrap();
    assert_eq!(stack.params().len(), 9);
    let grads: Vec<ArrayD<f64>> = stack
        .params()
        .iter()
        .map(|p| ArrayD::from_elem(p.value.shape(), 1.0))
        .collect();
    let before = stack.layers()[2].autoencoder().hidbias().clone();
    sgd_step(&mut stack, &grads, 0.25).unwrap();
    let after = stack.layers()[2].autoencoder().hidbias();
    for (b, a) in before.iter().zip(after.iter()) {
        assert_abs_diff_eq!(b - 0.25, *a, epsilon = 1e-15);
    }
    for layer in &stack {
        let ae = layer.autoencoder();
        assert_eq!(ae.decoder_weights().unwrap(), ae.weights().unwrap().t());
    }
}

#[test]
fn test_hand_built_stack() {
    let bottom =
        Autoencoder::<f64>::new(AutoencoderConfig::new(0, 3).act_enc("tanh"), 1u64).unwrap();
    let top = Autoencoder::<f64>::new(AutoencoderConfig::new(3, 2), 2u64).unwrap();
    let mut stack = StackedBlocks::new(vec![Layer::from(bottom), Layer::from(top)]).unwrap();
    assert_eq!(stack.nvis(), None);
    stack.set_visible_size(6).unwrap();
    assert_eq!(stack.nvis(), Some(6));
    let rec = stack
        .reconstruct(&Matrix::from_elem((4, 6), 1.0).into())
        .unwrap();
    assert_eq!(rec.reconstructions().as_single().unwrap().dim(), (4, 6));
    assert_eq!(rec.hiddens().as_single().unwrap().dim(), (4, 2));
    assert_eq!(rec.total_regularization(), 0.0);
}
