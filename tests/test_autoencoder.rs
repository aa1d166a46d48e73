use approx::assert_relative_eq;
use ndarray::ArrayD;

use rust_dae::nn::{
    Autoencoder, AutoencoderConfig, Block, ContractingAutoencoder, DenoisingAutoencoder,
    GaussianCorruptor, Regularization, SharedCorruptor,
};
use rust_dae::optim::sgd::sgd_step;
use rust_dae::tensor::Matrix;
use rust_dae::AutoencoderError;

fn batch(rows: usize, cols: usize) -> Matrix<f64> {
    Matrix::from_shape_fn((rows, cols), |(i, j)| ((3 * i + j) as f64 * 0.71).cos())
}

#[test]
fn test_encode_yields_nhid_columns() {
    for (nvis, nhid) in [(1, 4), (4, 1), (9, 6), (16, 32)] {
        for act in ["linear", "sigmoid", "tanh", "rectifier", "softplus", "softmax"] {
            let ae = Autoencoder::<f64>::new(AutoencoderConfig::new(nvis, nhid).act_enc(act), 3u64)
                .unwrap();
            let h = ae.encode(&batch(7, nvis).into()).unwrap();
            assert_eq!(h.into_single().unwrap().dim(), (7, nhid), "act={act}");
        }
    }
}

#[test]
fn test_tied_decoder_is_transpose_through_training() {
    let mut ae = Autoencoder::<f64>::new(
        AutoencoderConfig::new(6, 4).act_enc("sigmoid").tied_weights(true).irange(0.4),
        77u64,
    )
    .unwrap();
    assert_eq!(ae.params().len(), 3);
    for step in 0..5 {
        let grads: Vec<ArrayD<f64>> = ae
            .params()
            .iter()
            .map(|p| p.value.mapv(|v| v * 0.5 + step as f64))
            .collect();
        sgd_step(&mut ae, &grads, 0.01).unwrap();
        assert_eq!(ae.decoder_weights().unwrap(), ae.weights().unwrap().t());
    }

    // writing straight through params_mut is seen by the decoder too
    for param in ae.params_mut() {
        if param.name == "W" {
            let mut value = param.value;
            value.fill(0.25);
        }
    }
    assert!(ae.decoder_weights().unwrap().iter().all(|&w| w == 0.25));
}

#[test]
fn test_untied_decoder_is_independent() {
    let mut ae = Autoencoder::<f64>::new(AutoencoderConfig::new(5, 3).irange(1.0), 8u64).unwrap();
    let names: Vec<_> = ae.params().iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["vb", "hb", "W", "Wprime"]);
    let decoder = ae.decoder_weights().unwrap().to_owned();
    assert_eq!(decoder.dim(), (3, 5));
    for param in ae.params_mut() {
        if param.name == "W" {
            let mut value = param.value;
            value.fill(0.0);
        }
    }
    assert_eq!(ae.decoder_weights().unwrap(), decoder);
}

#[test]
fn test_deferred_init_then_encode() {
    let mut ae =
        Autoencoder::<f64>::new(AutoencoderConfig::new(0, 5).act_enc("tanh"), 4u64).unwrap();
    assert!(!ae.is_initialized());
    ae.set_visible_size(3).unwrap();
    let h = ae.encode(&batch(2, 3).into()).unwrap();
    assert_eq!(h.into_single().unwrap().dim(), (2, 5));
    assert_eq!(
        ae.set_visible_size(3).unwrap_err(),
        AutoencoderError::AlreadyInitialized
    );
}

#[test]
fn test_l1_penalty_is_scaled_activation_sum() {
    let lambda = 0.037;
    let ae = Autoencoder::<f64>::new(
        AutoencoderConfig::new(4, 6)
            .act_enc("sigmoid")
            .regularization(Regularization::l1(lambda)),
        10u64,
    )
    .unwrap();
    let h = ae.encode_batch(&batch(5, 4)).unwrap();
    assert_relative_eq!(ae.compute_regularization(&h), lambda * h.sum(), max_relative = 1e-12);
}

#[test]
fn test_quadratic_penalty() {
    let reg = Regularization::from_solution("sqr_penalty", 0.0, 0.2, 3.0).unwrap();
    let h = Matrix::from_shape_vec((2, 2), vec![0.1, 0.3, 0.5, 0.7]).unwrap();
    let expected: f64 = 3.0
        * [0.1f64, 0.3, 0.5, 0.7]
            .iter()
            .map(|h| (h - 0.2).powi(2))
            .sum::<f64>();
    assert_relative_eq!(reg.compute(&h), expected, max_relative = 1e-12);
    assert_eq!(
        Regularization::<f64>::from_solution("dropout", 0.1, 0.0, 0.0).unwrap_err(),
        AutoencoderError::UnknownRegularization("dropout".into())
    );
}

#[test]
fn test_contracting_requires_elementwise_encoder() {
    assert!(matches!(
        ContractingAutoencoder::<f64>::new(AutoencoderConfig::new(5, 4).act_enc("softmax"), 1u64),
        Err(AutoencoderError::NonElementwiseActivation(_))
    ));
    let cae =
        ContractingAutoencoder::<f64>::new(AutoencoderConfig::new(5, 4).act_enc("sigmoid"), 1u64)
            .unwrap();
    assert!(cae.contraction_penalty_batch(&batch(3, 5)).unwrap() > 0.0);
}

#[test]
fn test_same_seed_is_bit_identical() {
    let config = AutoencoderConfig::<f64>::new(12, 7).act_enc("tanh").irange(0.3);
    let a = Autoencoder::new(config.clone(), 2024u64).unwrap();
    let b = Autoencoder::new(config.clone(), 2024u64).unwrap();
    for (pa, pb) in a.params().iter().zip(b.params().iter()) {
        assert_eq!(pa.name, pb.name);
        assert_eq!(pa.value, pb.value);
    }

    let corruptor: SharedCorruptor<f64> = std::rc::Rc::new(GaussianCorruptor::new(0.3).unwrap());
    let da = DenoisingAutoencoder::new(corruptor.clone(), config.clone(), 5u64).unwrap();
    let db = DenoisingAutoencoder::new(corruptor, config, 5u64).unwrap();
    let x = batch(3, 12);
    assert_eq!(
        da.reconstruct(&x.clone().into()).unwrap(),
        db.reconstruct(&x.into()).unwrap()
    );
}

#[test]
fn test_seed_and_seeded_generator_build_the_same_model() {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    let config = AutoencoderConfig::<f64>::new(9, 5).act_enc("sigmoid").irange(0.2);
    let seeded = Autoencoder::new(config.clone(), 42u64).unwrap();
    let passed = Autoencoder::new(config, &mut StdRng::seed_from_u64(42)).unwrap();
    assert_eq!(seeded.parameters(), passed.parameters());
}

#[test]
fn test_unsampleable_irange_is_an_error() {
    let err = Autoencoder::<f64>::new(AutoencoderConfig::new(4, 2).irange(f64::MAX), 1u64)
        .unwrap_err();
    assert!(matches!(err, AutoencoderError::InvalidRange(_)));
}
