use std::rc::Rc;

use rand::prelude::*;
use rand_distr::Normal;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rust_dae::nn::{
    build_stacked_ae, BinomialCorruptor, Block, PerLayer, Regularization, SharedCorruptor,
    StackConfig,
};
use rust_dae::tensor::{Batched, Matrix, RngSource};
use rust_dae::Result;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut rng = StdRng::seed_from_u64(42);
    let normal = Normal::new(0.0, 1.0).expect("unit normal");
    let mut sample_batch =
        |rows: usize| Matrix::from_shape_simple_fn((rows, 10), || normal.sample(&mut rng));
    let inputs = Batched::sequence(vec![sample_batch(8), sample_batch(4)]);

    let corruptor: SharedCorruptor<f64> = Rc::new(BinomialCorruptor::new(0.25)?);
    let config = StackConfig::new(10, vec![8, 4, 2])
        .act_enc(PerLayer::all("sigmoid"))
        .act_dec(PerLayer::each(["sigmoid", "sigmoid", "linear"]))
        .tied_weights(PerLayer::each([true, false, false]))
        .irange(PerLayer::all(0.5))
        .corruptor(PerLayer::each([Some(corruptor), None, None]))
        .contracting(PerLayer::each([false, false, true]))
        .regularization(PerLayer::each([
            Regularization::None,
            Regularization::l1(1e-3),
            Regularization::None,
        ]));
    let stack = build_stacked_ae(config, RngSource::default())?;

    for (i, layer) in stack.iter().enumerate() {
        info!(layer = i, kind = layer.kind(), nvis = ?layer.nvis(), nhid = layer.nhid());
    }

    let representations = stack.upward_pass(&inputs)?;
    for (i, (layer, below)) in stack
        .iter()
        .zip(std::iter::once(&inputs).chain(representations.iter()))
        .enumerate()
    {
        let recs = layer.reconstruct(below)?;
        let error: f64 = recs
            .iter()
            .zip(below.iter())
            .map(|(rec, x)| (&rec.reconstruction - x).mapv(|d| d * d).sum())
            .sum();
        info!(
            layer = i,
            squared_error = error,
            regularization = recs.total_regularization(),
            "layer-wise reconstruction"
        );
        if let Some(cae) = layer.as_contracting() {
            let penalty: f64 = cae.contraction_penalty(below)?.iter().sum();
            info!(layer = i, penalty, "contraction penalty");
        }
    }

    let codes = stack.encode(&inputs)?;
    for code in codes.iter() {
        info!(shape = ?code.dim(), "code batch");
    }
    Ok(())
}
