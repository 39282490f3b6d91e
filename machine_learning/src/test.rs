#![cfg(test)]

use std::num::NonZeroUsize;

use ndarray::arr2;

use crate::{
    dataset::Dataset,
    training::{ActFnSpec, EpochReport, LossFnSpec, OptimizerSpec, TrainerBuilder, TrainerSpec},
};

fn and2() -> Dataset {
    let x = arr2(&[[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]]);
    let y = arr2(&[[0.0], [0.0], [0.0], [1.0]]);
    Dataset::new(x, y).unwrap()
}

fn train_and2(spec: &TrainerSpec) -> (Vec<EpochReport>, f64, f64) {
    let mut trainer = TrainerBuilder::new().build(spec, and2(), None).unwrap();

    let mut reports = Vec::new();
    let metrics = trainer.train(&mut |report| reports.push(report)).unwrap();
    (reports, metrics.loss, metrics.accuracy)
}

#[test]
fn test_ml_and2_gate_convergence() {
    let spec = TrainerSpec {
        layers: vec![2, 1],
        act_fn: ActFnSpec::Sigmoid { amp: 1.0 },
        optimizer: OptimizerSpec::GradientDescent { learning_rate: 0.1 },
        loss: LossFnSpec::Mse,
        epochs: NonZeroUsize::new(2000).unwrap(),
        batch_size: NonZeroUsize::new(4).unwrap(),
        seed: Some(42),
    };

    let (reports, loss, accuracy) = train_and2(&spec);

    assert_eq!(reports.len(), 2000);
    assert_eq!(reports[0].epoch, 1);
    assert_eq!(reports[1999].epochs, 2000);
    assert!(reports[1999].loss < reports[0].loss);
    assert!(loss < 0.1, "loss: {loss}");
    assert_eq!(accuracy, 100.0);
}

#[test]
fn test_ml_and2_gate_classifier() {
    let spec = TrainerSpec {
        layers: vec![2, 2],
        act_fn: ActFnSpec::Relu,
        optimizer: OptimizerSpec::Adam { learning_rate: 0.1 },
        loss: LossFnSpec::CrossEntropy,
        epochs: NonZeroUsize::new(500).unwrap(),
        batch_size: NonZeroUsize::new(4).unwrap(),
        seed: Some(7),
    };

    let (reports, _, accuracy) = train_and2(&spec);

    assert!(reports.last().unwrap().loss < reports[0].loss);
    assert_eq!(accuracy, 100.0);
}
