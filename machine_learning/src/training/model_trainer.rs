use std::num::NonZeroUsize;

use comms::Snapshot;
use rand::Rng;

use super::{EpochReport, TrainMetrics, Trainer, count_correct};
use crate::{
    MlErr, Result,
    arch::{Model, loss::LossFn},
    dataset::Dataset,
    optimization::Optimizer,
};

/// A model `Trainer`. Contains the relevant components needed for training a model,
/// including the model itself and its flat parameters.
pub struct ModelTrainer<M, O, L, R>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    model: M,
    params: Vec<f32>,
    grad: Vec<f32>,
    optimizer: O,
    loss_fn: L,
    dataset: Dataset,

    epochs: NonZeroUsize,
    batch_size: NonZeroUsize,
    rng: R,
}

impl<M, O, L, R> ModelTrainer<M, O, L, R>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    /// Returns a new `ModelTrainer`.
    ///
    /// # Arguments
    /// * `model` - The model that will be trained.
    /// * `params` - The initial parameters, laid out as `model.param_specs()`.
    /// * `optimizer` - The optimizer used on every batch.
    /// * `dataset` - The data the model will be trained with (the local shard).
    /// * `epochs` - The amount of passes over the dataset per `train` call.
    /// * `batch_size` - The amount of rows per gradient step.
    /// * `loss_fn` - The loss function used to measure the difference between a model's output and the expected one.
    /// * `rng` - A random number generator, used to shuffle the dataset every epoch.
    ///
    /// # Errors
    /// `MlErr::SizeMismatch` if `params` doesn't fit the model.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: M,
        params: Vec<f32>,
        optimizer: O,
        dataset: Dataset,
        epochs: NonZeroUsize,
        batch_size: NonZeroUsize,
        loss_fn: L,
        rng: R,
    ) -> Result<Self> {
        if params.len() != model.size() {
            return Err(MlErr::SizeMismatch {
                what: "initial params",
                got: params.len(),
                expected: model.size(),
            });
        }

        Ok(Self {
            grad: vec![0.0; model.size()],
            model,
            params,
            optimizer,
            loss_fn,
            dataset,
            epochs,
            batch_size,
            rng,
        })
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Percentage of the local dataset the model currently predicts correctly.
    pub fn accuracy(&mut self) -> Result<f64> {
        if self.dataset.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        let mut correct = 0;
        for (x, y) in self.dataset.batches(self.batch_size) {
            let y_pred = self.model.forward(&self.params, x)?;
            correct += count_correct(y_pred.view(), y);
        }

        Ok(100.0 * correct as f64 / self.dataset.len() as f64)
    }
}

impl<M, O, L, R> Trainer for ModelTrainer<M, O, L, R>
where
    M: Model,
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    fn train(&mut self, progress: &mut dyn FnMut(EpochReport)) -> Result<TrainMetrics> {
        let epochs = self.epochs.get();
        let mut loss = 0.0;

        for epoch in 1..=epochs {
            self.dataset.shuffle(&mut self.rng);
            let batches = self.dataset.batches(self.batch_size);

            loss = self.model.backprop(
                &mut self.params,
                &mut self.grad,
                &self.loss_fn,
                &mut self.optimizer,
                batches,
            )?;

            log::debug!(epoch = epoch, loss = loss; "epoch finished");
            progress(EpochReport {
                epoch,
                epochs,
                loss,
            });
        }

        Ok(TrainMetrics {
            loss: loss as f64,
            accuracy: self.accuracy()?,
        })
    }

    fn snapshot(&self) -> Result<Snapshot> {
        self.model.snapshot(&self.params)
    }
}
