use comms::Snapshot;
use rand::{SeedableRng, rngs::StdRng};

use super::{
    ActFnSpec, LossFnSpec, ModelTrainer, OptimizerSpec, Trainer, TrainerSpec,
};
use crate::{
    MlErr, Result,
    arch::{
        Model, Sequential,
        activations::ActFn,
        loss::{CrossEntropy, LossFn, Mse},
    },
    dataset::Dataset,
    initialization,
    optimization::{Adam, GradientDescent, Optimizer},
};

/// Builds `Trainer`s given a specification.
#[derive(Default)]
pub struct TrainerBuilder;

impl TrainerBuilder {
    /// Creates a new `TrainerBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds a new `Trainer` following a spec.
    ///
    /// # Arguments
    /// * `spec` - The specification for the trainer.
    /// * `dataset` - The data the trainer will fit, class-index targets get one-hot encoded.
    /// * `init` - Parameters to start from, xavier initialized when absent.
    ///
    /// # Errors
    /// If the architecture is invalid, the dataset doesn't fit it or `init` is missing
    /// any of the model's tensors.
    pub fn build(
        &self,
        spec: &TrainerSpec,
        dataset: Dataset,
        init: Option<&Snapshot>,
    ) -> Result<Box<dyn Trainer>> {
        self.resolve_model(spec, dataset, init)
    }

    fn resolve_model(
        &self,
        spec: &TrainerSpec,
        dataset: Dataset,
        init: Option<&Snapshot>,
    ) -> Result<Box<dyn Trainer>> {
        let model = Sequential::mlp(&spec.layers, self.resolve_act_fn(spec.act_fn))?;
        let dataset = self.fit_dataset(&model, dataset)?;

        let mut rng = self.generate_rng(spec.seed);
        let params = match init {
            Some(snapshot) => model.params_from_snapshot(snapshot)?,
            None => initialization::xavier_uniform(&model, &mut rng)?,
        };

        self.resolve_optimizer(spec, model, params, dataset, rng)
    }

    fn resolve_act_fn(&self, spec: ActFnSpec) -> ActFn {
        match spec {
            ActFnSpec::Relu => ActFn::relu(),
            ActFnSpec::Sigmoid { amp } => ActFn::sigmoid(amp),
        }
    }

    /// Checks the dataset widths against the model, one-hot encoding single
    /// column targets of classifiers.
    fn fit_dataset(&self, model: &Sequential, dataset: Dataset) -> Result<Dataset> {
        if dataset.x_size() != model.input_size() {
            return Err(MlErr::SizeMismatch {
                what: "dataset input columns",
                got: dataset.x_size(),
                expected: model.input_size(),
            });
        }

        let outputs = model.output_size();
        let dataset = if dataset.y_size() == 1 && outputs > 1 {
            dataset.one_hot(outputs)?
        } else {
            dataset
        };

        if dataset.y_size() != outputs {
            return Err(MlErr::SizeMismatch {
                what: "dataset target columns",
                got: dataset.y_size(),
                expected: outputs,
            });
        }

        Ok(dataset)
    }

    fn resolve_optimizer<M>(
        &self,
        spec: &TrainerSpec,
        model: M,
        params: Vec<f32>,
        dataset: Dataset,
        rng: StdRng,
    ) -> Result<Box<dyn Trainer>>
    where
        M: Model + 'static,
    {
        match spec.optimizer {
            OptimizerSpec::Adam { learning_rate } => {
                let optimizer = Adam::with_defaults(model.size(), learning_rate);
                self.resolve_loss(spec, model, params, optimizer, dataset, rng)
            }
            OptimizerSpec::GradientDescent { learning_rate } => {
                let optimizer = GradientDescent::new(learning_rate);
                self.resolve_loss(spec, model, params, optimizer, dataset, rng)
            }
        }
    }

    fn resolve_loss<M, O>(
        &self,
        spec: &TrainerSpec,
        model: M,
        params: Vec<f32>,
        optimizer: O,
        dataset: Dataset,
        rng: StdRng,
    ) -> Result<Box<dyn Trainer>>
    where
        M: Model + 'static,
        O: Optimizer + 'static,
    {
        match spec.loss {
            LossFnSpec::CrossEntropy => {
                let loss = CrossEntropy::new();
                self.terminate_build(spec, model, params, optimizer, loss, dataset, rng)
            }
            LossFnSpec::Mse => {
                let loss = Mse::new();
                self.terminate_build(spec, model, params, optimizer, loss, dataset, rng)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn terminate_build<M, O, L>(
        &self,
        spec: &TrainerSpec,
        model: M,
        params: Vec<f32>,
        optimizer: O,
        loss: L,
        dataset: Dataset,
        rng: StdRng,
    ) -> Result<Box<dyn Trainer>>
    where
        M: Model + 'static,
        O: Optimizer + 'static,
        L: LossFn + 'static,
    {
        let trainer = ModelTrainer::new(
            model,
            params,
            optimizer,
            dataset,
            spec.epochs,
            spec.batch_size,
            loss,
            rng,
        )?;

        Ok(Box::new(trainer))
    }

    fn generate_rng(&self, seed: Option<u64>) -> StdRng {
        match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use ndarray::arr2;

    use super::*;

    fn spec(layers: Vec<usize>) -> TrainerSpec {
        TrainerSpec {
            layers,
            act_fn: ActFnSpec::Relu,
            optimizer: OptimizerSpec::Adam {
                learning_rate: 0.01,
            },
            loss: LossFnSpec::CrossEntropy,
            epochs: NonZeroUsize::MIN,
            batch_size: NonZeroUsize::new(2).unwrap(),
            seed: Some(1),
        }
    }

    fn dataset() -> Dataset {
        let x = arr2(&[[0., 1.], [1., 0.], [1., 1.]]);
        let y = arr2(&[[0.], [1.], [2.]]);
        Dataset::new(x, y).unwrap()
    }

    #[test]
    fn builds_a_trainer_with_named_snapshot() {
        let trainer = TrainerBuilder::new()
            .build(&spec(vec![2, 4, 3]), dataset(), None)
            .unwrap();

        let snapshot = trainer.snapshot().unwrap();
        let names: Vec<_> = snapshot.names().collect();
        assert_eq!(names, ["fc1.weight", "fc1.bias", "fc2.weight", "fc2.bias"]);
    }

    #[test]
    fn rejects_dataset_of_the_wrong_width() {
        let err = TrainerBuilder::new()
            .build(&spec(vec![3, 3]), dataset(), None)
            .err()
            .unwrap();

        assert!(matches!(err, MlErr::SizeMismatch { got: 2, expected: 3, .. }));
    }

    #[test]
    fn starts_from_the_given_snapshot() {
        let builder = TrainerBuilder::new();
        let first = builder.build(&spec(vec![2, 3]), dataset(), None).unwrap();
        let init = first.snapshot().unwrap();

        let second = builder
            .build(&spec(vec![2, 3]), dataset(), Some(&init))
            .unwrap();
        assert_eq!(second.snapshot().unwrap(), init);
    }
}
