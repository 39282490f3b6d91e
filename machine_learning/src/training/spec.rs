use std::num::NonZeroUsize;

/// The hidden layer activation of a trainer's model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActFnSpec {
    Relu,
    Sigmoid { amp: f32 },
}

/// The optimizer of a trainer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptimizerSpec {
    Adam { learning_rate: f32 },
    GradientDescent { learning_rate: f32 },
}

/// The loss function of a trainer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossFnSpec {
    CrossEntropy,
    Mse,
}

/// The specification for a `Trainer`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainerSpec {
    /// Layer widths, input first and output last.
    pub layers: Vec<usize>,
    pub act_fn: ActFnSpec,
    pub optimizer: OptimizerSpec,
    pub loss: LossFnSpec,
    pub epochs: NonZeroUsize,
    pub batch_size: NonZeroUsize,
    pub seed: Option<u64>,
}
