mod builder;
mod metrics;
mod model_trainer;
mod spec;
mod trainer;

pub use builder::TrainerBuilder;
pub use metrics::{EpochReport, TrainMetrics, count_correct};
pub use model_trainer::ModelTrainer;
pub use spec::{ActFnSpec, LossFnSpec, OptimizerSpec, TrainerSpec};
pub use trainer::Trainer;
