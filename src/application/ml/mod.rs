pub mod predictor;
pub mod trainer;

pub use predictor::Predictor;
pub use trainer::{Trainer, TrainingConfig, TrainingOutcome};
