//! Hand-written layers with analytical backprop, assembled into the forecast network

pub mod conv1d;
pub mod dense;
pub mod dropout;
pub mod initializer;
pub mod lstm;
pub mod model;
pub mod optimizer;
pub mod pooling;

pub use conv1d::ConvPadding;
pub use model::{ForecastModel, ForwardCache, ModelConfig, ModelGradients, mse_loss};
pub use optimizer::Adam;
