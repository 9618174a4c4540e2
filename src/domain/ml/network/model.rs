//! The forecast network: three Conv1D/MaxPool blocks, two bidirectional LSTMs with
//! dropout, and a linear head.
//!
//! Input is a batch of windows `[batch, window_len]`; output is one value per window.

use super::conv1d::{Conv1d, Conv1dCache, Conv1dGrads, ConvPadding};
use super::dense::{Dense, DenseGrads};
use super::dropout::Dropout;
use super::lstm::{BidirectionalCache, BidirectionalGrads, BidirectionalLstm};
use super::optimizer::Adam;
use super::pooling::{MaxPool1d, MaxPoolCache};
use crate::domain::errors::ForecastError;
use ndarray::{Array1, Array2, Array3, Axis, concatenate};
use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

pub const CONV_FILTERS: [usize; 3] = [64, 128, 64];
pub const KERNEL_SIZE: usize = 3;
pub const POOL_SIZE: usize = 2;
pub const LSTM_UNITS: usize = 100;
pub const DROPOUT_RATE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub window_len: usize,
    pub padding: ConvPadding,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            window_len: 100,
            padding: ConvPadding::Valid,
        }
    }
}

impl ModelConfig {
    pub fn new(window_len: usize, padding: ConvPadding) -> Self {
        Self { window_len, padding }
    }

    /// Steps left after each conv/pool block, starting with the raw window
    fn step_trace(window_len: usize, padding: ConvPadding) -> Vec<(usize, usize)> {
        let mut steps = window_len;
        let mut trace = Vec::with_capacity(CONV_FILTERS.len());
        for _ in CONV_FILTERS {
            let conv_steps = match padding {
                ConvPadding::Valid => (steps + 1).saturating_sub(KERNEL_SIZE),
                ConvPadding::Same => steps,
            };
            steps = conv_steps / POOL_SIZE;
            trace.push((conv_steps, steps));
        }
        trace
    }

    /// Steps reaching the flatten layer
    pub fn feature_steps(&self) -> usize {
        Self::step_trace(self.window_len, self.padding)
            .last()
            .map(|(_, pooled)| *pooled)
            .unwrap_or(0)
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_steps() * CONV_FILTERS[CONV_FILTERS.len() - 1]
    }

    pub fn min_window_len(padding: ConvPadding) -> usize {
        (1..)
            .find(|&len| {
                Self::step_trace(len, padding)
                    .last()
                    .is_some_and(|(_, pooled)| *pooled > 0)
            })
            .unwrap_or(usize::MAX)
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        let min = Self::min_window_len(self.padding);
        if self.window_len < min {
            return Err(ForecastError::WindowTooShort {
                window_len: self.window_len,
                min,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastModel {
    config: ModelConfig,
    convs: Vec<Conv1d>,
    pool: MaxPool1d,
    lstm_seq: BidirectionalLstm,
    lstm_last: BidirectionalLstm,
    dropout: Dropout,
    head: Dense,
}

/// Activations kept from a forward pass for backprop
pub struct ForwardCache {
    conv: Vec<(Conv1dCache, MaxPoolCache)>,
    pooled_shape: (usize, usize),
    lstm_seq: BidirectionalCache,
    seq_mask: Option<Array3<f64>>,
    lstm_last: BidirectionalCache,
    last_mask: Option<Array2<f64>>,
    head_input: Array2<f64>,
}

pub struct ModelGradients {
    conv: Vec<Conv1dGrads>,
    lstm_seq: BidirectionalGrads,
    lstm_last: BidirectionalGrads,
    head: DenseGrads,
}

impl ForecastModel {
    pub fn new<R: Rng>(config: ModelConfig, rng: &mut R) -> Result<Self, ForecastError> {
        config.validate()?;

        let mut in_channels = 1;
        let mut convs = Vec::with_capacity(CONV_FILTERS.len());
        for filters in CONV_FILTERS {
            convs.push(Conv1d::new(in_channels, filters, KERNEL_SIZE, config.padding, rng));
            in_channels = filters;
        }

        let lstm_seq = BidirectionalLstm::new(config.feature_dim(), LSTM_UNITS, true, rng);
        let lstm_last = BidirectionalLstm::new(lstm_seq.output_dim(), LSTM_UNITS, false, rng);
        let head = Dense::new(lstm_last.output_dim(), 1, rng);

        Ok(Self {
            config,
            convs,
            pool: MaxPool1d::new(POOL_SIZE),
            lstm_seq,
            lstm_last,
            dropout: Dropout::new(DROPOUT_RATE),
            head,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn window_len(&self) -> usize {
        self.config.window_len
    }

    pub fn param_count(&self) -> usize {
        self.convs.iter().map(Conv1d::param_count).sum::<usize>()
            + self.lstm_seq.param_count()
            + self.lstm_last.param_count()
            + self.head.param_count()
    }

    /// Training-mode forward pass (dropout active)
    pub fn forward_train<R: Rng>(&self, inputs: &Array2<f64>, rng: &mut R) -> (Array1<f64>, ForwardCache) {
        self.forward_with(inputs, Some(rng))
    }

    /// Inference-mode forward pass
    pub fn predict(&self, inputs: &Array2<f64>) -> Array1<f64> {
        self.forward_with(inputs, None::<&mut StdRng>).0
    }

    pub fn predict_batched(&self, inputs: &Array2<f64>, batch_size: usize) -> Array1<f64> {
        let parts: Vec<Array1<f64>> = inputs
            .axis_chunks_iter(Axis(0), batch_size.max(1))
            .map(|chunk| self.predict(&chunk.to_owned()))
            .collect();
        let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
        concatenate(Axis(0), &views).unwrap_or_else(|_| Array1::zeros(0))
    }

    fn forward_with<R: Rng>(
        &self,
        inputs: &Array2<f64>,
        mut rng: Option<&mut R>,
    ) -> (Array1<f64>, ForwardCache) {
        let batch = inputs.nrows();
        let mut x = inputs.clone().insert_axis(Axis(2));

        let mut conv_caches = Vec::with_capacity(self.convs.len());
        for conv in &self.convs {
            let (activated, conv_cache) = conv.forward(&x);
            let (pooled, pool_cache) = self.pool.forward(&activated);
            conv_caches.push((conv_cache, pool_cache));
            x = pooled;
        }

        // Flatten into a single-step sequence
        let (_, steps, channels) = x.dim();
        let flat = Array3::from_shape_fn((batch, 1, steps * channels), |(b, _, j)| {
            x[[b, j / channels, j % channels]]
        });

        let (seq_out, lstm_seq_cache) = self.lstm_seq.forward(&flat);
        let (seq_out, seq_mask) = match rng.as_deref_mut() {
            Some(r) => {
                let (dropped, mask) = self.dropout.forward_train(&seq_out, r);
                (dropped, Some(mask))
            }
            None => (seq_out, None),
        };

        let (last_out, lstm_last_cache) = self.lstm_last.forward(&seq_out);
        let last_out = last_out.index_axis_move(Axis(1), 0);
        let (head_input, last_mask) = match rng.as_deref_mut() {
            Some(r) => {
                let (dropped, mask) = self.dropout.forward_train(&last_out, r);
                (dropped, Some(mask))
            }
            None => (last_out, None),
        };

        let output = self.head.forward(&head_input).index_axis_move(Axis(1), 0);

        let cache = ForwardCache {
            conv: conv_caches,
            pooled_shape: (steps, channels),
            lstm_seq: lstm_seq_cache,
            seq_mask,
            lstm_last: lstm_last_cache,
            last_mask,
            head_input,
        };
        (output, cache)
    }

    /// Backpropagates `grad_output` (d loss / d prediction, one per sample)
    pub fn backward(&self, cache: &ForwardCache, grad_output: &Array1<f64>) -> ModelGradients {
        let grad = grad_output.clone().insert_axis(Axis(1));
        let (grad, head) = self.head.backward(&cache.head_input, &grad);
        let grad = match &cache.last_mask {
            Some(mask) => Dropout::backward(mask, &grad),
            None => grad,
        };

        let (grad, lstm_last) = self.lstm_last.backward(&cache.lstm_last, &grad.insert_axis(Axis(1)));
        let grad = match &cache.seq_mask {
            Some(mask) => Dropout::backward(mask, &grad),
            None => grad,
        };
        let (grad, lstm_seq) = self.lstm_seq.backward(&cache.lstm_seq, &grad);

        let batch = grad.len_of(Axis(0));
        let (steps, channels) = cache.pooled_shape;
        let mut grad = Array3::from_shape_fn((batch, steps, channels), |(b, t, c)| {
            grad[[b, 0, t * channels + c]]
        });

        let mut conv = Vec::with_capacity(self.convs.len());
        for (layer, (conv_cache, pool_cache)) in self.convs.iter().zip(&cache.conv).rev() {
            let pooled_grad = self.pool.backward(pool_cache, &grad);
            let (input_grad, grads) = layer.backward(conv_cache, &pooled_grad);
            conv.push(grads);
            grad = input_grad;
        }
        conv.reverse();

        ModelGradients {
            conv,
            lstm_seq,
            lstm_last,
            head,
        }
    }

    /// One Adam step over every parameter tensor
    pub fn apply_gradients(&mut self, grads: &ModelGradients, optimizer: &mut Adam) {
        let mut step = optimizer.step();

        for (layer, g) in self.convs.iter_mut().zip(&grads.conv) {
            let (kernel, bias) = layer.params_mut();
            step.update(kernel, &g.kernel);
            step.update(bias, &g.bias);
        }

        for (layer, g) in [
            (&mut self.lstm_seq, &grads.lstm_seq),
            (&mut self.lstm_last, &grads.lstm_last),
        ] {
            let (forward, backward) = layer.cells_mut();
            for (cell, cell_grads) in [(forward, &g.forward), (backward, &g.backward)] {
                let (kernel, recurrent, bias) = cell.params_mut();
                step.update(kernel, &cell_grads.kernel);
                step.update(recurrent, &cell_grads.recurrent);
                step.update(bias, &cell_grads.bias);
            }
        }

        let (weights, bias) = self.head.params_mut();
        step.update(weights, &grads.head.weights);
        step.update(bias, &grads.head.bias);
    }

    /// Layer table: name, output shape, parameter count
    pub fn summary(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "{:<28}{:<22}{:>10}",
            "Layer (type)", "Output Shape", "Param #"
        )];
        let row = |name: String, shape: String, params: usize| {
            format!("{:<28}{:<22}{:>10}", name, shape, params)
        };

        let trace = ModelConfig::step_trace(self.config.window_len, self.config.padding);
        for (idx, (conv, (conv_steps, pooled_steps))) in self.convs.iter().zip(trace).enumerate() {
            lines.push(row(
                format!("conv1d_{} (Conv1D)", idx + 1),
                format!("(None, {}, {})", conv_steps, conv.filters()),
                conv.param_count(),
            ));
            lines.push(row(
                format!("max_pooling1d_{} (MaxPool1D)", idx + 1),
                format!("(None, {}, {})", pooled_steps, conv.filters()),
                0,
            ));
        }

        lines.push(row(
            "flatten (Flatten)".to_string(),
            format!("(None, 1, {})", self.config.feature_dim()),
            0,
        ));
        lines.push(row(
            "bidirectional_1 (BiLSTM)".to_string(),
            format!("(None, 1, {})", self.lstm_seq.output_dim()),
            self.lstm_seq.param_count(),
        ));
        lines.push(row(
            "dropout_1 (Dropout)".to_string(),
            format!("(None, 1, {})", self.lstm_seq.output_dim()),
            0,
        ));
        lines.push(row(
            "bidirectional_2 (BiLSTM)".to_string(),
            format!("(None, {})", self.lstm_last.output_dim()),
            self.lstm_last.param_count(),
        ));
        lines.push(row(
            "dropout_2 (Dropout)".to_string(),
            format!("(None, {})", self.lstm_last.output_dim()),
            0,
        ));
        lines.push(row(
            "dense (Dense)".to_string(),
            format!("(None, {})", self.head.output_size()),
            self.head.param_count(),
        ));
        lines.push(format!("Total params: {}", self.param_count()));
        lines
    }
}

/// Mean squared error and its gradient with respect to `predicted`
pub fn mse_loss(predicted: &Array1<f64>, target: &Array1<f64>) -> (f64, Array1<f64>) {
    let n = predicted.len().max(1) as f64;
    let diff = predicted - target;
    let loss = diff.mapv(|d| d * d).sum() / n;
    (loss, diff * (2.0 / n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn small_batch(rng: &mut StdRng, batch: usize, window_len: usize) -> Array2<f64> {
        Array2::from_shape_fn((batch, window_len), |(_, j)| {
            j as f64 * 0.01 + rng.random_range(-0.05..0.05)
        })
    }

    #[test]
    fn test_min_window_len() {
        assert_eq!(ModelConfig::min_window_len(ConvPadding::Valid), 22);
        assert_eq!(ModelConfig::min_window_len(ConvPadding::Same), 8);
        assert_eq!(ModelConfig::default().feature_steps(), 10);
        assert_eq!(ModelConfig::new(10, ConvPadding::Same).feature_steps(), 1);
    }

    #[test]
    fn test_rejects_short_window() {
        let mut rng = StdRng::seed_from_u64(40);
        let err = ForecastModel::new(ModelConfig::new(10, ConvPadding::Valid), &mut rng).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::WindowTooShort {
                window_len: 10,
                min: 22
            }
        ));
    }

    #[test]
    fn test_predict_shape_and_determinism() {
        let mut rng = StdRng::seed_from_u64(41);
        let model = ForecastModel::new(ModelConfig::new(10, ConvPadding::Same), &mut rng).unwrap();
        let inputs = small_batch(&mut rng, 5, 10);
        let first = model.predict(&inputs);
        assert_eq!(first.len(), 5);
        assert!(first.iter().all(|v| v.is_finite()));
        assert_eq!(first, model.predict(&inputs));
        let batched = model.predict_batched(&inputs, 2);
        assert_eq!(batched.len(), 5);
        for (a, b) in batched.iter().zip(first.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_summary_lists_every_layer() {
        let mut rng = StdRng::seed_from_u64(42);
        let model = ForecastModel::new(ModelConfig::default(), &mut rng).unwrap();
        let summary = model.summary();
        // header + 6 conv/pool + flatten + 4 recurrent/dropout + dense + total
        assert_eq!(summary.len(), 14);
        assert!(summary[1].contains("(None, 98, 64)"));
        assert!(summary.last().unwrap().ends_with(&model.param_count().to_string()));
    }

    #[test]
    fn test_gradients_match_finite_differences() {
        let mut rng = StdRng::seed_from_u64(43);
        let model = ForecastModel::new(ModelConfig::new(10, ConvPadding::Same), &mut rng).unwrap();
        let inputs = small_batch(&mut rng, 2, 10);
        let targets = Array1::from_vec(vec![0.3, -0.2]);

        let loss = |m: &ForecastModel| mse_loss(&m.predict(&inputs), &targets).0;
        let (pred, cache) = model.forward_with(&inputs, None::<&mut StdRng>);
        let (_, grad) = mse_loss(&pred, &targets);
        let grads = model.backward(&cache, &grad);

        let eps = 1e-6;
        let close = |numeric: f64, analytic: f64| (numeric - analytic).abs() <= 1e-6 + 1e-3 * analytic.abs();

        for row in [0, 7, 150] {
            let mut plus = model.clone();
            plus.head.params_mut().0[[row, 0]] += eps;
            let mut minus = model.clone();
            minus.head.params_mut().0[[row, 0]] -= eps;
            let numeric = (loss(&plus) - loss(&minus)) / (2.0 * eps);
            assert!(close(numeric, grads.head.weights[[row, 0]]));
        }

        for (r, c) in [(0, 3), (40, 250)] {
            let mut plus = model.clone();
            plus.lstm_seq.cells_mut().0.params_mut().0[[r, c]] += eps;
            let mut minus = model.clone();
            minus.lstm_seq.cells_mut().0.params_mut().0[[r, c]] -= eps;
            let numeric = (loss(&plus) - loss(&minus)) / (2.0 * eps);
            assert!(close(numeric, grads.lstm_seq.forward.kernel[[r, c]]));
        }

        let mut plus = model.clone();
        plus.convs[2].params_mut().1[5] += eps;
        let mut minus = model.clone();
        minus.convs[2].params_mut().1[5] -= eps;
        let numeric = (loss(&plus) - loss(&minus)) / (2.0 * eps);
        assert!(close(numeric, grads.conv[2].bias[5]));
    }

    #[test]
    fn test_training_steps_reduce_loss() {
        let mut rng = StdRng::seed_from_u64(44);
        let mut model = ForecastModel::new(ModelConfig::new(10, ConvPadding::Same), &mut rng).unwrap();
        let inputs = small_batch(&mut rng, 8, 10);
        let targets = inputs.column(9).mapv(|v| v * 1.1);
        let mut adam = Adam::new(0.001);

        let before = mse_loss(&model.predict(&inputs), &targets).0;
        for _ in 0..30 {
            let (pred, cache) = model.forward_with(&inputs, None::<&mut StdRng>);
            let (_, grad) = mse_loss(&pred, &targets);
            let grads = model.backward(&cache, &grad);
            model.apply_gradients(&grads, &mut adam);
        }
        let after = mse_loss(&model.predict(&inputs), &targets).0;
        assert!(after < before);
    }

    #[test]
    fn test_mse_loss() {
        let (loss, grad) = mse_loss(&Array1::from_vec(vec![1.0, 3.0]), &Array1::from_vec(vec![0.0, 1.0]));
        assert_eq!(loss, 2.5);
        assert_eq!(grad.to_vec(), vec![1.0, 2.0]);
    }
}
