//! 1-D convolution with ReLU, computed via im2col.
//!
//! Tensors are `[batch, steps, channels]`. The kernel is stored flattened as
//! `[kernel_size * in_channels, filters]`, row index `offset * in_channels + channel`.

use super::initializer::{glorot_uniform, relu};
use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConvPadding {
    /// No padding; output shrinks by `kernel_size - 1`
    #[default]
    Valid,
    /// Zero padding that keeps the step count
    Same,
}

impl FromStr for ConvPadding {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "valid" => Ok(ConvPadding::Valid),
            "same" => Ok(ConvPadding::Same),
            _ => anyhow::bail!("Invalid conv padding: {}. Must be 'valid' or 'same'", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conv1d {
    kernel: Array2<f64>,
    bias: Array1<f64>,
    kernel_size: usize,
    in_channels: usize,
    padding: ConvPadding,
}

pub struct Conv1dCache {
    columns: Vec<Array2<f64>>,
    activated: Array3<f64>,
    input_steps: usize,
}

pub struct Conv1dGrads {
    pub kernel: Array2<f64>,
    pub bias: Array1<f64>,
}

impl Conv1d {
    pub fn new<R: Rng>(
        in_channels: usize,
        filters: usize,
        kernel_size: usize,
        padding: ConvPadding,
        rng: &mut R,
    ) -> Self {
        let rows = kernel_size * in_channels;
        Self {
            kernel: glorot_uniform(rows, filters, rows, kernel_size * filters, rng),
            bias: Array1::zeros(filters),
            kernel_size,
            in_channels,
            padding,
        }
    }

    pub fn filters(&self) -> usize {
        self.bias.len()
    }

    pub fn param_count(&self) -> usize {
        self.kernel.len() + self.bias.len()
    }

    pub fn output_steps(&self, input_steps: usize) -> usize {
        match self.padding {
            ConvPadding::Valid => (input_steps + 1).saturating_sub(self.kernel_size),
            ConvPadding::Same => input_steps,
        }
    }

    fn pad_left(&self) -> usize {
        match self.padding {
            ConvPadding::Valid => 0,
            ConvPadding::Same => (self.kernel_size - 1) / 2,
        }
    }

    /// Input position read by output step `t` at kernel `offset`, or None inside the padding
    fn source_step(&self, t: usize, offset: usize, input_steps: usize) -> Option<usize> {
        let padded = t + offset;
        let pad = self.pad_left();
        if padded < pad || padded - pad >= input_steps {
            None
        } else {
            Some(padded - pad)
        }
    }

    fn im2col(&self, sample: ArrayView2<f64>) -> Array2<f64> {
        let input_steps = sample.nrows();
        let channels = self.in_channels;
        Array2::from_shape_fn(
            (self.output_steps(input_steps), self.kernel_size * channels),
            |(t, idx)| match self.source_step(t, idx / channels, input_steps) {
                Some(step) => sample[[step, idx % channels]],
                None => 0.0,
            },
        )
    }

    pub fn forward(&self, input: &Array3<f64>) -> (Array3<f64>, Conv1dCache) {
        let (batch, input_steps, _) = input.dim();
        let out_steps = self.output_steps(input_steps);

        let columns: Vec<Array2<f64>> = (0..batch)
            .into_par_iter()
            .map(|b| self.im2col(input.index_axis(Axis(0), b)))
            .collect();

        let mut activated = Array3::<f64>::zeros((batch, out_steps, self.filters()));
        for (b, cols) in columns.iter().enumerate() {
            let z = cols.dot(&self.kernel) + &self.bias;
            activated.index_axis_mut(Axis(0), b).assign(&z.mapv(relu));
        }

        let cache = Conv1dCache {
            columns,
            activated: activated.clone(),
            input_steps,
        };
        (activated, cache)
    }

    pub fn backward(
        &self,
        cache: &Conv1dCache,
        grad_output: &Array3<f64>,
    ) -> (Array3<f64>, Conv1dGrads) {
        let batch = grad_output.len_of(Axis(0));
        let channels = self.in_channels;
        let input_steps = cache.input_steps;

        // ReLU passes gradient only where the activation was positive
        let delta = grad_output * &cache.activated.mapv(|a| if a > 0.0 { 1.0 } else { 0.0 });

        let per_sample: Vec<(Array2<f64>, Array1<f64>, Array2<f64>)> = (0..batch)
            .into_par_iter()
            .map(|b| {
                let d = delta.index_axis(Axis(0), b);
                let kernel_grad = cache.columns[b].t().dot(&d);
                let bias_grad = d.sum_axis(Axis(0));
                let col_grad = d.dot(&self.kernel.t());

                let mut input_grad = Array2::<f64>::zeros((input_steps, channels));
                for (t, row) in col_grad.rows().into_iter().enumerate() {
                    for (idx, g) in row.iter().enumerate() {
                        if let Some(step) = self.source_step(t, idx / channels, input_steps) {
                            input_grad[[step, idx % channels]] += g;
                        }
                    }
                }
                (kernel_grad, bias_grad, input_grad)
            })
            .collect();

        let mut grads = Conv1dGrads {
            kernel: Array2::zeros(self.kernel.raw_dim()),
            bias: Array1::zeros(self.bias.len()),
        };
        let mut grad_input = Array3::<f64>::zeros((batch, input_steps, channels));
        for (b, (kernel_grad, bias_grad, input_grad)) in per_sample.into_iter().enumerate() {
            grads.kernel += &kernel_grad;
            grads.bias += &bias_grad;
            grad_input.index_axis_mut(Axis(0), b).assign(&input_grad);
        }

        (grad_input, grads)
    }

    pub(crate) fn params_mut(&mut self) -> (&mut Array2<f64>, &mut Array1<f64>) {
        (&mut self.kernel, &mut self.bias)
    }
}
