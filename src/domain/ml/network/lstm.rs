//! Bidirectional LSTM with full backpropagation through time.
//!
//! Gate layout in the fused weight matrices is `[input, forget, candidate, output]`,
//! each `units` wide. Forward and backward directions are concatenated per step as
//! `[forward, backward]`.

use super::initializer::{glorot_uniform, sigmoid};
use ndarray::{Array1, Array2, Array3, Axis, s};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One recurrent direction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstmCell {
    /// `[input_dim, 4 * units]`
    kernel: Array2<f64>,
    /// `[units, 4 * units]`
    recurrent: Array2<f64>,
    /// `[4 * units]`
    bias: Array1<f64>,
    units: usize,
}

struct StepCache {
    input: Array2<f64>,
    h_prev: Array2<f64>,
    c_prev: Array2<f64>,
    i: Array2<f64>,
    f: Array2<f64>,
    g: Array2<f64>,
    o: Array2<f64>,
    tanh_c: Array2<f64>,
}

pub struct CellCache {
    steps: Vec<StepCache>,
}

pub struct LstmGrads {
    pub kernel: Array2<f64>,
    pub recurrent: Array2<f64>,
    pub bias: Array1<f64>,
}

impl LstmCell {
    pub fn new<R: Rng>(input_dim: usize, units: usize, rng: &mut R) -> Self {
        let mut bias = Array1::zeros(4 * units);
        // Forget gate starts open
        bias.slice_mut(s![units..2 * units]).fill(1.0);
        Self {
            kernel: glorot_uniform(input_dim, 4 * units, input_dim, 4 * units, rng),
            recurrent: glorot_uniform(units, 4 * units, units, 4 * units, rng),
            bias,
            units,
        }
    }

    pub fn units(&self) -> usize {
        self.units
    }

    pub fn param_count(&self) -> usize {
        self.kernel.len() + self.recurrent.len() + self.bias.len()
    }

    /// Runs the sequence in the given order, returning the hidden state after each step
    fn run(&self, sequence: &[Array2<f64>]) -> (Vec<Array2<f64>>, CellCache) {
        let h_units = self.units;
        let batch = sequence.first().map(|x| x.nrows()).unwrap_or(0);
        let mut h = Array2::<f64>::zeros((batch, h_units));
        let mut c = Array2::<f64>::zeros((batch, h_units));
        let mut outputs = Vec::with_capacity(sequence.len());
        let mut steps = Vec::with_capacity(sequence.len());

        for x in sequence {
            let z = x.dot(&self.kernel) + h.dot(&self.recurrent) + &self.bias;
            let i = z.slice(s![.., 0..h_units]).mapv(sigmoid);
            let f = z.slice(s![.., h_units..2 * h_units]).mapv(sigmoid);
            let g = z.slice(s![.., 2 * h_units..3 * h_units]).mapv(f64::tanh);
            let o = z.slice(s![.., 3 * h_units..]).mapv(sigmoid);

            let c_next = &f * &c + &i * &g;
            let tanh_c = c_next.mapv(f64::tanh);
            let h_next = &o * &tanh_c;

            steps.push(StepCache {
                input: x.clone(),
                h_prev: h,
                c_prev: c,
                i,
                f,
                g,
                o,
                tanh_c,
            });
            outputs.push(h_next.clone());
            h = h_next;
            c = c_next;
        }

        (outputs, CellCache { steps })
    }

    /// `grad_hidden[t]` is the loss gradient w.r.t. the hidden output of step `t`
    /// (in processing order). Returns input gradients in the same order.
    fn backprop(&self, cache: &CellCache, grad_hidden: &[Array2<f64>]) -> (Vec<Array2<f64>>, LstmGrads) {
        let h_units = self.units;
        let mut grads = LstmGrads {
            kernel: Array2::zeros(self.kernel.raw_dim()),
            recurrent: Array2::zeros(self.recurrent.raw_dim()),
            bias: Array1::zeros(self.bias.len()),
        };
        let mut grad_inputs = vec![Array2::<f64>::zeros((0, 0)); cache.steps.len()];

        let batch = cache.steps.first().map(|st| st.input.nrows()).unwrap_or(0);
        let mut dh_next = Array2::<f64>::zeros((batch, h_units));
        let mut dc_next = Array2::<f64>::zeros((batch, h_units));

        for (t, st) in cache.steps.iter().enumerate().rev() {
            let dh = &grad_hidden[t] + &dh_next;

            let d_o = &dh * &st.tanh_c;
            let dc = &dc_next + &(&dh * &st.o * &st.tanh_c.mapv(|v| 1.0 - v * v));
            let d_i = &dc * &st.g;
            let d_g = &dc * &st.i;
            let d_f = &dc * &st.c_prev;
            dc_next = &dc * &st.f;

            let mut dz = Array2::<f64>::zeros((batch, 4 * h_units));
            dz.slice_mut(s![.., 0..h_units])
                .assign(&(d_i * &st.i.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., h_units..2 * h_units])
                .assign(&(d_f * &st.f.mapv(|v| v * (1.0 - v))));
            dz.slice_mut(s![.., 2 * h_units..3 * h_units])
                .assign(&(d_g * &st.g.mapv(|v| 1.0 - v * v)));
            dz.slice_mut(s![.., 3 * h_units..])
                .assign(&(d_o * &st.o.mapv(|v| v * (1.0 - v))));

            grads.kernel += &st.input.t().dot(&dz);
            grads.recurrent += &st.h_prev.t().dot(&dz);
            grads.bias += &dz.sum_axis(Axis(0));

            grad_inputs[t] = dz.dot(&self.kernel.t());
            dh_next = dz.dot(&self.recurrent.t());
        }

        (grad_inputs, grads)
    }

    pub(crate) fn params_mut(
        &mut self,
    ) -> (&mut Array2<f64>, &mut Array2<f64>, &mut Array1<f64>) {
        (&mut self.kernel, &mut self.recurrent, &mut self.bias)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidirectionalLstm {
    forward: LstmCell,
    backward: LstmCell,
    return_sequences: bool,
}

pub struct BidirectionalCache {
    forward: CellCache,
    backward: CellCache,
    steps: usize,
}

pub struct BidirectionalGrads {
    pub forward: LstmGrads,
    pub backward: LstmGrads,
}

impl BidirectionalLstm {
    pub fn new<R: Rng>(input_dim: usize, units: usize, return_sequences: bool, rng: &mut R) -> Self {
        Self {
            forward: LstmCell::new(input_dim, units, rng),
            backward: LstmCell::new(input_dim, units, rng),
            return_sequences,
        }
    }

    pub fn output_dim(&self) -> usize {
        2 * self.forward.units()
    }

    pub fn returns_sequences(&self) -> bool {
        self.return_sequences
    }

    pub fn param_count(&self) -> usize {
        self.forward.param_count() + self.backward.param_count()
    }

    /// `[batch, steps, features]` in; `[batch, steps, 2 * units]` out when returning
    /// sequences, otherwise `[batch, 1, 2 * units]` holding both directions' final states.
    pub fn forward(&self, input: &Array3<f64>) -> (Array3<f64>, BidirectionalCache) {
        let (batch, steps, _) = input.dim();
        let units = self.forward.units();
        let sequence: Vec<Array2<f64>> = input.axis_iter(Axis(1)).map(|x| x.to_owned()).collect();
        let reversed: Vec<Array2<f64>> = sequence.iter().rev().cloned().collect();

        let (fwd_h, fwd_cache) = self.forward.run(&sequence);
        let (bwd_h, bwd_cache) = self.backward.run(&reversed);

        let output = if self.return_sequences {
            let mut out = Array3::<f64>::zeros((batch, steps, 2 * units));
            for t in 0..steps {
                out.slice_mut(s![.., t, ..units]).assign(&fwd_h[t]);
                out.slice_mut(s![.., t, units..]).assign(&bwd_h[steps - 1 - t]);
            }
            out
        } else {
            let mut out = Array3::<f64>::zeros((batch, 1, 2 * units));
            if steps > 0 {
                out.slice_mut(s![.., 0, ..units]).assign(&fwd_h[steps - 1]);
                out.slice_mut(s![.., 0, units..]).assign(&bwd_h[steps - 1]);
            }
            out
        };

        let cache = BidirectionalCache {
            forward: fwd_cache,
            backward: bwd_cache,
            steps,
        };
        (output, cache)
    }

    pub fn backward(
        &self,
        cache: &BidirectionalCache,
        grad_output: &Array3<f64>,
    ) -> (Array3<f64>, BidirectionalGrads) {
        let batch = grad_output.len_of(Axis(0));
        let units = self.forward.units();
        let steps = cache.steps;

        let mut grad_fwd = vec![Array2::<f64>::zeros((batch, units)); steps];
        let mut grad_bwd = vec![Array2::<f64>::zeros((batch, units)); steps];
        if self.return_sequences {
            for t in 0..steps {
                grad_fwd[t].assign(&grad_output.slice(s![.., t, ..units]));
                grad_bwd[steps - 1 - t].assign(&grad_output.slice(s![.., t, units..]));
            }
        } else if steps > 0 {
            grad_fwd[steps - 1].assign(&grad_output.slice(s![.., 0, ..units]));
            grad_bwd[steps - 1].assign(&grad_output.slice(s![.., 0, units..]));
        }

        let (dx_fwd, fwd_grads) = self.forward.backprop(&cache.forward, &grad_fwd);
        let (dx_bwd, bwd_grads) = self.backward.backprop(&cache.backward, &grad_bwd);

        let input_dim = self.forward.kernel.nrows();
        let mut grad_input = Array3::<f64>::zeros((batch, steps, input_dim));
        for t in 0..steps {
            let combined = &dx_fwd[t] + &dx_bwd[steps - 1 - t];
            grad_input.index_axis_mut(Axis(1), t).assign(&combined);
        }

        (
            grad_input,
            BidirectionalGrads {
                forward: fwd_grads,
                backward: bwd_grads,
            },
        )
    }

    pub(crate) fn cells_mut(&mut self) -> (&mut LstmCell, &mut LstmCell) {
        (&mut self.forward, &mut self.backward)
    }
}
