use super::initializer::glorot_uniform;
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Fully connected layer with linear activation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

pub struct DenseGrads {
    pub weights: Array2<f64>,
    pub bias: Array1<f64>,
}

impl Dense {
    pub fn new<R: Rng>(input_size: usize, output_size: usize, rng: &mut R) -> Self {
        Self {
            weights: glorot_uniform(input_size, output_size, input_size, output_size, rng),
            bias: Array1::zeros(output_size),
        }
    }

    pub fn output_size(&self) -> usize {
        self.bias.len()
    }

    pub fn param_count(&self) -> usize {
        self.weights.len() + self.bias.len()
    }

    pub fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        input.dot(&self.weights) + &self.bias
    }

    /// The forward input is the only state backprop needs, so the caller keeps it
    pub fn backward(&self, input: &Array2<f64>, grad_output: &Array2<f64>) -> (Array2<f64>, DenseGrads) {
        let grads = DenseGrads {
            weights: input.t().dot(grad_output),
            bias: grad_output.sum_axis(Axis(0)),
        };
        (grad_output.dot(&self.weights.t()), grads)
    }

    pub(crate) fn params_mut(&mut self) -> (&mut Array2<f64>, &mut Array1<f64>) {
        (&mut self.weights, &mut self.bias)
    }
}
