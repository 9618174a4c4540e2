use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// Max pooling over steps with stride equal to the pool size. Trailing steps that do
/// not fill a whole pool are dropped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MaxPool1d {
    pub pool_size: usize,
}

pub struct MaxPoolCache {
    /// Input step that won each output cell
    argmax: Array3<usize>,
    input_steps: usize,
}

impl MaxPool1d {
    pub fn new(pool_size: usize) -> Self {
        Self { pool_size }
    }

    pub fn output_steps(&self, input_steps: usize) -> usize {
        input_steps / self.pool_size
    }

    pub fn forward(&self, input: &Array3<f64>) -> (Array3<f64>, MaxPoolCache) {
        let (batch, input_steps, channels) = input.dim();
        let shape = (batch, self.output_steps(input_steps), channels);
        let mut output = Array3::<f64>::zeros(shape);
        let mut argmax = Array3::<usize>::zeros(shape);

        for ((b, t, c), out) in output.indexed_iter_mut() {
            let start = t * self.pool_size;
            let mut best = start;
            for step in start + 1..start + self.pool_size {
                if input[[b, step, c]] > input[[b, best, c]] {
                    best = step;
                }
            }
            *out = input[[b, best, c]];
            argmax[[b, t, c]] = best;
        }

        (output, MaxPoolCache { argmax, input_steps })
    }

    pub fn backward(&self, cache: &MaxPoolCache, grad_output: &Array3<f64>) -> Array3<f64> {
        let (batch, _, channels) = grad_output.dim();
        let mut grad_input = Array3::<f64>::zeros((batch, cache.input_steps, channels));
        for ((b, t, c), g) in grad_output.indexed_iter() {
            grad_input[[b, cache.argmax[[b, t, c]], c]] += g;
        }
        grad_input
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_takes_pairwise_max_and_drops_tail() {
        let pool = MaxPool1d::new(2);
        let input =
            Array3::from_shape_vec((1, 5, 1), vec![1.0, 3.0, -2.0, -5.0, 9.0]).unwrap();
        let (out, _) = pool.forward(&input);
        assert_eq!(out.shape(), &[1, 2, 1]);
        assert_eq!(out.iter().copied().collect::<Vec<_>>(), vec![3.0, -2.0]);
    }

    #[test]
    fn test_backward_routes_to_winner() {
        let pool = MaxPool1d::new(2);
        let input = Array3::from_shape_vec((1, 4, 1), vec![1.0, 3.0, 4.0, 2.0]).unwrap();
        let (_, cache) = pool.forward(&input);
        let grad = Array3::from_shape_vec((1, 2, 1), vec![0.5, -1.0]).unwrap();
        let back = pool.backward(&cache, &grad);
        assert_eq!(back.iter().copied().collect::<Vec<_>>(), vec![0.0, 0.5, -1.0, 0.0]);
    }
}
