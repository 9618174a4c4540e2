use ndarray::{Array, Dimension};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Inverted dropout: kept units are scaled by `1 / (1 - rate)` during training so
/// inference is the identity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Dropout {
    pub rate: f64,
}

impl Dropout {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    /// Returns the dropped-out activations and the mask to reuse in backprop
    pub fn forward_train<D: Dimension, R: Rng>(
        &self,
        input: &Array<f64, D>,
        rng: &mut R,
    ) -> (Array<f64, D>, Array<f64, D>) {
        if self.rate <= 0.0 {
            return (input.clone(), Array::ones(input.raw_dim()));
        }
        let keep = 1.0 - self.rate;
        let mask = Array::from_shape_simple_fn(input.raw_dim(), || {
            if rng.random::<f64>() < keep { 1.0 / keep } else { 0.0 }
        });
        (input * &mask, mask)
    }

    pub fn backward<D: Dimension>(mask: &Array<f64, D>, grad_output: &Array<f64, D>) -> Array<f64, D> {
        grad_output * mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_mask_values_and_rate() {
        let mut rng = StdRng::seed_from_u64(31);
        let dropout = Dropout::new(0.5);
        let input = Array2::<f64>::ones((100, 100));
        let (out, mask) = dropout.forward_train(&input, &mut rng);

        assert!(mask.iter().all(|m| *m == 0.0 || *m == 2.0));
        let kept = mask.iter().filter(|m| **m > 0.0).count() as f64 / 10_000.0;
        assert!((kept - 0.5).abs() < 0.05);
        assert_eq!(out, mask);
    }

    #[test]
    fn test_backward_applies_mask() {
        let mask = Array2::from_shape_vec((1, 3), vec![2.0, 0.0, 2.0]).unwrap();
        let grad = Array2::from_shape_vec((1, 3), vec![1.0, 5.0, -1.0]).unwrap();
        assert_eq!(Dropout::backward(&mask, &grad).iter().copied().collect::<Vec<f64>>(), vec![2.0, 0.0, -2.0]);
    }
}
