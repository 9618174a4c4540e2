use ndarray::Array2;
use rand::Rng;

/// Glorot/Xavier uniform: `U(-limit, limit)` with `limit = sqrt(6 / (fan_in + fan_out))`
pub fn glorot_uniform<R: Rng>(
    rows: usize,
    cols: usize,
    fan_in: usize,
    fan_out: usize,
    rng: &mut R,
) -> Array2<f64> {
    let limit = (6.0 / (fan_in + fan_out).max(1) as f64).sqrt();
    Array2::from_shape_fn((rows, cols), |_| rng.random_range(-limit..limit))
}

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

pub fn relu(x: f64) -> f64 {
    x.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_glorot_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let w = glorot_uniform(30, 20, 30, 20, &mut rng);
        let limit = (6.0f64 / 50.0).sqrt();
        assert_eq!(w.dim(), (30, 20));
        assert!(w.iter().all(|v| v.abs() <= limit));
        assert!(w.iter().any(|v| *v != 0.0));
    }

    #[test]
    fn test_activations() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert_eq!(relu(-2.0), 0.0);
        assert_eq!(relu(1.5), 1.5);
    }
}
