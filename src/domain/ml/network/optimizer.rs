//! Adam with bias correction folded into the step size and
//! epsilon added outside the square root.

use ndarray::{Array, ArrayD, Dimension, Zip};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adam {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
    #[serde(skip)]
    t: i32,
    /// First and second moments, one entry per parameter tensor in visiting order
    #[serde(skip)]
    moments: Vec<(ArrayD<f64>, ArrayD<f64>)>,
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(0.001)
    }
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            t: 0,
            moments: Vec::new(),
        }
    }

    pub fn iterations(&self) -> i32 {
        self.t
    }

    /// Starts one optimisation step. Parameters must be visited in the same order
    /// on every step so each keeps its own moment slot.
    pub fn step(&mut self) -> AdamStep<'_> {
        self.t += 1;
        AdamStep { adam: self, slot: 0 }
    }

    pub fn reset(&mut self) {
        self.t = 0;
        self.moments.clear();
    }
}

pub struct AdamStep<'a> {
    adam: &'a mut Adam,
    slot: usize,
}

impl AdamStep<'_> {
    pub fn update<D: Dimension>(&mut self, param: &mut Array<f64, D>, grad: &Array<f64, D>) {
        let slot = self.slot;
        self.slot += 1;

        let beta1 = self.adam.beta1;
        let beta2 = self.adam.beta2;
        let epsilon = self.adam.epsilon;
        let t = self.adam.t;
        let lr_t = self.adam.learning_rate * (1.0 - beta2.powi(t)).sqrt() / (1.0 - beta1.powi(t));

        if slot == self.adam.moments.len() {
            let shape = param.raw_dim().into_dyn();
            self.adam
                .moments
                .push((ArrayD::zeros(shape.clone()), ArrayD::zeros(shape)));
        }
        let (m, v) = &mut self.adam.moments[slot];

        Zip::from(param.view_mut().into_dyn())
            .and(grad.view().into_dyn())
            .and(m)
            .and(v)
            .for_each(|p, &g, m, v| {
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;
                *p -= lr_t * *m / (v.sqrt() + epsilon);
            });
    }
}
