//! Adam parameter update over the flat parameter list.

use crate::config::constants::{BETA1, BETA2, EPSILON};
use crate::model::Model;

impl Model {
    /// One Adam step over every parameter, consuming the accumulated
    /// gradients and zeroing them afterwards.
    ///
    /// Moments are bias-corrected by the step counter, which this call
    /// increments first.
    pub fn update(&mut self) {
        self.steps += 1;
        let t = self.steps as i32;
        let lr = self.config.learning_rate;

        for (i, p) in self.params.iter().enumerate() {
            let g = p.grad();
            self.adam_m[i] = BETA1 * self.adam_m[i] + (1.0 - BETA1) * g;
            self.adam_v[i] = BETA2 * self.adam_v[i] + (1.0 - BETA2) * g * g;

            let m_hat = self.adam_m[i] / (1.0 - BETA1.powi(t));
            let v_hat = self.adam_v[i] / (1.0 - BETA2.powi(t));

            p.set_data(p.data() - lr * m_hat / (v_hat.sqrt() + EPSILON));
            p.zero_grad();
        }
    }
}
