use ndarray::{Array2, ArrayView2, Axis};

use super::LossFn;

/// Softmax followed by categorical cross entropy, averaged over the batch.
///
/// Expects raw logits as predictions and one-hot rows as targets, so the last
/// layer of the model must not have an activation.
#[derive(Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    pub fn new() -> Self {
        Self
    }
}

/// Row-wise softmax, shifted by each row's max for stability.
pub fn softmax(logits: ArrayView2<f32>) -> Array2<f32> {
    let mut out = logits.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }

    out
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let rows = y_pred.nrows().max(1) as f32;
        let probs = softmax(y_pred);

        let total: f32 = probs
            .iter()
            .zip(y.iter())
            .map(|(&p, &t)| -t * p.max(f32::MIN_POSITIVE).ln())
            .sum();

        total / rows
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let rows = y_pred.nrows().max(1) as f32;
        (softmax(y_pred) - &y) / rows
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr2;

    use super::*;

    #[test]
    fn softmax_rows_sum_to_one() {
        let probs = softmax(arr2(&[[1.0, 2.0, 3.0], [1000.0, 1000.0, 1000.0]]).view());
        for row in probs.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-6);
        }
        assert!((probs[[1, 0]] - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn uniform_logits_cost_ln_of_classes() {
        let loss = CrossEntropy.loss(
            arr2(&[[0.0, 0.0], [0.0, 0.0]]).view(),
            arr2(&[[1.0, 0.0], [0.0, 1.0]]).view(),
        );
        assert!((loss - 2f32.ln()).abs() < 1e-6);
    }
}
