use ndarray::{Array2, ArrayView2};

use super::LossFn;

/// Mean squared error over every element of the batch, for regression targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mse;

impl Mse {
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for Mse {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let diff = &y_pred - &y;
        diff.mapv(|d| d * d).mean().unwrap_or(0.0)
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let scale = 2.0 / y_pred.len().max(1) as f32;
        (&y_pred - &y) * scale
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr2;

    use super::*;

    #[test]
    fn averages_squared_errors() {
        let y_pred = arr2(&[[1.0, 3.0]]);
        let y = arr2(&[[0.0, 1.0]]);

        assert_eq!(Mse.loss(y_pred.view(), y.view()), 2.5);
        assert_eq!(Mse.loss_prime(y_pred.view(), y.view()), arr2(&[[1.0, 2.0]]));
    }
}
