use ndarray::ArrayD;

/// A dense parameter tensor of arbitrary rank.
pub type Tensor = ArrayD<f32>;

/// Returns whether every element of `tensor` is exactly zero.
///
/// An empty tensor is considered all-zero.
pub fn is_all_zero(tensor: &Tensor) -> bool {
    tensor.iter().all(|&v| v == 0.0)
}

/// Returns the largest absolute element-wise difference between `a` and `b`.
///
/// # Returns
/// `None` if the shapes differ, `Some(0.0)` for two empty tensors. A NaN on
/// either side propagates into the result.
pub fn max_abs_diff(a: &Tensor, b: &Tensor) -> Option<f64> {
    if a.shape() != b.shape() {
        return None;
    }

    let diff = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x as f64 - y as f64).abs())
        .fold(0.0_f64, |acc, d| if d.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(d) });

    Some(diff)
}

/// Summary statistics of a tensor, used for human-readable inspection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TensorStats {
    pub mean: f64,
    pub std: f64,
    pub min: f32,
    pub max: f32,
}

impl TensorStats {
    /// Computes the statistics of `tensor`.
    ///
    /// The standard deviation is the unbiased (n - 1) estimator and is zero for
    /// single element tensors.
    ///
    /// # Returns
    /// `None` if the tensor is empty.
    pub fn of(tensor: &Tensor) -> Option<Self> {
        let n = tensor.len();
        if n == 0 {
            return None;
        }

        let mean = tensor.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
        let std = if n > 1 {
            let var = tensor
                .iter()
                .map(|&v| (v as f64 - mean).powi(2))
                .sum::<f64>()
                / (n - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };

        let min = tensor.iter().copied().fold(f32::INFINITY, f32::min);
        let max = tensor.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        Some(Self {
            mean,
            std,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn, arr1};

    use super::*;

    #[test]
    fn zero_detection() {
        assert!(is_all_zero(&ArrayD::zeros(IxDyn(&[2, 3]))));
        assert!(!is_all_zero(&arr1(&[0.0, 0.0, 1e-30]).into_dyn()));
    }

    #[test]
    fn max_abs_diff_requires_same_shape() {
        let a = arr1(&[1.0, 2.0, 3.0]).into_dyn();
        let b = arr1(&[1.0, 2.5, 2.0]).into_dyn();
        let c = ArrayD::<f32>::zeros(IxDyn(&[3, 1]));

        assert_eq!(max_abs_diff(&a, &b), Some(1.0));
        assert_eq!(max_abs_diff(&a, &c), None);
    }

    #[test]
    fn max_abs_diff_propagates_nan() {
        let a = arr1(&[f32::NAN, 1.0]).into_dyn();
        let b = arr1(&[0.0, 1.0]).into_dyn();
        assert!(max_abs_diff(&a, &b).unwrap().is_nan());
    }

    #[test]
    fn stats_of_small_tensor() {
        let t = arr1(&[1.0, 2.0, 3.0, 4.0]).into_dyn();
        let stats = TensorStats::of(&t).unwrap();

        assert_eq!(stats.mean, 2.5);
        assert!((stats.std - 1.290_994).abs() < 1e-6);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 4.0);
        assert!(TensorStats::of(&ArrayD::zeros(IxDyn(&[0]))).is_none());
    }
}
