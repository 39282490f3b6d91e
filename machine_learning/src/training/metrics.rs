use ndarray::ArrayView2;

/// Scalar metrics reported by a finished training run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainMetrics {
    /// The loss of the last epoch.
    pub loss: f64,
    /// Percentage of correctly predicted samples, in `[0, 100]`.
    pub accuracy: f64,
}

/// Progress notification sent after each epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochReport {
    /// 1-based index of the epoch that just finished.
    pub epoch: usize,
    pub epochs: usize,
    pub loss: f32,
}

/// Counts the rows of `y_pred` that predict the class of `y`.
///
/// Multi-column rows are compared by their argmax; single column rows by
/// thresholding both sides at `0.5`.
pub fn count_correct(y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> usize {
    y_pred
        .rows()
        .into_iter()
        .zip(y.rows())
        .filter(|(pred, target)| {
            if pred.len() == 1 {
                (pred[0] >= 0.5) == (target[0] >= 0.5)
            } else {
                argmax(pred.iter()) == argmax(target.iter())
            }
        })
        .count()
}

fn argmax<'a, I: Iterator<Item = &'a f32>>(values: I) -> Option<usize> {
    values
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}
