use std::{num::NonZeroUsize, ops::Range, path::Path};

use comms::{Tensor, snapshot};
use ndarray::{Array2, ArrayView2, Axis};
use rand::{Rng, seq::SliceRandom};

use crate::{MlErr, Result};

/// Name of the input tensor in a dataset file.
pub const X_TENSOR: &str = "x";
/// Name of the target tensor in a dataset file.
pub const Y_TENSOR: &str = "y";

/// An in-memory supervised dataset, one sample per row.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    x: Array2<f32>,
    y: Array2<f32>,
}

impl Dataset {
    /// Creates a new `Dataset` from its input and target rows.
    ///
    /// # Errors
    /// `MlErr::SizeMismatch` if `x` and `y` don't have the same amount of rows.
    pub fn new(x: Array2<f32>, y: Array2<f32>) -> Result<Self> {
        if x.nrows() != y.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "dataset rows",
                got: y.nrows(),
                expected: x.nrows(),
            });
        }

        Ok(Self { x, y })
    }

    /// Builds a dataset from tensors whose first axis is the sample axis.
    ///
    /// Trailing axes are flattened, so `[n, 28, 28]` images become `[n, 784]`
    /// rows and `[n]` targets become a single column.
    pub fn from_tensors(x: Tensor, y: Tensor) -> Result<Self> {
        Self::new(flatten_rows("x", x)?, flatten_rows("y", y)?)
    }

    /// Reads a dataset from a safetensors file holding an `x` and a `y` tensor.
    pub fn load(path: &Path) -> Result<Self> {
        let mut tensors = snapshot::read_tensors(path, &[X_TENSOR, Y_TENSOR])?.into_iter();

        match (tensors.next(), tensors.next()) {
            (Some(x), Some(y)) => Self::from_tensors(x, y),
            _ => Err(MlErr::EmptyDataset),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn x_size(&self) -> usize {
        self.x.ncols()
    }

    #[inline]
    pub fn y_size(&self) -> usize {
        self.y.ncols()
    }

    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView2<'_, f32> {
        self.y.view()
    }

    /// Returns an owned copy of the rows in `range`.
    ///
    /// # Errors
    /// `MlErr::SizeMismatch` if the range goes past the end of the dataset.
    pub fn subset(&self, range: Range<usize>) -> Result<Self> {
        if range.start > range.end || range.end > self.len() {
            return Err(MlErr::SizeMismatch {
                what: "subset end",
                got: range.end,
                expected: self.len(),
            });
        }

        Ok(Self {
            x: self.x.slice(ndarray::s![range.clone(), ..]).to_owned(),
            y: self.y.slice(ndarray::s![range, ..]).to_owned(),
        })
    }

    /// Replaces single column class-index targets by one-hot rows of `classes` columns.
    ///
    /// # Errors
    /// `MlErr::InvalidLabel` if a target isn't an integer in `[0, classes)`.
    pub fn one_hot(self, classes: usize) -> Result<Self> {
        if self.y_size() != 1 {
            return Err(MlErr::SizeMismatch {
                what: "label columns",
                got: self.y_size(),
                expected: 1,
            });
        }

        let mut y = Array2::zeros((self.len(), classes));
        for (row, &value) in self.y.column(0).iter().enumerate() {
            let class = value as usize;
            if value.fract() != 0.0 || value < 0.0 || class >= classes {
                return Err(MlErr::InvalidLabel {
                    row,
                    value,
                    classes,
                });
            }

            y[[row, class]] = 1.0;
        }

        Ok(Self { x: self.x, y })
    }

    /// Shuffles the rows, keeping inputs and targets paired.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);

        self.x = self.x.select(Axis(0), &order);
        self.y = self.y.select(Axis(0), &order);
    }

    /// Iterates the dataset in consecutive batches of at most `batch_size` rows.
    pub fn batches(
        &self,
        batch_size: NonZeroUsize,
    ) -> impl Iterator<Item = (ArrayView2<'_, f32>, ArrayView2<'_, f32>)> {
        let size = batch_size.get();
        self.x
            .axis_chunks_iter(Axis(0), size)
            .zip(self.y.axis_chunks_iter(Axis(0), size))
    }
}

fn flatten_rows(what: &'static str, tensor: Tensor) -> Result<Array2<f32>> {
    let Some(&rows) = tensor.shape().first() else {
        return Err(MlErr::SizeMismatch {
            what,
            got: 0,
            expected: 1,
        });
    };

    let cols: usize = tensor.shape()[1..].iter().product();
    let tensor = tensor.as_standard_layout().into_owned();
    Ok(tensor.into_shape_with_order((rows, cols))?)
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn, arr2};
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn sample() -> Dataset {
        let x = Array2::from_shape_fn((5, 2), |(r, c)| (r * 10 + c) as f32);
        let y = Array2::from_shape_fn((5, 1), |(r, _)| r as f32);
        Dataset::new(x, y).unwrap()
    }

    #[test]
    fn from_tensors_flattens_trailing_axes() {
        let x = ArrayD::<f32>::zeros(IxDyn(&[3, 2, 2]));
        let y = ArrayD::<f32>::zeros(IxDyn(&[3]));
        let ds = Dataset::from_tensors(x, y).unwrap();

        assert_eq!(ds.len(), 3);
        assert_eq!(ds.x_size(), 4);
        assert_eq!(ds.y_size(), 1);
    }

    #[test]
    fn mismatched_rows_are_rejected() {
        let err = Dataset::new(Array2::zeros((3, 1)), Array2::zeros((2, 1))).unwrap_err();
        assert!(matches!(err, MlErr::SizeMismatch { got: 2, expected: 3, .. }));
    }

    #[test]
    fn subset_copies_the_requested_rows() {
        let ds = sample().subset(1..3).unwrap();
        assert_eq!(ds.x(), arr2(&[[10., 11.], [20., 21.]]));
        assert_eq!(ds.y(), arr2(&[[1.], [2.]]));
        assert!(sample().subset(4..6).is_err());
    }

    #[test]
    fn one_hot_expands_class_indices() {
        let ds = sample().subset(0..3).unwrap().one_hot(3).unwrap();
        assert_eq!(ds.y(), arr2(&[[1., 0., 0.], [0., 1., 0.], [0., 0., 1.]]));

        let err = sample().one_hot(3).unwrap_err();
        assert!(matches!(err, MlErr::InvalidLabel { row: 3, .. }));
    }

    #[test]
    fn shuffle_keeps_pairs_together() {
        let mut ds = sample();
        ds.shuffle(&mut StdRng::seed_from_u64(7));

        for (x, y) in ds.x().rows().into_iter().zip(ds.y().rows()) {
            assert_eq!(x[0], y[0] * 10.0);
        }
    }

    #[test]
    fn batches_cover_every_row() {
        let ds = sample();
        let sizes: Vec<_> = ds
            .batches(NonZeroUsize::new(2).unwrap())
            .map(|(x, y)| (x.nrows(), y.nrows()))
            .collect();

        assert_eq!(sizes, [(2, 2), (2, 2), (1, 1)]);
    }
}
