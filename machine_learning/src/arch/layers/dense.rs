use ndarray::prelude::*;

use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer `a = act_fn(x · w + b)`.
///
/// Its parameters live in a flat slice laid out as the `(in, out)` row-major
/// weights followed by the `out` biases.
#[derive(Debug, Clone)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,
    size: usize,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The `(inputs, outputs)` dimensions of the layer.
    /// * `act_fn` - An optional activation applied to the affine output.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            act_fn,
            x: Array2::zeros((0, dim.0)),
            z: Array2::zeros((0, dim.1)),
        }
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// The shapes of the weight and bias tensors, in layout order.
    pub fn param_shapes(&self) -> [(&'static str, Vec<usize>); 2] {
        [
            ("weight", vec![self.dim.0, self.dim.1]),
            ("bias", vec![self.dim.1]),
        ]
    }

    /// Computes this layer's output for a batch of rows, caching what the
    /// backward pass needs.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input columns",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        self.z = x.dot(&w) + &b;
        self.x = x.to_owned();

        Ok(match &self.act_fn {
            Some(act_fn) => self.z.mapv(|z| act_fn.f(z)),
            None => self.z.clone(),
        })
    }

    /// Writes this layer's gradient into `grad` given the loss delta `d` with
    /// respect to its output, and returns the delta with respect to its input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        dw.assign(&self.x.t().dot(&d));
        db.assign(&d.sum_axis(Axis(0)));

        let (w, _) = self.view_params(params)?;
        Ok(d.dot(&w.t()))
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        self.check_len("dense gradient", grad.len())?;

        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw)?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(&self, params: &'a [f32]) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        self.check_len("dense parameters", params.len())?;

        let w_size = self.size - self.dim.1;
        let (w_raw, b_raw) = params.split_at(w_size);
        let weights = ArrayView2::from_shape(self.dim, w_raw)?;
        let biases = ArrayView1::from_shape(self.dim.1, b_raw)?;
        Ok((weights, biases))
    }

    fn check_len(&self, what: &'static str, got: usize) -> Result<()> {
        if got != self.size {
            return Err(MlErr::SizeMismatch {
                what,
                got,
                expected: self.size,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_is_affine_without_activation() {
        // w = [[1, 2], [3, 4], [5, 6]], b = [0.5, -0.5]
        let params = [1., 2., 3., 4., 5., 6., 0.5, -0.5];
        let mut dense = Dense::new((3, 2), None);
        let x = arr2(&[[1., 0., 0.], [1., 1., 1.]]);

        let y = dense.forward(&params, x.view()).unwrap();
        assert_eq!(y, arr2(&[[1.5, 1.5], [9.5, 11.5]]));
    }

    #[test]
    fn backward_fills_weight_and_bias_grads() {
        let params = [1., 2., 3., 4., 0., 0.];
        let mut grad = [0.; 6];
        let mut dense = Dense::new((2, 2), None);
        let x = arr2(&[[1., 2.]]);

        dense.forward(&params, x.view()).unwrap();
        let dx = dense.backward(&params, &mut grad, arr2(&[[1., 1.]])).unwrap();

        assert_eq!(grad, [1., 1., 2., 2., 1., 1.]);
        assert_eq!(dx, arr2(&[[3., 7.]]));
    }

    #[test]
    fn rejects_wrong_param_len() {
        let mut dense = Dense::new((2, 1), None);
        let err = dense.forward(&[0.; 2], arr2(&[[1., 1.]]).view()).unwrap_err();
        assert!(matches!(err, MlErr::SizeMismatch { expected: 3, .. }));
    }
}
