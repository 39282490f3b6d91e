use comms::Snapshot;
use ndarray::{Array2, ArrayD, ArrayView2, IxDyn};

use crate::{MlErr, Result, arch::loss::LossFn, optimization::Optimizer};

/// A named parameter tensor of a model and its shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub shape: Vec<usize>,
}

impl ParamSpec {
    /// The amount of scalars in this tensor.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }
}

/// The trainable-model capability: given an input batch, produce an output
/// batch, and learn from labelled batches.
///
/// Parameters are kept outside the model in a flat slice whose layout is given
/// by `param_specs`, which is also what names them in a snapshot.
pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// The named parameter tensors in layout order. Their lengths add up to `size`.
    fn param_specs(&self) -> Vec<ParamSpec>;

    /// Makes a forward pass through the model.
    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Computes the gradient of the loss function with respect to the parameters of the model over
    /// the provided batches. **`params` gets updated** for each batch according to the
    /// optimization algorithm.
    ///
    /// # Arguments
    /// * `params` - The model's parameters.
    /// * `grad` - A buffer for writing the computed gradient on each batch pass.
    /// * `loss_fn` - The loss function.
    /// * `optimizer` - The optimizer that dictates how to update the weights on each gradient calculation.
    /// * `batches` - The batches of data.
    ///
    /// # Returns
    /// The epoch loss.
    fn backprop<'a, L, O, I>(
        &mut self,
        params: &mut [f32],
        grad: &mut [f32],
        loss_fn: &L,
        optimizer: &mut O,
        batches: I,
    ) -> Result<f32>
    where
        L: LossFn,
        O: Optimizer,
        I: Iterator<Item = (ArrayView2<'a, f32>, ArrayView2<'a, f32>)>;

    /// Splits the flat `params` into a named snapshot.
    fn snapshot(&self, params: &[f32]) -> Result<Snapshot> {
        check_size(self.size(), params.len())?;

        let mut snapshot = Snapshot::new();
        let mut rest = params;
        for spec in self.param_specs() {
            let (head, tail) = rest.split_at(spec.len());
            let tensor = ArrayD::from_shape_vec(IxDyn(&spec.shape), head.to_vec())?;
            snapshot.insert(spec.name, tensor)?;
            rest = tail;
        }

        Ok(snapshot)
    }

    /// Flattens a snapshot with this model's parameter names and shapes back into
    /// the parameter layout. Extra entries in the snapshot are ignored.
    fn params_from_snapshot(&self, snapshot: &Snapshot) -> Result<Vec<f32>> {
        let mut params = Vec::with_capacity(self.size());
        for spec in self.param_specs() {
            let tensor = snapshot
                .get(&spec.name)
                .ok_or_else(|| MlErr::MissingParam(spec.name.clone()))?;

            if tensor.shape() != spec.shape.as_slice() {
                return Err(MlErr::SizeMismatch {
                    what: "snapshot tensor",
                    got: tensor.len(),
                    expected: spec.len(),
                });
            }

            params.extend(tensor.iter().copied());
        }

        Ok(params)
    }
}

pub(crate) fn check_size(expected: usize, got: usize) -> Result<()> {
    if got != expected {
        return Err(MlErr::SizeMismatch {
            what: "params",
            got,
            expected,
        });
    }

    Ok(())
}
