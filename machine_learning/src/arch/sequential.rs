use ndarray::{Array2, ArrayView2};

use super::{
    Model, ParamSpec,
    activations::ActFn,
    layers::Dense,
    loss::LossFn,
    model::check_size,
};
use crate::{MlErr, Result, optimization::Optimizer};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The i-th layer (1-based) names its parameters `fc{i}.weight` and `fc{i}.bias`.
#[derive(Debug, Clone)]
pub struct Sequential {
    layers: Vec<Dense>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Dense>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    /// Builds a multi-layer perceptron from its layer widths.
    ///
    /// Every hidden layer uses `act_fn`, the output layer has no activation.
    ///
    /// # Errors
    /// `MlErr::InvalidArch` if there are fewer than two widths or any is zero.
    pub fn mlp(widths: &[usize], act_fn: ActFn) -> Result<Self> {
        if widths.len() < 2 {
            return Err(MlErr::InvalidArch(format!(
                "need at least an input and an output width, got {widths:?}"
            )));
        }

        if widths.contains(&0) {
            return Err(MlErr::InvalidArch(format!("zero width in {widths:?}")));
        }

        let last = widths.len() - 2;
        let layers = widths.windows(2).enumerate().map(|(i, w)| {
            let act_fn = (i < last).then(|| act_fn.clone());
            Dense::new((w[0], w[1]), act_fn)
        });

        Ok(Self::new(layers))
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    /// The width of the model's input rows.
    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |l| l.dim().0)
    }

    /// The width of the model's output rows.
    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |l| l.dim().1)
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    fn param_specs(&self) -> Vec<ParamSpec> {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| {
                layer.param_shapes().map(|(kind, shape)| ParamSpec {
                    name: format!("fc{}.{kind}", i + 1),
                    shape,
                })
            })
            .collect()
    }

    fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        check_size(self.size(), params.len())?;

        let mut rest = params;
        let mut x = x.to_owned();

        for layer in self.layers.iter_mut() {
            let (head, tail) = rest.split_at(layer.size());
            x = layer.forward(head, x.view())?;
            rest = tail;
        }

        Ok(x)
    }

    // NOTE: the epoch loss is approximated by averaging the loss of each batch as seen
    // during the pass, instead of forwarding over the whole shard again at the end.
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
        I: Iterator<Item = (ArrayView2<'a, f32>, ArrayView2<'a, f32>)>,
    {
        check_size(self.size(), grad.len())?;

        let mut total_loss = 0.0;
        let mut num_batches = 0;

        for (x, y) in batches {
            let y_pred = self.forward(params, x)?;
            total_loss += loss_fn.loss(y_pred.view(), y);
            num_batches += 1;

            let mut d = loss_fn.loss_prime(y_pred.view(), y);
            let mut end = params.len();

            for layer in self.layers.iter_mut().rev() {
                let start = end - layer.size();
                d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
                end = start;
            }

            optimizer.update_params(params, grad);
        }

        if num_batches == 0 {
            return Err(MlErr::EmptyDataset);
        }

        Ok(total_loss / num_batches as f32)
    }
}
