use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::{MlErr, Result, arch::Model};

/// Draws a fresh parameter vector for `model` using Xavier uniform
/// initialization for every rank 2 tensor and zeros for the rest (biases).
pub fn xavier_uniform<M: Model, R: Rng>(model: &M, rng: &mut R) -> Result<Vec<f32>> {
    let mut params = Vec::with_capacity(model.size());

    for spec in model.param_specs() {
        match spec.shape[..] {
            [fan_in, fan_out] => {
                let range = (6. / (fan_in + fan_out) as f32).sqrt();
                let dist = Uniform::new(-range, range)
                    .map_err(|e| MlErr::InvalidArch(format!("{}: {e}", spec.name)))?;
                params.extend(dist.sample_iter(&mut *rng).take(spec.len()));
            }
            _ => params.extend(std::iter::repeat_n(0., spec.len())),
        }
    }

    Ok(params)
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::arch::{Sequential, activations::ActFn};

    #[test]
    fn weights_are_bounded_and_biases_zero() {
        let model = Sequential::mlp(&[3, 2], ActFn::relu()).unwrap();
        let params = xavier_uniform(&model, &mut StdRng::seed_from_u64(1)).unwrap();

        let range = (6f32 / 5.).sqrt();
        assert_eq!(params.len(), model.size());
        assert!(params[..6].iter().all(|w| w.abs() <= range));
        assert!(params[..6].iter().any(|&w| w != 0.));
        assert_eq!(params[6..], [0., 0.]);
    }

    #[test]
    fn same_seed_same_params() {
        let model = Sequential::mlp(&[4, 4, 1], ActFn::relu()).unwrap();
        let a = xavier_uniform(&model, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = xavier_uniform(&model, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
    }
}
