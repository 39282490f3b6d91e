use super::Optimizer;

/// Plain mini-batch gradient descent: `p -= learning_rate * g`.
#[derive(Debug, Clone, Copy)]
pub struct GradientDescent {
    learning_rate: f32,
}

impl GradientDescent {
    pub fn new(learning_rate: f32) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for GradientDescent {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) {
        let lr = self.learning_rate;
        params
            .iter_mut()
            .zip(grad)
            .for_each(|(p, g)| *p -= lr * g);
    }
}
