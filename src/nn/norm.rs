//! Feature normalization with persisted running statistics
//!
//! The running mean and variance are buffers: they are saved and loaded
//! with the module state but never participate in optimization, which makes
//! this layer the canonical check that the fine-tuned checkpoint filter
//! keeps buffer entries.

use crate::module::Module;
use crate::Tensor;
use std::any::Any;

/// Per-feature normalization using running statistics.
#[derive(Clone)]
pub struct BatchNorm {
    gamma: Tensor,
    beta: Tensor,
    running_mean: Tensor,
    running_var: Tensor,
    eps: f32,
}

impl BatchNorm {
    /// Create a normalization layer over `features` dimensions.
    ///
    /// Scale starts at one, shift at zero, running statistics at the
    /// standard-normal defaults.
    pub fn new(features: usize) -> Self {
        Self {
            gamma: Tensor::from_vec(vec![1.0; features], true),
            beta: Tensor::zeros(features, true),
            running_mean: Tensor::zeros(features, false),
            running_var: Tensor::from_vec(vec![1.0; features], false),
            eps: 1e-5,
        }
    }

    /// Number of normalized features.
    pub fn features(&self) -> usize {
        self.gamma.len()
    }

    /// Get mutable reference to the running mean buffer.
    pub fn running_mean_mut(&mut self) -> &mut Tensor {
        &mut self.running_mean
    }

    /// Get mutable reference to the running variance buffer.
    pub fn running_var_mut(&mut self) -> &mut Tensor {
        &mut self.running_var
    }
}

impl Module for BatchNorm {
    fn class_name(&self) -> &'static str {
        "BatchNorm"
    }

    fn parameters(&self) -> Vec<(&'static str, &Tensor)> {
        vec![("gamma", &self.gamma), ("beta", &self.beta)]
    }

    fn parameters_mut(&mut self) -> Vec<(&'static str, &mut Tensor)> {
        vec![("gamma", &mut self.gamma), ("beta", &mut self.beta)]
    }

    fn buffers(&self) -> Vec<(&'static str, &Tensor)> {
        vec![("running_mean", &self.running_mean), ("running_var", &self.running_var)]
    }

    fn buffers_mut(&mut self) -> Vec<(&'static str, &mut Tensor)> {
        vec![("running_mean", &mut self.running_mean), ("running_var", &mut self.running_var)]
    }

    fn forward(&self, input: &Tensor) -> Tensor {
        assert_eq!(input.len(), self.features(), "Input size must match feature count");

        let mut out = vec![0.0f32; input.len()];
        for (i, val) in out.iter_mut().enumerate() {
            let centered = input.data()[i] - self.running_mean.data()[i];
            let denom = (self.running_var.data()[i] + self.eps).sqrt();
            *val = self.gamma.data()[i] * (centered / denom) + self.beta.data()[i];
        }
        Tensor::from_vec(out, input.requires_grad())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
