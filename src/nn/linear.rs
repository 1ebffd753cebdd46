//! Dense layer: y = W @ x + b

use crate::module::Module;
use crate::tensor::{matmul, Tensor};
use std::any::Any;

/// Fully connected layer with weight `[d_out * d_in]` and bias `[d_out]`.
#[derive(Clone)]
pub struct Linear {
    weight: Tensor,
    bias: Tensor,
    d_out: usize,
    d_in: usize,
}

impl Linear {
    /// Create a layer with deterministic small-value initialization.
    pub fn new(d_out: usize, d_in: usize) -> Self {
        // Deterministic "random" init for reproducibility in tests
        let weight_data: Vec<f32> =
            (0..d_out * d_in).map(|i| (i as f32 * 0.1).sin() * 0.1).collect();
        Self {
            weight: Tensor::from_vec(weight_data, true),
            bias: Tensor::zeros(d_out, true),
            d_out,
            d_in,
        }
    }

    /// Create a layer from existing weights.
    pub fn from_weights(weight: Tensor, bias: Tensor, d_out: usize, d_in: usize) -> Self {
        assert_eq!(weight.len(), d_out * d_in, "Weight size must match d_out * d_in");
        assert_eq!(bias.len(), d_out, "Bias size must match d_out");
        Self { weight, bias, d_out, d_in }
    }

    /// Get reference to the weight matrix.
    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    /// Get mutable reference to the weight matrix.
    pub fn weight_mut(&mut self) -> &mut Tensor {
        &mut self.weight
    }

    /// Get reference to the bias vector.
    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    /// Get output dimension.
    pub fn d_out(&self) -> usize {
        self.d_out
    }

    /// Get input dimension.
    pub fn d_in(&self) -> usize {
        self.d_in
    }
}

impl Module for Linear {
    fn class_name(&self) -> &'static str {
        "Linear"
    }

    fn parameters(&self) -> Vec<(&'static str, &Tensor)> {
        vec![("weight", &self.weight), ("bias", &self.bias)]
    }

    fn parameters_mut(&mut self) -> Vec<(&'static str, &mut Tensor)> {
        vec![("weight", &mut self.weight), ("bias", &mut self.bias)]
    }

    fn forward(&self, input: &Tensor) -> Tensor {
        assert_eq!(input.len(), self.d_in, "Input size must match d_in");

        let mut out = matmul(&self.weight, input, self.d_out, self.d_in, 1);
        for (i, val) in out.data_mut().iter_mut().enumerate() {
            *val += self.bias.data()[i];
        }
        out
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
