//! LoRA (Low-Rank Adaptation) replacement strategy
//!
//! For a frozen weight matrix W ∈ ℝ^(d_out × d_in), LoRA adds
//! ΔW = B @ A where A ∈ ℝ^(r × d_in) and B ∈ ℝ^(d_out × r).
//!
//! Forward pass: y = W@x + b + scale·(B@(A@x))
//! where scale = alpha / rank.

use super::{ChildMeta, FineTuningStrategy};
use crate::finetune::FineTuneError;
use crate::module::Module;
use crate::nn::Linear;
use crate::tensor::{matmul, Tensor};
use std::any::Any;

/// Dense layer with a frozen base and trainable low-rank adaptation.
///
/// The base weight and bias keep their values but lose their trainability;
/// only the A and B matrices train. Carries the fine-tunable marker, so a
/// second transformation pass over the same tree fails fast.
#[derive(Clone)]
pub struct LoraLinear {
    weight: Tensor,
    bias: Tensor,
    lora_a: Tensor,
    lora_b: Tensor,
    d_out: usize,
    d_in: usize,
    rank: usize,
    scale: f32,
    merged: bool,
}

impl LoraLinear {
    /// Wrap a dense layer: clone its weights as a frozen base and attach
    /// freshly initialized adaptation matrices.
    ///
    /// A gets small deterministic noise, B starts at zero, so the wrapped
    /// layer initially computes exactly what the original did.
    pub fn from_linear(linear: &Linear, rank: usize, alpha: f32) -> Self {
        assert!(rank > 0, "LoRA rank must be positive");

        let d_out = linear.d_out();
        let d_in = linear.d_in();

        let mut weight = linear.weight().clone();
        weight.set_requires_grad(false);
        let mut bias = linear.bias().clone();
        bias.set_requires_grad(false);

        let lora_a_data: Vec<f32> =
            (0..rank * d_in).map(|i| (i as f32 * 0.1).sin() * 0.01).collect();

        Self {
            weight,
            bias,
            lora_a: Tensor::from_vec(lora_a_data, true),
            lora_b: Tensor::zeros(d_out * rank, true),
            d_out,
            d_in,
            rank,
            scale: alpha / rank as f32,
            merged: false,
        }
    }

    /// Merge the adaptation into the base weight: W' = W + scale·(B@A).
    ///
    /// After merging the forward pass uses only W'. Typically done for
    /// inference.
    pub fn merge(&mut self) {
        if self.merged {
            return;
        }

        let ba = matmul(&self.lora_b, &self.lora_a, self.d_out, self.rank, self.d_in);
        for (i, val) in self.weight.data_mut().iter_mut().enumerate() {
            *val += self.scale * ba.data()[i];
        }

        self.merged = true;
    }

    /// Reverse [`merge`](LoraLinear::merge): W = W' - scale·(B@A).
    pub fn unmerge(&mut self) {
        if !self.merged {
            return;
        }

        let ba = matmul(&self.lora_b, &self.lora_a, self.d_out, self.rank, self.d_in);
        for (i, val) in self.weight.data_mut().iter_mut().enumerate() {
            *val -= self.scale * ba.data()[i];
        }

        self.merged = false;
    }

    /// Get reference to the A matrix.
    pub fn lora_a(&self) -> &Tensor {
        &self.lora_a
    }

    /// Get mutable reference to the A matrix.
    pub fn lora_a_mut(&mut self) -> &mut Tensor {
        &mut self.lora_a
    }

    /// Get reference to the B matrix.
    pub fn lora_b(&self) -> &Tensor {
        &self.lora_b
    }

    /// Get mutable reference to the B matrix.
    pub fn lora_b_mut(&mut self) -> &mut Tensor {
        &mut self.lora_b
    }

    /// Whether the adaptation is merged into the base weight.
    pub fn is_merged(&self) -> bool {
        self.merged
    }

    /// Get LoRA rank.
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Get the scaling factor (alpha/rank).
    pub fn scale(&self) -> f32 {
        self.scale
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

impl Module for LoraLinear {
    fn class_name(&self) -> &'static str {
        "LoraLinear"
    }

    fn parameters(&self) -> Vec<(&'static str, &Tensor)> {
        vec![
            ("weight", &self.weight),
            ("bias", &self.bias),
            ("lora_a", &self.lora_a),
            ("lora_b", &self.lora_b),
        ]
    }

    fn parameters_mut(&mut self) -> Vec<(&'static str, &mut Tensor)> {
        vec![
            ("weight", &mut self.weight),
            ("bias", &mut self.bias),
            ("lora_a", &mut self.lora_a),
            ("lora_b", &mut self.lora_b),
        ]
    }

    fn is_finetuable(&self) -> bool {
        true
    }

    fn forward(&self, input: &Tensor) -> Tensor {
        assert_eq!(input.len(), self.d_in, "Input size must match d_in");

        let mut base = matmul(&self.weight, input, self.d_out, self.d_in, 1);
        for (i, val) in base.data_mut().iter_mut().enumerate() {
            *val += self.bias.data()[i];
        }

        if self.merged {
            return base;
        }

        // A @ x [r, d_in] @ [d_in, 1] -> [r, 1], then B @ (A @ x)
        let down = matmul(&self.lora_a, input, self.rank, self.d_in, 1);
        let up = matmul(&self.lora_b, &down, self.d_out, self.rank, 1);

        let mut out = base.data().to_owned();
        for (i, val) in out.iter_mut().enumerate() {
            *val += self.scale * up.data()[i];
        }
        Tensor::new(out, base.requires_grad() || up.requires_grad())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Strategy that swaps matching dense layers for [`LoraLinear`].
pub struct LoraStrategy {
    rank: usize,
    alpha: f32,
    targets: Vec<String>,
}

impl LoraStrategy {
    /// Target every `Linear` child with the given rank and alpha.
    pub fn new(rank: usize, alpha: f32) -> Self {
        Self { rank, alpha, targets: vec!["Linear".to_string()] }
    }

    /// Restrict matching to the given runtime class names.
    pub fn with_targets(mut self, targets: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }
}

impl FineTuningStrategy for LoraStrategy {
    fn apply(
        &mut self,
        parent: &mut dyn Module,
        child: &ChildMeta<'_>,
    ) -> Result<bool, FineTuneError> {
        if !self.targets.iter().any(|target| target == child.class_name) {
            return Ok(false);
        }

        let replacement = {
            let Some(module) = parent
                .children()
                .into_iter()
                .find(|(name, _)| *name == child.name)
                .map(|(_, module)| module)
            else {
                return Ok(false);
            };
            let Some(linear) = module.as_any().downcast_ref::<Linear>() else {
                // Class name matched but the concrete type is foreign
                return Ok(false);
            };
            LoraLinear::from_linear(linear, self.rank, self.alpha)
        };

        match parent.replace_child(child.name, Box::new(replacement)) {
            Ok(_) => {
                log::debug!("installed LoRA adapter at {}", child.global_name);
                Ok(true)
            }
            Err(_) => Err(FineTuneError::Strategy {
                name: child.global_name.to_string(),
                reason: "parent does not support child replacement".to_string(),
            }),
        }
    }
}
