//! Fine-tuning orchestration

use super::{modify_modules, relax_missing_keys, strip_untrainable, FineTuneError};
use crate::module::{for_each_parameter_mut, named_parameters, trainable_parameters, Module};
use crate::state::{
    load_checkpoint, load_state_dict, save_checkpoint, state_dict, LoadReport, StateDict,
    StateError,
};
use crate::strategy::FineTuningStrategy;
use crate::Tensor;
use std::path::Path;

/// A module tree transformed for fine-tuning.
///
/// Wraps the tree after the strategy pass and routes persistence through
/// the save filter and load relaxer. When `trainable_only` was requested,
/// parameter enumeration yields only tensors still carrying the
/// requires-grad flag, so an optimizer wired against
/// [`parameters`](FineTuned::parameters) sees nothing frozen.
pub struct FineTuned<M: Module> {
    module: M,
    trainable_only: bool,
}

/// Transform `module` for fine-tuning under `strategy`.
///
/// Runs the full strategy pass over the tree, then returns the wrapper
/// whose save/load paths apply the trainable-only filter and the
/// missing-key relaxer. With `trainable_only` set, parameter enumeration
/// on the wrapper is restricted to trainable tensors; otherwise it
/// enumerates everything and callers can filter with
/// [`trainable_parameters`](crate::module::trainable_parameters).
///
/// Calling this twice over the same tree fails with
/// [`FineTuneError::AlreadyFinetuable`] once the first strategy-installed
/// node is re-encountered.
pub fn enable_fine_tuning<M: Module>(
    mut module: M,
    strategy: &mut dyn FineTuningStrategy,
    trainable_only: bool,
) -> Result<FineTuned<M>, FineTuneError> {
    modify_modules(&mut module, strategy, "")?;

    let trainable = trainable_parameters(&module).len();
    let total = named_parameters(&module, "").len();
    log::info!("fine-tuning enabled: {trainable} of {total} parameter tensors trainable");

    Ok(FineTuned { module, trainable_only })
}

impl<M: Module> FineTuned<M> {
    /// State of the tree with frozen-parameter entries stripped.
    pub fn state_dict(&self) -> StateDict {
        strip_untrainable(&self.module, &state_dict(&self.module))
    }

    /// Load a state dict, tolerating keys the transformed tree no longer
    /// defines.
    pub fn load_state_dict(&mut self, state: &StateDict) -> Result<LoadReport, StateError> {
        let mut report = load_state_dict(&mut self.module, state)?;
        relax_missing_keys(&self.module, &mut report);
        Ok(report)
    }

    /// Enumerate parameters with dotted global names.
    ///
    /// Restricted to trainable tensors when the wrapper was built with
    /// `trainable_only`.
    pub fn parameters(&self) -> Vec<(String, &Tensor)> {
        if self.trainable_only {
            trainable_parameters(&self.module)
        } else {
            named_parameters(&self.module, "")
        }
    }

    /// Visit parameters mutably, for optimizer updates. Honors the same
    /// trainable-only restriction as [`parameters`](FineTuned::parameters).
    pub fn for_each_parameter_mut(&mut self, mut f: impl FnMut(&str, &mut Tensor)) {
        let trainable_only = self.trainable_only;
        for_each_parameter_mut(&mut self.module, "", &mut |name, tensor| {
            if !trainable_only || tensor.requires_grad() {
                f(name, tensor);
            }
        });
    }

    /// Write the filtered state to a JSON checkpoint file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StateError> {
        save_checkpoint(&self.state_dict(), path)
    }

    /// Load a JSON checkpoint, relaxing missing keys the tree no longer
    /// defines.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<LoadReport, StateError> {
        let state = load_checkpoint(path)?;
        self.load_state_dict(&state)
    }

    /// Run the wrapped tree on an input.
    pub fn forward(&self, input: &Tensor) -> Tensor {
        self.module.forward(input)
    }

    /// Get reference to the wrapped tree.
    pub fn module(&self) -> &M {
        &self.module
    }

    /// Get mutable reference to the wrapped tree.
    pub fn module_mut(&mut self) -> &mut M {
        &mut self.module
    }

    /// Unwrap the tree.
    pub fn into_inner(self) -> M {
        self.module
    }
}
