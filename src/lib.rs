//! Selective fine-tuning for hierarchical module trees.
//!
//! This crate provides tools for:
//! - Strategy-driven replacement of layers with fine-tunable variants
//! - Freezing everything no strategy claims
//! - Checkpoints restricted to trainable parameters, with relaxed loading
//!   of pre-transformation checkpoints
//!
//! # Example
//!
//! ```
//! use afinar::nn::{Linear, Sequential};
//! use afinar::strategy::LoraStrategy;
//! use afinar::enable_fine_tuning;
//!
//! let model = Sequential::new()
//!     .with("encoder", Box::new(Linear::new(4, 4)))
//!     .with("head", Box::new(Linear::new(2, 4)));
//!
//! let mut strategy = LoraStrategy::new(2, 4.0);
//! let tuned = enable_fine_tuning(model, &mut strategy, true).unwrap();
//!
//! // Only the LoRA adaptation matrices remain trainable.
//! assert!(tuned.parameters().iter().all(|(name, _)| name.contains("lora")));
//! ```

pub mod finetune;
pub mod module;
pub mod nn;
pub mod state;
pub mod strategy;
mod tensor;

pub use finetune::{
    enable_fine_tuning, modify_modules, relax_missing_keys, strip_untrainable, FineTuneError,
    FineTuned,
};
pub use module::{
    for_each_parameter_mut, freeze_module, has_children, named_buffers, named_parameters,
    trainable_parameters, ChildEntry, Module, ModuleIterator,
};
pub use state::{
    load_checkpoint, load_state_dict, save_checkpoint, state_dict, LoadReport, StateDict,
    StateError,
};
pub use strategy::{ChildMeta, FineTuningStrategy, LoraLinear, LoraStrategy};
pub use tensor::{matmul, Tensor};
