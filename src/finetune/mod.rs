//! Selective fine-tuning transformation
//!
//! The transformation pass walks a module tree depth-first, hands every
//! child to a [`FineTuningStrategy`](crate::strategy::FineTuningStrategy),
//! and freezes whatever no strategy claims. The resulting [`FineTuned`]
//! wrapper filters checkpoints down to trainable entries and tolerates
//! checkpoints that predate the transformation.
//!
//! # Policy
//!
//! Everything becomes frozen unless a strategy explicitly claims it and
//! configures its own trainability. Unmatched composites are descended
//! into; unmatched leaves have no further chance to be claimed and are
//! frozen on the spot.

mod enable;
mod error;
mod hooks;
mod modify;

#[cfg(test)]
mod tests;

pub use enable::{enable_fine_tuning, FineTuned};
pub use error::FineTuneError;
pub use hooks::{relax_missing_keys, strip_untrainable};
pub use modify::modify_modules;
