//! Fine-tuning strategies
//!
//! A strategy is the policy half of the transformation pass: per child it
//! decides whether to claim the node, and may swap the child in the
//! parent's registry for a fine-tunable replacement. The traversal in
//! [`crate::finetune`] supplies the mechanism.

mod lora;


pub use lora::{LoraLinear, LoraStrategy};

use crate::finetune::FineTuneError;
use crate::module::Module;

/// Names identifying the child a strategy is being asked about.
#[derive(Debug, Clone, Copy)]
pub struct ChildMeta<'a> {
    /// Local name within the parent's registry.
    pub name: &'a str,
    /// Dotted path from the root.
    pub global_name: &'a str,
    /// Runtime class name of the child.
    pub class_name: &'a str,
}

/// Policy callback applied to every node the transformation pass visits.
///
/// The strategy receives the parent so it can read the child (via
/// [`Module::children`] or a downcast) and install a replacement through
/// [`Module::replace_child`]. Returning `Ok(true)` claims the node: the
/// pass will neither descend into it nor freeze a replacement that carries
/// the fine-tunable marker. Returning `Ok(false)` leaves the node to the
/// default policy (descend into composites, freeze leaves).
pub trait FineTuningStrategy {
    /// Decide whether to claim the child described by `child`.
    fn apply(
        &mut self,
        parent: &mut dyn Module,
        child: &ChildMeta<'_>,
    ) -> Result<bool, FineTuneError>;
}

impl<F> FineTuningStrategy for F
where
    F: FnMut(&mut dyn Module, &ChildMeta<'_>) -> Result<bool, FineTuneError>,
{
    fn apply(
        &mut self,
        parent: &mut dyn Module,
        child: &ChildMeta<'_>,
    ) -> Result<bool, FineTuneError> {
        self(parent, child)
    }
}
