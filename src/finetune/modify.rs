//! Recursive strategy-driven tree rewrite

use super::FineTuneError;
use crate::module::{freeze_module, qualify, Module};
use crate::strategy::{ChildMeta, FineTuningStrategy};

/// Apply `strategy` to every node in the tree rooted at `module`,
/// replacing or freezing nodes as the policy dictates.
///
/// `parent_name` is the dotted global name of `module` itself; pass `""`
/// for the root. Per child, in order:
///
/// 1. A child already carrying the fine-tunable marker aborts with
///    [`FineTuneError::AlreadyFinetuable`] naming its global path.
/// 2. The strategy runs and may swap the child in the registry.
/// 3. If the strategy did not match and the (possibly replaced) child has
///    children of its own, the walk descends into it.
/// 4. In every other case the child is frozen — matched or not — unless
///    the current occupant carries the fine-tunable marker, in which case
///    the strategy's replacement is trusted to have configured its own
///    trainability.
///
/// The exception in step 4 is deliberate: a matched child the strategy
/// configured in place (no marked replacement installed) is still frozen,
/// exactly like an unmatched leaf. Strategies that want to keep tensors
/// trainable must install a marked replacement.
pub fn modify_modules(
    module: &mut dyn Module,
    strategy: &mut dyn FineTuningStrategy,
    parent_name: &str,
) -> Result<(), FineTuneError> {
    // Snapshot the names so strategy-installed replacements do not
    // perturb the walk.
    let names: Vec<String> =
        module.children().into_iter().map(|(name, _)| name.to_string()).collect();

    for name in names {
        let global_name = qualify(parent_name, &name);

        let Some((class_name, finetuable)) = child_ref(module, &name)
            .map(|child| (child.class_name(), child.is_finetuable()))
        else {
            // A strategy removed this sibling; nothing left to decide.
            continue;
        };
        if finetuable {
            return Err(FineTuneError::AlreadyFinetuable { name: global_name });
        }

        let meta = ChildMeta { name: &name, global_name: &global_name, class_name };
        let matched = strategy.apply(module, &meta)?;

        // Re-read the registry: the strategy may have swapped the child.
        let (has_children, marked) = child_ref(module, &name)
            .map(|child| (!child.children().is_empty(), child.is_finetuable()))
            .unwrap_or((false, false));

        if !matched && has_children {
            log::debug!("descending into {global_name}");
            if let Some(child) = child_mut(module, &name) {
                modify_modules(child, strategy, &global_name)?;
            }
        } else if marked {
            log::debug!("{global_name} claimed by strategy, left trainable as configured");
        } else {
            log::debug!("freezing {global_name} (matched: {matched})");
            if let Some(child) = child_mut(module, &name) {
                freeze_module(child);
            }
        }
    }

    Ok(())
}

fn child_ref<'a>(module: &'a dyn Module, name: &str) -> Option<&'a dyn Module> {
    module
        .children()
        .into_iter()
        .find(|(child_name, _)| *child_name == name)
        .map(|(_, child)| child)
}

fn child_mut<'a>(module: &'a mut dyn Module, name: &str) -> Option<&'a mut dyn Module> {
    module
        .children_mut()
        .into_iter()
        .find(|(child_name, _)| *child_name == name)
        .map(|(_, child)| child)
}
