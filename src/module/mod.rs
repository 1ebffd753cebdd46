//! Module tree capability set
//!
//! A module is a node in an ordered, named tree of parameter owners. The
//! fine-tuning pass only needs a narrow surface from each node: its runtime
//! class name, its direct children, its direct parameters and buffers, a
//! child-replacement seam for strategies, and the fine-tunable capability
//! marker that guards against double application.

mod iterator;


pub use iterator::{ChildEntry, ModuleIterator};

use crate::Tensor;
use std::any::Any;

/// Capability set every tree node implements.
///
/// Leaves get the default empty-children behavior for free; containers
/// override the children accessors and `replace_child`.
pub trait Module: Any {
    /// Runtime class name, used for strategy matching and diagnostics.
    fn class_name(&self) -> &'static str;

    /// Direct children in registration order. Names are unique among
    /// siblings.
    fn children(&self) -> Vec<(&str, &dyn Module)> {
        Vec::new()
    }

    /// Mutable view of the direct children, same order as [`children`].
    ///
    /// [`children`]: Module::children
    fn children_mut(&mut self) -> Vec<(&str, &mut dyn Module)> {
        Vec::new()
    }

    /// Swap the named child for `module`, returning the previous occupant.
    ///
    /// Returns the replacement back as `Err` when no child of that name
    /// exists; leaves never match.
    fn replace_child(
        &mut self,
        _name: &str,
        module: Box<dyn Module>,
    ) -> Result<Box<dyn Module>, Box<dyn Module>> {
        Err(module)
    }

    /// Directly owned parameters in declaration order.
    fn parameters(&self) -> Vec<(&'static str, &Tensor)> {
        Vec::new()
    }

    /// Mutable view of the directly owned parameters.
    fn parameters_mut(&mut self) -> Vec<(&'static str, &mut Tensor)> {
        Vec::new()
    }

    /// Directly owned persisted non-parameter tensors (running statistics
    /// and the like). Trainability is not defined for buffers.
    fn buffers(&self) -> Vec<(&'static str, &Tensor)> {
        Vec::new()
    }

    /// Mutable view of the directly owned buffers.
    fn buffers_mut(&mut self) -> Vec<(&'static str, &mut Tensor)> {
        Vec::new()
    }

    /// Capability marker: true once a fine-tuning strategy has installed
    /// this node. Marked nodes configure their own trainability and must
    /// never be handed to a strategy again.
    fn is_finetuable(&self) -> bool {
        false
    }

    /// Run the module on an input tensor.
    fn forward(&self, input: &Tensor) -> Tensor;

    /// Downcast seam for strategies that need the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast seam.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Join a parent path and a local name into a dotted global name.
///
/// An empty parent denotes the root, so the local name stands alone.
pub(crate) fn qualify(parent_name: &str, name: &str) -> String {
    if parent_name.is_empty() {
        name.to_string()
    } else {
        format!("{parent_name}.{name}")
    }
}

/// Whether the module has any direct children.
pub fn has_children(module: &dyn Module) -> bool {
    !module.children().is_empty()
}

/// Clear the trainability flag on every parameter owned by the module and
/// its whole subtree.
pub fn freeze_module(module: &mut dyn Module) {
    for (_, tensor) in module.parameters_mut() {
        tensor.set_requires_grad(false);
    }
    for (_, child) in module.children_mut() {
        freeze_module(child);
    }
}

/// All parameters in the subtree with dotted global names, depth-first:
/// direct parameters first, then each child in registration order.
///
/// `parent_name` is the module's own global name; pass `""` for the root.
pub fn named_parameters<'a>(
    module: &'a dyn Module,
    parent_name: &str,
) -> Vec<(String, &'a Tensor)> {
    let mut out = Vec::new();
    for (name, tensor) in module.parameters() {
        out.push((qualify(parent_name, name), tensor));
    }
    for child in ModuleIterator::new(module, parent_name) {
        out.extend(named_parameters(child.module, &child.global_name));
    }
    out
}

/// All buffers in the subtree with dotted global names, same traversal
/// order as [`named_parameters`].
pub fn named_buffers<'a>(module: &'a dyn Module, parent_name: &str) -> Vec<(String, &'a Tensor)> {
    let mut out = Vec::new();
    for (name, tensor) in module.buffers() {
        out.push((qualify(parent_name, name), tensor));
    }
    for child in ModuleIterator::new(module, parent_name) {
        out.extend(named_buffers(child.module, &child.global_name));
    }
    out
}

/// The parameters an optimizer should see: every tensor in the subtree
/// whose requires-grad flag is still set.
pub fn trainable_parameters(module: &dyn Module) -> Vec<(String, &Tensor)> {
    named_parameters(module, "")
        .into_iter()
        .filter(|(_, tensor)| tensor.requires_grad())
        .collect()
}

/// Visit every parameter in the subtree mutably, depth-first, with its
/// dotted global name. One tensor is borrowed at a time, which keeps the
/// traversal usable for in-place updates (optimizer steps, freezing).
pub fn for_each_parameter_mut(
    module: &mut dyn Module,
    parent_name: &str,
    f: &mut dyn FnMut(&str, &mut Tensor),
) {
    for (name, tensor) in module.parameters_mut() {
        f(&qualify(parent_name, name), tensor);
    }
    for (name, child) in module.children_mut() {
        let global_name = qualify(parent_name, name);
        for_each_parameter_mut(child, &global_name, f);
    }
}
