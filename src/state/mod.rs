//! Module state serialization
//!
//! A state dict is the ordered snapshot of every parameter and buffer in a
//! module tree, keyed by dotted global name. Production order is
//! depth-first: a module's direct parameters, then its direct buffers,
//! then each child in registration order.

mod checkpoint;
mod error;


pub use checkpoint::{load_checkpoint, save_checkpoint};
pub use error::StateError;

use crate::module::{qualify, Module, ModuleIterator};
use crate::Tensor;
use serde::{Deserialize, Serialize};

/// Ordered mapping from dotted global names to tensors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDict {
    entries: Vec<(String, Tensor)>,
}

impl StateDict {
    /// Create an empty state dict.
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Append an entry, or overwrite in place when the key exists.
    pub fn insert(&mut self, key: impl Into<String>, tensor: Tensor) {
        let key = key.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = tensor,
            None => self.entries.push((key, tensor)),
        }
    }

    /// Look up an entry by key.
    pub fn get(&self, key: &str) -> Option<&Tensor> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, tensor)| tensor)
    }

    /// Whether the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(existing, _)| existing == key)
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.entries.iter().map(|(key, tensor)| (key.as_str(), tensor))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the state dict holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Snapshot the full state of a module tree: parameters and buffers,
/// depth-first, keyed by dotted global name.
pub fn state_dict(module: &dyn Module) -> StateDict {
    let mut out = StateDict::new();
    collect(module, "", &mut out);
    out
}

fn collect(module: &dyn Module, parent_name: &str, out: &mut StateDict) {
    for (name, tensor) in module.parameters() {
        out.insert(qualify(parent_name, name), tensor.clone());
    }
    for (name, tensor) in module.buffers() {
        out.insert(qualify(parent_name, name), tensor.clone());
    }
    for child in ModuleIterator::new(module, parent_name) {
        collect(child.module, &child.global_name, out);
    }
}

/// Outcome of a state-dict load: which expected keys the input lacked, and
/// which input keys the module does not define.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    /// Keys the module defines that were absent from the input.
    pub missing_keys: Vec<String>,
    /// Input keys the module does not define. Never written to the tree.
    pub unexpected_keys: Vec<String>,
}

impl LoadReport {
    /// True when every expected key was found and nothing was left over.
    pub fn is_clean(&self) -> bool {
        self.missing_keys.is_empty() && self.unexpected_keys.is_empty()
    }
}

/// Copy matching entries of `state` into the module tree.
///
/// Tensor values are overwritten; trainability flags on the tree are left
/// untouched. Fails on the first length mismatch between an entry and the
/// tensor it targets, leaving earlier copies applied.
pub fn load_state_dict(
    module: &mut dyn Module,
    state: &StateDict,
) -> Result<LoadReport, StateError> {
    let expected: Vec<String> = state_dict(module).keys().map(String::from).collect();

    let missing_keys: Vec<String> =
        expected.iter().filter(|key| !state.contains_key(key.as_str())).cloned().collect();
    let unexpected_keys: Vec<String> = state
        .keys()
        .filter(|key| !expected.iter().any(|expected_key| expected_key == key))
        .map(String::from)
        .collect();

    apply(module, "", state)?;

    Ok(LoadReport { missing_keys, unexpected_keys })
}

fn apply(module: &mut dyn Module, parent_name: &str, state: &StateDict) -> Result<(), StateError> {
    for (name, tensor) in module.parameters_mut() {
        copy_entry(&qualify(parent_name, name), tensor, state)?;
    }
    for (name, tensor) in module.buffers_mut() {
        copy_entry(&qualify(parent_name, name), tensor, state)?;
    }
    for (name, child) in module.children_mut() {
        let global_name = qualify(parent_name, name);
        apply(child, &global_name, state)?;
    }
    Ok(())
}

fn copy_entry(key: &str, target: &mut Tensor, state: &StateDict) -> Result<(), StateError> {
    let Some(source) = state.get(key) else {
        return Ok(());
    };
    if source.len() != target.len() {
        return Err(StateError::SizeMismatch {
            key: key.to_string(),
            expected: target.len(),
            actual: source.len(),
        });
    }
    *target.data_mut() = source.data().clone();
    Ok(())
}
