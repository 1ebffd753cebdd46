//! Ordered container of named child modules

use crate::module::Module;
use crate::Tensor;
use std::any::Any;

/// Container that runs its children in registration order.
///
/// Child names are unique among siblings; registration order is the
/// iteration, traversal, and state-dict order.
#[derive(Default)]
pub struct Sequential {
    children: Vec<(String, Box<dyn Module>)>,
}

impl Sequential {
    /// Create an empty container.
    pub fn new() -> Self {
        Self { children: Vec::new() }
    }

    /// Register a child under `name`.
    ///
    /// # Panics
    /// Panics when a sibling of the same name is already registered.
    pub fn push(&mut self, name: impl Into<String>, module: Box<dyn Module>) {
        let name = name.into();
        assert!(
            !self.children.iter().any(|(existing, _)| *existing == name),
            "Duplicate child name: {name}"
        );
        self.children.push((name, module));
    }

    /// Builder-style [`push`](Sequential::push).
    pub fn with(mut self, name: impl Into<String>, module: Box<dyn Module>) -> Self {
        self.push(name, module);
        self
    }

    /// Look up a direct child by name.
    pub fn get(&self, name: &str) -> Option<&dyn Module> {
        self.children
            .iter()
            .find(|(child_name, _)| child_name == name)
            .map(|(_, module)| module.as_ref())
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether the container has no children.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl Module for Sequential {
    fn class_name(&self) -> &'static str {
        "Sequential"
    }

    fn children(&self) -> Vec<(&str, &dyn Module)> {
        self.children
            .iter()
            .map(|(name, module)| (name.as_str(), module.as_ref()))
            .collect()
    }

    fn children_mut(&mut self) -> Vec<(&str, &mut dyn Module)> {
        self.children
            .iter_mut()
            .map(|(name, module)| (name.as_str(), module.as_mut()))
            .collect()
    }

    fn replace_child(
        &mut self,
        name: &str,
        module: Box<dyn Module>,
    ) -> Result<Box<dyn Module>, Box<dyn Module>> {
        match self.children.iter_mut().find(|(child_name, _)| child_name == name) {
            Some((_, slot)) => Ok(std::mem::replace(slot, module)),
            None => Err(module),
        }
    }

    fn forward(&self, input: &Tensor) -> Tensor {
        let mut current = input.clone();
        for (_, child) in &self.children {
            current = child.forward(&current);
        }
        current
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
