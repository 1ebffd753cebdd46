//! Lazy enumeration of a module's direct children
//!
//! The iterator snapshots the child registry at construction, so an
//! in-flight iteration is insensitive to later structural changes to the
//! parent. Descriptors (global name, class name, has-children flag) are
//! computed lazily per element.

use super::{qualify, Module};

/// Descriptor for one direct child of a module.
pub struct ChildEntry<'a> {
    /// Local name within the parent's registry.
    pub name: String,
    /// Dotted path from the root, `parent.name`, or just `name` at the root.
    pub global_name: String,
    /// Runtime class name of the child.
    pub class_name: &'static str,
    /// The child itself.
    pub module: &'a dyn Module,
    /// Whether the child has direct children of its own.
    pub has_children: bool,
}

/// Iterator over the direct children of a module.
///
/// Finite and non-restartable; yields exactly one [`ChildEntry`] per child
/// present when the iterator was created, in registration order.
pub struct ModuleIterator<'a> {
    entries: std::vec::IntoIter<(String, &'a dyn Module)>,
    parent_name: String,
}

impl<'a> ModuleIterator<'a> {
    /// Create an iterator over `module`'s direct children.
    ///
    /// `parent_name` is the dotted global name of `module` itself; pass
    /// `""` when iterating the root.
    pub fn new(module: &'a dyn Module, parent_name: &str) -> Self {
        let entries: Vec<(String, &'a dyn Module)> = module
            .children()
            .into_iter()
            .map(|(name, child)| (name.to_string(), child))
            .collect();
        Self { entries: entries.into_iter(), parent_name: parent_name.to_string() }
    }
}

impl<'a> Iterator for ModuleIterator<'a> {
    type Item = ChildEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (name, module) = self.entries.next()?;
        let global_name = qualify(&self.parent_name, &name);
        Some(ChildEntry {
            global_name,
            class_name: module.class_name(),
            has_children: !module.children().is_empty(),
            name,
            module,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl ExactSizeIterator for ModuleIterator<'_> {}
