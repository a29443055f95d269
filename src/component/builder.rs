//! Restricted façade handed to setup callbacks.

use crate::config::ConfigTree;
use crate::error::MicrocosmResult;

use super::{BoxedComponent, ComponentList};

/// The handle a component receives during its setup callback.
///
/// It exposes exactly two framework services: the shared configuration tree
/// and an append-only view of the worklist currently being drained, so a
/// component's setup may register further components. Anything appended here
/// is configured and set up before the manager's traversal finishes.
pub struct SetupBuilder<'a> {
    configuration: &'a mut ConfigTree,
    worklist: &'a mut ComponentList,
}

impl<'a> SetupBuilder<'a> {
    pub(crate) fn new(configuration: &'a mut ConfigTree, worklist: &'a mut ComponentList) -> Self {
        Self {
            configuration,
            worklist,
        }
    }

    /// The shared configuration tree, with all defaults merged so far.
    /// Contributions from components processed earlier are already visible.
    #[must_use]
    pub fn configuration(&self) -> &ConfigTree {
        self.configuration
    }

    /// Mutable access to the shared configuration tree, subject to the
    /// tree's own write discipline.
    #[must_use]
    pub fn configuration_mut(&mut self) -> &mut ConfigTree {
        self.configuration
    }

    /// Registers a component onto the worklist being drained.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MicrocosmError::NamelessComponent`] or
    /// [`crate::MicrocosmError::DuplicateName`] when the component fails the
    /// membership checks of the underlying list.
    pub fn add_component(&mut self, component: BoxedComponent) -> MicrocosmResult<()> {
        self.worklist.push(component)
    }

    /// Registers several components in order, stopping at the first
    /// rejection.
    ///
    /// # Errors
    ///
    /// As [`SetupBuilder::add_component`].
    pub fn add_components<I>(&mut self, components: I) -> MicrocosmResult<()>
    where
        I: IntoIterator<Item = BoxedComponent>,
    {
        self.worklist.extend_checked(components)
    }
}
