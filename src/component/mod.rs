//! Pluggable components and the manager that drives their setup stage.

mod builder;
mod list;
mod manager;

use serde_json::Value;

use crate::error::MicrocosmResult;

pub use builder::SetupBuilder;
pub use list::ComponentList;
pub use manager::ComponentManager;

/// Owned handle to a registered component.
pub type BoxedComponent = Box<dyn Component>;

/// A component list slot. `None` models a factory that forgot to return a
/// component; the manager fails loudly when it dequeues one.
pub type ComponentSlot = Option<BoxedComponent>;

/// A pluggable unit of simulation behaviour.
///
/// Components carry a stable unique name, may declare default configuration
/// to be merged into the shared tree before any setup callback runs, and may
/// implement a setup callback that receives a [`SetupBuilder`] exposing the
/// resolved configuration and the ability to register further components.
pub trait Component {
    /// Stable, unique name of this component. Also serves as the provenance
    /// marker attached to the component's default configuration.
    fn name(&self) -> &str;

    /// Default configuration declared by this component, as a string-keyed
    /// map of scalars or further maps. Returning `None` skips the
    /// configuration stage entirely.
    fn configuration_defaults(&self) -> Option<Value> {
        None
    }

    /// Setup callback, invoked exactly once per component while the manager
    /// drains its worklist.
    ///
    /// # Errors
    ///
    /// Implementations may fail with any [`crate::MicrocosmError`]; the
    /// failure aborts the setup traversal.
    fn on_setup(&mut self, builder: &mut SetupBuilder<'_>) -> MicrocosmResult<()> {
        let _ = builder;
        Ok(())
    }
}

/// Provenance marker recorded for a component's default configuration.
pub(crate) fn source_marker(name: &str) -> String {
    format!("component '{name}'")
}
