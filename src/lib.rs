//! Configuration and lifecycle core for a component-based simulation
//! framework.
//!
//! Two subsystems live here. The first is a cascading configuration tree:
//! named layers form ascending priority tiers, every written value carries a
//! provenance marker, and reads resolve to the highest-priority layer holding
//! an entry. The second is a component manager that applies each registered
//! component's declared default configuration to a shared tree, validates
//! that defaults contributed by different components do not silently
//! conflict, and drives every component through its setup stage — including
//! components registered by other components' setup callbacks while the
//! worklist is being drained.
//!
//! ```rust
//! use microcosm::ConfigTree;
//! use serde_json::json;
//!
//! # fn main() -> microcosm::MicrocosmResult<()> {
//! let mut config = ConfigTree::new(["inner", "outer"]);
//! config.update(json!({"section": {"item": 1}}), Some("inner"), "defaults")?;
//! config.update(json!({"section": {"item": 2}}), Some("outer"), "override")?;
//! assert_eq!(config.subtree("section")?.get("item")?, &json!(2));
//! # Ok(())
//! # }
//! ```

mod component;
mod config;
mod error;

pub use component::{
    BoxedComponent, Component, ComponentList, ComponentManager, ComponentSlot, SetupBuilder,
};
pub use config::{ConfigChild, ConfigNode, ConfigTree, ProvenanceEntry};
pub use error::{ErrorKind, MicrocosmError, MicrocosmResult};

/// Lowest-priority layer holding framework-supplied baseline values.
pub const BASE_LAYER: &str = "base";
/// Layer receiving default configuration declared by components.
pub const COMPONENT_DEFAULTS_LAYER: &str = "component_defaults";
/// Layer for model-level overrides of component defaults.
pub const MODEL_OVERRIDE_LAYER: &str = "model_override";
/// Highest-priority layer, reserved for user-supplied overrides.
pub const USER_OVERRIDE_LAYER: &str = "user_override";

/// Returns the standard four-tier layer stack used by simulation bootstrap
/// code, in ascending priority order.
#[must_use]
pub fn standard_layers() -> Vec<String> {
    [
        BASE_LAYER,
        COMPONENT_DEFAULTS_LAYER,
        MODEL_OVERRIDE_LAYER,
        USER_OVERRIDE_LAYER,
    ]
    .iter()
    .map(|&layer| layer.to_owned())
    .collect()
}

/// Builds an empty configuration tree over [`standard_layers`], ready to be
/// handed to [`ComponentManager::setup`].
#[must_use]
pub fn simulation_configuration() -> ConfigTree {
    ConfigTree::with_name("simulation_configuration", standard_layers())
}
