//! Component manager: defaults merging, conflict detection, and the setup
//! worklist.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::debug;

use crate::COMPONENT_DEFAULTS_LAYER;
use crate::config::{ConfigChild, ConfigTree, join_path, shape_of};
use crate::error::{MicrocosmError, MicrocosmResult};

use super::{BoxedComponent, ComponentList, SetupBuilder, source_marker};

/// Lifecycle progress of a component during a setup traversal.
///
/// Transitions are monotonic and idempotent: a component that is already
/// `Configured` or `Done` is never configured or set up a second time, even
/// when it is re-registered mid-traversal.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
enum LifecycleState {
    Unprocessed,
    Configured,
    Done,
}

/// Owns the manager and component lists of a simulation and drives their
/// setup stage.
///
/// Managers are configured and set up before components. Setting up a list
/// merges each member's declared default configuration into the shared
/// tree's component-defaults layer (validating that contributions from
/// different components agree, see [`ComponentManager::setup`]) and then
/// drains the list FIFO, invoking each member's setup callback with a
/// [`SetupBuilder`]. A callback may register further components onto the
/// list being drained; they are configured and set up before the traversal
/// finishes.
#[derive(Default)]
pub struct ComponentManager {
    managers: ComponentList,
    components: ComponentList,
}

impl ComponentManager {
    /// Creates a manager with empty lists.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager around pre-assembled lists. Null slots in either
    /// list are detected when [`ComponentManager::setup`] dequeues them.
    #[must_use]
    pub fn from_lists(managers: ComponentList, components: ComponentList) -> Self {
        Self {
            managers,
            components,
        }
    }

    /// Registers a framework manager. Managers are configured and set up
    /// before components.
    ///
    /// # Errors
    ///
    /// Returns [`MicrocosmError::NamelessComponent`] or
    /// [`MicrocosmError::DuplicateName`] when the membership checks fail.
    pub fn add_manager(&mut self, manager: BoxedComponent) -> MicrocosmResult<()> {
        self.managers.push(manager)
    }

    /// Registers a component.
    ///
    /// # Errors
    ///
    /// As [`ComponentManager::add_manager`].
    pub fn add_component(&mut self, component: BoxedComponent) -> MicrocosmResult<()> {
        self.components.push(component)
    }

    /// Registers several components in order, stopping at the first
    /// rejection.
    ///
    /// # Errors
    ///
    /// As [`ComponentManager::add_manager`].
    pub fn add_components<I>(&mut self, components: I) -> MicrocosmResult<()>
    where
        I: IntoIterator<Item = BoxedComponent>,
    {
        self.components.extend_checked(components)
    }

    /// Configures and sets up the managers list, then the components list.
    ///
    /// `configuration` must declare the [`COMPONENT_DEFAULTS_LAYER`] layer;
    /// every component's declared defaults are merged there before its setup
    /// callback runs. Termination relies on setup callbacks eventually
    /// ceasing to register new components; a perpetually self-registering
    /// callback is a caller bug the manager does not detect.
    ///
    /// # Errors
    ///
    /// - [`MicrocosmError::UnknownLayer`] when the tree lacks the
    ///   component-defaults layer.
    /// - [`MicrocosmError::DuplicateName`] when a raw list holds two
    ///   distinct members sharing a name; nothing is merged or set up.
    /// - [`MicrocosmError::NullComponent`] when a null slot is dequeued;
    ///   members still queued behind it are not set up.
    /// - [`MicrocosmError::DuplicatedDefault`] or
    ///   [`MicrocosmError::StructuralConflict`] when two components disagree
    ///   about a default (see the crate-level docs for the tolerance rules).
    /// - Any error returned by a component's setup callback.
    pub fn setup(&mut self, configuration: &mut ConfigTree) -> MicrocosmResult<()> {
        if !configuration.has_layer(COMPONENT_DEFAULTS_LAYER) {
            return Err(MicrocosmError::UnknownLayer {
                layer: COMPONENT_DEFAULTS_LAYER.into(),
                key: configuration.name().to_owned(),
            });
        }
        self.managers = setup_list(std::mem::take(&mut self.managers), configuration)?;
        self.components = setup_list(std::mem::take(&mut self.components), configuration)?;
        Ok(())
    }

    /// The managers list, in processing order after setup.
    #[must_use]
    pub const fn managers(&self) -> &ComponentList {
        &self.managers
    }

    /// The components list, in processing order after setup.
    #[must_use]
    pub const fn components(&self) -> &ComponentList {
        &self.components
    }

    /// Looks up a live component by name, searching components before
    /// managers.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn super::Component> {
        self.components
            .components()
            .chain(self.managers.components())
            .find(|component| component.name() == name)
    }
}

/// Configures and sets up one component list against `configuration`,
/// returning the processed members in traversal order.
///
/// The worklist protocol:
/// 1. Reject lists whose live members share a name. The checked mutators
///    already enforce this, so only raw [`ComponentList::from_slots`] lists
///    can fail here; without the check, name-keyed lifecycle tracking would
///    silently drop the second instance and its defaults.
/// 2. Pre-pass, in list order: merge declared defaults for every member not
///    yet configured.
/// 3. Drain FIFO: a null slot fails immediately; members registered
///    mid-traversal get their defaults merged on dequeue; each member's
///    setup callback runs exactly once, with the drained list itself
///    reachable through the builder.
fn setup_list(
    mut worklist: ComponentList,
    configuration: &mut ConfigTree,
) -> MicrocosmResult<ComponentList> {
    let mut seen: HashSet<&str> = HashSet::new();
    for component in worklist.components() {
        if !seen.insert(component.name()) {
            return Err(MicrocosmError::DuplicateName {
                name: component.name().to_owned(),
            });
        }
    }

    let mut states: HashMap<String, LifecycleState> = HashMap::new();

    for component in worklist.components() {
        if state_of(&states, component.name()) < LifecycleState::Configured {
            if let Some(defaults) = component.configuration_defaults() {
                apply_component_defaults(configuration, component.name(), defaults)?;
            }
            states.insert(component.name().to_owned(), LifecycleState::Configured);
        }
    }

    let mut finished = ComponentList::new();
    while let Some(slot) = worklist.pop_front() {
        let Some(mut component) = slot else {
            return Err(MicrocosmError::NullComponent);
        };
        let name = component.name().to_owned();
        if name.is_empty() {
            return Err(MicrocosmError::NamelessComponent);
        }

        if state_of(&states, &name) < LifecycleState::Configured {
            if let Some(defaults) = component.configuration_defaults() {
                apply_component_defaults(configuration, &name, defaults)?;
            }
            states.insert(name.clone(), LifecycleState::Configured);
        }

        if state_of(&states, &name) < LifecycleState::Done {
            debug!(component = %name, "running setup");
            let mut builder = SetupBuilder::new(configuration, &mut worklist);
            component.on_setup(&mut builder)?;
            states.insert(name.clone(), LifecycleState::Done);
            finished.push(component)?;
        }
        // A re-registered instance that is already Done is dropped here; the
        // finished list keeps the first occurrence.
    }
    Ok(finished)
}

/// Validates and merges one component's declared defaults into the shared
/// component-defaults layer.
fn apply_component_defaults(
    configuration: &mut ConfigTree,
    name: &str,
    defaults: Value,
) -> MicrocosmResult<()> {
    let source = source_marker(name);
    let Value::Object(mut map) = defaults else {
        return Err(MicrocosmError::InvalidUpdate {
            key: source,
            found: shape_of(&defaults),
        });
    };
    debug!(component = %name, "merging default configuration");
    check_defaults_conflict(&mut map, configuration, &source)?;
    configuration.update(
        Value::Object(map),
        Some(COMPONENT_DEFAULTS_LAYER),
        &source,
    )
}

/// Walks the keys shared between `defaults` and `tree`, failing on any
/// disagreement about shape or value.
///
/// Tolerance rules: a key entirely new to the defaults layer never
/// conflicts, and equal scalars are a harmless re-application (this also
/// covers re-registering the same component). Everything else, differing
/// scalars (falsy values such as zero or the empty string included) or a map
/// on one side and a scalar on the other, is an error naming the dotted key
/// path and both contributing sources.
///
/// Equal re-applications are removed from `defaults` so the subsequent merge
/// does not re-attribute the entry; the first contributor stays on record.
fn check_defaults_conflict(
    defaults: &mut Map<String, Value>,
    tree: &ConfigTree,
    source: &str,
) -> MicrocosmResult<()> {
    let mut already_present = Vec::new();
    for (key, incoming) in defaults.iter_mut() {
        let Some(child) = tree.child(key) else {
            continue;
        };
        let path = join_path(tree.name(), key);
        match (child, incoming) {
            (ConfigChild::Tree(subtree), Value::Object(nested)) => {
                check_defaults_conflict(nested, subtree, source)?;
            }
            (ConfigChild::Tree(_), scalar) => {
                return Err(MicrocosmError::StructuralConflict {
                    key: path,
                    existing: "a nested section",
                    incoming: shape_of(scalar),
                    first_source: String::from("existing nested configuration"),
                    second_source: source.to_owned(),
                });
            }
            (ConfigChild::Node(node), Value::Object(_)) => {
                return Err(MicrocosmError::StructuralConflict {
                    key: path,
                    existing: "a value",
                    incoming: "a nested section",
                    first_source: node
                        .resolved_source()
                        .map_or_else(|| String::from("existing configuration"), ToOwned::to_owned),
                    second_source: source.to_owned(),
                });
            }
            (ConfigChild::Node(node), scalar) => {
                let Ok(existing) = node.get_from_layer(COMPONENT_DEFAULTS_LAYER) else {
                    // Present in other layers only; the defaults layer is
                    // still free for this key.
                    continue;
                };
                let first_source = node
                    .source_at_layer(COMPONENT_DEFAULTS_LAYER)
                    .unwrap_or("unknown")
                    .to_owned();
                if *existing == *scalar {
                    already_present.push(key.clone());
                    continue;
                }
                return Err(MicrocosmError::DuplicatedDefault {
                    key: path,
                    first_source,
                    second_source: source.to_owned(),
                    first: existing.to_string(),
                    second: scalar.to_string(),
                });
            }
        }
    }
    for key in already_present {
        defaults.remove(&key);
    }
    Ok(())
}

fn state_of(states: &HashMap<String, LifecycleState>, name: &str) -> LifecycleState {
    states
        .get(name)
        .copied()
        .unwrap_or(LifecycleState::Unprocessed)
}
