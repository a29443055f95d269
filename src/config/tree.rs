//! Recursive container of configuration nodes and nested trees.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde_json::{Map, Value};
use tracing::trace;

use crate::error::{MicrocosmError, MicrocosmResult};

use super::node::{ConfigNode, ProvenanceEntry};

/// A child slot in a [`ConfigTree`]: either a nested tree or a leaf node.
///
/// Whether a key is a subtree or a leaf is decided by the shape of the value
/// supplied when the key was first merged; later contributions must agree
/// with that shape.
#[derive(Clone, Debug)]
pub enum ConfigChild {
    /// An interior nested configuration section.
    Tree(ConfigTree),
    /// A leaf holding per-layer scalar values.
    Node(ConfigNode),
}

/// A cascading configuration tree.
///
/// The tree hides its layering from ordinary readers: [`ConfigTree::get`]
/// resolves a key to the value in the outermost layer where it appears,
/// while [`ConfigTree::provenance`] exposes the full written history for
/// diagnostics.
///
/// Merging with [`ConfigTree::update`] is the only operation that creates
/// keys. Probing with [`ConfigTree::contains`] or [`ConfigTree::child`]
/// never materialises state.
#[derive(Clone, Debug)]
pub struct ConfigTree {
    name: String,
    layers: Vec<String>,
    children: HashMap<String, ConfigChild>,
    frozen: bool,
}

impl ConfigTree {
    /// Creates an empty tree over the given layers, in ascending priority
    /// order. An empty layer list falls back to a single `"base"` layer.
    #[must_use]
    pub fn new<I, S>(layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_name("", layers)
    }

    /// Creates an empty named tree; the name prefixes the dotted key paths
    /// reported in errors.
    #[must_use]
    pub fn with_name<I, S>(name: impl Into<String>, layers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut layers: Vec<String> = layers.into_iter().map(Into::into).collect();
        if layers.is_empty() {
            layers.push(String::from("base"));
        }
        Self {
            name: name.into(),
            layers,
            children: HashMap::new(),
            frozen: false,
        }
    }

    /// Dotted path of this tree within its parent, empty for a root.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layer names in ascending priority order.
    #[must_use]
    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    /// Whether the given layer exists in this tree.
    #[must_use]
    pub fn has_layer(&self, layer: &str) -> bool {
        self.layers.iter().any(|candidate| candidate == layer)
    }

    /// Whether `key` exists in any layer. Probing never creates state.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.children.contains_key(key)
    }

    /// Direct child access, `None` when the key was never merged.
    #[must_use]
    pub fn child(&self, key: &str) -> Option<&ConfigChild> {
        self.children.get(key)
    }

    /// Iterates over the top-level keys of this tree, in no particular
    /// order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// Number of direct children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Whether the tree has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether the tree has been frozen against further writes.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Merges `data` into the tree at `layer` (default: the outermost,
    /// highest-priority layer), attributing every written value to `source`.
    ///
    /// `data` must be a string-keyed map; nested maps recurse into existing
    /// subtrees rather than replacing them, and scalars are written at the
    /// matching leaf. A `Value::Null` payload is accepted as an empty
    /// contribution.
    ///
    /// # Errors
    ///
    /// - [`MicrocosmError::InvalidUpdate`] when `data` is neither a map nor
    ///   null.
    /// - [`MicrocosmError::StructuralConflict`] when `data` disagrees with
    ///   the stored shape of a key (map versus scalar).
    /// - [`MicrocosmError::UnknownLayer`] when `layer` does not exist.
    /// - [`MicrocosmError::Frozen`] when the tree has been frozen.
    pub fn update(
        &mut self,
        data: Value,
        layer: Option<&str>,
        source: &str,
    ) -> MicrocosmResult<()> {
        match data {
            Value::Object(map) => self.update_map(map, layer, source),
            Value::Null => Ok(()),
            other => Err(MicrocosmError::InvalidUpdate {
                key: self.name.clone(),
                found: shape_of(&other),
            }),
        }
    }

    fn update_map(
        &mut self,
        map: Map<String, Value>,
        layer: Option<&str>,
        source: &str,
    ) -> MicrocosmResult<()> {
        if self.frozen {
            return Err(MicrocosmError::Frozen {
                key: self.name.clone(),
            });
        }
        trace!(tree = %self.name, %source, entries = map.len(), "merging configuration");
        for (key, value) in map {
            let path = join_path(&self.name, &key);
            match self.children.entry(key) {
                Entry::Vacant(slot) => match value {
                    Value::Object(nested) => {
                        let mut subtree = Self::with_name(path, self.layers.clone());
                        subtree.update_map(nested, layer, source)?;
                        slot.insert(ConfigChild::Tree(subtree));
                    }
                    scalar => {
                        let mut node = ConfigNode::new(path, self.layers.clone());
                        node.set(layer, source, scalar)?;
                        slot.insert(ConfigChild::Node(node));
                    }
                },
                Entry::Occupied(mut slot) => match (slot.get_mut(), value) {
                    (ConfigChild::Tree(subtree), Value::Object(nested)) => {
                        subtree.update_map(nested, layer, source)?;
                    }
                    (ConfigChild::Node(node), scalar @ (Value::Null
                    | Value::Bool(_)
                    | Value::Number(_)
                    | Value::String(_)
                    | Value::Array(_))) => {
                        node.set(layer, source, scalar)?;
                    }
                    (existing, incoming) => {
                        return Err(structural_conflict(&path, existing, &incoming, source));
                    }
                },
            }
        }
        Ok(())
    }

    /// Resolves the scalar stored at `key` from the outermost layer where it
    /// appears.
    ///
    /// # Errors
    ///
    /// Returns [`MicrocosmError::MissingValue`] when the key was never
    /// merged or holds no value, and [`MicrocosmError::NotAValue`] when the
    /// key is a nested section.
    pub fn get(&self, key: &str) -> MicrocosmResult<&Value> {
        match self.children.get(key) {
            Some(ConfigChild::Node(node)) => node.get(),
            Some(ConfigChild::Tree(_)) => Err(MicrocosmError::NotAValue {
                key: join_path(&self.name, key),
            }),
            None => Err(MicrocosmError::MissingValue {
                key: join_path(&self.name, key),
            }),
        }
    }

    /// Resolves the scalar stored at `key` in exactly `layer`, ignoring the
    /// cascade.
    ///
    /// # Errors
    ///
    /// As [`ConfigTree::get`], plus [`MicrocosmError::UnknownLayer`] when
    /// `layer` does not exist.
    pub fn get_from_layer(&self, key: &str, layer: &str) -> MicrocosmResult<&Value> {
        match self.children.get(key) {
            Some(ConfigChild::Node(node)) => node.get_from_layer(layer),
            Some(ConfigChild::Tree(_)) => Err(MicrocosmError::NotAValue {
                key: join_path(&self.name, key),
            }),
            None => Err(MicrocosmError::MissingValue {
                key: join_path(&self.name, key),
            }),
        }
    }

    /// Returns the nested section stored at `key` for chained access.
    ///
    /// # Errors
    ///
    /// Returns [`MicrocosmError::MissingValue`] when the key was never
    /// merged and [`MicrocosmError::NotASubtree`] when it holds a scalar.
    pub fn subtree(&self, key: &str) -> MicrocosmResult<&Self> {
        match self.children.get(key) {
            Some(ConfigChild::Tree(subtree)) => Ok(subtree),
            Some(ConfigChild::Node(_)) => Err(MicrocosmError::NotASubtree {
                key: join_path(&self.name, key),
            }),
            None => Err(MicrocosmError::MissingValue {
                key: join_path(&self.name, key),
            }),
        }
    }

    /// Mutable counterpart of [`ConfigTree::subtree`], so writes such as
    /// [`ConfigTree::set`] can reach leaves below the root.
    ///
    /// # Errors
    ///
    /// As [`ConfigTree::subtree`].
    pub fn subtree_mut(&mut self, key: &str) -> MicrocosmResult<&mut Self> {
        match self.children.get_mut(key) {
            Some(ConfigChild::Tree(subtree)) => Ok(subtree),
            Some(ConfigChild::Node(_)) => Err(MicrocosmError::NotASubtree {
                key: join_path(&self.name, key),
            }),
            None => Err(MicrocosmError::MissingValue {
                key: join_path(&self.name, key),
            }),
        }
    }

    /// Assigns `value` to an existing key on the outermost layer,
    /// attributing it to the source marker `"user update"`.
    ///
    /// This is write sugar over [`ConfigTree::update`]; it refuses to create
    /// top-level keys, so merging remains the only key-introducing
    /// operation.
    ///
    /// # Errors
    ///
    /// Returns [`MicrocosmError::MissingKey`] when `key` was never created
    /// by a merge, plus any error [`ConfigTree::update`] can produce.
    pub fn set(&mut self, key: &str, value: Value) -> MicrocosmResult<()> {
        if !self.children.contains_key(key) {
            return Err(MicrocosmError::MissingKey {
                key: join_path(&self.name, key),
            });
        }
        let mut map = Map::new();
        map.insert(key.to_owned(), value);
        self.update_map(map, None, "user update")
    }

    /// Returns the `(layer, source, value)` history of the leaf at `key`,
    /// in ascending layer-priority order.
    ///
    /// # Errors
    ///
    /// Returns [`MicrocosmError::MissingValue`] naming `key` when it was
    /// never merged, and [`MicrocosmError::NotAValue`] when it is a nested
    /// section.
    pub fn provenance(&self, key: &str) -> MicrocosmResult<Vec<ProvenanceEntry>> {
        match self.children.get(key) {
            Some(ConfigChild::Node(node)) => Ok(node.provenance()),
            Some(ConfigChild::Tree(_)) => Err(MicrocosmError::NotAValue {
                key: join_path(&self.name, key),
            }),
            None => Err(MicrocosmError::MissingValue {
                key: join_path(&self.name, key),
            }),
        }
    }

    /// Marks the tree and everything beneath it read-only. Freezing is
    /// one-way; there is no unfreeze.
    pub fn freeze(&mut self) {
        self.frozen = true;
        for child in self.children.values_mut() {
            match child {
                ConfigChild::Tree(subtree) => subtree.freeze(),
                ConfigChild::Node(node) => node.freeze(),
            }
        }
    }

    /// Snapshot of the fully resolved tree as a plain JSON object. Leaves
    /// with no written value are skipped.
    #[must_use]
    pub fn resolved(&self) -> Value {
        let mut map = Map::new();
        for (key, child) in &self.children {
            match child {
                ConfigChild::Tree(subtree) => {
                    map.insert(key.clone(), subtree.resolved());
                }
                ConfigChild::Node(node) => {
                    if let Ok(value) = node.get() {
                        map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        Value::Object(map)
    }
}

fn structural_conflict(
    path: &str,
    existing: &ConfigChild,
    incoming: &Value,
    source: &str,
) -> MicrocosmError {
    let (existing_shape, first_source) = match existing {
        ConfigChild::Tree(_) => ("a nested section", String::from("existing nested configuration")),
        ConfigChild::Node(node) => (
            "a value",
            node.resolved_source()
                .map_or_else(|| String::from("existing configuration"), ToOwned::to_owned),
        ),
    };
    MicrocosmError::StructuralConflict {
        key: path.to_owned(),
        existing: existing_shape,
        incoming: shape_of(incoming),
        first_source,
        second_source: source.to_owned(),
    }
}

pub(crate) fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a nested section",
    }
}

pub(crate) fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}
