//! A single configuration slot holding one value per layer.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::{MicrocosmError, MicrocosmResult};

/// One written configuration entry, for diagnostics and tooling.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProvenanceEntry {
    /// Layer the value was written to.
    pub layer: String,
    /// Descriptor identifying who wrote the value.
    pub source: String,
    /// The written value.
    pub value: Value,
}

#[derive(Clone, Debug)]
struct LayerEntry {
    source: String,
    value: Value,
}

/// A named configuration slot.
///
/// Each node knows the ordered set of layers it participates in. Layers are
/// ascending priority tiers: a read resolves to the entry in the
/// highest-priority layer holding one, so later layers override earlier
/// ones. Every written entry carries a source descriptor so misconfiguration
/// can be diagnosed without inspecting internals.
#[derive(Clone, Debug)]
pub struct ConfigNode {
    name: String,
    layers: Vec<String>,
    entries: HashMap<String, LayerEntry>,
    frozen: bool,
}

impl ConfigNode {
    /// Creates an empty node over the given layers.
    ///
    /// An empty layer list falls back to a single `"base"` layer.
    #[must_use]
    pub fn new(name: impl Into<String>, layers: Vec<String>) -> Self {
        let layers = if layers.is_empty() {
            vec![String::from("base")]
        } else {
            layers
        };
        Self {
            name: name.into(),
            layers,
            entries: HashMap::new(),
            frozen: false,
        }
    }

    /// Dotted path of this node within its tree.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layer names in ascending priority order.
    #[must_use]
    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    /// Whether any layer holds an entry.
    #[must_use]
    pub fn has_value(&self) -> bool {
        !self.entries.is_empty()
    }

    /// Whether the node has been frozen against further writes.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Writes `value` at `layer`, or at the highest-priority layer when no
    /// layer is given.
    ///
    /// # Errors
    ///
    /// Returns [`MicrocosmError::Frozen`] when the node has been frozen and
    /// [`MicrocosmError::UnknownLayer`] when `layer` is not one of the
    /// node's layers.
    pub fn set(
        &mut self,
        layer: Option<&str>,
        source: impl Into<String>,
        value: Value,
    ) -> MicrocosmResult<()> {
        if self.frozen {
            return Err(MicrocosmError::Frozen {
                key: self.name.clone(),
            });
        }
        let layer = match layer {
            Some(requested) => self
                .layers
                .iter()
                .find(|candidate| candidate.as_str() == requested)
                .ok_or_else(|| MicrocosmError::UnknownLayer {
                    layer: requested.into(),
                    key: self.name.clone(),
                })?
                .clone(),
            None => self.outermost_layer().to_owned(),
        };
        self.entries.insert(
            layer,
            LayerEntry {
                source: source.into(),
                value,
            },
        );
        Ok(())
    }

    /// Resolves the node's value: the entry in the highest-priority layer
    /// holding one.
    ///
    /// # Errors
    ///
    /// Returns [`MicrocosmError::MissingValue`] naming the node when no
    /// layer holds an entry.
    pub fn get(&self) -> MicrocosmResult<&Value> {
        self.layers
            .iter()
            .rev()
            .find_map(|layer| self.entries.get(layer))
            .map(|entry| &entry.value)
            .ok_or_else(|| MicrocosmError::MissingValue {
                key: self.name.clone(),
            })
    }

    /// Returns the value stored at exactly `layer`, ignoring the cascade.
    ///
    /// # Errors
    ///
    /// Returns [`MicrocosmError::UnknownLayer`] when `layer` is not one of
    /// the node's layers and [`MicrocosmError::MissingValue`] when that
    /// layer holds no entry.
    pub fn get_from_layer(&self, layer: &str) -> MicrocosmResult<&Value> {
        if !self.layers.iter().any(|candidate| candidate == layer) {
            return Err(MicrocosmError::UnknownLayer {
                layer: layer.into(),
                key: self.name.clone(),
            });
        }
        self.entries
            .get(layer)
            .map(|entry| &entry.value)
            .ok_or_else(|| MicrocosmError::MissingValue {
                key: self.name.clone(),
            })
    }

    /// Returns every written entry as `(layer, source, value)` triples in
    /// ascending layer-priority order.
    #[must_use]
    pub fn provenance(&self) -> Vec<ProvenanceEntry> {
        self.layers
            .iter()
            .filter_map(|layer| {
                self.entries.get(layer).map(|entry| ProvenanceEntry {
                    layer: layer.clone(),
                    source: entry.source.clone(),
                    value: entry.value.clone(),
                })
            })
            .collect()
    }

    /// Marks the node read-only. Freezing is one-way.
    pub const fn freeze(&mut self) {
        self.frozen = true;
    }

    /// Source of the most recently resolving entry, if any. Used to name the
    /// existing contributor in conflict diagnostics.
    pub(crate) fn resolved_source(&self) -> Option<&str> {
        self.layers
            .iter()
            .rev()
            .find_map(|layer| self.entries.get(layer))
            .map(|entry| entry.source.as_str())
    }

    /// Source recorded at exactly `layer`, if that layer holds an entry.
    pub(crate) fn source_at_layer(&self, layer: &str) -> Option<&str> {
        self.entries.get(layer).map(|entry| entry.source.as_str())
    }

    fn outermost_layer(&self) -> &str {
        // `new` guarantees at least one layer.
        self.layers.last().map_or("base", String::as_str)
    }
}
