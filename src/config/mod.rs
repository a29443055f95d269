//! Cascading configuration tree with per-layer provenance tracking.

mod node;
mod tree;

pub use node::{ConfigNode, ProvenanceEntry};
pub use tree::{ConfigChild, ConfigTree};

pub(crate) use tree::{join_path, shape_of};

#[cfg(test)]
mod tests;
