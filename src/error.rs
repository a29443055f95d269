//! Error types shared by the configuration tree and the component manager.

use thiserror::Error;

/// Convenience alias for fallible operations in this crate.
pub type MicrocosmResult<T> = Result<T, MicrocosmError>;

/// Broad classification of a [`MicrocosmError`].
///
/// Bootstrap callers rarely need the exact variant; they care whether a
/// failure was a bad lookup, a bad write, or a component wiring mistake.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// A lookup failed: unset key, unknown layer, or assignment to a key
    /// that was never created by a merge.
    Key,
    /// A structural or write failure: shape mismatch during a merge, or a
    /// write against frozen configuration.
    Config,
    /// A component wiring failure: null placeholders, missing or duplicate
    /// names, or conflicting default configuration.
    Component,
}

/// Errors raised by the configuration and lifecycle core.
///
/// None of these are recoverable in place. They signal programming or wiring
/// mistakes and are expected to propagate to the bootstrap caller, which
/// aborts the run.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MicrocosmError {
    /// No layer holds a value for the requested key.
    #[error("no value stored for '{key}' in any layer")]
    MissingValue {
        /// Dotted path of the key that was read.
        key: String,
    },

    /// A write or layer-pinned read named a layer the tree was not created
    /// with.
    #[error("layer '{layer}' does not exist for '{key}'")]
    UnknownLayer {
        /// The unrecognised layer name.
        layer: String,
        /// Dotted path of the key being accessed.
        key: String,
    },

    /// Assignment targeted a key that no merge ever created.
    #[error("new configuration keys can only be created by a merge; '{key}' does not exist")]
    MissingKey {
        /// Dotted path of the key being assigned.
        key: String,
    },

    /// The requested key holds a scalar, not a nested section.
    #[error("'{key}' holds a value, not a nested configuration section")]
    NotASubtree {
        /// Dotted path of the key being accessed.
        key: String,
    },

    /// The requested key is a nested section, not a scalar.
    #[error("'{key}' is a nested configuration section, not a value")]
    NotAValue {
        /// Dotted path of the key being accessed.
        key: String,
    },

    /// A write was attempted against frozen configuration.
    #[error("cannot write '{key}': the configuration has been frozen")]
    Frozen {
        /// Dotted path of the frozen node or tree.
        key: String,
    },

    /// Merge input was not a string-keyed map where one was required.
    #[error("configuration data for '{key}' must be a string-keyed map, found {found}")]
    InvalidUpdate {
        /// Dotted path of the tree being updated.
        key: String,
        /// Shape of the rejected input.
        found: &'static str,
    },

    /// Two configuration contributions disagree about whether a key is a
    /// nested section or a scalar.
    #[error(
        "conflicting shapes for '{key}': {existing} from {first_source} \
         versus {incoming} from {second_source}"
    )]
    StructuralConflict {
        /// Dotted path of the disputed key.
        key: String,
        /// Shape already stored in the tree.
        existing: &'static str,
        /// Shape of the incoming contribution.
        incoming: &'static str,
        /// Origin of the stored shape.
        first_source: String,
        /// Origin of the incoming contribution.
        second_source: String,
    },

    /// Two components declared differing defaults for the same key.
    #[error(
        "both {first_source} and {second_source} set a default for '{key}' \
         ({first} versus {second})"
    )]
    DuplicatedDefault {
        /// Dotted path of the disputed key.
        key: String,
        /// Origin of the default already merged.
        first_source: String,
        /// Origin of the conflicting contribution.
        second_source: String,
        /// Rendered value already merged.
        first: String,
        /// Rendered conflicting value.
        second: String,
    },

    /// A null placeholder was found in a component list; most likely a
    /// factory function forgot to return a component.
    #[error("null element in component list; this likely indicates a bug in a factory function")]
    NullComponent,

    /// A component reported an empty name.
    #[error("component has no name")]
    NamelessComponent,

    /// Two live members of a component list share a name.
    #[error("duplicate name in component list: '{name}'")]
    DuplicateName {
        /// The contested component name.
        name: String,
    },
}

impl MicrocosmError {
    /// Classifies this error into one of the three kinds exposed to
    /// bootstrap callers.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingValue { .. }
            | Self::UnknownLayer { .. }
            | Self::MissingKey { .. }
            | Self::NotASubtree { .. }
            | Self::NotAValue { .. } => ErrorKind::Key,
            Self::Frozen { .. } | Self::InvalidUpdate { .. } | Self::StructuralConflict { .. } => {
                ErrorKind::Config
            }
            Self::DuplicatedDefault { .. }
            | Self::NullComponent
            | Self::NamelessComponent
            | Self::DuplicateName { .. } => ErrorKind::Component,
        }
    }
}
