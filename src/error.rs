//! Error types raised while registering chains.
//!
//! Only setup can fail. Once a chain is registered, per-frame stages never
//! return errors: degenerate segments, missing nodes and scheduler overruns are
//! skipped or recovered in place and reported through
//! [`FrameReport`](crate::batch::FrameReport).

use std::fmt;

use crate::batch::ChainId;
use crate::host::NodeId;

/// Reasons a chain could not be registered.
#[derive(Debug, Clone, PartialEq)]
pub enum SetupError {
    /// The chain configuration has no root node.
    MissingRoot,
    /// A single chain was requested for a configuration naming several
    /// subtrees; those are registered with `Batch::register_trees`.
    SeveralRoots {
        /// Number of roots in the configuration
        count: usize,
    },
    /// The root node is not known to the host hierarchy.
    UnknownRoot {
        /// The node that was requested as root
        node: NodeId,
    },
    /// A physical coefficient lies outside `[0, 1]` or is not finite.
    InvalidCoefficient {
        /// Name of the offending coefficient
        name: &'static str,
        /// The rejected value
        value: f32,
    },
    /// The node is already driven by another chain of the same batch.
    NodeAlreadySimulated {
        /// The contested node
        node: NodeId,
    },
    /// The chain handle does not refer to a registered chain.
    UnknownChain {
        /// The stale or foreign handle
        chain: ChainId,
    },
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRoot => write!(f, "chain has no root node"),
            Self::SeveralRoots { count } => {
                write!(f, "configuration names {count} roots but one chain was requested")
            }
            Self::UnknownRoot { node } => {
                write!(f, "root node {}:{} is not in the hierarchy", node.index(), node.generation())
            }
            Self::InvalidCoefficient { name, value } => {
                write!(f, "coefficient `{name}` must be within [0, 1], got {value}")
            }
            Self::NodeAlreadySimulated { node } => write!(
                f,
                "node {}:{} is already simulated by another chain",
                node.index(),
                node.generation()
            ),
            Self::UnknownChain { chain } => {
                write!(f, "chain {}:{} is not registered", chain.index(), chain.generation())
            }
        }
    }
}

impl std::error::Error for SetupError {}

/// Convenience alias used by setup entry points.
pub type Result<T> = std::result::Result<T, SetupError>;
