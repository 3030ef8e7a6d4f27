//! Failure kinds raised while rebuilding the graph.

use crate::registry::RegistryError;
use thiserror::Error;

/// Fatal errors of graph construction and feature derivation.
///
/// Any of these aborts the run; the caller never sees a partial graph.
#[derive(Error, Debug)]
pub enum GraphError {
    /// Two launch declarations qualify to the same process name.
    #[error("duplicate process name in launch descriptor: {name}")]
    DuplicateProcess { name: String },

    /// The system state mentions a channel the type listing does not know.
    #[error("channel '{channel}' has {role} in the system state but no entry in the channel type listing")]
    InconsistentChannel { channel: String, role: ChannelRole },

    /// A process cross-link points at an entity that was never built.
    #[error("process '{process}' references unknown {kind} '{name}'")]
    DanglingReference {
        process: String,
        kind: EntityKind,
        name: String,
    },

    /// The registry could not be queried.
    #[error("registry communication failed: {0}")]
    Communication(#[from] RegistryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelRole {
    Publishers,
    Subscribers,
}

impl std::fmt::Display for ChannelRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelRole::Publishers => write!(f, "publishers"),
            ChannelRole::Subscribers => write!(f, "subscribers"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Channel,
    Service,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Channel => write!(f, "channel"),
            EntityKind::Service => write!(f, "service"),
        }
    }
}
