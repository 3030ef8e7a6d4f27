//! Registry layer: the query surface over the live graph's central registry.
//!
//! `Registry` is what the graph builder consumes. `MasterClient` talks to a
//! ROS master, `StaticRegistry` serves a fixed snapshot, and `Traced` wraps
//! either one to log every call.
//!
//! A snapshot is two or more sequential calls (`snapshot`, then
//! `channel_types`, then per-name lookups). Nothing makes them atomic: a
//! channel or node appearing or vanishing between calls shows up downstream
//! as an inconsistent channel or a missing cross-link.

pub mod master;
pub mod memory;
pub mod tcpros;
pub mod traced;
pub mod xmlrpc;

pub use master::MasterClient;
pub use memory::StaticRegistry;
pub use traced::Traced;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `(entity name, owning process names)` as reported by the registry.
pub type Owners = Vec<(String, Vec<String>)>;

/// `(channel name, payload type)` pairs.
pub type ChannelTypes = Vec<(String, String)>;

/// Raw system state: who publishes, subscribes and provides what.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemState {
    #[serde(default)]
    pub published: Owners,
    #[serde(default)]
    pub subscribed: Owners,
    #[serde(default)]
    pub provided: Owners,
}

/// System state plus the channel type listing, sampled back to back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub state: SystemState,
    pub channel_types: ChannelTypes,
}

impl Snapshot {
    /// State call first, type call second. Not atomic: see module docs.
    pub fn capture<R: Registry + ?Sized>(registry: &R) -> Result<Self, RegistryError> {
        let state = registry.snapshot()?;
        let channel_types = registry.channel_types()?;
        Ok(Self {
            state,
            channel_types,
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Transport failure talking to the registry itself.
    #[error("registry at {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },

    /// The registry answered with a non-success status.
    #[error("{method} rejected by registry (code {code}): {message}")]
    Rejected {
        method: String,
        code: i64,
        message: String,
    },

    /// The registry answered, but not in the expected shape.
    #[error("malformed {method} response: {reason}")]
    Malformed { method: String, reason: String },

    /// Failure talking to an individual process endpoint.
    #[error("probe of {target} failed: {reason}")]
    Probe { target: String, reason: String },
}

impl RegistryError {
    /// True when the failure concerns one entity rather than the registry.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RegistryError::Rejected { .. } | RegistryError::Probe { .. }
        )
    }
}

/// Synchronous query interface over the live registry.
pub trait Registry {
    /// Published, subscribed and provided name/owner tuples.
    fn snapshot(&self) -> Result<SystemState, RegistryError>;

    /// Authoritative channel name → payload type listing.
    fn channel_types(&self) -> Result<ChannelTypes, RegistryError>;

    /// Request/response type of a service.
    fn resolve_type(&self, service: &str) -> Result<String, RegistryError>;

    /// Runtime URI of a process, by qualified name.
    fn resolve_process(&self, name: &str) -> Result<String, RegistryError>;

    /// Opaque runtime identifier of the process serving `uri`.
    fn get_runtime_id(&self, uri: &str) -> Result<String, RegistryError>;
}
