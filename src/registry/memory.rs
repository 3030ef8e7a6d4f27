//! Fixed, in-memory registry.
//!
//! Serves a recorded or hand-built snapshot. Deserialisable, so a snapshot
//! captured elsewhere can be analysed offline.

use crate::registry::{ChannelTypes, Registry, RegistryError, SystemState};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StaticRegistry {
    #[serde(default)]
    pub state: SystemState,

    #[serde(default)]
    pub channel_types: ChannelTypes,

    /// service name -> request/response type
    #[serde(default)]
    pub service_types: BTreeMap<String, String>,

    /// process name -> runtime URI
    #[serde(default)]
    pub processes: BTreeMap<String, String>,

    /// runtime URI -> opaque id
    #[serde(default)]
    pub runtime_ids: BTreeMap<String, String>,

    /// Simulate a registry that refuses every call.
    #[serde(skip)]
    pub unreachable: bool,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a live process with a synthetic URI and runtime id.
    pub fn process(mut self, name: &str) -> Self {
        let uri = self.next_uri();
        let id = (self.runtime_ids.len() + 1000).to_string();
        self.processes.insert(name.to_string(), uri.clone());
        self.runtime_ids.insert(uri, id);
        self
    }

    /// Register a process the registry knows but whose endpoint is dead.
    pub fn process_without_runtime(mut self, name: &str) -> Self {
        let uri = self.next_uri();
        self.processes.insert(name.to_string(), uri);
        self
    }

    /// One host per registration, so distinct names never share a URI.
    fn next_uri(&self) -> String {
        format!("http://node{}:0/", self.processes.len())
    }

    pub fn channel(mut self, name: &str, payload_type: &str) -> Self {
        self.channel_types
            .push((name.to_string(), payload_type.to_string()));
        self
    }

    pub fn publish(mut self, channel: &str, owners: &[&str]) -> Self {
        self.state.published.push(owned(channel, owners));
        self
    }

    pub fn subscribe(mut self, channel: &str, owners: &[&str]) -> Self {
        self.state.subscribed.push(owned(channel, owners));
        self
    }

    pub fn provide(mut self, service: &str, ty: &str, owners: &[&str]) -> Self {
        self.state.provided.push(owned(service, owners));
        self.service_types.insert(service.to_string(), ty.to_string());
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    fn check_reachable(&self) -> Result<(), RegistryError> {
        if self.unreachable {
            return Err(RegistryError::Unreachable {
                endpoint: "static".to_string(),
                reason: "registry marked unreachable".to_string(),
            });
        }
        Ok(())
    }
}

fn owned(name: &str, owners: &[&str]) -> (String, Vec<String>) {
    (
        name.to_string(),
        owners.iter().map(|o| o.to_string()).collect(),
    )
}

impl Registry for StaticRegistry {
    fn snapshot(&self) -> Result<SystemState, RegistryError> {
        self.check_reachable()?;
        Ok(self.state.clone())
    }

    fn channel_types(&self) -> Result<ChannelTypes, RegistryError> {
        self.check_reachable()?;
        Ok(self.channel_types.clone())
    }

    fn resolve_type(&self, service: &str) -> Result<String, RegistryError> {
        self.check_reachable()?;
        self.service_types
            .get(service)
            .cloned()
            .ok_or_else(|| RegistryError::Rejected {
                method: "lookupService".to_string(),
                code: -1,
                message: format!("no provider for [{}]", service),
            })
    }

    fn resolve_process(&self, name: &str) -> Result<String, RegistryError> {
        self.check_reachable()?;
        self.processes
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::Rejected {
                method: "lookupNode".to_string(),
                code: -1,
                message: format!("unknown node [{}]", name),
            })
    }

    // Answered by the node itself, not the registry: `unreachable` does not apply.
    fn get_runtime_id(&self, uri: &str) -> Result<String, RegistryError> {
        self.runtime_ids
            .get(uri)
            .cloned()
            .ok_or_else(|| RegistryError::Probe {
                target: uri.to_string(),
                reason: "connection refused".to_string(),
            })
    }
}
