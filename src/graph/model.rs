//! Graph entities: processes, channels, services.
//!
//! Cross-links are by name. After a successful build, membership is
//! symmetric: `p` publishes `c` exactly when `c` lists `p` as a publisher
//! (for every `p` in the process map), and likewise for subscribers and
//! providers. Owners the registry reports that are not in the process map
//! stay listed on the channel/service without a back-link.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Process {
    pub name: String,
    /// `<package>/<kind>`
    pub declared_type: String,
    pub runtime_uri: String,
    pub runtime_id: String,
    pub published_channels: BTreeSet<String>,
    pub subscribed_channels: BTreeSet<String>,
    pub provided_services: BTreeSet<String>,
}

impl Process {
    pub fn new(
        name: impl Into<String>,
        declared_type: impl Into<String>,
        runtime_uri: impl Into<String>,
        runtime_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            runtime_uri: runtime_uri.into(),
            runtime_id: runtime_id.into(),
            published_channels: BTreeSet::new(),
            subscribed_channels: BTreeSet::new(),
            provided_services: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Channel {
    pub name: String,
    /// May be empty when the registry does not know it.
    pub payload_type: String,
    pub publishers: BTreeSet<String>,
    pub subscribers: BTreeSet<String>,
}

impl Channel {
    pub fn new(name: impl Into<String>, payload_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload_type: payload_type.into(),
            publishers: BTreeSet::new(),
            subscribers: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    pub name: String,
    pub request_response_type: String,
    pub providers: BTreeSet<String>,
}

impl Service {
    pub fn new(name: impl Into<String>, request_response_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            request_response_type: request_response_type.into(),
            providers: BTreeSet::new(),
        }
    }
}

pub type ProcessMap = BTreeMap<String, Process>;
pub type ChannelMap = BTreeMap<String, Channel>;
pub type ServiceMap = BTreeMap<String, Service>;

/// Non-fatal findings recorded while building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildWarning {
    /// A declared process could not be found live; it was skipped.
    ProcessResolution { name: String, reason: String },
    /// A service's request/response type could not be resolved.
    ServiceType { service: String, reason: String },
    /// A repeated declaration was dropped (keep-first policy).
    DuplicateProcess { name: String },
}

impl std::fmt::Display for BuildWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildWarning::ProcessResolution { name, reason } => {
                write!(f, "process {} skipped: {}", name, reason)
            }
            BuildWarning::ServiceType { service, reason } => {
                write!(f, "service {} has unknown type: {}", service, reason)
            }
            BuildWarning::DuplicateProcess { name } => {
                write!(f, "duplicate declaration of {} ignored", name)
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Graph {
    pub processes: ProcessMap,
    pub channels: ChannelMap,
    pub services: ServiceMap,
    pub warnings: Vec<BuildWarning>,
}

impl Graph {
    /// Every asymmetric membership, as human-readable lines. Empty when the
    /// graph is consistent.
    pub fn consistency_violations(&self) -> Vec<String> {
        let mut out = Vec::new();

        for p in self.processes.values() {
            for c in &p.published_channels {
                if !self.channels.get(c).is_some_and(|ch| ch.publishers.contains(&p.name)) {
                    out.push(format!("{} publishes {} but is not listed as its publisher", p.name, c));
                }
            }
            for c in &p.subscribed_channels {
                if !self.channels.get(c).is_some_and(|ch| ch.subscribers.contains(&p.name)) {
                    out.push(format!("{} subscribes {} but is not listed as its subscriber", p.name, c));
                }
            }
            for s in &p.provided_services {
                if !self.services.get(s).is_some_and(|sv| sv.providers.contains(&p.name)) {
                    out.push(format!("{} provides {} but is not listed as its provider", p.name, s));
                }
            }
        }

        for c in self.channels.values() {
            for n in &c.publishers {
                if let Some(p) = self.processes.get(n) {
                    if !p.published_channels.contains(&c.name) {
                        out.push(format!("{} lists publisher {} without back-link", c.name, n));
                    }
                }
            }
            for n in &c.subscribers {
                if let Some(p) = self.processes.get(n) {
                    if !p.subscribed_channels.contains(&c.name) {
                        out.push(format!("{} lists subscriber {} without back-link", c.name, n));
                    }
                }
            }
        }

        for s in self.services.values() {
            for n in &s.providers {
                if let Some(p) = self.processes.get(n) {
                    if !p.provided_services.contains(&s.name) {
                        out.push(format!("{} lists provider {} without back-link", s.name, n));
                    }
                }
            }
        }

        out
    }
}
