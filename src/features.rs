//! Capability tags per process type.
//!
//! Each process contributes `pub#<payload>`, `sub#<payload>` and
//! `srv#<request/response>` tags for its memberships. Tags are unioned
//! across every live instance of the same declared type, so a type's
//! feature set never depends on which instance happened to be seen last.

use crate::error::{EntityKind, GraphError};
use crate::graph::{DanglingPolicy, Graph, Process};

use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FeatureTag {
    Pub(String),
    Sub(String),
    Srv(String),
}

impl std::fmt::Display for FeatureTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureTag::Pub(t) => write!(f, "pub#{}", t),
            FeatureTag::Sub(t) => write!(f, "sub#{}", t),
            FeatureTag::Srv(t) => write!(f, "srv#{}", t),
        }
    }
}

impl std::str::FromStr for FeatureTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, ty) = s
            .split_once('#')
            .ok_or_else(|| format!("feature tag without '#': {}", s))?;
        match prefix {
            "pub" => Ok(FeatureTag::Pub(ty.to_string())),
            "sub" => Ok(FeatureTag::Sub(ty.to_string())),
            "srv" => Ok(FeatureTag::Srv(ty.to_string())),
            _ => Err(format!("unknown feature tag prefix: {}", prefix)),
        }
    }
}

impl Serialize for FeatureTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub type FeatureSet = BTreeSet<FeatureTag>;

/// declared type -> union of tags over its instances
pub type FeatureMap = BTreeMap<String, FeatureSet>;

/// Tags of a single process.
pub fn process_tags(
    process: &Process,
    graph: &Graph,
    on_dangling: DanglingPolicy,
) -> Result<FeatureSet, GraphError> {
    let mut tags = FeatureSet::new();

    let dangling = |kind: EntityKind, name: &str| -> Result<(), GraphError> {
        match on_dangling {
            DanglingPolicy::Fail => Err(GraphError::DanglingReference {
                process: process.name.clone(),
                kind,
                name: name.to_string(),
            }),
            DanglingPolicy::Skip => {
                warn!(process = %process.name, %kind, name, "dangling reference skipped");
                Ok(())
            }
        }
    };

    for c in &process.published_channels {
        match graph.channels.get(c) {
            Some(ch) => {
                tags.insert(FeatureTag::Pub(ch.payload_type.clone()));
            }
            None => dangling(EntityKind::Channel, c)?,
        }
    }
    for c in &process.subscribed_channels {
        match graph.channels.get(c) {
            Some(ch) => {
                tags.insert(FeatureTag::Sub(ch.payload_type.clone()));
            }
            None => dangling(EntityKind::Channel, c)?,
        }
    }
    for s in &process.provided_services {
        match graph.services.get(s) {
            Some(svc) => {
                tags.insert(FeatureTag::Srv(svc.request_response_type.clone()));
            }
            None => dangling(EntityKind::Service, s)?,
        }
    }

    Ok(tags)
}

/// Feature map keyed by declared type.
///
/// Every declared type among the graph's processes gets a key, even when
/// its instances have no memberships.
pub fn derive_features(graph: &Graph, on_dangling: DanglingPolicy) -> Result<FeatureMap, GraphError> {
    let mut features = FeatureMap::new();
    for process in graph.processes.values() {
        let tags = process_tags(process, graph, on_dangling)?;
        debug!(process = %process.name, tags = tags.len(), "derived tags");
        features
            .entry(process.declared_type.clone())
            .or_default()
            .extend(tags);
    }
    Ok(features)
}
