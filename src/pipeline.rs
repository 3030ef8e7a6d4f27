//! One analysis run: start -> settle -> snapshot -> build -> derive -> shutdown.
//!
//! The launched set is released on every exit path, including fatal build
//! errors and panics, before the caller gets to report anything.

use crate::error::GraphError;
use crate::features::{FeatureMap, derive_features};
use crate::graph::{BuildPolicy, Graph, GraphBuilder};
use crate::launch::LaunchDescriptor;
use crate::registry::{Registry, Snapshot};
use crate::supervisor::{Supervisor, TeardownGuard};
use crate::Result;

use anyhow::Context;
use serde::Serialize;
use std::thread;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_SETTLE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Fixed wait between launch and sampling.
    pub settle: Duration,
    pub policy: BuildPolicy,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            settle: DEFAULT_SETTLE,
            policy: BuildPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub graph: Graph,
    pub features: FeatureMap,
}

pub fn run_analysis<S, R>(
    supervisor: &mut S,
    registry: &R,
    launch: &LaunchDescriptor,
    options: &RunOptions,
) -> Result<Analysis>
where
    S: Supervisor + ?Sized,
    R: Registry + ?Sized,
{
    let mut guard = TeardownGuard::new(supervisor);
    guard
        .supervisor()
        .start(launch)
        .context("start process set")?;

    if !options.settle.is_zero() {
        info!(settle_ms = options.settle.as_millis() as u64, "waiting for graph to settle");
        thread::sleep(options.settle);
    }

    let snapshot = Snapshot::capture(registry).map_err(GraphError::from)?;
    info!(
        published = snapshot.state.published.len(),
        subscribed = snapshot.state.subscribed.len(),
        provided = snapshot.state.provided.len(),
        channel_types = snapshot.channel_types.len(),
        "registry sampled"
    );

    let graph = GraphBuilder::new(registry, options.policy).build(launch, &snapshot)?;
    let features = derive_features(&graph, options.policy.on_dangling)?;

    Ok(Analysis { graph, features })
}
