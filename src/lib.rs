//! Dynamic introspection of a running ROS graph.
//!
//! Launches a described set of nodes, samples the master once the graph has
//! settled, rebuilds a cross-linked graph of processes, channels and services
//! and compresses it into per-type capability tags.

pub mod config;
pub mod error;
pub mod features;
pub mod graph;
pub mod launch;
pub mod logging;
pub mod pipeline;
pub mod registry;
pub mod render;
pub mod supervisor;

pub type Result<T> = anyhow::Result<T>;
