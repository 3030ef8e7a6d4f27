//! Graph layer: entity model, policies and the builder.

pub mod build;
pub mod model;
pub mod policy;

pub use build::GraphBuilder;
pub use model::{BuildWarning, Channel, ChannelMap, Graph, Process, ProcessMap, Service, ServiceMap};
pub use policy::{BuildPolicy, DanglingPolicy, DuplicatePolicy};
