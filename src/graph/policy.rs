//! Failure-policy knobs for graph building and feature derivation.

use clap::ValueEnum;
use serde::Serialize;

/// What to do when two declarations qualify to the same process name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Abort the build
    #[default]
    Reject,
    /// Keep the first declaration and record a warning for the rest
    KeepFirst,
}

/// What to do when a process cross-link names an entity that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DanglingPolicy {
    /// Treat as an internal invariant breach
    #[default]
    Fail,
    /// Drop the tag and log a warning
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BuildPolicy {
    pub on_duplicate: DuplicatePolicy,
    pub on_dangling: DanglingPolicy,
}
