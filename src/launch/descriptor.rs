//! Launch descriptor: the intended process set.
//!
//! Read from a roslaunch `.launch` file (see `roslaunch`) or from JSON:
//! {
//!   "nodes": [
//!     {
//!       "name": "talker",             // base name, qualified with namespace
//!       "package": "rospy_tutorials",
//!       "type": "talker.py",          // executable inside the package
//!       "namespace": "/demo",         // optional, defaults to "/"
//!       "args": ["_rate:=10"]         // optional extra arguments
//!     },
//!     ...
//!   ]
//! }
//!
//! Declarations are kept in file order. Duplicate qualified names are not
//! rejected here: the graph builder owns that policy.

use crate::launch::name::{self, NameRules};
use crate::launch::roslaunch::parse_launch_xml;
use crate::Result;

use anyhow::{Context, bail};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct LaunchSpec {
    #[serde(default)]
    pub nodes: Vec<RawNode>,
}

/// Raw node shape as it appears in launch.json.
#[derive(Debug, Clone, Deserialize)]
pub struct RawNode {
    pub name: String,

    pub package: String,

    #[serde(rename = "type", alias = "kind")]
    pub kind: String,

    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,
}

/// Validated node declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeDecl {
    pub namespace: String,
    pub name: String,
    pub package: String,
    pub kind: String,
    pub args: Vec<String>,
}

impl NodeDecl {
    pub fn new(name: impl Into<String>, package: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            namespace: "/".to_string(),
            name: name.into(),
            package: package.into(),
            kind: kind.into(),
            args: Vec::new(),
        }
    }

    pub fn in_namespace(mut self, namespace: &str) -> Self {
        self.namespace = name::normalize_namespace(namespace);
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Fully-qualified graph name, e.g. `/demo/talker`.
    pub fn qualified_name(&self) -> String {
        name::qualify(&self.namespace, &self.name)
    }

    /// `<package>/<kind>`, the key features are aggregated under.
    pub fn declared_type(&self) -> String {
        format!("{}/{}", self.package, self.kind)
    }
}

#[derive(Debug, Clone, Default)]
pub struct LaunchDescriptor {
    pub nodes: Vec<NodeDecl>,
}

impl LaunchDescriptor {
    pub fn new(nodes: Vec<NodeDecl>) -> Self {
        Self { nodes }
    }
}

impl LaunchSpec {
    /// Check every name against the ROS grammar and normalise namespaces.
    pub fn validate_and_build(&self) -> Result<LaunchDescriptor> {
        let rules = NameRules::new()?;

        if self.nodes.is_empty() {
            bail!("launch descriptor contained no nodes");
        }

        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (idx, raw) in self.nodes.iter().enumerate() {
            let namespace = raw.namespace.as_deref().unwrap_or("/");
            check_node(&rules, raw, namespace)
                .with_context(|| format!("launch descriptor node #{} ({})", idx, raw.name))?;

            nodes.push(NodeDecl {
                namespace: name::normalize_namespace(namespace),
                name: raw.name.clone(),
                package: raw.package.clone(),
                kind: raw.kind.clone(),
                args: raw.args.clone(),
            });
        }

        Ok(LaunchDescriptor { nodes })
    }
}

fn check_node(rules: &NameRules, raw: &RawNode, namespace: &str) -> Result<()> {
    rules.check_base_name(&raw.name)?;
    rules.check_namespace(namespace)?;
    rules.check_package(&raw.package)?;
    rules.check_executable(&raw.kind)?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorFormat {
    Json,
    RosLaunch,
}

impl DescriptorFormat {
    /// By extension, else by the first non-blank character.
    pub fn detect(path: &Path, text: &str) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("launch" | "xml") => DescriptorFormat::RosLaunch,
            Some("json") => DescriptorFormat::Json,
            _ if text.trim_start().starts_with('<') => DescriptorFormat::RosLaunch,
            _ => DescriptorFormat::Json,
        }
    }
}

/// Read, parse and validate a launch descriptor file.
pub fn load_descriptor(path: &Path) -> Result<LaunchDescriptor> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("read launch descriptor {}", path.display()))?;

    let format = DescriptorFormat::detect(path, &text);
    debug!(path = %path.display(), ?format, "loading launch descriptor");
    let spec: LaunchSpec = match format {
        DescriptorFormat::Json => serde_json::from_str(&text)
            .with_context(|| format!("parse launch descriptor {}", path.display()))?,
        DescriptorFormat::RosLaunch => parse_launch_xml(&text)
            .with_context(|| format!("parse launch file {}", path.display()))?,
    };
    spec.validate_and_build()
}
