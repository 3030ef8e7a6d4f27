//! ROS graph-resource names.
//!
//! A node declared as `cam` in namespace `sensors` runs as `/sensors/cam`.
//! Namespaces are stored normalised: leading and trailing `/`.

use anyhow::bail;
use regex::Regex;

const BASE_NAME_RE: &str = r"^[A-Za-z][A-Za-z0-9_]*$";
const NAMESPACE_RE: &str = r"^/?(?:[A-Za-z][A-Za-z0-9_]*/)*(?:[A-Za-z][A-Za-z0-9_]*)?$";
const PACKAGE_RE: &str = r"^[A-Za-z][A-Za-z0-9_\-]*$";
const EXECUTABLE_RE: &str = r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$";

/// Compiled name grammar, built once per descriptor.
pub struct NameRules {
    base: Regex,
    namespace: Regex,
    package: Regex,
    executable: Regex,
}

impl NameRules {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            base: Regex::new(BASE_NAME_RE)?,
            namespace: Regex::new(NAMESPACE_RE)?,
            package: Regex::new(PACKAGE_RE)?,
            executable: Regex::new(EXECUTABLE_RE)?,
        })
    }

    pub fn check_base_name(&self, name: &str) -> anyhow::Result<()> {
        if !self.base.is_match(name) {
            bail!("invalid node name {:?}: expected a base name like \"talker\"", name);
        }
        Ok(())
    }

    pub fn check_namespace(&self, ns: &str) -> anyhow::Result<()> {
        if !self.namespace.is_match(ns) {
            bail!("invalid namespace {:?}", ns);
        }
        Ok(())
    }

    pub fn check_package(&self, package: &str) -> anyhow::Result<()> {
        if !self.package.is_match(package) {
            bail!("invalid package name {:?}", package);
        }
        Ok(())
    }

    pub fn check_executable(&self, kind: &str) -> anyhow::Result<()> {
        if !self.executable.is_match(kind) {
            bail!("invalid node type {:?}", kind);
        }
        Ok(())
    }
}

/// Normalise a namespace to `/`, `/a/`, `/a/b/`, ...
pub fn normalize_namespace(ns: &str) -> String {
    let trimmed = ns.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}

/// Join a normalised namespace and a base name.
pub fn qualify(namespace: &str, name: &str) -> String {
    format!("{}{}", normalize_namespace(namespace), name)
}
