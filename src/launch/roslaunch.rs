//! roslaunch XML input (`.launch` files).
//!
//! Collects `<node>` declarations in document order. Supported:
//! `<group ns>` nesting, `<arg name value|default>`, the `$(arg)`, `$(env)`
//! and `$(optenv)` substitutions, and `if`/`unless` on any element.
//! `<include>` is reported and not followed; parameters, remaps and the
//! other roslaunch tags do not affect the process set and are ignored.

use crate::launch::descriptor::{LaunchSpec, RawNode};
use crate::Result;

use anyhow::{Context, anyhow, bail};
use roxmltree::{Document, Node};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Parse a `.launch` document, resolving `$(env ..)` from the process environment.
pub fn parse_launch_xml(text: &str) -> Result<LaunchSpec> {
    parse_launch_xml_with(text, &|key| std::env::var(key).ok())
}

pub fn parse_launch_xml_with(text: &str, env: &dyn Fn(&str) -> Option<String>) -> Result<LaunchSpec> {
    let doc = Document::parse(text).context("malformed launch XML")?;
    let root = doc.root_element();
    if root.tag_name().name() != "launch" {
        bail!("expected a <launch> root element, found <{}>", root.tag_name().name());
    }

    let mut reader = LaunchReader {
        args: BTreeMap::new(),
        env,
        nodes: Vec::new(),
    };
    reader.walk(root, "/")?;
    Ok(LaunchSpec { nodes: reader.nodes })
}

struct LaunchReader<'e> {
    /// Declared args; `None` when declared without value or default.
    args: BTreeMap<String, Option<String>>,
    env: &'e dyn Fn(&str) -> Option<String>,
    nodes: Vec<RawNode>,
}

impl LaunchReader<'_> {
    fn walk(&mut self, parent: Node<'_, '_>, ns: &str) -> Result<()> {
        for el in parent.children().filter(Node::is_element) {
            let tag = el.tag_name().name();
            let at = el.document().text_pos_at(el.range().start);
            let located = || format!("<{}> at {}", tag, at);

            if !self.enabled(el).with_context(located)? {
                debug!(tag, %at, "element disabled by condition");
                continue;
            }

            match tag {
                "arg" => self.declare_arg(el).with_context(located)?,
                "group" => {
                    let group_ns = match el.attribute("ns") {
                        Some(raw) => join_namespace(ns, &self.substitute(raw).with_context(located)?),
                        None => ns.to_string(),
                    };
                    self.walk(el, &group_ns)?;
                }
                "node" => {
                    let node = self.node(el, ns).with_context(located)?;
                    self.nodes.push(node);
                }
                "include" => {
                    warn!(file = el.attribute("file").unwrap_or_default(), %at, "<include> not followed");
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn enabled(&self, el: Node<'_, '_>) -> Result<bool> {
        if let Some(cond) = el.attribute("if") {
            return truthy(&self.substitute(cond)?);
        }
        if let Some(cond) = el.attribute("unless") {
            return Ok(!truthy(&self.substitute(cond)?)?);
        }
        Ok(true)
    }

    fn declare_arg(&mut self, el: Node<'_, '_>) -> Result<()> {
        let name = required(el, "name")?;
        // A fixed `value` wins over an overridable `default`.
        let value = match el.attribute("value").or_else(|| el.attribute("default")) {
            Some(raw) => Some(self.substitute(raw)?),
            None => None,
        };
        self.args.insert(name.to_string(), value);
        Ok(())
    }

    fn node(&self, el: Node<'_, '_>, ns: &str) -> Result<RawNode> {
        let namespace = match el.attribute("ns") {
            Some(raw) => join_namespace(ns, &self.substitute(raw)?),
            None => ns.to_string(),
        };
        let args = match el.attribute("args") {
            Some(raw) => self
                .substitute(raw)?
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        };

        Ok(RawNode {
            name: self.substitute(required(el, "name")?)?,
            package: self.substitute(required(el, "pkg")?)?,
            kind: self.substitute(required(el, "type")?)?,
            namespace: Some(namespace),
            args,
        })
    }

    /// Expand every `$(verb ..)` in an attribute value.
    fn substitute(&self, raw: &str) -> Result<String> {
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(start) = rest.find("$(") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let end = after
                .find(')')
                .ok_or_else(|| anyhow!("unterminated substitution in {:?}", raw))?;
            out.push_str(&self.expand(&after[..end])?);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    fn expand(&self, expr: &str) -> Result<String> {
        let mut words = expr.split_whitespace();
        let verb = words.next().unwrap_or_default();
        let mut operand = || {
            words
                .next()
                .ok_or_else(|| anyhow!("$({}) needs an argument", verb))
        };

        match verb {
            "arg" => {
                let name = operand()?;
                match self.args.get(name) {
                    Some(Some(v)) => Ok(v.clone()),
                    Some(None) => bail!("arg {:?} is declared without a value", name),
                    None => bail!("arg {:?} is not declared", name),
                }
            }
            "env" => {
                let key = operand()?;
                (self.env)(key).ok_or_else(|| anyhow!("environment variable {} is not set", key))
            }
            "optenv" => {
                let key = operand()?;
                let fallback = words.collect::<Vec<_>>().join(" ");
                Ok((self.env)(key).unwrap_or(fallback))
            }
            _ => bail!("unsupported substitution $({})", expr),
        }
    }
}

fn required<'a>(el: Node<'a, '_>, attr: &str) -> Result<&'a str> {
    el.attribute(attr)
        .ok_or_else(|| anyhow!("missing required attribute {:?}", attr))
}

fn truthy(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => bail!("condition must be true, false, 1 or 0, got {:?}", value),
    }
}

/// Resolve `ns` against the enclosing namespace; absolute names stand alone.
fn join_namespace(parent: &str, ns: &str) -> String {
    if ns.starts_with('/') {
        ns.to_string()
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), ns)
    }
}
