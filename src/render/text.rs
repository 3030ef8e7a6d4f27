use crate::graph::Graph;
use crate::pipeline::Analysis;

use std::collections::BTreeSet;
use std::fmt::Write;

/// Human-readable dump of every entity, then the pretty-printed feature map.
pub fn render_text_report(analysis: &Analysis) -> anyhow::Result<String> {
    let mut out = String::new();
    write_graph(&mut out, &analysis.graph)?;

    writeln!(out, "Features:")?;
    out.push_str(&serde_json::to_string_pretty(&analysis.features)?);
    out.push('\n');
    Ok(out)
}

fn write_graph(out: &mut String, graph: &Graph) -> std::fmt::Result {
    writeln!(out, "Processes ({}):", graph.processes.len())?;
    for p in graph.processes.values() {
        writeln!(out, "  {} [{}] id={} uri={}", p.name, p.declared_type, p.runtime_id, p.runtime_uri)?;
        writeln!(out, "    publishes:  {}", join(&p.published_channels))?;
        writeln!(out, "    subscribes: {}", join(&p.subscribed_channels))?;
        writeln!(out, "    provides:   {}", join(&p.provided_services))?;
    }

    writeln!(out, "Channels ({}):", graph.channels.len())?;
    for c in graph.channels.values() {
        writeln!(out, "  {} [{}]", c.name, or_unknown(&c.payload_type))?;
        writeln!(out, "    publishers:  {}", join(&c.publishers))?;
        writeln!(out, "    subscribers: {}", join(&c.subscribers))?;
    }

    writeln!(out, "Services ({}):", graph.services.len())?;
    for s in graph.services.values() {
        writeln!(out, "  {} [{}]", s.name, or_unknown(&s.request_response_type))?;
        writeln!(out, "    providers: {}", join(&s.providers))?;
    }

    if !graph.warnings.is_empty() {
        writeln!(out, "Warnings ({}):", graph.warnings.len())?;
        for w in &graph.warnings {
            writeln!(out, "  - {}", w)?;
        }
    }
    Ok(())
}

fn join(names: &BTreeSet<String>) -> String {
    if names.is_empty() {
        "-".to_string()
    } else {
        names.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

fn or_unknown(s: &str) -> &str {
    if s.is_empty() { "?" } else { s }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureMap, FeatureTag};
    use crate::graph::{BuildWarning, Channel, Process};

    #[test]
    fn test_text_report_sections() {
        let mut graph = Graph::default();
        let mut p = Process::new("/A", "foo/bar", "http://a:1/", "42");
        p.published_channels.insert("/t".into());
        graph.processes.insert("/A".into(), p);
        let mut c = Channel::new("/t", "");
        c.publishers.insert("/A".into());
        graph.channels.insert("/t".into(), c);
        graph.warnings.push(BuildWarning::ProcessResolution {
            name: "/B".into(),
            reason: "unknown node".into(),
        });

        let mut features = FeatureMap::new();
        features
            .entry("foo/bar".into())
            .or_default()
            .insert(FeatureTag::Pub(String::new()));

        let text = render_text_report(&Analysis { graph, features }).unwrap();
        assert!(text.contains("Processes (1):\n  /A [foo/bar] id=42 uri=http://a:1/\n"));
        assert!(text.contains("    publishes:  /t\n    subscribes: -\n"));
        assert!(text.contains("  /t [?]\n"));
        assert!(text.contains("Services (0):\n"));
        assert!(text.contains("  - process /B skipped: unknown node\n"));
        assert!(text.ends_with("Features:\n{\n  \"foo/bar\": [\n    \"pub#\"\n  ]\n}\n"));
    }
}
