use crate::pipeline::Analysis;

/// Whole analysis as one pretty JSON document: `{ "graph": .., "features": .. }`.
pub fn render_json_report(analysis: &Analysis) -> anyhow::Result<String> {
    let mut json = serde_json::to_string_pretty(analysis)?;
    json.push('\n');
    Ok(json)
}
