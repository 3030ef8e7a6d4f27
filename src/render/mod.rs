pub mod json;
pub mod text;

pub use json::render_json_report;
pub use text::render_text_report;

use crate::pipeline::Analysis;

use clap::ValueEnum;

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    /// Entity dump followed by the pretty-printed feature map
    #[default]
    Text,
    /// Graph and features as one JSON document
    Json,
}

pub fn render_report(analysis: &Analysis, format: ReportFormat) -> anyhow::Result<String> {
    match format {
        ReportFormat::Text => render_text_report(analysis),
        ReportFormat::Json => render_json_report(analysis),
    }
}
