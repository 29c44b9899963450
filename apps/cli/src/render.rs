//! Rendering finished pipelines as HTML documents or JSON.

use htmlcombine_core::PipelineOutput;
use htmlcombine_shared::{AttrValue, ReferenceRecord};

/// Render a full HTML document for one pipeline.
pub(crate) fn render_document(output: &PipelineOutput) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html>\n  <head>\n");
    html.push_str("    <meta charset=\"utf-8\">\n");
    html.push_str(&format!("    <title>{}</title>\n", escape(&output.output)));
    html.push_str("  </head>\n  <body>\n");
    for reference in &output.references {
        html.push_str("    ");
        html.push_str(&render_script_tag(reference));
        html.push('\n');
    }
    html.push_str("  </body>\n</html>\n");
    html
}

/// `<script src="…" …></script>`. `true` renders as a bare attribute, `false`
/// is omitted.
pub(crate) fn render_script_tag(reference: &ReferenceRecord) -> String {
    let mut tag = format!("<script src=\"{}\"", escape(&reference.source));
    for (key, value) in &reference.attributes {
        match value {
            AttrValue::Bool(true) => tag.push_str(&format!(" {key}")),
            AttrValue::Bool(false) => {}
            AttrValue::Text(text) => tag.push_str(&format!(" {key}=\"{}\"", escape(text))),
        }
    }
    tag.push_str("></script>");
    tag
}

/// JSON array of every output.
pub(crate) fn render_json(outputs: &[PipelineOutput]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(outputs)
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
