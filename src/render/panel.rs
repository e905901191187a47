use crate::sandbox::Diagnostic;

use super::html::escape_text;

pub const FAILURE_HEADLINE: &str = "Failed to transpile component.";
pub const SHOW_DETAILS: &str = "Show Details";
pub const HIDE_DETAILS: &str = "Hide Details";

const PANEL_STYLE: &str = "color: red; font-family: monospace; font-size: 14px; padding: 8px";
const BUTTON_STYLE: &str = "margin-top: 8px; padding: 2px 8px; font-size: 12px; cursor: pointer; \
     border-radius: 4px; border: 1px solid #ccc; background: #fff";
const DETAILS_STYLE: &str = "margin-top: 8px; max-height: 400px; overflow: auto; \
     background: #f9f9f9; border: 1px solid #eee; padding: 8px";

/// Failure view for one widget. Details (message, stack, verbatim source)
/// are only emitted while `show_details` is set.
pub fn diagnostic_panel(diagnostic: &Diagnostic, show_details: bool) -> String {
    let mut html = format!(
        "<div class=\"widget-error\" data-kind=\"{}\" style=\"{PANEL_STYLE}\">\
         <strong>{FAILURE_HEADLINE}</strong><div>\
         <button type=\"button\" class=\"widget-error-toggle\" aria-expanded=\"{show_details}\" style=\"{BUTTON_STYLE}\">{}</button>",
        diagnostic.kind,
        if show_details { HIDE_DETAILS } else { SHOW_DETAILS },
    );

    if show_details {
        html.push_str(&format!(
            "<div class=\"widget-error-details\" style=\"{DETAILS_STYLE}\">\
             <div><strong>Error:</strong> {}</div>\
             <div><strong>Stack:</strong><pre style=\"white-space: pre-wrap\">{}</pre></div>\
             <div><strong>Code:</strong><pre style=\"white-space: pre-wrap; font-size: 12px\">{}</pre></div>\
             </div>",
            escape_text(&diagnostic.message),
            escape_text(diagnostic.stack.as_deref().unwrap_or_default()),
            escape_text(&diagnostic.offending_code),
        ));
    }

    html.push_str("</div></div>");
    html
}
