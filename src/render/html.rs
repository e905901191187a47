//! Element tree → HTML text.
//!
//! Markup is written from the tree, then passed through an `ammonia`
//! allow-list before it reaches the page. Scripts, styles, frames and
//! `javascript:` URLs never survive the second pass.

use ammonia::Builder;
use once_cell::sync::Lazy;

use crate::sandbox::RenderNode;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn is_valid_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == ':')
}

fn is_valid_attr_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| !c.is_whitespace() && !c.is_control() && !matches!(c, '"' | '\'' | '>' | '/' | '='))
}

/// Inline event handler attributes never reach the page.
fn is_event_handler(name: &str) -> bool {
    name.len() > 2
        && name
            .get(..2)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("on"))
}

/// Tags widgets commonly use beyond ammonia's default set.
const EXTRA_TAGS: &[&str] = &[
    "address", "button", "caption", "dialog", "fieldset", "form", "input", "label", "legend",
    "main", "menu", "meter", "optgroup", "option", "output", "progress", "section", "select",
    "textarea", "tfoot", "time",
];

const GENERIC_ATTRIBUTES: &[&str] = &[
    "align", "checked", "class", "colspan", "dir", "disabled", "for", "height", "hidden", "id",
    "max", "min", "name", "open", "placeholder", "readonly", "role", "rowspan", "selected",
    "step", "style", "tabindex", "type", "value", "width",
];

static WIDGET_SANITIZER: Lazy<Builder<'static>> = Lazy::new(|| {
    let mut builder = Builder::default();
    builder
        .add_tags(EXTRA_TAGS)
        .add_generic_attributes(GENERIC_ATTRIBUTES)
        .add_generic_attribute_prefixes(&["data-", "aria-"])
        .link_rel(None);
    builder
});

pub fn render_nodes(nodes: &[RenderNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    WIDGET_SANITIZER.clean(&out).to_string()
}

fn write_node(node: &RenderNode, out: &mut String) {
    match node {
        RenderNode::Text(text) => out.push_str(&escape_text(text)),
        RenderNode::Element {
            tag,
            attrs,
            children,
        } => {
            if !is_valid_tag(tag) {
                tracing::debug!(target = "aiwidget", tag = %tag, "dropping invalid tag, keeping children");
                for child in children {
                    write_node(child, out);
                }
                return;
            }
            let tag = tag.to_ascii_lowercase();
            out.push('<');
            out.push_str(&tag);
            for (name, value) in attrs {
                if !is_valid_attr_name(name) || is_event_handler(name) {
                    continue;
                }
                out.push(' ');
                out.push_str(name);
                if !value.is_empty() {
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&tag.as_str()) {
                return;
            }
            for child in children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(&tag);
            out.push('>');
        }
    }
}
