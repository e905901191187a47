use tree_sitter::Node;

use super::{
    entities::decode_entities,
    lower::{quote, Lowerer},
    CompileError,
};

const FRAGMENT: &str = "React.Fragment";

impl<'src> Lowerer<'src> {
    /// `<Tag a="1" {...rest}>text {expr}</Tag>` →
    /// `React.createElement(Tag, { a: "1", ...rest }, "text ", expr)`.
    pub(super) fn lower_jsx(&mut self, node: Node<'_>) -> Result<(), CompileError> {
        let opening = match node.kind() {
            "jsx_self_closing_element" => node,
            _ => node
                .child_by_field_name("open_tag")
                .unwrap_or_else(|| node.child(0).unwrap_or(node)),
        };

        let tag = self.jsx_tag(&opening)?;
        let props = self.jsx_props(&opening)?;
        let children = if node.kind() == "jsx_element" {
            self.jsx_children(&node)?
        } else {
            Vec::new()
        };

        self.out.push_str("React.createElement(");
        self.out.push_str(&tag);
        self.out.push_str(", ");
        self.out.push_str(props.as_deref().unwrap_or("null"));
        for child in children {
            self.out.push_str(", ");
            self.out.push_str(&child);
        }
        self.out.push(')');
        Ok(())
    }

    fn jsx_tag(&mut self, opening: &Node<'_>) -> Result<String, CompileError> {
        let Some(name) = opening.child_by_field_name("name") else {
            return Ok(FRAGMENT.to_string());
        };
        let text = self.text(&name);
        match name.kind() {
            "identifier" => {
                let intrinsic = text
                    .chars()
                    .next()
                    .map(|c| c.is_ascii_lowercase())
                    .unwrap_or(false)
                    || text.contains('-');
                if intrinsic {
                    Ok(quote(text))
                } else {
                    Ok(text.to_string())
                }
            }
            "jsx_namespace_name" => Ok(quote(text)),
            "member_expression" | "nested_identifier" => Ok(text.to_string()),
            _ => Err(self.unsupported(&name, "unrecognized JSX element name")),
        }
    }

    fn jsx_props(&mut self, opening: &Node<'_>) -> Result<Option<String>, CompileError> {
        let mut entries: Vec<String> = Vec::new();
        let mut cursor = opening.walk();
        let attributes: Vec<Node<'_>> = opening
            .children_by_field_name("attribute", &mut cursor)
            .collect();

        for attribute in attributes {
            match attribute.kind() {
                "jsx_attribute" => {
                    let Some(name) = attribute.named_child(0) else {
                        continue;
                    };
                    let key = self.text(&name);
                    let key = if is_identifier(key) {
                        key.to_string()
                    } else {
                        quote(key)
                    };
                    let value = match attribute.named_child(1) {
                        None => "true".to_string(),
                        Some(value) => self.jsx_attribute_value(value)?,
                    };
                    entries.push(format!("{key}: {value}"));
                }
                "jsx_expression" => {
                    let Some(spread) = first_expression(&attribute) else {
                        continue;
                    };
                    let argument = spread.named_child(0).unwrap_or(spread);
                    let lowered = self.lower_to_string(argument)?;
                    entries.push(format!("...{lowered}"));
                }
                _ => {}
            }
        }

        if entries.is_empty() {
            Ok(None)
        } else {
            Ok(Some(format!("{{ {} }}", entries.join(", "))))
        }
    }

    fn jsx_attribute_value(&mut self, value: Node<'_>) -> Result<String, CompileError> {
        match value.kind() {
            "string" => {
                let raw = self.text(&value);
                let inner = if raw.len() >= 2 { &raw[1..raw.len() - 1] } else { "" };
                Ok(quote(&decode_entities(inner)))
            }
            "jsx_expression" => match first_expression(&value) {
                Some(expr) => self.lower_to_string(expr),
                None => Err(self.unsupported(
                    &value,
                    "JSX attributes must only be assigned a non-empty expression",
                )),
            },
            _ => self.lower_to_string(value),
        }
    }

    fn jsx_children(&mut self, element: &Node<'_>) -> Result<Vec<String>, CompileError> {
        let mut out = Vec::new();
        // Raw text is read from the gaps between non-text children so
        // whitespace the grammar leaves out of `jsx_text` is preserved.
        let mut pos = element.start_byte();

        let mut cursor = element.walk();
        let children: Vec<Node<'_>> = element.named_children(&mut cursor).collect();
        for child in children {
            match child.kind() {
                "jsx_opening_element" => {
                    pos = child.end_byte();
                    continue;
                }
                "jsx_text" | "html_character_reference" => continue,
                _ => {}
            }
            self.flush_text(pos, child.start_byte(), &mut out);
            pos = child.end_byte();
            match child.kind() {
                "jsx_closing_element" | "comment" => {}
                "jsx_expression" => {
                    let Some(expr) = first_expression(&child) else {
                        continue;
                    };
                    if expr.kind() == "spread_element" {
                        let argument = expr.named_child(0).unwrap_or(expr);
                        let lowered = self.lower_to_string(argument)?;
                        out.push(format!("...{lowered}"));
                    } else {
                        out.push(self.lower_to_string(expr)?);
                    }
                }
                _ => out.push(self.lower_to_string(child)?),
            }
        }
        Ok(out)
    }

    fn flush_text(&self, start: usize, end: usize, out: &mut Vec<String>) {
        if start >= end {
            return;
        }
        let decoded = decode_entities(&self.src[start..end]);
        if let Some(cleaned) = clean_jsx_text(&decoded) {
            out.push(quote(&cleaned));
        }
    }
}

/// First non-comment named child of a `{ ... }` container.
fn first_expression<'tree>(container: &Node<'tree>) -> Option<Node<'tree>> {
    let mut cursor = container.walk();
    let found = container
        .named_children(&mut cursor)
        .find(|child| child.kind() != "comment");
    found
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

/// Whitespace rules for literal JSX text: lines are trimmed where they meet
/// a line break, blank lines vanish, and the surviving lines are joined by a
/// single space.
pub(super) fn clean_jsx_text(text: &str) -> Option<String> {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = normalized.split('\n').collect();

    let last_non_empty = lines
        .iter()
        .rposition(|line| line.chars().any(|c| c != ' ' && c != '\t'))
        .unwrap_or(0);

    let mut cleaned = String::new();
    for (i, line) in lines.iter().enumerate() {
        let is_first = i == 0;
        let is_last = i == lines.len() - 1;

        let mut trimmed = line.replace('\t', " ");
        if !is_first {
            trimmed = trimmed.trim_start_matches(' ').to_string();
        }
        if !is_last {
            trimmed = trimmed.trim_end_matches(' ').to_string();
        }
        if trimmed.is_empty() {
            continue;
        }
        cleaned.push_str(&trimmed);
        if i != last_non_empty {
            cleaned.push(' ');
        }
    }

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
