use tree_sitter::Node;

use super::CompileError;
use crate::config::errors::ERR_COMPILE_UNSUPPORTED;

const MAX_NESTING_DEPTH: usize = 512;

/// Node kinds that exist only for the type checker and are dropped whole.
fn is_type_only_kind(kind: &str) -> bool {
    matches!(
        kind,
        "type_annotation"
            | "type_arguments"
            | "type_parameters"
            | "type_predicate_annotation"
            | "asserts_annotation"
            | "interface_declaration"
            | "type_alias_declaration"
            | "ambient_declaration"
            | "accessibility_modifier"
            | "override_modifier"
            | "implements_clause"
            | "function_signature"
            | "abstract_method_signature"
            | "method_signature"
            | "index_signature"
    )
}

/// Rewrites one parsed TSX program into an executable module body.
///
/// Text between rewritten nodes is copied verbatim, so comments and layout of
/// untouched code survive.
pub(crate) struct Lowerer<'src> {
    pub(super) src: &'src str,
    pub(super) out: String,
    hoisted_imports: Vec<String>,
    deferred_exports: Vec<String>,
    enum_scope: Option<EnumScope>,
    next_temp: usize,
    depth: usize,
}

/// Members visible by bare name inside an enum's initializers.
struct EnumScope {
    name: String,
    members: Vec<String>,
}

impl<'src> Lowerer<'src> {
    pub(crate) fn new(src: &'src str) -> Self {
        Self {
            src,
            out: String::with_capacity(src.len() + src.len() / 4),
            hoisted_imports: Vec::new(),
            deferred_exports: Vec::new(),
            enum_scope: None,
            next_temp: 0,
            depth: 0,
        }
    }

    pub(crate) fn lower_program(mut self, root: Node<'_>) -> Result<String, CompileError> {
        self.emit(root)?;
        // Import bindings exist before any module code runs.
        if !self.hoisted_imports.is_empty() {
            let mut body = self.hoisted_imports.join("\n");
            body.push('\n');
            body.push_str(&self.out);
            self.out = body;
        }
        if !self.deferred_exports.is_empty() {
            if !self.out.ends_with('\n') {
                self.out.push('\n');
            }
            for line in std::mem::take(&mut self.deferred_exports) {
                self.out.push_str(&line);
                self.out.push('\n');
            }
        }
        Ok(self.out)
    }

    pub(super) fn emit(&mut self, node: Node<'_>) -> Result<(), CompileError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(self.unsupported(&node, "source nesting exceeds the supported depth"));
        }
        let result = self.emit_inner(node);
        self.depth -= 1;
        result
    }

    fn emit_inner(&mut self, node: Node<'_>) -> Result<(), CompileError> {
        let kind = node.kind();
        if is_type_only_kind(kind) {
            return Ok(());
        }
        match kind {
            "as_expression" | "satisfies_expression" | "non_null_expression" => {
                match node.named_child(0) {
                    Some(inner) => self.emit(inner),
                    None => Ok(()),
                }
            }
            "import_statement" => self.lower_import(node),
            "export_statement" => self.lower_export(node),
            "enum_declaration" => self.lower_enum(node),
            "module" | "internal_module" => {
                Err(self.unsupported(&node, "TypeScript namespaces are not supported"))
            }
            "import_alias" => {
                Err(self.unsupported(&node, "`import x = ...` aliases are not supported"))
            }
            "jsx_element" | "jsx_self_closing_element" => self.lower_jsx(node),
            "formal_parameters" => self.lower_parameters(node),
            "identifier" => {
                let text = self.text(&node);
                match &self.enum_scope {
                    Some(scope) if scope.members.iter().any(|member| member == text) => {
                        let qualified = format!("{}.{text}", scope.name);
                        self.out.push_str(&qualified);
                    }
                    _ => self.out.push_str(text),
                }
                Ok(())
            }
            "required_parameter" | "optional_parameter" => {
                if has_token(&node, "readonly")
                    || has_named_kind(&node, "accessibility_modifier")
                    || has_named_kind(&node, "override_modifier")
                {
                    return Err(self.unsupported(
                        &node,
                        "constructor parameter properties are not supported",
                    ));
                }
                self.emit_children_filtered(node, |child| !child.is_named() && child.kind() == "?")
            }
            "public_field_definition" => {
                if has_token(&node, "declare") || has_token(&node, "abstract") {
                    return Ok(());
                }
                self.emit_children_filtered(node, |child| {
                    !child.is_named() && matches!(child.kind(), "?" | "!" | "readonly")
                })
            }
            "method_definition" => {
                self.emit_children_filtered(node, |child| !child.is_named() && child.kind() == "?")
            }
            "variable_declarator" => {
                self.emit_children_filtered(node, |child| !child.is_named() && child.kind() == "!")
            }
            "abstract_class_declaration" => self
                .emit_children_filtered(node, |child| {
                    !child.is_named() && child.kind() == "abstract"
                }),
            _ => self.emit_children_filtered(node, |_| false),
        }
    }

    /// Copy `node` with its children lowered, leaving out children for which
    /// `skip` returns true. Gap text between children is kept.
    pub(super) fn emit_children_filtered(
        &mut self,
        node: Node<'_>,
        skip: impl Fn(&Node<'_>) -> bool,
    ) -> Result<(), CompileError> {
        let mut pos = node.start_byte();
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        for child in children {
            self.push_src(pos, child.start_byte());
            if !skip(&child) {
                self.emit(child)?;
            }
            pos = child.end_byte();
        }
        self.push_src(pos, node.end_byte());
        Ok(())
    }

    /// Parameter list without a leading `this: T` pseudo-parameter.
    fn lower_parameters(&mut self, node: Node<'_>) -> Result<(), CompileError> {
        let mut pos = node.start_byte();
        let mut after_this = false;
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
        for child in children {
            if after_this && child.kind() == "," {
                after_this = false;
                pos = child.end_byte();
                continue;
            }
            after_this = false;
            if is_this_parameter(&child) {
                after_this = true;
                pos = child.end_byte();
                continue;
            }
            self.push_src(pos, child.start_byte());
            self.emit(child)?;
            pos = child.end_byte();
        }
        self.push_src(pos, node.end_byte());
        Ok(())
    }

    /// Lower `node` into a fresh buffer and return the text.
    pub(super) fn lower_to_string(&mut self, node: Node<'_>) -> Result<String, CompileError> {
        let saved = std::mem::take(&mut self.out);
        let result = self.emit(node);
        let lowered = std::mem::replace(&mut self.out, saved);
        result.map(|_| lowered)
    }

    pub(super) fn push_src(&mut self, start: usize, end: usize) {
        if start < end {
            self.out.push_str(&self.src[start..end]);
        }
    }

    pub(super) fn text(&self, node: &Node<'_>) -> &'src str {
        &self.src[node.start_byte()..node.end_byte()]
    }

    pub(super) fn unsupported(&self, node: &Node<'_>, what: &str) -> CompileError {
        let pos = node.start_position();
        CompileError::new(
            format!(
                "{ERR_COMPILE_UNSUPPORTED}: {what} ({}:{})",
                pos.row + 1,
                pos.column + 1
            ),
            self.src,
        )
        .at(node)
    }

    fn temp(&mut self, prefix: &str) -> String {
        let name = format!("__{prefix}{}", self.next_temp);
        self.next_temp += 1;
        name
    }

    // ------------------------------------------------------------------
    // Modules
    // ------------------------------------------------------------------

    fn lower_import(&mut self, node: Node<'_>) -> Result<(), CompileError> {
        if has_token(&node, "type") || has_token(&node, "typeof") {
            return Ok(());
        }
        if has_named_kind(&node, "import_require_clause") {
            return Err(self.unsupported(&node, "`import x = require(...)` is not supported"));
        }
        let Some(source) = node.child_by_field_name("source") else {
            return Err(self.unsupported(&node, "import without a module specifier"));
        };
        let specifier = self.text(&source);

        let Some(clause) = named_child_of_kind(&node, "import_clause") else {
            self.hoisted_imports.push(format!("require({specifier});"));
            return Ok(());
        };

        let mut default_local: Option<&str> = None;
        let mut namespace_local: Option<&str> = None;
        let mut named: Vec<(String, &str)> = Vec::new();

        let mut cursor = clause.walk();
        let parts: Vec<Node<'_>> = clause.named_children(&mut cursor).collect();
        for part in parts {
            match part.kind() {
                "identifier" => default_local = Some(self.text(&part)),
                "namespace_import" => {
                    namespace_local = named_child_of_kind(&part, "identifier").map(|id| self.text(&id));
                }
                "named_imports" => {
                    let mut spec_cursor = part.walk();
                    let specs: Vec<Node<'_>> = part.named_children(&mut spec_cursor).collect();
                    for spec in specs {
                        if spec.kind() != "import_specifier" || has_token(&spec, "type") {
                            continue;
                        }
                        let Some(name) = spec.child_by_field_name("name") else {
                            continue;
                        };
                        let local = spec
                            .child_by_field_name("alias")
                            .map(|alias| self.text(&alias))
                            .unwrap_or_else(|| self.text(&name));
                        named.push((self.property_key(&name), local));
                    }
                }
                _ => {}
            }
        }

        if default_local.is_none() && namespace_local.is_none() && named.is_empty() {
            // Only type specifiers remained.
            return Ok(());
        }

        let temp = self.temp("import");
        let mut line = format!("const {temp} = require({specifier});");
        if let Some(local) = default_local {
            line.push_str(&format!(" const {local} = {temp}.default ?? {temp};"));
        }
        if let Some(local) = namespace_local {
            line.push_str(&format!(" const {local} = {temp};"));
        }
        if !named.is_empty() {
            let bindings: Vec<String> = named
                .iter()
                .map(|(imported, local)| {
                    if imported == local {
                        imported.clone()
                    } else {
                        format!("{imported}: {local}")
                    }
                })
                .collect();
            line.push_str(&format!(" const {{ {} }} = {temp};", bindings.join(", ")));
        }
        self.hoisted_imports.push(line);
        Ok(())
    }

    fn lower_export(&mut self, node: Node<'_>) -> Result<(), CompileError> {
        if has_token(&node, "type") {
            return Ok(());
        }
        let is_default = has_token(&node, "default");

        if let Some(decl) = node.child_by_field_name("declaration") {
            if is_type_only_kind(decl.kind()) {
                return Ok(());
            }
            let names = self.declared_names(&decl);
            self.emit(decl)?;
            if !self.out.trim_end().ends_with(';') {
                self.out.push(';');
            }
            if is_default {
                let Some(name) = names.first() else {
                    return Err(self.unsupported(&decl, "anonymous default export declaration"));
                };
                self.out.push_str(&format!(" exports.default = {name};"));
            } else {
                for name in names {
                    self.out.push_str(&format!(" exports.{name} = {name};"));
                }
            }
            return Ok(());
        }

        if let Some(value) = node.child_by_field_name("value") {
            self.out.push_str("exports.default = ");
            self.emit(value)?;
            self.out.push(';');
            return Ok(());
        }

        if has_token(&node, "=") {
            return Err(self.unsupported(&node, "`export =` assignments are not supported"));
        }
        if has_token(&node, "namespace") {
            // `export as namespace X` only affects global type declarations.
            return Ok(());
        }

        let source = node
            .child_by_field_name("source")
            .map(|source| self.text(&source));

        if let Some(clause) = named_child_of_kind(&node, "export_clause") {
            let mut cursor = clause.walk();
            let specs: Vec<Node<'_>> = clause.named_children(&mut cursor).collect();
            let mut pairs: Vec<(String, String)> = Vec::new();
            for spec in specs {
                if spec.kind() != "export_specifier" || has_token(&spec, "type") {
                    continue;
                }
                let Some(name) = spec.child_by_field_name("name") else {
                    continue;
                };
                let exported = spec
                    .child_by_field_name("alias")
                    .map(|alias| self.property_key(&alias))
                    .unwrap_or_else(|| self.property_key(&name));
                pairs.push((exported, self.text(&name).to_string()));
            }
            match source {
                Some(specifier) => {
                    let temp = self.temp("reexport");
                    let mut line = format!("const {temp} = require({specifier});");
                    for (exported, local) in pairs {
                        line.push_str(&format!(" exports[{}] = {temp}[{}];", quote(&exported), quote(unquote(&local))));
                    }
                    self.out.push_str(&line);
                }
                None => {
                    for (exported, local) in pairs {
                        self.deferred_exports
                            .push(format!("exports[{}] = {local};", quote(&exported)));
                    }
                }
            }
            return Ok(());
        }

        if let Some(namespace) = named_child_of_kind(&node, "namespace_export") {
            let Some(specifier) = source else {
                return Err(self.unsupported(&node, "namespace export without a module"));
            };
            let name = namespace
                .named_child(0)
                .map(|id| self.property_key(&id))
                .unwrap_or_default();
            self.out
                .push_str(&format!("exports[{}] = require({specifier});", quote(&name)));
            return Ok(());
        }

        if let Some(specifier) = source {
            if has_token(&node, "*") {
                self.out
                    .push_str(&format!("Object.assign(exports, require({specifier}));"));
                return Ok(());
            }
        }

        Err(self.unsupported(&node, "unrecognized export form"))
    }

    /// Names bound by a declaration that follows `export`.
    fn declared_names(&self, decl: &Node<'_>) -> Vec<String> {
        match decl.kind() {
            "function_declaration"
            | "generator_function_declaration"
            | "class_declaration"
            | "abstract_class_declaration"
            | "enum_declaration" => decl
                .child_by_field_name("name")
                .map(|name| vec![self.text(&name).to_string()])
                .unwrap_or_default(),
            "lexical_declaration" | "variable_declaration" => {
                let mut names = Vec::new();
                let mut cursor = decl.walk();
                for child in decl.named_children(&mut cursor) {
                    if child.kind() != "variable_declarator" {
                        continue;
                    }
                    if let Some(pattern) = child.child_by_field_name("name") {
                        self.collect_binding_names(pattern, &mut names);
                    }
                }
                names
            }
            _ => Vec::new(),
        }
    }

    /// Binding names in source order. Walks with an explicit stack, so
    /// pattern nesting is bounded only by the source size.
    fn collect_binding_names<'tree>(&self, pattern: Node<'tree>, out: &mut Vec<String>) {
        let mut stack = vec![pattern];
        while let Some(node) = stack.pop() {
            match node.kind() {
                "identifier" | "shorthand_property_identifier_pattern" => {
                    out.push(self.text(&node).to_string());
                }
                "pair_pattern" => stack.extend(node.child_by_field_name("value")),
                "assignment_pattern" | "object_assignment_pattern" => {
                    stack.extend(node.child_by_field_name("left"));
                }
                "rest_pattern" | "array_pattern" | "object_pattern" => {
                    let mut cursor = node.walk();
                    let children: Vec<Node<'tree>> = node.named_children(&mut cursor).collect();
                    stack.extend(children.into_iter().rev());
                }
                _ => {}
            }
        }
    }

    /// Module-interface names may be identifiers or string literals.
    fn property_key(&self, node: &Node<'_>) -> String {
        unquote(self.text(node)).to_string()
    }

    // ------------------------------------------------------------------
    // Enums
    // ------------------------------------------------------------------

    fn lower_enum(&mut self, node: Node<'_>) -> Result<(), CompileError> {
        let Some(name_node) = node.child_by_field_name("name") else {
            return Err(self.unsupported(&node, "enum without a name"));
        };
        let name = self.text(&name_node).to_string();
        let Some(body) = node.child_by_field_name("body") else {
            return Err(self.unsupported(&node, "enum without a body"));
        };

        let mut cursor = body.walk();
        let members: Vec<Node<'_>> = body.named_children(&mut cursor).collect();
        let member_names = members
            .iter()
            .filter_map(|member| match member.kind() {
                "enum_assignment" => member.child_by_field_name("name"),
                "property_identifier" | "string" => Some(*member),
                _ => None,
            })
            .map(|key| unquote(self.text(&key)).to_string())
            .collect();
        let outer = self.enum_scope.replace(EnumScope {
            name: name.clone(),
            members: member_names,
        });
        let statements = self.enum_statements(&name, &members);
        self.enum_scope = outer;

        self.out.push_str(&format!(
            "var {name}; (function ({name}) {{ {} }})({name} || ({name} = {{}}));",
            statements?.join(" ")
        ));
        Ok(())
    }

    fn enum_statements(&mut self, name: &str, members: &[Node<'_>]) -> Result<Vec<String>, CompileError> {
        let mut statements: Vec<String> = Vec::new();
        let mut next: Option<f64> = Some(0.0);
        for &member in members {
            let (key_node, value_node) = match member.kind() {
                "enum_assignment" => (
                    member.child_by_field_name("name"),
                    member.child_by_field_name("value"),
                ),
                "property_identifier" | "string" => (Some(member), None),
                _ => continue,
            };
            let Some(key_node) = key_node else { continue };
            let key = quote(unquote(self.text(&key_node)));

            match value_node {
                None => {
                    let Some(value) = next else {
                        return Err(self.unsupported(&member, "enum member must have an initializer"));
                    };
                    statements.push(format!(
                        "{name}[{name}[{key}] = {}] = {key};",
                        format_number(value)
                    ));
                    next = Some(value + 1.0);
                }
                Some(value) => {
                    if let Some(number) = self.numeric_literal(&value) {
                        statements.push(format!(
                            "{name}[{name}[{key}] = {}] = {key};",
                            format_number(number)
                        ));
                        next = Some(number + 1.0);
                    } else if value.kind() == "string" {
                        let lowered = self.lower_to_string(value)?;
                        statements.push(format!("{name}[{key}] = {lowered};"));
                        next = None;
                    } else {
                        let lowered = self.lower_to_string(value)?;
                        statements.push(format!("{name}[{name}[{key}] = ({lowered})] = {key};"));
                        next = None;
                    }
                }
            }
        }
        Ok(statements)
    }

    fn numeric_literal(&self, node: &Node<'_>) -> Option<f64> {
        let mut node = *node;
        while node.kind() == "parenthesized_expression" {
            node = node.named_child(0)?;
        }
        match node.kind() {
            "number" => parse_number(self.text(&node)),
            "unary_expression" => {
                let operator = node.child_by_field_name("operator")?;
                let argument = node.child_by_field_name("argument")?;
                if argument.kind() != "number" {
                    return None;
                }
                let value = parse_number(self.text(&argument))?;
                match self.text(&operator) {
                    "-" => Some(-value),
                    "+" => Some(value),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

pub(super) fn has_token(node: &Node<'_>, token: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|child| !child.is_named() && child.kind() == token);
    found
}

fn is_this_parameter(node: &Node<'_>) -> bool {
    node.kind() == "required_parameter"
        && node
            .child_by_field_name("pattern")
            .is_some_and(|pattern| pattern.kind() == "this")
}

fn has_named_kind(node: &Node<'_>, kind: &str) -> bool {
    named_child_of_kind(node, kind).is_some()
}

pub(super) fn named_child_of_kind<'tree>(node: &Node<'tree>, kind: &str) -> Option<Node<'tree>> {
    let mut cursor = node.walk();
    let found = node
        .named_children(&mut cursor)
        .find(|child| child.kind() == kind);
    found
}

pub(super) fn quote(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".into())
}

fn unquote(text: &str) -> &str {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' || first == b'\'') && first == last {
            return &text[1..text.len() - 1];
        }
    }
    text
}

fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();
    let radix = |prefix: &str, radix: u32| {
        lower
            .strip_prefix(prefix)
            .and_then(|digits| i64::from_str_radix(digits, radix).ok())
            .map(|v| v as f64)
    };
    radix("0x", 16)
        .or_else(|| radix("0o", 8))
        .or_else(|| radix("0b", 2))
        .or_else(|| lower.parse::<f64>().ok())
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
