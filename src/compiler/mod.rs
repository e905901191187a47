//! TSX → executable module lowering.
//!
//! Widgets arrive as TypeScript + JSX. The engine inside the sandbox runs
//! plain JavaScript, so this module parses the source with tree-sitter and
//! rewrites it: type-only syntax is erased, JSX becomes
//! `React.createElement` calls, and ES module syntax becomes the
//! `exports` / `require` calling convention the sandbox provides.

mod entities;
mod jsx;
mod lower;

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Instant,
};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tree_sitter::{Node, Parser, Tree};
use tree_sitter_typescript::LANGUAGE_TSX;

use crate::config::{
    errors::{ERR_COMPILE_PARSER, ERR_COMPILE_SYNTAX, ERR_COMPILE_TOO_LARGE},
    limits::{COMPILE_CACHE_CAPACITY, MAX_SOURCE_BYTES},
};

use lower::Lowerer;

/// Executable output of one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModule {
    executable_body: String,
    digest: String,
}

impl CompiledModule {
    pub fn executable_body(&self) -> &str {
        &self.executable_body
    }

    /// SHA-256 of the (export name, source) pair this module was built from.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

/// Compilation failed; nothing was produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
    /// 1-based position of the first offending node, when known.
    pub line: Option<usize>,
    pub column: Option<usize>,
    /// The input exactly as received.
    pub source_code: String,
}

impl CompileError {
    pub(crate) fn new(message: impl Into<String>, source_code: &str) -> Self {
        Self {
            message: message.into(),
            line: None,
            column: None,
            source_code: source_code.to_string(),
        }
    }

    pub(crate) fn at(mut self, node: &Node<'_>) -> Self {
        let pos = node.start_position();
        self.line = Some(pos.row + 1);
        self.column = Some(pos.column + 1);
        self
    }

    /// Source location rendered like a one-frame stack trace.
    pub fn location(&self) -> Option<String> {
        match (self.line, self.column) {
            (Some(line), Some(column)) => Some(format!("    at widget.tsx:{line}:{column}")),
            _ => None,
        }
    }
}

/// Memoizing front end over [`transpile`].
///
/// Clones share one cache. Entries are keyed by a digest of
/// (export name, source), so a changed input always recompiles.
#[derive(Clone)]
pub struct SourceCompiler {
    cache: Arc<Mutex<CompileCache>>,
}

impl Default for SourceCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceCompiler {
    pub fn new() -> Self {
        Self::with_capacity(COMPILE_CACHE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cache: Arc::new(Mutex::new(CompileCache::new(capacity))),
        }
    }

    pub fn compile(
        &self,
        source: &str,
        export_name: &str,
    ) -> Result<Arc<CompiledModule>, CompileError> {
        let digest = cache_key(source, export_name);
        if let Some(hit) = self.cache.lock().get(&digest) {
            tracing::debug!(target = "aiwidget", digest = %digest, "compile cache hit");
            return Ok(hit);
        }

        let _span = tracing::info_span!("compile_widget", export = %export_name, bytes = source.len())
            .entered();
        let started = Instant::now();
        let body = transpile(source)?;
        tracing::debug!(
            target = "aiwidget",
            duration_ms = started.elapsed().as_millis() as u64,
            "transpiled widget module:\n{body}"
        );

        let module = Arc::new(CompiledModule {
            executable_body: body,
            digest: digest.clone(),
        });
        self.cache.lock().insert(digest, module.clone());
        Ok(module)
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.lock().len()
    }
}

/// Lower one TSX source string into an executable module body.
///
/// Deterministic: the same input always produces the same bytes.
pub fn transpile(source: &str) -> Result<String, CompileError> {
    if source.len() > MAX_SOURCE_BYTES {
        return Err(CompileError::new(
            format!(
                "{ERR_COMPILE_TOO_LARGE}: source is {} bytes, limit is {MAX_SOURCE_BYTES}",
                source.len()
            ),
            source,
        ));
    }
    let tree = parse_tsx(source)?;
    if tree.root_node().has_error() {
        return Err(syntax_error(&tree, source));
    }
    Lowerer::new(source).lower_program(tree.root_node())
}

fn parse_tsx(source: &str) -> Result<Tree, CompileError> {
    let mut parser = Parser::new();
    parser.set_language(&LANGUAGE_TSX.into()).map_err(|err| {
        CompileError::new(
            format!("{ERR_COMPILE_PARSER}: failed to initialize TSX parser: {err}"),
            source,
        )
    })?;
    parser.parse(source, None).ok_or_else(|| {
        CompileError::new(format!("{ERR_COMPILE_PARSER}: failed to parse TSX"), source)
    })
}

fn syntax_error(tree: &Tree, source: &str) -> CompileError {
    let Some(node) = first_error_node(tree.root_node()) else {
        return CompileError::new(format!("{ERR_COMPILE_SYNTAX}: SyntaxError"), source);
    };
    let pos = node.start_position();
    let detail = if node.is_missing() {
        format!("missing `{}`", node.kind())
    } else {
        let text = node
            .utf8_text(source.as_bytes())
            .unwrap_or_default()
            .trim();
        match text.chars().next() {
            Some(ch) => format!("unexpected token `{ch}`"),
            None => "unexpected end of input".to_string(),
        }
    };
    CompileError::new(
        format!(
            "{ERR_COMPILE_SYNTAX}: SyntaxError: {detail} ({}:{})",
            pos.row + 1,
            pos.column + 1
        ),
        source,
    )
    .at(&node)
}

/// Pre-order search with a cursor; only subtrees that contain an error are
/// entered.
fn first_error_node(root: Node<'_>) -> Option<Node<'_>> {
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                return None;
            }
        }
    }
}

fn cache_key(source: &str, export_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(export_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}

struct CompileCache {
    entries: HashMap<String, Arc<CompiledModule>>,
    order: VecDeque<String>,
    capacity: usize,
}

impl CompileCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn get(&self, key: &str) -> Option<Arc<CompiledModule>> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: String, module: Arc<CompiledModule>) {
        if self.entries.insert(key.clone(), module).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
