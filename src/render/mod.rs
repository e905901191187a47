//! Per-widget render boundary.
//!
//! A [`WidgetRenderBoundary`] owns one widget's execution outcome and turns
//! it into HTML: the component's markup on success, the diagnostic panel on
//! any failure. Nothing a widget does escapes as an error or a panic.

pub mod html;
mod panel;

use serde_json::{Map, Value};

use crate::{
    config::HeadersMap,
    sandbox::{ExecutionOutcome, SandboxExecutor},
};

pub use panel::{diagnostic_panel, FAILURE_HEADLINE, HIDE_DETAILS, SHOW_DETAILS};

/// Props handed to every widget component.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderProps {
    pub headers: HeadersMap,
    pub dark_mode: bool,
    pub extra: Map<String, Value>,
}

impl RenderProps {
    pub fn new(headers: HeadersMap, dark_mode: bool) -> Self {
        Self {
            headers,
            dark_mode,
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// `headersMap` and `darkMode` always win over same-named extras.
    pub fn to_value(&self) -> Value {
        let mut props = self.extra.clone();
        props.insert("headersMap".into(), self.headers.to_value());
        props.insert("darkMode".into(), Value::Bool(self.dark_mode));
        Value::Object(props)
    }
}

pub struct WidgetRenderBoundary {
    executor: SandboxExecutor,
    source: String,
    export_name: String,
    outcome: ExecutionOutcome,
    show_details: bool,
    loads: usize,
}

impl WidgetRenderBoundary {
    pub fn new(executor: SandboxExecutor, source: &str, export_name: &str) -> Self {
        let outcome = executor.load(source, export_name);
        Self {
            executor,
            source: source.to_string(),
            export_name: export_name.to_string(),
            outcome,
            show_details: false,
            loads: 1,
        }
    }

    /// Swap in new input. Returns `true` when the module was re-executed,
    /// which only happens when the source or export name changed.
    pub fn update_source(&mut self, source: &str, export_name: &str) -> bool {
        if self.source == source && self.export_name == export_name {
            return false;
        }
        self.source = source.to_string();
        self.export_name = export_name.to_string();
        self.outcome = self.executor.load(source, export_name);
        self.show_details = false;
        self.loads += 1;
        true
    }

    pub fn toggle_details(&mut self) -> bool {
        self.show_details = !self.show_details;
        self.show_details
    }

    pub fn set_show_details(&mut self, show: bool) {
        self.show_details = show;
    }

    pub fn show_details(&self) -> bool {
        self.show_details
    }

    pub fn outcome(&self) -> &ExecutionOutcome {
        &self.outcome
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of times this boundary has executed a module.
    pub fn load_count(&self) -> usize {
        self.loads
    }

    pub fn render(&mut self, props: &RenderProps) -> String {
        if let ExecutionOutcome::Success(component) = &mut self.outcome {
            match component.render(&props.to_value()) {
                Ok(nodes) => return html::render_nodes(&nodes),
                Err(diagnostic) => {
                    tracing::warn!(
                        target = "aiwidget",
                        message = %diagnostic.message,
                        "widget render failed; showing diagnostic panel"
                    );
                    self.outcome = ExecutionOutcome::Failure(diagnostic);
                }
            }
        }
        match &self.outcome {
            ExecutionOutcome::Failure(diagnostic) => diagnostic_panel(diagnostic, self.show_details),
            ExecutionOutcome::Success(_) => String::new(),
        }
    }
}
