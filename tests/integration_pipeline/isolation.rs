//! Sandboxed code cannot reach host facilities or other widgets.

use aiwidget::{ExecutionOutcome, RenderProps, SandboxExecutor, WidgetRenderBoundary};
use serde_json::json;

const EXPORT: &str = "WidgetComponent";

fn render(source: &str) -> String {
    WidgetRenderBoundary::new(SandboxExecutor::default(), source, EXPORT).render(&RenderProps::default())
}

#[test]
fn host_globals_are_absent() {
    let html = render(
        "export const WidgetComponent = () => <p>{[typeof process, typeof fetch, typeof setTimeout].join(\",\")}</p>;",
    );
    assert_eq!(html, "<p>undefined,undefined,undefined</p>");
}

#[test]
fn the_ui_primitive_is_frozen() {
    let source = r#"
import React from "react";
let mutated = "no";
try {
  (React as any).createElement = () => null;
  mutated = String((React as any).createElement === null);
} catch (e) {
  mutated = "threw";
}
export const WidgetComponent = () => <p>{typeof React.createElement}</p>;
"#;
    assert_eq!(render(source), "<p>function</p>");
}

#[test]
fn globals_do_not_leak_between_widgets() {
    let executor = SandboxExecutor::default();
    let writer = "(globalThis as any).shared = \"secret\";\nexport const WidgetComponent = () => null;";
    let reader = "export const WidgetComponent = () => <p>{String((globalThis as any).shared)}</p>;";
    assert!(executor.load(writer, EXPORT).is_success());

    let ExecutionOutcome::Success(mut component) = executor.load(reader, EXPORT) else {
        panic!("reader should load");
    };
    let nodes = component.render(&json!({})).unwrap();
    assert_eq!(aiwidget::render::html::render_nodes(&nodes), "<p>undefined</p>");
}
