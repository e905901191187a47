//! Broken widgets degrade to the diagnostic panel and never take the page
//! down with them.

use aiwidget::{
    render::{FAILURE_HEADLINE, HIDE_DETAILS, SHOW_DETAILS},
    DiagnosticKind, RenderProps, SandboxExecutor, WidgetRenderBoundary,
};

const EXPORT: &str = "WidgetComponent";

fn boundary(source: &str) -> WidgetRenderBoundary {
    WidgetRenderBoundary::new(SandboxExecutor::default(), source, EXPORT)
}

fn kind_of(boundary: &WidgetRenderBoundary) -> DiagnosticKind {
    boundary
        .outcome()
        .diagnostic()
        .map(|diagnostic| diagnostic.kind)
        .expect("expected a failed outcome")
}

#[test]
fn syntax_error_panel_reveals_the_exact_input() {
    let source = "export const WidgetComponent = () => <div>{1 + }</div>;";
    let mut widget = boundary(source);
    assert_eq!(kind_of(&widget), DiagnosticKind::Compile);

    let collapsed = widget.render(&RenderProps::default());
    assert!(collapsed.contains(FAILURE_HEADLINE));
    assert!(collapsed.contains(SHOW_DETAILS));
    assert!(!collapsed.contains("widget-error-details"));

    assert!(widget.toggle_details());
    let expanded = widget.render(&RenderProps::default());
    assert!(expanded.contains(HIDE_DETAILS));
    assert!(expanded.contains("export const WidgetComponent = () =&gt; &lt;div&gt;{1 + }&lt;/div&gt;;"));
    assert!(expanded.contains("widget.tsx:1:"));
}

#[test]
fn disallowed_module_is_a_resolution_failure() {
    let source = "const net = require(\"net\");\nexport const WidgetComponent = () => <p>{typeof net}</p>;";
    let mut widget = boundary(source);
    assert_eq!(kind_of(&widget), DiagnosticKind::Resolution);

    widget.set_show_details(true);
    let html = widget.render(&RenderProps::default());
    assert!(html.contains("E-WIDGET-0300"), "{html}");
    assert!(html.contains("&#39;net&#39;") || html.contains("'net'"), "{html}");
}

#[test]
fn wrong_export_name_reports_no_such_export() {
    let mut widget = WidgetRenderBoundary::new(
        SandboxExecutor::default(),
        "export const WidgetComponent = () => <p>hi</p>;",
        "Card",
    );
    assert_eq!(kind_of(&widget), DiagnosticKind::ExportNotFound);
    widget.set_show_details(true);
    assert!(widget.render(&RenderProps::default()).contains("no such export"));
}

#[test]
fn render_failure_replaces_a_loaded_widget() {
    let source = r#"
export const WidgetComponent = ({ darkMode }: { darkMode: boolean }) => {
  if (darkMode) {
    throw new Error("dark mode unsupported");
  }
  return <p>light</p>;
};
"#;
    let mut widget = boundary(source);
    assert_eq!(widget.render(&RenderProps::default()), "<p>light</p>");

    let dark = RenderProps::new(Default::default(), true);
    let html = widget.render(&dark);
    assert!(html.contains(FAILURE_HEADLINE));
    assert_eq!(kind_of(&widget), DiagnosticKind::Render);

    // Sticky until the source changes.
    assert!(widget.render(&RenderProps::default()).contains(FAILURE_HEADLINE));
    assert!(widget.update_source("export const WidgetComponent = () => <p>fixed</p>;", EXPORT));
    assert_eq!(widget.render(&dark), "<p>fixed</p>");
}

#[test]
fn one_broken_widget_does_not_affect_its_neighbour() {
    let executor = SandboxExecutor::default();
    let mut broken = WidgetRenderBoundary::new(
        executor.clone(),
        "export const WidgetComponent = () => { throw new Error(\"x\"); };",
        EXPORT,
    );
    let mut healthy = WidgetRenderBoundary::new(
        executor,
        "export const WidgetComponent = () => <b>ok</b>;",
        EXPORT,
    );
    assert!(broken.render(&RenderProps::default()).contains(FAILURE_HEADLINE));
    assert_eq!(healthy.render(&RenderProps::default()), "<b>ok</b>");
}
