//! Composition root: user intents in, one HTML page out.

use tokio::task::JoinHandle;

use crate::{
    config::{HeadersMap, ServiceConfig},
    job::{GeneratedWidget, JobOrchestrator, JobPhase, JobSnapshot, JobStatus},
    render::{html::escape_text, RenderProps, WidgetRenderBoundary},
    sandbox::SandboxExecutor,
};

const LIGHT_GRID: &str = "background: rgba(255,255,255,0.25); border: 2px solid rgba(255,255,255,0.4)";
const DARK_GRID: &str = "background: rgba(16,24,40,0.85); border: 2px solid #1D2939";
const GRID_STYLE: &str = "padding: 16px; border-radius: 32px; text-align: center; max-width: 2000px; \
     min-height: 300px; margin: 0 auto; display: grid; grid-template-columns: repeat(3, 1fr); gap: 32px; \
     justify-items: center; align-items: center; \
     box-shadow: 0 8px 40px 0 rgba(0,0,0,0.25), 0 0 0 1px rgba(255,255,255,0.3) inset; \
     backdrop-filter: blur(24px); overflow-x: auto; overflow-y: visible";
const CARD_STYLE: &str = "width: 100%; max-width: 600px; height: 640px; border-radius: 16px; \
     display: flex; flex-direction: column; align-items: center; justify-content: center; \
     padding: 16px; margin: 8px; overflow: hidden; transition: background 0.2s, border 0.2s";
const FULL_ROW: &str = "grid-column: 1 / -1; margin-top: 16px";

struct WidgetSlot {
    widget: GeneratedWidget,
    boundary: WidgetRenderBoundary,
}

pub struct Dashboard {
    orchestrator: JobOrchestrator,
    executor: SandboxExecutor,
    headers: HeadersMap,
    export_name: String,
    dark_mode: bool,
    show_generate_button: bool,
    show_details: bool,
    slots: Vec<WidgetSlot>,
}

impl Dashboard {
    pub fn new(orchestrator: JobOrchestrator, executor: SandboxExecutor, config: &ServiceConfig) -> Self {
        Self {
            orchestrator,
            executor,
            headers: config.headers.clone(),
            export_name: config.export_name.clone(),
            dark_mode: false,
            show_generate_button: true,
            show_details: false,
            slots: Vec::new(),
        }
    }

    pub fn orchestrator(&self) -> &JobOrchestrator {
        &self.orchestrator
    }

    /// Start a generation job unless one is already starting or polling.
    pub fn generate(&mut self) -> Option<JoinHandle<()>> {
        let snapshot = self.orchestrator.snapshot();
        if is_busy(&snapshot) {
            tracing::debug!(target = "aiwidget", "generate ignored while a job is active");
            return None;
        }
        Some(self.orchestrator.start())
    }

    pub fn toggle_mode(&mut self) -> bool {
        self.dark_mode = !self.dark_mode;
        self.dark_mode
    }

    pub fn set_dark_mode(&mut self, dark: bool) {
        self.dark_mode = dark;
    }

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    /// Expanded or collapsed diagnostic details for every widget.
    pub fn set_show_details(&mut self, show: bool) {
        self.show_details = show;
        for slot in &mut self.slots {
            slot.boundary.set_show_details(show);
        }
    }

    pub fn toggle_details(&mut self, index: usize) -> Option<bool> {
        self.slots
            .get_mut(index)
            .map(|slot| slot.boundary.toggle_details())
    }

    pub fn reset(&mut self) {
        self.orchestrator.reset();
        self.slots.clear();
        self.show_generate_button = true;
    }

    pub fn widget_count(&self) -> usize {
        self.slots.len()
    }

    pub fn show_generate_button(&self) -> bool {
        self.show_generate_button
    }

    /// Bring the widget boundaries in line with `snapshot.result`. Existing
    /// boundaries are reused, so unchanged sources are not re-executed.
    pub fn sync(&mut self, snapshot: &JobSnapshot) {
        let widgets = snapshot.result.as_deref().unwrap_or_default();
        if snapshot.result_status == Some(JobStatus::Success) && !widgets.is_empty() {
            self.show_generate_button = false;
        }

        self.slots.truncate(widgets.len());
        for (index, widget) in widgets.iter().enumerate() {
            match self.slots.get_mut(index) {
                Some(slot) => {
                    slot.boundary.update_source(&widget.source_code, &self.export_name);
                    slot.widget = widget.clone();
                }
                None => {
                    let mut boundary = WidgetRenderBoundary::new(
                        self.executor.clone(),
                        &widget.source_code,
                        &self.export_name,
                    );
                    boundary.set_show_details(self.show_details);
                    self.slots.push(WidgetSlot {
                        widget: widget.clone(),
                        boundary,
                    });
                }
            }
        }
    }

    pub fn render_page(&mut self, snapshot: &JobSnapshot) -> String {
        self.sync(snapshot);
        let props = RenderProps::new(self.headers.clone(), self.dark_mode);
        let busy = is_busy(snapshot);

        let mut body = String::new();
        body.push_str(&format!(
            "<button type=\"button\" class=\"mode-toggle\" style=\"{FULL_ROW}; font-weight: 600\">{}</button>",
            if self.dark_mode { "Switch to Light Mode" } else { "Switch to Dark Mode" }
        ));

        if self.show_generate_button {
            let label = if busy {
                "<span class=\"spinner\" role=\"progressbar\" style=\"display: inline-block; width: 24px; height: 24px\"></span>"
            } else {
                "Generate Widget"
            };
            body.push_str(&format!(
                "<button type=\"button\" class=\"generate\"{} style=\"{FULL_ROW}; font-weight: 600\">{label}</button>",
                if busy { " disabled" } else { "" }
            ));
        }

        if let Some(message) = snapshot.error_message() {
            body.push_str(&format!(
                "<div role=\"alert\" class=\"alert alert-error\" style=\"{FULL_ROW}\">{}</div>",
                escape_text(&message)
            ));
        }

        if snapshot.phase == JobPhase::Polling && snapshot.result.is_none() {
            body.push_str(&format!(
                "<div class=\"loading\" style=\"{FULL_ROW}; display: flex; justify-content: center\">\
                 <span class=\"spinner\" role=\"progressbar\" style=\"display: inline-block; width: 48px; height: 48px\"></span></div>"
            ));
        }

        let card_theme = if self.dark_mode {
            "background: #101828; border: 2px solid #1D2939"
        } else {
            "background: #fff; border: 2px solid #D0D5DD"
        };
        for slot in &mut self.slots {
            let inner = slot.boundary.render(&props);
            body.push_str(&format!(
                "<div class=\"widget-card\" title=\"{}\" style=\"{CARD_STYLE}; {card_theme}\">{inner}</div>",
                crate::render::html::escape_attr(&slot.widget.title)
            ));
        }

        let grid_theme = if self.dark_mode { DARK_GRID } else { LIGHT_GRID };
        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>AI Widgets</title>\n</head>\n\
             <body style=\"margin: 0; padding: 24px; font-family: sans-serif\">\n\
             <div class=\"widget-dashboard\" style=\"{GRID_STYLE}; {grid_theme}\">{body}</div>\n</body>\n</html>\n"
        )
    }
}

fn is_busy(snapshot: &JobSnapshot) -> bool {
    snapshot.is_starting || snapshot.phase == JobPhase::Polling
}
