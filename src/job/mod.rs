//! Generation-job lifecycle: wire types, the service seam and the
//! start → poll → terminal orchestrator.

mod client;
mod orchestrator;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use client::{GenerationService, HttpGenerationService};
pub use orchestrator::{JobOrchestrator, JobPhase, JobSnapshot};

pub const START_FAILED: &str = "Failed to start widget generation";
pub const POLL_FAILED: &str = "Failed to poll widget generation result";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failure,
}

impl JobStatus {
    /// Unknown status strings are treated as still running.
    pub fn from_wire(status: &str) -> Self {
        match status {
            "SUCCESS" => JobStatus::Success,
            "FAILURE" => JobStatus::Failure,
            "PENDING" => JobStatus::Pending,
            _ => JobStatus::Running,
        }
    }

    pub fn as_wire(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Running => "RUNNING",
            JobStatus::Success => "SUCCESS",
            JobStatus::Failure => "FAILURE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failure)
    }
}

/// One generated unit of widget source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedWidget {
    #[serde(rename = "widget_title", default)]
    pub title: String,
    #[serde(rename = "widget_description", default)]
    pub description: String,
    #[serde(rename = "code")]
    pub source_code: String,
}

#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub job_id: String,
    pub status: JobStatus,
    pub result: Option<Vec<GeneratedWidget>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartResponse {
    pub task_id: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollResponse {
    #[serde(default)]
    pub task_id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub result: Option<Vec<GeneratedWidget>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to start widget generation")]
pub struct StartError {
    /// Underlying cause, prefixed with a stable error code.
    pub detail: String,
}

impl StartError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to poll widget generation result")]
pub struct PollError {
    pub detail: String,
}

impl PollError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_treats_unknown_as_running() {
        assert_eq!(JobStatus::from_wire("SUCCESS"), JobStatus::Success);
        assert_eq!(JobStatus::from_wire("FAILURE"), JobStatus::Failure);
        assert_eq!(JobStatus::from_wire("PENDING"), JobStatus::Pending);
        assert_eq!(JobStatus::from_wire("STARTED"), JobStatus::Running);
        assert_eq!(JobStatus::from_wire("success"), JobStatus::Running);
        assert!(!JobStatus::from_wire("REVOKED").is_terminal());
    }

    #[test]
    fn poll_response_uses_wire_names() {
        let raw = r#"{"task_id":"t1","status":"SUCCESS","result":[{"widget_title":"W1","widget_description":"d","code":"export const WidgetComponent = () => null;"}]}"#;
        let parsed: PollResponse = serde_json::from_str(raw).unwrap();
        let widgets = parsed.result.unwrap();
        assert_eq!(widgets[0].title, "W1");
        assert_eq!(widgets[0].source_code, "export const WidgetComponent = () => null;");

        let pending: PollResponse = serde_json::from_str(r#"{"task_id":"t1","status":"PENDING","result":null}"#).unwrap();
        assert!(pending.result.is_none());
    }

    #[test]
    fn error_messages_are_fixed() {
        assert_eq!(StartError::new("E-WIDGET-0100: 500").to_string(), START_FAILED);
        assert_eq!(PollError::new("E-WIDGET-0110: timeout").to_string(), POLL_FAILED);
    }
}
