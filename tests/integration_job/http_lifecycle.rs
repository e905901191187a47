//! Orchestrator + HTTP client against a mock generation service, on real
//! time with a short poll interval.

use std::{sync::Arc, time::Duration};

use aiwidget::{
    config::service::parse_base_url, job::START_FAILED, Dashboard, HttpGenerationService,
    JobOrchestrator, JobPhase, JobSnapshot, JobStatus, SandboxExecutor, ServiceConfig,
};
use httpmock::prelude::*;
use serde_json::json;
use tokio::sync::watch;

const POLL_INTERVAL: Duration = Duration::from_millis(200);
const DEADLINE: Duration = Duration::from_secs(10);

fn orchestrator(server: &MockServer) -> JobOrchestrator {
    let base = parse_base_url(&server.url("/api")).unwrap();
    let service = HttpGenerationService::new(reqwest::Client::new(), base);
    JobOrchestrator::new(Arc::new(service), POLL_INTERVAL)
}

async fn wait_until(
    rx: &mut watch::Receiver<JobSnapshot>,
    done: impl FnMut(&JobSnapshot) -> bool,
) -> JobSnapshot {
    tokio::time::timeout(DEADLINE, rx.wait_for(done))
        .await
        .expect("timed out waiting for job state")
        .expect("orchestrator dropped")
        .clone()
}

async fn wait_for_hits(mock: &httpmock::Mock<'_>, hits: usize) {
    tokio::time::timeout(DEADLINE, async {
        while mock.hits_async().await < hits {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("mock was never called");
}

#[tokio::test]
async fn running_then_success_delivers_widgets() {
    let server = MockServer::start_async().await;
    let start = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate-widgets");
            then.status(200)
                .json_body(json!({"task_id": "t-1", "status": "PENDING"}));
        })
        .await;
    let mut running = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/generate-widgets/result/t-1");
            then.status(200)
                .json_body(json!({"task_id": "t-1", "status": "RUNNING"}));
        })
        .await;

    let jobs = orchestrator(&server);
    let mut rx = jobs.subscribe();
    jobs.start();

    let polling = wait_until(&mut rx, |s| s.result_status == Some(JobStatus::Running)).await;
    assert_eq!(polling.phase, JobPhase::Polling);
    assert_eq!(polling.job_id.as_deref(), Some("t-1"));
    assert!(polling.result.is_none());
    wait_for_hits(&running, 1).await;
    running.delete_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/generate-widgets/result/t-1");
            then.status(200).json_body(json!({
                "task_id": "t-1",
                "status": "SUCCESS",
                "result": [{
                    "widget_title": "Clock",
                    "widget_description": "Shows the time",
                    "code": "export const WidgetComponent = () => <time>12:00</time>;"
                }]
            }));
        })
        .await;

    let done = wait_until(&mut rx, |s| s.phase.is_terminal()).await;
    assert_eq!(done.phase, JobPhase::Succeeded);
    let widgets = done.result.clone().unwrap();
    assert_eq!(widgets.len(), 1);
    assert_eq!(widgets[0].title, "Clock");
    start.assert_hits_async(1).await;

    let mut page = Dashboard::new(jobs.clone(), SandboxExecutor::default(), &ServiceConfig::default());
    let html = page.render_page(&done);
    assert!(html.contains("<time>12:00</time>"));
    assert!(!html.contains("Generate Widget"));
}

#[tokio::test]
async fn start_failure_surfaces_the_start_message() {
    let server = MockServer::start_async().await;
    let start = server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate-widgets");
            then.status(500).body("boom");
        })
        .await;

    let jobs = orchestrator(&server);
    let mut rx = jobs.subscribe();
    jobs.start();

    let failed = wait_until(&mut rx, |s| s.start_error.is_some()).await;
    assert_eq!(failed.phase, JobPhase::Idle);
    assert!(!failed.is_starting);
    assert_eq!(failed.error_message().as_deref(), Some(START_FAILED));
    assert!(failed.start_error.unwrap().detail.contains("HTTP 500"));
    start.assert_hits_async(1).await;
}

#[tokio::test]
async fn failure_status_is_terminal_without_widgets() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate-widgets");
            then.status(200).json_body(json!({"task_id": "t-2"}));
        })
        .await;
    let poll = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/generate-widgets/result/t-2");
            then.status(200)
                .json_body(json!({"task_id": "t-2", "status": "FAILURE"}));
        })
        .await;

    let jobs = orchestrator(&server);
    let mut rx = jobs.subscribe();
    jobs.start();

    let done = wait_until(&mut rx, |s| s.phase.is_terminal()).await;
    assert_eq!(done.phase, JobPhase::Failed);
    assert_eq!(done.result_status, Some(JobStatus::Failure));
    assert!(done.result.is_none());

    tokio::time::sleep(POLL_INTERVAL * 3).await;
    poll.assert_hits_async(1).await;
}

#[tokio::test]
async fn reset_stops_polling() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/api/generate-widgets");
            then.status(200).json_body(json!({"task_id": "t-3", "status": "PENDING"}));
        })
        .await;
    let poll = server
        .mock_async(|when, then| {
            when.method(GET).path("/api/generate-widgets/result/t-3");
            then.status(200)
                .json_body(json!({"task_id": "t-3", "status": "PENDING"}));
        })
        .await;

    let jobs = orchestrator(&server);
    let handle = jobs.start();
    wait_for_hits(&poll, 1).await;

    jobs.reset();
    tokio::time::timeout(DEADLINE, handle)
        .await
        .expect("job task kept running after reset")
        .unwrap();
    let hits = poll.hits_async().await;

    tokio::time::sleep(POLL_INTERVAL * 3).await;
    assert_eq!(poll.hits_async().await, hits);
    assert_eq!(jobs.snapshot(), JobSnapshot::default());
}
