//! Dashboard flow driven by the scripted service (needs `test_support`).

use std::{sync::Arc, time::Duration};

use aiwidget::{
    job::{PollError, PollResponse, StartResponse, POLL_FAILED},
    test_support::ScriptedService,
    Dashboard, GeneratedWidget, JobOrchestrator, JobPhase, SandboxExecutor, ServiceConfig,
};

const INTERVAL: Duration = Duration::from_secs(10);

fn widget(code: &str) -> GeneratedWidget {
    GeneratedWidget {
        title: "Scripted".into(),
        description: String::new(),
        source_code: code.into(),
    }
}

#[tokio::test(start_paused = true)]
async fn transient_poll_error_clears_on_the_next_success() {
    let service = ScriptedService::new()
        .with_start(Ok(StartResponse {
            task_id: "s-1".into(),
            status: "PENDING".into(),
        }))
        .with_poll(Err(PollError::new("E-WIDGET-0110: service responded with HTTP 502")))
        .with_poll(Ok(PollResponse {
            task_id: Some("s-1".into()),
            status: "SUCCESS".into(),
            result: Some(vec![
                widget("export const WidgetComponent = () => <p>ok</p>;"),
                widget("export const WidgetComponent = () => <p>;"),
            ]),
        }));
    let jobs = JobOrchestrator::new(Arc::new(service.clone()), INTERVAL);
    let mut page = Dashboard::new(jobs.clone(), SandboxExecutor::default(), &ServiceConfig::default());
    let mut rx = jobs.subscribe();

    page.generate().expect("idle dashboard accepts generate");

    let erred = rx.wait_for(|s| s.poll_error.is_some()).await.unwrap().clone();
    let html = page.render_page(&erred);
    assert!(html.contains(POLL_FAILED));
    assert!(html.contains("class=\"generate\" disabled"));

    let done = rx.wait_for(|s| s.phase == JobPhase::Succeeded).await.unwrap().clone();
    assert!(done.poll_error.is_none());
    let html = page.render_page(&done);
    assert!(html.contains("<p>ok</p>"));
    assert!(html.contains("Failed to transpile component."));
    assert!(!html.contains(POLL_FAILED));
    assert_eq!(service.poll_calls(), 2);
}
