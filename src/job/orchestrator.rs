use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::{sync::watch, task::JoinHandle};
use tracing::Instrument;

use super::{
    GeneratedWidget, GenerationJob, GenerationService, JobStatus, PollError, PollResponse,
    StartError,
};
use crate::config::errors::ERR_POLL_MISMATCH;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JobPhase {
    #[default]
    Idle,
    Starting,
    Polling,
    Succeeded,
    Failed,
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Succeeded | JobPhase::Failed)
    }
}

/// Everything an observer can see about the current job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobSnapshot {
    pub phase: JobPhase,
    /// True strictly while the start request is outstanding.
    pub is_starting: bool,
    pub start_error: Option<StartError>,
    pub job_id: Option<String>,
    /// Present only once the job reported SUCCESS with a result.
    pub result: Option<Vec<GeneratedWidget>>,
    pub result_status: Option<JobStatus>,
    /// True while a poll request is in flight.
    pub is_polling: bool,
    pub poll_error: Option<PollError>,
}

impl JobSnapshot {
    pub fn job(&self) -> Option<GenerationJob> {
        let job_id = self.job_id.clone()?;
        Some(GenerationJob {
            job_id,
            status: self.result_status.unwrap_or(JobStatus::Pending),
            result: self.result.clone(),
        })
    }

    /// Alert text for the page, start failures first.
    pub fn error_message(&self) -> Option<String> {
        self.start_error
            .as_ref()
            .map(ToString::to_string)
            .or_else(|| self.poll_error.as_ref().map(ToString::to_string))
    }
}

struct Inner {
    /// Bumped by every `start()` and `reset()`; work tagged with an older
    /// epoch is stale.
    epoch: u64,
    snapshot: JobSnapshot,
}

enum PollStep {
    Continue,
    Stop,
}

/// Drives one generation job from start request to terminal status.
///
/// `start()` and `reset()` never block. State changes are published on a
/// `watch` channel; responses that arrive after a `reset()` (or after a
/// newer `start()`) are dropped.
#[derive(Clone)]
pub struct JobOrchestrator {
    service: Arc<dyn GenerationService>,
    poll_interval: Duration,
    inner: Arc<Mutex<Inner>>,
    state_tx: Arc<watch::Sender<JobSnapshot>>,
    cancel_tx: Arc<watch::Sender<u64>>,
}

impl JobOrchestrator {
    pub fn new(service: Arc<dyn GenerationService>, poll_interval: Duration) -> Self {
        let (state_tx, _) = watch::channel(JobSnapshot::default());
        let (cancel_tx, _) = watch::channel(0);
        Self {
            service,
            poll_interval,
            inner: Arc::new(Mutex::new(Inner {
                epoch: 0,
                snapshot: JobSnapshot::default(),
            })),
            state_tx: Arc::new(state_tx),
            cancel_tx: Arc::new(cancel_tx),
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        self.inner.lock().snapshot.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<JobSnapshot> {
        self.state_tx.subscribe()
    }

    /// Issue the start request in the background. A previous job, if any, is
    /// superseded.
    pub fn start(&self) -> JoinHandle<()> {
        let epoch = {
            let mut inner = self.inner.lock();
            inner.epoch += 1;
            inner.snapshot = JobSnapshot {
                phase: JobPhase::Starting,
                is_starting: true,
                ..JobSnapshot::default()
            };
            self.publish(&inner);
            inner.epoch
        };
        self.cancel_tx.send_replace(epoch);

        let this = self.clone();
        let span = tracing::info_span!("job_start", epoch);
        tokio::spawn(async move { this.run(epoch).await }.instrument(span))
    }

    /// Drop the current job and all derived state. Safe at any time; a poll
    /// already on the wire is not aborted, its response is ignored.
    pub fn reset(&self) {
        let epoch = {
            let mut inner = self.inner.lock();
            inner.epoch += 1;
            inner.snapshot = JobSnapshot::default();
            self.publish(&inner);
            inner.epoch
        };
        self.cancel_tx.send_replace(epoch);
        tracing::info!(target = "aiwidget", epoch, "job reset");
    }

    fn publish(&self, inner: &Inner) {
        self.state_tx.send_replace(inner.snapshot.clone());
    }

    async fn run(self, epoch: u64) {
        let started = self.service.start().await;

        let job_id = {
            let mut inner = self.inner.lock();
            if inner.epoch != epoch {
                tracing::debug!(target = "aiwidget", epoch, "discarding stale start response");
                return;
            }
            inner.snapshot.is_starting = false;
            match started {
                Ok(response) => {
                    tracing::info!(target = "aiwidget", job_id = %response.task_id, "generation job started");
                    inner.snapshot.phase = JobPhase::Polling;
                    inner.snapshot.job_id = Some(response.task_id.clone());
                    self.publish(&inner);
                    response.task_id
                }
                Err(err) => {
                    tracing::warn!(target = "aiwidget", detail = %err.detail, "{err}");
                    inner.snapshot.phase = JobPhase::Idle;
                    inner.snapshot.start_error = Some(err);
                    self.publish(&inner);
                    return;
                }
            }
        };

        self.poll_loop(epoch, &job_id)
            .instrument(tracing::info_span!("job_poll", job_id = %job_id))
            .await;
    }

    async fn poll_loop(&self, epoch: u64, job_id: &str) {
        let mut cancel = self.cancel_tx.subscribe();
        loop {
            if !self.begin_poll(epoch, job_id) {
                return;
            }
            let response = self.service.poll(job_id).await;
            if let PollStep::Stop = self.apply_poll(epoch, job_id, response) {
                return;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() != epoch {
                        tracing::debug!(target = "aiwidget", "poll loop cancelled");
                        return;
                    }
                }
            }
        }
    }

    fn begin_poll(&self, epoch: u64, job_id: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch || inner.snapshot.job_id.as_deref() != Some(job_id) {
            return false;
        }
        inner.snapshot.is_polling = true;
        self.publish(&inner);
        true
    }

    fn apply_poll(
        &self,
        epoch: u64,
        job_id: &str,
        response: Result<PollResponse, PollError>,
    ) -> PollStep {
        let mut inner = self.inner.lock();
        if inner.epoch != epoch || inner.snapshot.job_id.as_deref() != Some(job_id) {
            tracing::debug!(target = "aiwidget", job_id, "discarding stale poll response");
            return PollStep::Stop;
        }
        inner.snapshot.is_polling = false;

        let response = match response {
            Ok(response) => match response.task_id.as_deref() {
                Some(reported) if reported != job_id => Err(PollError::new(format!(
                    "{ERR_POLL_MISMATCH}: response is for task {reported}"
                ))),
                _ => Ok(response),
            },
            Err(err) => Err(err),
        };

        let step = match response {
            Ok(response) => {
                let status = JobStatus::from_wire(&response.status);
                tracing::debug!(target = "aiwidget", status = status.as_wire(), "poll response");
                inner.snapshot.poll_error = None;
                inner.snapshot.result_status = Some(status);
                inner.snapshot.result = match status {
                    JobStatus::Success => response.result,
                    _ => None,
                };
                match status {
                    JobStatus::Success => {
                        inner.snapshot.phase = JobPhase::Succeeded;
                        tracing::info!(
                            target = "aiwidget",
                            widgets = inner.snapshot.result.as_ref().map_or(0, Vec::len),
                            "generation job succeeded"
                        );
                        PollStep::Stop
                    }
                    JobStatus::Failure => {
                        inner.snapshot.phase = JobPhase::Failed;
                        tracing::warn!(target = "aiwidget", "generation job failed");
                        PollStep::Stop
                    }
                    JobStatus::Pending | JobStatus::Running => PollStep::Continue,
                }
            }
            Err(err) => {
                tracing::warn!(target = "aiwidget", detail = %err.detail, "{err}");
                inner.snapshot.poll_error = Some(err);
                PollStep::Continue
            }
        };
        self.publish(&inner);
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{StartResponse, POLL_FAILED, START_FAILED};
    use crate::test_support::ScriptedService;
    use tokio::time::Instant;

    const INTERVAL: Duration = Duration::from_secs(10);

    fn widget(title: &str) -> GeneratedWidget {
        GeneratedWidget {
            title: title.into(),
            description: "d".into(),
            source_code: "export const WidgetComponent = () => null;".into(),
        }
    }

    fn started(task_id: &str) -> Result<StartResponse, StartError> {
        Ok(StartResponse {
            task_id: task_id.into(),
            status: "PENDING".into(),
        })
    }

    fn status(task_id: &str, status: &str, result: Option<Vec<GeneratedWidget>>) -> Result<PollResponse, PollError> {
        Ok(PollResponse {
            task_id: Some(task_id.into()),
            status: status.into(),
            result,
        })
    }

    async fn settle(orchestrator: &JobOrchestrator, done: impl Fn(&JobSnapshot) -> bool) -> JobSnapshot {
        let mut rx = orchestrator.subscribe();
        let snapshot = rx.wait_for(|s| done(s)).await.expect("orchestrator alive").clone();
        snapshot
    }

    #[tokio::test(start_paused = true)]
    async fn running_then_success_stops_polling() {
        let service = ScriptedService::new()
            .with_start(started("t1"))
            .with_poll(status("t1", "RUNNING", None))
            .with_poll(status("t1", "SUCCESS", Some(vec![widget("W1")])));
        let orchestrator = JobOrchestrator::new(Arc::new(service.clone()), INTERVAL);

        let begun = Instant::now();
        orchestrator.start();
        let snapshot = settle(&orchestrator, |s| s.phase.is_terminal()).await;

        assert_eq!(snapshot.phase, JobPhase::Succeeded);
        assert_eq!(snapshot.result.as_ref().map(Vec::len), Some(1));
        assert_eq!(snapshot.result_status, Some(JobStatus::Success));
        assert!(!snapshot.is_polling);

        let polls = service.poll_times();
        assert_eq!(polls.len(), 2);
        assert_eq!(polls[0] - begun, Duration::ZERO);
        let gap = polls[1] - polls[0];
        assert!(gap >= INTERVAL && gap < INTERVAL + Duration::from_millis(50), "{gap:?}");

        tokio::time::sleep(INTERVAL * 5).await;
        assert_eq!(service.poll_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn non_terminal_statuses_never_set_result() {
        let service = ScriptedService::new()
            .with_start(started("t1"))
            .with_poll(status("t1", "PENDING", Some(vec![widget("early")])))
            .with_poll(status("t1", "STARTED", None))
            .with_poll(status("t1", "RUNNING", None));
        let orchestrator = JobOrchestrator::new(Arc::new(service.clone()), INTERVAL);
        orchestrator.start();

        let mut rx = orchestrator.subscribe();
        for _ in 0..12 {
            rx.changed().await.unwrap();
            let snapshot = rx.borrow_and_update().clone();
            assert!(snapshot.result.is_none());
            assert!(!snapshot.phase.is_terminal());
        }
        assert!(service.poll_calls() >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn start_failure_sets_error_and_allows_retry() {
        let service = ScriptedService::new()
            .with_start(Err(StartError::new("E-WIDGET-0100: service responded with HTTP 500")))
            .with_start(started("t2"))
            .with_poll(status("t2", "SUCCESS", Some(vec![])));
        let orchestrator = JobOrchestrator::new(Arc::new(service.clone()), INTERVAL);

        orchestrator.start();
        let failed = settle(&orchestrator, |s| !s.is_starting && s.start_error.is_some()).await;
        assert_eq!(failed.error_message().as_deref(), Some(START_FAILED));
        assert!(failed.job_id.is_none());
        assert_eq!(failed.phase, JobPhase::Idle);
        assert_eq!(service.poll_calls(), 0);

        orchestrator.start();
        assert!(orchestrator.snapshot().start_error.is_none());
        let done = settle(&orchestrator, |s| s.phase.is_terminal()).await;
        assert_eq!(done.job_id.as_deref(), Some("t2"));
        assert_eq!(done.result, Some(vec![]));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_errors_surface_without_stopping_the_schedule() {
        let service = ScriptedService::new()
            .with_start(started("t1"))
            .with_poll(Err(PollError::new("E-WIDGET-0110: connection reset")))
            .with_poll(status("t1", "SUCCESS", Some(vec![widget("W1")])));
        let orchestrator = JobOrchestrator::new(Arc::new(service.clone()), INTERVAL);
        orchestrator.start();

        let errored = settle(&orchestrator, |s| s.poll_error.is_some()).await;
        assert_eq!(errored.error_message().as_deref(), Some(POLL_FAILED));
        assert_eq!(errored.phase, JobPhase::Polling);

        let done = settle(&orchestrator, |s| s.phase.is_terminal()).await;
        assert!(done.poll_error.is_none());
        assert_eq!(service.poll_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_discards_in_flight_poll() {
        let service = ScriptedService::new()
            .with_start(started("t1"))
            .with_delayed_poll(
                Duration::from_secs(5),
                status("t1", "SUCCESS", Some(vec![widget("W1")])),
            );
        let orchestrator = JobOrchestrator::new(Arc::new(service.clone()), INTERVAL);
        orchestrator.start();

        settle(&orchestrator, |s| s.is_polling).await;
        orchestrator.reset();
        assert_eq!(orchestrator.snapshot(), JobSnapshot::default());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(service.poll_calls(), 1);
        assert_eq!(orchestrator.snapshot(), JobSnapshot::default());
    }

    #[tokio::test(start_paused = true)]
    async fn late_poll_from_a_superseded_job_is_ignored() {
        let service = ScriptedService::new()
            .with_start(started("t1"))
            .with_start(started("t2"))
            .with_delayed_poll(
                Duration::from_secs(5),
                status("t1", "SUCCESS", Some(vec![widget("stale")])),
            )
            .with_poll(status("t2", "RUNNING", None))
            .with_poll(status("t2", "SUCCESS", Some(vec![widget("fresh")])));
        let orchestrator = JobOrchestrator::new(Arc::new(service.clone()), INTERVAL);

        let first = orchestrator.start();
        settle(&orchestrator, |s| s.is_polling && s.job_id.as_deref() == Some("t1")).await;
        tokio::time::sleep(Duration::from_secs(1)).await;

        orchestrator.start();
        settle(&orchestrator, |s| s.result_status == Some(JobStatus::Running)).await;
        let mut rx = orchestrator.subscribe();
        rx.borrow_and_update();

        // t1's response lands at 5s, while t2 sleeps until its next poll.
        first.await.unwrap();
        assert_eq!(service.poll_calls(), 2);
        assert!(!rx.has_changed().unwrap());
        let between = orchestrator.snapshot();
        assert_eq!(between.job_id.as_deref(), Some("t2"));
        assert_eq!(between.phase, JobPhase::Polling);
        assert!(between.result.is_none());

        let done = settle(&orchestrator, |s| s.phase.is_terminal()).await;
        assert_eq!(done.phase, JobPhase::Succeeded);
        assert_eq!(done.job_id.as_deref(), Some("t2"));
        assert_eq!(done.result, Some(vec![widget("fresh")]));
        assert_eq!(service.poll_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_wakes_a_sleeping_poll_loop() {
        let service = ScriptedService::new()
            .with_start(started("t1"))
            .with_poll(status("t1", "RUNNING", None))
            .with_poll(status("t1", "RUNNING", None));
        let orchestrator = JobOrchestrator::new(Arc::new(service.clone()), INTERVAL);
        let handle = orchestrator.start();

        settle(&orchestrator, |s| s.result_status == Some(JobStatus::Running)).await;
        orchestrator.reset();
        handle.await.unwrap();
        assert_eq!(service.poll_calls(), 1);
        assert_eq!(orchestrator.snapshot().phase, JobPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn mismatched_task_id_is_a_poll_error() {
        let service = ScriptedService::new()
            .with_start(started("t1"))
            .with_poll(status("other", "SUCCESS", Some(vec![widget("W1")])))
            .with_poll(status("t1", "FAILURE", None));
        let orchestrator = JobOrchestrator::new(Arc::new(service.clone()), INTERVAL);
        orchestrator.start();

        let errored = settle(&orchestrator, |s| s.poll_error.is_some()).await;
        assert!(errored.result.is_none());
        assert!(errored.poll_error.unwrap().detail.starts_with(ERR_POLL_MISMATCH));

        let done = settle(&orchestrator, |s| s.phase.is_terminal()).await;
        assert_eq!(done.phase, JobPhase::Failed);
        assert!(done.result.is_none());
    }
}
