//! Test support infrastructure.
//!
//! Only compiled for tests or with the `test_support` feature. Nothing in
//! runtime code references this module.

#![cfg(any(test, feature = "test_support"))]

use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::job::{GenerationService, PollError, PollResponse, StartError, StartResponse};

struct ScriptedPoll {
    delay: Duration,
    response: Result<PollResponse, PollError>,
}

#[derive(Default)]
struct Script {
    starts: VecDeque<Result<StartResponse, StartError>>,
    polls: VecDeque<ScriptedPoll>,
    start_calls: usize,
    poll_times: Vec<Instant>,
}

/// Scripted [`GenerationService`]: answers with queued responses in order.
/// The last queued poll response repeats once the queue is down to one.
#[derive(Clone, Default)]
pub struct ScriptedService {
    script: Arc<Mutex<Script>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start(self, response: Result<StartResponse, StartError>) -> Self {
        self.script.lock().starts.push_back(response);
        self
    }

    pub fn with_poll(self, response: Result<PollResponse, PollError>) -> Self {
        self.with_delayed_poll(Duration::ZERO, response)
    }

    /// Queue a poll response that takes `delay` to arrive.
    pub fn with_delayed_poll(self, delay: Duration, response: Result<PollResponse, PollError>) -> Self {
        self.script
            .lock()
            .polls
            .push_back(ScriptedPoll { delay, response });
        self
    }

    pub fn start_calls(&self) -> usize {
        self.script.lock().start_calls
    }

    pub fn poll_calls(&self) -> usize {
        self.script.lock().poll_times.len()
    }

    /// When each poll request was received.
    pub fn poll_times(&self) -> Vec<Instant> {
        self.script.lock().poll_times.clone()
    }
}

#[async_trait]
impl GenerationService for ScriptedService {
    async fn start(&self) -> Result<StartResponse, StartError> {
        let mut script = self.script.lock();
        script.start_calls += 1;
        script
            .starts
            .pop_front()
            .unwrap_or_else(|| Err(StartError::new("scripted service: no start response queued")))
    }

    async fn poll(&self, _task_id: &str) -> Result<PollResponse, PollError> {
        let (delay, response) = {
            let mut script = self.script.lock();
            script.poll_times.push(Instant::now());
            let next = if script.polls.len() > 1 {
                script.polls.pop_front()
            } else {
                script.polls.front().map(|poll| ScriptedPoll {
                    delay: poll.delay,
                    response: poll.response.clone(),
                })
            };
            match next {
                Some(poll) => (poll.delay, poll.response),
                None => (
                    Duration::ZERO,
                    Err(PollError::new("scripted service: no poll response queued")),
                ),
            }
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        response
    }
}
