//! Fixed-interval polling of one background task.
//!
//! Each task moves through `Queued -> Polling -> {Succeeded | Failed}`. The
//! transition logic lives in [`PollMachine`] so it can be exercised without
//! timers; [`TaskPoller`] drives it from a Tokio interval.
//!
//! Polls are strictly sequential: the next tick is awaited only after the
//! previous query resolved, so updates are observed in the order they were
//! issued.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info, warn};

use crate::domain::ports::TaskStatusSource;
use crate::domain::{Error, TaskFailure, TaskId, TaskStatusReport};

/// Interval between status queries when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Polling cadence and the optional safety cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between consecutive queries; the first query waits one interval.
    pub interval: Duration,
    /// Give up after this many non-terminal reports. `None` polls forever.
    pub max_polls: Option<u32>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_polls: None,
        }
    }
}

/// Lifecycle of one poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Registered, no query issued yet.
    Queued,
    /// Queries are being issued.
    Polling,
    /// The task reported success.
    Succeeded,
    /// The task failed or could not be polled.
    Failed,
}

impl PollState {
    /// Whether no further polling happens in this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// How a poll loop ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PollResolution {
    /// Terminal success with the final report.
    Succeeded(TaskStatusReport),
    /// Reported failure or query failure.
    Failed(TaskFailure),
}

/// What the caller should do after one observation.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStep {
    /// Publish the report and wait for the next tick.
    Continue(TaskStatusReport),
    /// Stop; the task is resolved.
    Resolved(PollResolution),
}

/// Pure transition logic for one task.
#[derive(Debug, Clone)]
pub struct PollMachine {
    task_id: TaskId,
    state: PollState,
    polls: u32,
    max_polls: Option<u32>,
    resolution: Option<PollResolution>,
}

impl PollMachine {
    /// New machine in [`PollState::Queued`].
    pub fn new(task_id: TaskId, max_polls: Option<u32>) -> Self {
        Self {
            task_id,
            state: PollState::Queued,
            polls: 0,
            max_polls,
            resolution: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> PollState {
        self.state
    }

    /// Number of results observed so far.
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Fold one query result into the machine.
    ///
    /// Terminal states are sinks: once resolved, further results are ignored
    /// and the original resolution is returned again.
    ///
    /// # Examples
    /// ```
    /// use client::domain::{PollMachine, PollState, PollStep, TaskId, TaskStatusReport};
    ///
    /// let id = TaskId::new("abc123").unwrap();
    /// let mut machine = PollMachine::new(id, None);
    /// let done: TaskStatusReport = serde_json::from_str(
    ///     r#"{"task_id": "abc123", "status": "SUCCESS", "ready": true}"#,
    /// ).unwrap();
    /// assert!(matches!(machine.observe(Ok(done)), PollStep::Resolved(_)));
    /// assert_eq!(machine.state(), PollState::Succeeded);
    /// ```
    pub fn observe(&mut self, result: Result<TaskStatusReport, Error>) -> PollStep {
        if let Some(resolution) = &self.resolution {
            debug!(task_id = %self.task_id, "ignoring result for resolved task");
            return PollStep::Resolved(resolution.clone());
        }
        self.state = PollState::Polling;
        self.polls = self.polls.saturating_add(1);

        let report = match result {
            Ok(report) => report,
            Err(error) => {
                warn!(task_id = %self.task_id, error = %error, "task status query failed");
                return self.fail(TaskFailure::PollFailed { error });
            }
        };

        if report.is_terminal() {
            if report.is_success() {
                info!(task_id = %self.task_id, polls = self.polls, "task succeeded");
                self.state = PollState::Succeeded;
                return self.resolve(PollResolution::Succeeded(report));
            }
            info!(task_id = %self.task_id, polls = self.polls, "task failed");
            return self.fail(TaskFailure::Reported {
                message: report.error,
            });
        }

        if self.max_polls.is_some_and(|max| self.polls >= max) {
            warn!(task_id = %self.task_id, polls = self.polls, "poll limit reached");
            let error = Error::service_unavailable(format!(
                "task {} still running after {} status checks",
                self.task_id, self.polls
            ));
            return self.fail(TaskFailure::PollFailed { error });
        }

        debug!(
            task_id = %self.task_id,
            status = report.status.as_wire(),
            "task still running"
        );
        PollStep::Continue(report)
    }

    fn fail(&mut self, failure: TaskFailure) -> PollStep {
        self.state = PollState::Failed;
        self.resolve(PollResolution::Failed(failure))
    }

    fn resolve(&mut self, resolution: PollResolution) -> PollStep {
        self.resolution = Some(resolution.clone());
        PollStep::Resolved(resolution)
    }
}

/// Drives [`PollMachine`]s against a [`TaskStatusSource`].
#[derive(Clone)]
pub struct TaskPoller {
    source: Arc<dyn TaskStatusSource>,
    settings: PollSettings,
}

impl TaskPoller {
    /// Poll `source` with `settings`.
    pub fn new(source: Arc<dyn TaskStatusSource>, settings: PollSettings) -> Self {
        Self { source, settings }
    }

    /// Configured cadence.
    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Poll `task_id` until it resolves.
    ///
    /// `on_progress` sees every non-terminal report in issue order and may
    /// return [`ControlFlow::Break`] to stop early, in which case `None` is
    /// returned.
    pub async fn run<F>(&self, task_id: &TaskId, mut on_progress: F) -> Option<PollResolution>
    where
        F: FnMut(&TaskStatusReport) -> ControlFlow<()> + Send,
    {
        let mut machine = PollMachine::new(task_id.clone(), self.settings.max_polls);
        let mut ticker = interval_at(
            Instant::now() + self.settings.interval,
            self.settings.interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let interval_ms = u64::try_from(self.settings.interval.as_millis()).unwrap_or(u64::MAX);
        debug!(%task_id, interval_ms, "polling task");

        loop {
            ticker.tick().await;
            debug!(%task_id, poll = machine.polls() + 1, "poll tick");
            let result = self.source.task_status(task_id).await;
            match machine.observe(result) {
                PollStep::Continue(report) => {
                    if on_progress(&report).is_break() {
                        debug!(%task_id, "polling stopped by observer");
                        return None;
                    }
                }
                PollStep::Resolved(resolution) => return Some(resolution),
            }
        }
    }
}
