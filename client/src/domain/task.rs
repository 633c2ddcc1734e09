//! Background task identifiers, status reports, and lifecycle events.
//!
//! The service reports Celery-style states. They collapse onto four client
//! states; `PROGRESS` (the service's custom progress state) and `RETRY` count
//! as running work.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Error, VideoId};

/// Validation errors raised while building a [`TaskId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskIdValidationError {
    /// The identifier was blank.
    Empty,
    /// The identifier contained a path separator.
    InvalidCharacters,
}

impl fmt::Display for TaskIdValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "task id must not be empty"),
            Self::InvalidCharacters => write!(f, "task id must not contain '/' or '?'"),
        }
    }
}

impl std::error::Error for TaskIdValidationError {}

/// Opaque identifier of a server-side background job.
///
/// # Examples
/// ```
/// use client::domain::TaskId;
///
/// let id = TaskId::new(" abc123 ").unwrap();
/// assert_eq!(id.as_ref(), "abc123");
/// assert!(TaskId::new("a/b").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    /// Validate and construct a task identifier.
    pub fn new(id: impl AsRef<str>) -> Result<Self, TaskIdValidationError> {
        let trimmed = id.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TaskIdValidationError::Empty);
        }
        if trimmed.contains(['/', '?']) {
            return Err(TaskIdValidationError::InvalidCharacters);
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for TaskId {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TaskId {
    type Error = TaskIdValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TaskId> for String {
    fn from(value: TaskId) -> Self {
        value.0
    }
}

/// Client-side view of a task's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    /// Accepted but not yet picked up by a worker.
    Pending,
    /// A worker is processing the task.
    Started,
    /// The task finished successfully.
    Succeeded,
    /// The task failed or was revoked.
    Failed,
}

impl TaskStatus {
    /// Map a wire status onto the client state.
    ///
    /// Unknown states are treated as running work so polling continues until
    /// the service marks the task ready.
    ///
    /// # Examples
    /// ```
    /// use client::domain::TaskStatus;
    ///
    /// assert_eq!(TaskStatus::from_wire("PROGRESS"), TaskStatus::Started);
    /// assert_eq!(TaskStatus::from_wire("success"), TaskStatus::Succeeded);
    /// ```
    pub fn from_wire(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Self::Pending,
            "SUCCESS" => Self::Succeeded,
            "FAILURE" | "REVOKED" => Self::Failed,
            _ => Self::Started,
        }
    }

    /// Canonical wire spelling.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Started => "STARTED",
            Self::Succeeded => "SUCCESS",
            Self::Failed => "FAILURE",
        }
    }

    /// Whether no further transition can follow this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl From<String> for TaskStatus {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl From<TaskStatus> for String {
    fn from(value: TaskStatus) -> Self {
        value.as_wire().to_owned()
    }
}

/// Progress counters reported by a running task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProgress {
    /// Units of work completed.
    pub current: u64,
    /// Units of work in total.
    pub total: u64,
    /// Human-readable stage description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TaskProgress {
    /// Completion percentage clamped to `0..=100`.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        let scaled = self.current.min(self.total).saturating_mul(100) / self.total;
        u8::try_from(scaled).unwrap_or(100)
    }
}

/// Snapshot of one tracked task, handed to observers on each update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDescriptor {
    /// Service-side task identifier.
    pub task_id: TaskId,
    /// The video being processed.
    pub subject_id: VideoId,
    /// Latest known status.
    pub status: TaskStatus,
    /// Latest known progress, if the service reported any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<TaskProgress>,
}

impl TaskDescriptor {
    /// Descriptor for a freshly submitted task.
    pub fn new(task_id: TaskId, subject_id: VideoId, status: TaskStatus) -> Self {
        Self {
            task_id,
            subject_id,
            status,
            progress: None,
        }
    }

    /// Fold a status report into a new snapshot.
    ///
    /// Progress is only replaced when the report carries some, so a bare
    /// status update keeps the last known counters.
    pub fn apply(&self, report: &TaskStatusReport) -> Self {
        Self {
            task_id: self.task_id.clone(),
            subject_id: self.subject_id,
            status: report.status,
            progress: report.progress.clone().or_else(|| self.progress.clone()),
        }
    }
}

/// Decoded body of `GET task/{task_id}/status/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TaskStatusReportDto")]
pub struct TaskStatusReport {
    /// Task the report describes.
    pub task_id: TaskId,
    /// Reported state.
    pub status: TaskStatus,
    /// Service-side terminal flag.
    pub ready: bool,
    /// Progress counters, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<TaskProgress>,
    /// Opaque result payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure description on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskStatusReport {
    /// Whether the task can no longer change state.
    ///
    /// The service's `ready` flag is authoritative; an explicit terminal
    /// status is honoured even when the flag lags behind.
    pub fn is_terminal(&self) -> bool {
        self.ready || self.status.is_terminal()
    }

    /// Whether a terminal report describes success.
    pub fn is_success(&self) -> bool {
        self.is_terminal() && self.status == TaskStatus::Succeeded
    }
}

#[derive(Deserialize)]
struct TaskStatusReportDto {
    task_id: TaskId,
    status: TaskStatus,
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    progress: Option<TaskProgress>,
    #[serde(default)]
    current: Option<u64>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl From<TaskStatusReportDto> for TaskStatusReport {
    fn from(value: TaskStatusReportDto) -> Self {
        let TaskStatusReportDto {
            task_id,
            status,
            ready,
            progress,
            current,
            total,
            message,
            result,
            error,
        } = value;
        let progress = progress.or_else(|| match (current, total) {
            (Some(current), Some(total)) => Some(TaskProgress {
                current,
                total,
                message,
            }),
            _ => None,
        });
        let error = error.and_then(|value| match value {
            Value::Null => None,
            Value::String(text) => Some(text),
            other => Some(other.to_string()),
        });
        Self {
            task_id,
            status,
            ready,
            progress,
            result: result.filter(|value| !value.is_null()),
            error,
        }
    }
}

/// Why a tracked task ended in failure.
///
/// Both variants unregister the task identically; the distinction is kept for
/// callers that want to tell "the job failed" from "the job could not be
/// checked".
#[derive(Debug, Clone, PartialEq)]
pub enum TaskFailure {
    /// The service reported the task as failed.
    Reported {
        /// Failure text from the service, if any.
        message: Option<String>,
    },
    /// Querying the task status failed.
    PollFailed {
        /// The error returned by the status query.
        error: Error,
    },
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reported { message: Some(message) } => write!(f, "task failed: {message}"),
            Self::Reported { message: None } => write!(f, "task failed"),
            Self::PollFailed { error } => write!(f, "task status unavailable: {error}"),
        }
    }
}

/// Lifecycle notifications published by the task registry.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// A task entered the registry and polling started.
    Registered(TaskDescriptor),
    /// A non-terminal status or progress update was observed.
    Progressed(TaskDescriptor),
    /// The task succeeded; consumers should reconcile their views.
    Succeeded {
        /// Final snapshot.
        task: TaskDescriptor,
        /// Opaque result payload.
        result: Option<Value>,
    },
    /// The task failed or could not be polled.
    Failed {
        /// Final snapshot.
        task: TaskDescriptor,
        /// Failure cause.
        failure: TaskFailure,
    },
}

impl TaskEvent {
    /// Snapshot carried by the event.
    pub fn task(&self) -> &TaskDescriptor {
        match self {
            Self::Registered(task) | Self::Progressed(task) => task,
            Self::Succeeded { task, .. } | Self::Failed { task, .. } => task,
        }
    }

    /// Whether the event ends the task's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }
}
