//! Driven port used by task pollers to query background job status.

use async_trait::async_trait;

use crate::domain::{Error, TaskId, TaskStatusReport};

/// Answers "what state is this task in right now?".
///
/// The production implementation is the authenticated
/// [`ServiceClient`](crate::domain::ServiceClient), so a status query
/// refreshes credentials like any other call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskStatusSource: Send + Sync {
    /// Query the current status of `task_id`.
    async fn task_status(&self, task_id: &TaskId) -> Result<TaskStatusReport, Error>;
}
