//! JSON rendering of command results.

use std::io::Write;

use color_eyre::eyre::{Context, Result};
use serde::Serialize;
use serde_json::{Value, json};

use crate::domain::{PollResolution, TaskFailure};

/// Write `value` as pretty JSON followed by a newline.
pub(super) fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value).wrap_err("failed to encode output")?;
    writeln!(out).wrap_err("failed to write output")
}

/// JSON view of a finished task.
pub(super) fn resolution_json(resolution: &PollResolution) -> Value {
    match resolution {
        PollResolution::Succeeded(report) => json!({
            "state": "succeeded",
            "task_id": report.task_id,
            "result": report.result,
        }),
        PollResolution::Failed(failure) => failure_json(failure),
    }
}

/// JSON view of a failed task.
pub(super) fn failure_json(failure: &TaskFailure) -> Value {
    match failure {
        TaskFailure::Reported { message } => json!({
            "state": "failed",
            "cause": "reported",
            "message": message,
        }),
        TaskFailure::PollFailed { error } => json!({
            "state": "failed",
            "cause": "poll_failed",
            "error": error,
        }),
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for output rendering.

    use super::*;
    use crate::domain::Error;
    use rstest::rstest;

    #[rstest]
    fn writes_one_json_document_per_call() {
        let mut buffer = Vec::new();
        write_json(&mut buffer, &json!({"count": 2})).expect("writes");
        let text = String::from_utf8(buffer).expect("utf-8");
        assert!(text.ends_with("}\n"));
        let value: Value = serde_json::from_str(&text).expect("valid json");
        assert_eq!(value["count"], 2);
    }

    #[rstest]
    fn poll_failures_carry_the_error_payload() {
        let failure = TaskFailure::PollFailed {
            error: Error::service_unavailable("service unreachable"),
        };
        let value = failure_json(&failure);
        assert_eq!(value["cause"], "poll_failed");
        assert_eq!(value["error"]["code"], "service_unavailable");
    }
}
