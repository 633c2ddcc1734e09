//! Video catalogue payloads and the upload request.
//!
//! Transcript and summary payloads are opaque to the client and stay as raw
//! JSON values.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Error, TaskDescriptor, TaskId, TaskStatus};

/// Service-side video identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(u64);

impl VideoId {
    /// Wrap a raw identifier.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw numeric value.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the video list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoItem {
    /// Video identifier.
    pub id: VideoId,
    /// User-supplied title.
    pub title: String,
    /// Whether transcription and summarisation finished.
    #[serde(default)]
    pub processed: bool,
    /// Duration in seconds, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Upload timestamp as reported by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<String>,
    /// Location of the stored media file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// Body of `GET videos/`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VideoList {
    /// Videos owned by the signed-in user.
    #[serde(default)]
    pub videos: Vec<VideoItem>,
    /// Number of videos the service reported.
    #[serde(default)]
    pub count: u64,
}

/// Body of `GET video/{id}/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoDetail {
    /// Catalogue fields.
    #[serde(flatten)]
    pub video: VideoItem,
    /// Transcript segments, passed through untouched.
    #[serde(default)]
    pub transcript: Vec<Value>,
    /// Summary sections, passed through untouched.
    #[serde(default)]
    pub summary: Vec<Value>,
}

/// Body of `POST video/upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// The stored video record.
    #[serde(flatten)]
    pub video: VideoItem,
    /// Background processing task, when the service queued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// Initial task status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// Service acknowledgement text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UploadReceipt {
    /// Initial descriptor for the queued processing task.
    ///
    /// Returns `None` when the service did not queue any work.
    ///
    /// # Examples
    /// ```
    /// use client::domain::{TaskStatus, UploadReceipt};
    ///
    /// let receipt: UploadReceipt = serde_json::from_str(
    ///     r#"{"id": 9, "title": "Talk", "task_id": "abc123", "status": "PENDING"}"#,
    /// ).unwrap();
    /// let task = receipt.task_descriptor().unwrap();
    /// assert_eq!(task.task_id.as_ref(), "abc123");
    /// assert_eq!(task.status, TaskStatus::Pending);
    /// ```
    pub fn task_descriptor(&self) -> Option<TaskDescriptor> {
        self.task_id.clone().map(|task_id| {
            TaskDescriptor::new(
                task_id,
                self.video.id,
                self.status.unwrap_or(TaskStatus::Pending),
            )
        })
    }
}

/// Validated multipart upload.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadRequest {
    title: String,
    file_name: String,
    bytes: Vec<u8>,
}

impl UploadRequest {
    /// Validate the title and file before anything leaves the process.
    ///
    /// # Examples
    /// ```
    /// use client::domain::{ErrorCode, UploadRequest};
    ///
    /// let err = UploadRequest::try_new("   ", "talk.mp4", vec![1]).unwrap_err();
    /// assert_eq!(err.code(), ErrorCode::InvalidRequest);
    /// ```
    pub fn try_new(
        title: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Self, Error> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::invalid_request("title must not be empty"));
        }
        let file_name = file_name.trim();
        if file_name.is_empty() {
            return Err(Error::invalid_request("a file must be selected"));
        }
        if bytes.is_empty() {
            return Err(Error::invalid_request("the selected file is empty"));
        }
        Ok(Self {
            title: title.to_owned(),
            file_name: file_name.to_owned(),
            bytes,
        })
    }

    /// Trimmed title.
    pub fn title(&self) -> &str {
        self.title.as_str()
    }

    /// File name sent in the multipart part header.
    pub fn file_name(&self) -> &str {
        self.file_name.as_str()
    }

    /// Raw file contents.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("title", &self.title)
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("", "a.mp4", vec![1])]
    #[case("Talk", " ", vec![1])]
    #[case("Talk", "a.mp4", vec![])]
    fn invalid_uploads_fail_validation(
        #[case] title: &str,
        #[case] file_name: &str,
        #[case] bytes: Vec<u8>,
    ) {
        let err = UploadRequest::try_new(title, file_name, bytes).expect_err("invalid upload");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
    }

    #[rstest]
    fn upload_title_is_trimmed() {
        let request = UploadRequest::try_new("  Keynote ", "talk.mp4", vec![0, 1]).expect("valid");
        assert_eq!(request.title(), "Keynote");
        assert_eq!(request.bytes(), &[0, 1]);
    }

    #[rstest]
    fn receipt_without_task_has_no_descriptor() {
        let receipt: UploadReceipt =
            serde_json::from_value(json!({"id": 3, "title": "Talk", "processed": true}))
                .expect("decode receipt");
        assert!(receipt.task_descriptor().is_none());
    }

    #[rstest]
    fn detail_keeps_opaque_payloads() {
        let detail: VideoDetail = serde_json::from_value(json!({
            "id": 3,
            "title": "Talk",
            "processed": true,
            "duration": 61.5,
            "transcript": [{"start": 0.0, "text": "hello"}],
            "summary": [{"type": "heading", "content": "Intro"}]
        }))
        .expect("decode detail");

        assert_eq!(detail.video.id, VideoId::new(3));
        assert_eq!(detail.transcript.len(), 1);
        assert_eq!(detail.summary[0]["content"], "Intro");
    }

    #[rstest]
    fn list_tolerates_missing_count() {
        let list: VideoList =
            serde_json::from_value(json!({"videos": [{"id": 1, "title": "a"}]})).expect("decode");
        assert_eq!(list.videos.len(), 1);
        assert_eq!(list.count, 0);
    }
}
