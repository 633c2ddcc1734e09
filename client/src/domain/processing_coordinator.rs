//! Upload-to-summary workflow: submit, track, reconcile.
//!
//! A submission uploads the file, registers the returned task for polling
//! and refreshes the catalogue. A reconciler listens for task events and
//! reloads the catalogue once per successful task.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{
    ApiResult, PollSettings, ServiceClient, TaskEvent, TaskPoller, TaskRegistry, UploadReceipt,
    UploadRequest, VideoCatalogue,
};

/// Wires the service client, task registry and catalogue together.
pub struct ProcessingCoordinator {
    client: ServiceClient,
    registry: TaskRegistry,
    catalogue: Arc<VideoCatalogue>,
}

impl ProcessingCoordinator {
    /// Coordinator polling tasks through `client` with `settings`.
    pub fn new(client: ServiceClient, settings: PollSettings) -> Self {
        let poller = TaskPoller::new(Arc::new(client.clone()), settings);
        Self {
            client,
            registry: TaskRegistry::new(poller),
            catalogue: Arc::new(VideoCatalogue::new()),
        }
    }

    /// Service client used for every call.
    pub fn client(&self) -> &ServiceClient {
        &self.client
    }

    /// Tasks currently being polled.
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Materialised video list.
    pub fn catalogue(&self) -> &Arc<VideoCatalogue> {
        &self.catalogue
    }

    /// Upload `upload`, start tracking its task, and refresh the catalogue.
    ///
    /// A failed catalogue refresh is logged and does not fail the upload.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime; see
    /// [`TaskRegistry::register`].
    pub async fn submit(&self, upload: &UploadRequest) -> ApiResult<UploadReceipt> {
        let receipt = self.client.upload_video(upload).await?;
        match receipt.task_descriptor() {
            Some(task) => {
                self.registry.register(task);
            }
            None => debug!(video_id = %receipt.video.id, "upload queued no task"),
        }
        if let Err(err) = self.catalogue.reload(&self.client).await {
            warn!(error = %err, "catalogue refresh after upload failed");
        }
        Ok(receipt)
    }

    /// Reload the catalogue once for every task that succeeds.
    ///
    /// The returned task ends when the registry is dropped.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn spawn_reconciler(&self) -> JoinHandle<()> {
        let events = self.registry.subscribe();
        let client = self.client.clone();
        let catalogue = Arc::clone(&self.catalogue);
        tokio::spawn(reconcile(events, client, catalogue))
    }
}

async fn reconcile(
    mut events: broadcast::Receiver<TaskEvent>,
    client: ServiceClient,
    catalogue: Arc<VideoCatalogue>,
) {
    loop {
        let reload = match events.recv().await {
            Ok(TaskEvent::Succeeded { task, .. }) => {
                info!(task_id = %task.task_id, video_id = %task.subject_id, "reconciling catalogue");
                true
            }
            Ok(_) => false,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "task events lagged; reconciling catalogue");
                true
            }
            Err(RecvError::Closed) => return,
        };
        if reload && let Err(err) = catalogue.reload(&client).await {
            warn!(error = %err, "catalogue reconcile failed");
        }
    }
}
