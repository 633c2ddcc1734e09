//! Materialised video list with dashboard counters.

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::domain::{ApiResult, ServiceClient, VideoId, VideoItem};

/// Aggregate counters shown on the dashboard.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    /// Number of videos.
    pub total_videos: usize,
    /// Sum of known durations, in seconds.
    pub total_duration: f64,
    /// Videos whose processing finished.
    pub processed_videos: usize,
    /// Videos still waiting for processing.
    pub pending_videos: usize,
}

impl DashboardStats {
    /// Compute counters for `videos`; unknown durations count as zero.
    ///
    /// # Examples
    /// ```
    /// use client::domain::{DashboardStats, VideoId, VideoItem};
    ///
    /// let video = |id, processed, duration| VideoItem {
    ///     id: VideoId::new(id),
    ///     title: "t".into(),
    ///     processed,
    ///     duration,
    ///     uploaded_at: None,
    ///     file: None,
    /// };
    /// let stats = DashboardStats::from_videos(&[video(1, true, Some(30.0)), video(2, false, None)]);
    /// assert_eq!(stats.total_videos, 2);
    /// assert_eq!(stats.total_duration, 30.0);
    /// assert_eq!(stats.pending_videos, 1);
    /// ```
    pub fn from_videos(videos: &[VideoItem]) -> Self {
        let processed_videos = videos.iter().filter(|video| video.processed).count();
        Self {
            total_videos: videos.len(),
            total_duration: videos.iter().filter_map(|video| video.duration).sum(),
            processed_videos,
            pending_videos: videos.len() - processed_videos,
        }
    }
}

/// Videos plus the counters derived from them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogueView {
    /// Videos in service order.
    pub videos: Vec<VideoItem>,
    /// Counters for `videos`.
    pub stats: DashboardStats,
}

impl CatalogueView {
    fn new(videos: Vec<VideoItem>) -> Self {
        let stats = DashboardStats::from_videos(&videos);
        Self { videos, stats }
    }
}

/// Observable catalogue, reconciled by re-fetching from the service.
pub struct VideoCatalogue {
    view: watch::Sender<CatalogueView>,
}

impl Default for VideoCatalogue {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoCatalogue {
    /// Empty catalogue.
    pub fn new() -> Self {
        let (view, _) = watch::channel(CatalogueView::default());
        Self { view }
    }

    /// Current view.
    pub fn snapshot(&self) -> CatalogueView {
        self.view.borrow().clone()
    }

    /// Watch the view.
    pub fn subscribe(&self) -> watch::Receiver<CatalogueView> {
        self.view.subscribe()
    }

    /// Replace the view with the service's current list.
    pub async fn reload(&self, client: &ServiceClient) -> ApiResult<CatalogueView> {
        let list = client.list_videos().await?;
        debug!(count = list.videos.len(), "catalogue reloaded");
        let view = CatalogueView::new(list.videos);
        self.view.send_replace(view.clone());
        Ok(view)
    }

    /// Delete `id` on the service and drop it from the view.
    pub async fn delete(&self, client: &ServiceClient, id: VideoId) -> ApiResult<()> {
        client.delete_video(id).await?;
        self.remove(id);
        Ok(())
    }

    /// Drop `id` from the view. Returns `false` when it was not listed.
    pub fn remove(&self, id: VideoId) -> bool {
        self.view.send_if_modified(|view| {
            let before = view.videos.len();
            view.videos.retain(|video| video.id != id);
            if view.videos.len() == before {
                return false;
            }
            view.stats = DashboardStats::from_videos(&view.videos);
            true
        })
    }
}
