//! In-memory index of tasks that are being polled.
//!
//! ## Invariants
//! - At most one entry, and so at most one poller, per task id.
//! - An id present in the registry always has a live poller.
//! - Removing an entry aborts its poller under the registry lock, and every
//!   poller result is applied under the same lock after checking the entry's
//!   generation. Once an entry is gone nothing more is published for it.

use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tokio::sync::{broadcast, watch};
use tokio::task::AbortHandle;
use tracing::{debug, info};

use crate::domain::{
    PollResolution, TaskDescriptor, TaskEvent, TaskFailure, TaskId, TaskPoller, TaskStatus,
    TaskStatusReport,
};

const TASK_EVENT_CAPACITY: usize = 64;

struct Entry {
    descriptor: TaskDescriptor,
    generation: u64,
    poller: Option<AbortHandle>,
}

#[derive(Default)]
struct RegistryState {
    entries: Vec<Entry>,
    next_generation: u64,
}

impl RegistryState {
    fn position(&self, task_id: &TaskId) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| &entry.descriptor.task_id == task_id)
    }

    fn position_of(&self, task_id: &TaskId, generation: u64) -> Option<usize> {
        self.position(task_id)
            .filter(|index| self.entries.get(*index).is_some_and(|e| e.generation == generation))
    }

    fn descriptors(&self) -> Vec<TaskDescriptor> {
        self.entries
            .iter()
            .map(|entry| entry.descriptor.clone())
            .collect()
    }
}

struct Inner {
    state: Mutex<RegistryState>,
    poller: TaskPoller,
    snapshot: watch::Sender<Vec<TaskDescriptor>>,
    events: broadcast::Sender<TaskEvent>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &RegistryState, event: Option<TaskEvent>) {
        self.snapshot.send_replace(state.descriptors());
        if let Some(event) = event {
            // Sending only fails when nobody is subscribed.
            self.events.send(event).ok();
        }
    }

    /// Apply a non-terminal report. Returns `false` once the entry is gone.
    fn progress(&self, task_id: &TaskId, generation: Option<u64>, report: &TaskStatusReport) -> bool {
        let mut state = self.lock();
        let index = match generation {
            Some(generation) => state.position_of(task_id, generation),
            None => state.position(task_id),
        };
        let Some(entry) = index.and_then(|index| state.entries.get_mut(index)) else {
            debug!(%task_id, "discarding update for unregistered task");
            return false;
        };
        let updated = entry.descriptor.apply(report);
        if updated == entry.descriptor {
            return true;
        }
        entry.descriptor = updated.clone();
        self.publish(&state, Some(TaskEvent::Progressed(updated)));
        true
    }

    fn resolve(&self, task_id: &TaskId, generation: Option<u64>, resolution: PollResolution) {
        let mut state = self.lock();
        let index = match generation {
            Some(generation) => state.position_of(task_id, generation),
            None => state.position(task_id),
        };
        let Some(index) = index else {
            debug!(%task_id, "discarding resolution for unregistered task");
            return;
        };
        let entry = state.entries.remove(index);
        if generation.is_none()
            && let Some(poller) = entry.poller
        {
            poller.abort();
        }
        let event = match resolution {
            PollResolution::Succeeded(report) => {
                let mut task = entry.descriptor.apply(&report);
                task.status = TaskStatus::Succeeded;
                info!(%task_id, "task resolved as succeeded");
                TaskEvent::Succeeded {
                    task,
                    result: report.result,
                }
            }
            PollResolution::Failed(failure) => {
                let mut task = entry.descriptor;
                task.status = TaskStatus::Failed;
                info!(%task_id, %failure, "task resolved as failed");
                TaskEvent::Failed { task, failure }
            }
        };
        self.publish(&state, Some(event));
    }
}

/// Observable collection of tasks currently being polled.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<Inner>,
}

impl TaskRegistry {
    /// Registry polling every registered task with `poller`.
    pub fn new(poller: TaskPoller) -> Self {
        let (snapshot, _) = watch::channel(Vec::new());
        let (events, _) = broadcast::channel(TASK_EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(RegistryState::default()),
                poller,
                snapshot,
                events,
            }),
        }
    }

    /// Track `descriptor` and start polling it.
    ///
    /// Returns `false`, leaving the existing entry untouched, when the task id
    /// is already registered.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime, because the poller is
    /// spawned onto the current runtime.
    pub fn register(&self, descriptor: TaskDescriptor) -> bool {
        let mut state = self.inner.lock();
        if state.position(&descriptor.task_id).is_some() {
            debug!(task_id = %descriptor.task_id, "task already registered");
            return false;
        }
        let generation = state.next_generation;
        state.next_generation = state.next_generation.wrapping_add(1);
        let task_id = descriptor.task_id.clone();
        info!(%task_id, subject_id = %descriptor.subject_id, "task registered");

        let poller = self.spawn_poller(task_id, generation);
        state.entries.push(Entry {
            descriptor: descriptor.clone(),
            generation,
            poller: Some(poller),
        });
        self.inner
            .publish(&state, Some(TaskEvent::Registered(descriptor)));
        true
    }

    /// Apply a status delta to a registered task.
    ///
    /// Terminal reports resolve the task and stop its poller. Returns `false`
    /// when the task is not registered.
    pub fn update(&self, task_id: &TaskId, report: &TaskStatusReport) -> bool {
        if !self.contains(task_id) {
            return false;
        }
        if !report.is_terminal() {
            return self.inner.progress(task_id, None, report);
        }
        let resolution = if report.is_success() {
            PollResolution::Succeeded(report.clone())
        } else {
            PollResolution::Failed(TaskFailure::Reported {
                message: report.error.clone(),
            })
        };
        self.inner.resolve(task_id, None, resolution);
        true
    }

    /// Stop tracking `task_id` and abort its poller.
    ///
    /// No event is published; the snapshot drops the entry.
    pub fn unregister(&self, task_id: &TaskId) -> Option<TaskDescriptor> {
        let mut state = self.inner.lock();
        let index = state.position(task_id)?;
        let entry = state.entries.remove(index);
        if let Some(poller) = entry.poller {
            poller.abort();
        }
        info!(%task_id, "task unregistered");
        self.inner.publish(&state, None);
        Some(entry.descriptor)
    }

    /// Current entries in insertion order.
    pub fn snapshot(&self) -> Vec<TaskDescriptor> {
        self.inner.lock().descriptors()
    }

    /// Latest entry for `task_id`.
    pub fn get(&self, task_id: &TaskId) -> Option<TaskDescriptor> {
        let state = self.inner.lock();
        state
            .position(task_id)
            .and_then(|index| state.entries.get(index))
            .map(|entry| entry.descriptor.clone())
    }

    /// Whether `task_id` is registered.
    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.inner.lock().position(task_id).is_some()
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether no task is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Watch the ordered entry list.
    pub fn subscribe_snapshot(&self) -> watch::Receiver<Vec<TaskDescriptor>> {
        self.inner.snapshot.subscribe()
    }

    /// Receive lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.events.subscribe()
    }

    fn spawn_poller(&self, task_id: TaskId, generation: u64) -> AbortHandle {
        let poller = self.inner.poller.clone();
        let registry: Weak<Inner> = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            let resolution = poller
                .run(&task_id, |report| match registry.upgrade() {
                    Some(inner) if inner.progress(&task_id, Some(generation), report) => {
                        ControlFlow::Continue(())
                    }
                    _ => ControlFlow::Break(()),
                })
                .await;
            if let (Some(resolution), Some(inner)) = (resolution, registry.upgrade()) {
                inner.resolve(&task_id, Some(generation), resolution);
            }
        });
        handle.abort_handle()
    }
}
