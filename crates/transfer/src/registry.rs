//! In-flight transfer tracking.
//!
//! Every running transfer owns one entry keyed by its [`TaskId`]. The entry
//! holds the task's cancellation token so any holder of the registry can
//! abort it. Entries are removed exactly once: by `cancel`, `cancel_all`,
//! or the [`Registration`] guard dropping on the orchestrator's exit path.
//! A guard only removes the entry it created, so a task id reused after a
//! cancel is not dropped by the earlier attempt's guard.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::TransferError;
use crate::types::{Direction, Phase, TaskId, TransferTask};

/// Metadata snapshot of a registered task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTask {
    pub id: TaskId,
    pub file_name: String,
    pub size: u64,
    pub mime_type: String,
    pub direction: Direction,
}

#[derive(Debug)]
struct Entry {
    info: ActiveTask,
    token: CancellationToken,
    serial: u64,
}

/// Shared map of in-flight transfers.
///
/// Cloning is cheap and every clone sees the same map. The lock is never
/// held across an await point.
#[derive(Debug, Clone, Default)]
pub struct CancellationRegistry {
    tasks: Arc<Mutex<HashMap<TaskId, Entry>>>,
    next_serial: Arc<AtomicU64>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, Entry>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `task` to the registry.
    ///
    /// The returned guard deregisters the task when dropped, so the entry
    /// disappears on every exit path of the caller.
    pub fn register<P: Phase>(
        &self,
        task: &TransferTask<P>,
    ) -> Result<Registration, TransferError> {
        let id = task.id();
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let mut tasks = self.lock();
        if tasks.contains_key(&id) {
            return Err(TransferError::DuplicateTask(id.to_string()));
        }
        tasks.insert(
            id,
            Entry {
                info: ActiveTask {
                    id,
                    file_name: task.file_name().to_string(),
                    size: task.size(),
                    mime_type: task.mime_type().to_string(),
                    direction: task.direction(),
                },
                token: task.cancel_token(),
                serial,
            },
        );
        debug!(task = %id, file = %task.file_name(), direction = %task.direction(), "task registered");
        Ok(Registration {
            registry: self.clone(),
            id,
            serial,
        })
    }

    /// Triggers the task's token and removes it. Returns whether it existed.
    pub fn cancel(&self, id: TaskId) -> bool {
        let entry = self.lock().remove(&id);
        match entry {
            Some(entry) => {
                entry.token.cancel();
                info!(task = %id, file = %entry.info.file_name, "task canceled");
                true
            }
            None => false,
        }
    }

    /// Cancels every registered task and empties the registry.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<Entry> = self.lock().drain().map(|(_, e)| e).collect();
        for entry in &drained {
            entry.token.cancel();
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "all tasks canceled");
        }
        drained.len()
    }

    /// Cancels and removes every task whose metadata matches `pred`.
    pub fn cancel_matching(&self, mut pred: impl FnMut(&ActiveTask) -> bool) -> usize {
        let removed: Vec<Entry> = {
            let mut tasks = self.lock();
            let ids: Vec<TaskId> = tasks
                .iter()
                .filter(|(_, e)| pred(&e.info))
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| tasks.remove(id)).collect()
        };
        for entry in &removed {
            entry.token.cancel();
            info!(task = %entry.info.id, file = %entry.info.file_name, "task canceled");
        }
        removed.len()
    }

    /// Removes a task without cancelling it. Returns whether it existed.
    pub fn deregister(&self, id: TaskId) -> bool {
        let removed = self.lock().remove(&id).is_some();
        if removed {
            debug!(task = %id, "task deregistered");
        }
        removed
    }

    /// Removes `id` only if it is still the entry created with `serial`.
    fn release(&self, id: TaskId, serial: u64) {
        let mut tasks = self.lock();
        if tasks.get(&id).is_some_and(|e| e.serial == serial) {
            tasks.remove(&id);
            debug!(task = %id, "task deregistered");
        }
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of every registered task.
    pub fn active(&self) -> Vec<ActiveTask> {
        self.lock().values().map(|e| e.info.clone()).collect()
    }
}

/// Keeps a task registered for as long as it lives.
#[derive(Debug)]
#[must_use = "dropping the registration deregisters the task immediately"]
pub struct Registration {
    registry: CancellationRegistry,
    id: TaskId,
    serial: u64,
}

impl Registration {
    pub fn id(&self) -> TaskId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        // Already gone if `cancel` or `cancel_all` removed it.
        self.registry.release(self.id, self.serial);
    }
}
