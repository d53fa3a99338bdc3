use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::types::TaskId;

/// One progress tick for the byte-transfer phase of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub task_id: TaskId,
    pub sent: u64,
    pub total: u64,
    pub percent: u8,
}

/// Callback invoked with upload progress.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// `round(sent * 100 / total)`, clamped to 100. A zero total is complete.
pub fn percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let sent = sent.min(total) as u128;
    let total = total as u128;
    ((sent * 200 + total) / (total * 2)) as u8
}

/// Accumulates sent bytes for one task and forwards each tick.
///
/// Cloned into the request body stream; all clones share the counter.
#[derive(Clone)]
pub struct ProgressReporter {
    task_id: TaskId,
    total: u64,
    sent: Arc<AtomicU64>,
    callback: Option<ProgressCallback>,
}

impl ProgressReporter {
    pub fn new(task_id: TaskId, total: u64, callback: Option<ProgressCallback>) -> Self {
        Self {
            task_id,
            total,
            sent: Arc::new(AtomicU64::new(0)),
            callback,
        }
    }

    /// Records `bytes` more sent and notifies the callback.
    pub fn advance(&self, bytes: u64) -> Progress {
        let sent = self.sent.fetch_add(bytes, Ordering::Relaxed) + bytes;
        let progress = Progress {
            task_id: self.task_id,
            sent,
            total: self.total,
            percent: percent(sent, self.total),
        };
        if let Some(cb) = &self.callback {
            cb(progress);
        }
        progress
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("task_id", &self.task_id)
            .field("total", &self.total)
            .field("sent", &self.sent())
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn percent_rounds_half_up() {
        assert_eq!(percent(0, 200), 0);
        assert_eq!(percent(1, 200), 1); // 0.5 → 1
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(2, 3), 67);
        assert_eq!(percent(200, 200), 100);
    }

    #[test]
    fn percent_edge_cases() {
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(500, 100), 100);
        assert_eq!(percent(u64::MAX, u64::MAX), 100);
    }

    #[test]
    fn reporter_accumulates_and_notifies() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let cb: ProgressCallback = Arc::new(move |p| s.lock().unwrap().push(p.percent));

        let reporter = ProgressReporter::new(TaskId::new(), 4, Some(cb));
        reporter.advance(1);
        reporter.clone().advance(1);
        let last = reporter.advance(2);

        assert_eq!(last.sent, 4);
        assert_eq!(reporter.sent(), 4);
        assert_eq!(*seen.lock().unwrap(), vec![25, 50, 100]);
    }

    #[test]
    fn reporter_without_callback() {
        let reporter = ProgressReporter::new(TaskId::new(), 10, None);
        let p = reporter.advance(5);
        assert_eq!(p.percent, 50);
        assert_eq!(reporter.total(), 10);
    }
}
