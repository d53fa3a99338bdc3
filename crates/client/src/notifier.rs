//! User notification seam.
//!
//! Presentation (toasts, status bars) lives outside this crate. The
//! orchestrators report user-facing outcomes through [`Notifier`].

use std::sync::{Mutex, PoisonError};

/// The visual category of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// A user-facing notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NoticeKind, message: &str);

    fn success(&self, message: &str) {
        self.notify(NoticeKind::Success, message);
    }

    fn error(&self, message: &str) {
        self.notify(NoticeKind::Error, message);
    }
}

/// Default notifier: logs and does nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, kind: NoticeKind, message: &str) {
        match kind {
            NoticeKind::Success => tracing::info!(notice = %message, "notify"),
            NoticeKind::Error => tracing::warn!(notice = %message, "notify"),
        }
    }
}

/// Keeps every notice in memory, oldest first.
#[derive(Debug, Default)]
pub struct NoticeQueue {
    notices: Mutex<Vec<Notice>>,
}

impl NoticeQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns all queued notices.
    pub fn drain(&self) -> Vec<Notice> {
        std::mem::take(&mut *self.notices.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn len(&self) -> usize {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Notifier for NoticeQueue {
    fn notify(&self, kind: NoticeKind, message: &str) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Notice {
                kind,
                message: message.to_string(),
            });
    }
}
