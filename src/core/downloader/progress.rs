use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::core::error::{LauncherError, LauncherResult};

/// Batch-level notifications streamed to whoever drives the batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DownloadEvent {
    /// Cumulative bytes vs. the sum of declared sizes. `current` may exceed
    /// `total` when some tasks carry no size.
    Progress { current: u64, total: u64 },
    TaskFinished { url: String, cache_hit: bool },
    Completed { downloaded: usize, cache_hits: usize },
    Failed { failures: Vec<String> },
}

#[derive(Debug)]
pub struct TaskFailure {
    pub url: String,
    pub dest: PathBuf,
    pub error: LauncherError,
}

impl TaskFailure {
    pub fn describe(&self) -> String {
        format!("{} ({})", self.url, self.error)
    }
}

/// Summary of one batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub downloaded: usize,
    pub cache_hits: usize,
    pub failures: Vec<TaskFailure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Collapse failures into the error the caller should surface.
    pub fn into_result(self) -> LauncherResult<Self> {
        if self.failures.is_empty() {
            return Ok(self);
        }

        if self
            .failures
            .iter()
            .all(|f| matches!(f.error, LauncherError::Cancelled))
        {
            return Err(LauncherError::Cancelled);
        }

        let mut failures = self.failures;
        if failures.len() == 1
            && matches!(
                failures[0].error,
                LauncherError::ArtifactVerificationFailed { .. }
            )
        {
            return Err(failures.remove(0).error);
        }

        Err(LauncherError::ArtifactDownloadExhausted {
            failures: failures.iter().map(TaskFailure::describe).collect(),
        })
    }
}

/// Shared byte counter for one batch.
pub(crate) struct BatchProgress<'a> {
    current: AtomicU64,
    total: u64,
    events: Option<&'a UnboundedSender<DownloadEvent>>,
}

impl<'a> BatchProgress<'a> {
    pub(crate) fn new(total: u64, events: Option<&'a UnboundedSender<DownloadEvent>>) -> Self {
        Self {
            current: AtomicU64::new(0),
            total,
            events,
        }
    }

    pub(crate) fn advance(&self, bytes: u64) {
        if bytes == 0 {
            return;
        }
        let current = self.current.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.emit(current);
    }

    /// Take back bytes credited by an attempt that had to restart from zero.
    pub(crate) fn retract(&self, bytes: u64) {
        if bytes == 0 {
            return;
        }
        let mut current = self.current.load(Ordering::Relaxed);
        loop {
            let next = current.saturating_sub(bytes);
            match self.current.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    self.emit(next);
                    return;
                }
                Err(actual) => current = actual,
            }
        }
    }

    pub(crate) fn current(&self) -> u64 {
        self.current.load(Ordering::Relaxed)
    }

    pub(crate) fn send(&self, event: DownloadEvent) {
        if let Some(tx) = self.events {
            let _ = tx.send(event);
        }
    }

    fn emit(&self, current: u64) {
        self.send(DownloadEvent::Progress {
            current,
            total: self.total,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(error: LauncherError) -> TaskFailure {
        TaskFailure {
            url: "https://example.com/two".into(),
            dest: PathBuf::from("/tmp/two"),
            error,
        }
    }

    #[test]
    fn report_without_failures_is_ok() {
        let report = BatchReport {
            downloaded: 2,
            cache_hits: 1,
            failures: Vec::new(),
        };
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn single_verification_failure_is_surfaced_as_is() {
        let report = BatchReport {
            failures: vec![failure(LauncherError::ArtifactVerificationFailed {
                path: PathBuf::from("/tmp/two"),
                expected: "aa".into(),
                actual: "bb".into(),
            })],
            ..BatchReport::default()
        };
        assert!(matches!(
            report.into_result(),
            Err(LauncherError::ArtifactVerificationFailed { .. })
        ));
    }

    #[test]
    fn exhausted_failures_reference_only_failing_urls() {
        let report = BatchReport {
            downloaded: 2,
            failures: vec![failure(LauncherError::DownloadFailed {
                url: "https://example.com/two".into(),
                status: 503,
            })],
            ..BatchReport::default()
        };
        match report.into_result() {
            Err(LauncherError::ArtifactDownloadExhausted { failures }) => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].starts_with("https://example.com/two"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn progress_can_retract_and_overshoot() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let progress = BatchProgress::new(10, Some(&tx));
        progress.advance(8);
        progress.retract(3);
        progress.advance(20);
        assert_eq!(progress.current(), 25);

        let mut last = None;
        while let Ok(event) = rx.try_recv() {
            last = Some(event);
        }
        match last {
            Some(DownloadEvent::Progress { current, total }) => {
                assert_eq!(current, 25);
                assert_eq!(total, 10);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
