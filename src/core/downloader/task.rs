use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Priority used when a caller does not care.
pub const DEFAULT_PRIORITY: i32 = 0;

/// A single file to download.
///
/// Terminal states: hash confirmed, or accepted without verification when no
/// hash was supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub dest: PathBuf,
    /// Hex digest (SHA-1 or SHA-256, inferred from length).
    pub hash: Option<String>,
    pub size: Option<u64>,
    /// Lower values are downloaded first.
    pub priority: i32,
}

impl DownloadTask {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            hash: None,
            size: None,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        let hash = hash.into();
        self.hash = (!hash.trim().is_empty()).then(|| hash.trim().to_ascii_lowercase());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = (size > 0).then_some(size);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

struct Queued {
    priority: i32,
    seq: usize,
    task: DownloadTask,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    // BinaryHeap is a max-heap: invert so the lowest (priority, seq) pops first.
    fn cmp(&self, other: &Self) -> Ordering {
        (other.priority, other.seq).cmp(&(self.priority, self.seq))
    }
}

/// Pending work shared by all workers of one batch. Tasks pop by priority,
/// FIFO among equals.
pub(crate) struct TaskQueue {
    heap: Mutex<BinaryHeap<Queued>>,
}

impl TaskQueue {
    pub(crate) fn new(tasks: Vec<DownloadTask>) -> Self {
        let heap = tasks
            .into_iter()
            .enumerate()
            .map(|(seq, task)| Queued {
                priority: task.priority,
                seq,
                task,
            })
            .collect();
        Self {
            heap: Mutex::new(heap),
        }
    }

    pub(crate) fn pop(&self) -> Option<DownloadTask> {
        self.heap
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop()
            .map(|queued| queued.task)
    }

    pub(crate) fn len(&self) -> usize {
        self.heap
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
