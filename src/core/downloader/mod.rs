mod client;
mod progress;
mod task;

pub use client::{Downloader, DownloaderConfig};
pub use progress::{BatchReport, DownloadEvent, TaskFailure};
pub use task::{DownloadTask, DEFAULT_PRIORITY};
