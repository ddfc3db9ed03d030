use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::StreamExt;
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::progress::{BatchProgress, BatchReport, DownloadEvent, TaskFailure};
use super::task::{DownloadTask, TaskQueue};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;
use crate::core::store::{ArtifactStore, Verification};

/// Tunables for one `Downloader`.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Number of workers draining a batch.
    pub concurrency: usize,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// First backoff delay; doubles on every retry.
    pub base_backoff: Duration,
    /// Maximum silence between two chunks of one response.
    pub idle_timeout: Duration,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            concurrency: 5,
            max_retries: 5,
            base_backoff: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

enum TaskOutcome {
    CacheHit,
    Downloaded,
}

/// Bounded-concurrency, resumable, verifying downloader.
pub struct Downloader {
    client: Client,
    config: DownloaderConfig,
}

impl Downloader {
    pub fn new(client: Client, config: DownloaderConfig) -> Self {
        Self { client, config }
    }

    pub fn with_config(config: DownloaderConfig) -> LauncherResult<Self> {
        Ok(Self::new(build_http_client()?, config))
    }

    pub fn config(&self) -> &DownloaderConfig {
        &self.config
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    // ── Batch ───────────────────────────────────────────

    /// Run every task to a terminal state.
    ///
    /// The report lists each failed task; the rest of the batch still runs
    /// to completion. Cancellation stops new attempts and aborts in-flight
    /// transfers, leaving their `.part` files for a later resume.
    pub async fn run_batch(
        &self,
        tasks: Vec<DownloadTask>,
        events: Option<&UnboundedSender<DownloadEvent>>,
        cancel: &CancellationToken,
    ) -> BatchReport {
        let total: u64 = tasks.iter().filter_map(|t| t.size).sum();
        let workers = self.config.concurrency.max(1).min(tasks.len().max(1));
        info!(
            "Starting batch download: {} files, {} bytes declared, concurrency={}",
            tasks.len(),
            total,
            workers
        );

        let queue = TaskQueue::new(tasks);
        let progress = BatchProgress::new(total, events);
        let report = Mutex::new(BatchReport::default());

        join_all((0..workers).map(|_| self.worker(&queue, &progress, &report, cancel))).await;

        let report = report
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if report.is_success() {
            progress.send(DownloadEvent::Completed {
                downloaded: report.downloaded,
                cache_hits: report.cache_hits,
            });
        } else {
            progress.send(DownloadEvent::Failed {
                failures: report.failures.iter().map(TaskFailure::describe).collect(),
            });
        }

        info!(
            "Batch finished: {} downloaded, {} cached, {} failed, {} bytes",
            report.downloaded,
            report.cache_hits,
            report.failures.len(),
            progress.current()
        );
        report
    }

    /// Convenience for callers with a single artifact.
    pub async fn download_one(
        &self,
        task: DownloadTask,
        events: Option<&UnboundedSender<DownloadEvent>>,
        cancel: &CancellationToken,
    ) -> LauncherResult<()> {
        self.run_batch(vec![task], events, cancel)
            .await
            .into_result()
            .map(|_| ())
    }

    async fn worker(
        &self,
        queue: &TaskQueue,
        progress: &BatchProgress<'_>,
        report: &Mutex<BatchReport>,
        cancel: &CancellationToken,
    ) {
        while let Some(task) = queue.pop() {
            let result = if cancel.is_cancelled() {
                Err(LauncherError::Cancelled)
            } else {
                self.process(&task, progress, cancel).await
            };

            if let Ok(outcome) = &result {
                progress.send(DownloadEvent::TaskFinished {
                    url: task.url.clone(),
                    cache_hit: matches!(outcome, TaskOutcome::CacheHit),
                });
            }

            let mut guard = report
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            match result {
                Ok(TaskOutcome::CacheHit) => guard.cache_hits += 1,
                Ok(TaskOutcome::Downloaded) => guard.downloaded += 1,
                Err(error) => {
                    if !matches!(error, LauncherError::Cancelled) {
                        warn!("Download of {} failed: {}", task.url, error);
                    }
                    guard.failures.push(TaskFailure {
                        url: task.url.clone(),
                        dest: task.dest.clone(),
                        error,
                    });
                }
            }
        }
    }

    // ── Single task ─────────────────────────────────────

    async fn process(
        &self,
        task: &DownloadTask,
        progress: &BatchProgress<'_>,
        cancel: &CancellationToken,
    ) -> LauncherResult<TaskOutcome> {
        // Held until the artifact is committed and verified.
        let _writer = tokio::select! {
            _ = cancel.cancelled() => return Err(LauncherError::Cancelled),
            guard = ArtifactStore::lock(&task.dest) => guard,
        };

        if let Some(expected) = &task.hash {
            match ArtifactStore::verify(&task.dest, expected).await? {
                Verification::Valid => {
                    progress.advance(task.size.unwrap_or(0));
                    debug!("Cache hit: {:?}", task.dest);
                    return Ok(TaskOutcome::CacheHit);
                }
                Verification::Mismatch { actual } => {
                    warn!(
                        "Cached {:?} is corrupt (expected {}, got {}), re-downloading",
                        task.dest, expected, actual
                    );
                    ArtifactStore::discard(&task.dest).await?;
                }
                Verification::Missing => {}
            }
        } else if tokio::fs::try_exists(&task.dest).await.unwrap_or(false) {
            progress.advance(ArtifactStore::file_len(&task.dest).await);
            debug!("Cache hit (unverified): {:?}", task.dest);
            return Ok(TaskOutcome::CacheHit);
        }

        if let Some(parent) = task.dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| LauncherError::io(parent, source))?;
        }

        let part = ArtifactStore::part_path(&task.dest);
        let mut credited = 0_u64;
        let mut attempt = 0_u32;
        loop {
            match self.transfer(task, &part, progress, &mut credited, cancel).await {
                Ok(()) => break,
                Err(LauncherError::Cancelled) => return Err(LauncherError::Cancelled),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.config.base_backoff * 2_u32.pow(attempt);
                    attempt += 1;
                    warn!(
                        "Attempt {}/{} for {} failed: {}. Retrying in {:?}",
                        attempt,
                        self.config.max_retries + 1,
                        task.url,
                        err,
                        delay
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(LauncherError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }

        ArtifactStore::commit(&part, &task.dest).await?;
        self.verify_committed(task).await?;

        debug!("Downloaded: {} -> {:?}", task.url, task.dest);
        Ok(TaskOutcome::Downloaded)
    }

    /// One HTTP attempt into the part file, resuming from whatever is there.
    async fn transfer(
        &self,
        task: &DownloadTask,
        part: &Path,
        progress: &BatchProgress<'_>,
        credited: &mut u64,
        cancel: &CancellationToken,
    ) -> LauncherResult<()> {
        let mut offset = ArtifactStore::file_len(part).await;
        if let Some(size) = task.size {
            if offset > size {
                debug!("Discarding oversized part file {:?}", part);
                ArtifactStore::discard(part).await?;
                offset = 0;
            }
        }
        sync_credit(progress, credited, offset);

        if offset > 0 && task.size == Some(offset) {
            return Ok(());
        }

        let mut request = self.client.get(&task.url);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(LauncherError::Cancelled),
            sent = tokio::time::timeout(self.config.idle_timeout, request.send()) => match sent {
                Ok(response) => response?,
                Err(_) => return Err(self.stalled(&task.url)),
            },
        };

        let status = response.status();
        let append = if status == StatusCode::PARTIAL_CONTENT && offset > 0 {
            true
        } else if status.is_success() {
            if offset > 0 {
                debug!("Server ignored range request for {}, restarting", task.url);
            }
            false
        } else if status == StatusCode::RANGE_NOT_SATISFIABLE {
            ArtifactStore::discard(part).await?;
            sync_credit(progress, credited, 0);
            return Err(LauncherError::DownloadFailed {
                url: task.url.clone(),
                status: status.as_u16(),
            });
        } else {
            return Err(LauncherError::DownloadFailed {
                url: task.url.clone(),
                status: status.as_u16(),
            });
        };

        if !append {
            offset = 0;
            sync_credit(progress, credited, 0);
        }

        // Scoped so the handle is closed before the rename (Windows).
        let written = {
            let mut file = tokio::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .append(append)
                .truncate(!append)
                .open(part)
                .await
                .map_err(|source| LauncherError::io(part, source))?;

            let mut stream = response.bytes_stream();
            let mut written = 0_u64;
            loop {
                let next = tokio::select! {
                    _ = cancel.cancelled() => {
                        let _ = file.flush().await;
                        return Err(LauncherError::Cancelled);
                    }
                    next = tokio::time::timeout(self.config.idle_timeout, stream.next()) => next,
                };
                let chunk = match next {
                    Err(_) => {
                        let _ = file.flush().await;
                        return Err(self.stalled(&task.url));
                    }
                    Ok(None) => break,
                    Ok(Some(chunk)) => chunk?,
                };
                file.write_all(&chunk)
                    .await
                    .map_err(|source| LauncherError::io(part, source))?;
                let len = chunk.len() as u64;
                written += len;
                *credited += len;
                progress.advance(len);
            }
            file.flush()
                .await
                .map_err(|source| LauncherError::io(part, source))?;
            written
        };

        if let Some(size) = task.size {
            if offset + written < size {
                return Err(LauncherError::io(
                    part,
                    std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!("body ended at {} of {} bytes", offset + written, size),
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Post-write check: hash if known, otherwise declared size.
    async fn verify_committed(&self, task: &DownloadTask) -> LauncherResult<()> {
        if let Some(expected) = &task.hash {
            if let Verification::Mismatch { actual } =
                ArtifactStore::verify(&task.dest, expected).await?
            {
                ArtifactStore::discard(&task.dest).await?;
                return Err(LauncherError::ArtifactVerificationFailed {
                    path: task.dest.clone(),
                    expected: expected.clone(),
                    actual,
                });
            }
        } else if let Some(size) = task.size {
            let actual = ArtifactStore::file_len(&task.dest).await;
            if actual != size {
                ArtifactStore::discard(&task.dest).await?;
                return Err(LauncherError::ArtifactVerificationFailed {
                    path: task.dest.clone(),
                    expected: format!("{size} bytes"),
                    actual: format!("{actual} bytes"),
                });
            }
        }
        Ok(())
    }

    fn stalled(&self, url: &str) -> LauncherError {
        LauncherError::TransferTimeout {
            url: url.to_string(),
            secs: self.config.idle_timeout.as_secs(),
        }
    }
}

/// Keep the batch counter in line with the bytes this task has on disk.
fn sync_credit(progress: &BatchProgress<'_>, credited: &mut u64, on_disk: u64) {
    if *credited > on_disk {
        progress.retract(*credited - on_disk);
    } else {
        progress.advance(on_disk - *credited);
    }
    *credited = on_disk;
}

#[cfg(test)]
mod tests {
    use super::*;

    // sha1("hello")
    const HELLO_SHA1: &str = "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d";

    fn fast_downloader(concurrency: usize) -> Downloader {
        Downloader::with_config(DownloaderConfig {
            concurrency,
            max_retries: 5,
            base_backoff: Duration::from_millis(1),
            idle_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn valid_cached_file_makes_no_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/hello.txt")
            .expect(0)
            .create_async()
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("hello.txt");
        std::fs::write(&dest, b"hello").unwrap();

        let task = DownloadTask::new(format!("{}/hello.txt", server.url()), &dest)
            .with_hash(HELLO_SHA1)
            .with_size(5);
        let report = fast_downloader(2)
            .run_batch(vec![task], None, &CancellationToken::new())
            .await;

        assert_eq!(report.cache_hits, 1);
        assert_eq!(report.downloaded, 0);
        assert!(report.is_success());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn corrupted_cached_file_is_fetched_again() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/hello.txt")
            .with_status(200)
            .with_body("hello")
            .expect(1)
            .create_async()
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("hello.txt");
        std::fs::write(&dest, b"hellO").unwrap();

        let task = DownloadTask::new(format!("{}/hello.txt", server.url()), &dest)
            .with_hash(HELLO_SHA1)
            .with_size(5);
        let report = fast_downloader(2)
            .run_batch(vec![task], None, &CancellationToken::new())
            .await;

        assert_eq!(report.downloaded, 1);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
        assert!(!ArtifactStore::part_path(&dest).exists());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn one_failing_task_does_not_stop_the_batch() {
        let mut server = mockito::Server::new_async().await;
        let one = server
            .mock("GET", "/one")
            .with_body("one")
            .create_async()
            .await;
        let two = server
            .mock("GET", "/two")
            .with_status(503)
            .expect(6)
            .create_async()
            .await;
        let three = server
            .mock("GET", "/three")
            .with_body("three")
            .create_async()
            .await;

        let temp = tempfile::tempdir().unwrap();
        let tasks = ["one", "two", "three"]
            .iter()
            .map(|name| {
                DownloadTask::new(format!("{}/{name}", server.url()), temp.path().join(name))
            })
            .collect();

        let report = fast_downloader(3)
            .run_batch(tasks, None, &CancellationToken::new())
            .await;

        assert_eq!(report.downloaded, 2);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].url.ends_with("/two"));
        assert!(temp.path().join("one").exists());
        assert!(temp.path().join("three").exists());
        assert!(!temp.path().join("two").exists());

        match report.into_result() {
            Err(LauncherError::ArtifactDownloadExhausted { failures }) => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].contains("/two"));
            }
            other => panic!("unexpected result: {other:?}"),
        }

        one.assert_async().await;
        two.assert_async().await;
        three.assert_async().await;
    }

    #[tokio::test]
    async fn not_found_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/missing")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let temp = tempfile::tempdir().unwrap();
        let task = DownloadTask::new(format!("{}/missing", server.url()), temp.path().join("m"));
        let report = fast_downloader(1)
            .run_batch(vec![task], None, &CancellationToken::new())
            .await;

        assert_eq!(report.failures.len(), 1);
        assert!(matches!(
            report.failures[0].error,
            LauncherError::DownloadFailed { status: 404, .. }
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn partial_file_is_resumed_with_a_range_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/hello.txt")
            .match_header("range", "bytes=3-")
            .with_status(206)
            .with_body("lo")
            .expect(1)
            .create_async()
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("hello.txt");
        std::fs::write(ArtifactStore::part_path(&dest), b"hel").unwrap();

        let task = DownloadTask::new(format!("{}/hello.txt", server.url()), &dest)
            .with_hash(HELLO_SHA1)
            .with_size(5);
        let report = fast_downloader(1)
            .run_batch(vec![task], None, &CancellationToken::new())
            .await;

        assert!(report.is_success(), "{:?}", report.failures);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn ignored_range_restarts_from_zero() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/hello.txt")
            .with_status(200)
            .with_body("hello")
            .expect(1)
            .create_async()
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("hello.txt");
        std::fs::write(ArtifactStore::part_path(&dest), b"xyz").unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let task = DownloadTask::new(format!("{}/hello.txt", server.url()), &dest)
            .with_hash(HELLO_SHA1)
            .with_size(5);
        let report = fast_downloader(1)
            .run_batch(vec![task], Some(&tx), &CancellationToken::new())
            .await;

        assert!(report.is_success(), "{:?}", report.failures);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");

        let mut last_progress = None;
        while let Ok(event) = rx.try_recv() {
            if let DownloadEvent::Progress { current, total } = event {
                last_progress = Some((current, total));
            }
        }
        assert_eq!(last_progress, Some((5, 5)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn hash_mismatch_after_download_is_a_hard_failure() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/hello.txt")
            .with_body("HELLO")
            .expect(1)
            .create_async()
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("hello.txt");
        let task = DownloadTask::new(format!("{}/hello.txt", server.url()), &dest)
            .with_hash(HELLO_SHA1);
        let report = fast_downloader(1)
            .run_batch(vec![task], None, &CancellationToken::new())
            .await;

        assert!(!dest.exists());
        assert!(matches!(
            report.into_result(),
            Err(LauncherError::ArtifactVerificationFailed { .. })
        ));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn single_worker_honors_priority_order() {
        let mut server = mockito::Server::new_async().await;
        let _late = server
            .mock("GET", "/late")
            .with_body("late")
            .create_async()
            .await;
        let _early = server
            .mock("GET", "/early")
            .with_body("early")
            .create_async()
            .await;

        let temp = tempfile::tempdir().unwrap();
        let late = temp.path().join("late");
        let early = temp.path().join("early");
        let tasks = vec![
            DownloadTask::new(format!("{}/late", server.url()), &late).with_priority(10),
            DownloadTask::new(format!("{}/early", server.url()), &early).with_priority(-1),
        ];

        let report = fast_downloader(1)
            .run_batch(tasks, None, &CancellationToken::new())
            .await;
        assert!(report.is_success());

        let early_at = std::fs::metadata(&early).unwrap().modified().unwrap();
        let late_at = std::fs::metadata(&late).unwrap().modified().unwrap();
        assert!(early_at <= late_at);
    }

    #[tokio::test]
    async fn cancelled_batch_reports_cancellation() {
        let server = mockito::Server::new_async().await;
        let temp = tempfile::tempdir().unwrap();
        let task = DownloadTask::new(format!("{}/a", server.url()), temp.path().join("a"));

        let cancel = CancellationToken::new();
        cancel.cancel();
        let report = fast_downloader(1).run_batch(vec![task], None, &cancel).await;

        assert!(matches!(report.into_result(), Err(LauncherError::Cancelled)));
    }

    #[tokio::test]
    async fn concurrent_batches_for_one_artifact_both_succeed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/lib.jar")
            .with_body("hello")
            .expect(1)
            .create_async()
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("libraries").join("lib.jar");
        let task = || {
            DownloadTask::new(format!("{}/lib.jar", server.url()), &dest)
                .with_hash(HELLO_SHA1)
                .with_size(5)
        };

        let first = fast_downloader(1);
        let second = fast_downloader(1);
        let cancel = CancellationToken::new();
        let (a, b) = tokio::join!(
            first.run_batch(vec![task()], None, &cancel),
            second.run_batch(vec![task()], None, &cancel),
        );

        assert!(a.is_success(), "{:?}", a.failures);
        assert!(b.is_success(), "{:?}", b.failures);
        assert_eq!(a.downloaded + b.downloaded, 1);
        assert_eq!(a.cache_hits + b.cache_hits, 1);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
        assert!(!ArtifactStore::part_path(&dest).exists());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn oversized_part_file_is_discarded_and_restarted() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/hello.txt")
            .match_header("range", mockito::Matcher::Missing)
            .with_body("hello")
            .expect(1)
            .create_async()
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("hello.txt");
        std::fs::write(ArtifactStore::part_path(&dest), b"stale bytes from a bigger file").unwrap();

        let task = DownloadTask::new(format!("{}/hello.txt", server.url()), &dest)
            .with_hash(HELLO_SHA1)
            .with_size(5);
        let report = fast_downloader(1)
            .run_batch(vec![task], None, &CancellationToken::new())
            .await;

        assert!(report.is_success(), "{:?}", report.failures);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn cancel_mid_transfer_keeps_the_part_file() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/slow.bin")
            .with_chunked_body(|w| {
                use std::io::Write;
                w.write_all(b"hel")?;
                w.flush()?;
                std::thread::sleep(Duration::from_millis(500));
                w.write_all(b"lo")
            })
            .create_async()
            .await;

        let temp = tempfile::tempdir().unwrap();
        let dest = temp.path().join("slow.bin");
        let task = DownloadTask::new(format!("{}/slow.bin", server.url()), &dest);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let DownloadEvent::Progress { current, .. } = event {
                    if current >= 3 {
                        trigger.cancel();
                        break;
                    }
                }
            }
        });

        let report = fast_downloader(1)
            .run_batch(vec![task], Some(&tx), &cancel)
            .await;

        assert!(matches!(report.into_result(), Err(LauncherError::Cancelled)));
        assert!(!dest.exists());
        assert_eq!(std::fs::read(ArtifactStore::part_path(&dest)).unwrap(), b"hel");
    }
}
