use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the entire launch engine.
/// Every module returns `Result<T, LauncherError>`.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Transfer of {url} stalled for more than {secs}s")]
    TransferTimeout { url: String, secs: u64 },

    // ── Metadata ────────────────────────────────────────
    #[error("No version source could provide metadata for {0}")]
    MetadataUnavailable(String),

    #[error("Version {child} inherits from {parent}, which no source can provide")]
    UnresolvedParent { child: String, parent: String },

    #[error("Cyclic inheritance chain: {}", chain.join(" -> "))]
    CyclicInheritance { chain: Vec<String> },

    // ── Integrity ───────────────────────────────────────
    #[error("Verification failed for {path:?}: expected {expected}, got {actual}")]
    ArtifactVerificationFailed {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("{} artifact(s) could not be downloaded: {}", failures.len(), failures.join(", "))]
    ArtifactDownloadExhausted { failures: Vec<String> },

    // ── Maven ───────────────────────────────────────────
    #[error("Invalid Maven coordinate: {0}")]
    InvalidMavenCoordinate(String),

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Java ────────────────────────────────────────────
    #[error("No Java runtime download is registered for major version {0}")]
    RuntimeUnsupported(u32),

    #[error("Installation of Java {0} was declined")]
    RuntimeConsentDenied(u32),

    #[error("Java not found for major version {0}")]
    RuntimeNotFound(u32),

    // ── Process ─────────────────────────────────────────
    #[error("Failed to start the game process: {0}")]
    ProcessSpawnFailed(String),

    // ── Archive ─────────────────────────────────────────
    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    // ── Control ─────────────────────────────────────────
    #[error("Operation cancelled")]
    Cancelled,

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl LauncherError {
    /// Whether a download attempt that failed with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            LauncherError::Http(err) => {
                if let Some(status) = err.status() {
                    return status_is_retryable(status.as_u16());
                }
                true
            }
            LauncherError::DownloadFailed { status, .. } => status_is_retryable(*status),
            LauncherError::TransferTimeout { .. } => true,
            LauncherError::Io { .. } => true,
            _ => false,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LauncherError::Io {
            path: path.into(),
            source,
        }
    }
}

// 416 only reaches callers after the stale part file was discarded, so the
// next attempt starts from byte zero.
fn status_is_retryable(status: u16) -> bool {
    matches!(status, 408 | 416 | 429) || status >= 500
}

impl From<std::io::Error> for LauncherError {
    fn from(source: std::io::Error) -> Self {
        LauncherError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}

// ── Serialization for presentation payloads ─────────────
impl serde::Serialize for LauncherError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
