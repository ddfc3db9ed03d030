// ─── Runtime Manager ───
// Managed cache first, then the host system, then a consented download into
// `runtimes/java<major>/`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::archive::{ensure_executable, extract_archive, ArchiveKind};
use super::detect::{java_exe, locate_java_binary, probe_java, system_java_candidates};
use crate::core::downloader::{DownloadEvent, DownloadTask, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::state::LauncherPaths;
use crate::core::store::ArtifactStore;

const ADOPTIUM_API_BASE: &str = "https://api.adoptium.net/v3/binary/latest";

/// Majors for which a download is registered.
pub const SUPPORTED_MAJORS: [u32; 5] = [8, 11, 16, 17, 21];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeProvenance {
    Cached,
    SystemDetected,
    FreshlyInstalled,
    /// Bare `java` command accepted without a probe.
    UnverifiedCommand,
    InstanceOverride,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeDescriptor {
    pub major: u32,
    pub executable: PathBuf,
    pub provenance: RuntimeProvenance,
}

impl RuntimeDescriptor {
    /// A runtime path configured on the instance. Used as-is.
    pub fn instance_override(major: u32, executable: impl Into<PathBuf>) -> Self {
        Self {
            major,
            executable: executable.into(),
            provenance: RuntimeProvenance::InstanceOverride,
        }
    }
}

// ── Consent ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ConsentRequest {
    pub major: u32,
    /// Archive size in bytes, 0 when the server did not say.
    pub download_size: u64,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentDecision {
    Install,
    /// Skip the download and trust whatever `java` is on `PATH`.
    UseSystemCommand,
    Deny,
}

/// Asked before a runtime download starts.
#[async_trait]
pub trait RuntimeConsent: Send + Sync {
    async fn request(&self, request: &ConsentRequest) -> ConsentDecision;
}

/// Answers every request the same way.
pub struct FixedConsent(pub ConsentDecision);

#[async_trait]
impl RuntimeConsent for FixedConsent {
    async fn request(&self, _request: &ConsentRequest) -> ConsentDecision {
        self.0
    }
}

// ── Download sources ────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeArchive {
    pub url: String,
    pub kind: ArchiveKind,
}

/// Fixed mapping from major version to an Eclipse Temurin JRE archive.
#[derive(Debug, Clone)]
pub struct RuntimeSourceTable {
    base_url: String,
}

impl Default for RuntimeSourceTable {
    fn default() -> Self {
        Self::new(ADOPTIUM_API_BASE)
    }
}

impl RuntimeSourceTable {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn archive_for(&self, major: u32) -> Option<RuntimeArchive> {
        self.archive_for_platform(major, adoptium_os(), &adoptium_arch())
    }

    pub fn archive_for_platform(&self, major: u32, os: &str, arch: &str) -> Option<RuntimeArchive> {
        if !SUPPORTED_MAJORS.contains(&major) {
            return None;
        }
        let kind = if os == "windows" {
            ArchiveKind::Zip
        } else {
            ArchiveKind::TarGz
        };
        Some(RuntimeArchive {
            url: format!(
                "{}/{}/ga/{}/{}/jre/hotspot/normal/eclipse",
                self.base_url, major, os, arch
            ),
            kind,
        })
    }
}

fn adoptium_os() -> &'static str {
    match std::env::consts::OS {
        "windows" => "windows",
        "macos" => "mac",
        _ => "linux",
    }
}

fn adoptium_arch() -> String {
    match std::env::consts::ARCH {
        "x86_64" => "x64".to_string(),
        "aarch64" => "aarch64".to_string(),
        "x86" => "x32".to_string(),
        other => other.to_string(),
    }
}

// ── Manager ─────────────────────────────────────────────

pub struct RuntimeManager {
    paths: LauncherPaths,
    downloader: Arc<Downloader>,
    metadata_client: reqwest::Client,
    sources: RuntimeSourceTable,
    probe_system: bool,
}

impl RuntimeManager {
    pub fn new(
        paths: LauncherPaths,
        downloader: Arc<Downloader>,
        metadata_client: reqwest::Client,
    ) -> Self {
        Self {
            paths,
            downloader,
            metadata_client,
            sources: RuntimeSourceTable::default(),
            probe_system: true,
        }
    }

    pub fn with_sources(mut self, sources: RuntimeSourceTable) -> Self {
        self.sources = sources;
        self
    }

    /// Only consider managed runtimes (no host probing).
    pub fn without_system_probe(mut self) -> Self {
        self.probe_system = false;
        self
    }

    pub fn managed_dir(&self, major: u32) -> PathBuf {
        self.paths.runtimes_dir().join(format!("java{major}"))
    }

    pub fn find_managed(&self, major: u32) -> Option<PathBuf> {
        locate_java_binary(&self.managed_dir(major))
    }

    /// First system java whose reported major equals `major`.
    pub async fn find_system(&self, major: u32) -> Option<PathBuf> {
        for candidate in system_java_candidates() {
            if let Some(found) = probe_java(&candidate).await {
                if found.major == major {
                    info!("Found system Java {} at {:?}", found.version, found.path);
                    return Some(found.path);
                }
                debug!(
                    "Ignoring {:?}: Java {} (need {})",
                    found.path, found.major, major
                );
            }
        }
        None
    }

    /// Produce a runnable java for `major`.
    #[instrument(skip(self, events, consent, cancel))]
    pub async fn ensure(
        &self,
        major: u32,
        events: Option<&UnboundedSender<DownloadEvent>>,
        consent: &dyn RuntimeConsent,
        cancel: &CancellationToken,
    ) -> LauncherResult<RuntimeDescriptor> {
        if let Some(executable) = self.find_managed(major) {
            debug!("Managed Java {} at {:?}", major, executable);
            return Ok(RuntimeDescriptor {
                major,
                executable,
                provenance: RuntimeProvenance::Cached,
            });
        }

        if self.probe_system {
            if let Some(executable) = self.find_system(major).await {
                return Ok(RuntimeDescriptor {
                    major,
                    executable,
                    provenance: RuntimeProvenance::SystemDetected,
                });
            }
        }

        let archive = self
            .sources
            .archive_for(major)
            .ok_or(LauncherError::RuntimeUnsupported(major))?;

        let request = ConsentRequest {
            major,
            download_size: self.probe_size(&archive.url).await,
            url: archive.url.clone(),
        };
        match consent.request(&request).await {
            ConsentDecision::Install => {
                let executable = self.install(major, &archive, events, cancel).await?;
                Ok(RuntimeDescriptor {
                    major,
                    executable,
                    provenance: RuntimeProvenance::FreshlyInstalled,
                })
            }
            ConsentDecision::UseSystemCommand => {
                warn!("Java {} install declined, trusting `{}` on PATH", major, java_exe());
                Ok(RuntimeDescriptor {
                    major,
                    executable: PathBuf::from(java_exe()),
                    provenance: RuntimeProvenance::UnverifiedCommand,
                })
            }
            ConsentDecision::Deny => Err(LauncherError::RuntimeConsentDenied(major)),
        }
    }

    /// `Content-Length` of a HEAD request, 0 when unknown.
    async fn probe_size(&self, url: &str) -> u64 {
        match self.metadata_client.head(url).send().await {
            Ok(response) if response.status().is_success() => response
                .headers()
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            Ok(response) => {
                debug!("Size probe for {} returned {}", url, response.status());
                0
            }
            Err(err) => {
                debug!("Size probe for {} failed: {}", url, err);
                0
            }
        }
    }

    async fn install(
        &self,
        major: u32,
        archive: &RuntimeArchive,
        events: Option<&UnboundedSender<DownloadEvent>>,
        cancel: &CancellationToken,
    ) -> LauncherResult<PathBuf> {
        let target = self.managed_dir(major);
        let _installer = tokio::select! {
            _ = cancel.cancelled() => return Err(LauncherError::Cancelled),
            guard = ArtifactStore::lock(&target) => guard,
        };
        if let Some(executable) = self.find_managed(major) {
            debug!("Java {} was installed by a concurrent launch", major);
            return Ok(executable);
        }

        info!("Installing Java {} from {}", major, archive.url);
        let runtimes_dir = self.paths.runtimes_dir();
        let install_id = Uuid::new_v4();
        let archive_path = runtimes_dir
            .join("downloads")
            .join(format!("java{major}-{install_id}.{}", archive.kind.extension()));
        let staging = runtimes_dir.join(format!("java{major}.staging-{install_id}"));

        let installed = match self
            .download_and_extract(archive, &archive_path, &staging, events, cancel)
            .await
        {
            Ok(()) => replace_dir(&staging, &target).await,
            Err(err) => Err(err),
        };
        ArtifactStore::discard(&archive_path).await?;
        if installed.is_err() && staging.exists() {
            if let Err(err) = tokio::fs::remove_dir_all(&staging).await {
                warn!("Could not remove {:?}: {}", staging, err);
            }
        }
        installed?;

        let executable = locate_java_binary(&target).ok_or(LauncherError::RuntimeNotFound(major))?;
        ensure_executable(&executable)?;
        info!("Java {} installed at {:?}", major, executable);
        Ok(executable)
    }

    async fn download_and_extract(
        &self,
        archive: &RuntimeArchive,
        archive_path: &Path,
        staging: &Path,
        events: Option<&UnboundedSender<DownloadEvent>>,
        cancel: &CancellationToken,
    ) -> LauncherResult<()> {
        self.downloader
            .download_one(DownloadTask::new(&archive.url, archive_path), events, cancel)
            .await?;

        let kind = archive.kind;
        let (from, to) = (archive_path.to_path_buf(), staging.to_path_buf());
        tokio::task::spawn_blocking(move || extract_archive(kind, &from, &to))
            .await
            .map_err(|err| LauncherError::Other(format!("Extraction task failed: {err}")))?
    }
}

async fn replace_dir(staging: &Path, target: &Path) -> LauncherResult<()> {
    if tokio::fs::try_exists(target).await.unwrap_or(false) {
        tokio::fs::remove_dir_all(target)
            .await
            .map_err(|source| LauncherError::io(target, source))?;
    }
    tokio::fs::rename(staging, target)
        .await
        .map_err(|source| LauncherError::io(target, source))
}
