use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::auth::LaunchAccountProfile;
use crate::core::downloader::DownloadEvent;
use crate::core::java::RuntimeDescriptor;
use crate::core::state::JvmPreset;
use crate::core::version::VersionDescriptor;

use super::crash::CrashReport;

/// What the instance layer knows about the instance being launched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    pub id: String,
    pub version_id: String,
    /// Externally managed version: run it from its own version folder.
    pub external_path: bool,
    pub java_path: Option<PathBuf>,
    pub custom_version_json: Option<PathBuf>,
    pub custom_client_jar: Option<PathBuf>,
    pub max_memory_mb: Option<u32>,
    pub min_memory_mb: Option<u32>,
    pub jvm_preset: Option<JvmPreset>,
    pub extra_jvm_args: Vec<String>,
}

impl InstanceConfig {
    pub fn new(id: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version_id: version_id.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub instance: InstanceConfig,
    pub account: LaunchAccountProfile,
}

/// Every state a launch walks through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchStage {
    ResolvePaths,
    LoadVersionData,
    ResolveInheritance,
    PrepareDirectories,
    QueueCoreArtifacts,
    AwaitCoreDownloads,
    QueueLibraryArtifacts,
    AwaitLibraryDownloads,
    DiffAssetIndex,
    QueueMissingAssets,
    AwaitAssetDownloads,
    ResolveRuntime,
    AssembleCommandLine,
    ConfigureSkinProvider,
    Spawn,
    Running,
    Exit,
}

impl LaunchStage {
    pub fn label(self) -> &'static str {
        match self {
            LaunchStage::ResolvePaths => "Resolving instance directory",
            LaunchStage::LoadVersionData => "Loading version data",
            LaunchStage::ResolveInheritance => "Resolving inheritance",
            LaunchStage::PrepareDirectories => "Preparing directories",
            LaunchStage::QueueCoreArtifacts => "Queueing client jar and asset index",
            LaunchStage::AwaitCoreDownloads => "Downloading core files",
            LaunchStage::QueueLibraryArtifacts => "Checking libraries",
            LaunchStage::AwaitLibraryDownloads => "Downloading libraries",
            LaunchStage::DiffAssetIndex => "Checking assets",
            LaunchStage::QueueMissingAssets => "Queueing missing assets",
            LaunchStage::AwaitAssetDownloads => "Downloading assets",
            LaunchStage::ResolveRuntime => "Resolving Java runtime",
            LaunchStage::AssembleCommandLine => "Building command line",
            LaunchStage::ConfigureSkinProvider => "Configuring skin provider",
            LaunchStage::Spawn => "Starting game",
            LaunchStage::Running => "Running",
            LaunchStage::Exit => "Exited",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Notifications streamed to the presentation layer during one launch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LaunchEvent {
    Stage { stage: LaunchStage },
    Status { message: String },
    Download { progress: DownloadEvent },
    Log { stream: LogStream, line: String },
    Crash { report: CrashReport },
    Exited { exit_code: Option<i32>, duration_secs: u64 },
}

/// Everything resolved for one launch attempt. Built fresh every time.
#[derive(Debug, Clone)]
pub struct LaunchContext {
    /// Also names this launch's natives directory.
    pub session_id: Uuid,
    pub instance_id: String,
    pub game_dir: PathBuf,
    pub natives_dir: PathBuf,
    pub libraries_dir: PathBuf,
    pub assets_dir: PathBuf,
    /// Name-addressed asset copy for legacy indexes.
    pub virtual_assets_dir: Option<PathBuf>,
    pub client_jar: PathBuf,
    pub version: VersionDescriptor,
    pub runtime: RuntimeDescriptor,
    pub account: LaunchAccountProfile,
}
