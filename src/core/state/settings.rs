use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};

const SETTINGS_FILE: &str = "launcher_settings.json";

/// Named JVM flag sets offered to users.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum JvmPreset {
    #[default]
    Default,
    Performance,
    LowMemory,
    Minimal,
}

impl JvmPreset {
    pub fn flags(self) -> &'static [&'static str] {
        match self {
            JvmPreset::Default => &[
                "-XX:+UnlockExperimentalVMOptions",
                "-XX:+UseG1GC",
                "-XX:G1NewSizePercent=20",
                "-XX:G1ReservePercent=20",
                "-XX:MaxGCPauseMillis=50",
                "-XX:G1HeapRegionSize=32M",
            ],
            JvmPreset::Performance => &[
                "-XX:+UseG1GC",
                "-XX:+ParallelRefProcEnabled",
                "-XX:MaxGCPauseMillis=200",
                "-XX:+UnlockExperimentalVMOptions",
                "-XX:+DisableExplicitGC",
                "-XX:+AlwaysPreTouch",
                "-XX:G1NewSizePercent=30",
                "-XX:G1MaxNewSizePercent=40",
                "-XX:G1HeapRegionSize=8M",
                "-XX:G1ReservePercent=20",
                "-XX:G1HeapWastePercent=5",
                "-XX:G1MixedGCCountTarget=4",
                "-XX:InitiatingHeapOccupancyPercent=15",
                "-XX:G1MixedGCLiveThresholdPercent=90",
                "-XX:G1RSetUpdatingPauseTimePercent=5",
                "-XX:SurvivorRatio=32",
                "-XX:+PerfDisableSharedMem",
                "-XX:MaxTenuringThreshold=1",
            ],
            JvmPreset::LowMemory => &[
                "-XX:+UseSerialGC",
                "-XX:MaxHeapFreeRatio=30",
                "-XX:MinHeapFreeRatio=10",
            ],
            JvmPreset::Minimal => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ProxySettings {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl ProxySettings {
    /// JVM system properties routing both HTTP and HTTPS through the proxy.
    pub fn jvm_flags(&self) -> Vec<String> {
        if !self.enabled || self.host.trim().is_empty() {
            return Vec::new();
        }
        let host = self.host.trim();
        vec![
            format!("-Dhttp.proxyHost={host}"),
            format!("-Dhttp.proxyPort={}", self.port),
            format!("-Dhttps.proxyHost={host}"),
            format!("-Dhttps.proxyPort={}", self.port),
        ]
    }
}

/// Java agent that redirects skin/profile lookups for offline accounts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkinProviderSettings {
    pub agent_jar: PathBuf,
    pub server_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherSettings {
    pub max_concurrent_downloads: usize,
    pub default_max_memory_mb: u32,
    pub default_min_memory_mb: u32,
    pub jvm_preset: JvmPreset,
    pub extra_jvm_args: Vec<String>,
    pub proxy: ProxySettings,
    pub log_buffer_lines: usize,
    pub skin_provider: Option<SkinProviderSettings>,
}

impl Default for LauncherSettings {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 5,
            default_max_memory_mb: recommended_max_memory_mb(),
            default_min_memory_mb: 512,
            jvm_preset: JvmPreset::Default,
            extra_jvm_args: Vec::new(),
            proxy: ProxySettings::default(),
            log_buffer_lines: 1000,
            skin_provider: None,
        }
    }
}

impl LauncherSettings {
    /// Load settings from `<data_dir>/launcher_settings.json`, falling back to
    /// defaults when the file is missing or unreadable.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(SETTINGS_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(_) => {
                debug!("No settings file at {:?}, using defaults", path);
                return Self::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(settings) => settings,
            Err(err) => {
                warn!("Ignoring corrupt settings file {:?}: {}", path, err);
                Self::default()
            }
        }
    }

    pub fn save(&self, data_dir: &Path) -> LauncherResult<()> {
        let path = data_dir.join(SETTINGS_FILE);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json).map_err(|source| LauncherError::Io { path, source })
    }
}

/// Half of the physical memory, clamped to a range the game is happy with.
fn recommended_max_memory_mb() -> u32 {
    let mut system = sysinfo::System::new();
    system.refresh_memory();
    let total_mb = system.total_memory() / (1024 * 1024);
    (total_mb / 2).clamp(1024, 4096) as u32
}
