use std::path::{Path, PathBuf};

use crate::core::error::{LauncherError, LauncherResult};

const APP_DIR_NAME: &str = "InterfaceOficial";
const DATA_DIR_ENV: &str = "INTERFACE_DATA_DIR";

/// On-disk layout shared by the download engine, the resolver and the
/// launch orchestrator.
///
/// ```text
/// <base>/libraries/<maven path>
/// <base>/assets/indexes/<id>.json
/// <base>/assets/objects/<hash[0:2]>/<hash>
/// <base>/versions/<id>/<id>.json | <id>.jar
/// <base>/instances/<id>/
/// <base>/runtimes/java<major>/
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherPaths {
    base_dir: PathBuf,
}

impl LauncherPaths {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// `$INTERFACE_DATA_DIR`, or `<platform data dir>/InterfaceOficial`.
    pub fn from_env() -> Self {
        if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
            return Self::new(PathBuf::from(dir));
        }
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME);
        Self::new(base)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.base_dir.join("libraries")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.base_dir.join("assets")
    }

    pub fn asset_indexes_dir(&self) -> PathBuf {
        self.assets_dir().join("indexes")
    }

    pub fn asset_objects_dir(&self) -> PathBuf {
        self.assets_dir().join("objects")
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.base_dir.join("versions")
    }

    pub fn version_dir(&self, version_id: &str) -> PathBuf {
        self.versions_dir().join(version_id)
    }

    pub fn version_json(&self, version_id: &str) -> PathBuf {
        self.version_dir(version_id)
            .join(format!("{version_id}.json"))
    }

    pub fn version_jar(&self, version_id: &str) -> PathBuf {
        self.version_dir(version_id).join(format!("{version_id}.jar"))
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.base_dir.join("instances")
    }

    pub fn instance_dir(&self, instance_id: &str) -> PathBuf {
        self.instances_dir().join(instance_id)
    }

    pub fn runtimes_dir(&self) -> PathBuf {
        self.base_dir.join("runtimes")
    }

    /// Create the shared directories. Idempotent.
    pub async fn ensure_layout(&self) -> LauncherResult<()> {
        for dir in [
            self.libraries_dir(),
            self.asset_indexes_dir(),
            self.asset_objects_dir(),
            self.versions_dir(),
            self.instances_dir(),
            self.runtimes_dir(),
        ] {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|source| LauncherError::Io { path: dir, source })?;
        }
        Ok(())
    }
}
