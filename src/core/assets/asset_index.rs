// ─── Asset Index ───
// Loose-object assets: the index JSON, the steady-state diff against
// `objects/` and the legacy virtual tree.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::core::downloader::DownloadTask;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::store::{asset_object_path, ArtifactStore};
use crate::core::version::AssetIndexInfo;

pub const RESOURCES_URL: &str = "https://resources.download.minecraft.net";

/// Top-level asset index JSON structure.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetIndex {
    pub objects: HashMap<String, AssetObject>,
    /// Pre-1.7 indexes expect a name-addressed copy of every object.
    #[serde(default, rename = "virtual")]
    pub is_virtual: bool,
    #[serde(default)]
    pub map_to_resources: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

/// Download task for the index file itself (a core artifact).
pub fn index_task(info: &AssetIndexInfo, indexes_dir: &Path) -> DownloadTask {
    let mut task = DownloadTask::new(&info.url, indexes_dir.join(format!("{}.json", info.id)));
    if let Some(sha1) = &info.sha1 {
        task = task.with_hash(sha1);
    }
    task.with_size(info.size)
}

impl AssetIndex {
    pub async fn load(path: &Path) -> LauncherResult<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| LauncherError::io(path, source))?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn needs_virtual_tree(&self) -> bool {
        self.is_virtual || self.map_to_resources
    }

    /// Objects that are missing or whose size differs from the index.
    /// Hashes of present files are not recomputed.
    pub async fn missing_objects(
        &self,
        objects_dir: &Path,
        resources_url: &str,
    ) -> Vec<DownloadTask> {
        let base = resources_url.trim_end_matches('/');
        let mut seen = HashSet::new();
        let mut tasks = Vec::new();

        for object in self.objects.values() {
            if object.hash.len() < 2 || !seen.insert(object.hash.as_str()) {
                continue;
            }
            let dest = asset_object_path(objects_dir, &object.hash);
            if ArtifactStore::size_matches(&dest, object.size).await {
                continue;
            }
            let url = format!("{}/{}/{}", base, &object.hash[..2], object.hash);
            tasks.push(
                DownloadTask::new(url, dest)
                    .with_hash(&object.hash)
                    .with_size(object.size),
            );
        }

        info!(
            "{} of {} asset objects need downloading",
            tasks.len(),
            seen.len()
        );
        tasks
    }

    /// Copy every object to `<target>/<logical name>` for indexes that
    /// address assets by name. Returns the number of files written.
    pub async fn materialize_virtual(
        &self,
        objects_dir: &Path,
        target_dir: &Path,
    ) -> LauncherResult<usize> {
        let mut copied = 0;
        for (name, object) in &self.objects {
            let source = asset_object_path(objects_dir, &object.hash);
            let dest = target_dir.join(name);
            if ArtifactStore::size_matches(&dest, object.size).await {
                continue;
            }
            if !ArtifactStore::size_matches(&source, object.size).await {
                debug!("Skipping virtual asset {} (object missing)", name);
                continue;
            }
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| LauncherError::io(parent, source))?;
            }
            tokio::fs::copy(&source, &dest)
                .await
                .map_err(|err| LauncherError::io(&dest, err))?;
            copied += 1;
        }
        info!("Materialized {} virtual assets into {:?}", copied, target_dir);
        Ok(copied)
    }
}
