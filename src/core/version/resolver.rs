// ─── Version Resolver ───
// Finds a version JSON through an ordered list of sources and collapses its
// inheritance chain into one descriptor.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use sha1::{Digest, Sha1};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use super::manifest::{VersionManifest, VERSION_MANIFEST_URL};
use super::version_file::{Library, VersionDescriptor};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::state::LauncherPaths;
use crate::core::store::ArtifactStore;

/// Something that may know a raw (unmerged) version descriptor.
///
/// `Ok(None)` means "not here"; an error means the source itself failed and
/// the resolver moves on to the next one.
#[async_trait]
pub trait VersionSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self, id: &str) -> LauncherResult<Option<VersionDescriptor>>;
}

async fn read_descriptor(path: &std::path::Path, id: &str) -> LauncherResult<Option<VersionDescriptor>> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(LauncherError::io(path, source)),
    };
    let mut descriptor: VersionDescriptor = serde_json::from_str(&raw)?;
    if descriptor.id.is_empty() {
        descriptor.id = id.to_string();
    }
    Ok(Some(descriptor))
}

// ── Local override ──────────────────────────────────────

/// Explicitly configured JSON files, keyed by version id.
#[derive(Debug, Default)]
pub struct LocalOverrideSource {
    overrides: HashMap<String, PathBuf>,
}

impl LocalOverrideSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.overrides.insert(id.into(), path.into());
        self
    }
}

#[async_trait]
impl VersionSource for LocalOverrideSource {
    fn name(&self) -> &str {
        "local-override"
    }

    async fn fetch(&self, id: &str) -> LauncherResult<Option<VersionDescriptor>> {
        match self.overrides.get(id) {
            Some(path) => match read_descriptor(path, id).await? {
                Some(descriptor) => Ok(Some(descriptor)),
                None => Err(LauncherError::Other(format!(
                    "Custom version JSON for {id} not found at {}",
                    path.display()
                ))),
            },
            None => Ok(None),
        }
    }
}

// ── Remote manifest ─────────────────────────────────────

/// Mojang manifest lookup. Every JSON it serves is written to
/// `versions/<id>/<id>.json` for [`CachedVersionSource`].
pub struct RemoteManifestSource {
    client: reqwest::Client,
    manifest_url: String,
    paths: LauncherPaths,
    manifest: OnceCell<VersionManifest>,
}

impl RemoteManifestSource {
    pub fn new(client: reqwest::Client, paths: LauncherPaths) -> Self {
        Self::with_manifest_url(client, paths, VERSION_MANIFEST_URL)
    }

    pub fn with_manifest_url(
        client: reqwest::Client,
        paths: LauncherPaths,
        manifest_url: impl Into<String>,
    ) -> Self {
        Self {
            client,
            manifest_url: manifest_url.into(),
            paths,
            manifest: OnceCell::new(),
        }
    }

    async fn manifest(&self) -> LauncherResult<&VersionManifest> {
        self.manifest
            .get_or_try_init(|| VersionManifest::fetch(&self.client, &self.manifest_url))
            .await
    }

    async fn cache_raw(&self, id: &str, raw: &str) -> LauncherResult<()> {
        let dest = self.paths.version_json(id);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| LauncherError::io(parent, source))?;
        }
        let part = ArtifactStore::part_path(&dest);
        tokio::fs::write(&part, raw)
            .await
            .map_err(|source| LauncherError::io(&part, source))?;
        ArtifactStore::commit(&part, &dest).await
    }
}

#[async_trait]
impl VersionSource for RemoteManifestSource {
    fn name(&self) -> &str {
        "remote-manifest"
    }

    async fn fetch(&self, id: &str) -> LauncherResult<Option<VersionDescriptor>> {
        let Some(entry) = self.manifest().await?.find_version(id) else {
            return Ok(None);
        };

        let response = self.client.get(&entry.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: entry.url.clone(),
                status: status.as_u16(),
            });
        }
        let raw = response.text().await?;

        if let Some(expected) = &entry.sha1 {
            let actual = hex::encode(Sha1::digest(raw.as_bytes()));
            if !actual.eq_ignore_ascii_case(expected) {
                return Err(LauncherError::ArtifactVerificationFailed {
                    path: self.paths.version_json(id),
                    expected: expected.clone(),
                    actual,
                });
            }
        }

        let descriptor: VersionDescriptor = serde_json::from_str(&raw)?;
        if let Err(err) = self.cache_raw(id, &raw).await {
            warn!("Could not cache version JSON for {}: {}", id, err);
        }
        Ok(Some(descriptor))
    }
}

// ── Local cache ─────────────────────────────────────────

/// JSON files under `versions/<id>/<id>.json`, written by earlier remote
/// resolutions or by loader installers.
pub struct CachedVersionSource {
    paths: LauncherPaths,
}

impl CachedVersionSource {
    pub fn new(paths: LauncherPaths) -> Self {
        Self { paths }
    }
}

#[async_trait]
impl VersionSource for CachedVersionSource {
    fn name(&self) -> &str {
        "local-cache"
    }

    async fn fetch(&self, id: &str) -> LauncherResult<Option<VersionDescriptor>> {
        read_descriptor(&self.paths.version_json(id), id).await
    }
}

// ── In-memory ───────────────────────────────────────────

/// Fixed set of descriptors held in memory.
#[derive(Debug, Default)]
pub struct StaticVersionSource {
    descriptors: HashMap<String, VersionDescriptor>,
}

impl StaticVersionSource {
    pub fn new(descriptors: impl IntoIterator<Item = VersionDescriptor>) -> Self {
        Self {
            descriptors: descriptors
                .into_iter()
                .map(|d| (d.id.clone(), d))
                .collect(),
        }
    }
}

#[async_trait]
impl VersionSource for StaticVersionSource {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self, id: &str) -> LauncherResult<Option<VersionDescriptor>> {
        Ok(self.descriptors.get(id).cloned())
    }
}

// ─── Resolver ───

pub struct VersionResolver {
    sources: Vec<Arc<dyn VersionSource>>,
}

impl VersionResolver {
    /// Sources are consulted in the given order.
    pub fn new(sources: Vec<Arc<dyn VersionSource>>) -> Self {
        Self { sources }
    }

    /// Override → remote manifest → local cache.
    pub fn standard(
        client: reqwest::Client,
        paths: LauncherPaths,
        overrides: LocalOverrideSource,
    ) -> Self {
        Self::new(vec![
            Arc::new(overrides),
            Arc::new(RemoteManifestSource::new(client, paths.clone())),
            Arc::new(CachedVersionSource::new(paths)),
        ])
    }

    /// Same sources with `first` consulted before all of them.
    pub fn layered(&self, first: Arc<dyn VersionSource>) -> Self {
        let mut sources = Vec::with_capacity(self.sources.len() + 1);
        sources.push(first);
        sources.extend(self.sources.iter().cloned());
        Self { sources }
    }

    /// Resolve `id` and every ancestor, then fold them from the root down.
    #[instrument(skip(self))]
    pub async fn resolve(&self, id: &str) -> LauncherResult<VersionDescriptor> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut order: Vec<String> = Vec::new();
        let mut chain: Vec<VersionDescriptor> = Vec::new();
        let mut current = id.to_string();

        loop {
            if !visited.insert(current.clone()) {
                order.push(current);
                return Err(LauncherError::CyclicInheritance { chain: order });
            }
            order.push(current.clone());

            let descriptor = match self.load_raw(&current).await {
                Some(descriptor) => descriptor,
                None => {
                    return Err(match chain.last() {
                        None => LauncherError::MetadataUnavailable(current),
                        Some(child) => LauncherError::UnresolvedParent {
                            child: child.id.clone(),
                            parent: current,
                        },
                    });
                }
            };

            let parent = descriptor
                .inherits_from
                .clone()
                .filter(|p| !p.trim().is_empty());
            chain.push(descriptor);
            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }

        let mut descendants = chain.into_iter().rev();
        let mut merged = descendants
            .next()
            .ok_or_else(|| LauncherError::MetadataUnavailable(id.to_string()))?;
        for child in descendants {
            debug!("Merging {} onto {}", child.id, merged.id);
            merged = merge_descriptors(merged, child);
        }

        info!(
            "Resolved {} ({} libraries, chain: {})",
            id,
            merged.libraries.len(),
            order.join(" -> ")
        );
        Ok(merged)
    }

    async fn load_raw(&self, id: &str) -> Option<VersionDescriptor> {
        for source in &self.sources {
            match source.fetch(id).await {
                Ok(Some(descriptor)) => {
                    debug!("Version {} provided by {}", id, source.name());
                    return Some(descriptor);
                }
                Ok(None) => {}
                Err(err) => warn!("Version source {} failed for {}: {}", source.name(), id, err),
            }
        }
        None
    }
}

/// Overlay `child` onto an already merged `parent`.
pub fn merge_descriptors(parent: VersionDescriptor, child: VersionDescriptor) -> VersionDescriptor {
    let jar = child
        .jar
        .or(parent.jar)
        .unwrap_or_else(|| parent.id.clone());

    let mut arguments = parent.arguments;
    arguments.game.extend(child.arguments.game);
    arguments.jvm.extend(child.arguments.jvm);

    VersionDescriptor {
        id: child.id,
        inherits_from: child.inherits_from,
        version_type: child.version_type.or(parent.version_type),
        main_class: child.main_class.or(parent.main_class),
        libraries: merge_libraries(parent.libraries, child.libraries),
        downloads: child.downloads.or(parent.downloads),
        asset_index: child.asset_index.or(parent.asset_index),
        assets: child.assets.or(parent.assets),
        arguments,
        minecraft_arguments: child.minecraft_arguments.or(parent.minecraft_arguments),
        java_version: child.java_version.or(parent.java_version),
        jar: Some(jar),
    }
}

/// A child library replaces the parent library with the same
/// `group:artifact[:classifier]` in place; unmatched child libraries are
/// appended. Within one descriptor, same-key entries under identical rules
/// collapse to the later one; entries under different rules are platform
/// alternatives, settled after rule evaluation by `plan_libraries`.
fn merge_libraries(parent: Vec<Library>, child: Vec<Library>) -> Vec<Library> {
    let parent = collapse_duplicates(parent);
    let child = collapse_duplicates(child);
    let child_keys: HashSet<String> = child.iter().map(Library::dedup_key).collect();

    let mut merged: Vec<Library> = Vec::with_capacity(parent.len() + child.len());
    let mut slots: HashMap<String, usize> = HashMap::new();
    for lib in parent {
        let key = lib.dedup_key();
        if child_keys.contains(&key) {
            if slots.contains_key(&key) {
                continue;
            }
            slots.insert(key, merged.len());
        }
        merged.push(lib);
    }

    for lib in child {
        match slots.remove(&lib.dedup_key()) {
            Some(index) => merged[index] = lib,
            None => merged.push(lib),
        }
    }
    merged
}

fn collapse_duplicates(libraries: Vec<Library>) -> Vec<Library> {
    let mut kept: Vec<Library> = Vec::with_capacity(libraries.len());
    let mut slots: HashMap<String, Vec<usize>> = HashMap::new();
    for lib in libraries {
        let indexes = slots.entry(lib.dedup_key()).or_default();
        match indexes.iter().copied().find(|&i| kept[i].rules == lib.rules) {
            Some(index) => {
                debug!("{} supersedes {}", lib.name, kept[index].name);
                kept[index] = lib;
            }
            None => {
                indexes.push(kept.len());
                kept.push(lib);
            }
        }
    }
    kept
}
