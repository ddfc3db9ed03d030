// ─── Classpath Builder ───
// Turns the merged library list into classpath entries, the downloads still
// missing on disk and the native jars to unpack before spawn.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::downloader::DownloadTask;
use crate::core::version::{Library, Platform, ResolvedArtifact};

/// Libraries are fetched after the client jar and asset index.
const LIBRARY_PRIORITY: i32 = 10;

#[derive(Debug, Default)]
pub struct LibraryPlan {
    /// Absolute jar paths in declaration order, without duplicates.
    pub classpath: Vec<PathBuf>,
    pub downloads: Vec<DownloadTask>,
    /// Native jars whose shared libraries must be extracted before spawn.
    pub native_jars: Vec<PathBuf>,
}

/// Evaluate rules for every library. Disallowed entries contribute nothing;
/// allowed entries contribute a classpath entry and, when the file is absent,
/// a download task. Files already present are trusted as-is.
pub fn plan_libraries(libraries: &[Library], libraries_dir: &Path, platform: &Platform) -> LibraryPlan {
    let mut plan = LibraryPlan::default();
    let mut queued = HashSet::new();

    for library in effective_libraries(libraries, platform) {
        if let Some(artifact) = library.main_artifact() {
            let path = libraries_dir.join(&artifact.path);
            if !plan.classpath.contains(&path) {
                plan.classpath.push(path.clone());
            }
            queue_if_missing(&mut plan.downloads, &mut queued, &library.name, &artifact, path);
        }

        if let Some(classifier) = library.native_classifier(platform) {
            match library.native_artifact(&classifier) {
                Some(artifact) => {
                    let path = libraries_dir.join(&artifact.path);
                    if !plan.native_jars.contains(&path) {
                        plan.native_jars.push(path.clone());
                    }
                    queue_if_missing(&mut plan.downloads, &mut queued, &library.name, &artifact, path);
                }
                None => warn!("No {} natives for {}", classifier, library.name),
            }
        }
    }

    debug!(
        "Planned {} classpath entries, {} downloads, {} native jars",
        plan.classpath.len(),
        plan.downloads.len(),
        plan.native_jars.len()
    );
    plan
}

/// Libraries allowed on `platform`, one per `group:artifact[:classifier]`.
/// A later entry takes the slot of an earlier one with the same key.
fn effective_libraries<'a>(libraries: &'a [Library], platform: &Platform) -> Vec<&'a Library> {
    let mut effective: Vec<&Library> = Vec::with_capacity(libraries.len());
    let mut slots: HashMap<String, usize> = HashMap::new();

    for library in libraries {
        if !library.is_allowed(platform) {
            debug!("Skipping library {} (rules)", library.name);
            continue;
        }
        match slots.entry(library.dedup_key()) {
            Entry::Occupied(slot) => {
                let index = *slot.get();
                debug!("{} supersedes {}", library.name, effective[index].name);
                effective[index] = library;
            }
            Entry::Vacant(slot) => {
                slot.insert(effective.len());
                effective.push(library);
            }
        }
    }
    effective
}

fn queue_if_missing(
    downloads: &mut Vec<DownloadTask>,
    queued: &mut HashSet<PathBuf>,
    name: &str,
    artifact: &ResolvedArtifact,
    path: PathBuf,
) {
    if path.exists() || queued.contains(&path) {
        return;
    }
    if artifact.url.trim().is_empty() {
        warn!("Library {} is missing at {:?} and has no download URL", name, path);
        return;
    }

    let mut task = DownloadTask::new(&artifact.url, &path)
        .with_size(artifact.size)
        .with_priority(LIBRARY_PRIORITY);
    if let Some(sha1) = &artifact.sha1 {
        task = task.with_hash(sha1);
    }
    queued.insert(path);
    downloads.push(task);
}

/// Join library entries followed by the client jar, first occurrence wins.
pub fn build_classpath(libraries: &[PathBuf], client_jar: &Path) -> String {
    let mut seen = HashSet::new();
    libraries
        .iter()
        .map(PathBuf::as_path)
        .chain(std::iter::once(client_jar))
        .map(safe_path_str)
        .filter(|entry| seen.insert(entry.clone()))
        .collect::<Vec<_>>()
        .join(get_classpath_separator())
}

pub fn get_classpath_separator() -> &'static str {
    if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    }
}

/// Canonical path text for the JVM, without the Windows `\\?\` prefix the
/// classloader cannot handle.
pub fn safe_path_str(path: &Path) -> String {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let text = resolved.to_string_lossy().to_string();

    #[cfg(target_os = "windows")]
    {
        if let Some(stripped) = text.strip_prefix(r"\\?\") {
            return stripped.to_string();
        }
    }

    text
}
