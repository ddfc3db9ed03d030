// ─── Native Libraries ───
// Shared libraries shipped inside legacy `natives-*` jars are unpacked flat
// into the natives directory before the game starts.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};

const NATIVE_EXTENSIONS: [&str; 4] = [".dll", ".so", ".dylib", ".jnilib"];

/// Recreate `natives_dir` and unpack every native jar into it. Unreadable
/// jars are logged and skipped. Returns the number of files extracted.
pub async fn extract_natives(native_jars: &[PathBuf], natives_dir: &Path) -> LauncherResult<usize> {
    if natives_dir.exists() {
        if let Err(err) = tokio::fs::remove_dir_all(natives_dir).await {
            warn!("Could not clear stale natives in {:?}: {}", natives_dir, err);
        }
    }
    tokio::fs::create_dir_all(natives_dir)
        .await
        .map_err(|source| LauncherError::io(natives_dir, source))?;

    let mut extracted = 0;
    for jar in native_jars {
        let jar_bytes = match tokio::fs::read(jar).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("Cannot read native jar {:?}: {}", jar, err);
                continue;
            }
        };

        let dest_dir = natives_dir.to_path_buf();
        let jar_name = jar.clone();
        extracted += tokio::task::spawn_blocking(move || unpack_jar(jar_bytes, &jar_name, &dest_dir))
            .await
            .map_err(|err| LauncherError::Other(format!("Task join error: {}", err)))?;
    }

    debug!("Extracted {} native files into {:?}", extracted, natives_dir);
    Ok(extracted)
}

fn unpack_jar(jar_bytes: Vec<u8>, jar: &Path, dest_dir: &Path) -> usize {
    let mut archive = match zip::ZipArchive::new(Cursor::new(jar_bytes)) {
        Ok(archive) => archive,
        Err(err) => {
            warn!("Cannot open native jar {:?}: {}", jar, err);
            return 0;
        }
    };

    let mut count = 0;
    for index in 0..archive.len() {
        let Ok(mut entry) = archive.by_index(index) else {
            continue;
        };
        let name = entry.name().to_string();

        if name.contains("META-INF") || name.contains('/') || name.contains('\\') {
            continue;
        }
        if !NATIVE_EXTENSIONS.iter().any(|ext| name.ends_with(ext)) {
            continue;
        }

        let dest = dest_dir.join(&name);
        let mut out = match std::fs::File::create(&dest) {
            Ok(file) => file,
            Err(err) => {
                warn!("Cannot create {:?}: {}", dest, err);
                continue;
            }
        };
        if std::io::copy(&mut entry, &mut out).is_ok() {
            debug!("Extracted native: {}", name);
            count += 1;
        }
    }
    count
}

/// Remove the natives directory once the session is over.
pub async fn cleanup_natives(natives_dir: &Path) {
    if let Err(err) = tokio::fs::remove_dir_all(natives_dir).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to clean natives at {:?}: {}", natives_dir, err);
        }
    }
}
