// ─── Artifact Store ───
// Filesystem contract shared by every writer: final paths only ever appear
// through an atomic rename of a sibling `.part` file, and only one writer
// per destination owns that part file at a time.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, Weak};

use sha1::Sha1;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tokio::sync::OwnedMutexGuard;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};

const HASH_BUFFER: usize = 64 * 1024;

/// Digest family, inferred from the length of the expected hex digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    pub fn for_digest(hex_digest: &str) -> Self {
        if hex_digest.len() == 64 {
            HashAlgorithm::Sha256
        } else {
            HashAlgorithm::Sha1
        }
    }
}

/// Result of checking an artifact already on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Missing,
    Valid,
    Mismatch { actual: String },
}

type WriterLocks = Mutex<HashMap<PathBuf, Weak<tokio::sync::Mutex<()>>>>;

fn writer_locks() -> &'static WriterLocks {
    static LOCKS: OnceLock<WriterLocks> = OnceLock::new();
    LOCKS.get_or_init(Default::default)
}

/// Stateless helpers; the store is the directory tree itself.
pub struct ArtifactStore;

impl ArtifactStore {
    /// Exclusive right to write `dest` and its part file within this
    /// process. Concurrent batches asking for the same artifact queue here
    /// and the later one finds the committed file.
    pub async fn lock(dest: &Path) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = writer_locks()
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            table.retain(|_, held| held.strong_count() > 0);
            match table.get(dest).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(tokio::sync::Mutex::new(()));
                    table.insert(dest.to_path_buf(), Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }

    /// `<dest>.part`, next to the final file so the rename stays on one filesystem.
    pub fn part_path(dest: &Path) -> PathBuf {
        let mut name = dest
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".part");
        dest.with_file_name(name)
    }

    /// Stream the file through the digest named by `expected` and compare.
    pub async fn verify(path: &Path, expected: &str) -> LauncherResult<Verification> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Ok(Verification::Missing);
        }
        let actual = Self::hash_file(path, HashAlgorithm::for_digest(expected)).await?;
        if actual.eq_ignore_ascii_case(expected) {
            Ok(Verification::Valid)
        } else {
            Ok(Verification::Mismatch { actual })
        }
    }

    pub async fn hash_file(path: &Path, algorithm: HashAlgorithm) -> LauncherResult<String> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|source| LauncherError::io(path, source))?;
        let mut buf = vec![0_u8; HASH_BUFFER];

        match algorithm {
            HashAlgorithm::Sha1 => {
                let mut hasher = Sha1::new();
                loop {
                    let n = file
                        .read(&mut buf)
                        .await
                        .map_err(|source| LauncherError::io(path, source))?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buf[..n]);
                }
                Ok(hex::encode(hasher.finalize()))
            }
            HashAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                loop {
                    let n = file
                        .read(&mut buf)
                        .await
                        .map_err(|source| LauncherError::io(path, source))?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buf[..n]);
                }
                Ok(hex::encode(hasher.finalize()))
            }
        }
    }

    /// Cheap steady-state check: the file exists and has exactly `size` bytes.
    pub async fn size_matches(path: &Path, size: u64) -> bool {
        match tokio::fs::metadata(path).await {
            Ok(meta) => meta.is_file() && meta.len() == size,
            Err(_) => false,
        }
    }

    /// Current length of a file, 0 when absent.
    pub async fn file_len(path: &Path) -> u64 {
        tokio::fs::metadata(path)
            .await
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Atomically publish a finished part file under its final name.
    ///
    /// A part file that is already gone while `dest` exists means another
    /// writer published the same artifact first; the caller verifies `dest`.
    pub async fn commit(part: &Path, dest: &Path) -> LauncherResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| LauncherError::io(parent, source))?;
        }
        match tokio::fs::rename(part, dest).await {
            Ok(()) => Ok(()),
            Err(err)
                if err.kind() == std::io::ErrorKind::NotFound
                    && tokio::fs::try_exists(dest).await.unwrap_or(false) =>
            {
                debug!("{:?} was published by another writer", dest);
                Ok(())
            }
            Err(source) => Err(LauncherError::io(dest, source)),
        }
    }

    /// Delete a file, ignoring "not found".
    pub async fn discard(path: &Path) -> LauncherResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LauncherError::io(path, source)),
        }
    }
}

/// `objects/<hash[0:2]>/<hash>`
pub fn asset_object_path(objects_dir: &Path, hash: &str) -> PathBuf {
    let prefix = hash.get(..2).unwrap_or(hash);
    objects_dir.join(prefix).join(hash)
}
