// ─── Runtime Archives ───
// Blocking extraction helpers; callers run them on the blocking pool.

use std::fs::File;
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;

use crate::core::error::{LauncherError, LauncherResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveKind {
    Zip,
    TarGz,
}

impl ArchiveKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::TarGz => "tar.gz",
        }
    }
}

/// Unpack `archive` into `dest`, which is recreated from scratch.
pub fn extract_archive(kind: ArchiveKind, archive: &Path, dest: &Path) -> LauncherResult<()> {
    if dest.exists() {
        std::fs::remove_dir_all(dest).map_err(|source| LauncherError::io(dest, source))?;
    }
    std::fs::create_dir_all(dest).map_err(|source| LauncherError::io(dest, source))?;

    match kind {
        ArchiveKind::Zip => extract_zip(archive, dest),
        ArchiveKind::TarGz => extract_tar_gz(archive, dest),
    }
}

fn extract_zip(zip_path: &Path, dest: &Path) -> LauncherResult<()> {
    let file = File::open(zip_path).map_err(|source| LauncherError::io(zip_path, source))?;
    let mut archive = zip::ZipArchive::new(file)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(enclosed) = entry.enclosed_name() else {
            return Err(LauncherError::Other(format!(
                "Invalid zip entry path: {}",
                entry.name()
            )));
        };
        let rel: PathBuf = enclosed
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part),
                _ => None,
            })
            .collect();
        if rel.as_os_str().is_empty() {
            continue;
        }

        let out_path = dest.join(rel);
        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)
                .map_err(|source| LauncherError::io(&out_path, source))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LauncherError::io(parent, source))?;
        }
        let mut out =
            File::create(&out_path).map_err(|source| LauncherError::io(&out_path, source))?;
        std::io::copy(&mut entry, &mut out)
            .map_err(|source| LauncherError::io(&out_path, source))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode));
        }
    }
    Ok(())
}

fn extract_tar_gz(archive_path: &Path, dest: &Path) -> LauncherResult<()> {
    let file =
        File::open(archive_path).map_err(|source| LauncherError::io(archive_path, source))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);

    let entries = archive
        .entries()
        .map_err(|source| LauncherError::io(archive_path, source))?;
    for entry in entries {
        let mut entry = entry.map_err(|source| LauncherError::io(archive_path, source))?;
        // unpack_in refuses entries escaping `dest`.
        entry
            .unpack_in(dest)
            .map_err(|source| LauncherError::io(dest, source))?;
    }
    Ok(())
}

/// Mark the java launcher executable (archives built on Windows lose the bit).
pub fn ensure_executable(path: &Path) -> LauncherResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(path)
            .map_err(|source| LauncherError::io(path, source))?
            .permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms).map_err(|source| LauncherError::io(path, source))?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn tar_gz_is_unpacked_with_its_top_level_folder() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("jre.tar.gz");
        {
            let file = File::create(&archive).unwrap();
            let encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(encoder);
            let body = b"#!/bin/sh\necho hi\n";
            let mut header = tar::Header::new_gnu();
            header.set_size(body.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, "jdk-17.0.8+7-jre/bin/java", &body[..])
                .unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let dest = temp.path().join("java17");
        extract_archive(ArchiveKind::TarGz, &archive, &dest).unwrap();
        let java = dest.join("jdk-17.0.8+7-jre").join("bin").join("java");
        assert!(java.is_file());
        ensure_executable(&java).unwrap();
    }

    #[test]
    fn zip_is_unpacked_and_previous_content_removed() {
        let temp = tempfile::tempdir().unwrap();
        let archive = temp.path().join("jre.zip");
        {
            let file = File::create(&archive).unwrap();
            let mut writer = zip::ZipWriter::new(file);
            let options = zip::write::SimpleFileOptions::default();
            writer.add_directory("jdk-21-jre/bin/", options).unwrap();
            writer.start_file("jdk-21-jre/bin/java.exe", options).unwrap();
            writer.write_all(b"MZ").unwrap();
            writer.finish().unwrap();
        }

        let dest = temp.path().join("java21");
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("stale.txt"), b"old").unwrap();

        extract_archive(ArchiveKind::Zip, &archive, &dest).unwrap();
        assert!(dest.join("jdk-21-jre").join("bin").join("java.exe").is_file());
        assert!(!dest.join("stale.txt").exists());
    }
}
