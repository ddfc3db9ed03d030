// ─── Java Detection ───
// Probing java binaries, locating them inside runtime folders and mapping
// game versions to the runtime major they need.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// A java binary that answered a version query.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct JavaInstallation {
    pub path: PathBuf,
    pub version: String,
    pub major: u32,
    pub is_64bit: bool,
}

pub fn java_exe() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

/// Run `<path> -XshowSettings:properties -version` and parse what it prints.
pub async fn probe_java(path: &Path) -> Option<JavaInstallation> {
    let mut command = tokio::process::Command::new(path);
    command
        .args(["-XshowSettings:properties", "-version"])
        .stdin(std::process::Stdio::null())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(PROBE_TIMEOUT, command.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            debug!("Probing {:?} failed: {}", path, err);
            return None;
        }
        Err(_) => {
            debug!("Probing {:?} timed out", path);
            return None;
        }
    };

    let version_output = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stderr),
        String::from_utf8_lossy(&output.stdout)
    );
    parse_probe_output(path, &version_output)
}

fn parse_probe_output(path: &Path, version_output: &str) -> Option<JavaInstallation> {
    debug!(
        "Probing {:?}: {}",
        path,
        version_output.lines().find(|l| l.contains("version")).unwrap_or("")
    );

    let version = parse_version_string(version_output)?;
    let major = parse_major_version(&version);
    let lower = version_output.to_ascii_lowercase();
    let is_64bit = lower.contains("sun.arch.data.model = 64")
        || lower.contains("os.arch = amd64")
        || lower.contains("os.arch = x86_64")
        || lower.contains("os.arch = aarch64")
        || lower.contains("64-bit");

    Some(JavaInstallation {
        path: path.to_path_buf(),
        version,
        major,
        is_64bit,
    })
}

/// First quoted token of the `java -version` banner.
fn parse_version_string(output: &str) -> Option<String> {
    output
        .lines()
        .filter(|line| line.contains("version"))
        .find_map(|line| {
            let start = line.find('"')?;
            let end = line[start + 1..].find('"')?;
            Some(line[start + 1..start + 1 + end].to_string())
        })
}

/// `1.8.0_392` → 8, `17.0.8` → 17, `21` → 21.
pub fn parse_major_version(version: &str) -> u32 {
    let mut parts = version
        .split(|c: char| c == '.' || c == '_' || c == '-' || c == '+')
        .map(|p| p.parse::<u32>().ok());
    match parts.next().flatten() {
        Some(1) => parts.next().flatten().unwrap_or(1),
        Some(major) => major,
        None => 0,
    }
}

/// Look for `bin/java` directly under `root` or one directory down,
/// including the macOS `Contents/Home` bundle layout.
pub fn locate_java_binary(root: &Path) -> Option<PathBuf> {
    let direct = [
        root.join("bin").join(java_exe()),
        root.join("Contents").join("Home").join("bin").join(java_exe()),
    ];
    if let Some(found) = direct.into_iter().find(|p| p.is_file()) {
        return Some(found);
    }

    let mut nested: Vec<PathBuf> = std::fs::read_dir(root)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    nested.sort();

    nested.into_iter().find_map(|dir| {
        [
            dir.join("bin").join(java_exe()),
            dir.join("Contents").join("Home").join("bin").join(java_exe()),
        ]
        .into_iter()
        .find(|p| p.is_file())
    })
}

/// Places a system-wide java might live, most specific first. The bare
/// command (resolved through `PATH`) comes first.
pub fn system_java_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(java_exe())];

    if let Some(home) = std::env::var_os("JAVA_HOME").filter(|v| !v.is_empty()) {
        candidates.push(PathBuf::from(home).join("bin").join(java_exe()));
    }

    let roots: &[&str] = if cfg!(windows) {
        &[
            r"C:\Program Files\Java",
            r"C:\Program Files\Eclipse Adoptium",
            r"C:\Program Files\Microsoft",
            r"C:\Program Files\Zulu",
        ]
    } else if cfg!(target_os = "macos") {
        &["/Library/Java/JavaVirtualMachines"]
    } else {
        &["/usr/lib/jvm", "/usr/java", "/opt/java", "/opt/jdk"]
    };

    for root in roots {
        let Ok(entries) = std::fs::read_dir(root) else {
            continue;
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        dirs.sort();
        for dir in dirs {
            if let Some(java) = locate_java_binary(&dir) {
                candidates.push(java);
            }
        }
    }

    candidates.dedup();
    candidates
}

// ─── Version heuristics ───

/// Runtime major a game version needs when its metadata does not say.
///
/// `< 1.17` → 8, `1.17.x` → 16, `1.18`–`1.20.4` → 17, `≥ 1.20.5` → 21.
/// Weekly snapshots map by year (`24w`+ → 21, `21w`–`23w` → 17). Anything
/// unrecognised gets the oldest supported runtime.
pub fn required_java_for_minecraft_version(minecraft_version: &str) -> u32 {
    let lower = minecraft_version.to_ascii_lowercase();

    for token in lower.split(|c: char| c == '-' || c == '+' || c == '_' || c == ' ') {
        if let Some(year) = snapshot_year(token) {
            return match year {
                24.. => 21,
                21..=23 => 17,
                _ => 8,
            };
        }
        if let Some((minor, patch)) = release_numbers(token) {
            return match (minor, patch) {
                (21.., _) | (20, 5..) => 21,
                (18..=20, _) => 17,
                (17, _) => 16,
                _ => 8,
            };
        }
    }
    8
}

/// `24w14a` → 24.
fn snapshot_year(token: &str) -> Option<u32> {
    let bytes = token.as_bytes();
    if bytes.len() < 5 || bytes[2] != b'w' {
        return None;
    }
    if !bytes[..2].iter().chain(&bytes[3..5]).all(u8::is_ascii_digit) {
        return None;
    }
    token[..2].parse().ok()
}

/// `1.20.4` → (20, 4), `1.8` → (8, 0).
fn release_numbers(token: &str) -> Option<(u32, u32)> {
    let mut parts = token.split('.');
    if parts.next()? != "1" {
        return None;
    }
    let minor = parts.next()?.parse::<u32>().ok()?;
    let patch = parts
        .next()
        .map(|p| {
            p.chars()
                .take_while(char::is_ascii_digit)
                .collect::<String>()
                .parse::<u32>()
                .unwrap_or(0)
        })
        .unwrap_or(0);
    Some((minor, patch))
}
