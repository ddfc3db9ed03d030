use std::path::PathBuf;

use tracing::debug;

use super::context::InstanceConfig;
use crate::core::state::LauncherPaths;

const INSTANCE_CONFIG_FILE: &str = "instance.json";

/// Which rule picked the game directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameDirSource {
    ExternalVersion,
    Instance,
    VersionWithContent,
    SharedBase,
}

/// Working directory for the game process, by fixed precedence:
/// external-path flag, instance-local config, mods/config inside the
/// shared version folder, then the shared base directory.
pub fn resolve_game_dir(paths: &LauncherPaths, instance: &InstanceConfig) -> (GameDirSource, PathBuf) {
    let version_dir = paths.version_dir(&instance.version_id);

    let (source, dir) = if instance.external_path {
        (GameDirSource::ExternalVersion, version_dir)
    } else if !instance.id.is_empty()
        && paths
            .instance_dir(&instance.id)
            .join(INSTANCE_CONFIG_FILE)
            .is_file()
    {
        (GameDirSource::Instance, paths.instance_dir(&instance.id))
    } else if version_dir.join("mods").is_dir() || version_dir.join("config").is_dir() {
        (GameDirSource::VersionWithContent, version_dir)
    } else {
        (GameDirSource::SharedBase, paths.base_dir().to_path_buf())
    };

    debug!("Game directory {:?} ({:?})", dir, source);
    (source, dir)
}
