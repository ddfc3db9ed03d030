mod paths;
mod settings;

pub use paths::LauncherPaths;
pub use settings::{JvmPreset, LauncherSettings, ProxySettings, SkinProviderSettings};
