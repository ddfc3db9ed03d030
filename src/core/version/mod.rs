pub mod manifest;
pub mod resolver;
pub mod rules;
pub mod version_file;

pub use manifest::{VersionEntry, VersionManifest, VERSION_MANIFEST_URL};
pub use resolver::{
    merge_descriptors, CachedVersionSource, LocalOverrideSource, RemoteManifestSource,
    StaticVersionSource, VersionResolver, VersionSource,
};
pub use rules::{current_os_name, rules_allow, OsRule, Platform, Rule, RuleAction};
pub use version_file::{
    ArgumentValue, Arguments, AssetIndexInfo, DownloadArtifact, JavaVersionInfo,
    LibDownloadArtifact, Library, LibraryDownloads, OneOrMany, ResolvedArtifact,
    VersionDescriptor, VersionDownloads,
};
