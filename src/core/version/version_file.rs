// ─── Version File ───
// Typed model of a version JSON: libraries, downloads, asset index and the
// (possibly rule-gated) argument lists.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::rules::{rules_allow, Platform, Rule};
use crate::core::maven::{MavenArtifact, MOJANG_LIBRARIES};

/// A version descriptor, either raw from a source or merged along its
/// inheritance chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherits_from: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub version_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,
    #[serde(default)]
    pub libraries: Vec<Library>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<VersionDownloads>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_index: Option<AssetIndexInfo>,
    /// Legacy asset index id when `assetIndex` is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,
    #[serde(default)]
    pub arguments: Arguments,
    /// Legacy `minecraftArguments` field (pre-1.13).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minecraft_arguments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java_version: Option<JavaVersionInfo>,
    /// Version whose client jar this descriptor runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jar: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JavaVersionInfo {
    pub major_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VersionDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<DownloadArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<DownloadArtifact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: u64,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetIndexInfo {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub total_size: u64,
}

// ─── Arguments ───

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Arguments {
    #[serde(default)]
    pub game: Vec<ArgumentValue>,
    #[serde(default)]
    pub jvm: Vec<ArgumentValue>,
}

/// One entry of `arguments.game` / `arguments.jvm`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ArgumentValue {
    Plain(String),
    Conditional { rules: Vec<Rule>, value: OneOrMany },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl ArgumentValue {
    /// Tokens contributed on `platform`, empty when the rules exclude it.
    pub fn tokens(&self, platform: &Platform) -> Vec<String> {
        match self {
            ArgumentValue::Plain(arg) => vec![arg.clone()],
            ArgumentValue::Conditional { rules, value } => {
                if !rules_allow(rules, platform) {
                    return Vec::new();
                }
                match value {
                    OneOrMany::One(arg) => vec![arg.clone()],
                    OneOrMany::Many(args) => args.clone(),
                }
            }
        }
    }
}

// ─── Libraries ───

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads: Option<LibraryDownloads>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<Rule>>,
    /// Legacy native classifier per OS name, may contain `${arch}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub natives: Option<HashMap<String, String>>,
    /// Maven repository base for coordinate-only libraries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryDownloads {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<LibDownloadArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classifiers: Option<HashMap<String, LibDownloadArtifact>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibDownloadArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1: Option<String>,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub url: String,
}

/// A library file with its location settled: relative path under the
/// libraries directory plus where to fetch it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub path: String,
    /// Empty when the file is produced locally (installer output).
    pub url: String,
    pub sha1: Option<String>,
    pub size: u64,
}

impl Library {
    pub fn coordinate(name: &str) -> Self {
        Self {
            name: name.to_string(),
            downloads: None,
            rules: None,
            natives: None,
            url: None,
        }
    }

    /// `group:artifact[:classifier]`, or the raw name when it is not a
    /// Maven coordinate.
    pub fn dedup_key(&self) -> String {
        MavenArtifact::parse(&self.name)
            .map(|a| a.dedup_key())
            .unwrap_or_else(|_| self.name.clone())
    }

    pub fn is_allowed(&self, platform: &Platform) -> bool {
        self.rules
            .as_deref()
            .map_or(true, |rules| rules_allow(rules, platform))
    }

    /// Legacy native classifier for `platform`, with `${arch}` expanded.
    pub fn native_classifier(&self, platform: &Platform) -> Option<String> {
        self.natives
            .as_ref()?
            .get(platform.os)
            .map(|c| c.replace("${arch}", platform.pointer_width()))
    }

    /// Main jar of the library. `None` for native-only entries that only
    /// publish classifiers.
    pub fn main_artifact(&self) -> Option<ResolvedArtifact> {
        match &self.downloads {
            Some(downloads) => match &downloads.artifact {
                Some(artifact) => Some(self.from_download(artifact, None)),
                None if downloads.classifiers.is_some() => None,
                None => self.synthesize(None),
            },
            None => self.synthesize(None),
        }
    }

    /// Native jar for `classifier`, from `downloads.classifiers` or by
    /// coordinate.
    pub fn native_artifact(&self, classifier: &str) -> Option<ResolvedArtifact> {
        let listed = self
            .downloads
            .as_ref()
            .and_then(|d| d.classifiers.as_ref())
            .and_then(|c| c.get(classifier));
        match listed {
            Some(artifact) => Some(self.from_download(artifact, Some(classifier))),
            None => self.synthesize(Some(classifier)),
        }
    }

    fn from_download(
        &self,
        artifact: &LibDownloadArtifact,
        classifier: Option<&str>,
    ) -> ResolvedArtifact {
        let path = artifact.path.clone().or_else(|| {
            MavenArtifact::parse(&self.name).ok().map(|a| {
                let a = match classifier {
                    Some(c) => a.with_classifier(c),
                    None => a,
                };
                a.local_path().to_string_lossy().replace('\\', "/")
            })
        });
        ResolvedArtifact {
            path: path.unwrap_or_else(|| self.name.replace(':', "/")),
            url: artifact.url.clone(),
            sha1: artifact.sha1.clone(),
            size: artifact.size,
        }
    }

    fn synthesize(&self, classifier: Option<&str>) -> Option<ResolvedArtifact> {
        let mut artifact = MavenArtifact::parse(&self.name).ok()?;
        if let Some(c) = classifier {
            artifact = artifact.with_classifier(c);
        }
        let repo = self
            .url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or(MOJANG_LIBRARIES);
        Some(ResolvedArtifact {
            path: artifact.local_path().to_string_lossy().replace('\\', "/"),
            url: artifact.url(repo),
            sha1: None,
            size: 0,
        })
    }
}

// ─── Descriptor helpers ───

impl VersionDescriptor {
    /// Game arguments for `platform`. Falls back to the legacy
    /// space-separated field.
    pub fn game_arguments(&self, platform: &Platform) -> Vec<String> {
        if !self.arguments.game.is_empty() {
            return self
                .arguments
                .game
                .iter()
                .flat_map(|a| a.tokens(platform))
                .collect();
        }
        self.minecraft_arguments
            .as_deref()
            .map(|s| s.split_whitespace().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    pub fn jvm_arguments(&self, platform: &Platform) -> Vec<String> {
        self.arguments
            .jvm
            .iter()
            .flat_map(|a| a.tokens(platform))
            .collect()
    }

    pub fn required_java_major(&self) -> Option<u32> {
        self.java_version.as_ref().map(|j| j.major_version)
    }

    pub fn client_download(&self) -> Option<&DownloadArtifact> {
        self.downloads.as_ref()?.client.as_ref()
    }

    /// Id of the version folder holding the client jar.
    pub fn jar_id(&self) -> &str {
        self.jar.as_deref().unwrap_or(&self.id)
    }

    /// Asset index id, `legacy` when the descriptor names none.
    pub fn asset_index_id(&self) -> &str {
        self.asset_index
            .as_ref()
            .map(|a| a.id.as_str())
            .or(self.assets.as_deref())
            .unwrap_or("legacy")
    }

    pub fn version_type(&self) -> &str {
        self.version_type.as_deref().unwrap_or("release")
    }
}
