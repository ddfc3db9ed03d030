// ─── Rule Evaluation ───
// Platform gating shared by libraries and conditional launch arguments.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    pub action: RuleAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<OsRule>,
    /// Launcher feature flags (demo user, custom resolution, quick play...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<HashMap<String, bool>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Disallow,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OsRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// The host as the version metadata names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    /// `windows`, `osx` or `linux`.
    pub os: &'static str,
    /// `x86`, `x86_64` or `arm64`.
    pub arch: &'static str,
}

impl Platform {
    pub fn current() -> Self {
        Self {
            os: current_os_name(),
            arch: current_arch_name(),
        }
    }

    /// Value substituted for `${arch}` in legacy native classifiers.
    pub fn pointer_width(&self) -> &'static str {
        if self.arch == "x86" {
            "32"
        } else {
            "64"
        }
    }
}

impl Rule {
    fn applies(&self, platform: &Platform) -> bool {
        // No feature flag is ever enabled by this launcher.
        if self
            .features
            .as_ref()
            .is_some_and(|features| features.values().any(|enabled| *enabled))
        {
            return false;
        }

        match &self.os {
            None => true,
            Some(os) => {
                let name_matches = os.name.as_deref().map_or(true, |n| n == platform.os);
                let arch_matches = os.arch.as_deref().map_or(true, |a| a == platform.arch);
                name_matches && arch_matches
            }
        }
    }
}

/// Allowed when at least one allow rule applies and no disallow rule does.
/// An empty rule list allows everything.
pub fn rules_allow(rules: &[Rule], platform: &Platform) -> bool {
    if rules.is_empty() {
        return true;
    }

    let mut allowed = false;
    for rule in rules.iter().filter(|r| r.applies(platform)) {
        match rule.action {
            RuleAction::Allow => allowed = true,
            RuleAction::Disallow => return false,
        }
    }
    allowed
}

/// Get the Mojang OS name for the current platform.
pub fn current_os_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "osx"
    } else {
        "linux"
    }
}

fn current_arch_name() -> &'static str {
    if cfg!(target_arch = "x86") {
        "x86"
    } else if cfg!(target_arch = "aarch64") {
        "arm64"
    } else {
        "x86_64"
    }
}
