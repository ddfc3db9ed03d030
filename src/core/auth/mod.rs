use serde::{Deserialize, Serialize};

const NIL_UUID: &str = "00000000-0000-0000-0000-000000000000";
const OFFLINE_TOKEN: &str = "offline_access_token";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountMode {
    Offline,
    Microsoft,
}

/// Authentication profile handed to the orchestrator by the account layer.
/// The engine never talks to an auth service; it only forwards these values
/// to the game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchAccountProfile {
    pub mode: AccountMode,
    pub username: String,
    pub uuid: String,
    pub access_token: String,
    /// `legacy` for offline accounts, `msa` for Microsoft accounts.
    pub user_type: String,
}

impl Default for LaunchAccountProfile {
    fn default() -> Self {
        Self::offline("Player")
    }
}

impl LaunchAccountProfile {
    pub fn offline(username: &str) -> Self {
        Self {
            mode: AccountMode::Offline,
            username: username.trim().to_string(),
            uuid: NIL_UUID.into(),
            access_token: OFFLINE_TOKEN.into(),
            user_type: "legacy".into(),
        }
    }

    pub fn is_offline(&self) -> bool {
        self.mode == AccountMode::Offline
    }

    /// Fill blank fields so no game argument ends up empty.
    pub fn sanitized(mut self) -> Self {
        if self.username.trim().is_empty() {
            self.username = "Player".into();
        }
        if self.uuid.trim().is_empty() {
            self.uuid = NIL_UUID.into();
        }
        if self.access_token.trim().is_empty() {
            self.access_token = OFFLINE_TOKEN.into();
        }
        if self.user_type.trim().is_empty() {
            self.user_type = match self.mode {
                AccountMode::Offline => "legacy".into(),
                AccountMode::Microsoft => "msa".into(),
            };
        }
        self
    }
}
