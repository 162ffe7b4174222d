use serde::Deserialize;

pub const DEFAULT_KEYCHAIN_SERVICE: &str = "cf-apps";
pub const DEFAULT_KEYCHAIN_ACCOUNT: &str = "credentials";
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Client settings. Every field is optional in the source document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub keychain_service: String,
    pub keychain_account: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            keychain_service: DEFAULT_KEYCHAIN_SERVICE.to_string(),
            keychain_account: DEFAULT_KEYCHAIN_ACCOUNT.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            user_agent: format!("CFApps/{} (Rust)", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
