//! Configuration management
//!
//! Settings live in `<data dir>/settings.json`:
//! ```json
//! {
//!   "app": { "operator": "admin@example.com" },
//!   "invitations": { "relayUrl": null, "relayToken": null, "claimBaseUrl": "https://guincoin.local/claim" },
//!   "server": { "bind": "127.0.0.1:8080" },
//!   "importProfiles": { "profiles": { ... } }
//! }
//! ```
//! Keys this crate does not manage are preserved on save.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::result::Error;
use crate::domain::ColumnMapping;

pub const DEFAULT_CLAIM_BASE_URL: &str = "https://guincoin.local/claim";
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_OPERATOR: &str = "admin";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    app: AppSettings,
    #[serde(default)]
    invitations: InvitationSettings,
    #[serde(default)]
    server: ServerSettings,
    #[serde(default)]
    import_profiles: ImportProfilesContainer,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppSettings {
    #[serde(default)]
    operator: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvitationSettings {
    #[serde(default)]
    relay_url: Option<String>,
    #[serde(default)]
    relay_token: Option<String>,
    #[serde(default)]
    claim_base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerSettings {
    #[serde(default)]
    bind: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportProfilesContainer {
    #[serde(default)]
    profiles: HashMap<String, ColumnMapping>,
}

/// Guincoin configuration (simplified view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    /// Fallback identity recorded as job creator
    pub operator: String,
    /// Mail relay endpoint; invitations go to the outbox table when unset
    pub relay_url: Option<String>,
    pub relay_token: Option<String>,
    pub claim_base_url: String,
    pub bind: String,
    /// Saved column mappings by profile name
    pub import_profiles: HashMap<String, ColumnMapping>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            operator: DEFAULT_OPERATOR.to_string(),
            relay_url: None,
            relay_token: None,
            claim_base_url: DEFAULT_CLAIM_BASE_URL.to_string(),
            bind: DEFAULT_BIND.to_string(),
            import_profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// Environment overrides:
    /// - GUINCOIN_MAIL_RELAY_URL replaces `invitations.relayUrl`
    /// - GUINCOIN_BIND replaces `server.bind`
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content).map_err(|e| {
                Error::Config(format!("{} is not valid: {}", settings_path.display(), e))
            })?
        } else {
            SettingsFile::default()
        };

        let relay_url = std::env::var("GUINCOIN_MAIL_RELAY_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or(raw.invitations.relay_url);
        let bind = std::env::var("GUINCOIN_BIND")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or(raw.server.bind)
            .unwrap_or_else(|| DEFAULT_BIND.to_string());

        let config = Self {
            operator: raw
                .app
                .operator
                .unwrap_or_else(|| DEFAULT_OPERATOR.to_string()),
            relay_url,
            relay_token: raw.invitations.relay_token,
            claim_base_url: raw
                .invitations
                .claim_base_url
                .unwrap_or_else(|| DEFAULT_CLAIM_BASE_URL.to_string()),
            bind,
            import_profiles: raw.import_profiles.profiles,
        };
        config.validate()?;
        Ok(config)
    }

    /// Save config to the data directory
    /// Preserves other settings this crate doesn't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join("settings.json");

        // Load existing settings to preserve fields we don't manage
        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        settings.app.operator = Some(self.operator.clone());
        settings.invitations.relay_token = self.relay_token.clone();
        settings.invitations.claim_base_url = Some(self.claim_base_url.clone());
        settings.import_profiles.profiles = self.import_profiles.clone();

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    /// Claim link for a token
    pub fn claim_url(&self, token: &str) -> String {
        format!("{}?token={}", self.claim_base_url.trim_end_matches('/'), token)
    }

    fn validate(&self) -> Result<()> {
        Url::parse(&self.claim_base_url)
            .map_err(|e| Error::Config(format!("Invalid claimBaseUrl '{}': {}", self.claim_base_url, e)))?;
        if let Some(relay) = &self.relay_url {
            let parsed = Url::parse(relay)
                .map_err(|e| Error::Config(format!("Invalid mail relay URL '{}': {}", relay, e)))?;
            if parsed.scheme() != "https" && parsed.scheme() != "http" {
                return Err(Error::Config("Mail relay URL must use http or https".to_string()).into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BalanceColumns;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_settings_file() {
        let dir = tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.operator, DEFAULT_OPERATOR);
        assert_eq!(config.claim_base_url, DEFAULT_CLAIM_BASE_URL);
        assert!(config.import_profiles.is_empty());
    }

    #[test]
    fn test_save_preserves_unmanaged_keys() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"app":{"operator":"ops@corp.com","theme":"dark"},"games":{"jackpot":true}}"#,
        )
        .unwrap();

        let mut config = Config::load(dir.path()).unwrap();
        assert_eq!(config.operator, "ops@corp.com");

        config.import_profiles.insert(
            "payroll".to_string(),
            ColumnMapping {
                balances: BalanceColumns {
                    name: "Employee".to_string(),
                    amount: "Coins".to_string(),
                    email: None,
                    market: None,
                },
                emails: None,
            },
        );
        config.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("settings.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["app"]["theme"], "dark");
        assert_eq!(value["games"]["jackpot"], true);
        assert_eq!(
            value["importProfiles"]["profiles"]["payroll"]["balances"]["amount"],
            "Coins"
        );

        let reloaded = Config::load(dir.path()).unwrap();
        assert!(reloaded.import_profiles.contains_key("payroll"));
    }

    #[test]
    fn test_invalid_claim_url_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"invitations":{"claimBaseUrl":"not a url"}}"#,
        )
        .unwrap();
        assert!(Config::load(dir.path()).is_err());
    }

    #[test]
    fn test_claim_url() {
        let mut config = Config::default();
        config.claim_base_url = "https://coins.corp.com/claim/".to_string();
        assert_eq!(config.claim_url("abc123"), "https://coins.corp.com/claim?token=abc123");
    }
}
