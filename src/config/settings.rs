use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    pub portal: PortalConfig,
    #[serde(default)]
    pub endpoints: EndpointConfig,
    #[serde(default)]
    pub preferences: Preferences,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PortalConfig {
    /// Portal API base, e.g. https://portal.example.com/apis
    pub base_url: String,
    /// Bearer token; an empty token still attempts calls unauthenticated.
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_user_name")]
    pub user_name: String,
}

/// Ordered candidate routes, relative to the base URL. The portal's real
/// route names are not reliably known, so the fallback policy is data.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub note_routes: Vec<String>,
    pub upload_routes: Vec<String>,
    pub notes_read_route: String,
    pub tickets_route: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Preferences {
    /// Page size for the ticket-collection lookup; large enough to cover
    /// every ticket in one call.
    pub lookup_page_size: u32,
    pub lookup_timeout_secs: u64,
    pub note_timeout_secs: u64,
    pub upload_timeout_secs: u64,
}

fn default_user_name() -> String {
    "User".to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            note_routes: vec![
                "add-ticket-note".to_string(),
                "add-ticket-notes".to_string(),
                "ticket-notes".to_string(),
            ],
            upload_routes: vec![
                "upload-ticket-attachments".to_string(),
                "ticket-attachments".to_string(),
                "upload-attachments".to_string(),
                "add-ticket-files".to_string(),
                "ticket-files".to_string(),
                "upload-files".to_string(),
                // Note route as last resort; carries placeholder note fields.
                "add-ticket-note".to_string(),
            ],
            notes_read_route: "get-ticket-notes".to_string(),
            tickets_route: "tickets".to_string(),
        }
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            lookup_page_size: 1000,
            lookup_timeout_secs: 10,
            note_timeout_secs: 15,
            upload_timeout_secs: 30,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            anyhow::bail!("{}", crate::errors::PortalError::ConfigNotFound);
        }

        let config_str = std::fs::read_to_string(&config_path)
            .context("Failed to read config file")?;

        let settings: Settings = toml::from_str(&config_str).map_err(|e| {
            anyhow::anyhow!("{}", crate::errors::PortalError::ConfigInvalid(e.to_string()))
        })?;

        Ok(settings)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let config_str = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&config_path, config_str)
            .context("Failed to write config file")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&config_path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&config_path, perms)?;
        }

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn config_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .context("HOME environment variable not set")?;
        Ok(PathBuf::from(home).join(".deskflow"))
    }

    /// Location of the persisted local-comment map.
    pub fn store_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("local_comments.json"))
    }
}
