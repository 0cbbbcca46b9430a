//! Persistent CLI settings: the site ID and API token.
//!
//! Settings live in a small TOML file under the user's config directory. The
//! store is re-read on every invocation; [`Credentials`] is the snapshot handed
//! to the transport client.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const APP_DIR: &str = "jirafe-cli";
const CONFIG_FILE: &str = "config.toml";

/// Keys understood by the settings store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    SiteId,
    ApiToken,
}

impl SettingKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SiteId => "siteId",
            Self::ApiToken => "apiToken",
        }
    }
}

/// Site ID and API token used to authenticate every request.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub site_id: String,
    pub api_token: String,
}

impl Credentials {
    pub fn new(site_id: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            site_id: site_id.into(),
            api_token: api_token.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.site_id.is_empty() && !self.api_token.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("site_id", &self.site_id)
            .field("api_token", &mask_token(&self.api_token))
            .finish()
    }
}

/// Mask a token for display: first four and last four characters only.
///
/// Tokens too short to hide anything are masked entirely.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.is_empty() {
        return String::new();
    }
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Durable key/value store for the two settings.
pub trait SettingsStore {
    fn get(&self, key: SettingKey) -> String;

    fn set(&mut self, key: SettingKey, value: &str) -> Result<()>;

    fn clear(&mut self) -> Result<()>;

    fn credentials(&self) -> Credentials {
        Credentials {
            site_id: self.get(SettingKey::SiteId),
            api_token: self.get(SettingKey::ApiToken),
        }
    }

    /// True iff both the site ID and API token are non-empty
    fn is_configured(&self) -> bool {
        self.credentials().is_complete()
    }
}

/// On-disk representation. Key names follow the service's camelCase naming.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SettingsFile {
    site_id: String,
    api_token: String,
}

impl SettingsFile {
    fn get(&self, key: SettingKey) -> &str {
        match key {
            SettingKey::SiteId => &self.site_id,
            SettingKey::ApiToken => &self.api_token,
        }
    }

    fn set(&mut self, key: SettingKey, value: &str) {
        let slot = match key {
            SettingKey::SiteId => &mut self.site_id,
            SettingKey::ApiToken => &mut self.api_token,
        };
        *slot = value.to_string();
    }
}

/// TOML-file backed settings store.
#[derive(Debug)]
pub struct FileSettings {
    path: PathBuf,
    values: SettingsFile,
}

impl FileSettings {
    /// Default location: `<config dir>/jirafe-cli/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().context("Could not determine config directory")?;
        Ok(dir.join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn load_default() -> Result<Self> {
        Self::load(Self::default_path()?)
    }

    /// Load settings from `path`. A missing file yields empty settings.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse settings in {}", path.display()))?
        } else {
            SettingsFile::default()
        };

        tracing::debug!("Loaded settings from {}", path.display());
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let contents =
            toml::to_string_pretty(&self.values).context("Failed to serialize settings")?;
        fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))?;
        Ok(())
    }
}

impl SettingsStore for FileSettings {
    fn get(&self, key: SettingKey) -> String {
        self.values.get(key).to_string()
    }

    fn set(&mut self, key: SettingKey, value: &str) -> Result<()> {
        self.values.set(key, value);
        self.save()?;
        tracing::debug!("Saved {} to {}", key.as_str(), self.path.display());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.values = SettingsFile::default();
        self.save()
    }
}

/// In-process store, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: SettingsFile,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: &Credentials) -> Self {
        Self {
            values: SettingsFile {
                site_id: credentials.site_id.clone(),
                api_token: credentials.api_token.clone(),
            },
        }
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: SettingKey) -> String {
        self.values.get(key).to_string()
    }

    fn set(&mut self, key: SettingKey, value: &str) -> Result<()> {
        self.values.set(key, value);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.values = SettingsFile::default();
        Ok(())
    }
}
