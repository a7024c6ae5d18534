use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

use crate::i18n::LanguageCode;

/// Locally registered user. There is no server-side identity; the profile
/// lives only in the config file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub name: String,
    pub phone: String,
    pub passcode: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub language: Option<String>,
    pub profile: Option<UserProfile>,

    /// POST endpoint of the analysis edge function.
    pub analyze_endpoint: Option<String>,

    // Blob storage for crop images (Supabase-style object store).
    pub storage_url: Option<String>,
    pub storage_bucket: Option<String>,
    pub storage_api_key: Option<String>,

    // Cloud speech adapters. Absent values mean the capability is
    // unavailable and voice features degrade silently.
    pub stt_endpoint: Option<String>,
    pub stt_api_key: Option<String>,
    pub tts_endpoint: Option<String>,
    pub tts_api_key: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// The persisted language choice, defaulting to English when absent
    /// or unrecognized.
    pub fn language_code(&self) -> LanguageCode {
        self.language
            .as_deref()
            .and_then(LanguageCode::from_code)
            .unwrap_or(LanguageCode::En)
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("kisan-mitra").join("config.json"))
    }
}
