//! Configuration loading for Slackbot.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::commands::{remind, shorten, yesno, RearmPolicy};
use crate::error::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Get the Slackbot home directory (~/.slackbot).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".slackbot"))
}

/// Get the settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from ~/.slackbot/settings.json
pub fn load_settings() -> Result<Settings> {
    load_settings_from(&get_settings_path()?)
}

/// Load and validate settings from a specific file.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "Settings file not found at {}. Run 'slackbot setup' first.",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let settings: Settings = serde_json::from_str(&content)?;
    validate_settings(&settings)?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Load settings or return default if not found.
pub fn load_settings_or_default() -> Settings {
    load_settings().unwrap_or_else(|e| {
        tracing::warn!("Failed to load settings: {}, using defaults", e);
        Settings::default()
    })
}

/// Write settings, creating the parent directory.
pub fn save_settings_to(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(settings)?)?;
    Ok(())
}

fn validate_settings(settings: &Settings) -> Result<()> {
    for (name, endpoint) in [
        ("services.yesno.endpoint", &settings.services.yesno.endpoint),
        ("services.shortener.endpoint", &settings.services.shortener.endpoint),
    ] {
        if !endpoint.starts_with("https://") {
            return Err(Error::Config(format!("{} must be an https URL, got '{}'", name, endpoint)));
        }
    }

    if settings.reminders.title.trim().is_empty() {
        return Err(Error::Config("reminders.title must not be empty".to_string()));
    }
    Ok(())
}

/// Yes/no oracle configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct YesNoService {
    #[serde(default = "default_yesno_endpoint")]
    pub endpoint: String,
}

fn default_yesno_endpoint() -> String {
    yesno::DEFAULT_ENDPOINT.to_string()
}

impl Default for YesNoService {
    fn default() -> Self {
        Self {
            endpoint: default_yesno_endpoint(),
        }
    }
}

/// URL shortener configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ShortenerService {
    #[serde(default = "default_shortener_endpoint")]
    pub endpoint: String,
    pub api_key: Option<String>,
}

fn default_shortener_endpoint() -> String {
    shorten::DEFAULT_ENDPOINT.to_string()
}

impl Default for ShortenerService {
    fn default() -> Self {
        Self {
            endpoint: default_shortener_endpoint(),
            api_key: None,
        }
    }
}

/// Command back-ends.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Services {
    #[serde(default)]
    pub yesno: YesNoService,
    #[serde(default)]
    pub shortener: ShortenerService,
}

/// Reminder configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Reminders {
    #[serde(default = "default_reminder_title")]
    pub title: String,
    #[serde(default)]
    pub rearm: RearmPolicy,
}

fn default_reminder_title() -> String {
    remind::DEFAULT_TITLE.to_string()
}

impl Default for Reminders {
    fn default() -> Self {
        Self {
            title: default_reminder_title(),
            rearm: RearmPolicy::default(),
        }
    }
}

/// Notification configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Notifications {
    #[serde(default = "default_notifications_enabled")]
    pub enabled: bool,
    pub icon: Option<String>,
}

fn default_notifications_enabled() -> bool {
    true
}

impl Default for Notifications {
    fn default() -> Self {
        Self {
            enabled: default_notifications_enabled(),
            icon: None,
        }
    }
}

/// Feed storage configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct FeedSettings {
    /// Defaults to ~/.slackbot/data.
    pub data_dir: Option<PathBuf>,
}

/// Slackbot settings.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    pub services: Services,

    #[serde(default)]
    pub reminders: Reminders,

    #[serde(default)]
    pub notifications: Notifications,

    #[serde(default)]
    pub feed: FeedSettings,
}

impl Settings {
    /// Directory the file feed lives in.
    pub fn data_dir(&self) -> Result<PathBuf> {
        match &self.feed.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(get_home_dir()?.join("data")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let settings: Settings = serde_json::from_str("{}").unwrap();

        assert_eq!(settings.services.yesno.endpoint, yesno::DEFAULT_ENDPOINT);
        assert_eq!(settings.services.shortener.api_key, None);
        assert_eq!(settings.reminders.title, "Bot Reminder");
        assert_eq!(settings.reminders.rearm, RearmPolicy::EveryPresentation);
        assert!(settings.notifications.enabled);
    }

    #[test]
    fn test_rearm_policy_from_json() {
        let settings: Settings =
            serde_json::from_str(r#"{"reminders": {"rearm": "once_per_message"}}"#).unwrap();
        assert_eq!(settings.reminders.rearm, RearmPolicy::OncePerMessage);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested/settings.json");

        let mut settings = Settings::default();
        settings.services.shortener.api_key = Some("key".to_string());
        settings.feed.data_dir = Some(temp_dir.path().join("data"));
        save_settings_to(&settings, &path).unwrap();

        let loaded = load_settings_from(&path).unwrap();
        assert_eq!(loaded.services.shortener.api_key.as_deref(), Some("key"));
        assert_eq!(loaded.data_dir().unwrap(), temp_dir.path().join("data"));
    }

    #[test]
    fn test_rejects_plain_http_endpoint() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("settings.json");

        let mut settings = Settings::default();
        settings.services.yesno.endpoint = "http://yesno.wtf/api".to_string();
        save_settings_to(&settings, &path).unwrap();

        assert!(matches!(load_settings_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = load_settings_from(&temp_dir.path().join("absent.json"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
