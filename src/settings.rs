//! Persisted user settings and API-key resolution.
//!
//! The only persisted value is the inference API key, stored as JSON at
//! `<config dir>/pdf2pptx/settings.json`. Unreadable or malformed files are
//! treated as empty settings.

use crate::error::Pdf2PptxError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variables checked for an API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GOOGLE_API_KEY", "GEMINI_API_KEY"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// `<config dir>/pdf2pptx/settings.json`, or `None` when the platform has
/// no configuration directory.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pdf2pptx").join("settings.json"))
}

impl Settings {
    /// Load from `path`; missing or malformed files yield defaults.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!("No settings at {}: {}", path.display(), e);
                return Self::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Ignoring malformed settings file {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Load from [`default_settings_path`].
    pub fn load_default() -> Self {
        default_settings_path()
            .map(|p| Self::load(&p))
            .unwrap_or_default()
    }

    /// Write to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), Pdf2PptxError> {
        let write_err = |source| Pdf2PptxError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Pdf2PptxError::Internal(format!("settings serialisation: {e}")))?;
        std::fs::write(path, json).map_err(write_err)?;
        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Write to [`default_settings_path`].
    pub fn save_default(&self) -> Result<PathBuf, Pdf2PptxError> {
        let path = default_settings_path().ok_or_else(|| {
            Pdf2PptxError::InvalidConfig("no configuration directory on this platform".into())
        })?;
        self.save(&path)?;
        Ok(path)
    }
}

/// First non-blank key from: `explicit`, the environment, `settings`.
pub fn resolve_api_key(explicit: Option<&str>, settings: &Settings) -> Option<String> {
    resolve_api_key_with(explicit, settings, |name| std::env::var(name).ok())
}

/// [`resolve_api_key`] with an injectable environment lookup.
pub fn resolve_api_key_with(
    explicit: Option<&str>,
    settings: &Settings,
    env: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    let non_blank = |s: String| {
        let t = s.trim();
        (!t.is_empty()).then(|| t.to_string())
    };
    explicit
        .map(str::to_string)
        .and_then(non_blank)
        .or_else(|| API_KEY_ENV_VARS.iter().find_map(|v| env(v).and_then(non_blank)))
        .or_else(|| settings.api_key.clone().and_then(non_blank))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn explicit_wins() {
        let s = Settings {
            api_key: Some("stored".into()),
        };
        let env = |_: &str| Some("from-env".to_string());
        assert_eq!(
            resolve_api_key_with(Some("flag"), &s, env).as_deref(),
            Some("flag")
        );
    }

    #[test]
    fn env_order_then_settings() {
        let s = Settings {
            api_key: Some("stored".into()),
        };
        let gemini_only = |name: &str| (name == "GEMINI_API_KEY").then(|| "g".to_string());
        assert_eq!(resolve_api_key_with(None, &s, gemini_only).as_deref(), Some("g"));
        assert_eq!(resolve_api_key_with(None, &s, no_env).as_deref(), Some("stored"));
        assert_eq!(resolve_api_key_with(Some("  "), &Settings::default(), no_env), None);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let s = Settings {
            api_key: Some("abc".into()),
        };
        s.save(&path).unwrap();
        assert_eq!(Settings::load(&path), s);
    }

    #[test]
    fn malformed_file_is_empty_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(Settings::load(&path), Settings::default());
        assert_eq!(Settings::load(&dir.path().join("missing.json")), Settings::default());
    }
}
