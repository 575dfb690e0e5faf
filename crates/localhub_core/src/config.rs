//! Runtime settings loaded from TOML.
//!
//! Every key is optional; missing keys fall back to [`Settings::default`].
//!
//! ```toml
//! database_path = "/var/lib/localhub/localhub.sqlite3"
//! log_level = "info"
//! log_dir = "/var/log/localhub"
//!
//! [stream]
//! default_page_size = 12
//! max_page_size = 100
//!
//! [push]
//! vapid_admin_email = "admin@localhub.social"
//! icon_url = "/static/favicon.png"
//! ttl_seconds = 3600
//! ```

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub database_path: PathBuf,
    pub log_level: String,
    /// Absolute directory for rotating log files; logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub default_language: String,
    pub stream: StreamSettings,
    pub push: PushSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamSettings {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PushSettings {
    pub vapid_admin_email: String,
    /// Icon shown in browser push notifications, resolved against the community URL.
    pub icon_url: String,
    pub ttl_seconds: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("localhub.sqlite3"),
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: None,
            default_language: "en".to_string(),
            stream: StreamSettings::default(),
            push: PushSettings::default(),
        }
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            default_page_size: 12,
            max_page_size: 100,
        }
    }
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            vapid_admin_email: "admin@localhub.social".to_string(),
            icon_url: "/static/favicon.png".to_string(),
            ttl_seconds: 3600,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read settings `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid settings file: {err}"),
            Self::Invalid(reason) => write!(f, "invalid settings: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err)
    }
}

impl Settings {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(source)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&source)?;
        log::info!(
            "event=config_load module=config status=ok path={}",
            path.display()
        );
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.stream.default_page_size == 0 {
            return Err(ConfigError::Invalid(
                "stream.default_page_size must be positive".to_string(),
            ));
        }
        if self.stream.max_page_size < self.stream.default_page_size {
            return Err(ConfigError::Invalid(
                "stream.max_page_size must not be below default_page_size".to_string(),
            ));
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir `{}` must be absolute",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    /// Page size for a stream request, clamped to the configured bounds.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.stream.default_page_size)
            .clamp(1, self.stream.max_page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, Settings};

    #[test]
    fn empty_source_yields_defaults() {
        let settings = Settings::from_toml_str("").expect("defaults");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.stream.default_page_size, 12);
        assert_eq!(settings.push.ttl_seconds, 3600);
    }

    #[test]
    fn partial_tables_keep_other_defaults() {
        let settings = Settings::from_toml_str(
            "log_level = \"warn\"\n[stream]\nmax_page_size = 50\n",
        )
        .expect("parse");
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.stream.max_page_size, 50);
        assert_eq!(settings.stream.default_page_size, 12);
        assert_eq!(settings.page_size(Some(500)), 50);
        assert_eq!(settings.page_size(None), 12);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_bounds() {
        assert!(matches!(
            Settings::from_toml_str("colour = \"red\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            Settings::from_toml_str("[stream]\ndefault_page_size = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Settings::from_toml_str("log_dir = \"relative/logs\""),
            Err(ConfigError::Invalid(_))
        ));
    }
}
