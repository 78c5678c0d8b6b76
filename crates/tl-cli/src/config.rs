//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use tl_core::{CategoryMembership, ConverterConfig};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Rules shared by validation and conversion.
    #[serde(default)]
    pub converter: ConverterConfig,

    /// Parent category → known activity names. Empty accepts every name.
    #[serde(default)]
    pub categories: CategoryMembership,

    /// File that pipeline failures are appended to.
    pub error_log_path: PathBuf,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("converter", &self.converter)
            .field("categories_loaded", &self.categories.is_loaded())
            .field("error_log_path", &self.error_log_path)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            converter: ConverterConfig::default(),
            categories: CategoryMembership::new(),
            error_log_path: data_dir.join("errors.log"),
        }
    }
}

impl Config {
    /// Loads configuration from the default location, then optionally from
    /// a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // TL_* environment variables win over files.
        figment = figment.merge(Env::prefixed("TL_"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for tl.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tl"))
}

/// Returns the platform-specific data directory for tl.
///
/// On Linux: `~/.local/share/tl`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("tl"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_tl() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "tl");
    }

    #[test]
    fn test_default_config_logs_errors_in_data_dir() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.error_log_path, data_dir.join("errors.log"));
        assert_eq!(config.converter, ConverterConfig::default());
        assert!(!config.categories.is_loaded());
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("tl.toml");
        std::fs::write(
            &path,
            r#"
error_log_path = "/var/log/tl-errors.log"

[converter]
remark_prefix = "note:"
wake_keywords = ["up"]

[converter.text_mappings]
"单词" = "study_english_words"

[[converter.duration_mappings.meal]]
less_than_minutes = 90
value = "meal_long"

[[converter.duration_mappings.meal]]
less_than_minutes = 30
value = "meal_short"

[categories]
study = ["study_english_words"]
sleep = ["sleep_night"]
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(&path)).unwrap();

        assert_eq!(config.error_log_path, PathBuf::from("/var/log/tl-errors.log"));
        assert_eq!(config.converter.remark_prefix, "note:");
        assert!(config.converter.is_wake_keyword("up"));
        assert!(!config.converter.is_wake_keyword("起床"));
        assert_eq!(
            config.converter.activity_name("单词", 10),
            "study_english_words"
        );
        assert_eq!(
            config.converter.duration_mappings["meal"].classify(10),
            Some("meal_short")
        );
        assert_eq!(config.converter.header_order.len(), 5);
        assert!(config.categories.is_known("sleep_night"));
        assert!(!config.categories.is_known("game"));
    }

    #[test]
    fn test_debug_omits_category_contents() {
        let mut config = Config::default();
        config.categories.insert("rest", "secret_hobby");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("categories_loaded: true"));
        assert!(!rendered.contains("secret_hobby"));
    }
}
