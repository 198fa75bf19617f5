use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::steps::{DocumentType, Step, StepKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host-supplied step list driving plan compilation
    #[serde(default = "default_steps")]
    pub steps: Vec<Step>,
    /// Document type selected for the document capture step
    #[serde(default)]
    pub document_type: DocumentType,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub sms: SmsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Endpoint of the real-time relay pairing desktop and mobile sessions
    pub sync_url: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            sync_url: "https://sync.crosscap.io".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Base URL the companion opens. `/` means same origin as the desktop
    /// bundle, with the link id carried as a query parameter.
    pub mobile_base: String,
    /// Origin used when `mobile_base` is `/`
    pub origin: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            mobile_base: "/".to_string(),
            origin: "https://verify.crosscap.io".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    /// Delivery endpoint for pairing-link SMS
    pub delivery_url: String,
    /// Language tag sent alongside the link
    pub language: String,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            delivery_url: "https://telephony.crosscap.io/v1/cross_device_sms".to_string(),
            language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Write logs to a file instead of stderr
    #[serde(default)]
    pub to_file: bool,
    #[serde(default = "default_log_dir")]
    pub dir: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
            dir: default_log_dir(),
        }
    }
}

fn default_steps() -> Vec<Step> {
    vec![
        Step::new(StepKind::Welcome),
        Step::new(StepKind::Document),
        Step::new(StepKind::Face),
        Step::new(StepKind::Complete),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            document_type: DocumentType::default(),
            relay: RelayConfig::default(),
            link: LinkConfig::default(),
            sms: SmsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Project-local config file location
    pub fn default_config_path() -> PathBuf {
        PathBuf::from("crosscap.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so the core works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        // Project-local config (primary config location)
        let local_config = Self::default_config_path();
        if local_config.exists() {
            builder = builder.add_source(config::File::from(local_config));
        }

        // User config in ~/.config/crosscap/ (optional global overrides)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("crosscap").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment variables with CROSSCAP_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("CROSSCAP")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Absolute path of the log directory
    pub fn logs_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.logging.dir);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_steps_end_in_complete() {
        let config = Config::default();
        assert_eq!(config.steps.last().unwrap().kind, StepKind::Complete);
        assert_eq!(config.steps.first().unwrap().kind, StepKind::Welcome);
    }

    #[test]
    fn test_defaults_survive_serde_round_trip() {
        // The loader seeds the builder with serialized defaults; a lossy
        // round trip here would corrupt every layered load.
        let defaults = Config::default();
        let json = serde_json::to_string(&defaults).unwrap();
        let restored: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.steps, defaults.steps);
        assert_eq!(restored.document_type, defaults.document_type);
        assert_eq!(restored.link.mobile_base, defaults.link.mobile_base);
        assert_eq!(restored.sms.language, defaults.sms.language);
    }

    #[test]
    fn test_step_list_parses_from_toml_shape() {
        let toml_str = r#"
            document_type = "driving_licence"

            [[steps]]
            type = "welcome"

            [[steps]]
            type = "document"

            [[steps]]
            type = "complete"
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.steps.len(), 3);
        assert_eq!(config.document_type, DocumentType::DrivingLicence);
        assert!(config.document_type.is_double_sided());
    }

    #[test]
    fn test_logs_path_is_absolute() {
        let config = Config::default();
        assert!(config.logs_path().is_absolute());
    }
}
