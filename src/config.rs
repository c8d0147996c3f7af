use crate::state::ProbeKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub mail: MailConfig,
    #[serde(default)]
    pub public_ip: PublicIpConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailConfig {
    pub server: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub sendto: Vec<(String, String)>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublicIpConfig {
    #[serde(default = "default_public_ip_url")]
    pub url: String,
    #[serde(default = "default_public_ip_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    #[serde(default = "default_warn_on")]
    pub warn_on: Vec<ProbeKind>,
    #[serde(default)]
    pub pi_models_file: Option<PathBuf>,
}

impl Default for PublicIpConfig {
    fn default() -> Self {
        Self {
            url: default_public_ip_url(),
            timeout_secs: default_public_ip_timeout_secs(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            warn_on: default_warn_on(),
            pi_models_file: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
    #[error("failed to load Raspberry Pi model table {path}: {reason}")]
    PiModels { path: String, reason: String },
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        Self::from_yaml(&text, &path_display)
    }

    pub fn from_yaml(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let cfg: Config = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mail.server.trim().is_empty() {
            return Err(ConfigError::Validation(
                "mail.server is required".to_string(),
            ));
        }
        if self.mail.port == 0 {
            return Err(ConfigError::Validation(
                "mail.port must be in 1..65535".to_string(),
            ));
        }
        if self.mail.sendto.is_empty() {
            return Err(ConfigError::Validation(
                "mail.sendto needs at least one [full_name, email] pair".to_string(),
            ));
        }
        for (full_name, email) in &self.mail.sendto {
            if full_name.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "mail.sendto entry for '{email}' has an empty name"
                )));
            }
            if !email.contains('@') {
                return Err(ConfigError::Validation(format!(
                    "mail.sendto address '{email}' is not an email address"
                )));
            }
        }

        if self.public_ip.url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "public_ip.url must not be empty".to_string(),
            ));
        }
        if self.public_ip.timeout_secs < 1 {
            return Err(ConfigError::Validation(
                "public_ip.timeout_secs must be >= 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for kind in &self.report.warn_on {
            if !seen.insert(*kind) {
                return Err(ConfigError::Validation(format!(
                    "report.warn_on lists {kind:?} more than once"
                )));
            }
        }

        Ok(())
    }

    pub fn sendto(&self) -> Vec<String> {
        self.mail
            .sendto
            .iter()
            .map(|(_, email)| email.clone())
            .collect()
    }

    pub fn envelope_sendto(&self) -> String {
        self.mail
            .sendto
            .iter()
            .map(|(full_name, email)| format!("{full_name} <{email}>"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

const fn default_smtp_port() -> u16 {
    25
}

fn default_public_ip_url() -> String {
    "http://httpbin.org/ip".to_string()
}

const fn default_public_ip_timeout_secs() -> u64 {
    10
}

fn default_warn_on() -> Vec<ProbeKind> {
    ProbeKind::DEFAULT_WARN_ON.to_vec()
}
