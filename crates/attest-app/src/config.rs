//! TOML configuration.
//!
//! ```toml
//! workbook = "protocol_sections.xlsx"
//! database = "data/attest.sqlite3"
//! sheet_images_dir = "sheet_images"
//! attest_base_url = "https://attest.example.org/Attest?protocol="
//! default_sites = ["MMC", "Overlook"]
//!
//! [lock]
//! password = "..."
//!
//! [notify]
//! sender = "attest@example.org"
//! recipients = ["qa@example.org"]
//! smtp_host = "smtp.example.org"
//! smtp_port = 587
//! username = "attest@example.org"
//! password = "..."
//! ```
//!
//! Every key is optional. Relative paths resolve against the directory containing the file.
//! Secrets can be supplied through `ATTEST_LOCK_PASSWORD` and `ATTEST_SMTP_PASSWORD` instead.

use std::path::{Path, PathBuf};
use std::time::Duration;

use attest_notify::SmtpSettings;
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

pub const LOCK_PASSWORD_ENV: &str = "ATTEST_LOCK_PASSWORD";
pub const SMTP_PASSWORD_ENV: &str = "ATTEST_SMTP_PASSWORD";

const DEFAULT_WORKBOOK: &str = "protocol_sections.xlsx";
const DEFAULT_DATABASE: &str = "data/attest.sqlite3";
const DEFAULT_SITES: [&str; 2] = ["MMC", "Overlook"];
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_SMTP_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    workbook: Option<PathBuf>,
    database: Option<PathBuf>,
    sheet_images_dir: Option<PathBuf>,
    attest_base_url: Option<String>,
    default_sites: Option<Vec<String>>,
    lock: LockSection,
    notify: Option<NotifySection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct LockSection {
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NotifySection {
    sender: String,
    #[serde(default)]
    recipients: Vec<String>,
    smtp_host: String,
    smtp_port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    timeout_secs: Option<u64>,
}

/// Resolved application configuration.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub workbook: PathBuf,
    pub database: PathBuf,
    pub sheet_images_dir: Option<PathBuf>,
    pub attest_base_url: Option<String>,
    pub default_sites: Vec<String>,
    pub lock_password: Option<SecretString>,
    /// `None` means summaries are only written to the log.
    pub notify: Option<NotifyConfig>,
}

#[derive(Clone, Debug)]
pub struct NotifyConfig {
    pub sender: String,
    pub recipients: Vec<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub timeout: Duration,
}

impl NotifyConfig {
    pub fn smtp_settings(&self) -> SmtpSettings {
        SmtpSettings {
            host: self.smtp_host.clone(),
            port: self.smtp_port,
            sender: self.sender.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            timeout: self.timeout,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::defaults_in(Path::new("."))
    }
}

impl AppConfig {
    /// Defaults with relative paths anchored at `base`.
    pub fn defaults_in(base: &Path) -> Self {
        Self {
            workbook: base.join(DEFAULT_WORKBOOK),
            database: base.join(DEFAULT_DATABASE),
            sheet_images_dir: None,
            attest_base_url: None,
            default_sites: DEFAULT_SITES.iter().map(|s| s.to_string()).collect(),
            lock_password: None,
            notify: None,
        }
    }

    /// Read and parse the file at `path`. A missing file is an error here; use
    /// [`AppConfig::load_first`] for optional lookups.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_toml_str(&text, base).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the first candidate that exists, or fall back to the defaults.
    ///
    /// Returns the path that was used, if any.
    pub fn load_first<I>(candidates: I) -> Result<(Self, Option<PathBuf>), ConfigError>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        for candidate in candidates {
            if candidate.is_file() {
                let config = Self::load(&candidate)?;
                return Ok((config, Some(candidate)));
            }
        }
        Ok((Self::default(), None))
    }

    pub fn from_toml_str(text: &str, base: &Path) -> Result<Self, toml::de::Error> {
        let file: ConfigFile = toml::from_str(text)?;
        let mut config = Self::defaults_in(base);

        if let Some(workbook) = file.workbook {
            config.workbook = base.join(workbook);
        }
        if let Some(database) = file.database {
            config.database = base.join(database);
        }
        config.sheet_images_dir = file.sheet_images_dir.map(|dir| base.join(dir));
        config.attest_base_url = file.attest_base_url.filter(|u| !u.trim().is_empty());
        if let Some(sites) = file.default_sites {
            config.default_sites = sites
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        config.lock_password = file.lock.password.and_then(non_empty_secret);
        config.notify = file.notify.map(|n| NotifyConfig {
            sender: n.sender,
            recipients: n.recipients,
            smtp_host: n.smtp_host,
            smtp_port: n.smtp_port.unwrap_or(DEFAULT_SMTP_PORT),
            username: n.username.filter(|u| !u.trim().is_empty()),
            password: n.password.and_then(non_empty_secret),
            timeout: Duration::from_secs(n.timeout_secs.unwrap_or(DEFAULT_SMTP_TIMEOUT_SECS)),
        });

        Ok(config)
    }

    /// Apply secret overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply secret overrides from `lookup`. Empty values are ignored. The SMTP password only
    /// applies when a `[notify]` section is present.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(password) = lookup(LOCK_PASSWORD_ENV).and_then(non_empty_secret) {
            self.lock_password = Some(password);
        }
        if let Some(notify) = self.notify.as_mut() {
            if let Some(password) = lookup(SMTP_PASSWORD_ENV).and_then(non_empty_secret) {
                notify.password = Some(password);
            }
        }
    }
}

fn non_empty_secret(value: String) -> Option<SecretString> {
    if value.is_empty() {
        None
    } else {
        Some(SecretString::from(value))
    }
}
