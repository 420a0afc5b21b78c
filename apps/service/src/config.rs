use std::{env, fmt, fs, path};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::monitoring::transition::SslAlertPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFailed { path: path::PathBuf, source: std::io::Error },
    #[error("Failed to write config file {path}: {source}")]
    WriteFailed { path: path::PathBuf, source: std::io::Error },
    #[error("Failed to parse config file: {0}")]
    ParseFailed(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("No config directory available (set XDG_CONFIG_HOME or HOME)")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseSettings,
    pub probes: ProbeSettings,
    pub notifications: NotificationSettings,
    pub retention: RetentionSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub path: path::PathBuf,
    pub max_connections: usize,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self { path: "upkeep.db".into(), max_connections: 8 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    pub http_timeout_seconds: u64,
    pub tcp_timeout_seconds: u64,
    pub tls_timeout_seconds: u64,
    pub ping_timeout_seconds: u64,
    pub dns_timeout_seconds: u64,
    pub user_agent: String,
    /// A 2xx answer slower than this counts as degraded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slow_response_threshold_ms: Option<u64>,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            http_timeout_seconds: 30,
            tcp_timeout_seconds: 10,
            tls_timeout_seconds: 10,
            ping_timeout_seconds: 5,
            dns_timeout_seconds: 10,
            user_agent: format!("Upkeep-Monitor/{}", env!("CARGO_PKG_VERSION")),
            slow_response_threshold_ms: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub delivery_timeout_seconds: u64,
    pub ssl_warning_days: i64,
    pub ssl_warning_interval_hours: i64,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self { delivery_timeout_seconds: 10, ssl_warning_days: 14, ssl_warning_interval_hours: 24 }
    }
}

impl NotificationSettings {
    pub fn ssl_policy(&self) -> SslAlertPolicy {
        SslAlertPolicy {
            warning_days: self.ssl_warning_days,
            warning_interval: chrono::Duration::hours(self.ssl_warning_interval_hours),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSettings {
    pub log_days: i64,
    pub metric_days: i64,
    pub history_days: i64,
    pub cleanup_interval_minutes: u64,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self { log_days: 30, metric_days: 30, history_days: 90, cleanup_interval_minutes: 60 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `compact` or `json`
    pub format: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { format: "compact".into() }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/upkeep/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("upkeep/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Database")?;
        write_1(f, "Path", &self.database.path.display())?;
        write_1(f, "Max Connections", &self.database.max_connections)?;

        write_title_1(f, "Probes")?;
        write_1(f, "HTTP Timeout (s)", &self.probes.http_timeout_seconds)?;
        write_1(f, "TCP Timeout (s)", &self.probes.tcp_timeout_seconds)?;
        write_1(f, "TLS Timeout (s)", &self.probes.tls_timeout_seconds)?;
        write_1(f, "Ping Timeout (s)", &self.probes.ping_timeout_seconds)?;
        write_1(f, "DNS Timeout (s)", &self.probes.dns_timeout_seconds)?;
        write_1(f, "User Agent", &self.probes.user_agent)?;
        match self.probes.slow_response_threshold_ms {
            Some(ms) => write_1(f, "Slow Response (ms)", &ms)?,
            None => write_1(f, "Slow Response (ms)", &"off")?,
        }

        write_title_1(f, "Notifications")?;
        write_1(f, "Delivery Timeout (s)", &self.notifications.delivery_timeout_seconds)?;
        write_1(f, "SSL Warning (days)", &self.notifications.ssl_warning_days)?;
        write_1(f, "SSL Warning Interval (h)", &self.notifications.ssl_warning_interval_hours)?;

        write_title_1(f, "Retention")?;
        write_1(f, "Check Logs (days)", &self.retention.log_days)?;
        write_1(f, "Metrics (days)", &self.retention.metric_days)?;
        write_1(f, "Notification History (days)", &self.retention.history_days)?;
        write_1(f, "Cleanup Interval (min)", &self.retention.cleanup_interval_minutes)?;

        write_title_1(f, "Logging")?;
        write_1(f, "Format", &self.logging.format)?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/upkeep/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```no_run
    /// # use upkeep_service::config::Config;
    /// let cfg = Config::from_config(None::<&std::path::Path>)?;
    /// println!("{}", cfg);
    /// # Ok::<(), upkeep_service::config::ConfigError>(())
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| ConfigError::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str).map_err(|source| ConfigError::WriteFailed { path: path.to_path_buf(), source })
    }
}
