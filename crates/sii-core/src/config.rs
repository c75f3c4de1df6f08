//! Configuration management for the SII lookup client.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Captcha challenge endpoint of the upstream service.
pub const DEFAULT_CAPTCHA_URL: &str = "https://zeus.sii.cl/cvc_cgi/stc/CViewCaptcha.cgi";

/// Taxpayer lookup endpoint of the upstream service.
pub const DEFAULT_LOOKUP_URL: &str = "https://zeus.sii.cl/cvc_cgi/stc/getstc";

/// Main application configuration.
///
/// This is loaded from `~/.config/sii/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Lookup client settings
    pub client: ClientConfig,
    /// Bulk scan settings
    pub scan: ScanConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path.
    ///
    /// Unlike [`AppConfig::load`], a missing file is an error here.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }
        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.client.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `SII_TIMEOUT_SECS`: Override the per-request timeout
    /// - `SII_TLS_MODE`: `strict` or `permissive`
    /// - `SII_CA_BUNDLE`: Path to an extra PEM trust-anchor bundle
    /// - `SII_MAX_CAPTCHA_RETRIES`: Override the captcha-rejection retry cap
    /// - `SII_SCAN_WORKERS`: Override the number of concurrent scan workers
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env();
        config.client.validate()?;
        Ok(config)
    }

    /// Apply `SII_*` environment overrides in place.
    ///
    /// Unparsable values are ignored, leaving the loaded value in effect.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("SII_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.client.timeout_secs = secs;
                tracing::debug!("Override client.timeout_secs from env: {}", secs);
            }
        }

        if let Ok(val) = std::env::var("SII_TLS_MODE") {
            match val.to_ascii_lowercase().as_str() {
                "strict" => self.client.tls.mode = TlsMode::Strict,
                "permissive" => self.client.tls.mode = TlsMode::Permissive,
                other => tracing::warn!("Ignoring unknown SII_TLS_MODE '{}'", other),
            }
        }

        if let Ok(val) = std::env::var("SII_CA_BUNDLE") {
            tracing::debug!("Override client.tls.ca_bundle from env: {}", val);
            self.client.tls.ca_bundle = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("SII_MAX_CAPTCHA_RETRIES") {
            if let Ok(retries) = val.parse() {
                self.client.max_captcha_retries = retries;
                tracing::debug!("Override client.max_captcha_retries from env: {}", retries);
            }
        }

        if let Ok(val) = std::env::var("SII_SCAN_WORKERS") {
            if let Ok(workers) = val.parse() {
                self.scan.workers = workers;
                tracing::debug!("Override scan.workers from env: {}", workers);
            }
        }
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/sii/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("cl", "sii", "sii").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

/// Certificate verification policy for the upstream host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TlsMode {
    /// Verify the peer certificate chain against the trust anchors
    #[default]
    Strict,
    /// Accept any peer certificate. Compatibility shim for the upstream host,
    /// whose chain does not always validate; opt-in only.
    Permissive,
}

/// Transport trust settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Verification policy
    pub mode: TlsMode,
    /// Extra PEM bundle added to the built-in trust anchors
    pub ca_bundle: Option<PathBuf>,
}

/// Lookup client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Captcha challenge endpoint
    pub captcha_url: String,
    /// Taxpayer lookup endpoint
    pub lookup_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
    /// Network attempts per lookup cycle
    pub max_lookup_attempts: u32,
    /// Attempts to obtain a usable captcha before giving up
    pub max_captcha_fetch_attempts: u32,
    /// Fresh captchas tried after the upstream rejects one, per lookup
    pub max_captcha_retries: u32,
    /// Upper bound of the random delay between lookup attempts, in milliseconds
    pub max_backoff_ms: u64,
    /// Trust settings
    pub tls: TlsConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            captcha_url: DEFAULT_CAPTCHA_URL.to_string(),
            lookup_url: DEFAULT_LOOKUP_URL.to_string(),
            timeout_secs: 30,
            user_agent: concat!("sii-rs/", env!("CARGO_PKG_VERSION")).to_string(),
            max_lookup_attempts: 3,
            max_captcha_fetch_attempts: 3,
            max_captcha_retries: 5,
            max_backoff_ms: 8000,
            tls: TlsConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Upper bound of the retry jitter.
    #[must_use]
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    /// Reject settings that would make every lookup fail or hang.
    pub fn validate(&self) -> ConfigResult<()> {
        let zero_field = [
            ("client.timeout_secs", self.timeout_secs == 0),
            ("client.max_lookup_attempts", self.max_lookup_attempts == 0),
            (
                "client.max_captcha_fetch_attempts",
                self.max_captcha_fetch_attempts == 0,
            ),
        ]
        .into_iter()
        .find_map(|(field, is_zero)| is_zero.then_some(field));

        if let Some(field) = zero_field {
            return Err(ConfigError::InvalidValue {
                field: field.to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Bulk scan settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Lookups in flight at once
    pub workers: usize,
    /// First body number to scan
    pub start: u32,
    /// Body number to stop before
    pub end: u32,
    /// Directory receiving one JSON file per record
    pub output_dir: PathBuf,
    /// Records per output subdirectory
    pub files_per_dir: u32,
    /// File holding the last body number written
    pub checkpoint_file: PathBuf,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            start: 1,
            end: 30_000_000,
            output_dir: PathBuf::from("output"),
            files_per_dir: 10_000,
            checkpoint_file: PathBuf::from("last_run_idx.txt"),
        }
    }
}
