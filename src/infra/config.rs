//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/desk.toml

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannerBackend {
    /// Keyboard-wedge reader or manual entry, fed by the frontend
    Keyboard,
    /// QR reader module on a serial / USB-CDC port
    Serial,
    /// Fixed list of codes, for dry runs
    Scripted,
}

impl ScannerBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScannerBackend::Keyboard => "keyboard",
            ScannerBackend::Serial => "serial",
            ScannerBackend::Scripted => "scripted",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeskConfig {
    /// Desk identifier shown in the header and journal
    #[serde(default = "default_desk_id")]
    pub id: String,
    /// How long a result stays on screen
    #[serde(default = "default_result_hold_ms")]
    pub result_hold_ms: u64,
    /// Re-arm a scan whenever the desk returns to ready
    #[serde(default)]
    pub auto_arm: bool,
    /// Log destination while the TUI owns the terminal
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            id: default_desk_id(),
            result_hold_ms: default_result_hold_ms(),
            auto_arm: false,
            log_file: default_log_file(),
        }
    }
}

fn default_desk_id() -> String {
    "desk".to_string()
}

fn default_result_hold_ms() -> u64 {
    3000
}

fn default_log_file() -> String {
    "checkin-desk.log".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerificationConfig {
    /// Backend web app URL; absent means every verification fails
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Form field carrying the scanned code
    #[serde(default = "default_code_field")]
    pub code_field: String,
    #[serde(default = "default_verification_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            code_field: default_code_field(),
            timeout_ms: default_verification_timeout_ms(),
        }
    }
}

fn default_code_field() -> String {
    "qrCode".to_string()
}

fn default_verification_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_scanner_backend")]
    pub backend: ScannerBackend,
    #[serde(default = "default_scanner_device")]
    pub device: String,
    #[serde(default = "default_scanner_baud")]
    pub baud: u32,
    /// Codes served in order by the scripted backend
    #[serde(default)]
    pub codes: Vec<String>,
    /// Delay before the scripted backend answers a session
    #[serde(default)]
    pub scripted_delay_ms: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            backend: default_scanner_backend(),
            device: default_scanner_device(),
            baud: default_scanner_baud(),
            codes: Vec::new(),
            scripted_delay_ms: 0,
        }
    }
}

fn default_scanner_backend() -> ScannerBackend {
    ScannerBackend::Keyboard
}

fn default_scanner_device() -> String {
    "/dev/ttyACM0".to_string()
}

fn default_scanner_baud() -> u32 {
    9600
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_journal_enabled")]
    pub enabled: bool,
    /// File path for the check-in journal (JSONL format)
    #[serde(default = "default_journal_file")]
    pub file: String,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self { enabled: default_journal_enabled(), file: default_journal_file() }
    }
}

fn default_journal_enabled() -> bool {
    true
}

fn default_journal_file() -> String {
    "checkins.jsonl".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Summary log interval (0 to disable)
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub desk: DeskConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    desk_id: String,
    result_hold_ms: u64,
    auto_arm: bool,
    log_file: String,
    endpoint: Option<String>,
    code_field: String,
    verification_timeout_ms: u64,
    scanner_backend: ScannerBackend,
    scanner_device: String,
    scanner_baud: u32,
    scripted_codes: Vec<String>,
    scripted_delay_ms: u64,
    journal_enabled: bool,
    journal_file: String,
    metrics_interval_secs: u64,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        // Blank endpoint in the file is the same as no endpoint
        let endpoint = toml_config
            .verification
            .endpoint
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        Self {
            desk_id: toml_config.desk.id,
            result_hold_ms: toml_config.desk.result_hold_ms,
            auto_arm: toml_config.desk.auto_arm,
            log_file: toml_config.desk.log_file,
            endpoint,
            code_field: toml_config.verification.code_field,
            verification_timeout_ms: toml_config.verification.timeout_ms,
            scanner_backend: toml_config.scanner.backend,
            scanner_device: toml_config.scanner.device,
            scanner_baud: toml_config.scanner.baud,
            scripted_codes: toml_config.scanner.codes,
            scripted_delay_ms: toml_config.scanner.scripted_delay_ms,
            journal_enabled: toml_config.journal.enabled,
            journal_file: toml_config.journal.file,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            config_file,
        }
    }

    /// Determine config file path from an explicit argument or environment
    pub fn resolve_config_path(cli_path: Option<&str>) -> String {
        if let Some(path) = cli_path {
            return path.to_string();
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/desk.toml".to_string()
    }

    /// Parse configuration from TOML text
    pub fn parse_toml(content: &str, origin: &str) -> anyhow::Result<Self> {
        let toml_config: TomlConfig = toml::from_str(content)
            .with_context(|| format!("Failed to parse config file {}", origin))?;
        Ok(Self::from_toml(toml_config, origin.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse_toml(&content, &path.display().to_string())
    }

    /// Load configuration, falling back to defaults. The load error is
    /// handed back because logging is not up yet when config is read.
    pub fn load_or_default(path: &str) -> (Self, Option<anyhow::Error>) {
        match Self::from_file(path) {
            Ok(config) => (config, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    pub fn desk_id(&self) -> &str {
        &self.desk_id
    }

    pub fn result_hold(&self) -> Duration {
        Duration::from_millis(self.result_hold_ms)
    }

    pub fn auto_arm(&self) -> bool {
        self.auto_arm
    }

    pub fn log_file(&self) -> &str {
        &self.log_file
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }

    pub fn code_field(&self) -> &str {
        &self.code_field
    }

    pub fn verification_timeout(&self) -> Duration {
        Duration::from_millis(self.verification_timeout_ms)
    }

    pub fn scanner_backend(&self) -> ScannerBackend {
        self.scanner_backend
    }

    pub fn scanner_device(&self) -> &str {
        &self.scanner_device
    }

    pub fn scanner_baud(&self) -> u32 {
        self.scanner_baud
    }

    pub fn scripted_codes(&self) -> &[String] {
        &self.scripted_codes
    }

    pub fn scripted_delay(&self) -> Duration {
        Duration::from_millis(self.scripted_delay_ms)
    }

    pub fn journal_enabled(&self) -> bool {
        self.journal_enabled
    }

    pub fn journal_file(&self) -> &str {
        &self.journal_file
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to point at a backend
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Builder method for tests to shorten the result hold
    pub fn with_result_hold_ms(mut self, ms: u64) -> Self {
        self.result_hold_ms = ms;
        self
    }

    /// Builder method for tests to redirect the journal
    pub fn with_journal_file(mut self, file: impl Into<String>) -> Self {
        self.journal_enabled = true;
        self.journal_file = file.into();
        self
    }

    pub fn without_journal(mut self) -> Self {
        self.journal_enabled = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.desk_id(), "desk");
        assert_eq!(config.result_hold(), Duration::from_secs(3));
        assert!(!config.auto_arm());
        assert_eq!(config.endpoint(), None);
        assert_eq!(config.code_field(), "qrCode");
        assert_eq!(config.verification_timeout(), Duration::from_secs(10));
        assert_eq!(config.scanner_backend(), ScannerBackend::Keyboard);
        assert_eq!(config.journal_file(), "checkins.jsonl");
        assert_eq!(config.metrics_interval_secs(), 60);
        assert_eq!(config.config_file(), "default");
    }

    #[test]
    fn test_resolve_config_path_from_arg() {
        assert_eq!(Config::resolve_config_path(Some("config/hall-b.toml")), "config/hall-b.toml");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse_toml("", "inline").unwrap();
        assert_eq!(config.desk_id(), "desk");
        assert_eq!(config.config_file(), "inline");
    }

    #[test]
    fn test_blank_endpoint_is_missing() {
        let config = Config::parse_toml("[verification]\nendpoint = \"   \"\n", "inline").unwrap();
        assert_eq!(config.endpoint(), None);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = Config::parse_toml("[scanner]\nbackend = \"camera\"\n", "inline");
        assert!(result.is_err());
    }

    #[test]
    fn test_builders() {
        let config = Config::default()
            .with_endpoint("http://127.0.0.1:9000/exec")
            .with_result_hold_ms(50)
            .without_journal();
        assert_eq!(config.endpoint(), Some("http://127.0.0.1:9000/exec"));
        assert_eq!(config.result_hold(), Duration::from_millis(50));
        assert!(!config.journal_enabled());
    }
}
