use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::error::{BridgeError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config/bridge.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub kismet: KismetConfig,
    pub formatter: FormatterConfig,
    pub service: ServiceConfig,
    pub atak: AtakConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// Source API connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KismetConfig {
    pub host: String,
    pub port: u16,
    pub use_ssl: bool,
    pub verify_ssl: bool,
    pub timeout_secs: u64,
    pub max_requests_per_minute: usize,
}

impl Default for KismetConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2501,
            use_ssl: false,
            verify_ssl: true,
            timeout_secs: 30,
            max_requests_per_minute: 60,
        }
    }
}

/// Record normalizer settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    pub gps_precision: u32,
    pub max_ssid_length: usize,
    pub obfuscate_gps: bool,
    pub gps_obfuscation_precision: u32,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            gps_precision: 6,
            max_ssid_length: 32,
            obfuscate_gps: false,
            gps_obfuscation_precision: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub poll_interval_secs: u64,
    pub lookback_seconds: i64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            lookback_seconds: 60,
        }
    }
}

/// Downstream consumer settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AtakConfig {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
    /// Setting this to false accepts self-signed certificates; only sensible for same-host delivery.
    pub verify_certificates: bool,
    pub timeout_secs: u64,
}

impl Default for AtakConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8087,
            use_tls: true,
            verify_certificates: true,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for the rolling JSON log; console only when unset.
    pub directory: Option<String>,
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: Some("logs".to_string()),
            default_filter: "kismet_bridge=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub listen_addr: Option<String>,
}

impl BridgeConfig {
    /// Load from a TOML file. A missing file falls back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let (config, notices) = Self::read(path)?;
        for notice in &notices {
            warn!("{}", notice);
        }
        Ok(config)
    }

    /// Like [`BridgeConfig::load`], but hands warnings back instead of logging them, for callers
    /// that install logging from the loaded config.
    pub fn read(path: impl AsRef<Path>) -> Result<(Self, Vec<String>)> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let notice = format!("Config file not found: {}, using defaults", path.display());
                return Ok((Self::default(), vec![notice]));
            }
            Err(e) => {
                return Err(BridgeError::Configuration(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                )))
            }
        };
        Self::parse(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let (config, notices) = Self::parse(content)?;
        for notice in &notices {
            warn!("{}", notice);
        }
        Ok(config)
    }

    fn parse(content: &str) -> Result<(Self, Vec<String>)> {
        let raw: toml::Value = toml::from_str(content)
            .map_err(|e| BridgeError::Configuration(format!("Invalid TOML: {}", e)))?;
        let mut notices = Vec::new();
        if let Some(table) = raw.as_table() {
            if table.contains_key("credentials") || table.contains_key("api_keys") {
                notices.push(
                    "Credentials found in config file - they are ignored, move them to the credential store"
                        .to_string(),
                );
            }
        }

        let config = raw
            .try_into::<BridgeConfig>()
            .map_err(|e| BridgeError::Configuration(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok((config, notices))
    }

    pub fn validate(&self) -> Result<()> {
        if self.kismet.port == 0 {
            return Err(BridgeError::Configuration("kismet.port must be 1-65535".into()));
        }
        if self.atak.port == 0 {
            return Err(BridgeError::Configuration("atak.port must be 1-65535".into()));
        }
        if self.kismet.timeout_secs == 0 || self.atak.timeout_secs == 0 {
            return Err(BridgeError::Configuration("timeouts must be positive".into()));
        }
        if self.kismet.max_requests_per_minute == 0 {
            return Err(BridgeError::Configuration(
                "kismet.max_requests_per_minute must be positive".into(),
            ));
        }
        if self.formatter.gps_precision > 15 || self.formatter.gps_obfuscation_precision > 15 {
            return Err(BridgeError::Configuration("GPS precision must be at most 15".into()));
        }
        if self.formatter.max_ssid_length == 0 {
            return Err(BridgeError::Configuration("formatter.max_ssid_length must be positive".into()));
        }
        if self.service.poll_interval_secs == 0 {
            return Err(BridgeError::Configuration("service.poll_interval_secs must be positive".into()));
        }
        if self.service.lookback_seconds <= 0 {
            return Err(BridgeError::Configuration("service.lookback_seconds must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[test]
    fn empty_document_yields_defaults() {
        let config = BridgeConfig::from_toml_str("").unwrap();
        assert_eq!(config.kismet.host, "127.0.0.1");
        assert_eq!(config.kismet.port, 2501);
        assert_eq!(config.kismet.max_requests_per_minute, 60);
        assert_eq!(config.formatter.gps_precision, 6);
        assert_eq!(config.formatter.gps_obfuscation_precision, 3);
        assert!(!config.formatter.obfuscate_gps);
        assert_eq!(config.service.poll_interval_secs, 5);
        assert_eq!(config.service.lookback_seconds, 60);
        assert_eq!(config.atak.port, 8087);
        assert!(config.atak.use_tls);
        assert!(config.atak.verify_certificates);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = BridgeConfig::from_toml_str(
            r#"
            [formatter]
            obfuscate_gps = true

            [atak]
            port = 9000
            use_tls = false
            "#,
        )
        .unwrap();
        assert!(config.formatter.obfuscate_gps);
        assert_eq!(config.formatter.gps_obfuscation_precision, 3);
        assert_eq!(config.atak.port, 9000);
        assert!(!config.atak.use_tls);
        assert_eq!(config.atak.host, "127.0.0.1");
    }

    #[test]
    fn malformed_toml_is_a_configuration_error() {
        let err = BridgeConfig::from_toml_str("[kismet\nport = ").unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = BridgeConfig::from_toml_str("[kismet]\nport = 0").unwrap_err();
        assert!(err.is_fatal());

        let err = BridgeConfig::from_toml_str("[service]\npoll_interval_secs = 0").unwrap_err();
        assert!(matches!(err, BridgeError::Configuration(_)));
    }

    #[test]
    fn credentials_table_is_ignored() {
        let config = BridgeConfig::from_toml_str(
            r#"
            [credentials]
            username = "admin"
            "#,
        )
        .unwrap();
        assert_eq!(config.kismet.port, 2501);
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn credentials_table_warning_is_logged() {
        let captured = CapturedLog::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            BridgeConfig::from_toml_str("[credentials]\nkismet_password = \"x\"").unwrap();
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"));
        assert!(output.contains("Credentials found in config file"));
        assert!(!output.contains("kismet_password = "));
    }

    #[test]
    fn read_hands_back_warnings_for_the_caller_to_log() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[credentials]\nusername = \"admin\"").unwrap();
        let (config, notices) = BridgeConfig::read(file.path()).unwrap();
        assert_eq!(config.kismet.port, 2501);
        assert_eq!(notices.len(), 1);
        assert!(notices[0].starts_with("Credentials found in config file"));

        let dir = tempfile::tempdir().unwrap();
        let (_, notices) = BridgeConfig::read(dir.path().join("absent.toml")).unwrap();
        assert!(notices[0].starts_with("Config file not found"));

        let plain = dir.path().join("bridge.toml");
        std::fs::write(&plain, "[service]\nlookback_seconds = 30\n").unwrap();
        let (_, notices) = BridgeConfig::read(&plain).unwrap();
        assert!(notices.is_empty());
    }

    #[test]
    fn load_reads_file_and_missing_file_falls_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[service]\nlookback_seconds = 120").unwrap();
        let config = BridgeConfig::load(file.path()).unwrap();
        assert_eq!(config.service.lookback_seconds, 120);

        let dir = tempfile::tempdir().unwrap();
        let config = BridgeConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.service.lookback_seconds, 60);
    }
}
