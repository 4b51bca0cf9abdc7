use crate::error::{AquapiError, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

pub const DEFAULT_CONFIG_FILE: &str = "aquapi.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_db_path() -> PathBuf {
    PathBuf::from("aquapi.redb")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            db_path: default_db_path(),
        }
    }
}

// ---------------------------------------------------------------------------
// ControllerConfig
// ---------------------------------------------------------------------------

/// Settings for one execution loop bound to one actuator and one GPIO line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default)]
    pub actuator_id: Option<i64>,
    /// Line offset on the GPIO chip (BCM numbering on a Raspberry Pi).
    #[serde(default = "default_gpio_pin")]
    pub gpio_pin: u32,
    /// GPIO character device. Unset means pick by board model:
    /// `/dev/gpiochip4` on a Raspberry Pi 5, `/dev/gpiochip0` elsewhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpio_chip: Option<PathBuf>,
    /// Drive the line low to switch the pump on (relay boards are often
    /// wired this way).
    #[serde(default)]
    pub active_low: bool,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// How many times a completion report is attempted before it is given
    /// up as lost. `1` means no retry.
    #[serde(default = "default_report_attempts")]
    pub report_attempts: u32,
    #[serde(default = "default_report_retry_delay_ms")]
    pub report_retry_delay_ms: u64,
}

fn default_server_url() -> String {
    "http://aquapi.local:5000".to_string()
}

fn default_gpio_pin() -> u32 {
    26
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_report_attempts() -> u32 {
    1
}

fn default_report_retry_delay_ms() -> u64 {
    500
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            actuator_id: None,
            gpio_pin: default_gpio_pin(),
            gpio_chip: None,
            active_low: false,
            request_timeout_ms: default_request_timeout_ms(),
            report_attempts: default_report_attempts(),
            report_retry_delay_ms: default_report_retry_delay_ms(),
        }
    }
}

impl ControllerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn report_retry_delay(&self) -> Duration {
        Duration::from_millis(self.report_retry_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AquapiError::NotConfigured(path.display().to_string()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load `path`, or fall back to defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(AquapiError::NotConfigured(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Atomically write the config as YAML, via a tempfile in the same
    /// directory.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(data.as_bytes())?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let c = &self.controller;

        if c.server_url.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "controller.server_url is empty".to_string(),
            });
        } else if !c.server_url.starts_with("http://") && !c.server_url.starts_with("https://") {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "controller.server_url '{}' must start with http:// or https://",
                    c.server_url
                ),
            });
        }

        if c.actuator_id.is_none() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "controller.actuator_id is not set; pass --actuator to `aquapi control`"
                    .to_string(),
            });
        }

        // A hung poll must never stall the loop for long.
        if c.request_timeout_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "controller.request_timeout_ms must be greater than 0".to_string(),
            });
        } else if c.request_timeout_ms >= 60_000 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "controller.request_timeout_ms={} (>=60s is unusual; keep it below the activation period)",
                    c.request_timeout_ms
                ),
            });
        }

        if c.report_attempts == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "controller.report_attempts=0 is treated as 1".to_string(),
            });
        } else if c.report_attempts > 10 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "controller.report_attempts={} (>10 is unusual)",
                    c.report_attempts
                ),
            });
        }

        if self.server.port == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "server.port=0 binds an OS-assigned port".to_string(),
            });
        }

        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_yaml_gives_defaults() {
        let cfg: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.server.port, 5000);
        assert_eq!(cfg.controller.gpio_pin, 26);
        assert_eq!(cfg.controller.report_attempts, 1);
        assert_eq!(cfg.controller.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let yaml = "controller:\n  actuator_id: 3\n  report_attempts: 4\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.controller.actuator_id, Some(3));
        assert_eq!(cfg.controller.report_attempts, 4);
        assert_eq!(cfg.controller.server_url, "http://aquapi.local:5000");
        assert_eq!(cfg.server, ServerConfig::default());
    }

    #[test]
    fn gpio_chip_override_is_optional() {
        let cfg: Config = serde_yaml::from_str("controller:\n  gpio_pin: 17\n").unwrap();
        assert!(cfg.controller.gpio_chip.is_none());
        assert!(!serde_yaml::to_string(&cfg).unwrap().contains("gpio_chip"));

        let yaml = "controller:\n  gpio_chip: /dev/gpiochip2\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            cfg.controller.gpio_chip,
            Some(PathBuf::from("/dev/gpiochip2"))
        );
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("aquapi.yaml");
        let mut cfg = Config::default();
        cfg.controller.actuator_id = Some(8);
        cfg.server.port = 8080;
        cfg.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), cfg);
    }

    #[test]
    fn load_missing_is_not_configured() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, AquapiError::NotConfigured(_)));
        let cfg = Config::load_or_default(&dir.path().join("nope.yaml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn load_or_default_surfaces_parse_errors() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "server: [not, a, map]\n").unwrap();
        assert!(matches!(
            Config::load_or_default(&path),
            Err(AquapiError::Yaml(_))
        ));
    }

    #[test]
    fn validate_defaults_only_warns_about_actuator_id() {
        let warnings = Config::default().validate();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].level, WarnLevel::Warning);
        assert!(warnings[0].message.contains("actuator_id"));
    }

    #[test]
    fn validate_flags_bad_controller_settings() {
        let mut cfg = Config::default();
        cfg.controller.actuator_id = Some(1);
        cfg.controller.server_url = "aquapi.local".to_string();
        cfg.controller.request_timeout_ms = 0;
        cfg.controller.report_attempts = 0;
        let warnings = cfg.validate();
        let errors = warnings
            .iter()
            .filter(|w| w.level == WarnLevel::Error)
            .count();
        assert_eq!(errors, 2, "{warnings:?}");
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("report_attempts=0")));
    }

    #[test]
    fn validate_warns_on_long_timeout() {
        let mut cfg = Config::default();
        cfg.controller.actuator_id = Some(1);
        cfg.controller.request_timeout_ms = 120_000;
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("request_timeout_ms"));
    }
}
