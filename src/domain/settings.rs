use crate::domain::models::{AddressParseError, DeviceAddress};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Written out when no config file exists yet
pub const CONFIG_TEMPLATE: &str = r#"led_mac: "" # The BLE MAC address of the LED strip, e.g. BE:EF:00:12:34:56
gatt_char_uuid: "0000fff3-0000-1000-8000-00805f9b34fb" # The characteristic that accepts command frames
connection_timeout_sec: 30 # How long to look for the LED strip at led_mac
connection_retries: 50 # How many discover + connect attempts to make before giving up
"#;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no config found, a template was written to {0}; please configure it and start again")]
    TemplateCreated(PathBuf),
    #[error("could not access config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid led_mac: {0}")]
    InvalidAddress(#[from] AddressParseError),
    #[error("invalid gatt_char_uuid `{value}`: {source}")]
    InvalidUuid {
        value: String,
        #[source]
        source: uuid::Error,
    },
    #[error("{field} must be greater than zero")]
    NotPositive { field: &'static str },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "minutely", "never"
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_false(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_target: default_false(),
            ansi_colors: default_true(),
            rotation: default_rotation(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    dirs::data_local_dir()
        .map(|dir| dir.join("ble-ledstrip").join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"))
        .to_string_lossy()
        .into_owned()
}
fn default_prefix() -> String {
    "ble-ledstrip".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub led_mac: String,
    #[serde(default = "default_char_uuid")]
    pub gatt_char_uuid: String,
    #[serde(default = "default_timeout_sec")]
    pub connection_timeout_sec: u64,
    #[serde(default = "default_retries")]
    pub connection_retries: u32,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            led_mac: String::new(),
            gatt_char_uuid: default_char_uuid(),
            connection_timeout_sec: default_timeout_sec(),
            connection_retries: default_retries(),
            log_settings: LogSettings::default(),
        }
    }
}

fn default_char_uuid() -> String {
    "0000fff3-0000-1000-8000-00805f9b34fb".to_string()
}
fn default_timeout_sec() -> u64 {
    30
}
fn default_retries() -> u32 {
    50
}

impl Config {
    /// Load and validate the config at `path`.
    ///
    /// A missing file is replaced by [`CONFIG_TEMPLATE`] and reported as
    /// [`ConfigError::TemplateCreated`].
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            Self::write_template(path)?;
            return Err(ConfigError::TemplateCreated(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn write_template(path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, CONFIG_TEMPLATE).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.device_address()?;
        self.characteristic_uuid()?;
        if self.connection_timeout_sec == 0 {
            return Err(ConfigError::NotPositive {
                field: "connection_timeout_sec",
            });
        }
        if self.connection_retries == 0 {
            return Err(ConfigError::NotPositive {
                field: "connection_retries",
            });
        }
        Ok(())
    }

    pub fn device_address(&self) -> Result<DeviceAddress, ConfigError> {
        Ok(self.led_mac.parse()?)
    }

    pub fn characteristic_uuid(&self) -> Result<Uuid, ConfigError> {
        Uuid::parse_str(self.gatt_char_uuid.trim()).map_err(|source| ConfigError::InvalidUuid {
            value: self.gatt_char_uuid.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.yml");
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_missing_config_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yml");

        let err = Config::load_or_create(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TemplateCreated(ref p) if p == &path));
        assert_eq!(fs::read_to_string(&path).unwrap(), CONFIG_TEMPLATE);

        // The untouched template still needs an address
        let err = Config::load_or_create(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidAddress(AddressParseError::Empty)
        ));
    }

    #[test]
    fn test_template_parses_to_defaults() {
        let config: Config = serde_yaml::from_str(CONFIG_TEMPLATE).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_valid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "led_mac: \"BE:EF:00:12:34:56\"\nconnection_timeout_sec: 5\nconnection_retries: 2\nlog_settings:\n  level: debug\n",
        );

        let config = Config::load_or_create(&path).unwrap();
        assert_eq!(config.connection_timeout_sec, 5);
        assert_eq!(config.connection_retries, 2);
        assert_eq!(config.gatt_char_uuid, default_char_uuid());
        assert_eq!(config.log_settings.level, "debug");
        assert!(config.log_settings.console_logging_enabled);
        assert_eq!(
            config.device_address().unwrap().octets(),
            [0xbe, 0xef, 0x00, 0x12, 0x34, 0x56]
        );
    }

    #[test]
    fn test_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();

        let path = write_config(&dir, "led_mac: \"BE:EF:00:12:34:56\"\nconnection_retries: 0\n");
        assert!(matches!(
            Config::load_or_create(&path),
            Err(ConfigError::NotPositive {
                field: "connection_retries"
            })
        ));

        let path = write_config(
            &dir,
            "led_mac: \"BE:EF:00:12:34:56\"\ngatt_char_uuid: \"not-a-uuid\"\n",
        );
        assert!(matches!(
            Config::load_or_create(&path),
            Err(ConfigError::InvalidUuid { .. })
        ));

        let path = write_config(&dir, "led_mac: [1, 2\n");
        assert!(matches!(
            Config::load_or_create(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
