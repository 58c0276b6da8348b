//! Configuration for the fleet daemon.
//!
//! Key=value config files merged over defaults; CLI flags override both.
//! Durations are plain milliseconds so tests can shrink the simulation
//! clock without a separate time abstraction.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("invalid config line: {0}")]
    InvalidLine(String),
    #[error("invalid integer value for {key}: {value}")]
    InvalidInt { key: String, value: String },
    #[error("{key} must be at least {min}, got {value}")]
    InvalidCount { key: String, min: i64, value: i64 },
}

/// Fleet and simulation tuning.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FleetConfig {
    /// Number of worker robots to spawn (>= 1).
    pub robot_count: usize,
    /// Number of charging stations to spawn (>= 1).
    pub station_count: usize,
    /// Inventory capacity hint; overruns are logged at init, not rejected.
    pub capacity: i32,

    // Battery dynamics
    pub max_battery: i32,
    pub low_battery_threshold: i32,
    /// Mean of the uniform per-task battery drain sample.
    pub avg_battery_drain: i32,

    // Simulation clock
    pub task_duration_ms: u64,
    pub idle_poll_ms: u64,
    pub charge_tick_ms: u64,
    pub charge_per_tick: i32,
    pub charging_timeout_ms: u64,

    // File ingester (disabled unless a path is configured)
    pub request_file: Option<PathBuf>,
    pub ingest_interval_ms: u64,

    // Collaborator outputs
    pub log_dir: PathBuf,
    pub report_path: PathBuf,

    /// HTTP control API port.
    pub port: u16,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            robot_count: 3,
            station_count: 2,
            capacity: 500,
            max_battery: 100,
            low_battery_threshold: 25,
            avg_battery_drain: 40,
            task_duration_ms: 10_000,
            idle_poll_ms: 1_000,
            charge_tick_ms: 1_000,
            charge_per_tick: 10,
            charging_timeout_ms: 15_000,
            request_file: None,
            ingest_interval_ms: 5_000,
            log_dir: PathBuf::from("logs"),
            report_path: PathBuf::from("completed_report.dat"),
            port: 7200,
        }
    }
}

impl FleetConfig {
    /// Load config from a file, merging with defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.load_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and merge values from a config file.
    pub fn load_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path)?;
        self.parse_content(&content)
    }

    /// Parse config content (key=value format, `#` comments).
    fn parse_content(&mut self, content: &str) -> Result<(), ConfigError> {
        for line in content.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::InvalidLine(line.to_string()));
            };

            let key = key.trim();
            let value = Self::unquote(value.trim());
            self.apply_value(key, &value)?;
        }
        Ok(())
    }

    /// Remove surrounding quotes from a value.
    fn unquote(value: &str) -> String {
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            return value[1..value.len() - 1].to_string();
        }
        value.to_string()
    }

    fn apply_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "robot_count" => self.robot_count = Self::parse_int(key, value)?,
            "station_count" => self.station_count = Self::parse_int(key, value)?,
            "capacity" => self.capacity = Self::parse_int(key, value)?,
            "max_battery" => self.max_battery = Self::parse_int(key, value)?,
            "low_battery_threshold" => {
                self.low_battery_threshold = Self::parse_int(key, value)?;
            }
            "avg_battery_drain" => self.avg_battery_drain = Self::parse_int(key, value)?,
            "task_duration_ms" => self.task_duration_ms = Self::parse_int(key, value)?,
            "idle_poll_ms" => self.idle_poll_ms = Self::parse_int(key, value)?,
            "charge_tick_ms" => self.charge_tick_ms = Self::parse_int(key, value)?,
            "charge_per_tick" => self.charge_per_tick = Self::parse_int(key, value)?,
            "charging_timeout_ms" => self.charging_timeout_ms = Self::parse_int(key, value)?,
            "request_file" => {
                self.request_file = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                }
            }
            "ingest_interval_ms" => self.ingest_interval_ms = Self::parse_int(key, value)?,
            "log_dir" => self.log_dir = PathBuf::from(value),
            "report_path" => self.report_path = PathBuf::from(value),
            "port" => self.port = Self::parse_int(key, value)?,
            _ => {
                // Unknown keys warn but do not fail.
                eprintln!("Warning: unknown config key: {key}");
            }
        }
        Ok(())
    }

    fn parse_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
        value.parse().map_err(|_| ConfigError::InvalidInt {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    /// Reject configurations the fleet cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.robot_count < 1 {
            return Err(ConfigError::InvalidCount {
                key: "robot_count".to_string(),
                min: 1,
                value: self.robot_count as i64,
            });
        }
        if self.station_count < 1 {
            return Err(ConfigError::InvalidCount {
                key: "station_count".to_string(),
                min: 1,
                value: self.station_count as i64,
            });
        }
        if self.capacity < 0 {
            return Err(ConfigError::InvalidCount {
                key: "capacity".to_string(),
                min: 0,
                value: self.capacity as i64,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = FleetConfig::default();
        assert_eq!(config.robot_count, 3);
        assert_eq!(config.station_count, 2);
        assert_eq!(config.max_battery, 100);
        assert_eq!(config.low_battery_threshold, 25);
        assert_eq!(config.avg_battery_drain, 40);
        assert_eq!(config.task_duration_ms, 10_000);
        assert_eq!(config.charging_timeout_ms, 15_000);
        assert!(config.request_file.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_simple_config() {
        let mut config = FleetConfig::default();
        let content = r#"
# simulation sizing
robot_count=5
station_count=1
capacity=250
charging_timeout_ms=2000
request_file="pending_requests.txt"
"#;
        config.parse_content(content).unwrap();
        assert_eq!(config.robot_count, 5);
        assert_eq!(config.station_count, 1);
        assert_eq!(config.capacity, 250);
        assert_eq!(config.charging_timeout_ms, 2000);
        assert_eq!(
            config.request_file,
            Some(PathBuf::from("pending_requests.txt"))
        );
    }

    #[test]
    fn unquote_removes_quotes() {
        assert_eq!(FleetConfig::unquote("\"hello\""), "hello");
        assert_eq!(FleetConfig::unquote("'world'"), "world");
        assert_eq!(FleetConfig::unquote("noquotes"), "noquotes");
    }

    #[test]
    fn invalid_integer_is_rejected() {
        let mut config = FleetConfig::default();
        let err = config.parse_content("robot_count=lots").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidInt { .. }));
    }

    #[test]
    fn line_without_equals_is_rejected() {
        let mut config = FleetConfig::default();
        assert!(config.parse_content("robot_count 3").is_err());
    }

    #[test]
    fn validate_rejects_zero_counts() {
        let mut config = FleetConfig::default();
        config.robot_count = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidCount { .. })
        ));

        let mut config = FleetConfig::default();
        config.station_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_request_file_disables_ingester() {
        let mut config = FleetConfig::default();
        config.request_file = Some(PathBuf::from("x"));
        config.parse_content("request_file=").unwrap();
        assert!(config.request_file.is_none());
    }
}
