//! GrumpyBin configuration.
//!
//! Configuration is loaded from environment variables. The database
//! connection string is redacted in Debug output.

use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default pub/sub broker host.
pub const DEFAULT_BROKER_HOST: &str = "localhost";

/// Default broker port for MQTT.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Default broker port for Redis pub/sub.
pub const DEFAULT_REDIS_PORT: u16 = 6379;

/// Default control-plane topic.
pub const DEFAULT_BROKER_TOPIC: &str = "grumpybin/lines";

/// Default path of the lines file for the file backend.
pub const DEFAULT_LINES_FILE: &str = "lines";

/// Default sensor polling interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default distance below which a person counts as detected.
pub const DEFAULT_ACTIVATION_THRESHOLD_CM: f64 = 40.0;

/// Default minimum time between two threshold-policy activations.
pub const DEFAULT_ACTIVATION_COOLDOWN_SECONDS: u64 = 5;

/// Default number of actuator pulses per sequence.
pub const DEFAULT_PULSE_COUNT: u32 = 6;

/// Default time the actuator output is held high per pulse.
pub const DEFAULT_PULSE_HOLD_MS: u64 = 100;

/// Default pause between two pulses.
pub const DEFAULT_PULSE_PAUSE_MS: u64 = 400;

/// Default GPIO value file driving the solenoid.
pub const DEFAULT_ACTUATOR_GPIO_PATH: &str = "/sys/class/gpio/gpio17/value";

/// Default text-to-speech program.
pub const DEFAULT_SPEECH_COMMAND: &str = "espeak-ng";

/// Default text-to-speech voice.
pub const DEFAULT_SPEECH_VOICE: &str = "de";

/// Default delay before the control plane resubscribes after losing its stream.
pub const DEFAULT_RESUBSCRIBE_BACKOFF_SECONDS: u64 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Pub/sub broker protocol selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerKind {
    Mqtt,
    Redis,
}

impl BrokerKind {
    /// Well-known port for the protocol.
    #[must_use]
    pub const fn default_port(&self) -> u16 {
        match self {
            Self::Mqtt => DEFAULT_MQTT_PORT,
            Self::Redis => DEFAULT_REDIS_PORT,
        }
    }
}

impl FromStr for BrokerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MQTT" => Ok(Self::Mqtt),
            "REDIS" => Ok(Self::Redis),
            _ => Err(ConfigError::InvalidValue(format!(
                "BROKER must be MQTT or REDIS, got '{s}'"
            ))),
        }
    }
}

impl fmt::Display for BrokerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mqtt => f.write_str("MQTT"),
            Self::Redis => f.write_str("REDIS"),
        }
    }
}

/// Line store backend selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackendKind {
    File,
    Database,
}

impl FromStr for StorageBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FILE" => Ok(Self::File),
            "DATABASE" => Ok(Self::Database),
            _ => Err(ConfigError::InvalidValue(format!(
                "STORAGE_BACKEND must be FILE or DATABASE, got '{s}'"
            ))),
        }
    }
}

impl fmt::Display for StorageBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("FILE"),
            Self::Database => f.write_str("DATABASE"),
        }
    }
}

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    /// Default `EnvFilter` directive when `RUST_LOG` is not set.
    #[must_use]
    pub const fn filter_directive(&self) -> &'static str {
        match self {
            Self::Debug => "grumpybin=debug",
            Self::Info => "grumpybin=info",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            _ => Err(ConfigError::InvalidValue(format!(
                "LOG_LEVEL must be DEBUG or INFO, got '{s}'"
            ))),
        }
    }
}

/// Sensor driver selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorKind {
    /// Keyboard trigger: every line typed on stdin counts as presence.
    Stdin,
    /// Distance in cm read from a file on every poll.
    File { path: String },
}

/// Actuator driver selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActuatorKind {
    /// Trace output levels only.
    Log,
    /// Write `1`/`0` to a sysfs GPIO value file.
    Gpio { path: String },
}

/// Fire policy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationPolicyKind {
    Edge,
    Threshold,
}

impl FromStr for ActivationPolicyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EDGE" => Ok(Self::Edge),
            "THRESHOLD" => Ok(Self::Threshold),
            _ => Err(ConfigError::InvalidValue(format!(
                "ACTIVATION_POLICY must be EDGE or THRESHOLD, got '{s}'"
            ))),
        }
    }
}

/// GrumpyBin configuration.
#[derive(Clone)]
pub struct Config {
    /// Pub/sub broker protocol (default: MQTT).
    pub broker: BrokerKind,

    /// Pub/sub broker host (default: "localhost").
    pub broker_host: String,

    /// Pub/sub broker port (default: 1883 for MQTT, 6379 for Redis).
    pub broker_port: u16,

    /// Topic carrying both requests and responses.
    pub broker_topic: String,

    /// Selected line store backend.
    pub storage_backend: StorageBackendKind,

    /// Lines file for the file backend.
    pub lines_file: String,

    /// Database connection string, present iff the backend is DATABASE.
    /// Protected by `SecretString` to prevent accidental logging.
    pub database_connection_string: Option<SecretString>,

    /// Log verbosity used when `RUST_LOG` is unset.
    pub log_level: LogLevel,

    pub sensor: SensorKind,
    pub activation_policy: ActivationPolicyKind,
    pub poll_interval: Duration,
    pub activation_threshold_cm: f64,
    pub activation_cooldown: Duration,

    pub actuator: ActuatorKind,
    pub pulse_count: u32,
    pub pulse_hold: Duration,
    pub pulse_pause: Duration,

    pub speech_command: String,
    pub speech_voice: String,

    /// Delay before resubscribing after the inbound stream ends.
    pub resubscribe_backoff: Duration,

    /// Prometheus listener address; metrics export is disabled when unset.
    pub metrics_bind_address: Option<String>,
}

/// Custom Debug implementation that redacts sensitive fields.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("broker", &self.broker)
            .field("broker_host", &self.broker_host)
            .field("broker_port", &self.broker_port)
            .field("broker_topic", &self.broker_topic)
            .field("storage_backend", &self.storage_backend)
            .field("lines_file", &self.lines_file)
            .field(
                "database_connection_string",
                &self.database_connection_string.as_ref().map(|_| "[REDACTED]"),
            )
            .field("log_level", &self.log_level)
            .field("sensor", &self.sensor)
            .field("activation_policy", &self.activation_policy)
            .field("poll_interval", &self.poll_interval)
            .field("activation_threshold_cm", &self.activation_threshold_cm)
            .field("activation_cooldown", &self.activation_cooldown)
            .field("actuator", &self.actuator)
            .field("pulse_count", &self.pulse_count)
            .field("pulse_hold", &self.pulse_hold)
            .field("pulse_pause", &self.pulse_pause)
            .field("speech_command", &self.speech_command)
            .field("speech_voice", &self.speech_voice)
            .field("resubscribe_backoff", &self.resubscribe_backoff)
            .field("metrics_bind_address", &self.metrics_bind_address)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let broker = vars
            .get("BROKER")
            .map(|s| s.parse::<BrokerKind>())
            .transpose()?
            .unwrap_or(BrokerKind::Mqtt);

        // Older deployments set MQTT_BROKER/MQTT_PORT/MQTT_TOPIC
        let broker_host = lookup(vars, "BROKER_HOST", "MQTT_BROKER")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BROKER_HOST.to_string());

        let broker_port = lookup(vars, "BROKER_PORT", "MQTT_PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| broker.default_port());

        let broker_topic = lookup(vars, "BROKER_TOPIC", "MQTT_TOPIC")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BROKER_TOPIC.to_string());

        let storage_backend = vars
            .get("STORAGE_BACKEND")
            .map(|s| s.parse::<StorageBackendKind>())
            .transpose()?
            .unwrap_or(StorageBackendKind::File);

        let lines_file = vars
            .get("LINES_FILE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LINES_FILE.to_string());

        // Only required (and only read) for the database backend
        let database_connection_string = match storage_backend {
            StorageBackendKind::File => None,
            StorageBackendKind::Database => Some(SecretString::from(
                vars.get("DATABASE_CONNECTION_STRING")
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        ConfigError::MissingEnvVar("DATABASE_CONNECTION_STRING".to_string())
                    })?
                    .clone(),
            )),
        };

        let log_level = vars
            .get("LOG_LEVEL")
            .map(|s| s.parse::<LogLevel>())
            .transpose()?
            .unwrap_or(LogLevel::Info);

        let sensor = match vars.get("SENSOR").map(|s| s.to_ascii_uppercase()).as_deref() {
            None | Some("STDIN") => SensorKind::Stdin,
            Some("FILE") => SensorKind::File {
                path: vars
                    .get("SENSOR_PATH")
                    .cloned()
                    .ok_or_else(|| ConfigError::MissingEnvVar("SENSOR_PATH".to_string()))?,
            },
            Some(other) => {
                return Err(ConfigError::InvalidValue(format!(
                    "SENSOR must be STDIN or FILE, got '{other}'"
                )))
            }
        };

        let activation_policy = vars
            .get("ACTIVATION_POLICY")
            .map(|s| s.parse::<ActivationPolicyKind>())
            .transpose()?
            .unwrap_or(ActivationPolicyKind::Edge);

        let poll_interval = Duration::from_millis(
            vars.get("POLL_INTERVAL_MS")
                .and_then(|s| s.parse().ok())
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
        );

        let activation_threshold_cm = vars
            .get("ACTIVATION_THRESHOLD_CM")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_ACTIVATION_THRESHOLD_CM);

        let activation_cooldown = Duration::from_secs(
            vars.get("ACTIVATION_COOLDOWN_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_ACTIVATION_COOLDOWN_SECONDS),
        );

        let actuator = match vars.get("ACTUATOR").map(|s| s.to_ascii_uppercase()).as_deref() {
            None | Some("LOG") => ActuatorKind::Log,
            Some("GPIO") => ActuatorKind::Gpio {
                path: vars
                    .get("ACTUATOR_GPIO_PATH")
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_ACTUATOR_GPIO_PATH.to_string()),
            },
            Some(other) => {
                return Err(ConfigError::InvalidValue(format!(
                    "ACTUATOR must be LOG or GPIO, got '{other}'"
                )))
            }
        };

        let pulse_count = vars
            .get("PULSE_COUNT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PULSE_COUNT);

        let pulse_hold = Duration::from_millis(
            vars.get("PULSE_HOLD_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PULSE_HOLD_MS),
        );

        let pulse_pause = Duration::from_millis(
            vars.get("PULSE_PAUSE_MS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PULSE_PAUSE_MS),
        );

        let speech_command = vars
            .get("SPEECH_COMMAND")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SPEECH_COMMAND.to_string());

        let speech_voice = vars
            .get("SPEECH_VOICE")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SPEECH_VOICE.to_string());

        let resubscribe_backoff = Duration::from_secs(
            vars.get("RESUBSCRIBE_BACKOFF_SECONDS")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_RESUBSCRIBE_BACKOFF_SECONDS),
        );

        let metrics_bind_address = vars
            .get("METRICS_BIND_ADDRESS")
            .filter(|s| !s.is_empty())
            .cloned();

        Ok(Config {
            broker,
            broker_host,
            broker_port,
            broker_topic,
            storage_backend,
            lines_file,
            database_connection_string,
            log_level,
            sensor,
            activation_policy,
            poll_interval,
            activation_threshold_cm,
            activation_cooldown,
            actuator,
            pulse_count,
            pulse_hold,
            pulse_pause,
            speech_command,
            speech_voice,
            resubscribe_backoff,
            metrics_bind_address,
        })
    }

    /// Broker URL in the form the Redis client expects.
    #[must_use]
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}", self.broker_host, self.broker_port)
    }
}

/// Value of `name`, falling back to `alias`.
fn lookup<'a>(vars: &'a HashMap<String, String>, name: &str, alias: &str) -> Option<&'a String> {
    vars.get(name).or_else(|| vars.get(alias))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&HashMap::new()).expect("Config should load successfully");

        assert_eq!(config.broker, BrokerKind::Mqtt);
        assert_eq!(config.broker_host, DEFAULT_BROKER_HOST);
        assert_eq!(config.broker_port, DEFAULT_MQTT_PORT);
        assert_eq!(config.broker_topic, DEFAULT_BROKER_TOPIC);
        assert_eq!(config.storage_backend, StorageBackendKind::File);
        assert_eq!(config.lines_file, DEFAULT_LINES_FILE);
        assert!(config.database_connection_string.is_none());
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.sensor, SensorKind::Stdin);
        assert_eq!(config.activation_policy, ActivationPolicyKind::Edge);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert!((config.activation_threshold_cm - 40.0).abs() < f64::EPSILON);
        assert_eq!(config.activation_cooldown, Duration::from_secs(5));
        assert_eq!(config.actuator, ActuatorKind::Log);
        assert_eq!(config.pulse_count, 6);
        assert_eq!(config.pulse_hold, Duration::from_millis(100));
        assert_eq!(config.pulse_pause, Duration::from_millis(400));
        assert_eq!(config.speech_command, DEFAULT_SPEECH_COMMAND);
        assert_eq!(config.speech_voice, DEFAULT_SPEECH_VOICE);
        assert!(config.metrics_bind_address.is_none());
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let config = Config::from_vars(&vars(&[
            ("BROKER", "redis"),
            ("BROKER_HOST", "broker.local"),
            ("BROKER_PORT", "6380"),
            ("BROKER_TOPIC", "bins/kitchen"),
            ("LINES_FILE", "/var/lib/grumpybin/lines"),
            ("LOG_LEVEL", "debug"),
            ("SENSOR", "file"),
            ("SENSOR_PATH", "/run/hcsr04/distance"),
            ("ACTIVATION_POLICY", "THRESHOLD"),
            ("POLL_INTERVAL_MS", "250"),
            ("ACTIVATION_THRESHOLD_CM", "55.5"),
            ("ACTIVATION_COOLDOWN_SECONDS", "10"),
            ("ACTUATOR", "GPIO"),
            ("ACTUATOR_GPIO_PATH", "/sys/class/gpio/gpio27/value"),
            ("PULSE_COUNT", "3"),
            ("METRICS_BIND_ADDRESS", "0.0.0.0:9100"),
        ]))
        .expect("Config should load successfully");

        assert_eq!(config.broker, BrokerKind::Redis);
        assert_eq!(config.redis_url(), "redis://broker.local:6380");
        assert_eq!(config.broker_topic, "bins/kitchen");
        assert_eq!(config.lines_file, "/var/lib/grumpybin/lines");
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(
            config.sensor,
            SensorKind::File {
                path: "/run/hcsr04/distance".to_string()
            }
        );
        assert_eq!(config.activation_policy, ActivationPolicyKind::Threshold);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert!((config.activation_threshold_cm - 55.5).abs() < f64::EPSILON);
        assert_eq!(config.activation_cooldown, Duration::from_secs(10));
        assert_eq!(
            config.actuator,
            ActuatorKind::Gpio {
                path: "/sys/class/gpio/gpio27/value".to_string()
            }
        );
        assert_eq!(config.pulse_count, 3);
        assert_eq!(config.metrics_bind_address.as_deref(), Some("0.0.0.0:9100"));
    }

    #[test]
    fn test_unparsable_numbers_fall_back_to_defaults() {
        let config = Config::from_vars(&vars(&[
            ("BROKER_PORT", "not-a-port"),
            ("POLL_INTERVAL_MS", "0"),
            ("PULSE_COUNT", "-2"),
        ]))
        .unwrap();

        assert_eq!(config.broker_port, DEFAULT_MQTT_PORT);
        assert_eq!(config.poll_interval, Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));
        assert_eq!(config.pulse_count, DEFAULT_PULSE_COUNT);
    }

    #[test]
    fn test_redis_broker_defaults_to_redis_port() {
        let config = Config::from_vars(&vars(&[("BROKER", "REDIS")])).unwrap();

        assert_eq!(config.broker_port, DEFAULT_REDIS_PORT);
        assert_eq!(config.redis_url(), "redis://localhost:6379");
    }

    #[test]
    fn test_mqtt_variable_names_are_accepted() {
        let config = Config::from_vars(&vars(&[
            ("MQTT_BROKER", "mosquitto.local"),
            ("MQTT_PORT", "8883"),
            ("MQTT_TOPIC", "bins/garage"),
        ]))
        .unwrap();

        assert_eq!(config.broker, BrokerKind::Mqtt);
        assert_eq!(config.broker_host, "mosquitto.local");
        assert_eq!(config.broker_port, 8883);
        assert_eq!(config.broker_topic, "bins/garage");
    }

    #[test]
    fn test_broker_variables_win_over_mqtt_names() {
        let config = Config::from_vars(&vars(&[
            ("BROKER_HOST", "primary"),
            ("MQTT_BROKER", "legacy"),
            ("BROKER_TOPIC", "bins/new"),
            ("MQTT_TOPIC", "bins/old"),
        ]))
        .unwrap();

        assert_eq!(config.broker_host, "primary");
        assert_eq!(config.broker_topic, "bins/new");
    }

    #[test]
    fn test_database_backend_requires_connection_string() {
        let result = Config::from_vars(&vars(&[("STORAGE_BACKEND", "DATABASE")]));
        assert!(
            matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "DATABASE_CONNECTION_STRING")
        );

        let config = Config::from_vars(&vars(&[
            ("STORAGE_BACKEND", "database"),
            ("DATABASE_CONNECTION_STRING", "postgres://bin:pw@db/grumpybin"),
        ]))
        .unwrap();
        assert_eq!(config.storage_backend, StorageBackendKind::Database);
        assert_eq!(
            config
                .database_connection_string
                .as_ref()
                .unwrap()
                .expose_secret(),
            "postgres://bin:pw@db/grumpybin"
        );
    }

    #[test]
    fn test_invalid_selectors_rejected() {
        assert!(matches!(
            Config::from_vars(&vars(&[("STORAGE_BACKEND", "S3")])),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            Config::from_vars(&vars(&[("LOG_LEVEL", "TRACE")])),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            Config::from_vars(&vars(&[("ACTIVATION_POLICY", "sometimes")])),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            Config::from_vars(&vars(&[("BROKER", "amqp")])),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            Config::from_vars(&vars(&[("ACTUATOR", "relay")])),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_file_sensor_requires_path() {
        let result = Config::from_vars(&vars(&[("SENSOR", "FILE")]));
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "SENSOR_PATH"));
    }

    #[test]
    fn test_debug_redacts_sensitive_fields() {
        let config = Config::from_vars(&vars(&[
            ("STORAGE_BACKEND", "DATABASE"),
            ("DATABASE_CONNECTION_STRING", "postgres://bin:hunter2@db/grumpybin"),
        ]))
        .unwrap();

        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2"));
        assert!(!debug_output.contains("postgres://"));
    }
}
