//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `smartpark.toml` in the working directory (or the path in
//! `SMARTPARK_CONFIG`). Every field has a sensible default so the file is
//! optional. Environment variables take precedence over file values.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use smartpark_adapter_mqtt::MqttConfig;
use smartpark_adapter_virtual::RandomDetectorConfig;
use smartpark_domain::car::CSV_DELIMITER;
use smartpark_domain::policy::{DEFAULT_CAR_MODELS, TieBreak};
use smartpark_domain::topic::{self, TopicAddress};

const DEFAULT_PATH: &str = "smartpark.toml";

/// Top-level configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub logging: LoggingConfig,
    /// What this process runs and over which transport.
    pub runtime: RuntimeConfig,
    /// Detector and parking-policy settings.
    pub simulation: SimulationConfig,
    /// Every car park with its sensors and displays.
    #[serde(default = "default_car_parks")]
    pub car_parks: Vec<CarParkConfig>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Which device roles to run, for which car park, over which transport.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Car park to run; the first configured one when unset.
    pub car_park: Option<String>,
    /// Run only this sensor, written `<name>/<type>`; every sensor when unset.
    pub sensor: Option<String>,
    pub role: Role,
    pub transport: TransportKind,
}

/// Device role run by this process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    CarPark,
    Sensor,
    Display,
    /// Car park, sensors and displays together.
    #[default]
    All,
}

impl FromStr for Role {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "carpark" => Ok(Self::CarPark),
            "sensor" => Ok(Self::Sensor),
            "display" => Ok(Self::Display),
            "all" => Ok(Self::All),
            other => Err(ConfigError::Validation(format!("unknown role {other:?}"))),
        }
    }
}

/// Transport the roles talk over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// One MQTT session per role.
    #[default]
    Mqtt,
    /// In-process broker; only meaningful with [`Role::All`].
    Memory,
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mqtt" => Ok(Self::Mqtt),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Validation(format!(
                "unknown transport {other:?}"
            ))),
        }
    }
}

/// Where sensor detections come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    #[default]
    Random,
    File,
    /// Sensors publish nothing.
    None,
}

/// Simulation settings shared by every role.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub detector: DetectorKind,
    /// `Signal,Temperature` lines replayed by the file detector.
    pub signals_file: PathBuf,
    /// Seed for the parking policy and the random detector; entropy when unset.
    pub seed: Option<u64>,
    pub lower_temperature: i32,
    pub upper_temperature: i32,
    pub enter_probability: f64,
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
    pub car_models: Vec<String>,
    pub tie_break: TieBreak,
    /// Displays also append every snapshot to this file when set.
    pub record_file: Option<PathBuf>,
}

/// One car park as written in the file.
#[derive(Debug, Clone, Deserialize)]
pub struct CarParkConfig {
    pub name: String,
    pub location: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(rename = "topic-root")]
    pub topic_root: String,
    pub total_bays: u32,
    #[serde(default)]
    pub sensors: Vec<SensorConfig>,
    #[serde(default)]
    pub displays: Vec<DisplayConfig>,
}

/// A sensor entry of a car park.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    pub name: String,
    pub location: String,
    /// `entry` or `exit`; becomes the topic qualifier.
    #[serde(rename = "type")]
    pub kind: String,
}

/// A display entry of a car park.
#[derive(Debug, Clone, Deserialize)]
pub struct DisplayConfig {
    pub name: String,
    /// Defaults to the car park's location.
    pub location: Option<String>,
}

/// A sensor or display resolved against its car park: full topic address
/// plus the broker it talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub address: TopicAddress,
    pub host: String,
    pub port: u16,
}

impl DeviceConfig {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.address.name
    }

    #[must_use]
    pub fn qualifier(&self) -> &str {
        &self.address.qualifier
    }

    #[must_use]
    pub fn topic(&self) -> String {
        self.address.topic()
    }

    /// MQTT settings for this device's own session.
    #[must_use]
    pub fn mqtt(&self, client_id: impl Into<String>) -> MqttConfig {
        MqttConfig {
            host: self.host.clone(),
            port: self.port,
            client_id: client_id.into(),
            ..MqttConfig::default()
        }
    }
}

impl CarParkConfig {
    #[must_use]
    pub fn total_bays(&self) -> usize {
        usize::try_from(self.total_bays).unwrap_or(usize::MAX)
    }

    /// `<root>/<location>/<name>/display`
    #[must_use]
    pub fn display_topic(&self) -> String {
        topic::topic(&self.topic_root, &self.location, &self.name, topic::DISPLAY)
    }

    fn device(&self, name: &str, location: &str, qualifier: &str) -> DeviceConfig {
        DeviceConfig {
            address: TopicAddress::new(&self.topic_root, location, name, qualifier),
            host: self.host.clone(),
            port: self.port,
        }
    }

    /// MQTT settings for one session against this car park's broker.
    #[must_use]
    pub fn mqtt(&self, client_id: impl Into<String>) -> MqttConfig {
        MqttConfig {
            host: self.host.clone(),
            port: self.port,
            client_id: client_id.into(),
            ..MqttConfig::default()
        }
    }
}

impl Config {
    /// Load configuration from `smartpark.toml` (or `SMARTPARK_CONFIG`) if
    /// present, then apply environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("SMARTPARK_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    /// Apply overrides looked up by variable name.
    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = lookup("SMARTPARK_CAR_PARK") {
            self.runtime.car_park = Some(val);
        }
        if let Some(val) = lookup("SMARTPARK_SENSOR") {
            self.runtime.sensor = Some(val);
        }
        if let Some(val) = lookup("SMARTPARK_ROLE") {
            self.runtime.role = val.parse()?;
        }
        if let Some(val) = lookup("SMARTPARK_TRANSPORT") {
            self.runtime.transport = val.parse()?;
        }
        if let Some(val) = lookup("SMARTPARK_MQTT_HOST") {
            for car_park in &mut self.car_parks {
                car_park.host.clone_from(&val);
            }
        }
        if let Some(val) = lookup("SMARTPARK_MQTT_PORT") {
            let port = val.parse().map_err(|_| {
                ConfigError::Validation(format!("SMARTPARK_MQTT_PORT is not a port: {val:?}"))
            })?;
            for car_park in &mut self.car_parks {
                car_park.port = port;
            }
        }
        if let Some(val) = lookup("SMARTPARK_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = lookup("RUST_LOG") {
            self.logging.filter = val;
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.car_parks.is_empty() {
            return Err(ConfigError::Validation(
                "at least one car park must be configured".to_string(),
            ));
        }
        for (index, car_park) in self.car_parks.iter().enumerate() {
            if car_park.port == 0 {
                return Err(ConfigError::Validation(format!(
                    "car park {:?}: port must be non-zero",
                    car_park.name
                )));
            }
            if self.car_parks[..index]
                .iter()
                .any(|other| other.name == car_park.name)
            {
                return Err(ConfigError::Validation(format!(
                    "car park {:?} is configured twice",
                    car_park.name
                )));
            }
            if let Some(sensor) = car_park
                .sensors
                .iter()
                .find(|s| s.kind != topic::ENTRY && s.kind != topic::EXIT)
            {
                return Err(ConfigError::Validation(format!(
                    "sensor {:?}: type must be \"entry\" or \"exit\", got {:?}",
                    sensor.name, sensor.kind
                )));
            }
        }

        let sim = &self.simulation;
        if sim.min_interval_ms > sim.max_interval_ms {
            return Err(ConfigError::Validation(
                "min_interval_ms must not exceed max_interval_ms".to_string(),
            ));
        }
        if sim.lower_temperature > sim.upper_temperature {
            return Err(ConfigError::Validation(
                "lower_temperature must not exceed upper_temperature".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&sim.enter_probability) {
            return Err(ConfigError::Validation(
                "enter_probability must be within [0, 1]".to_string(),
            ));
        }
        if sim.car_models.is_empty() {
            return Err(ConfigError::Validation(
                "car_models must not be empty".to_string(),
            ));
        }
        if let Some(model) = sim.car_models.iter().find(|m| m.contains(CSV_DELIMITER)) {
            return Err(ConfigError::Validation(format!(
                "car model {model:?} must not contain {CSV_DELIMITER:?}"
            )));
        }
        if self.runtime.transport == TransportKind::Memory && self.runtime.role != Role::All {
            return Err(ConfigError::Validation(
                "the memory transport only works with role \"all\"".to_string(),
            ));
        }
        let car_park = self.selected_car_park()?;
        self.selected_sensors(&car_park.name)?;
        Ok(())
    }

    #[must_use]
    pub fn car_park_names(&self) -> Vec<&str> {
        self.car_parks.iter().map(|c| c.name.as_str()).collect()
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCarPark`] when no car park is called `name`.
    pub fn car_park(&self, name: &str) -> Result<&CarParkConfig, ConfigError> {
        self.car_parks
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ConfigError::UnknownCarPark(name.to_string()))
    }

    /// The car park this process runs: `runtime.car_park`, or the first one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCarPark`] when the selected name is not
    /// configured.
    pub fn selected_car_park(&self) -> Result<&CarParkConfig, ConfigError> {
        match &self.runtime.car_park {
            Some(name) => self.car_park(name),
            None => self
                .car_parks
                .first()
                .ok_or_else(|| ConfigError::UnknownCarPark(String::new())),
        }
    }

    /// Sensors of `name`, qualified by their type.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCarPark`] when no car park is called `name`.
    pub fn sensor_configs(&self, name: &str) -> Result<Vec<DeviceConfig>, ConfigError> {
        let car_park = self.car_park(name)?;
        Ok(car_park
            .sensors
            .iter()
            .map(|s| car_park.device(&s.name, &s.location, &s.kind))
            .collect())
    }

    /// Displays of `name`, qualified `na`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCarPark`] when no car park is called `name`.
    pub fn display_configs(&self, name: &str) -> Result<Vec<DeviceConfig>, ConfigError> {
        let car_park = self.car_park(name)?;
        Ok(car_park
            .displays
            .iter()
            .map(|d| {
                let location = d.location.as_deref().unwrap_or(&car_park.location);
                car_park.device(&d.name, location, topic::NA)
            })
            .collect())
    }

    /// Topics the sensors of `name` publish on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCarPark`] when no car park is called `name`.
    pub fn sensor_pub_topics(&self, name: &str) -> Result<Vec<String>, ConfigError> {
        Ok(self
            .sensor_configs(name)?
            .iter()
            .map(DeviceConfig::topic)
            .collect())
    }

    /// Topic the car park `name` publishes snapshots on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCarPark`] when no car park is called `name`.
    pub fn display_topic(&self, name: &str) -> Result<String, ConfigError> {
        Ok(self.car_park(name)?.display_topic())
    }

    /// Look up one sensor by name and type.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCarPark`] when no car park is called `name`.
    pub fn sensor_config(
        &self,
        name: &str,
        sensor_name: &str,
        kind: &str,
    ) -> Result<Option<DeviceConfig>, ConfigError> {
        Ok(self
            .sensor_configs(name)?
            .into_iter()
            .find(|s| s.name() == sensor_name && s.qualifier() == kind))
    }
}

impl Config {
    /// Sensors of `name` this process runs: the one named by
    /// `runtime.sensor`, or all of them.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownCarPark`] for an unknown car park and
    /// [`ConfigError::Validation`] when the selected sensor is malformed or
    /// not configured.
    pub fn selected_sensors(&self, name: &str) -> Result<Vec<DeviceConfig>, ConfigError> {
        let Some(selector) = &self.runtime.sensor else {
            return self.sensor_configs(name);
        };
        let (sensor_name, kind) = selector.split_once('/').ok_or_else(|| {
            ConfigError::Validation(format!(
                "sensor selector must be <name>/<type>, got {selector:?}"
            ))
        })?;
        let sensor = self.sensor_config(name, sensor_name, kind)?.ok_or_else(|| {
            ConfigError::Validation(format!("sensor {selector:?} is not configured in {name:?}"))
        })?;
        Ok(vec![sensor])
    }
}

impl SimulationConfig {
    #[must_use]
    pub fn random_detector(&self) -> RandomDetectorConfig {
        RandomDetectorConfig {
            lower_temperature: self.lower_temperature,
            upper_temperature: self.upper_temperature,
            enter_probability: self.enter_probability,
            min_interval: Duration::from_millis(self.min_interval_ms),
            max_interval: Duration::from_millis(self.max_interval_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            runtime: RuntimeConfig::default(),
            simulation: SimulationConfig::default(),
            car_parks: default_car_parks(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "smartparkd=info,smartpark=info".to_string(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            detector: DetectorKind::Random,
            signals_file: PathBuf::from("signals.txt"),
            seed: None,
            lower_temperature: 20,
            upper_temperature: 30,
            enter_probability: 0.6,
            min_interval_ms: 40,
            max_interval_ms: 500,
            car_models: DEFAULT_CAR_MODELS.iter().map(ToString::to_string).collect(),
            tie_break: TieBreak::UniformRandom,
            record_file: None,
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_car_parks() -> Vec<CarParkConfig> {
    vec![CarParkConfig {
        name: "carpark1".to_string(),
        location: "Moondaloop Park".to_string(),
        host: default_host(),
        port: default_port(),
        topic_root: "carpark1".to_string(),
        total_bays: 5,
        sensors: vec![
            SensorConfig {
                name: "sensor1".to_string(),
                location: "L306".to_string(),
                kind: topic::ENTRY.to_string(),
            },
            SensorConfig {
                name: "sensor2".to_string(),
                location: "L306".to_string(),
                kind: topic::EXIT.to_string(),
            },
        ],
        displays: vec![DisplayConfig {
            name: "display1".to_string(),
            location: None,
        }],
    }]
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
    /// The named car park is not in the configuration.
    #[error("car park {0:?} is not configured")]
    UnknownCarPark(String),
}
