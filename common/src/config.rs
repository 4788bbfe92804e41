use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

fn invalid(field: &'static str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid { field, reason }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// How long an externally set value stays in effect.
    pub validity_ms: u64,
    pub heating_curve_slope: f32,
    /// Outdoor temperature at which the heat pump enters summer mode and
    /// stops P1. Zero or negative disables the freeze guard.
    pub summer_temperature_limit: f32,
    pub indoor_temperature_weight: f32,
    pub default_indoor_temperature_target: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            validity_ms: 900_000,
            heating_curve_slope: 4.0,
            summer_temperature_limit: -1.0,
            indoor_temperature_weight: 1.0,
            default_indoor_temperature_target: 20.0,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.validity_ms == 0 {
            return Err(invalid("controller.validity_ms", "must be positive"));
        }
        if !self.heating_curve_slope.is_finite() || self.heating_curve_slope <= 0.0 {
            return Err(invalid(
                "controller.heating_curve_slope",
                "must be a positive number",
            ));
        }
        if !self.summer_temperature_limit.is_finite() {
            return Err(invalid("controller.summer_temperature_limit", "must be finite"));
        }
        if !self.indoor_temperature_weight.is_finite() {
            return Err(invalid("controller.indoor_temperature_weight", "must be finite"));
        }
        if !self.default_indoor_temperature_target.is_finite() {
            return Err(invalid(
                "controller.default_indoor_temperature_target",
                "must be finite",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThermistorConfig {
    pub adc_channel: u8,
    /// Fixed resistor between the ADC node and ground.
    pub reference_ohms: f32,
}

/// Fields left out of a channel section keep that channel's default.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ThermistorPatch {
    adc_channel: Option<u8>,
    reference_ohms: Option<f32>,
}

impl ThermistorPatch {
    fn apply(self, base: ThermistorConfig) -> ThermistorConfig {
        ThermistorConfig {
            adc_channel: self.adc_channel.unwrap_or(base.adc_channel),
            reference_ohms: self.reference_ohms.unwrap_or(base.reference_ohms),
        }
    }
}

fn default_outdoor_sensor() -> ThermistorConfig {
    ThermistorConfig {
        adc_channel: 0,
        reference_ohms: 10_000.0,
    }
}

fn default_boiler_sensor() -> ThermistorConfig {
    ThermistorConfig {
        adc_channel: 1,
        reference_ohms: 2_200.0,
    }
}

fn outdoor_sensor<'de, D: Deserializer<'de>>(d: D) -> Result<ThermistorConfig, D::Error> {
    ThermistorPatch::deserialize(d).map(|patch| patch.apply(default_outdoor_sensor()))
}

fn boiler_sensor<'de, D: Deserializer<'de>>(d: D) -> Result<ThermistorConfig, D::Error> {
    ThermistorPatch::deserialize(d).map(|patch| patch.apply(default_boiler_sensor()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    /// Moving-average window in samples.
    pub filter_window: usize,
    #[serde(deserialize_with = "outdoor_sensor")]
    pub outdoor: ThermistorConfig,
    #[serde(deserialize_with = "boiler_sensor")]
    pub boiler: ThermistorConfig,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            filter_window: 600,
            outdoor: default_outdoor_sensor(),
            boiler: default_boiler_sensor(),
        }
    }
}

impl SensorsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filter_window == 0 {
            return Err(invalid("sensors.filter_window", "must be at least 1"));
        }
        for sensor in [&self.outdoor, &self.boiler] {
            if !sensor.reference_ohms.is_finite() || sensor.reference_ohms <= 0.0 {
                return Err(invalid(
                    "sensors.reference_ohms",
                    "must be a positive resistance",
                ));
            }
        }
        if self.outdoor.adc_channel == self.boiler.adc_channel {
            return Err(invalid(
                "sensors.adc_channel",
                "outdoor and boiler must use different channels",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmulatorConfig {
    pub resolution_bits: u8,
    /// End-to-end resistance of the potentiometer track.
    pub max_resistance_ohms: f32,
    pub wiper_resistance_ohms: f32,
    /// Temperature presented before the first control tick.
    pub initial_target: f32,
}

impl EmulatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=16).contains(&self.resolution_bits) {
            return Err(invalid("emulator.resolution_bits", "must be 1-16"));
        }
        if !self.max_resistance_ohms.is_finite() || self.max_resistance_ohms <= 0.0 {
            return Err(invalid(
                "emulator.max_resistance_ohms",
                "must be a positive resistance",
            ));
        }
        if !self.wiper_resistance_ohms.is_finite() || self.wiper_resistance_ohms < 0.0 {
            return Err(invalid(
                "emulator.wiper_resistance_ohms",
                "must be zero or positive",
            ));
        }
        if !self.initial_target.is_finite() {
            return Err(invalid("emulator.initial_target", "must be finite"));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EmulatorPatch {
    resolution_bits: Option<u8>,
    max_resistance_ohms: Option<f32>,
    wiper_resistance_ohms: Option<f32>,
    initial_target: Option<f32>,
}

impl EmulatorPatch {
    fn apply(self, base: EmulatorConfig) -> EmulatorConfig {
        EmulatorConfig {
            resolution_bits: self.resolution_bits.unwrap_or(base.resolution_bits),
            max_resistance_ohms: self.max_resistance_ohms.unwrap_or(base.max_resistance_ohms),
            wiper_resistance_ohms: self
                .wiper_resistance_ohms
                .unwrap_or(base.wiper_resistance_ohms),
            initial_target: self.initial_target.unwrap_or(base.initial_target),
        }
    }
}

fn default_outdoor_emulator() -> EmulatorConfig {
    EmulatorConfig {
        resolution_bits: 8,
        max_resistance_ohms: 50_000.0,
        wiper_resistance_ohms: 125.0,
        initial_target: 6.0,
    }
}

fn default_boiler_emulator() -> EmulatorConfig {
    EmulatorConfig {
        max_resistance_ohms: 10_000.0,
        ..default_outdoor_emulator()
    }
}

fn outdoor_emulator<'de, D: Deserializer<'de>>(d: D) -> Result<EmulatorConfig, D::Error> {
    EmulatorPatch::deserialize(d).map(|patch| patch.apply(default_outdoor_emulator()))
}

fn boiler_emulator<'de, D: Deserializer<'de>>(d: D) -> Result<EmulatorConfig, D::Error> {
    EmulatorPatch::deserialize(d).map(|patch| patch.apply(default_boiler_emulator()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorsConfig {
    #[serde(deserialize_with = "outdoor_emulator")]
    pub outdoor: EmulatorConfig,
    #[serde(deserialize_with = "boiler_emulator")]
    pub boiler: EmulatorConfig,
}

impl Default for EmulatorsConfig {
    fn default() -> Self {
        Self {
            outdoor: default_outdoor_emulator(),
            boiler: default_boiler_emulator(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalsConfig {
    pub adc_sample_ms: u64,
    pub control_ms: u64,
    pub state_publish_ms: u64,
}

impl Default for IntervalsConfig {
    fn default() -> Self {
        Self {
            adc_sample_ms: 1_000,
            control_ms: 10_000,
            state_publish_ms: 60_000,
        }
    }
}

impl IntervalsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.adc_sample_ms == 0 || self.control_ms == 0 || self.state_publish_ms == 0 {
            return Err(invalid("intervals", "all intervals must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub device: String,
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 9_600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub client_id: String,
    pub base_topic: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            user: String::new(),
            pass: String::new(),
            client_id: "ivt490-bridge".to_string(),
            base_topic: "ivt490".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub controller: ControllerConfig,
    pub sensors: SensorsConfig,
    pub emulators: EmulatorsConfig,
    pub intervals: IntervalsConfig,
    pub serial: SerialConfig,
    pub mqtt: MqttConfig,
    pub http_port: u16,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            controller: ControllerConfig::default(),
            sensors: SensorsConfig::default(),
            emulators: EmulatorsConfig::default(),
            intervals: IntervalsConfig::default(),
            serial: SerialConfig::default(),
            mqtt: MqttConfig::default(),
            http_port: 8080,
        }
    }
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.controller.validate()?;
        self.sensors.validate()?;
        self.emulators.outdoor.validate()?;
        self.emulators.boiler.validate()?;
        self.intervals.validate()?;
        if self.serial.baud_rate == 0 {
            return Err(invalid("serial.baud_rate", "must be positive"));
        }
        if self.mqtt.base_topic.is_empty() || self.mqtt.base_topic.ends_with('/') {
            return Err(invalid(
                "mqtt.base_topic",
                "must be non-empty without a trailing '/'",
            ));
        }
        Ok(())
    }
}
