//! Simulated peripherals for host builds.
//!
//! Hardware integration point: real boards swap these for MCP3208 and
//! MCP41xxx SPI drivers plus a GPIO relay output.

use tracing::{debug, info};

use ivt490_common::{
    config::{RuntimeConfig, ThermistorConfig},
    Adc, CurveTable, DigitalOutput, PeripheralError, Peripherals, Potentiometer,
};

/// 12-bit converter, like the MCP3208.
const SIM_ADC_MAX_CODE: u16 = 4095;
const SIM_ADC_CHANNELS: usize = 8;

const DEFAULT_SIM_OUTDOOR: f32 = 5.0;
const DEFAULT_SIM_BOILER: f32 = 48.0;

/// ADC returning fixed codes, one per channel.
#[derive(Debug, Clone)]
pub struct SimulatedAdc {
    codes: [u16; SIM_ADC_CHANNELS],
}

impl SimulatedAdc {
    /// Codes a divider would produce with the given thermistor temperatures.
    pub fn with_temperatures(config: &RuntimeConfig, outdoor: f32, boiler: f32) -> Self {
        let curve = CurveTable::ivt490_ntc();
        let mut codes = [0; SIM_ADC_CHANNELS];

        for (sensor, temperature) in [
            (&config.sensors.outdoor, outdoor),
            (&config.sensors.boiler, boiler),
        ] {
            if let Some(code) = codes.get_mut(usize::from(sensor.adc_channel)) {
                *code = divider_code(&curve, sensor, temperature);
            }
        }

        Self { codes }
    }
}

impl Adc for SimulatedAdc {
    fn sample(&mut self, channel: u8) -> Result<u16, PeripheralError> {
        self.codes
            .get(usize::from(channel))
            .copied()
            .ok_or_else(|| PeripheralError::AdcRead {
                channel,
                reason: format!("only {SIM_ADC_CHANNELS} channels"),
            })
    }

    fn max_code(&self) -> u16 {
        SIM_ADC_MAX_CODE
    }
}

/// Thermistor on the high side, reference resistor to ground.
fn divider_code(curve: &CurveTable, sensor: &ThermistorConfig, temperature: f32) -> u16 {
    let resistance = curve.resistance_of(temperature);
    let ratio = sensor.reference_ohms / (sensor.reference_ohms + resistance);
    (f32::from(SIM_ADC_MAX_CODE) * ratio)
        .round()
        .clamp(0.0, f32::from(SIM_ADC_MAX_CODE)) as u16
}

#[derive(Debug)]
pub struct LoggedPotentiometer {
    name: &'static str,
    wiper: Option<u16>,
}

impl LoggedPotentiometer {
    pub fn new(name: &'static str) -> Self {
        Self { name, wiper: None }
    }
}

impl Potentiometer for LoggedPotentiometer {
    fn set_wiper(&mut self, code: u16) -> Result<(), PeripheralError> {
        if self.wiper != Some(code) {
            info!("{} wiper -> {code}", self.name);
        } else {
            debug!("{} wiper unchanged at {code}", self.name);
        }
        self.wiper = Some(code);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LoggedRelay {
    high: Option<bool>,
}

impl DigitalOutput for LoggedRelay {
    fn set_high(&mut self, high: bool) -> Result<(), PeripheralError> {
        if self.high != Some(high) {
            info!("vacation relay -> {}", if high { "on" } else { "off" });
        }
        self.high = Some(high);
        Ok(())
    }
}

/// Simulated hardware; `IVT490_SIM_OUTDOOR` and `IVT490_SIM_BOILER` pick
/// the temperatures the fake thermistors report.
pub fn peripherals(
    config: &RuntimeConfig,
) -> Peripherals<SimulatedAdc, LoggedPotentiometer, LoggedRelay> {
    let outdoor = env_temperature("IVT490_SIM_OUTDOOR").unwrap_or(DEFAULT_SIM_OUTDOOR);
    let boiler = env_temperature("IVT490_SIM_BOILER").unwrap_or(DEFAULT_SIM_BOILER);
    info!("simulated thermistors: GT2 {outdoor} C, GT3_2 {boiler} C");

    Peripherals {
        adc: SimulatedAdc::with_temperatures(config, outdoor, boiler),
        outdoor_pot: LoggedPotentiometer::new("GT2"),
        boiler_pot: LoggedPotentiometer::new("GT3_2"),
        vacation_relay: LoggedRelay::default(),
    }
}

fn env_temperature(name: &str) -> Option<f32> {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<f32>().ok())
        .filter(|value| value.is_finite())
}
