use serde::Serialize;
use tracing::debug;

use crate::{
    curve::CurveTable,
    filter::MovingAverage,
    peripherals::{Adc, PeripheralError},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SensorReading {
    pub raw: f32,
    pub filtered: f32,
}

/// Reads an NTC thermistor wired as the upper leg of a voltage divider:
///
/// ```text
///   Vs -- NTC -- (ADC) -- R0 -- GND
/// ```
#[derive(Debug, Clone)]
pub struct ThermistorReader {
    channel: u8,
    reference_ohms: f32,
    curve: CurveTable,
    filter: MovingAverage,
}

impl ThermistorReader {
    pub fn new(channel: u8, reference_ohms: f32, curve: CurveTable, filter_window: usize) -> Self {
        Self {
            channel,
            reference_ohms,
            curve,
            filter: MovingAverage::new(filter_window),
        }
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Samples the ADC and advances the smoothing filter.
    ///
    /// A failed sample leaves the filter untouched.
    pub fn read<A: Adc + ?Sized>(&mut self, adc: &mut A) -> Result<SensorReading, PeripheralError> {
        let code = adc.sample(self.channel)?;
        let max_code = adc.max_code();

        let resistance = divider_resistance(code, max_code, self.reference_ohms);
        let raw = self.curve.temperature_of(resistance);
        self.filter.push(raw);
        let filtered = self.filter.value().unwrap_or(raw);

        debug!(
            "adc channel {}: code {code}/{max_code}, {resistance:.0} ohm, raw {raw:.2}, filtered {filtered:.2}",
            self.channel
        );

        Ok(SensorReading { raw, filtered })
    }
}

/// Thermistor resistance for an ADC code. Code 0 means the thermistor leg is
/// open, which reads as infinite resistance (coldest end of any curve).
pub fn divider_resistance(code: u16, max_code: u16, reference_ohms: f32) -> f32 {
    if code == 0 {
        return f32::MAX;
    }
    reference_ohms * (f32::from(max_code) / f32::from(code) - 1.0)
}
