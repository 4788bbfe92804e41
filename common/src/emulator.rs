use serde::Serialize;
use tracing::{debug, info};

use crate::{
    config::{ConfigError, EmulatorConfig},
    curve::CurveTable,
    peripherals::{PeripheralError, Potentiometer},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EmulatorState {
    pub target: f32,
    #[serde(rename = "resistanceOffset")]
    pub correction_offset: f32,
    pub wiper: Option<u16>,
}

/// Presents a chosen temperature to the heat pump by setting a digipot to the
/// resistance its NTC would have at that temperature.
///
/// The heat pump reports what it actually measured in its telemetry, and
/// [`adjust_correction`](Self::adjust_correction) folds the difference back
/// into a resistance offset. The offset is a plain integrator: it is never
/// clamped, decayed or reset.
///
/// Expected wiring is the PB0-PW0 leg of an MCP41xxx, so the wiper's own
/// resistance adds to whatever fraction of the track is selected.
#[derive(Debug)]
pub struct ThermistorEmulator<P> {
    pot: P,
    curve: CurveTable,
    max_code: u16,
    max_resistance_ohms: f32,
    wiper_resistance_ohms: f32,
    target: f32,
    correction_offset: f32,
    wiper: Option<u16>,
}

impl<P: Potentiometer> ThermistorEmulator<P> {
    pub fn new(pot: P, curve: CurveTable, config: &EmulatorConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            pot,
            curve,
            max_code: ((1u32 << config.resolution_bits) - 1) as u16,
            max_resistance_ohms: config.max_resistance_ohms,
            wiper_resistance_ohms: config.wiper_resistance_ohms,
            target: config.initial_target,
            correction_offset: 0.0,
            wiper: None,
        })
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn correction_offset(&self) -> f32 {
        self.correction_offset
    }

    pub fn state(&self) -> EmulatorState {
        EmulatorState {
            target: self.target,
            correction_offset: self.correction_offset,
            wiper: self.wiper,
        }
    }

    /// Records `target` and writes the matching wiper code.
    ///
    /// The target is kept even if the write fails; the next call retries.
    pub fn set_target(&mut self, target: f32) -> Result<u16, PeripheralError> {
        self.target = target;
        let code = self.wiper_code_for(target);
        self.pot.set_wiper(code)?;
        self.wiper = Some(code);
        info!("writing wiper value {code} for {target:.2} C");
        Ok(code)
    }

    pub fn wiper_code_for(&self, temperature: f32) -> u16 {
        let wanted = self.curve.resistance_of(temperature) + self.correction_offset;
        let fraction =
            ((wanted - self.wiper_resistance_ohms) / self.max_resistance_ohms).clamp(0.0, 1.0);
        let code = (f32::from(self.max_code) * fraction).round() as u16;

        debug!(
            "{temperature:.2} C -> {wanted:.0} ohm (offset {:.0}), fraction {fraction:.4}, code {code}",
            self.correction_offset
        );
        code
    }

    /// Shifts the offset by the resistance error between what was aimed for
    /// and what the heat pump reported.
    pub fn adjust_correction(&mut self, feedback: f32) {
        let at_target = self.curve.resistance_of(self.target);
        let at_feedback = self.curve.resistance_of(feedback);
        self.correction_offset += at_target - at_feedback;

        info!(
            "correction for target {:.2} C, feedback {feedback:.2} C: offset now {:.0} ohm",
            self.target, self.correction_offset
        );
    }

    pub fn potentiometer(&self) -> &P {
        &self.pot
    }
}
