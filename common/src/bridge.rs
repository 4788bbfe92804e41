use tracing::{info, warn};

use crate::{
    command::ControlCommand,
    config::{ConfigError, RuntimeConfig},
    controller::{Controller, MeasuredTemperatures},
    curve::CurveTable,
    emulator::ThermistorEmulator,
    frame::{FrameError, SensorFrame},
    peripherals::{Adc, DigitalOutput, Potentiometer},
    sensor::{SensorReading, ThermistorReader},
    types::{BridgeState, ControlValues, EmulatorsPayload, SensorsPayload},
};

/// Hardware handed to the bridge at start-up.
pub struct Peripherals<A, P, O> {
    pub adc: A,
    pub outdoor_pot: P,
    pub boiler_pot: P,
    pub vacation_relay: O,
}

/// All state of the sensor bridge, driven by one event loop.
///
/// GT2 is the outdoor sensor and GT3_2 the boiler sensor. Both are sampled
/// from the real thermistors and replaced towards the heat pump by an
/// emulator each.
pub struct Bridge<A, P, O> {
    adc: A,
    outdoor_reader: ThermistorReader,
    boiler_reader: ThermistorReader,
    outdoor: Option<SensorReading>,
    boiler: Option<SensorReading>,
    outdoor_emulator: ThermistorEmulator<P>,
    boiler_emulator: ThermistorEmulator<P>,
    vacation_relay: O,
    controller: Controller,
    frame: Option<SensorFrame>,
    control_values: Option<ControlValues>,
    frames_decoded: u64,
    frames_rejected: u64,
}

impl<A: Adc, P: Potentiometer, O: DigitalOutput> Bridge<A, P, O> {
    pub fn new(
        config: &RuntimeConfig,
        peripherals: Peripherals<A, P, O>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let curve = CurveTable::ivt490_ntc();
        let sensors = &config.sensors;

        let mut bridge = Self {
            adc: peripherals.adc,
            outdoor_reader: ThermistorReader::new(
                sensors.outdoor.adc_channel,
                sensors.outdoor.reference_ohms,
                curve.clone(),
                sensors.filter_window,
            ),
            boiler_reader: ThermistorReader::new(
                sensors.boiler.adc_channel,
                sensors.boiler.reference_ohms,
                curve.clone(),
                sensors.filter_window,
            ),
            outdoor: None,
            boiler: None,
            outdoor_emulator: ThermistorEmulator::new(
                peripherals.outdoor_pot,
                curve.clone(),
                &config.emulators.outdoor,
            )?,
            boiler_emulator: ThermistorEmulator::new(
                peripherals.boiler_pot,
                curve,
                &config.emulators.boiler,
            )?,
            vacation_relay: peripherals.vacation_relay,
            controller: Controller::new(config.controller.clone()),
            frame: None,
            control_values: None,
            frames_decoded: 0,
            frames_rejected: 0,
        };

        if let Err(err) = bridge.vacation_relay.set_high(false) {
            warn!("failed to disable vacation relay at start-up: {err}");
        }
        let outdoor_target = bridge.outdoor_emulator.target();
        if let Err(err) = bridge.outdoor_emulator.set_target(outdoor_target) {
            warn!("failed to write initial GT2 emulator value: {err}");
        }
        let boiler_target = bridge.boiler_emulator.target();
        if let Err(err) = bridge.boiler_emulator.set_target(boiler_target) {
            warn!("failed to write initial GT3_2 emulator value: {err}");
        }

        Ok(bridge)
    }

    /// Samples both thermistors. A channel that fails keeps its last reading.
    pub fn on_sample_tick(&mut self) {
        match self.outdoor_reader.read(&mut self.adc) {
            Ok(reading) => self.outdoor = Some(reading),
            Err(err) => warn!("GT2 sample failed, keeping previous reading: {err}"),
        }
        match self.boiler_reader.read(&mut self.adc) {
            Ok(reading) => self.boiler = Some(reading),
            Err(err) => warn!("GT3_2 sample failed, keeping previous reading: {err}"),
        }
    }

    /// Evaluates the controller and drives both emulators and the vacation
    /// relay. Skipped until both thermistors have been sampled once.
    pub fn on_control_tick(&mut self, now_ms: u64) -> Option<ControlValues> {
        let (Some(outdoor), Some(boiler)) = (self.outdoor, self.boiler) else {
            warn!("skipping control tick: thermistors not sampled yet");
            return None;
        };

        let measured = MeasuredTemperatures {
            outdoor: outdoor.filtered,
            boiler: boiler.filtered,
        };
        let values = self
            .controller
            .control_values(measured, self.frame.as_ref(), now_ms);

        if let Err(err) = self.outdoor_emulator.set_target(values.outdoor) {
            warn!("GT2 emulator write failed: {err}");
        }
        if let Err(err) = self.vacation_relay.set_high(values.vacation) {
            warn!("vacation relay write failed: {err}");
        }
        if let Err(err) = self.boiler_emulator.set_target(values.boiler) {
            warn!("GT3_2 emulator write failed: {err}");
        }

        self.control_values = Some(values);
        Some(values)
    }

    /// Decodes a telemetry line and feeds the heat pump's own GT2 and GT3_2
    /// readings back into the emulators. A rejected line changes nothing but
    /// the rejection counter.
    pub fn on_telemetry_line(&mut self, line: &str) -> Result<SensorFrame, FrameError> {
        let frame = match SensorFrame::decode(line) {
            Ok(frame) => frame,
            Err(err) => {
                self.frames_rejected += 1;
                return Err(err);
            }
        };

        if self.frame.is_none() {
            info!("first heat pump frame decoded");
        }
        self.frame = Some(frame);
        self.frames_decoded += 1;

        self.outdoor_emulator.adjust_correction(frame.outdoor);
        self.boiler_emulator.adjust_correction(frame.boiler);

        Ok(frame)
    }

    pub fn apply(&mut self, command: ControlCommand, now_ms: u64) {
        info!("control input: {command:?}");
        match command {
            ControlCommand::FeedTemperatureTarget(value) => {
                self.controller.set_feed_temperature_target(value, now_ms)
            }
            ControlCommand::OutdoorTemperatureOffset(value) => {
                self.controller.set_outdoor_temperature_offset(value, now_ms)
            }
            ControlCommand::IndoorTemperatureTarget(value) => {
                self.controller.set_indoor_temperature_target(value, now_ms)
            }
            ControlCommand::IndoorTemperature(value) => {
                self.controller.set_indoor_temperature(value, now_ms)
            }
            ControlCommand::OperatingMode(mode) => self.controller.set_operating_mode(mode, now_ms),
        }
    }

    pub fn frame(&self) -> Option<&SensorFrame> {
        self.frame.as_ref()
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn outdoor_emulator(&self) -> &ThermistorEmulator<P> {
        &self.outdoor_emulator
    }

    pub fn boiler_emulator(&self) -> &ThermistorEmulator<P> {
        &self.boiler_emulator
    }

    pub fn vacation_relay(&self) -> &O {
        &self.vacation_relay
    }

    pub fn adc_mut(&mut self) -> &mut A {
        &mut self.adc
    }

    pub fn state(&self, now_ms: u64) -> BridgeState {
        BridgeState {
            heatpump: self.frame,
            sensors: SensorsPayload {
                outdoor: self.outdoor.unwrap_or_default(),
                boiler: self.boiler.unwrap_or_default(),
            },
            emulators: EmulatorsPayload {
                outdoor: self.outdoor_emulator.state(),
                boiler: self.boiler_emulator.state(),
            },
            controller: self.controller.state_payload(now_ms),
            control_values: self.control_values,
            frames_decoded: self.frames_decoded,
            frames_rejected: self.frames_rejected,
        }
    }
}
