use serde::{Deserialize, Serialize};

use crate::{
    emulator::EmulatorState, frame::SensorFrame, sensor::SensorReading, timed::InputSnapshot,
    timed::InputValue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperatingMode {
    /// Pass the real boiler temperature through.
    #[default]
    #[serde(rename = "BAU")]
    BusinessAsUsual,
    /// Make the boiler look hot so the heat pump skips hot-water heating.
    Block,
    /// Make the boiler look cold so the heat pump heats hot water now.
    Boost,
}

impl OperatingMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BusinessAsUsual => "BAU",
            Self::Block => "BLOCK",
            Self::Boost => "BOOST",
        }
    }

    /// Numeric codes used on the control channel.
    pub fn code(self) -> u8 {
        match self {
            Self::BusinessAsUsual => 1,
            Self::Block => 2,
            Self::Boost => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::BusinessAsUsual),
            2 => Some(Self::Block),
            3 => Some(Self::Boost),
            _ => None,
        }
    }
}

impl InputValue for OperatingMode {
    fn is_usable(&self) -> bool {
        true
    }
}

/// Result of one controller evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlValues {
    /// Temperature the outdoor (GT2) emulator should present.
    #[serde(rename = "GT2")]
    pub outdoor: f32,
    /// Temperature the boiler (GT3_2) emulator should present.
    #[serde(rename = "GT3_2")]
    pub boiler: f32,
    #[serde(rename = "enableVacationMode")]
    pub vacation: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerStatePayload {
    pub feed_temperature_target: InputSnapshot<f32>,
    pub outdoor_temperature_offset: InputSnapshot<f32>,
    pub indoor_temperature_feedback: InputSnapshot<f32>,
    pub indoor_temperature_target: InputSnapshot<f32>,
    pub operating_mode: &'static str,
    pub operating_mode_valid: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SensorsPayload {
    #[serde(rename = "GT2")]
    pub outdoor: SensorReading,
    #[serde(rename = "GT3_2")]
    pub boiler: SensorReading,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmulatorsPayload {
    #[serde(rename = "GT2")]
    pub outdoor: EmulatorState,
    #[serde(rename = "GT3_2")]
    pub boiler: EmulatorState,
}

/// Everything the bridge publishes about itself.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeState {
    pub heatpump: Option<SensorFrame>,
    pub sensors: SensorsPayload,
    pub emulators: EmulatorsPayload,
    pub controller: ControllerStatePayload,
    #[serde(rename = "controlValues")]
    pub control_values: Option<ControlValues>,
    #[serde(rename = "framesDecoded")]
    pub frames_decoded: u64,
    #[serde(rename = "framesRejected")]
    pub frames_rejected: u64,
}
