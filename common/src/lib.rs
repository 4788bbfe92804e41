pub mod bridge;
pub mod command;
pub mod config;
pub mod controller;
pub mod curve;
pub mod emulator;
pub mod filter;
pub mod frame;
pub mod peripherals;
pub mod sensor;
pub mod timed;
pub mod topics;
pub mod types;

pub use bridge::{Bridge, Peripherals};
pub use command::{CommandError, ControlCommand};
pub use config::{ConfigError, RuntimeConfig};
pub use controller::{Controller, MeasuredTemperatures};
pub use curve::{heating_curve, inverse_heating_curve, CurveTable};
pub use emulator::{EmulatorState, ThermistorEmulator};
pub use filter::MovingAverage;
pub use frame::{FrameError, SensorFrame};
pub use peripherals::{Adc, DigitalOutput, PeripheralError, Potentiometer};
pub use sensor::{SensorReading, ThermistorReader};
pub use timed::TimedInput;
pub use topics::*;
pub use types::{BridgeState, ControlValues, OperatingMode};
