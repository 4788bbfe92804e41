//! Read/write contracts for the hardware the bridge drives.
//!
//! The domain code only ever talks to these traits; the host binary decides
//! what sits behind them (SPI drivers, GPIO, or simulated stand-ins).

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeripheralError {
    #[error("adc channel {channel} read failed: {reason}")]
    AdcRead { channel: u8, reason: String },
    #[error("potentiometer write failed: {0}")]
    PotentiometerWrite(String),
    #[error("digital output write failed: {0}")]
    OutputWrite(String),
}

/// Multi-channel analog-to-digital converter.
pub trait Adc {
    fn sample(&mut self, channel: u8) -> Result<u16, PeripheralError>;

    /// Code reported at full scale.
    fn max_code(&self) -> u16;
}

/// Digitally controlled potentiometer with a single wiper.
pub trait Potentiometer {
    fn set_wiper(&mut self, code: u16) -> Result<(), PeripheralError>;
}

/// A single digital output line, e.g. a relay driver.
pub trait DigitalOutput {
    fn set_high(&mut self, high: bool) -> Result<(), PeripheralError>;
}
