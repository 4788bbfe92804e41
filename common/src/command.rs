use thiserror::Error;

use crate::{
    topics::{
        TOPIC_FEEDBACK_INDOOR, TOPIC_SET_FEED_TARGET, TOPIC_SET_INDOOR_ACTUAL,
        TOPIC_SET_INDOOR_TARGET, TOPIC_SET_OPERATING_MODE, TOPIC_SET_OUTDOOR_OFFSET,
    },
    types::OperatingMode,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown control channel {0:?}")]
    UnknownChannel(String),
    #[error("expected a number, got {0:?}")]
    InvalidNumber(String),
    #[error("expected an operating mode (1-3 or BAU/BLOCK/BOOST), got {0:?}")]
    InvalidMode(String),
}

/// A typed, externally supplied control value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlCommand {
    FeedTemperatureTarget(f32),
    OutdoorTemperatureOffset(f32),
    IndoorTemperatureTarget(f32),
    IndoorTemperature(f32),
    OperatingMode(OperatingMode),
}

impl ControlCommand {
    /// Parses a payload received on `channel` (topic without the base).
    pub fn parse(channel: &str, payload: &str) -> Result<Self, CommandError> {
        match channel {
            TOPIC_SET_FEED_TARGET => parse_number(payload).map(Self::FeedTemperatureTarget),
            TOPIC_SET_OUTDOOR_OFFSET => parse_number(payload).map(Self::OutdoorTemperatureOffset),
            TOPIC_SET_INDOOR_TARGET => parse_number(payload).map(Self::IndoorTemperatureTarget),
            TOPIC_SET_INDOOR_ACTUAL | TOPIC_FEEDBACK_INDOOR => {
                parse_number(payload).map(Self::IndoorTemperature)
            }
            TOPIC_SET_OPERATING_MODE => parse_mode(payload).map(Self::OperatingMode),
            other => Err(CommandError::UnknownChannel(other.to_string())),
        }
    }
}

pub fn parse_number(payload: &str) -> Result<f32, CommandError> {
    let trimmed = payload.trim();
    trimmed
        .parse::<f32>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| CommandError::InvalidNumber(trimmed.to_string()))
}

pub fn parse_mode(payload: &str) -> Result<OperatingMode, CommandError> {
    let trimmed = payload.trim();
    if let Ok(code) = trimmed.parse::<u8>() {
        return OperatingMode::from_code(code)
            .ok_or_else(|| CommandError::InvalidMode(trimmed.to_string()));
    }

    match trimmed.to_ascii_uppercase().as_str() {
        "BAU" | "BUSINESS_AS_USUAL" => Ok(OperatingMode::BusinessAsUsual),
        "BLOCK" => Ok(OperatingMode::Block),
        "BOOST" => Ok(OperatingMode::Boost),
        _ => Err(CommandError::InvalidMode(trimmed.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_a_valid_number() {
        assert_eq!(
            ControlCommand::parse(TOPIC_SET_OUTDOOR_OFFSET, "0"),
            Ok(ControlCommand::OutdoorTemperatureOffset(0.0))
        );
        assert_eq!(
            ControlCommand::parse(TOPIC_SET_FEED_TARGET, " 0.0\n"),
            Ok(ControlCommand::FeedTemperatureTarget(0.0))
        );
    }

    #[test]
    fn garbage_is_rejected_not_zeroed() {
        assert_eq!(
            ControlCommand::parse(TOPIC_SET_FEED_TARGET, "warm"),
            Err(CommandError::InvalidNumber("warm".to_string()))
        );
        assert_eq!(
            ControlCommand::parse(TOPIC_SET_FEED_TARGET, ""),
            Err(CommandError::InvalidNumber(String::new()))
        );
        assert!(ControlCommand::parse(TOPIC_SET_FEED_TARGET, "NaN").is_err());
        assert!(ControlCommand::parse(TOPIC_SET_FEED_TARGET, "inf").is_err());
    }

    #[test]
    fn indoor_feedback_alias_maps_to_indoor_temperature() {
        assert_eq!(
            ControlCommand::parse(TOPIC_FEEDBACK_INDOOR, "21.3"),
            Ok(ControlCommand::IndoorTemperature(21.3))
        );
        assert_eq!(
            ControlCommand::parse(TOPIC_SET_INDOOR_ACTUAL, "-1.5"),
            Ok(ControlCommand::IndoorTemperature(-1.5))
        );
    }

    #[test]
    fn parses_modes_by_code_and_name() {
        assert_eq!(parse_mode("1"), Ok(OperatingMode::BusinessAsUsual));
        assert_eq!(parse_mode("2"), Ok(OperatingMode::Block));
        assert_eq!(parse_mode(" boost "), Ok(OperatingMode::Boost));
        assert_eq!(parse_mode("0"), Err(CommandError::InvalidMode("0".to_string())));
        assert_eq!(parse_mode("4"), Err(CommandError::InvalidMode("4".to_string())));
        assert!(parse_mode("turbo").is_err());
    }

    #[test]
    fn unknown_channel_is_an_error() {
        assert_eq!(
            ControlCommand::parse("controller/set/vacation_mode", "1"),
            Err(CommandError::UnknownChannel(
                "controller/set/vacation_mode".to_string()
            ))
        );
    }
}
