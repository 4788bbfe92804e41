//! Decoder for the IVT490 serial telemetry line.
//!
//! The heat pump prints one `;`-separated line of 37 fields about once a
//! minute. Field positions are fixed by the heat pump firmware; temperatures
//! are integers in tenths of a degree and status bits are `0`/`1`.

use serde::Serialize;
use thiserror::Error;

pub const FRAME_FIELD_COUNT: usize = 37;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("telemetry line has {found} fields, expected {FRAME_FIELD_COUNT}")]
    FieldCount { found: usize },
    #[error("telemetry field {index} is not a number: {value:?}")]
    InvalidField { index: usize, value: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SensorFrame {
    /// Feed temperature.
    #[serde(rename = "GT1")]
    pub feed: f32,
    #[serde(rename = "GT1_target")]
    pub feed_target: f32,
    #[serde(rename = "GT1_UL")]
    pub feed_upper_limit: f32,
    #[serde(rename = "GT1_LL")]
    pub feed_lower_limit: f32,
    /// Feed lower limit below which the electric supplement kicks in.
    #[serde(rename = "GT1_LLT")]
    pub feed_supplement_limit: f32,
    /// Outdoor temperature as seen by the heat pump, i.e. after spoofing.
    #[serde(rename = "GT2")]
    pub outdoor: f32,
    #[serde(rename = "GT3_1")]
    pub tap_water: f32,
    /// Boiler temperature as seen by the heat pump, i.e. after spoofing.
    #[serde(rename = "GT3_2")]
    pub boiler: f32,
    #[serde(rename = "GT3_2_ULT")]
    pub boiler_supplement_limit: f32,
    #[serde(rename = "GT3_2_LL")]
    pub boiler_lower_limit: f32,
    #[serde(rename = "GT3_2_UL")]
    pub boiler_upper_limit: f32,
    #[serde(rename = "GT3_3")]
    pub heating_water: f32,
    #[serde(rename = "GT3_3_target")]
    pub heating_water_target: f32,
    #[serde(rename = "GT3_3_LL")]
    pub heating_water_lower_limit: f32,
    #[serde(rename = "GT3_4")]
    pub extra_tank: f32,
    #[serde(rename = "GT5")]
    pub indoor: f32,
    #[serde(rename = "GT6")]
    pub hot_gas: f32,

    /// Electric heater utilisation in percent.
    #[serde(rename = "electricitySupplement")]
    pub electricity_supplement: f32,

    #[serde(rename = "GP1")]
    pub low_pressure_switch: bool,
    #[serde(rename = "GP2")]
    pub high_pressure_switch: bool,
    #[serde(rename = "GP3")]
    pub defrost_switch: bool,
    pub compressor: bool,
    pub vacation: bool,
    #[serde(rename = "P1")]
    pub circulation_pump: bool,
    #[serde(rename = "P2")]
    pub external_pump: bool,
    pub alarm: bool,
    pub fan: bool,
    #[serde(rename = "SV1_open")]
    pub shunt_opening: bool,
    #[serde(rename = "SV1_close")]
    pub shunt_closing: bool,
}

impl SensorFrame {
    /// Decodes one telemetry line. Nothing is returned unless every mapped
    /// field parsed, so callers can keep their previous frame on error.
    pub fn decode(line: &str) -> Result<Self, FrameError> {
        let fields = split_fields(line.trim_end_matches(['\r', '\n']))?;

        let tenths = |index: usize| -> Result<f32, FrameError> {
            let value = fields[index].trim();
            value
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| 0.1 * v)
                .ok_or_else(|| FrameError::InvalidField {
                    index,
                    value: value.to_string(),
                })
        };
        let flag = |index: usize| -> Result<bool, FrameError> {
            let value = fields[index].trim();
            value
                .parse::<i32>()
                .map(|v| v != 0)
                .map_err(|_| FrameError::InvalidField {
                    index,
                    value: value.to_string(),
                })
        };

        Ok(Self {
            feed: tenths(1)?,
            outdoor: tenths(2)?,
            tap_water: tenths(2)?,
            boiler: tenths(3)?,
            heating_water: tenths(4)?,
            indoor: tenths(6)?,
            hot_gas: tenths(7)?,
            extra_tank: tenths(8)?,
            defrost_switch: flag(9)?,
            high_pressure_switch: flag(10)?,
            low_pressure_switch: flag(11)?,
            vacation: flag(12)?,
            compressor: flag(13)?,
            shunt_opening: flag(14)?,
            shunt_closing: flag(15)?,
            circulation_pump: flag(16)?,
            fan: flag(17)?,
            alarm: flag(18)?,
            external_pump: flag(19)?,
            feed_supplement_limit: tenths(20)?,
            feed_lower_limit: tenths(21)?,
            feed_target: tenths(22)?,
            feed_upper_limit: tenths(23)?,
            boiler_lower_limit: tenths(24)?,
            boiler_supplement_limit: tenths(25)?,
            boiler_upper_limit: tenths(26)?,
            heating_water_lower_limit: tenths(27)?,
            heating_water_target: tenths(28)?,
            electricity_supplement: tenths(33)?,
        })
    }
}

// Consumes one field per delimiter. Only the delimiter after the last field
// may be missing; anything after a 37th delimiter is ignored.
fn split_fields(line: &str) -> Result<[&str; FRAME_FIELD_COUNT], FrameError> {
    let mut fields = [""; FRAME_FIELD_COUNT];
    let mut remainder = line;

    for (index, slot) in fields.iter_mut().enumerate() {
        match remainder.split_once(';') {
            Some((field, rest)) => {
                *slot = field;
                remainder = rest;
            }
            None if index == FRAME_FIELD_COUNT - 1 => {
                *slot = remainder;
            }
            None => return Err(FrameError::FieldCount { found: index + 1 }),
        }
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_fields() -> Vec<String> {
        let mut fields: Vec<String> = (0..FRAME_FIELD_COUNT).map(|_| "0".to_string()).collect();
        let values: &[(usize, &str)] = &[
            (0, "490"),
            (1, "352"),
            (2, "-57"),
            (3, "501"),
            (4, "288"),
            (6, "214"),
            (7, "823"),
            (8, "455"),
            (9, "0"),
            (10, "0"),
            (11, "1"),
            (12, "1"),
            (13, "1"),
            (14, "0"),
            (15, "1"),
            (16, "1"),
            (17, "0"),
            (18, "0"),
            (19, "1"),
            (20, "280"),
            (21, "300"),
            (22, "360"),
            (23, "550"),
            (24, "480"),
            (25, "530"),
            (26, "540"),
            (27, "250"),
            (28, "300"),
            (33, "125"),
        ];
        for (index, value) in values {
            fields[*index] = value.to_string();
        }
        fields
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn decodes_well_formed_line() {
        let line = format!("{}\r\n", sample_fields().join(";"));
        let frame = SensorFrame::decode(&line).unwrap();

        assert!(approx(frame.feed, 35.2));
        assert!(approx(frame.outdoor, -5.7));
        assert!(approx(frame.tap_water, -5.7));
        assert!(approx(frame.boiler, 50.1));
        assert!(approx(frame.heating_water, 28.8));
        assert!(approx(frame.indoor, 21.4));
        assert!(approx(frame.hot_gas, 82.3));
        assert!(approx(frame.extra_tank, 45.5));
        assert!(approx(frame.feed_supplement_limit, 28.0));
        assert!(approx(frame.feed_lower_limit, 30.0));
        assert!(approx(frame.feed_target, 36.0));
        assert!(approx(frame.feed_upper_limit, 55.0));
        assert!(approx(frame.boiler_lower_limit, 48.0));
        assert!(approx(frame.boiler_supplement_limit, 53.0));
        assert!(approx(frame.boiler_upper_limit, 54.0));
        assert!(approx(frame.heating_water_lower_limit, 25.0));
        assert!(approx(frame.heating_water_target, 30.0));
        assert!(approx(frame.electricity_supplement, 12.5));

        assert_eq!(
            (
                frame.defrost_switch,
                frame.high_pressure_switch,
                frame.low_pressure_switch,
                frame.vacation,
                frame.compressor,
                frame.shunt_opening,
                frame.shunt_closing,
                frame.circulation_pump,
                frame.fan,
                frame.alarm,
                frame.external_pump,
            ),
            (false, false, true, true, true, false, true, true, false, false, true)
        );
    }

    #[test]
    fn accepts_trailing_delimiter_and_extra_content() {
        let mut line = sample_fields().join(";");
        line.push(';');
        assert!(SensorFrame::decode(&line).is_ok());

        line.push_str("99;98");
        let frame = SensorFrame::decode(&line).unwrap();
        assert!(approx(frame.boiler, 50.1));
    }

    #[test]
    fn rejects_line_missing_a_delimiter() {
        let mut fields = sample_fields();
        // Merge fields 10 and 11 so the line has 36 fields.
        let merged = format!("{}{}", fields[10], fields[11]);
        fields.splice(10..12, [merged]);
        let line = fields.join(";");

        assert_eq!(
            SensorFrame::decode(&line),
            Err(FrameError::FieldCount { found: 36 })
        );
    }

    #[test]
    fn rejects_short_and_empty_lines() {
        assert_eq!(
            SensorFrame::decode(""),
            Err(FrameError::FieldCount { found: 1 })
        );
        assert_eq!(
            SensorFrame::decode("1;2;3\n"),
            Err(FrameError::FieldCount { found: 3 })
        );
    }

    #[test]
    fn rejects_non_numeric_mapped_field() {
        let mut fields = sample_fields();
        fields[26] = "5x4".to_string();

        assert_eq!(
            SensorFrame::decode(&fields.join(";")),
            Err(FrameError::InvalidField {
                index: 26,
                value: "5x4".to_string()
            })
        );
    }

    #[test]
    fn ignores_unmapped_fields() {
        let mut fields = sample_fields();
        fields[5] = "garbage".to_string();
        fields[30] = String::new();

        assert!(SensorFrame::decode(&fields.join(";")).is_ok());
    }

    #[test]
    fn serializes_with_heat_pump_tags() {
        let frame = SensorFrame::decode(&sample_fields().join(";")).unwrap();
        let json = serde_json::to_value(frame).unwrap();

        assert!(json.get("GT3_2_UL").is_some());
        assert_eq!(json["P1"], serde_json::Value::Bool(true));
        assert_eq!(json["SV1_close"], serde_json::Value::Bool(true));
        assert!(json.get("electricitySupplement").is_some());
    }
}
