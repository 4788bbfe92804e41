use tracing::{debug, info, warn};

use crate::{
    config::ControllerConfig,
    curve::inverse_heating_curve,
    frame::SensorFrame,
    timed::TimedInput,
    types::{ControlValues, ControllerStatePayload, OperatingMode},
};

/// Above this outdoor surrogate the heat pump would still ask for more feed
/// temperature than wanted, so vacation mode is used to pull it down.
const VACATION_SURROGATE_CEILING: f32 = 21.0;

/// Freeze guard engages when it is colder than this outside.
const FREEZE_GUARD_OUTDOOR: f32 = 1.0;

/// Filtered readings of the physically sampled thermistors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasuredTemperatures {
    pub outdoor: f32,
    pub boiler: f32,
}

/// Decides which temperatures to present to the heat pump.
///
/// Holds only the latest value and timestamp of each external input; every
/// call to [`control_values`](Self::control_values) is evaluated from
/// scratch.
#[derive(Debug, Clone)]
pub struct Controller {
    config: ControllerConfig,

    feed_temperature_target: TimedInput<f32>,
    outdoor_temperature_offset: TimedInput<f32>,
    indoor_temperature: TimedInput<f32>,
    indoor_temperature_target: TimedInput<f32>,
    operating_mode: TimedInput<OperatingMode>,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        let default_indoor_target = config.default_indoor_temperature_target;
        Self {
            config,
            feed_temperature_target: TimedInput::new(f32::NAN),
            outdoor_temperature_offset: TimedInput::new(0.0),
            indoor_temperature: TimedInput::new(f32::NAN),
            indoor_temperature_target: TimedInput::new(default_indoor_target),
            operating_mode: TimedInput::new(OperatingMode::BusinessAsUsual),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn set_feed_temperature_target(&mut self, temperature: f32, now_ms: u64) {
        self.feed_temperature_target.set(temperature, now_ms);
    }

    pub fn set_outdoor_temperature_offset(&mut self, offset: f32, now_ms: u64) {
        self.outdoor_temperature_offset.set(offset, now_ms);
    }

    pub fn set_indoor_temperature(&mut self, temperature: f32, now_ms: u64) {
        self.indoor_temperature.set(temperature, now_ms);
    }

    pub fn set_indoor_temperature_target(&mut self, target: f32, now_ms: u64) {
        self.indoor_temperature_target.set(target, now_ms);
    }

    pub fn set_operating_mode(&mut self, mode: OperatingMode, now_ms: u64) {
        self.operating_mode.set(mode, now_ms);
    }

    /// Operating mode in effect; a stale mode falls back to business as usual.
    pub fn operating_mode(&self, now_ms: u64) -> OperatingMode {
        self.operating_mode
            .valid_value(now_ms, self.config.validity_ms)
            .unwrap_or_default()
    }

    /// Indoor target as last set, regardless of age.
    pub fn indoor_temperature_target(&self) -> f32 {
        let target = self.indoor_temperature_target.value();
        if target.is_nan() {
            self.config.default_indoor_temperature_target
        } else {
            target
        }
    }

    pub fn control_values(
        &self,
        measured: MeasuredTemperatures,
        frame: Option<&SensorFrame>,
        now_ms: u64,
    ) -> ControlValues {
        let boiler = self.boiler_surrogate(measured.boiler, frame, now_ms);
        let outdoor = self.outdoor_surrogate(measured.outdoor, now_ms);
        let (outdoor, vacation) = self.vacation_mode_logic(measured.outdoor, outdoor);

        info!("controller: GT2={outdoor:.2} vacation={vacation} GT3_2={boiler:.2}");

        ControlValues {
            outdoor,
            boiler,
            vacation,
        }
    }

    pub fn state_payload(&self, now_ms: u64) -> ControllerStatePayload {
        let window = self.config.validity_ms;
        ControllerStatePayload {
            feed_temperature_target: self.feed_temperature_target.snapshot(now_ms, window),
            outdoor_temperature_offset: self.outdoor_temperature_offset.snapshot(now_ms, window),
            indoor_temperature_feedback: self.indoor_temperature.snapshot(now_ms, window),
            indoor_temperature_target: self.indoor_temperature_target.snapshot(now_ms, window),
            operating_mode: self.operating_mode(now_ms).as_str(),
            operating_mode_valid: self.operating_mode.is_valid(now_ms, window),
        }
    }

    fn boiler_surrogate(
        &self,
        measured_boiler: f32,
        frame: Option<&SensorFrame>,
        now_ms: u64,
    ) -> f32 {
        let mode = self.operating_mode(now_ms);
        let Some(frame) = frame else {
            if mode != OperatingMode::BusinessAsUsual {
                debug!(
                    "controller: no heat pump frame yet, {} falls back to pass-through",
                    mode.as_str()
                );
            }
            return measured_boiler;
        };

        match mode {
            OperatingMode::BusinessAsUsual => measured_boiler,
            OperatingMode::Block => frame.boiler_upper_limit + 1.0,
            // Never boost a boiler that is already at its upper limit.
            OperatingMode::Boost if measured_boiler < frame.boiler_upper_limit => {
                frame.boiler_lower_limit - 1.0
            }
            OperatingMode::Boost => measured_boiler,
        }
    }

    fn outdoor_surrogate(&self, measured_outdoor: f32, now_ms: u64) -> f32 {
        let window = self.config.validity_ms;

        if let Some(feed_target) = self.feed_temperature_target.valid_value(now_ms, window) {
            info!("controller: requested feed temperature {feed_target:.2}");
            return inverse_heating_curve(self.config.heating_curve_slope, feed_target);
        }

        let mut surrogate = measured_outdoor;

        if let Some(offset) = self.outdoor_temperature_offset.valid_value(now_ms, window) {
            info!("controller: outdoor temperature offset {offset:.2} applied");
            surrogate += offset;
        }

        if let Some(indoor) = self.indoor_temperature.valid_value(now_ms, window) {
            let target = self.indoor_temperature_target();
            let correction = self.config.indoor_temperature_weight * (indoor - target);
            info!(
                "controller: indoor {indoor:.2} vs target {target:.2}, correction {correction:.2}"
            );
            surrogate += correction;
        }

        surrogate
    }

    fn vacation_mode_logic(&self, measured_outdoor: f32, surrogate: f32) -> (f32, bool) {
        let summer_limit = self.config.summer_temperature_limit;

        if summer_limit > 0.0
            && measured_outdoor < FREEZE_GUARD_OUTDOOR
            && surrogate >= summer_limit - 1.0
        {
            // Presenting a summer-level outdoor temperature while it is
            // freezing would stop P1. Stay just below the summer limit and use
            // vacation mode to lower the feed temperature instead.
            warn!(
                "controller: clamping GT2 {surrogate:.2} to {:.2} and enabling vacation mode to keep P1 running",
                summer_limit - 1.0
            );
            return (summer_limit - 1.0, true);
        }

        if surrogate > VACATION_SURROGATE_CEILING {
            return (surrogate, true);
        }

        (surrogate, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: u64 = 900_000;

    fn controller() -> Controller {
        Controller::new(ControllerConfig::default())
    }

    fn controller_with_summer_limit(limit: f32) -> Controller {
        Controller::new(ControllerConfig {
            summer_temperature_limit: limit,
            ..ControllerConfig::default()
        })
    }

    fn frame() -> SensorFrame {
        SensorFrame {
            boiler_lower_limit: 48.0,
            boiler_upper_limit: 54.0,
            ..SensorFrame::default()
        }
    }

    fn measured(outdoor: f32, boiler: f32) -> MeasuredTemperatures {
        MeasuredTemperatures { outdoor, boiler }
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn unset_inputs_pass_readings_through() {
        let controller = controller();
        let values = controller.control_values(measured(3.5, 50.0), Some(&frame()), 1_000);

        assert_eq!(
            values,
            ControlValues {
                outdoor: 3.5,
                boiler: 50.0,
                vacation: false,
            }
        );
    }

    #[test]
    fn block_presents_boiler_above_upper_limit() {
        let mut controller = controller();
        controller.set_operating_mode(OperatingMode::Block, 0);

        let values = controller.control_values(measured(3.5, 40.0), Some(&frame()), 10);
        assert_eq!(values.boiler, 55.0);
    }

    #[test]
    fn boost_presents_boiler_below_lower_limit() {
        let mut controller = controller();
        controller.set_operating_mode(OperatingMode::Boost, 0);

        let values = controller.control_values(measured(3.5, 50.0), Some(&frame()), 10);
        assert_eq!(values.boiler, 47.0);
    }

    #[test]
    fn boost_falls_back_once_boiler_reaches_upper_limit() {
        let mut controller = controller();
        controller.set_operating_mode(OperatingMode::Boost, 0);

        let at_limit = controller.control_values(measured(3.5, 54.0), Some(&frame()), 10);
        assert_eq!(at_limit.boiler, 54.0);

        let above = controller.control_values(measured(3.5, 56.0), Some(&frame()), 10);
        assert_eq!(above.boiler, 56.0);
    }

    #[test]
    fn modes_need_a_frame() {
        let mut controller = controller();
        controller.set_operating_mode(OperatingMode::Block, 0);

        let values = controller.control_values(measured(3.5, 40.0), None, 10);
        assert_eq!(values.boiler, 40.0);
    }

    #[test]
    fn stale_mode_reverts_to_business_as_usual() {
        let mut controller = controller();
        controller.set_operating_mode(OperatingMode::Block, 1_000);

        assert_eq!(controller.operating_mode(1_000 + WINDOW), OperatingMode::Block);
        assert_eq!(
            controller.operating_mode(1_001 + WINDOW),
            OperatingMode::BusinessAsUsual
        );
        let values = controller.control_values(measured(3.5, 40.0), Some(&frame()), 1_001 + WINDOW);
        assert_eq!(values.boiler, 40.0);
    }

    #[test]
    fn feed_target_uses_inverse_heating_curve() {
        let mut controller = controller();
        controller.set_feed_temperature_target(36.0, 0);
        // Offsets are ignored while a feed target is in effect.
        controller.set_outdoor_temperature_offset(5.0, 0);

        let values = controller.control_values(measured(3.5, 50.0), Some(&frame()), 10);
        // slope 4: (36 - 20) / -0.64 + 20 = -5
        assert!(approx(values.outdoor, -5.0));
        assert!(!values.vacation);
    }

    #[test]
    fn stale_feed_target_is_ignored() {
        let mut controller = controller();
        controller.set_feed_temperature_target(36.0, 0);

        let values = controller.control_values(measured(3.5, 50.0), None, WINDOW + 1);
        assert_eq!(values.outdoor, 3.5);
    }

    #[test]
    fn low_feed_target_enables_vacation() {
        let mut controller = controller();
        // (19 - 20) / -0.64 + 20 = 21.5625
        controller.set_feed_temperature_target(19.0, 0);

        let values = controller.control_values(measured(3.5, 50.0), None, 10);
        assert!(approx(values.outdoor, 21.5625));
        assert!(values.vacation);
    }

    #[test]
    fn offset_and_indoor_feedback_add_up() {
        let mut controller = controller();
        controller.set_outdoor_temperature_offset(-2.0, 0);
        controller.set_indoor_temperature(21.5, 0);

        let values = controller.control_values(measured(3.0, 50.0), None, 10);
        // 3 - 2 + 1.0 * (21.5 - 20)
        assert!(approx(values.outdoor, 2.5));
    }

    #[test]
    fn zero_offset_is_a_real_value() {
        let mut controller = controller();
        controller.set_outdoor_temperature_offset(0.0, 0);

        let payload = controller.state_payload(10);
        assert!(payload.outdoor_temperature_offset.valid);
    }

    #[test]
    fn indoor_target_persists_and_weight_applies() {
        let mut controller = Controller::new(ControllerConfig {
            indoor_temperature_weight: 2.0,
            ..ControllerConfig::default()
        });
        controller.set_indoor_temperature_target(22.0, 0);
        controller.set_indoor_temperature(21.0, 2 * WINDOW);

        let values = controller.control_values(measured(3.0, 50.0), None, 2 * WINDOW + 10);
        // Target is older than the window but still applies.
        assert!(approx(values.outdoor, 1.0));
    }

    #[test]
    fn summer_limit_clamps_and_enables_vacation_when_freezing() {
        let mut controller = controller_with_summer_limit(20.0);
        controller.set_outdoor_temperature_offset(19.0, 0);

        let values = controller.control_values(measured(0.5, 50.0), None, 10);
        assert_eq!(values.outdoor, 19.0);
        assert!(values.vacation);
    }

    #[test]
    fn summer_limit_ignored_when_not_freezing() {
        let mut controller = controller_with_summer_limit(20.0);
        controller.set_outdoor_temperature_offset(17.5, 0);

        let values = controller.control_values(measured(2.0, 50.0), None, 10);
        assert!(approx(values.outdoor, 19.5));
        assert!(!values.vacation);
    }

    #[test]
    fn summer_limit_ignored_below_threshold() {
        let mut controller = controller_with_summer_limit(20.0);
        controller.set_outdoor_temperature_offset(18.0, 0);

        let values = controller.control_values(measured(0.5, 50.0), None, 10);
        assert!(approx(values.outdoor, 18.5));
        assert!(!values.vacation);
    }

    #[test]
    fn high_surrogate_enables_vacation_without_clamp() {
        let controller = controller();
        let values = controller.control_values(measured(24.0, 50.0), None, 10);

        assert_eq!(values.outdoor, 24.0);
        assert!(values.vacation);
    }

    #[test]
    fn state_payload_reports_validity() {
        let mut controller = controller();
        controller.set_feed_temperature_target(30.0, 100);
        controller.set_operating_mode(OperatingMode::Boost, 100);

        let payload = controller.state_payload(200);
        assert!(payload.feed_temperature_target.valid);
        assert_eq!(payload.feed_temperature_target.value, 30.0);
        assert!(!payload.indoor_temperature_feedback.valid);
        assert_eq!(payload.operating_mode, "BOOST");
        assert!(payload.operating_mode_valid);

        let stale = controller.state_payload(200 + WINDOW);
        assert!(!stale.feed_temperature_target.valid);
        assert_eq!(stale.operating_mode, "BAU");
    }
}
