//! MQTT topic suffixes, joined onto the configured base topic.

pub const TOPIC_SET_FEED_TARGET: &str = "controller/set/feed_temperature_target";
pub const TOPIC_SET_OUTDOOR_OFFSET: &str = "controller/set/outdoor_temperature_offset";
pub const TOPIC_SET_INDOOR_TARGET: &str = "controller/set/indoor_temperature_target";
pub const TOPIC_SET_INDOOR_ACTUAL: &str = "controller/set/indoor_temperature_actual";
pub const TOPIC_FEEDBACK_INDOOR: &str = "controller/feedback/indoor_temperature";
pub const TOPIC_SET_OPERATING_MODE: &str = "controller/set/operating_mode";

pub const TOPIC_HEATPUMP_RAW: &str = "ivt490/raw";
pub const TOPIC_HEATPUMP_STATE: &str = "ivt490/state";
pub const TOPIC_CONTROLLER_STATE: &str = "controller/state";
pub const TOPIC_BRIDGE_STATE: &str = "bridge/state";

pub const COMMAND_TOPICS: [&str; 6] = [
    TOPIC_SET_FEED_TARGET,
    TOPIC_SET_OUTDOOR_OFFSET,
    TOPIC_SET_INDOOR_TARGET,
    TOPIC_SET_INDOOR_ACTUAL,
    TOPIC_FEEDBACK_INDOOR,
    TOPIC_SET_OPERATING_MODE,
];

pub fn full_topic(base: &str, suffix: &str) -> String {
    format!("{base}/{suffix}")
}

/// Strips `base/` from an incoming topic.
pub fn topic_suffix<'a>(base: &str, topic: &'a str) -> Option<&'a str> {
    topic.strip_prefix(base)?.strip_prefix('/')
}
