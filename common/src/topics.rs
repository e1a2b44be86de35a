pub const TOPIC_PREFIX: &str = "aguaiot";

pub const CMD_MODE: &str = "mode";
pub const CMD_TEMPERATURE: &str = "temperature";
pub const CMD_FAN: &str = "fan";
pub const CMD_POWER: &str = "power";

pub fn state_topic(unique_id: &str) -> String {
    format!("{TOPIC_PREFIX}/{unique_id}/state")
}

pub fn availability_topic(unique_id: &str) -> String {
    format!("{TOPIC_PREFIX}/{unique_id}/availability")
}

pub fn command_topic(unique_id: &str, command: &str) -> String {
    format!("{TOPIC_PREFIX}/{unique_id}/cmnd/{command}")
}

pub fn command_filter() -> String {
    format!("{TOPIC_PREFIX}/+/cmnd/+")
}

pub fn parse_command_topic(topic: &str) -> Option<(&str, &str)> {
    let mut parts = topic.split('/');
    let (Some(TOPIC_PREFIX), Some(id), Some("cmnd"), Some(command), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return None;
    };

    if id.is_empty() || command.is_empty() {
        return None;
    }
    Some((id, command))
}
