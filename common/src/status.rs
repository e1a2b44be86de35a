use crate::types::{HvacAction, HvacMode};

pub const AGUA_STATUS_OFF: &str = "OFF";
pub const AGUA_STATUS_ON: &str = "ON";
pub const AGUA_STATUS_FLAME: &str = "FLAME LIGHT";
pub const AGUA_STATUS_CLEANING: &str = "CLEANING FIRE-POT";
pub const AGUA_STATUS_CLEANING_FINAL: &str = "CLEANING FINAL";

// Status codes the stove reports while it is switched off.
const OFF_STATUS_CODES: [i32; 2] = [0, 6];

const HVAC_ACTION_MAP: [(&str, HvacAction); 5] = [
    (AGUA_STATUS_OFF, HvacAction::Off),
    (AGUA_STATUS_ON, HvacAction::Heating),
    (AGUA_STATUS_FLAME, HvacAction::Heating),
    (AGUA_STATUS_CLEANING, HvacAction::Idle),
    (AGUA_STATUS_CLEANING_FINAL, HvacAction::Idle),
];

pub fn hvac_action_for(status_translated: &str) -> HvacAction {
    HVAC_ACTION_MAP
        .iter()
        .find(|(status, _)| *status == status_translated)
        .map(|(_, action)| *action)
        .unwrap_or(HvacAction::Idle)
}

pub fn hvac_mode_for(status: i32) -> HvacMode {
    if OFF_STATUS_CODES.contains(&status) {
        HvacMode::Off
    } else {
        HvacMode::Heat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_statuses_map_to_actions() {
        assert_eq!(hvac_action_for("OFF"), HvacAction::Off);
        assert_eq!(hvac_action_for("ON"), HvacAction::Heating);
        assert_eq!(hvac_action_for("FLAME LIGHT"), HvacAction::Heating);
        assert_eq!(hvac_action_for("CLEANING FIRE-POT"), HvacAction::Idle);
        assert_eq!(hvac_action_for("CLEANING FINAL"), HvacAction::Idle);
    }

    #[test]
    fn unknown_status_defaults_to_idle() {
        assert_eq!(hvac_action_for("MODULATION"), HvacAction::Idle);
        assert_eq!(hvac_action_for(""), HvacAction::Idle);
        assert_eq!(hvac_action_for("on"), HvacAction::Idle);
    }

    #[test]
    fn off_codes_are_zero_and_six() {
        assert_eq!(hvac_mode_for(0), HvacMode::Off);
        assert_eq!(hvac_mode_for(6), HvacMode::Off);
        for code in [1, 2, 3, 4, 5, 7, -1] {
            assert_eq!(hvac_mode_for(code), HvacMode::Heat, "status {code}");
        }
    }
}
