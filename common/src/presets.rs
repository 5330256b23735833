use serde::{Deserialize, Serialize};

use crate::{
    frame::ChangeSet,
    types::{DeviceState, GatePosition},
};

/// Reserved preset name meaning "no preset active".
pub const PRESET_NONE: &str = "none";

pub fn is_preset_none(name: &str) -> bool {
    name.is_empty() || name.eq_ignore_ascii_case(PRESET_NONE)
}

/// Named partial target. Unset fields are left alone when the preset is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heater: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fan_speed: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_temperature: Option<i8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gate_position: Option<GatePosition>,
}

impl PresetData {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn to_change_set(&self) -> ChangeSet {
        ChangeSet {
            power: self.power,
            heater: self.heater,
            fan_speed: self.fan_speed,
            target_temperature: self.target_temperature,
            gate_position: self.gate_position,
            ..ChangeSet::default()
        }
    }

    /// True when any field this preset specifies differs from `state`.
    pub fn is_modified_by(&self, state: &DeviceState) -> bool {
        self.power.is_some_and(|power| power != state.power)
            || self.heater.is_some_and(|heater| heater != state.heater)
            || self.fan_speed.is_some_and(|fan| fan != state.fan_speed)
            || self
                .target_temperature
                .is_some_and(|temp| temp != state.target_temperature)
            || self
                .gate_position
                .is_some_and(|gate| gate != state.gate_position)
    }
}

/// State captured when a boost starts, restored when it ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoostSaveState {
    /// Device work time at activation, in seconds.
    pub start_time: u32,
    pub power: bool,
    pub heater: bool,
    /// Absent until a non-zero speed has been captured.
    pub fan_speed: Option<u8>,
    pub target_temperature: i8,
    pub gate_position: GatePosition,
}

impl BoostSaveState {
    /// Takes a snapshot of `state`. The fan speed of `previous` is kept unless
    /// `save_fan` is set.
    pub fn capture(state: &DeviceState, previous: &BoostSaveState, save_fan: bool) -> Self {
        Self {
            start_time: state.work_time,
            power: state.power,
            heater: state.heater,
            fan_speed: if save_fan {
                (state.fan_speed > 0).then_some(state.fan_speed)
            } else {
                previous.fan_speed
            },
            target_temperature: state.target_temperature,
            gate_position: state.gate_position,
        }
    }

    pub fn to_change_set(&self) -> ChangeSet {
        ChangeSet {
            power: Some(self.power),
            heater: Some(self.heater),
            fan_speed: self.fan_speed,
            target_temperature: Some(self.target_temperature),
            gate_position: Some(self.gate_position),
            ..ChangeSet::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn none_name_matches_case_insensitively() {
        assert!(is_preset_none("none"));
        assert!(is_preset_none("NONE"));
        assert!(is_preset_none(""));
        assert!(!is_preset_none("eco"));
    }

    #[test]
    fn preset_parses_from_partial_json() {
        let preset: PresetData =
            serde_json::from_str(r#"{"fan_speed": 2, "gate_position": "indoor"}"#).unwrap();
        assert_eq!(
            preset,
            PresetData {
                fan_speed: Some(2),
                gate_position: Some(GatePosition::Indoor),
                ..PresetData::default()
            }
        );
        assert!(!preset.is_empty());
        assert!(serde_json::from_str::<PresetData>("{}").unwrap().is_empty());
    }

    #[test]
    fn modification_only_checks_specified_fields() {
        let preset = PresetData {
            fan_speed: Some(2),
            heater: Some(false),
            ..PresetData::default()
        };
        let state = DeviceState {
            fan_speed: 2,
            heater: false,
            target_temperature: 23,
            power: true,
            ..DeviceState::default()
        };
        assert!(!preset.is_modified_by(&state));

        let faster = DeviceState {
            fan_speed: 4,
            ..state
        };
        assert!(preset.is_modified_by(&faster));
    }

    #[test]
    fn boost_snapshot_keeps_previous_fan_on_request() {
        let before = DeviceState {
            power: true,
            fan_speed: 3,
            target_temperature: 18,
            work_time: 100,
            ..DeviceState::default()
        };
        let first = BoostSaveState::capture(&before, &BoostSaveState::default(), true);
        assert_eq!(first.fan_speed, Some(3));
        assert_eq!(first.start_time, 100);

        let during = DeviceState {
            power: false,
            fan_speed: 6,
            work_time: 400,
            ..before
        };
        let second = BoostSaveState::capture(&during, &first, false);
        assert_eq!(second.fan_speed, Some(3));
        assert!(!second.power);
    }

    #[test]
    fn boost_restore_skips_uncaptured_fan() {
        let stopped = DeviceState {
            power: true,
            fan_speed: 0,
            ..DeviceState::default()
        };
        let saved = BoostSaveState::capture(&stopped, &BoostSaveState::default(), true);
        let change = saved.to_change_set();
        assert_eq!(change.fan_speed, None);
        assert_eq!(change.target_temperature, Some(0));
        assert_eq!(change.power, Some(true));
        assert_eq!(change.gate_position, Some(GatePosition::Closed));
    }
}
