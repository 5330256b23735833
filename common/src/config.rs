use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::presets::PresetData;

pub const DEFAULT_BOOST_TIME_S: u32 = 1_200;

/// Capabilities of the connected breezer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Traits {
    pub max_fan_speed: u8,
    pub min_target_temperature: i8,
    pub max_target_temperature: i8,

    pub supports_sound_state: bool,
    pub supports_led_state: bool,
    pub supports_heater_var: bool,
    pub supports_antifreeze: bool,
    /// Device runs boost on its own timer.
    pub supports_boost: bool,
    pub supports_gate_position_change: bool,
    pub supports_gate_position_change_mixed: bool,

    pub boost_time: u32,
    pub boost_heater_state: Option<bool>,
    pub boost_target_temperature: Option<i8>,
}

impl Default for Traits {
    fn default() -> Self {
        Self {
            max_fan_speed: 6,
            min_target_temperature: 0,
            max_target_temperature: 25,
            supports_sound_state: true,
            supports_led_state: true,
            supports_heater_var: true,
            supports_antifreeze: false,
            supports_boost: false,
            supports_gate_position_change: false,
            supports_gate_position_change_mixed: false,
            boost_time: DEFAULT_BOOST_TIME_S,
            boost_heater_state: None,
            boost_target_temperature: None,
        }
    }
}

impl Traits {
    pub fn sanitize(&mut self) {
        if self.min_target_temperature > self.max_target_temperature {
            std::mem::swap(
                &mut self.min_target_temperature,
                &mut self.max_target_temperature,
            );
        }

        self.max_fan_speed = self.max_fan_speed.clamp(1, 6);

        if self
            .boost_target_temperature
            .is_some_and(|temp| !self.target_temperature_in_range(temp))
        {
            self.boost_target_temperature = None;
        }
    }

    pub fn target_temperature_in_range(&self, temp: i8) -> bool {
        (self.min_target_temperature..=self.max_target_temperature).contains(&temp)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
        }
    }
}

impl SerialConfig {
    pub fn sanitize(&mut self) {
        if self.port.trim().is_empty() {
            self.port = Self::default().port;
        }
        if self.baud_rate == 0 {
            self.baud_rate = Self::default().baud_rate;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub traits: Traits,
    pub presets: BTreeMap<String, PresetData>,
    pub serial: SerialConfig,
    pub poll_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            traits: Traits::default(),
            presets: BTreeMap::new(),
            serial: SerialConfig::default(),
            poll_interval_ms: 5_000,
        }
    }
}

impl RuntimeConfig {
    pub fn sanitize(&mut self) {
        self.traits.sanitize();
        self.serial.sanitize();
        self.poll_interval_ms = self.poll_interval_ms.clamp(500, 600_000);
    }
}
