use std::fmt;

use crate::types::SECONDS_PER_DAY;

const CMD_LOG_ENABLE: &str = "logenable noit\r\n";
const CMD_GET_STATE: &str = "getstate\r\n";
const CMD_POWER_ON: &str = "pon\r\n";
const CMD_POWER_OFF: &str = "stby\r\n";
const CMD_HEATER_ON: &str = "set_heater_state 1\r\n";
const CMD_HEATER_OFF: &str = "set_heater_state 0\r\n";
const CMD_SOUND_ON: &str = "set_sound_state 1\r\n";
const CMD_SOUND_OFF: &str = "set_sound_state 0\r\n";
const CMD_LED_ON: &str = "set_led_state 1\r\n";
const CMD_LED_OFF: &str = "set_led_state 0\r\n";
const CMD_FACTORY_RESET: &str = "factoryreset\r\n";
// Restores the default filter lifetime of 180 days.
const CMD_FILTER_RESET: &str = "ftreset\r\n";

const CMD_SET_SPEED: &str = "set_speed {}\r\n";
const CMD_SET_TEMP: &str = "set_temp {}\r\n";
const CMD_SET_FILTER_TIME: &str = "set_filtertime {}\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    LogEnable,
    GetState,
    Power(bool),
    Heater(bool),
    Sound(bool),
    Led(bool),
    FanSpeed(u8),
    TargetTemperature(i8),
    FilterTime(u32),
    FilterReset,
    FactoryReset,
}

impl Command {
    pub fn filter_time_days(days: u16) -> Self {
        Self::FilterTime(u32::from(days) * SECONDS_PER_DAY)
    }

    /// Wire text including the `\r\n` terminator.
    pub fn to_wire(self) -> String {
        match self {
            Self::FanSpeed(speed) => substitute(CMD_SET_SPEED, speed),
            Self::TargetTemperature(temp) => substitute(CMD_SET_TEMP, temp),
            Self::FilterTime(seconds) => substitute(CMD_SET_FILTER_TIME, seconds),
            other => other.literal().to_string(),
        }
    }

    fn literal(self) -> &'static str {
        match self {
            Self::LogEnable => CMD_LOG_ENABLE,
            Self::GetState => CMD_GET_STATE,
            Self::Power(true) => CMD_POWER_ON,
            Self::Power(false) => CMD_POWER_OFF,
            Self::Heater(true) => CMD_HEATER_ON,
            Self::Heater(false) => CMD_HEATER_OFF,
            Self::Sound(true) => CMD_SOUND_ON,
            Self::Sound(false) => CMD_SOUND_OFF,
            Self::Led(true) => CMD_LED_ON,
            Self::Led(false) => CMD_LED_OFF,
            Self::FilterReset => CMD_FILTER_RESET,
            Self::FactoryReset => CMD_FACTORY_RESET,
            Self::FanSpeed(_) | Self::TargetTemperature(_) | Self::FilterTime(_) => "",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_wire().trim_end())
    }
}

fn substitute(template: &str, param: impl fmt::Display) -> String {
    template.replacen("{}", &param.to_string(), 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_commands() {
        assert_eq!(Command::GetState.to_wire(), "getstate\r\n");
        assert_eq!(Command::LogEnable.to_wire(), "logenable noit\r\n");
        assert_eq!(Command::Power(true).to_wire(), "pon\r\n");
        assert_eq!(Command::Power(false).to_wire(), "stby\r\n");
        assert_eq!(Command::Heater(true).to_wire(), "set_heater_state 1\r\n");
        assert_eq!(Command::FilterReset.to_wire(), "ftreset\r\n");
    }

    #[test]
    fn parameterized_commands() {
        assert_eq!(Command::FanSpeed(6).to_wire(), "set_speed 6\r\n");
        assert_eq!(Command::TargetTemperature(-3).to_wire(), "set_temp -3\r\n");
        assert_eq!(
            Command::filter_time_days(181).to_wire(),
            "set_filtertime 15638400\r\n"
        );
    }

    #[test]
    fn display_drops_terminator() {
        assert_eq!(Command::Led(false).to_string(), "set_led_state 0");
    }
}
