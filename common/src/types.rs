use serde::{Deserialize, Serialize};

/// Seconds in one day, used for filter time conversions.
pub const SECONDS_PER_DAY: u32 = 86_400;

/// Airflow counter units per cubic meter.
pub const AIRFLOW_UNITS_PER_M3: f32 = 600.0;

const ERROR_MIN_BIT: u8 = 0;
const ERROR_MAX_BIT: u8 = 10;
const WARNING_MIN_BIT: u8 = 24;
const WARNING_MAX_BIT: u8 = 27;
const GATE_ERROR_MASK: u32 = 0b111;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatePosition {
    Outdoor,
    Indoor,
    Mixed,
    Opened,
    #[default]
    Closed,
}

impl GatePosition {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Outdoor => "outdoor",
            Self::Indoor => "indoor",
            Self::Mixed => "mixed",
            Self::Opened => "opened",
            Self::Closed => "closed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "outdoor" => Some(Self::Outdoor),
            "indoor" => Some(Self::Indoor),
            "mixed" => Some(Self::Mixed),
            "opened" => Some(Self::Opened),
            "closed" => Some(Self::Closed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkMode {
    Normal,
    Bootloader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceType {
    BreezerLt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub work_mode: WorkMode,
    pub device_type: DeviceType,
    pub firmware_version: u16,
    pub hardware_version: u16,
}

/// Authoritative device state held by the engine.
///
/// Refreshed once per completed poll cycle. `boost_time_left` is owned by the
/// engine and survives refreshes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceState {
    pub initialized: bool,

    pub power: bool,
    pub heater: bool,
    pub sound: bool,
    pub led: bool,
    pub auto_state: bool,
    pub filter_warning: bool,
    pub heater_present: bool,

    pub gate_position: GatePosition,
    pub gate_error: bool,

    pub fan_speed: u8,
    pub target_temperature: i8,
    pub outdoor_temperature: i8,
    pub current_temperature: i8,
    pub heater_var: u8,

    pub work_time: u32,
    pub fan_time: u32,
    pub filter_time_left: u32,
    pub airflow_counter: u32,

    pub errors: u32,
    pub firmware_version: u16,
    pub hardware_version: u16,

    pub boost_time_left: u32,
}

impl DeviceState {
    pub fn is_boosting(&self) -> bool {
        self.boost_time_left > 0
    }

    pub fn filter_days_left(&self) -> u32 {
        self.filter_time_left / SECONDS_PER_DAY
    }

    pub fn airflow_m3(&self) -> f32 {
        self.airflow_counter as f32 / AIRFLOW_UNITS_PER_M3
    }

    /// Heuristic heating detection for devices that do not report a duty value.
    pub fn is_heating(&self, supports_heater_var: bool) -> bool {
        if supports_heater_var {
            return self.heater_var > 0;
        }
        if !self.heater || !self.heater_present {
            return false;
        }
        i16::from(self.target_temperature) - i16::from(self.outdoor_temperature) > 3
            && self.current_temperature > self.outdoor_temperature
    }

    pub fn has_gate_error(errors: u32) -> bool {
        errors & GATE_ERROR_MASK != 0
    }

    pub fn error_summary(&self) -> String {
        decode_errors(self.errors)
    }
}

/// Renders an error register as `EC<n>`/`WS<n>` codes, e.g. `"EC1, WS2"`.
pub fn decode_errors(errors: u32) -> String {
    if errors == 0 {
        return String::new();
    }

    let errors_iter = (ERROR_MIN_BIT..=ERROR_MAX_BIT)
        .filter(|bit| errors & (1u32 << *bit) != 0)
        .map(|bit| format!("EC{}", bit - ERROR_MIN_BIT + 1));
    let warnings_iter = (WARNING_MIN_BIT..=WARNING_MAX_BIT)
        .filter(|bit| errors & (1u32 << *bit) != 0)
        .map(|bit| format!("WS{}", bit - WARNING_MIN_BIT + 1));

    errors_iter.chain(warnings_iter).collect::<Vec<_>>().join(", ")
}

pub fn describe_error_code(code: &str) -> &'static str {
    match code {
        "EC1" | "EC2" | "EC3" => "gate malfunction",
        "EC4" | "EC5" | "EC6" | "EC11" => "heater malfunction",
        "EC7" | "EC8" | "EC9" | "EC10" => "temperature sensor failure",
        "WS1" => "intake air temperature above limit",
        "WS2" => "intake air temperature below limit",
        "WS3" => "control board temperature above limit",
        "WS4" => "control board temperature below limit",
        _ => "unknown",
    }
}
