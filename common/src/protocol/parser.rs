use tracing::{debug, warn};

use crate::{
    frame::{Frame, StateResponse},
    types::{DeviceInfo, DeviceType, WorkMode, SECONDS_PER_DAY},
};

pub const ST_SWITCHING_MODE: &str = "Switching Mode";
pub const ST_MODE: &str = "Current Mode: ";
pub const ST_SPEED: &str = "Speed: ";
pub const ST_SENSORS: &str = "Sensors T_set: ";
pub const ST_HEATER: &str = "PID_Value: ";
pub const ST_FILTER_TIME: &str = "Filter Time: ";
pub const ST_FAN_TIME: &str = "Working Time: ";
pub const ST_WORK_TIME: &str = "Power On Time: ";
pub const ST_ERROR: &str = "Error register:";
pub const ST_MAC: &str = "MAC: ";
pub const ST_FIRMWARE: &str = "Firmware Version 0x";

// The wire labels read "In" for the value stored as outdoor temperature and
// "out" for the value stored as current temperature.
const ST_SENSORS_OUTDOOR: &str = ", T_In: ";
const ST_SENSORS_CURRENT: &str = ", T_out: ";

/// Maximum fan speed reported by this device family.
pub const MAX_FAN_SPEED: u8 = 6;

/// Filter warning threshold in days.
pub const FILTER_WARNING_DAYS: u32 = 30;

/// Airflow in m³/h for each fan speed, index 0 is standby.
const FLOW_RATE: [u32; 7] = [0, 15, 30, 45, 60, 75, 85];

/// Divides `seconds * m³/h` down to airflow counter units (1/600 m³).
const AIRFLOW_SCALE: u32 = 6;

/// Working copy of the fields reported during a status poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorState {
    pub power: bool,
    pub heater: bool,
    pub sound: bool,
    pub led: bool,
    pub fan_speed: u8,
    pub target_temperature: i8,
    pub outdoor_temperature: i8,
    pub current_temperature: i8,
    pub heater_var: u8,
    pub work_time: u32,
    pub fan_time: u32,
    pub filter_time: u32,
    pub airflow_counter: u32,

    fan_time_seen: bool,
}

impl MirrorState {
    /// Applies one status line. Returns a frame when the line closes a cycle
    /// or carries device info.
    pub fn apply_line(&mut self, line: &str) -> Option<Frame> {
        if let Some(rest) = line.strip_prefix(ST_MODE) {
            // "Work" or "StandBy"
            self.power = rest.starts_with('W');
        } else if let Some(rest) = line.strip_prefix(ST_SPEED) {
            self.fan_speed = parse_long(rest, 10).0 as u8;
            debug!("got fan: {}", self.fan_speed);
        } else if let Some(rest) = line.strip_prefix(ST_SENSORS) {
            self.apply_sensors(rest);
        } else if let Some(rest) = line.strip_prefix(ST_HEATER) {
            let (heater_var, rest) = parse_long(rest, 10);
            self.heater_var = heater_var as u8;
            self.heater = parse_long(rest, 10).0 != 0;
            debug!("got heat: var={}, state={}", self.heater_var, self.heater);
        } else if let Some(rest) = line.strip_prefix(ST_FILTER_TIME) {
            self.filter_time = parse_long(rest, 10).0 as u32;
            debug!("got filter time: {}", self.filter_time);
        } else if let Some(rest) = line.strip_prefix(ST_FAN_TIME) {
            self.apply_fan_time(parse_long(rest, 10).0 as u32);
        } else if let Some(rest) = line.strip_prefix(ST_WORK_TIME) {
            self.work_time = parse_long(rest, 10).0 as u32;
            debug!("got work time: {}", self.work_time);
        } else if let Some(rest) = line.strip_prefix(ST_ERROR) {
            let errors = parse_long(rest, 10).0 as u32;
            debug!("got errors: {errors}");
            return Some(Frame::StateResponse(self.snapshot(errors)));
        } else if let Some(rest) = line.strip_prefix(ST_FIRMWARE) {
            let firmware_version = parse_long(rest, 16).0 as u16;
            debug!("got firmware: {firmware_version:04X}");
            return Some(Frame::DeviceInfoResponse(DeviceInfo {
                work_mode: WorkMode::Normal,
                device_type: DeviceType::BreezerLt,
                firmware_version,
                hardware_version: 0,
            }));
        } else if line.starts_with(ST_MAC) || line.starts_with(ST_SWITCHING_MODE) {
            // recognized, nothing to keep
        } else {
            warn!("unsupported line: {line}");
        }

        None
    }

    fn apply_sensors(&mut self, rest: &str) {
        let (target, rest) = parse_long(rest, 10);
        self.target_temperature = target as i8;
        if let Some(rest) = rest.strip_prefix(ST_SENSORS_OUTDOOR) {
            let (outdoor, rest) = parse_long(rest, 10);
            self.outdoor_temperature = outdoor as i8;
            if let Some(rest) = rest.strip_prefix(ST_SENSORS_CURRENT) {
                self.current_temperature = parse_long(rest, 10).0 as i8;
            }
        }
        debug!(
            "got sensors: target={}, outdoor={}, current={}",
            self.target_temperature, self.outdoor_temperature, self.current_temperature
        );
    }

    /// Fan time is reported after speed, so the airflow for the elapsed
    /// interval is accounted at the current speed.
    fn apply_fan_time(&mut self, fan_time: u32) {
        if self.fan_time_seen && fan_time >= self.fan_time {
            let delta = fan_time - self.fan_time;
            let rate = FLOW_RATE
                .get(usize::from(self.fan_speed))
                .copied()
                .unwrap_or(0);
            let added = delta.saturating_mul(rate) / AIRFLOW_SCALE;
            self.airflow_counter = self.airflow_counter.wrapping_add(added);
        }
        self.fan_time = fan_time;
        self.fan_time_seen = true;
        debug!("got fan time: {fan_time}");
    }

    fn snapshot(&self, errors: u32) -> StateResponse {
        StateResponse {
            request_id: 0,
            power: self.power,
            heater: self.heater,
            sound: self.sound,
            led: self.led,
            fan_speed: self.fan_speed,
            target_temperature: self.target_temperature,
            outdoor_temperature: self.outdoor_temperature,
            current_temperature: self.current_temperature,
            heater_var: self.heater_var,
            work_time: self.work_time,
            fan_time: self.fan_time,
            filter_time: self.filter_time,
            airflow_counter: self.airflow_counter,
            errors,
            filter_warning: self.filter_time / SECONDS_PER_DAY <= FILTER_WARNING_DAYS,
            heater_present: true,
            gate_open: self.power,
            max_fan_speed: MAX_FAN_SPEED,
        }
    }
}

/// Parses a leading integer the way `strtol` does: optional whitespace and
/// sign, then digits in `radix`. Returns 0 and the untouched input when no
/// digits are found.
pub(crate) fn parse_long(input: &str, radix: u32) -> (i64, &str) {
    let trimmed = input.trim_start();
    let (negative, unsigned) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits = unsigned
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(unsigned.len());
    if digits == 0 {
        return (0, input);
    }

    let value = unsigned[..digits]
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0i64, |acc, digit| {
            acc.saturating_mul(i64::from(radix))
                .saturating_add(i64::from(digit))
        });

    (if negative { -value } else { value }, &unsigned[digits..])
}
