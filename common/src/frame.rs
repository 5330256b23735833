use crate::types::{DeviceInfo, DeviceState, GatePosition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    DeviceInfoRequest,
    DeviceInfoResponse,
    StateGetRequest,
    StateResponse,
    StateSetRequest,
}

impl FrameKind {
    pub fn code(self) -> u16 {
        match self {
            Self::StateSetRequest => 0x1230,
            Self::StateResponse => 0x1231,
            Self::StateGetRequest => 0x1232,
            Self::DeviceInfoRequest => 0x4009,
            Self::DeviceInfoResponse => 0x400A,
        }
    }
}

/// Snapshot produced at the end of a status poll cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateResponse {
    pub request_id: u32,

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
    pub errors: u32,

    pub filter_warning: bool,
    pub heater_present: bool,
    pub gate_open: bool,
    pub max_fan_speed: u8,
}

/// Full target state sent to the device, plus one-shot maintenance flags.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSetRequest {
    pub request_id: u32,

    pub power: bool,
    pub heater: bool,
    pub sound: bool,
    pub led: bool,
    pub fan_speed: u8,
    pub target_temperature: i8,

    pub filter_reset: bool,
    /// Requested filter lifetime in days; zero restores the device default.
    pub filter_time_days: u16,
    pub factory_reset: bool,
    pub error_reset: bool,
}

impl StateSetRequest {
    pub fn from_state(state: &DeviceState, request_id: u32) -> Self {
        Self {
            request_id,
            power: state.power,
            heater: state.heater,
            sound: state.sound,
            led: state.led,
            // The device has no recirculation mode, zero speed is never sent.
            fan_speed: state.fan_speed.max(1),
            target_temperature: state.target_temperature,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    DeviceInfoRequest,
    DeviceInfoResponse(DeviceInfo),
    StateGetRequest,
    StateResponse(StateResponse),
    StateSetRequest(StateSetRequest),
}

impl Frame {
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::DeviceInfoRequest => FrameKind::DeviceInfoRequest,
            Self::DeviceInfoResponse(_) => FrameKind::DeviceInfoResponse,
            Self::StateGetRequest => FrameKind::StateGetRequest,
            Self::StateResponse(_) => FrameKind::StateResponse,
            Self::StateSetRequest(_) => FrameKind::StateSetRequest,
        }
    }
}

/// One caller-requested update. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub fan_speed: Option<u8>,
    pub power: Option<bool>,
    pub heater: Option<bool>,
    pub target_temperature: Option<i8>,
    pub sound: Option<bool>,
    pub led: Option<bool>,
    pub gate_position: Option<GatePosition>,
    pub auto_state: Option<bool>,

    pub filter_reset: bool,
    pub factory_reset: bool,
    pub error_reset: bool,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn has_field_changes(&self) -> bool {
        self.fan_speed.is_some()
            || self.power.is_some()
            || self.heater.is_some()
            || self.target_temperature.is_some()
            || self.sound.is_some()
            || self.led.is_some()
            || self.gate_position.is_some()
            || self.auto_state.is_some()
    }

    /// Copies every field set in `other` over this change-set.
    pub fn merge(&mut self, other: ChangeSet) {
        self.fan_speed = other.fan_speed.or(self.fan_speed);
        self.power = other.power.or(self.power);
        self.heater = other.heater.or(self.heater);
        self.target_temperature = other.target_temperature.or(self.target_temperature);
        self.sound = other.sound.or(self.sound);
        self.led = other.led.or(self.led);
        self.gate_position = other.gate_position.or(self.gate_position);
        self.auto_state = other.auto_state.or(self.auto_state);
        self.filter_reset |= other.filter_reset;
        self.factory_reset |= other.factory_reset;
        self.error_reset |= other.error_reset;
    }
}
