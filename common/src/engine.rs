use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};

use crate::{
    config::Traits,
    frame::{ChangeSet, Frame, StateResponse, StateSetRequest},
    presets::{is_preset_none, BoostSaveState, PresetData, PRESET_NONE},
    types::{decode_errors, describe_error_code, DeviceInfo, DeviceState, GatePosition},
};

/// Filter lifetime written by a plain filter reset, in days.
pub const FILTER_RESET_DAYS: u16 = 181;

/// Work the host has to carry out on behalf of the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineAction {
    RequestDeviceInfo,
    RequestState,
    WriteState(StateSetRequest),
    /// Start or stop the device's own boost timer.
    NativeBoost(bool),
}

impl EngineAction {
    /// Frame to encode for this action. Native boost has no frame on the
    /// line protocol.
    pub fn into_frame(self) -> Option<Frame> {
        match self {
            Self::RequestDeviceInfo => Some(Frame::DeviceInfoRequest),
            Self::RequestState => Some(Frame::StateGetRequest),
            Self::WriteState(set) => Some(Frame::StateSetRequest(set)),
            Self::NativeBoost(_) => None,
        }
    }
}

pub trait StateSubscriber {
    fn notify(&mut self, state: &DeviceState, request_id: u32);
}

impl<F> StateSubscriber for F
where
    F: FnMut(&DeviceState, u32),
{
    fn notify(&mut self, state: &DeviceState, request_id: u32) {
        self(state, request_id)
    }
}

/// Owns the canonical device state and reconciles requested changes against
/// it. Never touches I/O: every operation returns the actions to execute.
pub struct BreezerEngine {
    traits: Traits,
    state: DeviceState,
    /// Highest fan speed the device itself reports.
    reported_max_fan_speed: Option<u8>,

    presets: BTreeMap<String, PresetData>,
    active_preset: Option<String>,

    boost_save: BoostSaveState,

    subscribers: Vec<Box<dyn StateSubscriber>>,
    next_request_id: u32,
}

impl BreezerEngine {
    pub fn new(mut traits: Traits) -> Self {
        traits.sanitize();
        Self {
            traits,
            state: DeviceState::default(),
            reported_max_fan_speed: None,
            presets: BTreeMap::new(),
            active_preset: None,
            boost_save: BoostSaveState::default(),
            subscribers: Vec::new(),
            next_request_id: 1,
        }
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    pub fn traits(&self) -> &Traits {
        &self.traits
    }

    /// Configured fan speed cap, lowered to what the device reports.
    pub fn max_fan_speed(&self) -> u8 {
        let configured = self.traits.max_fan_speed;
        self.reported_max_fan_speed
            .map_or(configured, |reported| configured.min(reported))
    }

    pub fn active_preset(&self) -> &str {
        self.active_preset.as_deref().unwrap_or(PRESET_NONE)
    }

    pub fn preset_names(&self) -> Vec<String> {
        let mut names: BTreeSet<&str> = self.presets.keys().map(String::as_str).collect();
        names.insert(PRESET_NONE);
        names.into_iter().map(str::to_string).collect()
    }

    pub fn preset(&self, name: &str) -> Option<&PresetData> {
        self.presets.get(name)
    }

    pub fn subscribe(&mut self, subscriber: impl StateSubscriber + 'static) {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn request_state(&self) -> Vec<EngineAction> {
        let mut actions = Vec::with_capacity(2);
        if self.state.firmware_version == 0 {
            debug!("request device info");
            actions.push(EngineAction::RequestDeviceInfo);
        }
        debug!("request state");
        actions.push(EngineAction::RequestState);
        actions
    }

    pub fn handle_frame(&mut self, frame: Frame) -> Vec<EngineAction> {
        match frame {
            Frame::DeviceInfoResponse(info) => {
                self.update_device_info(&info);
                Vec::new()
            }
            Frame::StateResponse(response) => {
                self.update_state(&response);
                self.on_poll_cycle_complete(response.request_id)
            }
            other => {
                let kind = other.kind();
                warn!("unsupported frame kind {kind:?} (0x{:04X})", kind.code());
                Vec::new()
            }
        }
    }

    fn update_device_info(&mut self, info: &DeviceInfo) {
        info!(
            "device info: type={:?}, mode={:?}, firmware={:04X}, hardware={:04X}",
            info.device_type, info.work_mode, info.firmware_version, info.hardware_version
        );
        self.state.firmware_version = info.firmware_version;
        self.state.hardware_version = info.hardware_version;
    }

    fn update_state(&mut self, response: &StateResponse) {
        let state = &mut self.state;
        state.initialized = true;

        state.power = response.power;
        state.heater = response.heater;
        state.sound = response.sound;
        state.led = response.led;
        state.filter_warning = response.filter_warning;
        state.heater_present = response.heater_present;
        state.gate_error = DeviceState::has_gate_error(response.errors);
        state.gate_position = if response.gate_open {
            GatePosition::Opened
        } else {
            GatePosition::Closed
        };

        state.fan_speed = response.fan_speed;
        state.target_temperature = response.target_temperature;
        state.outdoor_temperature = response.outdoor_temperature;
        state.current_temperature = response.current_temperature;
        state.heater_var = response.heater_var;

        state.work_time = response.work_time;
        state.fan_time = response.fan_time;
        state.filter_time_left = response.filter_time;
        state.airflow_counter = response.airflow_counter;
        state.errors = response.errors;

        if response.max_fan_speed > 0 {
            self.reported_max_fan_speed = Some(response.max_fan_speed);
        }

        if response.errors != 0 {
            let alerts: Vec<String> = decode_errors(response.errors)
                .split(", ")
                .map(|code| format!("{code} ({})", describe_error_code(code)))
                .collect();
            warn!("breezer alert: {}", alerts.join(", "));
        }

        let state = &self.state;
        debug!("state: {state:?}");
        debug!(
            "heating: {}, airflow: {:.3} m³, filter: {} days left",
            on_off(state.is_heating(self.traits.supports_heater_var)),
            state.airflow_m3(),
            state.filter_days_left()
        );
    }

    /// Runs after every completed poll cycle: boost supervision, preset
    /// invalidation, antifreeze, then subscriber notification. Any corrective
    /// writes are merged into a single state write.
    pub fn on_poll_cycle_complete(&mut self, request_id: u32) -> Vec<EngineAction> {
        let mut change = ChangeSet::default();
        let mut actions = Vec::new();

        if self.state.is_boosting() {
            actions.extend(self.supervise_boost(&mut change));
        }

        let preset_modified = self.active_preset.as_ref().is_some_and(|name| {
            self.presets
                .get(name)
                .map_or(true, |preset| preset.is_modified_by(&self.state))
        });
        if preset_modified {
            if let Some(name) = self.active_preset.take() {
                info!("preset '{name}' no longer matches device state");
            }
        }

        if self.traits.supports_antifreeze && self.needs_antifreeze(&self.state) {
            warn!("antifreeze protection triggered, enabling heater");
            change.heater = Some(true);
        }

        if !change.is_empty() {
            actions.extend(self.perform(change));
        }

        for subscriber in &mut self.subscribers {
            subscriber.notify(&self.state, request_id);
        }

        actions
    }

    fn supervise_boost(&mut self, change: &mut ChangeSet) -> Vec<EngineAction> {
        let max_fan_speed = self.max_fan_speed();
        if self.state.fan_speed != max_fan_speed || !self.state.power {
            info!("boost cancelled by user action");
            let save_fan = self.state.fan_speed != max_fan_speed;
            self.boost_save = BoostSaveState::capture(&self.state, &self.boost_save, save_fan);
            return self.boost_cancel(Some(change));
        }

        if self.traits.supports_boost {
            return Vec::new();
        }

        let elapsed = self
            .state
            .work_time
            .saturating_sub(self.boost_save.start_time);
        if elapsed < self.traits.boost_time {
            self.state.boost_time_left = self.traits.boost_time - elapsed;
            debug!("boost time left {} s", self.state.boost_time_left);
            Vec::new()
        } else {
            self.boost_cancel(Some(change))
        }
    }

    fn needs_antifreeze(&self, state: &DeviceState) -> bool {
        state.power && !state.heater && state.outdoor_temperature < 0
    }

    /// Validates `change` against the canonical state and returns the state it
    /// would produce. Rejected fields are reverted in `change` itself.
    pub fn apply_change_set(&self, change: &mut ChangeSet) -> DeviceState {
        let current = &self.state;
        let mut next = current.clone();

        if let Some(fan_speed) = change.fan_speed {
            if fan_speed == 0 {
                if change.power.unwrap_or(current.power) {
                    warn!("zero fan speed leads to power off");
                    change.power = Some(false);
                    change.fan_speed = Some(current.fan_speed);
                }
            } else if fan_speed > self.max_fan_speed() {
                warn!("disallowed fan speed: {fan_speed}");
                change.fan_speed = Some(current.fan_speed);
            } else {
                if fan_speed != current.fan_speed {
                    debug!("new fan speed {} -> {fan_speed}", current.fan_speed);
                }
                next.fan_speed = fan_speed;
            }
        }

        if let Some(power) = change.power {
            if power != current.power {
                debug!("new power state {} -> {}", on_off(current.power), on_off(power));
            }
            next.power = power;
        }

        if let Some(heater) = change.heater {
            if heater != current.heater {
                debug!("new heater state {} -> {}", on_off(current.heater), on_off(heater));
            }
            next.heater = heater;
        }

        if let Some(temp) = change.target_temperature {
            if self.traits.target_temperature_in_range(temp) {
                if temp != current.target_temperature {
                    debug!("new target temperature {} -> {temp}", current.target_temperature);
                }
                next.target_temperature = temp;
            } else {
                warn!(
                    "target temperature {temp} is out of range {}:{}",
                    self.traits.min_target_temperature, self.traits.max_target_temperature
                );
                change.target_temperature = Some(current.target_temperature);
            }
        }

        if self.traits.supports_sound_state {
            if let Some(sound) = change.sound {
                next.sound = sound;
            }
        }

        if self.traits.supports_led_state {
            if let Some(led) = change.led {
                next.led = led;
            }
        }

        if self.traits.supports_gate_position_change {
            if let Some(requested) = change.gate_position {
                next.gate_position = self.resolve_gate_position(requested, &mut next);
            }
        }

        if let Some(auto_state) = change.auto_state {
            debug!("auto mode is not carried by the line protocol");
            next.auto_state = auto_state;
        }

        if self.traits.supports_antifreeze && self.needs_antifreeze(&next) {
            warn!("antifreeze protection triggered, enabling heater");
            next.heater = true;
        }

        next
    }

    fn resolve_gate_position(&self, requested: GatePosition, next: &mut DeviceState) -> GatePosition {
        let resolved = match requested {
            GatePosition::Outdoor => requested,
            GatePosition::Indoor => {
                if next.heater {
                    warn!("indoor gate position disallows heater");
                    next.heater = false;
                }
                requested
            }
            GatePosition::Mixed if self.traits.supports_gate_position_change_mixed => requested,
            _ => self.state.gate_position,
        };
        if resolved != self.state.gate_position {
            debug!(
                "new gate position {} -> {}",
                self.state.gate_position.as_str(),
                resolved.as_str()
            );
        }
        resolved
    }

    /// Applies `change` and returns the writes needed to reach the result.
    pub fn perform(&mut self, mut change: ChangeSet) -> Vec<EngineAction> {
        if !self.state.initialized {
            warn!("state is not initialized, change rejected");
            return Vec::new();
        }
        debug!("perform {change:?}");

        let mut actions = Vec::new();
        if change.has_field_changes() {
            let next = self.apply_change_set(&mut change);
            let request_id = self.next_request_id();
            debug!("request[{request_id}] write state");
            actions.push(EngineAction::WriteState(StateSetRequest::from_state(
                &next, request_id,
            )));
        }
        if change.filter_reset {
            actions.extend(self.reset_filter(FILTER_RESET_DAYS));
        }
        if change.factory_reset {
            actions.extend(self.factory_reset());
        }
        if change.error_reset {
            actions.extend(self.reset_errors());
        }
        actions
    }

    /// Writes `change` into `ext` when given, otherwise performs it.
    fn compose(&mut self, change: ChangeSet, ext: Option<&mut ChangeSet>) -> Vec<EngineAction> {
        match ext {
            Some(ext) => {
                ext.merge(change);
                Vec::new()
            }
            None => self.perform(change),
        }
    }

    pub fn enable_boost(&mut self, on: bool, ext: Option<&mut ChangeSet>) -> Vec<EngineAction> {
        info!("switching boost to {}", on_off(on));
        if on {
            self.boost_enable(ext)
        } else {
            self.boost_cancel(ext)
        }
    }

    fn boost_enable(&mut self, ext: Option<&mut ChangeSet>) -> Vec<EngineAction> {
        if !self.state.initialized {
            warn!("state is not initialized");
            return Vec::new();
        }
        if self.state.is_boosting() {
            warn!(
                "boost is already in progress, time left {} s",
                self.state.boost_time_left
            );
            return Vec::new();
        }
        if self.state.fan_speed == self.max_fan_speed() {
            warn!("fan is already running at maximum speed");
            return Vec::new();
        }
        let boost_time = self.traits.boost_time;
        if boost_time == 0 {
            warn!("boost time is not configured");
            return Vec::new();
        }

        self.boost_save = BoostSaveState::capture(&self.state, &self.boost_save, true);
        info!("schedule boost for {boost_time} s");
        self.state.boost_time_left = boost_time;

        if self.traits.supports_boost {
            return vec![EngineAction::NativeBoost(true)];
        }

        let change = ChangeSet {
            fan_speed: Some(self.max_fan_speed()),
            power: Some(true),
            gate_position: Some(GatePosition::Outdoor),
            heater: self.traits.boost_heater_state,
            target_temperature: self.traits.boost_target_temperature,
            ..ChangeSet::default()
        };
        self.compose(change, ext)
    }

    fn boost_cancel(&mut self, ext: Option<&mut ChangeSet>) -> Vec<EngineAction> {
        if !self.state.is_boosting() {
            return Vec::new();
        }
        info!("boost finished");
        self.state.boost_time_left = 0;

        if self.traits.supports_boost {
            return vec![EngineAction::NativeBoost(false)];
        }

        let change = self.boost_save.to_change_set();
        self.compose(change, ext)
    }

    pub fn add_preset(&mut self, name: &str, data: PresetData) -> bool {
        if name.is_empty() {
            warn!("empty preset name");
            return false;
        }
        if name.eq_ignore_ascii_case(PRESET_NONE) {
            warn!("skip reserved preset '{PRESET_NONE}'");
            return false;
        }
        if data.is_empty() {
            warn!("preset '{name}' has no data to change");
            return false;
        }
        if let Some(temp) = data.target_temperature {
            if !self.traits.target_temperature_in_range(temp) {
                warn!("preset '{name}' has invalid target temperature {temp}");
                return false;
            }
        }
        if let Some(fan_speed) = data.fan_speed {
            if fan_speed == 0 || fan_speed > self.max_fan_speed() {
                warn!("preset '{name}' has invalid fan speed {fan_speed}");
                return false;
            }
        }

        debug!("setup preset '{name}': {data:?}");
        self.presets.insert(name.to_string(), data);
        true
    }

    pub fn enable_preset(&mut self, name: &str, ext: Option<&mut ChangeSet>) -> Vec<EngineAction> {
        debug!("activate preset '{name}'");
        if is_preset_none(name) {
            self.active_preset = None;
            return Vec::new();
        }
        let Some(preset) = self.presets.get(name) else {
            warn!("preset '{name}' not found");
            return Vec::new();
        };

        let change = preset.to_change_set();
        self.active_preset = Some(name.to_string());
        self.compose(change, ext)
    }

    pub fn reset_filter(&mut self, days: u16) -> Vec<EngineAction> {
        self.maintenance("reset filter", |set| {
            set.filter_reset = true;
            set.filter_time_days = days;
        })
    }

    pub fn factory_reset(&mut self) -> Vec<EngineAction> {
        self.maintenance("factory reset", |set| set.factory_reset = true)
    }

    pub fn reset_errors(&mut self) -> Vec<EngineAction> {
        self.maintenance("error reset", |set| set.error_reset = true)
    }

    fn maintenance(
        &mut self,
        what: &str,
        configure: impl FnOnce(&mut StateSetRequest),
    ) -> Vec<EngineAction> {
        if !self.state.initialized {
            warn!("state is not initialized, {what} rejected");
            return Vec::new();
        }
        let request_id = self.next_request_id();
        info!("request[{request_id}] {what}");
        let mut set = StateSetRequest::from_state(&self.state, request_id);
        configure(&mut set);
        vec![EngineAction::WriteState(set)]
    }

    fn next_request_id(&mut self) -> u32 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}
