//! Line protocol spoken by the breezer over its UART console.
//!
//! The device answers `getstate` with a burst of labelled status lines ending
//! in `Error register:`. Commands are plain text, one per line, and are never
//! acknowledged; the next poll shows whether they took effect.

mod commands;
mod parser;
mod reader;

use std::collections::VecDeque;

use bytes::{Buf, BufMut, BytesMut};
use tracing::{debug, warn};

use crate::{
    error::ProtocolError,
    frame::{Frame, StateSetRequest},
};

pub use commands::Command;
pub use parser::{MirrorState, FILTER_WARNING_DAYS, MAX_FAN_SPEED};
pub use reader::{LineReader, ReadStatus, LINE_CAPACITY};

pub trait ByteSource {
    fn available(&self) -> usize;
    fn read_byte(&mut self) -> Result<u8, ProtocolError>;
}

pub trait ByteSink {
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), ProtocolError>;
}

/// Re-entry point invoked after each bounded unit of read work.
pub trait Scheduler {
    fn yield_now(&mut self);
}

impl Scheduler for () {
    fn yield_now(&mut self) {}
}

impl ByteSource for BytesMut {
    fn available(&self) -> usize {
        self.len()
    }

    fn read_byte(&mut self) -> Result<u8, ProtocolError> {
        if self.has_remaining() {
            Ok(self.get_u8())
        } else {
            Err(ProtocolError::ReadFailed)
        }
    }
}

impl ByteSource for VecDeque<u8> {
    fn available(&self) -> usize {
        self.len()
    }

    fn read_byte(&mut self) -> Result<u8, ProtocolError> {
        self.pop_front().ok_or(ProtocolError::ReadFailed)
    }
}

impl ByteSink for BytesMut {
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        self.put_slice(data);
        Ok(())
    }
}

impl ByteSink for Vec<u8> {
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        self.extend_from_slice(data);
        Ok(())
    }
}

/// Protocol state for one serial link: line assembly, the mirror of
/// device-reported fields and the write guard.
#[derive(Debug, Clone, Default)]
pub struct LtUartProtocol {
    reader: LineReader,
    mirror: MirrorState,
    busy: u32,
}

impl LtUartProtocol {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mirror(&self) -> &MirrorState {
        &self.mirror
    }

    pub fn is_busy(&self) -> bool {
        self.busy > 0
    }

    /// Consumes the available bytes of `io`, returning any frames completed
    /// on the way. `sched` is invoked after every line.
    pub fn read_uart_data<S, Y>(&mut self, io: &mut S, sched: &mut Y) -> Vec<Frame>
    where
        S: ByteSource + ?Sized,
        Y: Scheduler + ?Sized,
    {
        let mut frames = Vec::new();

        while io.available() > 0 {
            match self.reader.read_line(io) {
                ReadStatus::Line(line) => {
                    if let Some(frame) = self.dispatch_line(&line) {
                        frames.push(frame);
                    }
                }
                ReadStatus::Dropped => {}
                ReadStatus::Pending => break,
            }
            sched.yield_now();
        }

        frames
    }

    fn dispatch_line(&mut self, line: &str) -> Option<Frame> {
        debug!("RX: {line}");
        if self.busy > 0 {
            debug!("write command in progress: {}", self.busy);
            return None;
        }
        self.mirror.apply_line(line)
    }

    /// Commands needed to carry out `frame` against the current mirror.
    pub fn commands_for(&self, frame: &Frame) -> Result<Vec<Command>, ProtocolError> {
        match frame {
            // Sent once before the first state poll; enables the status console.
            Frame::DeviceInfoRequest => Ok(vec![Command::LogEnable]),
            Frame::StateGetRequest => Ok(vec![Command::GetState]),
            Frame::StateSetRequest(set) => self.state_set_commands(set),
            other => Err(ProtocolError::UnsupportedFrame(other.kind())),
        }
    }

    fn state_set_commands(&self, set: &StateSetRequest) -> Result<Vec<Command>, ProtocolError> {
        if set.filter_reset {
            if set.filter_time_days > 0 {
                return Ok(vec![Command::filter_time_days(set.filter_time_days)]);
            }
            return Ok(vec![Command::FilterReset]);
        }

        if set.factory_reset {
            return Ok(vec![Command::FactoryReset]);
        }

        if set.error_reset {
            return Err(ProtocolError::ErrorResetUnsupported);
        }

        let mirror = &self.mirror;
        let mut commands = Vec::new();
        if mirror.fan_speed != set.fan_speed {
            commands.push(Command::FanSpeed(set.fan_speed));
        }
        if mirror.target_temperature != set.target_temperature {
            commands.push(Command::TargetTemperature(set.target_temperature));
        }
        if mirror.heater != set.heater {
            commands.push(Command::Heater(set.heater));
        }
        // sound and led are write-only, the mirror never learns them
        if mirror.sound != set.sound {
            commands.push(Command::Sound(set.sound));
        }
        if mirror.led != set.led {
            commands.push(Command::Led(set.led));
        }
        if mirror.power != set.power {
            commands.push(Command::Power(set.power));
        }
        commands.push(Command::GetState);

        Ok(commands)
    }

    /// Writes the commands for `frame` to `sink`.
    pub fn write_frame<W>(&mut self, frame: &Frame, sink: &mut W) -> Result<(), ProtocolError>
    where
        W: ByteSink + ?Sized,
    {
        let mut commands = self.commands_for(frame).inspect_err(|err| {
            warn!("frame not written: {err}");
        })?;

        let Frame::StateSetRequest(set) = frame else {
            return commands.iter().try_for_each(|cmd| write_cmd(sink, *cmd));
        };
        if set.filter_reset || set.factory_reset {
            return commands.iter().try_for_each(|cmd| write_cmd(sink, *cmd));
        }

        debug!("request[{}] write state", set.request_id);
        let refresh = commands.pop();

        self.busy += 1;
        for cmd in commands {
            if let Err(err) = write_cmd(sink, cmd) {
                warn!("command {cmd} not written: {err}");
            }
        }
        self.busy -= 1;

        match refresh {
            Some(cmd) => write_cmd(sink, cmd),
            None => Ok(()),
        }
    }
}

fn write_cmd<W: ByteSink + ?Sized>(sink: &mut W, cmd: Command) -> Result<(), ProtocolError> {
    debug!("TX: {cmd}");
    sink.write_bytes(cmd.to_wire().as_bytes())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::frame::{FrameKind, StateResponse};

    const POLL_CYCLE: &[u8] = b"\r\n\
Current Mode: Work   \r\n\
Speed: 3\r\n\
Sensors T_set: 18, T_In: -2, T_out: 17 \r\n\
PID_Value: 40 1\r\n\
Filter Time: 2592000\r\n\
Working Time: 3600\r\n\
Power On Time: 7200\r\n\
Error register: 0\r\n";

    fn feed(protocol: &mut LtUartProtocol, bytes: &[u8]) -> Vec<Frame> {
        let mut io: VecDeque<u8> = bytes.iter().copied().collect();
        protocol.read_uart_data(&mut io, &mut ())
    }

    fn polled_protocol() -> LtUartProtocol {
        let mut protocol = LtUartProtocol::new();
        let frames = feed(&mut protocol, POLL_CYCLE);
        assert_eq!(frames.len(), 1);
        protocol
    }

    fn set_request_like_mirror(protocol: &LtUartProtocol) -> StateSetRequest {
        let mirror = protocol.mirror();
        StateSetRequest {
            power: mirror.power,
            heater: mirror.heater,
            sound: mirror.sound,
            led: mirror.led,
            fan_speed: mirror.fan_speed,
            target_temperature: mirror.target_temperature,
            ..StateSetRequest::default()
        }
    }

    fn written(protocol: &mut LtUartProtocol, frame: &Frame) -> String {
        let mut sink = Vec::new();
        protocol.write_frame(frame, &mut sink).expect("write frame");
        String::from_utf8(sink).expect("ascii commands")
    }

    #[test]
    fn full_poll_cycle_yields_one_state_response() {
        let mut protocol = LtUartProtocol::new();
        let frames = feed(&mut protocol, POLL_CYCLE);

        let expected = StateResponse {
            request_id: 0,
            power: true,
            heater: true,
            sound: false,
            led: false,
            fan_speed: 3,
            target_temperature: 18,
            outdoor_temperature: -2,
            current_temperature: 17,
            heater_var: 40,
            work_time: 7200,
            fan_time: 3600,
            filter_time: 2_592_000,
            airflow_counter: 0,
            errors: 0,
            filter_warning: true,
            heater_present: true,
            gate_open: true,
            max_fan_speed: MAX_FAN_SPEED,
        };
        assert_eq!(frames, vec![Frame::StateResponse(expected)]);
    }

    #[test]
    fn missing_error_line_yields_no_frame() {
        let mut protocol = LtUartProtocol::new();
        let cut = POLL_CYCLE.len() - "Error register: 0\r\n".len();
        assert!(feed(&mut protocol, &POLL_CYCLE[..cut]).is_empty());
        assert_eq!(protocol.mirror().fan_speed, 3);
    }

    #[test]
    fn split_delivery_resumes_partial_line() {
        let mut protocol = LtUartProtocol::new();
        let (head, tail) = POLL_CYCLE.split_at(50);
        assert!(feed(&mut protocol, head).is_empty());
        assert_eq!(feed(&mut protocol, tail).len(), 1);
    }

    #[test]
    fn counters_persist_across_cycles() {
        let mut protocol = polled_protocol();
        feed(&mut protocol, b"Speed: 3\nWorking Time: 3660\nError register: 0\n");
        // 60 s at 45 m3/h
        assert_eq!(protocol.mirror().airflow_counter, 60 * 45 / 6);
    }

    #[test]
    fn firmware_line_yields_device_info() {
        let mut protocol = LtUartProtocol::new();
        let frames = feed(&mut protocol, b"Firmware Version 0x0123\r\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].kind(), FrameKind::DeviceInfoResponse);
    }

    #[test]
    fn lines_are_ignored_while_busy() {
        let mut protocol = polled_protocol();
        protocol.busy = 1;
        assert!(feed(&mut protocol, b"Speed: 1\nError register: 0\n").is_empty());
        assert_eq!(protocol.mirror().fan_speed, 3);
    }

    #[test]
    fn scheduler_runs_after_every_line() {
        struct Counter(usize);
        impl Scheduler for Counter {
            fn yield_now(&mut self) {
                self.0 += 1;
            }
        }

        let mut protocol = LtUartProtocol::new();
        let mut io: VecDeque<u8> = b"Speed: 1\nSpeed: 2\nSpe".iter().copied().collect();
        let mut counter = Counter(0);
        protocol.read_uart_data(&mut io, &mut counter);
        assert_eq!(counter.0, 2);
    }

    #[test]
    fn request_frames_map_to_fixed_commands() {
        let mut protocol = LtUartProtocol::new();
        assert_eq!(written(&mut protocol, &Frame::DeviceInfoRequest), "logenable noit\r\n");
        assert_eq!(written(&mut protocol, &Frame::StateGetRequest), "getstate\r\n");
    }

    #[test]
    fn unchanged_request_only_refreshes_state() {
        let mut protocol = polled_protocol();
        let set = set_request_like_mirror(&protocol);
        assert_eq!(
            protocol.commands_for(&Frame::StateSetRequest(set)),
            Ok(vec![Command::GetState])
        );
    }

    #[test]
    fn changed_fields_are_written_in_fixed_order() {
        let mut protocol = polled_protocol();
        let set = StateSetRequest {
            power: false,
            heater: false,
            sound: true,
            led: true,
            fan_speed: 5,
            target_temperature: 21,
            ..set_request_like_mirror(&protocol)
        };

        assert_eq!(
            written(&mut protocol, &Frame::StateSetRequest(set)),
            "set_speed 5\r\n\
set_temp 21\r\n\
set_heater_state 0\r\n\
set_sound_state 1\r\n\
set_led_state 1\r\n\
stby\r\n\
getstate\r\n"
        );
        assert!(!protocol.is_busy());
    }

    #[test]
    fn filter_reset_variants() {
        let mut protocol = polled_protocol();
        let mut set = StateSetRequest {
            filter_reset: true,
            filter_time_days: 10,
            fan_speed: 1,
            ..StateSetRequest::default()
        };
        assert_eq!(
            written(&mut protocol, &Frame::StateSetRequest(set.clone())),
            "set_filtertime 864000\r\n"
        );

        set.filter_time_days = 0;
        assert_eq!(
            written(&mut protocol, &Frame::StateSetRequest(set)),
            "ftreset\r\n"
        );
    }

    #[test]
    fn factory_reset_is_a_single_command() {
        let mut protocol = polled_protocol();
        let set = StateSetRequest {
            factory_reset: true,
            ..StateSetRequest::default()
        };
        assert_eq!(
            written(&mut protocol, &Frame::StateSetRequest(set)),
            "factoryreset\r\n"
        );
    }

    #[test]
    fn error_reset_and_responses_are_rejected_without_output() {
        let mut protocol = polled_protocol();
        let mut sink = Vec::new();

        let set = StateSetRequest {
            error_reset: true,
            ..StateSetRequest::default()
        };
        assert_eq!(
            protocol.write_frame(&Frame::StateSetRequest(set), &mut sink),
            Err(ProtocolError::ErrorResetUnsupported)
        );

        let response = Frame::StateResponse(StateResponse::default());
        assert_eq!(
            protocol.write_frame(&response, &mut sink),
            Err(ProtocolError::UnsupportedFrame(FrameKind::StateResponse))
        );
        assert!(sink.is_empty());
    }

    struct ClosedSink;

    impl ByteSink for ClosedSink {
        fn write_bytes(&mut self, _data: &[u8]) -> Result<(), ProtocolError> {
            Err(ProtocolError::SinkUnavailable)
        }
    }

    #[test]
    fn unavailable_sink_fails_and_releases_busy() {
        let mut protocol = polled_protocol();
        assert_eq!(
            protocol.write_frame(&Frame::StateGetRequest, &mut ClosedSink),
            Err(ProtocolError::SinkUnavailable)
        );

        let set = StateSetRequest {
            fan_speed: 6,
            ..set_request_like_mirror(&protocol)
        };
        assert_eq!(
            protocol.write_frame(&Frame::StateSetRequest(set), &mut ClosedSink),
            Err(ProtocolError::SinkUnavailable)
        );
        assert!(!protocol.is_busy());
    }
}
