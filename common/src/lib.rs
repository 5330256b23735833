pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod presets;
pub mod protocol;
pub mod types;

pub use config::{RuntimeConfig, SerialConfig, Traits};
pub use engine::{BreezerEngine, EngineAction, StateSubscriber, FILTER_RESET_DAYS};
pub use error::ProtocolError;
pub use frame::{ChangeSet, Frame, FrameKind, StateResponse, StateSetRequest};
pub use presets::{PresetData, PRESET_NONE};
pub use protocol::{ByteSink, ByteSource, LtUartProtocol, Scheduler};
pub use types::{DeviceInfo, DeviceState, GatePosition};
