use thiserror::Error;

use crate::frame::FrameKind;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("failed to read from byte source")]
    ReadFailed,

    #[error("byte sink is not available")]
    SinkUnavailable,

    #[error("unsupported frame kind {0:?} (0x{code:04X})", code = .0.code())]
    UnsupportedFrame(FrameKind),

    #[error("error reset is not supported")]
    ErrorResetUnsupported,
}
