//! KiNET protocol and device-string errors

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KinetError {
    #[error("Packet too short: expected {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("Bad magic: {0:#010x}")]
    BadMagic(u32),
    #[error("Unknown packet type: {0:#06x}")]
    UnknownType(u16),
    #[error("Unexpected packet type: expected {expected:?}, got {actual:?}")]
    UnexpectedType {
        expected: crate::packet::PacketType,
        actual: crate::packet::PacketType,
    },
    #[error("Bad scan record kind: {0}")]
    BadRecord(u8),
    #[error("Invalid device '{input}': {reason}")]
    InvalidDevice { input: String, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl KinetError {
    pub(crate) fn invalid_device(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDevice {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, KinetError>;
