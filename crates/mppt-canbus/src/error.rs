use can_transport::TransportError;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    #[error("registry full ({capacity} devices)")]
    CapacityExceeded { capacity: usize },
    #[error("registry lock not acquired in time")]
    LockTimeout,
}

/// Why a telemetry payload could not be decoded.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload of {len} bytes is shorter than a map entry")]
    TooShort { len: usize },
    #[error("expected map(1) with uint16 key, got {got:02X?}")]
    BadHeader { got: [u8; 2] },
    #[error("value tag 0x{tag:02X} needs more than {len} bytes")]
    Truncated { tag: u8, len: usize },
    #[error("unsupported value tag 0x{0:02X}")]
    UnsupportedTag(u8),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    #[error("small uint {0} does not fit in the tag byte")]
    SmallUintOutOfRange(u8),
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("MPPT CAN integration is disabled")]
    Disabled,
    #[error("encode failed: {0}")]
    Encode(#[from] EncodeError),
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
}
