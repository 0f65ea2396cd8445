use crate::cbor::{self, Entry};
use crate::error::{DecodeError, RegistryError};
use crate::protocol::{self, ChannelClass};
use crate::registry::DeviceRegistry;
use can_transport::MAX_DATA_LEN;
use thiserror::Error;

/// A telemetry entry published by one charger.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    pub source: u16,
    pub entry: Entry,
}

/// Why an inbound frame was dropped without touching the registry.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    #[error("integration disabled")]
    Disabled,
    #[error("synthetic telemetry active, bus frames ignored")]
    SyntheticMode,
    #[error("payload of {len} bytes exceeds a CAN frame")]
    Oversized { len: usize },
    #[error("identifier 0x{0:08X} is not a publication")]
    WrongChannel(u32),
    #[error("source 0x{0:04X} outside the MPPT address range")]
    AddressOutOfRange(u16),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// What happened to one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    /// The frame refreshed `address`; `applied` says whether a telemetry field changed.
    Accepted {
        address: u16,
        object_id: u16,
        applied: bool,
    },
    Dropped(DropReason),
}

/// Validate a raw frame and pull out its telemetry entry. Checks run in wire order and
/// stop at the first failure.
pub fn classify(identifier: u32, payload: &[u8]) -> Result<TelemetrySample, DropReason> {
    if payload.len() > MAX_DATA_LEN {
        return Err(DropReason::Oversized { len: payload.len() });
    }
    if ChannelClass::of(identifier) != Some(ChannelClass::PublishSubscribe) {
        return Err(DropReason::WrongChannel(identifier));
    }
    let source = protocol::address_of(identifier);
    if !protocol::is_mppt_address(source) {
        return Err(DropReason::AddressOutOfRange(source));
    }
    let entry = cbor::decode_entry(payload)?;
    Ok(TelemetrySample { source, entry })
}

/// Register the sender if needed, then mark it Online at `now_us` and store the value.
/// A device in Timeout comes back Online here with no further checks.
pub fn apply_sample(
    registry: &DeviceRegistry,
    sample: &TelemetrySample,
    now_us: i64,
) -> Result<bool, RegistryError> {
    registry.find_or_register(sample.source, now_us)?;
    let mut applied = false;
    registry.update(sample.source, |rec| {
        rec.touch(now_us);
        applied = rec.telemetry.apply(&sample.entry);
    })?;
    Ok(applied)
}

/// Full inbound path: classify, then apply to the registry.
pub fn ingest(
    registry: &DeviceRegistry,
    identifier: u32,
    payload: &[u8],
    now_us: i64,
) -> FrameDisposition {
    let sample = match classify(identifier, payload) {
        Ok(sample) => sample,
        Err(reason) => return FrameDisposition::Dropped(reason),
    };
    match apply_sample(registry, &sample, now_us) {
        Ok(applied) => FrameDisposition::Accepted {
            address: sample.source,
            object_id: sample.entry.key,
            applied,
        },
        Err(e) => FrameDisposition::Dropped(e.into()),
    }
}
