//! ThingSet-over-CAN identifier scheme and data object ids used by MPPT chargers.
//!
//! A 29-bit identifier is split into a channel class in the top byte, an originator
//! nibble at bit 20 and a 16-bit target (request/response) or source (publish/subscribe)
//! address in the low half.

/// Our own node address on the bus.
pub const BMS_NODE_ID: u16 = 0x0001;

/// Reserved address range for MPPT chargers (inclusive).
pub const MPPT_ADDR_MIN: u16 = 0x0010;
pub const MPPT_ADDR_MAX: u16 = 0x001F;

/// Destination meaning "every listener".
pub const BROADCAST_ADDR: u16 = 0xFFFF;

pub const CLASS_MASK: u32 = 0xFF00_0000;
pub const REQRESP_BASE: u32 = 0x1D00_0000;
pub const PUBSUB_BASE: u32 = 0x1E00_0000;

const ORIGINATOR: u32 = 5 << 20;
const ADDRESS_MASK: u32 = 0x0000_FFFF;

/// High-order traffic class of a bus identifier.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelClass {
    RequestResponse,
    PublishSubscribe,
}

impl ChannelClass {
    pub fn of(identifier: u32) -> Option<Self> {
        match identifier & CLASS_MASK {
            REQRESP_BASE => Some(Self::RequestResponse),
            PUBSUB_BASE => Some(Self::PublishSubscribe),
            _ => None,
        }
    }

    pub fn base(self) -> u32 {
        match self {
            Self::RequestResponse => REQRESP_BASE,
            Self::PublishSubscribe => PUBSUB_BASE,
        }
    }
}

/// Low 16 bits of an identifier: the source of a publication or target of a request.
pub fn address_of(identifier: u32) -> u16 {
    (identifier & ADDRESS_MASK) as u16
}

/// Identifier for a request/response frame addressed to `destination`.
pub fn request_identifier(destination: u16) -> u32 {
    REQRESP_BASE | ORIGINATOR | u32::from(destination)
}

/// Identifier a charger at `source` publishes telemetry on.
pub fn publication_identifier(source: u16) -> u32 {
    PUBSUB_BASE | u32::from(source)
}

pub fn is_mppt_address(address: u16) -> bool {
    (MPPT_ADDR_MIN..=MPPT_ADDR_MAX).contains(&address)
}

/// Number of addresses in the reserved MPPT range.
pub const MPPT_ADDR_SPAN: usize = (MPPT_ADDR_MAX - MPPT_ADDR_MIN + 1) as usize;

/// Data object ids of the MPPT data model.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u16)]
pub enum ObjectId {
    NodeId = 0x1D00,
    Enable = 0x4000,
    TargetVoltage = 0x4001,
    MaxCurrent = 0x4002,
    AbsorptionVoltage = 0x4003,
    FloatVoltage = 0x4004,
    SolarVoltage = 0x6001,
    SolarCurrent = 0x6002,
    SolarPower = 0x6003,
    BatteryVoltage = 0x6004,
    BatteryCurrent = 0x6005,
    Temperature = 0x6006,
    ChargeState = 0x6007,
    DailyEnergy = 0x6008,
}

impl ObjectId {
    pub fn raw(self) -> u16 {
        self as u16
    }

    pub fn from_raw(raw: u16) -> Option<Self> {
        let id = match raw {
            0x1D00 => Self::NodeId,
            0x4000 => Self::Enable,
            0x4001 => Self::TargetVoltage,
            0x4002 => Self::MaxCurrent,
            0x4003 => Self::AbsorptionVoltage,
            0x4004 => Self::FloatVoltage,
            0x6001 => Self::SolarVoltage,
            0x6002 => Self::SolarCurrent,
            0x6003 => Self::SolarPower,
            0x6004 => Self::BatteryVoltage,
            0x6005 => Self::BatteryCurrent,
            0x6006 => Self::Temperature,
            0x6007 => Self::ChargeState,
            0x6008 => Self::DailyEnergy,
            _ => return None,
        };
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_top_byte_only() {
        assert_eq!(
            ChannelClass::of(0x1E00_0010),
            Some(ChannelClass::PublishSubscribe)
        );
        assert_eq!(
            ChannelClass::of(0x1D5F_FFFF),
            Some(ChannelClass::RequestResponse)
        );
        assert_eq!(ChannelClass::of(0x1C00_0010), None);
    }

    #[test]
    fn request_identifier_carries_originator_and_target() {
        let id = request_identifier(0x0012);
        assert_eq!(id, 0x1D50_0012);
        assert_eq!(ChannelClass::of(id), Some(ChannelClass::RequestResponse));
        assert_eq!(address_of(id), 0x0012);
        assert_eq!(request_identifier(BROADCAST_ADDR), 0x1D50_FFFF);
    }

    #[test]
    fn address_range_is_inclusive() {
        assert!(!is_mppt_address(MPPT_ADDR_MIN - 1));
        assert!(is_mppt_address(MPPT_ADDR_MIN));
        assert!(is_mppt_address(MPPT_ADDR_MAX));
        assert!(!is_mppt_address(MPPT_ADDR_MAX + 1));
        assert_eq!(MPPT_ADDR_SPAN, 16);
    }

    #[test]
    fn object_ids_round_trip_through_raw() {
        for id in [ObjectId::NodeId, ObjectId::Enable, ObjectId::DailyEnergy] {
            assert_eq!(ObjectId::from_raw(id.raw()), Some(id));
        }
        assert_eq!(ObjectId::from_raw(0x6009), None);
    }
}
