use crate::cbor::{self, Payload};
use crate::protocol::{self, ObjectId, BROADCAST_ADDR};

/// A request ready for the bus: identifier on the request/response channel plus payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Command {
    pub identifier: u32,
    pub payload: Payload,
}

impl Command {
    pub fn to(destination: u16, payload: Payload) -> Self {
        Self {
            identifier: protocol::request_identifier(destination),
            payload,
        }
    }

    /// Target address carried in the identifier.
    pub fn destination(&self) -> u16 {
        protocol::address_of(self.identifier)
    }
}

/// Charge enable control point; true/false encoded in the tag byte.
pub fn encode_enable(enable: bool) -> Payload {
    cbor::encode_bool(ObjectId::Enable.raw(), enable)
}

pub fn encode_target_voltage(volts: f32) -> Payload {
    cbor::encode_f32(ObjectId::TargetVoltage.raw(), volts)
}

pub fn encode_max_current(amps: f32) -> Payload {
    cbor::encode_f32(ObjectId::MaxCurrent.raw(), amps)
}

pub fn encode_absorption_voltage(volts: f32) -> Payload {
    cbor::encode_f32(ObjectId::AbsorptionVoltage.raw(), volts)
}

pub fn encode_float_voltage(volts: f32) -> Payload {
    cbor::encode_f32(ObjectId::FloatVoltage.raw(), volts)
}

/// Broadcast node-id query; chargers answer with ordinary telemetry.
pub fn discovery_command() -> Command {
    Command::to(BROADCAST_ADDR, cbor::encode_key(ObjectId::NodeId.raw()))
}
