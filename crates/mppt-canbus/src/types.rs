use crate::cbor::{Entry, Value};
use crate::protocol::ObjectId;
use serde::Serialize;

/// Liveness of a registered charger. A record only exists once the device has been
/// heard from, so there is no offline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Online,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Telemetry {
    pub solar_voltage: f32,
    pub solar_current: f32,
    pub solar_power: f32,
    pub battery_voltage: f32,
    pub battery_current: f32,
    pub temperature: i16,
    pub charge_state: u8,
    pub daily_energy_wh: f32,
}

impl Telemetry {
    /// Store `entry` in the field its object id names. Returns false when the id is not
    /// a telemetry field or the value kind does not match the field.
    pub fn apply(&mut self, entry: &Entry) -> bool {
        let Some(id) = ObjectId::from_raw(entry.key) else {
            return false;
        };
        match (id, entry.value) {
            (ObjectId::SolarVoltage, Value::Float(v)) => self.solar_voltage = v,
            (ObjectId::SolarCurrent, Value::Float(v)) => self.solar_current = v,
            (ObjectId::SolarPower, Value::Float(v)) => self.solar_power = v,
            (ObjectId::BatteryVoltage, Value::Float(v)) => self.battery_voltage = v,
            (ObjectId::BatteryCurrent, Value::Float(v)) => self.battery_current = v,
            (ObjectId::DailyEnergy, Value::Float(v)) => self.daily_energy_wh = v,
            (ObjectId::Temperature, Value::Int16(v)) => self.temperature = v,
            (ObjectId::ChargeState, Value::SmallUint(v)) => self.charge_state = v,
            _ => return false,
        }
        true
    }
}

/// One discovered charger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeviceRecord {
    pub address: u16,
    pub status: DeviceStatus,
    /// Monotonic microseconds of the last accepted frame.
    pub last_seen_us: i64,
    pub telemetry: Telemetry,
    /// Last enable state we commanded; not confirmed by the device.
    pub charging_enabled: bool,
}

impl DeviceRecord {
    pub fn new(address: u16, now_us: i64) -> Self {
        Self {
            address,
            status: DeviceStatus::Online,
            last_seen_us: now_us,
            telemetry: Telemetry::default(),
            charging_enabled: true,
        }
    }

    /// Mark the device as heard from at `now_us`.
    pub fn touch(&mut self, now_us: i64) {
        self.status = DeviceStatus::Online;
        self.last_seen_us = self.last_seen_us.max(now_us);
    }

    pub fn is_online(&self) -> bool {
        self.status == DeviceStatus::Online
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_updates_only_the_named_field() {
        let mut t = Telemetry {
            charge_state: 3,
            ..Telemetry::default()
        };
        assert!(t.apply(&Entry {
            key: ObjectId::Temperature.raw(),
            value: Value::Int16(25),
        }));
        assert_eq!(t.temperature, 25);
        assert_eq!(t.charge_state, 3);
    }

    #[test]
    fn apply_ignores_unknown_ids_and_mismatched_kinds() {
        let mut t = Telemetry::default();
        assert!(!t.apply(&Entry {
            key: 0x7777,
            value: Value::Float(1.0),
        }));
        assert!(!t.apply(&Entry {
            key: ObjectId::ChargeState.raw(),
            value: Value::Float(3.0),
        }));
        assert!(!t.apply(&Entry {
            key: ObjectId::Enable.raw(),
            value: Value::SmallUint(1),
        }));
        assert_eq!(t, Telemetry::default());
    }

    #[test]
    fn record_serializes_with_snake_case_status() -> serde_json::Result<()> {
        let mut rec = DeviceRecord::new(0x0012, 5);
        rec.status = DeviceStatus::Timeout;
        let v = serde_json::to_value(rec)?;
        assert_eq!(v["address"], 18);
        assert_eq!(v["status"], "timeout");
        assert_eq!(v["telemetry"]["charge_state"], 0);
        assert_eq!(v["charging_enabled"], true);
        Ok(())
    }

    #[test]
    fn touch_recovers_from_timeout_without_going_back_in_time() {
        let mut rec = DeviceRecord::new(0x0010, 1_000);
        rec.status = DeviceStatus::Timeout;
        rec.touch(500);
        assert!(rec.is_online());
        assert_eq!(rec.last_seen_us, 1_000);
        rec.touch(2_000);
        assert_eq!(rec.last_seen_us, 2_000);
    }
}
