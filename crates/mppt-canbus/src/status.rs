use crate::config::TelemetryMode;
use crate::error::CommandError;
use crate::manager::MpptManager;
use crate::types::{DeviceRecord, DeviceStatus};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::debug;

/// One charger as the presentation layer renders it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceView {
    pub id: u16,
    pub status: DeviceStatus,
    pub solar_v: f32,
    pub solar_i: f32,
    pub solar_p: f32,
    pub bat_v: f32,
    pub bat_i: f32,
    pub temp: i16,
    pub state: u8,
    pub e_day: f32,
    pub charge_en: bool,
}

impl From<&DeviceRecord> for DeviceView {
    fn from(rec: &DeviceRecord) -> Self {
        let t = &rec.telemetry;
        Self {
            id: rec.address,
            status: rec.status,
            solar_v: t.solar_voltage,
            solar_i: t.solar_current,
            solar_p: t.solar_power,
            bat_v: t.battery_voltage,
            bat_i: t.battery_current,
            temp: t.temperature,
            state: t.charge_state,
            e_day: t.daily_energy_wh,
            charge_en: rec.charging_enabled,
        }
    }
}

/// Config summary plus a copy of the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    pub enabled: bool,
    pub mode: TelemetryMode,
    pub target_voltage: f32,
    pub max_current: f32,
    pub abs_voltage: f32,
    pub float_voltage: f32,
    pub timeout: u32,
    pub count: usize,
    pub devices: Vec<DeviceView>,
}

impl StatusReport {
    /// Build the view. If the registry lock cannot be taken in time the device list is
    /// left empty; `count` is still reported.
    pub fn collect(mgr: &MpptManager) -> Self {
        let cfg = mgr.config();
        let devices = match mgr.snapshot_all() {
            Ok(records) => records.iter().map(DeviceView::from).collect(),
            Err(e) => {
                debug!(error = %e, "status rendered without devices");
                Vec::new()
            }
        };
        Self {
            generated_at: OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .ok(),
            enabled: cfg.enabled,
            mode: cfg.telemetry.mode,
            target_voltage: cfg.target_voltage,
            max_current: cfg.max_charge_current,
            abs_voltage: cfg.absorption_voltage,
            float_voltage: cfg.float_voltage,
            timeout: cfg.timeout_secs,
            count: mgr.get_device_count(),
            devices,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A control post for one charger. Present fields are applied as enable, voltage,
/// then current.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ControlRequest {
    pub id: u16,
    #[serde(default)]
    pub enable: Option<bool>,
    #[serde(default)]
    pub voltage: Option<f32>,
    #[serde(default)]
    pub current: Option<f32>,
}

impl ControlRequest {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Send the requested commands, stopping at the first failure. Returns how many
    /// were sent.
    pub fn apply(&self, mgr: &MpptManager) -> Result<usize, CommandError> {
        let mut sent = 0;
        if let Some(enable) = self.enable {
            mgr.send_enable(self.id, enable)?;
            sent += 1;
        }
        if let Some(volts) = self.voltage {
            mgr.send_voltage_limit(self.id, volts)?;
            sent += 1;
        }
        if let Some(amps) = self.current {
            mgr.send_current_limit(self.id, amps)?;
            sent += 1;
        }
        Ok(sent)
    }
}
