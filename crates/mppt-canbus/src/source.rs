use crate::config::{MpptConfig, TelemetryMode};
use crate::error::RegistryError;
use crate::protocol::{MPPT_ADDR_MIN, MPPT_ADDR_SPAN};
use crate::registry::DeviceRegistry;
use crate::types::Telemetry;
use parking_lot::Mutex;

/// Where the registry's telemetry comes from.
pub enum TelemetrySource {
    /// Frames handed in by the bus driver; discovery and timeouts run on each tick.
    LiveBus,
    /// Bench mode: the registry is filled with simulated chargers.
    Synthetic(SyntheticGenerator),
}

impl TelemetrySource {
    pub fn from_config(cfg: &MpptConfig) -> Self {
        match cfg.telemetry.mode {
            TelemetryMode::Live => Self::LiveBus,
            TelemetryMode::Synthetic => {
                Self::Synthetic(SyntheticGenerator::new(cfg.telemetry.device_count))
            }
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::LiveBus)
    }
}

/// Deterministic, slowly varying telemetry for a fixed set of fake chargers.
pub struct SyntheticGenerator {
    device_count: usize,
    last_refresh_us: Mutex<Option<i64>>,
}

impl SyntheticGenerator {
    /// Minimum time between refreshes.
    pub const PERIOD_US: i64 = 1_000_000;

    pub fn new(device_count: usize) -> Self {
        Self {
            device_count: device_count.min(MPPT_ADDR_SPAN),
            last_refresh_us: Mutex::new(None),
        }
    }

    /// Values for the `index`-th simulated charger at `now_us`.
    pub fn sample(index: usize, now_us: i64) -> Telemetry {
        let i = index as f32;
        let secs = now_us / 1_000_000;
        let solar_voltage = 35.0 + 2.0 * i + (secs % 3) as f32;
        let solar_current = 8.0 + 0.5 * i + ((secs / 2) % 2) as f32;
        Telemetry {
            solar_voltage,
            solar_current,
            solar_power: solar_voltage * solar_current,
            battery_voltage: 52.0 + 0.1 * i,
            battery_current: 5.0 + i,
            temperature: 25 + 2 * i16::try_from(index).unwrap_or(0),
            // bulk charging
            charge_state: 3,
            daily_energy_wh: 1000.0 * (i + 1.0),
        }
    }

    /// Refresh every simulated charger, at most once per [`Self::PERIOD_US`]. Returns the
    /// number of records written; zero when throttled.
    pub fn refresh(&self, registry: &DeviceRegistry, now_us: i64) -> Result<usize, RegistryError> {
        let mut last = self.last_refresh_us.lock();
        if last.is_some_and(|t| now_us - t < Self::PERIOD_US) {
            return Ok(0);
        }
        let count = self.device_count.min(registry.capacity());
        let mut written = 0;
        for (index, address) in (MPPT_ADDR_MIN..).take(count).enumerate() {
            registry.find_or_register(address, now_us)?;
            let telemetry = Self::sample(index, now_us);
            if registry.update(address, |rec| {
                rec.touch(now_us);
                rec.telemetry = telemetry;
            })? {
                written += 1;
            }
        }
        *last = Some(now_us);
        Ok(written)
    }
}
