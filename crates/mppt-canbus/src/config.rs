use crate::protocol::MPPT_ADDR_SPAN;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Read-only settings for the MPPT integration, normally persisted by the BMS and handed
/// over at start-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MpptConfig {
    pub enabled: bool,
    pub timeout_secs: u32,
    pub discovery_interval_secs: u64,
    pub max_devices: usize,
    pub lock_timeout_ms: u64,
    pub target_voltage: f32,
    pub max_charge_current: f32,
    pub absorption_voltage: f32,
    pub float_voltage: f32,
    pub telemetry: TelemetryConfig,
}

impl Default for MpptConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 60,
            discovery_interval_secs: 30,
            max_devices: 4,
            lock_timeout_ms: 50,
            target_voltage: 56.0,
            max_charge_current: 20.0,
            absorption_voltage: 57.6,
            float_voltage: 54.0,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl MpptConfig {
    pub fn timeout_us(&self) -> i64 {
        i64::from(self.timeout_secs) * 1_000_000
    }

    pub fn discovery_interval_us(&self) -> i64 {
        i64::try_from(self.discovery_interval_secs)
            .unwrap_or(i64::MAX / 1_000_000)
            .saturating_mul(1_000_000)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_devices == 0 || self.max_devices > MPPT_ADDR_SPAN {
            anyhow::bail!(
                "max_devices must be between 1 and {MPPT_ADDR_SPAN}, got {}",
                self.max_devices
            );
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be positive");
        }
        if self.discovery_interval_secs == 0 {
            anyhow::bail!("discovery_interval_secs must be positive");
        }
        for (name, v) in [
            ("target_voltage", self.target_voltage),
            ("max_charge_current", self.max_charge_current),
            ("absorption_voltage", self.absorption_voltage),
            ("float_voltage", self.float_voltage),
        ] {
            if !v.is_finite() || v < 0.0 {
                anyhow::bail!("{name} must be a non-negative number, got {v}");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryMode {
    #[default]
    Live,
    Synthetic,
}

/// Where device telemetry comes from: the bus, or a generator for bench testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub mode: TelemetryMode,
    /// Number of simulated chargers in synthetic mode.
    pub device_count: usize,
}

/// Load and validate a config file. `.json` is parsed as JSON, anything else as YAML.
pub fn load_config_file(path: impl AsRef<Path>) -> anyhow::Result<MpptConfig> {
    let path = path.as_ref();
    let raw =
        fs::read_to_string(path).with_context(|| format!("reading config: {}", path.display()))?;
    let is_json = path.extension().is_some_and(|ext| ext == "json");
    let cfg: MpptConfig = if is_json {
        serde_json::from_str(&raw).with_context(|| format!("parsing json: {}", path.display()))?
    } else {
        serde_yaml::from_str(&raw).with_context(|| format!("parsing yaml: {}", path.display()))?
    };
    cfg.validate()
        .with_context(|| format!("validating config: {}", path.display()))?;
    Ok(cfg)
}
