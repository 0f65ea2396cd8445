//! The MPPT bridge: inbound telemetry, the periodic tick and the control surface.
//!
//! Two contexts call in: the bus driver through [`MpptManager::on_receive`] and the
//! scheduler through [`MpptManager::tick`] (plus user control commands). Neither path
//! holds the registry lock while sending on the bus.

use crate::clock::{Clock, MonotonicClock};
use crate::config::MpptConfig;
use crate::decode::{self, DropReason, FrameDisposition};
use crate::encode::{self, Command};
use crate::error::{CommandError, RegistryError};
use crate::metrics::MetricsHub;
use crate::registry::DeviceRegistry;
use crate::rules::RuleOutcome;
use crate::source::TelemetrySource;
use crate::types::{DeviceRecord, DeviceStatus};
use can_transport::{CanBus, CanFrame};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// What one call to [`MpptManager::tick`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub discovery_sent: bool,
    pub timed_out: Vec<u16>,
    pub synthetic_refreshed: usize,
    pub charge_disabled: Vec<u16>,
}

pub struct MpptManager {
    config: MpptConfig,
    registry: Arc<DeviceRegistry>,
    bus: Arc<dyn CanBus>,
    rules: Arc<dyn RuleOutcome>,
    clock: Arc<dyn Clock>,
    source: TelemetrySource,
    last_discovery_us: Mutex<Option<i64>>,
    metrics: MetricsHub,
}

impl MpptManager {
    pub fn new(
        config: MpptConfig,
        bus: Arc<dyn CanBus>,
        rules: Arc<dyn RuleOutcome>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let registry = Arc::new(DeviceRegistry::new(
            config.max_devices,
            config.lock_timeout(),
        ));
        let source = TelemetrySource::from_config(&config);
        info!(
            enabled = config.enabled,
            bus = bus.name(),
            capacity = config.max_devices,
            "MPPT manager initialized"
        );
        Ok(Self {
            config,
            registry,
            bus,
            rules,
            clock: Arc::new(MonotonicClock::new()),
            source,
            last_discovery_us: Mutex::new(None),
            metrics: MetricsHub::new()?,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &MpptConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &MetricsHub {
        &self.metrics
    }

    pub fn source(&self) -> &TelemetrySource {
        &self.source
    }

    /// Receive callback for the bus driver. Invalid frames are dropped silently apart
    /// from a debug log line. While the synthetic generator owns the registry, bus
    /// frames are dropped too.
    pub fn on_receive(&self, identifier: u32, payload: &[u8]) -> FrameDisposition {
        if !self.config.enabled {
            return FrameDisposition::Dropped(DropReason::Disabled);
        }
        let disposition = if self.source.is_live() {
            decode::ingest(&self.registry, identifier, payload, self.clock.now_us())
        } else {
            FrameDisposition::Dropped(DropReason::SyntheticMode)
        };
        match disposition {
            FrameDisposition::Accepted {
                address,
                object_id,
                applied,
            } => {
                trace!(
                    "MPPT telemetry from 0x{address:04X}: object 0x{object_id:04X}, applied={applied}"
                );
                self.metrics.mppt.rx_telemetry.inc();
                self.metrics
                    .mppt
                    .devices_registered
                    .set(self.registry.len() as i64);
            }
            FrameDisposition::Dropped(reason) => {
                debug!("dropped frame 0x{identifier:08X}: {reason}");
            }
        }
        disposition
    }

    pub fn on_frame(&self, frame: &CanFrame) -> FrameDisposition {
        self.on_receive(frame.id.raw(), frame.payload())
    }

    /// Periodic entry point, expected roughly every 100 ms. Runs discovery and the
    /// timeout sweep (or the synthetic refresh), then the over-voltage interlock.
    pub fn tick(&self) -> TickReport {
        let mut report = TickReport::default();
        if !self.config.enabled {
            return report;
        }
        let now = self.clock.now_us();
        match &self.source {
            TelemetrySource::LiveBus => {
                report.discovery_sent = self.run_discovery(now);
                report.timed_out = self.sweep_timeouts(now);
            }
            TelemetrySource::Synthetic(generator) => match generator.refresh(&self.registry, now) {
                Ok(n) => {
                    report.synthetic_refreshed = n;
                    self.metrics
                        .mppt
                        .devices_registered
                        .set(self.registry.len() as i64);
                }
                Err(e) => debug!(error = %e, "synthetic refresh skipped"),
            },
        }
        report.charge_disabled = self.enforce_interlock();
        report
    }

    fn run_discovery(&self, now: i64) -> bool {
        {
            let mut last = self.last_discovery_us.lock();
            if last.is_some_and(|t| now - t < self.config.discovery_interval_us()) {
                return false;
            }
            *last = Some(now);
        }
        match self.send_command(&encode::discovery_command()) {
            Ok(()) => {
                debug!("MPPT discovery broadcast sent");
                true
            }
            Err(e) => {
                warn!(error = %e, "MPPT discovery broadcast failed");
                false
            }
        }
    }

    /// Move every Online device not heard from within the timeout to Timeout.
    fn sweep_timeouts(&self, now: i64) -> Vec<u16> {
        let timeout = self.config.timeout_us();
        let mut expired = Vec::new();
        let mut in_timeout = 0i64;
        let swept = self.registry.update_each(|rec| {
            let expire = rec.is_online() && now - rec.last_seen_us > timeout;
            if expire {
                rec.status = DeviceStatus::Timeout;
                expired.push(rec.address);
            }
            if rec.status == DeviceStatus::Timeout {
                in_timeout += 1;
            }
            expire
        });
        if let Err(e) = swept {
            debug!(error = %e, "timeout sweep skipped");
            return Vec::new();
        }
        for address in &expired {
            warn!("MPPT 0x{address:04X} timed out");
        }
        self.metrics.mppt.devices_timed_out.set(in_timeout);
        expired
    }

    /// Hand a request to the bus. Must never be called with the registry locked.
    fn send_command(&self, cmd: &Command) -> Result<(), CommandError> {
        match self.bus.send_extended(cmd.identifier, cmd.payload.as_bytes()) {
            Ok(()) => {
                self.metrics.mppt.tx_frames.inc();
                Ok(())
            }
            Err(e) => {
                self.metrics.mppt.tx_failures.inc();
                warn!(
                    "MPPT request to 0x{:04X} rejected by {}: {e}",
                    cmd.destination(),
                    self.bus.name()
                );
                Err(e.into())
            }
        }
    }

    fn ensure_enabled(&self) -> Result<(), CommandError> {
        if self.config.enabled {
            Ok(())
        } else {
            Err(CommandError::Disabled)
        }
    }

    /// Command charging on or off. The cached `charging_enabled` flag follows only when
    /// the bus accepted the frame.
    pub fn send_enable(&self, address: u16, enable: bool) -> Result<(), CommandError> {
        self.ensure_enabled()?;
        self.send_command(&Command::to(address, encode::encode_enable(enable)))?;
        if let Err(e) = self
            .registry
            .update(address, |rec| rec.charging_enabled = enable)
        {
            debug!(error = %e, "charge flag for 0x{address:04X} not cached");
        }
        info!(
            "MPPT 0x{address:04X} charge {}",
            if enable { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    pub fn send_voltage_limit(&self, address: u16, volts: f32) -> Result<(), CommandError> {
        self.ensure_enabled()?;
        self.send_command(&Command::to(address, encode::encode_target_voltage(volts)))
    }

    pub fn send_current_limit(&self, address: u16, amps: f32) -> Result<(), CommandError> {
        self.ensure_enabled()?;
        self.send_command(&Command::to(address, encode::encode_max_current(amps)))
    }

    /// Push all four configured set-points to one charger, stopping at the first failure.
    pub fn apply_setpoints(&self, address: u16) -> Result<(), CommandError> {
        self.ensure_enabled()?;
        let cfg = &self.config;
        for payload in [
            encode::encode_target_voltage(cfg.target_voltage),
            encode::encode_max_current(cfg.max_charge_current),
            encode::encode_absorption_voltage(cfg.absorption_voltage),
            encode::encode_float_voltage(cfg.float_voltage),
        ] {
            self.send_command(&Command::to(address, payload))?;
        }
        Ok(())
    }

    pub fn get_device_count(&self) -> usize {
        self.registry.len()
    }

    /// Record at `index` in discovery order; `None` if out of range or the registry is busy.
    pub fn get_device(&self, index: usize) -> Option<DeviceRecord> {
        self.registry.get(index).ok().flatten()
    }

    pub fn snapshot_all(&self) -> Result<Vec<DeviceRecord>, RegistryError> {
        self.registry.snapshot_all()
    }

    pub(crate) fn rules(&self) -> &dyn RuleOutcome {
        self.rules.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cbor::{FALSE, MAP_ONE};
    use crate::clock::ManualClock;
    use crate::config::TelemetryMode;
    use crate::protocol::{ObjectId, PUBSUB_BASE, REQRESP_BASE};
    use crate::rules::RuleFlag;
    use can_transport::{CanId, MockBus};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    struct Harness {
        bus: Arc<MockBus>,
        rules: Arc<RuleFlag>,
        clock: Arc<ManualClock>,
        mgr: MpptManager,
    }

    fn harness(config: MpptConfig) -> anyhow::Result<Harness> {
        let bus = Arc::new(MockBus::default());
        let rules = Arc::new(RuleFlag::default());
        let clock = Arc::new(ManualClock::new(0));
        let mgr = MpptManager::new(config, bus.clone(), rules.clone())?.with_clock(clock.clone());
        Ok(Harness {
            bus,
            rules,
            clock,
            mgr,
        })
    }

    fn small_uint_frame(object: ObjectId, value: u8) -> [u8; 5] {
        let [hi, lo] = object.raw().to_be_bytes();
        [0xA1, 0x19, hi, lo, value]
    }

    fn int16_frame(object: ObjectId, value: i16) -> [u8; 7] {
        let [hi, lo] = object.raw().to_be_bytes();
        let [vh, vl] = value.to_be_bytes();
        [0xA1, 0x19, hi, lo, 0x19, vh, vl]
    }

    #[test]
    fn scenario_register_then_update_temperature() -> anyhow::Result<()> {
        let h = harness(MpptConfig::default())?;
        let id = PUBSUB_BASE | 0x0010;

        h.mgr.on_receive(id, &small_uint_frame(ObjectId::ChargeState, 3));
        assert_eq!(h.mgr.get_device_count(), 1);
        let dev = h.mgr.get_device(0).ok_or_else(|| anyhow::anyhow!("device 0"))?;
        assert_eq!(dev.address, 0x0010);
        assert_eq!(dev.status, DeviceStatus::Online);
        assert_eq!(dev.telemetry.charge_state, 3);

        h.mgr.on_receive(id, &int16_frame(ObjectId::Temperature, 25));
        let dev = h.mgr.get_device(0).ok_or_else(|| anyhow::anyhow!("device 0"))?;
        assert_eq!(dev.telemetry.temperature, 25);
        assert_eq!(dev.telemetry.charge_state, 3);
        Ok(())
    }

    #[test]
    fn same_address_registers_once() -> anyhow::Result<()> {
        let h = harness(MpptConfig::default())?;
        for i in 0..20 {
            h.clock.set(i);
            h.mgr
                .on_receive(PUBSUB_BASE | 0x0012, &small_uint_frame(ObjectId::ChargeState, 1));
        }
        assert_eq!(h.mgr.get_device_count(), 1);
        assert_eq!(h.mgr.get_device(0).map(|d| d.last_seen_us), Some(19));
        Ok(())
    }

    #[test]
    fn capacity_bound_via_frames() -> anyhow::Result<()> {
        let h = harness(MpptConfig::default())?;
        for addr in 0x0010u32..0x0014 {
            let d = h
                .mgr
                .on_receive(PUBSUB_BASE | addr, &small_uint_frame(ObjectId::ChargeState, 3));
            assert!(matches!(d, FrameDisposition::Accepted { .. }));
        }
        let d = h
            .mgr
            .on_receive(PUBSUB_BASE | 0x0014, &small_uint_frame(ObjectId::ChargeState, 3));
        assert_eq!(
            d,
            FrameDisposition::Dropped(DropReason::Registry(RegistryError::CapacityExceeded {
                capacity: 4
            }))
        );
        assert_eq!(h.mgr.get_device_count(), 4);
        Ok(())
    }

    #[test]
    fn invalid_frames_leave_registry_empty() -> anyhow::Result<()> {
        let h = harness(MpptConfig::default())?;
        let good = small_uint_frame(ObjectId::ChargeState, 3);
        h.mgr.on_receive(PUBSUB_BASE | 0x0010, &[0xA1, 0x19, 0x60, 0x07, 3, 0, 0, 0, 0]);
        h.mgr.on_receive(REQRESP_BASE | 0x0010, &good);
        h.mgr.on_receive(PUBSUB_BASE | 0x000F, &good);
        h.mgr.on_receive(PUBSUB_BASE | 0x0020, &good);
        h.mgr.on_receive(PUBSUB_BASE | 0x0010, &[0xA1, 0x19, 0x60, 0x07, 0x18]);
        assert_eq!(h.mgr.get_device_count(), 0);
        assert!(h.mgr.snapshot_all()?.is_empty());
        assert!(h.mgr.metrics().encode_text().contains("mppt_can_rx_telemetry 0"));
        Ok(())
    }

    #[test]
    fn timeout_after_configured_silence() -> anyhow::Result<()> {
        let h = harness(MpptConfig {
            timeout_secs: 60,
            ..MpptConfig::default()
        })?;
        h.mgr
            .on_receive(PUBSUB_BASE | 0x0010, &small_uint_frame(ObjectId::ChargeState, 3));

        h.clock.set_secs(59);
        let report = h.mgr.tick();
        assert!(report.timed_out.is_empty());
        assert_eq!(h.mgr.get_device(0).map(|d| d.status), Some(DeviceStatus::Online));

        h.clock.set_secs(61);
        let report = h.mgr.tick();
        assert_eq!(report.timed_out, vec![0x0010]);
        assert_eq!(h.mgr.get_device(0).map(|d| d.status), Some(DeviceStatus::Timeout));

        // already in timeout: not reported again
        h.clock.set_secs(62);
        assert!(h.mgr.tick().timed_out.is_empty());
        Ok(())
    }

    #[test]
    fn any_valid_frame_recovers_from_timeout() -> anyhow::Result<()> {
        let h = harness(MpptConfig {
            timeout_secs: 10,
            ..MpptConfig::default()
        })?;
        let id = PUBSUB_BASE | 0x0011;
        h.mgr.on_receive(id, &small_uint_frame(ObjectId::ChargeState, 3));
        h.clock.set_secs(11);
        h.mgr.tick();
        assert_eq!(h.mgr.get_device(0).map(|d| d.status), Some(DeviceStatus::Timeout));

        // an unrecognized object id is enough: recovery needs no extra validation
        h.clock.set_secs(12);
        h.mgr.on_receive(id, &[0xA1, 0x19, 0x70, 0x00, 0x01]);
        let dev = h.mgr.get_device(0).ok_or_else(|| anyhow::anyhow!("device 0"))?;
        assert_eq!(dev.status, DeviceStatus::Online);
        assert_eq!(dev.last_seen_us, 12_000_000);
        assert_eq!(dev.telemetry.charge_state, 3);
        Ok(())
    }

    #[test]
    fn discovery_once_per_interval() -> anyhow::Result<()> {
        let h = harness(MpptConfig {
            discovery_interval_secs: 30,
            ..MpptConfig::default()
        })?;
        assert!(h.mgr.tick().discovery_sent);
        for s in 1..30 {
            h.clock.set_secs(s);
            assert!(!h.mgr.tick().discovery_sent);
        }
        assert_eq!(h.bus.sent().len(), 1);

        h.clock.set_secs(30);
        assert!(h.mgr.tick().discovery_sent);
        h.clock.set_secs(31);
        h.mgr.tick();
        let sent = h.bus.sent();
        assert_eq!(sent.len(), 2);
        for frame in &sent {
            assert_eq!(frame.id.raw() & 0xFF00_0000, REQRESP_BASE);
            assert_eq!(frame.id.raw() & 0xFFFF, 0xFFFF);
            assert_eq!(frame.payload(), &[0xA1, 0x19, 0x1D, 0x00]);
        }
        Ok(())
    }

    #[test]
    fn scenario_send_enable_false() -> anyhow::Result<()> {
        let h = harness(MpptConfig::default())?;
        h.mgr
            .on_receive(PUBSUB_BASE | 0x0010, &small_uint_frame(ObjectId::ChargeState, 3));
        assert_eq!(h.mgr.get_device(0).map(|d| d.charging_enabled), Some(true));

        h.mgr.send_enable(0x0010, false)?;
        let sent = h.bus.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id.raw(), 0x1D50_0010);
        assert_eq!(sent[0].payload()[0], MAP_ONE);
        assert_eq!(sent[0].payload()[4], FALSE);
        assert_eq!(h.mgr.get_device(0).map(|d| d.charging_enabled), Some(false));
        Ok(())
    }

    #[test]
    fn set_point_commands_go_out_as_fd_frames() -> anyhow::Result<()> {
        let h = harness(MpptConfig::default())?;
        h.mgr.send_voltage_limit(0x0010, 56.0)?;
        h.mgr.send_current_limit(0x0010, 20.0)?;
        let sent = h.bus.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|f| f.fd && f.payload().len() == 9));
        assert_eq!(&sent[0].payload()[5..], &56.0f32.to_be_bytes());
        assert_eq!(&sent[1].payload()[2..4], &[0x40, 0x02]);

        h.bus.clear();
        h.mgr.apply_setpoints(0x0011)?;
        let keys: Vec<[u8; 2]> = h
            .bus
            .sent()
            .iter()
            .map(|f| [f.payload()[2], f.payload()[3]])
            .collect();
        assert_eq!(keys, vec![[0x40, 0x01], [0x40, 0x02], [0x40, 0x03], [0x40, 0x04]]);
        Ok(())
    }

    #[test]
    fn scenario_over_voltage_disables_without_holding_lock() -> anyhow::Result<()> {
        let h = harness(MpptConfig::default())?;
        h.mgr
            .on_receive(PUBSUB_BASE | 0x0010, &small_uint_frame(ObjectId::ChargeState, 3));
        // first tick spends its discovery broadcast
        h.mgr.tick();
        h.bus.clear();

        let locked_during_send = Arc::new(AtomicBool::new(false));
        {
            let registry = h.mgr.registry().clone();
            let seen = locked_during_send.clone();
            h.bus.set_send_hook(move |_| {
                if registry.is_locked() {
                    seen.store(true, Ordering::SeqCst);
                }
            });
        }

        h.rules.set_over_voltage(true);
        h.clock.set_secs(1);
        let report = h.mgr.tick();
        assert_eq!(report.charge_disabled, vec![0x0010]);

        let sent = h.bus.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id.raw() & 0xFFFF, 0x0010);
        assert_eq!(sent[0].payload()[4], FALSE);
        assert!(!locked_during_send.load(Ordering::SeqCst));
        assert_eq!(h.mgr.get_device(0).map(|d| d.charging_enabled), Some(false));

        // nothing left to disable on the next tick
        h.clock.set_secs(2);
        assert!(h.mgr.tick().charge_disabled.is_empty());
        assert_eq!(h.bus.sent().len(), 1);
        Ok(())
    }

    #[test]
    fn interlock_skips_timed_out_devices() -> anyhow::Result<()> {
        let h = harness(MpptConfig {
            timeout_secs: 5,
            ..MpptConfig::default()
        })?;
        h.mgr
            .on_receive(PUBSUB_BASE | 0x0010, &small_uint_frame(ObjectId::ChargeState, 3));
        h.clock.set_secs(3);
        h.mgr
            .on_receive(PUBSUB_BASE | 0x0011, &small_uint_frame(ObjectId::ChargeState, 3));
        h.rules.set_over_voltage(true);
        h.clock.set_secs(7);
        let report = h.mgr.tick();
        assert_eq!(report.timed_out, vec![0x0010]);
        assert_eq!(report.charge_disabled, vec![0x0011]);
        Ok(())
    }

    #[test]
    fn rejected_send_keeps_cache_and_retries_next_tick() -> anyhow::Result<()> {
        let h = harness(MpptConfig::default())?;
        h.mgr
            .on_receive(PUBSUB_BASE | 0x0010, &small_uint_frame(ObjectId::ChargeState, 3));
        h.bus.set_reject_sends(true);

        let err = h.mgr.send_enable(0x0010, false);
        assert!(matches!(err, Err(CommandError::Transport(_))));
        assert_eq!(h.mgr.get_device(0).map(|d| d.charging_enabled), Some(true));

        h.rules.set_over_voltage(true);
        let report = h.mgr.tick();
        assert!(!report.discovery_sent);
        assert!(report.charge_disabled.is_empty());

        h.bus.set_reject_sends(false);
        h.clock.set_secs(1);
        assert_eq!(h.mgr.tick().charge_disabled, vec![0x0010]);
        assert!(h.mgr.metrics().encode_text().contains("mppt_can_tx_failures 3"));
        Ok(())
    }

    #[test]
    fn disabled_integration_is_inert() -> anyhow::Result<()> {
        let h = harness(MpptConfig {
            enabled: false,
            ..MpptConfig::default()
        })?;
        let d = h
            .mgr
            .on_receive(PUBSUB_BASE | 0x0010, &small_uint_frame(ObjectId::ChargeState, 3));
        assert_eq!(d, FrameDisposition::Dropped(DropReason::Disabled));
        h.rules.set_over_voltage(true);
        assert_eq!(h.mgr.tick(), TickReport::default());
        assert!(matches!(
            h.mgr.send_enable(0x0010, true),
            Err(CommandError::Disabled)
        ));
        assert!(h.bus.sent().is_empty());
        Ok(())
    }

    #[test]
    fn synthetic_mode_fills_registry_without_bus_traffic() -> anyhow::Result<()> {
        let mut cfg = MpptConfig::default();
        cfg.telemetry.mode = TelemetryMode::Synthetic;
        cfg.telemetry.device_count = 3;
        let h = harness(cfg)?;

        let report = h.mgr.tick();
        assert_eq!(report.synthetic_refreshed, 3);
        assert!(!report.discovery_sent);
        assert_eq!(h.mgr.get_device_count(), 3);
        assert!(h.bus.sent().is_empty());

        // the interlock still acts on simulated chargers
        h.rules.set_over_voltage(true);
        h.clock.set_secs(1);
        assert_eq!(
            h.mgr.tick().charge_disabled,
            vec![0x0010, 0x0011, 0x0012]
        );
        assert_eq!(h.bus.sent().len(), 3);
        Ok(())
    }

    #[test]
    fn synthetic_mode_ignores_bus_frames() -> anyhow::Result<()> {
        let mut cfg = MpptConfig {
            max_devices: 2,
            ..MpptConfig::default()
        };
        cfg.telemetry.mode = TelemetryMode::Synthetic;
        cfg.telemetry.device_count = 2;
        let h = harness(cfg)?;
        assert!(!h.mgr.source().is_live());

        let d = h
            .mgr
            .on_receive(PUBSUB_BASE | 0x0015, &small_uint_frame(ObjectId::ChargeState, 3));
        assert_eq!(d, FrameDisposition::Dropped(DropReason::SyntheticMode));
        assert_eq!(h.mgr.get_device_count(), 0);

        for s in 0..3 {
            h.clock.set_secs(s);
            assert_eq!(h.mgr.tick().synthetic_refreshed, 2);
        }
        let addrs: Vec<u16> = h.mgr.snapshot_all()?.iter().map(|d| d.address).collect();
        assert_eq!(addrs, vec![0x0010, 0x0011]);
        Ok(())
    }

    #[test]
    fn contended_registry_defers_work_to_next_tick() -> anyhow::Result<()> {
        let h = harness(MpptConfig {
            timeout_secs: 10,
            lock_timeout_ms: 20,
            ..MpptConfig::default()
        })?;
        h.mgr
            .on_receive(PUBSUB_BASE | 0x0010, &small_uint_frame(ObjectId::ChargeState, 3));
        h.clock.set_secs(11);

        let (held_tx, held_rx) = mpsc::channel();
        let holder = {
            let registry = h.mgr.registry().clone();
            thread::spawn(move || {
                let _ = registry.update(0x0010, |_| {
                    let _ = held_tx.send(());
                    thread::sleep(Duration::from_millis(300));
                });
            })
        };
        let _ = held_rx.recv();

        let report = h.mgr.tick();
        assert!(report.discovery_sent);
        assert!(report.timed_out.is_empty());
        assert_eq!(
            h.mgr
                .on_receive(PUBSUB_BASE | 0x0010, &small_uint_frame(ObjectId::ChargeState, 4)),
            FrameDisposition::Dropped(DropReason::Registry(RegistryError::LockTimeout))
        );
        // the count never blocks
        assert_eq!(h.mgr.get_device_count(), 1);

        let _ = holder.join();
        assert_eq!(h.mgr.tick().timed_out, vec![0x0010]);
        assert_eq!(h.mgr.get_device(0).map(|d| d.telemetry.charge_state), Some(3));
        Ok(())
    }

    #[test]
    fn fd_frame_from_driver_is_oversized() -> anyhow::Result<()> {
        let h = harness(MpptConfig::default())?;
        let id = CanId::extended(PUBSUB_BASE | 0x0010).ok_or_else(|| anyhow::anyhow!("id"))?;
        let frame = CanFrame::new_fd(id, &[0xA1, 0x19, 0x60, 0x01, 0xFA, 0x42, 0x0C, 0x00, 0x00])
            .ok_or_else(|| anyhow::anyhow!("len"))?;
        assert_eq!(
            h.mgr.on_frame(&frame),
            FrameDisposition::Dropped(DropReason::Oversized { len: 9 })
        );

        let frame = CanFrame::new(id, &small_uint_frame(ObjectId::ChargeState, 2))
            .ok_or_else(|| anyhow::anyhow!("len"))?;
        assert!(matches!(
            h.mgr.on_frame(&frame),
            FrameDisposition::Accepted { address: 0x0010, .. }
        ));
        Ok(())
    }

    #[test]
    fn invalid_config_is_refused() {
        let bus = Arc::new(MockBus::default());
        let res = MpptManager::new(
            MpptConfig {
                max_devices: 0,
                ..MpptConfig::default()
            },
            bus,
            Arc::new(RuleFlag::default()),
        );
        assert!(res.is_err());
    }
}
