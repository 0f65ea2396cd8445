use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct MpptMetrics {
    pub tx_frames: IntCounter,
    pub tx_failures: IntCounter,
    pub rx_telemetry: IntCounter,
    pub devices_registered: IntGauge,
    pub devices_timed_out: IntGauge,
}

/// Prometheus registry for the bridge. Dropped inbound frames are not counted.
#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub mppt: MpptMetrics,
}

impl MetricsHub {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let mppt = MpptMetrics {
            tx_frames: IntCounter::new("mppt_can_tx_frames", "MPPT frames accepted by the bus")?,
            tx_failures: IntCounter::new(
                "mppt_can_tx_failures",
                "MPPT frames the bus refused to send",
            )?,
            rx_telemetry: IntCounter::new(
                "mppt_can_rx_telemetry",
                "Telemetry frames accepted into the registry",
            )?,
            devices_registered: IntGauge::new(
                "mppt_devices_registered",
                "Number of chargers in the registry",
            )?,
            devices_timed_out: IntGauge::new(
                "mppt_devices_timed_out",
                "Chargers currently in timeout",
            )?,
        };
        registry.register(Box::new(mppt.tx_frames.clone()))?;
        registry.register(Box::new(mppt.tx_failures.clone()))?;
        registry.register(Box::new(mppt.rx_telemetry.clone()))?;
        registry.register(Box::new(mppt.devices_registered.clone()))?;
        registry.register(Box::new(mppt.devices_timed_out.clone()))?;
        Ok(Self { registry, mppt })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_all_series() -> Result<(), prometheus::Error> {
        let hub = MetricsHub::new()?;
        hub.mppt.tx_frames.inc();
        hub.mppt.devices_registered.set(2);
        let text = hub.encode_text();
        assert!(text.contains("mppt_can_tx_frames 1"));
        assert!(text.contains("mppt_devices_registered 2"));
        assert!(text.contains("mppt_can_rx_telemetry 0"));
        Ok(())
    }
}
