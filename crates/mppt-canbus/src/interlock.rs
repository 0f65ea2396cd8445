//! Over-voltage charge interlock.

use crate::manager::MpptManager;
use tracing::{debug, error, warn};

impl MpptManager {
    /// While the bank over-voltage rule is asserted, command every Online charger that
    /// is still enabled to stop charging. Returns the addresses whose disable frame the
    /// bus accepted; anything else is retried on the next tick.
    pub fn enforce_interlock(&self) -> Vec<u16> {
        if !self.config().enabled || !self.rules().bank_over_voltage() {
            return Vec::new();
        }
        // copy out and release the lock before touching the bus
        let targets = match self
            .registry()
            .snapshot_matching(|rec| rec.is_online() && rec.charging_enabled)
        {
            Ok(targets) => targets,
            Err(e) => {
                debug!(error = %e, "interlock deferred");
                return Vec::new();
            }
        };

        let mut disabled = Vec::with_capacity(targets.len());
        for rec in targets {
            warn!(
                "Bank over-voltage: disabling MPPT 0x{:04X}",
                rec.address
            );
            match self.send_enable(rec.address, false) {
                Ok(()) => disabled.push(rec.address),
                Err(e) => error!("Failed to disable MPPT 0x{:04X}: {e}", rec.address),
            }
        }
        disabled
    }
}
