use std::sync::atomic::{AtomicBool, Ordering};

/// Outcome of the BMS rule engine that the charge interlock consumes.
pub trait RuleOutcome: Send + Sync {
    /// Whether the "bank over-voltage" rule is currently asserted.
    fn bank_over_voltage(&self) -> bool;
}

impl<F> RuleOutcome for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn bank_over_voltage(&self) -> bool {
        self()
    }
}

/// Rule outcome stored in an atomic, set by whoever evaluates the rules.
#[derive(Debug, Default)]
pub struct RuleFlag {
    over_voltage: AtomicBool,
}

impl RuleFlag {
    pub fn new(over_voltage: bool) -> Self {
        Self {
            over_voltage: AtomicBool::new(over_voltage),
        }
    }

    pub fn set_over_voltage(&self, asserted: bool) {
        self.over_voltage.store(asserted, Ordering::SeqCst);
    }
}

impl RuleOutcome for RuleFlag {
    fn bank_over_voltage(&self) -> bool {
        self.over_voltage.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_and_closure_report_outcome() {
        let flag = RuleFlag::default();
        assert!(!flag.bank_over_voltage());
        flag.set_over_voltage(true);
        assert!(flag.bank_over_voltage());

        let always = || true;
        assert!(always.bank_over_voltage());
    }
}
