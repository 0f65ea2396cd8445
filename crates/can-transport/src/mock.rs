use crate::{CanBus, CanFrame, Result, Timestamp, TransportError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Callback run for every frame handed to [`MockBus::send`], before it is recorded.
pub type SendHook = Box<dyn Fn(&CanFrame) + Send + Sync>;

/// A simple in-process mock bus. Each bus instance is independent.
///
/// Every accepted frame is stamped and appended to an in-memory log that tests can
/// inspect with [`MockBus::sent`].
pub struct MockBus {
    name: String,
    sent: Mutex<Vec<CanFrame>>,
    reject_sends: AtomicBool,
    hook: Mutex<Option<SendHook>>,
}

impl MockBus {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            sent: Mutex::new(Vec::new()),
            reject_sends: AtomicBool::new(false),
            hook: Mutex::new(None),
        }
    }

    /// Make subsequent sends fail with [`TransportError::Rejected`].
    pub fn set_reject_sends(&self, reject: bool) {
        self.reject_sends.store(reject, Ordering::SeqCst);
    }

    /// Install an observer that runs inside `send`.
    pub fn set_send_hook<F>(&self, hook: F)
    where
        F: Fn(&CanFrame) + Send + Sync + 'static,
    {
        if let Ok(mut slot) = self.hook.lock() {
            *slot = Some(Box::new(hook));
        }
    }

    /// Copy of every frame accepted so far, oldest first.
    pub fn sent(&self) -> Vec<CanFrame> {
        self.sent.lock().map(|log| log.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut log) = self.sent.lock() {
            log.clear();
        }
    }
}

impl Default for MockBus {
    fn default() -> Self {
        Self::new("mock0")
    }
}

impl CanBus for MockBus {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, frame: &CanFrame) -> Result<()> {
        if let Ok(hook) = self.hook.lock() {
            if let Some(hook) = hook.as_ref() {
                hook(frame);
            }
        }
        if self.reject_sends.load(Ordering::SeqCst) {
            tracing::debug!(bus = %self.name, id = %frame.id, "mock bus rejecting frame");
            return Err(TransportError::Rejected(format!("{} is rejecting sends", self.name)));
        }
        let mut stamped = frame.clone();
        stamped.timestamp = Some(Timestamp::now());
        self.sent
            .lock()
            .map_err(|_| TransportError::Io("mock log poisoned".to_string()))?
            .push(stamped);
        Ok(())
    }
}
