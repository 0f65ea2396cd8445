//! Fixed-capacity table of discovered chargers.
//!
//! Every access goes through one mutex taken with a bounded wait. Callers that need to
//! talk to the bus for several devices copy what they need with
//! [`DeviceRegistry::snapshot_matching`], drop the lock, send, and write results back
//! with [`DeviceRegistry::update`]. Nothing in this module performs I/O.

use crate::error::RegistryError;
use crate::types::DeviceRecord;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub struct DeviceRegistry {
    devices: Mutex<Vec<DeviceRecord>>,
    count: AtomicUsize,
    capacity: usize,
    lock_timeout: Duration,
}

impl DeviceRegistry {
    pub fn new(capacity: usize, lock_timeout: Duration) -> Self {
        Self {
            devices: Mutex::new(Vec::with_capacity(capacity)),
            count: AtomicUsize::new(0),
            capacity,
            lock_timeout,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<DeviceRecord>>, RegistryError> {
        self.devices
            .try_lock_for(self.lock_timeout)
            .ok_or(RegistryError::LockTimeout)
    }

    /// Existing record for `address`, or a new Online one stamped `now_us` if there is
    /// room. Registration order is preserved.
    pub fn find_or_register(
        &self,
        address: u16,
        now_us: i64,
    ) -> Result<DeviceRecord, RegistryError> {
        let mut devices = self.lock()?;
        if let Some(rec) = devices.iter().find(|d| d.address == address) {
            return Ok(*rec);
        }
        if devices.len() >= self.capacity {
            return Err(RegistryError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        let rec = DeviceRecord::new(address, now_us);
        devices.push(rec);
        self.count.store(devices.len(), Ordering::Release);
        tracing::info!("New MPPT discovered: 0x{address:04X}");
        Ok(rec)
    }

    /// Apply `mutate` to the record for `address`. Returns false if the address is unknown.
    pub fn update<F>(&self, address: u16, mutate: F) -> Result<bool, RegistryError>
    where
        F: FnOnce(&mut DeviceRecord),
    {
        let mut devices = self.lock()?;
        match devices.iter_mut().find(|d| d.address == address) {
            Some(rec) => {
                mutate(rec);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Run `mutate` over every record in one critical section; returns how many records
    /// it reported as changed.
    pub fn update_each<F>(&self, mut mutate: F) -> Result<usize, RegistryError>
    where
        F: FnMut(&mut DeviceRecord) -> bool,
    {
        let mut devices = self.lock()?;
        let mut changed = 0;
        for rec in devices.iter_mut() {
            if mutate(rec) {
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Copies of the records matching `predicate`, in registration order. The lock is
    /// released before this returns.
    pub fn snapshot_matching<P>(&self, predicate: P) -> Result<Vec<DeviceRecord>, RegistryError>
    where
        P: Fn(&DeviceRecord) -> bool,
    {
        let devices = self.lock()?;
        Ok(devices.iter().filter(|d| predicate(*d)).copied().collect())
    }

    pub fn snapshot_all(&self) -> Result<Vec<DeviceRecord>, RegistryError> {
        self.snapshot_matching(|_| true)
    }

    /// Copy of the record at `index` in registration order.
    pub fn get(&self, index: usize) -> Result<Option<DeviceRecord>, RegistryError> {
        Ok(self.lock()?.get(index).copied())
    }

    /// Number of registered devices. Readable without the lock.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether some caller currently holds the table lock.
    pub fn is_locked(&self) -> bool {
        self.devices.is_locked()
    }
}
