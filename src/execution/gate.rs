use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounds the amount of in-flight work units and hands each one a free worker slot.
#[derive(Debug)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    free_slots: Arc<Mutex<Vec<usize>>>,
}

impl AdmissionGate {
    /// Creates a new `AdmissionGate`.
    ///
    /// # Arguments
    /// * `capacity` - The maximum amount of permits alive at once.
    ///
    /// # Returns
    /// A new `AdmissionGate` instance.
    pub fn new(capacity: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            free_slots: Arc::new(Mutex::new((0..capacity).rev().collect())),
        }
    }

    /// Waits until a slot is free.
    ///
    /// # Returns
    /// A `Permit` holding the slot, or `None` if no slot could be handed out.
    pub async fn acquire(&self) -> Option<Permit> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await.ok()?;
        let slot = self.free_slots.lock().pop()?;

        Some(Permit {
            slot,
            free_slots: Arc::clone(&self.free_slots),
            _permit: permit,
        })
    }

}

/// The right to run one work unit on a given worker slot.
///
/// Dropping it, even while unwinding, returns the slot and then the permit.
#[derive(Debug)]
pub struct Permit {
    slot: usize,
    free_slots: Arc<Mutex<Vec<usize>>>,
    _permit: OwnedSemaphorePermit,
}

impl Permit {
    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.free_slots.lock().push(self.slot);
    }
}
