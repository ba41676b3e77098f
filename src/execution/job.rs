use std::{ops::Index, sync::Arc};

use crate::error::UnitErr;

/// The per-unit computation a `WorkerPool` runs.
pub trait Job: Send + Sync + 'static {
    type Item: Send + Sync + 'static;

    /// Processes one work unit.
    ///
    /// # Arguments
    /// * `slot` - The worker slot running the unit, unique among in-flight units.
    /// * `stamp` - The epoch the unit was created for.
    /// * `item` - The work unit.
    ///
    /// # Returns
    /// A `UnitErr` if the unit was skipped, it must then leave no trace.
    fn process(&self, slot: usize, stamp: usize, item: &Self::Item) -> Result<(), UnitErr>;

    /// Called once per worker slot after every unit of the epoch went through it.
    ///
    /// # Arguments
    /// * `slot` - The worker slot being drained.
    /// * `stamp` - The epoch being drained.
    fn drain(&self, _slot: usize, _stamp: usize) -> Result<(), UnitErr> {
        Ok(())
    }
}

/// The work units of one epoch, stamped with that epoch.
///
/// Units are shared, never copied nor mutated.
#[derive(Debug)]
pub struct WorkSource<T> {
    items: Arc<[T]>,
    stamp: usize,
}

impl<T> Clone for WorkSource<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            stamp: self.stamp,
        }
    }
}

impl<T> WorkSource<T> {
    /// Creates a new `WorkSource`.
    ///
    /// # Arguments
    /// * `items` - The work units, in the order they are fed.
    /// * `stamp` - The epoch these units belong to.
    pub fn new(items: Arc<[T]>, stamp: usize) -> Self {
        Self { items, stamp }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn stamp(&self) -> usize {
        self.stamp
    }
}

impl<T> Index<usize> for WorkSource<T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.items[index]
    }
}
