use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::ScheduleResult;
use crate::schedule::{Schedule, ScheduleId};
use crate::store::OccurrenceStore;

/// Cloneable handle to a store shared between threads. Readers never observe
/// a mutation half applied; every mutation runs under one write guard.
#[derive(Clone)]
pub struct SharedOccurrenceStore {
    inner: Arc<RwLock<OccurrenceStore>>,
}

impl SharedOccurrenceStore {
    pub fn new(store: OccurrenceStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, OccurrenceStore> {
        self.inner.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, OccurrenceStore> {
        self.inner.write()
    }

    pub fn insert(&self, schedule: Schedule) -> ScheduleResult<()> {
        self.inner.write().insert(schedule)
    }

    pub fn replace(&self, old: &Schedule, new: Schedule) -> ScheduleResult<()> {
        self.inner.write().replace(old, new)
    }

    pub fn delete(&self, id: ScheduleId) -> Schedule {
        self.inner.write().delete(id)
    }
}

impl From<OccurrenceStore> for SharedOccurrenceStore {
    fn from(store: OccurrenceStore) -> Self {
        Self::new(store)
    }
}
