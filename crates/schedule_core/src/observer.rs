use crate::date_math::DayInt;
use crate::schedule::ScheduleId;

/// A committed change to the store. Emitted only after the mutation succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    Inserted(ScheduleId),
    Replaced(ScheduleId),
    Deleted(ScheduleId),
    CompletionToggled { id: ScheduleId, day: DayInt },
    /// The whole store was rebuilt from a snapshot.
    Restored { count: usize },
}

/// UI layers implement this to refresh after mutations.
pub trait StoreObserver: Send + Sync {
    fn on_change(&self, change: &StoreChange);
}
