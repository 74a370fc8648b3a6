pub mod clock;
pub mod date_math;
pub mod error;
pub mod layout;
pub mod notifications;
pub mod observer;
pub mod ordering;
pub mod schedule;
pub mod shared;
pub mod snapshot;
pub mod stickers;
pub mod store;

pub use crate::clock::{Clock, FixedClock, SystemClock};
pub use crate::date_math::DayInt;
pub use crate::error::{ScheduleError, ScheduleResult};
pub use crate::layout::{build_day_layout, ClusterStrategy, DayLayout, LayoutOptions, PlacedSchedule};
pub use crate::notifications::{
    AlarmPermission, AlarmRequest, AlarmScheduler, AlarmTrigger, StaticPermission,
};
pub use crate::observer::{StoreChange, StoreObserver};
pub use crate::schedule::{Alarm, CycleFactor, DateType, Origin, Priority, Schedule, ScheduleId};
pub use crate::shared::SharedOccurrenceStore;
pub use crate::snapshot::StoreSnapshot;
pub use crate::stickers::StickerBoard;
pub use crate::store::{ImportReport, OccurrenceStore, OccurrenceStoreBuilder};
