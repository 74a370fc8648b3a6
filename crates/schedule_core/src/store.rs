//! Date-indexed schedule store.
//!
//! Records live in one map keyed by id. Three indices hold ids only:
//! - by day, for `Spot` and every day a `Period` touches,
//! - by weekday number, for weekday `Cycle`s,
//! - by day of month, for day-of-month `Cycle`s.
//!
//! The store is single-writer. Wrap it in [`crate::shared::SharedOccurrenceStore`]
//! when more than one thread needs it.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use chrono::NaiveDateTime;
use tracing::{debug, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::date_math::{days_inclusive, DayInt};
use crate::error::{ScheduleError, ScheduleResult};
use crate::layout::{self, DayLayout, LayoutOptions};
use crate::notifications::{self, AlarmPermission, AlarmScheduler, StaticPermission};
use crate::observer::{StoreChange, StoreObserver};
use crate::ordering;
use crate::schedule::{CycleFactor, DateType, Origin, Schedule, ScheduleId};
use crate::snapshot::{StoreSnapshot, SNAPSHOT_VERSION};
use crate::stickers::StickerBoard;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexKey {
    Day(DayInt),
    Weekday(u8),
    DayOfMonth(u8),
}

/// Outcome of an external calendar import.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub inserted: Vec<ScheduleId>,
    /// Already present, matched by id or by external source identity.
    pub skipped: Vec<ScheduleId>,
    /// Refused because they carry an alarm and alarms are not permitted.
    pub rejected: Vec<ScheduleId>,
}

pub struct OccurrenceStore {
    schedules: HashMap<ScheduleId, Schedule>,
    order: Vec<ScheduleId>,
    by_day: HashMap<DayInt, Vec<ScheduleId>>,
    by_weekday: HashMap<u8, Vec<ScheduleId>>,
    by_day_of_month: HashMap<u8, Vec<ScheduleId>>,
    stickers: StickerBoard,
    permission: Box<dyn AlarmPermission>,
    scheduler: Option<Box<dyn AlarmScheduler>>,
    clock: Box<dyn Clock>,
    observers: Vec<Box<dyn StoreObserver>>,
}

pub struct OccurrenceStoreBuilder {
    permission: Box<dyn AlarmPermission>,
    scheduler: Option<Box<dyn AlarmScheduler>>,
    clock: Box<dyn Clock>,
    observers: Vec<Box<dyn StoreObserver>>,
}

impl OccurrenceStoreBuilder {
    /// Alarms are refused and the system clock is used until configured otherwise.
    pub fn new() -> Self {
        Self {
            permission: Box::new(StaticPermission(false)),
            scheduler: None,
            clock: Box::new(SystemClock),
            observers: Vec::new(),
        }
    }

    pub fn with_alarm_permission(mut self, permission: Box<dyn AlarmPermission>) -> Self {
        self.permission = permission;
        self
    }

    pub fn with_alarm_scheduler(mut self, scheduler: Box<dyn AlarmScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn StoreObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn build(self) -> OccurrenceStore {
        OccurrenceStore {
            schedules: HashMap::new(),
            order: Vec::new(),
            by_day: HashMap::new(),
            by_weekday: HashMap::new(),
            by_day_of_month: HashMap::new(),
            stickers: StickerBoard::new(),
            permission: self.permission,
            scheduler: self.scheduler,
            clock: self.clock,
            observers: self.observers,
        }
    }
}

impl Default for OccurrenceStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for OccurrenceStore {
    fn default() -> Self {
        OccurrenceStoreBuilder::new().build()
    }
}

impl OccurrenceStore {
    pub fn builder() -> OccurrenceStoreBuilder {
        OccurrenceStoreBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.schedules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty()
    }

    pub fn contains(&self, id: ScheduleId) -> bool {
        self.schedules.contains_key(&id)
    }

    pub fn get(&self, id: ScheduleId) -> Option<&Schedule> {
        self.schedules.get(&id)
    }

    /// Every schedule in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Schedule> {
        self.order.iter().map(|id| self.record(*id))
    }

    pub fn stickers(&self) -> &StickerBoard {
        &self.stickers
    }

    pub fn stickers_mut(&mut self) -> &mut StickerBoard {
        &mut self.stickers
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn today(&self) -> DayInt {
        self.clock.today()
    }

    /// Schedules active on `day`: the day bucket, then matching weekday cycles,
    /// then matching day-of-month cycles, each in insertion order.
    pub fn occurrences_on(&self, day: DayInt) -> Vec<&Schedule> {
        let mut found: Vec<&Schedule> = Vec::new();
        if let Some(ids) = self.by_day.get(&day) {
            found.extend(ids.iter().map(|id| self.record(*id)));
        }
        let cycles = [
            self.by_weekday.get(&day.weekday_number()),
            self.by_day_of_month.get(&day.day_of_month()),
        ];
        for ids in cycles.into_iter().flatten() {
            found.extend(
                ids.iter()
                    .map(|id| self.record(*id))
                    .filter(|schedule| schedule.is_active_on(day)),
            );
        }
        found
    }

    pub fn occurrences_today(&self) -> Vec<&Schedule> {
        self.occurrences_on(self.today())
    }

    pub fn day_layout(&self, day: DayInt, options: LayoutOptions) -> DayLayout<'_> {
        layout::build_day_layout(&self.occurrences_on(day), day, options)
    }

    /// Case- and whitespace-insensitive title search, in chronological order.
    /// A title matches when either side contains the other.
    pub fn query(&self, text: &str) -> Vec<&Schedule> {
        let needle = normalize(text);
        if needle.is_empty() {
            return Vec::new();
        }
        let mut hits: Vec<&Schedule> = self
            .iter()
            .filter(|schedule| {
                let title = normalize(schedule.title());
                !title.is_empty() && (title.contains(&needle) || needle.contains(&title))
            })
            .collect();
        ordering::sort_refs_chronologically(&mut hits);
        hits
    }

    pub fn find_external(&self, source_id: &str, external_uid: &str) -> Option<&Schedule> {
        self.iter().find(|schedule| match schedule.origin() {
            Origin::ExternalCalendar {
                source_id: source,
                external_uid: uid,
            } => source == source_id && uid == external_uid,
            Origin::Local => false,
        })
    }

    /// Adds a new schedule. Fails without touching the store when the schedule
    /// carries an alarm and alarms are not permitted.
    ///
    /// Panics if a schedule with the same id is already stored.
    #[instrument(skip(self, schedule), fields(id = %schedule.id()))]
    pub fn insert(&mut self, schedule: Schedule) -> ScheduleResult<()> {
        let id = schedule.id();
        assert!(!self.contains(id), "schedule {id} is already stored");
        self.ensure_alarm_permitted(&schedule)?;

        self.index(&schedule);
        self.arm(&schedule);
        info!(title = %schedule.title(), "schedule inserted");
        self.order.push(id);
        self.schedules.insert(id, schedule);
        self.notify(StoreChange::Inserted(id));
        Ok(())
    }

    /// Swaps a stored schedule for a new version with the same id. Either the
    /// old or the new version is visible afterwards, never a mix.
    ///
    /// Panics if the ids differ or `old` is not stored.
    #[instrument(skip(self, old, new), fields(id = %old.id()))]
    pub fn replace(&mut self, old: &Schedule, new: Schedule) -> ScheduleResult<()> {
        let id = old.id();
        assert_eq!(id, new.id(), "replacement must keep the schedule id");
        assert!(self.contains(id), "schedule {id} is not stored");
        self.ensure_alarm_permitted(&new)?;

        let previous = self.take(id);
        self.unindex(&previous);
        self.index(&new);
        if previous.alarm().is_some() {
            self.disarm(&previous);
        }
        self.arm(&new);
        info!(title = %new.title(), "schedule replaced");
        self.schedules.insert(id, new);
        self.notify(StoreChange::Replaced(id));
        Ok(())
    }

    /// Removes a schedule from every index and cancels its alarm.
    ///
    /// Panics if `id` is not stored.
    #[instrument(skip(self))]
    pub fn delete(&mut self, id: ScheduleId) -> Schedule {
        assert!(self.contains(id), "schedule {id} is not stored");
        let removed = self.take(id);
        self.unindex(&removed);
        self.order.retain(|candidate| *candidate != id);
        if removed.alarm().is_some() {
            self.disarm(&removed);
        }
        info!(title = %removed.title(), "schedule deleted");
        self.notify(StoreChange::Deleted(id));
        removed
    }

    /// Moves a single-day schedule onto `day`, keeping its times of day.
    pub fn move_to(&mut self, id: ScheduleId, day: DayInt) -> ScheduleResult<()> {
        let current = self.get(id).cloned();
        let Some(current) = current else {
            panic!("schedule {id} is not stored");
        };
        let moved = current.set_date(day)?;
        self.replace(&current, moved)
    }

    /// Flips completion of `id` for `day`. Indices are unaffected.
    ///
    /// Panics if `id` is not stored.
    pub fn toggle_done(&mut self, id: ScheduleId, day: DayInt) {
        let Some(schedule) = self.schedules.get_mut(&id) else {
            panic!("schedule {id} is not stored");
        };
        schedule.toggle_done(day);
        debug!(%id, %day, done = schedule.is_done(day), "completion toggled");
        self.notify(StoreChange::CompletionToggled { id, day });
    }

    /// Inserts schedules from an external calendar, skipping ones already present.
    #[instrument(skip(self, schedules), fields(count = schedules.len()))]
    pub fn import_external(&mut self, schedules: Vec<Schedule>) -> ImportReport {
        let mut report = ImportReport::default();
        for schedule in schedules {
            let id = schedule.id();
            let duplicate = self.contains(id)
                || match schedule.origin() {
                    Origin::ExternalCalendar {
                        source_id,
                        external_uid,
                    } => self.find_external(source_id, external_uid).is_some(),
                    Origin::Local => false,
                };
            if duplicate {
                debug!(%id, "import skipped duplicate");
                report.skipped.push(id);
                continue;
            }
            match self.insert(schedule) {
                Ok(()) => report.inserted.push(id),
                Err(err) => {
                    warn!(%id, %err, "import rejected schedule");
                    report.rejected.push(id);
                }
            }
        }
        info!(
            inserted = report.inserted.len(),
            skipped = report.skipped.len(),
            rejected = report.rejected.len(),
            "external import finished"
        );
        report
    }

    /// Deletes every schedule imported from `source_id`. Returns how many went.
    pub fn remove_source(&mut self, source_id: &str) -> usize {
        let doomed: Vec<ScheduleId> = self
            .iter()
            .filter(|schedule| {
                matches!(
                    schedule.origin(),
                    Origin::ExternalCalendar { source_id: source, .. } if source == source_id
                )
            })
            .map(Schedule::id)
            .collect();
        for id in &doomed {
            self.delete(*id);
        }
        info!(source_id, removed = doomed.len(), "external source removed");
        doomed.len()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            version: SNAPSHOT_VERSION,
            schedules: self.iter().cloned().collect(),
            stickers: self
                .stickers
                .iter()
                .map(|(day, sticker)| (day, sticker.to_string()))
                .collect(),
        }
    }

    /// Replaces the whole content with `snapshot`, rebuilding every index.
    /// Alarm collaborators are not called; restored alarms are assumed to be
    /// scheduled already. On error the store is left untouched.
    #[instrument(skip(self, snapshot), fields(count = snapshot.schedules.len()))]
    pub fn restore(&mut self, snapshot: StoreSnapshot) -> ScheduleResult<()> {
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(ScheduleError::InvalidSnapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        let mut seen = HashSet::new();
        for schedule in &snapshot.schedules {
            schedule.validate().map_err(ScheduleError::InvalidSnapshot)?;
            if !seen.insert(schedule.id()) {
                return Err(ScheduleError::InvalidSnapshot(format!(
                    "schedule {} appears twice",
                    schedule.id()
                )));
            }
        }

        self.schedules.clear();
        self.order.clear();
        self.by_day.clear();
        self.by_weekday.clear();
        self.by_day_of_month.clear();
        for schedule in snapshot.schedules {
            self.index(&schedule);
            self.order.push(schedule.id());
            self.schedules.insert(schedule.id(), schedule);
        }
        self.stickers = snapshot.stickers.into_iter().collect();

        let count = self.schedules.len();
        info!(count, "store restored");
        self.notify(StoreChange::Restored { count });
        Ok(())
    }
}

impl OccurrenceStore {
    fn record(&self, id: ScheduleId) -> &Schedule {
        match self.schedules.get(&id) {
            Some(schedule) => schedule,
            None => panic!("index refers to unknown schedule {id}"),
        }
    }

    fn take(&mut self, id: ScheduleId) -> Schedule {
        match self.schedules.remove(&id) {
            Some(schedule) => schedule,
            None => panic!("schedule {id} is not stored"),
        }
    }

    fn ensure_alarm_permitted(&self, schedule: &Schedule) -> ScheduleResult<()> {
        if schedule.alarm().is_some() && !self.permission.granted() {
            warn!(id = %schedule.id(), "alarm requested without permission");
            return Err(ScheduleError::AlarmNotPermitted { id: schedule.id() });
        }
        Ok(())
    }

    fn arm(&self, schedule: &Schedule) {
        let Some(scheduler) = &self.scheduler else {
            return;
        };
        if let Some(request) = notifications::alarm_request(schedule) {
            debug!(id = %schedule.id(), triggers = request.triggers.len(), "scheduling alarm");
            scheduler.schedule(request);
        }
    }

    fn disarm(&self, schedule: &Schedule) {
        if let Some(scheduler) = &self.scheduler {
            debug!(id = %schedule.id(), "cancelling alarm");
            scheduler.cancel(schedule);
        }
    }

    fn notify(&self, change: StoreChange) {
        for observer in &self.observers {
            observer.on_change(&change);
        }
    }

    fn index(&mut self, schedule: &Schedule) {
        let id = schedule.id();
        let keys = index_keys(schedule.time());
        for key in &keys {
            match *key {
                IndexKey::Day(day) => push_id(&mut self.by_day, day, id),
                IndexKey::Weekday(value) => push_id(&mut self.by_weekday, value, id),
                IndexKey::DayOfMonth(value) => push_id(&mut self.by_day_of_month, value, id),
            }
        }
        debug!(%id, keys = keys.len(), "schedule indexed");
    }

    fn unindex(&mut self, schedule: &Schedule) {
        let id = schedule.id();
        let keys = index_keys(schedule.time());
        for key in &keys {
            let removed = match *key {
                IndexKey::Day(day) => pull_id(&mut self.by_day, day, id),
                IndexKey::Weekday(value) => pull_id(&mut self.by_weekday, value, id),
                IndexKey::DayOfMonth(value) => pull_id(&mut self.by_day_of_month, value, id),
            };
            assert!(removed, "schedule {id} missing from index bucket {key:?}");
        }
        debug!(%id, keys = keys.len(), "schedule unindexed");
    }

    #[cfg(test)]
    fn index_entry_count(&self) -> usize {
        self.by_day.values().map(Vec::len).sum::<usize>()
            + self.by_weekday.values().map(Vec::len).sum::<usize>()
            + self.by_day_of_month.values().map(Vec::len).sum::<usize>()
    }
}

fn index_keys(time: &DateType) -> Vec<IndexKey> {
    match time {
        DateType::Spot { at } => vec![IndexKey::Day(DayInt::from(*at))],
        DateType::Period { start, end } => {
            days_inclusive(DayInt::from(*start), DayInt::from(*end))
                .map(IndexKey::Day)
                .collect()
        }
        DateType::Cycle { factor, values, .. } => values
            .iter()
            .map(|value| match factor {
                CycleFactor::Weekday => IndexKey::Weekday(*value),
                CycleFactor::DayOfMonth => IndexKey::DayOfMonth(*value),
            })
            .collect(),
    }
}

fn push_id<K: Hash + Eq>(map: &mut HashMap<K, Vec<ScheduleId>>, key: K, id: ScheduleId) {
    map.entry(key).or_default().push(id);
}

fn pull_id<K: Hash + Eq>(map: &mut HashMap<K, Vec<ScheduleId>>, key: K, id: ScheduleId) -> bool {
    let Some(bucket) = map.get_mut(&key) else {
        return false;
    };
    let Some(position) = bucket.iter().position(|candidate| *candidate == id) else {
        return false;
    };
    bucket.remove(position);
    if bucket.is_empty() {
        map.remove(&key);
    }
    true
}

fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
