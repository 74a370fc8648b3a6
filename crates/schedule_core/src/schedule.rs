use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::date_math::{DayInt, KEY_YEARS};
use crate::error::{ScheduleError, ScheduleResult};

/// Stable identity of a schedule, assigned once at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleId(Uuid);

impl ScheduleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScheduleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Importance of a schedule, always within `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    pub const LOWEST: Priority = Priority(1);
    pub const HIGHEST: Priority = Priority(5);

    /// Panics when `value` is outside `1..=5`.
    pub fn new(value: u8) -> Self {
        assert!(
            (1..=5).contains(&value),
            "priority {value} outside 1..=5"
        );
        Self(value)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (1..=5).contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!("priority {value} outside 1..=5"))
        }
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleFactor {
    /// Values are weekday numbers, 1 = Sunday .. 7 = Saturday.
    Weekday,
    /// Values are days of the month, 1..=31.
    DayOfMonth,
}

impl CycleFactor {
    fn accepts(self, value: u8) -> bool {
        match self {
            CycleFactor::Weekday => (1..=7).contains(&value),
            CycleFactor::DayOfMonth => (1..=31).contains(&value),
        }
    }
}

/// When a schedule happens. Exactly one shape applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DateType {
    Spot {
        at: NaiveDateTime,
    },
    Period {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    /// Repeats forever from `anchor` on every matching weekday or day of month.
    Cycle {
        anchor: NaiveDateTime,
        factor: CycleFactor,
        values: BTreeSet<u8>,
    },
}

impl DateType {
    pub fn spot(at: NaiveDateTime) -> Self {
        DateType::Spot { at }
    }

    /// Panics unless `start < end`.
    pub fn period(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        let time = DateType::Period { start, end };
        if let Err(reason) = time.check() {
            panic!("{reason}");
        }
        time
    }

    /// Panics when `values` is empty or holds a value the factor does not accept.
    pub fn cycle(
        anchor: NaiveDateTime,
        factor: CycleFactor,
        values: impl IntoIterator<Item = u8>,
    ) -> Self {
        let time = DateType::Cycle {
            anchor,
            factor,
            values: values.into_iter().collect(),
        };
        if let Err(reason) = time.check() {
            panic!("{reason}");
        }
        time
    }

    pub(crate) fn check(&self) -> Result<(), String> {
        match self {
            DateType::Spot { at } => check_year(at),
            DateType::Period { start, end } => {
                check_year(start)?;
                check_year(end)?;
                if start < end {
                    Ok(())
                } else {
                    Err(format!("period start {start} is not before end {end}"))
                }
            }
            DateType::Cycle {
                anchor,
                factor,
                values,
            } => {
                check_year(anchor)?;
                if values.is_empty() {
                    return Err("cycle has no values".to_string());
                }
                match values.iter().find(|value| !factor.accepts(**value)) {
                    Some(value) => Err(format!("cycle value {value} invalid for {factor:?}")),
                    None => Ok(()),
                }
            }
        }
    }

    /// The instant used to order schedules against each other.
    pub fn comparison_instant(&self) -> NaiveDateTime {
        match self {
            DateType::Spot { at } => *at,
            DateType::Period { start, .. } => *start,
            DateType::Cycle { anchor, .. } => *anchor,
        }
    }

    /// Whether this time lands on `day`. The single authority for day membership.
    pub fn is_active_on(&self, day: DayInt) -> bool {
        match self {
            DateType::Spot { at } => DayInt::from(*at) == day,
            DateType::Period { start, end } => {
                DayInt::from(*start) <= day && day <= DayInt::from(*end)
            }
            DateType::Cycle {
                anchor,
                factor,
                values,
            } => {
                if day < DayInt::from(*anchor) {
                    return false;
                }
                match factor {
                    CycleFactor::Weekday => values.contains(&day.weekday_number()),
                    CycleFactor::DayOfMonth => values.contains(&day.day_of_month()),
                }
            }
        }
    }

    fn is_spot(&self) -> bool {
        match self {
            DateType::Spot { .. } => true,
            DateType::Period { .. } | DateType::Cycle { .. } => false,
        }
    }

    fn is_cycle(&self) -> bool {
        match self {
            DateType::Cycle { .. } => true,
            DateType::Spot { .. } | DateType::Period { .. } => false,
        }
    }
}

fn check_year(instant: &NaiveDateTime) -> Result<(), String> {
    if KEY_YEARS.contains(&instant.year()) {
        Ok(())
    } else {
        Err(format!("{instant} is outside the supported years"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "at", rename_all = "snake_case")]
pub enum Alarm {
    Once(NaiveDateTime),
    /// Repeats on every cycle date at this time of day. Only valid on `Cycle` schedules.
    Periodic(NaiveDateTime),
}

/// Where a schedule came from. External records carry their source identity so
/// repeated imports can be deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Origin {
    #[default]
    Local,
    ExternalCalendar {
        source_id: String,
        external_uid: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
enum Completion {
    /// `Spot` schedules complete as a whole.
    Flag(bool),
    /// `Period` and `Cycle` schedules complete per occurrence day.
    Days(BTreeSet<DayInt>),
}

impl Completion {
    fn for_time(time: &DateType) -> Self {
        if time.is_spot() {
            Completion::Flag(false)
        } else {
            Completion::Days(BTreeSet::new())
        }
    }

    fn fits(&self, time: &DateType) -> bool {
        matches!(
            (self, time.is_spot()),
            (Completion::Flag(_), true) | (Completion::Days(_), false)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ScheduleRecord")]
pub struct Schedule {
    id: ScheduleId,
    title: String,
    description: String,
    priority: Priority,
    time: DateType,
    alarm: Option<Alarm>,
    is_alarm_on: bool,
    origin: Origin,
    completion: Completion,
}

/// Decoded form of a [`Schedule`]. Becomes one only after every construction
/// invariant has been re-checked.
#[derive(Deserialize)]
struct ScheduleRecord {
    id: ScheduleId,
    title: String,
    description: String,
    priority: Priority,
    time: DateType,
    alarm: Option<Alarm>,
    is_alarm_on: bool,
    origin: Origin,
    completion: Completion,
}

impl TryFrom<ScheduleRecord> for Schedule {
    type Error = String;

    fn try_from(record: ScheduleRecord) -> Result<Self, Self::Error> {
        let schedule = Schedule {
            id: record.id,
            title: record.title,
            description: record.description,
            priority: record.priority,
            time: record.time,
            alarm: record.alarm,
            is_alarm_on: record.is_alarm_on,
            origin: record.origin,
            completion: record.completion,
        };
        schedule.validate()?;
        Ok(schedule)
    }
}

impl Schedule {
    /// Panics when `priority` is outside `1..=5` or `time` is malformed.
    pub fn new(title: impl Into<String>, priority: u8, time: DateType) -> Self {
        if let Err(reason) = time.check() {
            panic!("{reason}");
        }
        Self {
            id: ScheduleId::new(),
            title: title.into(),
            description: String::new(),
            priority: Priority::new(priority),
            completion: Completion::for_time(&time),
            time,
            alarm: None,
            is_alarm_on: false,
            origin: Origin::Local,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = Priority::new(priority);
        self
    }

    /// Attaches an alarm and switches it on. Panics for a `Periodic` alarm on a
    /// schedule whose time is not a `Cycle`.
    pub fn with_alarm(mut self, alarm: Alarm) -> Self {
        assert!(
            Self::alarm_fits(&alarm, &self.time),
            "periodic alarm requires a cycle schedule"
        );
        self.alarm = Some(alarm);
        self.is_alarm_on = true;
        self
    }

    pub fn without_alarm(mut self) -> Self {
        self.alarm = None;
        self.is_alarm_on = false;
        self
    }

    /// Toggles the alarm without discarding its configuration.
    pub fn with_alarm_enabled(mut self, on: bool) -> Self {
        self.is_alarm_on = on;
        self
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// Replaces the time keeping the id. Completion state is cleared when the
    /// new time tracks completion differently from the old one.
    pub fn with_time(mut self, time: DateType) -> Self {
        if let Err(reason) = time.check() {
            panic!("{reason}");
        }
        if let Some(alarm) = &self.alarm {
            assert!(
                Self::alarm_fits(alarm, &time),
                "periodic alarm requires a cycle schedule"
            );
        }
        if !self.completion.fits(&time) {
            self.completion = Completion::for_time(&time);
        }
        self.time = time;
        self
    }

    pub fn id(&self) -> ScheduleId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn time(&self) -> &DateType {
        &self.time
    }

    pub fn alarm(&self) -> Option<&Alarm> {
        self.alarm.as_ref()
    }

    pub fn is_alarm_on(&self) -> bool {
        self.is_alarm_on
    }

    /// An alarm is configured and switched on.
    pub fn wants_alarm(&self) -> bool {
        self.alarm.is_some() && self.is_alarm_on
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn comparison_instant(&self) -> NaiveDateTime {
        self.time.comparison_instant()
    }

    pub fn time_of_day(&self) -> NaiveTime {
        self.comparison_instant().time()
    }

    pub fn is_active_on(&self, day: DayInt) -> bool {
        self.time.is_active_on(day)
    }

    /// `day` is ignored for `Spot` schedules.
    pub fn is_done(&self, day: DayInt) -> bool {
        match &self.completion {
            Completion::Flag(done) => *done,
            Completion::Days(days) => days.contains(&day),
        }
    }

    /// Flips completion for `day`, or the single flag of a `Spot` schedule.
    pub fn toggle_done(&mut self, day: DayInt) {
        match &mut self.completion {
            Completion::Flag(done) => *done = !*done,
            Completion::Days(days) => {
                if !days.remove(&day) {
                    days.insert(day);
                }
            }
        }
    }

    /// Days marked done, for `Period` and `Cycle` schedules.
    pub fn done_days(&self) -> Option<&BTreeSet<DayInt>> {
        match &self.completion {
            Completion::Flag(_) => None,
            Completion::Days(days) => Some(days),
        }
    }

    pub fn is_movable(&self) -> bool {
        match &self.time {
            DateType::Spot { .. } => true,
            DateType::Period { start, end } => start.date() == end.date(),
            DateType::Cycle { .. } => false,
        }
    }

    /// A copy of this schedule moved onto `day`, keeping times of day, completion
    /// and the offset of a one-off alarm.
    pub fn set_date(&self, day: DayInt) -> ScheduleResult<Schedule> {
        let onto = |instant: NaiveDateTime| day.date().and_time(instant.time());
        let (time, from) = match &self.time {
            DateType::Spot { at } => (DateType::Spot { at: onto(*at) }, DayInt::from(*at)),
            DateType::Period { start, end } if start.date() == end.date() => (
                DateType::Period {
                    start: onto(*start),
                    end: onto(*end),
                },
                DayInt::from(*start),
            ),
            DateType::Period { .. } | DateType::Cycle { .. } => {
                return Err(ScheduleError::NotMovable { id: self.id });
            }
        };

        let mut moved = self.clone();
        moved.time = time;
        let shift = day.date() - from.date();
        moved.alarm = match self.alarm {
            Some(Alarm::Once(at)) => Some(Alarm::Once(at + shift)),
            other => other,
        };
        if let Completion::Days(days) = &mut moved.completion {
            if days.remove(&from) {
                days.insert(day);
            }
        }
        Ok(moved)
    }

    /// Re-checks every construction invariant. Decoding runs this, so only
    /// records built in-process can skip it.
    pub(crate) fn validate(&self) -> Result<(), String> {
        self.time.check()?;
        if let Some(alarm) = &self.alarm {
            if !Self::alarm_fits(alarm, &self.time) {
                return Err(format!(
                    "schedule {} has a periodic alarm without a cycle",
                    self.id
                ));
            }
        }
        if !self.completion.fits(&self.time) {
            return Err(format!(
                "schedule {} tracks completion in the wrong shape",
                self.id
            ));
        }
        Ok(())
    }

    fn alarm_fits(alarm: &Alarm, time: &DateType) -> bool {
        match alarm {
            Alarm::Once(_) => true,
            Alarm::Periodic(_) => time.is_cycle(),
        }
    }
}
