//! Alarm collaborators and the policy deciding when a schedule's alarm fires.
//!
//! Delivery belongs to the platform. The store only asks whether alarms are
//! permitted and hands fully computed requests to an [`AlarmScheduler`].

use std::cmp;

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::date_math::{next_matching_day_of_month, next_matching_weekday};
use crate::schedule::{Alarm, CycleFactor, DateType, Schedule, ScheduleId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmTrigger {
    Once {
        at: NaiveDateTime,
    },
    /// Fires every week on `weekday` (1 = Sunday .. 7 = Saturday), starting at `first`.
    Weekly {
        weekday: u8,
        time: NaiveTime,
        first: NaiveDateTime,
    },
    /// Fires on `day` of every month that has it, starting at `first`.
    Monthly {
        day: u8,
        time: NaiveTime,
        first: NaiveDateTime,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmRequest {
    pub schedule_id: ScheduleId,
    pub title: String,
    pub body: String,
    pub triggers: Vec<AlarmTrigger>,
}

/// Whether the platform currently allows alarms.
pub trait AlarmPermission: Send + Sync {
    fn granted(&self) -> bool;
}

/// Platform-specific alarm delivery. Calls are fire-and-forget; failures are
/// reported on the implementation's own channel.
pub trait AlarmScheduler: Send + Sync {
    fn schedule(&self, request: AlarmRequest);
    fn cancel(&self, schedule: &Schedule);
}

/// A permission answer fixed at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticPermission(pub bool);

impl AlarmPermission for StaticPermission {
    fn granted(&self) -> bool {
        self.0
    }
}

/// Builds the request for a schedule whose alarm is configured and switched on.
pub fn alarm_request(schedule: &Schedule) -> Option<AlarmRequest> {
    if !schedule.is_alarm_on() {
        return None;
    }
    let triggers = match schedule.alarm()? {
        Alarm::Once(at) => vec![AlarmTrigger::Once { at: *at }],
        Alarm::Periodic(at) => periodic_triggers(*at, schedule.time()),
    };
    Some(AlarmRequest {
        schedule_id: schedule.id(),
        title: schedule.title().to_string(),
        body: describe_time(schedule.time()),
        triggers,
    })
}

fn periodic_triggers(alarm_at: NaiveDateTime, time: &DateType) -> Vec<AlarmTrigger> {
    match time {
        DateType::Cycle {
            anchor,
            factor,
            values,
        } => {
            let base = cmp::max(alarm_at.date(), anchor.date());
            // Successor search is strict, so probe from the day before to include `base`.
            let probe = (base - Duration::days(1)).and_time(alarm_at.time());
            values
                .iter()
                .map(|value| match factor {
                    CycleFactor::Weekday => AlarmTrigger::Weekly {
                        weekday: *value,
                        time: alarm_at.time(),
                        first: next_matching_weekday(probe, *value),
                    },
                    CycleFactor::DayOfMonth => AlarmTrigger::Monthly {
                        day: *value,
                        time: alarm_at.time(),
                        first: next_matching_day_of_month(probe, *value),
                    },
                })
                .collect()
        }
        // Rejected when the alarm is attached.
        DateType::Spot { .. } | DateType::Period { .. } => Vec::new(),
    }
}

fn describe_time(time: &DateType) -> String {
    match time {
        DateType::Spot { at } => format!("At {}", at.format("%Y-%m-%d %H:%M")),
        DateType::Period { start, end } => format!(
            "From {} to {}",
            start.format("%Y-%m-%d %H:%M"),
            end.format("%Y-%m-%d %H:%M")
        ),
        DateType::Cycle { anchor, factor, .. } => match factor {
            CycleFactor::Weekday => format!("Weekly at {}", anchor.format("%H:%M")),
            CycleFactor::DayOfMonth => format!("Monthly at {}", anchor.format("%H:%M")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn once_alarm_yields_single_trigger() {
        let schedule = Schedule::new("Dentist", 3, DateType::spot(at(2024, 3, 1, 9, 15)))
            .with_alarm(Alarm::Once(at(2024, 3, 1, 8, 45)));
        let request = alarm_request(&schedule).unwrap();
        assert_eq!(request.schedule_id, schedule.id());
        assert_eq!(request.title, "Dentist");
        assert_eq!(request.body, "At 2024-03-01 09:15");
        assert_eq!(
            request.triggers,
            vec![AlarmTrigger::Once {
                at: at(2024, 3, 1, 8, 45)
            }]
        );
    }

    #[test]
    fn disabled_or_missing_alarm_yields_nothing() {
        let bare = Schedule::new("x", 1, DateType::spot(at(2024, 3, 1, 9, 0)));
        assert!(alarm_request(&bare).is_none());
        let off = bare
            .with_alarm(Alarm::Once(at(2024, 3, 1, 8, 0)))
            .with_alarm_enabled(false);
        assert!(alarm_request(&off).is_none());
    }

    #[test]
    fn weekly_triggers_start_on_first_matching_day() {
        // Anchor Monday 2024-01-01; alarm on Mondays and Thursdays at 06:30.
        let schedule = Schedule::new(
            "Run",
            2,
            DateType::cycle(at(2024, 1, 1, 7, 0), CycleFactor::Weekday, [2, 5]),
        )
        .with_alarm(Alarm::Periodic(at(2024, 1, 1, 6, 30)));
        let request = alarm_request(&schedule).unwrap();
        let time = NaiveTime::from_hms_opt(6, 30, 0).unwrap();
        assert_eq!(
            request.triggers,
            vec![
                AlarmTrigger::Weekly {
                    weekday: 2,
                    time,
                    first: at(2024, 1, 1, 6, 30),
                },
                AlarmTrigger::Weekly {
                    weekday: 5,
                    time,
                    first: at(2024, 1, 4, 6, 30),
                },
            ]
        );
    }

    #[test]
    fn monthly_triggers_skip_short_months_and_respect_anchor() {
        let schedule = Schedule::new(
            "Rent",
            5,
            DateType::cycle(at(2024, 2, 1, 9, 0), CycleFactor::DayOfMonth, [30]),
        )
        .with_alarm(Alarm::Periodic(at(2024, 1, 15, 8, 0)));
        let request = alarm_request(&schedule).unwrap();
        assert_eq!(
            request.triggers,
            vec![AlarmTrigger::Monthly {
                day: 30,
                time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                first: at(2024, 3, 30, 8, 0),
            }]
        );
        assert_eq!(request.body, "Monthly at 09:00");
    }
}
