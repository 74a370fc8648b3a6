//! Partitions one day's schedules into an all-day band, standalone rows and
//! side-by-side clusters.
//!
//! Positions are minutes from the start of the rendered day; turning them into
//! pixels is up to the renderer.

use std::collections::VecDeque;

use chrono::{Duration, NaiveDateTime};

use crate::date_math::DayInt;
use crate::schedule::{DateType, Schedule};

/// Half-width of the window a point-in-time schedule occupies for collisions.
pub const COLLISION_RADIUS_MINUTES: i64 = 30;
/// Shortest duration reported for a row, so zero-length entries stay visible.
pub const MIN_DURATION_MINUTES: i64 = 60;
/// A period covering more than this much of the day goes to the all-day band.
pub const ALL_DAY_THRESHOLD_MINUTES: i64 = 23 * 60;
const DAY_MINUTES: i64 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusterStrategy {
    /// One pass in input order. Each unclaimed schedule claims every unclaimed
    /// schedule it overlaps directly; overlap is not followed transitively.
    #[default]
    ScanOrder,
    /// Connected components of the overlap graph.
    TransitiveClosure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutOptions {
    pub strategy: ClusterStrategy,
}

/// Closed interval used for the overlap test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpan {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeSpan {
    pub fn overlaps(&self, other: &TimeSpan) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedSchedule<'a> {
    pub schedule: &'a Schedule,
    /// Minutes from midnight of the rendered day, within `0..=1440`.
    pub start_offset_minutes: i64,
    /// At least [`MIN_DURATION_MINUTES`].
    pub duration_minutes: i64,
    pub collision: TimeSpan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayLayout<'a> {
    pub day: DayInt,
    /// In input order.
    pub all_day: Vec<&'a Schedule>,
    pub unique: Vec<PlacedSchedule<'a>>,
    /// Each cluster holds two or more schedules, in input order.
    pub clusters: Vec<Vec<PlacedSchedule<'a>>>,
    /// Earliest all-day schedule if there is one, else the earliest timed one.
    pub first: Option<&'a Schedule>,
}

impl<'a> DayLayout<'a> {
    /// Every timed entry, standalone rows first.
    pub fn timed(&self) -> impl Iterator<Item = &PlacedSchedule<'a>> {
        self.unique.iter().chain(self.clusters.iter().flatten())
    }

    pub fn is_empty(&self) -> bool {
        self.all_day.is_empty() && self.unique.is_empty() && self.clusters.is_empty()
    }

    /// The earliest timed entry starting at or after `now`.
    pub fn first_remaining(&self, now: NaiveDateTime) -> Option<&PlacedSchedule<'a>> {
        let day_start = self.day.start();
        self.timed()
            .filter(|placed| day_start + Duration::minutes(placed.start_offset_minutes) >= now)
            .fold(None, |best: Option<&PlacedSchedule<'a>>, candidate| match best {
                Some(current) if current.start_offset_minutes <= candidate.start_offset_minutes => {
                    Some(current)
                }
                _ => Some(candidate),
            })
    }
}

pub fn build_day_layout<'a>(
    schedules: &[&'a Schedule],
    day: DayInt,
    options: LayoutOptions,
) -> DayLayout<'a> {
    let day_start = day.start();
    let day_end = day_start + Duration::days(1);

    let mut all_day: Vec<&'a Schedule> = Vec::new();
    let mut placed: Vec<PlacedSchedule<'a>> = Vec::new();
    for &schedule in schedules {
        if is_all_day(schedule.time(), day_start, day_end) {
            all_day.push(schedule);
        } else {
            placed.push(place(schedule, day_start, day_end));
        }
    }

    let groups = match options.strategy {
        ClusterStrategy::ScanOrder => scan_order_groups(&placed),
        ClusterStrategy::TransitiveClosure => transitive_groups(&placed),
    };

    let mut unique = Vec::new();
    let mut clusters = Vec::new();
    for group in groups {
        if let [single] = group.as_slice() {
            unique.push(placed[*single]);
        } else {
            clusters.push(group.iter().map(|index| placed[*index]).collect());
        }
    }

    let first = crate::ordering::first_of(all_day.iter().copied()).or_else(|| {
        placed
            .iter()
            .fold(None, |best: Option<&PlacedSchedule<'a>>, candidate| match best {
                Some(current) if current.start_offset_minutes <= candidate.start_offset_minutes => {
                    Some(current)
                }
                _ => Some(candidate),
            })
            .map(|entry| entry.schedule)
    });

    DayLayout {
        day,
        all_day,
        unique,
        clusters,
        first,
    }
}

fn clamp_to_day(
    start: NaiveDateTime,
    end: NaiveDateTime,
    day_start: NaiveDateTime,
    day_end: NaiveDateTime,
) -> (NaiveDateTime, NaiveDateTime) {
    (start.max(day_start), end.min(day_end))
}

fn is_all_day(time: &DateType, day_start: NaiveDateTime, day_end: NaiveDateTime) -> bool {
    match time {
        DateType::Period { start, end } => {
            let (covered_start, covered_end) = clamp_to_day(*start, *end, day_start, day_end);
            covered_end - covered_start > Duration::minutes(ALL_DAY_THRESHOLD_MINUTES)
        }
        DateType::Spot { .. } | DateType::Cycle { .. } => false,
    }
}

fn place<'a>(
    schedule: &'a Schedule,
    day_start: NaiveDateTime,
    day_end: NaiveDateTime,
) -> PlacedSchedule<'a> {
    let radius = Duration::minutes(COLLISION_RADIUS_MINUTES);
    let (shown_start, shown_end, collision) = match schedule.time() {
        DateType::Spot { at } => (
            *at,
            *at,
            TimeSpan {
                start: *at - radius,
                end: *at + radius,
            },
        ),
        DateType::Period { start, end } => {
            let (covered_start, covered_end) = clamp_to_day(*start, *end, day_start, day_end);
            (
                covered_start,
                covered_end,
                TimeSpan {
                    start: covered_start,
                    end: covered_end,
                },
            )
        }
        DateType::Cycle { anchor, .. } => {
            let on_day = day_start.date().and_time(anchor.time());
            (
                on_day,
                on_day,
                TimeSpan {
                    start: on_day - radius,
                    end: on_day + radius,
                },
            )
        }
    };

    let start_offset_minutes = (shown_start - day_start).num_minutes().clamp(0, DAY_MINUTES);
    let duration_minutes = (shown_end - shown_start)
        .num_minutes()
        .max(MIN_DURATION_MINUTES);
    PlacedSchedule {
        schedule,
        start_offset_minutes,
        duration_minutes,
        collision,
    }
}

fn scan_order_groups(placed: &[PlacedSchedule<'_>]) -> Vec<Vec<usize>> {
    let mut claimed = vec![false; placed.len()];
    let mut groups = Vec::new();
    for index in 0..placed.len() {
        if claimed[index] {
            continue;
        }
        let members: Vec<usize> = (0..placed.len())
            .filter(|other| {
                !claimed[*other] && placed[index].collision.overlaps(&placed[*other].collision)
            })
            .collect();
        for member in &members {
            claimed[*member] = true;
        }
        groups.push(members);
    }
    groups
}

fn transitive_groups(placed: &[PlacedSchedule<'_>]) -> Vec<Vec<usize>> {
    let mut claimed = vec![false; placed.len()];
    let mut groups = Vec::new();
    for seed in 0..placed.len() {
        if claimed[seed] {
            continue;
        }
        claimed[seed] = true;
        let mut members = vec![seed];
        let mut frontier = VecDeque::from([seed]);
        while let Some(current) = frontier.pop_front() {
            for other in 0..placed.len() {
                if !claimed[other] && placed[current].collision.overlaps(&placed[other].collision) {
                    claimed[other] = true;
                    members.push(other);
                    frontier.push_back(other);
                }
            }
        }
        members.sort_unstable();
        groups.push(members);
    }
    groups
}
