//! Chronological ordering across the three time shapes.
//!
//! Each schedule is reduced to one instant (spot time, period start, cycle
//! anchor). Equal instants compare equal; sorts are stable so ties keep their
//! incoming order.

use std::cmp::Ordering;

use crate::schedule::Schedule;

pub fn compare(a: &Schedule, b: &Schedule) -> Ordering {
    a.comparison_instant().cmp(&b.comparison_instant())
}

pub fn sort_chronologically(schedules: &mut [Schedule]) {
    schedules.sort_by(compare);
}

pub fn sort_refs_chronologically(schedules: &mut [&Schedule]) {
    schedules.sort_by(|a, b| compare(a, b));
}

/// The earliest schedule, first one wins on ties.
pub fn first_of<'a>(schedules: impl IntoIterator<Item = &'a Schedule>) -> Option<&'a Schedule> {
    schedules.into_iter().fold(None, |best, candidate| match best {
        Some(current) if compare(candidate, current) != Ordering::Less => Some(current),
        _ => Some(candidate),
    })
}
