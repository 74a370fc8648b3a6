//! Calendar arithmetic shared by the store, the layout engine and the alarm policy.

use std::fmt;
use std::ops::RangeInclusive;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Years a [`DayInt`] can encode. `YYYYMMDD` has no room for a sign or a fifth
/// year digit.
pub const KEY_YEARS: RangeInclusive<i32> = 0..=9999;

/// A calendar day encoded as `YYYYMMDD`, for years within [`KEY_YEARS`].
///
/// Used as the key of the by-day index and as the completion key of ranged and
/// recurring schedules. Ordering follows the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct DayInt(NaiveDate);

impl DayInt {
    /// Panics when the year of `date` is outside [`KEY_YEARS`].
    pub fn from_date(date: NaiveDate) -> Self {
        match Self::checked(date) {
            Some(day) => day,
            None => panic!("date {date} outside the YYYYMMDD year range"),
        }
    }

    /// Decodes a `YYYYMMDD` integer. Returns `None` for integers that do not name
    /// a calendar day, e.g. `20230230`.
    pub fn from_raw(raw: u32) -> Option<Self> {
        let year = i32::try_from(raw / 10_000).ok()?;
        let month = (raw / 100) % 100;
        let day = raw % 100;
        Self::from_ymd(year, month, day)
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).and_then(Self::checked)
    }

    fn checked(date: NaiveDate) -> Option<Self> {
        KEY_YEARS.contains(&date.year()).then_some(Self(date))
    }

    pub fn value(self) -> u32 {
        self.0.year() as u32 * 10_000 + self.0.month() * 100 + self.0.day()
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }

    /// Midnight at the start of the day.
    pub fn start(self) -> NaiveDateTime {
        self.0.and_time(NaiveTime::MIN)
    }

    /// 1 = Sunday .. 7 = Saturday.
    pub fn weekday_number(self) -> u8 {
        weekday_number(self.0)
    }

    pub fn day_of_month(self) -> u8 {
        self.0.day() as u8
    }

    /// The next day, or `None` past the last encodable day.
    pub fn succ(self) -> Option<Self> {
        self.0.succ_opt().and_then(Self::checked)
    }

    /// The previous day, or `None` before the first encodable day.
    pub fn pred(self) -> Option<Self> {
        self.0.pred_opt().and_then(Self::checked)
    }
}

impl From<NaiveDate> for DayInt {
    fn from(date: NaiveDate) -> Self {
        Self::from_date(date)
    }
}

impl From<NaiveDateTime> for DayInt {
    fn from(instant: NaiveDateTime) -> Self {
        Self::from_date(instant.date())
    }
}

impl From<DayInt> for u32 {
    fn from(day: DayInt) -> Self {
        day.value()
    }
}

impl TryFrom<u32> for DayInt {
    type Error = String;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        DayInt::from_raw(raw).ok_or_else(|| format!("{raw} is not a YYYYMMDD calendar day"))
    }
}

impl fmt::Display for DayInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// 1 = Sunday .. 7 = Saturday.
pub fn weekday_number(date: NaiveDate) -> u8 {
    date.weekday().number_from_sunday() as u8
}

/// Soonest instant strictly after `after` whose weekday is `weekday`
/// (1 = Sunday .. 7 = Saturday), keeping the time of day of `after`.
pub fn next_matching_weekday(after: NaiveDateTime, weekday: u8) -> NaiveDateTime {
    assert!(
        (1..=7).contains(&weekday),
        "weekday {weekday} outside 1..=7"
    );
    let current = i64::from(weekday_number(after.date()));
    let mut delta = (i64::from(weekday) - current).rem_euclid(7);
    if delta == 0 {
        delta = 7;
    }
    after + Duration::days(delta)
}

/// Soonest instant strictly after `after` falling on day `day` of a month,
/// keeping the time of day of `after`. Months too short for `day` are skipped,
/// so day 31 after January 31st lands on March 31st.
pub fn next_matching_day_of_month(after: NaiveDateTime, day: u8) -> NaiveDateTime {
    assert!((1..=31).contains(&day), "day of month {day} outside 1..=31");
    let day = u32::from(day);
    let mut year = after.year();
    let mut month = after.month();
    if after.day() < day {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return date.and_time(after.time());
        }
    }
    loop {
        if month == 12 {
            year += 1;
            month = 1;
        } else {
            month += 1;
        }
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return date.and_time(after.time());
        }
    }
}

pub fn start_of_day(instant: NaiveDateTime) -> NaiveDateTime {
    instant.date().and_time(NaiveTime::MIN)
}

pub fn is_same_day(a: NaiveDateTime, b: NaiveDateTime) -> bool {
    a.date() == b.date()
}

/// Every day from `from` to `to`, both included. Empty when `from > to`.
pub fn days_inclusive(from: DayInt, to: DayInt) -> impl Iterator<Item = DayInt> {
    let last = to.date();
    from.date()
        .iter_days()
        .take_while(move |date| *date <= last)
        .map(DayInt)
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => panic!("month {month} outside 1..=12"),
    }
}

pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn day_int_encodes_and_decodes() {
        let day = DayInt::from_ymd(2024, 3, 1).unwrap();
        assert_eq!(day.value(), 20240301);
        assert_eq!(DayInt::from_raw(20240301), Some(day));
        assert_eq!(DayInt::from_raw(20230230), None);
        assert_eq!(DayInt::from_raw(20241301), None);
        assert_eq!(day.to_string(), "20240301");
    }

    #[test]
    fn day_int_orders_by_calendar() {
        let a = DayInt::from_ymd(2023, 12, 31).unwrap();
        let b = DayInt::from_ymd(2024, 1, 1).unwrap();
        assert!(a < b);
        assert_eq!(a.succ(), Some(b));
        assert_eq!(b.pred(), Some(a));
    }

    #[test]
    fn day_int_covers_only_four_digit_years() {
        let first = DayInt::from_ymd(0, 1, 1).unwrap();
        let last = DayInt::from_ymd(9999, 12, 31).unwrap();
        assert_eq!(first.value(), 101);
        assert_eq!(DayInt::from_raw(first.value()), Some(first));
        assert_eq!(DayInt::from_raw(last.value()), Some(last));
        assert_eq!(first.pred(), None);
        assert_eq!(last.succ(), None);
        assert_eq!(DayInt::from_ymd(-1, 12, 31), None);
        assert_eq!(DayInt::from_ymd(10000, 1, 1), None);
        assert_eq!(DayInt::from_raw(100000101), None);
    }

    #[test]
    #[should_panic(expected = "outside the YYYYMMDD year range")]
    fn negative_year_is_not_a_day_key() {
        let _ = DayInt::from(NaiveDate::from_ymd_opt(-44, 3, 15).unwrap());
    }

    #[test]
    fn day_int_serializes_as_integer() {
        let day = DayInt::from_ymd(2024, 1, 2).unwrap();
        assert_eq!(serde_json::to_string(&day).unwrap(), "20240102");
        let parsed: DayInt = serde_json::from_str("20240102").unwrap();
        assert_eq!(parsed, day);
        assert!(serde_json::from_str::<DayInt>("20240230").is_err());
    }

    #[test]
    fn weekday_numbers_start_on_sunday() {
        // 2024-01-01 was a Monday.
        assert_eq!(DayInt::from_ymd(2024, 1, 1).unwrap().weekday_number(), 2);
        assert_eq!(DayInt::from_ymd(2023, 12, 31).unwrap().weekday_number(), 1);
        assert_eq!(DayInt::from_ymd(2024, 1, 6).unwrap().weekday_number(), 7);
    }

    #[test]
    fn next_weekday_is_strictly_after_anchor() {
        let monday = at(2024, 1, 1, 9, 30);
        assert_eq!(next_matching_weekday(monday, 3), at(2024, 1, 2, 9, 30));
        assert_eq!(next_matching_weekday(monday, 2), at(2024, 1, 8, 9, 30));
        assert_eq!(next_matching_weekday(monday, 1), at(2024, 1, 7, 9, 30));
    }

    #[test]
    fn next_day_of_month_skips_short_months() {
        assert_eq!(
            next_matching_day_of_month(at(2024, 1, 31, 8, 0), 31),
            at(2024, 3, 31, 8, 0)
        );
        assert_eq!(
            next_matching_day_of_month(at(2024, 4, 10, 8, 0), 31),
            at(2024, 5, 31, 8, 0)
        );
        assert_eq!(
            next_matching_day_of_month(at(2023, 2, 1, 7, 15), 29),
            at(2023, 3, 29, 7, 15)
        );
        assert_eq!(
            next_matching_day_of_month(at(2024, 2, 1, 7, 15), 29),
            at(2024, 2, 29, 7, 15)
        );
        assert_eq!(
            next_matching_day_of_month(at(2024, 12, 15, 0, 0), 5),
            at(2025, 1, 5, 0, 0)
        );
    }

    #[test]
    fn next_day_of_month_same_day_rolls_forward() {
        assert_eq!(
            next_matching_day_of_month(at(2024, 6, 5, 12, 0), 5),
            at(2024, 7, 5, 12, 0)
        );
    }

    #[test]
    fn month_lengths_follow_leap_rules() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(2024, 4), 30);
        assert_eq!(days_in_month(2024, 12), 31);
    }

    #[test]
    fn inclusive_day_range() {
        let from = DayInt::from_ymd(2024, 2, 27).unwrap();
        let to = DayInt::from_ymd(2024, 3, 1).unwrap();
        let days: Vec<u32> = days_inclusive(from, to).map(DayInt::value).collect();
        assert_eq!(days, vec![20240227, 20240228, 20240229, 20240301]);
        assert_eq!(days_inclusive(to, from).count(), 0);
    }

    #[test]
    fn start_of_day_and_same_day() {
        let instant = at(2024, 5, 5, 17, 45);
        assert_eq!(start_of_day(instant), at(2024, 5, 5, 0, 0));
        assert!(is_same_day(instant, at(2024, 5, 5, 0, 1)));
        assert!(!is_same_day(instant, at(2024, 5, 6, 0, 0)));
    }
}
