use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use schedule_core::{
    AlarmRequest, AlarmScheduler, Clock, ClusterStrategy, DayInt, DayLayout, LayoutOptions,
    OccurrenceStore, PlacedSchedule, Schedule, StaticPermission, StoreSnapshot, SystemClock,
};
use tracing::{debug, info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub(crate) snapshot_path: Option<PathBuf>,
    pub(crate) span_days: usize,
    pub(crate) start_offset_days: i64,
    pub(crate) alarms_permitted: bool,
    pub(crate) cluster_strategy: ClusterStrategy,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(path) = lookup("PLANNER_FILE") {
            if !path.trim().is_empty() {
                config.snapshot_path = Some(PathBuf::from(path.trim()));
            }
        }
        if let Some(span) = lookup("PLANNER_SPAN_DAYS") {
            match span.trim().parse::<usize>() {
                Ok(value) if value > 0 => config.span_days = value,
                _ => warn!(value = %span, "ignoring invalid PLANNER_SPAN_DAYS"),
            }
        }
        if let Some(offset) = lookup("PLANNER_START_OFFSET_DAYS") {
            match offset.trim().parse::<i64>() {
                Ok(value) => config.start_offset_days = value,
                Err(_) => warn!(value = %offset, "ignoring invalid PLANNER_START_OFFSET_DAYS"),
            }
        }
        if let Some(flag) = lookup("PLANNER_ALARMS_PERMITTED") {
            match parse_flag(&flag) {
                Some(value) => config.alarms_permitted = value,
                None => warn!(value = %flag, "ignoring invalid PLANNER_ALARMS_PERMITTED"),
            }
        }
        if let Some(flag) = lookup("PLANNER_TRANSITIVE_CLUSTERS") {
            match parse_flag(&flag) {
                Some(true) => config.cluster_strategy = ClusterStrategy::TransitiveClosure,
                Some(false) => config.cluster_strategy = ClusterStrategy::ScanOrder,
                None => warn!(value = %flag, "ignoring invalid PLANNER_TRANSITIVE_CLUSTERS"),
            }
        }
        config
    }

    fn layout_options(&self) -> LayoutOptions {
        LayoutOptions {
            strategy: self.cluster_strategy,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            span_days: 7,
            start_offset_days: 0,
            alarms_permitted: false,
            cluster_strategy: ClusterStrategy::ScanOrder,
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Stands in for a platform notification service.
#[derive(Debug, Default)]
pub struct LoggingAlarmScheduler;

impl AlarmScheduler for LoggingAlarmScheduler {
    fn schedule(&self, request: AlarmRequest) {
        info!(
            id = %request.schedule_id,
            title = %request.title,
            triggers = request.triggers.len(),
            "alarm scheduled"
        );
    }

    fn cancel(&self, schedule: &Schedule) {
        info!(id = %schedule.id(), title = %schedule.title(), "alarm cancelled");
    }
}

pub fn run(config: AppConfig) -> Result<()> {
    let store = load_store(&config, Box::new(SystemClock))?;
    info!(schedules = store.len(), span = config.span_days, "planner ready");
    print!("{}", render_agenda(&store, &config));
    Ok(())
}

/// Builds a store from the configured snapshot. A missing file yields an empty store.
pub fn load_store(config: &AppConfig, clock: Box<dyn Clock>) -> Result<OccurrenceStore> {
    let mut store = OccurrenceStore::builder()
        .with_alarm_permission(Box::new(StaticPermission(config.alarms_permitted)))
        .with_alarm_scheduler(Box::new(LoggingAlarmScheduler))
        .with_clock(clock)
        .build();

    let Some(path) = &config.snapshot_path else {
        debug!("no snapshot configured");
        return Ok(store);
    };
    if !path.exists() {
        info!(path = %path.display(), "snapshot not found, starting empty");
        return Ok(store);
    }
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let snapshot = StoreSnapshot::from_json(&raw)
        .with_context(|| format!("failed to decode snapshot {}", path.display()))?;
    store
        .restore(snapshot)
        .with_context(|| format!("failed to restore snapshot {}", path.display()))?;
    Ok(store)
}

pub fn save_store(store: &OccurrenceStore, path: &Path) -> Result<()> {
    let raw = store.snapshot().to_json().context("failed to encode snapshot")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, raw).with_context(|| format!("failed to write snapshot {}", path.display()))?;
    info!(path = %path.display(), schedules = store.len(), "snapshot saved");
    Ok(())
}

pub fn render_agenda(store: &OccurrenceStore, config: &AppConfig) -> String {
    let today = store.today();
    let first_day = today.date() + Duration::days(config.start_offset_days);
    let mut out = String::new();
    for offset in 0..config.span_days {
        let date = first_day + Duration::days(offset as i64);
        let day = DayInt::from_date(date);
        let layout = store.day_layout(day, config.layout_options());
        out.push_str(&format!("{}\n", format_day_heading(date, today.date())));
        if let Some(sticker) = store.stickers().get(day) {
            out.push_str(&format!("  [{sticker}]\n"));
        }
        render_day(&mut out, &layout, store, day == today);
        out.push('\n');
    }
    out
}

fn render_day(out: &mut String, layout: &DayLayout<'_>, store: &OccurrenceStore, is_today: bool) {
    if layout.is_empty() {
        out.push_str("  Nothing scheduled\n");
        return;
    }
    let next = if is_today {
        layout.first_remaining(store.now()).map(|entry| entry.schedule.id())
    } else {
        None
    };
    for schedule in &layout.all_day {
        out.push_str(&format!(
            "  all day      {} {}\n",
            done_marker(schedule, layout.day),
            schedule.title()
        ));
    }
    let mut rows: Vec<(&PlacedSchedule<'_>, Option<usize>)> =
        layout.unique.iter().map(|entry| (entry, None)).collect();
    for (index, cluster) in layout.clusters.iter().enumerate() {
        rows.extend(cluster.iter().map(|entry| (entry, Some(index + 1))));
    }
    rows.sort_by_key(|(entry, _)| entry.start_offset_minutes);
    for (entry, cluster) in rows {
        let mut line = format!(
            "  {} {:>4}m {} {}",
            format_offset(entry.start_offset_minutes),
            entry.duration_minutes,
            done_marker(entry.schedule, layout.day),
            entry.schedule.title()
        );
        if let Some(cluster) = cluster {
            line.push_str(&format!(" (overlap {cluster})"));
        }
        if next == Some(entry.schedule.id()) {
            line.push_str(" <- next");
        }
        out.push_str(&line);
        out.push('\n');
    }
}

fn done_marker(schedule: &Schedule, day: DayInt) -> &'static str {
    if schedule.is_done(day) {
        "[x]"
    } else {
        "[ ]"
    }
}

fn format_offset(minutes: i64) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

fn format_day_heading(date: NaiveDate, today: NaiveDate) -> String {
    format!(
        "{} ({})",
        format_relative_label(date, today),
        date.format("%A, %B %d, %Y")
    )
}

fn format_relative_label(date: NaiveDate, today: NaiveDate) -> String {
    match date.signed_duration_since(today).num_days() {
        -1 => "Yesterday".to_string(),
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        d if d < 0 => format!("{} days ago", -d),
        d => format!("In {} days", d),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use schedule_core::{Alarm, CycleFactor, DateType, FixedClock};
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn config_from(pairs: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn config_reads_planner_variables() {
        let config = config_from(&[
            ("PLANNER_FILE", "/tmp/planner.json"),
            ("PLANNER_SPAN_DAYS", "3"),
            ("PLANNER_START_OFFSET_DAYS", "-1"),
            ("PLANNER_ALARMS_PERMITTED", "yes"),
            ("PLANNER_TRANSITIVE_CLUSTERS", "TRUE"),
        ]);
        assert_eq!(config.snapshot_path, Some(PathBuf::from("/tmp/planner.json")));
        assert_eq!(config.span_days, 3);
        assert_eq!(config.start_offset_days, -1);
        assert!(config.alarms_permitted);
        assert_eq!(config.cluster_strategy, ClusterStrategy::TransitiveClosure);
    }

    #[test]
    fn invalid_config_values_fall_back_to_defaults() {
        let config = config_from(&[
            ("PLANNER_FILE", "  "),
            ("PLANNER_SPAN_DAYS", "0"),
            ("PLANNER_START_OFFSET_DAYS", "soon"),
            ("PLANNER_ALARMS_PERMITTED", "maybe"),
        ]);
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn relative_labels() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let shift = |days: i64| today + Duration::days(days);
        assert_eq!(format_relative_label(shift(-3), today), "3 days ago");
        assert_eq!(format_relative_label(shift(-1), today), "Yesterday");
        assert_eq!(format_relative_label(today, today), "Today");
        assert_eq!(format_relative_label(shift(1), today), "Tomorrow");
        assert_eq!(format_relative_label(shift(5), today), "In 5 days");
        assert_eq!(
            format_day_heading(today, today),
            "Today (Sunday, March 10, 2024)"
        );
    }

    #[test]
    fn missing_snapshot_gives_empty_store() {
        let temp = tempdir().unwrap();
        let config = AppConfig {
            snapshot_path: Some(temp.path().join("absent.json")),
            ..AppConfig::default()
        };
        let store = load_store(&config, Box::new(FixedClock(at(2024, 3, 1, 8, 0)))).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_snapshot_reports_path() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("broken.json");
        fs::write(&path, "{ nope").unwrap();
        let config = AppConfig {
            snapshot_path: Some(path),
            ..AppConfig::default()
        };
        let err = load_store(&config, Box::new(SystemClock)).err().unwrap();
        assert!(format!("{err}").contains("failed to decode snapshot"));
    }

    #[test]
    fn saved_store_loads_and_renders() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("planner.json");
        let clock = FixedClock(at(2024, 3, 1, 9, 30));
        let config = AppConfig {
            snapshot_path: Some(path.clone()),
            span_days: 2,
            alarms_permitted: true,
            ..AppConfig::default()
        };

        let mut store = load_store(&config, Box::new(clock)).unwrap();
        store
            .insert(Schedule::new(
                "Planning",
                3,
                DateType::period(at(2024, 3, 1, 9, 0), at(2024, 3, 1, 10, 0)),
            ))
            .unwrap();
        store
            .insert(Schedule::new("Call", 3, DateType::spot(at(2024, 3, 1, 9, 15))))
            .unwrap();
        store
            .insert(
                Schedule::new(
                    "Lunch",
                    1,
                    DateType::cycle(at(2024, 3, 1, 12, 0), CycleFactor::Weekday, [6, 7]),
                )
                .with_alarm(Alarm::Periodic(at(2024, 3, 1, 11, 45))),
            )
            .unwrap();
        store.stickers_mut().set(DayInt::from(at(2024, 3, 2, 0, 0)), "party");
        save_store(&store, &path).unwrap();

        let reloaded = load_store(&config, Box::new(clock)).unwrap();
        assert_eq!(reloaded.len(), 3);
        let text = render_agenda(&reloaded, &config);
        assert!(text.contains("Today (Friday, March 01, 2024)"));
        assert!(text.contains("09:00   60m [ ] Planning (overlap 1)"));
        assert!(text.contains("09:15   60m [ ] Call (overlap 1)"));
        assert!(text.contains("12:00   60m [ ] Lunch <- next"));
        assert!(text.contains("Tomorrow (Saturday, March 02, 2024)\n  [party]\n"));
        assert!(text.contains("12:00   60m [ ] Lunch\n"));
    }
}
