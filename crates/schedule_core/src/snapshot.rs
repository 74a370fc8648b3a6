//! Serializable image of a store, for an external persistence layer.

use serde::{Deserialize, Serialize};

use crate::date_math::DayInt;
use crate::error::ScheduleResult;
use crate::schedule::Schedule;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub version: u32,
    /// In store insertion order.
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub stickers: Vec<(DayInt, String)>,
}

impl StoreSnapshot {
    pub fn to_json(&self) -> ScheduleResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> ScheduleResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl Default for StoreSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            schedules: Vec::new(),
            stickers: Vec::new(),
        }
    }
}
