//! Error types for the schedule engine.
//!
//! Only conditions a caller can act on live here. Broken preconditions
//! (unknown ids, invalid priorities, malformed periods) panic at the call
//! site instead.

use thiserror::Error;

use crate::schedule::ScheduleId;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("alarm requested for schedule {id} but alarm permission is not granted")]
    AlarmNotPermitted { id: ScheduleId },

    #[error("schedule {id} spans more than one day and cannot be moved")]
    NotMovable { id: ScheduleId },

    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
