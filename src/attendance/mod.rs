//! Attendance engine: punches in, sessions and overtime figures out.
//!
//! `session` pairs punches into day-bounded sessions, `bucket` splits a day
//! into regular and overtime minutes, `aggregate` builds the monthly view.

pub mod aggregate;
pub mod bucket;
pub mod export;
pub mod service;
pub mod session;
pub mod snapshot;
pub mod today;

use chrono::{FixedOffset, Offset, Utc};

use crate::config::Config;
use bucket::DEFAULT_DAILY_THRESHOLD_MINUTES;

/// Knobs shared by every engine computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub threshold_minutes: i64,
    /// Offset used to decide which calendar day a punch belongs to
    pub offset: FixedOffset,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            threshold_minutes: DEFAULT_DAILY_THRESHOLD_MINUTES,
            offset: utc_offset(0),
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            threshold_minutes: config.daily_threshold_minutes,
            offset: utc_offset(config.utc_offset_minutes),
        }
    }
}

/// Out-of-range offsets fall back to UTC.
pub fn utc_offset(minutes: i32) -> FixedOffset {
    FixedOffset::east_opt(minutes.saturating_mul(60))
        .unwrap_or_else(|| Utc.fix())
}
