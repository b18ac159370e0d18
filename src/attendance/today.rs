use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::EngineSettings;
use super::session::{Sessions, local_date};
use crate::model::punch::{Punch, PunchKind};

/// Progress of the current work day, as shown on the employee's clock page.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TodayProgress {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    /// Whole minutes elapsed; seconds carry over between sessions
    pub worked_minutes: i64,
    pub target_minutes: i64,
    /// 0..=100
    pub progress_percent: u8,
    /// Start of the session still running, if clocked in
    #[schema(value_type = Option<String>, format = "date-time")]
    pub open_since: Option<DateTime<Utc>>,
}

/// Minutes worked today, counting a still-open entrance up to `now`.
pub fn worked_today(punches: Vec<Punch>, now: DateTime<Utc>, settings: &EngineSettings) -> TodayProgress {
    let today = local_date(now, settings.offset);
    let todays: Vec<Punch> = punches
        .into_iter()
        .filter(|p| local_date(p.timestamp, settings.offset) == today)
        .collect();

    let mut sessions = Sessions::new(todays, settings.offset);
    let closed: f64 = sessions.by_ref().map(|s| s.worked_minutes).sum();

    let open_since = sessions.open_entrance().map(|p| p.timestamp);
    let running = open_since
        .map(|since| (now - since).num_milliseconds().max(0) as f64 / 60_000.0)
        .unwrap_or(0.0);

    let exact = closed + running;
    let target_minutes = settings.threshold_minutes;

    TodayProgress {
        date: today,
        worked_minutes: exact.floor() as i64,
        target_minutes,
        progress_percent: progress(exact, target_minutes),
        open_since,
    }
}

fn progress(worked: f64, target: i64) -> u8 {
    if target <= 0 {
        return if worked > 0.0 { 100 } else { 0 };
    }
    let pct = (worked / target as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Kind the next card read should record: an exit only while clocked in.
pub fn next_punch_kind(last: Option<&Punch>) -> PunchKind {
    match last.map(|p| p.kind) {
        Some(PunchKind::Entrance) => PunchKind::Exit,
        Some(PunchKind::Exit) | None => PunchKind::Entrance,
    }
}
