use serde::Serialize;
use utoipa::ToSchema;

/// Regular working day: 8 hours.
pub const DEFAULT_DAILY_THRESHOLD_MINUTES: i64 = 480;

/// Split of one day's worked minutes. Minutes keep their fractional part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct Buckets {
    pub regular_minutes: f64,
    pub overtime_minutes: f64,
}

impl Buckets {
    pub fn total_minutes(&self) -> f64 {
        self.regular_minutes + self.overtime_minutes
    }
}

/// Splits a day total into regular time (up to the threshold) and overtime.
///
/// Negative totals and thresholds are clamped to zero, so the call cannot fail.
pub fn bucket(total_minutes: f64, threshold_minutes: i64) -> Buckets {
    let total = total_minutes.max(0.0);
    let threshold = threshold_minutes.max(0) as f64;

    Buckets {
        regular_minutes: total.min(threshold),
        overtime_minutes: (total - threshold).max(0.0),
    }
}

/// Minutes as hours, rounded to 2 decimals.
pub fn minutes_to_hours(minutes: f64) -> f64 {
    round2(minutes / 60.0)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
