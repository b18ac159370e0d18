use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

use super::aggregate::{DailySummary, MonthlyAggregate, YearMonth};

/// Pay multipliers handed to the spreadsheet renderer. No amounts are computed here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RateSettings {
    pub regular_hour_rate: f64,
    pub extra_hour_multiplier: f64,
    pub weekend_multiplier: f64,
    pub night_multiplier: f64,
}

impl Default for RateSettings {
    fn default() -> Self {
        Self {
            regular_hour_rate: 1.0,
            extra_hour_multiplier: 1.25,
            weekend_multiplier: 1.5,
            night_multiplier: 1.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ExportSession {
    #[schema(value_type = String, format = "date-time")]
    pub start: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub end: DateTime<Utc>,
    pub total_hours: f64,
    pub regular_hours: f64,
    pub overtime_hours: f64,
    pub weekend_hours: f64,
    pub night_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EmployeeExport {
    pub employee_id: String,
    pub employee_name: String,
    pub sessions: Vec<ExportSession>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OvertimeExport {
    #[schema(value_type = String, example = "2025-03")]
    pub period: YearMonth,
    /// Employee the report was narrowed to, if any
    pub employee_filter: Option<String>,
    pub rates: RateSettings,
    pub employees: Vec<EmployeeExport>,
}

/// Working days start at 08:00 local in the exported sheet.
fn day_start() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN)
}

/// Shapes an aggregate into the renderer's input: one synthetic session per
/// day row, grouped per employee in first-seen order, days ascending.
pub fn build_export(
    aggregate: &MonthlyAggregate,
    employee_filter: Option<String>,
    rates: RateSettings,
    offset: FixedOffset,
) -> OvertimeExport {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut employees: Vec<(EmployeeExport, Vec<&DailySummary>)> = Vec::new();

    for day in &aggregate.summaries {
        let slot = *index.entry(day.employee_id.as_str()).or_insert_with(|| {
            employees.push((
                EmployeeExport {
                    employee_id: day.employee_id.clone(),
                    employee_name: day.employee_name.clone(),
                    sessions: Vec::new(),
                },
                Vec::new(),
            ));
            employees.len() - 1
        });
        employees[slot].1.push(day);
    }

    let employees = employees
        .into_iter()
        .map(|(mut export, mut days)| {
            days.sort_by_key(|d| d.date);
            export.sessions = days.into_iter().map(|d| synthetic_session(d, offset)).collect();
            export
        })
        .collect();

    OvertimeExport {
        period: aggregate.month,
        employee_filter,
        rates,
        employees,
    }
}

fn synthetic_session(day: &DailySummary, offset: FixedOffset) -> ExportSession {
    let local_start = day.date.and_time(day_start());
    let start = offset
        .from_local_datetime(&local_start)
        .single()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&local_start));

    ExportSession {
        start,
        end: start + Duration::milliseconds((day.total_minutes * 60_000.0).round() as i64),
        total_hours: day.total_hours,
        regular_hours: day.regular_hours,
        overtime_hours: day.overtime_hours,
        weekend_hours: 0.0,
        night_hours: 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::EngineSettings;
    use crate::attendance::aggregate::{AggregateFilter, aggregate_month};
    use crate::attendance::session::tests::punch;
    use crate::model::punch::PunchKind::{Entrance, Exit};

    #[test]
    fn one_session_per_day_grouped_by_employee() {
        let punches = vec![
            punch("E1", Entrance, "2025-03-03T08:00:00"),
            punch("E1", Exit, "2025-03-03T17:30:00"),
            punch("E2", Entrance, "2025-03-04T09:00:00"),
            punch("E2", Exit, "2025-03-04T13:00:00"),
            punch("E1", Entrance, "2025-03-05T08:00:00"),
            punch("E1", Exit, "2025-03-05T16:00:00"),
        ];
        let month = YearMonth::new(2025, 3).unwrap();
        let aggregate = aggregate_month(
            &punches,
            month,
            &AggregateFilter::default(),
            &EngineSettings::default(),
            &HashMap::new(),
        );

        let export = build_export(&aggregate, None, RateSettings::default(), FixedOffset::east_opt(0).unwrap());

        assert_eq!(export.period, month);
        let ids: Vec<_> = export.employees.iter().map(|e| e.employee_id.as_str()).collect();
        // rows are newest first: E1 (5th), E2 (4th)
        assert_eq!(ids, vec!["E1", "E2"]);

        let e1 = &export.employees[0];
        assert_eq!(e1.sessions.len(), 2);
        let first = &e1.sessions[0];
        assert_eq!(first.start, Utc.with_ymd_and_hms(2025, 3, 3, 8, 0, 0).unwrap());
        assert_eq!(first.end, Utc.with_ymd_and_hms(2025, 3, 3, 17, 30, 0).unwrap());
        assert_eq!(first.overtime_hours, 1.5);
        assert_eq!(first.weekend_hours, 0.0);
    }

    #[test]
    fn default_rates() {
        let rates = RateSettings::default();
        assert_eq!(rates.extra_hour_multiplier, 1.25);
        assert_eq!(rates.weekend_multiplier, 1.5);
        assert_eq!(rates.night_multiplier, 1.2);
    }
}
