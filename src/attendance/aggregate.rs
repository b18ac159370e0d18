use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use super::EngineSettings;
use super::bucket::{bucket, minutes_to_hours};
use super::session::{Session, reconstruct_all};
use crate::model::punch::Punch;

/// Label used when neither the punches nor the directory know an employee's name.
pub const UNKNOWN_EMPLOYEE: &str = "Employee";

/// Calendar month a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// `[start, end)` instants of the month at the given offset.
    pub fn utc_range(&self, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
        let at_midnight = |d: NaiveDate| {
            offset
                .from_local_datetime(&d.and_time(chrono::NaiveTime::MIN))
                .single()
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|| Utc.from_utc_datetime(&d.and_time(chrono::NaiveTime::MIN)))
        };
        (at_midnight(self.first_day()), at_midnight(self.next().first_day()))
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    /// Accepts `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("expected YYYY-MM, got {s:?}"))?;
        let year: i32 = year.parse().map_err(|_| format!("invalid year in {s:?}"))?;
        let month: u32 = month.parse().map_err(|_| format!("invalid month in {s:?}"))?;
        YearMonth::new(year, month).ok_or_else(|| format!("month out of range in {s:?}"))
    }
}

impl Serialize for YearMonth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for YearMonth {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One employee's worked, regular and overtime time for one day.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "date": "2025-03-03",
    "employee_id": "E1",
    "employee_name": "Ana Ruiz",
    "total_minutes": 570,
    "regular_minutes": 480,
    "overtime_minutes": 90,
    "total_hours": 9.5,
    "regular_hours": 8.0,
    "overtime_hours": 1.5
}))]
pub struct DailySummary {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub employee_id: String,
    pub employee_name: String,
    pub total_minutes: f64,
    pub regular_minutes: f64,
    pub overtime_minutes: f64,
    pub total_hours: f64,
    pub regular_hours: f64,
    pub overtime_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EmployeeOvertime {
    pub employee_id: String,
    pub employee_name: String,
    pub overtime_minutes: f64,
    pub total_overtime_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DailyOvertime {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub overtime_minutes: f64,
    pub total_overtime_hours: f64,
}

/// Monthly overtime view: day rows plus the KPIs, ranking and chart series.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct MonthlyAggregate {
    #[schema(value_type = String, example = "2025-03")]
    pub month: YearMonth,
    pub summaries: Vec<DailySummary>,
    pub total_overtime_minutes: f64,
    pub total_overtime_hours: f64,
    pub employees_with_overtime: usize,
    pub ranking_by_employee: Vec<EmployeeOvertime>,
    pub daily_overtime_series: Vec<DailyOvertime>,
}

impl MonthlyAggregate {
    pub fn empty(month: YearMonth) -> Self {
        Self {
            month,
            summaries: Vec::new(),
            total_overtime_minutes: 0.0,
            total_overtime_hours: 0.0,
            employees_with_overtime: 0,
            ranking_by_employee: Vec::new(),
            daily_overtime_series: Vec::new(),
        }
    }
}

/// Narrowing applied to a month's day rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateFilter {
    pub employee_id: Option<String>,
    /// Case-insensitive name fragment, or an exact `dd/mm/yyyy` date
    pub text: Option<String>,
}

impl AggregateFilter {
    fn keeps_employee(&self, employee_id: &str) -> bool {
        self.employee_id
            .as_deref()
            .is_none_or(|wanted| wanted == employee_id)
    }

    fn text_query(&self) -> Option<TextQuery> {
        let q = self.text.as_deref()?.trim().to_lowercase();
        if q.is_empty() {
            return None;
        }
        let date = NaiveDate::parse_from_str(&q, "%d/%m/%Y").ok();
        Some(TextQuery { needle: q, date })
    }
}

struct TextQuery {
    needle: String,
    date: Option<NaiveDate>,
}

impl TextQuery {
    fn matches(&self, summary: &DailySummary) -> bool {
        summary.employee_name.to_lowercase().contains(&self.needle)
            || self.date == Some(summary.date)
    }
}

/// One row per (employee, day), in first-seen order.
///
/// Sessions of the same day are summed unrounded before bucketing, so the
/// threshold applies to the exact day total.
pub fn summarize_days<I>(
    sessions: I,
    threshold_minutes: i64,
    names: &HashMap<String, String>,
) -> Vec<DailySummary>
where
    I: IntoIterator<Item = Session>,
{
    let mut index: HashMap<(String, NaiveDate), usize> = HashMap::new();
    let mut days: Vec<(String, NaiveDate, String, f64)> = Vec::new();

    for session in sessions {
        let key = (session.employee_id.clone(), session.date);
        match index.get(&key) {
            Some(&i) => days[i].3 += session.worked_minutes,
            None => {
                index.insert(key, days.len());
                days.push((
                    session.employee_id,
                    session.date,
                    session.employee_name,
                    session.worked_minutes,
                ));
            }
        }
    }

    days.into_iter()
        .map(|(employee_id, date, punch_name, total)| {
            let split = bucket(total, threshold_minutes);
            let employee_name = resolve_name(&employee_id, punch_name, names);
            let total_minutes = split.total_minutes();
            DailySummary {
                date,
                employee_name,
                employee_id,
                total_minutes,
                regular_minutes: split.regular_minutes,
                overtime_minutes: split.overtime_minutes,
                total_hours: minutes_to_hours(total_minutes),
                regular_hours: minutes_to_hours(split.regular_minutes),
                overtime_hours: minutes_to_hours(split.overtime_minutes),
            }
        })
        .collect()
}

fn resolve_name(employee_id: &str, punch_name: String, names: &HashMap<String, String>) -> String {
    if !punch_name.trim().is_empty() {
        return punch_name;
    }
    names
        .get(employee_id)
        .cloned()
        .unwrap_or_else(|| UNKNOWN_EMPLOYEE.to_string())
}

/// Builds the monthly overtime view from a punch snapshot.
///
/// KPIs, ranking and series cover every day row of the selected employees;
/// the text filter only narrows `summaries`.
pub fn aggregate_month(
    punches: &[Punch],
    month: YearMonth,
    filter: &AggregateFilter,
    settings: &EngineSettings,
    names: &HashMap<String, String>,
) -> MonthlyAggregate {
    let selected: Vec<Punch> = punches
        .iter()
        .filter(|p| filter.keeps_employee(&p.employee_id))
        .cloned()
        .collect();
    if selected.is_empty() {
        return MonthlyAggregate::empty(month);
    }

    let sessions = reconstruct_all(&selected, settings.offset)
        .into_iter()
        .filter(|s| month.contains(s.date));

    let mut days = summarize_days(sessions, settings.threshold_minutes, names);
    // newest first; ties keep first-seen order
    days.sort_by(|a, b| b.date.cmp(&a.date));

    let total_overtime_minutes: f64 = days.iter().map(|d| d.overtime_minutes).sum();
    let ranking_by_employee = rank_by_overtime(&days);
    let employees_with_overtime = ranking_by_employee
        .iter()
        .filter(|e| e.overtime_minutes > 0.0)
        .count();
    let daily_overtime_series = overtime_by_day(&days);

    let summaries = match filter.text_query() {
        Some(q) => days.into_iter().filter(|d| q.matches(d)).collect(),
        None => days,
    };

    MonthlyAggregate {
        month,
        summaries,
        total_overtime_minutes,
        total_overtime_hours: minutes_to_hours(total_overtime_minutes),
        employees_with_overtime,
        ranking_by_employee,
        daily_overtime_series,
    }
}

fn rank_by_overtime(days: &[DailySummary]) -> Vec<EmployeeOvertime> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut ranking: Vec<EmployeeOvertime> = Vec::new();

    for day in days {
        match index.get(day.employee_id.as_str()) {
            Some(&i) => ranking[i].overtime_minutes += day.overtime_minutes,
            None => {
                index.insert(&day.employee_id, ranking.len());
                ranking.push(EmployeeOvertime {
                    employee_id: day.employee_id.clone(),
                    employee_name: day.employee_name.clone(),
                    overtime_minutes: day.overtime_minutes,
                    total_overtime_hours: 0.0,
                });
            }
        }
    }

    // stable, so ties keep first-seen order
    ranking.sort_by(|a, b| b.overtime_minutes.total_cmp(&a.overtime_minutes));
    for entry in &mut ranking {
        entry.total_overtime_hours = minutes_to_hours(entry.overtime_minutes);
    }
    ranking
}

fn overtime_by_day(days: &[DailySummary]) -> Vec<DailyOvertime> {
    let mut per_day: std::collections::BTreeMap<NaiveDate, f64> = std::collections::BTreeMap::new();
    for day in days {
        *per_day.entry(day.date).or_default() += day.overtime_minutes;
    }

    per_day
        .into_iter()
        .map(|(date, overtime_minutes)| DailyOvertime {
            date,
            overtime_minutes,
            total_overtime_hours: minutes_to_hours(overtime_minutes),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::session::tests::punch;
    use crate::model::punch::PunchKind::{Entrance, Exit};

    fn march() -> YearMonth {
        YearMonth::new(2025, 3).unwrap()
    }

    fn run(punches: &[Punch], filter: &AggregateFilter) -> MonthlyAggregate {
        aggregate_month(punches, march(), filter, &EngineSettings::default(), &HashMap::new())
    }

    fn worked(employee: &str, day: u32, from: &str, to: &str) -> Vec<Punch> {
        vec![
            punch(employee, Entrance, &format!("2025-03-{day:02}T{from}:00")),
            punch(employee, Exit, &format!("2025-03-{day:02}T{to}:00")),
        ]
    }

    #[test]
    fn single_long_day() {
        let punches = worked("E1", 3, "08:00", "17:30");
        let agg = run(&punches, &AggregateFilter::default());

        assert_eq!(agg.summaries.len(), 1);
        let day = &agg.summaries[0];
        assert_eq!(day.date, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
        assert_eq!(day.employee_id, "E1");
        assert_eq!(day.total_hours, 9.5);
        assert_eq!(day.regular_hours, 8.0);
        assert_eq!(day.overtime_hours, 1.5);

        assert_eq!(agg.ranking_by_employee.len(), 1);
        assert_eq!(agg.ranking_by_employee[0].employee_id, "E1");
        assert_eq!(agg.ranking_by_employee[0].total_overtime_hours, 1.5);

        assert_eq!(agg.daily_overtime_series.len(), 1);
        assert_eq!(agg.daily_overtime_series[0].date, day.date);
        assert_eq!(agg.daily_overtime_series[0].total_overtime_hours, 1.5);

        assert_eq!(agg.total_overtime_hours, 1.5);
        assert_eq!(agg.employees_with_overtime, 1);
    }

    #[test]
    fn threshold_applies_to_day_total() {
        let mut punches = worked("E1", 3, "06:00", "11:00");
        punches.extend(worked("E1", 3, "12:00", "16:00"));
        let agg = run(&punches, &AggregateFilter::default());

        assert_eq!(agg.summaries.len(), 1);
        assert_eq!(agg.summaries[0].total_minutes, 540.0);
        assert_eq!(agg.summaries[0].overtime_minutes, 60.0);
    }

    #[test]
    fn regular_plus_overtime_matches_total() {
        let mut punches = Vec::new();
        for (day, end) in [(3, "16:01"), (4, "17:17"), (5, "19:59"), (6, "12:13"), (7, "16:00")] {
            punches.extend(worked("E1", day, "08:00", end));
        }
        let agg = run(&punches, &AggregateFilter::default());

        assert_eq!(agg.summaries.len(), 5);
        for day in &agg.summaries {
            let diff = (day.regular_hours + day.overtime_hours - day.total_hours).abs();
            assert!(diff <= 0.01 + 1e-9, "{day:?}");
            assert_eq!(day.regular_minutes + day.overtime_minutes, day.total_minutes);
        }
    }

    #[test]
    fn seconds_add_up_across_sessions() {
        // two sessions of 4h00m50s: 8h01m40s in total
        let punches = vec![
            punch("E1", Entrance, "2025-03-03T08:00:00"),
            punch("E1", Exit, "2025-03-03T12:00:50"),
            punch("E1", Entrance, "2025-03-03T13:00:00"),
            punch("E1", Exit, "2025-03-03T17:00:50"),
        ];
        let agg = run(&punches, &AggregateFilter::default());

        let day = &agg.summaries[0];
        assert!((day.total_minutes - (481.0 + 40.0 / 60.0)).abs() < 1e-9);
        assert_eq!(day.regular_minutes, 480.0);
        assert_eq!(day.total_hours, 8.03);
        assert_eq!(day.overtime_hours, 0.03);
        assert_eq!(agg.employees_with_overtime, 1);
        assert_eq!(agg.total_overtime_hours, 0.03);
    }

    #[test]
    fn ranking_orders_by_overtime_descending() {
        let mut punches = worked("A", 3, "08:00", "21:00"); // 5h over
        punches.extend(worked("B", 3, "08:00", "15:00")); // none
        punches.extend(worked("C", 4, "08:00", "18:30")); // 2.5h over
        let agg = run(&punches, &AggregateFilter::default());

        let order: Vec<_> = agg
            .ranking_by_employee
            .iter()
            .map(|e| (e.employee_id.as_str(), e.total_overtime_hours))
            .collect();
        assert_eq!(order, vec![("A", 5.0), ("C", 2.5), ("B", 0.0)]);
        assert_eq!(agg.employees_with_overtime, 2);
    }

    #[test]
    fn ranking_ties_keep_first_seen_order() {
        let mut punches = worked("X", 5, "08:00", "17:00");
        punches.extend(worked("Y", 4, "08:00", "17:00"));
        let agg = run(&punches, &AggregateFilter::default());

        // rows are newest first, so X (5th) is seen before Y (4th)
        let ids: Vec<_> = agg.ranking_by_employee.iter().map(|e| e.employee_id.as_str()).collect();
        assert_eq!(ids, vec!["X", "Y"]);
    }

    #[test]
    fn summaries_newest_first_and_series_ascending() {
        let mut punches = worked("E1", 10, "08:00", "18:00");
        punches.extend(worked("E1", 2, "08:00", "17:00"));
        punches.extend(worked("E2", 10, "08:00", "17:00"));
        let agg = run(&punches, &AggregateFilter::default());

        let dates: Vec<_> = agg.summaries.iter().map(|d| d.date.day()).collect();
        assert_eq!(dates, vec![10, 10, 2]);
        // stable: E1 was seen before E2 for the 10th
        assert_eq!(agg.summaries[0].employee_id, "E1");

        let series: Vec<_> = agg
            .daily_overtime_series
            .iter()
            .map(|p| (p.date.day(), p.overtime_minutes))
            .collect();
        assert_eq!(series, vec![(2, 60.0), (10, 180.0)]);
    }

    #[test]
    fn employee_filter_scopes_everything() {
        let mut punches = worked("E1", 3, "08:00", "18:00");
        punches.extend(worked("E2", 3, "08:00", "20:00"));
        let filter = AggregateFilter {
            employee_id: Some("E1".into()),
            text: None,
        };
        let agg = run(&punches, &filter);

        assert_eq!(agg.summaries.len(), 1);
        assert_eq!(agg.total_overtime_minutes, 120.0);
        assert_eq!(agg.ranking_by_employee.len(), 1);
    }

    #[test]
    fn text_filter_narrows_rows_only() {
        let mut punches = worked("E1", 3, "08:00", "18:00");
        punches.extend(worked("E2", 4, "08:00", "20:00"));

        let by_name = run(
            &punches,
            &AggregateFilter {
                employee_id: None,
                text: Some("  name E2 ".into()),
            },
        );
        assert_eq!(by_name.summaries.len(), 1);
        assert_eq!(by_name.summaries[0].employee_id, "E2");
        assert_eq!(by_name.total_overtime_minutes, 120.0 + 240.0);
        assert_eq!(by_name.ranking_by_employee.len(), 2);

        let by_date = run(
            &punches,
            &AggregateFilter {
                employee_id: None,
                text: Some("03/03/2025".into()),
            },
        );
        assert_eq!(by_date.summaries.len(), 1);
        assert_eq!(by_date.summaries[0].employee_id, "E1");
    }

    #[test]
    fn days_outside_the_month_are_dropped() {
        let mut punches = worked("E1", 3, "08:00", "18:00");
        punches.push(punch("E1", Entrance, "2025-04-01T08:00:00"));
        punches.push(punch("E1", Exit, "2025-04-01T18:00:00"));
        let agg = run(&punches, &AggregateFilter::default());
        assert_eq!(agg.summaries.len(), 1);
    }

    #[test]
    fn empty_snapshot_gives_empty_aggregate() {
        let agg = run(&[], &AggregateFilter::default());
        assert_eq!(agg, MonthlyAggregate::empty(march()));
    }

    #[test]
    fn rerun_is_identical() {
        let mut punches = worked("E1", 3, "08:00", "18:00");
        punches.extend(worked("E2", 3, "08:00", "18:00"));
        punches.extend(worked("E3", 7, "07:00", "19:45"));
        let filter = AggregateFilter {
            employee_id: None,
            text: Some("name".into()),
        };
        assert_eq!(run(&punches, &filter), run(&punches, &filter));
    }

    #[test]
    fn directory_names_fill_blank_punch_names() {
        let mut punches = worked("E9", 3, "08:00", "17:00");
        for p in &mut punches {
            p.employee_name = String::new();
        }
        let names = HashMap::from([("E9".to_string(), "Lucía Gómez".to_string())]);
        let agg = aggregate_month(
            &punches,
            march(),
            &AggregateFilter::default(),
            &EngineSettings::default(),
            &names,
        );
        assert_eq!(agg.summaries[0].employee_name, "Lucía Gómez");

        let anonymous = run(&punches, &AggregateFilter::default());
        assert_eq!(anonymous.summaries[0].employee_name, UNKNOWN_EMPLOYEE);
    }

    #[test]
    fn year_month_parsing_and_range() {
        let ym: YearMonth = "2025-12".parse().unwrap();
        assert_eq!(ym.to_string(), "2025-12");
        assert_eq!(ym.next().to_string(), "2026-01");
        assert!("2025-13".parse::<YearMonth>().is_err());
        assert!("march".parse::<YearMonth>().is_err());

        let offset = FixedOffset::east_opt(3600).unwrap();
        let (from, until) = march().utc_range(offset);
        assert_eq!(from, Utc.with_ymd_and_hms(2025, 2, 28, 23, 0, 0).unwrap());
        assert_eq!(until, Utc.with_ymd_and_hms(2025, 3, 31, 23, 0, 0).unwrap());
    }
}
