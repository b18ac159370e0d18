use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use utoipa::ToSchema;

use super::EngineSettings;
use super::aggregate::{AggregateFilter, MonthlyAggregate, YearMonth, aggregate_month};
use super::session::local_date;
use super::snapshot::SnapshotBoard;
use super::today::{TodayProgress, next_punch_kind, worked_today};
use crate::model::punch::{NewPunch, Punch, PunchKind, PunchSource};
use crate::store::change_feed::{self, ChangeFeed, ChangeOp};
use crate::store::directory::{Directory, RosterEntry};
use crate::store::error::StoreError;
use crate::store::punches::PunchStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Ready,
    /// The store could not be read, or the month has no complete session
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OvertimeReport {
    pub status: ReportStatus,
    pub aggregate: MonthlyAggregate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CardOutcome {
    Recorded(Punch),
    UnknownCard,
    /// Card belongs to an employee who is not active
    InactiveEmployee { employee_name: String },
}

/// One page of the admin punch log.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PunchLog {
    pub items: Vec<Punch>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// Appends a punch and tells subscribers the log changed.
pub async fn record_punch<S: PunchStore>(
    store: &S,
    feed: &ChangeFeed,
    punch: NewPunch,
) -> Result<Punch, StoreError> {
    let stored = store.insert(punch).await?;
    info!(
        employee_id = %stored.employee_id,
        kind = %stored.kind,
        source = %stored.source,
        "Punch recorded"
    );
    feed.publish(change_feed::PUNCHES, ChangeOp::Insert);
    Ok(stored)
}

/// Punch from the employee's own clock page. Without an explicit kind the
/// punch toggles against the employee's last one.
pub async fn punch_manual<S: PunchStore>(
    store: &S,
    feed: &ChangeFeed,
    employee_id: &str,
    employee_name: &str,
    kind: Option<PunchKind>,
    now: DateTime<Utc>,
) -> Result<Punch, StoreError> {
    let kind = match kind {
        Some(k) => k,
        None => next_punch_kind(store.last_for_employee(employee_id).await?.as_ref()),
    };

    record_punch(
        store,
        feed,
        NewPunch {
            employee_id: employee_id.to_string(),
            employee_name: employee_name.to_string(),
            kind,
            timestamp: now,
            source: PunchSource::Manual,
            location: None,
        },
    )
    .await
}

/// Badge read: resolve the holder, toggle entrance/exit.
///
/// `source` tells a wall terminal apart from the admin page's scanner.
pub async fn punch_by_card<S: PunchStore, D: Directory>(
    store: &S,
    directory: &D,
    feed: &ChangeFeed,
    card_id: &str,
    source: PunchSource,
    location: Option<String>,
    now: DateTime<Utc>,
) -> Result<CardOutcome, StoreError> {
    let Some(holder) = directory.find_by_card(card_id).await? else {
        warn!(card_id, "Unrecognised card");
        return Ok(CardOutcome::UnknownCard);
    };
    if !holder.active {
        warn!(card_id, employee_id = %holder.employee_id, "Card of inactive employee");
        return Ok(CardOutcome::InactiveEmployee {
            employee_name: holder.employee_name,
        });
    }

    let last = store.last_for_employee(&holder.employee_id).await?;
    let punch = record_punch(
        store,
        feed,
        NewPunch {
            employee_id: holder.employee_id,
            employee_name: holder.employee_name,
            kind: next_punch_kind(last.as_ref()),
            timestamp: now,
            source,
            location,
        },
    )
    .await?;

    Ok(CardOutcome::Recorded(punch))
}

/// Monthly overtime view over the current snapshot. Never fails: a broken
/// store yields an empty aggregate flagged `NoData`.
pub async fn monthly_overtime<S: PunchStore, D: Directory>(
    board: &SnapshotBoard<S>,
    directory: &D,
    month: YearMonth,
    filter: &AggregateFilter,
    settings: &EngineSettings,
) -> OvertimeReport {
    let snapshot = board.snapshot(month).await;
    if !snapshot.available {
        return OvertimeReport {
            status: ReportStatus::NoData,
            aggregate: MonthlyAggregate::empty(month),
        };
    }

    let names = names_for_unlabelled(&snapshot.punches, directory).await;
    let aggregate = aggregate_month(&snapshot.punches, month, filter, settings, &names);

    let status = if aggregate.ranking_by_employee.is_empty() {
        ReportStatus::NoData
    } else {
        ReportStatus::Ready
    };
    OvertimeReport { status, aggregate }
}

/// Directory names for employees whose punches carry no name.
async fn names_for_unlabelled<D: Directory>(punches: &[Punch], directory: &D) -> HashMap<String, String> {
    let mut names = HashMap::new();
    for punch in punches.iter().filter(|p| p.employee_name.trim().is_empty()) {
        if names.contains_key(&punch.employee_id) {
            continue;
        }
        match directory.display_name(&punch.employee_id).await {
            Ok(Some(name)) => {
                names.insert(punch.employee_id.clone(), name);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, employee_id = %punch.employee_id, "Name lookup failed"),
        }
    }
    names
}

pub async fn today_progress<S: PunchStore>(
    store: &S,
    employee_id: &str,
    now: DateTime<Utc>,
    settings: &EngineSettings,
) -> Result<TodayProgress, StoreError> {
    let today = local_date(now, settings.offset);
    let (from, until) = days_range(today, 1, settings.offset);
    let ids = [employee_id.to_string()];
    let punches = store.fetch_range(Some(&ids), from, until).await?;
    Ok(worked_today(punches, now, settings))
}

/// The employee's punches over the last `days` local days, newest first.
pub async fn recent_punches<S: PunchStore>(
    store: &S,
    employee_id: &str,
    days: u32,
    now: DateTime<Utc>,
    settings: &EngineSettings,
) -> Result<Vec<Punch>, StoreError> {
    let days = days.clamp(1, 92);
    let today = local_date(now, settings.offset);
    let first = today - Duration::days(i64::from(days) - 1);
    let (from, until) = days_range(first, days, settings.offset);

    let ids = [employee_id.to_string()];
    let mut punches = store.fetch_range(Some(&ids), from, until).await?;
    punches.reverse();
    Ok(punches)
}

/// Everyone's punches between two local dates (both included), newest first.
pub async fn punch_log<S: PunchStore>(
    store: &S,
    employee_id: Option<&str>,
    first: NaiveDate,
    last: NaiveDate,
    (page, per_page, offset): (u32, u32, u32),
    settings: &EngineSettings,
) -> Result<PunchLog, StoreError> {
    let days = (last - first).num_days().max(0) + 1;
    let days = u32::try_from(days).unwrap_or(u32::MAX);
    let (from, until) = days_range(first, days, settings.offset);

    let (items, total) = store
        .fetch_page(employee_id, from, until, per_page, offset)
        .await?;
    Ok(PunchLog {
        items,
        total,
        page,
        per_page,
    })
}

/// Active employees without a single punch today, by name.
pub async fn absent_today<S: PunchStore, D: Directory>(
    store: &S,
    directory: &D,
    now: DateTime<Utc>,
    settings: &EngineSettings,
) -> Result<Vec<RosterEntry>, StoreError> {
    let (from, until) = days_range(local_date(now, settings.offset), 1, settings.offset);
    let punched: HashSet<String> = store
        .fetch_range(None, from, until)
        .await?
        .into_iter()
        .map(|p| p.employee_id)
        .collect();

    Ok(directory
        .roster()
        .await?
        .into_iter()
        .filter(|e| e.active && !punched.contains(&e.employee_id))
        .collect())
}

/// `[start, end)` instants covering `days` local days from `first`.
fn days_range(first: NaiveDate, days: u32, offset: FixedOffset) -> (DateTime<Utc>, DateTime<Utc>) {
    let local = first.and_time(NaiveTime::MIN);
    let from = offset
        .from_local_datetime(&local)
        .single()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&local));
    (from, from + Duration::days(i64::from(days)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::session::tests::punch;
    use crate::model::punch::PunchKind::{Entrance, Exit};
    use crate::store::memory::{MemoryDirectory, MemoryPunchStore};
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn march() -> YearMonth {
        YearMonth::new(2025, 3).unwrap()
    }

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, day, h, m, 0).unwrap()
    }

    #[actix_web::test]
    async fn month_report_end_to_end() {
        let store = MemoryPunchStore::with_punches(vec![
            punch("E1", Entrance, "2025-03-03T08:00:00"),
            punch("E1", Exit, "2025-03-03T17:30:00"),
        ]);
        let board = SnapshotBoard::new(store, FixedOffset::east_opt(0).unwrap());

        let report = monthly_overtime(
            &board,
            &MemoryDirectory::default(),
            march(),
            &AggregateFilter::default(),
            &EngineSettings::default(),
        )
        .await;

        assert_eq!(report.status, ReportStatus::Ready);
        let day = &report.aggregate.summaries[0];
        assert_eq!((day.total_hours, day.regular_hours, day.overtime_hours), (9.5, 8.0, 1.5));
        assert_eq!(report.aggregate.ranking_by_employee[0].employee_id, "E1");
        assert_eq!(report.aggregate.daily_overtime_series[0].total_overtime_hours, 1.5);
    }

    #[actix_web::test]
    async fn broken_store_gives_no_data() {
        let store = MemoryPunchStore::with_punches(vec![punch("E1", Entrance, "2025-03-03T08:00:00")]);
        store.set_failing(true);
        let board = SnapshotBoard::new(store, FixedOffset::east_opt(0).unwrap());

        let report = monthly_overtime(
            &board,
            &MemoryDirectory::default(),
            march(),
            &AggregateFilter::default(),
            &EngineSettings::default(),
        )
        .await;

        assert_eq!(report.status, ReportStatus::NoData);
        assert_eq!(report.aggregate, MonthlyAggregate::empty(march()));
    }

    #[actix_web::test]
    async fn blank_names_come_from_directory() {
        let mut punches = vec![
            punch("E7", Entrance, "2025-03-03T08:00:00"),
            punch("E7", Exit, "2025-03-03T12:00:00"),
        ];
        for p in &mut punches {
            p.employee_name = " ".into();
        }
        let board = SnapshotBoard::new(
            MemoryPunchStore::with_punches(punches),
            FixedOffset::east_opt(0).unwrap(),
        );
        let directory = MemoryDirectory::default().with_employee("E7", "Marta Sanz", None);

        let report = monthly_overtime(
            &board,
            &directory,
            march(),
            &AggregateFilter::default(),
            &EngineSettings::default(),
        )
        .await;
        assert_eq!(report.aggregate.summaries[0].employee_name, "Marta Sanz");
    }

    #[actix_web::test]
    async fn card_reads_alternate_and_publish() {
        let store = MemoryPunchStore::default();
        let directory = MemoryDirectory::default().with_employee("E1", "Ana Ruiz", Some("CARD-1"));
        let feed = ChangeFeed::new();
        let published = Arc::new(AtomicUsize::new(0));
        let counter = published.clone();
        let _sub = feed.on_change(change_feed::PUNCHES, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let terminal = PunchSource::Terminal;
        let first = punch_by_card(&store, &directory, &feed, "CARD-1", terminal, None, at(3, 8, 0))
            .await
            .unwrap();
        let second = punch_by_card(
            &store,
            &directory,
            &feed,
            " CARD-1 ",
            PunchSource::Card,
            Some("Gate".into()),
            at(3, 17, 0),
        )
        .await
        .unwrap();

        match (first, second) {
            (CardOutcome::Recorded(a), CardOutcome::Recorded(b)) => {
                assert_eq!(a.kind, Entrance);
                assert_eq!(a.employee_name, "Ana Ruiz");
                assert_eq!(a.source, PunchSource::Terminal);
                assert_eq!(b.kind, Exit);
                assert_eq!(b.source, PunchSource::Card);
                assert_eq!(b.location.as_deref(), Some("Gate"));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(published.load(Ordering::SeqCst), 2);

        let unknown = punch_by_card(&store, &directory, &feed, "NOPE", terminal, None, at(3, 18, 0))
            .await
            .unwrap();
        assert_eq!(unknown, CardOutcome::UnknownCard);
        assert_eq!(published.load(Ordering::SeqCst), 2);
    }

    #[actix_web::test]
    async fn inactive_card_is_told_apart_from_unknown() {
        let store = MemoryPunchStore::default();
        let directory =
            MemoryDirectory::default().with_employee_status("E2", "Luis Mora", Some("CARD-2"), false);
        let feed = ChangeFeed::new();

        let outcome = punch_by_card(
            &store,
            &directory,
            &feed,
            "CARD-2",
            PunchSource::Terminal,
            None,
            at(3, 8, 0),
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            CardOutcome::InactiveEmployee {
                employee_name: "Luis Mora".into()
            }
        );
        assert!(store.last_for_employee("E2").await.unwrap().is_none());
    }

    #[actix_web::test]
    async fn punch_log_pages_newest_first() {
        let store = MemoryPunchStore::with_punches(vec![
            punch("E1", Entrance, "2025-03-01T08:00:00"),
            punch("E1", Exit, "2025-03-01T16:00:00"),
            punch("E2", Entrance, "2025-03-02T07:00:00"),
            punch("E1", Entrance, "2025-03-03T08:00:00"),
            punch("E1", Entrance, "2025-03-05T08:00:00"),
        ]);
        let settings = EngineSettings::default();
        let first = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let last = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();

        let page_one = punch_log(&store, None, first, last, (1, 2, 0), &settings).await.unwrap();
        assert_eq!(page_one.total, 4);
        let stamps: Vec<_> = page_one.items.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![at(3, 8, 0), at(2, 7, 0)]);

        let page_two = punch_log(&store, None, first, last, (2, 2, 2), &settings).await.unwrap();
        assert_eq!(page_two.items.len(), 2);
        assert_eq!(page_two.items[1].timestamp, at(1, 8, 0));

        let only_e2 = punch_log(&store, Some("E2"), first, last, (1, 20, 0), &settings)
            .await
            .unwrap();
        assert_eq!(only_e2.total, 1);
        assert_eq!(only_e2.items[0].employee_id, "E2");
    }

    #[actix_web::test]
    async fn absent_today_lists_active_employees_without_punches() {
        let store = MemoryPunchStore::with_punches(vec![
            punch("E1", Entrance, "2025-03-03T08:00:00"),
            punch("E2", Entrance, "2025-03-02T08:00:00"),
        ]);
        let directory = MemoryDirectory::default()
            .with_employee("E1", "Ana Ruiz", Some("CARD-1"))
            .with_employee("E2", "Zoe Pardo", None)
            .with_employee("E3", "Bea Gil", None)
            .with_employee_status("E4", "Carlos Vidal", None, false);

        let absent = absent_today(&store, &directory, at(3, 12, 0), &EngineSettings::default())
            .await
            .unwrap();

        let names: Vec<_> = absent.iter().map(|e| e.employee_name.as_str()).collect();
        assert_eq!(names, vec!["Bea Gil", "Zoe Pardo"]);
    }

    #[actix_web::test]
    async fn manual_punch_respects_explicit_kind() {
        let store = MemoryPunchStore::default();
        let feed = ChangeFeed::new();

        let p = punch_manual(&store, &feed, "E1", "Ana", None, at(3, 8, 0)).await.unwrap();
        assert_eq!(p.kind, Entrance);
        let p = punch_manual(&store, &feed, "E1", "Ana", Some(Entrance), at(3, 9, 0)).await.unwrap();
        assert_eq!(p.kind, Entrance);
        let p = punch_manual(&store, &feed, "E1", "Ana", None, at(3, 12, 0)).await.unwrap();
        assert_eq!(p.kind, Exit);
    }

    #[actix_web::test]
    async fn today_and_history_windows() {
        let store = MemoryPunchStore::with_punches(vec![
            punch("E1", Entrance, "2025-03-01T08:00:00"),
            punch("E1", Exit, "2025-03-01T16:00:00"),
            punch("E1", Entrance, "2025-03-03T08:00:00"),
            punch("E2", Entrance, "2025-03-03T07:00:00"),
        ]);
        let settings = EngineSettings::default();

        let today = today_progress(&store, "E1", at(3, 10, 0), &settings).await.unwrap();
        assert_eq!(today.worked_minutes, 120);
        assert_eq!(today.open_since, Some(at(3, 8, 0)));

        let last_two = recent_punches(&store, "E1", 2, at(3, 10, 0), &settings).await.unwrap();
        assert_eq!(last_two.len(), 1);

        let last_three = recent_punches(&store, "E1", 3, at(3, 10, 0), &settings).await.unwrap();
        assert_eq!(last_three.len(), 3);
        assert_eq!(last_three[0].timestamp, at(3, 8, 0));
    }
}
