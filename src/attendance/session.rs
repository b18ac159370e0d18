use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::model::punch::{Punch, PunchKind};

/// A continuous work interval between one entrance and the exit that closed it.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Session {
    pub employee_id: String,
    pub employee_name: String,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = String, format = "date-time")]
    pub start: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub end: DateTime<Utc>,
    /// Exact elapsed time, seconds included
    pub worked_minutes: f64,
}

/// Calendar day of `ts` as seen at `offset`.
pub fn local_date(ts: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    ts.with_timezone(&offset).date_naive()
}

/// Single-pass reconstruction of work sessions from one employee's punches.
///
/// Punches are ordered by timestamp and paired within their local calendar
/// day only: an entrance still open when the day changes is dropped, so an
/// overnight shift yields no session for its exit.
#[derive(Debug)]
pub struct Sessions {
    punches: std::vec::IntoIter<Punch>,
    offset: FixedOffset,
    day: Option<NaiveDate>,
    open: Option<Punch>,
}

impl Sessions {
    pub fn new(mut punches: Vec<Punch>, offset: FixedOffset) -> Self {
        // stable: equal timestamps keep their stored order
        punches.sort_by_key(|p| p.timestamp);

        Self {
            punches: punches.into_iter(),
            offset,
            day: None,
            open: None,
        }
    }

    /// Entrance of the current day still waiting for its exit.
    ///
    /// Only meaningful once the iterator is exhausted.
    pub fn open_entrance(&self) -> Option<&Punch> {
        self.open.as_ref()
    }

    fn enter_day(&mut self, date: NaiveDate) {
        if self.day == Some(date) {
            return;
        }
        if let Some(dangling) = self.open.take() {
            debug!(
                employee_id = %dangling.employee_id,
                punch_id = %dangling.id,
                "Entrance without exit before day change, dropped"
            );
        }
        self.day = Some(date);
    }
}

impl Iterator for Sessions {
    type Item = Session;

    fn next(&mut self) -> Option<Session> {
        while let Some(punch) = self.punches.next() {
            let date = local_date(punch.timestamp, self.offset);
            self.enter_day(date);

            match punch.kind {
                PunchKind::Entrance => {
                    if self.open.is_some() {
                        debug!(
                            employee_id = %punch.employee_id,
                            punch_id = %punch.id,
                            "Double entrance, later punch ignored"
                        );
                    } else {
                        self.open = Some(punch);
                    }
                }
                PunchKind::Exit => {
                    let Some(entrance) = self.open.take() else {
                        debug!(
                            employee_id = %punch.employee_id,
                            punch_id = %punch.id,
                            "Exit without entrance ignored"
                        );
                        continue;
                    };

                    let elapsed_ms = (punch.timestamp - entrance.timestamp).num_milliseconds();
                    if elapsed_ms <= 0 {
                        debug!(
                            employee_id = %punch.employee_id,
                            entrance_id = %entrance.id,
                            exit_id = %punch.id,
                            "Non-positive session discarded"
                        );
                        continue;
                    }

                    return Some(Session {
                        employee_id: entrance.employee_id,
                        employee_name: entrance.employee_name,
                        date,
                        start: entrance.timestamp,
                        end: punch.timestamp,
                        worked_minutes: elapsed_ms as f64 / 60_000.0,
                    });
                }
            }
        }
        None
    }
}

/// Reconstructs sessions for a batch mixing several employees.
///
/// Employees come out in the order they first appear in `punches`, each with
/// its sessions in chronological order.
pub fn reconstruct_all(punches: &[Punch], offset: FixedOffset) -> Vec<Session> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_employee: std::collections::HashMap<&str, Vec<Punch>> =
        std::collections::HashMap::new();

    for punch in punches {
        let key = punch.employee_id.as_str();
        by_employee
            .entry(key)
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(punch.clone());
    }

    order
        .into_iter()
        .filter_map(|id| by_employee.remove(id))
        .flat_map(|batch| Sessions::new(batch, offset))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::punch::PunchSource;
    use chrono::TimeZone;

    pub(crate) fn punch(employee: &str, kind: PunchKind, ts: &str) -> Punch {
        let naive = chrono::NaiveDateTime::parse_from_str(ts, "%Y-%m-%dT%H:%M:%S").unwrap();
        Punch {
            id: format!("{employee}-{ts}-{kind}"),
            employee_id: employee.to_string(),
            employee_name: format!("Name {employee}"),
            kind,
            timestamp: Utc.from_utc_datetime(&naive),
            source: PunchSource::Manual,
            location: None,
        }
    }

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    use PunchKind::{Entrance, Exit};

    #[test]
    fn single_pair_yields_one_session() {
        let punches = vec![
            punch("E1", Entrance, "2025-03-03T08:00:00"),
            punch("E1", Exit, "2025-03-03T17:30:00"),
        ];
        let sessions: Vec<_> = Sessions::new(punches, utc()).collect();

        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].worked_minutes, 570.0);
        assert_eq!(sessions[0].date, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
    }

    #[test]
    fn lone_exit_yields_nothing() {
        let punches = vec![punch("E1", Exit, "2025-03-03T17:30:00")];
        assert_eq!(Sessions::new(punches, utc()).count(), 0);
    }

    #[test]
    fn double_entrance_keeps_the_first() {
        let punches = vec![
            punch("E1", Entrance, "2025-03-03T08:00:00"),
            punch("E1", Entrance, "2025-03-03T09:00:00"),
            punch("E1", Exit, "2025-03-03T12:00:00"),
        ];
        let sessions: Vec<_> = Sessions::new(punches, utc()).collect();

        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].worked_minutes, 240.0);
    }

    #[test]
    fn unordered_input_is_sorted_first() {
        let punches = vec![
            punch("E1", Exit, "2025-03-03T17:00:00"),
            punch("E1", Entrance, "2025-03-03T13:00:00"),
            punch("E1", Exit, "2025-03-03T12:00:00"),
            punch("E1", Entrance, "2025-03-03T08:00:00"),
        ];
        let minutes: Vec<_> = Sessions::new(punches, utc()).map(|s| s.worked_minutes).collect();
        assert_eq!(minutes, vec![240.0, 240.0]);
    }

    #[test]
    fn zero_length_session_is_discarded() {
        let punches = vec![
            punch("E1", Entrance, "2025-03-03T08:00:00"),
            punch("E1", Exit, "2025-03-03T08:00:00"),
            punch("E1", Exit, "2025-03-03T09:00:00"),
        ];
        assert_eq!(Sessions::new(punches, utc()).count(), 0);
    }

    #[test]
    fn seconds_are_kept() {
        let punches = vec![
            punch("E1", Entrance, "2025-03-03T08:00:00"),
            punch("E1", Exit, "2025-03-03T08:00:40"),
            punch("E1", Entrance, "2025-03-03T09:00:10"),
            punch("E1", Exit, "2025-03-03T13:01:00"),
        ];
        let sessions: Vec<_> = Sessions::new(punches, utc()).collect();

        assert_eq!(sessions.len(), 2);
        assert!((sessions[0].worked_minutes - 40.0 / 60.0).abs() < 1e-9);
        assert!((sessions[1].worked_minutes - (240.0 + 50.0 / 60.0)).abs() < 1e-9);
    }

    #[test]
    fn overnight_shift_is_split_by_day() {
        let punches = vec![
            punch("E1", Entrance, "2025-03-03T22:00:00"),
            punch("E1", Exit, "2025-03-04T06:00:00"),
        ];
        let mut sessions = Sessions::new(punches, utc());
        assert!(sessions.next().is_none());
        assert!(sessions.open_entrance().is_none());
    }

    #[test]
    fn offset_moves_the_day_boundary() {
        // 23:30Z on the 3rd is 00:30 on the 4th at +01:00
        let punches = vec![
            punch("E1", Entrance, "2025-03-03T23:30:00"),
            punch("E1", Exit, "2025-03-04T02:30:00"),
        ];
        let plus_one = FixedOffset::east_opt(3600).unwrap();
        let sessions: Vec<_> = Sessions::new(punches.clone(), plus_one).collect();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].date, NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());

        assert_eq!(Sessions::new(punches, utc()).count(), 0);
    }

    #[test]
    fn open_entrance_is_exposed_after_exhaustion() {
        let punches = vec![
            punch("E1", Entrance, "2025-03-03T08:00:00"),
            punch("E1", Exit, "2025-03-03T12:00:00"),
            punch("E1", Entrance, "2025-03-03T13:00:00"),
        ];
        let mut sessions = Sessions::new(punches, utc());
        assert_eq!(sessions.by_ref().count(), 1);
        let open = sessions.open_entrance().unwrap();
        assert_eq!(open.timestamp, Utc.with_ymd_and_hms(2025, 3, 3, 13, 0, 0).unwrap());
    }

    #[test]
    fn mixed_batch_is_split_per_employee() {
        let punches = vec![
            punch("E2", Entrance, "2025-03-03T07:00:00"),
            punch("E1", Entrance, "2025-03-03T08:00:00"),
            punch("E2", Exit, "2025-03-03T09:00:00"),
            punch("E1", Exit, "2025-03-03T10:00:00"),
        ];
        let sessions = reconstruct_all(&punches, utc());

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].employee_id, "E2");
        assert_eq!(sessions[0].worked_minutes, 120.0);
        assert_eq!(sessions[1].employee_id, "E1");
        assert_eq!(sessions[1].worked_minutes, 120.0);
    }
}
