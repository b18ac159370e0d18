use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::RwLock;
use strum::IntoEnumIterator;
use thiserror::Error;
use tracing::{debug, info};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::model::calendar::{CalendarEvent, EventKind};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CalendarError {
    #[error("event title must not be empty")]
    EmptyTitle,

    #[error("event ends ({end}) before it starts ({start})")]
    EndsBeforeStart { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewEvent {
    pub title: String,
    #[schema(value_type = String, format = "date")]
    pub start: NaiveDate,
    #[schema(value_type = Option<String>, format = "date")]
    pub end: Option<NaiveDate>,
    pub color: Option<String>,
    pub operator_id: Option<String>,
    pub client: Option<String>,
    pub kind: Option<EventKind>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CalendarFilter {
    pub kind: Option<EventKind>,
    pub operator_id: Option<String>,
    /// Case-insensitive match on title or client
    pub q: Option<String>,
}

impl CalendarFilter {
    fn matches(&self, event: &CalendarEvent) -> bool {
        let by_kind = self.kind.is_none_or(|k| k == event.kind);
        let by_operator = self
            .operator_id
            .as_deref()
            .filter(|o| !o.is_empty())
            .is_none_or(|o| event.operator_id.as_deref() == Some(o));
        let by_text = match self.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            None => true,
            Some(q) => {
                let q = q.to_lowercase();
                event.title.to_lowercase().contains(&q)
                    || event
                        .client
                        .as_deref()
                        .is_some_and(|c| c.to_lowercase().contains(&q))
            }
        };
        by_kind && by_operator && by_text
    }
}

/// Event counts per kind for one day. Only the start day is counted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DayCounts {
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    pub counts: BTreeMap<String, usize>,
}

fn ensure_valid(title: &str, start: NaiveDate, end: Option<NaiveDate>) -> Result<(), CalendarError> {
    if title.trim().is_empty() {
        return Err(CalendarError::EmptyTitle);
    }
    match end {
        Some(end) if end < start => Err(CalendarError::EndsBeforeStart { start, end }),
        _ => Ok(()),
    }
}

/// In-memory scheduling calendar shared by the admin pages.
#[derive(Default)]
pub struct CalendarBoard {
    events: RwLock<Vec<CalendarEvent>>,
}

impl CalendarBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self, filter: &CalendarFilter) -> Vec<CalendarEvent> {
        let events = self.events.read().expect("calendar lock poisoned");
        let mut out: Vec<CalendarEvent> = events.iter().filter(|e| filter.matches(e)).cloned().collect();
        out.sort_by_key(|e| e.start);
        out
    }

    pub fn day_counts(&self, filter: &CalendarFilter) -> Vec<DayCounts> {
        let events = self.events.read().expect("calendar lock poisoned");
        let mut days: BTreeMap<NaiveDate, BTreeMap<EventKind, usize>> = BTreeMap::new();
        for event in events.iter().filter(|e| filter.matches(e)) {
            *days
                .entry(event.start)
                .or_default()
                .entry(event.kind)
                .or_insert(0) += 1;
        }

        days.into_iter()
            .map(|(date, per_kind)| DayCounts {
                date,
                counts: EventKind::iter()
                    .filter_map(|k| per_kind.get(&k).map(|n| (k.to_string(), *n)))
                    .collect(),
            })
            .collect()
    }

    pub fn add(&self, new: NewEvent) -> Result<CalendarEvent, CalendarError> {
        ensure_valid(&new.title, new.start, new.end)?;

        let event = CalendarEvent {
            id: Uuid::new_v4().to_string(),
            title: new.title.trim().to_string(),
            start: new.start,
            end: new.end,
            color: new.color,
            operator_id: new.operator_id,
            client: new.client,
            kind: new.kind.unwrap_or(EventKind::Service),
        };

        self.events
            .write()
            .expect("calendar lock poisoned")
            .push(event.clone());
        info!(event_id = %event.id, kind = %event.kind, "Calendar event added");
        Ok(event)
    }

    /// Reschedules an event. `Ok(None)` when the id is unknown.
    pub fn move_event(
        &self,
        id: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Option<CalendarEvent>, CalendarError> {
        let mut events = self.events.write().expect("calendar lock poisoned");
        let Some(event) = events.iter_mut().find(|e| e.id == id) else {
            return Ok(None);
        };
        ensure_valid(&event.title, start, end)?;

        event.start = start;
        event.end = end;
        debug!(event_id = id, %start, "Calendar event moved");
        Ok(Some(event.clone()))
    }

    pub fn delete(&self, id: &str) -> bool {
        let mut events = self.events.write().expect("calendar lock poisoned");
        let before = events.len();
        events.retain(|e| e.id != id);
        before != events.len()
    }

    /// Removes every event; returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut events = self.events.write().expect("calendar lock poisoned");
        let removed = events.len();
        events.clear();
        info!(removed, "Calendar cleared");
        removed
    }

    /// iCalendar export of the filtered events. Each event spans 08:00 to
    /// 18:00 UTC from its first to its last day.
    pub fn to_ics(&self, filter: &CalendarFilter, now: DateTime<Utc>) -> String {
        let stamp = now.format("%Y%m%dT%H%M%SZ").to_string();
        let mut lines = vec![
            "BEGIN:VCALENDAR".to_string(),
            "VERSION:2.0".to_string(),
            "PRODID:-//timeclock//Operations Calendar//EN".to_string(),
        ];

        for event in self.list(filter) {
            let last_day = event.end.unwrap_or(event.start);
            lines.push("BEGIN:VEVENT".to_string());
            lines.push(format!("UID:{}@timeclock", event.id));
            lines.push(format!("DTSTAMP:{stamp}"));
            lines.push(format!("DTSTART:{}T080000Z", event.start.format("%Y%m%d")));
            lines.push(format!("DTEND:{}T180000Z", last_day.format("%Y%m%d")));
            lines.push(format!("SUMMARY:{}", escape_text(&event.title)));
            lines.push("END:VEVENT".to_string());
        }

        lines.push("END:VCALENDAR".to_string());
        lines.join("\r\n")
    }
}

fn escape_text(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn new_event(title: &str, start: &str, kind: EventKind, operator: &str) -> NewEvent {
        NewEvent {
            title: title.into(),
            start: date(start),
            end: None,
            color: None,
            operator_id: Some(operator.into()),
            client: None,
            kind: Some(kind),
        }
    }

    fn seeded() -> CalendarBoard {
        let board = CalendarBoard::new();
        board
            .add(NewEvent {
                client: Some("Finca Norte".into()),
                ..new_event("Pump repair", "2025-11-05", EventKind::Service, "op1")
            })
            .unwrap();
        board
            .add(new_event("Weekly report", "2025-11-05", EventKind::Report, "op2"))
            .unwrap();
        board
            .add(new_event("Irrigation check", "2025-11-03", EventKind::Service, "op2"))
            .unwrap();
        board
    }

    #[test]
    fn filters_by_kind_operator_and_text() {
        let board = seeded();

        let services = board.list(&CalendarFilter {
            kind: Some(EventKind::Service),
            ..Default::default()
        });
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].title, "Irrigation check");

        let by_operator = board.list(&CalendarFilter {
            operator_id: Some("op2".into()),
            ..Default::default()
        });
        assert_eq!(by_operator.len(), 2);

        let by_client = board.list(&CalendarFilter {
            q: Some("norte".into()),
            ..Default::default()
        });
        assert_eq!(by_client.len(), 1);
        assert_eq!(by_client[0].title, "Pump repair");
    }

    #[test]
    fn counts_events_per_day_and_kind() {
        let counts = seeded().day_counts(&CalendarFilter::default());

        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].date, date("2025-11-03"));
        assert_eq!(counts[1].counts.get("service"), Some(&1));
        assert_eq!(counts[1].counts.get("report"), Some(&1));
    }

    #[test]
    fn rejects_invalid_events() {
        let board = CalendarBoard::new();
        assert_eq!(
            board.add(new_event("  ", "2025-11-05", EventKind::Punch, "op1")),
            Err(CalendarError::EmptyTitle)
        );

        let event = board
            .add(new_event("Leave", "2025-11-18", EventKind::Absence, "op3"))
            .unwrap();
        assert!(board
            .move_event(&event.id, date("2025-11-20"), Some(date("2025-11-19")))
            .is_err());
    }

    #[test]
    fn move_delete_and_clear() {
        let board = seeded();
        let id = board.list(&CalendarFilter::default())[0].id.clone();

        let moved = board
            .move_event(&id, date("2025-11-10"), Some(date("2025-11-12")))
            .unwrap()
            .unwrap();
        assert_eq!(moved.end, Some(date("2025-11-12")));
        assert_eq!(board.move_event("missing", date("2025-11-10"), None), Ok(None));

        assert!(board.delete(&id));
        assert!(!board.delete(&id));
        assert_eq!(board.clear(), 2);
        assert!(board.list(&CalendarFilter::default()).is_empty());
    }

    #[test]
    fn ics_spans_working_hours() {
        let board = CalendarBoard::new();
        board
            .add(NewEvent {
                end: Some(date("2025-11-22")),
                ..new_event("Holidays, Jorge", "2025-11-18", EventKind::Absence, "op3")
            })
            .unwrap();

        let ics = board.to_ics(
            &CalendarFilter::default(),
            Utc.with_ymd_and_hms(2025, 11, 1, 12, 0, 0).unwrap(),
        );
        let lines: Vec<&str> = ics.split("\r\n").collect();

        assert_eq!(lines.first(), Some(&"BEGIN:VCALENDAR"));
        assert_eq!(lines.last(), Some(&"END:VCALENDAR"));
        assert!(lines.contains(&"DTSTAMP:20251101T120000Z"));
        assert!(lines.contains(&"DTSTART:20251118T080000Z"));
        assert!(lines.contains(&"DTEND:20251122T180000Z"));
        assert!(lines.contains(&"SUMMARY:Holidays\\, Jorge"));
    }
}
