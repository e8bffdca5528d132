use chrono::Duration;
use serde::Serialize;

use crate::datetime::{self, Instant, RawTime};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub summary: String,
    pub start: Instant,
    /// Inclusive end. For all-day events this is the last day the event
    /// occupies, not the backend's exclusive end.
    pub end: Instant,
    pub all_day: bool,
    pub location: String,
}

impl CalendarEvent {
    /// Builds the canonical event from raw backend values. All-day is decided
    /// by the granularity of `start` alone.
    pub fn from_raw(
        summary: Option<String>,
        location: Option<String>,
        start: RawTime,
        end: Option<RawTime>,
        duration: Option<Duration>,
    ) -> Self {
        let all_day = start.is_date();
        let start_at = datetime::normalize(start);
        let mut end_at = datetime::normalize(datetime::resolve_end(start, end, duration));

        if all_day {
            end_at -= Duration::days(1);
        }
        if end_at < start_at {
            tracing::debug!(
                start = %start_at,
                end = %end_at,
                "event ends before it starts; clamping end to start"
            );
            end_at = start_at;
        }

        Self {
            summary: summary.unwrap_or_default(),
            start: start_at,
            end: end_at,
            all_day,
            location: location.unwrap_or_default(),
        }
    }

    /// The instant after which the event counts as finished. All-day events
    /// stay visible through the last second of their final (UTC) day.
    pub fn effective_end(&self) -> Instant {
        if self.all_day {
            datetime::end_of_day(self.end)
        } else {
            self.end
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Todo {
    pub summary: String,
    pub due: Option<Instant>,
    pub due_is_date: bool,
    pub completed: bool,
}

impl Todo {
    pub fn from_raw(summary: Option<String>, due: Option<RawTime>, completed: bool) -> Self {
        Self {
            summary: summary.unwrap_or_default(),
            due: due.map(datetime::normalize),
            due_is_date: due.is_some_and(|value| value.is_date()),
            completed,
        }
    }

    /// Ordering key: date-only dues count as the end of their day, and a
    /// missing due sorts after everything dated.
    pub fn sort_key(&self) -> (bool, Option<Instant>) {
        match self.due {
            Some(due) if self.due_is_date => (false, Some(datetime::end_of_day(due))),
            Some(due) => (false, Some(due)),
            None => (true, None),
        }
    }
}

/// Completion fires on either signal: a `COMPLETED` timestamp being present
/// or a `STATUS` of `COMPLETED` in any case.
pub fn is_completed(completed_field: Option<&str>, status: Option<&str>) -> bool {
    completed_field.is_some()
        || status.is_some_and(|value| value.trim().eq_ignore_ascii_case("completed"))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn all_day_end_is_exclusive_end_minus_one_day() {
        let event = CalendarEvent::from_raw(
            Some("Holiday".to_string()),
            None,
            RawTime::Date(date(2024, 1, 1)),
            Some(RawTime::Date(date(2024, 1, 3))),
            None,
        );

        assert!(event.all_day);
        assert_eq!(
            event.end,
            datetime::normalize(RawTime::Date(date(2024, 1, 3))) - Duration::days(1)
        );
        assert_eq!(event.end.to_rfc3339(), "2024-01-02T00:00:00+00:00");
    }

    #[test]
    fn single_day_all_day_event_without_end_stays_on_its_day() {
        let event = CalendarEvent::from_raw(
            None,
            None,
            RawTime::Date(date(2024, 1, 1)),
            None,
            None,
        );
        assert_eq!(event.start, event.end);
        assert_eq!(event.summary, "");
        assert_eq!(event.location, "");
    }

    #[test]
    fn timed_event_without_end_is_zero_length() {
        let start = datetime::parse_api_value("2024-01-02T09:00:00Z").expect("start");
        let event = CalendarEvent::from_raw(None, None, start, None, None);
        assert!(!event.all_day);
        assert_eq!(event.end, event.start);
    }

    #[test]
    fn duration_is_used_when_end_missing() {
        let start = datetime::parse_api_value("2024-01-02T09:00:00Z").expect("start");
        let event =
            CalendarEvent::from_raw(None, None, start, None, Some(Duration::minutes(45)));
        assert_eq!(event.end - event.start, Duration::minutes(45));
    }

    #[test]
    fn effective_end_of_all_day_event_is_end_of_day() {
        let event = CalendarEvent::from_raw(
            None,
            None,
            RawTime::Date(date(2024, 1, 1)),
            None,
            None,
        );
        assert_eq!(event.effective_end().to_rfc3339(), "2024-01-01T23:59:59+00:00");
    }

    #[test]
    fn completion_is_either_signal() {
        assert!(is_completed(Some("20240101T000000Z"), None));
        assert!(is_completed(None, Some("completed")));
        assert!(is_completed(Some("20240101T000000Z"), Some("NEEDS-ACTION")));
        assert!(!is_completed(None, Some("NEEDS-ACTION")));
        assert!(!is_completed(None, None));
    }

    #[test]
    fn undated_todo_sorts_last() {
        let dated = Todo::from_raw(None, Some(RawTime::Date(date(2030, 1, 1))), false);
        let undated = Todo::from_raw(None, None, false);
        assert!(dated.sort_key() < undated.sort_key());
    }
}
