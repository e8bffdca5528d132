use tracing::debug;

use crate::datetime::Instant;
use crate::model::{CalendarEvent, Todo};

/// Orders events by start across the whole merged set. `sort_by_key` is
/// stable, so equal starts keep their fetch order.
pub fn sort_events(events: &mut [CalendarEvent]) {
    events.sort_by_key(|event| event.start);
}

/// Sort, drop everything already finished at `now`, truncate to `limit`.
#[tracing::instrument(skip(events), fields(input = events.len()))]
pub fn select_events(
    mut events: Vec<CalendarEvent>,
    now: Instant,
    limit: usize,
) -> Vec<CalendarEvent> {
    sort_events(&mut events);
    let before = events.len();
    events.retain(|event| event.effective_end() > now);
    debug!(
        dropped = before - events.len(),
        kept = events.len(),
        "filtered concluded events"
    );
    events.truncate(limit);
    events
}

/// Drop completed todos, sort by due (undated last), truncate to `limit`.
#[tracing::instrument(skip(todos), fields(input = todos.len()))]
pub fn select_todos(mut todos: Vec<Todo>, limit: usize) -> Vec<Todo> {
    todos.retain(|todo| !todo.completed);
    todos.sort_by_key(Todo::sort_key);
    todos.truncate(limit);
    debug!(kept = todos.len(), "selected open todos");
    todos
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::*;
    use crate::datetime::{self, RawTime, parse_api_value};

    fn timed(summary: &str, start: &str, end: &str) -> CalendarEvent {
        CalendarEvent::from_raw(
            Some(summary.to_string()),
            None,
            parse_api_value(start).expect("start"),
            Some(parse_api_value(end).expect("end")),
            None,
        )
    }

    fn all_day(summary: &str, y: i32, m: u32, d: u32) -> CalendarEvent {
        CalendarEvent::from_raw(
            Some(summary.to_string()),
            None,
            RawTime::Date(NaiveDate::from_ymd_opt(y, m, d).expect("valid date")),
            None,
            None,
        )
    }

    fn instant(raw: &str) -> Instant {
        datetime::normalize(parse_api_value(raw).expect("instant"))
    }

    #[test]
    fn event_ending_exactly_now_is_excluded() {
        let event = timed("standup", "2024-01-02T09:00:00Z", "2024-01-02T10:00:00Z");
        let now = event.end;

        assert!(select_events(vec![event.clone()], now, 10).is_empty());
        assert_eq!(
            select_events(vec![event], now - Duration::seconds(1), 10).len(),
            1
        );
    }

    #[test]
    fn in_progress_and_future_events_are_kept() {
        let events = vec![
            timed("past", "2024-01-02T07:00:00Z", "2024-01-02T08:00:00Z"),
            timed("running", "2024-01-02T08:30:00Z", "2024-01-02T09:30:00Z"),
            timed("later", "2024-01-02T11:00:00Z", "2024-01-02T12:00:00Z"),
        ];
        let kept = select_events(events, instant("2024-01-02T09:00:00Z"), 10);
        let names: Vec<&str> = kept.iter().map(|event| event.summary.as_str()).collect();
        assert_eq!(names, vec!["running", "later"]);
    }

    #[test]
    fn sort_happens_before_truncation() {
        let events = vec![
            timed("c", "2024-01-05T09:00:00Z", "2024-01-05T10:00:00Z"),
            timed("a", "2024-01-03T09:00:00Z", "2024-01-03T10:00:00Z"),
            timed("b", "2024-01-04T09:00:00+09:00", "2024-01-04T10:00:00+09:00"),
        ];
        let kept = select_events(events, instant("2024-01-01T00:00:00Z"), 2);
        let names: Vec<&str> = kept.iter().map(|event| event.summary.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn sort_is_stable_for_equal_starts() {
        let events = vec![
            timed("first", "2024-01-03T09:00:00Z", "2024-01-03T10:00:00Z"),
            timed("second", "2024-01-03T18:00:00+09:00", "2024-01-03T19:00:00+09:00"),
        ];
        let kept = select_events(events, instant("2024-01-01T00:00:00Z"), 10);
        assert_eq!(kept[0].summary, "first");
        assert_eq!(kept[1].summary, "second");
    }

    // Naive values are anchored in UTC, so the all-day event on 2024-01-01
    // lasts until 23:59:59Z and is still visible at 23:00Z.
    #[test]
    fn mixed_scenario_keeps_all_day_event_under_utc_policy() {
        let events = vec![
            timed("meeting", "2024-01-02T09:00:00Z", "2024-01-02T10:00:00Z"),
            all_day("holiday", 2024, 1, 1),
        ];
        let kept = select_events(events, instant("2024-01-01T23:00:00Z"), 10);
        let names: Vec<&str> = kept.iter().map(|event| event.summary.as_str()).collect();
        assert_eq!(names, vec!["holiday", "meeting"]);

        let after_midnight = select_events(
            vec![all_day("holiday", 2024, 1, 1)],
            instant("2024-01-02T00:00:00Z"),
            10,
        );
        assert!(after_midnight.is_empty());
    }

    #[test]
    fn all_day_event_visible_until_last_second_of_day() {
        let event = all_day("holiday", 2024, 1, 1);
        assert_eq!(
            select_events(vec![event.clone()], instant("2024-01-01T23:59:58Z"), 10).len(),
            1
        );
        assert!(select_events(vec![event], instant("2024-01-01T23:59:59Z"), 10).is_empty());
    }

    #[test]
    fn todos_drop_completed_and_sort_undated_last() {
        let day = |d: u32| {
            Some(RawTime::Date(
                NaiveDate::from_ymd_opt(2024, 1, d).expect("valid date"),
            ))
        };
        let todos = vec![
            Todo::from_raw(Some("undated".to_string()), None, false),
            Todo::from_raw(Some("done".to_string()), day(1), true),
            Todo::from_raw(Some("later".to_string()), day(9), false),
            Todo::from_raw(
                Some("timed".to_string()),
                parse_api_value("2024-01-05T12:00:00Z"),
                false,
            ),
            Todo::from_raw(Some("soon".to_string()), day(2), false),
        ];

        let selected = select_todos(todos, 10);
        let names: Vec<&str> = selected.iter().map(|todo| todo.summary.as_str()).collect();
        assert_eq!(names, vec!["soon", "timed", "later", "undated"]);
        assert_eq!(select_todos(selected, 2).len(), 2);
    }

    #[test]
    fn date_due_sorts_after_timed_due_on_same_day() {
        let todos = vec![
            Todo::from_raw(
                Some("date".to_string()),
                Some(RawTime::Date(NaiveDate::from_ymd_opt(2024, 1, 5).expect("date"))),
                false,
            ),
            Todo::from_raw(
                Some("evening".to_string()),
                parse_api_value("2024-01-05T20:00:00Z"),
                false,
            ),
        ];
        let selected = select_todos(todos, 10);
        assert_eq!(selected[0].summary, "evening");
    }
}
