use std::io::BufReader;

use anyhow::Context;
use ical::IcalParser;
use ical::property::Property;
use tracing::{
  debug,
  warn
};

use crate::datetime::{
  self,
  RawTime
};
use crate::model::{
  self,
  CalendarEvent,
  Todo
};

/// Every VEVENT and VTODO found in one
/// iCalendar document.
#[derive(Debug, Default)]
pub struct Components {
  pub events: Vec<CalendarEvent>,
  pub todos:  Vec<Todo>
}

pub fn parse_document(
  ics_text: &str
) -> anyhow::Result<Components> {
  let mut out = Components::default();
  let reader =
    BufReader::new(ics_text.as_bytes());
  let parser = IcalParser::new(reader);

  for calendar in parser {
    let calendar = calendar.context(
      "failed parsing iCalendar \
       payload"
    )?;
    out.events.extend(
      calendar.events.iter().filter_map(
        |event| {
          event_from_properties(
            &event.properties
          )
        }
      )
    );
    out.todos.extend(
      calendar.todos.iter().filter_map(
        |todo| {
          todo_from_properties(
            &todo.properties
          )
        }
      )
    );
  }

  Ok(out)
}

/// Maps VEVENT properties onto the
/// canonical event. `None` when DTSTART
/// is missing or unparseable.
pub fn event_from_properties(
  properties: &[Property]
) -> Option<CalendarEvent> {
  let summary =
    text_value(properties, "SUMMARY");
  let Some(start) =
    find_property(properties, "DTSTART")
      .and_then(parse_time_property)
  else {
    debug!(
      summary = ?summary,
      "dropping event without a \
       parseable DTSTART"
    );
    return None;
  };

  let end =
    find_property(properties, "DTEND")
      .and_then(parse_time_property);
  let duration = property_value(
    properties, "DURATION"
  )
  .and_then(|raw| {
    let parsed =
      datetime::parse_duration(&raw);
    if parsed.is_none() {
      warn!(
        duration = %raw,
        "ignoring unparseable DURATION"
      );
    }
    parsed
  });

  Some(CalendarEvent::from_raw(
    summary,
    text_value(properties, "LOCATION"),
    start,
    end,
    duration
  ))
}

pub fn todo_from_properties(
  properties: &[Property]
) -> Option<Todo> {
  let completed = model::is_completed(
    property_value(
      properties,
      "COMPLETED"
    )
    .as_deref(),
    property_value(properties, "STATUS")
      .as_deref()
  );
  let due = find_property(
    properties, "DUE"
  )
  .and_then(parse_time_property);

  Some(Todo::from_raw(
    text_value(properties, "SUMMARY"),
    due,
    completed
  ))
}

/// DATE / DATE-TIME property, honouring
/// `VALUE=DATE` and `TZID`.
fn parse_time_property(
  property: &Property
) -> Option<RawTime> {
  let raw = property.value.as_deref()?;
  let value_type =
    param_value(property, "VALUE");
  if value_type.is_some_and(|v| {
    v.eq_ignore_ascii_case("DATE")
  }) {
    let digits = raw.trim();
    return datetime::parse_ical_value(
      digits.get(..8).unwrap_or(digits),
      None
    );
  }

  datetime::parse_ical_value(
    raw,
    param_value(property, "TZID")
  )
}

fn param_value<'a>(
  property: &'a Property,
  name: &str
) -> Option<&'a str> {
  property
    .params
    .as_ref()?
    .iter()
    .find(|(key, _)| {
      key.eq_ignore_ascii_case(name)
    })
    .and_then(|(_, values)| {
      values.first()
    })
    .map(String::as_str)
}

fn find_property<'a>(
  properties: &'a [Property],
  name: &str
) -> Option<&'a Property> {
  properties.iter().find(|property| {
    property.name == name
  })
}

fn property_value(
  properties: &[Property],
  name: &str
) -> Option<String> {
  find_property(properties, name)?
    .value
    .as_ref()
    .map(|value| {
      value.trim().to_string()
    })
}

/// TEXT value with RFC 5545 escapes
/// undone.
fn text_value(
  properties: &[Property],
  name: &str
) -> Option<String> {
  property_value(properties, name)
    .map(|raw| unescape_text(&raw))
}

fn unescape_text(raw: &str) -> String {
  let mut out =
    String::with_capacity(raw.len());
  let mut chars = raw.chars();
  while let Some(ch) = chars.next() {
    if ch != '\\' {
      out.push(ch);
      continue;
    }
    match chars.next() {
      | Some('n' | 'N') => out.push('\n'),
      | Some(other) => out.push(other),
      | None => out.push('\\')
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use super::{
    parse_document,
    unescape_text
  };

  const FEED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//test//EN\r\n\
BEGIN:VEVENT\r\n\
UID:1\r\n\
SUMMARY:Team sync\\, weekly\r\n\
LOCATION:Room 4\r\n\
DTSTART;TZID=Asia/Tokyo:20240115T090000\r\n\
DURATION:PT30M\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:2\r\n\
SUMMARY:Holiday\r\n\
DTSTART;VALUE=DATE:20240101\r\n\
DTEND;VALUE=DATE:20240103\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:3\r\n\
SUMMARY:Broken\r\n\
END:VEVENT\r\n\
BEGIN:VTODO\r\n\
UID:4\r\n\
SUMMARY:Pay rent\r\n\
DUE;VALUE=DATE:20240105\r\n\
END:VTODO\r\n\
BEGIN:VTODO\r\n\
UID:5\r\n\
SUMMARY:Old chore\r\n\
STATUS:completed\r\n\
END:VTODO\r\n\
END:VCALENDAR\r\n";

  #[test]
  fn maps_events_and_todos() {
    let parsed = parse_document(FEED)
      .expect("parse feed");

    assert_eq!(parsed.events.len(), 2);
    let sync = &parsed.events[0];
    assert_eq!(
      sync.summary,
      "Team sync, weekly"
    );
    assert_eq!(sync.location, "Room 4");
    assert!(!sync.all_day);
    assert_eq!(
      sync.start.to_rfc3339(),
      "2024-01-15T09:00:00+09:00"
    );
    assert_eq!(
      (sync.end - sync.start)
        .num_minutes(),
      30
    );

    let holiday = &parsed.events[1];
    assert!(holiday.all_day);
    assert_eq!(
      holiday.end.to_rfc3339(),
      "2024-01-02T00:00:00+00:00"
    );

    assert_eq!(parsed.todos.len(), 2);
    assert!(!parsed.todos[0].completed);
    assert!(parsed.todos[0].due_is_date);
    assert!(parsed.todos[1].completed);
  }

  #[test]
  fn unescapes_text_values() {
    assert_eq!(
      unescape_text(r"a\;b\nc\\d"),
      "a;b\nc\\d"
    );
  }
}
