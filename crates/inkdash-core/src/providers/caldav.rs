use anyhow::Context;
use chrono::Utc;
use reqwest::Method;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info};

use super::{CalendarProvider, FetchWindow, TodoProvider, finish_events, gather, http, ical};
use crate::datetime::Instant;
use crate::model::{CalendarEvent, Todo};
use crate::xml;

const CALDAV_TIME: &str = "%Y%m%dT%H%M%SZ";

/// CalDAV collections queried with `REPORT calendar-query`. Recurring events
/// are expanded by the server.
pub struct CalDavCalendar {
    client: Client,
    urls: Vec<String>,
    username: Option<String>,
    password: Option<String>,
}

impl CalDavCalendar {
    pub fn new(
        client: Client,
        urls: Vec<String>,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        Self {
            client,
            urls,
            username,
            password,
        }
    }

    fn report(&self, url: &str, body: String) -> anyhow::Result<Vec<ical::Components>> {
        let method = Method::from_bytes(b"REPORT").context("invalid REPORT method")?;
        let mut request = self
            .client
            .request(method, url)
            .header("Depth", "1")
            .header(CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(body);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }

        let multistatus = http::send_text(request, "CalDAV REPORT")?;
        let payloads = xml::element_texts(&multistatus, "calendar-data")
            .context("failed reading CalDAV multistatus")?;
        debug!(url, payloads = payloads.len(), "CalDAV report returned");

        payloads
            .iter()
            .filter(|payload| !payload.is_empty())
            .map(|payload| ical::parse_document(payload))
            .collect()
    }
}

impl CalendarProvider for CalDavCalendar {
    fn name(&self) -> &'static str {
        "caldav"
    }

    #[tracing::instrument(skip(self), fields(collections = self.urls.len()))]
    fn fetch_events(&self, window: &FetchWindow) -> anyhow::Result<Vec<CalendarEvent>> {
        let body = event_query(window.start, window.end);
        let events = gather(&self.urls, "events", |url| {
            Ok(self
                .report(url, body.clone())?
                .into_iter()
                .flat_map(|components| components.events)
                .collect())
        });
        info!(count = events.len(), "fetched CalDAV events");
        Ok(finish_events(events, window.limit))
    }
}

impl TodoProvider for CalDavCalendar {
    #[tracing::instrument(skip(self), fields(collections = self.urls.len()))]
    fn fetch_todos(&self) -> anyhow::Result<Vec<Todo>> {
        let todos = gather(&self.urls, "todos", |url| {
            Ok(self
                .report(url, todo_query())?
                .into_iter()
                .flat_map(|components| components.todos)
                .collect())
        });
        info!(count = todos.len(), "fetched CalDAV todos");
        Ok(todos)
    }
}

fn caldav_time(instant: Instant) -> String {
    instant.with_timezone(&Utc).format(CALDAV_TIME).to_string()
}

pub fn event_query(start: Instant, end: Instant) -> String {
    let start = caldav_time(start);
    let end = caldav_time(end);
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <D:prop>
    <C:calendar-data>
      <C:expand start="{start}" end="{end}"/>
    </C:calendar-data>
  </D:prop>
  <C:filter>
    <C:comp-filter name="VCALENDAR">
      <C:comp-filter name="VEVENT">
        <C:time-range start="{start}" end="{end}"/>
      </C:comp-filter>
    </C:comp-filter>
  </C:filter>
</C:calendar-query>"#
    )
}

pub fn todo_query() -> String {
    r#"<?xml version="1.0" encoding="utf-8"?>
<C:calendar-query xmlns:D="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <D:prop>
    <C:calendar-data/>
  </D:prop>
  <C:filter>
    <C:comp-filter name="VCALENDAR">
      <C:comp-filter name="VTODO"/>
    </C:comp-filter>
  </C:filter>
</C:calendar-query>"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime::{normalize, parse_api_value};

    #[test]
    fn event_query_uses_utc_basic_format() {
        let start = normalize(parse_api_value("2024-01-02T09:00:00+09:00").expect("start"));
        let end = normalize(parse_api_value("2025-01-02T00:00:00Z").expect("end"));
        let body = event_query(start, end);
        assert!(body.contains(r#"<C:time-range start="20240102T000000Z" end="20250102T000000Z"/>"#));
        assert!(body.contains(r#"<C:expand start="20240102T000000Z""#));
        assert!(todo_query().contains(r#"<C:comp-filter name="VTODO"/>"#));
    }
}
