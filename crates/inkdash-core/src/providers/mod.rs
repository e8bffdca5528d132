pub mod caldav;
pub mod google;
pub mod http;
pub mod ical;
pub mod ics;
pub mod outlook;

use reqwest::blocking::Client;
use tracing::{debug, warn};

use crate::aggregate;
use crate::datetime::Instant;
use crate::model::{CalendarEvent, Todo};
use crate::settings::{CalendarSource, ConfigError};

/// Time range and size of one event query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: Instant,
    pub end: Instant,
    pub limit: usize,
}

impl FetchWindow {
    /// Whether the event overlaps the window at all.
    pub fn overlaps(&self, event: &CalendarEvent) -> bool {
        event.start <= self.end && event.effective_end() >= self.start
    }
}

pub trait CalendarProvider {
    fn name(&self) -> &'static str;

    /// Events from every configured collection, merged, sorted by start and
    /// truncated to `window.limit`.
    fn fetch_events(&self, window: &FetchWindow) -> anyhow::Result<Vec<CalendarEvent>>;
}

pub trait TodoProvider {
    fn fetch_todos(&self) -> anyhow::Result<Vec<Todo>>;
}

pub fn calendar_provider(source: &CalendarSource, client: Client) -> Box<dyn CalendarProvider> {
    match source {
        CalendarSource::Outlook {
            calendar_id,
            access_token,
        } => Box::new(outlook::OutlookCalendar::new(
            client,
            calendar_id.clone(),
            access_token.clone(),
        )),
        CalendarSource::CalDav {
            urls,
            username,
            password,
        } => Box::new(caldav::CalDavCalendar::new(
            client,
            urls.clone(),
            username.clone(),
            password.clone(),
        )),
        CalendarSource::Ics { urls } => Box::new(ics::IcsCalendar::new(client, urls.clone())),
        CalendarSource::Google {
            calendar_id,
            access_token,
        } => Box::new(google::GoogleCalendar::new(
            client,
            calendar_id.clone(),
            access_token.clone(),
        )),
    }
}

/// Only CalDAV collections carry todos.
pub fn todo_provider(
    source: &CalendarSource,
    client: Client,
) -> Result<Box<dyn TodoProvider>, ConfigError> {
    match source {
        CalendarSource::CalDav {
            urls,
            username,
            password,
        } => Ok(Box::new(caldav::CalDavCalendar::new(
            client,
            urls.clone(),
            username.clone(),
            password.clone(),
        ))),
        _ => Err(ConfigError::NoTodoSource),
    }
}

/// Runs `fetch` for every collection, concatenating results. A failing
/// collection is logged and skipped.
pub fn gather<T, F>(collections: &[String], kind: &'static str, mut fetch: F) -> Vec<T>
where
    F: FnMut(&str) -> anyhow::Result<Vec<T>>,
{
    let mut out = Vec::new();
    for collection in collections {
        match fetch(collection) {
            Ok(items) => {
                debug!(collection = %collection, kind, count = items.len(), "fetched collection");
                out.extend(items);
            }
            Err(err) => {
                warn!(
                    collection = %collection,
                    kind,
                    error = %format!("{err:#}"),
                    "collection fetch failed; skipping"
                );
            }
        }
    }
    out
}

/// Sort across the merged set, then truncate.
pub fn finish_events(mut events: Vec<CalendarEvent>, limit: usize) -> Vec<CalendarEvent> {
    aggregate::sort_events(&mut events);
    events.truncate(limit);
    events
}
