use anyhow::{Context, anyhow};
use chrono::{SecondsFormat, Utc};
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::{CalendarProvider, FetchWindow, finish_events, http};
use crate::datetime::{self, Instant};
use crate::model::CalendarEvent;

pub const GOOGLE_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<GoogleEvent>,
}

#[derive(Debug, Deserialize)]
struct GoogleEvent {
    summary: Option<String>,
    location: Option<String>,
    status: Option<String>,
    start: Option<EventTime>,
    end: Option<EventTime>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventTime {
    date: Option<String>,
    date_time: Option<String>,
}

impl EventTime {
    fn raw(&self) -> Option<datetime::RawTime> {
        self.date_time
            .as_deref()
            .or(self.date.as_deref())
            .and_then(datetime::parse_api_value)
    }
}

/// Google Calendar v3 `events.list`, with recurring events expanded into
/// single instances by the API.
pub struct GoogleCalendar {
    client: Client,
    base_url: String,
    calendar_id: String,
    access_token: String,
}

impl GoogleCalendar {
    pub fn new(client: Client, calendar_id: String, access_token: String) -> Self {
        Self::with_base_url(client, GOOGLE_API_BASE, calendar_id, access_token)
    }

    pub fn with_base_url(
        client: Client,
        base_url: &str,
        calendar_id: String,
        access_token: String,
    ) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            calendar_id,
            access_token,
        }
    }

    fn events_url(&self) -> anyhow::Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid Google API base URL {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|()| anyhow!("Google API base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["calendars", self.calendar_id.as_str(), "events"]);
        Ok(url)
    }
}

fn rfc3339(instant: Instant) -> String {
    instant
        .with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl CalendarProvider for GoogleCalendar {
    fn name(&self) -> &'static str {
        "google"
    }

    #[tracing::instrument(skip(self), fields(calendar_id = %self.calendar_id))]
    fn fetch_events(&self, window: &FetchWindow) -> anyhow::Result<Vec<CalendarEvent>> {
        let request = self
            .client
            .get(self.events_url()?)
            .bearer_auth(&self.access_token)
            .query(&[
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("timeMin", rfc3339(window.start)),
                ("timeMax", rfc3339(window.end)),
                ("maxResults", window.limit.max(1).to_string()),
            ]);

        let list: EventList = http::send_json(request, "Google Calendar events.list")?;
        debug!(items = list.items.len(), "Google returned events");

        let events: Vec<CalendarEvent> = list
            .items
            .into_iter()
            .filter(|item| item.status.as_deref() != Some("cancelled"))
            .filter_map(|item| {
                let Some(start) = item.start.as_ref().and_then(EventTime::raw) else {
                    debug!(summary = ?item.summary, "dropping Google event without start");
                    return None;
                };
                let end = item.end.as_ref().and_then(EventTime::raw);
                Some(CalendarEvent::from_raw(
                    item.summary,
                    item.location,
                    start,
                    end,
                    None,
                ))
            })
            .collect();

        info!(count = events.len(), "fetched Google events");
        Ok(finish_events(events, window.limit))
    }
}
