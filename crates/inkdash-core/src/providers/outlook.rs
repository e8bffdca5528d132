use anyhow::{Context, anyhow};
use chrono::Utc;
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::{CalendarProvider, FetchWindow, finish_events, http};
use crate::datetime::{self, Instant, RawTime};
use crate::model::CalendarEvent;

pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0/";

#[derive(Debug, Deserialize)]
struct CalendarView {
    #[serde(default)]
    value: Vec<GraphEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphEvent {
    subject: Option<String>,
    #[serde(default)]
    is_all_day: bool,
    #[serde(default)]
    is_cancelled: bool,
    start: Option<GraphTime>,
    end: Option<GraphTime>,
    location: Option<GraphLocation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphTime {
    date_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphLocation {
    display_name: Option<String>,
}

impl GraphTime {
    /// Graph answers in UTC (see the `Prefer` header) without an offset.
    /// All-day values keep only their date.
    fn raw(&self, all_day: bool) -> Option<RawTime> {
        let raw = datetime::parse_api_value(&self.date_time)?;
        if !all_day {
            return Some(raw);
        }
        match raw {
            RawTime::Floating(naive) => Some(RawTime::Date(naive.date())),
            RawTime::Zoned(dt) => Some(RawTime::Date(dt.date_naive())),
            date @ RawTime::Date(_) => Some(date),
        }
    }
}

/// Microsoft Graph `calendarView` for one calendar.
pub struct OutlookCalendar {
    client: Client,
    base_url: String,
    calendar_id: String,
    access_token: String,
}

impl OutlookCalendar {
    pub fn new(client: Client, calendar_id: String, access_token: String) -> Self {
        Self::with_base_url(client, GRAPH_API_BASE, calendar_id, access_token)
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

    fn view_url(&self) -> anyhow::Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid Graph API base URL {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|()| anyhow!("Graph API base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["me", "calendars", self.calendar_id.as_str(), "calendarView"]);
        Ok(url)
    }
}

fn graph_time(instant: Instant) -> String {
    instant
        .with_timezone(&Utc)
        .format("%Y-%m-%dT%H:%M:%SZ")
        .to_string()
}

impl CalendarProvider for OutlookCalendar {
    fn name(&self) -> &'static str {
        "outlook"
    }

    #[tracing::instrument(skip(self))]
    fn fetch_events(&self, window: &FetchWindow) -> anyhow::Result<Vec<CalendarEvent>> {
        let request = self
            .client
            .get(self.view_url()?)
            .bearer_auth(&self.access_token)
            .header("Prefer", r#"outlook.timezone="UTC""#)
            .query(&[
                ("startDateTime", graph_time(window.start)),
                ("endDateTime", graph_time(window.end)),
                ("$orderby", "start/dateTime".to_string()),
                ("$top", window.limit.max(1).to_string()),
            ]);

        let view: CalendarView = http::send_json(request, "Graph calendarView")?;
        debug!(items = view.value.len(), "Graph returned events");

        let events: Vec<CalendarEvent> = view
            .value
            .into_iter()
            .filter(|item| !item.is_cancelled)
            .filter_map(|item| {
                let all_day = item.is_all_day;
                let Some(start) = item.start.as_ref().and_then(|t| t.raw(all_day)) else {
                    debug!(subject = ?item.subject, "dropping Outlook event without start");
                    return None;
                };
                let end = item.end.as_ref().and_then(|t| t.raw(all_day));
                Some(CalendarEvent::from_raw(
                    item.subject,
                    item.location.and_then(|location| location.display_name),
                    start,
                    end,
                    None,
                ))
            })
            .collect();

        info!(count = events.len(), "fetched Outlook events");
        Ok(finish_events(events, window.limit))
    }
}
