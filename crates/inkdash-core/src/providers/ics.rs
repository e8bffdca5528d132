use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use tracing::info;

use super::{CalendarProvider, FetchWindow, finish_events, gather, http, ical};
use crate::model::CalendarEvent;

/// Plain iCalendar feeds. Recurrence rules are not expanded; only the
/// master instance of a recurring event is seen.
pub struct IcsCalendar {
    client: Client,
    urls: Vec<String>,
}

impl IcsCalendar {
    pub fn new(client: Client, urls: Vec<String>) -> Self {
        Self { client, urls }
    }

    fn fetch_feed(&self, location: &str) -> anyhow::Result<Vec<CalendarEvent>> {
        let url = http::normalize_feed_url(location);
        let request = self
            .client
            .get(&url)
            .header(ACCEPT, "text/calendar, text/plain, */*;q=0.8");
        let body = http::send_text(request, "ICS feed")?;
        Ok(ical::parse_document(&body)?.events)
    }
}

impl CalendarProvider for IcsCalendar {
    fn name(&self) -> &'static str {
        "ics"
    }

    #[tracing::instrument(skip(self), fields(feeds = self.urls.len()))]
    fn fetch_events(&self, window: &FetchWindow) -> anyhow::Result<Vec<CalendarEvent>> {
        let events = gather(&self.urls, "events", |url| {
            let mut events = self.fetch_feed(url)?;
            events.retain(|event| window.overlaps(event));
            Ok(events)
        });
        info!(count = events.len(), "fetched ICS events");
        Ok(finish_events(events, window.limit))
    }
}
