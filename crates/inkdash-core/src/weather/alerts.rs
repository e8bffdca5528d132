use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use serde::Deserialize;
use tracing::{info, warn};

use crate::OutputMap;
use crate::providers::http;
use crate::settings::AlertSource;
use crate::xml;

pub const WEATHERGOV_ALERTS_URL: &str = "https://api.weather.gov/alerts/active";

#[derive(Debug, Deserialize)]
struct AlertCollection {
    #[serde(default)]
    features: Vec<AlertFeature>,
}

#[derive(Debug, Deserialize)]
struct AlertFeature {
    properties: AlertProperties,
}

#[derive(Debug, Deserialize)]
struct AlertProperties {
    headline: Option<String>,
    event: Option<String>,
}

pub struct Alerts<'a> {
    client: &'a Client,
    weathergov_url: String,
    latitude: f64,
    longitude: f64,
}

impl<'a> Alerts<'a> {
    pub fn new(client: &'a Client, latitude: f64, longitude: f64) -> Self {
        Self {
            client,
            weathergov_url: WEATHERGOV_ALERTS_URL.to_string(),
            latitude,
            longitude,
        }
    }

    pub fn with_weathergov_url(mut self, url: &str) -> Self {
        self.weathergov_url = url.to_string();
        self
    }

    /// The current alert headline, or an empty string when there is none or
    /// the source cannot be read.
    #[tracing::instrument(skip(self))]
    pub fn message(&self, source: Option<&AlertSource>) -> String {
        let Some(source) = source else {
            return String::new();
        };
        let result = match source {
            AlertSource::WeatherGov { user_agent } => self.weathergov(user_agent),
            AlertSource::MetOfficeRss { url } | AlertSource::MetEireannRss { url } => {
                self.rss(url)
            }
        };
        match result {
            Ok(message) => {
                info!(present = message.is_some(), "fetched weather alert");
                message.unwrap_or_default()
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "weather alert unavailable");
                String::new()
            }
        }
    }

    fn weathergov(&self, user_agent: &str) -> anyhow::Result<Option<String>> {
        let point = format!("{},{}", self.latitude, self.longitude);
        let request = self
            .client
            .get(&self.weathergov_url)
            .query(&[("point", point)])
            .header(USER_AGENT, user_agent)
            .header(ACCEPT, "application/geo+json");
        let alerts: AlertCollection = http::send_json(request, "weather.gov alerts")?;
        Ok(alerts
            .features
            .into_iter()
            .next()
            .and_then(|feature| feature.properties.headline.or(feature.properties.event)))
    }

    fn rss(&self, url: &str) -> anyhow::Result<Option<String>> {
        let body = http::send_text(self.client.get(url), "alert RSS feed")?;
        xml::first_rss_item_title(&body)
    }
}

/// `ALERT_MESSAGE` escaped for SVG text, and its visibility.
pub fn to_output(message: &str) -> OutputMap {
    let visibility = if message.is_empty() {
        "hidden"
    } else {
        "visible"
    };
    OutputMap::from([
        (
            "ALERT_MESSAGE_VISIBILITY".to_string(),
            visibility.to_string(),
        ),
        (
            "ALERT_MESSAGE".to_string(),
            quick_xml::escape::escape(message).into_owned(),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_message_is_hidden() {
        let out = to_output("");
        assert_eq!(out["ALERT_MESSAGE_VISIBILITY"], "hidden");
        assert_eq!(out["ALERT_MESSAGE"], "");
    }

    #[test]
    fn message_is_escaped() {
        let out = to_output("Wind & \"rain\"");
        assert_eq!(out["ALERT_MESSAGE_VISIBILITY"], "visible");
        assert_eq!(out["ALERT_MESSAGE"], "Wind &amp; &quot;rain&quot;");
    }

    #[test]
    fn unconfigured_source_yields_nothing() {
        let client = Client::new();
        assert_eq!(Alerts::new(&client, 0.0, 0.0).message(None), "");
    }
}
