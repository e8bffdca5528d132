use anyhow::{Context, anyhow};
use chrono::Timelike;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info};

use super::{Weather, WeatherProvider};
use crate::format::{Language, Viewer};
use crate::providers::http;
use crate::settings::Units;

pub const ACCUWEATHER_BASE: &str = "http://dataservice.accuweather.com";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DailyResponse {
    #[serde(default)]
    daily_forecasts: Vec<DailyForecast>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DailyForecast {
    temperature: TemperatureRange,
    day: Period,
    night: Period,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TemperatureRange {
    minimum: Reading,
    maximum: Reading,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reading {
    value: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Period {
    icon: u32,
    #[serde(default)]
    short_phrase: String,
}

/// AccuWeather 1-day daily forecast.
pub struct AccuWeather {
    client: Client,
    base_url: String,
    api_key: String,
    location_key: String,
    units: Units,
}

impl AccuWeather {
    pub fn new(client: Client, api_key: String, location_key: String, units: Units) -> Self {
        Self::with_base_url(client, ACCUWEATHER_BASE, api_key, location_key, units)
    }

    pub fn with_base_url(
        client: Client,
        base_url: &str,
        api_key: String,
        location_key: String,
        units: Units,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            location_key,
            units,
        }
    }
}

fn api_language(language: Language) -> &'static str {
    match language {
        Language::En => "en-us",
        Language::Ja => "ja-jp",
    }
}

/// Day between 06:00 and 18:00 local time.
pub fn is_daytime(viewer: &Viewer) -> bool {
    (6..18).contains(&viewer.local_now().hour())
}

impl WeatherProvider for AccuWeather {
    fn name(&self) -> &'static str {
        "accuweather"
    }

    #[tracing::instrument(skip(self, viewer), fields(location_key = %self.location_key))]
    fn fetch(&self, viewer: &Viewer) -> anyhow::Result<Weather> {
        let url = format!(
            "{}/forecasts/v1/daily/1day/{}",
            self.base_url, self.location_key
        );
        let metric = matches!(self.units, Units::Metric);
        let request = self.client.get(url).query(&[
            ("apikey", self.api_key.as_str()),
            ("details", "true"),
            ("metric", if metric { "true" } else { "false" }),
            ("language", api_language(viewer.language)),
        ]);

        let response: DailyResponse = http::send_json(request, "AccuWeather daily forecast")
            .context("AccuWeather request failed")?;
        let forecast = response
            .daily_forecasts
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("AccuWeather returned no daily forecast"))?;

        let daytime = is_daytime(viewer);
        debug!(daytime, "selected forecast period");
        let period = if daytime { forecast.day } else { forecast.night };

        let weather = Weather {
            temperature_min: forecast.temperature.minimum.value,
            temperature_max: forecast.temperature.maximum.value,
            icon: icon_name(period.icon, daytime).to_string(),
            description: period.short_phrase,
        };
        info!(icon = %weather.icon, "fetched AccuWeather forecast");
        Ok(weather)
    }
}

/// AccuWeather icon number to the template's icon id.
pub fn icon_name(code: u32, daytime: bool) -> &'static str {
    let pick = |day: &'static str, night: &'static str| if daytime { day } else { night };
    match code {
        1 | 2 | 33 | 34 => pick("clear_sky_day", "clearnight"),
        3 | 35 => pick("few_clouds", "partlycloudynight"),
        4 | 36 => pick("scattered_clouds", "partlycloudynight"),
        5 | 37 => "haze",
        6 | 38 => pick("mostly_cloudy", "mostly_cloudy_night"),
        7 => pick("climacell_cloudy", "mostly_cloudy_night"),
        8 => "overcast",
        11 => "climacell_fog",
        12 => pick("climacell_rain_light", "rain_night_light"),
        13 | 14 | 39 | 40 => pick("day_partly_cloudy_rain", "night_partly_cloudy_rain"),
        15 | 41 | 42 => "thundershower_rain",
        16 | 17 => "scattered_thundershowers",
        18 => pick("climacell_rain", "rain_night"),
        19..=21 | 43 => "climacell_flurries",
        22 | 23 | 44 => "snow",
        24 | 26 => "climacell_freezing_rain",
        25 | 29 => "sleet",
        30 => "very_hot",
        31 => "cold",
        32 => "wind",
        _ => "clear_sky_day",
    }
}
