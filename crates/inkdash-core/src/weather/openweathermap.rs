use anyhow::anyhow;
use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::info;

use super::{Location, Weather, WeatherProvider};
use crate::format::Viewer;
use crate::providers::http;

pub const ONE_CALL_URL: &str = "https://api.openweathermap.org/data/3.0/onecall";

#[derive(Debug, Deserialize)]
struct OneCall {
    #[serde(default)]
    daily: Vec<Daily>,
}

#[derive(Debug, Deserialize)]
struct Daily {
    temp: DailyTemp,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct DailyTemp {
    min: f64,
    max: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    icon: String,
    #[serde(default)]
    description: String,
}

pub struct OpenWeatherMap {
    client: Client,
    url: String,
    api_key: String,
    location: Location,
}

impl OpenWeatherMap {
    pub fn new(client: Client, api_key: String, location: Location) -> Self {
        Self::with_url(client, ONE_CALL_URL, api_key, location)
    }

    pub fn with_url(client: Client, url: &str, api_key: String, location: Location) -> Self {
        Self {
            client,
            url: url.to_string(),
            api_key,
            location,
        }
    }
}

impl WeatherProvider for OpenWeatherMap {
    fn name(&self) -> &'static str {
        "openweathermap"
    }

    #[tracing::instrument(skip(self, viewer))]
    fn fetch(&self, viewer: &Viewer) -> anyhow::Result<Weather> {
        let request = self.client.get(&self.url).query(&[
            ("lat", self.location.latitude.to_string()),
            ("lon", self.location.longitude.to_string()),
            ("appid", self.api_key.clone()),
            ("exclude", "current,minutely,hourly,alerts".to_string()),
            ("units", self.location.units.api_name().to_string()),
            ("lang", viewer.language.code().to_string()),
        ]);

        let response: OneCall = http::send_json(request, "OpenWeatherMap One Call")?;
        let today = response
            .daily
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("OpenWeatherMap returned no daily forecast"))?;
        let condition = today
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("OpenWeatherMap daily forecast has no condition"))?;

        let weather = Weather {
            temperature_min: today.temp.min,
            temperature_max: today.temp.max,
            icon: icon_name(&condition.icon).to_string(),
            description: capitalize(&condition.description),
        };
        info!(icon = %weather.icon, "fetched OpenWeatherMap forecast");
        Ok(weather)
    }
}

/// OpenWeatherMap icon code (`01d`, `10n`, ...) to the template's icon id.
pub fn icon_name(code: &str) -> &'static str {
    let night = code.ends_with('n');
    let pick = |day: &'static str, night_icon: &'static str| if night { night_icon } else { day };
    match code.get(..2).unwrap_or_default() {
        "01" => pick("clear_sky_day", "clearnight"),
        "02" => pick("few_clouds", "partlycloudynight"),
        "03" => pick("scattered_clouds", "partlycloudynight"),
        "04" => pick("mostly_cloudy", "mostly_cloudy_night"),
        "09" => pick("climacell_rain_light", "rain_night_light"),
        "10" => pick("climacell_rain", "rain_night"),
        "11" => "thundershower_rain",
        "13" => "snow",
        "50" => "climacell_fog",
        _ => "clear_sky_day",
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
