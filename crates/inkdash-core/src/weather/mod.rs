pub mod accuweather;
pub mod alerts;
pub mod openweathermap;

use reqwest::blocking::Client;
use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use crate::OutputMap;
use crate::format::Viewer;
use crate::settings::{Units, WeatherSource};

const DESCRIPTION_WIDTH: usize = 15;
const DESCRIPTION_LINES: usize = 2;
const PLACEHOLDER: &str = "...";

/// Today's forecast, already mapped to local icon names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Weather {
    pub temperature_min: f64,
    pub temperature_max: f64,
    pub icon: String,
    pub description: String,
}

pub trait WeatherProvider {
    fn name(&self) -> &'static str;

    fn fetch(&self, viewer: &Viewer) -> anyhow::Result<Weather>;
}

pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub units: Units,
}

pub fn provider(
    source: &WeatherSource,
    client: Client,
    location: Location,
) -> Box<dyn WeatherProvider> {
    match source {
        WeatherSource::AccuWeather {
            api_key,
            location_key,
        } => Box::new(accuweather::AccuWeather::new(
            client,
            api_key.clone(),
            location_key.clone(),
            location.units,
        )),
        WeatherSource::OpenWeatherMap { api_key } => Box::new(
            openweathermap::OpenWeatherMap::new(client, api_key.clone(), location),
        ),
    }
}

/// `LOW_ONE`, `HIGH_ONE`, `ICON_ONE` and the two description lines.
pub fn to_output(weather: &Weather, units: Units) -> OutputMap {
    let (first, second) = wrap_description(&weather.description);
    let degrees = units.degrees();
    OutputMap::from([
        (
            "LOW_ONE".to_string(),
            format!("{}{degrees}", whole_degrees(weather.temperature_min)),
        ),
        (
            "HIGH_ONE".to_string(),
            format!("{}{degrees}", whole_degrees(weather.temperature_max)),
        ),
        ("ICON_ONE".to_string(), weather.icon.clone()),
        ("WEATHER_DESC_1".to_string(), first),
        ("WEATHER_DESC_2".to_string(), second),
    ])
}

/// Rounded, without a `-0`.
fn whole_degrees(value: f64) -> f64 {
    value.round() + 0.0
}

/// Splits a forecast phrase over two template lines. Words are never broken;
/// text that needs more than two lines ends in `...`.
pub fn wrap_description(description: &str) -> (String, String) {
    let description = description.trim();
    if description.width() < DESCRIPTION_WIDTH {
        return (description.to_string(), String::new());
    }

    let mut lines: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_width = 0;
    for word in description.split_whitespace() {
        let extra = if current.is_empty() {
            word.width()
        } else {
            word.width() + 1
        };
        if !current.is_empty() && current_width + extra > DESCRIPTION_WIDTH {
            lines.push(std::mem::take(&mut current));
            current_width = 0;
        }
        current_width += if current.is_empty() {
            word.width()
        } else {
            word.width() + 1
        };
        current.push(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    let mut lines: Vec<String> = if lines.len() <= DESCRIPTION_LINES {
        lines.iter().map(|words| words.join(" ")).collect()
    } else {
        truncate_lines(&lines)
    };
    let second = if lines.len() > 1 {
        lines.swap_remove(1)
    } else {
        String::new()
    };
    let first = lines.into_iter().next().unwrap_or_default();
    (first, second)
}

/// The last kept line loses words until the placeholder fits; when nothing
/// fits, the placeholder moves to the line before.
fn truncate_lines(lines: &[Vec<&str>]) -> Vec<String> {
    let mut kept: Vec<String> = lines[..DESCRIPTION_LINES - 1]
        .iter()
        .map(|words| words.join(" "))
        .collect();

    let mut last = lines[DESCRIPTION_LINES - 1].clone();
    while !last.is_empty() {
        let joined = last.join(" ");
        if joined.width() + PLACEHOLDER.width() <= DESCRIPTION_WIDTH {
            kept.push(format!("{joined}{PLACEHOLDER}"));
            return kept;
        }
        last.pop();
    }

    if let Some(previous) = kept.last_mut()
        && previous.width() + PLACEHOLDER.width() <= DESCRIPTION_WIDTH
    {
        previous.push_str(PLACEHOLDER);
        return kept;
    }
    kept.push(PLACEHOLDER.to_string());
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_descriptions_stay_on_one_line() {
        assert_eq!(
            wrap_description("Sunny"),
            ("Sunny".to_string(), String::new())
        );
    }

    #[test]
    fn wraps_at_fifteen_columns() {
        assert_eq!(
            wrap_description("Partly sunny with showers"),
            ("Partly sunny".to_string(), "with showers".to_string())
        );
    }

    #[test]
    fn truncates_to_two_lines_with_placeholder() {
        assert_eq!(
            wrap_description("Mostly cloudy with thunderstorms and gusty winds"),
            ("Mostly cloudy".to_string(), "with...".to_string())
        );
    }

    #[test]
    fn long_words_are_not_broken() {
        let (first, second) = wrap_description("Thunderstormsandhail later");
        assert_eq!(first, "Thunderstormsandhail");
        assert_eq!(second, "later");
    }

    #[test]
    fn output_rounds_temperatures() {
        let weather = Weather {
            temperature_min: 3.4,
            temperature_max: 11.6,
            icon: "few_clouds".to_string(),
            description: "Partly sunny".to_string(),
        };
        let out = to_output(&weather, Units::Metric);
        assert_eq!(out["LOW_ONE"], "3°C");
        assert_eq!(out["HIGH_ONE"], "12°C");
        assert_eq!(out["WEATHER_DESC_1"], "Partly sunny");
        assert_eq!(out["WEATHER_DESC_2"], "");
        assert_eq!(whole_degrees(-0.4).to_string(), "0");
    }
}
