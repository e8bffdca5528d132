use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::datetime;
use crate::format::Language;
use crate::layout::LayoutPolicy;

/// Fatal configuration problems. Everything recoverable is logged and
/// defaulted instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{source_name} is configured but {key} is not set")]
    MissingSetting {
        source_name: &'static str,
        key: &'static str,
    },
    #[error("weather provider `{0}` is not supported")]
    UnsupportedWeather(&'static str),
    #[error("no weather provider configured")]
    NoWeatherProvider,
    #[error("no calendar source with todo support configured (set CALDAV_CALENDAR_URLS)")]
    NoTodoSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarSource {
    Outlook {
        calendar_id: String,
        access_token: String,
    },
    CalDav {
        urls: Vec<String>,
        username: Option<String>,
        password: Option<String>,
    },
    Ics {
        urls: Vec<String>,
    },
    Google {
        calendar_id: String,
        access_token: String,
    },
}

impl CalendarSource {
    /// Outlook, then CalDAV, then ICS, then Google.
    pub fn resolve(cfg: &Config) -> Result<Self, ConfigError> {
        if let Some(calendar_id) = cfg.get("OUTLOOK_CALENDAR_ID") {
            let access_token = cfg.get("OUTLOOK_ACCESS_TOKEN").ok_or(
                ConfigError::MissingSetting {
                    source_name: "Outlook calendar",
                    key: "OUTLOOK_ACCESS_TOKEN",
                },
            )?;
            info!(source = "outlook", "resolved calendar source");
            return Ok(Self::Outlook {
                calendar_id,
                access_token,
            });
        }

        let caldav_urls = cfg.get_list("CALDAV_CALENDAR_URLS");
        if !caldav_urls.is_empty() {
            info!(source = "caldav", collections = caldav_urls.len(), "resolved calendar source");
            return Ok(Self::CalDav {
                urls: caldav_urls,
                username: cfg.get("CALDAV_USERNAME"),
                password: cfg.get("CALDAV_PASSWORD"),
            });
        }

        let ics_urls = cfg.get_list("ICS_CALENDAR_URL");
        if !ics_urls.is_empty() {
            info!(source = "ics", feeds = ics_urls.len(), "resolved calendar source");
            return Ok(Self::Ics { urls: ics_urls });
        }

        let calendar_id = cfg
            .get("GOOGLE_CALENDAR_ID")
            .unwrap_or_else(|| "primary".to_string());
        let access_token = cfg.get("GOOGLE_ACCESS_TOKEN").ok_or(
            ConfigError::MissingSetting {
                source_name: "Google calendar",
                key: "GOOGLE_ACCESS_TOKEN",
            },
        )?;
        info!(source = "google", "resolved calendar source");
        Ok(Self::Google {
            calendar_id,
            access_token,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Outlook { .. } => "outlook",
            Self::CalDav { .. } => "caldav",
            Self::Ics { .. } => "ics",
            Self::Google { .. } => "google",
        }
    }

    pub fn supports_todos(&self) -> bool {
        matches!(self, Self::CalDav { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WeatherSource {
    AccuWeather {
        api_key: String,
        location_key: String,
    },
    OpenWeatherMap {
        api_key: String,
    },
}

/// Provider config keys in priority order.
const WEATHER_KEYS: &[(&str, &str)] = &[
    ("visualcrossing", "VISUALCROSSING_APIKEY"),
    ("met_eireann", "WEATHER_MET_EIREANN"),
    ("weathergov", "WEATHERGOV_SELF_IDENTIFICATION"),
    ("metno", "METNO_SELF_IDENTIFICATION"),
    ("accuweather", "ACCUWEATHER_APIKEY"),
    ("metoffice", "METOFFICEDATAHUB_API_KEY"),
    ("openweathermap", "OPENWEATHERMAP_APIKEY"),
    ("climacell", "CLIMACELL_APIKEY"),
    ("smhi", "SMHI_SELF_IDENTIFICATION"),
];

impl WeatherSource {
    /// `Ok(None)` when no provider key is set at all.
    pub fn resolve(cfg: &Config) -> Result<Option<Self>, ConfigError> {
        let Some((name, key)) = WEATHER_KEYS.iter().find(|(_, key)| cfg.is_set(key)) else {
            debug!("no weather provider key set");
            return Ok(None);
        };
        let api_key = cfg.get(key).unwrap_or_default();

        let source = match *name {
            "accuweather" => {
                let location_key = cfg.get("ACCUWEATHER_LOCATIONKEY").ok_or(
                    ConfigError::MissingSetting {
                        source_name: "AccuWeather",
                        key: "ACCUWEATHER_LOCATIONKEY",
                    },
                )?;
                Self::AccuWeather {
                    api_key,
                    location_key,
                }
            }
            "openweathermap" => Self::OpenWeatherMap { api_key },
            other => return Err(ConfigError::UnsupportedWeather(other)),
        };
        info!(source = *name, "resolved weather provider");
        Ok(Some(source))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertSource {
    WeatherGov { user_agent: String },
    MetOfficeRss { url: String },
    MetEireannRss { url: String },
}

impl AlertSource {
    pub fn resolve(cfg: &Config) -> Option<Self> {
        if let Some(user_agent) = cfg.get("ALERT_WEATHERGOV_SELF_IDENTIFICATION") {
            return Some(Self::WeatherGov { user_agent });
        }
        if let Some(url) = cfg.get("ALERT_METOFFICE_FEED_URL") {
            return Some(Self::MetOfficeRss { url });
        }
        cfg.get("ALERT_MET_EIREANN_FEED_URL")
            .map(|url| Self::MetEireannRss { url })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    Metric,
    Imperial,
}

impl Units {
    pub fn from_format(format: Option<&str>) -> Self {
        match format {
            Some(value) if !value.trim().eq_ignore_ascii_case("celsius") => Units::Imperial,
            _ => Units::Metric,
        }
    }

    pub fn degrees(self) -> &'static str {
        match self {
            Units::Metric => "°C",
            Units::Imperial => "°F",
        }
    }

    pub fn api_name(self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }
}

/// Everything non-fatal, resolved once from [`Config`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub tz: Tz,
    pub language: Language,
    pub layout_policy: LayoutPolicy,
    pub todo_count: usize,
    pub total_items: usize,
    pub screen_layout: Option<String>,
    pub output_svg: String,
    pub include_past_events_for_today: bool,
    pub units: Units,
    pub latitude: f64,
    pub longitude: f64,
    pub alerts: Option<AlertSource>,
}

impl Settings {
    #[tracing::instrument(skip(cfg))]
    pub fn resolve(cfg: &Config) -> Self {
        let tz = datetime::resolve_timezone(cfg.get_str("TIMEZONE"), cfg.get_str("TZ"));
        let language = Language::resolve([
            cfg.get_str("LC_ALL"),
            cfg.get_str("LC_MESSAGES"),
            cfg.get_str("LANG"),
        ]);

        let layout_policy = match cfg.get_str("LAYOUT_POLICY") {
            None => LayoutPolicy::FixedCount,
            Some(raw) => raw.parse().unwrap_or_else(|err| {
                warn!(value = raw, error = %err, "unknown LAYOUT_POLICY; using fixed-count");
                LayoutPolicy::FixedCount
            }),
        };

        let settings = Self {
            tz,
            language,
            layout_policy,
            todo_count: cfg.get_count("TODO_COUNT", 3),
            total_items: cfg.get_count("TOTAL_ITEMS", 8),
            screen_layout: cfg.get("SCREEN_LAYOUT"),
            output_svg: cfg
                .get("OUTPUT_SVG")
                .unwrap_or_else(|| "screen-output-weather.svg".to_string()),
            include_past_events_for_today: cfg
                .get_bool("CALENDAR_INCLUDE_PAST_EVENTS_FOR_TODAY")
                .unwrap_or(false),
            units: Units::from_format(cfg.get_str("WEATHER_FORMAT")),
            latitude: cfg.get_f64("WEATHER_LATITUDE", 51.5077),
            longitude: cfg.get_f64("WEATHER_LONGITUDE", -0.1277),
            alerts: AlertSource::resolve(cfg),
        };
        debug!(
            tz = %settings.tz,
            language = settings.language.code(),
            policy = ?settings.layout_policy,
            todo_count = settings.todo_count,
            total_items = settings.total_items,
            "resolved settings"
        );
        settings
    }

    /// `screen-template.{layout}.svg`, with the command's default layout.
    pub fn template_name(&self, default_layout: &str) -> String {
        let layout = self.screen_layout.as_deref().unwrap_or(default_layout);
        format!("screen-template.{layout}.svg")
    }
}
