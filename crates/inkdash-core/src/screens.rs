use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, NaiveTime, Utc};
use reqwest::blocking::Client;
use tracing::{error, info, warn};

use crate::OutputMap;
use crate::aggregate;
use crate::config::Config;
use crate::datetime::{self, Instant};
use crate::format::{self, Viewer};
use crate::layout::{self, Layout, LayoutConstants};
use crate::model::{CalendarEvent, Todo};
use crate::month;
use crate::providers::{self, FetchWindow};
use crate::settings::{CalendarSource, ConfigError, Settings, WeatherSource};
use crate::template;
use crate::weather::{self, Location, alerts::Alerts};

/// Events and todos the template has slots for when a command fills them
/// without a layout.
pub const MAX_EVENT_RESULTS: usize = 10;
pub const MAX_TODO_RESULTS: usize = 10;

const LAYOUT_TEMPLATE_DEFAULT: &str = "7";
const WEATHER_TEMPLATE_DEFAULT: &str = "6";

/// Everything one invocation works with, resolved up front.
pub struct Context {
    pub config: Config,
    pub settings: Settings,
    pub viewer: Viewer,
    pub workdir: PathBuf,
    pub client: Client,
}

impl Context {
    pub fn new(config: Config, workdir: PathBuf, now: DateTime<Utc>, client: Client) -> Self {
        let settings = Settings::resolve(&config);
        let viewer = Viewer::new(now, settings.tz, settings.language);
        Self {
            config,
            settings,
            viewer,
            workdir,
            client,
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.workdir.join(&self.settings.output_svg)
    }

    pub fn template_path(&self, default_layout: &str) -> PathBuf {
        self.workdir
            .join(self.settings.template_name(default_layout))
    }

    fn now(&self) -> Instant {
        self.viewer.now.fixed_offset()
    }

    /// From now (or the start of the local day) to one year ahead.
    pub fn event_window(&self, limit: usize) -> FetchWindow {
        let now = self.now();
        let start = if self.settings.include_past_events_for_today {
            datetime::localize(self.viewer.tz, self.viewer.today().and_time(NaiveTime::MIN))
                .unwrap_or(now)
        } else {
            now
        };
        let end = self
            .viewer
            .now
            .checked_add_days(Days::new(365))
            .map_or(now, |end| end.fixed_offset());
        FetchWindow { start, end, limit }
    }
}

/// Clock and date values shared by the full-screen layouts.
pub fn header_output(viewer: &Viewer) -> OutputMap {
    let time_now = viewer.time_now();
    OutputMap::from([
        (
            "TIME_NOW_FONT_SIZE".to_string(),
            format::time_font_size(&time_now),
        ),
        ("HOUR_NOW".to_string(), time_now.clone()),
        ("TIME_NOW".to_string(), time_now),
        ("DAY_ONE".to_string(), viewer.header_date()),
        ("DAY_NAME".to_string(), viewer.day_name()),
    ])
}

pub fn layout_for(settings: &Settings) -> Layout {
    layout::compute(
        settings.layout_policy,
        &LayoutConstants::default(),
        settings.todo_count,
        settings.total_items,
    )
}

/// `CAL_DATETIME_i`, `CAL_DATETIME_START_i` and `CAL_DESC_i` for `slots`
/// slots; slots without an event are blank.
pub fn calendar_output(viewer: &Viewer, events: &[CalendarEvent], slots: usize) -> OutputMap {
    let mut out = OutputMap::new();
    for index in 1..=slots {
        let (full, start_only, summary) = match events.get(index - 1) {
            Some(event) => (
                viewer.event_datetime(event.start, event.end, event.all_day, false),
                viewer.event_datetime(event.start, event.end, event.all_day, true),
                event.summary.clone(),
            ),
            None => Default::default(),
        };
        out.insert(format!("CAL_DATETIME_{index}"), format::markup(&full));
        out.insert(
            format!("CAL_DATETIME_START_{index}"),
            format::markup(&start_only),
        );
        out.insert(format!("CAL_DESC_{index}"), format::markup(&summary));
    }
    out
}

/// `TODO_DATETIME_i` and `TODO_DESC_i`, blank past the last todo.
pub fn todo_output(viewer: &Viewer, todos: &[Todo], slots: usize) -> OutputMap {
    let mut out = OutputMap::new();
    for index in 1..=slots {
        let (due, summary) = match todos.get(index - 1) {
            Some(todo) => (viewer.todo_due(todo.due, todo.due_is_date), todo.summary.clone()),
            None => Default::default(),
        };
        out.insert(format!("TODO_DATETIME_{index}"), format::markup(&due));
        out.insert(format!("TODO_DESC_{index}"), format::markup(&summary));
    }
    out
}

pub fn month_output(viewer: &Viewer) -> OutputMap {
    OutputMap::from([("MONTH_CAL".to_string(), month::render(viewer))])
}

#[tracing::instrument(skip(ctx, source), fields(source = source.name()))]
pub fn fetch_events(
    ctx: &Context,
    source: &CalendarSource,
    limit: usize,
) -> anyhow::Result<Vec<CalendarEvent>> {
    let window = ctx.event_window(limit);
    let provider = providers::calendar_provider(source, ctx.client.clone());
    let fetched = provider.fetch_events(&window)?;
    Ok(aggregate::select_events(fetched, ctx.now(), limit))
}

#[tracing::instrument(skip(ctx, source), fields(source = source.name()))]
pub fn fetch_todos(
    ctx: &Context,
    source: &CalendarSource,
    limit: usize,
) -> anyhow::Result<Vec<Todo>> {
    let provider = providers::todo_provider(source, ctx.client.clone())?;
    Ok(aggregate::select_todos(provider.fetch_todos()?, limit))
}

/// Weather plus alert values. `None` when the forecast could not be
/// fetched; the caller then leaves the SVG alone.
pub fn weather_output(ctx: &Context, source: &WeatherSource) -> Option<OutputMap> {
    let settings = &ctx.settings;
    let provider = weather::provider(
        source,
        ctx.client.clone(),
        Location {
            latitude: settings.latitude,
            longitude: settings.longitude,
            units: settings.units,
        },
    );
    let forecast = match provider.fetch(&ctx.viewer) {
        Ok(forecast) => forecast,
        Err(err) => {
            error!(
                provider = provider.name(),
                error = %format!("{err:#}"),
                "unable to fetch weather; SVG will not be updated"
            );
            return None;
        }
    };

    let mut out = weather::to_output(&forecast, settings.units);
    let message = Alerts::new(&ctx.client, settings.latitude, settings.longitude)
        .message(settings.alerts.as_ref());
    out.extend(weather::alerts::to_output(&message));
    Some(out)
}

fn write_screen(template: &Path, output: &Path, values: &OutputMap) -> anyhow::Result<()> {
    info!(template = %template.display(), keys = values.len(), "updating SVG");
    template::write(template, output, values)
}

#[tracing::instrument(skip_all)]
pub fn run_layout(ctx: &Context) -> anyhow::Result<()> {
    let mut values = header_output(&ctx.viewer);
    values.extend(layout_for(&ctx.settings).to_output());
    write_screen(
        &ctx.template_path(LAYOUT_TEMPLATE_DEFAULT),
        &ctx.output_path(),
        &values,
    )
}

#[tracing::instrument(skip_all)]
pub fn run_weather(ctx: &Context) -> anyhow::Result<()> {
    let source = WeatherSource::resolve(&ctx.config)?.ok_or(ConfigError::NoWeatherProvider)?;
    let Some(weather) = weather_output(ctx, &source) else {
        return Ok(());
    };
    let mut values = header_output(&ctx.viewer);
    values.extend(weather);
    write_screen(
        &ctx.template_path(WEATHER_TEMPLATE_DEFAULT),
        &ctx.output_path(),
        &values,
    )
}

#[tracing::instrument(skip_all)]
pub fn run_calendar(ctx: &Context) -> anyhow::Result<()> {
    let source = CalendarSource::resolve(&ctx.config)?;
    let events = fetch_events(ctx, &source, MAX_EVENT_RESULTS)?;
    info!(count = events.len(), "updating SVG with events");
    let output = ctx.output_path();
    write_screen(
        &output,
        &output,
        &calendar_output(&ctx.viewer, &events, MAX_EVENT_RESULTS),
    )
}

#[tracing::instrument(skip_all)]
pub fn run_todo(ctx: &Context) -> anyhow::Result<()> {
    let source = CalendarSource::resolve(&ctx.config)?;
    let todos = fetch_todos(ctx, &source, MAX_TODO_RESULTS)?;
    info!(count = todos.len(), "updating SVG with todos");
    let output = ctx.output_path();
    write_screen(
        &output,
        &output,
        &todo_output(&ctx.viewer, &todos, MAX_TODO_RESULTS),
    )
}

#[tracing::instrument(skip_all)]
pub fn run_month(ctx: &Context) -> anyhow::Result<()> {
    let output = ctx.output_path();
    write_screen(&output, &output, &month_output(&ctx.viewer))
}

/// Builds every value in one pass and writes the template once. Event and
/// todo counts follow the layout.
#[tracing::instrument(skip_all)]
pub fn run_render(ctx: &Context) -> anyhow::Result<()> {
    let calendar = CalendarSource::resolve(&ctx.config)?;
    let weather_source = WeatherSource::resolve(&ctx.config)?;
    let layout = layout_for(&ctx.settings);

    let mut values = header_output(&ctx.viewer);
    values.extend(layout.to_output());

    match weather_source {
        Some(source) => match weather_output(ctx, &source) {
            Some(weather) => values.extend(weather),
            None => return Ok(()),
        },
        None => {
            info!("no weather provider configured; rendering without weather");
            values.extend(weather::alerts::to_output(""));
        }
    }

    let events = fetch_events(ctx, &calendar, layout.event_count)?;
    values.extend(calendar_output(&ctx.viewer, &events, layout.event_count));

    if layout.todo_count > 0 {
        if calendar.supports_todos() {
            let todos = fetch_todos(ctx, &calendar, layout.todo_count)?;
            values.extend(todo_output(&ctx.viewer, &todos, layout.todo_count));
        } else {
            warn!(
                source = calendar.name(),
                "calendar source has no todos; todo slots left empty"
            );
            values.extend(todo_output(&ctx.viewer, &[], layout.todo_count));
        }
    }

    values.extend(month_output(&ctx.viewer));

    write_screen(
        &ctx.template_path(LAYOUT_TEMPLATE_DEFAULT),
        &ctx.output_path(),
        &values,
    )
}
