use std::fs;
use std::path::Path;

use chrono::{TimeZone, Utc};
use inkdash_core::OutputMap;
use inkdash_core::config::Config;
use inkdash_core::layout::LayoutPolicy;
use inkdash_core::providers::http;
use inkdash_core::screens::{self, Context};
use tempfile::tempdir;

fn config(pairs: &[(&str, &str)]) -> Config {
    let mut cfg = Config::default();
    cfg.apply_overrides(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
    );
    cfg
}

fn context(workdir: &Path, pairs: &[(&str, &str)]) -> Context {
    let now = Utc
        .with_ymd_and_hms(2024, 1, 2, 8, 0, 0)
        .single()
        .expect("valid now");
    Context::new(
        config(pairs),
        workdir.to_path_buf(),
        now,
        http::client().expect("client"),
    )
}

/// One `[key]=KEY` line per placeholder. The lowercase label never matches,
/// so a rendered line reads `[key]=value`.
fn write_template(path: &Path, keys: &[String]) {
    let body: String = keys
        .iter()
        .map(|key| format!("[{}]={key}\n", key.to_lowercase()))
        .collect();
    fs::write(path, body).expect("write template");
}

fn read_values(path: &Path) -> OutputMap {
    fs::read_to_string(path)
        .expect("read output")
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| {
            (
                k.trim_matches(['[', ']']).to_uppercase(),
                v.to_string(),
            )
        })
        .collect()
}

fn layout_keys() -> Vec<String> {
    let mut keys = vec!["DIVIDER_Y".to_string(), "TIME_NOW".to_string(), "DAY_ONE".to_string()];
    for i in 1..=10 {
        for prefix in ["EVENT_DATE_Y", "EVENT_DESC_Y", "TODO_DATE_Y", "TODO_DESC_Y"] {
            keys.push(format!("{prefix}_{i}"));
        }
    }
    keys
}

fn y(values: &OutputMap, key: &str) -> i32 {
    values[key].parse().expect("numeric coordinate")
}

#[test]
fn even_spacing_layout_with_eight_items() {
    let dir = tempdir().expect("tempdir");
    write_template(&dir.path().join("screen-template.7.svg"), &layout_keys());
    let ctx = context(
        dir.path(),
        &[
            ("LAYOUT_POLICY", "even-spacing"),
            ("TOTAL_ITEMS", "8"),
            ("TODO_COUNT", "3"),
        ],
    );

    screens::run_layout(&ctx).expect("layout command");
    let values = read_values(&dir.path().join("screen-output-weather.svg"));

    let mut coords = Vec::new();
    for i in 1..=5 {
        coords.push(y(&values, &format!("EVENT_DATE_Y_{i}")));
        coords.push(y(&values, &format!("EVENT_DESC_Y_{i}")));
    }
    coords.push(y(&values, "DIVIDER_Y"));
    for i in 1..=3 {
        coords.push(y(&values, &format!("TODO_DATE_Y_{i}")));
        coords.push(y(&values, &format!("TODO_DESC_Y_{i}")));
    }

    assert!(coords.windows(2).all(|w| w[0] < w[1]), "{coords:?}");
    assert!(coords.iter().all(|c| (30..=480).contains(c)), "{coords:?}");
    assert_eq!(values["EVENT_DATE_Y_6"], "0");
    assert_eq!(values["TODO_DATE_Y_4"], "0");
    assert_eq!(values["TIME_NOW"], "08:00");
    assert_eq!(values["DAY_ONE"], "Jan 2");
}

#[test]
fn invalid_todo_count_falls_back_to_three() {
    let dir = tempdir().expect("tempdir");
    let ctx = context(dir.path(), &[("TODO_COUNT", "abc")]);
    assert_eq!(ctx.settings.todo_count, 3);
    assert_eq!(ctx.settings.layout_policy, LayoutPolicy::FixedCount);

    let layout = screens::layout_for(&ctx.settings);
    assert_eq!(layout.todo_count, 3);
    assert_eq!(layout.todos.len(), 3);
}

#[test]
fn missing_template_aborts_before_writing() {
    let dir = tempdir().expect("tempdir");
    let ctx = context(dir.path(), &[]);
    let err = screens::run_layout(&ctx).expect_err("no template");
    assert!(format!("{err:#}").contains("screen-template.7.svg"));
    assert!(!dir.path().join("screen-output-weather.svg").exists());
}

#[test]
fn month_command_updates_output_in_place() {
    let dir = tempdir().expect("tempdir");
    let output = dir.path().join("screen-output-weather.svg");
    fs::write(&output, "<svg>MONTH_CAL TIME_NOW</svg>").expect("seed output");

    screens::run_month(&context(dir.path(), &[])).expect("month command");
    let text = fs::read_to_string(&output).expect("read output");
    assert!(text.contains(r#"id="month-cal-inner""#));
    assert!(text.ends_with("</svg> TIME_NOW</svg>"));
}

const FEED: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:-//inkdash//test//EN\r\n\
BEGIN:VEVENT\r\n\
UID:past\r\n\
SUMMARY:Early call\r\n\
DTSTART:20240102T070000Z\r\n\
DTEND:20240102T073000Z\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:later\r\n\
SUMMARY:Dentist\r\n\
DTSTART:20240105T140000Z\r\n\
DTEND:20240105T150000Z\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:standup\r\n\
SUMMARY:Launch 🎉\r\n\
DTSTART:20240102T090000Z\r\n\
DURATION:PT15M\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:holiday\r\n\
SUMMARY:Holiday\r\n\
DTSTART;VALUE=DATE:20240102\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

#[test]
fn render_pass_with_ics_feed() {
    let mut server = mockito::Server::new();
    let feed = server
        .mock("GET", "/family.ics")
        .with_status(200)
        .with_header("content-type", "text/calendar")
        .with_body(FEED)
        .create();

    let dir = tempdir().expect("tempdir");
    let mut keys = layout_keys();
    for i in 1..=5 {
        keys.push(format!("CAL_DATETIME_{i}"));
        keys.push(format!("CAL_DESC_{i}"));
    }
    for i in 1..=10 {
        keys.push(format!("CAL_DATETIME_START_{i}"));
    }
    keys.push("TODO_DESC_1".to_string());
    keys.push("ALERT_MESSAGE_VISIBILITY".to_string());
    write_template(&dir.path().join("screen-template.7.svg"), &keys);

    let url = format!("{}/family.ics", server.url());
    let ctx = context(
        dir.path(),
        &[
            ("ICS_CALENDAR_URL", url.as_str()),
            ("LAYOUT_POLICY", "even-spacing"),
            ("TOTAL_ITEMS", "8"),
            ("TODO_COUNT", "3"),
        ],
    );

    screens::run_render(&ctx).expect("render command");
    feed.assert();

    let values = read_values(&dir.path().join("screen-output-weather.svg"));
    assert_eq!(values["CAL_DESC_1"], "Holiday");
    assert_eq!(values["CAL_DATETIME_1"], "Tue, Jan 2");
    assert_eq!(
        values["CAL_DESC_2"],
        r#"Launch <tspan style="font-family:emoji">🎉</tspan>"#
    );
    assert_eq!(values["CAL_DATETIME_2"], "Today 09:00 - 09:15");
    assert_eq!(values["CAL_DESC_3"], "Dentist");
    assert_eq!(values["CAL_DATETIME_3"], "Fri, Jan 5 14:00 - 15:00");
    assert_eq!(values["CAL_DESC_4"], "");
    assert_eq!(values["CAL_DATETIME_START_2"], "Today 09:00");
    for i in 4..=10 {
        assert_eq!(values[&format!("CAL_DATETIME_START_{i}")], "", "slot {i}");
    }
    assert_eq!(values["TODO_DESC_1"], "");
    assert_eq!(values["ALERT_MESSAGE_VISIBILITY"], "hidden");
    assert_eq!(y(&values, "EVENT_DATE_Y_1"), 30);
}

#[test]
fn unreachable_feed_is_skipped_not_fatal() {
    let mut server = mockito::Server::new();
    let _broken = server.mock("GET", "/broken.ics").with_status(500).create();
    let _ok = server
        .mock("GET", "/ok.ics")
        .with_status(200)
        .with_body(FEED)
        .create();

    let dir = tempdir().expect("tempdir");
    let output = dir.path().join("screen-output-weather.svg");
    fs::write(&output, "[cal_desc_1]=CAL_DESC_1\n[cal_desc_10]=CAL_DESC_10\n").expect("seed");

    let urls = format!("{0}/broken.ics {0}/ok.ics", server.url());
    let ctx = context(dir.path(), &[("ICS_CALENDAR_URL", urls.as_str())]);
    screens::run_calendar(&ctx).expect("calendar command");

    let values = read_values(&output);
    assert_eq!(values["CAL_DESC_1"], "Holiday");
    assert_eq!(values["CAL_DESC_10"], "");
}

#[test]
fn google_without_token_is_fatal() {
    let dir = tempdir().expect("tempdir");
    let err = screens::run_calendar(&context(dir.path(), &[])).expect_err("no token");
    assert!(format!("{err:#}").contains("GOOGLE_ACCESS_TOKEN"));
}
