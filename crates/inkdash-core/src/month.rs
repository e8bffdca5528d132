use std::fmt::Write;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use tracing::debug;

use crate::format::Viewer;

const CELL_WIDTH: u32 = 40;
const CELL_HEIGHT: u32 = 30;
const FONT_SIZE: f64 = 26.0;
const HEADER_FONT_SIZE: f64 = 15.6;
const TODAY_RADIUS: u32 = 14;

/// Days of the viewer's current month laid out in week rows, `None` for
/// padding cells. Weeks start on the language's first weekday.
pub fn month_weeks(today: NaiveDate, first_weekday: Weekday) -> Vec<[Option<u32>; 7]> {
    let first = today.with_day(1).unwrap_or(today);
    let offset = (first.weekday().num_days_from_monday() + 7
        - first_weekday.num_days_from_monday())
        % 7;

    let mut weeks = Vec::new();
    let mut week = [None; 7];
    let mut column = offset as usize;
    let mut day = first;
    while day.month() == first.month() {
        week[column] = Some(day.day());
        column += 1;
        if column == 7 {
            weeks.push(week);
            week = [None; 7];
            column = 0;
        }
        match day.checked_add_days(Days::new(1)) {
            Some(next) => day = next,
            None => break,
        }
    }
    if column > 0 {
        weeks.push(week);
    }
    weeks
}

/// The `MONTH_CAL` fragment: a standalone `<svg>` with a weekday header
/// row and one row per week, today drawn white on a black disc.
#[tracing::instrument(skip(viewer))]
pub fn render(viewer: &Viewer) -> String {
    let today = viewer.today();
    let first_weekday = viewer.language.first_weekday();
    let weeks = month_weeks(today, first_weekday);

    let width = CELL_WIDTH * 7;
    let height = CELL_HEIGHT * (u32::try_from(weeks.len()).unwrap_or(6) + 1);
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" id="month-cal-inner">"#
    );

    let mut weekday = first_weekday;
    for column in 0..7 {
        let label: String = viewer.weekday_abbr(weekday).chars().take(2).collect();
        let _ = write!(
            svg,
            r#"<text x="{x}" y="20" font-size="{HEADER_FONT_SIZE}" text-anchor="middle" fill="black">{label}</text>"#,
            x = column * CELL_WIDTH + 20,
        );
        weekday = weekday.succ();
    }

    for (row, week) in (0_u32..).zip(weeks.iter()) {
        for (column, day) in (0_u32..).zip(week.iter()) {
            let Some(day) = day else {
                continue;
            };
            let x = column * CELL_WIDTH + 20;
            let y = (row + 2) * CELL_HEIGHT - 10;
            let (fill, weight) = if *day == today.day() {
                let _ = write!(
                    svg,
                    r#"<circle cx="{x}" cy="{cy}" r="{TODAY_RADIUS}" fill="black" />"#,
                    cy = y - 8,
                );
                ("white", "bold")
            } else {
                ("black", "normal")
            };
            let _ = write!(
                svg,
                r#"<text x="{x}" y="{y}" font-size="{FONT_SIZE}" text-anchor="middle" font-weight="{weight}" fill="{fill}">{day}</text>"#
            );
        }
    }

    svg.push_str("</svg>");
    debug!(weeks = weeks.len(), "rendered month grid");
    svg
}
