use chrono::{DateTime, Days, Locale, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use unicode_segmentation::UnicodeSegmentation;

use crate::datetime::Instant;

const EMOJI_SPAN_OPEN: &str = r#"<tspan style="font-family:emoji">"#;
const EMOJI_SPAN_CLOSE: &str = "</tspan>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    En,
    Ja,
}

impl Language {
    /// Resolves the display language from locale values in priority order
    /// (`LC_ALL`, `LC_MESSAGES`, `LANG`). The first non-empty value decides;
    /// anything unrecognised is English.
    pub fn resolve<'a, I>(candidates: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let code = candidates
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty() && *value != "C" && *value != "POSIX")
            .and_then(|value| value.get(..2))
            .map(str::to_ascii_lowercase);

        match code.as_deref() {
            Some("ja") => Language::Ja,
            Some("en") => Language::En,
            other => {
                tracing::debug!(code = ?other, "unsupported or missing locale; using en");
                Language::En
            }
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ja => "ja",
        }
    }

    fn locale(self) -> Locale {
        match self {
            Language::En => Locale::en_US,
            Language::Ja => Locale::ja_JP,
        }
    }

    fn event_today(self) -> &'static str {
        match self {
            Language::En => "Today",
            Language::Ja => "本日",
        }
    }

    fn todo_today(self) -> &'static str {
        match self {
            Language::En => "Today",
            Language::Ja => "今日",
        }
    }

    fn tomorrow(self) -> &'static str {
        match self {
            Language::En => "Tomorrow",
            Language::Ja => "明日",
        }
    }

    fn day_pattern(self) -> &'static str {
        match self {
            Language::En => "%a, %b %-d",
            Language::Ja => "%-m月%-d日(%a)",
        }
    }

    fn short_date_pattern(self) -> &'static str {
        match self {
            Language::En => "%b %-d",
            Language::Ja => "%-m/%-d",
        }
    }

    fn header_date_pattern(self) -> &'static str {
        match self {
            Language::En => "%b %-d",
            Language::Ja => "%-m月 %-d日",
        }
    }

    pub fn first_weekday(self) -> Weekday {
        Weekday::Sun
    }
}

/// Who is looking at the screen: the injected "now", their timezone and
/// language. All presentation goes through this; nothing reads the clock.
#[derive(Debug, Clone, Copy)]
pub struct Viewer {
    pub now: DateTime<Utc>,
    pub tz: Tz,
    pub language: Language,
}

impl Viewer {
    pub fn new(now: DateTime<Utc>, tz: Tz, language: Language) -> Self {
        Self { now, tz, language }
    }

    pub fn local_now(&self) -> DateTime<Tz> {
        self.now.with_timezone(&self.tz)
    }

    pub fn today(&self) -> NaiveDate {
        self.local_now().date_naive()
    }

    fn tomorrow_date(&self) -> Option<NaiveDate> {
        self.today().checked_add_days(Days::new(1))
    }

    /// Formats a calendar date with a localized pattern.
    pub fn format_date(&self, date: NaiveDate, pattern: &str) -> String {
        date.and_time(NaiveTime::MIN)
            .and_utc()
            .format_localized(pattern, self.language.locale())
            .to_string()
    }

    /// Date line for one event slot. All-day events show only the day;
    /// timed events show Today/Tomorrow/day, the start time and, unless
    /// `start_only`, the end time.
    pub fn event_datetime(
        &self,
        start: Instant,
        end: Instant,
        all_day: bool,
        start_only: bool,
    ) -> String {
        let pattern = self.language.day_pattern();
        if all_day {
            return self.format_date(start.date_naive(), pattern);
        }

        let start_local = start.with_timezone(&self.tz);
        let end_local = end.with_timezone(&self.tz);
        let start_day = start_local.date_naive();

        let day = if start_day == self.today() {
            self.language.event_today().to_string()
        } else if Some(start_day) == self.tomorrow_date() {
            self.language.tomorrow().to_string()
        } else {
            self.format_date(start_day, pattern)
        };

        let start_time = start_local.format("%H:%M");
        if start_only {
            format!("{day} {start_time}")
        } else {
            format!("{day} {start_time} - {}", end_local.format("%H:%M"))
        }
    }

    /// Due line for one todo slot: Today/Tomorrow/short date, no time of day.
    pub fn todo_due(&self, due: Option<Instant>, due_is_date: bool) -> String {
        let Some(due) = due else {
            return String::new();
        };
        let due_day = if due_is_date {
            due.date_naive()
        } else {
            due.with_timezone(&self.tz).date_naive()
        };

        if due_day == self.today() {
            self.language.todo_today().to_string()
        } else if Some(due_day) == self.tomorrow_date() {
            self.language.tomorrow().to_string()
        } else {
            self.format_date(due_day, self.language.short_date_pattern())
        }
    }

    pub fn time_now(&self) -> String {
        self.local_now().format("%H:%M").to_string()
    }

    pub fn header_date(&self) -> String {
        self.format_date(self.today(), self.language.header_date_pattern())
    }

    pub fn day_name(&self) -> String {
        self.format_date(self.today(), "%A")
    }

    pub fn weekday_abbr(&self, weekday: Weekday) -> String {
        // 2024-01-07 is a Sunday.
        let sunday = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap_or_default();
        let date = sunday
            .checked_add_days(Days::new(u64::from(weekday.num_days_from_sunday())))
            .unwrap_or(sunday);
        self.format_date(date, "%a")
    }
}

/// Font size for the clock; shrinks for strings longer than `HH:MM`.
pub fn time_font_size(time: &str) -> String {
    let len = time.chars().count();
    if len > 6 {
        format!("{}px", 100 - (len as i64 - 5) * 5)
    } else {
        "100px".to_string()
    }
}

/// Escapes a value for embedding in SVG text and wraps each emoji in a
/// span that switches to the emoji font.
pub fn markup(value: &str) -> String {
    let escaped = quick_xml::escape::partial_escape(value);
    let mut out = String::with_capacity(escaped.len());
    for grapheme in escaped.graphemes(true) {
        if emojis::get(grapheme).is_some() {
            out.push_str(EMOJI_SPAN_OPEN);
            out.push_str(grapheme);
            out.push_str(EMOJI_SPAN_CLOSE);
        } else {
            out.push_str(grapheme);
        }
    }
    out
}
