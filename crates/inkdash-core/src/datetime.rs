use chrono::{
  DateTime,
  Duration,
  FixedOffset,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  NaiveTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;

/// A timezone-aware point in time. Every
/// value leaving the normalizer carries an
/// explicit offset.
pub type Instant = DateTime<FixedOffset>;

/// Date/time values as they arrive from a
/// calendar backend, before normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawTime {
  /// Date-only granularity (all-day).
  Date(NaiveDate),
  /// Wall-clock time with no offset.
  Floating(NaiveDateTime),
  /// Time with an explicit offset.
  Zoned(DateTime<FixedOffset>)
}

impl RawTime {
  pub fn is_date(&self) -> bool {
    matches!(self, RawTime::Date(_))
  }

  /// Shifts the value by `by`, keeping
  /// date granularity when the shift is a
  /// whole number of days.
  pub fn shift(
    self,
    by: Duration
  ) -> RawTime {
    let shifted = match self {
      | RawTime::Date(date) => {
        if by.num_seconds() % 86_400 == 0 {
          date
            .checked_add_signed(by)
            .map(RawTime::Date)
        } else {
          date
            .and_time(NaiveTime::MIN)
            .checked_add_signed(by)
            .map(RawTime::Floating)
        }
      }
      | RawTime::Floating(naive) => naive
        .checked_add_signed(by)
        .map(RawTime::Floating),
      | RawTime::Zoned(dt) => dt
        .checked_add_signed(by)
        .map(RawTime::Zoned)
    };

    shifted.unwrap_or_else(|| {
      tracing::warn!(
        value = ?self,
        seconds = by.num_seconds(),
        "time shift out of range; keeping original value"
      );
      self
    })
  }
}

/// Converts any raw representation into
/// an [`Instant`]. Naive values (dates and
/// floating datetimes) are anchored in UTC.
#[must_use]
pub fn normalize(
  value: RawTime
) -> Instant {
  match value {
    | RawTime::Date(date) => date
      .and_time(NaiveTime::MIN)
      .and_utc()
      .fixed_offset(),
    | RawTime::Floating(naive) => {
      naive.and_utc().fixed_offset()
    }
    | RawTime::Zoned(dt) => dt
  }
}

/// End resolution order: explicit end,
/// then start plus duration, then start.
/// A date-only start with neither gets the
/// iCalendar one-day default.
#[must_use]
pub fn resolve_end(
  start: RawTime,
  end: Option<RawTime>,
  duration: Option<Duration>
) -> RawTime {
  if let Some(end) = end {
    return end;
  }
  if let Some(duration) = duration {
    return start.shift(duration);
  }
  if start.is_date() {
    return start.shift(Duration::days(1));
  }
  start
}

/// Last second of the UTC day `end` falls
/// on.
#[must_use]
pub fn end_of_day(
  end: Instant
) -> Instant {
  let last_second =
    NaiveTime::from_hms_opt(23, 59, 59)
      .unwrap_or(NaiveTime::MIN);
  end
    .with_timezone(&Utc)
    .date_naive()
    .and_time(last_second)
    .and_utc()
    .fixed_offset()
}

/// Parses an RFC 5545 / ISO 8601 duration
/// such as `P1D`, `PT1H30M`, `-P2W`.
pub fn parse_duration(
  input: &str
) -> Option<Duration> {
  let duration_re = Regex::new(
    r"^(?P<sign>[+-])?P(?:(?P<w>\d+)W)?(?:(?P<d>\d+)D)?(?:T(?:(?P<h>\d+)H)?(?:(?P<m>\d+)M)?(?:(?P<s>\d+)S)?)?$",
  )
  .ok()?;
  let caps =
    duration_re.captures(input.trim())?;

  let units = [
    ("w", 7 * 86_400),
    ("d", 86_400),
    ("h", 3_600),
    ("m", 60),
    ("s", 1)
  ];
  let mut seconds = 0_i64;
  let mut seen = false;
  for (name, scale) in units {
    if let Some(value) = caps.name(name) {
      seen = true;
      seconds += value
        .as_str()
        .parse::<i64>()
        .ok()?
        .checked_mul(scale)?;
    }
  }
  if !seen {
    return None;
  }

  if caps
    .name("sign")
    .is_some_and(|sign| sign.as_str() == "-")
  {
    seconds = -seconds;
  }
  Duration::try_seconds(seconds)
}

/// Parses an iCalendar DATE / DATE-TIME
/// value. `tzid` is the `TZID` parameter
/// of the property, if any.
pub fn parse_ical_value(
  raw: &str,
  tzid: Option<&str>
) -> Option<RawTime> {
  let raw = raw.trim();
  if raw.is_empty() {
    return None;
  }

  if raw.len() == 8
    && let Ok(date) =
      NaiveDate::parse_from_str(
        raw, "%Y%m%d"
      )
  {
    return Some(RawTime::Date(date));
  }

  if raw.ends_with('Z')
    && let Ok(naive) =
      NaiveDateTime::parse_from_str(
        raw,
        "%Y%m%dT%H%M%SZ"
      )
  {
    return Some(RawTime::Zoned(
      naive.and_utc().fixed_offset()
    ));
  }

  if let Ok(parsed) =
    DateTime::parse_from_rfc3339(raw)
  {
    return Some(RawTime::Zoned(parsed));
  }

  let naive =
    NaiveDateTime::parse_from_str(
      raw,
      "%Y%m%dT%H%M%S"
    )
    .ok()?;

  let Some(tzid) = tzid else {
    return Some(RawTime::Floating(naive));
  };
  match parse_timezone(tzid, "TZID") {
    | Some(tz) => localize(tz, naive)
      .map(RawTime::Zoned),
    | None => {
      tracing::warn!(
        tzid,
        "unknown TZID; treating value as floating"
      );
      Some(RawTime::Floating(naive))
    }
  }
}

/// Parses `YYYY-MM-DD` or an RFC 3339
/// timestamp, as used by JSON calendar
/// APIs.
pub fn parse_api_value(
  raw: &str
) -> Option<RawTime> {
  let raw = raw.trim();
  if let Ok(date) =
    NaiveDate::parse_from_str(
      raw, "%Y-%m-%d"
    )
  {
    return Some(RawTime::Date(date));
  }
  if let Ok(parsed) =
    DateTime::parse_from_rfc3339(raw)
  {
    return Some(RawTime::Zoned(parsed));
  }
  NaiveDateTime::parse_from_str(
    raw,
    "%Y-%m-%dT%H:%M:%S%.f"
  )
  .ok()
  .map(RawTime::Floating)
}

/// Resolves a wall-clock time in `tz`.
/// Ambiguous times pick the earliest
/// instant; nonexistent times yield None.
pub fn localize(
  tz: Tz,
  naive: NaiveDateTime
) -> Option<Instant> {
  match tz.from_local_datetime(&naive) {
    | LocalResult::Single(dt) => {
      Some(dt.fixed_offset())
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::debug!(
        first = %first,
        second = %second,
        "ambiguous local datetime; using earliest"
      );
      let chosen = if first <= second {
        first
      } else {
        second
      };
      Some(chosen.fixed_offset())
    }
    | LocalResult::None => {
      tracing::warn!(
        timezone = %tz,
        naive = %naive,
        "local datetime does not exist in timezone"
      );
      None
    }
  }
}

/// Picks the viewer timezone from the
/// configured value, then the `TZ`
/// environment value, falling back to UTC.
pub fn resolve_timezone(
  configured: Option<&str>,
  tz_env: Option<&str>
) -> Tz {
  if let Some(raw) = configured
    && let Some(tz) =
      parse_timezone(raw, "TIMEZONE")
  {
    return tz;
  }

  if let Some(raw) = tz_env
    && let Some(tz) = parse_timezone(
      raw.trim_start_matches(':'),
      "TZ"
    )
  {
    return tz;
  }

  tracing::warn!(
    "no usable timezone configured; using UTC"
  );
  chrono_tz::UTC
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw
    .trim()
    .trim_matches('"')
    .trim_start_matches('/');
  if trimmed.is_empty() {
    tracing::debug!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::debug!(
        source,
        timezone = %trimmed,
        "parsed timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::warn!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Current time, the only clock read in
/// the crate.
pub fn now_utc() -> DateTime<Utc> {
  Utc::now()
}
