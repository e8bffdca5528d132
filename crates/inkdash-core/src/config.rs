use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

/// Keys read from the process
/// environment. Anything else in the
/// environment is ignored.
pub const KNOWN_KEYS: &[&str] = &[
  "OUTLOOK_CALENDAR_ID",
  "OUTLOOK_ACCESS_TOKEN",
  "CALDAV_CALENDAR_URLS",
  "CALDAV_USERNAME",
  "CALDAV_PASSWORD",
  "ICS_CALENDAR_URL",
  "GOOGLE_CALENDAR_ID",
  "GOOGLE_ACCESS_TOKEN",
  "CALENDAR_INCLUDE_PAST_EVENTS_FOR_TODAY",
  "TODO_COUNT",
  "TOTAL_ITEMS",
  "LAYOUT_POLICY",
  "SCREEN_LAYOUT",
  "OUTPUT_SVG",
  "WEATHER_LATITUDE",
  "WEATHER_LONGITUDE",
  "WEATHER_FORMAT",
  "VISUALCROSSING_APIKEY",
  "WEATHER_MET_EIREANN",
  "WEATHERGOV_SELF_IDENTIFICATION",
  "METNO_SELF_IDENTIFICATION",
  "ACCUWEATHER_APIKEY",
  "ACCUWEATHER_LOCATIONKEY",
  "METOFFICEDATAHUB_API_KEY",
  "OPENWEATHERMAP_APIKEY",
  "CLIMACELL_APIKEY",
  "SMHI_SELF_IDENTIFICATION",
  "ALERT_WEATHERGOV_SELF_IDENTIFICATION",
  "ALERT_METOFFICE_FEED_URL",
  "ALERT_MET_EIREANN_FEED_URL",
  "TIMEZONE",
  "TZ",
  "LC_ALL",
  "LC_MESSAGES",
  "LANG"
];

const DEFAULTS: &[(&str, &str)] = &[
  ("GOOGLE_CALENDAR_ID", "primary"),
  ("TODO_COUNT", "3"),
  ("TOTAL_ITEMS", "8"),
  ("LAYOUT_POLICY", "fixed-count"),
  (
    "OUTPUT_SVG",
    "screen-output-weather.svg"
  ),
  ("WEATHER_LATITUDE", "51.5077"),
  ("WEATHER_LONGITUDE", "-0.1277"),
  ("WEATHER_FORMAT", "CELSIUS")
];

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    Self {
      map:          DEFAULTS
        .iter()
        .map(|(k, v)| {
          (k.to_string(), v.to_string())
        })
        .collect(),
      loaded_files: vec![]
    }
  }
}

impl Config {
  /// Builds the configuration from
  /// defaults, an optional env-style file
  /// and the given environment. The
  /// environment is passed in so callers
  /// (and tests) decide what it holds.
  #[tracing::instrument(skip(
    config_override,
    env
  ))]
  pub fn load<I>(
    config_override: Option<&Path>,
    env: I
  ) -> anyhow::Result<Self>
  where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    let env: HashMap<String, String> =
      env.into_iter().collect();
    let mut cfg = Config::default();

    match resolve_config_path(
      config_override,
      env.get("INKDASH_CONFIG").map(
        String::as_str
      )
    )? {
      | Some(path) => {
        info!(config = %path.display(), "loading config file");
        cfg.load_file(&path)?;
      }
      | None => {
        debug!(
          "no config file found; using \
           defaults and environment"
        );
      }
    }

    for key in KNOWN_KEYS {
      if let Some(value) = env.get(*key)
      {
        trace!(key, "environment override");
        cfg.map.insert(
          (*key).to_string(),
          value.clone()
        );
      }
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      debug!(key = %k, "applying override");
      self.map.insert(k, v);
    }
  }

  /// Value for `key`; empty values count
  /// as unset.
  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self
      .map
      .get(key)
      .filter(|v| !v.trim().is_empty())
      .cloned()
  }

  pub fn get_str(
    &self,
    key: &str
  ) -> Option<&str> {
    self
      .map
      .get(key)
      .map(String::as_str)
      .filter(|v| !v.trim().is_empty())
  }

  pub fn is_set(
    &self,
    key: &str
  ) -> bool {
    self.get_str(key).is_some()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .get_str(key)
      .map(parse_bool)
  }

  /// Parses a non-negative count. Missing
  /// values use `default`; unparseable
  /// ones log a warning and use it too.
  pub fn get_count(
    &self,
    key: &str,
    default: usize
  ) -> usize {
    let Some(raw) = self.get_str(key)
    else {
      return default;
    };
    match raw.trim().parse::<i64>() {
      | Ok(value) => {
        usize::try_from(value.max(0))
          .unwrap_or(default)
      }
      | Err(err) => {
        warn!(
          key,
          value = raw,
          error = %err,
          default,
          "invalid count; using default"
        );
        default
      }
    }
  }

  pub fn get_f64(
    &self,
    key: &str,
    default: f64
  ) -> f64 {
    let Some(raw) = self.get_str(key)
    else {
      return default;
    };
    raw.trim().parse().unwrap_or_else(
      |err| {
        warn!(
          key,
          value = raw,
          error = %err,
          default,
          "invalid number; using default"
        );
        default
      }
    )
  }

  /// Whitespace-separated list value.
  pub fn get_list(
    &self,
    key: &str
  ) -> Vec<String> {
    self
      .get_str(key)
      .map(|raw| {
        raw
          .split_whitespace()
          .map(str::to_string)
          .collect()
      })
      .unwrap_or_default()
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      let line = line
        .strip_prefix("export ")
        .map_or(line, str::trim_start);

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = unquote(v.trim());
      trace!(key = %key, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

/// Quoted values keep `#` verbatim;
/// unquoted values end at a ` #` comment.
fn unquote(value: &str) -> String {
  for quote in ['"', '\''] {
    if let Some(inner) = value
      .strip_prefix(quote)
      .and_then(|v| v.strip_suffix(quote))
    {
      return inner.to_string();
    }
  }
  value
    .split_once(" #")
    .map_or(value, |(before, _)| before)
    .trim()
    .to_string()
}

#[tracing::instrument]
fn resolve_config_path(
  override_path: Option<&Path>,
  env_path: Option<&str>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Some(env_path) = env_path {
    if env_path == "/dev/null"
      || env_path.is_empty()
    {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      env_path
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping ~/.inkdashrc"
    );
    return Ok(None);
  };
  let candidate = home.join(".inkdashrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

pub fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::Config;

  fn env(
    pairs: &[(&str, &str)]
  ) -> Vec<(String, String)> {
    pairs
      .iter()
      .map(|(k, v)| {
        (k.to_string(), v.to_string())
      })
      .collect()
  }

  #[test]
  fn defaults_apply_without_file_or_env()
  {
    let cfg = Config::load(
      None,
      env(&[("INKDASH_CONFIG", "/dev/null")])
    )
    .expect("load");
    assert_eq!(
      cfg.get("TODO_COUNT").as_deref(),
      Some("3")
    );
    assert_eq!(
      cfg.get("GOOGLE_CALENDAR_ID")
        .as_deref(),
      Some("primary")
    );
    assert!(cfg.loaded_files.is_empty());
  }

  #[test]
  fn file_then_env_then_overrides() {
    let mut file =
      tempfile::NamedTempFile::new()
        .expect("temp file");
    writeln!(
      file,
      "# dashboard\nexport TODO_COUNT=2\nTIMEZONE=\"Europe/Dublin\"\nLANG=ja_JP # comment\nTOTAL_ITEMS=6"
    )
    .expect("write config");

    let mut cfg = Config::load(
      Some(file.path()),
      env(&[
        ("TOTAL_ITEMS", "7"),
        ("UNRELATED", "x")
      ])
    )
    .expect("load");

    assert_eq!(cfg.get_count("TODO_COUNT", 3), 2);
    assert_eq!(cfg.get_count("TOTAL_ITEMS", 8), 7);
    assert_eq!(
      cfg.get("TIMEZONE").as_deref(),
      Some("Europe/Dublin")
    );
    assert_eq!(
      cfg.get("LANG").as_deref(),
      Some("ja_JP")
    );
    assert_eq!(cfg.get("UNRELATED"), None);

    cfg.apply_overrides(vec![(
      "TODO_COUNT".to_string(),
      "1".to_string()
    )]);
    assert_eq!(cfg.get_count("TODO_COUNT", 3), 1);
  }

  #[test]
  fn invalid_count_falls_back_to_default()
  {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![
      ("TODO_COUNT".to_string(), "abc".to_string()),
      ("TOTAL_ITEMS".to_string(), "-4".to_string())
    ]);
    assert_eq!(cfg.get_count("TODO_COUNT", 3), 3);
    assert_eq!(cfg.get_count("TOTAL_ITEMS", 8), 0);
  }

  #[test]
  fn empty_values_count_as_unset() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![(
      "OUTLOOK_CALENDAR_ID".to_string(),
      "  ".to_string()
    )]);
    assert!(!cfg.is_set("OUTLOOK_CALENDAR_ID"));
    assert_eq!(
      cfg.get_list("CALDAV_CALENDAR_URLS"),
      Vec::<String>::new()
    );
  }

  #[test]
  fn malformed_line_is_an_error() {
    let mut file =
      tempfile::NamedTempFile::new()
        .expect("temp file");
    writeln!(file, "NOT A PAIR")
      .expect("write config");
    let err = Config::load(
      Some(file.path()),
      env(&[])
    )
    .expect_err("malformed line");
    assert!(
      err
        .to_string()
        .contains("invalid config line")
    );
  }
}
