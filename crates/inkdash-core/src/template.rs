use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, anyhow};
use regex::{Captures, Regex};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::OutputMap;

/// Replaces every key of `values` in one pass over `template`. Keys only
/// match whole words, so `CAL_DESC_1` never eats the prefix of `CAL_DESC_10`
/// and text coming from a value is never substituted again. Placeholders
/// with no value are left as they are.
pub fn apply(template: &str, values: &OutputMap) -> anyhow::Result<String> {
    let mut keys: Vec<&str> = values
        .keys()
        .map(String::as_str)
        .filter(|key| !key.is_empty())
        .collect();
    if keys.is_empty() {
        return Ok(template.to_string());
    }
    keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let alternation = keys
        .iter()
        .map(|key| regex::escape(key))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = Regex::new(&format!(r"\b(?:{alternation})\b"))
        .context("failed to build placeholder pattern")?;

    Ok(pattern
        .replace_all(template, |caps: &Captures<'_>| {
            let key = &caps[0];
            values.get(key).cloned().unwrap_or_else(|| key.to_string())
        })
        .into_owned())
}

/// Reads `template_path`, substitutes `values` and replaces `output_path`
/// atomically. Template and output may be the same file.
#[tracing::instrument(skip(values), fields(keys = values.len()))]
pub fn write(template_path: &Path, output_path: &Path, values: &OutputMap) -> anyhow::Result<()> {
    let template = fs::read_to_string(template_path)
        .with_context(|| format!("failed to read template {}", template_path.display()))?;
    let rendered = apply(&template, values)?;
    debug!(bytes = rendered.len(), "rendered template");

    let dir = output_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    temp.write_all(rendered.as_bytes())?;
    temp.flush()?;
    temp.persist(output_path)
        .map_err(|err| anyhow!("failed to persist {}: {}", output_path.display(), err))?;

    info!(output = %output_path.display(), "wrote SVG");
    Ok(())
}
