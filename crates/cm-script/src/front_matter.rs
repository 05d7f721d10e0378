//! Optional `---`-fenced header block providing typed configuration.
//!
//! Interior lines are `key: value`. Recognized keys populate the typed
//! record; unknown keys are ignored so scripts can carry annotations for
//! other tooling. Numeric fields fail loudly with the offending line.

use crate::error::ParseError;
use tracing::trace;

pub const DEFAULT_TYPING_SPEED_MS: u64 = 40;
pub const DEFAULT_TYPING_VARIANCE_MS: u64 = 15;
pub const DEFAULT_AGENT_PORT: u16 = 9876;

const FENCE: &str = "---";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatter {
    pub title: Option<String>,
    pub typing_speed_ms: u64,
    pub typing_variance_ms: u64,
    pub agent_port: u16,
}

impl Default for FrontMatter {
    fn default() -> Self {
        Self {
            title: None,
            typing_speed_ms: DEFAULT_TYPING_SPEED_MS,
            typing_variance_ms: DEFAULT_TYPING_VARIANCE_MS,
            agent_port: DEFAULT_AGENT_PORT,
        }
    }
}

/// Consumes a leading front-matter block if present. Returns the typed
/// configuration and the 0-based index of the first content line.
pub fn extract_front_matter(lines: &[&str]) -> Result<(FrontMatter, usize), ParseError> {
    let Some(open) = lines.iter().position(|line| !line.trim().is_empty()) else {
        return Ok((FrontMatter::default(), 0));
    };
    if lines[open].trim() != FENCE {
        return Ok((FrontMatter::default(), 0));
    }

    let close = lines
        .iter()
        .enumerate()
        .skip(open + 1)
        .find(|(_, line)| line.trim() == FENCE)
        .map(|(idx, _)| idx)
        .ok_or_else(|| {
            ParseError::new(open + 1, lines[open], "unterminated front matter block")
        })?;

    let mut front_matter = FrontMatter::default();
    for (idx, raw) in lines.iter().enumerate().take(close).skip(open + 1) {
        let line_number = idx + 1;
        let text = raw.trim();
        if text.is_empty() {
            continue;
        }
        let Some((key, value)) = text.split_once(':') else {
            return Err(ParseError::new(
                line_number,
                raw,
                "front matter lines must be key: value",
            ));
        };
        let key = key.trim();
        let value = value.trim();
        match key {
            "title" => front_matter.title = Some(value.to_string()),
            "typing_speed" => {
                front_matter.typing_speed_ms = numeric(value, key, raw, line_number)?;
            }
            "typing_variance" => {
                front_matter.typing_variance_ms = numeric(value, key, raw, line_number)?;
            }
            "agent_port" => {
                front_matter.agent_port = numeric(value, key, raw, line_number)?;
            }
            other => {
                trace!(target: "script.parse", key = other, line = line_number, "front_matter_key_ignored");
            }
        }
    }

    Ok((front_matter, close + 1))
}

fn numeric<T: std::str::FromStr>(
    value: &str,
    key: &str,
    raw: &str,
    line_number: usize,
) -> Result<T, ParseError> {
    value.parse::<T>().map_err(|_| {
        ParseError::new(
            line_number,
            raw,
            format!("{key} expects a non-negative integer, got {value:?}"),
        )
    })
}
