//! Script parsing for the `.cm` presentation DSL.
//!
//! A script is UTF-8 text: an optional `---`-fenced front-matter header
//! followed by one directive per line. This crate owns the directive
//! model, the line parser, the front-matter parser, and the whole-file
//! parser that ties them together. Grouping into presentation blocks
//! lives in `cm-blocks`.

pub mod directive;
pub mod error;
pub mod front_matter;
pub mod line;

pub use directive::{Directive, ParsedLine, SlideAction};
pub use error::ParseError;
pub use front_matter::FrontMatter;
pub use front_matter::extract_front_matter;
pub use line::parse_line;

use tracing::debug;

/// A fully parsed script: typed configuration plus ordered directives.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Script {
    pub front_matter: FrontMatter,
    pub lines: Vec<ParsedLine>,
}

/// Parses a whole script. Line numbers are 1-based relative to the whole
/// file, front matter included; `\r` is stripped so CRLF input parses.
/// Returns the first error encountered.
pub fn parse_script(text: &str) -> Result<Script, ParseError> {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    let (front_matter, content_start) = extract_front_matter(&lines)?;

    let mut parsed = Vec::new();
    for (idx, raw) in lines.iter().enumerate().skip(content_start) {
        if let Some(parsed_line) = parse_line(raw, idx + 1)? {
            parsed.push(parsed_line);
        }
    }

    debug!(
        target: "script.parse",
        directives = parsed.len(),
        title = front_matter.title.as_deref(),
        "script_parsed"
    );

    Ok(Script {
        front_matter,
        lines: parsed,
    })
}
