//! Single-line parser: text plus line number in, directive (or skip) out.
//!
//! Blank lines and `#` comments yield `None`; `## Section:` headers are the
//! one `#`-prefixed form that produces a directive. Everything else must be
//! a `[NAME]` line. The bracket token matches case-insensitively, and the
//! argument may sit inside the brackets (`[SLIDE 5]`) or after them
//! (`[FOCUS] Terminal`); supplying both is an error.

use crate::directive::{Directive, ParsedLine, SlideAction};
use crate::error::ParseError;

const SECTION_HEADER: &str = "## Section:";

pub fn parse_line(raw: &str, line_number: usize) -> Result<Option<ParsedLine>, ParseError> {
    let text = raw.trim();
    if text.is_empty() {
        return Ok(None);
    }

    if let Some(rest) = text.strip_prefix(SECTION_HEADER) {
        let name = rest.trim();
        if name.is_empty() {
            return Err(ParseError::new(line_number, raw, "section name is empty"));
        }
        return Ok(Some(ParsedLine {
            line_number,
            directive: Directive::Section { name: name.into() },
        }));
    }

    if text.starts_with('#') {
        return Ok(None);
    }

    let (name, argument) = split_directive(text, raw, line_number)?;
    let directive = build_directive(&name, argument, raw, line_number)?;
    Ok(Some(ParsedLine {
        line_number,
        directive,
    }))
}

/// Splits `[NAME arg]` / `[NAME] arg` into the upper-cased name and its
/// trimmed argument.
fn split_directive<'a>(
    text: &'a str,
    raw: &str,
    line_number: usize,
) -> Result<(String, &'a str), ParseError> {
    let interior = match text.strip_prefix('[') {
        Some(rest) => rest,
        None => {
            return Err(ParseError::new(
                line_number,
                raw,
                "expected a [DIRECTIVE] line, a comment, or a section header",
            ));
        }
    };
    let close = interior.find(']').ok_or_else(|| {
        ParseError::new(line_number, raw, "missing closing ']' after directive name")
    })?;
    let bracketed = interior[..close].trim();
    let trailing = interior[close + 1..].trim();

    let (name, inline) = match bracketed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (bracketed, ""),
    };
    if name.is_empty() {
        return Err(ParseError::new(line_number, raw, "empty directive name"));
    }

    let argument = match (inline.is_empty(), trailing.is_empty()) {
        (false, false) => {
            return Err(ParseError::new(
                line_number,
                raw,
                "argument supplied both inside and after the brackets",
            ));
        }
        (false, true) => inline,
        (true, _) => trailing,
    };

    Ok((name.to_ascii_uppercase(), argument))
}

fn build_directive(
    name: &str,
    argument: &str,
    raw: &str,
    line_number: usize,
) -> Result<Directive, ParseError> {
    match name {
        "SAY" => Ok(Directive::Say {
            text: required(argument, "SAY", raw, line_number)?,
        }),
        "TYPE" => Ok(Directive::Type {
            text: required(argument, "TYPE", raw, line_number)?,
        }),
        "RUN" => {
            empty(argument, "RUN", raw, line_number)?;
            Ok(Directive::Run)
        }
        "PAUSE" => {
            let timeout = if argument.is_empty() {
                None
            } else {
                Some(non_negative(argument, "PAUSE timeout", raw, line_number)?)
            };
            Ok(Directive::Pause { timeout })
        }
        "FOCUS" => Ok(Directive::Focus {
            app: required(argument, "FOCUS", raw, line_number)?,
        }),
        "SLIDE" => Ok(Directive::Slide {
            action: slide_action(argument, raw, line_number)?,
        }),
        "KEY" => Ok(Directive::Key {
            combo: required(argument, "KEY", raw, line_number)?,
        }),
        "CLEAR" => {
            empty(argument, "CLEAR", raw, line_number)?;
            Ok(Directive::Clear)
        }
        "WAIT" => {
            if argument.is_empty() {
                return Err(ParseError::new(
                    line_number,
                    raw,
                    "WAIT requires a number of seconds",
                ));
            }
            Ok(Directive::Wait {
                seconds: non_negative(argument, "WAIT", raw, line_number)?,
            })
        }
        "EXEC" => Ok(Directive::Exec {
            command: required(argument, "EXEC", raw, line_number)?,
        }),
        other => Err(ParseError::new(
            line_number,
            raw,
            format!("unknown directive [{other}]"),
        )),
    }
}

fn required(
    argument: &str,
    name: &str,
    raw: &str,
    line_number: usize,
) -> Result<String, ParseError> {
    if argument.is_empty() {
        return Err(ParseError::new(
            line_number,
            raw,
            format!("{name} requires an argument"),
        ));
    }
    Ok(argument.to_string())
}

fn empty(argument: &str, name: &str, raw: &str, line_number: usize) -> Result<(), ParseError> {
    if !argument.is_empty() {
        return Err(ParseError::new(
            line_number,
            raw,
            format!("{name} takes no argument"),
        ));
    }
    Ok(())
}

fn non_negative(
    argument: &str,
    what: &str,
    raw: &str,
    line_number: usize,
) -> Result<u64, ParseError> {
    argument.parse::<u64>().map_err(|_| {
        ParseError::new(
            line_number,
            raw,
            format!("{what} expects a non-negative integer, got {argument:?}"),
        )
    })
}

fn slide_action(argument: &str, raw: &str, line_number: usize) -> Result<SlideAction, ParseError> {
    match argument.to_ascii_lowercase().as_str() {
        "" => Err(ParseError::new(
            line_number,
            raw,
            "SLIDE expects next, prev, or a slide number",
        )),
        "next" => Ok(SlideAction::Next),
        "prev" => Ok(SlideAction::Prev),
        other => {
            let slide = other.parse::<u32>().map_err(|_| {
                ParseError::new(
                    line_number,
                    raw,
                    format!("SLIDE expects next, prev, or a slide number, got {argument:?}"),
                )
            })?;
            if slide == 0 {
                return Err(ParseError::new(
                    line_number,
                    raw,
                    "slide index must be positive",
                ));
            }
            Ok(SlideAction::GoTo { slide })
        }
    }
}
