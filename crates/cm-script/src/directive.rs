//! Directive model: one tagged variant per meaningful script line.
//!
//! The same type travels over the wire inside `Execute` messages, so the
//! serde representation is part of the protocol: an object with a `type`
//! discriminator and the variant's fields alongside.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One parsed line of a `.cm` script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Directive {
    /// Narration cue shown on the controller; never transmitted.
    Say { text: String },
    /// Text typed character-by-character on the demo machine.
    Type { text: String },
    /// Press Return in the focused application.
    Run,
    /// Advancement pause, optionally timed. Never transmitted.
    Pause { timeout: Option<u64> },
    /// Bring an application to the foreground.
    Focus { app: String },
    /// Keynote slide control.
    Slide { action: SlideAction },
    /// Key combo such as `cmd+shift+s`; validated by the backend.
    Key { combo: String },
    /// Clear the focused terminal (control-L).
    Clear,
    /// Sleep on the demo machine for a number of seconds.
    Wait { seconds: u64 },
    /// Launch a shell command detached from the protocol loop.
    Exec { command: String },
    /// Section marker for the controller display. Never transmitted.
    Section { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SlideAction {
    Next,
    Prev,
    GoTo { slide: u32 },
}

impl Directive {
    /// Stable lower-case name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Directive::Say { .. } => "say",
            Directive::Type { .. } => "type",
            Directive::Run => "run",
            Directive::Pause { .. } => "pause",
            Directive::Focus { .. } => "focus",
            Directive::Slide { .. } => "slide",
            Directive::Key { .. } => "key",
            Directive::Clear => "clear",
            Directive::Wait { .. } => "wait",
            Directive::Exec { .. } => "exec",
            Directive::Section { .. } => "section",
        }
    }

    /// True for the directives that never appear inside an action block.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Directive::Say { .. } | Directive::Pause { .. } | Directive::Section { .. }
        )
    }
}

impl fmt::Display for Directive {
    /// Renders the directive back in script form, e.g. `[FOCUS] Terminal`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Say { text } => write!(f, "[SAY] {text}"),
            Directive::Type { text } => write!(f, "[TYPE] {text}"),
            Directive::Run => write!(f, "[RUN]"),
            Directive::Pause { timeout: None } => write!(f, "[PAUSE]"),
            Directive::Pause {
                timeout: Some(secs),
            } => write!(f, "[PAUSE] {secs}"),
            Directive::Focus { app } => write!(f, "[FOCUS] {app}"),
            Directive::Slide { action } => match action {
                SlideAction::Next => write!(f, "[SLIDE] next"),
                SlideAction::Prev => write!(f, "[SLIDE] prev"),
                SlideAction::GoTo { slide } => write!(f, "[SLIDE] {slide}"),
            },
            Directive::Key { combo } => write!(f, "[KEY] {combo}"),
            Directive::Clear => write!(f, "[CLEAR]"),
            Directive::Wait { seconds } => write!(f, "[WAIT] {seconds}"),
            Directive::Exec { command } => write!(f, "[EXEC] {command}"),
            Directive::Section { name } => write!(f, "## Section: {name}"),
        }
    }
}

/// A directive plus the 1-based line it came from, preserved for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub line_number: usize,
    pub directive: Directive,
}
