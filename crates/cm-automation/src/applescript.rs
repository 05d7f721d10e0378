//! Pure AppleScript text generation. Nothing here touches a process; the
//! backend in `lib.rs` decides when and how the scripts run.

use crate::BackendError;
use cm_script::SlideAction;

/// Backslash-escapes `\` and `"` for embedding in an AppleScript string
/// literal.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\\' || c == '"' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn focus_app(name: &str) -> String {
    format!("tell application \"{}\" to activate", escape(name))
}

pub fn slide(action: SlideAction) -> String {
    match action {
        SlideAction::Next => "tell application \"Keynote\" to show next slide".to_string(),
        SlideAction::Prev => "tell application \"Keynote\" to show previous slide".to_string(),
        SlideAction::GoTo { slide } => {
            format!("tell application \"Keynote\" to show slide {slide} of document 1")
        }
    }
}

/// Return key, used to submit whatever was typed.
pub fn press_return() -> String {
    "tell application \"System Events\" to key code 36".to_string()
}

/// Control-L to the focused application.
pub fn clear_screen() -> String {
    "tell application \"System Events\" to keystroke \"l\" using control down".to_string()
}

pub fn type_char(c: char) -> String {
    format!(
        "tell application \"System Events\" to keystroke \"{}\"",
        escape(&c.to_string())
    )
}

/// Builds the keystroke script for a `mod(+mod)*+key` combo, matched
/// case-insensitively. Reserved key names resolve to `key code` form;
/// any other single character is sent as a literal keystroke.
pub fn keystroke(combo: &str) -> Result<String, BackendError> {
    let segments: Vec<&str> = combo.split('+').map(str::trim).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(invalid(combo, "empty segment"));
    }
    let (key, modifiers) = segments
        .split_last()
        .ok_or_else(|| invalid(combo, "no key"))?;

    let mut phrases = Vec::with_capacity(modifiers.len());
    for raw in modifiers {
        let phrase = modifier_phrase(raw).ok_or_else(|| {
            invalid(combo, format!("unknown modifier {raw:?}"))
        })?;
        phrases.push(phrase);
    }

    let key_lower = key.to_ascii_lowercase();
    let press = if let Some(code) = key_code(&key_lower) {
        format!("key code {code}")
    } else if key_lower.chars().count() == 1 {
        format!("keystroke \"{}\"", escape(&key_lower))
    } else {
        return Err(invalid(combo, format!("unknown key name {key:?}")));
    };

    let using = match phrases.as_slice() {
        [] => String::new(),
        [only] => format!(" using {only}"),
        many => format!(" using {{{}}}", many.join(", ")),
    };

    Ok(format!(
        "tell application \"System Events\" to {press}{using}"
    ))
}

fn invalid(combo: &str, reason: impl Into<String>) -> BackendError {
    BackendError::InvalidKeyCombo {
        combo: combo.to_string(),
        reason: reason.into(),
    }
}

fn modifier_phrase(token: &str) -> Option<&'static str> {
    match token.to_ascii_lowercase().as_str() {
        "cmd" => Some("command down"),
        "ctrl" => Some("control down"),
        "shift" => Some("shift down"),
        "alt" | "opt" => Some("option down"),
        _ => None,
    }
}

/// macOS virtual key codes for the reserved key names.
fn key_code(token: &str) -> Option<u8> {
    let code = match token {
        "return" => 36,
        "tab" => 48,
        "space" => 49,
        "delete" => 51,
        "escape" => 53,
        "left" => 123,
        "right" => 124,
        "down" => 125,
        "up" => 126,
        "f1" => 122,
        "f2" => 120,
        "f3" => 99,
        "f4" => 118,
        "f5" => 96,
        "f6" => 97,
        "f7" => 98,
        "f8" => 100,
        "f9" => 101,
        "f10" => 109,
        "f11" => 103,
        "f12" => 111,
        _ => return None,
    };
    Some(code)
}
