//! Script parse errors. Every error points at a 1-based line in the input
//! and carries the raw line text so diagnostics can quote the source.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line_number}: {message}")]
pub struct ParseError {
    pub line_number: usize,
    pub content: String,
    pub message: String,
}

impl ParseError {
    pub fn new(line_number: usize, content: &str, message: impl Into<String>) -> Self {
        Self {
            line_number,
            content: content.to_string(),
            message: message.into(),
        }
    }

    /// Multi-line diagnostic quoting the offending source line.
    pub fn diagnostic(&self) -> String {
        format!(
            "line {}: {}\n  | {}",
            self.line_number, self.message, self.content
        )
    }
}
