//! Classification of arduino-cli output lines.
//!
//! With `--format json` or `--format jsonmini` the tool prints JSON on
//! stdout. The field set is owned by arduino-cli and changes between
//! releases, so only two fields are interpreted:
//!
//! - `success` (bool): present on compile/upload results
//! - `error` (string): present on failures
//!
//! Anything else is passed through as raw text.
//!
//! `jsonmini` emits one document per line. `json` pretty-prints, so a
//! document can span many lines; [`DocumentAssembler`] regroups them.

use serde_json::{Map, Value};

use super::error::ToolchainError;
use super::message::Status;

/// Field carrying compiler diagnostics on a failed build.
const COMPILER_ERR_FIELD: &str = "compiler_err";

/// What a single stdout line turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    /// A record reporting success. Carries the raw line.
    Success(String),
    /// A record reporting failure. Carries the extracted error text.
    Failure(String),
    /// A well-formed record without a status. Carries the raw line.
    Record(String),
    /// Not a JSON object or array. Carries the raw line.
    Unparsed(String),
}

impl OutputLine {
    /// Status of the message this line becomes.
    pub fn status(&self) -> Status {
        match self {
            Self::Success(_) => Status::Success,
            Self::Failure(_) => Status::Error,
            Self::Record(_) => Status::Info,
            Self::Unparsed(_) => Status::Warning,
        }
    }

    /// Payload of the message this line becomes.
    pub fn data(&self) -> String {
        match self {
            Self::Success(raw) | Self::Record(raw) | Self::Failure(raw) | Self::Unparsed(raw) => {
                raw.clone()
            }
        }
    }

    /// The tolerated parse failure behind an unparsed line.
    pub fn parse_error(&self) -> Option<ToolchainError> {
        match self {
            Self::Unparsed(raw) => Some(ToolchainError::OutputParse(raw.clone())),
            _ => None,
        }
    }
}

// =============================================================================
// Document Assembly
// =============================================================================

/// Regroups stdout lines into JSON documents.
///
/// A pretty-printed top-level document opens with a bare `{` or `[` line and
/// closes with a bare `}` or `]` line at column zero. Every other line is a
/// document by itself.
#[derive(Debug, Default)]
pub struct DocumentAssembler {
    pending: Vec<String>,
}

impl DocumentAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line. Returns a document once one is complete.
    pub fn push(&mut self, line: &str) -> Option<String> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);

        if self.pending.is_empty() {
            if line.trim().is_empty() {
                return None;
            }
            if line == "{" || line == "[" {
                self.pending.push(line.to_string());
                return None;
            }
            return Some(line.to_string());
        }

        self.pending.push(line.to_string());
        if line == "}" || line == "]" {
            return self.finish();
        }
        None
    }

    /// Flushes an unterminated document at end of output.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.pending).join("\n"))
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Classifies one document. Never fails.
pub fn classify_line(line: &str) -> OutputLine {
    let trimmed = line.trim();

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(record)) => classify_record(trimmed, &record),
        Ok(Value::Array(_)) => OutputLine::Record(trimmed.to_string()),
        _ => OutputLine::Unparsed(trimmed.to_string()),
    }
}

fn classify_record(raw: &str, record: &Map<String, Value>) -> OutputLine {
    match record.get("success").and_then(Value::as_bool) {
        Some(true) => OutputLine::Success(raw.to_string()),
        Some(false) => {
            OutputLine::Failure(failure_text(record).unwrap_or_else(|| raw.to_string()))
        }
        None => match error_field(record) {
            Some(error) => OutputLine::Failure(failure_text(record).unwrap_or(error)),
            None => OutputLine::Record(raw.to_string()),
        },
    }
}

fn error_field(record: &Map<String, Value>) -> Option<String> {
    record
        .get("error")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `error`, followed by compiler diagnostics when the build produced any.
fn failure_text(record: &Map<String, Value>) -> Option<String> {
    let error = error_field(record);
    let diagnostics = record
        .get(COMPILER_ERR_FIELD)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty());

    match (error, diagnostics) {
        (Some(error), Some(diag)) => Some(format!("{}\n{}", error, diag)),
        (Some(error), None) => Some(error),
        (None, Some(diag)) => Some(diag.to_string()),
        (None, None) => None,
    }
}
