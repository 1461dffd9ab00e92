//! Log line types
//!
//! Agents hand out raw `LogLine`s tagged with the output stream they came
//! from. The gateway turns them into `LogEvent`s, the compact JSON shape the
//! browser consumes.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Output stream a log line was written to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// Which output streams a log request wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StdType {
    Stdout,
    Stderr,
    #[default]
    All,
}

impl StdType {
    /// Build from request flags. Asking for neither stream means both.
    pub fn from_flags(stdout: bool, stderr: bool) -> Self {
        match (stdout, stderr) {
            (true, false) => StdType::Stdout,
            (false, true) => StdType::Stderr,
            _ => StdType::All,
        }
    }

    pub fn stdout(self) -> bool {
        matches!(self, StdType::Stdout | StdType::All)
    }

    pub fn stderr(self) -> bool {
        matches!(self, StdType::Stderr | StdType::All)
    }

    /// Check whether lines from `stream` pass this filter
    pub fn includes(self, stream: OutputStream) -> bool {
        match stream {
            OutputStream::Stdout => self.stdout(),
            OutputStream::Stderr => self.stderr(),
        }
    }
}

/// One raw log line, optionally prefixed with an RFC 3339 timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub stream: OutputStream,
    pub text: String,
}

impl LogLine {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stdout,
            text: text.into(),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            stream: OutputStream::Stderr,
            text: text.into(),
        }
    }
}

/// Log line as delivered to the browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Message without the timestamp prefix
    #[serde(rename = "m")]
    pub message: String,

    /// Unix timestamp in milliseconds, 0 when the line carried none
    #[serde(rename = "ts")]
    pub timestamp: i64,

    #[serde(rename = "s")]
    pub stream: OutputStream,

    #[serde(skip)]
    pub time: Option<DateTime<Utc>>,
}

impl LogEvent {
    /// Split the timestamp prefix off a raw line
    pub fn from_line(line: &LogLine) -> Self {
        let text = line.text.trim_end_matches(['\r', '\n']);
        let parsed = text.split_once(' ').and_then(|(prefix, rest)| {
            DateTime::parse_from_rfc3339(prefix)
                .ok()
                .map(|time| (time.with_timezone(&Utc), rest))
        });

        match parsed {
            Some((time, rest)) => Self {
                message: rest.to_string(),
                timestamp: time.timestamp_millis(),
                stream: line.stream,
                time: Some(time),
            },
            None => Self {
                message: text.to_string(),
                timestamp: 0,
                stream: line.stream,
                time: None,
            },
        }
    }

    /// Full-precision timestamp, used as the SSE event id for resuming
    pub fn id(&self) -> Option<String> {
        self.time
            .map(|time| time.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }
}
