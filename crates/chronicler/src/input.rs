// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON Lines message input.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use chronicler_core::{ChroniclerError, Message};

/// One input line. Extra fields are ignored.
#[derive(Debug, Deserialize)]
struct InputRecord {
    timestamp: DateTime<Utc>,
    author_id: String,
    body: String,
}

/// Reads messages from `path`, or from stdin when `path` is `-`.
pub fn read_messages(path: &Path) -> Result<Vec<Message>, ChroniclerError> {
    if path == Path::new("-") {
        return parse_messages(std::io::stdin().lock(), "<stdin>");
    }
    let file = File::open(path).map_err(|e| {
        ChroniclerError::Config(format!("cannot open input {}: {e}", path.display()))
    })?;
    parse_messages(BufReader::new(file), &path.display().to_string())
}

/// Parses one message per non-blank line, keeping input order.
///
/// Decreasing timestamps are accepted with a warning; windows follow the
/// order given.
pub fn parse_messages(reader: impl BufRead, source: &str) -> Result<Vec<Message>, ChroniclerError> {
    let mut messages: Vec<Message> = Vec::new();
    let mut out_of_order = 0usize;

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|e| ChroniclerError::Config(format!("{source}:{line_no}: {e}")))?;
        if line.trim().is_empty() {
            continue;
        }
        let record: InputRecord = serde_json::from_str(&line).map_err(|e| {
            ChroniclerError::Config(format!("{source}:{line_no}: invalid message: {e}"))
        })?;
        let message = Message::new(record.timestamp, record.author_id, record.body);
        if messages
            .last()
            .is_some_and(|prev| prev.timestamp > message.timestamp)
        {
            out_of_order += 1;
        }
        messages.push(message);
    }

    if out_of_order > 0 {
        warn!(source, out_of_order, "input timestamps decrease; windows follow input order");
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lines_and_skips_blanks() {
        let input = concat!(
            r#"{"timestamp":"2026-01-01T10:00:00Z","author_id":"alice","body":"hi"}"#,
            "\n\n",
            r#"{"timestamp":"2026-01-01T10:01:00Z","author_id":"bob","body":"olá","channel":"x"}"#,
            "\n",
        );
        let messages = parse_messages(input.as_bytes(), "test").unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].author_id, "alice");
        assert_eq!(messages[1].byte_size, 4);
    }

    #[test]
    fn reports_the_failing_line() {
        let input = concat!(
            r#"{"timestamp":"2026-01-01T10:00:00Z","author_id":"alice","body":"hi"}"#,
            "\n",
            r#"{"timestamp":"yesterday","author_id":"bob","body":"x"}"#,
        );
        let err = parse_messages(input.as_bytes(), "log.jsonl").unwrap_err();
        assert!(matches!(err, ChroniclerError::Config(ref m) if m.starts_with("log.jsonl:2:")));
    }

    #[test]
    fn keeps_out_of_order_input_as_given() {
        let input = concat!(
            r#"{"timestamp":"2026-01-01T10:05:00Z","author_id":"a","body":"later"}"#,
            "\n",
            r#"{"timestamp":"2026-01-01T10:00:00Z","author_id":"a","body":"earlier"}"#,
        );
        let messages = parse_messages(input.as_bytes(), "test").unwrap();
        assert_eq!(messages[0].body, "later");
        assert_eq!(messages[1].body, "earlier");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_messages(&dir.path().join("absent.jsonl")).unwrap_err();
        assert!(matches!(err, ChroniclerError::Config(_)));
    }
}
