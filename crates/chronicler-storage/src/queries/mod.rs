// SPDX-FileCopyrightText: 2026 Chronicler Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query functions over a [`Database`](crate::Database).
//!
//! Functions that stamp or compare times take `now` explicitly so lease
//! expiry can be tested without waiting on the clock.

pub mod journal;
pub mod runs;
pub mod tasks;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;

pub(crate) fn parse_ts(column: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

pub(crate) fn parse_opt_ts(
    column: usize,
    raw: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_ts(column, &s)).transpose()
}

/// Parses a strum-backed enum stored as text.
pub(crate) fn parse_text<T>(column: usize, raw: &str) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}
