// SPDX-License-Identifier: MIT
// Copyright (c) Microsoft Corporation.

use chrono::{DateTime, Utc};

use crate::error::QueryError;

/// The timestamp format accepted for TIME column values, `yyyy-MM-dd HH:mm:ssZ`.
///
/// For example, `2023-11-14 22:13:20+0000`.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%z";

/// Parse a TIME column value into milliseconds since the Unix epoch.
///
/// The value is first tried as an integer number of milliseconds; if that fails it must be a
/// timestamp in [`TIME_FORMAT`].
///
/// # Errors
///
/// Returns [`QueryError::InvalidLiteralValue`] if the value is neither.
pub fn parse_time_value(value: &str) -> Result<i64, QueryError> {
    if let Ok(millis) = value.parse::<i64>() {
        return Ok(millis);
    }

    DateTime::parse_from_str(value, TIME_FORMAT)
        .map(|time| time.timestamp_millis())
        .map_err(|error| {
            tracing::debug!(value, %error, "Value is neither epoch milliseconds nor a timestamp");
            QueryError::InvalidLiteralValue(value.to_string())
        })
}

/// Format milliseconds since the Unix epoch as a UTC timestamp in [`TIME_FORMAT`].
///
/// Sub-second precision is dropped. Returns [`None`] if the instant is out of range.
pub fn format_time(millis: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(millis).map(|time| time.format(TIME_FORMAT).to_string())
}
