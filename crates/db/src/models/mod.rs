use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, de};

pub mod activity;
pub mod agent_message;
pub mod agent_status;
pub mod council_discussion;
pub mod council_proposal;
pub mod council_vote;
pub mod department;
pub mod project;
pub mod stats;
pub mod status_history;
pub mod task;

#[cfg(test)]
pub(crate) mod test_utils;

/// Formats a timestamp the way SQLite's `datetime('now', 'subsec')` does,
/// so bound parameters compare correctly against default-filled columns.
pub fn sqlite_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// For PATCH bodies: a present `null` becomes `Some(None)` (clear the
/// column) while an absent field stays `None` (leave it alone). Use together
/// with `#[serde(default)]`.
pub fn nullable<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// For query strings: `?status=` is the same as leaving `status` out.
/// Non-empty values go through `FromStr`. Use together with
/// `#[serde(default)]`.
pub fn empty_as_none<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: FromStr,
    T::Err: Display,
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)?.as_deref() {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse().map(Some).map_err(de::Error::custom),
    }
}

/// Clamp client supplied page sizes.
pub fn page_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, 500)
}
