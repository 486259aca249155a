//! Orderings used by the list endpoints.
//!
//! Column expressions assume the table aliases `t` (threads) and
//! `s` (subscribers).

use super::cursor::CursorKind;
use super::keyset::{KeysetColumn, KeysetOrdering};

/// Subscribers that never sent a message sort as if active at the Unix epoch.
pub const SUBSCRIBER_ACTIVITY_EXPR: &str =
    "COALESCE(s.last_message_at, TIMESTAMPTZ '1970-01-01 00:00:00+00')";

const THREAD_COLUMNS: [KeysetColumn; 2] = [
    KeysetColumn::new("updated_at", "t.updated_at", CursorKind::Timestamp),
    KeysetColumn::new("id", "t.id", CursorKind::Uuid),
];

const SUBSCRIBER_COLUMNS: [KeysetColumn; 3] = [
    KeysetColumn::new("activity_at", SUBSCRIBER_ACTIVITY_EXPR, CursorKind::Timestamp),
    KeysetColumn::new("created_at", "s.created_at", CursorKind::Timestamp),
    KeysetColumn::new("id", "s.id", CursorKind::Uuid),
];

/// Threads of an app, most recently updated first.
pub fn threads_ordering() -> KeysetOrdering {
    KeysetOrdering::from_static(&THREAD_COLUMNS)
}

/// Subscribers of an app, most recently active first.
pub fn subscribers_ordering() -> KeysetOrdering {
    KeysetOrdering::from_static(&SUBSCRIBER_COLUMNS)
}

/// Threads of one subscriber, most recently updated first.
pub fn subscriber_threads_ordering() -> KeysetOrdering {
    KeysetOrdering::from_static(&THREAD_COLUMNS)
}
