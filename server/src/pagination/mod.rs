//! Keyset Pagination
//!
//! Opaque-cursor pagination over descending tuple orderings, shared by every
//! list endpoint (threads, subscribers, subscriber threads).
//!
//! A listing:
//! 1. picks a [`KeysetOrdering`],
//! 2. turns an incoming cursor into a [`KeysetFilter`] via
//!    [`KeysetOrdering::filter_from_cursor`] and appends it to the query,
//! 3. fetches [`PageParams::fetch_limit`] rows in ordering order,
//! 4. finishes with [`CursorPage::from_rows`].
//!
//! Everything here is pure and synchronous.

pub mod cursor;
pub mod error;
pub mod keyset;
pub mod orderings;
pub mod page;

pub use cursor::{decode_cursor, encode_cursor, CursorKind, CursorPayload, CursorSchema, CursorValue};
pub use error::{CursorError, KeysetError};
pub use keyset::{KeysetColumn, KeysetFilter, KeysetOrdering};
pub use orderings::{subscriber_threads_ordering, subscribers_ordering, threads_ordering};
pub use page::{CursorPage, PageParams, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
