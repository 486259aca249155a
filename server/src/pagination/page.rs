//! Page request parameters and the cursor page response.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::cursor::CursorValue;
use super::error::KeysetError;
use super::keyset::KeysetOrdering;

/// Page size used when the client does not ask for one.
pub const DEFAULT_PAGE_LIMIT: i64 = 25;

/// Largest page a client may request.
pub const MAX_PAGE_LIMIT: i64 = 200;

const fn default_limit() -> i64 {
    DEFAULT_PAGE_LIMIT
}

/// `?limit=&cursor=` query parameters shared by list endpoints.
#[derive(Debug, Clone, Deserialize, Validate, utoipa::IntoParams)]
pub struct PageParams {
    /// Max items to return.
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 200, message = "limit must be between 1 and 200"))]
    pub limit: i64,
    /// Opaque cursor from the previous page's `next_cursor`.
    pub cursor: Option<String>,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            cursor: None,
        }
    }
}

impl PageParams {
    /// Requested limit clamped to `1..=MAX_PAGE_LIMIT`.
    pub fn effective_limit(&self) -> i64 {
        self.limit.clamp(1, MAX_PAGE_LIMIT)
    }

    /// Rows to fetch: one past the page so `has_more` needs no count query.
    pub fn fetch_limit(&self) -> i64 {
        self.effective_limit() + 1
    }

    /// Blank cursors are treated as absent.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref().filter(|c| !c.is_empty())
    }
}

/// One page of a keyset-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    /// `None` on the last page.
    pub next_cursor: Option<String>,
}

impl<T> CursorPage<T> {
    /// Finish a page from a `limit + 1` fetch.
    ///
    /// `rows` must already be in `ordering` order. `key` extracts a row's
    /// ordering tuple in column order. A next cursor is produced only when the
    /// extra row came back. Fails only when `key` disagrees with `ordering`
    /// on the number of columns.
    pub fn from_rows<F>(
        mut rows: Vec<T>,
        limit: usize,
        ordering: &KeysetOrdering,
        key: F,
    ) -> Result<Self, KeysetError>
    where
        F: Fn(&T) -> Vec<CursorValue>,
    {
        let has_more = rows.len() > limit;
        rows.truncate(limit);

        let next_cursor = match rows.last() {
            Some(last) if has_more => Some(ordering.cursor_for(key(last))?),
            _ => None,
        };

        Ok(Self {
            items: rows,
            next_cursor,
        })
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> CursorPage<U> {
        CursorPage {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}
