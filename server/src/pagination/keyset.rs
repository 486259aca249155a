//! Keyset Filters
//!
//! Turns the ordering tuple decoded from a cursor into a "strictly after this
//! row" predicate for descending multi-column orderings.
//!
//! For columns `(c0, c1, c2)` and boundary `(v0, v1, v2)` the predicate is
//!
//! ```text
//! (c0 < v0) OR (c0 = v0 AND c1 < v1) OR (c0 = v0 AND c1 = v1 AND c2 < v2)
//! ```
//!
//! which an index on the ordering columns can serve directly, with no OFFSET
//! scan. Page boundaries are only stable when the last column is unique per
//! row; with a non-unique trailing column, rows tied on the full tuple can be
//! skipped or repeated across pages. Callers must guarantee that.

use std::cmp::Ordering;

use sqlx::{Postgres, QueryBuilder};

use super::cursor::{decode_cursor, encode_cursor, CursorKind, CursorPayload, CursorSchema, CursorValue};
use super::error::{CursorError, KeysetError};

// ============================================================================
// Filter
// ============================================================================

/// Row predicate: "row tuple < boundary tuple" under descending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeysetFilter {
    terms: Vec<(String, CursorValue)>,
}

impl KeysetFilter {
    /// Pair each column expression with its boundary value.
    ///
    /// Column expressions are pushed into SQL verbatim and must be trusted,
    /// static text. Values are always bound as parameters.
    pub fn build<C: AsRef<str>>(
        columns: &[C],
        values: Vec<CursorValue>,
    ) -> Result<Self, KeysetError> {
        if columns.len() != values.len() {
            return Err(KeysetError::LengthMismatch {
                columns: columns.len(),
                values: values.len(),
            });
        }
        if columns.is_empty() {
            return Err(KeysetError::Empty);
        }

        Ok(Self {
            terms: columns
                .iter()
                .map(|c| c.as_ref().to_owned())
                .zip(values)
                .collect(),
        })
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|(column, _)| column.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &CursorValue> {
        self.terms.iter().map(|(_, value)| value)
    }

    /// Append the predicate as a parenthesised SQL expression with bound values.
    pub fn push_sql(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push("(");
        for (idx, (column, bound)) in self.terms.iter().enumerate() {
            if idx > 0 {
                builder.push(" OR ");
            }
            builder.push("(");
            for (prefix_column, prefix_value) in &self.terms[..idx] {
                builder.push(prefix_column).push(" = ");
                push_value(builder, prefix_value);
                builder.push(" AND ");
            }
            builder.push(column).push(" < ");
            push_value(builder, bound);
            builder.push(")");
        }
        builder.push(")");
    }

    /// Evaluate the predicate against a row's ordering tuple.
    ///
    /// A row of the wrong arity, or with values of a different kind than the
    /// boundary, never matches.
    pub fn matches(&self, row: &[CursorValue]) -> bool {
        if row.len() != self.terms.len() {
            return false;
        }

        self.terms.iter().enumerate().any(|(idx, (_, bound))| {
            self.terms[..idx]
                .iter()
                .zip(row)
                .all(|((_, prefix), value)| value == prefix)
                && row[idx].partial_cmp(bound) == Some(Ordering::Less)
        })
    }
}

fn push_value(builder: &mut QueryBuilder<'_, Postgres>, value: &CursorValue) {
    match value.clone() {
        CursorValue::Timestamp(ts) => builder.push_bind(ts),
        CursorValue::Uuid(id) => builder.push_bind(id),
        CursorValue::Text(text) => builder.push_bind(text),
        CursorValue::Integer(n) => builder.push_bind(n),
        CursorValue::Boolean(b) => builder.push_bind(b),
    };
}

// ============================================================================
// Ordering
// ============================================================================

/// One column of a keyset ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeysetColumn {
    /// Name of the field in the cursor payload.
    pub field: &'static str,
    /// SQL expression the column sorts on.
    pub expr: &'static str,
    pub kind: CursorKind,
}

impl KeysetColumn {
    pub const fn new(field: &'static str, expr: &'static str, kind: CursorKind) -> Self {
        Self { field, expr, kind }
    }
}

/// A per-endpoint sort order: every column descending, last column unique.
///
/// The ordering is the single source for the `ORDER BY`, the cursor schema and
/// the keyset filter, so the three can never drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeysetOrdering {
    columns: Vec<KeysetColumn>,
}

impl KeysetOrdering {
    pub fn new(columns: impl IntoIterator<Item = KeysetColumn>) -> Result<Self, KeysetError> {
        let columns: Vec<_> = columns.into_iter().collect();
        if columns.is_empty() {
            return Err(KeysetError::Empty);
        }
        Ok(Self { columns })
    }

    /// Build from a fixed, non-empty column array.
    pub(crate) fn from_static<const N: usize>(columns: &[KeysetColumn; N]) -> Self {
        const { assert!(N > 0, "keyset ordering needs at least one column") };
        Self {
            columns: columns.to_vec(),
        }
    }

    pub fn columns(&self) -> &[KeysetColumn] {
        &self.columns
    }

    /// Cursor schema with the same fields, in the same order.
    pub fn cursor_schema(&self) -> CursorSchema {
        CursorSchema::new(self.columns.iter().map(|c| (c.field, c.kind)))
    }

    /// Check a hand-written schema against this ordering.
    pub fn ensure_schema(&self, schema: &CursorSchema) -> Result<(), KeysetError> {
        let fields = schema.fields();
        if fields.len() != self.columns.len() {
            return Err(KeysetError::LengthMismatch {
                columns: self.columns.len(),
                values: fields.len(),
            });
        }
        match self
            .columns
            .iter()
            .zip(fields)
            .position(|(column, (field, kind))| column.field != *field || column.kind != *kind)
        {
            Some(position) => Err(KeysetError::SchemaMismatch { position }),
            None => Ok(()),
        }
    }

    /// `expr DESC, expr DESC, ...`
    pub fn order_by_sql(&self) -> String {
        self.columns
            .iter()
            .map(|c| format!("{} DESC", c.expr))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Append ` ORDER BY ...` to a query.
    pub fn push_order_by(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" ORDER BY ").push(self.order_by_sql());
    }

    /// Decode a client cursor into the filter for the next page.
    pub fn filter_from_cursor(&self, token: &str) -> Result<KeysetFilter, CursorError> {
        let payload = decode_cursor(token, &self.cursor_schema())?;
        Ok(KeysetFilter {
            terms: self
                .columns
                .iter()
                .map(|c| c.expr.to_owned())
                .zip(payload.into_values())
                .collect(),
        })
    }

    /// Encode a row's ordering tuple (values in column order) as a cursor.
    pub fn cursor_for(&self, values: Vec<CursorValue>) -> Result<String, KeysetError> {
        if values.len() != self.columns.len() {
            return Err(KeysetError::LengthMismatch {
                columns: self.columns.len(),
                values: values.len(),
            });
        }
        let payload: CursorPayload = self
            .columns
            .iter()
            .map(|c| c.field)
            .zip(values)
            .collect();
        Ok(encode_cursor(&payload))
    }
}
