//! Row structs and their conversions into `quire_core` domain types.
//!
//! Each submodule contains a `FromRow` struct matching the database row and
//! a `TryFrom` conversion that rejects values the domain does not know.

pub mod content_item;
pub mod edit_batch;
pub mod snapshot;

/// Build the decode error returned when a stored enum value is unknown.
pub(crate) fn unknown_value(column: &str, value: &str) -> sqlx::Error {
    sqlx::Error::Decode(format!("unknown {column} '{value}'").into())
}
