//! Domain error taxonomy shared by repositories and the composer/aggregator.
//!
//! Every failure here is deterministic for a given input: the caller can fix
//! the input and retry. Nothing in this crate is fatal to the process.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or constraint-violating input (empty tag/ingredient set,
    /// duplicates, out-of-range quantity or cooking time).
    #[error("invalid input: {0}")]
    Validation(&'static str),

    /// A referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// A store-level uniqueness rule was violated (duplicate favorite,
    /// duplicate shopping-list entry, duplicate follow, self-follow).
    #[error("conflict: {0}")]
    Conflict(&'static str),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Error::NotFound { entity, id }
    }

    /// Collapse a unique-constraint violation into a domain `Conflict`.
    /// Toggle inserts rely on this instead of check-then-insert.
    pub(crate) fn on_unique(err: sqlx::Error, msg: &'static str) -> Self {
        let unique = err
            .as_database_error()
            .map(|db| matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation))
            .unwrap_or(false);
        if unique {
            Error::Conflict(msg)
        } else {
            Error::Database(err)
        }
    }
}
